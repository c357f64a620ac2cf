//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use code_assistant::api::router;
use code_assistant::llm::Message;
use code_assistant::tools::ToolRouter;
use code_assistant::{
    AssistantResult, AssistantService, ConversationTrace, ReasoningLoop, ToolClient, ToolProvider,
};
use serde_json::{Value, json};
use tower::ServiceExt;

/// Records the prompt it receives and answers with a fixed message.
#[derive(Default)]
struct CapturingLoop {
    prompts: Mutex<Vec<String>>,
    tool_counts: Mutex<Vec<usize>>,
}

#[async_trait]
impl ReasoningLoop for CapturingLoop {
    async fn run(
        &self,
        message: Message,
        tools: &dyn ToolProvider,
    ) -> AssistantResult<ConversationTrace> {
        self.prompts
            .lock()
            .expect("lock")
            .push(message.text().unwrap_or_default().to_owned());
        self.tool_counts
            .lock()
            .expect("lock")
            .push(tools.descriptors().len());
        Ok(ConversationTrace::new(vec![message, Message::ai("You are in /tmp.")]))
    }
}

fn closed_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    addr.to_string()
}

async fn live_tool_service() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(code_assistant::server::serve(
        listener,
        ToolRouter::new(std::env::temp_dir()),
    ));
    addr.to_string()
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_blank_inputs_rejected_without_side_effects() {
    let agent = Arc::new(CapturingLoop::default());
    let service = Arc::new(AssistantService::new(
        ToolClient::new(closed_endpoint()),
        Arc::clone(&agent) as Arc<dyn ReasoningLoop>,
    ));
    let app = router(Arc::clone(&service));

    let response = app
        .clone()
        .oneshot(post("/generate", &json!({"query": "   "})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Query cannot be empty.");

    let response = app
        .oneshot(post("/set_working_directory", &json!({"path": "\t"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["detail"], "Path cannot be empty.");

    assert_eq!(service.working_directory(), None);
    assert!(agent.prompts.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn test_unreachable_tool_service_is_503() {
    let endpoint = closed_endpoint();
    let service = Arc::new(AssistantService::new(
        ToolClient::new(endpoint.clone()),
        Arc::new(CapturingLoop::default()),
    ));

    let response = router(service)
        .oneshot(post("/generate", &json!({"query": "list files"})))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let detail = body_json(response).await["detail"]
        .as_str()
        .expect("detail")
        .to_owned();
    assert!(detail.contains("Could not connect to the backend tool service"));
    assert!(detail.contains(&endpoint));
}

#[tokio::test]
async fn test_working_directory_flows_into_prompt() {
    let agent = Arc::new(CapturingLoop::default());
    let service = Arc::new(AssistantService::new(
        ToolClient::new(live_tool_service().await),
        Arc::clone(&agent) as Arc<dyn ReasoningLoop>,
    ));
    let app = router(service);

    let response = app
        .clone()
        .oneshot(post("/set_working_directory", &json!({"path": "/tmp"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["current_path"], "/tmp");
    assert_eq!(body["message"], "Working directory successfully set.");

    let response = app
        .oneshot(post("/generate", &json!({"query": "where am I"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["response"], "You are in /tmp.");

    let prompts = agent.prompts.lock().expect("lock");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Context: The current working directory is set to '/tmp'."));
    assert!(!prompts[0].contains("may not be valid"));
    assert!(prompts[0].ends_with("User Question:\nwhere am I"));
    assert_eq!(*agent.tool_counts.lock().expect("lock"), vec![4]);
}

#[tokio::test]
async fn test_malformed_trace_is_500() {
    struct ShortLoop;

    #[async_trait]
    impl ReasoningLoop for ShortLoop {
        async fn run(
            &self,
            message: Message,
            _tools: &dyn ToolProvider,
        ) -> AssistantResult<ConversationTrace> {
            Ok(ConversationTrace::new(vec![message]))
        }
    }

    let service = Arc::new(AssistantService::new(
        ToolClient::new(live_tool_service().await),
        Arc::new(ShortLoop),
    ));

    let response = router(service)
        .oneshot(post("/generate", &json!({"query": "hello"})))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body_json(response).await["detail"]
        .as_str()
        .expect("detail")
        .to_owned();
    assert!(detail.starts_with("An internal error occurred:"));
}

#[tokio::test]
async fn test_health() {
    let service = Arc::new(AssistantService::new(
        ToolClient::new(closed_endpoint()),
        Arc::new(CapturingLoop::default()),
    ));

    let response = router(service)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
