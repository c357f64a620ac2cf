//! Tool protocol integration tests.
//!
//! Exercises the JSON-RPC tool server through its public types, its router,
//! and a real TCP session opened by `ToolClient`.

use code_assistant::ToolProvider;
use code_assistant::client::ToolClient;
use code_assistant::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use code_assistant::tools::ToolRouter;
use serde_json::json;

#[test]
fn test_json_rpc_request_parsing() {
    let req_json = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "tools/call",
        "params": {
            "name": "read_file",
            "arguments": {"file_path": "README.md"}
        }
    });

    let req: JsonRpcRequest = serde_json::from_value(req_json).expect("should parse request");

    assert_eq!(req.method, "tools/call");
    assert_eq!(req.id, Some(json!(1)));
    assert_eq!(req.params["arguments"]["file_path"], "README.md");
}

#[test]
fn test_json_rpc_error_response() {
    let resp = JsonRpcResponse {
        jsonrpc: "2.0".to_owned(),
        id: Some(json!(2)),
        result: None,
        error: Some(JsonRpcError {
            code: -32601,
            message: "method not found".to_owned(),
            data: None,
        }),
    };

    let json_str = serde_json::to_string(&resp).expect("should serialize");
    assert!(json_str.contains("-32601"));
    assert!(json_str.contains("method not found"));
    assert!(!json_str.contains("result"));
}

#[test]
fn test_tool_definitions_complete() {
    let router = ToolRouter::new(std::path::PathBuf::from("/tmp"));

    let tools = router.list_tools();
    assert_eq!(tools.len(), 4);

    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"read_file"));
    assert!(names.contains(&"list_directory"));
    assert!(names.contains(&"get_file_info"));
    assert!(names.contains(&"get_tree_folders"));

    for tool in &tools {
        assert!(
            !tool.description.is_empty(),
            "tool {} missing description",
            tool.name
        );
        assert!(
            tool.input_schema.is_object(),
            "tool {} missing input_schema",
            tool.name
        );
    }
}

#[tokio::test]
async fn test_read_file_on_directory_is_error_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("inner.txt"), "secret contents").expect("write");
    let router = ToolRouter::new(dir.path().to_path_buf());

    let result = router
        .call_tool("read_file", json!({"file_path": dir.path().to_str().expect("utf-8")}))
        .await
        .expect("should not error");

    assert!(!result.is_error);
    let text = result.joined_text();
    assert!(text.starts_with("Error:"), "got {text}");
    assert!(!text.contains("secret contents"));
    assert!(!text.contains("inner.txt"));
}

#[tokio::test]
async fn test_tool_call_unknown() {
    let router = ToolRouter::new(std::path::PathBuf::from("/tmp"));

    let result = router
        .call_tool("nonexistent_tool", json!({}))
        .await
        .expect("should not error");

    assert!(result.is_error);
    assert!(result.joined_text().contains("Unknown tool"));
}

#[tokio::test]
async fn test_list_directory_item_set() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("a"), "").expect("write");
    std::fs::create_dir(dir.path().join("b")).expect("mkdir");
    let router = ToolRouter::new(dir.path().to_path_buf());

    let result = router
        .call_tool("list_directory", json!({"directory": "."}))
        .await
        .expect("should not error");

    let structured = result.structured_content.expect("structured listing");
    let mut items: Vec<String> =
        serde_json::from_value(structured["items"].clone()).expect("items list");
    items.sort();
    assert_eq!(items, vec!["a", "b"]);
}

#[tokio::test]
async fn test_client_session_over_tcp() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("hello.txt"), "hello from disk\n").expect("write");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let router = ToolRouter::new(dir.path().to_path_buf());
    tokio::spawn(code_assistant::server::serve(listener, router));

    let session = ToolClient::new(addr.to_string())
        .connect()
        .await
        .expect("session");

    assert_eq!(
        session.server_info().map(|i| i.name.as_str()),
        Some(code_assistant::server::SERVER_NAME)
    );
    assert_eq!(session.descriptors().len(), 4);

    let content = session
        .call_tool("read_file", json!({"file_path": "hello.txt"}))
        .await
        .expect("call");
    assert_eq!(content, "hello from disk\n");

    let missing = session
        .call_tool("read_file", json!({"file_path": "missing.txt"}))
        .await
        .expect("call");
    assert_eq!(missing, "Error: 'missing.txt' is not a valid file.");

    let listing = session
        .call_tool("list_directory", json!({"directory": "."}))
        .await
        .expect("call");
    assert!(listing.contains("hello.txt"));

    session.close().await;
}

#[tokio::test]
async fn test_large_file_read_returns_error_text_over_tcp() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("big.txt"), "b".repeat(11 * 1024 * 1024)).expect("write");
    std::fs::write(dir.path().join("small.txt"), "still here").expect("write");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(code_assistant::server::serve(
        listener,
        ToolRouter::new(dir.path().to_path_buf()),
    ));

    let session = ToolClient::new(addr.to_string())
        .connect()
        .await
        .expect("session");

    let output = session
        .call_tool("read_file", json!({"file_path": "big.txt"}))
        .await
        .expect("large output must not break the session");
    assert!(output.starts_with("Error:"), "got {} bytes", output.len());
    assert!(output.contains("too large"));

    let next = session
        .call_tool("read_file", json!({"file_path": "small.txt"}))
        .await
        .expect("call");
    assert_eq!(next, "still here");

    session.close().await;
}
