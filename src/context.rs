//! Process-wide working-directory hint injected into prompts.
//!
//! One cell is shared (via `Arc`) by every request. Writes replace the value
//! wholesale and the last writer wins. A `/generate` request reads the value
//! once when it starts, so it may observe a path set by an unrelated,
//! concurrent `/set_working_directory` call. That is accepted for a
//! single-operator tool; callers needing isolation should pass their own
//! cell per session.

use std::sync::{PoisonError, RwLock};

/// Settable, thread-safe holder for the working-directory path.
///
/// The path is not validated here; existence is only checked when a prompt
/// is composed.
#[derive(Debug, Default)]
pub struct WorkingDirectory {
    path: RwLock<Option<String>>,
}

impl WorkingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current path.
    pub fn set(&self, path: impl Into<String>) {
        let mut guard = self.path.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(path.into());
    }

    /// Snapshot of the current path.
    pub fn get(&self) -> Option<String> {
        self.path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_unset_by_default() {
        assert_eq!(WorkingDirectory::new().get(), None);
    }

    #[test]
    fn test_last_writer_wins() {
        let wd = WorkingDirectory::new();
        wd.set("/a");
        wd.set("/b");
        assert_eq!(wd.get().as_deref(), Some("/b"));
    }

    #[test]
    fn test_concurrent_writers_leave_one_complete_value() {
        let wd = Arc::new(WorkingDirectory::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let wd = Arc::clone(&wd);
                std::thread::spawn(move || wd.set(format!("/path/{i}")))
            })
            .collect();
        for handle in handles {
            handle.join().expect("join");
        }

        let value = wd.get().expect("set");
        assert!(value.starts_with("/path/"));
        let idx: usize = value["/path/".len()..].parse().expect("index");
        assert!(idx < 8);
    }
}
