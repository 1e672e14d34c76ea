use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::context::ConversationLog;

/// In-memory conversation of one user. `hydrated` is false until the
/// persisted transcript has been read into `log`.
#[derive(Debug, Default)]
pub struct Session {
    pub log: ConversationLog,
    pub hydrated: bool,
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// Identifier → session map. Holding a session's mutex serializes every
/// request of that user; different users never contend.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn handle(&self, user_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(user_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(Session::default())))
            .clone()
    }

    /// Replaces the user's log, marking it hydrated.
    pub async fn replace(&self, user_id: &str, log: ConversationLog) {
        let handle = self.handle(user_id).await;
        let mut session = handle.lock().await;
        session.log = log;
        session.hydrated = true;
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Turn;

    #[tokio::test]
    async fn handle_returns_same_session_for_same_user() {
        let store = SessionStore::new();

        let first = store.handle("happy-otter-204").await;
        let second = store.handle("happy-otter-204").await;
        let other = store.handle("brave-fox-512").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn replace_marks_session_hydrated() {
        let store = SessionStore::new();
        assert!(!store.handle("calm-owl-101").await.lock().await.hydrated);

        store
            .replace(
                "calm-owl-101",
                ConversationLog::from_turns(vec![Turn::user("hi")]),
            )
            .await;

        let handle = store.handle("calm-owl-101").await;
        let session = handle.lock().await;
        assert!(session.hydrated);
        assert_eq!(session.log.len(), 1);
    }
}
