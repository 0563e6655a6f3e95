//! In-memory session store standing in for the authentication subsystem.
//!
//! The event pipeline only needs to know whether a session is still valid;
//! this store answers that and nothing else.
use async_trait::async_trait;
use dashmap::DashMap;
use log::*;
use sse::{AuthChecker, SessionId};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct SessionRecord {
    created_at: Instant,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, SessionRecord>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new authenticated session and return its id.
    pub fn create(&self) -> SessionId {
        let session_id = SessionId::new(uuid::Uuid::new_v4().to_string());
        self.sessions.insert(
            session_id.clone(),
            SessionRecord {
                created_at: Instant::now(),
            },
        );
        info!("Created session {session_id}");
        session_id
    }

    pub fn is_valid(&self, session_id: &SessionId) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Log a session out. Returns `false` if it was not valid.
    pub fn invalidate(&self, session_id: &SessionId) -> bool {
        match self.sessions.remove(session_id) {
            Some((_, record)) => {
                info!(
                    "Invalidated session {session_id} after {:?}",
                    record.created_at.elapsed()
                );
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl AuthChecker for SessionStore {
    async fn is_authenticated(&self, session_id: &SessionId) -> bool {
        let valid = self.is_valid(session_id);
        trace!("Auth check for session {session_id}: {valid}");
        valid
    }
}
