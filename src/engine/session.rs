// Session isolation for AI conversations
//
// A session belongs to exactly one user, and any lookup from a different
// user is a `PermissionDenied`, not a `NotFound` - so the caller can't use
// the error variant to probe for the existence of someone else's session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::{ConversationId, SessionId, UserId};
use crate::{EngineError, Result};

const SESSION_TTL_HOURS: i64 = 24;
const MAX_SESSIONS_PER_USER: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub conversation_id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.last_accessed_at > Duration::hours(SESSION_TTL_HOURS)
    }
}

/// Isolates AI conversation sessions by owning user. Backed by an
/// in-process map here; a production deployment would back this with the
/// same shared KV store the distributed rate limiter uses.
pub struct SessionIsolator {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl SessionIsolator {
    pub fn new() -> Self {
        SessionIsolator { sessions: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn create_session(&self, user_id: UserId, conversation_id: ConversationId) -> Result<Session> {
        let mut sessions = self.sessions.write().await;

        let mut owned: Vec<(SessionId, DateTime<Utc>)> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .map(|s| (s.id.clone(), s.created_at))
            .collect();

        if owned.len() >= MAX_SESSIONS_PER_USER {
            owned.sort_by_key(|(_, created_at)| *created_at);
            if let Some((oldest_id, _)) = owned.first() {
                sessions.remove(oldest_id);
            }
        }

        let now = Utc::now();
        let session = Session {
            id: SessionId::from(uuid::Uuid::new_v4().to_string()),
            user_id,
            conversation_id,
            created_at: now,
            last_accessed_at: now,
        };
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// Validates that `user_id` owns `session_id`, renewing its TTL on
    /// success. Cross-user access and expiry both deny, the former because
    /// it genuinely isn't this user's session, the latter because an
    /// expired session is treated the same as one that never existed for
    /// this user's purposes.
    pub async fn validate_access(&self, user_id: &UserId, session_id: &SessionId) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| EngineError::NotFound(format!("session {}", session_id)))?;

        if &session.user_id != user_id {
            return Err(EngineError::PermissionDenied(format!(
                "session {} does not belong to user {}",
                session_id, user_id
            )));
        }

        let now = Utc::now();
        if session.is_expired(now) {
            let expired_id = session.id.clone();
            sessions.remove(&expired_id);
            return Err(EngineError::NotFound(format!("session {} has expired", expired_id)));
        }

        session.last_accessed_at = now;
        Ok(session.clone())
    }

    pub async fn terminate_session(&self, session_id: &SessionId) -> Result<()> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    pub async fn terminate_all_sessions(&self, user_id: &UserId) -> Result<()> {
        self.sessions.write().await.retain(|_, s| &s.user_id != user_id);
        Ok(())
    }
}

impl Default for SessionIsolator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cross_user_access_is_denied() {
        let isolator = SessionIsolator::new();
        let session = isolator.create_session(UserId::from("u1"), ConversationId::from("c1")).await.unwrap();
        let result = isolator.validate_access(&UserId::from("u2"), &session.id).await;
        assert!(matches!(result, Err(EngineError::PermissionDenied(_))));
    }

    #[tokio::test]
    async fn owner_access_renews_last_accessed_at() {
        let isolator = SessionIsolator::new();
        let session = isolator.create_session(UserId::from("u1"), ConversationId::from("c1")).await.unwrap();
        let first_access = session.last_accessed_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let revalidated = isolator.validate_access(&UserId::from("u1"), &session.id).await.unwrap();
        assert!(revalidated.last_accessed_at >= first_access);
    }

    #[tokio::test]
    async fn exceeding_session_cap_evicts_the_oldest() {
        let isolator = SessionIsolator::new();
        let user = UserId::from("u1");
        let mut first_session_id = None;
        for i in 0..(MAX_SESSIONS_PER_USER + 1) {
            let session = isolator.create_session(user.clone(), ConversationId::from(format!("c{}", i))).await.unwrap();
            if i == 0 {
                first_session_id = Some(session.id.clone());
            }
        }
        let result = isolator.validate_access(&user, &first_session_id.unwrap()).await;
        assert!(result.is_err());
    }
}
