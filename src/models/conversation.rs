// Conversation records for the AI flow builder
//
// `summary` and `message_count` are separate fields from the message list
// itself, so summarising a conversation can replace what a prompt sees
// without growing (or shrinking) the persisted message history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ConversationId, FlowId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub user_id: UserId,
    pub flow_id: FlowId,
    pub messages: Vec<ConversationMessage>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, user_id: UserId, flow_id: FlowId) -> Self {
        let now = Utc::now();
        Conversation {
            id,
            user_id,
            flow_id,
            messages: vec![],
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(ConversationMessage {
            role,
            content: content.into(),
            created_at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushing_a_message_updates_count_and_timestamp() {
        let mut convo = Conversation::new(ConversationId::from("c1"), UserId::from("u1"), FlowId::from("f1"));
        convo.push(MessageRole::User, "hello");
        assert_eq!(convo.message_count(), 1);
        assert_eq!(convo.messages[0].content, "hello");
    }
}
