// Conversation summariser
//
// When a conversation's message list grows past the configured threshold,
// everything but the last `recent_to_keep` messages is compressed into a
// short system-message summary via an LLM call, then dropped. The actual
// LLM call is behind a small trait so this stays testable without a live
// `LLMRouter`.

use async_trait::async_trait;

use crate::models::{Conversation, ConversationConfig, MessageRole};
use crate::Result;

const SUMMARY_SYSTEM_PROMPT: &str = "Summarise this conversation in under 200 characters. \
Keep topics, decisions, action items, and key technical details.";

#[async_trait]
pub trait Summariser: Send + Sync {
    async fn summarise(&self, transcript: &str) -> Result<String>;
}

pub struct ConversationSummarizer {
    summariser: std::sync::Arc<dyn Summariser>,
    config: ConversationConfig,
}

impl ConversationSummarizer {
    pub fn new(summariser: std::sync::Arc<dyn Summariser>, config: ConversationConfig) -> Self {
        ConversationSummarizer { summariser, config }
    }

    /// Summarises and trims `conversation` in place if it has grown past
    /// the configured threshold. No-op otherwise.
    pub async fn maybe_summarise(&self, conversation: &mut Conversation) -> Result<()> {
        if conversation.message_count() <= self.config.max_context_messages {
            return Ok(());
        }

        let cutoff = conversation.messages.len().saturating_sub(self.config.recent_to_keep);
        let to_summarise = &conversation.messages[..cutoff];
        let transcript = to_summarise
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let summary = self.summariser.summarise(&transcript).await?;
        let truncated: String = summary.chars().take(200).collect();

        conversation.messages.drain(..cutoff);
        conversation.summary = Some(truncated);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationId, FlowId, UserId};

    struct FixedSummariser(String);

    #[async_trait]
    impl Summariser for FixedSummariser {
        async fn summarise(&self, _transcript: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn summarises_and_trims_once_past_the_threshold() {
        let config = ConversationConfig { max_context_messages: 5, recent_to_keep: 2 };
        let summarizer = ConversationSummarizer::new(
            std::sync::Arc::new(FixedSummariser("discussed http trigger setup".to_string())),
            config,
        );
        let mut convo = Conversation::new(ConversationId::from("c1"), UserId::from("u1"), FlowId::from("f1"));
        for i in 0..6 {
            convo.push(MessageRole::User, format!("message {}", i));
        }

        summarizer.maybe_summarise(&mut convo).await.unwrap();

        assert_eq!(convo.message_count(), 2); // only the last `recent_to_keep` messages remain
        assert!(convo.summary.is_some());
    }

    #[tokio::test]
    async fn leaves_short_conversations_untouched() {
        let config = ConversationConfig { max_context_messages: 20, recent_to_keep: 10 };
        let summarizer = ConversationSummarizer::new(std::sync::Arc::new(FixedSummariser(String::new())), config);
        let mut convo = Conversation::new(ConversationId::from("c1"), UserId::from("u1"), FlowId::from("f1"));
        convo.push(MessageRole::User, "hi");

        summarizer.maybe_summarise(&mut convo).await.unwrap();
        assert_eq!(convo.message_count(), 1);
        assert!(convo.summary.is_none());
    }
}
