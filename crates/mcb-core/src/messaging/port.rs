use async_trait::async_trait;

use crate::{
    domain::{Conversation, ConversationId, MessageId, ProviderId},
    messaging::types::{MessageInput, MessagingResult},
    Result,
};

/// Name under which the messaging module is registered with the host SDK.
pub const MESSAGING_MODULE: &str = "messaging";

/// Port for the external messaging engine.
///
/// The engine owns persistence, transport and retry policy. Every async method
/// may be dropped mid-flight when the bridge cancels the operation.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn create_conversation(
        &self,
        title: Option<String>,
        provider_ids: Option<Vec<ProviderId>>,
        initial_message: Option<MessageInput>,
    ) -> MessagingResult<Conversation>;

    /// Creates a local draft; no I/O, returns immediately.
    fn create_draft_conversation(
        &self,
        title: Option<String>,
        provider_ids: Option<Vec<ProviderId>>,
    ) -> Conversation;

    async fn send_message(
        &self,
        input: MessageInput,
        reply_to: Option<MessageId>,
        conversation_id: ConversationId,
    ) -> MessagingResult<()>;

    async fn retry_sending_message(
        &self,
        message_id: MessageId,
        conversation_id: ConversationId,
    ) -> MessagingResult<()>;

    async fn delete_message(
        &self,
        message_id: MessageId,
        conversation_id: ConversationId,
    ) -> MessagingResult<()>;

    async fn mark_conversation_as_seen(&self, conversation_id: ConversationId)
        -> MessagingResult<()>;

    async fn set_is_typing(
        &self,
        is_typing: bool,
        conversation_id: ConversationId,
    ) -> MessagingResult<()>;
}

/// Host SDK module registry, touched once by `initialize`.
pub trait ModuleRegistry: Send + Sync {
    fn add_module(&self, name: &str) -> Result<()>;
}
