//! In-process messaging engine used by the stdio host.
//!
//! Acknowledges every operation after a fixed latency and mints fresh ids.
//! Nothing is persisted.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mcb_core::{
    domain::{Conversation, ConversationId, Identifier, MessageId, ProviderId},
    messaging::{
        port::{MessagingClient, ModuleRegistry},
        types::{MessageInput, MessagingResult},
    },
};

pub struct LoopbackClient {
    latency: Duration,
    acknowledged: AtomicUsize,
}

impl LoopbackClient {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            acknowledged: AtomicUsize::new(0),
        }
    }

    /// Number of async operations completed so far.
    pub fn acknowledged(&self) -> usize {
        self.acknowledged.load(Ordering::SeqCst)
    }

    async fn ack(&self, op: &str) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.acknowledged.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(op, "loopback ack");
    }
}

#[async_trait]
impl MessagingClient for LoopbackClient {
    async fn create_conversation(
        &self,
        title: Option<String>,
        provider_ids: Option<Vec<ProviderId>>,
        initial_message: Option<MessageInput>,
    ) -> MessagingResult<Conversation> {
        self.ack("createConversation").await;
        if initial_message.is_some() {
            self.ack("sendMessage").await;
        }
        Ok(Conversation {
            id: ConversationId(Identifier::Remote {
                remote_id: Uuid::new_v4(),
                local_id: Some(Uuid::new_v4()),
            }),
            title,
            provider_ids: provider_ids.unwrap_or_default(),
            created_at: Utc::now(),
        })
    }

    fn create_draft_conversation(
        &self,
        title: Option<String>,
        provider_ids: Option<Vec<ProviderId>>,
    ) -> Conversation {
        Conversation {
            id: ConversationId(Identifier::new_local()),
            title,
            provider_ids: provider_ids.unwrap_or_default(),
            created_at: Utc::now(),
        }
    }

    async fn send_message(
        &self,
        _input: MessageInput,
        _reply_to: Option<MessageId>,
        _conversation_id: ConversationId,
    ) -> MessagingResult<()> {
        self.ack("sendMessage").await;
        Ok(())
    }

    async fn retry_sending_message(
        &self,
        _message_id: MessageId,
        _conversation_id: ConversationId,
    ) -> MessagingResult<()> {
        self.ack("retrySendingMessage").await;
        Ok(())
    }

    async fn delete_message(
        &self,
        _message_id: MessageId,
        _conversation_id: ConversationId,
    ) -> MessagingResult<()> {
        self.ack("deleteMessage").await;
        Ok(())
    }

    async fn mark_conversation_as_seen(
        &self,
        _conversation_id: ConversationId,
    ) -> MessagingResult<()> {
        self.ack("markConversationAsSeen").await;
        Ok(())
    }

    async fn set_is_typing(
        &self,
        _is_typing: bool,
        _conversation_id: ConversationId,
    ) -> MessagingResult<()> {
        self.ack("setIsTyping").await;
        Ok(())
    }
}

/// Records registered module names.
#[derive(Default)]
pub struct LoopbackRegistry {
    modules: Mutex<Vec<String>>,
}

impl LoopbackRegistry {
    pub fn modules(&self) -> Vec<String> {
        self.modules
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ModuleRegistry for LoopbackRegistry {
    fn add_module(&self, name: &str) -> mcb_core::Result<()> {
        let mut modules = self.modules.lock().unwrap_or_else(|e| e.into_inner());
        if !modules.iter().any(|m| m == name) {
            modules.push(name.to_string());
        }
        Ok(())
    }
}
