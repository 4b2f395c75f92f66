//! Host-facing command surface.
//!
//! Every command follows the same path: translate the untyped payloads, report
//! `InvalidArgument` through the callback on failure, otherwise hand the typed
//! request to the dispatcher. The callback fires exactly once per call.

pub mod dispatch;
pub mod encode;
pub mod translate;

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::runtime::Handle;

use crate::{
    config::Config,
    messaging::{
        port::{MessagingClient, ModuleRegistry, MESSAGING_MODULE},
        types::MessagingResult,
    },
};

use dispatch::{Dispatcher, OperationKind};
use encode::{Callback, ErrorDescriptor, Outcome, Responder, KIND_MODULE_REGISTRATION};

pub struct MessagingBridge {
    client: Arc<dyn MessagingClient>,
    registry: Arc<dyn ModuleRegistry>,
    dispatcher: Dispatcher,
    /// Held for the whole registration so overlapping calls wait for its result.
    registered: Mutex<bool>,
}

impl MessagingBridge {
    /// `runtime` is where domain calls run; host calls may come from any thread.
    pub fn new(
        cfg: &Config,
        client: Arc<dyn MessagingClient>,
        registry: Arc<dyn ModuleRegistry>,
        runtime: Handle,
    ) -> Self {
        Self {
            client,
            registry,
            dispatcher: Dispatcher::new(runtime, cfg.cancel_superseded),
            registered: Mutex::new(false),
        }
    }

    /// Register the messaging module with the host SDK, once per bridge.
    pub fn initialize(&self, callback: Callback) {
        let responder = responder(OperationKind::Initialize, callback);

        let mut registered = self.registered.lock().unwrap_or_else(|e| e.into_inner());
        if *registered {
            drop(registered);
            tracing::debug!("messaging module already registered");
            responder.respond(Outcome::Done);
            return;
        }

        match self.registry.add_module(MESSAGING_MODULE) {
            Ok(()) => {
                *registered = true;
                drop(registered);
                tracing::info!(module = MESSAGING_MODULE, "module registered");
                responder.respond(Outcome::Done);
            }
            Err(e) => {
                drop(registered);
                responder.reject(ErrorDescriptor::new(KIND_MODULE_REGISTRATION, e.to_string()));
            }
        }
    }

    pub fn create_conversation(
        &self,
        title: Option<&Value>,
        provider_ids: Option<&Value>,
        initial_message: Option<&Value>,
        callback: Callback,
    ) {
        let kind = OperationKind::CreateConversation;
        let responder = responder(kind, callback);

        let request = translate::optional_message_input(initial_message).and_then(|message| {
            let title = translate::optional_title(title)?;
            let provider_ids = translate::provider_ids(provider_ids)?;
            Ok((title, provider_ids, message))
        });
        let (title, provider_ids, initial_message) = match request {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };

        let client = Arc::clone(&self.client);
        self.dispatcher.dispatch(kind, responder, async move {
            client
                .create_conversation(title, provider_ids, initial_message)
                .await
                .map(|conversation| Some(conversation.id.to_transit()))
        });
    }

    /// Synchronous: the callback has fired when this returns.
    pub fn create_draft_conversation(
        &self,
        title: Option<&Value>,
        provider_ids: Option<&Value>,
        callback: Callback,
    ) {
        let responder = responder(OperationKind::CreateDraftConversation, callback);

        let title = match translate::optional_title(title) {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };
        let provider_ids = match translate::provider_ids(provider_ids) {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };

        let conversation = self.client.create_draft_conversation(title, provider_ids);
        responder.respond(Outcome::Created(conversation.id.to_transit()));
    }

    pub fn send_message(
        &self,
        input: &Value,
        conversation_id: &Value,
        reply_to: Option<&Value>,
        callback: Callback,
    ) {
        let kind = OperationKind::SendMessage;
        let responder = responder(kind, callback);

        let input = match translate::message_input(input) {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };
        let conversation_id = match translate::conversation_id(conversation_id) {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };
        let reply_to = translate::optional_message_id(reply_to);

        let client = Arc::clone(&self.client);
        self.dispatcher.dispatch(kind, responder, async move {
            no_payload(client.send_message(input, reply_to, conversation_id).await)
        });
    }

    pub fn retry_sending_message(
        &self,
        message_id: &Value,
        conversation_id: &Value,
        callback: Callback,
    ) {
        let kind = OperationKind::RetrySendingMessage;
        let responder = responder(kind, callback);

        let ids = translate::conversation_id(conversation_id)
            .and_then(|c| translate::message_id(message_id).map(|m| (m, c)));
        let (message_id, conversation_id) = match ids {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };

        let client = Arc::clone(&self.client);
        self.dispatcher.dispatch(kind, responder, async move {
            no_payload(client.retry_sending_message(message_id, conversation_id).await)
        });
    }

    pub fn delete_message(&self, message_id: &Value, conversation_id: &Value, callback: Callback) {
        let kind = OperationKind::DeleteMessage;
        let responder = responder(kind, callback);

        let ids = translate::conversation_id(conversation_id)
            .and_then(|c| translate::message_id(message_id).map(|m| (m, c)));
        let (message_id, conversation_id) = match ids {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };

        let client = Arc::clone(&self.client);
        self.dispatcher.dispatch(kind, responder, async move {
            no_payload(client.delete_message(message_id, conversation_id).await)
        });
    }

    pub fn mark_conversation_as_seen(&self, conversation_id: &Value, callback: Callback) {
        let kind = OperationKind::MarkConversationAsSeen;
        let responder = responder(kind, callback);

        let conversation_id = match translate::conversation_id(conversation_id) {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };

        let client = Arc::clone(&self.client);
        self.dispatcher.dispatch(kind, responder, async move {
            no_payload(client.mark_conversation_as_seen(conversation_id).await)
        });
    }

    pub fn set_is_typing(&self, is_typing: &Value, conversation_id: &Value, callback: Callback) {
        let kind = OperationKind::SetIsTyping;
        let responder = responder(kind, callback);

        let request = translate::typing_flag(is_typing)
            .and_then(|flag| translate::conversation_id(conversation_id).map(|c| (flag, c)));
        let (is_typing, conversation_id) = match request {
            Ok(v) => v,
            Err(e) => return responder.reject(e),
        };

        let client = Arc::clone(&self.client);
        self.dispatcher.dispatch(kind, responder, async move {
            no_payload(client.set_is_typing(is_typing, conversation_id).await)
        });
    }

    pub fn pending_operation_id(&self, kind: OperationKind) -> Option<u64> {
        self.dispatcher.pending_operation_id(kind)
    }

    pub fn has_pending(&self, kind: OperationKind) -> bool {
        self.dispatcher.has_pending(kind)
    }

    /// Release every tracked operation. Operations still running report
    /// `Cancelled` to their callbacks.
    pub fn shutdown(&self) {
        let running = self.dispatcher.release_all();
        if running > 0 {
            tracing::info!(running, "bridge shutdown cancelled in-flight operations");
        }
    }
}

impl Drop for MessagingBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn no_payload(result: MessagingResult<()>) -> MessagingResult<Option<Value>> {
    result.map(|()| None)
}

fn responder(kind: OperationKind, callback: Callback) -> Responder {
    tracing::debug!(command = kind.command(), "host call");
    Responder::new(kind.command(), callback)
}
