//! Async operation dispatch and per-kind handle slots.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
};

use serde_json::Value;
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    bridge::encode::{ErrorDescriptor, Outcome, Responder},
    messaging::types::MessagingResult,
};

/// Host command kinds. Only the async ones own a handle slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Initialize,
    CreateConversation,
    CreateDraftConversation,
    SendMessage,
    RetrySendingMessage,
    DeleteMessage,
    MarkConversationAsSeen,
    SetIsTyping,
}

impl OperationKind {
    pub const ALL: [OperationKind; 8] = [
        OperationKind::Initialize,
        OperationKind::CreateConversation,
        OperationKind::CreateDraftConversation,
        OperationKind::SendMessage,
        OperationKind::RetrySendingMessage,
        OperationKind::DeleteMessage,
        OperationKind::MarkConversationAsSeen,
        OperationKind::SetIsTyping,
    ];

    /// Host-facing command name.
    pub fn command(self) -> &'static str {
        match self {
            OperationKind::Initialize => "initialize",
            OperationKind::CreateConversation => "createConversation",
            OperationKind::CreateDraftConversation => "createDraftConversation",
            OperationKind::SendMessage => "sendMessage",
            OperationKind::RetrySendingMessage => "retrySendingMessage",
            OperationKind::DeleteMessage => "deleteMessage",
            OperationKind::MarkConversationAsSeen => "markConversationAsSeen",
            OperationKind::SetIsTyping => "setIsTyping",
        }
    }

    pub fn from_command(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.command() == name)
    }

    pub fn is_async(self) -> bool {
        !matches!(
            self,
            OperationKind::Initialize | OperationKind::CreateDraftConversation
        )
    }
}

/// One in-flight domain call.
#[derive(Debug)]
pub struct PendingOperation {
    id: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PendingOperation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Request cancellation; the task still reports through its responder.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Spawns domain calls and remembers the latest handle per kind.
pub struct Dispatcher {
    runtime: Handle,
    cancel_superseded: bool,
    next_id: AtomicU64,
    slots: Mutex<HashMap<OperationKind, PendingOperation>>,
}

impl Dispatcher {
    pub fn new(runtime: Handle, cancel_superseded: bool) -> Self {
        Self {
            runtime,
            cancel_superseded,
            next_id: AtomicU64::new(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Start `work` for `kind` and store its handle, replacing the previous one.
    ///
    /// The replaced operation keeps running unless `cancel_superseded` is set.
    /// Returns the id of the new operation.
    pub fn dispatch<F>(&self, kind: OperationKind, responder: Responder, work: F) -> u64
    where
        F: Future<Output = MessagingResult<Option<Value>>> + Send + 'static,
    {
        debug_assert!(kind.is_async(), "{kind:?} has no handle slot");

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = self.runtime.spawn(async move {
            let command = responder.command();
            let outcome = tokio::select! {
              _ = token.cancelled() => Outcome::Failed(ErrorDescriptor::cancelled(command)),
              result = work => Outcome::from_result(result),
            };
            tracing::debug!(command, operation = id, ?outcome, "operation finished");
            responder.respond(outcome);
        });

        let previous = self
            .lock_slots()
            .insert(kind, PendingOperation { id, cancel, handle });

        tracing::debug!(command = kind.command(), operation = id, "dispatched");
        if let Some(previous) = previous {
            if self.cancel_superseded && !previous.is_finished() {
                tracing::warn!(
                    command = kind.command(),
                    operation = previous.id(),
                    "cancelling superseded operation"
                );
                previous.cancel();
            }
        }

        id
    }

    pub fn pending_operation_id(&self, kind: OperationKind) -> Option<u64> {
        self.lock_slots().get(&kind).map(PendingOperation::id)
    }

    pub fn has_pending(&self, kind: OperationKind) -> bool {
        self.lock_slots().contains_key(&kind)
    }

    /// Cancel and forget every tracked operation. Returns how many were still running.
    pub fn release_all(&self) -> usize {
        let drained: Vec<PendingOperation> = self.lock_slots().drain().map(|(_, op)| op).collect();
        let mut running = 0usize;
        for op in drained {
            if !op.is_finished() {
                running += 1;
            }
            op.cancel();
        }
        running
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<OperationKind, PendingOperation>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bridge::encode::Callback, messaging::types::MessagingError};
    use tokio::sync::mpsc;

    fn responder(kind: OperationKind) -> (Responder, mpsc::UnboundedReceiver<Vec<Value>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cb: Callback = Box::new(move |args| {
            let _ = tx.send(args);
        });
        (Responder::new(kind.command(), cb), rx)
    }

    #[test]
    fn command_names_round_trip() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_command(kind.command()), Some(kind));
        }
        assert_eq!(OperationKind::from_command("nope"), None);
        assert!(!OperationKind::CreateDraftConversation.is_async());
        assert!(OperationKind::SetIsTyping.is_async());
    }

    #[tokio::test]
    async fn forwards_domain_result_and_keeps_slot() {
        let dispatcher = Dispatcher::new(Handle::current(), false);
        let (r, mut rx) = responder(OperationKind::DeleteMessage);

        let id = dispatcher.dispatch(OperationKind::DeleteMessage, r, async {
            Err(MessagingError::new("NotFound", "gone"))
        });

        let args = rx.recv().await.unwrap();
        assert_eq!(args, vec![serde_json::json!({ "kind": "NotFound", "message": "gone" })]);
        assert_eq!(dispatcher.pending_operation_id(OperationKind::DeleteMessage), Some(id));
    }

    #[tokio::test]
    async fn redispatch_overwrites_without_cancelling() {
        let dispatcher = Dispatcher::new(Handle::current(), false);
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();

        let (r1, mut rx1) = responder(OperationKind::SetIsTyping);
        let first = dispatcher.dispatch(OperationKind::SetIsTyping, r1, async move {
            let _ = gate_rx.await;
            Ok(None)
        });
        let (r2, mut rx2) = responder(OperationKind::SetIsTyping);
        let second = dispatcher.dispatch(OperationKind::SetIsTyping, r2, async { Ok(None) });

        assert_ne!(first, second);
        assert_eq!(dispatcher.pending_operation_id(OperationKind::SetIsTyping), Some(second));
        assert_eq!(rx2.recv().await.unwrap(), vec![Value::Null]);

        // The superseded call still completes normally.
        gate_tx.send(()).unwrap();
        assert_eq!(rx1.recv().await.unwrap(), vec![Value::Null]);
    }

    #[tokio::test]
    async fn opt_in_policy_cancels_superseded() {
        let dispatcher = Dispatcher::new(Handle::current(), true);

        let (r1, mut rx1) = responder(OperationKind::SendMessage);
        dispatcher.dispatch(OperationKind::SendMessage, r1, std::future::pending());
        let (r2, mut rx2) = responder(OperationKind::SendMessage);
        dispatcher.dispatch(OperationKind::SendMessage, r2, async { Ok(None) });

        assert_eq!(rx1.recv().await.unwrap()[0]["kind"], "Cancelled");
        assert_eq!(rx2.recv().await.unwrap(), vec![Value::Null]);
    }

    #[tokio::test]
    async fn release_all_cancels_running_operations_once() {
        let dispatcher = Dispatcher::new(Handle::current(), false);
        let (r, mut rx) = responder(OperationKind::MarkConversationAsSeen);
        dispatcher.dispatch(
            OperationKind::MarkConversationAsSeen,
            r,
            std::future::pending(),
        );

        assert_eq!(dispatcher.release_all(), 1);
        assert!(!dispatcher.has_pending(OperationKind::MarkConversationAsSeen));

        let args = rx.recv().await.unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0]["kind"], "Cancelled");
        // Sender dropped with the finished task: no second invocation.
        assert!(rx.recv().await.is_none());
    }
}
