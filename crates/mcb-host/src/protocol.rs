//! Newline-delimited JSON framing between the host process and the bridge.
//!
//! Request:  `{"id": <any>, "method": "sendMessage", "args": [ ... ]}`
//! Response: `{"id": <same>, "args": [ ... callback args ... ]}`

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::{mpsc, Notify},
};

use mcb_core::bridge::{dispatch::OperationKind, encode::Callback, MessagingBridge};

pub const KIND_METHOD_NOT_FOUND: &str = "MethodNotFound";

static NULL: Value = Value::Null;

#[derive(Debug, Deserialize)]
pub struct HostRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HostResponse {
    pub id: Value,
    pub args: Vec<Value>,
}

/// Route one request to the bridge. Positional args follow the command's
/// host signature; a missing required arg is passed as `null` and rejected by
/// the bridge.
pub fn invoke(bridge: &MessagingBridge, method: &str, args: &[Value], callback: Callback) {
    let Some(kind) = OperationKind::from_command(method) else {
        tracing::warn!(method, "unknown method");
        callback(vec![json!({
            "kind": KIND_METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}"),
        })]);
        return;
    };

    match kind {
        OperationKind::Initialize => bridge.initialize(callback),
        OperationKind::CreateConversation => bridge.create_conversation(
            optional(args, 0),
            optional(args, 1),
            optional(args, 2),
            callback,
        ),
        OperationKind::CreateDraftConversation => {
            bridge.create_draft_conversation(optional(args, 0), optional(args, 1), callback)
        }
        OperationKind::SendMessage => bridge.send_message(
            required(args, 0),
            required(args, 1),
            optional(args, 2),
            callback,
        ),
        OperationKind::RetrySendingMessage => {
            bridge.retry_sending_message(required(args, 0), required(args, 1), callback)
        }
        OperationKind::DeleteMessage => {
            bridge.delete_message(required(args, 0), required(args, 1), callback)
        }
        OperationKind::MarkConversationAsSeen => {
            bridge.mark_conversation_as_seen(required(args, 0), callback)
        }
        OperationKind::SetIsTyping => {
            bridge.set_is_typing(required(args, 0), required(args, 1), callback)
        }
    }
}

/// Feed request lines from `reader` to the bridge until EOF.
///
/// Lines that are not a JSON request (including invalid UTF-8) are logged and
/// skipped. Only an I/O error ends the loop early.
pub async fn serve<R>(
    mut reader: R,
    bridge: &MessagingBridge,
    outstanding: &Arc<Outstanding>,
    tx: &mpsc::UnboundedSender<HostResponse>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        if buf.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let req = match serde_json::from_slice::<HostRequest>(&buf) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("skipping unparsable request: {e}");
                continue;
            }
        };

        let callback = outstanding.track(req.id.clone(), tx.clone());
        invoke(bridge, &req.method, &req.args, callback);
    }
}

fn optional(args: &[Value], index: usize) -> Option<&Value> {
    args.get(index)
}

fn required(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

/// Counts requests whose callback has not fired yet.
#[derive(Default)]
pub struct Outstanding {
    count: AtomicUsize,
    idle: Notify,
}

impl Outstanding {
    /// Build the callback for request `id`; firing it queues the response line.
    pub fn track(
        self: &Arc<Self>,
        id: Value,
        tx: mpsc::UnboundedSender<HostResponse>,
    ) -> Callback {
        self.count.fetch_add(1, Ordering::SeqCst);
        let this = Arc::clone(self);
        Box::new(move |args| {
            if tx.send(HostResponse { id, args }).is_err() {
                tracing::warn!("response writer gone");
            }
            if this.count.fetch_sub(1, Ordering::SeqCst) == 1 {
                this.idle.notify_waiters();
            }
        })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Resolves once every tracked callback has fired.
    pub async fn drained(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}
