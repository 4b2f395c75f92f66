//! Domain result → host callback arguments.
//!
//! Host convention (positional):
//! - `[null, payload]` success with a payload
//! - `[null]`          success without payload
//! - `[error]`         failure, `error = {"kind", "message"}`

use serde_json::Value;

use crate::{errors::Error, messaging::types::MessagingError};

pub const KIND_INVALID_ARGUMENT: &str = "InvalidArgument";
pub const KIND_CANCELLED: &str = "Cancelled";
pub const KIND_MODULE_REGISTRATION: &str = "ModuleRegistration";
pub const KIND_INTERNAL: &str = "InternalError";

/// Single-shot host callback.
pub type Callback = Box<dyn FnOnce(Vec<Value>) + Send + 'static>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorDescriptor {
    pub kind: String,
    pub message: String,
}

impl ErrorDescriptor {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(command: &str) -> Self {
        Self::new(KIND_CANCELLED, format!("{command} was cancelled"))
    }

    fn to_value(&self) -> Value {
        serde_json::json!({ "kind": self.kind, "message": self.message })
    }
}

impl From<MessagingError> for ErrorDescriptor {
    fn from(e: MessagingError) -> Self {
        Self {
            kind: e.kind,
            message: e.message,
        }
    }
}

impl From<Error> for ErrorDescriptor {
    fn from(e: Error) -> Self {
        match e {
            Error::InvalidArgument(message) => Self::new(KIND_INVALID_ARGUMENT, message),
            other => Self::new(KIND_INTERNAL, other.to_string()),
        }
    }
}

/// Terminal state of one host call.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Done,
    Created(Value),
    Failed(ErrorDescriptor),
}

impl Outcome {
    /// Forward a domain result; a success payload, when present, is already in
    /// transit form.
    pub fn from_result(result: Result<Option<Value>, MessagingError>) -> Self {
        match result {
            Ok(None) => Outcome::Done,
            Ok(Some(payload)) => Outcome::Created(payload),
            Err(e) => Outcome::Failed(e.into()),
        }
    }

    pub fn into_args(self) -> Vec<Value> {
        match self {
            Outcome::Done => vec![Value::Null],
            Outcome::Created(payload) => vec![Value::Null, payload],
            Outcome::Failed(err) => vec![err.to_value()],
        }
    }
}

/// Owns the host callback for one call and fires it exactly once.
///
/// `respond` consumes the responder. A responder dropped without responding
/// (task aborted, runtime gone) reports `Cancelled` from `Drop`.
pub struct Responder {
    command: &'static str,
    callback: Option<Callback>,
}

impl Responder {
    pub fn new(command: &'static str, callback: Callback) -> Self {
        Self {
            command,
            callback: Some(callback),
        }
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn respond(mut self, outcome: Outcome) {
        self.fire(outcome);
    }

    /// Report a translation or bridge-side failure.
    pub fn reject(self, err: impl Into<ErrorDescriptor>) {
        let err = err.into();
        tracing::debug!(command = self.command, kind = %err.kind, "rejecting call: {}", err.message);
        self.respond(Outcome::Failed(err));
    }

    fn fire(&mut self, outcome: Outcome) {
        let Some(callback) = self.callback.take() else {
            return;
        };
        callback(outcome.into_args());
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.callback.is_some() {
            tracing::warn!(command = self.command, "responder dropped before completion");
            let outcome = Outcome::Failed(ErrorDescriptor::cancelled(self.command));
            self.fire(outcome);
        }
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("command", &self.command)
            .field("pending", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recording() -> (Callback, Arc<Mutex<Vec<Vec<Value>>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        let cb: Callback = Box::new(move |args| sink.lock().unwrap().push(args));
        (cb, calls)
    }

    #[test]
    fn encodes_positional_arguments() {
        assert_eq!(Outcome::Done.into_args(), vec![Value::Null]);
        assert_eq!(
            Outcome::Created(json!({ "localId": "x" })).into_args(),
            vec![Value::Null, json!({ "localId": "x" })]
        );
        let failed = Outcome::from_result(Err(MessagingError::new("Conflict", "busy")));
        assert_eq!(
            failed.into_args(),
            vec![json!({ "kind": "Conflict", "message": "busy" })]
        );
    }

    #[test]
    fn translation_errors_become_invalid_argument() {
        let desc: ErrorDescriptor = Error::invalid("Bad conversationId `{}`").into();
        assert_eq!(desc.kind, KIND_INVALID_ARGUMENT);
        assert_eq!(desc.message, "Bad conversationId `{}`");

        let desc: ErrorDescriptor = Error::External("boom".into()).into();
        assert_eq!(desc.kind, KIND_INTERNAL);
    }

    #[test]
    fn responder_fires_once() {
        let (cb, calls) = recording();
        Responder::new("sendMessage", cb).respond(Outcome::Done);
        assert_eq!(calls.lock().unwrap().as_slice(), &[vec![Value::Null]]);
    }

    #[test]
    fn dropped_responder_reports_cancelled() {
        let (cb, calls) = recording();
        drop(Responder::new("setIsTyping", cb));
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0]["kind"], KIND_CANCELLED);
        assert!(calls[0][0]["message"]
            .as_str()
            .unwrap()
            .contains("setIsTyping"));
    }
}
