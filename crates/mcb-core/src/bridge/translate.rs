//! Host payload → domain value translation.
//!
//! Every function is pure and all-or-nothing: it yields a validated value or an
//! [`Error::InvalidArgument`]. The one lenient case is the provider id list, whose
//! malformed entries are dropped instead of failing the call.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    domain::{ConversationId, Identifier, MessageId, ProviderId},
    errors::Error,
    messaging::types::{MediaInput, MediaKind, MessageInput},
    Result,
};

type Object = Map<String, Value>;

/// Shape parser outcome: `None` when the shape does not apply at all,
/// `Some(Err)` when it applies but a field is malformed.
type Shape<T> = Option<Result<T>>;

pub fn conversation_id(value: &Value) -> Result<ConversationId> {
    identifier(value)
        .map(ConversationId)
        .map_err(|e| Error::invalid(format!("Bad conversationId `{value}` ({})", detail(e))))
}

pub fn message_id(value: &Value) -> Result<MessageId> {
    identifier(value)
        .map(MessageId)
        .map_err(|e| Error::invalid(format!("Bad messageId `{value}` ({})", detail(e))))
}

/// Reply target of `sendMessage`. Absent or malformed ids mean "no reply".
pub fn optional_message_id(value: Option<&Value>) -> Option<MessageId> {
    let value = present(value)?;
    match message_id(value) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!("ignoring reply target: {e}");
            None
        }
    }
}

pub fn message_input(value: &Value) -> Result<MessageInput> {
    value
        .as_object()
        .and_then(|obj| text_shape(obj).or_else(|| media_shape(obj)))
        .unwrap_or_else(|| Err(Error::invalid("no known message type")))
        .map_err(|e| {
            Error::invalid(format!(
                "Unable to parse message input `{value}` ({})",
                detail(e)
            ))
        })
}

pub fn optional_message_input(value: Option<&Value>) -> Result<Option<MessageInput>> {
    let Some(value) = present(value) else {
        return Ok(None);
    };
    message_input(value).map(Some).map_err(|e| {
        Error::invalid(format!("Unable to parse initial message input: {}", detail(e)))
    })
}

/// Best-effort provider id list.
pub fn provider_ids(value: Option<&Value>) -> Result<Option<Vec<ProviderId>>> {
    let Some(value) = present(value) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| Error::invalid(format!("Bad providerIds `{value}`: expected a list")))?;

    let mut out: Vec<ProviderId> = Vec::with_capacity(items.len());
    for item in items {
        let parsed = item.as_str().and_then(|s| Uuid::parse_str(s).ok());
        match parsed {
            Some(id) if !out.contains(&ProviderId(id)) => out.push(ProviderId(id)),
            Some(_) => {}
            None => tracing::warn!("dropping unparsable provider id {item}"),
        }
    }
    Ok(Some(out))
}

pub fn optional_title(value: Option<&Value>) -> Result<Option<String>> {
    let Some(value) = present(value) else {
        return Ok(None);
    };
    value
        .as_str()
        .map(|s| Some(s.to_string()))
        .ok_or_else(|| Error::invalid(format!("Bad title `{value}`: expected a string")))
}

pub fn typing_flag(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::invalid(format!("Bad isTyping `{value}`: expected a boolean")))
}

// ============== Identifier shapes ==============

fn identifier(value: &Value) -> Result<Identifier> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::invalid("identifier must be a map"))?;

    remote_shape(obj)
        .or_else(|| local_shape(obj))
        .unwrap_or_else(|| Err(Error::invalid("identifier has neither remoteId nor localId")))
}

fn remote_shape(obj: &Object) -> Shape<Identifier> {
    let remote_id = uuid_field(obj, "remoteId")?;
    Some(remote_id.and_then(|remote_id| {
        let local_id = uuid_field(obj, "localId").transpose()?;
        Ok(Identifier::Remote {
            remote_id,
            local_id,
        })
    }))
}

fn local_shape(obj: &Object) -> Shape<Identifier> {
    let local_id = uuid_field(obj, "localId")?;
    Some(local_id.map(|local_id| Identifier::Local { local_id }))
}

/// `None` when the key is absent or null.
fn uuid_field(obj: &Object, key: &str) -> Shape<Uuid> {
    let value = present(obj.get(key))?;
    Some(
        value
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| Error::invalid(format!("{key} is not a UUID string"))),
    )
}

// ============== Message input shapes ==============

fn text_shape(obj: &Object) -> Shape<MessageInput> {
    if type_tag(obj)? != "text" {
        return None;
    }
    let text = obj.get("text").and_then(Value::as_str);
    Some(match text {
        Some(t) if !t.trim().is_empty() => Ok(MessageInput::Text {
            text: t.to_string(),
        }),
        _ => Err(Error::invalid("text message needs a non-blank `text`")),
    })
}

fn media_shape(obj: &Object) -> Shape<MessageInput> {
    let kind = MediaKind::from_tag(type_tag(obj)?)?;
    Some(media_fields(kind, obj).map(MessageInput::Media))
}

fn media_fields(kind: MediaKind, obj: &Object) -> Result<MediaInput> {
    let tag = kind.as_tag();

    let uri = required_str(obj, "uri")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::invalid(format!("{tag} message needs a `uri`")))?;

    let mime_type = required_str(obj, "mimeType")
        .filter(|m| mime_pattern().is_match(m))
        .ok_or_else(|| Error::invalid(format!("{tag} message needs a valid `mimeType`")))?;
    if let Some(top) = kind.mime_top_level() {
        if mime_type.split('/').next() != Some(top) {
            return Err(Error::invalid(format!(
                "{tag} message cannot carry `{mime_type}`"
            )));
        }
    }

    let file_name = match present(obj.get("fileName")) {
        None => None,
        Some(v) => Some(
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| Error::invalid("`fileName` must be a string"))?,
        ),
    };

    let duration_ms = match (kind, present(obj.get("durationMs"))) {
        (MediaKind::Audio, Some(v)) => Some(
            v.as_u64()
                .ok_or_else(|| Error::invalid("`durationMs` must be a non-negative integer"))?,
        ),
        _ => None,
    };

    Ok(MediaInput {
        kind,
        uri: uri.to_string(),
        mime_type: mime_type.to_string(),
        file_name,
        duration_ms,
    })
}

fn type_tag(obj: &Object) -> Option<&str> {
    obj.get("type").and_then(Value::as_str)
}

fn required_str<'a>(obj: &'a Object, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str)
}

fn mime_pattern() -> &'static Regex {
    static MIME: OnceLock<Regex> = OnceLock::new();
    MIME.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*/[A-Za-z0-9][A-Za-z0-9!#$&^_.+-]*$")
            .expect("valid regex")
    })
}

fn detail(e: Error) -> String {
    match e {
        Error::InvalidArgument(msg) => msg,
        other => other.to_string(),
    }
}

/// Host null and absence mean the same thing for optional fields.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const A: &str = "6f2c8b9e-1d3a-4c5b-8e7f-0a1b2c3d4e5f";
    const B: &str = "0d9e8f7a-6b5c-4d3e-9f1a-2b3c4d5e6f70";

    #[test]
    fn conversation_id_recognizes_remote_and_local_forms() {
        let remote = conversation_id(&json!({ "remoteId": A, "localId": B })).unwrap();
        assert_eq!(
            remote.0,
            Identifier::Remote {
                remote_id: Uuid::parse_str(A).unwrap(),
                local_id: Some(Uuid::parse_str(B).unwrap()),
            }
        );

        let local = conversation_id(&json!({ "localId": B })).unwrap();
        assert!(local.0.is_local());

        // Null remote id falls through to the local shape.
        let draft = conversation_id(&json!({ "remoteId": null, "localId": B })).unwrap();
        assert!(draft.0.is_local());
    }

    #[test]
    fn conversation_id_without_any_id_is_rejected_with_payload() {
        let err = conversation_id(&json!({ "title": "x" })).unwrap_err();
        let Error::InvalidArgument(msg) = err else {
            panic!("expected InvalidArgument");
        };
        assert!(msg.contains("Bad conversationId"));
        assert!(msg.contains("title"));

        assert!(conversation_id(&json!("not a map")).is_err());
        assert!(conversation_id(&json!({ "remoteId": "nope" })).is_err());
        assert!(message_id(&json!({ "remoteId": A, "localId": 3 })).is_err());
    }

    #[test]
    fn reply_target_is_lenient() {
        assert_eq!(optional_message_id(None), None);
        assert_eq!(optional_message_id(Some(&Value::Null)), None);
        assert_eq!(optional_message_id(Some(&json!({ "oops": true }))), None);
        assert!(optional_message_id(Some(&json!({ "localId": A }))).is_some());
    }

    #[test]
    fn parses_text_input() {
        let input = message_input(&json!({ "type": "text", "text": "hello" })).unwrap();
        assert_eq!(
            input,
            MessageInput::Text {
                text: "hello".to_string()
            }
        );
        assert!(message_input(&json!({ "type": "text", "text": "   " })).is_err());
        assert!(message_input(&json!({ "type": "text" })).is_err());
    }

    #[test]
    fn parses_media_inputs() {
        let image = message_input(&json!({
            "type": "image",
            "uri": "file:///tmp/a.png",
            "mimeType": "image/png",
            "fileName": "a.png",
        }))
        .unwrap();
        let MessageInput::Media(media) = image else {
            panic!("expected media");
        };
        assert_eq!(media.kind, MediaKind::Image);
        assert_eq!(media.file_name.as_deref(), Some("a.png"));
        assert_eq!(media.duration_ms, None);

        let audio = message_input(&json!({
            "type": "audio",
            "uri": "file:///tmp/a.m4a",
            "mimeType": "audio/mp4",
            "durationMs": 4200,
        }))
        .unwrap();
        let MessageInput::Media(media) = audio else {
            panic!("expected media");
        };
        assert_eq!(media.duration_ms, Some(4200));

        let doc = message_input(&json!({
            "type": "document",
            "uri": "file:///tmp/a.pdf",
            "mimeType": "application/pdf",
        }));
        assert!(doc.is_ok());
    }

    #[test]
    fn rejects_mismatched_or_unknown_inputs() {
        assert!(message_input(&json!({
            "type": "image",
            "uri": "file:///tmp/a.pdf",
            "mimeType": "application/pdf",
        }))
        .is_err());
        assert!(message_input(&json!({
            "type": "video",
            "uri": "",
            "mimeType": "video/mp4",
        }))
        .is_err());
        assert!(message_input(&json!({ "type": "sticker", "id": 1 })).is_err());
        assert!(message_input(&json!({ "text": "untagged" })).is_err());
        assert!(message_input(&json!(["text", "hi"])).is_err());
    }

    #[test]
    fn initial_message_error_names_initial_input() {
        assert_eq!(optional_message_input(None).unwrap(), None);
        let err = optional_message_input(Some(&json!({ "type": "x" }))).unwrap_err();
        assert!(err.to_string().contains("initial message input"));
    }

    #[test]
    fn provider_ids_drop_invalid_entries() {
        let ids = provider_ids(Some(&json!([A, "not-a-uuid", 42, A]))).unwrap().unwrap();
        assert_eq!(ids, vec![ProviderId(Uuid::parse_str(A).unwrap())]);

        assert_eq!(provider_ids(None).unwrap(), None);
        assert_eq!(provider_ids(Some(&json!([]))).unwrap(), Some(vec![]));
        assert!(provider_ids(Some(&json!(A))).is_err());
    }

    /// Collects formatted log output emitted at `WARN` and above.
    #[derive(Clone, Default)]
    struct WarnLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for WarnLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl WarnLog {
        fn capture(&self, f: impl FnOnce()) -> String {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::WARN)
                .with_ansi(false)
                .with_writer({
                    let log = self.clone();
                    move || log.clone()
                })
                .finish();
            tracing::subscriber::with_default(subscriber, f);
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn dropped_payloads_are_logged_as_warnings() {
        let out = WarnLog::default().capture(|| {
            provider_ids(Some(&json!([A, "not-a-uuid"]))).unwrap();
        });
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("not-a-uuid"), "{out}");

        let out = WarnLog::default().capture(|| {
            assert_eq!(optional_message_id(Some(&json!("garbage"))), None);
        });
        assert!(out.contains("WARN"), "{out}");
    }

    #[test]
    fn title_and_flag_shapes() {
        assert_eq!(optional_title(Some(&json!("T"))).unwrap().as_deref(), Some("T"));
        assert_eq!(optional_title(Some(&Value::Null)).unwrap(), None);
        assert!(optional_title(Some(&json!(7))).is_err());

        assert!(typing_flag(&json!(true)).unwrap());
        assert!(typing_flag(&json!("true")).is_err());
    }
}
