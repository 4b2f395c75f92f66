use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Local-or-remote identity shared by conversations and messages.
///
/// A `Local` id exists only on this device (draft conversation, message not yet
/// synced). A `Remote` id is persisted server-side and may remember the local id
/// it was created under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Identifier {
    Remote {
        remote_id: Uuid,
        local_id: Option<Uuid>,
    },
    Local {
        local_id: Uuid,
    },
}

impl Identifier {
    pub fn new_local() -> Self {
        Self::Local {
            local_id: Uuid::new_v4(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// Host-facing map form (`{"remoteId", "localId"?}` or `{"localId"}`).
    pub fn to_transit(&self) -> serde_json::Value {
        match self {
            Self::Remote {
                remote_id,
                local_id: Some(local_id),
            } => serde_json::json!({ "remoteId": remote_id, "localId": local_id }),
            Self::Remote {
                remote_id,
                local_id: None,
            } => serde_json::json!({ "remoteId": remote_id }),
            Self::Local { local_id } => serde_json::json!({ "localId": local_id }),
        }
    }
}

/// Conversation identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConversationId(pub Identifier);

/// Message (conversation item) identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub Identifier);

impl ConversationId {
    pub fn to_transit(&self) -> serde_json::Value {
        self.0.to_transit()
    }
}

impl MessageId {
    pub fn to_transit(&self) -> serde_json::Value {
        self.0.to_transit()
    }
}

/// Provider (practitioner) invited into a conversation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(pub Uuid);

/// Conversation as returned by the messaging client.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: Option<String>,
    pub provider_ids: Vec<ProviderId>,
    pub created_at: DateTime<Utc>,
}
