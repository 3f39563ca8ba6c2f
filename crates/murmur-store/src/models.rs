//! Domain model structs persisted in the encrypted vault.
//!
//! Every struct derives `Serialize` and `Deserialize`; records are encoded
//! with bincode before encryption.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use murmur_shared::service::ChatKeys;
use murmur_shared::{DataId, IdStamp};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A remote contact's public identity record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// Local storage key. `Unassigned` until created.
    pub data_id: DataId,
    /// Public-facing identifier, must match the handle grammar.
    pub handle: String,
    /// Display name: non-empty, single line.
    pub name: String,
    pub bio: String,
}

impl Profile {
    /// Prototype for `ProfileRepository::create`.
    pub fn new(handle: impl Into<String>, name: impl Into<String>, bio: impl Into<String>) -> Self {
        Self {
            data_id: DataId::Unassigned,
            handle: handle.into(),
            name: name.into(),
            bio: bio.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChatType {
    Direct,
    Group,
}

/// A conversation's full local state.
///
/// Key material (`own_*`, `remote_pfs`, `pfs_salt`, `mdc_seed`) is opaque:
/// produced and consumed by the crypto layer, stored verbatim here, and
/// redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub data_id: DataId,
    /// Protocol-level conversation identifier.
    pub id: String,
    pub id_salt: String,
    /// Poll bucket this chat is currently due in.
    pub id_stamp: IdStamp,
    /// Sequence number of the newest message.
    pub last_message_id: u16,
    pub name: String,
    pub chat_type: ChatType,
    pub own_kyber: String,
    pub own_curve: String,
    pub own_pfs: String,
    pub remote_pfs: String,
    pub pfs_salt: String,
    pub mdc_seed: String,
    /// Chronological, oldest first.
    pub messages: Vec<Message>,
    /// Weak reference to a `Profile` data id.
    pub associated_profile_id: Option<String>,
}

impl std::fmt::Debug for Chat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chat")
            .field("data_id", &self.data_id)
            .field("id", &self.id)
            .field("id_stamp", &self.id_stamp)
            .field("last_message_id", &self.last_message_id)
            .field("name", &self.name)
            .field("chat_type", &self.chat_type)
            .field("messages", &self.messages.len())
            .field("associated_profile_id", &self.associated_profile_id)
            .finish_non_exhaustive()
    }
}

/// Discrete fields for `ChatRepository::create_from_fields`.
#[derive(Clone)]
pub struct NewChat {
    pub id: String,
    pub id_salt: String,
    pub id_stamp: IdStamp,
    pub name: String,
    pub chat_type: ChatType,
    pub keys: ChatKeys,
    pub remote_pfs: String,
    pub pfs_salt: String,
    pub mdc_seed: String,
    pub associated_profile_id: Option<String>,
}

impl From<NewChat> for Chat {
    fn from(fields: NewChat) -> Self {
        Chat {
            data_id: DataId::Unassigned,
            id: fields.id,
            id_salt: fields.id_salt,
            id_stamp: fields.id_stamp,
            last_message_id: 0,
            name: fields.name,
            chat_type: fields.chat_type,
            own_kyber: fields.keys.own_kyber,
            own_curve: fields.keys.own_curve,
            own_pfs: fields.keys.own_pfs,
            remote_pfs: fields.remote_pfs,
            pfs_salt: fields.pfs_salt,
            mdc_seed: fields.mdc_seed,
            messages: Vec::new(),
            associated_profile_id: fields.associated_profile_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sender {
    /// Sent from this device.
    Local,
    /// Sent by the profile with this data id.
    Profile(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Image,
    File,
    System,
}

/// A single chat message, owned by its chat's message list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Per-chat sequence number.
    pub id: u16,
    pub sender: Sender,
    /// `None` until the message has actually been sent.
    pub sent_at: Option<DateTime<Utc>>,
    /// `None` for messages that were sent but not (yet) received.
    pub received_at: Option<DateTime<Utc>>,
    pub content_type: ContentType,
    pub text: String,
    pub payload: Option<Vec<u8>>,
}

/// Message contents before a sequence number is assigned.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sender: Sender,
    pub sent_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub content_type: ContentType,
    pub text: String,
    pub payload: Option<Vec<u8>>,
}

impl MessageDraft {
    pub fn text(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            sent_at: None,
            received_at: None,
            content_type: ContentType::Text,
            text: text.into(),
            payload: None,
        }
    }

    pub(crate) fn into_message(self, id: u16) -> Message {
        Message {
            id,
            sender: self.sender,
            sent_at: self.sent_at,
            received_at: self.received_at,
            content_type: self.content_type,
            text: self.text,
            payload: self.payload,
        }
    }
}
