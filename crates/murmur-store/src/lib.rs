//! # murmur-store
//!
//! Local encrypted storage for profiles and chats.
//!
//! Records live one file per entity under a namespace directory, encrypted
//! with a key derived from a caller secret (PBKDF2-HMAC-SHA256 over a
//! persisted random salt). [`ProfileRepository`] and [`ChatRepository`] put
//! a write-through cache in front of the [`Vault`] and own identifier
//! allocation for new records.

pub mod chats;
pub mod config;
pub mod ids;
pub mod models;
pub mod profiles;
pub mod vault;

mod error;
mod repository;

#[cfg(test)]
mod testutil;

pub use chats::ChatRepository;
pub use config::{Grammars, StoreConfig};
pub use error::{Result, StoreError};
pub use ids::IdentifierGenerator;
pub use models::*;
pub use profiles::ProfileRepository;
pub use vault::{EntityStore, Vault};
