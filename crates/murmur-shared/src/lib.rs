//! Types, constants and primitives shared by every murmur crate.

pub mod constants;
pub mod crypto;
pub mod error;
pub mod service;
pub mod types;

pub use error::{CryptoError, ServiceError};
pub use types::{DataId, IdStamp, PollId};
