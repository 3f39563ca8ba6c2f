//! Boundary to the external identifier and key services.
//!
//! The core treats everything these services return as opaque: identifiers
//! are stored as-is, key material is stored and handed back verbatim.

use crate::error::ServiceError;
use crate::types::IdStamp;

/// Source of random identifiers and poll-time stamps.
pub trait IdSource: Send + Sync {
    fn generate_id(&self) -> Result<String, ServiceError>;

    fn generate_timestamp(&self) -> Result<IdStamp, ServiceError>;
}

/// Key-pair and seed generation, provided by the crypto layer.
pub trait KeyService: Send + Sync {
    fn kyber_key_pair(&self) -> Result<String, ServiceError>;

    fn curve_key_pair(&self) -> Result<String, ServiceError>;

    fn pfs_seed(&self) -> Result<String, ServiceError>;
}

/// Default [`IdSource`]: v4 UUIDs from the OS RNG and unix-second stamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn generate_id(&self) -> Result<String, ServiceError> {
        Ok(uuid::Uuid::new_v4().simple().to_string())
    }

    fn generate_timestamp(&self) -> Result<IdStamp, ServiceError> {
        let secs = chrono::Utc::now().timestamp();
        u64::try_from(secs)
            .map(|s| IdStamp(s.to_string()))
            .map_err(|_| ServiceError::Timestamp(format!("clock before epoch: {secs}")))
    }
}

/// This device's own key material for a new conversation.
#[derive(Clone)]
pub struct ChatKeys {
    pub own_kyber: String,
    pub own_curve: String,
    pub own_pfs: String,
}

impl ChatKeys {
    pub fn generate(keys: &dyn KeyService) -> Result<Self, ServiceError> {
        Ok(Self {
            own_kyber: keys.kyber_key_pair()?,
            own_curve: keys.curve_key_pair()?,
            own_pfs: keys.pfs_seed()?,
        })
    }
}

impl std::fmt::Debug for ChatKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ChatKeys { .. }")
    }
}
