//! Collision-avoiding identifier allocation.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use murmur_shared::constants::MAX_ID_ATTEMPTS;
use murmur_shared::service::IdSource;

use crate::error::{Result, StoreError};
use crate::vault::check_key;

/// Draws identifiers from an [`IdSource`] until one is free in a namespace.
///
/// The namespace listing passed to [`IdentifierGenerator::allocate`] is the
/// deduplication domain; there is no global registry.
#[derive(Clone)]
pub struct IdentifierGenerator {
    source: Arc<dyn IdSource>,
    max_attempts: usize,
}

impl IdentifierGenerator {
    pub fn new(source: Arc<dyn IdSource>) -> Self {
        Self {
            source,
            max_attempts: MAX_ID_ATTEMPTS,
        }
    }

    pub fn source(&self) -> &Arc<dyn IdSource> {
        &self.source
    }

    /// Return an identifier that is not in `existing`.
    ///
    /// Gives up with `IdExhausted` after 100 colliding draws. A failure of
    /// the underlying source is returned at once as `GenerationFailed`.
    pub fn allocate(&self, existing: &BTreeSet<String>) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let candidate = self.source.generate_id()?;

            // anything unusable as a file name cannot be stored either
            if check_key(&candidate).is_err() {
                return Err(StoreError::GenerationFailed(format!(
                    "identifier source produced unusable id {candidate:?}"
                )));
            }

            if !existing.contains(&candidate) {
                debug!(attempt, "allocated identifier");
                return Ok(candidate);
            }
            debug!(attempt, "identifier collision, drawing again");
        }

        warn!(attempts = self.max_attempts, "identifier allocation exhausted");
        Err(StoreError::IdExhausted {
            attempts: self.max_attempts,
        })
    }
}
