//! CRUD operations for [`Profile`] records.

use std::sync::Arc;

use tracing::debug;

use crate::config::{check_name, Grammars};
use crate::error::{Result, StoreError};
use crate::ids::IdentifierGenerator;
use crate::models::Profile;
use crate::repository::Repository;
use crate::vault::EntityStore;

/// Cached access to the profile namespace.
///
/// Safe to share between threads behind an `Arc`; see [`Repository`] for
/// the locking contract.
pub struct ProfileRepository {
    inner: Repository<Profile>,
    grammars: Grammars,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn EntityStore>, ids: IdentifierGenerator, grammars: Grammars) -> Self {
        Self {
            inner: Repository::new(store, ids),
            grammars,
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a profile, loading it from the vault on a cache miss.
    pub fn get(&self, data_id: &str) -> Result<Profile> {
        self.inner.get(data_id)
    }

    /// All stored profiles, ordered by data id.
    pub fn all(&self) -> Result<Vec<Profile>> {
        self.inner.all()
    }

    pub fn find_by_handle(&self, handle: &str) -> Result<Option<Profile>> {
        Ok(self.all()?.into_iter().find(|p| p.handle == handle))
    }

    // ------------------------------------------------------------------
    // Create / Update
    // ------------------------------------------------------------------

    /// Validate `prototype`, allocate its data id and persist it.
    ///
    /// `prototype.data_id` must be `Unassigned`. Validation failures return
    /// before anything is allocated or written.
    pub fn create(&self, prototype: Profile) -> Result<Profile> {
        if prototype.data_id.is_assigned() {
            return Err(StoreError::Validation(format!(
                "profile prototype already has data id {}",
                prototype.data_id
            )));
        }
        self.validate(&prototype)?;

        let profile = self.inner.create(prototype)?;
        debug!(data_id = %profile.data_id, handle = %profile.handle, "profile created");
        Ok(profile)
    }

    /// Persist `profile`, then refresh the cache.
    ///
    /// On failure both the vault and the cache keep the previous value.
    pub fn update(&self, profile: &Profile) -> Result<()> {
        self.validate(profile)?;
        self.inner.update(profile)
    }

    fn validate(&self, profile: &Profile) -> Result<()> {
        check_name(&profile.name)?;
        self.grammars.check_handle(&profile.handle)
    }
}
