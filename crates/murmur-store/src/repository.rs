//! Cache-plus-vault core shared by the profile and chat repositories.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use murmur_shared::constants::MAX_ID_ATTEMPTS;
use murmur_shared::DataId;

use crate::error::{Result, StoreError};
use crate::ids::IdentifierGenerator;
use crate::models::{Chat, Profile};
use crate::vault::EntityStore;

/// An entity kind stored one-file-per-record in its own namespace.
pub(crate) trait Record: Serialize + DeserializeOwned + Clone + Send {
    const NAMESPACE: &'static str;

    fn data_id(&self) -> &DataId;

    fn set_data_id(&mut self, id: DataId);
}

impl Record for Profile {
    const NAMESPACE: &'static str = murmur_shared::constants::NAMESPACE_PROFILES;

    fn data_id(&self) -> &DataId {
        &self.data_id
    }

    fn set_data_id(&mut self, id: DataId) {
        self.data_id = id;
    }
}

impl Record for Chat {
    const NAMESPACE: &'static str = murmur_shared::constants::NAMESPACE_CHATS;

    fn data_id(&self) -> &DataId {
        &self.data_id
    }

    fn set_data_id(&mut self, id: DataId) {
        self.data_id = id;
    }
}

/// Write-through cache over an [`EntityStore`] namespace.
///
/// One mutex guards the whole cache. Cache misses, updates and
/// read-modify-write operations hold it across their store I/O so the
/// cached value never runs ahead of the stored one. Creation only takes it
/// to publish the new record; the create-only write settles races.
pub(crate) struct Repository<T: Record> {
    store: Arc<dyn EntityStore>,
    ids: IdentifierGenerator,
    cache: Mutex<HashMap<String, T>>,
}

impl<T: Record> Repository<T> {
    pub(crate) fn new(store: Arc<dyn EntityStore>, ids: IdentifierGenerator) -> Self {
        Self {
            store,
            ids,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn ids(&self) -> &IdentifierGenerator {
        &self.ids
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, T>>> {
        self.cache.lock().map_err(|_| StoreError::LockPoisoned)
    }

    pub(crate) fn get(&self, data_id: &str) -> Result<T> {
        let mut cache = self.lock()?;
        if let Some(record) = cache.get(data_id) {
            return Ok(record.clone());
        }

        let record = self.load(data_id)?;
        cache.insert(data_id.to_string(), record.clone());
        Ok(record)
    }

    /// Every record in the namespace, ordered by data id.
    pub(crate) fn all(&self) -> Result<Vec<T>> {
        let listed = self.store.list(T::NAMESPACE)?;
        let mut cache = self.lock()?;

        let mut records = Vec::with_capacity(listed.len());
        for data_id in listed {
            let record = match cache.get(&data_id) {
                Some(record) => record.clone(),
                None => {
                    let record = self.load(&data_id)?;
                    cache.insert(data_id, record.clone());
                    record
                }
            };
            records.push(record);
        }
        Ok(records)
    }

    /// Allocate a data id for `record`, persist it create-only, then cache.
    ///
    /// The caller has already validated every field. Losing a race for an
    /// id (`AlreadyExists`) restarts allocation against a fresh listing.
    pub(crate) fn create(&self, mut record: T) -> Result<T> {
        if record.data_id().is_assigned() {
            return Err(StoreError::Validation(format!(
                "new {} record already has data id {}",
                T::NAMESPACE,
                record.data_id()
            )));
        }

        for round in 1..=MAX_ID_ATTEMPTS {
            let existing = self.store.list(T::NAMESPACE)?;
            let data_id = self.ids.allocate(&existing)?;
            record.set_data_id(DataId::Assigned(data_id.clone()));
            let bytes = encode(&data_id, &record)?;

            match self.store.write(&data_id, T::NAMESPACE, &bytes, false) {
                Ok(()) => {
                    self.lock()?.insert(data_id.clone(), record.clone());
                    info!(namespace = T::NAMESPACE, data_id = %data_id, "created record");
                    return Ok(record);
                }
                Err(StoreError::AlreadyExists { .. }) => {
                    warn!(
                        namespace = T::NAMESPACE,
                        data_id = %data_id,
                        round,
                        "data id taken concurrently, reallocating"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::IdExhausted {
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Persist `record` over its existing slot, then cache it.
    pub(crate) fn update(&self, record: &T) -> Result<()> {
        let data_id = assigned(record)?.to_string();
        let bytes = encode(&data_id, record)?;

        let mut cache = self.lock()?;
        if !cache.contains_key(&data_id) {
            // updates never create; the record must already exist
            self.load(&data_id)?;
        }
        self.store.write(&data_id, T::NAMESPACE, &bytes, true)?;
        cache.insert(data_id, record.clone());
        Ok(())
    }

    /// Apply `f` to the current value of `data_id` and store the result.
    ///
    /// Runs under the cache lock, so concurrent modifications of the same
    /// repository are serialized. If `f` or the write fails nothing changes.
    pub(crate) fn modify<R>(
        &self,
        data_id: &str,
        f: impl FnOnce(&mut T) -> Result<R>,
    ) -> Result<(T, R)> {
        let mut cache = self.lock()?;
        let mut record = match cache.get(data_id) {
            Some(record) => record.clone(),
            None => self.load(data_id)?,
        };

        let out = f(&mut record)?;
        let bytes = encode(data_id, &record)?;
        self.store.write(data_id, T::NAMESPACE, &bytes, true)?;
        cache.insert(data_id.to_string(), record.clone());
        Ok((record, out))
    }

    fn load(&self, data_id: &str) -> Result<T> {
        let bytes = self.store.read(data_id, T::NAMESPACE)?;
        let record: T = bincode::deserialize(&bytes).map_err(|e| StoreError::Codec {
            id: format!("{}/{data_id}", T::NAMESPACE),
            message: e.to_string(),
        })?;

        if record.data_id().as_str() != Some(data_id) {
            return Err(StoreError::Corrupt(format!(
                "{}/{data_id} holds record for {}",
                T::NAMESPACE,
                record.data_id()
            )));
        }

        debug!(namespace = T::NAMESPACE, data_id, "loaded record into cache");
        Ok(record)
    }
}

fn assigned<T: Record>(record: &T) -> Result<&str> {
    record.data_id().as_str().ok_or_else(|| {
        StoreError::Validation(format!(
            "{} record has no data id; create it first",
            T::NAMESPACE
        ))
    })
}

fn encode<T: Record>(data_id: &str, record: &T) -> Result<Vec<u8>> {
    bincode::serialize(record).map_err(|e| StoreError::Codec {
        id: format!("{}/{data_id}", T::NAMESPACE),
        message: e.to_string(),
    })
}
