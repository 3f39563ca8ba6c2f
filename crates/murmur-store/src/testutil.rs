//! Fixtures shared by the unit tests of this crate.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use murmur_shared::service::{ChatKeys, IdSource};
use murmur_shared::{IdStamp, ServiceError};

use crate::config::{Grammars, StoreConfig};
use crate::error::{Result, StoreError};
use crate::ids::IdentifierGenerator;
use crate::models::{ChatType, NewChat};
use crate::vault::{EntityStore, Vault};

/// Replays a fixed list of ids, cycling when it runs out.
pub struct ScriptedIds {
    ids: Vec<String>,
    pub calls: AtomicUsize,
}

impl ScriptedIds {
    pub fn new(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl IdSource for ScriptedIds {
    fn generate_id(&self) -> std::result::Result<String, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ids[n % self.ids.len()].clone())
    }

    fn generate_timestamp(&self) -> std::result::Result<IdStamp, ServiceError> {
        Ok(IdStamp::new("0"))
    }
}

pub fn scripted_ids(ids: &[&str]) -> IdentifierGenerator {
    IdentifierGenerator::new(Arc::new(ScriptedIds::new(ids)))
}

pub fn grammars() -> Grammars {
    Grammars::compile(&StoreConfig::default()).unwrap()
}

/// A real vault in a temp dir, with switches for injecting failures.
pub struct TestStore {
    vault: Vault,
    _dir: tempfile::TempDir,
    fail_writes: AtomicBool,
    collisions: Mutex<HashSet<(String, String)>>,
    pub writes: AtomicUsize,
}

impl TestStore {
    pub fn new() -> Arc<Self> {
        let dir = tempfile::tempdir().unwrap();
        let vault = Vault::open(dir.path()).unwrap();
        vault.init(b"test-secret").unwrap();
        Arc::new(Self {
            vault,
            _dir: dir,
            fail_writes: AtomicBool::new(false),
            collisions: Mutex::new(HashSet::new()),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The next create-only write of `namespace/id` reports `AlreadyExists`.
    pub fn plant_collision(&self, namespace: &str, id: &str) {
        self.collisions
            .lock()
            .unwrap()
            .insert((namespace.to_string(), id.to_string()));
    }
}

impl EntityStore for TestStore {
    fn read(&self, id: &str, namespace: &str) -> Result<Vec<u8>> {
        self.vault.read(id, namespace)
    }

    fn write(&self, id: &str, namespace: &str, bytes: &[u8], overwrite: bool) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::io(
                format!("{namespace}/{id}"),
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        let key = (namespace.to_string(), id.to_string());
        if !overwrite && self.collisions.lock().unwrap().remove(&key) {
            return Err(StoreError::AlreadyExists {
                namespace: key.0,
                id: key.1,
            });
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.vault.write(id, namespace, bytes, overwrite)
    }

    fn list(&self, namespace: &str) -> Result<BTreeSet<String>> {
        self.vault.list(namespace)
    }
}

pub fn chat_keys() -> ChatKeys {
    ChatKeys {
        own_kyber: "kyber-pair".into(),
        own_curve: "curve-pair".into(),
        own_pfs: "own-pfs".into(),
    }
}

pub fn new_chat(stamp: &str) -> NewChat {
    NewChat {
        id: "0123456789abcdef0123".into(),
        id_salt: "c2FsdHlzYWx0".into(),
        id_stamp: IdStamp::new(stamp),
        name: "Book club".into(),
        chat_type: ChatType::Group,
        keys: chat_keys(),
        remote_pfs: "remote-pfs".into(),
        pfs_salt: "pfs-salt".into(),
        mdc_seed: "mdc-seed".into(),
        associated_profile_id: None,
    }
}
