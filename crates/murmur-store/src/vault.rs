//! Password-derived encrypted key/value storage.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/salt              256 random bytes, written once
//! <root>/profiles/<id>     nonce || XChaCha20-Poly1305(record)
//! <root>/chats/<id>
//! ```
//!
//! The directory listing of a namespace is the authoritative index of which
//! keys exist. Every record is bound to its `namespace/id` through the AEAD
//! associated data, so a file copied under another name fails to decrypt.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use murmur_shared::constants::{NAMESPACE_CHATS, NAMESPACE_PROFILES, SALT_FILE_NAME, SALT_SIZE};
use murmur_shared::crypto::{self, SymmetricKey};
use murmur_shared::CryptoError;

use crate::config;
use crate::error::{Result, StoreError};

/// Byte-level storage the repositories persist through.
pub trait EntityStore: Send + Sync {
    /// Decrypted contents of `namespace/id`, or `NotFound`.
    fn read(&self, id: &str, namespace: &str) -> Result<Vec<u8>>;

    /// Encrypt and persist. With `overwrite == false` an existing key fails
    /// with `AlreadyExists` and the stored value is left untouched.
    fn write(&self, id: &str, namespace: &str, bytes: &[u8], overwrite: bool) -> Result<()>;

    /// Every key currently present in `namespace`.
    fn list(&self, namespace: &str) -> Result<BTreeSet<String>>;
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct Vault {
    root: PathBuf,
    key: RwLock<Option<Zeroizing<SymmetricKey>>>,
}

impl Vault {
    /// Open (or create) a vault in the default platform data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(&config::default_data_dir()?)
    }

    /// Open (or create) a vault rooted at `root`.
    ///
    /// The vault is unusable until [`Vault::init`] has derived the key.
    pub fn open(root: &Path) -> Result<Self> {
        for namespace in [NAMESPACE_PROFILES, NAMESPACE_CHATS] {
            let dir = root.join(namespace);
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(dir.display(), e))?;
        }

        info!(path = %root.display(), "opening vault");

        Ok(Self {
            root: root.to_path_buf(),
            key: RwLock::new(None),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the store key from `secret` and the persisted salt.
    ///
    /// Idempotent: once a key is derived, later calls return immediately
    /// without touching `secret`. Concurrent callers serialize on the key
    /// lock, so exactly one derivation happens.
    pub fn init(&self, secret: &[u8]) -> Result<()> {
        let mut guard = self.key.write().map_err(|_| StoreError::LockPoisoned)?;
        if guard.is_some() {
            debug!("vault already initialized");
            return Ok(());
        }

        let salt = load_or_create_salt(&self.root.join(SALT_FILE_NAME), crypto::generate_salt)?;
        let key = crypto::derive_store_key(secret, &salt).map_err(|e| match e {
            CryptoError::InvalidSaltLength { got, .. } => StoreError::InvalidSalt(got),
            other => StoreError::Crypto {
                id: SALT_FILE_NAME.to_string(),
                source: other,
            },
        })?;

        *guard = Some(key);
        info!(path = %self.root.display(), "vault initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.key.read().map(|k| k.is_some()).unwrap_or(false)
    }

    fn with_key<T>(&self, f: impl FnOnce(&SymmetricKey) -> Result<T>) -> Result<T> {
        let guard = self.key.read().map_err(|_| StoreError::LockPoisoned)?;
        match guard.as_ref() {
            Some(key) => f(&**key),
            None => Err(StoreError::NotInitialized),
        }
    }

    fn record_path(&self, id: &str, namespace: &str) -> Result<PathBuf> {
        check_key(namespace)?;
        check_key(id)?;
        Ok(self.root.join(namespace).join(id))
    }
}

impl EntityStore for Vault {
    fn read(&self, id: &str, namespace: &str) -> Result<Vec<u8>> {
        let path = self.record_path(id, namespace)?;

        self.with_key(|key| {
            let data = fs::read(&path).map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    StoreError::NotFound {
                        namespace: namespace.to_string(),
                        id: id.to_string(),
                    }
                } else {
                    StoreError::io(path.display(), e)
                }
            })?;

            let plaintext = crypto::decrypt(key, &data, aad(namespace, id).as_bytes()).map_err(
                |source| StoreError::Crypto {
                    id: format!("{namespace}/{id}"),
                    source,
                },
            )?;

            debug!(namespace, id, size = plaintext.len(), "read record");
            Ok(plaintext)
        })
    }

    fn write(&self, id: &str, namespace: &str, bytes: &[u8], overwrite: bool) -> Result<()> {
        let path = self.record_path(id, namespace)?;

        self.with_key(|key| {
            let ciphertext = crypto::encrypt(key, bytes, aad(namespace, id).as_bytes()).map_err(
                |source| StoreError::Crypto {
                    id: format!("{namespace}/{id}"),
                    source,
                },
            )?;

            let result = if overwrite {
                replace_file(&path, &ciphertext)
            } else {
                create_file(&path, &ciphertext)
            };

            result.map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists {
                        namespace: namespace.to_string(),
                        id: id.to_string(),
                    }
                } else {
                    StoreError::io(path.display(), e)
                }
            })?;

            debug!(namespace, id, overwrite, size = ciphertext.len(), "wrote record");
            Ok(())
        })
    }

    fn list(&self, namespace: &str) -> Result<BTreeSet<String>> {
        check_key(namespace)?;
        let dir = self.root.join(namespace);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(StoreError::io(dir.display(), e)),
        };

        let mut ids = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(dir.display(), e))?;
            // temp files start with '.', which never passes check_key
            if let Some(name) = entry.file_name().to_str() {
                if check_key(name).is_ok() {
                    ids.insert(name.to_string());
                }
            }
        }
        Ok(ids)
    }
}

fn aad(namespace: &str, id: &str) -> String {
    format!("{namespace}/{id}")
}

/// Keys become file names, so only `[A-Za-z0-9_-]` is accepted.
pub(crate) fn check_key(key: &str) -> Result<()> {
    let safe = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if safe {
        Ok(())
    } else {
        Err(StoreError::Validation(format!("invalid storage key {key:?}")))
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    path.with_file_name(format!(".{name}.{}.{n}.tmp", std::process::id()))
}

fn write_temp(path: &Path, data: &[u8]) -> io::Result<PathBuf> {
    fill_temp(path, |file| {
        file.write_all(data)?;
        file.sync_all()
    })
}

// A temp file that was opened but not completely filled is removed again.
fn fill_temp(
    path: &Path,
    fill: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> io::Result<PathBuf> {
    let tmp = temp_sibling(path);
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)?;
    if let Err(e) = fill(&mut file) {
        drop(file);
        discard_temp(&tmp);
        return Err(e);
    }
    Ok(tmp)
}

fn discard_temp(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
    }
}

// Fully written before it becomes visible; fails with AlreadyExists if the
// target is present, which makes it the arbiter between racing creators.
fn create_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = write_temp(path, data)?;
    let linked = fs::hard_link(&tmp, path);
    discard_temp(&tmp);
    linked
}

fn replace_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let tmp = write_temp(path, data)?;
    fs::rename(&tmp, path).map_err(|e| {
        discard_temp(&tmp);
        e
    })
}

/// The persisted salt. `generate` only runs when no salt file exists yet.
fn load_or_create_salt(path: &Path, generate: impl FnOnce() -> Vec<u8>) -> Result<Vec<u8>> {
    match read_salt(path) {
        Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {}
        existing => return existing,
    }

    let salt = generate();
    match create_file(path, &salt) {
        Ok(()) => {
            info!(path = %path.display(), "generated store salt");
            Ok(salt)
        }
        // another process created it first
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => read_salt(path),
        Err(e) => Err(StoreError::io(path.display(), e)),
    }
}

fn read_salt(path: &Path) -> Result<Vec<u8>> {
    let existing = fs::read(path).map_err(|e| StoreError::io(path.display(), e))?;
    if existing.len() != SALT_SIZE {
        return Err(StoreError::InvalidSalt(existing.len()));
    }
    Ok(existing)
}
