//! Store configuration loaded from environment variables.
//!
//! All settings have defaults so the store can be opened with zero
//! configuration for local development.

use std::path::PathBuf;

use directories::ProjectDirs;
use regex::Regex;

use crate::error::{Result, StoreError};

pub const DEFAULT_HANDLE_PATTERN: &str = "^[A-Za-z0-9_]{1,32}$";
pub const DEFAULT_CHAT_ID_PATTERN: &str = "^[A-Za-z0-9]{16,64}$";
pub const DEFAULT_ID_SALT_PATTERN: &str = "^[A-Za-z0-9+/=]{8,128}$";
pub const DEFAULT_POLL_BUCKETS: u16 = 8;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory holding the salt file and one directory per namespace.
    /// Env: `MURMUR_DATA_DIR`
    /// Default: platform data dir (e.g. `~/.local/share/murmur`), falling
    /// back to `./murmur-data` when none can be determined.
    pub data_dir: PathBuf,

    /// Grammar every profile handle must match.
    /// Env: `MURMUR_HANDLE_PATTERN`
    pub handle_pattern: String,

    /// Grammar every chat id must match.
    /// Env: `MURMUR_CHAT_ID_PATTERN`
    pub chat_id_pattern: String,

    /// Grammar every chat id salt must match.
    /// Env: `MURMUR_ID_SALT_PATTERN`
    pub id_salt_pattern: String,

    /// Number of anonymity buckets chats are spread over when polling.
    /// Env: `MURMUR_POLL_BUCKETS`
    /// Default: `8`
    pub poll_buckets: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().unwrap_or_else(|_| PathBuf::from("./murmur-data")),
            handle_pattern: DEFAULT_HANDLE_PATTERN.to_string(),
            chat_id_pattern: DEFAULT_CHAT_ID_PATTERN.to_string(),
            id_salt_pattern: DEFAULT_ID_SALT_PATTERN.to_string(),
            poll_buckets: DEFAULT_POLL_BUCKETS,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("MURMUR_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(pattern) = pattern_from_env("MURMUR_HANDLE_PATTERN") {
            config.handle_pattern = pattern;
        }
        if let Some(pattern) = pattern_from_env("MURMUR_CHAT_ID_PATTERN") {
            config.chat_id_pattern = pattern;
        }
        if let Some(pattern) = pattern_from_env("MURMUR_ID_SALT_PATTERN") {
            config.id_salt_pattern = pattern;
        }

        if let Ok(val) = std::env::var("MURMUR_POLL_BUCKETS") {
            match val.parse::<u16>() {
                Ok(n) => config.poll_buckets = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid MURMUR_POLL_BUCKETS, using default");
                }
            }
        }

        config
    }
}

/// Platform data directory, as the store places it when nothing is configured.
pub fn default_data_dir() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("org", "murmur", "murmur").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().to_path_buf())
}

fn pattern_from_env(var: &str) -> Option<String> {
    let value = std::env::var(var).ok()?;
    if Regex::new(&value).is_ok() {
        Some(value)
    } else {
        tracing::warn!(var, value = %value, "Pattern does not compile, using default");
        None
    }
}

/// Compiled handle / chat-id / salt grammars.
#[derive(Debug, Clone)]
pub struct Grammars {
    handle: Regex,
    chat_id: Regex,
    id_salt: Regex,
}

impl Grammars {
    pub fn compile(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            handle: compile_pattern("handle", &config.handle_pattern)?,
            chat_id: compile_pattern("chat id", &config.chat_id_pattern)?,
            id_salt: compile_pattern("id salt", &config.id_salt_pattern)?,
        })
    }

    pub fn check_handle(&self, handle: &str) -> Result<()> {
        if handle.is_empty() {
            return Err(StoreError::Validation("handle must not be empty".into()));
        }
        check("handle", &self.handle, handle)
    }

    pub fn check_chat_id(&self, id: &str) -> Result<()> {
        check("chat id", &self.chat_id, id)
    }

    pub fn check_id_salt(&self, salt: &str) -> Result<()> {
        check("id salt", &self.id_salt, salt)
    }
}

/// Display names must be non-empty and single-line.
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::Validation("name must not be empty".into()));
    }
    if name.contains('\n') {
        return Err(StoreError::Validation("name must not contain a newline".into()));
    }
    Ok(())
}

fn compile_pattern(what: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| StoreError::Config(format!("{what} pattern: {e}")))
}

fn check(what: &str, grammar: &Regex, value: &str) -> Result<()> {
    if grammar.is_match(value) {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "{what} {value:?} does not match {}",
            grammar.as_str()
        )))
    }
}
