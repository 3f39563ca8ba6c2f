/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Size of the persisted key-derivation salt in bytes
pub const SALT_SIZE: usize = 256;

/// PBKDF2-HMAC-SHA256 rounds used to derive the store key
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Upper bound on identifier draws before allocation gives up
pub const MAX_ID_ATTEMPTS: usize = 100;

/// Storage namespaces (one directory each)
pub const NAMESPACE_PROFILES: &str = "profiles";
pub const NAMESPACE_CHATS: &str = "chats";

/// File name of the persisted key-derivation salt
pub const SALT_FILE_NAME: &str = "salt";

/// Random bytes behind each subscription label
pub const SUBSCRIPTION_LABEL_SIZE: usize = 8;
