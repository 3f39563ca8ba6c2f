use serde::{Deserialize, Serialize};

/// Local storage key of a persisted entity.
///
/// Prototypes handed to a repository's `create` carry `Unassigned`; the
/// repository replaces it with an allocated key exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DataId {
    #[default]
    Unassigned,
    Assigned(String),
}

impl DataId {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Unassigned => None,
            Self::Assigned(id) => Some(id),
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, Self::Assigned(_))
    }
}

impl std::fmt::Display for DataId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unassigned => write!(f, "<unassigned>"),
            Self::Assigned(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for DataId {
    fn from(id: &str) -> Self {
        Self::Assigned(id.to_string())
    }
}

// Rotating poll-time bucket token. Ordering is numeric, not lexical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IdStamp(pub String);

impl IdStamp {
    pub fn new(stamp: impl Into<String>) -> Self {
        Self(stamp.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the stamp, `None` if it is not an unsigned integer.
    pub fn value(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl std::fmt::Display for IdStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier a chat is polled under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollId(pub String);

impl PollId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PollId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
