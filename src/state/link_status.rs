/// Link status definitions for tracking article extraction
use std::fmt;

/// Represents the current status of a discovered link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkStatus {
    /// Link has been stored but no article has been extracted yet
    Pending,

    /// Article was fetched and extracted with a non-empty title
    Completed,

    /// Fetch or extraction failed for this link
    Failed,
}

impl LinkStatus {
    /// Returns true if an attempt has settled this link
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if the link produced an article
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible link statuses
    pub fn all_statuses() -> [Self; 3] {
        [Self::Pending, Self::Completed, Self::Failed]
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
