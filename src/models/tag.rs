//! Canonical player tags.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static TAG_BODY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{8,9}$").unwrap());

/// A player tag in canonical form: `#` followed by the uppercased body.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerTag(String);

impl PlayerTag {
    /// Normalize any input into canonical form.
    ///
    /// Strips a single leading `#`, uppercases the rest and prefixes `#`.
    /// No validation happens here; see [`PlayerTag::is_valid`].
    pub fn normalize(raw: &str) -> Self {
        let body = raw.strip_prefix('#').unwrap_or(raw);
        Self(format!("#{}", body.to_uppercase()))
    }

    /// Returns true if the input looks like a real tag (8 or 9 alphanumerics).
    pub fn is_valid(raw: &str) -> bool {
        let body = raw.strip_prefix('#').unwrap_or(raw).to_uppercase();
        TAG_BODY.is_match(&body)
    }

    /// Get the tag as a string slice, including the `#`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tag without its `#`, as used in upstream URLs.
    pub fn bare(&self) -> &str {
        self.0.strip_prefix('#').unwrap_or(&self.0)
    }
}

impl fmt::Display for PlayerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PlayerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlayerTag({})", self.0)
    }
}

impl From<&str> for PlayerTag {
    fn from(s: &str) -> Self {
        Self::normalize(s)
    }
}
