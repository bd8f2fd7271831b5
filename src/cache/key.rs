//! Cache key generation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Key identifying one cached resource, conventionally `<kind>:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// A user profile, loaded by username.
    pub fn profile(username: &str) -> Self {
        Self(format!("user:{}", username))
    }

    /// One page of a content feed; `None` is the first page.
    pub fn feed(cursor: Option<&str>) -> Self {
        Self(format!("feed:{}", cursor.unwrap_or("first")))
    }

    /// Stable key for a parameterized query (filters, sort order, ...).
    ///
    /// Object keys are sorted before hashing so that logically equal
    /// parameter sets map to the same entry.
    pub fn hashed(kind: &str, params: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(&canonicalize(params)).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let hash: String = hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect();
        Self(format!("{}:{}", kind, hash))
    }

    /// The part before the first `:`, if any.
    pub fn kind(&self) -> Option<&str> {
        self.0.split_once(':').map(|(kind, _)| kind)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<&String, serde_json::Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            serde_json::to_value(sorted).unwrap_or(serde_json::Value::Null)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
