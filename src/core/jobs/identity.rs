//! Job identities: the deduplication key shared by identical requests.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdentity(String);

impl JobIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    /// Random identity for requests that must never be merged with another.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Deterministic identity for a set of search criteria. Equal criteria
    /// always hash to the same identity within a build.
    pub fn from_criteria<T: Serialize>(criteria: &T) -> crate::error::Result<Self> {
        let canonical = serde_json::to_value(criteria)?;
        Ok(Self(hash_value(&canonical)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// `serde_json::Value` objects keep their keys sorted, so the rendered
/// string is canonical for a given set of fields.
fn hash_value(value: &serde_json::Value) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}
