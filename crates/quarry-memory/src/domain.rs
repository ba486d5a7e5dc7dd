use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

const MAX_DOMAIN_LEN: usize = 255;

/// Normalized name of a knowledge domain; also the name of its vector collection.
///
/// Normalization trims, lowercases, and collapses each whitespace run to a
/// single `_`, so `"HR Policies"`, `"hr policies"` and `" hr  policies "` all
/// resolve to `hr_policies`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainId(String);

impl DomainId {
    /// Normalize and validate a raw domain name.
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::InvalidDomain` if the normalized name is empty, longer than
    /// 255 bytes, or contains characters other than alphanumerics, `_`, `-` and `.`.
    pub fn parse(raw: &str) -> Result<Self, MemoryError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(MemoryError::InvalidDomain(format!("{raw:?} is empty")));
        }
        if normalized.len() > MAX_DOMAIN_LEN {
            return Err(MemoryError::InvalidDomain(format!(
                "{normalized} exceeds {MAX_DOMAIN_LEN} bytes"
            )));
        }
        if let Some(bad) = normalized
            .chars()
            .find(|c| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(MemoryError::InvalidDomain(format!(
                "{normalized} contains {bad:?}"
            )));
        }
        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DomainId {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DomainId> for String {
    fn from(value: DomainId) -> Self {
        value.0
    }
}

impl std::str::FromStr for DomainId {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
