//! Validated mint URLs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid mint url `{url}`: {reason}")]
pub struct MintUrlError {
    pub url: String,
    pub reason: String,
}

/// An absolute http(s) URL identifying a mint, normalized without a
/// trailing slash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MintUrl(String);

impl MintUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join an endpoint path (starting with `/`) onto this mint URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl FromStr for MintUrl {
    type Err = MintUrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| MintUrlError {
            url: s.to_string(),
            reason: reason.to_string(),
        };
        let parsed = url::Url::parse(s).map_err(|e| err(&e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(err("scheme must be http or https"));
        }
        if parsed.host_str().is_none() {
            return Err(err("missing host"));
        }
        Ok(Self(s.trim_end_matches('/').to_string()))
    }
}

impl fmt::Display for MintUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
