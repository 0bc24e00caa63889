//! Caller identity and rate-limit tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rate-limit tier attached to an API token.
///
/// Unrecognized tier names parse to [`Tier::Unknown`], which gets the default limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Anonymous,
    Authenticated,
    Premium,
    Unknown,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated => "authenticated",
            Self::Premium => "premium",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for Tier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "anonymous" => Self::Anonymous,
            "authenticated" => Self::Authenticated,
            "premium" => Self::Premium,
            _ => Self::Unknown,
        })
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated API caller, resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub owner_id: String,
    pub tier: Tier,
}
