//! Link entity representing a shortened URL mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who may look a link up through the API.
///
/// Redirects through `GET /{code}` work for both; only the lookup and listing endpoints
/// hide private links from non-owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn from_public_flag(is_public: bool) -> Self {
        if is_public {
            Self::Public
        } else {
            Self::Private
        }
    }

    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// A persisted short link.
///
/// `code`, `destination` and `created_at` never change after creation; `click_count` only
/// grows through [`crate::domain::repositories::LinkRepository::increment_clicks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub id: i64,
    pub code: String,
    pub destination: String,
    pub owner: Option<String>,
    pub visibility: Visibility,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Link {
    /// Anonymous links take part in destination deduplication.
    pub fn is_anonymous(&self) -> bool {
        self.owner.is_none()
    }

    /// Public links are visible to everyone, private ones only to their owner.
    pub fn is_visible_to(&self, caller: Option<&str>) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private => self.owner.is_some() && self.owner.as_deref() == caller,
        }
    }
}

/// Input data for creating a new link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub code: String,
    pub destination: String,
    pub owner: Option<String>,
    pub visibility: Visibility,
}
