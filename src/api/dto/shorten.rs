//! DTOs for link creation and lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::domain::entities::Link;

fn default_public() -> bool {
    true
}

/// Reads any JSON number; negative or fractional lengths count as unset.
fn lenient_code_length<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(number
        .and_then(|n| n.as_u64())
        .and_then(|n| usize::try_from(n).ok()))
}

/// Request to shorten a single URL.
///
/// The destination itself is checked by the URL validator; this only bounds the input.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    #[validate(length(min = 1, message = "URL must not be empty"))]
    pub url: String,

    /// Private links are only visible to their owner through the API.
    #[serde(default = "default_public")]
    pub is_public: bool,

    /// Desired code length; values outside `[6, 12]` fall back to the default.
    #[serde(default, deserialize_with = "lenient_code_length")]
    pub code_length: Option<usize>,
}

/// A link as returned by the API.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub code: String,
    pub short_url: String,
    pub destination: String,
    pub is_public: bool,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl LinkResponse {
    pub fn new(link: Link, short_url: String) -> Self {
        Self {
            is_public: link.visibility.is_public(),
            code: link.code,
            short_url,
            destination: link.destination,
            click_count: link.click_count,
            created_at: link.created_at,
            owner: link.owner,
        }
    }
}

/// One page of the caller's links.
#[derive(Debug, Serialize)]
pub struct LinkListResponse {
    pub items: Vec<LinkResponse>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}
