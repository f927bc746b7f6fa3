//! Tag listing parameters

use serde::Deserialize;

use super::{ValidationError, ValidationErrors};

const MAX_TAG_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagListParams {
    pub popular: Option<String>,
    pub limit: Option<i64>,
}

/// Validated tag listing options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagListing {
    /// Only tags used by published posts, most used first
    pub popular: bool,
    pub limit: Option<i64>,
}

impl TagListParams {
    pub fn validate(&self) -> Result<TagListing, ValidationErrors> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_TAG_LIMIT).contains(&limit) {
                return Err(ValidationError::OutOfRange {
                    field: "limit",
                    min: 1,
                    max: MAX_TAG_LIMIT,
                }
                .into());
            }
        }
        Ok(TagListing {
            popular: self.popular.as_deref() == Some("true"),
            limit: self.limit,
        })
    }
}
