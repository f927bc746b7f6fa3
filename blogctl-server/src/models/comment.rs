//! Reader comments

use serde::Deserialize;

use super::validation::required_text;
use super::{CommentSort, CommentStatus, Pagination, PaginationParams, ValidationErrors};

const MAX_NAME_LEN: usize = 255;
const MAX_COMMENT_LEN: usize = 5000;

pub const COMMENT_PAGE_DEFAULT: u32 = 20;
pub const COMMENT_PAGE_MAX: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub comment: String,
}

/// Validated comment body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub name: String,
    pub comment: String,
}

impl CommentRequest {
    pub fn validate(self) -> Result<NewComment, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = errors.check(required_text("name", &self.name, MAX_NAME_LEN));
        let comment = errors.check(required_text("comment", &self.comment, MAX_COMMENT_LEN));
        errors.finish()?;

        Ok(NewComment {
            name: name.unwrap_or_default(),
            comment: comment.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentStatusRequest {
    #[serde(default)]
    pub status: String,
}

impl CommentStatusRequest {
    pub fn validate(&self) -> Result<CommentStatus, ValidationErrors> {
        if self.status.trim().is_empty() {
            return Err(super::ValidationError::Empty { field: "status" }.into());
        }
        Ok(CommentStatus::parse(&self.status)?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

impl CommentListParams {
    pub fn validate(&self) -> Result<(CommentSort, Pagination), ValidationErrors> {
        let page = Pagination::from_params(
            &PaginationParams {
                page: self.page,
                limit: self.limit,
            },
            COMMENT_PAGE_DEFAULT,
            COMMENT_PAGE_MAX,
        )?;
        let sort = match self.sort.as_deref() {
            Some(s) => CommentSort::parse(s)?,
            None => CommentSort::default(),
        };
        Ok((sort, page))
    }
}
