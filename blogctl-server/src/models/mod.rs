//! Request payloads, wire enums and their validation
//!
//! Handlers deserialize loosely (strings, options) and call `validate()` so a
//! bad request is reported field by field instead of as a serde rejection.

pub mod blog;
pub mod calendar;
pub mod comment;
mod enums;
mod pagination;
pub mod search;
mod slug;
pub mod tag;
mod validation;
pub mod vote;

pub use blog::{BlogFilter, BlogListParams, BlogPatch, BlogRequest, NewBlock, NewBlog, NewLink, TagRef};
pub use calendar::{EventPatch, EventRange, EventRangeParams, EventRequest, NewEvent};
pub use comment::{CommentListParams, CommentRequest, CommentStatusRequest, NewComment};
pub use enums::{
    BlockType, BlogSort, BlogStatus, CommentSort, CommentStatus, EventColor, LayoutType, LinkType,
    VoteType,
};
pub use pagination::{Paginated, Pagination, PaginationMeta, PaginationParams};
pub use search::{relevance_score, SearchParams, SearchQuery};
pub use slug::Slug;
pub use tag::{TagListParams, TagListing};
pub use validation::{ValidationError, ValidationErrors};
pub use vote::{VoteRequest, Voter, VotingStats};
