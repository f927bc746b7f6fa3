//! Repository implementations for database access
//!
//! Each repository follows these patterns:
//! - Borrows the shared [`Database`](crate::db::Database) handle; every statement runs through its retry executor
//! - Uses JOINs and window counts for list operations (no N+1)
//! - Handles conflicts via ON CONFLICT and unique violations (no check-then-insert)
//! - Uses transactions for multi-step writes

pub mod blogs;
pub mod calendar;
pub mod comments;
pub mod search;
pub mod tags;
pub mod votes;

pub use blogs::{BlogDetail, BlogPreview, BlogRef, BlogRepo};
pub use calendar::{CalendarEvent, CalendarRepo};
pub use comments::{Comment, CommentRepo};
pub use search::{SearchHit, SearchRepo};
pub use tags::{Tag, TagRepo, TagWithCount};
pub use votes::VoteRepo;
