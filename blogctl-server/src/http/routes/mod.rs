//! Route handlers organized by resource

pub mod blogs;
pub mod calendar;
pub mod comments;
pub mod health;
pub mod search;
pub mod tags;
pub mod votes;
