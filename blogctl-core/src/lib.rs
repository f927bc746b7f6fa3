//! blogctl-core: storage-agnostic building blocks for the blog backend.
//!
//! Nothing in this crate knows about HTTP or SQL. The data store is reached
//! through two small traits ([`Connector`] and [`SlugLookup`]) so the server
//! can plug in its Postgres pool and tests can plug in in-memory fakes.

pub mod classify;
pub mod read_time;
pub mod retry;
pub mod unique_slug;

pub use classify::{classify_signature, Classify, RetryClass};
pub use read_time::estimate_read_time;
pub use retry::{Connector, NoReconnect, RetryExecutor, RetryPolicy, DEFAULT_MAX_ATTEMPTS};
pub use unique_slug::{
    is_valid_slug, slugify, SlugAssigner, SlugError, SlugLookup, MAX_SUFFIX_PROBES,
};
