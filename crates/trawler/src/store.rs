//! Durable store operations backing provider checkpoints and dedup.
//!
//! Every write is insert-if-absent keyed by the source's natural identifier,
//! so replaying a write after a crash re-validates the existing row instead
//! of corrupting it.

pub mod bitbucket;
pub mod cgit;
mod errors;
pub mod github;

pub use errors::{Result, StoreError};
