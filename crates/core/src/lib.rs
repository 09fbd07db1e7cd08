//! Content-release versioning and publication engine.
//!
//! Documents are published into releases; the release lifecycle decides which release
//! of a site is live, and the comparator diffs releases before promotion.

pub mod compare;
pub mod document;
pub mod error;
pub mod events;
pub mod publisher;
pub mod release;
pub mod sites;
pub mod storage;

pub use error::{ErrorCode, PublisherError, PublisherResult};
pub use publisher::Publisher;
