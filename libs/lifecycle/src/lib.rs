//! Video lifecycle tracking
//!
//! Models a video's processing status and owns the two process-local
//! mappings of the platform: video id to [`VideoRecord`] and video id to the
//! external analysis [`JobRef`]. Every mutation of a record goes through a
//! [`VideoStore`] operation.

pub mod error;
pub mod models;
pub mod store;

pub use error::{LifecycleError, LifecycleResult};
pub use models::{JobRef, VideoRecord, VideoStatus};
pub use store::{InMemoryVideoStore, VideoStore};
