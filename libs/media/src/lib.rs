//! Collaborator clients and video workflows
//!
//! The platform delegates all heavy lifting to four external collaborators:
//! object storage ([`storage`]), video analysis ([`analysis`]), the
//! analytics warehouse ([`warehouse`]) and the CDN edge ([`edge`]).
//! [`indexing`] runs the background indexing task and the insight retrieval
//! transition; [`service`] composes everything into the request workflows.

pub mod analysis;
pub mod edge;
pub mod error;
pub mod indexing;
pub mod models;
pub mod service;
pub mod storage;
pub mod warehouse;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use error::{VideoError, VideoResult};
pub use indexing::{IndexOutcome, Indexer};
pub use service::VideoService;
