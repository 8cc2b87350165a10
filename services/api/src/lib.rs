//! HTTP surface of the video insights platform

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod validation;

pub use state::AppState;
