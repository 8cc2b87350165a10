//! Common library for the video insights platform
//!
//! This crate provides functionality shared by the platform crates:
//! warehouse database connectivity and the error types used at the
//! boundary with external collaborators.

pub mod database;
pub mod error;
