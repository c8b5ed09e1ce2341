//! Separation API endpoints.

pub mod jobs;
pub mod library;
pub mod process;
