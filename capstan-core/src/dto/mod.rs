//! Creation requests
//!
//! Lightweight representations of domain entities used when asking the
//! store to create them. The store assigns the IDs.

pub mod job;
pub mod project;

pub use job::NewJob;
pub use project::NewProject;
