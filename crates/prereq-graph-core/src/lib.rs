//! prereq-graph core library
//!
//! Builds and maintains a weighted graph from prerequisite knowledge to the
//! exam topics that need it, fed by analyzed exam questions:
//! - Concept resolution with alias lookup and merge redirects
//! - Deterministic canonical keys and lifecycle classification
//! - Frequency-weighted topic edges with strength tiers
//! - Reviewer merges, label-only upgrades, relinks and deprecation
//! - Read models for learning paths, content gating and analytics
//! - SQLite storage with versioned migrations

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod storage;
pub mod util;

pub use error::{Error, Result};
pub use service::PrerequisiteGraphService;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::service::PrerequisiteGraphService;
    pub use crate::storage::Database;
}
