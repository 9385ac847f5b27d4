//! Storage layer - SQLite pool, migrations and registry snapshots
//!
//! # Architecture
//!
//! - `database`: Connection pool management and initialization
//! - `migrations`: Schema versioning and automatic migration
//! - `snapshot`: JSON import of the upstream registries for tooling and tests
//!
//! # Usage
//!
//! ```ignore
//! use prereq_graph_core::storage::Database;
//!
//! // Create an in-memory database for testing
//! let db = Database::in_memory().await?;
//! let pool = db.pool().clone();
//! ```

pub mod database;
pub mod migrations;
pub mod snapshot;

// Re-export commonly used types
pub use database::{Database, DatabaseConfig, default_database_path};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
pub use snapshot::{ImportResult, RegistrySnapshot, import_snapshot, import_snapshot_file, load_snapshot};
