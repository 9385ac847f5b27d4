//! SQLite prerequisite graph storage

mod repository;
mod reviewer;
mod rows;

pub use repository::SqlitePrerequisiteGraphRepository;
