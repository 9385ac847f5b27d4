//! SQLite unresolved-hint queue

mod repository;

pub use repository::SqliteUnresolvedHintRepository;
