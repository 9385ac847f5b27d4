//! SQLite concept registry

mod repository;

pub use repository::SqliteConceptRepository;
pub(crate) use repository::ConceptRow;
