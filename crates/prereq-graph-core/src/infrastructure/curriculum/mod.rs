//! SQLite curriculum registry and analyzed-question source

mod repository;

pub use repository::SqliteCurriculumRepository;
pub(crate) use repository::TopicRow;
