//! Domain layer
//!
//! Contains the graph rules, the services that apply them, and the
//! repository traits they are written against.

pub mod concepts;
pub mod curriculum;
pub mod hints;
pub mod ingestion;
pub mod prerequisites;
