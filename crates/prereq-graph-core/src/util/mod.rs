//! Shared helpers

pub mod retry;

pub use retry::{retry_attempts, retry_on_lock};
