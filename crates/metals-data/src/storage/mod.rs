//! 멱등 저장소.

pub mod schema;
pub mod store;

pub use store::{MetalsStore, SeriesSelector};
