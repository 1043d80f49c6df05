//! Data module - CSV loading, schema and derived columns

mod loader;
mod processor;
pub mod schema;

pub use loader::{parse_timestamp_millis, DataLoader, LoaderError};
pub use processor::{rank_within_groups, DataProcessor, ProcessorError};
