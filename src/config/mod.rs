//! Pipeline configuration
//!
//! [`PipelineConfig`] is a serde document with defaults for every field, so a
//! partial JSON file is valid. [`ConfigStore`] persists it and serves
//! lock-free reads.

mod schema;
mod store;

pub use schema::*;
pub use store::{ConfigChange, ConfigStore};
