//! Schema module - configuration, genome records and progress types.

mod config;
mod progress;
mod record;

pub use config::*;
pub use progress::*;
pub use record::*;
