pub mod config;
pub mod errors;
pub mod input;
pub mod seq;
pub mod types;

pub use config::SessionConfig;
pub use errors::ConfigError;
pub use input::*;
pub use seq::{seq16_diff, seq16_le, seq16_lt, seq16_range};
pub use types::*;
