//! Shared read models, config, clock, and error definitions for weather-alert.

pub mod clock;
pub mod config;
pub mod error;
pub mod types;
pub mod wire;

pub use clock::{truncate_to_minute, Clock, FixedClock, SystemClock};
pub use config::AlertConfig;
pub use error::Error;
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
