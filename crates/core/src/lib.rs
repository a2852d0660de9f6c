#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Shared models and pure policy for the engagement orchestrator and the
//! popularity lifecycle.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod health;
pub mod ids;
pub mod model;
pub mod popularity;
pub mod quality;
pub mod tiers;
pub mod time;

pub use error::{PulseError, Result};
pub use ids::*;
pub use time::*;
