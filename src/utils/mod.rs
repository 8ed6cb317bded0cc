//! The `utils` module provides the shared plumbing used across `tourneysync`:
//! the crate-wide error type and logging initialisation.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
