//! Shared types for the motor-imagery playback controller.
//!
//! Holds the annotation and action model, the error enums used across the
//! workspace, and the command-line settings.

pub mod error;
pub mod models;
pub mod settings;

pub use error::{BciError, Result, TrialError};
