//! Data layer for the playback controller.
//!
//! Loads EDF recordings and their annotations, applies the preprocessing the
//! classifier was trained with, and loads the classifier artifact.

pub mod edf;
pub mod model;
pub mod preprocess;
pub mod recording;
pub mod summary;

pub use bci_core as core;
