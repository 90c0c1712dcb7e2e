//! Runtime layer for the BCI controller.
//!
//! Replays a preprocessed recording in real time, classifies each
//! motor-imagery trial and turns the predictions into arrow-key holds.

pub mod actuator;
pub mod clock;
pub mod inference;
pub mod playback;
pub mod report;

pub use bci_core as core;
pub use bci_data as data;

pub use actuator::{Actuator, Direction, KeyState, LogActuator, XdotoolActuator};
pub use clock::{Clock, TokioClock};
pub use playback::PlaybackLoop;
pub use report::PlaybackReport;
