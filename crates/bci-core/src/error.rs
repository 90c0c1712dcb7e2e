use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while setting up a playback run.
///
/// Any of these stops the run before the playback loop starts.
#[derive(Error, Debug)]
pub enum BciError {
    /// The classifier artifact does not exist on disk.
    #[error("Model file not found at {0}")]
    ArtifactNotFound(PathBuf),

    /// The EDF recording does not exist on disk.
    #[error("EDF file not found at {0}")]
    RecordingNotFound(PathBuf),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The classifier artifact parsed but its contents are inconsistent.
    #[error("Invalid model artifact: {0}")]
    InvalidArtifact(String),

    /// The EDF recording could not be decoded.
    #[error("EDF error: {0}")]
    Edf(String),

    /// The band-pass filter could not be built or applied.
    #[error("Filter error: {0}")]
    Filter(String),

    /// Channels the model expects are absent from the recording.
    #[error("Missing channels in recording: {}", .0.join(", "))]
    MissingChannels(Vec<String>),

    /// The recording's channel order differs from the model's.
    #[error("Channel order mismatch: expected [{}], found [{}]", .expected.join(", "), .found.join(", "))]
    ChannelOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// The run's preprocessing parameters differ from the ones used in training.
    #[error("Preprocessing mismatch: {0}")]
    PreprocessingMismatch(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the bci crates.
pub type Result<T> = std::result::Result<T, BciError>;

/// Recoverable failure of a single trial's inference.
///
/// The playback loop turns every variant into the `IDLE` action for that trial.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrialError {
    /// The requested time range is not covered by the signal buffer.
    #[error("window [{start:.3}s, {stop:.3}s) outside recording of {duration:.3}s")]
    WindowOutOfRange { start: f64, stop: f64, duration: f64 },

    /// The requested time range contains no samples.
    #[error("window [{start:.3}s, {stop:.3}s) contains no samples")]
    EmptyWindow { start: f64, stop: f64 },

    /// The classifier input does not have the shape the model expects.
    #[error("expected input shape {expected:?}, got {found:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        found: (usize, usize, usize),
    },

    /// Feature extraction produced NaN or infinite values.
    #[error("non-finite features")]
    NonFiniteFeatures,

    /// The classifier returned a label with no mapped action.
    #[error("unknown label {0}")]
    UnknownLabel(i64),

    /// Any other classifier failure.
    #[error("classifier failed: {0}")]
    Classifier(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_artifact_not_found() {
        let err = BciError::ArtifactNotFound(PathBuf::from("/models/csp.json"));
        assert_eq!(err.to_string(), "Model file not found at /models/csp.json");
    }

    #[test]
    fn test_error_display_recording_not_found() {
        let err = BciError::RecordingNotFound(PathBuf::from("/data/S004R07.edf"));
        assert_eq!(err.to_string(), "EDF file not found at /data/S004R07.edf");
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = BciError::FileRead {
            path: PathBuf::from("/some/model.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/model.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_missing_channels() {
        let err = BciError::MissingChannels(vec!["C3".to_string(), "FCZ".to_string()]);
        assert_eq!(err.to_string(), "Missing channels in recording: C3, FCZ");
    }

    #[test]
    fn test_error_display_channel_order() {
        let err = BciError::ChannelOrder {
            expected: vec!["C3".to_string(), "C4".to_string()],
            found: vec!["C4".to_string(), "C3".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Channel order mismatch: expected [C3, C4], found [C4, C3]"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = BciError::Config("no model path".to_string());
        assert_eq!(err.to_string(), "Configuration error: no model path");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: BciError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: BciError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }

    #[test]
    fn test_trial_error_display_window() {
        let err = TrialError::WindowOutOfRange {
            start: 121.0,
            stop: 124.0,
            duration: 122.5,
        };
        assert_eq!(
            err.to_string(),
            "window [121.000s, 124.000s) outside recording of 122.500s"
        );
    }

    #[test]
    fn test_trial_error_display_unknown_label() {
        assert_eq!(TrialError::UnknownLabel(7).to_string(), "unknown label 7");
    }
}
