use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{BciError, Result};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Replay an EEG recording and drive the arrow keys from motor-imagery predictions
#[derive(Parser, Debug, Clone)]
#[command(
    name = "bci-control",
    about = "Replay an EEG recording and drive the arrow keys from motor-imagery predictions",
    version
)]
pub struct Settings {
    /// Path to the trained CSP+LDA model artifact (JSON)
    #[arg(long, env = "BCI_MODEL")]
    pub model: Option<PathBuf>,

    /// Path to the EDF recording to replay
    #[arg(long, env = "BCI_RECORDING")]
    pub recording: Option<PathBuf>,

    /// Band-pass low cut-off in Hz
    #[arg(long, default_value = "8.0")]
    pub l_freq: f64,

    /// Band-pass high cut-off in Hz
    #[arg(long, default_value = "30.0")]
    pub h_freq: f64,

    /// Butterworth filter order (1-8)
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u32).range(1..=8))]
    pub filter_order: u32,

    /// Seconds to wait before playback starts (0-60)
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(0..=60))]
    pub start_delay: u64,

    /// Where key presses go
    #[arg(long, default_value = "keyboard", value_parser = ["keyboard", "log"])]
    pub actuator: String,

    /// Write a JSON report of every trial to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Print recording and event information, then exit without playback
    #[arg(long)]
    pub inspect: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.bci-control/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actuator: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    /// Uses `~/.bci-control/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".bci-control").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI (and env) always win over persisted values.
        if settings.model.is_none() {
            settings.model = last.model;
        }
        if settings.recording.is_none() {
            settings.recording = last.recording;
        }
        if !is_arg_explicitly_set(&matches, "l_freq") {
            if let Some(v) = last.l_freq {
                settings.l_freq = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "h_freq") {
            if let Some(v) = last.h_freq {
                settings.h_freq = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "start_delay") {
            if let Some(v) = last.start_delay {
                settings.start_delay = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "actuator") {
            if let Some(v) = last.actuator {
                settings.actuator = v;
            }
        }

        settings = Self::apply_debug(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// `--debug` overrides the log level.
    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Path of the model artifact, or a configuration error when none was given.
    pub fn model_path(&self) -> Result<&Path> {
        self.model
            .as_deref()
            .ok_or_else(|| BciError::Config("no model artifact given (use --model)".to_string()))
    }

    /// Path of the EDF recording, or a configuration error when none was given.
    pub fn recording_path(&self) -> Result<&Path> {
        self.recording
            .as_deref()
            .ok_or_else(|| BciError::Config("no recording given (use --recording)".to_string()))
    }

    /// Check the band-pass settings describe a usable band.
    pub fn validate_band(&self) -> Result<()> {
        if !(self.l_freq > 0.0 && self.l_freq < self.h_freq) {
            return Err(BciError::Config(format!(
                "invalid band {} - {} Hz",
                self.l_freq, self.h_freq
            )));
        }
        Ok(())
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            model: s.model.clone(),
            recording: s.recording.clone(),
            l_freq: Some(s.l_freq),
            h_freq: Some(s.h_freq),
            start_delay: Some(s.start_delay),
            actuator: Some(s.actuator.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
