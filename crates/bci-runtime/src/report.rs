//! Per-run record of what was predicted for each trial.

use std::path::Path;

use bci_core::models::TrialOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcomes of one playback run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub started_at: DateTime<Utc>,
    /// Processed `T0` / `T1` / `T2` annotations, in playback order.
    pub trials: Vec<TrialOutcome>,
    /// Annotations ignored because their code is not a trial.
    pub skipped: usize,
}

impl PlaybackReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            trials: Vec::new(),
            skipped: 0,
        }
    }

    /// Fraction of left/right trials predicted correctly, `None` without any.
    pub fn accuracy(&self) -> Option<f64> {
        let scored: Vec<&TrialOutcome> = self
            .trials
            .iter()
            .filter(|t| t.true_event.needs_prediction())
            .collect();
        if scored.is_empty() {
            return None;
        }
        let correct = scored.iter().filter(|t| t.is_correct()).count();
        Some(correct as f64 / scored.len() as f64)
    }

    /// Number of trials whose inference failed.
    pub fn failures(&self) -> usize {
        self.trials.iter().filter(|t| t.error.is_some()).count()
    }

    /// Atomically write the report as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }
}

impl Default for PlaybackReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bci_core::models::{Action, TrueEvent};
    use tempfile::TempDir;

    fn outcome(true_event: TrueEvent, predicted: Action, error: Option<&str>) -> TrialOutcome {
        TrialOutcome {
            onset: 0.0,
            duration: 4.1,
            description: "T?".to_string(),
            true_event,
            predicted,
            waited_secs: 0.0,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_accuracy_ignores_rest_trials() {
        let mut report = PlaybackReport::new();
        report.trials = vec![
            outcome(TrueEvent::Rest, Action::Rest, None),
            outcome(TrueEvent::Left, Action::Left, None),
            outcome(TrueEvent::Right, Action::Left, None),
            outcome(TrueEvent::Right, Action::Idle, Some("boom")),
        ];
        let accuracy = report.accuracy().expect("has scored trials");
        assert!((accuracy - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn test_accuracy_none_without_motor_trials() {
        let mut report = PlaybackReport::new();
        report.trials = vec![outcome(TrueEvent::Rest, Action::Rest, None)];
        assert!(report.accuracy().is_none());
    }

    #[test]
    fn test_save_to_writes_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("reports").join("run.json");

        let mut report = PlaybackReport::new();
        report.trials.push(outcome(TrueEvent::Left, Action::Right, None));
        report.skipped = 2;
        report.save_to(&path).expect("save");

        let loaded: PlaybackReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.skipped, 2);
        assert_eq!(loaded.trials, report.trials);
        assert!(!path.with_extension("json.tmp").exists());
    }
}
