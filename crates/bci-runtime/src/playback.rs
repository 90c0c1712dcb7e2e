//! Real-time replay of annotations: wait, classify, drive the keys.

use std::time::Duration;

use bci_core::error::Result;
use bci_core::models::{Action, Annotation, FeatureWindow, LabelMap, TrialOutcome, TrueEvent};
use bci_data::model::Classifier;
use bci_data::preprocess::verify_channel_order;
use bci_data::recording::Recording;
use tracing::{debug, info, warn};

use crate::actuator::{Actuator, KeyState};
use crate::clock::Clock;
use crate::inference::classify_trial;
use crate::report::PlaybackReport;

/// How long to sleep so that `onset` lines up with the playback timeline.
///
/// Onsets already in the past, negative or not finite yield zero.
pub fn schedule_wait(onset: f64, elapsed: Duration) -> Duration {
    Duration::try_from_secs_f64(onset)
        .unwrap_or(Duration::ZERO)
        .saturating_sub(elapsed)
}

/// Per-trial log line: onset, raw code, true event and the action taken.
pub fn trial_line(annotation: &Annotation, true_event: TrueEvent, predicted: Action) -> String {
    format!(
        "[{:.2}s] Event: {} ({}) -> Model Predicted: {}",
        annotation.onset, annotation.description, true_event, predicted
    )
}

/// Drives one playback run over a preprocessed recording.
pub struct PlaybackLoop<'a, K: ?Sized, A, C> {
    recording: &'a Recording,
    classifier: &'a K,
    labels: LabelMap,
    window: FeatureWindow,
    actuator: A,
    clock: C,
    keys: KeyState,
    report: PlaybackReport,
}

impl<'a, K, A, C> PlaybackLoop<'a, K, A, C>
where
    K: Classifier + ?Sized,
    A: Actuator,
    C: Clock,
{
    /// Fails when the recording's channels are not exactly the model's, in order,
    /// or when the model's class map is unusable.
    pub fn new(recording: &'a Recording, classifier: &'a K, actuator: A, clock: C) -> Result<Self> {
        let meta = classifier.meta();
        verify_channel_order(recording, meta)?;
        let labels = meta.label_map()?;

        Ok(Self {
            recording,
            classifier,
            labels,
            window: meta.feature_window,
            actuator,
            clock,
            keys: KeyState::Released,
            report: PlaybackReport::new(),
        })
    }

    /// Replay `annotations` in order, then release both keys.
    ///
    /// Dropping the returned future stops playback between steps; call
    /// [`release_keys`](Self::release_keys) afterwards.
    pub async fn run(&mut self, annotations: &[Annotation]) {
        info!(
            "Starting BCI simulation over {} annotations ({} window)",
            annotations.len(),
            self.window
        );
        let origin = self.clock.now();

        for annotation in annotations {
            let elapsed = self.clock.now().saturating_sub(origin);
            let wait = schedule_wait(annotation.onset, elapsed);
            if !wait.is_zero() {
                self.clock.sleep(wait).await;
            }

            let true_event = annotation.true_event();
            let (predicted, error) = match true_event {
                TrueEvent::Other => {
                    debug!("[{:.2}s] Skipping {}", annotation.onset, annotation.description);
                    self.report.skipped += 1;
                    continue;
                }
                TrueEvent::Rest => (Action::Rest, None),
                TrueEvent::Left | TrueEvent::Right => {
                    match classify_trial(
                        self.recording,
                        self.classifier,
                        self.window,
                        &self.labels,
                        annotation.onset,
                    ) {
                        Ok(action) => (action, None),
                        Err(e) => {
                            warn!("Error during prediction at {:.2}s: {}", annotation.onset, e);
                            (Action::Idle, Some(e.to_string()))
                        }
                    }
                }
            };

            info!("{}", trial_line(annotation, true_event, predicted));

            self.keys = self.keys.apply(predicted, &mut self.actuator);
            self.report.trials.push(TrialOutcome {
                onset: annotation.onset,
                duration: annotation.duration,
                description: annotation.description.clone(),
                true_event,
                predicted,
                waited_secs: wait.as_secs_f64(),
                error,
            });

            let hold = Duration::try_from_secs_f64(annotation.duration).unwrap_or(Duration::ZERO);
            if !hold.is_zero() {
                self.clock.sleep(hold).await;
            }
        }

        info!("BCI Simulation Finished");
        self.release_keys();
    }

    /// Release both keys. Safe to call any number of times.
    pub fn release_keys(&mut self) {
        self.keys = KeyState::release_all(&mut self.actuator);
    }

    pub fn key_state(&self) -> KeyState {
        self.keys
    }

    pub fn report(&self) -> &PlaybackReport {
        &self.report
    }

    pub fn into_report(self) -> PlaybackReport {
        self.report
    }
}
