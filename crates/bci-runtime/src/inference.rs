//! One trial's inference: cut the feature window, classify, map to an action.

use bci_core::error::TrialError;
use bci_core::models::{Action, FeatureWindow, LabelMap};
use bci_data::model::Classifier;
use bci_data::recording::Recording;
use ndarray::Axis;

/// Classify the trial starting at `onset`.
///
/// Every failure is returned as a [`TrialError`]; the caller decides what
/// action to fall back to.
pub fn classify_trial<K: Classifier + ?Sized>(
    recording: &Recording,
    classifier: &K,
    window: FeatureWindow,
    labels: &LabelMap,
    onset: f64,
) -> Result<Action, TrialError> {
    let (start, stop) = window.span_at(onset);
    let block = recording.window(start, stop)?;

    let trial = block.insert_axis(Axis(0));
    let label = classifier.predict(trial)?;

    labels.action_for(label).ok_or(TrialError::UnknownLabel(label))
}
