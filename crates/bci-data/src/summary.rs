//! Event overview of a recording, used by `--inspect`.

use std::collections::BTreeMap;

use bci_core::models::{Annotation, TrueEvent};
use tracing::info;

use crate::recording::Recording;

/// Number of leading events listed in the log.
const PREVIEW_LEN: usize = 10;

/// Counts of each annotation code, in code order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub counts: BTreeMap<String, usize>,
    pub total: usize,
    pub first: Vec<Annotation>,
}

impl EventSummary {
    pub fn from_annotations(annotations: &[Annotation]) -> Self {
        let mut counts = BTreeMap::new();
        for annotation in annotations {
            *counts
                .entry(annotation.description.trim().to_uppercase())
                .or_insert(0) += 1;
        }
        Self {
            counts,
            total: annotations.len(),
            first: annotations.iter().take(PREVIEW_LEN).cloned().collect(),
        }
    }

    /// Number of trials that will drive the keys (T1 and T2).
    pub fn motor_imagery_trials(&self) -> usize {
        self.counts
            .iter()
            .filter(|(code, _)| TrueEvent::from_description(code).needs_prediction())
            .map(|(_, n)| n)
            .sum()
    }
}

/// Human-readable name of an annotation code.
pub fn event_label(description: &str) -> &'static str {
    match TrueEvent::from_description(description) {
        TrueEvent::Rest => "Rest",
        TrueEvent::Left => "Left_fist",
        TrueEvent::Right => "Right_fist",
        TrueEvent::Other => "Other",
    }
}

/// Log channel information and the event summary of a recording.
pub fn log_recording_summary(recording: &Recording) {
    info!(
        "{} channels at {} Hz, {:.1}s: {}",
        recording.channels().len(),
        recording.sfreq(),
        recording.duration(),
        recording.channels().join(", ")
    );

    let summary = EventSummary::from_annotations(recording.annotations());
    info!(
        "{} annotations, {} motor-imagery trials",
        summary.total,
        summary.motor_imagery_trials()
    );
    for (code, count) in &summary.counts {
        info!("  {:<6} {:<11} {}", code, event_label(code), count);
    }
    for annotation in &summary.first {
        info!(
            "  [{:>7.2}s] {:<4} {:<11} {:.2}s",
            annotation.onset,
            annotation.description,
            event_label(&annotation.description),
            annotation.duration
        );
    }
}
