use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A labelled time marker read from a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Seconds from the start of the recording.
    pub onset: f64,
    /// Length of the event in seconds.
    pub duration: f64,
    /// Short code such as `T0`, `T1` or `T2`.
    pub description: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: f64, description: impl Into<String>) -> Self {
        Self {
            onset,
            duration,
            description: description.into(),
        }
    }

    /// The event this annotation marks, derived from its description.
    pub fn true_event(&self) -> TrueEvent {
        TrueEvent::from_description(&self.description)
    }
}

/// What actually happened during a trial, according to the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrueEvent {
    Rest,
    Left,
    Right,
    Other,
}

impl TrueEvent {
    /// Map an annotation code to its event. Matching ignores case.
    pub fn from_description(description: &str) -> Self {
        match description.trim().to_uppercase().as_str() {
            "T0" => Self::Rest,
            "T1" => Self::Left,
            "T2" => Self::Right,
            _ => Self::Other,
        }
    }

    /// `true` for the two motor-imagery events that need a prediction.
    pub fn needs_prediction(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

impl fmt::Display for TrueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Rest => "REST",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Other => "OTHER",
        };
        f.write_str(s)
    }
}

/// The action sent to the actuator for a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Rest,
    Left,
    Right,
    /// Fallback when inference failed.
    Idle,
}

impl Action {
    /// Parse a class name from a model's `class_map` (`rest`, `left`, `right`).
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "rest" => Some(Self::Rest),
            "left" | "left_fist" => Some(Self::Left),
            "right" | "right_fist" => Some(Self::Right),
            _ => None,
        }
    }

    /// Whether this prediction agrees with the recorded event.
    pub fn matches(self, event: TrueEvent) -> bool {
        matches!(
            (self, event),
            (Self::Rest, TrueEvent::Rest)
                | (Self::Left, TrueEvent::Left)
                | (Self::Right, TrueEvent::Right)
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Rest => "REST",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Idle => "IDLE",
        };
        f.write_str(s)
    }
}

/// Offset range after an onset from which the classifier input is cut.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct FeatureWindow {
    pub tmin: f64,
    pub tmax: f64,
}

impl FeatureWindow {
    pub fn new(tmin: f64, tmax: f64) -> Self {
        Self { tmin, tmax }
    }

    /// Absolute `(start, stop)` seconds of the window for an event at `onset`.
    pub fn span_at(&self, onset: f64) -> (f64, f64) {
        (onset + self.tmin, onset + self.tmax)
    }
}

impl Default for FeatureWindow {
    fn default() -> Self {
        Self::new(1.0, 4.0)
    }
}

impl From<[f64; 2]> for FeatureWindow {
    fn from(v: [f64; 2]) -> Self {
        Self::new(v[0], v[1])
    }
}

impl From<FeatureWindow> for [f64; 2] {
    fn from(w: FeatureWindow) -> Self {
        [w.tmin, w.tmax]
    }
}

impl fmt::Display for FeatureWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.tmin, self.tmax)
    }
}

/// Classifier label → action table.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    entries: BTreeMap<i64, Action>,
}

impl LabelMap {
    /// Build the table from a model's `class_map` (`{"1": "rest", ...}`).
    pub fn from_class_map(class_map: &BTreeMap<String, String>) -> Result<Self, String> {
        let mut entries = BTreeMap::new();
        for (label, name) in class_map {
            let label: i64 = label
                .trim()
                .parse()
                .map_err(|_| format!("class label '{}' is not an integer", label))?;
            let action = Action::from_class_name(name)
                .ok_or_else(|| format!("class '{}' has no key action", name))?;
            entries.insert(label, action);
        }
        if entries.is_empty() {
            return Err("class map is empty".to_string());
        }
        Ok(Self { entries })
    }

    pub fn action_for(&self, label: i64) -> Option<Action> {
        self.entries.get(&label).copied()
    }
}

impl Default for LabelMap {
    fn default() -> Self {
        Self {
            entries: BTreeMap::from([(1, Action::Rest), (2, Action::Left), (3, Action::Right)]),
        }
    }
}

/// Result of processing one trial, kept for the run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialOutcome {
    pub onset: f64,
    pub duration: f64,
    pub description: String,
    pub true_event: TrueEvent,
    pub predicted: Action,
    /// Seconds slept to reach the onset on the playback timeline.
    pub waited_secs: f64,
    /// Reason inference failed, when `predicted` fell back to `IDLE`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl TrialOutcome {
    pub fn is_correct(&self) -> bool {
        self.predicted.matches(self.true_event)
    }
}
