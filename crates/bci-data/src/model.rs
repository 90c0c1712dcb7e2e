//! Classifier seam and the CSP+LDA model artifact.
//!
//! The artifact is a JSON export of a trained pipeline: spatial filters from
//! common spatial patterns followed by a linear discriminant. Training happens
//! elsewhere; this module only runs inference.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use bci_core::error::{BciError, Result, TrialError};
use bci_core::models::{FeatureWindow, LabelMap};
use ndarray::{Array1, Array2, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Metadata ──────────────────────────────────────────────────────────────────

/// Metadata describing what a model was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Channel names in the order the model expects them.
    pub channels: Vec<String>,
    /// Seconds after onset used as the classifier input.
    #[serde(default)]
    pub feature_window: FeatureWindow,
    /// Label → class name, e.g. `{"1": "rest", "2": "left", "3": "right"}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_map: Option<BTreeMap<String, String>>,
    /// Sampling rate of the training data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sfreq: Option<f64>,
    /// Band-pass `[low, high]` applied before training.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<[f64; 2]>,
}

impl ModelMeta {
    /// Label → action table: the artifact's `class_map` when present,
    /// otherwise the default `{1: REST, 2: LEFT, 3: RIGHT}`.
    pub fn label_map(&self) -> Result<LabelMap> {
        match &self.class_map {
            Some(map) => LabelMap::from_class_map(map).map_err(BciError::InvalidArtifact),
            None => Ok(LabelMap::default()),
        }
    }
}

// ── Classifier ────────────────────────────────────────────────────────────────

/// A trained model that labels one trial.
pub trait Classifier {
    fn meta(&self) -> &ModelMeta;

    /// Predict the label of a `(1, channels, samples)` block.
    fn predict(&self, trial: ArrayView3<'_, f64>) -> std::result::Result<i64, TrialError>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn meta(&self) -> &ModelMeta {
        (**self).meta()
    }

    fn predict(&self, trial: ArrayView3<'_, f64>) -> std::result::Result<i64, TrialError> {
        (**self).predict(trial)
    }
}

// ── Artifact format ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Artifact {
    meta: ModelMeta,
    model: CspLdaParams,
}

#[derive(Debug, Deserialize)]
struct CspLdaParams {
    /// One spatial filter per row, one weight per channel.
    filters: Vec<Vec<f64>>,
    lda: LdaParams,
}

#[derive(Debug, Deserialize)]
struct LdaParams {
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
    classes: Vec<i64>,
}

// ── CspLdaModel ───────────────────────────────────────────────────────────────

/// Spatial filters + log-power features + linear discriminant.
#[derive(Debug, Clone)]
pub struct CspLdaModel {
    meta: ModelMeta,
    /// `(components, channels)`
    filters: Array2<f64>,
    /// `(rows, components)`; a single row means a binary problem.
    coef: Array2<f64>,
    intercept: Array1<f64>,
    classes: Vec<i64>,
}

impl CspLdaModel {
    /// Load an artifact from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.try_exists()? {
            return Err(BciError::ArtifactNotFound(path.to_path_buf()));
        }
        info!("Loading model from {}...", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| BciError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&content)?;

        info!(
            "Model and metadata loaded: {} channels, {} components, window {}s",
            model.meta.channels.len(),
            model.filters.nrows(),
            model.meta.feature_window
        );
        Ok(model)
    }

    /// Parse and validate an artifact from its JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let artifact: Artifact = serde_json::from_str(content)?;
        Self::from_artifact(artifact)
    }

    fn from_artifact(artifact: Artifact) -> Result<Self> {
        let Artifact { meta, model } = artifact;
        let n_channels = meta.channels.len();

        if n_channels == 0 {
            return Err(BciError::InvalidArtifact("no channels listed".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = meta.channels.iter().find(|ch| !seen.insert(ch.as_str())) {
            return Err(BciError::InvalidArtifact(format!("channel {} listed twice", dup)));
        }
        let window = meta.feature_window;
        if !(window.tmin.is_finite() && window.tmax.is_finite() && window.tmin < window.tmax) {
            return Err(BciError::InvalidArtifact(format!(
                "invalid feature window {}",
                window
            )));
        }

        let filters = to_array2(&model.filters, n_channels, "filters")?;
        let coef = to_array2(&model.lda.coef, filters.nrows(), "lda.coef")?;

        if model.lda.intercept.len() != coef.nrows() {
            return Err(BciError::InvalidArtifact(format!(
                "lda.intercept has {} values for {} coefficient rows",
                model.lda.intercept.len(),
                coef.nrows()
            )));
        }
        let expected_classes = if coef.nrows() == 1 { 2 } else { coef.nrows() };
        if model.lda.classes.len() != expected_classes {
            return Err(BciError::InvalidArtifact(format!(
                "lda.classes has {} labels, expected {}",
                model.lda.classes.len(),
                expected_classes
            )));
        }

        let labels = meta.label_map()?;
        for class in &model.lda.classes {
            if labels.action_for(*class).is_none() {
                warn!("Class {} has no key action; it will be treated as IDLE", class);
            }
        }

        Ok(Self {
            meta,
            filters,
            coef,
            intercept: Array1::from(model.lda.intercept),
            classes: model.lda.classes,
        })
    }

    /// Log of the mean power of each spatially filtered component.
    pub fn features(&self, block: ArrayView2<'_, f64>) -> std::result::Result<Array1<f64>, TrialError> {
        let projected = self.filters.dot(&block);
        let power = projected
            .mapv(|v| v * v)
            .mean_axis(Axis(1))
            .ok_or(TrialError::NonFiniteFeatures)?;
        let features = power.mapv(f64::ln);
        if features.iter().any(|f| !f.is_finite()) {
            return Err(TrialError::NonFiniteFeatures);
        }
        Ok(features)
    }

    fn decide(&self, features: &Array1<f64>) -> i64 {
        let scores = self.coef.dot(features) + &self.intercept;
        if scores.len() == 1 {
            return if scores[0] > 0.0 {
                self.classes[1]
            } else {
                self.classes[0]
            };
        }

        let mut best = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[best] {
                best = i;
            }
        }
        self.classes[best]
    }
}

impl Classifier for CspLdaModel {
    fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    fn predict(&self, trial: ArrayView3<'_, f64>) -> std::result::Result<i64, TrialError> {
        let (n_trials, n_channels, n_times) = trial.dim();
        let expected_channels = self.meta.channels.len();
        if n_trials != 1 || n_channels != expected_channels || n_times == 0 {
            return Err(TrialError::ShapeMismatch {
                expected: (1, expected_channels, n_times.max(1)),
                found: (n_trials, n_channels, n_times),
            });
        }

        let features = self.features(trial.index_axis(Axis(0), 0))?;
        Ok(self.decide(&features))
    }
}

fn to_array2(rows: &[Vec<f64>], width: usize, name: &str) -> Result<Array2<f64>> {
    if rows.is_empty() {
        return Err(BciError::InvalidArtifact(format!("{} is empty", name)));
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != width) {
        return Err(BciError::InvalidArtifact(format!(
            "{} row {} has {} values, expected {}",
            name,
            bad,
            rows[bad].len(),
            width
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), width), flat)
        .map_err(|e| BciError::InvalidArtifact(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bci_core::models::Action;
    use ndarray::Array3;
    use tempfile::TempDir;

    /// Identity filters over two channels; class 1 when powers are equal,
    /// 2 when C3 dominates, 3 when C4 dominates.
    const THREE_CLASS: &str = r#"{
        "meta": {
            "channels": ["C3", "C4"],
            "feature_window": [1.0, 4.0],
            "class_map": {"1": "rest", "2": "left", "3": "right"},
            "sfreq": 160.0,
            "band": [8.0, 30.0]
        },
        "model": {
            "filters": [[1.0, 0.0], [0.0, 1.0]],
            "lda": {
                "coef": [[0.0, 0.0], [1.0, -1.0], [-1.0, 1.0]],
                "intercept": [0.1, 0.0, 0.0],
                "classes": [1, 2, 3]
            }
        }
    }"#;

    const BINARY: &str = r#"{
        "meta": { "channels": ["C3", "C4"] },
        "model": {
            "filters": [[1.0, 0.0], [0.0, 1.0]],
            "lda": { "coef": [[1.0, -1.0]], "intercept": [0.0], "classes": [2, 3] }
        }
    }"#;

    fn trial(amp_c3: f64, amp_c4: f64) -> Array3<f64> {
        Array3::from_shape_fn((1, 2, 8), |(_, ch, t)| {
            let sign = if t % 2 == 0 { 1.0 } else { -1.0 };
            sign * if ch == 0 { amp_c3 } else { amp_c4 }
        })
    }

    #[test]
    fn test_three_class_prediction() {
        let model = CspLdaModel::from_json(THREE_CLASS).expect("valid artifact");
        assert_eq!(model.predict(trial(1.0, 1.0).view()), Ok(1));
        assert_eq!(model.predict(trial(2.0, 1.0).view()), Ok(2));
        assert_eq!(model.predict(trial(1.0, 2.0).view()), Ok(3));
    }

    #[test]
    fn test_binary_prediction() {
        let model = CspLdaModel::from_json(BINARY).expect("valid artifact");
        assert_eq!(model.predict(trial(2.0, 1.0).view()), Ok(3));
        assert_eq!(model.predict(trial(1.0, 2.0).view()), Ok(2));
        assert_eq!(model.meta().feature_window, FeatureWindow::default());
    }

    #[test]
    fn test_features_are_log_power() {
        let model = CspLdaModel::from_json(BINARY).unwrap();
        let block = trial(2.0, 1.0);
        let features = model.features(block.index_axis(Axis(0), 0)).unwrap();
        assert!((features[0] - 4.0_f64.ln()).abs() < 1e-12);
        assert!(features[1].abs() < 1e-12);
    }

    #[test]
    fn test_predict_rejects_wrong_channel_count() {
        let model = CspLdaModel::from_json(THREE_CLASS).unwrap();
        let block = Array3::<f64>::ones((1, 3, 8));
        assert!(matches!(
            model.predict(block.view()),
            Err(TrialError::ShapeMismatch { found: (1, 3, 8), .. })
        ));
    }

    #[test]
    fn test_predict_rejects_flat_signal() {
        let model = CspLdaModel::from_json(THREE_CLASS).unwrap();
        let block = Array3::<f64>::zeros((1, 2, 8));
        assert_eq!(model.predict(block.view()), Err(TrialError::NonFiniteFeatures));
    }

    #[test]
    fn test_label_map_from_meta() {
        let model = CspLdaModel::from_json(THREE_CLASS).unwrap();
        let labels = model.meta().label_map().unwrap();
        assert_eq!(labels.action_for(2), Some(Action::Left));
        assert_eq!(model.meta().band, Some([8.0, 30.0]));
        assert_eq!(model.meta().sfreq, Some(160.0));
    }

    #[test]
    fn test_invalid_artifacts() {
        let wrong_filter_width = THREE_CLASS.replace("[[1.0, 0.0], [0.0, 1.0]]", "[[1.0, 0.0, 0.0]]");
        assert!(matches!(
            CspLdaModel::from_json(&wrong_filter_width),
            Err(BciError::InvalidArtifact(_))
        ));

        let wrong_intercept = THREE_CLASS.replace("[0.1, 0.0, 0.0]", "[0.1]");
        assert!(matches!(
            CspLdaModel::from_json(&wrong_intercept),
            Err(BciError::InvalidArtifact(_))
        ));

        let duplicate_channel = THREE_CLASS.replace(r#"["C3", "C4"]"#, r#"["C3", "C3"]"#);
        assert!(matches!(
            CspLdaModel::from_json(&duplicate_channel),
            Err(BciError::InvalidArtifact(_))
        ));

        let inverted_window = THREE_CLASS.replace("[1.0, 4.0]", "[4.0, 1.0]");
        assert!(matches!(
            CspLdaModel::from_json(&inverted_window),
            Err(BciError::InvalidArtifact(_))
        ));

        assert!(matches!(
            CspLdaModel::from_json("{not json"),
            Err(BciError::JsonParse(_))
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("model.json");
        std::fs::write(&path, THREE_CLASS).unwrap();

        let model = CspLdaModel::load(&path).expect("load");
        assert_eq!(model.meta().channels, vec!["C3", "C4"]);
    }

    #[test]
    fn test_load_missing_artifact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.json");
        assert!(matches!(
            CspLdaModel::load(&path),
            Err(BciError::ArtifactNotFound(p)) if p == path
        ));
    }
}
