//! Preprocessing that must match what the model was trained on.
//!
//! Order: normalise channel names, average reference, zero-phase band-pass,
//! then pick the model's channels in the model's order.

use std::collections::HashSet;

use bci_core::error::{BciError, Result};
use butterworth::{Cutoff, Filter};
use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info};

use crate::model::ModelMeta;
use crate::recording::Recording;

/// Band-pass parameters for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub l_freq: f64,
    pub h_freq: f64,
    pub order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            l_freq: 8.0,
            h_freq: 30.0,
            order: 4,
        }
    }
}

/// Run the full chain and return a recording that matches `meta`.
pub fn preprocess(recording: Recording, meta: &ModelMeta, config: &FilterConfig) -> Result<Recording> {
    info!("Applying preprocessing steps to match model training...");

    check_training_parameters(recording.sfreq(), meta, config)?;

    let (channels, sfreq, mut data, annotations) = recording.into_parts();
    let channels = normalize_channel_names(&channels)?;

    average_reference(&mut data);
    bandpass(&mut data, sfreq, config)?;

    let recording = Recording::new(channels, sfreq, data, annotations)?;
    let picked = pick_channels(&recording, &meta.channels)?;
    verify_channel_order(&picked, meta)?;

    info!("Preprocessing complete: {} channels", picked.channels().len());
    Ok(picked)
}

/// Strip surrounding dots and upper-case, e.g. `Fc5.` → `FC5`.
pub fn normalize_channel_name(name: &str) -> String {
    name.trim().trim_matches('.').to_uppercase()
}

fn normalize_channel_names(channels: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut renamed = Vec::with_capacity(channels.len());
    for original in channels {
        let name = normalize_channel_name(original);
        if !seen.insert(name.clone()) {
            return Err(BciError::Edf(format!(
                "channel {} collides with another channel after renaming",
                original
            )));
        }
        renamed.push(name);
    }
    Ok(renamed)
}

/// Subtract the across-channel mean from every sample.
pub fn average_reference(data: &mut Array2<f64>) {
    if let Some(mean) = data.mean_axis(Axis(0)) {
        *data -= &mean;
    }
}

/// Zero-phase Butterworth band-pass applied to every channel in place.
pub fn bandpass(data: &mut Array2<f64>, sfreq: f64, config: &FilterConfig) -> Result<()> {
    let nyquist = sfreq / 2.0;
    if !(config.l_freq > 0.0 && config.l_freq < config.h_freq && config.h_freq < nyquist) {
        return Err(BciError::Filter(format!(
            "band {} - {} Hz is not valid at {} Hz sampling",
            config.l_freq, config.h_freq, sfreq
        )));
    }

    let filter = Filter::new(config.order, sfreq, Cutoff::BandPass(config.l_freq, config.h_freq))
        .map_err(|e| BciError::Filter(e.to_string()))?;

    for mut row in data.axis_iter_mut(Axis(0)) {
        let row_vec = row.to_vec();
        let filtered = filter
            .bidirectional(&row_vec)
            .map_err(|e| BciError::Filter(e.to_string()))?;
        row.assign(&Array1::from(filtered));
    }

    debug!(
        "Band-pass {}-{} Hz (order {}) applied to {} channels",
        config.l_freq,
        config.h_freq,
        config.order,
        data.nrows()
    );
    Ok(())
}

/// Keep only `expected` channels, in that order. Any absent channel is fatal.
pub fn pick_channels(recording: &Recording, expected: &[String]) -> Result<Recording> {
    let available = recording.channels();
    let mut indices = Vec::with_capacity(expected.len());
    let mut missing = Vec::new();

    for name in expected {
        match available.iter().position(|ch| ch == name) {
            Some(i) => indices.push(i),
            None => missing.push(name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(BciError::MissingChannels(missing));
    }

    let data = recording.data().select(Axis(0), &indices);
    Recording::new(
        expected.to_vec(),
        recording.sfreq(),
        data,
        recording.annotations().to_vec(),
    )
}

/// The buffer handed to playback must list exactly the model's channels, in order.
pub fn verify_channel_order(recording: &Recording, meta: &ModelMeta) -> Result<()> {
    if recording.channels() != meta.channels.as_slice() {
        return Err(BciError::ChannelOrder {
            expected: meta.channels.clone(),
            found: recording.channels().to_vec(),
        });
    }
    Ok(())
}

/// Compare the run's sampling rate and band with what the artifact recorded.
pub fn check_training_parameters(sfreq: f64, meta: &ModelMeta, config: &FilterConfig) -> Result<()> {
    if let Some(trained) = meta.sfreq {
        if (trained - sfreq).abs() > 1e-6 {
            return Err(BciError::PreprocessingMismatch(format!(
                "model trained at {} Hz, recording sampled at {} Hz",
                trained, sfreq
            )));
        }
    }
    if let Some([low, high]) = meta.band {
        if (low - config.l_freq).abs() > 1e-6 || (high - config.h_freq).abs() > 1e-6 {
            return Err(BciError::PreprocessingMismatch(format!(
                "model trained on {} - {} Hz, run filters {} - {} Hz",
                low, high, config.l_freq, config.h_freq
            )));
        }
    }
    Ok(())
}
