//! EDF / EDF+ loading.
//!
//! Signal channels become a [`Recording`] in volts; the `EDF Annotations`
//! channel is decoded from its time-stamped annotation lists (TALs).

use std::path::Path;

use bci_core::error::{BciError, Result};
use bci_core::models::Annotation;
use edf_reader::model::EDFChannel;
use local_edf_reader::init_sync_reader;
use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::recording::Recording;

const ANNOTATION_LABEL: &str = "EDF Annotations";

/// Load an EDF file into a [`Recording`].
pub fn load_recording(path: &Path) -> Result<Recording> {
    if !path.try_exists()? {
        return Err(BciError::RecordingNotFound(path.to_path_buf()));
    }

    let path_str = path.to_string_lossy().into_owned();
    let edf_reader = init_sync_reader(&path_str)
        .map_err(|e| BciError::Edf(format!("cannot open {}: {}", path.display(), e)))?;

    let header = &edf_reader.edf_header;
    if header.channels.is_empty() {
        return Err(BciError::Edf("no channels in EDF file".to_string()));
    }

    let block_duration_ms = header.block_duration as f64;
    let total_duration_ms = header.number_of_blocks * header.block_duration;
    if block_duration_ms <= 0.0 {
        return Err(BciError::Edf("data records have zero duration".to_string()));
    }

    let data = edf_reader
        .read_data_window(0, total_duration_ms)
        .map_err(|e| BciError::Edf(format!("cannot read samples: {}", e)))?;
    if data.len() != header.channels.len() {
        return Err(BciError::Edf(format!(
            "header lists {} channels but {} were read",
            header.channels.len(),
            data.len()
        )));
    }

    let mut names = Vec::new();
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut sfreq: Option<f64> = None;
    let mut annotations = Vec::new();

    for (channel, samples) in header.channels.iter().zip(&data) {
        let label = channel.label.trim();

        if label.contains(ANNOTATION_LABEL) {
            let bytes = samples_to_bytes(
                samples,
                channel.physical_minimum as f64,
                channel.physical_maximum as f64,
                channel.digital_minimum as f64,
                channel.digital_maximum as f64,
            );
            annotations.extend(parse_tals(&bytes));
            continue;
        }

        let rate = channel_sfreq(channel, block_duration_ms);
        match sfreq {
            None => sfreq = Some(rate),
            Some(expected) if (expected - rate).abs() > 1e-9 => {
                return Err(BciError::Edf(format!(
                    "channel {} is sampled at {} Hz, expected {} Hz",
                    label, rate, expected
                )));
            }
            Some(_) => {}
        }

        let scale = unit_scale(&channel.physical_dimension);
        rows.push(samples.iter().map(|&v| v as f64 * scale).collect());
        names.push(label.to_string());
    }

    let sfreq = sfreq.ok_or_else(|| BciError::Edf("no signal channels in EDF file".to_string()))?;
    let n_times = rows[0].len();
    if rows.iter().any(|r| r.len() != n_times) {
        return Err(BciError::Edf("channels have different lengths".to_string()));
    }

    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    let array = Array2::from_shape_vec((names.len(), n_times), flat)
        .map_err(|e| BciError::Edf(e.to_string()))?;

    if annotations.is_empty() {
        warn!("No annotations found in {}", path.display());
    }
    sort_by_onset(&mut annotations);

    info!(
        "Loaded {}: {} channels at {} Hz, {:.1}s, {} annotations",
        path.display(),
        names.len(),
        sfreq,
        n_times as f64 / sfreq,
        annotations.len()
    );

    Recording::new(names, sfreq, array, annotations)
}

/// Samples per second of one channel; record durations are in milliseconds.
fn channel_sfreq(channel: &EDFChannel, block_duration_ms: f64) -> f64 {
    channel.number_of_samples_in_data_record as f64 * 1000.0 / block_duration_ms
}

/// Multiplier that converts a channel's physical unit to volts.
pub fn unit_scale(physical_dimension: &str) -> f64 {
    match physical_dimension.trim().to_lowercase().as_str() {
        "uv" | "µv" | "μv" => 1e-6,
        "mv" => 1e-3,
        "nv" => 1e-9,
        _ => 1.0,
    }
}

/// Recover the raw bytes of an annotation channel from its physical values.
///
/// Each 16-bit digital sample carries two little-endian bytes.
pub fn samples_to_bytes(
    samples: &[f32],
    physical_min: f64,
    physical_max: f64,
    digital_min: f64,
    digital_max: f64,
) -> Vec<u8> {
    let physical_span = physical_max - physical_min;
    let digital_span = digital_max - digital_min;

    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &value in samples {
        let value = value as f64;
        let digital = if physical_span.abs() > f64::EPSILON {
            (value - physical_min) / physical_span * digital_span + digital_min
        } else {
            value
        };
        let word = digital.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16 as u16;
        bytes.push((word & 0xFF) as u8);
        bytes.push((word >> 8) as u8);
    }
    bytes
}

/// Parse EDF+ TALs into annotations.
///
/// Onsets are made relative to the first time-keeping TAL. Time-keeping TALs
/// themselves produce no annotation.
pub fn parse_tals(bytes: &[u8]) -> Vec<Annotation> {
    let text = String::from_utf8_lossy(bytes);
    let mut first_timestamp: Option<f64> = None;
    let mut annotations = Vec::new();

    for tal in text.split('\0') {
        if tal.trim().is_empty() {
            continue;
        }

        let mut fields = tal.split('\x14');
        let Some(timing) = fields.next() else {
            continue;
        };
        let (onset_str, duration_str) = match timing.split_once('\x15') {
            Some((onset, duration)) => (onset, Some(duration)),
            None => (timing, None),
        };
        let Some(onset) = parse_seconds(onset_str) else {
            debug!("Skipping TAL with unreadable onset: {:?}", timing);
            continue;
        };

        let texts: Vec<&str> = fields.map(str::trim).filter(|s| !s.is_empty()).collect();
        if texts.is_empty() {
            if first_timestamp.is_none() {
                first_timestamp = Some(onset);
            }
            continue;
        }

        let duration = duration_str
            .and_then(parse_seconds)
            .filter(|d| *d >= 0.0)
            .unwrap_or(0.0);
        for description in texts {
            annotations.push(Annotation::new(onset, duration, description));
        }
    }

    let offset = first_timestamp.unwrap_or(0.0);
    for annotation in &mut annotations {
        annotation.onset = (annotation.onset - offset).max(0.0);
    }
    annotations
}

fn parse_seconds(s: &str) -> Option<f64> {
    let s = s.trim();
    let value: f64 = s.strip_prefix('+').unwrap_or(s).parse().ok()?;
    value.is_finite().then_some(value)
}

/// Stable sort by onset; ties keep file order.
fn sort_by_onset(annotations: &mut [Annotation]) {
    annotations.sort_by(|a, b| a.onset.total_cmp(&b.onset));
}
