//! Continuous multi-channel signal buffer addressable by time.

use bci_core::error::{BciError, Result, TrialError};
use bci_core::models::Annotation;
use ndarray::{s, Array2, ArrayView2};

/// A loaded recording: channel-major samples plus its annotations.
#[derive(Debug, Clone)]
pub struct Recording {
    channels: Vec<String>,
    sfreq: f64,
    /// Shape `(channels, samples)`, values in volts.
    data: Array2<f64>,
    annotations: Vec<Annotation>,
}

impl Recording {
    /// Build a recording, checking that the data has one row per channel.
    pub fn new(
        channels: Vec<String>,
        sfreq: f64,
        data: Array2<f64>,
        annotations: Vec<Annotation>,
    ) -> Result<Self> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(BciError::Edf(format!("invalid sampling rate {}", sfreq)));
        }
        if data.nrows() != channels.len() {
            return Err(BciError::Edf(format!(
                "{} channel names for {} data rows",
                channels.len(),
                data.nrows()
            )));
        }
        Ok(Self {
            channels,
            sfreq,
            data,
            annotations,
        })
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn sfreq(&self) -> f64 {
        self.sfreq
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Length of the recording in seconds.
    pub fn duration(&self) -> f64 {
        self.n_times() as f64 / self.sfreq
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Sample index of time `t` seconds, truncating toward zero.
    pub fn time_as_index(&self, t: f64) -> usize {
        // Tolerate representation error such as 0.29 * 100 = 28.999999999999996.
        (t * self.sfreq + 1e-9).floor().max(0.0) as usize
    }

    /// All channels over `[start, stop)` seconds.
    pub fn window(&self, start: f64, stop: f64) -> std::result::Result<ArrayView2<'_, f64>, TrialError> {
        let out_of_range = TrialError::WindowOutOfRange {
            start,
            stop,
            duration: self.duration(),
        };
        if !(start.is_finite() && stop.is_finite()) || start < 0.0 {
            return Err(out_of_range);
        }

        let start_idx = self.time_as_index(start);
        let stop_idx = self.time_as_index(stop);
        if stop_idx > self.n_times() {
            return Err(out_of_range);
        }
        if stop_idx <= start_idx {
            return Err(TrialError::EmptyWindow { start, stop });
        }

        Ok(self.data.slice(s![.., start_idx..stop_idx]))
    }

    /// Split into parts so preprocessing can rebuild the recording.
    pub fn into_parts(self) -> (Vec<String>, f64, Array2<f64>, Vec<Annotation>) {
        (self.channels, self.sfreq, self.data, self.annotations)
    }
}
