//! Filter stage
//!
//! Cleans the green-channel series before peak detection:
//! - DC removal (mean-centering)
//! - First-order high-pass to strip baseline drift from pressure and lighting changes
//! - First-order low-pass to strip sensor and quantization noise
//! - Short edge-clamped moving average
//!
//! Every step preserves the input length.

use crate::config::PulseConfig;
use crate::error::PulseError;
use std::f64::consts::PI;

/// Result of filtering: the mean-centered input and the cleaned signal
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredSignal {
    /// Raw series with its mean removed
    pub centered: Vec<f64>,
    /// Band-limited, smoothed series
    pub filtered: Vec<f64>,
}

/// Band-limiting filter chain
#[derive(Debug, Clone)]
pub struct SignalFilter {
    pub high_pass_cutoff_hz: f64,
    pub low_pass_cutoff_hz: f64,
    pub smoothing_window: usize,
}

impl Default for SignalFilter {
    fn default() -> Self {
        Self::from_config(&PulseConfig::default())
    }
}

impl SignalFilter {
    pub fn from_config(config: &PulseConfig) -> Self {
        Self {
            high_pass_cutoff_hz: config.high_pass_cutoff_hz,
            low_pass_cutoff_hz: config.low_pass_cutoff_hz,
            smoothing_window: config.smoothing_window,
        }
    }

    /// Run the full chain at the given sample rate (Hz)
    ///
    /// Fails with `ProcessingFault` if the rate is unusable or any stage
    /// produces a non-finite value.
    pub fn apply(&self, signal: &[f64], sample_rate: f64) -> Result<FilteredSignal, PulseError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(PulseError::ProcessingFault(format!(
                "sample rate is not usable: {sample_rate}"
            )));
        }

        let centered = remove_dc(signal);
        ensure_finite("dc removal", &centered)?;

        let high = high_pass(&centered, self.high_pass_cutoff_hz, sample_rate);
        ensure_finite("high-pass", &high)?;

        let low = low_pass(&high, self.low_pass_cutoff_hz, sample_rate);
        ensure_finite("low-pass", &low)?;

        let filtered = moving_average(&low, self.smoothing_window);
        ensure_finite("smoothing", &filtered)?;

        Ok(FilteredSignal { centered, filtered })
    }
}

fn ensure_finite(stage: &str, values: &[f64]) -> Result<(), PulseError> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(PulseError::ProcessingFault(format!(
            "{stage} produced a non-finite value at index {index}"
        ))),
        None => Ok(()),
    }
}

/// Subtract the series mean
pub fn remove_dc(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    signal.iter().map(|x| x - mean).collect()
}

/// First-order recursive high-pass
///
/// `y[0] = x[0]; y[i] = α·(y[i-1] + x[i] − x[i-1])` with the RC coefficient
/// `α = f_s / (f_s + 2π·f_c)`.
pub fn high_pass(signal: &[f64], cutoff_hz: f64, sample_rate: f64) -> Vec<f64> {
    let alpha = sample_rate / (sample_rate + 2.0 * PI * cutoff_hz);

    let mut output = Vec::with_capacity(signal.len());
    if let Some(&first) = signal.first() {
        output.push(first);
    }
    for i in 1..signal.len() {
        let y = alpha * (output[i - 1] + signal[i] - signal[i - 1]);
        output.push(y);
    }
    output
}

/// First-order recursive low-pass
///
/// `y[0] = x[0]; y[i] = α·x[i] + (1−α)·y[i-1]` with
/// `α = 2π·f_c / (f_s + 2π·f_c)`.
pub fn low_pass(signal: &[f64], cutoff_hz: f64, sample_rate: f64) -> Vec<f64> {
    let omega = 2.0 * PI * cutoff_hz;
    let alpha = omega / (sample_rate + omega);

    let mut output = Vec::with_capacity(signal.len());
    if let Some(&first) = signal.first() {
        output.push(first);
    }
    for i in 1..signal.len() {
        let y = alpha * signal[i] + (1.0 - alpha) * output[i - 1];
        output.push(y);
    }
    output
}

/// Centered moving average; the window shrinks at the edges instead of padding
pub fn moving_average(signal: &[f64], window: usize) -> Vec<f64> {
    let n = signal.len();
    if window <= 1 || n == 0 {
        return signal.to_vec();
    }

    let before = window / 2;
    let after = window - 1 - before;

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(n);
            let slice = &signal[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}
