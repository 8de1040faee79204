//! Estimator configuration
//!
//! Every tunable used by the sampler, filter, peak detector and scorer lives
//! here as a named constant, and `PulseConfig` carries them as a unit so a
//! host can override individual values from JSON.

use crate::error::PulseError;
use serde::{Deserialize, Serialize};

/// Fraction of frame width and height covered by the centered region of interest
pub const DEFAULT_ROI_FRACTION: f64 = 0.3;

/// Rolling window kept in the sample buffer (milliseconds)
pub const DEFAULT_WINDOW_DURATION_MS: f64 = 5_000.0;

/// Longest rolling window a configuration may request (milliseconds)
pub const MAX_WINDOW_DURATION_MS: f64 = 60_000.0;

/// Upper bound on the samples reserved up front, whatever the configured rate
pub const MAX_PREALLOCATED_SAMPLES: usize = 8_192;

/// Capture rate assumed when sizing the buffer (Hz)
pub const DEFAULT_NOMINAL_SAMPLE_RATE_HZ: f64 = 30.0;

/// Samples required before an estimate is attempted (~3 seconds at 30 Hz)
pub const DEFAULT_MIN_SAMPLES: usize = 90;

/// High-pass cutoff removing baseline drift (Hz)
pub const DEFAULT_HIGH_PASS_CUTOFF_HZ: f64 = 0.5;

/// Low-pass cutoff removing sensor and quantization noise (Hz)
pub const DEFAULT_LOW_PASS_CUTOFF_HZ: f64 = 4.0;

/// Moving-average window applied after band limiting (samples)
pub const DEFAULT_SMOOTHING_WINDOW: usize = 3;

/// Peak threshold = mean + factor * stddev
pub const DEFAULT_PEAK_THRESHOLD_STD_FACTOR: f64 = 0.5;

/// Minimum spacing between accepted peaks (seconds)
pub const DEFAULT_MIN_PEAK_SPACING_SEC: f64 = 0.4;

/// Lowest heart rate ever reported (BPM)
pub const DEFAULT_MIN_BPM: f64 = 50.0;

/// Highest heart rate ever reported (BPM)
pub const DEFAULT_MAX_BPM: f64 = 180.0;

/// Filtered-signal stddev that maps to full signal strength
pub const DEFAULT_SIGNAL_STRENGTH_SCALE: f64 = 10.0;

/// Mean absolute filter residual that maps to full noise level
pub const DEFAULT_NOISE_SCALE: f64 = 20.0;

pub const DEFAULT_EXCELLENT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_GOOD_THRESHOLD: f64 = 0.6;
pub const DEFAULT_FAIR_THRESHOLD: f64 = 0.4;

/// Normal resting range that earns the confidence boost (BPM)
pub const DEFAULT_RESTING_MIN_BPM: f64 = 60.0;
pub const DEFAULT_RESTING_MAX_BPM: f64 = 100.0;
pub const DEFAULT_RESTING_CONFIDENCE_BOOST: f64 = 1.1;

/// Below this signal strength the user is asked for firmer contact
pub const DEFAULT_WEAK_SIGNAL_THRESHOLD: f64 = 0.3;

/// Above this noise level the user is asked to hold still / clean the lens
pub const DEFAULT_HIGH_NOISE_THRESHOLD: f64 = 0.6;

/// Tunable parameters for the whole estimation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub roi_fraction: f64,
    pub window_duration_ms: f64,
    pub nominal_sample_rate_hz: f64,
    pub min_samples: usize,
    pub high_pass_cutoff_hz: f64,
    pub low_pass_cutoff_hz: f64,
    pub smoothing_window: usize,
    pub peak_threshold_std_factor: f64,
    pub min_peak_spacing_sec: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub signal_strength_scale: f64,
    pub noise_scale: f64,
    pub excellent_threshold: f64,
    pub good_threshold: f64,
    pub fair_threshold: f64,
    pub resting_min_bpm: f64,
    pub resting_max_bpm: f64,
    pub resting_confidence_boost: f64,
    pub weak_signal_threshold: f64,
    pub high_noise_threshold: f64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            roi_fraction: DEFAULT_ROI_FRACTION,
            window_duration_ms: DEFAULT_WINDOW_DURATION_MS,
            nominal_sample_rate_hz: DEFAULT_NOMINAL_SAMPLE_RATE_HZ,
            min_samples: DEFAULT_MIN_SAMPLES,
            high_pass_cutoff_hz: DEFAULT_HIGH_PASS_CUTOFF_HZ,
            low_pass_cutoff_hz: DEFAULT_LOW_PASS_CUTOFF_HZ,
            smoothing_window: DEFAULT_SMOOTHING_WINDOW,
            peak_threshold_std_factor: DEFAULT_PEAK_THRESHOLD_STD_FACTOR,
            min_peak_spacing_sec: DEFAULT_MIN_PEAK_SPACING_SEC,
            min_bpm: DEFAULT_MIN_BPM,
            max_bpm: DEFAULT_MAX_BPM,
            signal_strength_scale: DEFAULT_SIGNAL_STRENGTH_SCALE,
            noise_scale: DEFAULT_NOISE_SCALE,
            excellent_threshold: DEFAULT_EXCELLENT_THRESHOLD,
            good_threshold: DEFAULT_GOOD_THRESHOLD,
            fair_threshold: DEFAULT_FAIR_THRESHOLD,
            resting_min_bpm: DEFAULT_RESTING_MIN_BPM,
            resting_max_bpm: DEFAULT_RESTING_MAX_BPM,
            resting_confidence_boost: DEFAULT_RESTING_CONFIDENCE_BOOST,
            weak_signal_threshold: DEFAULT_WEAK_SIGNAL_THRESHOLD,
            high_noise_threshold: DEFAULT_HIGH_NOISE_THRESHOLD,
        }
    }
}

impl PulseConfig {
    /// Default configuration with a different buffer window
    pub fn with_window_ms(window_duration_ms: f64) -> Self {
        Self {
            window_duration_ms,
            ..Self::default()
        }
    }

    /// Expected buffer capacity at the nominal capture rate, capped at
    /// `MAX_PREALLOCATED_SAMPLES`
    pub fn nominal_capacity(&self) -> usize {
        let expected = (self.window_duration_ms / 1000.0 * self.nominal_sample_rate_hz).ceil();
        if expected.is_finite() && expected > 0.0 {
            (expected as usize).min(MAX_PREALLOCATED_SAMPLES)
        } else {
            0
        }
    }

    /// Check that the parameters describe a usable pipeline
    pub fn validate(&self) -> Result<(), PulseError> {
        if !(self.roi_fraction > 0.0 && self.roi_fraction <= 1.0) {
            return Err(PulseError::InvalidConfig(format!(
                "roi_fraction must be in (0, 1], got {}",
                self.roi_fraction
            )));
        }
        if !(self.window_duration_ms > 0.0 && self.window_duration_ms <= MAX_WINDOW_DURATION_MS) {
            return Err(PulseError::InvalidConfig(format!(
                "window_duration_ms must be in (0, {}], got {}",
                MAX_WINDOW_DURATION_MS, self.window_duration_ms
            )));
        }
        if !(self.nominal_sample_rate_hz.is_finite() && self.nominal_sample_rate_hz > 0.0) {
            return Err(PulseError::InvalidConfig(format!(
                "nominal_sample_rate_hz must be positive, got {}",
                self.nominal_sample_rate_hz
            )));
        }
        if self.min_samples < 3 {
            return Err(PulseError::InvalidConfig(format!(
                "min_samples must be at least 3, got {}",
                self.min_samples
            )));
        }
        if !(self.high_pass_cutoff_hz > 0.0) {
            return Err(PulseError::InvalidConfig(format!(
                "high_pass_cutoff_hz must be positive, got {}",
                self.high_pass_cutoff_hz
            )));
        }
        if !(self.low_pass_cutoff_hz > self.high_pass_cutoff_hz) {
            return Err(PulseError::InvalidConfig(format!(
                "low_pass_cutoff_hz ({}) must exceed high_pass_cutoff_hz ({})",
                self.low_pass_cutoff_hz, self.high_pass_cutoff_hz
            )));
        }
        if self.smoothing_window == 0 {
            return Err(PulseError::InvalidConfig(
                "smoothing_window must be at least 1".to_string(),
            ));
        }
        if !(self.min_peak_spacing_sec >= 0.0) {
            return Err(PulseError::InvalidConfig(format!(
                "min_peak_spacing_sec must not be negative, got {}",
                self.min_peak_spacing_sec
            )));
        }
        if !(self.min_bpm > 0.0 && self.min_bpm < self.max_bpm) {
            return Err(PulseError::InvalidConfig(format!(
                "BPM range [{}, {}] is empty",
                self.min_bpm, self.max_bpm
            )));
        }
        if !(self.signal_strength_scale > 0.0 && self.noise_scale > 0.0) {
            return Err(PulseError::InvalidConfig(
                "signal_strength_scale and noise_scale must be positive".to_string(),
            ));
        }
        if !(self.fair_threshold <= self.good_threshold
            && self.good_threshold <= self.excellent_threshold)
        {
            return Err(PulseError::InvalidConfig(
                "quality thresholds must be ordered fair <= good <= excellent".to_string(),
            ));
        }
        Ok(())
    }

    /// Load and validate a configuration from JSON
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json(json: &str) -> Result<Self, PulseError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, PulseError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PulseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_samples, 90);
        assert_eq!(config.nominal_capacity(), 150);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = PulseConfig::from_json(r#"{"window_duration_ms": 8000}"#).unwrap();
        assert_eq!(config.window_duration_ms, 8000.0);
        assert_eq!(config.low_pass_cutoff_hz, DEFAULT_LOW_PASS_CUTOFF_HZ);
        assert_eq!(config.nominal_capacity(), 240);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = PulseConfig::with_window_ms(6000.0);
        let json = config.to_json().unwrap();
        let loaded = PulseConfig::from_json(&json).unwrap();
        pretty_assertions::assert_eq!(config, loaded);
    }

    #[test]
    fn test_rejects_inverted_band() {
        let config = PulseConfig {
            high_pass_cutoff_hz: 5.0,
            low_pass_cutoff_hz: 4.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PulseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_bad_roi_fraction() {
        let config = PulseConfig {
            roi_fraction: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = PulseConfig {
            roi_fraction: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_bpm_range() {
        let config = PulseConfig {
            min_bpm: 180.0,
            max_bpm: 50.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_window() {
        assert!(matches!(
            PulseConfig::from_json(r#"{"window_duration_ms": 1e300}"#),
            Err(PulseError::InvalidConfig(_))
        ));
        assert!(PulseConfig::with_window_ms(MAX_WINDOW_DURATION_MS)
            .validate()
            .is_ok());
        assert!(PulseConfig::with_window_ms(MAX_WINDOW_DURATION_MS + 1.0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_nominal_capacity_is_capped() {
        let config = PulseConfig {
            nominal_sample_rate_hz: 1e300,
            ..Default::default()
        };
        assert_eq!(config.nominal_capacity(), MAX_PREALLOCATED_SAMPLES);

        let config = PulseConfig::with_window_ms(f64::NAN);
        assert_eq!(config.nominal_capacity(), 0);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            PulseConfig::from_json("not json"),
            Err(PulseError::JsonError(_))
        ));
    }
}
