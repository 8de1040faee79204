//! Peak detection
//!
//! Finds local maxima in the filtered signal that rise above a dynamic
//! threshold and respect a minimum spacing consistent with a human pulse.

use crate::config::PulseConfig;
use crate::stats::{mean, std_dev};

/// Local-maximum detector with a dynamic threshold
#[derive(Debug, Clone)]
pub struct PeakDetector {
    /// Threshold = mean + factor * stddev
    pub threshold_std_factor: f64,
    /// Minimum time between accepted peaks (seconds)
    pub min_spacing_sec: f64,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::from_config(&PulseConfig::default())
    }
}

impl PeakDetector {
    pub fn from_config(config: &PulseConfig) -> Self {
        Self {
            threshold_std_factor: config.peak_threshold_std_factor,
            min_spacing_sec: config.min_peak_spacing_sec,
        }
    }

    /// Amplitude a candidate must exceed, recomputed for every signal
    pub fn threshold(&self, signal: &[f64]) -> f64 {
        mean(signal) + self.threshold_std_factor * std_dev(signal)
    }

    /// Minimum spacing in samples at the given rate
    pub fn min_spacing_samples(&self, sample_rate: f64) -> f64 {
        self.min_spacing_sec * sample_rate
    }

    /// Indices of accepted peaks, in increasing order
    ///
    /// A candidate closer than the minimum spacing to the previously
    /// accepted peak is discarded, never merged.
    pub fn detect(&self, signal: &[f64], sample_rate: f64) -> Vec<usize> {
        let n = signal.len();
        if n < 3 {
            return Vec::new();
        }

        let threshold = self.threshold(signal);
        let min_spacing = self.min_spacing_samples(sample_rate);

        let mut peaks: Vec<usize> = Vec::new();
        for i in 1..n - 1 {
            let value = signal[i];
            let is_candidate =
                value > signal[i - 1] && value > signal[i + 1] && value > threshold;
            if !is_candidate {
                continue;
            }
            if let Some(&previous) = peaks.last() {
                if ((i - previous) as f64) < min_spacing {
                    continue;
                }
            }
            peaks.push(i);
        }
        peaks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, n: usize, rate: f64) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn test_detects_sine_peaks() {
        let detector = PeakDetector::default();
        // 1.2 Hz at 30 Hz: true maxima at 6.25 + 25k
        let peaks = detector.detect(&sine(1.2, 150, 30.0), 30.0);
        assert_eq!(peaks, vec![6, 31, 56, 81, 106, 131]);
    }

    #[test]
    fn test_min_spacing_respected() {
        let detector = PeakDetector::default();
        let rate = 30.0;
        // 3.5 Hz has maxima every ~8.6 samples, closer than 0.4 s
        let peaks = detector.detect(&sine(3.5, 150, rate), rate);
        assert!(!peaks.is_empty());
        for pair in peaks.windows(2) {
            assert!((pair[1] - pair[0]) as f64 >= 0.4 * rate);
        }
    }

    #[test]
    fn test_threshold_filters_small_bumps() {
        let detector = PeakDetector::default();
        let mut signal = vec![0.0; 60];
        // Two tall peaks and one tiny bump between them
        signal[10] = 10.0;
        signal[30] = 0.5;
        signal[50] = 10.0;
        assert_eq!(detector.detect(&signal, 30.0), vec![10, 50]);
    }

    #[test]
    fn test_close_candidate_is_discarded() {
        let detector = PeakDetector::default();
        let mut signal = vec![0.0; 40];
        signal[10] = 10.0;
        // 5 samples later: below 0.4 s * 30 Hz = 12 samples
        signal[15] = 12.0;
        signal[30] = 10.0;
        assert_eq!(detector.detect(&signal, 30.0), vec![10, 30]);
    }

    #[test]
    fn test_flat_and_short_signals() {
        let detector = PeakDetector::default();
        assert!(detector.detect(&[], 30.0).is_empty());
        assert!(detector.detect(&[1.0, 2.0], 30.0).is_empty());
        assert!(detector.detect(&vec![3.0; 100], 30.0).is_empty());
    }

    #[test]
    fn test_endpoints_never_peaks() {
        let detector = PeakDetector::default();
        let signal = [10.0, 0.0, 0.0, 0.0, 10.0];
        assert!(detector.detect(&signal, 30.0).is_empty());
    }
}
