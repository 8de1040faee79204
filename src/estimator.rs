//! Heart-rate estimation and quality scoring
//!
//! Converts peak spacing to beats per minute and derives signal strength,
//! noise level, a quality class, a confidence and user-facing
//! recommendations from the filtered signal.

use crate::config::PulseConfig;
use crate::filter::FilteredSignal;
use crate::stats::{median, std_dev};
use crate::types::{HeartRateEstimate, SignalQuality};

pub const RECOMMEND_COVER_LENS: &str =
    "Cover the camera lens and flash completely with your fingertip";
pub const RECOMMEND_HOLD_STEADY: &str = "Hold the device steady and keep your finger still";
pub const RECOMMEND_LIGHTING: &str = "Make sure the flash is on or the area is well lit";
pub const RECOMMEND_FIRMER_CONTACT: &str = "Press your finger a little more firmly on the lens";
pub const RECOMMEND_REDUCE_MOTION: &str = "Reduce movement and wipe the camera lens clean";
pub const RECOMMEND_CONTINUE: &str = "Keep measuring for a few more seconds to improve accuracy";
pub const RECOMMEND_NO_PULSE: &str = "No steady pulse found yet; keep your finger in place";
pub const RECOMMEND_WAIT: &str = "Keep your finger in place while more data is collected";
pub const RECOMMEND_RESTART: &str = "The signal could not be processed; restart the measurement";

/// Scorer turning a filtered signal and its peaks into an estimate
#[derive(Debug, Clone)]
pub struct PulseScorer {
    config: PulseConfig,
}

impl Default for PulseScorer {
    fn default() -> Self {
        Self::new(PulseConfig::default())
    }
}

impl PulseScorer {
    pub fn new(config: PulseConfig) -> Self {
        Self { config }
    }

    /// Score one pass over the buffer
    ///
    /// `duration_sec` is the time spanned by the buffered samples.
    pub fn score(
        &self,
        signal: &FilteredSignal,
        peaks: &[usize],
        sample_rate: f64,
        duration_sec: f64,
    ) -> HeartRateEstimate {
        let raw_bpm = median_bpm(peaks, sample_rate);
        let heart_rate = raw_bpm
            .filter(|bpm| *bpm >= self.config.min_bpm && *bpm <= self.config.max_bpm)
            .map(|bpm| bpm.round() as u32);

        let signal_strength = self.signal_strength(&signal.filtered);
        let noise_level = self.noise_level(&signal.centered, &signal.filtered);
        let quality = self.classify(signal_strength * (1.0 - noise_level));

        let confidence = match (heart_rate, raw_bpm) {
            (Some(_), Some(bpm)) => self.confidence(
                signal_strength,
                noise_level,
                peaks.len(),
                bpm,
                duration_sec,
            ),
            _ => 0.0,
        };

        let recommendations =
            self.recommendations(quality, signal_strength, noise_level, heart_rate.is_some());

        HeartRateEstimate {
            heart_rate,
            confidence,
            quality,
            signal_strength,
            noise_level,
            recommendations,
        }
    }

    /// `min(1, stddev(filtered) / scale)`
    pub fn signal_strength(&self, filtered: &[f64]) -> f64 {
        (std_dev(filtered) / self.config.signal_strength_scale).min(1.0)
    }

    /// `min(1, mean(|raw − filtered|) / scale)` over the mean-centered raw series
    pub fn noise_level(&self, centered: &[f64], filtered: &[f64]) -> f64 {
        if centered.is_empty() {
            return 0.0;
        }
        let residual = centered
            .iter()
            .zip(filtered)
            .map(|(raw, clean)| (raw - clean).abs())
            .sum::<f64>()
            / centered.len() as f64;
        (residual / self.config.noise_scale).min(1.0)
    }

    /// Map a quality score in [0, 1] to a quality class
    pub fn classify(&self, quality_score: f64) -> SignalQuality {
        if quality_score >= self.config.excellent_threshold {
            SignalQuality::Excellent
        } else if quality_score >= self.config.good_threshold {
            SignalQuality::Good
        } else if quality_score >= self.config.fair_threshold {
            SignalQuality::Fair
        } else {
            SignalQuality::Poor
        }
    }

    /// Confidence for an accepted estimate, clamped to [0, 1]
    pub fn confidence(
        &self,
        signal_strength: f64,
        noise_level: f64,
        peak_count: usize,
        bpm: f64,
        duration_sec: f64,
    ) -> f64 {
        let mut confidence = signal_strength * (1.0 - noise_level);

        let expected_peaks = duration_sec * (bpm / 60.0);
        if expected_peaks > 0.0 {
            confidence *= (peak_count as f64 / expected_peaks).min(1.0);
        }

        if bpm >= self.config.resting_min_bpm && bpm <= self.config.resting_max_bpm {
            confidence *= self.config.resting_confidence_boost;
        }

        confidence.clamp(0.0, 1.0)
    }

    /// Independent checks, each contributing its own hints
    pub fn recommendations(
        &self,
        quality: SignalQuality,
        signal_strength: f64,
        noise_level: f64,
        has_heart_rate: bool,
    ) -> Vec<String> {
        let mut hints: Vec<&str> = Vec::new();

        if quality == SignalQuality::Poor {
            hints.push(RECOMMEND_COVER_LENS);
            hints.push(RECOMMEND_HOLD_STEADY);
            hints.push(RECOMMEND_LIGHTING);
        }
        if signal_strength < self.config.weak_signal_threshold {
            hints.push(RECOMMEND_FIRMER_CONTACT);
        }
        if noise_level > self.config.high_noise_threshold {
            hints.push(RECOMMEND_REDUCE_MOTION);
        }
        if quality == SignalQuality::Fair {
            hints.push(RECOMMEND_CONTINUE);
        }
        if !has_heart_rate && quality != SignalQuality::Poor {
            hints.push(RECOMMEND_NO_PULSE);
        }

        hints.into_iter().map(str::to_string).collect()
    }
}

/// Median instantaneous BPM over consecutive peak gaps
///
/// `None` with fewer than two peaks.
pub fn median_bpm(peaks: &[usize], sample_rate: f64) -> Option<f64> {
    let rates: Vec<f64> = peaks
        .windows(2)
        .map(|pair| {
            let gap_sec = (pair[1] - pair[0]) as f64 / sample_rate;
            60.0 / gap_sec
        })
        .collect();
    median(&rates)
}
