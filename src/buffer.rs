//! Rolling sample buffer
//!
//! Holds the aggregate samples of the current monitoring session and
//! evicts anything older than the configured window on every append.

use crate::config::{PulseConfig, DEFAULT_WINDOW_DURATION_MS};
use crate::error::PulseError;
use crate::types::Sample;
use std::collections::VecDeque;

/// Time-windowed ring of samples, ordered by timestamp
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    /// Maximum age of a retained sample relative to the newest one (ms)
    window_duration_ms: f64,
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_DURATION_MS)
    }
}

impl SampleBuffer {
    /// Create a buffer with the given window, pre-sized for a 30 Hz feed
    pub fn new(window_duration_ms: f64) -> Self {
        let capacity = PulseConfig::with_window_ms(window_duration_ms).nominal_capacity();
        Self::with_capacity(window_duration_ms, capacity)
    }

    /// Create a buffer with the given window and initial capacity
    pub fn with_capacity(window_duration_ms: f64, capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            window_duration_ms,
        }
    }

    /// Append a sample, then drop everything older than `timestamp - window`
    pub fn add(&mut self, sample: Sample) -> Result<(), PulseError> {
        sample.validate()?;

        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                return Err(PulseError::NonMonotonicTimestamp {
                    previous: last.timestamp,
                    current: sample.timestamp,
                });
            }
        }

        self.samples.push_back(sample);
        self.evict_before(sample.timestamp - self.window_duration_ms);
        Ok(())
    }

    /// Remove samples strictly older than `cutoff` (ms)
    fn evict_before(&mut self, cutoff: f64) {
        while let Some(front) = self.samples.front() {
            if front.timestamp < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Empty the buffer (session reset)
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Green-channel time series, oldest first
    pub fn green_channel(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.green).collect()
    }

    /// Time between the oldest and newest sample (ms)
    pub fn duration_ms(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_ms() / 1000.0
    }

    /// Sample rate derived from the actual timestamps (Hz)
    ///
    /// `None` when fewer than two samples are buffered or they share a
    /// single timestamp.
    pub fn effective_sample_rate(&self) -> Option<f64> {
        let n = self.samples.len();
        if n < 2 {
            return None;
        }
        let span_sec = self.duration_seconds();
        let rate = (n - 1) as f64 / span_sec;
        if span_sec > 0.0 && rate.is_finite() {
            Some(rate)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(timestamp: f64) -> Sample {
        Sample::new(timestamp, 120.0, 128.0, 90.0)
    }

    #[test]
    fn test_add_and_count() {
        let mut buffer = SampleBuffer::default();
        for i in 0..10 {
            buffer.add(sample_at(i as f64 * 33.3)).unwrap();
        }
        assert_eq!(buffer.count(), 10);
    }

    #[test]
    fn test_eviction_keeps_window() {
        let mut buffer = SampleBuffer::new(1000.0);
        for i in 0..100 {
            buffer.add(sample_at(i as f64 * 100.0)).unwrap();
        }
        // Newest is 9900 ms; everything from 8900 ms on is retained
        assert_eq!(buffer.count(), 11);
        assert_eq!(buffer.iter().next().unwrap().timestamp, 8900.0);
    }

    #[test]
    fn test_eviction_noop_within_window() {
        let mut buffer = SampleBuffer::new(5000.0);
        for i in 0..150 {
            buffer.add(sample_at(i as f64 * 1000.0 / 30.0)).unwrap();
            assert_eq!(buffer.count(), i + 1);
        }
    }

    #[test]
    fn test_buffer_stays_bounded() {
        let mut buffer = SampleBuffer::new(5000.0);
        for i in 0..3000 {
            buffer.add(sample_at(i as f64 * 1000.0 / 30.0)).unwrap();
        }
        assert!(buffer.count() <= 151);
        let timestamps: Vec<f64> = buffer.iter().map(|s| s.timestamp).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_huge_window_does_not_preallocate() {
        let mut buffer = SampleBuffer::new(1e300);
        buffer.add(sample_at(0.0)).unwrap();
        assert_eq!(buffer.count(), 1);
    }

    #[test]
    fn test_rejects_backwards_timestamp() {
        let mut buffer = SampleBuffer::default();
        buffer.add(sample_at(100.0)).unwrap();
        assert!(matches!(
            buffer.add(sample_at(50.0)),
            Err(PulseError::NonMonotonicTimestamp { .. })
        ));
        assert_eq!(buffer.count(), 1);
    }

    #[test]
    fn test_equal_timestamps_allowed() {
        let mut buffer = SampleBuffer::default();
        buffer.add(sample_at(100.0)).unwrap();
        buffer.add(sample_at(100.0)).unwrap();
        assert_eq!(buffer.count(), 2);
        assert!(buffer.effective_sample_rate().is_none());
    }

    #[test]
    fn test_rejects_invalid_sample() {
        let mut buffer = SampleBuffer::default();
        let result = buffer.add(Sample::new(0.0, 1.0, f64::NAN, 1.0));
        assert!(matches!(result, Err(PulseError::InvalidSample(_))));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_effective_sample_rate() {
        let mut buffer = SampleBuffer::default();
        for i in 0..61 {
            buffer.add(sample_at(i as f64 * 50.0)).unwrap();
        }
        // 60 intervals over 3 seconds
        assert!((buffer.effective_sample_rate().unwrap() - 20.0).abs() < 1e-9);
        assert!((buffer.duration_seconds() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_clear() {
        let mut buffer = SampleBuffer::default();
        buffer.add(sample_at(0.0)).unwrap();
        buffer.add(sample_at(33.0)).unwrap();
        buffer.clear();
        assert_eq!(buffer.count(), 0);
        assert_eq!(buffer.duration_ms(), 0.0);
        assert!(buffer.effective_sample_rate().is_none());
    }
}
