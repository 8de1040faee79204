//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Pulse.
//! Frames flow through the sampler into the rolling buffer as they arrive;
//! on demand the buffer is filtered, scanned for peaks and scored.

use crate::buffer::SampleBuffer;
use crate::config::PulseConfig;
use crate::error::PulseError;
use crate::estimator::PulseScorer;
use crate::filter::SignalFilter;
use crate::peaks::PeakDetector;
use crate::sampler::{Clock, FrameSampler, MonotonicClock};
use crate::types::{HeartRateEstimate, PixelFrame, Sample};
use log::{debug, warn};
use std::sync::{Arc, Mutex, MutexGuard};

/// Estimate a heart rate from a recorded series of samples.
///
/// # Arguments
/// * `samples` - Samples in non-decreasing timestamp order
/// * `config` - Pipeline configuration
///
/// # Returns
/// The estimate for the last `window_duration_ms` of the recording, or an
/// error if the configuration or any sample is invalid.
///
/// # Example
/// ```ignore
/// let estimate = estimate_from_samples(&samples, &PulseConfig::default())?;
/// println!("{:?}", estimate.heart_rate);
/// ```
pub fn estimate_from_samples(
    samples: &[Sample],
    config: &PulseConfig,
) -> Result<HeartRateEstimate, PulseError> {
    let mut monitor = PulseMonitor::with_config(config.clone())?;
    for sample in samples {
        monitor.add_sample(*sample)?;
    }
    Ok(monitor.estimate())
}

/// One monitoring session: owns the sample buffer and the stage settings.
///
/// Pipeline stages:
/// 1. FrameSampler - Reduce a pixel buffer to one RGB sample
/// 2. SampleBuffer - Keep the last window of samples
/// 3. SignalFilter - Remove drift and noise from the green channel
/// 4. PeakDetector - Locate pulse peaks
/// 5. PulseScorer - Heart rate, confidence, quality and recommendations
pub struct PulseMonitor {
    config: PulseConfig,
    sampler: FrameSampler,
    buffer: SampleBuffer,
    filter: SignalFilter,
    detector: PeakDetector,
    scorer: PulseScorer,
}

impl Default for PulseMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseMonitor {
    /// Create a monitor with default settings
    pub fn new() -> Self {
        Self::build(PulseConfig::default(), Box::new(MonotonicClock::new()))
    }

    /// Create a monitor with a specific buffer window (milliseconds)
    pub fn with_window_ms(window_duration_ms: f64) -> Result<Self, PulseError> {
        Self::with_config(PulseConfig::with_window_ms(window_duration_ms))
    }

    /// Create a monitor from a validated configuration
    pub fn with_config(config: PulseConfig) -> Result<Self, PulseError> {
        Self::with_clock(config, Box::new(MonotonicClock::new()))
    }

    /// Create a monitor whose frames are stamped by `clock`
    pub fn with_clock(config: PulseConfig, clock: Box<dyn Clock>) -> Result<Self, PulseError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: PulseConfig, clock: Box<dyn Clock>) -> Self {
        Self {
            sampler: FrameSampler::with_clock(config.roi_fraction, clock),
            buffer: SampleBuffer::with_capacity(
                config.window_duration_ms,
                config.nominal_capacity(),
            ),
            filter: SignalFilter::from_config(&config),
            detector: PeakDetector::from_config(&config),
            scorer: PulseScorer::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Sample a frame at the current clock time and buffer it
    ///
    /// On error the frame is dropped and the buffer is left unchanged.
    pub fn push_frame(&mut self, frame: &PixelFrame<'_>) -> Result<Sample, PulseError> {
        let sample = self.sampler.sample(frame).map_err(|e| {
            warn!("dropping frame: {e}");
            e
        })?;
        self.add_sample(sample)?;
        Ok(sample)
    }

    /// Sample a frame stamped by the capture loop (milliseconds) and buffer it
    pub fn push_frame_at(
        &mut self,
        frame: &PixelFrame<'_>,
        timestamp: f64,
    ) -> Result<Sample, PulseError> {
        let sample = self.sampler.sample_at(frame, timestamp).map_err(|e| {
            warn!("dropping frame: {e}");
            e
        })?;
        self.add_sample(sample)?;
        Ok(sample)
    }

    /// Buffer an already-aggregated sample
    pub fn add_sample(&mut self, sample: Sample) -> Result<(), PulseError> {
        self.buffer.add(sample).map_err(|e| {
            warn!("dropping sample: {e}");
            e
        })
    }

    /// Number of buffered samples
    pub fn sample_count(&self) -> usize {
        self.buffer.count()
    }

    /// Fraction of the samples needed before a first estimate (0-1)
    pub fn progress(&self) -> f64 {
        (self.buffer.count() as f64 / self.config.min_samples as f64).min(1.0)
    }

    /// Discard all samples (session end or restart)
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Produce an estimate from the current buffer.
    ///
    /// Never fails: insufficient data and processing faults are encoded in
    /// the result as "no heart rate, zero confidence, poor quality".
    pub fn estimate(&self) -> HeartRateEstimate {
        match self.try_estimate() {
            Ok(estimate) => estimate,
            Err(PulseError::InsufficientData {
                available,
                required,
            }) => {
                debug!("insufficient data: {available}/{required} samples");
                HeartRateEstimate::insufficient_data()
            }
            Err(e) => {
                warn!("estimate degraded: {e}");
                HeartRateEstimate::processing_fault()
            }
        }
    }

    /// Produce an estimate, reporting why none could be computed
    pub fn try_estimate(&self) -> Result<HeartRateEstimate, PulseError> {
        let available = self.buffer.count();
        if available < self.config.min_samples {
            return Err(PulseError::InsufficientData {
                available,
                required: self.config.min_samples,
            });
        }

        let sample_rate = self.buffer.effective_sample_rate().ok_or_else(|| {
            PulseError::ProcessingFault(format!(
                "cannot derive a sample rate from {available} samples spanning {} ms",
                self.buffer.duration_ms()
            ))
        })?;

        let green = self.buffer.green_channel();
        let signal = self.filter.apply(&green, sample_rate)?;
        let peaks = self.detector.detect(&signal.filtered, sample_rate);

        debug!(
            "scoring {} samples at {:.2} Hz, {} peaks",
            available,
            sample_rate,
            peaks.len()
        );

        Ok(self.scorer.score(
            &signal,
            &peaks,
            sample_rate,
            self.buffer.duration_seconds(),
        ))
    }

    /// Estimate encoded as JSON
    pub fn estimate_to_json(&self) -> Result<String, PulseError> {
        self.estimate().to_json()
    }
}

/// Monitor shared between a capture thread and a UI thread.
///
/// A single mutex guards add, estimate and clear.
#[derive(Clone)]
pub struct SharedPulseMonitor {
    inner: Arc<Mutex<PulseMonitor>>,
}

impl Default for SharedPulseMonitor {
    fn default() -> Self {
        Self::new(PulseMonitor::new())
    }
}

impl SharedPulseMonitor {
    pub fn new(monitor: PulseMonitor) -> Self {
        Self {
            inner: Arc::new(Mutex::new(monitor)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PulseMonitor> {
        // A panic elsewhere cannot leave the buffer half-updated, so keep going
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_frame(&self, frame: &PixelFrame<'_>) -> Result<Sample, PulseError> {
        self.lock().push_frame(frame)
    }

    pub fn push_frame_at(
        &self,
        frame: &PixelFrame<'_>,
        timestamp: f64,
    ) -> Result<Sample, PulseError> {
        self.lock().push_frame_at(frame, timestamp)
    }

    pub fn add_sample(&self, sample: Sample) -> Result<(), PulseError> {
        self.lock().add_sample(sample)
    }

    pub fn estimate(&self) -> HeartRateEstimate {
        self.lock().estimate()
    }

    pub fn clear(&self) {
        self.lock().clear()
    }

    pub fn sample_count(&self) -> usize {
        self.lock().sample_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{
        RECOMMEND_CONTINUE, RECOMMEND_FIRMER_CONTACT, RECOMMEND_NO_PULSE, RECOMMEND_RESTART,
        RECOMMEND_WAIT,
    };
    use crate::synthetic::{frame_for_sample, SyntheticPulse};
    use crate::types::SignalQuality;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    struct ManualClock {
        now_us: Arc<AtomicU64>,
    }

    impl Clock for ManualClock {
        fn now_ms(&self) -> f64 {
            self.now_us.load(Ordering::SeqCst) as f64 / 1000.0
        }
    }

    fn feed(monitor: &mut PulseMonitor, pulse: &SyntheticPulse) {
        for sample in pulse.samples() {
            monitor.add_sample(sample).unwrap();
        }
    }

    #[test]
    fn test_resting_pulse_72_bpm() {
        let mut monitor = PulseMonitor::new();
        feed(&mut monitor, &SyntheticPulse::at_bpm(72.0));

        let estimate = monitor.estimate();
        let bpm = estimate.heart_rate.expect("heart rate");
        assert!((69..=75).contains(&bpm), "got {bpm} BPM");
        assert!(matches!(
            estimate.quality,
            SignalQuality::Good | SignalQuality::Excellent
        ));
        assert!(estimate.confidence > 0.5 && estimate.confidence <= 1.0);
    }

    #[test]
    fn test_insufficient_data() {
        let mut monitor = PulseMonitor::new();
        let pulse = SyntheticPulse {
            duration_sec: 89.0 / 30.0,
            ..Default::default()
        };
        feed(&mut monitor, &pulse);
        assert_eq!(monitor.sample_count(), 89);

        let estimate = monitor.estimate();
        assert_eq!(estimate.heart_rate, None);
        assert_eq!(estimate.confidence, 0.0);
        assert_eq!(estimate.quality, SignalQuality::Poor);
        assert_eq!(estimate.recommendations, vec![RECOMMEND_WAIT.to_string()]);
        assert!(matches!(
            monitor.try_estimate(),
            Err(PulseError::InsufficientData {
                available: 89,
                required: 90
            })
        ));
    }

    #[test]
    fn test_minimum_samples_is_enough() {
        let mut monitor = PulseMonitor::new();
        let pulse = SyntheticPulse {
            duration_sec: 3.0,
            ..Default::default()
        };
        feed(&mut monitor, &pulse);
        assert_eq!(monitor.sample_count(), 90);
        assert!(monitor.estimate().heart_rate.is_some());
    }

    #[test]
    fn test_clear_matches_fresh_monitor() {
        let mut monitor = PulseMonitor::new();
        feed(&mut monitor, &SyntheticPulse::default());
        assert!(monitor.estimate().heart_rate.is_some());

        monitor.clear();
        pretty_assertions::assert_eq!(monitor.estimate(), PulseMonitor::new().estimate());
        assert_eq!(monitor.sample_count(), 0);
    }

    #[test]
    fn test_slow_rate_is_rejected() {
        let mut monitor = PulseMonitor::new();
        feed(&mut monitor, &SyntheticPulse::at_bpm(36.0));

        let estimate = monitor.estimate();
        assert_eq!(estimate.heart_rate, None);
        assert_eq!(estimate.confidence, 0.0);
        assert!(estimate
            .recommendations
            .contains(&RECOMMEND_NO_PULSE.to_string()));
    }

    #[test]
    fn test_weak_contact_is_poor() {
        let mut monitor = PulseMonitor::new();
        let pulse = SyntheticPulse {
            amplitude: 4.0,
            ..Default::default()
        };
        feed(&mut monitor, &pulse);

        let estimate = monitor.estimate();
        assert_eq!(estimate.quality, SignalQuality::Poor);
        assert!(estimate.signal_strength < 0.3);
        assert!(estimate
            .recommendations
            .contains(&RECOMMEND_FIRMER_CONTACT.to_string()));
    }

    #[test]
    fn test_moderate_signal_is_fair() {
        let mut monitor = PulseMonitor::new();
        let pulse = SyntheticPulse {
            bpm: 90.0,
            amplitude: 10.0,
            ..Default::default()
        };
        feed(&mut monitor, &pulse);

        let estimate = monitor.estimate();
        assert_eq!(estimate.heart_rate, Some(90));
        assert_eq!(estimate.quality, SignalQuality::Fair);
        assert!(estimate
            .recommendations
            .contains(&RECOMMEND_CONTINUE.to_string()));
    }

    #[test]
    fn test_disturbed_signal_still_tracks() {
        let mut monitor = PulseMonitor::new();
        let pulse = SyntheticPulse {
            jitter: 15.0,
            ..Default::default()
        };
        feed(&mut monitor, &pulse);

        let estimate = monitor.estimate();
        let bpm = estimate.heart_rate.expect("heart rate");
        assert!((69..=75).contains(&bpm), "got {bpm} BPM");
        assert!(estimate.quality >= SignalQuality::Fair);
        assert!(estimate.noise_level > 0.15);
    }

    #[test]
    fn test_rate_derived_from_timestamps() {
        // 24 fps capture; assuming 30 Hz would read 90 BPM
        let mut monitor = PulseMonitor::new();
        let pulse = SyntheticPulse {
            sample_rate_hz: 24.0,
            ..Default::default()
        };
        feed(&mut monitor, &pulse);

        let bpm = monitor.estimate().heart_rate.expect("heart rate");
        assert!((69..=75).contains(&bpm), "got {bpm} BPM");
    }

    #[test]
    fn test_frozen_timestamps_degrade() {
        let mut monitor = PulseMonitor::new();
        for sample in SyntheticPulse::default().samples() {
            monitor
                .add_sample(Sample {
                    timestamp: 1000.0,
                    ..sample
                })
                .unwrap();
        }
        assert!(matches!(
            monitor.try_estimate(),
            Err(PulseError::ProcessingFault(_))
        ));

        let estimate = monitor.estimate();
        assert_eq!(estimate.heart_rate, None);
        assert_eq!(estimate.confidence, 0.0);
        assert_eq!(estimate.quality, SignalQuality::Poor);
        assert_eq!(estimate.recommendations, vec![RECOMMEND_RESTART.to_string()]);
    }

    #[test]
    fn test_samples_age_out() {
        let mut monitor = PulseMonitor::new();
        feed(&mut monitor, &SyntheticPulse::default());
        monitor
            .add_sample(Sample::new(20_000.0, 180.0, 128.0, 70.0))
            .unwrap();
        assert_eq!(monitor.sample_count(), 1);
        assert_eq!(monitor.estimate(), HeartRateEstimate::insufficient_data());
    }

    #[test]
    fn test_frames_through_pipeline() {
        let mut monitor = PulseMonitor::new();
        for sample in SyntheticPulse::default().samples() {
            let data = frame_for_sample(32, 24, &sample);
            let frame = PixelFrame::new(32, 24, &data);
            monitor.push_frame_at(&frame, sample.timestamp).unwrap();
        }

        let bpm = monitor.estimate().heart_rate.expect("heart rate");
        assert!((69..=75).contains(&bpm), "got {bpm} BPM");
    }

    #[test]
    fn test_frames_stamped_by_clock() {
        let now_us = Arc::new(AtomicU64::new(0));
        let clock = ManualClock {
            now_us: Arc::clone(&now_us),
        };
        let mut monitor = PulseMonitor::with_clock(PulseConfig::default(), Box::new(clock)).unwrap();

        for sample in SyntheticPulse::default().samples() {
            now_us.store((sample.timestamp * 1000.0).round() as u64, Ordering::SeqCst);
            let data = frame_for_sample(32, 24, &sample);
            monitor.push_frame(&PixelFrame::new(32, 24, &data)).unwrap();
        }

        assert_eq!(monitor.sample_count(), 150);
        assert!(monitor.estimate().heart_rate.is_some());
    }

    #[test]
    fn test_invalid_frame_is_dropped() {
        let mut monitor = PulseMonitor::new();
        let data: Vec<u8> = Vec::new();
        let result = monitor.push_frame_at(&PixelFrame::new(0, 0, &data), 0.0);
        assert!(matches!(result, Err(PulseError::InvalidFrame(_))));
        assert_eq!(monitor.sample_count(), 0);
    }

    #[test]
    fn test_progress() {
        let mut monitor = PulseMonitor::new();
        assert_eq!(monitor.progress(), 0.0);
        let pulse = SyntheticPulse {
            duration_sec: 1.5,
            ..Default::default()
        };
        feed(&mut monitor, &pulse);
        assert!((monitor.progress() - 0.5).abs() < 1e-9);
        feed(
            &mut monitor,
            &SyntheticPulse {
                start_ms: 2000.0,
                ..Default::default()
            },
        );
        assert_eq!(monitor.progress(), 1.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            PulseMonitor::with_window_ms(-1.0),
            Err(PulseError::InvalidConfig(_))
        ));
        assert!(matches!(
            PulseMonitor::with_window_ms(1e300),
            Err(PulseError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_window_from_config() {
        let monitor = PulseMonitor::with_window_ms(8000.0).unwrap();
        assert_eq!(monitor.config().window_duration_ms, 8000.0);
        assert_eq!(monitor.config().min_samples, 90);
    }

    #[test]
    fn test_estimate_from_samples() {
        let samples = SyntheticPulse::at_bpm(60.0).samples();
        let estimate = estimate_from_samples(&samples, &PulseConfig::default()).unwrap();
        assert_eq!(estimate.heart_rate, Some(60));
    }

    #[test]
    fn test_estimate_from_unordered_samples_fails() {
        let mut samples = SyntheticPulse::default().samples();
        samples.swap(10, 20);
        assert!(matches!(
            estimate_from_samples(&samples, &PulseConfig::default()),
            Err(PulseError::NonMonotonicTimestamp { .. })
        ));
    }

    #[test]
    fn test_shared_monitor_across_threads() {
        let shared = SharedPulseMonitor::default();
        let writer = shared.clone();

        let handle = thread::spawn(move || {
            for sample in SyntheticPulse::default().samples() {
                writer.add_sample(sample).unwrap();
            }
        });
        // Reads while the writer runs must never fail
        for _ in 0..10 {
            let _ = shared.estimate();
        }
        handle.join().unwrap();

        assert_eq!(shared.sample_count(), 150);
        assert!(shared.estimate().heart_rate.is_some());

        shared.clear();
        assert_eq!(shared.estimate(), HeartRateEstimate::insufficient_data());
    }

    #[test]
    fn test_shared_monitor_frames() {
        let shared = SharedPulseMonitor::default();
        for sample in SyntheticPulse::default().samples() {
            let data = frame_for_sample(20, 20, &sample);
            shared
                .push_frame_at(&PixelFrame::new(20, 20, &data), sample.timestamp)
                .unwrap();
        }
        assert_eq!(shared.sample_count(), 150);

        // The library clock starts near zero, behind the recorded timestamps
        shared.clear();
        let data = frame_for_sample(20, 20, &Sample::new(0.0, 180.0, 120.0, 60.0));
        shared.push_frame(&PixelFrame::new(20, 20, &data)).unwrap();
        assert_eq!(shared.sample_count(), 1);
    }

    #[test]
    fn test_estimate_to_json() {
        let mut monitor = PulseMonitor::new();
        feed(&mut monitor, &SyntheticPulse::default());
        let value: serde_json::Value =
            serde_json::from_str(&monitor.estimate_to_json().unwrap()).unwrap();
        assert!(value["heart_rate"].as_u64().is_some());
        assert!(value["confidence"].as_f64().is_some());
        assert!(value["recommendations"].is_array());
    }
}
