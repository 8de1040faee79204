//! Synthetic PPG signals
//!
//! Deterministic generators for exercising the pipeline without a camera:
//! sinusoidal pulse samples and RGBA frames whose region of interest
//! carries a given sample's color.

use crate::config::DEFAULT_ROI_FRACTION;
use crate::sampler::center_region;
use crate::types::{Sample, BYTES_PER_PIXEL};
use std::f64::consts::PI;

/// Parameters of a synthetic fingertip recording
#[derive(Debug, Clone)]
pub struct SyntheticPulse {
    pub bpm: f64,
    /// Peak deviation of the green channel around its baseline
    pub amplitude: f64,
    pub baseline: f64,
    pub duration_sec: f64,
    pub sample_rate_hz: f64,
    /// Amplitude of the deterministic high-frequency disturbance
    pub jitter: f64,
    pub start_ms: f64,
}

impl Default for SyntheticPulse {
    fn default() -> Self {
        Self {
            bpm: 72.0,
            amplitude: 20.0,
            baseline: 128.0,
            duration_sec: 5.0,
            sample_rate_hz: 30.0,
            jitter: 0.0,
            start_ms: 0.0,
        }
    }
}

impl SyntheticPulse {
    pub fn at_bpm(bpm: f64) -> Self {
        Self {
            bpm,
            ..Self::default()
        }
    }

    /// Number of samples covering the duration
    pub fn sample_count(&self) -> usize {
        (self.duration_sec * self.sample_rate_hz).round() as usize
    }

    /// Generate the sample series, oldest first
    pub fn samples(&self) -> Vec<Sample> {
        let frequency = self.bpm / 60.0;
        (0..self.sample_count())
            .map(|i| {
                let t = i as f64 / self.sample_rate_hz;
                let pulse = (2.0 * PI * frequency * t).sin();
                let green = self.baseline + self.amplitude * pulse + self.jitter * disturbance(t);
                Sample::new(
                    self.start_ms + t * 1000.0,
                    clamp_channel(self.baseline + 60.0 + 0.5 * self.amplitude * pulse),
                    clamp_channel(green),
                    clamp_channel(self.baseline - 60.0 + 0.25 * self.amplitude * pulse),
                )
            })
            .collect()
    }
}

/// Sum of incommensurate tones in the 7-14 Hz range, bounded by ±1
fn disturbance(t: f64) -> f64 {
    0.5 * (2.0 * PI * 9.7 * t).sin() + 0.3 * (2.0 * PI * 13.3 * t + 0.7).sin()
        + 0.2 * (2.0 * PI * 7.1 * t + 1.9).sin()
}

fn clamp_channel(value: f64) -> f64 {
    value.clamp(0.0, 255.0)
}

/// Tightly packed RGBA frame whose centered region carries `rgb`
///
/// The surrounding pixels are a dimmed copy of the color, as with a
/// fingertip that does not fully cover the lens.
pub fn fingertip_frame(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let dim = [rgb[0] / 4, rgb[1] / 4, rgb[2] / 4];
    let mut data = Vec::with_capacity(width as usize * height as usize * BYTES_PER_PIXEL);
    for _ in 0..width as usize * height as usize {
        data.extend_from_slice(&[dim[0], dim[1], dim[2], 255]);
    }

    if let Ok(region) = center_region(width, height, DEFAULT_ROI_FRACTION) {
        for y in region.y..region.y + region.height {
            for x in region.x..region.x + region.width {
                let i = (y as usize * width as usize + x as usize) * BYTES_PER_PIXEL;
                data[i..i + 3].copy_from_slice(&rgb);
            }
        }
    }
    data
}

/// Frame reproducing a sample's color, rounded to 8-bit channels
pub fn frame_for_sample(width: u32, height: u32, sample: &Sample) -> Vec<u8> {
    let rgb = [
        sample.red.round() as u8,
        sample.green.round() as u8,
        sample.blue.round() as u8,
    ];
    fingertip_frame(width, height, rgb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::sample_frame;
    use crate::types::PixelFrame;

    #[test]
    fn test_sample_count_and_spacing() {
        let samples = SyntheticPulse::default().samples();
        assert_eq!(samples.len(), 150);
        assert_eq!(samples[0].timestamp, 0.0);
        assert!((samples[30].timestamp - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_green_stays_in_range() {
        let pulse = SyntheticPulse {
            amplitude: 200.0,
            jitter: 50.0,
            ..Default::default()
        };
        assert!(pulse.samples().iter().all(|s| s.validate().is_ok()));
    }

    #[test]
    fn test_fingertip_frame_roi_color() {
        let data = fingertip_frame(40, 30, [220, 120, 60]);
        let frame = PixelFrame::new(40, 30, &data);
        let sample = sample_frame(&frame, DEFAULT_ROI_FRACTION, 0.0).unwrap();
        assert_eq!(sample.red, 220.0);
        assert_eq!(sample.green, 120.0);
        assert_eq!(sample.blue, 60.0);
        // Corner pixel is dimmed
        assert_eq!(&data[0..4], &[55, 30, 15, 255]);
    }
}
