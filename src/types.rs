//! Core types for the Synheart Pulse pipeline
//!
//! This module defines the data that flows between stages: the raw pixel
//! view handed in by the capture loop, the aggregate samples kept in the
//! buffer, and the estimate handed back to the host.

use crate::error::PulseError;
use crate::estimator::{RECOMMEND_RESTART, RECOMMEND_WAIT};
use serde::{Deserialize, Serialize};

/// Bytes per pixel in an RGBA buffer
pub const BYTES_PER_PIXEL: usize = 4;

/// Borrowed view over a decoded RGBA pixel buffer
///
/// Rows are `stride` bytes apart; each pixel is 4 bytes in R, G, B, A order.
/// This is the shape of a canvas `ImageData` as well as most native camera
/// buffers once the row padding is accounted for.
#[derive(Debug, Clone, Copy)]
pub struct PixelFrame<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes between the start of consecutive rows
    pub stride: usize,
    pub data: &'a [u8],
}

impl<'a> PixelFrame<'a> {
    /// Tightly packed RGBA buffer (`stride == width * 4`)
    ///
    /// A width whose row size does not fit in `usize` saturates the stride,
    /// which the sampler then rejects as an invalid frame.
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            stride: (width as usize).saturating_mul(BYTES_PER_PIXEL),
            data,
        }
    }

    /// RGBA buffer with padded rows
    pub fn with_stride(width: u32, height: u32, stride: usize, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            stride,
            data,
        }
    }

    /// Byte offset of pixel (x, y), `None` if it does not fit in `usize`
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (y as usize)
            .checked_mul(self.stride)?
            .checked_add((x as usize).checked_mul(BYTES_PER_PIXEL)?)
    }
}

/// One aggregate observation: mean channel intensities over the region of interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic time (milliseconds)
    pub timestamp: f64,
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Sample {
    pub fn new(timestamp: f64, red: f64, green: f64, blue: f64) -> Self {
        Self {
            timestamp,
            red,
            green,
            blue,
        }
    }

    /// Mean of the three channels
    pub fn intensity(&self) -> f64 {
        (self.red + self.green + self.blue) / 3.0
    }

    /// Reject non-finite timestamps and channels outside [0, 255]
    pub fn validate(&self) -> Result<(), PulseError> {
        if !self.timestamp.is_finite() {
            return Err(PulseError::InvalidSample(format!(
                "timestamp is not finite: {}",
                self.timestamp
            )));
        }
        for (name, value) in [("red", self.red), ("green", self.green), ("blue", self.blue)] {
            if !value.is_finite() || !(0.0..=255.0).contains(&value) {
                return Err(PulseError::InvalidSample(format!(
                    "{name} channel out of range [0, 255]: {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Coarse signal quality classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

/// Output of a single scoring pass
///
/// Serializes as
/// `{heart_rate: int|null, confidence, quality, signal_strength, noise_level, recommendations}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateEstimate {
    /// Beats per minute, present only when within the plausible range
    pub heart_rate: Option<u32>,
    /// Confidence in the estimate (0-1)
    pub confidence: f64,
    pub quality: SignalQuality,
    /// Pulsatile amplitude of the filtered signal (0-1)
    pub signal_strength: f64,
    /// How much the filter had to remove (0-1)
    pub noise_level: f64,
    /// Short actionable hints, most important first
    pub recommendations: Vec<String>,
}

impl HeartRateEstimate {
    /// Result while the buffer is still filling up
    pub fn insufficient_data() -> Self {
        Self::degraded(RECOMMEND_WAIT)
    }

    /// Result when the signal could not be processed
    pub fn processing_fault() -> Self {
        Self::degraded(RECOMMEND_RESTART)
    }

    fn degraded(recommendation: &str) -> Self {
        Self {
            heart_rate: None,
            confidence: 0.0,
            quality: SignalQuality::Poor,
            signal_strength: 0.0,
            noise_level: 0.0,
            recommendations: vec![recommendation.to_string()],
        }
    }

    pub fn to_json(&self) -> Result<String, PulseError> {
        Ok(serde_json::to_string(self)?)
    }
}
