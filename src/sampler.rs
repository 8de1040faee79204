//! Frame sampling
//!
//! Reduces a full RGBA pixel buffer to one aggregate RGB sample by averaging
//! a centered region of interest, where the fingertip covering the camera
//! and flash is expected to sit.

use crate::config::DEFAULT_ROI_FRACTION;
use crate::error::PulseError;
use crate::types::{PixelFrame, Sample, BYTES_PER_PIXEL};
use std::time::Instant;

/// Source of monotonic timestamps for incoming frames
pub trait Clock: Send {
    /// Milliseconds since an arbitrary fixed origin, never decreasing
    fn now_ms(&self) -> f64;
}

/// Clock backed by `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Centered region of interest in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Compute the centered region covering `fraction` of both dimensions
pub fn center_region(width: u32, height: u32, fraction: f64) -> Result<Region, PulseError> {
    if width == 0 || height == 0 {
        return Err(PulseError::InvalidFrame(format!(
            "frame dimensions must be non-zero, got {width}x{height}"
        )));
    }

    let roi_width = (width as f64 * fraction).floor() as u32;
    let roi_height = (height as f64 * fraction).floor() as u32;
    if roi_width == 0 || roi_height == 0 {
        return Err(PulseError::InvalidFrame(format!(
            "region of interest is empty for {width}x{height} frame at fraction {fraction}"
        )));
    }

    Ok(Region {
        x: (width - roi_width) / 2,
        y: (height - roi_height) / 2,
        width: roi_width,
        height: roi_height,
    })
}

/// Average the red, green and blue channels over the centered region
///
/// Pure function of the frame; the timestamp is supplied by the caller.
pub fn sample_frame(
    frame: &PixelFrame<'_>,
    roi_fraction: f64,
    timestamp: f64,
) -> Result<Sample, PulseError> {
    let region = center_region(frame.width, frame.height, roi_fraction)?;

    let too_large = || {
        PulseError::InvalidFrame(format!(
            "{}x{} frame with stride {} exceeds addressable memory",
            frame.width, frame.height, frame.stride
        ))
    };

    let row_bytes = (frame.width as usize)
        .checked_mul(BYTES_PER_PIXEL)
        .ok_or_else(too_large)?;
    if frame.stride < row_bytes {
        return Err(PulseError::InvalidFrame(format!(
            "stride {} is shorter than a row of {} bytes",
            frame.stride, row_bytes
        )));
    }
    let required = (frame.height as usize - 1)
        .checked_mul(frame.stride)
        .and_then(|bytes| bytes.checked_add(row_bytes))
        .ok_or_else(too_large)?;
    if frame.data.len() < required {
        return Err(PulseError::InvalidFrame(format!(
            "buffer holds {} bytes, {}x{} frame needs {}",
            frame.data.len(),
            frame.width,
            frame.height,
            required
        )));
    }

    let mut sums = [0u64; 3];
    let span = region.width as usize * BYTES_PER_PIXEL;
    for y in region.y..region.y + region.height {
        let start = frame.offset(region.x, y).ok_or_else(too_large)?;
        for pixel in frame.data[start..start + span].chunks_exact(BYTES_PER_PIXEL) {
            sums[0] += pixel[0] as u64;
            sums[1] += pixel[1] as u64;
            sums[2] += pixel[2] as u64;
        }
    }

    let count = region.pixel_count() as f64;
    Ok(Sample::new(
        timestamp,
        sums[0] as f64 / count,
        sums[1] as f64 / count,
        sums[2] as f64 / count,
    ))
}

/// Frame sampler stamping each sample from its clock
pub struct FrameSampler {
    roi_fraction: f64,
    clock: Box<dyn Clock>,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_ROI_FRACTION)
    }
}

impl FrameSampler {
    /// Sampler using the monotonic system clock
    pub fn new(roi_fraction: f64) -> Self {
        Self::with_clock(roi_fraction, Box::new(MonotonicClock::new()))
    }

    /// Sampler using a caller-provided clock
    pub fn with_clock(roi_fraction: f64, clock: Box<dyn Clock>) -> Self {
        Self {
            roi_fraction,
            clock,
        }
    }

    /// Sample a frame at the current clock time
    pub fn sample(&self, frame: &PixelFrame<'_>) -> Result<Sample, PulseError> {
        sample_frame(frame, self.roi_fraction, self.clock.now_ms())
    }

    /// Sample a frame at an explicit timestamp (milliseconds)
    pub fn sample_at(&self, frame: &PixelFrame<'_>, timestamp: f64) -> Result<Sample, PulseError> {
        sample_frame(frame, self.roi_fraction, timestamp)
    }
}
