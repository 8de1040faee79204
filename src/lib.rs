//! Synheart Pulse - On-device heart rate estimation from fingertip camera video
//!
//! Pulse turns a stream of camera frames into heart-rate estimates through a
//! deterministic pipeline: frame sampling → rolling buffer → band-pass
//! filtering → peak detection → estimation and quality scoring.
//!
//! ## Usage
//!
//! ```ignore
//! let mut monitor = PulseMonitor::new();
//! for (frame, timestamp) in capture {
//!     // A frame that fails sampling is simply skipped
//!     let _ = monitor.push_frame_at(&frame, timestamp);
//! }
//! let estimate = monitor.estimate();
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod estimator;
pub mod filter;
pub mod peaks;
pub mod pipeline;
pub mod report;
pub mod sampler;
pub mod synthetic;
pub mod types;

mod stats;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::PulseConfig;
pub use error::PulseError;
pub use pipeline::{estimate_from_samples, PulseMonitor, SharedPulseMonitor};
pub use report::{MeasurementReport, ReportEncoder};
pub use sampler::{Clock, FrameSampler, MonotonicClock};
pub use types::{HeartRateEstimate, PixelFrame, Sample, SignalQuality};

/// Pulse version embedded in all reports
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-pulse";
