//! Measurement reports
//!
//! This module wraps an estimate in a self-describing JSON envelope:
//! who produced it, when, and from how much data.

use crate::error::PulseError;
use crate::pipeline::PulseMonitor;
use crate::types::HeartRateEstimate;
use crate::{PRODUCER_NAME, PULSE_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report format version
pub const REPORT_VERSION: &str = "1.0.0";

/// Attached to every report
pub const DISCLAIMER: &str = "Camera-based heart rate estimates are for informational and \
wellness purposes only. They are not a medical device and must not be used for diagnosis.";

/// Software that produced the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Statistics of the buffer the estimate was computed from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub sample_count: usize,
    pub buffer_duration_sec: f64,
    /// `null` when the buffer spans no time
    pub effective_sample_rate_hz: Option<f64>,
}

impl SessionStats {
    pub fn from_monitor(monitor: &PulseMonitor) -> Self {
        let buffer = monitor.buffer();
        Self {
            sample_count: buffer.count(),
            buffer_duration_sec: buffer.duration_seconds(),
            effective_sample_rate_hz: buffer.effective_sample_rate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementReport {
    pub report_version: String,
    pub producer: ReportProducer,
    /// RFC 3339
    pub computed_at_utc: String,
    pub session: SessionStats,
    pub estimate: HeartRateEstimate,
    pub disclaimer: String,
}

/// Report encoder, one instance per producer
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap an already computed estimate
    pub fn encode(&self, estimate: HeartRateEstimate, session: SessionStats) -> MeasurementReport {
        MeasurementReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: PULSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            session,
            estimate,
            disclaimer: DISCLAIMER.to_string(),
        }
    }

    /// Estimate the monitor's current buffer and wrap the result
    pub fn encode_monitor(&self, monitor: &PulseMonitor) -> MeasurementReport {
        self.encode(monitor.estimate(), SessionStats::from_monitor(monitor))
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, monitor: &PulseMonitor) -> Result<String, PulseError> {
        let report = self.encode_monitor(monitor);
        serde_json::to_string_pretty(&report).map_err(PulseError::JsonError)
    }
}
