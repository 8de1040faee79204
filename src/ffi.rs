//! FFI bindings for Synheart Pulse
//!
//! This module provides C-compatible functions for calling Pulse from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `pulse_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::{ptr, slice};

use crate::config::PulseConfig;
use crate::error::PulseError;
use crate::pipeline::{estimate_from_samples, PulseMonitor};
use crate::report::ReportEncoder;
use crate::types::{PixelFrame, Sample};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Map a unit result to the 0 / -1 status convention
fn status(result: Result<(), PulseError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Estimate a heart rate from a JSON array of samples.
///
/// # Safety
/// - `samples_json` must be a valid null-terminated C string holding
///   `[{"timestamp", "red", "green", "blue"}, ...]` in timestamp order.
/// - `config_json` may be NULL to use the default configuration.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_estimate_samples(
    samples_json: *const c_char,
    config_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let samples_str = match cstr_to_string(samples_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid samples string pointer");
            return ptr::null_mut();
        }
    };

    let config = if config_json.is_null() {
        PulseConfig::default()
    } else {
        let config_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match PulseConfig::from_json(&config_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let result = serde_json::from_str::<Vec<Sample>>(&samples_str)
        .map_err(PulseError::from)
        .and_then(|samples| estimate_from_samples(&samples, &config))
        .and_then(|estimate| estimate.to_json());

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateful Monitor API
// ============================================================================

/// Opaque handle to a PulseMonitor
pub struct PulseMonitorHandle {
    monitor: PulseMonitor,
    encoder: ReportEncoder,
}

/// Create a new PulseMonitor with the specified buffer window.
///
/// # Safety
/// - Returns a pointer to a newly allocated PulseMonitor.
/// - Must be freed with `pulse_monitor_free`.
/// - A non-positive `window_ms` selects the default window.
/// - Returns NULL if `window_ms` exceeds the longest supported window;
///   call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_new(window_ms: i32) -> *mut PulseMonitorHandle {
    clear_last_error();

    let monitor = if window_ms <= 0 {
        PulseMonitor::new()
    } else {
        match PulseMonitor::with_window_ms(window_ms as f64) {
            Ok(monitor) => monitor,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(PulseMonitorHandle {
        monitor,
        encoder: ReportEncoder::new(),
    });
    Box::into_raw(handle)
}

/// Free a PulseMonitor.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `pulse_monitor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_free(monitor: *mut PulseMonitorHandle) {
    if !monitor.is_null() {
        drop(Box::from_raw(monitor));
    }
}

/// Sample an RGBA frame and add it to the buffer.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `pulse_monitor_new`.
/// - `data` must point to `len` readable bytes laid out as `height` rows of
///   `stride` bytes, 4 bytes per pixel in R, G, B, A order.
/// - A negative `timestamp_ms` stamps the frame with the library's monotonic clock.
/// - Returns 0 on success, -1 if the frame was dropped.
/// - On error, call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_push_frame(
    monitor: *mut PulseMonitorHandle,
    width: u32,
    height: u32,
    stride: u32,
    data: *const u8,
    len: usize,
    timestamp_ms: f64,
) -> i32 {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return -1;
    }
    if data.is_null() {
        set_last_error("Null frame data pointer");
        return -1;
    }

    let handle = &mut *monitor;
    let frame = PixelFrame::with_stride(width, height, stride as usize, slice::from_raw_parts(data, len));

    let result = if timestamp_ms < 0.0 {
        handle.monitor.push_frame(&frame)
    } else {
        handle.monitor.push_frame_at(&frame, timestamp_ms)
    };
    status(result.map(|_| ()))
}

/// Add an already aggregated sample to the buffer.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns 0 on success, -1 if the sample was rejected.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_push_sample(
    monitor: *mut PulseMonitorHandle,
    timestamp_ms: f64,
    red: f64,
    green: f64,
    blue: f64,
) -> i32 {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return -1;
    }

    let handle = &mut *monitor;
    status(
        handle
            .monitor
            .add_sample(Sample::new(timestamp_ms, red, green, blue)),
    )
}

/// Estimate the heart rate from the current buffer.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Insufficient data is not an error: the JSON carries `"heart_rate": null`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_estimate(monitor: *mut PulseMonitorHandle) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &*monitor;

    match handle.monitor.estimate_to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Estimate and wrap the result in a measurement report.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_report(monitor: *mut PulseMonitorHandle) -> *mut c_char {
    clear_last_error();

    if monitor.is_null() {
        set_last_error("Null monitor pointer");
        return ptr::null_mut();
    }

    let handle = &*monitor;

    match handle.encoder.encode_to_json(&handle.monitor) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Discard all buffered samples.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `pulse_monitor_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_clear(monitor: *mut PulseMonitorHandle) {
    clear_last_error();

    if let Some(handle) = monitor.as_mut() {
        handle.monitor.clear();
    }
}

/// Number of buffered samples, or -1 for a NULL handle.
///
/// # Safety
/// - `monitor` must be a valid pointer returned by `pulse_monitor_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_sample_count(monitor: *const PulseMonitorHandle) -> i32 {
    match monitor.as_ref() {
        Some(handle) => i32::try_from(handle.monitor.sample_count()).unwrap_or(i32::MAX),
        None => -1,
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pulse functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Pulse function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Pulse library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
