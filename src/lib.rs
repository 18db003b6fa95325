//! Vigil Core - On-device scoring engine for behavioral disease-risk signals
//!
//! Vigil turns raw capture frames from external detectors into bounded
//! behavioral sub-metrics and risk scores through a deterministic pipeline:
//! capture adaptation → signal extraction → risk aggregation → report
//! encoding.
//!
//! ## Modules
//!
//! - **Face pipeline**: blink detection, gaze, asymmetry, expressivity, and
//!   tremor metrics over face-mesh landmark frames
//! - **Voice pipeline**: pitch, volume, speech-rate, pause, and monotonicity
//!   metrics over audio analyser frames
//! - **Scoring**: fixed-weight risk aggregation, classification, and the
//!   configurable condition-indicator tables

pub mod encoder;
pub mod error;
pub mod face;
pub mod geometry;
pub mod history;
pub mod schema;
pub mod scoring;
pub mod session;
pub mod types;
pub mod voice;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use error::SignalError;
pub use face::{BlinkState, FaceExtractor};
pub use session::{CombinedSession, FaceSession, SignalSink, VoiceSession};
pub use voice::VoiceExtractor;

// Schema exports
pub use schema::{CaptureAdapter, CaptureFrame, CaptureRecord, SCHEMA_VERSION};

// Type exports
pub use types::{
    AudioFrame, FaceMetrics, LandmarkFrame, RiskLevel, RiskScore, VoiceMetrics,
};

/// Vigil version embedded in all report payloads
pub const VIGIL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report payloads
pub const PRODUCER_NAME: &str = "vigil-core";
