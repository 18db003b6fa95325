//! Capture record schema (vigil.capture.v1)
//!
//! Input contract between external detectors (face mesh, audio analyser)
//! and the scoring pipeline.

mod adapter;
mod record;

pub use adapter::{CaptureAdapter, CaptureFrame, RecordValidation};
pub use record::{
    AudioPayload, CaptureRecord, DeviceErrorPayload, FacePayload, RecordKind, ValidationError,
    SCHEMA_VERSION,
};
