//! Capture record types and validation
//!
//! A capture record is one detector callback's worth of data: a face
//! landmark set, an audio analyser tick, or a device failure notice. The
//! device-error record exists so acquisition failure travels through the
//! stream explicitly instead of being papered over with fabricated data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Landmark;

/// Current capture schema version
pub const SCHEMA_VERSION: &str = "vigil.capture.v1";

/// Record discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Face-mesh detector output for one video frame
    Face,
    /// Audio analyser output for one tick
    Audio,
    /// Capture device became unavailable
    DeviceError,
}

/// Face payload: zero landmarks means the detector ran but found no face.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacePayload {
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
}

/// Audio payload: paired frequency- and time-domain buffers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioPayload {
    pub spectrum: Vec<u8>,
    pub waveform: Vec<u8>,
    pub sample_rate: f64,
}

/// Device failure notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceErrorPayload {
    /// Which device failed ("camera", "microphone")
    pub device: String,
    pub message: String,
}

/// One capture record as delivered on the input stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRecord {
    pub schema_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub record_type: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<FacePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DeviceErrorPayload>,
}

/// Validation failures for a capture record
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Unsupported schema version: {0}")]
    UnsupportedSchema(String),

    #[error("Record type {0:?} requires a {1} payload")]
    MissingPayload(RecordKind, &'static str),

    #[error("Landmark {index} out of normalized range: ({x}, {y})")]
    LandmarkOutOfRange { index: usize, x: f64, y: f64 },

    #[error("Audio payload has an empty {0} buffer")]
    EmptyBuffer(&'static str),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),
}

impl CaptureRecord {
    /// Validate the record against the schema contract.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::UnsupportedSchema(
                self.schema_version.clone(),
            ));
        }

        match self.record_type {
            RecordKind::Face => {
                let payload = self
                    .face
                    .as_ref()
                    .ok_or(ValidationError::MissingPayload(RecordKind::Face, "face"))?;
                for (index, lm) in payload.landmarks.iter().enumerate() {
                    let in_range = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
                    if !in_range(lm.x) || !in_range(lm.y) {
                        return Err(ValidationError::LandmarkOutOfRange {
                            index,
                            x: lm.x,
                            y: lm.y,
                        });
                    }
                }
                Ok(())
            }
            RecordKind::Audio => {
                let payload = self
                    .audio
                    .as_ref()
                    .ok_or(ValidationError::MissingPayload(RecordKind::Audio, "audio"))?;
                if payload.spectrum.is_empty() {
                    return Err(ValidationError::EmptyBuffer("spectrum"));
                }
                if payload.waveform.is_empty() {
                    return Err(ValidationError::EmptyBuffer("waveform"));
                }
                if !(payload.sample_rate.is_finite() && payload.sample_rate > 0.0) {
                    return Err(ValidationError::InvalidSampleRate(payload.sample_rate));
                }
                Ok(())
            }
            RecordKind::DeviceError => {
                self.error
                    .as_ref()
                    .ok_or(ValidationError::MissingPayload(
                        RecordKind::DeviceError,
                        "error",
                    ))?;
                Ok(())
            }
        }
    }
}
