//! Capture record adapter
//!
//! Parses capture record streams (NDJSON or JSON array) and converts
//! records into the frames the session processors consume. Device-error
//! records surface as `SignalError::DeviceUnavailable` so the caller sees
//! the failure instead of a fabricated reading.

use crate::error::SignalError;
use crate::schema::record::{CaptureRecord, RecordKind, ValidationError};
use crate::types::{AudioFrame, LandmarkFrame};

/// A capture record converted into a processable frame.
#[derive(Debug, Clone)]
pub enum CaptureFrame {
    Face(LandmarkFrame),
    Audio(AudioFrame),
}

/// Validation outcome for one record in a stream
#[derive(Debug)]
pub struct RecordValidation {
    pub index: usize,
    pub record_id: Option<String>,
    pub error: ValidationError,
}

/// Stateless parsing and conversion helpers for capture streams.
pub struct CaptureAdapter;

impl CaptureAdapter {
    /// Parse newline-delimited JSON (one record per line, blanks skipped).
    pub fn parse_ndjson(input: &str) -> Result<Vec<CaptureRecord>, SignalError> {
        let mut records = Vec::new();
        for (line_no, line) in input.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: CaptureRecord = serde_json::from_str(trimmed).map_err(|e| {
                SignalError::ParseError(format!("line {}: {}", line_no + 1, e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    /// Parse a JSON array of records.
    pub fn parse_array(input: &str) -> Result<Vec<CaptureRecord>, SignalError> {
        serde_json::from_str(input)
            .map_err(|e| SignalError::ParseError(format!("Failed to parse record array: {}", e)))
    }

    /// Validate every record, returning one entry per failure.
    pub fn validate_records(records: &[CaptureRecord]) -> Vec<RecordValidation> {
        records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                record.validate().err().map(|error| RecordValidation {
                    index,
                    record_id: record.record_id.clone(),
                    error,
                })
            })
            .collect()
    }

    /// Convert one validated record into a processable frame.
    ///
    /// Device-error records yield `DeviceUnavailable`; a face record with
    /// zero landmarks converts to an empty frame (no face detected).
    pub fn to_frame(record: &CaptureRecord) -> Result<CaptureFrame, SignalError> {
        match record.record_type {
            RecordKind::Face => {
                let payload = record
                    .face
                    .as_ref()
                    .ok_or_else(|| SignalError::MissingField("face".to_string()))?;
                Ok(CaptureFrame::Face(LandmarkFrame {
                    timestamp: record.timestamp,
                    landmarks: payload.landmarks.clone(),
                }))
            }
            RecordKind::Audio => {
                let payload = record
                    .audio
                    .as_ref()
                    .ok_or_else(|| SignalError::MissingField("audio".to_string()))?;
                Ok(CaptureFrame::Audio(AudioFrame {
                    timestamp: record.timestamp,
                    spectrum: payload.spectrum.clone(),
                    waveform: payload.waveform.clone(),
                    sample_rate: payload.sample_rate,
                }))
            }
            RecordKind::DeviceError => {
                let payload = record
                    .error
                    .as_ref()
                    .ok_or_else(|| SignalError::MissingField("error".to_string()))?;
                Err(SignalError::DeviceUnavailable(format!(
                    "{}: {}",
                    payload.device, payload.message
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_line() -> &'static str {
        r#"{"schema_version":"vigil.capture.v1","timestamp":"2024-01-15T14:00:00Z","record_type":"face","face":{"landmarks":[{"x":0.5,"y":0.5}]}}"#
    }

    fn audio_line() -> &'static str {
        r#"{"schema_version":"vigil.capture.v1","timestamp":"2024-01-15T14:00:01Z","record_type":"audio","audio":{"spectrum":[0,200,0],"waveform":[128,192,64],"sample_rate":44100.0}}"#
    }

    fn device_error_line() -> &'static str {
        r#"{"schema_version":"vigil.capture.v1","timestamp":"2024-01-15T14:00:02Z","record_type":"device_error","error":{"device":"camera","message":"permission denied"}}"#
    }

    #[test]
    fn test_parse_ndjson_skips_blank_lines() {
        let input = format!("{}\n\n{}\n", face_line(), audio_line());
        let records = CaptureAdapter::parse_ndjson(&input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, RecordKind::Face);
        assert_eq!(records[1].record_type, RecordKind::Audio);
    }

    #[test]
    fn test_parse_ndjson_reports_line_number() {
        let input = format!("{}\nnot json\n", face_line());
        let err = CaptureAdapter::parse_ndjson(&input).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array() {
        let input = format!("[{},{}]", face_line(), audio_line());
        let records = CaptureAdapter::parse_array(&input).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_validate_records_collects_failures() {
        let mut records = CaptureAdapter::parse_ndjson(face_line()).unwrap();
        records[0].face.as_mut().unwrap().landmarks[0].x = 2.0;
        let failures = CaptureAdapter::validate_records(&records);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 0);
    }

    #[test]
    fn test_face_record_to_frame() {
        let records = CaptureAdapter::parse_ndjson(face_line()).unwrap();
        match CaptureAdapter::to_frame(&records[0]).unwrap() {
            CaptureFrame::Face(frame) => assert_eq!(frame.landmarks.len(), 1),
            other => panic!("expected face frame, got {other:?}"),
        }
    }

    #[test]
    fn test_audio_record_to_frame() {
        let records = CaptureAdapter::parse_ndjson(audio_line()).unwrap();
        match CaptureAdapter::to_frame(&records[0]).unwrap() {
            CaptureFrame::Audio(frame) => {
                assert_eq!(frame.spectrum, vec![0, 200, 0]);
                assert_eq!(frame.sample_rate, 44_100.0);
            }
            other => panic!("expected audio frame, got {other:?}"),
        }
    }

    #[test]
    fn test_device_error_surfaces_as_unavailable() {
        let records = CaptureAdapter::parse_ndjson(device_error_line()).unwrap();
        let err = CaptureAdapter::to_frame(&records[0]).unwrap_err();
        assert!(matches!(err, SignalError::DeviceUnavailable(_)));
        assert!(err.to_string().contains("camera"));
    }
}
