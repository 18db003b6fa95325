//! Report encoder
//!
//! Encodes a session's latest evaluations into a versioned JSON report
//! payload for downstream consumers: producer metadata, provenance,
//! quality, the per-modality evaluations, and the combined assessment.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SignalError;
use crate::session::{CombinedAssessment, CombinedSession, SessionSummary};
use crate::types::{FaceEvaluation, VoiceEvaluation};
use crate::{PRODUCER_NAME, VIGIL_VERSION};

/// Current report schema version
pub const REPORT_VERSION: &str = "vigil.report.v1";

/// Sessions must log at least this many evaluations before the confidence
/// bonus applies
const CONFIDENCE_BONUS_EVALUATIONS: u64 = 30;

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report provenance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    pub session_id: String,
    pub source_device_id: String,
    pub session_started_utc: String,
    pub computed_at_utc: String,
}

/// Report quality metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportQuality {
    /// Mean signal coverage over the latest evaluations (0-1)
    pub coverage: f64,
    /// Overall confidence in the report (0-1)
    pub confidence: f64,
    /// Quality flags from the latest evaluations
    pub flags: Vec<String>,
}

/// Complete report payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub quality: ReportQuality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face: Option<FaceEvaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceEvaluation>,
    pub assessment: CombinedAssessment,
    pub summary: SessionSummary,
}

/// Report encoder
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

    /// Encode the session's latest state into a report payload
    pub fn encode(&self, session: &CombinedSession) -> Result<ReportPayload, SignalError> {
        let computed_at = Utc::now();

        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: VIGIL_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let provenance = ReportProvenance {
            session_id: session.session_id().to_string(),
            source_device_id: session.device_id().to_string(),
            session_started_utc: session.started_at().to_rfc3339(),
            computed_at_utc: computed_at.to_rfc3339(),
        };

        Ok(ReportPayload {
            report_version: REPORT_VERSION.to_string(),
            producer,
            provenance,
            quality: build_quality(session),
            face: session.last_face_evaluation().cloned(),
            voice: session.last_voice_evaluation().cloned(),
            assessment: session.assessment(),
            summary: session.summary(),
        })
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, session: &CombinedSession) -> Result<String, SignalError> {
        let payload = self.encode(session)?;
        serde_json::to_string_pretty(&payload).map_err(SignalError::JsonError)
    }
}

fn build_quality(session: &CombinedSession) -> ReportQuality {
    let mut coverages = Vec::new();
    let mut flags = Vec::new();

    if let Some(face) = session.last_face_evaluation() {
        coverages.push(face.coverage);
        flags.extend(face.flags.iter().map(|f| format!("{f:?}").to_lowercase()));
    }
    if let Some(voice) = session.last_voice_evaluation() {
        coverages.push(voice.coverage);
        flags.extend(voice.flags.iter().map(|f| format!("{f:?}").to_lowercase()));
    }

    let coverage = if coverages.is_empty() {
        0.0
    } else {
        coverages.iter().sum::<f64>() / coverages.len() as f64
    };

    let bonus = if session.summary().evaluations >= CONFIDENCE_BONUS_EVALUATIONS {
        0.1
    } else {
        0.0
    };
    let confidence = (coverage + bonus).min(1.0);

    ReportQuality {
        coverage,
        confidence,
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Landmark, LandmarkFrame};
    use chrono::{TimeZone, Utc};

    fn make_session() -> CombinedSession {
        let started = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let mut session = CombinedSession::with_id("sess-enc", "cam-1", started);
        let frame = LandmarkFrame {
            timestamp: started,
            landmarks: vec![Landmark::new(0.5, 0.5); crate::types::FACE_MESH_LANDMARKS],
        };
        session.process_face_frame(&frame).unwrap();
        session
    }

    #[test]
    fn test_encode_payload_structure() {
        let session = make_session();
        let encoder = ReportEncoder::with_instance_id("inst-1".to_string());
        let json = encoder.encode_to_json(&session).unwrap();

        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["report_version"], REPORT_VERSION);
        assert_eq!(payload["producer"]["name"], PRODUCER_NAME);
        assert_eq!(payload["producer"]["instance_id"], "inst-1");
        assert_eq!(payload["provenance"]["session_id"], "sess-enc");
        assert_eq!(payload["provenance"]["source_device_id"], "cam-1");
        assert!(payload["face"]["risk"]["score"].is_number());
        assert!(payload["voice"].is_null());
        assert!(payload["assessment"]["overall"]["score"].is_number());
        assert_eq!(payload["summary"]["evaluations"], 1);
    }

    #[test]
    fn test_quality_flags_are_lowercased() {
        let session = make_session();
        let encoder = ReportEncoder::new();
        let payload = encoder.encode(&session).unwrap();

        // All-default landmarks leave the eye contours degenerate on the
        // first frame, so at least the firstframe flag is present
        assert!(payload
            .quality
            .flags
            .iter()
            .any(|f| f == "firstframe"));
        assert!(payload.quality.coverage > 0.0);
        assert!(payload.quality.confidence >= payload.quality.coverage - 1e-9);
    }

    #[test]
    fn test_empty_session_has_zero_coverage() {
        let started = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        let session = CombinedSession::with_id("sess-empty", "cam-1", started);
        let payload = ReportEncoder::new().encode(&session).unwrap();

        assert_eq!(payload.quality.coverage, 0.0);
        assert!(payload.face.is_none());
        assert!(payload.assessment.overall.is_none());
    }

    #[test]
    fn test_generated_instance_ids_differ() {
        let a = ReportEncoder::new();
        let b = ReportEncoder::new();
        let session = make_session();
        let pa = a.encode(&session).unwrap();
        let pb = b.encode(&session).unwrap();
        assert_ne!(pa.producer.instance_id, pb.producer.instance_id);
    }
}
