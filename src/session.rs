//! Session-scoped processing
//!
//! Sessions own the mutable per-session state (blink state, keypoint
//! cache, rolling histories) and drive one evaluation per capture frame.
//! Evaluations are fully synchronous within the callback that delivers the
//! frame; a stopped session refuses further frames until `reset()`.
//!
//! State never crosses session boundaries: dropping or resetting a session
//! discards everything it accumulated. Snapshots allow a host to persist a
//! session across process restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SignalError;
use crate::face::FaceExtractor;
use crate::history::RollingHistory;
use crate::scoring::{
    self, default_modality_blends, default_projections, DiseaseProjection, ModalityBlend,
};
use crate::types::{
    AudioFrame, FaceEvaluation, FaceMetrics, LandmarkFrame, RiskLevel, RiskScore, VoiceEvaluation,
    VoiceMetrics,
};
use crate::voice::VoiceExtractor;

/// Trailing evaluations kept for the session risk trend
const RISK_TREND_CAPACITY: usize = 100;

/// Outward contract to the presentation layer: called once per evaluation
/// with the fresh metric set and risk score.
pub trait SignalSink {
    fn on_face_metrics(&mut self, _metrics: &FaceMetrics) {}
    fn on_voice_metrics(&mut self, _metrics: &VoiceMetrics) {}
    fn on_risk_score(&mut self, _risk: &RiskScore) {}
}

/// A named condition indicator value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseIndicator {
    pub name: String,
    pub value: f64,
}

/// Cross-modality assessment built from the latest evaluations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedAssessment {
    /// Latest face risk, if any frames were processed
    pub face: Option<RiskScore>,
    /// Latest voice risk, if any frames were processed
    pub voice: Option<RiskScore>,
    /// Equal-weight mean of the modality scores that are present
    pub overall: Option<RiskScore>,
    /// Face-metric projections from the latest face evaluation
    pub projections: Vec<DiseaseIndicator>,
    /// Modality blends, present only when both modalities have scores
    pub blended_indicators: Vec<DiseaseIndicator>,
}

/// Summary statistics over a session's risk trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Total evaluations processed
    pub evaluations: u64,
    /// Mean overall risk over the trailing trend window
    pub mean_risk: Option<f64>,
    /// Peak overall risk over the trailing trend window
    pub peak_risk: Option<f64>,
    /// Classification of the latest overall score
    pub current_level: Option<RiskLevel>,
}

/// Stateful face processor for one capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceSession {
    extractor: FaceExtractor,
    active: bool,
}

impl Default for FaceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceSession {
    pub fn new() -> Self {
        Self {
            extractor: FaceExtractor::new(),
            active: true,
        }
    }

    /// Evaluate one landmark frame.
    pub fn process(&mut self, frame: &LandmarkFrame) -> Result<FaceEvaluation, SignalError> {
        if !self.active {
            return Err(SignalError::InvalidSession(
                "face session is stopped".to_string(),
            ));
        }

        let extraction = self.extractor.extract(frame);
        let risk = scoring::score_face(&extraction.metrics);

        Ok(FaceEvaluation {
            timestamp: frame.timestamp,
            metrics: extraction.metrics,
            risk,
            blinks_in_window: self.extractor.blink_state().blinks_in_window(),
            total_blinks: self.extractor.blink_state().total_blinks(),
            coverage: extraction.coverage,
            flags: extraction.flags,
        })
    }

    /// Evaluate one frame and notify the sink.
    pub fn process_with(
        &mut self,
        frame: &LandmarkFrame,
        sink: &mut dyn SignalSink,
    ) -> Result<FaceEvaluation, SignalError> {
        let evaluation = self.process(frame)?;
        sink.on_face_metrics(&evaluation.metrics);
        sink.on_risk_score(&evaluation.risk);
        Ok(evaluation)
    }

    /// Refuse further frames until `reset()`.
    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Discard all session state and start fresh.
    pub fn reset(&mut self) {
        self.extractor.reset();
        self.active = true;
    }
}

/// Stateful voice processor for one capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSession {
    extractor: VoiceExtractor,
    active: bool,
}

impl Default for VoiceSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceSession {
    pub fn new() -> Self {
        Self {
            extractor: VoiceExtractor::new(),
            active: true,
        }
    }

    /// Evaluate one audio frame.
    pub fn process(&mut self, frame: &AudioFrame) -> Result<VoiceEvaluation, SignalError> {
        if !self.active {
            return Err(SignalError::InvalidSession(
                "voice session is stopped".to_string(),
            ));
        }

        let extraction = self.extractor.extract(frame);
        let risk = scoring::score_voice(&extraction.metrics);

        Ok(VoiceEvaluation {
            timestamp: frame.timestamp,
            metrics: extraction.metrics,
            risk,
            pitch_hz: extraction.sample.pitch_hz,
            volume: extraction.sample.volume,
            coverage: extraction.coverage,
            flags: extraction.flags,
        })
    }

    /// Evaluate one frame and notify the sink.
    pub fn process_with(
        &mut self,
        frame: &AudioFrame,
        sink: &mut dyn SignalSink,
    ) -> Result<VoiceEvaluation, SignalError> {
        let evaluation = self.process(frame)?;
        sink.on_voice_metrics(&evaluation.metrics);
        sink.on_risk_score(&evaluation.risk);
        Ok(evaluation)
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reset(&mut self) {
        self.extractor.reset();
        self.active = true;
    }
}

/// Combined face + voice session with cross-modality assessment and a
/// trailing risk trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedSession {
    session_id: String,
    device_id: String,
    started_at: DateTime<Utc>,
    face: FaceSession,
    voice: VoiceSession,
    last_face: Option<FaceEvaluation>,
    last_voice: Option<VoiceEvaluation>,
    risk_trend: RollingHistory,
    evaluations: u64,
    projections: Vec<DiseaseProjection>,
    blends: Vec<ModalityBlend>,
}

impl CombinedSession {
    /// Create a session with a generated id and the built-in indicator
    /// tables.
    pub fn new(device_id: &str, started_at: DateTime<Utc>) -> Self {
        Self::with_id(&Uuid::new_v4().to_string(), device_id, started_at)
    }

    pub fn with_id(session_id: &str, device_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            device_id: device_id.to_string(),
            started_at,
            face: FaceSession::new(),
            voice: VoiceSession::new(),
            last_face: None,
            last_voice: None,
            risk_trend: RollingHistory::new(RISK_TREND_CAPACITY),
            evaluations: 0,
            projections: default_projections(),
            blends: default_modality_blends(),
        }
    }

    /// Replace the condition-indicator tables.
    pub fn with_indicator_tables(
        mut self,
        projections: Vec<DiseaseProjection>,
        blends: Vec<ModalityBlend>,
    ) -> Self {
        self.projections = projections;
        self.blends = blends;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Latest face evaluation, if any frames were processed
    pub fn last_face_evaluation(&self) -> Option<&FaceEvaluation> {
        self.last_face.as_ref()
    }

    /// Latest voice evaluation, if any frames were processed
    pub fn last_voice_evaluation(&self) -> Option<&VoiceEvaluation> {
        self.last_voice.as_ref()
    }

    /// Evaluate one landmark frame and fold it into the session trend.
    pub fn process_face_frame(
        &mut self,
        frame: &LandmarkFrame,
    ) -> Result<FaceEvaluation, SignalError> {
        let evaluation = self.face.process(frame)?;
        self.last_face = Some(evaluation.clone());
        self.record_trend();
        Ok(evaluation)
    }

    /// Evaluate one audio frame and fold it into the session trend.
    pub fn process_audio_frame(
        &mut self,
        frame: &AudioFrame,
    ) -> Result<VoiceEvaluation, SignalError> {
        let evaluation = self.voice.process(frame)?;
        self.last_voice = Some(evaluation.clone());
        self.record_trend();
        Ok(evaluation)
    }

    fn record_trend(&mut self) {
        self.evaluations += 1;
        if let Some(overall) = self.overall_risk() {
            self.risk_trend.push(overall.score);
        }
    }

    fn overall_risk(&self) -> Option<RiskScore> {
        scoring::combined_score(
            self.last_face.as_ref().map(|e| e.risk),
            self.last_voice.as_ref().map(|e| e.risk),
        )
    }

    /// Cross-modality assessment from the latest evaluations.
    pub fn assessment(&self) -> CombinedAssessment {
        let face = self.last_face.as_ref().map(|e| e.risk);
        let voice = self.last_voice.as_ref().map(|e| e.risk);

        let projections = match &self.last_face {
            Some(evaluation) => self
                .projections
                .iter()
                .map(|p| DiseaseIndicator {
                    name: p.name.clone(),
                    value: p.project(&evaluation.metrics),
                })
                .collect(),
            None => Vec::new(),
        };

        let blended_indicators = match (face, voice) {
            (Some(f), Some(v)) => self
                .blends
                .iter()
                .map(|b| DiseaseIndicator {
                    name: b.name.clone(),
                    value: b.blend(f.score, v.score),
                })
                .collect(),
            _ => Vec::new(),
        };

        CombinedAssessment {
            face,
            voice,
            overall: self.overall_risk(),
            projections,
            blended_indicators,
        }
    }

    /// Summary over the trailing risk trend.
    pub fn summary(&self) -> SessionSummary {
        let mean_risk = if self.risk_trend.is_empty() {
            None
        } else {
            Some(self.risk_trend.mean())
        };
        SessionSummary {
            evaluations: self.evaluations,
            mean_risk,
            peak_risk: self.risk_trend.max(),
            current_level: self.overall_risk().map(|r| r.level),
        }
    }

    /// Stop both modalities; frames are refused until `reset()`.
    pub fn stop(&mut self) {
        self.face.stop();
        self.voice.stop();
    }

    pub fn is_active(&self) -> bool {
        self.face.is_active() || self.voice.is_active()
    }

    /// Discard all state and start a fresh session under the same id.
    pub fn reset(&mut self) {
        self.face.reset();
        self.voice.reset();
        self.last_face = None;
        self.last_voice = None;
        self.risk_trend.clear();
        self.evaluations = 0;
    }

    /// Serialize the full session state for persistence.
    pub fn snapshot(&self) -> Result<String, SignalError> {
        serde_json::to_string(self).map_err(|e| SignalError::EncodingError(e.to_string()))
    }

    /// Restore a session from a snapshot.
    pub fn from_snapshot(json: &str) -> Result<Self, SignalError> {
        serde_json::from_str(json).map_err(|e| SignalError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Landmark;
    use chrono::{Duration, TimeZone};

    fn ts(offset_ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::milliseconds(offset_ms)
    }

    fn face_frame(offset_ms: i64) -> LandmarkFrame {
        LandmarkFrame {
            timestamp: ts(offset_ms),
            landmarks: vec![Landmark::new(0.5, 0.5); crate::types::FACE_MESH_LANDMARKS],
        }
    }

    fn audio_frame(offset_ms: i64) -> AudioFrame {
        let mut spectrum = vec![0u8; 1024];
        spectrum[7] = 200; // ~150 Hz at 44.1 kHz / 1024 bins
        AudioFrame {
            timestamp: ts(offset_ms),
            spectrum,
            waveform: vec![192u8; 256],
            sample_rate: 44_100.0,
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        face_metrics: usize,
        voice_metrics: usize,
        risk_scores: Vec<f64>,
    }

    impl SignalSink for RecordingSink {
        fn on_face_metrics(&mut self, _metrics: &FaceMetrics) {
            self.face_metrics += 1;
        }
        fn on_voice_metrics(&mut self, _metrics: &VoiceMetrics) {
            self.voice_metrics += 1;
        }
        fn on_risk_score(&mut self, risk: &RiskScore) {
            self.risk_scores.push(risk.score);
        }
    }

    #[test]
    fn test_face_session_evaluates_frames() {
        let mut session = FaceSession::new();
        let evaluation = session.process(&face_frame(0)).unwrap();
        assert_eq!(evaluation.timestamp, ts(0));
        assert!((0.0..=100.0).contains(&evaluation.risk.score));
    }

    #[test]
    fn test_stopped_session_refuses_frames() {
        let mut session = FaceSession::new();
        session.stop();
        let err = session.process(&face_frame(0)).unwrap_err();
        assert!(matches!(err, SignalError::InvalidSession(_)));

        session.reset();
        assert!(session.process(&face_frame(100)).is_ok());
    }

    #[test]
    fn test_sink_receives_each_evaluation() {
        let mut face = FaceSession::new();
        let mut voice = VoiceSession::new();
        let mut sink = RecordingSink::default();

        face.process_with(&face_frame(0), &mut sink).unwrap();
        face.process_with(&face_frame(33), &mut sink).unwrap();
        voice.process_with(&audio_frame(50), &mut sink).unwrap();

        assert_eq!(sink.face_metrics, 2);
        assert_eq!(sink.voice_metrics, 1);
        assert_eq!(sink.risk_scores.len(), 3);
    }

    #[test]
    fn test_combined_session_overall_score() {
        let mut session = CombinedSession::with_id("sess-1", "device-1", ts(0));
        session.process_face_frame(&face_frame(0)).unwrap();

        // Face only: overall mirrors the face score
        let assessment = session.assessment();
        assert!(assessment.voice.is_none());
        assert_eq!(
            assessment.overall.unwrap().score,
            assessment.face.unwrap().score
        );

        session.process_audio_frame(&audio_frame(33)).unwrap();
        let assessment = session.assessment();
        let expected =
            (assessment.face.unwrap().score + assessment.voice.unwrap().score) / 2.0;
        assert!((assessment.overall.unwrap().score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_combined_assessment_indicator_tables() {
        let mut session = CombinedSession::with_id("sess-2", "device-1", ts(0));

        // No evaluations yet: no indicators at all
        let empty = session.assessment();
        assert!(empty.projections.is_empty());
        assert!(empty.blended_indicators.is_empty());

        session.process_face_frame(&face_frame(0)).unwrap();
        let face_only = session.assessment();
        assert_eq!(face_only.projections.len(), 4);
        assert!(face_only.blended_indicators.is_empty());

        session.process_audio_frame(&audio_frame(33)).unwrap();
        let both = session.assessment();
        assert_eq!(both.blended_indicators.len(), 4);
        assert!(both
            .blended_indicators
            .iter()
            .any(|i| i.name == "parkinsons"));
    }

    #[test]
    fn test_session_summary_tracks_trend() {
        let mut session = CombinedSession::with_id("sess-3", "device-1", ts(0));
        assert_eq!(session.summary().evaluations, 0);
        assert!(session.summary().mean_risk.is_none());

        for i in 0..5 {
            session.process_face_frame(&face_frame(i * 33)).unwrap();
        }

        let summary = session.summary();
        assert_eq!(summary.evaluations, 5);
        assert!(summary.mean_risk.is_some());
        assert!(summary.peak_risk.unwrap() >= summary.mean_risk.unwrap());
        assert!(summary.current_level.is_some());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut session = CombinedSession::with_id("sess-4", "device-1", ts(0));
        for i in 0..3 {
            session.process_face_frame(&face_frame(i * 33)).unwrap();
        }

        let snapshot = session.snapshot().unwrap();
        let mut restored = CombinedSession::from_snapshot(&snapshot).unwrap();
        assert_eq!(restored.session_id(), "sess-4");
        assert_eq!(restored.summary().evaluations, 3);

        // Restored session keeps processing where it left off
        restored.process_face_frame(&face_frame(200)).unwrap();
        assert_eq!(restored.summary().evaluations, 4);
    }

    #[test]
    fn test_reset_discards_session_state() {
        let mut session = CombinedSession::with_id("sess-5", "device-1", ts(0));
        session.process_face_frame(&face_frame(0)).unwrap();
        session.stop();
        assert!(!session.is_active());

        session.reset();
        assert!(session.is_active());
        assert_eq!(session.summary().evaluations, 0);
        assert!(session.assessment().face.is_none());
    }

    #[test]
    fn test_generated_session_ids_are_unique() {
        let a = CombinedSession::new("device-1", ts(0));
        let b = CombinedSession::new("device-1", ts(0));
        assert_ne!(a.session_id(), b.session_id());
    }
}
