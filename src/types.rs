//! Core types for the vigil-core pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: capture frames, extracted metric sets, and scored evaluations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of points delivered per frame by the face-mesh detector
/// (MediaPipe Face Mesh convention).
pub const FACE_MESH_LANDMARKS: usize = 468;

/// A single detected anatomical point in normalized [0,1] image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    /// Depth coordinate, when the detector provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }
}

/// One video frame's worth of face landmarks.
///
/// An empty `landmarks` vector means the detector ran but found no face;
/// the extractor must tolerate that without failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkFrame {
    /// When the frame was observed
    pub timestamp: DateTime<Utc>,
    /// Positionally indexed landmark points
    pub landmarks: Vec<Landmark>,
}

impl LandmarkFrame {
    /// Frame with no detected face
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            landmarks: Vec::new(),
        }
    }

    /// Landmark at a positional index, if present
    pub fn landmark(&self, index: usize) -> Option<Landmark> {
        self.landmarks.get(index).copied()
    }
}

/// One audio analysis tick: frequency-domain magnitudes and time-domain
/// amplitude samples, both unsigned 8-bit normalized intensity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFrame {
    /// When the tick was observed
    pub timestamp: DateTime<Utc>,
    /// Frequency-domain magnitudes (one per bin)
    pub spectrum: Vec<u8>,
    /// Time-domain amplitude samples, centered on 128
    pub waveform: Vec<u8>,
    /// Capture sample rate in Hz
    pub sample_rate: f64,
}

/// Face sub-metrics, each bounded to [0,100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceMetrics {
    /// Blinks in the trailing 60 s window, normalized against 40/min
    pub blink_rate: f64,
    /// Eye-midpoint offset from the nose tip
    pub gaze_deviation: f64,
    /// Mean left/right offset imbalance over symmetric landmark pairs
    pub facial_asymmetry: f64,
    /// Mouth openness combined with eyebrow contour variation
    pub expressivity: f64,
    /// Mean inter-frame displacement of stable key landmarks
    pub tremor_indicators: f64,
}

/// Voice sub-metrics, each bounded to [0,100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceMetrics {
    /// Spread of the fundamental over the trailing pitch history
    pub pitch_variation: f64,
    /// Rate of large adjacent pitch movements
    pub speech_rate: f64,
    /// Fraction of the trailing volume history below the silence floor
    pub pause_duration: f64,
    /// Inverse pitch spread; high values mean a flat delivery
    pub monotonicity: f64,
    /// Blend of pitch liveliness and mean volume
    pub emotional_valence: f64,
}

/// Ordinal risk bucket derived from the numeric score via fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    High,
}

impl RiskLevel {
    /// Classify a [0,100] score. Boundaries are inclusive on the upper
    /// bucket: 20.0 is Moderate, 60.0 is High.
    pub fn from_score(score: f64) -> Self {
        if score < 20.0 {
            RiskLevel::Low
        } else if score < 40.0 {
            RiskLevel::Moderate
        } else if score < 60.0 {
            RiskLevel::Elevated
        } else {
            RiskLevel::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::Elevated => "elevated",
            RiskLevel::High => "high",
        }
    }
}

/// A scored evaluation result: numeric score plus its ordinal bucket.
///
/// Computed fresh each evaluation; replaced, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Weighted sum of sub-metrics, clamped to [0,100]
    pub score: f64,
    /// Ordinal classification of `score`
    pub level: RiskLevel,
}

impl RiskScore {
    pub fn from_value(score: f64) -> Self {
        let score = score.clamp(0.0, 100.0);
        Self {
            score,
            level: RiskLevel::from_score(score),
        }
    }
}

/// Quality flags for a face evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceQualityFlag {
    /// The detector delivered no face this frame
    NoFaceDetected,
    /// One or more required landmark indices were absent
    MissingLandmarks,
    /// First frame of the session; tremor has no prior keypoints yet
    FirstFrame,
}

/// Quality flags for a voice evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceQualityFlag {
    /// No dominant frequency fell inside the voice fundamental range
    NoPitchDetected,
    /// Rolling history is below the minimum sample count
    ShortHistory,
    /// The frame's volume was below the silence floor
    Silence,
}

/// Result of evaluating one landmark frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceEvaluation {
    /// Frame timestamp
    pub timestamp: DateTime<Utc>,
    /// Extracted sub-metrics
    pub metrics: FaceMetrics,
    /// Aggregated risk
    pub risk: RiskScore,
    /// Blinks registered in the trailing 60 s window
    pub blinks_in_window: u32,
    /// Total blinks registered this session
    pub total_blinks: u64,
    /// Fraction of sub-metrics backed by real signal this frame (0-1)
    pub coverage: f64,
    /// Quality flags raised this frame
    pub flags: Vec<FaceQualityFlag>,
}

/// Result of evaluating one audio frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceEvaluation {
    /// Frame timestamp
    pub timestamp: DateTime<Utc>,
    /// Extracted sub-metrics
    pub metrics: VoiceMetrics,
    /// Aggregated risk
    pub risk: RiskScore,
    /// Detected fundamental this frame (Hz), 0 when none
    pub pitch_hz: f64,
    /// RMS volume this frame, scaled to [0,100]
    pub volume: f64,
    /// Fraction of sub-metrics backed by real signal this frame (0-1)
    pub coverage: f64,
    /// Quality flags raised this frame
    pub flags: Vec<VoiceQualityFlag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(19.9), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(39.9), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_score(59.9), RiskLevel::Elevated);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::High);
    }

    #[test]
    fn test_risk_score_clamps() {
        let over = RiskScore::from_value(140.0);
        assert_eq!(over.score, 100.0);
        assert_eq!(over.level, RiskLevel::High);

        let under = RiskScore::from_value(-5.0);
        assert_eq!(under.score, 0.0);
        assert_eq!(under.level, RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_serialization() {
        let json = serde_json::to_string(&RiskLevel::Elevated).unwrap();
        assert_eq!(json, "\"elevated\"");

        let parsed: RiskLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, RiskLevel::Elevated);
    }

    #[test]
    fn test_landmark_frame_deserialization() {
        let json = r#"{
            "timestamp": "2024-01-15T14:00:00Z",
            "landmarks": [
                { "x": 0.5, "y": 0.5 },
                { "x": 0.4, "y": 0.6, "z": -0.02 }
            ]
        }"#;

        let frame: LandmarkFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.landmarks.len(), 2);
        assert_eq!(frame.landmark(0).unwrap().z, None);
        assert_eq!(frame.landmark(1).unwrap().z, Some(-0.02));
        assert!(frame.landmark(2).is_none());
    }

    #[test]
    fn test_empty_frame_means_no_face() {
        let frame = LandmarkFrame::empty(Utc::now());
        assert!(frame.landmarks.is_empty());
        assert!(frame.landmark(0).is_none());
    }
}
