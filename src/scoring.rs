//! Risk score aggregation
//!
//! Combines a metric set into a single risk score via a fixed linear
//! model, then classifies it. Sub-metrics enter the weighted sum as-is:
//! every reading is oriented "higher = larger risk contribution", so no
//! inversion is applied before weighting. The aggregator is a pure
//! function of its inputs with no memory across calls.

use serde::{Deserialize, Serialize};

use crate::types::{FaceMetrics, RiskScore, VoiceMetrics};

/// Face sub-metric weights (sum = 1.0)
const FACE_WEIGHT_BLINK_RATE: f64 = 0.20;
const FACE_WEIGHT_GAZE_DEVIATION: f64 = 0.25;
const FACE_WEIGHT_FACIAL_ASYMMETRY: f64 = 0.25;
const FACE_WEIGHT_EXPRESSIVITY: f64 = 0.15;
const FACE_WEIGHT_TREMOR: f64 = 0.15;

/// Voice sub-metric weights (sum = 1.0)
const VOICE_WEIGHT_PITCH_VARIATION: f64 = 0.25;
const VOICE_WEIGHT_SPEECH_RATE: f64 = 0.20;
const VOICE_WEIGHT_PAUSE_DURATION: f64 = 0.20;
const VOICE_WEIGHT_MONOTONICITY: f64 = 0.20;
const VOICE_WEIGHT_EMOTIONAL_VALENCE: f64 = 0.15;

/// Aggregate a face metric set into a risk score.
pub fn score_face(metrics: &FaceMetrics) -> RiskScore {
    let score = FACE_WEIGHT_BLINK_RATE * metrics.blink_rate
        + FACE_WEIGHT_GAZE_DEVIATION * metrics.gaze_deviation
        + FACE_WEIGHT_FACIAL_ASYMMETRY * metrics.facial_asymmetry
        + FACE_WEIGHT_EXPRESSIVITY * metrics.expressivity
        + FACE_WEIGHT_TREMOR * metrics.tremor_indicators;
    RiskScore::from_value(score)
}

/// Aggregate a voice metric set into a risk score.
pub fn score_voice(metrics: &VoiceMetrics) -> RiskScore {
    let score = VOICE_WEIGHT_PITCH_VARIATION * metrics.pitch_variation
        + VOICE_WEIGHT_SPEECH_RATE * metrics.speech_rate
        + VOICE_WEIGHT_PAUSE_DURATION * metrics.pause_duration
        + VOICE_WEIGHT_MONOTONICITY * metrics.monotonicity
        + VOICE_WEIGHT_EMOTIONAL_VALENCE * metrics.emotional_valence;
    RiskScore::from_value(score)
}

/// Overall score across modalities: equal-weight mean of the scores that
/// are present. `None` when neither modality has produced a score.
pub fn combined_score(face: Option<RiskScore>, voice: Option<RiskScore>) -> Option<RiskScore> {
    match (face, voice) {
        (Some(f), Some(v)) => Some(RiskScore::from_value((f.score + v.score) / 2.0)),
        (Some(f), None) => Some(f),
        (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

/// Selector for one face sub-metric, used by the projection table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceMetricKind {
    BlinkRate,
    GazeDeviation,
    FacialAsymmetry,
    Expressivity,
    TremorIndicators,
}

impl FaceMetricKind {
    pub fn value_in(&self, metrics: &FaceMetrics) -> f64 {
        match self {
            FaceMetricKind::BlinkRate => metrics.blink_rate,
            FaceMetricKind::GazeDeviation => metrics.gaze_deviation,
            FaceMetricKind::FacialAsymmetry => metrics.facial_asymmetry,
            FaceMetricKind::Expressivity => metrics.expressivity,
            FaceMetricKind::TremorIndicators => metrics.tremor_indicators,
        }
    }
}

/// A condition-specific read-only projection over two face sub-metrics.
///
/// These are presentational indicators, not part of the scoring contract;
/// the table is configurable so indicators can be added or retuned without
/// touching the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseProjection {
    pub name: String,
    pub metric_a: FaceMetricKind,
    pub weight_a: f64,
    pub metric_b: FaceMetricKind,
    pub weight_b: f64,
}

impl DiseaseProjection {
    pub fn project(&self, metrics: &FaceMetrics) -> f64 {
        (self.weight_a * self.metric_a.value_in(metrics)
            + self.weight_b * self.metric_b.value_in(metrics))
        .clamp(0.0, 100.0)
    }
}

/// Built-in projection table.
pub fn default_projections() -> Vec<DiseaseProjection> {
    vec![
        DiseaseProjection {
            name: "parkinsons".to_string(),
            metric_a: FaceMetricKind::FacialAsymmetry,
            weight_a: 0.6,
            metric_b: FaceMetricKind::TremorIndicators,
            weight_b: 0.4,
        },
        DiseaseProjection {
            name: "alzheimers".to_string(),
            metric_a: FaceMetricKind::GazeDeviation,
            weight_a: 0.5,
            metric_b: FaceMetricKind::Expressivity,
            weight_b: 0.5,
        },
        DiseaseProjection {
            name: "depression".to_string(),
            metric_a: FaceMetricKind::Expressivity,
            weight_a: 0.7,
            metric_b: FaceMetricKind::BlinkRate,
            weight_b: 0.3,
        },
        DiseaseProjection {
            name: "autism".to_string(),
            metric_a: FaceMetricKind::GazeDeviation,
            weight_a: 0.4,
            metric_b: FaceMetricKind::Expressivity,
            weight_b: 0.6,
        },
    ]
}

/// Per-condition blend of the two modality scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalityBlend {
    pub name: String,
    pub face_weight: f64,
    pub voice_weight: f64,
}

impl ModalityBlend {
    pub fn blend(&self, face_score: f64, voice_score: f64) -> f64 {
        (self.face_weight * face_score + self.voice_weight * voice_score).clamp(0.0, 100.0)
    }
}

/// Built-in modality blend table.
pub fn default_modality_blends() -> Vec<ModalityBlend> {
    vec![
        ModalityBlend {
            name: "parkinsons".to_string(),
            face_weight: 0.6,
            voice_weight: 0.4,
        },
        ModalityBlend {
            name: "alzheimers".to_string(),
            face_weight: 0.5,
            voice_weight: 0.5,
        },
        ModalityBlend {
            name: "depression".to_string(),
            face_weight: 0.7,
            voice_weight: 0.3,
        },
        ModalityBlend {
            name: "autism".to_string(),
            face_weight: 0.4,
            voice_weight: 0.6,
        },
    ]
}
