//! Voice signal extraction
//!
//! Converts one audio analysis tick (plus the session's rolling pitch and
//! volume histories) into a bounded voice metric set. Pitch estimation is
//! dominant-bin over the lower half of the spectrum; undersized histories
//! yield neutral zero readings with a `ShortHistory` flag rather than
//! errors, and a frame without a usable fundamental reports pitch 0 — the
//! extractor never substitutes fabricated values for missing signal.

use serde::{Deserialize, Serialize};

use crate::history::RollingHistory;
use crate::types::{AudioFrame, VoiceMetrics, VoiceQualityFlag};

/// Human voice fundamental range accepted by the pitch estimator
const PITCH_MIN_HZ: f64 = 80.0;
const PITCH_MAX_HZ: f64 = 400.0;
/// Spectral magnitude a bin must exceed to count as a detected pitch
const PITCH_MAGNITUDE_FLOOR: u8 = 10;
/// Volume reading below this counts as silence
const SILENCE_THRESHOLD: f64 = 5.0;
/// Adjacent pitch movement that counts toward the speech-rate reading
const PITCH_DELTA_THRESHOLD_HZ: f64 = 20.0;
/// Rolling history cap
const HISTORY_CAPACITY: usize = 100;
/// Samples required before the history-based metrics are defined
const MIN_HISTORY_SAMPLES: usize = 20;
/// Nonzero pitch samples required for the spread-based metrics
const MIN_VALID_PITCHES: usize = 10;

/// Per-frame readings alongside the metric set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VoiceSample {
    /// Detected fundamental this frame (Hz), 0 when none
    pub pitch_hz: f64,
    /// RMS volume this frame, scaled to [0,100]
    pub volume: f64,
}

/// Result of extracting one audio frame.
#[derive(Debug, Clone)]
pub struct VoiceExtraction {
    pub metrics: VoiceMetrics,
    pub flags: Vec<VoiceQualityFlag>,
    pub sample: VoiceSample,
    /// Fraction of sub-metrics that had defined signal (0-1)
    pub coverage: f64,
}

/// Voice signal extractor owning the per-session rolling histories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceExtractor {
    pitch_history: RollingHistory,
    volume_history: RollingHistory,
}

impl Default for VoiceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceExtractor {
    pub fn new() -> Self {
        Self {
            pitch_history: RollingHistory::new(HISTORY_CAPACITY),
            volume_history: RollingHistory::new(HISTORY_CAPACITY),
        }
    }

    /// Extract the voice metric set from one audio frame, advancing the
    /// rolling histories.
    pub fn extract(&mut self, frame: &AudioFrame) -> VoiceExtraction {
        let mut flags = Vec::new();

        let pitch_hz = estimate_pitch(&frame.spectrum, frame.sample_rate);
        let volume = rms_volume(&frame.waveform);

        if pitch_hz == 0.0 {
            flags.push(VoiceQualityFlag::NoPitchDetected);
        }
        if volume < SILENCE_THRESHOLD {
            flags.push(VoiceQualityFlag::Silence);
        }

        self.pitch_history.push(pitch_hz);
        self.volume_history.push(volume);

        let mut defined = 0usize;
        let metrics = if self.pitch_history.len() < MIN_HISTORY_SAMPLES {
            flags.push(VoiceQualityFlag::ShortHistory);
            VoiceMetrics::default()
        } else {
            let spread = self
                .pitch_history
                .std_dev_filtered(MIN_VALID_PITCHES, |p| p > 0.0);

            let pitch_variation = spread.map(|sd| sd.clamp(0.0, 100.0));
            let monotonicity = spread.map(|sd| (100.0 - sd).clamp(0.0, 100.0));
            let speech_rate = self.speech_rate();
            let pause_duration = self.pause_duration();
            let emotional_valence = monotonicity.map(|mono| {
                (0.6 * (100.0 - mono) + 0.4 * self.volume_history.mean()).clamp(0.0, 100.0)
            });

            defined = 2 // speech_rate and pause_duration
                + [pitch_variation, monotonicity, emotional_valence]
                    .iter()
                    .filter(|m| m.is_some())
                    .count();

            VoiceMetrics {
                pitch_variation: pitch_variation.unwrap_or(0.0),
                speech_rate,
                pause_duration,
                monotonicity: monotonicity.unwrap_or(0.0),
                emotional_valence: emotional_valence.unwrap_or(0.0),
            }
        };

        VoiceExtraction {
            metrics,
            flags,
            sample: VoiceSample { pitch_hz, volume },
            coverage: defined as f64 / 5.0,
        }
    }

    /// Rate of large adjacent pitch movements over the trailing history.
    fn speech_rate(&self) -> f64 {
        let variations = self
            .pitch_history
            .adjacent_deltas_over(PITCH_DELTA_THRESHOLD_HZ, |p| p > 0.0);
        ((variations as f64 / self.pitch_history.len() as f64) * 200.0).clamp(0.0, 100.0)
    }

    /// Fraction of the trailing volume history below the silence floor.
    fn pause_duration(&self) -> f64 {
        let silent = self.volume_history.count_below(SILENCE_THRESHOLD);
        ((silent as f64 / self.volume_history.len() as f64) * 100.0).clamp(0.0, 100.0)
    }

    pub fn history_len(&self) -> usize {
        self.pitch_history.len()
    }

    pub fn reset(&mut self) {
        self.pitch_history.clear();
        self.volume_history.clear();
    }
}

/// Dominant-bin pitch estimate over the lower half of the spectrum.
///
/// Returns 0 unless the peak falls inside the voice fundamental range with
/// magnitude above the noise floor.
pub fn estimate_pitch(spectrum: &[u8], sample_rate: f64) -> f64 {
    if spectrum.is_empty() || sample_rate <= 0.0 {
        return 0.0;
    }

    let nyquist = sample_rate / 2.0;
    let bin_freq = nyquist / spectrum.len() as f64;

    let mut max_value = 0u8;
    let mut max_index = 0usize;
    for (i, &magnitude) in spectrum.iter().enumerate().take(spectrum.len() / 2).skip(1) {
        if magnitude > max_value {
            max_value = magnitude;
            max_index = i;
        }
    }

    let dominant = max_index as f64 * bin_freq;
    if (PITCH_MIN_HZ..=PITCH_MAX_HZ).contains(&dominant) && max_value > PITCH_MAGNITUDE_FLOOR {
        dominant
    } else {
        0.0
    }
}

/// Root-mean-square of time-domain samples normalized to [-1,1], scaled
/// to [0,100].
pub fn rms_volume(waveform: &[u8]) -> f64 {
    if waveform.is_empty() {
        return 0.0;
    }

    let sum: f64 = waveform
        .iter()
        .map(|&s| {
            let normalized = (f64::from(s) - 128.0) / 128.0;
            normalized * normalized
        })
        .sum();

    (sum / waveform.len() as f64).sqrt() * 100.0
}
