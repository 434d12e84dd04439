//! Voice profiles and their JSON-backed store

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AttributionConfig;
use crate::context::SpeakerRole;
use crate::{Error, Result};

use super::features::AudioFeatures;

/// Profile id of the synthetic streamer profile seeded at startup
pub const STREAMER_PROFILE_ID: &str = "streamer";

/// EMA weight kept for the existing average on a strong match
const EMA_KEEP_STRONG: f64 = 0.7;
/// EMA weight kept for the existing average on a weak/default match
const EMA_KEEP_WEAK: f64 = 0.9;

/// Running per-feature averages, each unset until first observation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FeatureAverages {
    pub avg_volume: Option<f64>,
    pub avg_pitch: Option<f64>,
    pub avg_speech_rate: Option<f64>,
}

/// Persisted identity record used to re-recognize a speaker across segments.
///
/// Created on first high-confidence novel-voice detection, mutated via
/// exponential moving average on every later match, never auto-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub id: String,
    pub display_name: String,
    pub role: SpeakerRole,
    /// Lexical markers characteristic of this voice
    pub text_patterns: Vec<String>,
    pub audio_features: FeatureAverages,
    /// Recent recognized texts for this voice, oldest-first
    pub recent_examples: VecDeque<String>,
    pub last_seen_at: DateTime<Utc>,
}

impl VoiceProfile {
    /// Synthetic streamer profile, the default attribution target.
    #[must_use]
    pub fn streamer() -> Self {
        Self {
            id: STREAMER_PROFILE_ID.to_string(),
            display_name: "Streamer".to_string(),
            role: SpeakerRole::Streamer,
            text_patterns: Vec::new(),
            audio_features: FeatureAverages::default(),
            recent_examples: VecDeque::new(),
            last_seen_at: Utc::now(),
        }
    }

    /// A fresh guest profile seeded from the first content-bearing words.
    #[must_use]
    pub fn new_guest(seed_text: &str) -> Self {
        let seed_words: Vec<String> = seed_text
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .take(3)
            .map(str::to_lowercase)
            .collect();

        let display_name = seed_words
            .first()
            .map_or_else(|| "Guest".to_string(), |w| format!("Guest ({w})"));

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name,
            role: SpeakerRole::Guest,
            text_patterns: seed_words,
            audio_features: FeatureAverages::default(),
            recent_examples: VecDeque::new(),
            last_seen_at: Utc::now(),
        }
    }

    /// Fold one observation into the profile.
    ///
    /// Audio averages move by EMA — slowly on weak matches so a default
    /// attribution cannot drag a well-established profile around.
    pub fn observe(
        &mut self,
        text: &str,
        features: Option<AudioFeatures>,
        strong_match: bool,
        max_examples: usize,
    ) {
        let keep = if strong_match { EMA_KEEP_STRONG } else { EMA_KEEP_WEAK };

        if let Some(f) = features {
            ema(&mut self.audio_features.avg_volume, f.volume, keep);
            ema(&mut self.audio_features.avg_pitch, f.pitch_hz, keep);
            ema(&mut self.audio_features.avg_speech_rate, f.speech_rate, keep);
        }

        if !text.is_empty() {
            while self.recent_examples.len() >= max_examples.max(1) {
                self.recent_examples.pop_front();
            }
            self.recent_examples.push_back(text.to_string());
        }

        self.last_seen_at = Utc::now();
    }
}

fn ema(slot: &mut Option<f64>, observed: f64, keep: f64) {
    *slot = Some(slot.map_or(observed, |avg| avg * keep + observed * (1.0 - keep)));
}

/// Load-at-startup / save-on-update persistence for voice profiles.
///
/// The daemon owns one implementation; the classifier calls `save` after
/// every profile mutation.
pub trait ProfileStore: Send {
    /// Load all persisted profiles.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store is unreadable.
    fn load(&self) -> Result<Vec<VoiceProfile>>;

    /// Persist the full profile set.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store is unwritable.
    fn save(&self, profiles: &[VoiceProfile]) -> Result<()>;
}

/// JSON-file-backed profile store.
pub struct JsonProfileStore {
    path: PathBuf,
}

impl JsonProfileStore {
    /// Store profiles at `<data_dir>/voice_profiles.json`.
    #[must_use]
    pub fn new(data_dir: &std::path::Path) -> Self {
        Self {
            path: data_dir.join("voice_profiles.json"),
        }
    }
}

impl ProfileStore for JsonProfileStore {
    fn load(&self) -> Result<Vec<VoiceProfile>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        let profiles = serde_json::from_str(&raw)?;
        Ok(profiles)
    }

    fn save(&self, profiles: &[VoiceProfile]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let raw = serde_json::to_string_pretty(profiles)?;
        std::fs::write(&self.path, raw)
            .map_err(|e| Error::ProfileStore(format!("write {}: {e}", self.path.display())))?;
        Ok(())
    }
}

/// In-memory store for tests and profile-less deployments.
#[derive(Default)]
pub struct MemoryProfileStore;

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> Result<Vec<VoiceProfile>> {
        Ok(Vec::new())
    }

    fn save(&self, _profiles: &[VoiceProfile]) -> Result<()> {
        Ok(())
    }
}

/// Ensure the synthetic streamer profile exists, seeding it when missing.
pub fn seed_streamer(profiles: &mut Vec<VoiceProfile>) {
    if !profiles.iter().any(|p| p.id == STREAMER_PROFILE_ID) {
        profiles.insert(0, VoiceProfile::streamer());
    }
}

/// Bounded example count helper shared with the classifier.
#[must_use]
pub fn max_examples(config: &AttributionConfig) -> usize {
    config.max_profile_examples.max(1)
}
