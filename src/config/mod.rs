//! Configuration for the Ember co-host engine
//!
//! All the tuned constants — cooldowns, confidence bars, buffer capacities,
//! the recognizer tier ladder — live here as overridable defaults. The TOML
//! file (see [`file`]) is a partial overlay; env vars win over the file.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Runtime configuration aggregate
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory (voice profiles, session state)
    pub data_dir: PathBuf,

    /// Recognition language (`"auto"` for autodetect)
    pub language: String,

    /// Rolling buffer capacities
    pub context: ContextConfig,

    /// Emission scheduler timing and quality gates
    pub scheduler: SchedulerConfig,

    /// Recognition engine and fallback cascade
    pub recognition: RecognitionConfig,

    /// Speaker attribution thresholds
    pub attribution: AttributionConfig,

    /// Reaction generator endpoint
    pub generation: GenerationConfig,

    /// Producer cadences
    pub ingest: IngestConfig,
}

/// Per-stream rolling buffer capacities
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Visual analysis buffer size
    pub visual_capacity: usize,
    /// Speech segment buffer size
    pub speech_capacity: usize,
    /// Text event buffer size (chat moves faster, staleness tolerated)
    pub text_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            visual_capacity: 5,
            speech_capacity: 5,
            text_capacity: 20,
        }
    }
}

/// Emission scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Scheduler tick interval
    pub tick_interval: Duration,
    /// Minimum pause between emissions
    pub min_pause: Duration,
    /// Pause required when no buffer holds interesting content
    pub quiet_pause: Duration,
    /// Silence duration after which all gates are bypassed
    pub forced_override_after: Duration,
    /// Independent cooldown on the external generation call
    pub external_call_cooldown: Duration,
    /// Quality bar while recently emitted (Δ below `decay_knee`)
    pub confidence_high: f64,
    /// Quality bar between `decay_knee` and forced override
    pub confidence_low: f64,
    /// Near-zero bar at/beyond forced override
    pub confidence_floor: f64,
    /// Elapsed time at which the quality bar steps down
    pub decay_knee: Duration,
    /// Similarity above which a candidate is a duplicate
    pub duplicate_threshold: f64,
    /// How many accepted outputs dedup compares against
    pub recent_outputs: usize,
    /// Minimum accepted reaction length in characters
    pub min_reaction_chars: usize,
    /// Reactions containing any of these tokens are rejected outright
    pub denylist: Vec<String>,
    /// Generator confidence floor for accepting a reaction
    pub generation_confidence_floor: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(2),
            min_pause: Duration::from_secs(2),
            quiet_pause: Duration::from_secs(5),
            forced_override_after: Duration::from_secs(15),
            external_call_cooldown: Duration::from_secs(15),
            confidence_high: 0.6,
            confidence_low: 0.3,
            confidence_floor: 0.05,
            decay_knee: Duration::from_secs(8),
            duplicate_threshold: 0.7,
            recent_outputs: 5,
            min_reaction_chars: 3,
            denylist: Vec::new(),
            generation_confidence_floor: 0.2,
        }
    }
}

/// Recognition engine configuration
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    /// Path to the recognizer helper script
    pub script_path: PathBuf,
    /// Python interpreter used to run the helper
    pub interpreter: String,
    /// Model tiers, largest/most accurate first
    pub tiers: Vec<String>,
    /// Starting tier (must appear in `tiers`)
    pub default_tier: String,
    /// Start on the accelerated backend
    pub prefer_accelerated: bool,
    /// Wall-clock budget per engine invocation
    pub timeout: Duration,
    /// Minimum audio length worth sending to the engine
    pub min_audio: Duration,
    /// Engine input sample rate
    pub sample_rate: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("scripts/whisper_local.py"),
            interpreter: "python3".to_string(),
            tiers: vec![
                "large-v3".to_string(),
                "medium".to_string(),
                "small".to_string(),
                "base".to_string(),
                "tiny".to_string(),
            ],
            default_tier: "medium".to_string(),
            prefer_accelerated: true,
            timeout: Duration::from_secs(30),
            min_audio: Duration::from_millis(300),
            sample_rate: 16_000,
        }
    }
}

/// Speaker attribution thresholds
#[derive(Debug, Clone)]
pub struct AttributionConfig {
    /// Combined score a stored profile must reach to claim a segment
    pub profile_match_threshold: f64,
    /// Lexical score for the streamer-style class
    pub streamer_threshold: f64,
    /// Lexical score for the guest-style class
    pub guest_threshold: f64,
    /// Examples kept per voice profile
    pub max_profile_examples: usize,
    /// Volume tolerance band (fraction of stored average)
    pub volume_tolerance: f64,
    /// Pitch tolerance band in Hz
    pub pitch_tolerance_hz: f64,
    /// Speech rate tolerance band (fraction of stored average)
    pub rate_tolerance: f64,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            profile_match_threshold: 0.6,
            streamer_threshold: 0.5,
            guest_threshold: 0.3,
            max_profile_examples: 10,
            volume_tolerance: 0.2,
            pitch_tolerance_hz: 50.0,
            rate_tolerance: 0.3,
        }
    }
}

/// Reaction generator endpoint configuration
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// OpenAI-compatible chat completions base URL
    pub base_url: String,
    /// API key (from `EMBER_GENERATION_API_KEY`)
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(20),
        }
    }
}

/// Producer cadences
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Visual snapshot interval
    pub visual_interval: Duration,
    /// Audio capture window
    pub audio_interval: Duration,
    /// How often accumulated speech segments are promoted into the buffer
    pub speech_promotion_interval: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            visual_interval: Duration::from_secs(10),
            audio_interval: Duration::from_secs(5),
            speech_promotion_interval: Duration::from_secs(3),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            language: "auto".to_string(),
            context: ContextConfig::default(),
            scheduler: SchedulerConfig::default(),
            recognition: RecognitionConfig::default(),
            attribution: AttributionConfig::default(),
            generation: GenerationConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML file overlay, then env vars.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the result is internally inconsistent (see [`Config::validate`]).
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file::default_config_path() {
            if path.exists() {
                let overlay = file::load(&path)?;
                tracing::debug!(path = %path.display(), "applying config file overlay");
                overlay.apply(&mut config);
            }
        }

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env(&mut self) {
        if let Ok(lang) = std::env::var("EMBER_LANGUAGE") {
            self.language = lang;
        }
        if let Ok(key) = std::env::var("EMBER_GENERATION_API_KEY") {
            if !key.is_empty() {
                self.generation.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("EMBER_GENERATION_URL") {
            self.generation.base_url = url;
        }
        if let Ok(script) = std::env::var("EMBER_RECOGNIZER_SCRIPT") {
            self.recognition.script_path = PathBuf::from(script);
        }
    }

    /// Check cross-field consistency.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the tier ladder is empty, the default
    /// tier is not in the ladder, or the quality bars are mis-ordered.
    pub fn validate(&self) -> Result<()> {
        if self.recognition.tiers.is_empty() {
            return Err(Error::Config("recognition tier ladder is empty".to_string()));
        }

        let default_tier = self.recognition.default_tier.to_lowercase();
        if !self
            .recognition
            .tiers
            .iter()
            .any(|t| t.to_lowercase() == default_tier)
        {
            return Err(Error::Config(format!(
                "default tier '{}' not present in tier ladder",
                self.recognition.default_tier
            )));
        }

        let s = &self.scheduler;
        if s.confidence_high < s.confidence_low || s.confidence_low < s.confidence_floor {
            return Err(Error::Config(
                "confidence bars must be ordered high >= low >= floor".to_string(),
            ));
        }

        Ok(())
    }
}

/// Default data directory (`~/.local/share/ember` or platform equivalent).
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "embercohost", "ember").map_or_else(
        || PathBuf::from(".ember"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}
