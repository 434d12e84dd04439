//! TOML configuration file loading
//!
//! Supports `~/.config/ember/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::Result;

use super::Config;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct EmberConfigFile {
    /// Recognition language (`"auto"`, `"ru"`, `"en"`, ...)
    pub language: Option<String>,

    /// Data directory override
    pub data_dir: Option<PathBuf>,

    /// Scheduler timing and quality gates
    #[serde(default)]
    pub scheduler: SchedulerFileConfig,

    /// Recognition engine settings
    #[serde(default)]
    pub recognition: RecognitionFileConfig,

    /// Rolling buffer capacities
    #[serde(default)]
    pub context: ContextFileConfig,

    /// Reaction generator endpoint
    #[serde(default)]
    pub generation: GenerationFileConfig,
}

/// Scheduler overrides (seconds for durations)
#[derive(Debug, Default, Deserialize)]
pub struct SchedulerFileConfig {
    pub min_pause_secs: Option<u64>,
    pub quiet_pause_secs: Option<u64>,
    pub forced_override_secs: Option<u64>,
    pub external_call_cooldown_secs: Option<u64>,
    pub duplicate_threshold: Option<f64>,
    pub denylist: Option<Vec<String>>,
}

/// Recognition overrides
#[derive(Debug, Default, Deserialize)]
pub struct RecognitionFileConfig {
    pub script_path: Option<PathBuf>,
    pub interpreter: Option<String>,
    pub tiers: Option<Vec<String>>,
    pub default_tier: Option<String>,
    pub prefer_accelerated: Option<bool>,
    pub timeout_secs: Option<u64>,
}

/// Buffer capacity overrides
#[derive(Debug, Default, Deserialize)]
pub struct ContextFileConfig {
    pub visual_capacity: Option<usize>,
    pub speech_capacity: Option<usize>,
    pub text_capacity: Option<usize>,
}

/// Generator endpoint overrides
#[derive(Debug, Default, Deserialize)]
pub struct GenerationFileConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl EmberConfigFile {
    /// Overlay every present field onto `config`.
    pub fn apply(self, config: &mut Config) {
        if let Some(language) = self.language {
            config.language = language;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }

        let s = self.scheduler;
        if let Some(secs) = s.min_pause_secs {
            config.scheduler.min_pause = Duration::from_secs(secs);
        }
        if let Some(secs) = s.quiet_pause_secs {
            config.scheduler.quiet_pause = Duration::from_secs(secs);
        }
        if let Some(secs) = s.forced_override_secs {
            config.scheduler.forced_override_after = Duration::from_secs(secs);
        }
        if let Some(secs) = s.external_call_cooldown_secs {
            config.scheduler.external_call_cooldown = Duration::from_secs(secs);
        }
        if let Some(threshold) = s.duplicate_threshold {
            config.scheduler.duplicate_threshold = threshold;
        }
        if let Some(denylist) = s.denylist {
            config.scheduler.denylist = denylist;
        }

        let r = self.recognition;
        if let Some(path) = r.script_path {
            config.recognition.script_path = path;
        }
        if let Some(interpreter) = r.interpreter {
            config.recognition.interpreter = interpreter;
        }
        if let Some(tiers) = r.tiers {
            config.recognition.tiers = tiers;
        }
        if let Some(tier) = r.default_tier {
            config.recognition.default_tier = tier;
        }
        if let Some(prefer) = r.prefer_accelerated {
            config.recognition.prefer_accelerated = prefer;
        }
        if let Some(secs) = r.timeout_secs {
            config.recognition.timeout = Duration::from_secs(secs);
        }

        let c = self.context;
        if let Some(n) = c.visual_capacity {
            config.context.visual_capacity = n;
        }
        if let Some(n) = c.speech_capacity {
            config.context.speech_capacity = n;
        }
        if let Some(n) = c.text_capacity {
            config.context.text_capacity = n;
        }

        let g = self.generation;
        if let Some(url) = g.base_url {
            config.generation.base_url = url;
        }
        if let Some(model) = g.model {
            config.generation.model = model;
        }
        if let Some(secs) = g.timeout_secs {
            config.generation.timeout = Duration::from_secs(secs);
        }
    }
}

/// Parse a config file from disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid TOML.
pub fn load(path: &Path) -> Result<EmberConfigFile> {
    let raw = std::fs::read_to_string(path)?;
    let parsed = toml::from_str(&raw)?;
    Ok(parsed)
}

/// Default config file location (`~/.config/ember/config.toml` or platform
/// equivalent).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "embercohost", "ember")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_changes_nothing() {
        let overlay: EmberConfigFile = toml::from_str("").unwrap();
        let mut config = Config::default();
        let before_pause = config.scheduler.min_pause;

        overlay.apply(&mut config);

        assert_eq!(config.scheduler.min_pause, before_pause);
        assert_eq!(config.language, "auto");
    }

    #[test]
    fn partial_overlay_applies_only_present_fields() {
        let overlay: EmberConfigFile = toml::from_str(
            r#"
            language = "ru"

            [scheduler]
            forced_override_secs = 20

            [recognition]
            default_tier = "small"
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        overlay.apply(&mut config);

        assert_eq!(config.language, "ru");
        assert_eq!(config.scheduler.forced_override_after, Duration::from_secs(20));
        assert_eq!(config.recognition.default_tier, "small");
        // untouched default
        assert_eq!(config.scheduler.min_pause, Duration::from_secs(2));
    }
}
