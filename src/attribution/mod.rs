//! Speaker attribution: label recognized speech with a speaker and role
//!
//! The classifier runs a fixed priority ladder — donation filter, stored
//! profile match, lexical heuristics, ambiguous default — and reports which
//! rung fired via the [`Attribution`] result so callers never have to infer
//! the decision path from the produced segment's fields.

pub mod features;
pub mod profile;

pub use features::{AudioFeatures, extract as extract_features};
pub use profile::{
    JsonProfileStore, MemoryProfileStore, ProfileStore, STREAMER_PROFILE_ID, VoiceProfile,
};

use chrono::Utc;

use crate::config::AttributionConfig;
use crate::context::{SpeakerRole, SpeechSegment, VisualAnalysis};

/// Which classifier rung attributed the segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribution {
    /// Donation/announcement filter fired; segment is ignored
    Donation,
    /// A stored voice profile claimed the segment
    ProfileMatch {
        profile_id: String,
        score: f64,
    },
    /// Lexical heuristics decided without a profile match
    LexicalMatch {
        role: SpeakerRole,
        score: f64,
        is_new_voice: bool,
    },
    /// No rule fired; defaulted to the streamer
    Fallback,
}

/// Raw recognizer output handed to the classifier.
#[derive(Debug, Clone)]
pub struct RawSegment {
    pub text: String,
    pub confidence: f64,
}

/// Lexical markers of donation / subscription / alert text.
const DONATION_MARKERS: &[&str] = &[
    "донат",
    "задонатил",
    "подписк",
    "подписал",
    "пожертвов",
    "спасибо за",
    "donation",
    "donated",
    "subscribed",
    "gifted",
    "gift sub",
    "cheered",
    "bits",
];

/// Markers in the visual description that indicate an on-screen alert.
const VISUAL_ALERT_MARKERS: &[&str] = &["notification", "alert", "уведомлен", "оповещен"];

/// Streamer-style speech: addressed at the audience.
const STREAMER_PATTERNS: &[&str] = &[
    "всем привет",
    "привет чат",
    "чат",
    "ребят",
    "сегодня мы",
    "поехали",
    "смотрите",
    "как вам",
    "что думаете",
    "напишите",
    "welcome everyone",
    "hey chat",
    "let's go",
    "what do you think",
];

/// Guest-style speech: addressed at the streamer personally.
const GUEST_PATTERNS: &[&str] = &[
    "слушай",
    "а ты",
    "ты сам",
    "скажи",
    "как у тебя",
    "у тебя",
    "ты помнишь",
    "what about you",
    "do you",
    "have you",
    "tell me",
];

/// Score added per lexical pattern hit.
const PATTERN_HIT_INCREMENT: f64 = 0.25;

/// Confidence bounds for the ambiguous default attribution.
const FALLBACK_CONFIDENCE_MIN: f64 = 0.3;
const FALLBACK_CONFIDENCE_MAX: f64 = 0.5;

/// Labels raw recognized speech with speaker identity and role.
///
/// Owns the in-memory profile set and writes it through the store after
/// every mutation. Classification itself never fails: malformed audio and
/// empty text degrade, they do not error.
pub struct SpeakerClassifier {
    config: AttributionConfig,
    profiles: Vec<VoiceProfile>,
    store: Box<dyn ProfileStore>,
}

impl SpeakerClassifier {
    /// Load persisted profiles and seed the synthetic streamer profile.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read at startup.
    pub fn new(config: AttributionConfig, store: Box<dyn ProfileStore>) -> crate::Result<Self> {
        let mut profiles = store.load()?;
        profile::seed_streamer(&mut profiles);

        tracing::info!(profiles = profiles.len(), "speaker classifier ready");

        Ok(Self {
            config,
            profiles,
            store,
        })
    }

    /// Known profiles, streamer first.
    #[must_use]
    pub fn profiles(&self) -> &[VoiceProfile] {
        &self.profiles
    }

    /// Classify one raw segment into a labeled [`SpeechSegment`].
    ///
    /// `audio` is the mono PCM the segment was recognized from, when the
    /// capture path still has it; `visual` is the most recent visual
    /// analysis, used only by the donation filter.
    pub fn classify(
        &mut self,
        raw: &RawSegment,
        audio: Option<(&[f32], u32)>,
        visual: Option<&VisualAnalysis>,
    ) -> (SpeechSegment, Attribution) {
        let text = raw.text.trim();
        if text.is_empty() {
            return (SpeechSegment::empty(), Attribution::Fallback);
        }

        if is_donation(text, visual) {
            tracing::debug!(text = %text, "segment classified as donation alert");
            let segment = SpeechSegment {
                text: text.to_string(),
                created_at: Utc::now(),
                confidence: raw.confidence,
                speaker_id: None,
                role: SpeakerRole::Donation,
                ignore: true,
                is_new_voice: false,
            };
            return (segment, Attribution::Donation);
        }

        let features = audio.and_then(|(samples, rate)| features::extract(samples, rate, text));

        if let Some((idx, score)) = self.best_profile_match(text, features) {
            let max_examples = profile::max_examples(&self.config);
            let profile = &mut self.profiles[idx];
            profile.observe(text, features, true, max_examples);
            let profile_id = profile.id.clone();
            let role = profile.role;
            self.persist();

            tracing::debug!(profile = %profile_id, score, "segment matched stored profile");
            let segment = SpeechSegment {
                text: text.to_string(),
                created_at: Utc::now(),
                confidence: raw.confidence,
                speaker_id: Some(profile_id.clone()),
                role,
                ignore: false,
                is_new_voice: false,
            };
            return (segment, Attribution::ProfileMatch { profile_id, score });
        }

        let streamer_score = lexical_score(text, STREAMER_PATTERNS);
        let guest_score = lexical_score(text, GUEST_PATTERNS);

        if guest_score >= self.config.guest_threshold && guest_score > streamer_score {
            return self.new_guest_voice(text, raw.confidence, features, guest_score);
        }

        if streamer_score >= self.config.streamer_threshold {
            self.observe_streamer(text, features, false);
            let segment = SpeechSegment {
                text: text.to_string(),
                created_at: Utc::now(),
                confidence: raw.confidence,
                speaker_id: Some(STREAMER_PROFILE_ID.to_string()),
                role: SpeakerRole::Streamer,
                ignore: false,
                is_new_voice: false,
            };
            let attribution = Attribution::LexicalMatch {
                role: SpeakerRole::Streamer,
                score: streamer_score,
                is_new_voice: false,
            };
            return (segment, attribution);
        }

        // No rule fired. Ambiguous speech is attributed to the streamer at
        // reduced confidence rather than dropped: with no signal, missing
        // context is the likelier explanation than a true outsider.
        self.observe_streamer(text, features, false);
        let segment = SpeechSegment {
            text: text.to_string(),
            created_at: Utc::now(),
            confidence: raw
                .confidence
                .clamp(FALLBACK_CONFIDENCE_MIN, FALLBACK_CONFIDENCE_MAX),
            speaker_id: Some(STREAMER_PROFILE_ID.to_string()),
            role: SpeakerRole::Streamer,
            ignore: false,
            is_new_voice: false,
        };
        (segment, Attribution::Fallback)
    }

    /// Best stored profile above the match threshold, ties broken by
    /// most-recently-seen.
    fn best_profile_match(
        &self,
        text: &str,
        features: Option<AudioFeatures>,
    ) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;

        for (idx, profile) in self.profiles.iter().enumerate() {
            let score = self.profile_score(profile, text, features);
            if score < self.config.profile_match_threshold {
                continue;
            }

            let better = match best {
                None => true,
                Some((best_idx, best_score)) => {
                    score > best_score
                        || ((score - best_score).abs() < f64::EPSILON
                            && profile.last_seen_at > self.profiles[best_idx].last_seen_at)
                }
            };
            if better {
                best = Some((idx, score));
            }
        }

        best
    }

    /// Weighted lexical + audio score of one profile against a segment.
    fn profile_score(
        &self,
        profile: &VoiceProfile,
        text: &str,
        features: Option<AudioFeatures>,
    ) -> f64 {
        let lexical = lexical_overlap(text, profile);

        let audio = features.and_then(|f| self.audio_closeness(profile, f));

        // With audio evidence the voice itself dominates; without it the
        // score degrades to lexical-only.
        audio.map_or(lexical, |a| lexical * 0.4 + a * 0.6)
    }

    /// Closeness of observed features to the profile's stored averages,
    /// weighted 30/40/30 volume/pitch/rate. `None` when the profile has no
    /// stored averages yet.
    fn audio_closeness(&self, profile: &VoiceProfile, f: AudioFeatures) -> Option<f64> {
        let avg = profile.audio_features;
        let (avg_volume, avg_pitch, avg_rate) =
            (avg.avg_volume?, avg.avg_pitch?, avg.avg_speech_rate?);

        let volume = band_score(f.volume, avg_volume, avg_volume * self.config.volume_tolerance);
        let pitch = band_score(f.pitch_hz, avg_pitch, self.config.pitch_tolerance_hz);
        let rate = band_score(
            f.speech_rate,
            avg_rate,
            avg_rate * self.config.rate_tolerance,
        );

        Some(volume * 0.3 + pitch * 0.4 + rate * 0.3)
    }

    /// Allocate a new guest profile for an unmatched guest-style voice.
    fn new_guest_voice(
        &mut self,
        text: &str,
        confidence: f64,
        features: Option<AudioFeatures>,
        score: f64,
    ) -> (SpeechSegment, Attribution) {
        let mut guest = VoiceProfile::new_guest(text);
        guest.observe(text, features, true, profile::max_examples(&self.config));
        let profile_id = guest.id.clone();

        tracing::info!(profile = %profile_id, name = %guest.display_name, "new guest voice detected");
        self.profiles.push(guest);
        self.persist();

        let segment = SpeechSegment {
            text: text.to_string(),
            created_at: Utc::now(),
            confidence,
            speaker_id: Some(profile_id),
            role: SpeakerRole::Guest,
            ignore: false,
            is_new_voice: true,
        };
        let attribution = Attribution::LexicalMatch {
            role: SpeakerRole::Guest,
            score,
            is_new_voice: true,
        };
        (segment, attribution)
    }

    fn observe_streamer(&mut self, text: &str, features: Option<AudioFeatures>, strong: bool) {
        let max_examples = profile::max_examples(&self.config);
        if let Some(streamer) = self
            .profiles
            .iter_mut()
            .find(|p| p.id == STREAMER_PROFILE_ID)
        {
            streamer.observe(text, features, strong, max_examples);
        }
        self.persist();
    }

    /// Write-through persistence. Store failures are logged, not surfaced:
    /// attribution must keep working with the in-memory set.
    fn persist(&self) {
        if let Err(e) = self.store.save(&self.profiles) {
            tracing::warn!(error = %e, "failed to persist voice profiles");
        }
    }
}

/// Donation filter: authoritative, short-circuits every later rung.
fn is_donation(text: &str, visual: Option<&VisualAnalysis>) -> bool {
    let lower = text.to_lowercase();
    if DONATION_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }

    visual.is_some_and(|v| {
        let desc = v.description.to_lowercase();
        VISUAL_ALERT_MARKERS.iter().any(|m| desc.contains(m))
    })
}

/// Fixed-increment lexical scoring against a pattern set.
#[allow(clippy::cast_precision_loss)]
fn lexical_score(text: &str, patterns: &[&str]) -> f64 {
    let lower = text.to_lowercase();
    let hits = patterns.iter().filter(|p| lower.contains(*p)).count();
    hits as f64 * PATTERN_HIT_INCREMENT
}

/// Token overlap (Jaccard) between a segment and a profile's patterns plus
/// stored examples.
#[allow(clippy::cast_precision_loss)]
fn lexical_overlap(text: &str, profile: &VoiceProfile) -> f64 {
    let segment_tokens: std::collections::HashSet<String> = tokens(text);

    let mut profile_tokens: std::collections::HashSet<String> = std::collections::HashSet::new();
    for pattern in &profile.text_patterns {
        profile_tokens.extend(tokens(pattern));
    }
    for example in &profile.recent_examples {
        profile_tokens.extend(tokens(example));
    }

    if segment_tokens.is_empty() || profile_tokens.is_empty() {
        return 0.0;
    }

    let intersection = segment_tokens.intersection(&profile_tokens).count();
    let union = segment_tokens.union(&profile_tokens).count();
    intersection as f64 / union as f64
}

fn tokens(text: &str) -> std::collections::HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// 1.0 inside the tolerance band, half credit inside twice the band, else 0.
fn band_score(observed: f64, average: f64, tolerance: f64) -> f64 {
    let distance = (observed - average).abs();
    if tolerance <= 0.0 {
        return if distance == 0.0 { 1.0 } else { 0.0 };
    }
    if distance <= tolerance {
        1.0
    } else if distance <= tolerance * 2.0 {
        0.5
    } else {
        0.0
    }
}
