//! Emission scheduler: decides whether this tick may produce a reaction
//!
//! The scheduler is the only consumer of the context buffers and the only
//! writer of [`EmissionState`]. Each tick runs a fixed gate ladder — mode,
//! emission cooldown, data quality, external-call cooldown — then generation,
//! validation, deduplication, and commit. Gate skips leave the state
//! untouched; only post-generation rejections count as skips.

pub mod similarity;
pub mod state;

pub use similarity::{max_similarity, similarity};
pub use state::EmissionState;

use std::time::{Duration, Instant};

use crate::config::SchedulerConfig;
use crate::context::{ContextSnapshot, SpeakerRole, SpeechSegment};
use crate::generation::{GenerationRequest, GeneratorPool};

/// Operating mode of the co-host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    /// Normal operation: observe and react
    Commentator,
    /// Ingest context but never emit
    Observer,
}

/// Why a tick produced no emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Scheduler globally inactive
    Inactive,
    /// Explicit silence toggle is on
    Silenced,
    /// Observer mode never emits
    ObserverMode,
    /// Emission cooldown not yet satisfied
    Cooldown,
    /// No buffer content above the dynamic quality bar
    QualityGate,
    /// External generation call still cooling down
    ExternalCooldown,
    /// Generator declined or failed
    NoResult,
    /// Candidate failed length/denylist/confidence validation
    Rejected,
    /// Candidate too similar to a recent output
    Duplicate,
}

/// Result of one scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Accepted reaction text, ready for transmission
    Emitted(String),
    Skipped(SkipReason),
}

/// Point-in-time stats for the status surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EmissionStats {
    pub total_emitted: u64,
    pub total_skipped: u64,
    pub duplicate_streak: u32,
    pub silenced: bool,
    pub observer_mode: bool,
}

/// The emission scheduler and its gate ladder.
pub struct EmissionScheduler {
    config: SchedulerConfig,
    state: EmissionState,
    active: bool,
    silenced: bool,
    mode: OperatingMode,
}

impl EmissionScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: EmissionState::default(),
            active: true,
            silenced: false,
            mode: OperatingMode::Commentator,
        }
    }

    /// Toggle the whole scheduler on or off.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Explicit silence: ingest continues, emission stops.
    pub fn set_silenced(&mut self, silenced: bool) {
        self.silenced = silenced;
    }

    /// Switch operating mode.
    pub fn set_mode(&mut self, mode: OperatingMode) {
        self.mode = mode;
    }

    /// Current counters for the status surface.
    #[must_use]
    pub fn stats(&self) -> EmissionStats {
        EmissionStats {
            total_emitted: self.state.total_emitted(),
            total_skipped: self.state.total_skipped(),
            duplicate_streak: self.state.duplicate_streak(),
            silenced: self.silenced,
            observer_mode: self.mode == OperatingMode::Observer,
        }
    }

    /// Run one tick against a buffer snapshot.
    pub async fn tick(
        &mut self,
        snapshot: &ContextSnapshot,
        pool: &GeneratorPool,
    ) -> TickOutcome {
        self.tick_at(Instant::now(), snapshot, pool).await
    }

    /// Tick with an explicit clock, the testable entry point.
    pub async fn tick_at(
        &mut self,
        now: Instant,
        snapshot: &ContextSnapshot,
        pool: &GeneratorPool,
    ) -> TickOutcome {
        // 1. mode gate — no state mutation on any of these
        if !self.active {
            return TickOutcome::Skipped(SkipReason::Inactive);
        }
        if self.silenced {
            return TickOutcome::Skipped(SkipReason::Silenced);
        }
        if self.mode == OperatingMode::Observer {
            return TickOutcome::Skipped(SkipReason::ObserverMode);
        }

        let elapsed = self.state.elapsed_since_emission(now);
        let first = self.state.is_first_emission();
        let forced = elapsed.is_some_and(|d| d >= self.config.forced_override_after);

        // 2. emission cooldown — bypassed on first emission and on forced
        // override: after long enough silence the scheduler prefers saying
        // something over saying nothing forever.
        if !first && !forced {
            if let Some(delta) = elapsed {
                let required = if has_interesting_content(snapshot, &self.config) {
                    self.config.min_pause
                } else {
                    self.config.quiet_pause
                };
                if delta < required {
                    tracing::trace!(?delta, ?required, "emission cooldown active");
                    return TickOutcome::Skipped(SkipReason::Cooldown);
                }
            }
        }

        // 3. data-quality gate
        if !first && !forced {
            let bar = self.dynamic_threshold(elapsed);
            if !meets_quality_bar(snapshot, bar) {
                tracing::trace!(bar, "no buffer content above quality bar");
                return TickOutcome::Skipped(SkipReason::QualityGate);
            }
        }

        // 4. external-call cooldown, independent of the emission cooldown
        if !first {
            if let Some(since_call) = self.state.elapsed_since_external_call(now) {
                if since_call < self.config.external_call_cooldown {
                    tracing::trace!(?since_call, "external generation call cooling down");
                    return TickOutcome::Skipped(SkipReason::ExternalCooldown);
                }
            }
        }

        // 5. invoke generation
        self.state.record_external_call(now);
        let request = GenerationRequest {
            snapshot: snapshot.clone(),
            duplicate_streak: self.state.duplicate_streak(),
        };
        let candidate = match pool.generate(&request).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                self.state.record_skip();
                return TickOutcome::Skipped(SkipReason::NoResult);
            }
            Err(e) => {
                tracing::error!(error = %e, "generation failed this tick");
                self.state.record_skip();
                return TickOutcome::Skipped(SkipReason::NoResult);
            }
        };

        // 6. validation
        if !self.is_valid(&candidate.text, candidate.confidence) {
            tracing::debug!(text = %candidate.text, "candidate rejected by validation");
            self.state.record_skip();
            return TickOutcome::Skipped(SkipReason::Rejected);
        }

        // 7. deduplication
        let highest = similarity::max_similarity(&candidate.text, self.state.recent_outputs());
        if highest > self.config.duplicate_threshold {
            tracing::debug!(
                similarity = highest,
                streak = self.state.duplicate_streak() + 1,
                "candidate suppressed as duplicate"
            );
            self.state.record_duplicate();
            return TickOutcome::Skipped(SkipReason::Duplicate);
        }

        // 8. commit
        self.state
            .commit(candidate.text.clone(), now, self.config.recent_outputs);
        tracing::info!(
            text = %candidate.text,
            total = self.state.total_emitted(),
            "reaction emitted"
        );
        TickOutcome::Emitted(candidate.text)
    }

    /// Quality bar for the current wait, relaxing step-wise as Δ grows.
    ///
    /// Monotone non-increasing in elapsed time (config validation enforces
    /// high >= low >= floor).
    #[must_use]
    pub fn dynamic_threshold(&self, elapsed: Option<Duration>) -> f64 {
        match elapsed {
            None => self.config.confidence_floor,
            Some(d) if d >= self.config.forced_override_after => self.config.confidence_floor,
            Some(d) if d >= self.config.decay_knee => self.config.confidence_low,
            Some(_) => self.config.confidence_high,
        }
    }

    fn is_valid(&self, text: &str, confidence: f64) -> bool {
        if text.chars().count() < self.config.min_reaction_chars {
            return false;
        }
        if confidence < self.config.generation_confidence_floor {
            return false;
        }

        let lower = text.to_lowercase();
        !self
            .config
            .denylist
            .iter()
            .any(|banned| lower.contains(&banned.to_lowercase()))
    }
}

/// Any buffer content worth reacting to soon: confident visual, substantial
/// speech, or any chat activity.
fn has_interesting_content(snapshot: &ContextSnapshot, config: &SchedulerConfig) -> bool {
    let visual = snapshot
        .visual
        .last()
        .is_some_and(|v| v.confidence >= config.confidence_low);
    let speech = snapshot.speech.iter().any(SpeechSegment::is_substantial);
    visual || speech || !snapshot.text.is_empty()
}

/// At least one stream clears the dynamic bar: attributed speech or visual
/// analysis above `bar`.
fn meets_quality_bar(snapshot: &ContextSnapshot, bar: f64) -> bool {
    let speech = snapshot.speech.iter().any(|s| {
        !s.ignore
            && matches!(s.role, SpeakerRole::Streamer | SpeakerRole::Guest)
            && s.confidence >= bar
            && !s.text.trim().is_empty()
    });
    let visual = snapshot.visual.iter().any(|v| v.confidence >= bar);
    speech || visual
}
