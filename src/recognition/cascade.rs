//! Recognition fallback cascade
//!
//! Each request walks a bounded downgrade ladder: accelerator problems
//! switch the compute backend once and permanently, resource exhaustion and
//! timeouts step down to the next smaller model tier. Session defaults only
//! ever move toward the cheaper configuration; nothing re-promotes within a
//! process lifetime.

use crate::config::RecognitionConfig;
use crate::{Error, Result};

use super::engine::{EngineOutcome, RecognitionResult, RecognizerEngine};

/// Hardware execution path for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBackend {
    /// GPU-accelerated path
    Accelerated,
    /// CPU fallback path
    Fallback,
}

impl ComputeBackend {
    /// Device string handed to the engine, already case-normalized.
    #[must_use]
    pub const fn device_str(self) -> &'static str {
        match self {
            Self::Accelerated => "cuda",
            Self::Fallback => "cpu",
        }
    }
}

/// Floating-point precision profile for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeProfile {
    /// Higher precision, larger footprint
    HighPrecision,
    /// Most memory-frugal quantized profile
    MemoryFrugal,
}

impl ComputeProfile {
    /// Compute type string handed to the engine.
    #[must_use]
    pub const fn compute_str(self) -> &'static str {
        match self {
            Self::HighPrecision => "float16",
            Self::MemoryFrugal => "int8",
        }
    }
}

/// Ordered model tiers, largest and most accurate first.
#[derive(Debug, Clone)]
pub struct TierHierarchy {
    tiers: Vec<String>,
}

impl TierHierarchy {
    /// Build from a non-empty tier list, normalizing case.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the list is empty.
    pub fn new(tiers: &[String]) -> Result<Self> {
        if tiers.is_empty() {
            return Err(Error::Config("tier hierarchy must not be empty".to_string()));
        }
        Ok(Self {
            tiers: tiers.iter().map(|t| t.to_lowercase()).collect(),
        })
    }

    /// Index of a tier name, case-insensitive.
    #[must_use]
    pub fn index_of(&self, tier: &str) -> Option<usize> {
        let needle = tier.to_lowercase();
        self.tiers.iter().position(|t| *t == needle)
    }

    /// Tier name at `idx`.
    #[must_use]
    pub fn name(&self, idx: usize) -> &str {
        &self.tiers[idx.min(self.tiers.len() - 1)]
    }

    /// Index of the next smaller tier, if one exists.
    #[must_use]
    pub fn next_smaller(&self, idx: usize) -> Option<usize> {
        let next = idx + 1;
        (next < self.tiers.len()).then_some(next)
    }

    /// Number of tiers in the ladder.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    /// Always false — construction rejects empty ladders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Classified engine failure, driving the next cascade step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Allocation failure — drop to a smaller tier
    Resource,
    /// Accelerator driver/library unavailable — switch backend
    Backend,
    /// Wall-clock budget exceeded — treated like resource exhaustion
    Timeout,
    /// Anything else — fatal for this request
    Other,
}

/// Pure classification of raw engine error text.
///
/// Resource markers are checked before backend markers: "CUDA out of
/// memory" is an allocation failure on a working accelerator, not a
/// missing driver.
#[must_use]
pub fn classify_failure(raw: &str) -> FailureKind {
    let lower = raw.to_lowercase();

    const RESOURCE_MARKERS: &[&str] = &[
        "out of memory",
        "cannot allocate",
        "failed to allocate",
        "alloc failed",
        "oom",
        "memoryerror",
    ];
    const BACKEND_MARKERS: &[&str] = &[
        "cudnn",
        "cublas",
        "libcu",
        "cuda driver",
        "no cuda",
        "cuda is not available",
        "cuda not available",
        "hip error",
        "device not found",
    ];

    if RESOURCE_MARKERS.iter().any(|m| lower.contains(m)) {
        return FailureKind::Resource;
    }
    if BACKEND_MARKERS.iter().any(|m| lower.contains(m)) {
        return FailureKind::Backend;
    }
    if lower.contains("timed out") || lower.contains("timeout") {
        return FailureKind::Timeout;
    }

    FailureKind::Other
}

/// The cascade's sticky per-session configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeState {
    /// Tier index into the hierarchy; only ever increases (toward smaller)
    pub tier_idx: usize,
    pub backend: ComputeBackend,
    pub profile: ComputeProfile,
}

/// Pure transition function of the cascade state machine.
///
/// Returns the state to retry at, or `None` when the failure is fatal for
/// this request. Every retry either switches the backend (possible once) or
/// strictly advances the tier index, so retries are bounded by the ladder.
#[must_use]
pub fn advance(
    state: CascadeState,
    hierarchy: &TierHierarchy,
    failure: FailureKind,
) -> Option<CascadeState> {
    match failure {
        FailureKind::Backend if state.backend == ComputeBackend::Accelerated => Some(CascadeState {
            backend: ComputeBackend::Fallback,
            ..state
        }),
        FailureKind::Resource | FailureKind::Timeout => {
            hierarchy.next_smaller(state.tier_idx).map(|next| CascadeState {
                tier_idx: next,
                // A tier drop also drops precision to the most frugal profile.
                profile: ComputeProfile::MemoryFrugal,
                ..state
            })
        }
        FailureKind::Backend | FailureKind::Other => None,
    }
}

/// Current recognizer configuration for the status surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecognizerStatus {
    pub tier: String,
    pub backend: String,
}

/// Session recognizer: the engine plus the cascade's sticky state.
pub struct FallbackRecognizer {
    engine: RecognizerEngine,
    hierarchy: TierHierarchy,
    state: CascadeState,
    min_samples: usize,
}

impl FallbackRecognizer {
    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the ladder is empty or the default tier
    /// is not on it.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(config: &RecognitionConfig, language: String) -> Result<Self> {
        let hierarchy = TierHierarchy::new(&config.tiers)?;
        let tier_idx = hierarchy.index_of(&config.default_tier).ok_or_else(|| {
            Error::Config(format!(
                "default tier '{}' not in hierarchy",
                config.default_tier
            ))
        })?;

        let backend = if config.prefer_accelerated {
            ComputeBackend::Accelerated
        } else {
            ComputeBackend::Fallback
        };

        let min_samples =
            (config.min_audio.as_secs_f64() * f64::from(config.sample_rate)) as usize;

        Ok(Self {
            engine: RecognizerEngine::new(config, language),
            hierarchy,
            state: CascadeState {
                tier_idx,
                backend,
                profile: ComputeProfile::HighPrecision,
            },
            min_samples,
        })
    }

    /// Current session (tier, backend) for status reporting.
    #[must_use]
    pub fn current_configuration(&self) -> (&str, ComputeBackend) {
        (self.hierarchy.name(self.state.tier_idx), self.state.backend)
    }

    /// Serializable status snapshot.
    #[must_use]
    pub fn status(&self) -> RecognizerStatus {
        let (tier, backend) = self.current_configuration();
        RecognizerStatus {
            tier: tier.to_string(),
            backend: backend.device_str().to_string(),
        }
    }

    /// Recognize one audio sample, downgrading through the ladder on
    /// resource or backend trouble.
    ///
    /// Never fails upward for engine-level problems: a request the smallest
    /// tier still cannot serve yields [`RecognitionResult::empty`] and the
    /// process moves on.
    ///
    /// # Errors
    ///
    /// Returns an error only for environmental faults (scratch file IO,
    /// interpreter missing) that retrying at another tier cannot fix.
    pub async fn recognize(&mut self, samples: &[f32]) -> Result<RecognitionResult> {
        if samples.len() < self.min_samples {
            tracing::trace!(samples = samples.len(), "audio too short, skipping engine");
            return Ok(RecognitionResult::empty());
        }

        // Bounded: each advance either switches the backend (possible once)
        // or strictly steps toward the smallest tier.
        for _ in 0..=self.hierarchy.len() {
            let tier = self.hierarchy.name(self.state.tier_idx).to_string();
            let outcome = self
                .engine
                .invoke(
                    samples,
                    &tier,
                    self.state.backend.device_str(),
                    self.state.profile.compute_str(),
                )
                .await?;

            let failure = match outcome {
                EngineOutcome::Success(result) => {
                    tracing::debug!(
                        tier = %tier,
                        confidence = result.confidence,
                        chars = result.text.chars().count(),
                        "recognition complete"
                    );
                    return Ok(result);
                }
                EngineOutcome::TimedOut => FailureKind::Timeout,
                EngineOutcome::Failure(raw) => {
                    let kind = classify_failure(&raw);
                    tracing::warn!(tier = %tier, kind = ?kind, error = %raw, "engine failure");
                    kind
                }
            };

            // Downgrades persist immediately as the session default.
            match advance(self.state, &self.hierarchy, failure) {
                Some(next) => {
                    if next.backend != self.state.backend {
                        tracing::warn!(
                            "accelerator unavailable, switching to fallback backend permanently"
                        );
                    }
                    if next.tier_idx != self.state.tier_idx {
                        tracing::info!(
                            from = %tier,
                            to = %self.hierarchy.name(next.tier_idx),
                            "downgrading recognition tier"
                        );
                    }
                    self.state = next;
                }
                None => {
                    tracing::error!("unrecoverable engine failure, giving up on this request");
                    return Ok(RecognitionResult::empty());
                }
            }
        }

        Ok(RecognitionResult::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- failure classification ----------------------------------------------

    #[test]
    fn cuda_oom_is_resource_not_backend() {
        assert_eq!(
            classify_failure("CUDA failed with error out of memory"),
            FailureKind::Resource
        );
    }

    #[test]
    fn missing_library_is_backend() {
        assert_eq!(
            classify_failure("Could not load library libcudnn_ops_infer.so.8"),
            FailureKind::Backend
        );
        assert_eq!(
            classify_failure("CUDA is not available on this machine"),
            FailureKind::Backend
        );
    }

    #[test]
    fn allocation_failures_are_resource() {
        assert_eq!(
            classify_failure("failed to allocate 2.9 GiB"),
            FailureKind::Resource
        );
        assert_eq!(classify_failure("MemoryError"), FailureKind::Resource);
    }

    #[test]
    fn unknown_errors_are_other() {
        assert_eq!(
            classify_failure("model file not found: /models/large-v3"),
            FailureKind::Other
        );
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(
            classify_failure("OUT OF MEMORY"),
            FailureKind::Resource
        );
    }

    // -- tier hierarchy ------------------------------------------------------

    fn ladder() -> TierHierarchy {
        TierHierarchy::new(&[
            "large-v3".to_string(),
            "medium".to_string(),
            "small".to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn tier_lookup_is_case_normalized() {
        let h = ladder();
        assert_eq!(h.index_of("Large-V3"), Some(0));
        assert_eq!(h.index_of("MEDIUM"), Some(1));
        assert_eq!(h.index_of("turbo"), None);
    }

    #[test]
    fn next_smaller_walks_toward_the_end() {
        let h = ladder();
        assert_eq!(h.next_smaller(0), Some(1));
        assert_eq!(h.next_smaller(1), Some(2));
        assert_eq!(h.next_smaller(2), None);
    }

    #[test]
    fn empty_ladder_is_rejected() {
        assert!(TierHierarchy::new(&[]).is_err());
    }

    // -- cascade state machine -----------------------------------------------

    fn start_state() -> CascadeState {
        CascadeState {
            tier_idx: 0,
            backend: ComputeBackend::Accelerated,
            profile: ComputeProfile::HighPrecision,
        }
    }

    #[test]
    fn resource_exhaustion_steps_down_one_tier_same_backend() {
        let h = ladder();
        let next = advance(start_state(), &h, FailureKind::Resource).unwrap();

        assert_eq!(next.tier_idx, 1);
        assert_eq!(next.backend, ComputeBackend::Accelerated);
        assert_eq!(next.profile, ComputeProfile::MemoryFrugal);
    }

    #[test]
    fn timeout_behaves_like_resource_exhaustion() {
        let h = ladder();
        let from_timeout = advance(start_state(), &h, FailureKind::Timeout);
        let from_resource = advance(start_state(), &h, FailureKind::Resource);

        assert_eq!(from_timeout, from_resource);
    }

    #[test]
    fn backend_failure_switches_backend_keeping_tier() {
        let h = ladder();
        let next = advance(start_state(), &h, FailureKind::Backend).unwrap();

        assert_eq!(next.tier_idx, 0);
        assert_eq!(next.backend, ComputeBackend::Fallback);
    }

    #[test]
    fn backend_failure_on_fallback_is_fatal() {
        let h = ladder();
        let state = CascadeState {
            backend: ComputeBackend::Fallback,
            ..start_state()
        };

        assert!(advance(state, &h, FailureKind::Backend).is_none());
    }

    #[test]
    fn smallest_tier_exhaustion_is_fatal_for_request() {
        let h = ladder();
        let state = CascadeState {
            tier_idx: 2,
            ..start_state()
        };

        assert!(advance(state, &h, FailureKind::Resource).is_none());
    }

    #[test]
    fn cascade_is_monotonic_across_any_failure_sequence() {
        let h = ladder();
        let failures = [
            FailureKind::Backend,
            FailureKind::Resource,
            FailureKind::Timeout,
            FailureKind::Backend,
            FailureKind::Resource,
        ];

        let mut state = start_state();
        for failure in failures {
            let Some(next) = advance(state, &h, failure) else {
                break;
            };
            assert!(next.tier_idx >= state.tier_idx, "tier must never promote");
            assert!(
                !(state.backend == ComputeBackend::Fallback
                    && next.backend == ComputeBackend::Accelerated),
                "backend must never revert"
            );
            state = next;
        }
    }

    // -- compute identifiers -------------------------------------------------

    #[test]
    fn device_and_compute_strings_are_lowercase() {
        assert_eq!(ComputeBackend::Accelerated.device_str(), "cuda");
        assert_eq!(ComputeBackend::Fallback.device_str(), "cpu");
        assert_eq!(ComputeProfile::MemoryFrugal.compute_str(), "int8");
    }
}
