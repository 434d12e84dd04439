//! Local speech recognition with resource-adaptive fallback
//!
//! [`RecognizerEngine`] wraps the out-of-process engine; [`FallbackRecognizer`]
//! keeps it alive under pressure by walking a tier/backend downgrade ladder.

pub mod cascade;
pub mod engine;

pub use cascade::{
    CascadeState, ComputeBackend, ComputeProfile, FailureKind, FallbackRecognizer,
    RecognizerStatus, TierHierarchy, advance, classify_failure,
};
pub use engine::{EngineOutcome, RecognitionResult, RecognizerEngine};
