//! Ember - reaction co-host engine for live streams
//!
//! Ember ingests three independently-paced signal streams from a live event
//! (visual snapshots, audio capture, chat text), reduces them into bounded
//! rolling context, and decides under timing, rate-limit, and quality
//! constraints when to synthesize and emit a single textual reaction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    Collaborators                      │
//! │  Browser capture │ Chat network │ Vision/LLM services │
//! └───────────────────────┬──────────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────────┐
//! │                    Ember Daemon                       │
//! │  Recognition cascade │ Attribution │ Context buffers  │
//! │                Emission scheduler                     │
//! └───────────────────────┬──────────────────────────────┘
//!                         │
//!               accepted reactions out
//! ```

pub mod attribution;
pub mod config;
pub mod context;
pub mod daemon;
pub mod error;
pub mod generation;
pub mod ingest;
pub mod recognition;
pub mod scheduler;

pub use attribution::{Attribution, SpeakerClassifier, VoiceProfile};
pub use config::Config;
pub use context::{ContextBuffer, ContextSnapshot, SpeechSegment, StreamContext, TextEvent, VisualAnalysis};
pub use daemon::{Collaborators, Daemon, DaemonChannels, DaemonHandle, DaemonStats};
pub use error::{Error, Result};
pub use generation::{GeneratedReaction, GenerationRequest, GeneratorPool, ReactionGenerator};
pub use recognition::{FallbackRecognizer, RecognitionResult, TierHierarchy};
pub use scheduler::{EmissionScheduler, EmissionStats, OperatingMode, TickOutcome};
