//! Rolling context: bounded buffers over the three signal streams
//!
//! One [`StreamContext`] aggregate owns a buffer per stream (visual, speech,
//! text). It is created by the daemon and handed to exactly the producers and
//! the emission scheduler; nothing else mutates it.

pub mod buffer;
pub mod types;

pub use buffer::ContextBuffer;
pub use types::{SpeakerRole, SpeechSegment, TextEvent, VisualAnalysis};

use crate::config::ContextConfig;

/// The shared rolling context over all three signal streams.
#[derive(Debug)]
pub struct StreamContext {
    visual: ContextBuffer<VisualAnalysis>,
    speech: ContextBuffer<SpeechSegment>,
    text: ContextBuffer<TextEvent>,
}

impl StreamContext {
    /// Create empty buffers with the configured per-stream capacities.
    #[must_use]
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            visual: ContextBuffer::new(config.visual_capacity),
            speech: ContextBuffer::new(config.speech_capacity),
            text: ContextBuffer::new(config.text_capacity),
        }
    }

    /// Record a visual analysis result.
    pub fn on_visual_analyzed(&mut self, analysis: VisualAnalysis) {
        self.visual.push(analysis);
    }

    /// Record an attributed speech segment.
    pub fn on_speech_recognized(&mut self, segment: SpeechSegment) {
        self.speech.push(segment);
    }

    /// Record a chat text event.
    pub fn on_text_event(&mut self, event: TextEvent) {
        self.text.push(event);
    }

    /// The most recent visual analysis, if any.
    #[must_use]
    pub fn latest_visual(&self) -> Option<&VisualAnalysis> {
        self.visual.latest()
    }

    /// Take an owned read-only snapshot for one scheduler decision.
    ///
    /// The scheduler works against the snapshot so producers may keep
    /// mutating the live buffers while a generation call is in flight.
    #[must_use]
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            visual: self.visual.iter().cloned().collect(),
            speech: self.speech.iter().cloned().collect(),
            text: self.text.iter().cloned().collect(),
        }
    }
}

/// Immutable copy of all three buffers at one instant, oldest-first.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    /// Visual analyses, oldest-first
    pub visual: Vec<VisualAnalysis>,
    /// Speech segments, oldest-first
    pub speech: Vec<SpeechSegment>,
    /// Text events, oldest-first
    pub text: Vec<TextEvent>,
}

impl ContextSnapshot {
    /// True when no stream holds any value at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visual.is_empty() && self.speech.is_empty() && self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn test_config() -> ContextConfig {
        ContextConfig {
            visual_capacity: 5,
            speech_capacity: 5,
            text_capacity: 20,
        }
    }

    #[test]
    fn snapshot_is_detached_from_live_buffers() {
        let mut ctx = StreamContext::new(&test_config());
        ctx.on_text_event(TextEvent {
            author: "viewer1".to_string(),
            body: "привет".to_string(),
            created_at: Utc::now(),
        });

        let snap = ctx.snapshot();
        ctx.on_text_event(TextEvent {
            author: "viewer2".to_string(),
            body: "gg".to_string(),
            created_at: Utc::now(),
        });

        assert_eq!(snap.text.len(), 1);
        assert_eq!(ctx.snapshot().text.len(), 2);
    }

    #[test]
    fn text_buffer_holds_more_than_speech() {
        let mut ctx = StreamContext::new(&test_config());
        for i in 0..30 {
            ctx.on_text_event(TextEvent {
                author: format!("v{i}"),
                body: "msg".to_string(),
                created_at: Utc::now(),
            });
        }

        assert_eq!(ctx.snapshot().text.len(), 20);
    }
}
