//! Signal value types flowing through the context buffers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a recognized speech segment is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    /// The stream host
    Streamer,
    /// Another voice on the stream (co-host, caller, raid guest)
    Guest,
    /// Automated donation / subscription / alert audio
    Donation,
    /// No attribution evidence at all
    Unknown,
}

impl SpeakerRole {
    /// Short lowercase label for logs and prompts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Streamer => "streamer",
            Self::Guest => "guest",
            Self::Donation => "donation",
            Self::Unknown => "unknown",
        }
    }
}

/// A recognized and attributed span of speech.
///
/// Immutable once placed in a context buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSegment {
    /// Recognized text
    pub text: String,
    /// When the segment was produced
    pub created_at: DateTime<Utc>,
    /// Recognition confidence in [0, 1]
    pub confidence: f64,
    /// Matched voice profile id, when attribution found one
    pub speaker_id: Option<String>,
    /// Attributed role
    pub role: SpeakerRole,
    /// True for segments the scheduler must not react to (alerts, silence)
    pub ignore: bool,
    /// True when attribution allocated a brand-new voice profile
    pub is_new_voice: bool,
}

impl SpeechSegment {
    /// A segment carrying no usable speech (empty recognizer output).
    #[must_use]
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            created_at: Utc::now(),
            confidence: 0.0,
            speaker_id: None,
            role: SpeakerRole::Unknown,
            ignore: true,
            is_new_voice: false,
        }
    }

    /// True when the text carries more than filler (at least a few words).
    #[must_use]
    pub fn is_substantial(&self) -> bool {
        !self.ignore && self.text.split_whitespace().count() >= 3
    }
}

/// Result of analyzing one visual snapshot.
///
/// Produced by the external vision collaborator; opaque to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualAnalysis {
    /// Scene description text
    pub description: String,
    /// Analyzer confidence in [0, 1]
    pub confidence: f64,
    /// When the snapshot was analyzed
    pub created_at: DateTime<Utc>,
}

/// One message from the text event feed (chat).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEvent {
    /// Author display name
    pub author: String,
    /// Message body
    pub body: String,
    /// When the event arrived
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segment_is_ignored_and_unknown() {
        let seg = SpeechSegment::empty();

        assert!(seg.ignore);
        assert_eq!(seg.role, SpeakerRole::Unknown);
        assert!(seg.text.is_empty());
    }

    #[test]
    fn substantial_needs_three_words_and_no_ignore() {
        let mut seg = SpeechSegment::empty();
        seg.ignore = false;
        seg.text = "ну ладно".to_string();
        assert!(!seg.is_substantial());

        seg.text = "этот босс просто невозможный".to_string();
        assert!(seg.is_substantial());

        seg.ignore = true;
        assert!(!seg.is_substantial());
    }
}
