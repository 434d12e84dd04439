//! Audio ingest loop: recognition, attribution, and batched promotion

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};

use common::{NoAudio, ScriptedEngine, pcm_second};
use ember_cohost::attribution::{MemoryProfileStore, SpeakerClassifier};
use ember_cohost::config::{AttributionConfig, ContextConfig, IngestConfig};
use ember_cohost::context::SpeakerRole;
use ember_cohost::ingest::{self, AudioSource};
use ember_cohost::{FallbackRecognizer, Result, StreamContext};

/// Audio source with speech in every capture window.
struct SpeakingSource;

#[async_trait]
impl AudioSource for SpeakingSource {
    async fn capture(&self) -> Result<Option<Vec<f32>>> {
        Ok(Some(pcm_second()))
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }
}

fn fast_ingest(promotion: Duration) -> IngestConfig {
    IngestConfig {
        visual_interval: Duration::from_secs(60),
        audio_interval: Duration::from_millis(100),
        speech_promotion_interval: promotion,
    }
}

#[tokio::test]
async fn speech_is_promoted_in_batches_and_status_tracks_downgrades() {
    // first attempt hits an allocation failure, forcing a tier downgrade
    let engine = ScriptedEngine::new(
        r#"if [ "$n" -eq 1 ]; then
  echo '{"error": "CUDA failed with error out of memory", "text": "", "confidence": 0}'
  exit 1
fi
printf '{"text": "всем привет чат поехали", "confidence": 0.9, "language": "ru"}'"#,
    );

    let recognizer =
        FallbackRecognizer::new(&engine.config(), "ru".to_string()).expect("recognizer");
    let classifier = SpeakerClassifier::new(
        AttributionConfig::default(),
        Box::new(MemoryProfileStore),
    )
    .expect("classifier");
    let context = Arc::new(Mutex::new(StreamContext::new(&ContextConfig::default())));
    let (status_tx, status_rx) = watch::channel(recognizer.status());

    let task = tokio::spawn(ingest::run_audio_loop(
        Arc::new(SpeakingSource),
        recognizer,
        classifier,
        Arc::clone(&context),
        status_tx,
        fast_ingest(Duration::from_secs(1)),
    ));

    // segments recognized before the promotion cadence stay out of the buffer
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(context.lock().await.snapshot().speech.is_empty());
    assert!(engine.invocations() >= 2, "engine should have run by now");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = context.lock().await.snapshot();
        if let Some(segment) = snapshot.speech.first() {
            assert_eq!(segment.role, SpeakerRole::Streamer);
            assert_eq!(segment.text, "всем привет чат поехали");
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no batch promoted in time"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // the downgrade reached the status channel
    assert_eq!(status_rx.borrow().tier, "medium");

    task.abort();
}

#[tokio::test]
async fn silent_windows_promote_nothing_and_skip_the_engine() {
    let engine = ScriptedEngine::new(
        r#"printf '{"text": "не должно вызываться", "confidence": 1.0}'"#,
    );

    let recognizer =
        FallbackRecognizer::new(&engine.config(), "ru".to_string()).expect("recognizer");
    let classifier = SpeakerClassifier::new(
        AttributionConfig::default(),
        Box::new(MemoryProfileStore),
    )
    .expect("classifier");
    let context = Arc::new(Mutex::new(StreamContext::new(&ContextConfig::default())));
    let (status_tx, _status_rx) = watch::channel(recognizer.status());

    let task = tokio::spawn(ingest::run_audio_loop(
        Arc::new(NoAudio),
        recognizer,
        classifier,
        Arc::clone(&context),
        status_tx,
        fast_ingest(Duration::from_millis(200)),
    ));

    // several promotion intervals pass with nothing to promote
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(context.lock().await.snapshot().speech.is_empty());
    assert_eq!(engine.invocations(), 0);

    task.abort();
}
