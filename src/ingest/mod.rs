//! Signal producers: visual, audio, and text ingestion tasks
//!
//! Each stream runs as its own task against the shared [`StreamContext`].
//! The streams are independent failure domains — an error in one loop is
//! logged and that tick dropped, never propagated to the others.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::attribution::{RawSegment, SpeakerClassifier};
use crate::config::IngestConfig;
use crate::context::{SpeechSegment, StreamContext, TextEvent, VisualAnalysis};
use crate::recognition::{FallbackRecognizer, RecognizerStatus};
use crate::Result;

/// Produces raw visual snapshots (screenshot bytes) on demand.
///
/// Implemented by the browser/automation collaborator. `Ok(None)` means
/// nothing to capture right now.
#[async_trait]
pub trait VisualSource: Send + Sync {
    async fn capture(&self) -> Result<Option<Vec<u8>>>;
}

/// Turns snapshot bytes into a [`VisualAnalysis`].
///
/// Implemented by the external vision service client.
#[async_trait]
pub trait VisualAnalyzer: Send + Sync {
    async fn analyze(&self, image: &[u8]) -> Result<Option<VisualAnalysis>>;
}

/// Produces one window of mono PCM per call.
///
/// Implemented by the capture collaborator. `Ok(None)` means no audio was
/// available this window.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn capture(&self) -> Result<Option<Vec<f32>>>;
    /// Sample rate of the delivered PCM.
    fn sample_rate(&self) -> u32;
}

/// Visual producer loop: capture, analyze, buffer.
///
/// The loop body owns the in-flight analysis, so a capture tick firing while
/// the previous analysis is still running is dropped, not queued —
/// `MissedTickBehavior::Skip` is the drop-if-busy policy.
pub async fn run_visual_loop(
    source: Arc<dyn VisualSource>,
    analyzer: Arc<dyn VisualAnalyzer>,
    context: Arc<Mutex<StreamContext>>,
    config: IngestConfig,
) {
    let mut ticker = tokio::time::interval(config.visual_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let image = match source.capture().await {
            Ok(Some(image)) => image,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "visual capture failed, dropping tick");
                continue;
            }
        };

        match analyzer.analyze(&image).await {
            Ok(Some(analysis)) => {
                tracing::debug!(
                    confidence = analysis.confidence,
                    chars = analysis.description.chars().count(),
                    "visual analysis buffered"
                );
                context.lock().await.on_visual_analyzed(analysis);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "visual analysis failed, dropping tick");
            }
        }
    }
}

/// Audio producer loop: capture, recognize (with fallback cascade),
/// attribute, and promote in batches.
///
/// Segments accumulate per tick and are promoted into the shared buffer only
/// on the promotion cadence, bounding how often the scheduler's view changes
/// mid-decision.
pub async fn run_audio_loop(
    source: Arc<dyn AudioSource>,
    mut recognizer: FallbackRecognizer,
    mut classifier: SpeakerClassifier,
    context: Arc<Mutex<StreamContext>>,
    status: watch::Sender<RecognizerStatus>,
    config: IngestConfig,
) {
    let mut ticker = tokio::time::interval(config.audio_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pending: Vec<SpeechSegment> = Vec::new();
    let mut last_promotion = tokio::time::Instant::now();

    loop {
        ticker.tick().await;

        let samples = match source.capture().await {
            Ok(Some(samples)) => samples,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "audio capture failed, dropping window");
                Vec::new()
            }
        };

        if !samples.is_empty() {
            let recognized = recognizer.recognize(&samples).await;
            // downgrades are sticky, so the status only changes here
            let _ = status.send(recognizer.status());
            match recognized {
                Ok(result) if !result.text.is_empty() => {
                    let raw = RawSegment {
                        text: result.text,
                        confidence: result.confidence,
                    };
                    let latest_visual = context.lock().await.latest_visual().cloned();
                    let (segment, attribution) = classifier.classify(
                        &raw,
                        Some((&samples, source.sample_rate())),
                        latest_visual.as_ref(),
                    );
                    tracing::debug!(
                        role = segment.role.as_str(),
                        attribution = ?attribution,
                        "speech segment attributed"
                    );
                    pending.push(segment);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "recognition failed, dropping window");
                }
            }
        }

        if last_promotion.elapsed() >= config.speech_promotion_interval && !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            tracing::debug!(segments = batch.len(), "promoting speech batch");
            let mut ctx = context.lock().await;
            for segment in batch {
                ctx.on_speech_recognized(segment);
            }
            last_promotion = tokio::time::Instant::now();
        }
    }
}

/// Text producer loop: forward chat events into the buffer.
///
/// Ends when the sending side (the chat collaborator) closes the channel.
pub async fn run_text_loop(
    mut events: mpsc::Receiver<TextEvent>,
    context: Arc<Mutex<StreamContext>>,
) {
    while let Some(event) = events.recv().await {
        tracing::trace!(author = %event.author, "text event buffered");
        context.lock().await.on_text_event(event);
    }
    tracing::debug!("text event channel closed");
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::config::ContextConfig;

    #[tokio::test]
    async fn text_loop_buffers_until_channel_closes() {
        let context = Arc::new(Mutex::new(StreamContext::new(&ContextConfig::default())));
        let (tx, rx) = mpsc::channel(8);

        let handle = tokio::spawn(run_text_loop(rx, Arc::clone(&context)));

        for i in 0..3 {
            tx.send(TextEvent {
                author: format!("viewer{i}"),
                body: "poggers".to_string(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        assert_eq!(context.lock().await.snapshot().text.len(), 3);
    }
}
