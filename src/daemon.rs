//! Daemon - the co-host engine service
//!
//! Wires the producers, the recognition pipeline, and the emission scheduler
//! together, and exposes the control surface (silence, mode, stats) over a
//! command channel.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::attribution::{ProfileStore, SpeakerClassifier};
use crate::context::{StreamContext, TextEvent};
use crate::generation::{GeneratorPool, ReactionGenerator};
use crate::ingest::{self, AudioSource, VisualAnalyzer, VisualSource};
use crate::recognition::{FallbackRecognizer, RecognizerStatus};
use crate::scheduler::{EmissionScheduler, EmissionStats, OperatingMode, TickOutcome};
use crate::{Config, Error, Result};

/// Capacity of the control and reaction channels
const CHANNEL_CAPACITY: usize = 32;

/// External collaborators the engine consumes, specified only by interface.
pub struct Collaborators {
    pub visual_source: Arc<dyn VisualSource>,
    pub visual_analyzer: Arc<dyn VisualAnalyzer>,
    pub audio_source: Arc<dyn AudioSource>,
    /// Generator instances for the pool (two allow one concurrent overlap)
    pub generators: Vec<Box<dyn ReactionGenerator>>,
    pub profile_store: Box<dyn ProfileStore>,
}

/// Commands accepted on the control surface.
#[derive(Debug)]
pub enum ControlCommand {
    SetSilenced(bool),
    SetMode(OperatingMode),
    Stats(oneshot::Sender<DaemonStats>),
    Shutdown,
}

/// Combined status snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DaemonStats {
    pub emission: EmissionStats,
    pub recognizer: RecognizerStatus,
}

/// Cloneable handle to a running daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    commands: mpsc::Sender<ControlCommand>,
}

impl DaemonHandle {
    /// Toggle explicit silence.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon has stopped.
    pub async fn set_silenced(&self, silenced: bool) -> Result<()> {
        self.send(ControlCommand::SetSilenced(silenced)).await
    }

    /// Switch operating mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon has stopped.
    pub async fn set_mode(&self, mode: OperatingMode) -> Result<()> {
        self.send(ControlCommand::SetMode(mode)).await
    }

    /// Query current stats.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon has stopped.
    pub async fn stats(&self) -> Result<DaemonStats> {
        let (tx, rx) = oneshot::channel();
        self.send(ControlCommand::Stats(tx)).await?;
        rx.await
            .map_err(|_| Error::Config("daemon stopped before answering".to_string()))
    }

    /// Ask the daemon to stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon has already stopped.
    pub async fn shutdown(&self) -> Result<()> {
        self.send(ControlCommand::Shutdown).await
    }

    async fn send(&self, command: ControlCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::Config("daemon control channel closed".to_string()))
    }
}

/// Channels connecting the daemon to its network collaborator.
pub struct DaemonChannels {
    /// Push chat events in here
    pub text_events: mpsc::Sender<TextEvent>,
    /// Accepted reactions come out here; the receiver transmits them
    pub reactions: mpsc::Receiver<String>,
}

/// The Ember daemon - orchestrates ingestion, recognition, and emission.
pub struct Daemon {
    config: Config,
    collaborators: Collaborators,
    commands: mpsc::Receiver<ControlCommand>,
    text_events: mpsc::Receiver<TextEvent>,
    reactions: mpsc::Sender<String>,
}

impl Daemon {
    /// Create a daemon together with its handle and collaborator channels.
    #[must_use]
    pub fn new(config: Config, collaborators: Collaborators) -> (Self, DaemonHandle, DaemonChannels) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (text_tx, text_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (reaction_tx, reaction_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let daemon = Self {
            config,
            collaborators,
            commands: command_rx,
            text_events: text_rx,
            reactions: reaction_tx,
        };
        let handle = DaemonHandle {
            commands: command_tx,
        };
        let channels = DaemonChannels {
            text_events: text_tx,
            reactions: reaction_rx,
        };
        (daemon, handle, channels)
    }

    /// Run until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails; producer-loop errors after
    /// startup are contained to their own stream.
    pub async fn run(self) -> Result<()> {
        let Self {
            config,
            collaborators,
            mut commands,
            text_events,
            reactions,
        } = self;

        let recognizer = FallbackRecognizer::new(&config.recognition, config.language.clone())?;
        let classifier =
            SpeakerClassifier::new(config.attribution.clone(), collaborators.profile_store)?;
        let pool = GeneratorPool::new(collaborators.generators);
        let mut scheduler = EmissionScheduler::new(config.scheduler.clone());

        let context = Arc::new(Mutex::new(StreamContext::new(&config.context)));
        let (status_tx, status_rx) = watch::channel(recognizer.status());

        tracing::info!(
            language = %config.language,
            tier = %status_rx.borrow().tier,
            "daemon running"
        );

        let visual_task = tokio::spawn(ingest::run_visual_loop(
            Arc::clone(&collaborators.visual_source),
            Arc::clone(&collaborators.visual_analyzer),
            Arc::clone(&context),
            config.ingest.clone(),
        ));
        let audio_task = tokio::spawn(ingest::run_audio_loop(
            Arc::clone(&collaborators.audio_source),
            recognizer,
            classifier,
            Arc::clone(&context),
            status_tx,
            config.ingest.clone(),
        ));
        let text_task = tokio::spawn(ingest::run_text_loop(text_events, Arc::clone(&context)));

        let mut ticker = tokio::time::interval(config.scheduler.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = context.lock().await.snapshot();
                    match scheduler.tick(&snapshot, &pool).await {
                        TickOutcome::Emitted(text) => {
                            if reactions.send(text).await.is_err() {
                                tracing::warn!("reaction receiver dropped, stopping");
                                break;
                            }
                        }
                        TickOutcome::Skipped(reason) => {
                            tracing::trace!(?reason, "tick skipped");
                        }
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(ControlCommand::SetSilenced(silenced)) => {
                            tracing::info!(silenced, "silence toggled");
                            scheduler.set_silenced(silenced);
                        }
                        Some(ControlCommand::SetMode(mode)) => {
                            tracing::info!(?mode, "operating mode switched");
                            scheduler.set_mode(mode);
                        }
                        Some(ControlCommand::Stats(reply)) => {
                            let stats = DaemonStats {
                                emission: scheduler.stats(),
                                recognizer: status_rx.borrow().clone(),
                            };
                            let _ = reply.send(stats);
                        }
                        Some(ControlCommand::Shutdown) | None => {
                            tracing::info!("shutdown requested");
                            break;
                        }
                    }
                }
            }
        }

        visual_task.abort();
        audio_task.abort();
        text_task.abort();
        let _ = futures::future::join_all([visual_task, audio_task, text_task]).await;
        tracing::info!("daemon stopped");
        Ok(())
    }
}
