use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ember_cohost::attribution::JsonProfileStore;
use ember_cohost::generation::HttpGenerator;
use ember_cohost::ingest::{AudioSource, VisualAnalyzer, VisualSource};
use ember_cohost::{
    Collaborators, Config, Daemon, FallbackRecognizer, ReactionGenerator, TextEvent,
    VisualAnalysis,
};

/// Ember - reaction co-host engine for live streams
#[derive(Parser)]
#[command(name = "ember", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon, reading chat events from stdin and printing reactions
    Run,
    /// Transcribe a WAV file through the fallback cascade
    TestRecognizer {
        /// Path to a mono WAV file
        path: std::path::PathBuf,
    },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "ember_cohost=info",
        1 => "ember_cohost=debug",
        _ => "ember_cohost=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run().await,
        Command::TestRecognizer { path } => test_recognizer(&path).await,
        Command::ShowConfig => show_config(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Stand-in visual source for headless runs: nothing to capture.
struct NoVisual;

#[async_trait]
impl VisualSource for NoVisual {
    async fn capture(&self) -> ember_cohost::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[async_trait]
impl VisualAnalyzer for NoVisual {
    async fn analyze(&self, _image: &[u8]) -> ember_cohost::Result<Option<VisualAnalysis>> {
        Ok(None)
    }
}

/// Stand-in audio source for headless runs: silence.
struct NoAudio;

#[async_trait]
impl AudioSource for NoAudio {
    async fn capture(&self) -> ember_cohost::Result<Option<Vec<f32>>> {
        Ok(None)
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;

    let generators: Vec<Box<dyn ReactionGenerator>> = vec![
        Box::new(HttpGenerator::new(&config.generation)?),
        Box::new(HttpGenerator::new(&config.generation)?),
    ];

    let collaborators = Collaborators {
        visual_source: Arc::new(NoVisual),
        visual_analyzer: Arc::new(NoVisual),
        audio_source: Arc::new(NoAudio),
        generators,
        profile_store: Box::new(JsonProfileStore::new(&config.data_dir)),
    };

    let (daemon, handle, channels) = Daemon::new(config, collaborators);
    let text_events = channels.text_events;
    let mut reactions = channels.reactions;

    // Feed stdin lines in as chat events.
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = tokio::io::BufReader::new(stdin);
        let mut line = String::new();
        loop {
            line.clear();
            match tokio::io::AsyncBufReadExt::read_line(&mut lines, &mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let body = line.trim().to_string();
                    if body.is_empty() {
                        continue;
                    }
                    let event = TextEvent {
                        author: "stdin".to_string(),
                        body,
                        created_at: chrono::Utc::now(),
                    };
                    if text_events.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Print accepted reactions.
    tokio::spawn(async move {
        while let Some(reaction) = reactions.recv().await {
            println!("{reaction}");
        }
    });

    // Ctrl-C stops the daemon.
    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_handle.shutdown().await;
        }
    });

    daemon.run().await?;
    Ok(())
}

async fn test_recognizer(path: &std::path::Path) -> anyhow::Result<()> {
    let config = Config::load()?;

    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .map(|s| s.map(|v| f32::from(v) / f32::from(i16::MAX)))
            .collect::<Result<_, _>>()?,
    };

    println!(
        "loaded {} samples at {} Hz from {}",
        samples.len(),
        spec.sample_rate,
        path.display()
    );

    // The scratch WAV must carry the file's real rate, not the capture default.
    let mut recognition = config.recognition.clone();
    recognition.sample_rate = spec.sample_rate;

    let mut recognizer = FallbackRecognizer::new(&recognition, config.language.clone())?;
    let result = recognizer.recognize(&samples).await?;
    let status = recognizer.status();

    if result.text.is_empty() {
        println!("no speech recognized (tier {}, backend {})", status.tier, status.backend);
    } else {
        println!("text: {}", result.text);
        println!("confidence: {:.2}", result.confidence);
        if let Some(language) = result.language {
            println!("language: {language}");
        }
        println!("tier: {} backend: {}", status.tier, status.backend);
    }
    Ok(())
}

fn show_config() -> anyhow::Result<()> {
    let config = Config::load()?;
    println!("{config:#?}");
    Ok(())
}
