//! Shared test fixtures: stub collaborators and a scriptable engine

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use ember_cohost::generation::{GeneratedReaction, GenerationRequest, ReactionGenerator};
use ember_cohost::ingest::{AudioSource, VisualAnalyzer, VisualSource};
use ember_cohost::{Result, VisualAnalysis};

/// Visual source/analyzer that never sees anything.
pub struct NoVisual;

#[async_trait]
impl VisualSource for NoVisual {
    async fn capture(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

#[async_trait]
impl VisualAnalyzer for NoVisual {
    async fn analyze(&self, _image: &[u8]) -> Result<Option<VisualAnalysis>> {
        Ok(None)
    }
}

/// Audio source delivering silence.
pub struct NoAudio;

#[async_trait]
impl AudioSource for NoAudio {
    async fn capture(&self) -> Result<Option<Vec<f32>>> {
        Ok(None)
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }
}

/// Generator producing a unique reaction per call.
pub struct CountingGenerator {
    calls: Arc<AtomicUsize>,
}

impl CountingGenerator {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl ReactionGenerator for CountingGenerator {
    async fn generate(&self, _: &GenerationRequest) -> Result<Option<GeneratedReaction>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(GeneratedReaction {
            text: format!("реакция номер {n} на происходящее"),
            confidence: 0.9,
        }))
    }
}

/// Write an executable shell script that plays the recognition engine.
///
/// The script receives `(audio_path, tier, language, device, compute)` and
/// keeps an invocation counter next to itself, so tests can change behavior
/// between attempts.
pub struct ScriptedEngine {
    pub dir: tempfile::TempDir,
    pub script: PathBuf,
}

impl ScriptedEngine {
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("engine.sh");

        let mut file = std::fs::File::create(&script).expect("create script");
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "dir=$(dirname \"$0\")").unwrap();
        writeln!(file, "n=$(cat \"$dir/count\" 2>/dev/null || echo 0)").unwrap();
        writeln!(file, "n=$((n+1))").unwrap();
        writeln!(file, "echo $n > \"$dir/count\"").unwrap();
        writeln!(file, "{body}").unwrap();
        drop(file);

        Self { dir, script }
    }

    /// Recognition config pointing at the script, with a short ladder.
    pub fn config(&self) -> ember_cohost::config::RecognitionConfig {
        ember_cohost::config::RecognitionConfig {
            interpreter: "/bin/sh".to_string(),
            script_path: self.script.clone(),
            tiers: vec![
                "large-v3".to_string(),
                "medium".to_string(),
                "small".to_string(),
            ],
            default_tier: "large-v3".to_string(),
            min_audio: std::time::Duration::from_millis(100),
            ..ember_cohost::config::RecognitionConfig::default()
        }
    }

    pub fn invocations(&self) -> usize {
        std::fs::read_to_string(self.dir.path().join("count"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// A second of quiet-but-nonzero PCM, enough to clear the min-audio guard.
pub fn pcm_second() -> Vec<f32> {
    (0..16_000).map(|i| ((i % 100) as f32) * 1e-4).collect()
}
