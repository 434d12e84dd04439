//! Out-of-process recognition engine invocation
//!
//! The engine is a helper script spawned per request with the argv contract
//! `<script> <audio_path> <model_size> <language> <device> <compute_type>`.
//! It prints a single JSON object on stdout: `{"text", "confidence",
//! "language"}` on success, or `{"error": "...", "text": "", "confidence": 0}`
//! with a nonzero exit code on failure. Audio is handed over as a 16 kHz
//! mono WAV scratch file.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::config::RecognitionConfig;
use crate::{Error, Result};

/// Recognized text with engine metadata.
#[derive(Debug, Clone, Default)]
pub struct RecognitionResult {
    /// Recognized text, empty when the engine heard no speech
    pub text: String,
    /// Engine confidence in [0, 1]
    pub confidence: f64,
    /// Detected (or forced) language code
    pub language: Option<String>,
}

impl RecognitionResult {
    /// The empty result used when recognition fatally failed for a request.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One engine invocation outcome, before failure classification.
#[derive(Debug)]
pub enum EngineOutcome {
    /// The engine produced a parseable result
    Success(RecognitionResult),
    /// The engine reported an error (its raw error text)
    Failure(String),
    /// The engine exceeded its wall-clock budget and was killed
    TimedOut,
}

/// JSON schema of the helper script's stdout.
#[derive(Debug, Deserialize)]
struct EngineOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Spawns the recognition helper script and parses its output.
pub struct RecognizerEngine {
    interpreter: String,
    script_path: PathBuf,
    language: String,
    timeout: Duration,
    sample_rate: u32,
}

impl RecognizerEngine {
    #[must_use]
    pub fn new(config: &RecognitionConfig, language: String) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            script_path: config.script_path.clone(),
            language,
            timeout: config.timeout,
            sample_rate: config.sample_rate,
        }
    }

    /// Invoke the engine once at the given (tier, device, compute profile).
    ///
    /// Engine-level failures come back as [`EngineOutcome`] variants for the
    /// cascade to classify; only environmental problems (scratch file IO,
    /// spawn failure) surface as errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the WAV scratch file cannot be written or the
    /// interpreter cannot be spawned.
    pub async fn invoke(
        &self,
        samples: &[f32],
        tier: &str,
        device: &str,
        compute_type: &str,
    ) -> Result<EngineOutcome> {
        let scratch = self.write_scratch_wav(samples)?;
        let audio_path = scratch.path().to_path_buf();

        tracing::debug!(
            tier = %tier,
            device = %device,
            compute = %compute_type,
            samples = samples.len(),
            "invoking recognition engine"
        );

        let mut child = Command::new(&self.interpreter)
            .arg(&self.script_path)
            .arg(&audio_path)
            .arg(tier)
            .arg(&self.language)
            .arg(device)
            .arg(compute_type)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Recognition(format!("spawn {}: {e}", self.interpreter)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Recognition("engine stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Recognition("engine stderr not captured".to_string()))?;

        let run = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let _ = stdout.read_to_end(&mut out).await;
            let _ = stderr.read_to_end(&mut err).await;
            let status = child.wait().await;
            (out, err, status)
        };

        let Ok((out, err, status)) = tokio::time::timeout(self.timeout, run).await else {
            tracing::warn!(tier = %tier, budget = ?self.timeout, "engine exceeded wall-clock budget");
            return Ok(EngineOutcome::TimedOut);
        };

        let status = status?;
        let stdout_text = String::from_utf8_lossy(&out);
        let stderr_text = String::from_utf8_lossy(&err);

        Ok(parse_engine_output(
            &stdout_text,
            &stderr_text,
            status.success(),
        ))
    }

    /// Write mono PCM to a 16-bit WAV scratch file the engine can open.
    #[allow(clippy::cast_possible_truncation)]
    fn write_scratch_wav(&self, samples: &[f32]) -> Result<tempfile::NamedTempFile> {
        let scratch = tempfile::Builder::new()
            .prefix("ember-audio-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| Error::Audio(format!("scratch file: {e}")))?;

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(scratch.path(), spec)
            .map_err(|e| Error::Audio(format!("wav writer: {e}")))?;
        for &sample in samples {
            let clamped = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(clamped)
                .map_err(|e| Error::Audio(format!("wav write: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Audio(format!("wav finalize: {e}")))?;

        Ok(scratch)
    }
}

/// Map raw engine output to an [`EngineOutcome`].
///
/// The helper reports failures both ways seen in the wild: an `error` field
/// in otherwise valid JSON, or a nonzero exit with diagnostics on stderr.
fn parse_engine_output(stdout: &str, stderr: &str, exited_ok: bool) -> EngineOutcome {
    if let Ok(output) = serde_json::from_str::<EngineOutput>(stdout.trim()) {
        if let Some(error) = output.error {
            return EngineOutcome::Failure(error);
        }
        if exited_ok {
            return EngineOutcome::Success(RecognitionResult {
                text: output.text.trim().to_string(),
                confidence: output.confidence.clamp(0.0, 1.0),
                language: output.language,
            });
        }
    }

    if !exited_ok {
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return EngineOutcome::Failure(detail);
    }

    EngineOutcome::Failure(format!("unparseable engine output: {}", stdout.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- output parsing ------------------------------------------------------

    #[test]
    fn parses_success_json() {
        let stdout = r#"{"text": " стрим это огонь ", "confidence": 0.83, "language": "ru"}"#;
        let outcome = parse_engine_output(stdout, "", true);

        match outcome {
            EngineOutcome::Success(r) => {
                assert_eq!(r.text, "стрим это огонь");
                assert!((r.confidence - 0.83).abs() < 1e-9);
                assert_eq!(r.language.as_deref(), Some("ru"));
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn error_field_beats_exit_status() {
        let stdout = r#"{"error": "CUDA failed with error out of memory", "text": "", "confidence": 0}"#;
        let outcome = parse_engine_output(stdout, "", true);

        assert!(matches!(outcome, EngineOutcome::Failure(msg) if msg.contains("out of memory")));
    }

    #[test]
    fn nonzero_exit_uses_stderr_detail() {
        let outcome = parse_engine_output("", "could not load library libcudnn", false);

        assert!(matches!(outcome, EngineOutcome::Failure(msg) if msg.contains("libcudnn")));
    }

    #[test]
    fn empty_text_success_is_still_success() {
        let stdout = r#"{"text": "", "confidence": 0, "language": "ru"}"#;
        let outcome = parse_engine_output(stdout, "", true);

        assert!(matches!(outcome, EngineOutcome::Success(r) if r.text.is_empty()));
    }

    #[test]
    fn garbage_stdout_with_ok_exit_is_failure() {
        let outcome = parse_engine_output("Loading model...", "", true);

        assert!(matches!(outcome, EngineOutcome::Failure(_)));
    }

    #[test]
    fn confidence_is_clamped_to_unit_range() {
        let stdout = r#"{"text": "hi", "confidence": 1.7}"#;
        let EngineOutcome::Success(r) = parse_engine_output(stdout, "", true) else {
            panic!("expected success");
        };

        assert!((r.confidence - 1.0).abs() < f64::EPSILON);
    }
}
