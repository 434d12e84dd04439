//! Reaction generation seam
//!
//! The scheduler only knows the [`ReactionGenerator`] trait. The bundled
//! [`HttpGenerator`] talks to an OpenAI-compatible chat completions endpoint;
//! deployments with their own generation stack implement the trait instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::context::ContextSnapshot;
use crate::{Error, Result};

/// One generation attempt's input.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Read-only buffer snapshot taken at the start of the tick
    pub snapshot: ContextSnapshot,
    /// How many candidates in a row were suppressed as duplicates;
    /// a nonzero streak tells the generator to diversify
    pub duplicate_streak: u32,
}

/// A synthesized reaction candidate, pre-validation.
#[derive(Debug, Clone)]
pub struct GeneratedReaction {
    pub text: String,
    /// Generator self-assessed confidence in [0, 1]
    pub confidence: f64,
}

/// Synthesizes a textual reaction from a context snapshot.
///
/// Returning `Ok(None)` means the generator declined (nothing worth saying);
/// errors are fatal for the current tick only.
#[async_trait]
pub trait ReactionGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<GeneratedReaction>>;
}

/// Pool of interchangeable generator instances.
///
/// A second request proceeds on the idle instance when the first is still
/// busy; with every instance busy the request queues on the round-robin
/// pick rather than being dropped.
pub struct GeneratorPool {
    instances: Vec<Arc<tokio::sync::Mutex<Box<dyn ReactionGenerator>>>>,
    cursor: AtomicUsize,
}

impl GeneratorPool {
    /// Build a pool over the given instances.
    ///
    /// # Panics
    ///
    /// Panics if `instances` is empty.
    #[must_use]
    pub fn new(instances: Vec<Box<dyn ReactionGenerator>>) -> Self {
        assert!(!instances.is_empty(), "generator pool needs at least one instance");
        Self {
            instances: instances
                .into_iter()
                .map(|g| Arc::new(tokio::sync::Mutex::new(g)))
                .collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Pool with two clones of the same generator factory output.
    #[must_use]
    pub fn paired(a: Box<dyn ReactionGenerator>, b: Box<dyn ReactionGenerator>) -> Self {
        Self::new(vec![a, b])
    }

    /// Run one generation request on an idle instance, queueing if all busy.
    ///
    /// # Errors
    ///
    /// Propagates the chosen generator's error.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Option<GeneratedReaction>> {
        let start = self.cursor.fetch_add(1, Ordering::Relaxed);
        let n = self.instances.len();

        for offset in 0..n {
            let instance = &self.instances[(start + offset) % n];
            if let Ok(guard) = instance.try_lock() {
                return guard.generate(request).await;
            }
        }

        // Every instance busy: wait our turn on the round-robin pick.
        tracing::debug!("all generator instances busy, queueing request");
        let guard = self.instances[start % n].lock().await;
        guard.generate(request).await
    }
}

/// OpenAI-compatible chat completions request/response subset.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Reaction generator backed by an OpenAI-compatible endpoint.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpGenerator {
    /// Create a generator instance from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing or the HTTP client cannot
    /// be built.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("generation API key required".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Flatten the snapshot into the user message the model reacts to.
    fn render_context(request: &GenerationRequest) -> String {
        let mut lines = Vec::new();

        if let Some(visual) = request.snapshot.visual.last() {
            lines.push(format!("[screen] {}", visual.description));
        }
        for segment in &request.snapshot.speech {
            if !segment.ignore {
                lines.push(format!("[{}] {}", segment.role.as_str(), segment.text));
            }
        }
        for event in &request.snapshot.text {
            lines.push(format!("[chat] {}: {}", event.author, event.body));
        }
        if request.duplicate_streak > 0 {
            lines.push(format!(
                "[note] your {} previous attempts repeated earlier reactions; say something different",
                request.duplicate_streak
            ));
        }

        lines.join("\n")
    }
}

#[async_trait]
impl ReactionGenerator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Option<GeneratedReaction>> {
        let context = Self::render_context(request);
        if context.is_empty() {
            return Ok(None);
        }

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: context,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "generation request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "generation API error");
            return Err(Error::Generation(format!("API error {status}: {body}")));
        }

        let parsed: ChatResponse = response.json().await?;
        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        if text.is_empty() {
            return Ok(None);
        }

        Ok(Some(GeneratedReaction {
            text,
            confidence: 1.0,
        }))
    }
}
