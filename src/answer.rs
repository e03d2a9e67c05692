//! Answer synthesis from retrieved chunks.
//!
//! Answers are produced by an ordered list of [`AnswerStrategy`]
//! implementations. A [`Synthesizer`] tries each available strategy in
//! turn and falls through on errors or empty output; the deterministic
//! [`ExtractiveStrategy`] always runs last, so a question that reached the
//! synthesizer always gets some answer.
//!
//! | Strategy | Available when | Produces |
//! |----------|----------------|----------|
//! | [`GenerativeStrategy`] | `answer.generative = true` and a hub token is present | Hosted LLM answer conditioned on the retrieved context |
//! | [`ExtractiveStrategy`] | always | Top keyword-overlap sentences from the retrieved chunks |

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::config::AnswerConfig;
use crate::models::ScoredChunk;

/// Lead-in for extractive answers.
pub const ANSWER_LEAD_IN: &str = "Based on your study materials:\n\n";

/// Returned when there are no retrieved chunks to answer from.
pub const NO_RELEVANT_INFORMATION: &str =
    "I couldn't find relevant information in your documents to answer this question.";

/// A way of turning a question plus retrieved context into an answer.
#[async_trait]
pub trait AnswerStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Whether this strategy can currently be used. Unavailable strategies
    /// are skipped without being called.
    fn is_available(&self) -> bool {
        true
    }

    async fn answer(&self, question: &str, chunks: &[ScoredChunk]) -> Result<String>;
}

// ============ Extractive ============

/// A sentence-like fragment of retrieved text with its overlap score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedFragment<'a> {
    pub text: &'a str,
    pub score: usize,
}

/// Keyword-overlap extraction: picks the retrieved sentences sharing the
/// most words with the question.
#[derive(Debug, Clone)]
pub struct ExtractiveStrategy {
    max_fragments: usize,
    min_fragment_chars: usize,
    excerpt_chars: usize,
}

impl Default for ExtractiveStrategy {
    fn default() -> Self {
        Self::from_config(&AnswerConfig::default())
    }
}

impl ExtractiveStrategy {
    pub fn from_config(config: &AnswerConfig) -> Self {
        Self {
            max_fragments: config.max_fragments,
            min_fragment_chars: config.min_fragment_chars,
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// Build the extractive answer. Never fails.
    pub fn extract(&self, question: &str, chunks: &[ScoredChunk]) -> String {
        if chunks.is_empty() {
            return NO_RELEVANT_INFORMATION.to_string();
        }

        let context = combined_context(chunks);
        let ranked = rank_fragments(question, &context, self.min_fragment_chars);
        if !ranked.is_empty() {
            let top: Vec<&str> = ranked
                .iter()
                .take(self.max_fragments)
                .map(|f| f.text)
                .collect();
            return format!("{}{}", ANSWER_LEAD_IN, top.join("\n\n"));
        }

        let excerpt: String = context.chars().take(self.excerpt_chars).collect();
        format!(
            "I found some relevant content in your documents, but couldn't extract a specific \
             answer to '{}'. Here's some related information:\n\n{}...",
            question, excerpt
        )
    }
}

#[async_trait]
impl AnswerStrategy for ExtractiveStrategy {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn answer(&self, question: &str, chunks: &[ScoredChunk]) -> Result<String> {
        Ok(self.extract(question, chunks))
    }
}

/// Retrieved chunk texts joined by blank lines, in retrieval order.
pub fn combined_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split `context` on `.` and rank the fragments by how many distinct
/// question words they contain.
///
/// Fragments shorter than `min_chars` characters and fragments with no
/// shared word are dropped. A sentence cut by a chunk edge stays one
/// fragment across the joining blank line. The sort is stable, so equal
/// scores keep context order.
pub fn rank_fragments<'a>(
    question: &str,
    context: &'a str,
    min_chars: usize,
) -> Vec<RankedFragment<'a>> {
    let question_words = word_set(question);

    let mut ranked: Vec<RankedFragment<'a>> = context
        .split('.')
        .map(str::trim)
        .filter(|f| f.chars().count() >= min_chars)
        .filter_map(|f| {
            let score = word_set(f).intersection(&question_words).count();
            (score > 0).then_some(RankedFragment { text: f, score })
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Lowercased words with surrounding punctuation removed.
fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

// ============ Generative ============

/// Hosted text-generation over the Hugging Face inference API.
///
/// Calls `POST {endpoint}/models/{model}` with a context-plus-question
/// prompt. Disabled unless `answer.generative = true`.
pub struct GenerativeStrategy {
    enabled: bool,
    model: String,
    endpoint: String,
    token: Option<String>,
    max_new_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl GenerativeStrategy {
    pub fn new(config: &AnswerConfig, credentials: &Credentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            enabled: config.generative,
            model: config.model.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: credentials.token().map(String::from),
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            client,
        })
    }
}

fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Answer the question using only the study material below. \
         If the answer is not in the material, say that you don't know.\n\n\
         Material:\n{}\n\nQuestion: {}\n\nAnswer:",
        context,
        question.trim()
    )
}

/// Extract `generated_text` from either a list or a single object response.
fn parse_generated_text(json: &serde_json::Value) -> Result<String> {
    let item = match json {
        serde_json::Value::Array(items) => items
            .first()
            .ok_or_else(|| anyhow::anyhow!("Empty text-generation response"))?,
        other => other,
    };
    if let Some(err) = item.get("error").and_then(|e| e.as_str()) {
        bail!("Text-generation error: {}", err);
    }
    item.get("generated_text")
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid text-generation response: missing generated_text"))
}

#[async_trait]
impl AnswerStrategy for GenerativeStrategy {
    fn name(&self) -> &str {
        "generative"
    }

    fn is_available(&self) -> bool {
        self.enabled && self.token.is_some()
    }

    async fn answer(&self, question: &str, chunks: &[ScoredChunk]) -> Result<String> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no model hub token"))?;

        let body = serde_json::json!({
            "inputs": build_prompt(question, chunks),
            "parameters": {
                "max_new_tokens": self.max_new_tokens,
                "temperature": self.temperature,
                "return_full_text": false,
            },
            "options": { "wait_for_model": true },
        });

        let response = self
            .client
            .post(format!("{}/models/{}", self.endpoint, self.model))
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Text-generation API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_generated_text(&json)
    }
}

// ============ Synthesizer ============

/// Runs answer strategies in order, ending with the extractive fallback.
pub struct Synthesizer {
    strategies: Vec<Box<dyn AnswerStrategy>>,
    fallback: ExtractiveStrategy,
}

impl Synthesizer {
    pub fn new(strategies: Vec<Box<dyn AnswerStrategy>>, fallback: ExtractiveStrategy) -> Self {
        Self {
            strategies,
            fallback,
        }
    }

    /// Generative first (skipped unless enabled), then extractive.
    pub fn from_config(config: &AnswerConfig, credentials: &Credentials) -> Result<Self> {
        let generative = GenerativeStrategy::new(config, credentials)?;
        if config.generative && !generative.is_available() {
            warn!("generative answers are enabled but no model hub token is set; using extraction only");
        }
        Ok(Self::new(
            vec![Box::new(generative)],
            ExtractiveStrategy::from_config(config),
        ))
    }

    /// Produce an answer. An empty string means every strategy came up empty.
    pub async fn synthesize(&self, question: &str, chunks: &[ScoredChunk]) -> String {
        for strategy in &self.strategies {
            if !strategy.is_available() {
                debug!(strategy = strategy.name(), "strategy unavailable, skipping");
                continue;
            }
            match strategy.answer(question, chunks).await {
                Ok(answer) if !answer.trim().is_empty() => {
                    debug!(strategy = strategy.name(), "answer produced");
                    return answer;
                }
                Ok(_) => warn!(strategy = strategy.name(), "strategy returned an empty answer"),
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "strategy failed, falling back")
                }
            }
        }

        debug!(
            strategy = self.fallback.name(),
            "using simple text extraction"
        );
        self.fallback.extract(question, chunks)
    }
}
