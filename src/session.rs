//! Per-user session state and the question-answering pipeline.
//!
//! A [`Session`] owns the conversation history and the current vector
//! index. The [`Assistant`] holds the configured pipeline components and
//! operates on a session passed in by `&mut`:
//!
//! ```text
//! process_documents:  extract ─▶ chunk ─▶ index        (replaces session.index)
//! ask:                validate ─▶ retrieve ─▶ synthesize (appends two messages)
//! ```

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::answer::Synthesizer;
use crate::auth::Credentials;
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::extract::Extractor;
use crate::index::VectorIndex;
use crate::models::{Document, Message, Role};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::retrieve::{retrieve, RetrievalError};

pub const NOT_READY_RESPONSE: &str =
    "Please upload and process your documents first before asking questions.";
pub const SHORT_QUESTION_RESPONSE: &str = "Please provide a more detailed question.";
pub const NO_CHUNKS_RESPONSE: &str = "I couldn't find relevant information in your uploaded documents to answer this question. Please try rephrasing your question or check if the information is available in your documents.";
pub const EMPTY_ANSWER_RESPONSE: &str =
    "I'm having trouble generating a response. Please try rephrasing your question.";
pub const ERROR_RESPONSE: &str = "I encountered an error while processing your question. Please try again or contact support if the issue persists.";

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("no documents to process")]
    NoDocuments,
    #[error("no text could be extracted from the documents")]
    NoText,
}

/// Outcome of a successful [`Assistant::process_documents`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub documents: usize,
    pub chars: usize,
    pub chunks: usize,
    /// False when chunks were produced but the index could not be built.
    pub indexed: bool,
}

/// Conversation history plus the index questions are answered from.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub messages: Vec<Message>,
    pub index: Option<VectorIndex>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
            index: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.index.is_some()
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    /// History as `(question, answer)` pairs, oldest first.
    pub fn qa_pairs(&self) -> Vec<(&Message, &Message)> {
        self.messages
            .chunks_exact(2)
            .filter(|pair| pair[0].role == Role::User && pair[1].role == Role::Assistant)
            .map(|pair| (&pair[0], &pair[1]))
            .collect()
    }
}

/// The configured document QA pipeline.
pub struct Assistant {
    config: Config,
    extractor: Extractor,
    embedder: Box<dyn Embedder>,
    synthesizer: Synthesizer,
}

impl Assistant {
    pub fn new(
        config: Config,
        extractor: Extractor,
        embedder: Box<dyn Embedder>,
        synthesizer: Synthesizer,
    ) -> Self {
        Self {
            config,
            extractor,
            embedder,
            synthesizer,
        }
    }

    pub fn from_config(config: Config, credentials: &Credentials) -> anyhow::Result<Self> {
        let extractor = Extractor::from_config(&config.extraction);
        let embedder = create_embedder(&config.embedding, credentials)?;
        let synthesizer = Synthesizer::from_config(&config.answer, credentials)?;
        Ok(Self::new(config, extractor, embedder, synthesizer))
    }

    /// Extract, chunk and index `docs`, replacing the session's index.
    ///
    /// Succeeds even when indexing fails; the report says whether an index
    /// was built. The history is cleared whenever new documents are
    /// processed.
    pub async fn process_documents(
        &self,
        session: &mut Session,
        docs: &[Document],
        progress: &dyn ProgressReporter,
    ) -> Result<ProcessReport, ProcessError> {
        if docs.is_empty() {
            return Err(ProcessError::NoDocuments);
        }

        let raw = self.extractor.extract_documents(docs, progress);
        if raw.trim().is_empty() {
            warn!(documents = docs.len(), "no text extracted");
            return Err(ProcessError::NoText);
        }
        let chars = raw.chars().count();

        progress.report(ProgressEvent::Chunking {
            chars: chars as u64,
        });
        let chunks = chunk_text(
            &raw,
            self.config.chunking.chunk_size,
            self.config.chunking.chunk_overlap,
        );
        drop(raw);
        let chunk_count = chunks.len();

        progress.report(ProgressEvent::Indexing {
            chunks: chunk_count as u64,
        });
        let index = VectorIndex::build(chunks, self.embedder.as_ref()).await;
        let indexed = index.is_some();

        session.index = index;
        session.clear_history();

        progress.report(ProgressEvent::Done {
            chunks: chunk_count as u64,
            indexed,
        });
        info!(
            session = %session.id,
            documents = docs.len(),
            chars,
            chunks = chunk_count,
            indexed,
            "documents processed"
        );

        Ok(ProcessReport {
            documents: docs.len(),
            chars,
            chunks: chunk_count,
            indexed,
        })
    }

    /// Answer `question` from `index`. Never fails: every failure mode maps
    /// to a fixed user-facing response.
    pub async fn process_question(&self, question: &str, index: Option<&VectorIndex>) -> String {
        let retrieval = &self.config.retrieval;
        let chunks = match retrieve(
            question,
            index,
            self.embedder.as_ref(),
            retrieval.top_k,
            retrieval.min_question_chars,
        )
        .await
        {
            Ok(chunks) => chunks,
            Err(RetrievalError::NotReady) => return NOT_READY_RESPONSE.to_string(),
            Err(RetrievalError::InsufficientInput { .. }) => {
                return SHORT_QUESTION_RESPONSE.to_string()
            }
            Err(e) => {
                error!(error = %e, "failed to answer question");
                return ERROR_RESPONSE.to_string();
            }
        };

        if chunks.is_empty() {
            return NO_CHUNKS_RESPONSE.to_string();
        }

        let answer = self.synthesizer.synthesize(question.trim(), &chunks).await;
        if answer.trim().is_empty() {
            return EMPTY_ANSWER_RESPONSE.to_string();
        }
        answer
    }

    /// Answer `question` against the session and record the exchange.
    pub async fn ask(&self, session: &mut Session, question: &str) -> String {
        session.messages.push(Message::user(question));
        let answer = self.process_question(question, session.index.as_ref()).await;
        session.messages.push(Message::assistant(answer.clone()));
        answer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
