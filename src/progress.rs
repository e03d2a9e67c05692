//! Document-processing progress reporting.
//!
//! Reports observable progress while documents are extracted, chunked, and
//! indexed, so users see which file is being read and when the index is
//! ready. Progress is emitted on **stderr** so stdout stays clean for answers.

use std::io::Write;

/// A single progress event for document processing.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// Extracting text from document `n` of `total`.
    Extracting { document: String, n: u64, total: u64 },
    /// Splitting `chars` characters of raw text into chunks.
    Chunking { chars: u64 },
    /// Embedding `chunks` chunks and building the index.
    Indexing { chunks: u64 },
    /// Processing finished; `indexed` is false when the index could not be built.
    Done { chunks: u64, indexed: bool },
}

/// Reports processing progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the processing pipeline.
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "extracting  2 / 5  notes.pdf".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Extracting { document, n, total } => {
                format!("extracting  {} / {}  {}\n", n, total, document)
            }
            ProgressEvent::Chunking { chars } => {
                format!("chunking  {} chars\n", format_number(*chars))
            }
            ProgressEvent::Indexing { chunks } => {
                format!("indexing  {} chunks\n", format_number(*chunks))
            }
            ProgressEvent::Done { chunks, indexed } => {
                if *indexed {
                    format!("ready  {} chunks indexed\n", format_number(*chunks))
                } else {
                    "not ready  index could not be built\n".to_string()
                }
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Extracting { document, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "document": document,
                "n": n,
                "total": total
            }),
            ProgressEvent::Chunking { chars } => serde_json::json!({
                "event": "progress",
                "phase": "chunking",
                "chars": chars
            }),
            ProgressEvent::Indexing { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "indexing",
                "chunks": chunks
            }),
            ProgressEvent::Done { chunks, indexed } => serde_json::json!({
                "event": "done",
                "chunks": chunks,
                "indexed": indexed
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
