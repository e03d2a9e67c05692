//! # docqa
//!
//! Question answering over a user's own documents.
//!
//! PDFs and text files are converted to raw text (with OCR for scanned
//! PDFs), split into overlapping chunks, embedded into an in-memory vector
//! index, and queried: each question retrieves the nearest chunks and an
//! answer is synthesized from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌───────────┐   ┌─────────────┐
//! │  Extract  │──▶│  Chunk   │──▶│   Index   │◀──│  Retrieve   │
//! │ PDF/TXT/  │   │ 1000/200 │   │  cosine   │   │ top-K = 10  │
//! │   OCR     │   └──────────┘   └───────────┘   └──────┬──────┘
//! └───────────┘                                         ▼
//!                                               ┌─────────────┐
//!                                               │ Synthesize  │
//!                                               │ gen → extr. │
//!                                               └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa extract notes.pdf                    # print extracted text
//! docqa chunk notes/ --json                  # inspect chunks
//! docqa ask notes/ -q "What is osmosis?"     # one-shot questions
//! docqa chat notes/                          # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`documents`] | Path expansion into documents |
//! | [`extract`] | PDF/TXT text extraction with OCR fallback |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory vector index |
//! | [`retrieve`] | Question validation and top-K retrieval |
//! | [`answer`] | Generative and extractive answer strategies |
//! | [`session`] | Session state and the end-to-end pipeline |
//! | [`auth`] | Model hub credentials |
//! | [`progress`] | Processing progress on stderr |
//! | [`logging`] | Tracing subscriber setup |

pub mod answer;
pub mod auth;
pub mod chunk;
pub mod config;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod logging;
pub mod models;
pub mod progress;
pub mod retrieve;
pub mod session;
