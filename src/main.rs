//! # docqa CLI
//!
//! Ask questions about your own PDFs and text files.
//!
//! ## Usage
//!
//! ```bash
//! docqa [--config ./docqa.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa extract <paths...>` | Print the raw text extracted from the documents |
//! | `docqa chunk <paths...>` | Print the chunks the documents split into |
//! | `docqa ask <paths...> -q "<question>"` | Process the documents and answer each question |
//! | `docqa chat <paths...>` | Process the documents and answer questions read from stdin |
//!
//! `ask` and `chat` need a model hub token in `HUGGINGFACEHUB_API_TOKEN`
//! (or a `.env` file) unless `auth.required = false`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use docqa::auth::Credentials;
use docqa::chunk::chunk_text;
use docqa::config::{self, Config};
use docqa::documents::collect_documents;
use docqa::extract::Extractor;
use docqa::logging::init_logging;
use docqa::models::{Document, Role};
use docqa::progress::{ProgressMode, ProgressReporter};
use docqa::session::{Assistant, Session};

/// docqa: question answering over your own documents.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "Answer questions from your PDFs and text files",
    version,
    long_about = "docqa extracts text from PDF and text files (with OCR for scanned PDFs), \
    splits it into overlapping chunks, indexes them with sentence embeddings, and answers \
    questions from the most relevant chunks."
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `docqa=debug`. Overrides `RUST_LOG`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable colored log output.
    #[arg(long, global = true)]
    no_color: bool,

    /// Processing progress on stderr. Defaults to `human` on a terminal.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the raw text extracted from the documents.
    Extract {
        /// Files or directories (.pdf, .txt).
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Split the documents into chunks and print them.
    Chunk {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print chunks as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Process the documents, then answer each question in order.
    Ask {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// A question to answer. May be repeated.
        #[arg(short, long = "question", required = true)]
        questions: Vec<String>,
    },

    /// Process the documents, then answer questions read line by line from stdin.
    ///
    /// `:history` shows the conversation, `:clear` clears it, `:quit` exits.
    Chat {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref(), cli.no_color)?;

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    match cli.command {
        Commands::Extract { paths } => {
            let docs = collect_documents(&paths)?;
            let text = Extractor::from_config(&cfg.extraction)
                .extract_documents(&docs, progress.as_ref());
            print!("{}", text);
        }
        Commands::Chunk { paths, json } => {
            run_chunk(&cfg, &paths, json, progress.as_ref())?;
        }
        Commands::Ask { paths, questions } => {
            let credentials = Credentials::from_env(&cfg.auth)?;
            let docs = collect_documents(&paths)?;
            let assistant = Assistant::from_config(cfg, &credentials)?;
            let mut session = Session::new();
            process(&assistant, &mut session, &docs, progress.as_ref()).await;

            for (i, question) in questions.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                println!("{}", assistant.ask(&mut session, question).await);
            }
        }
        Commands::Chat { paths } => {
            let credentials = Credentials::from_env(&cfg.auth)?;
            let docs = collect_documents(&paths)?;
            let assistant = Assistant::from_config(cfg, &credentials)?;
            let mut session = Session::new();
            process(&assistant, &mut session, &docs, progress.as_ref()).await;
            run_chat(&assistant, &mut session).await?;
        }
    }

    Ok(())
}

fn run_chunk(
    cfg: &Config,
    paths: &[PathBuf],
    json: bool,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let docs = collect_documents(paths)?;
    let text = Extractor::from_config(&cfg.extraction).extract_documents(&docs, progress);
    let chunks = chunk_text(&text, cfg.chunking.chunk_size, cfg.chunking.chunk_overlap);

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!("{} chunks", chunks.len());
    for chunk in &chunks {
        println!();
        println!(
            "--- chunk {} ({} chars, {}) ---",
            chunk.index,
            chunk.text.chars().count(),
            &chunk.hash[..12.min(chunk.hash.len())]
        );
        println!("{}", chunk.text);
    }
    Ok(())
}

/// Process documents, reporting problems on stderr. Questions asked after
/// a failure get the "process your documents first" answer.
async fn process(
    assistant: &Assistant,
    session: &mut Session,
    docs: &[Document],
    progress: &dyn ProgressReporter,
) {
    match assistant.process_documents(session, docs, progress).await {
        Ok(report) if !report.indexed => {
            eprintln!(
                "Warning: {} chunks extracted but the index could not be built.",
                report.chunks
            );
        }
        Ok(_) => {}
        Err(e) => eprintln!("Warning: {}.", e),
    }
}

async fn run_chat(assistant: &Assistant, session: &mut Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            ":quit" | ":q" => break,
            ":clear" => {
                session.clear_history();
                println!("History cleared.");
            }
            ":history" => print_history(session),
            question => {
                println!("{}", assistant.ask(session, question).await);
                println!();
            }
        }
    }
    Ok(())
}

fn print_history(session: &Session) {
    if session.messages.is_empty() {
        println!("No messages yet.");
        return;
    }
    for msg in &session.messages {
        let who = match msg.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
        };
        println!(
            "[{}] {}: {}",
            msg.timestamp.with_timezone(&chrono::Local).format("%H:%M"),
            who,
            msg.content
        );
    }
}
