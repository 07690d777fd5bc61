//! # docchat CLI
//!
//! Load one document and ask questions about it.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat ingest <file>` | Extract, chunk, and index a file; print the status line |
//! | `docchat search <file> "<query>"` | Rank chunks against a query without calling the model |
//! | `docchat ask <file> "<question>"` | One-shot question |
//! | `docchat chat [file]` | Interactive session with conversation history |
//! | `docchat serve` | Start the HTTP API |
//! | `docchat completions <shell>` | Print shell completions |
//!
//! `ask`, `chat`, and `serve` need `OPENAI_API_KEY`; `ingest` and `search`
//! run offline.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use docchat::completion::{ChatMessage, CompletionService, OpenAiCompletion};
use docchat::config::{self, Config, Credentials};
use docchat::error::AnswerError;
use docchat::server;
use docchat::session::{Session, SessionSettings, NOT_READY_REPLY, NO_RELEVANT_REPLY};

/// Ask questions about a PDF, spreadsheet, or CSV file.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docchat.example.toml` for every setting.
#[derive(Parser)]
#[command(name = "docchat", version, about = "Ask questions about a PDF, spreadsheet, or CSV file")]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk, and index a document, then report what was found.
    Ingest {
        /// Document to load (pdf, xlsx, xls, csv).
        file: PathBuf,

        /// Print every chunk after the status line.
        #[arg(long)]
        show_chunks: bool,
    },

    /// Rank a document's chunks against a query without calling the model.
    Search {
        file: PathBuf,
        query: String,

        /// Number of chunks to keep (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum score, exclusive (defaults to `[retrieval].relevance_floor`).
        #[arg(long)]
        floor: Option<f64>,

        /// Print the score of every chunk in document order instead.
        #[arg(long)]
        all: bool,
    },

    /// Ask a single question about a document.
    Ask { file: PathBuf, question: String },

    /// Interactive question answering.
    ///
    /// Type a question per line. `/load <file>` replaces the document,
    /// `/status` shows what is loaded, `/quit` exits.
    Chat {
        /// Document to load before the first question.
        file: Option<PathBuf>,
    },

    /// Start the HTTP API.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,

        /// Document to load before accepting requests.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Generate shell completions and print to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "docchat", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { file, show_chunks } => {
            let session = Session::new(SessionSettings::from_config(&cfg));
            load(&session, &file)?;
            if show_chunks {
                print_chunks(&session);
            }
        }
        Commands::Search {
            file,
            query,
            top_k,
            floor,
            all,
        } => {
            let session = Session::new(SessionSettings::from_config(&cfg));
            load(&session, &file)?;
            run_search(&session, &query, top_k, floor, all)?;
        }
        Commands::Ask { file, question } => {
            let session = connected_session(&cfg)?;
            load(&session, &file)?;
            match session.answer(&question, &[]).await {
                Ok(reply) => println!("{}", reply),
                Err(AnswerError::NoRelevantResult) => println!("{}", NO_RELEVANT_REPLY),
                Err(AnswerError::NotReady) => anyhow::bail!(NOT_READY_REPLY),
                Err(e @ AnswerError::Upstream(_)) => {
                    anyhow::bail!("Error generating response: {}", e)
                }
            }
        }
        Commands::Chat { file } => {
            let session = connected_session(&cfg)?;
            if let Some(file) = file {
                println!("{}", session.ingest_status(&file));
            }
            run_chat(&session).await?;
        }
        Commands::Serve { bind, file } => {
            let session = Arc::new(connected_session(&cfg)?);
            if let Some(file) = file {
                load(&session, &file)?;
            }
            let mut cfg = cfg;
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            server::run_server(&cfg, session).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}

/// Build a session backed by the completion service. Fails when the
/// credential is missing.
fn connected_session(cfg: &Config) -> anyhow::Result<Session> {
    let credentials = Credentials::from_env()?;
    let client = OpenAiCompletion::new(&cfg.completion, &credentials)
        .context("Failed to build completion client")?;
    tracing::info!(
        model = %client.model(),
        endpoint = %client.endpoint(),
        "completion service configured"
    );
    Ok(Session::with_completion(
        SessionSettings::from_config(cfg),
        Arc::new(client),
    ))
}

fn load(session: &Session, file: &Path) -> anyhow::Result<()> {
    let report = session
        .ingest(file)
        .map_err(|e| anyhow::anyhow!("Error processing file: {}", e))?;
    println!("{}", report);
    Ok(())
}

fn print_chunks(session: &Session) {
    let Some(document) = session.current() else {
        return;
    };
    for chunk in document.index.chunks() {
        let marker = if chunk.oversized { ", oversized" } else { "" };
        println!();
        println!("--- chunk {} ({} chars{}) ---", chunk.index, chunk.char_len(), marker);
        println!("{}", chunk.text);
    }
}

fn run_search(
    session: &Session,
    query: &str,
    top_k: Option<usize>,
    floor: Option<f64>,
    all: bool,
) -> anyhow::Result<()> {
    if all {
        let document = session
            .current()
            .ok_or_else(|| anyhow::anyhow!(NOT_READY_REPLY))?;
        for (i, score) in document.index.score_all(query).iter().enumerate() {
            println!("chunk {:>4}  {:.4}", i, score);
        }
        return Ok(());
    }

    let mut params = session.settings().ranking;
    if let Some(top_k) = top_k {
        anyhow::ensure!(top_k >= 1, "--top-k must be >= 1");
        params.top_k = top_k;
    }
    if let Some(floor) = floor {
        params.relevance_floor = floor;
    }

    let ranked = session.retrieve_with(query, params)?;
    if ranked.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (rank, result) in ranked.iter().enumerate() {
        println!();
        println!(
            "{}. [chunk {}] score={:.4}",
            rank + 1,
            result.chunk.index,
            result.score
        );
        for line in result.chunk.text.lines() {
            println!("    {}", line);
        }
    }
    Ok(())
}

async fn run_chat(session: &Session) -> anyhow::Result<()> {
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        println!("Type a question, /load <file>, /status, or /quit.");
    }

    let stdin = std::io::stdin();
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = stdin.lock().lines();

    loop {
        if interactive {
            print!("> ");
            std::io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/status", _) => {
                let status = session.status();
                match status.document {
                    Some(report) => println!(
                        "{} ({}, {} sections, loaded {})",
                        report.file_name,
                        report.format,
                        report.chunk_count,
                        report.ingested_at.format("%Y-%m-%d %H:%M:%S UTC")
                    ),
                    None => println!("No document loaded."),
                }
            }
            ("/load", path) if !path.is_empty() => {
                println!("{}", reload(session, Path::new(path), &mut history));
            }
            ("/load", _) => println!("Usage: /load <file>"),
            _ => {
                let reply = session.respond(input, &history).await;
                println!("{}", reply);
                history.push(ChatMessage::user(input));
                history.push(ChatMessage::assistant(reply));
            }
        }
    }

    Ok(())
}

/// Swap the chat's document. The conversation restarts only when the new
/// document actually loaded.
fn reload(session: &Session, path: &Path, history: &mut Vec<ChatMessage>) -> String {
    match session.ingest(path) {
        Ok(report) => {
            history.clear();
            report.to_string()
        }
        Err(e) => format!("Error processing file: {}", e),
    }
}
