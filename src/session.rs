//! Single-document question-answering session.
//!
//! A [`Session`] is either empty or holds one [`LoadedDocument`]: the ingest
//! report plus the immutable chunk index. Ingest builds the whole document
//! outside the lock and swaps it in at the end, so a failed ingest leaves
//! the previous document in place and readers never see a partial index.
//!
//! ```text
//! Empty ──ingest ok──▶ Loaded ──ingest ok──▶ Loaded (replaced)
//!   │                    │
//!   └─ingest err─▶ Empty └─ingest err─▶ Loaded (unchanged)
//! ```

use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use docchat_core::chunk::{self, ChunkParams};
use docchat_core::index::ChunkIndex;
use docchat_core::models::RankedChunk;
use docchat_core::search::{self, RankParams};

use crate::completion::{ChatMessage, CompletionService};
use crate::config::Config;
use crate::error::{AnswerError, IngestError, UpstreamError};
use crate::extract::{self, Document, DocumentFormat};

/// System instruction sent with every question.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant specializing in understanding and explaining data from documents and spreadsheets.
When providing information:
1. Be precise and accurate with numbers and facts
2. Maintain context about columns and data structure
3. If multiple relevant entries exist, summarize them clearly
4. If you're unsure about something, say so
5. Format numerical data clearly and consistently";

pub const NOT_READY_REPLY: &str = "Please upload a document first.";
pub const NO_RELEVANT_REPLY: &str =
    "I couldn't find relevant information to answer your question. Please try rephrasing it.";

/// Tuning applied to every document the session loads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub chunking: ChunkParams,
    pub ranking: RankParams,
    /// Forward prior turns to the model between the system and user messages.
    pub include_history: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkParams::default(),
            ranking: RankParams::default(),
            include_history: false,
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: config.chunking.params(),
            ranking: config.retrieval.params(),
            include_history: config.completion.include_history,
        }
    }
}

/// Summary of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub file_name: String,
    pub format: DocumentFormat,
    pub text_chars: usize,
    pub chunk_count: usize,
    pub oversized_chunks: usize,
    /// SHA-256 of the normalized text.
    pub digest: String,
    pub ingested_at: DateTime<Utc>,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document processed successfully! Found {} sections.",
            self.chunk_count
        )
    }
}

/// A document ready for retrieval.
#[derive(Debug)]
pub struct LoadedDocument {
    pub report: IngestReport,
    pub index: ChunkIndex,
}

/// Snapshot of the session for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub loaded: bool,
    pub document: Option<IngestReport>,
    pub vocabulary_size: Option<usize>,
    pub model: Option<String>,
}

pub struct Session {
    settings: SessionSettings,
    completion: Option<Arc<dyn CompletionService>>,
    state: RwLock<Option<Arc<LoadedDocument>>>,
}

impl Session {
    /// A session without a completion service. Ingest and retrieval work;
    /// [`answer`](Self::answer) fails with [`UpstreamError::NotConfigured`].
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            completion: None,
            state: RwLock::new(None),
        }
    }

    pub fn with_completion(
        settings: SessionSettings,
        completion: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            settings,
            completion: Some(completion),
            state: RwLock::new(None),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Read a file from disk and ingest it.
    pub fn ingest(&self, path: &Path) -> Result<IngestReport, IngestError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Reject unknown extensions before touching the file.
        DocumentFormat::from_file_name(&file_name)?;

        let bytes = std::fs::read(path).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.ingest_document(Document::new(file_name, bytes))
    }

    pub fn ingest_bytes(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestReport, IngestError> {
        self.ingest_document(Document::new(file_name, bytes))
    }

    /// Extract, chunk, and index a document, then make it the current one.
    pub fn ingest_document(&self, document: Document) -> Result<IngestReport, IngestError> {
        tracing::info!(
            file = %document.file_name,
            bytes = document.bytes.len(),
            "ingesting document"
        );

        let format = document.format()?;
        let text = extract::extract_text(&document.bytes, format).map_err(|e| {
            tracing::warn!(file = %document.file_name, error = %e, "extraction failed");
            e
        })?;

        let chunks = chunk::split(&text, self.settings.chunking);
        let report = IngestReport {
            file_name: document.file_name,
            format,
            text_chars: text.chars().count(),
            chunk_count: chunks.len(),
            oversized_chunks: chunks.iter().filter(|c| c.oversized).count(),
            digest: format!("{:x}", Sha256::digest(text.as_bytes())),
            ingested_at: Utc::now(),
        };
        let index = ChunkIndex::build(chunks);

        tracing::info!(
            file = %report.file_name,
            format = %report.format,
            chunks = report.chunk_count,
            oversized = report.oversized_chunks,
            vocabulary = index.vocabulary_size(),
            digest = %report.digest,
            "document loaded"
        );

        let loaded = Arc::new(LoadedDocument {
            report: report.clone(),
            index,
        });
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = Some(loaded);
        Ok(report)
    }

    /// Ingest and render the outcome as the user-facing status line.
    pub fn ingest_status(&self, path: &Path) -> String {
        match self.ingest(path) {
            Ok(report) => report.to_string(),
            Err(e) => format!("Error processing file: {}", e),
        }
    }

    /// The currently loaded document, if any.
    pub fn current(&self) -> Option<Arc<LoadedDocument>> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    pub fn status(&self) -> SessionStatus {
        let current = self.current();
        SessionStatus {
            loaded: current.is_some(),
            document: current.as_ref().map(|d| d.report.clone()),
            vocabulary_size: current.as_ref().map(|d| d.index.vocabulary_size()),
            model: self.completion.as_ref().map(|c| c.model().to_string()),
        }
    }

    /// Rank the current document's chunks with the session's settings.
    pub fn retrieve(&self, query: &str) -> Result<Vec<RankedChunk>, AnswerError> {
        self.retrieve_with(query, self.settings.ranking)
    }

    pub fn retrieve_with(
        &self,
        query: &str,
        params: RankParams,
    ) -> Result<Vec<RankedChunk>, AnswerError> {
        let document = self.current().ok_or(AnswerError::NotReady)?;
        let ranked = search::rank(&document.index, query, params)?;
        tracing::debug!(
            results = ranked.len(),
            best = ranked.first().map(|r| r.score).unwrap_or(0.0),
            "retrieval finished"
        );
        Ok(ranked)
    }

    /// Build the message list for a question over the retrieved chunks.
    pub fn build_messages(
        &self,
        ranked: &[RankedChunk],
        query: &str,
        history: &[ChatMessage],
    ) -> Vec<ChatMessage> {
        let context = ranked
            .iter()
            .map(|r| r.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
        if self.settings.include_history {
            messages.extend(history.iter().cloned());
        }
        messages.push(ChatMessage::user(format!(
            "Based on the following information:\n\n{}\n\nQuestion: {}\n\nPlease provide a helpful response, citing specific data where relevant.",
            context, query
        )));
        messages
    }

    /// Answer a question from the loaded document.
    ///
    /// The completion service is only contacted when at least one chunk
    /// clears the relevance floor.
    pub async fn answer(
        &self,
        query: &str,
        history: &[ChatMessage],
    ) -> Result<String, AnswerError> {
        let ranked = self.retrieve(query)?;
        if ranked.is_empty() {
            return Err(AnswerError::NoRelevantResult);
        }

        let completion = self
            .completion
            .as_ref()
            .ok_or(UpstreamError::NotConfigured)?;
        let messages = self.build_messages(&ranked, query, history);
        Ok(completion.complete(&messages).await?)
    }

    /// [`answer`](Self::answer) with every error rendered as a chat reply.
    pub async fn respond(&self, query: &str, history: &[ChatMessage]) -> String {
        match self.answer(query, history).await {
            Ok(reply) => reply,
            Err(AnswerError::NotReady) => NOT_READY_REPLY.to_string(),
            Err(AnswerError::NoRelevantResult) => NO_RELEVANT_REPLY.to_string(),
            Err(AnswerError::Upstream(e)) => format!("Error generating response: {}", e),
        }
    }
}
