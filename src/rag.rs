use std::env;

use chrono::Utc;
use log::{info, warn};

use crate::chunking;
use crate::database::{EmbeddingRecord, ScoredChunk, VectorStore};
use crate::document::Document;
use crate::error::{RagError, Result};
use crate::gemini::GeminiClient;

/// Fixed system instruction sent with every generation call. The model is
/// told to admit missing context rather than hallucinate.
const SYSTEM_INSTRUCTION: &str = "You are the assistant embedded in a personal portfolio \
website. Answer questions about the site owner's projects, work experience, education, and \
skills using only the context provided below. If the context does not contain the answer, or \
no relevant context was found, say so plainly instead of guessing. Keep answers concise and \
conversational.";

/// Injected into the prompt when retrieval returned nothing or the store
/// was unreachable, so the model is never left to answer ungrounded in
/// silence.
const NO_CONTEXT_MARKER: &str =
    "No relevant context was found for this question. Tell the user you do not have that \
information.";

/// Character budget for each history turn folded into the retrieval query.
const TURN_SNIPPET_CHARS: usize = 300;

/// Tunables for chunking and retrieval.
#[derive(Debug, Clone, Copy)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_max_chars: usize,
    /// Characters shared between consecutive chunks of a document.
    pub chunk_overlap_chars: usize,
    /// Number of nearest neighbors retrieved per query.
    pub top_k: u64,
    /// How many trailing conversation turns are folded into the retrieval
    /// query and the generation prompt.
    pub history_window: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        RagConfig {
            chunk_max_chars: 1200,
            chunk_overlap_chars: 150,
            top_k: 5,
            history_window: 3,
        }
    }
}

impl RagConfig {
    /// Load tunables from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = RagConfig::default();
        let config = RagConfig {
            chunk_max_chars: env_usize("CHUNK_MAX_CHARS", defaults.chunk_max_chars)?,
            chunk_overlap_chars: env_usize("CHUNK_OVERLAP_CHARS", defaults.chunk_overlap_chars)?,
            top_k: env_usize("RETRIEVAL_TOP_K", defaults.top_k as usize)? as u64,
            history_window: env_usize("HISTORY_WINDOW_TURNS", defaults.history_window)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        // The chunker needs room for the overlap seed, a separator, and at
        // least one character of new content inside every chunk.
        if self.chunk_overlap_chars + 3 > self.chunk_max_chars {
            return Err(RagError::Configuration(format!(
                "CHUNK_OVERLAP_CHARS ({}) may be at most CHUNK_MAX_CHARS - 3 ({})",
                self.chunk_overlap_chars,
                self.chunk_max_chars.saturating_sub(3)
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::Configuration(
                "RETRIEVAL_TOP_K must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|_| RagError::Configuration(format!("{} must be a non-negative integer", name))),
        Err(_) => Ok(default),
    }
}

/// One turn of the caller-supplied conversation. Read-only context, never
/// persisted.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// Per-document ingestion failure, collected rather than thrown.
#[derive(Debug)]
pub struct IngestFailure {
    pub document_id: String,
    pub reason: String,
}

/// Outcome of an ingestion run. Ingestion is a batch job, not a
/// transaction: failures are reported alongside the successes.
#[derive(Debug, Default)]
pub struct IngestSummary {
    pub documents_processed: usize,
    pub chunks_written: usize,
    pub errors: Vec<IngestFailure>,
}

/// A generated answer with its server-set timestamp (RFC 3339, UTC).
#[derive(Debug)]
pub struct QueryResponse {
    pub response: String,
    pub timestamp: String,
}

/// Facade over the whole pipeline: owns the embedding/generation client
/// and the vector store, exposes ingestion and query.
///
/// Constructed once by the composition root and shared. Concurrent queries
/// and concurrent ingestion of different documents are safe; concurrent
/// ingestion of the same document id is not serialized here and should be
/// avoided by the caller (ingestion is an administrative action, not a hot
/// path).
pub struct RagService {
    gemini: GeminiClient,
    store: VectorStore,
    config: RagConfig,
}

impl RagService {
    pub fn new(gemini: GeminiClient, store: VectorStore, config: RagConfig) -> Self {
        RagService {
            gemini,
            store,
            config,
        }
    }

    /// Chunk, embed, and store a batch of documents.
    ///
    /// Each document's chunks replace whatever the store previously held
    /// for that document id. A document whose embedding or upsert fails is
    /// recorded in the summary and the batch continues.
    pub async fn ingest_documents(&self, documents: &[Document]) -> IngestSummary {
        let mut summary = IngestSummary::default();

        for document in documents {
            let chunks = chunking::chunk_document(
                document,
                self.config.chunk_max_chars,
                self.config.chunk_overlap_chars,
            );
            // An empty document still flows through the upsert: it must
            // clear any chunks a previous version left in the store.
            if chunks.is_empty() {
                info!("Document {} has no text", document.id);
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = match self.gemini.embed_batch(&texts).await {
                Ok(vectors) => vectors,
                Err(e) => {
                    warn!("Embedding failed for document {}: {}", document.id, e);
                    summary.errors.push(IngestFailure {
                        document_id: document.id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let records: Vec<EmbeddingRecord> = chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord {
                    chunk_id: chunk.id.clone(),
                    vector,
                    chunk,
                })
                .collect();

            match self.store.upsert(records, &document.id).await {
                Ok(written) => {
                    info!("Ingested document {} ({} chunks)", document.id, written);
                    summary.documents_processed += 1;
                    summary.chunks_written += written;
                }
                Err(e) => {
                    warn!("Upsert failed for document {}: {}", document.id, e);
                    summary.errors.push(IngestFailure {
                        document_id: document.id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        summary
    }

    /// Answer a user message grounded in the stored corpus.
    ///
    /// The trailing conversation turns are folded into the retrieval query
    /// so follow-up questions resolve their referents. If the vector store
    /// is unreachable or returns nothing, the model is told explicitly
    /// that no context was found; the call still returns a response.
    pub async fn query(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> Result<QueryResponse> {
        let message = validate_message(message)?;

        let retrieval_query =
            build_retrieval_query(message, history, self.config.history_window);
        let query_vector = self.gemini.embed(&retrieval_query).await?;

        let retrieved = match self.store.search(query_vector, self.config.top_k, None).await {
            Ok(results) => results,
            Err(RagError::RetrievalUnavailable(reason)) => {
                warn!("Vector store unavailable, answering without context: {}", reason);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let prompt = build_prompt(&retrieved, history, self.config.history_window, message);
        let response = self.gemini.generate(&prompt).await?;

        Ok(QueryResponse {
            response,
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

fn validate_message(message: &str) -> Result<&str> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidQuery("message must not be empty".to_string()));
    }
    Ok(trimmed)
}

/// The string that gets embedded for retrieval: the raw message, prefixed
/// with a bounded window of recent turns so pronouns and follow-ups still
/// land near the right chunks.
fn build_retrieval_query(message: &str, history: &[ConversationTurn], window: usize) -> String {
    let recent = trailing_window(history, window);
    if recent.is_empty() {
        return message.to_string();
    }

    let mut query = String::new();
    for turn in recent {
        query.push_str(turn.role.label());
        query.push_str(": ");
        query.push_str(&truncate_chars(&turn.text, TURN_SNIPPET_CHARS));
        query.push('\n');
    }
    query.push_str(message);
    query
}

/// Assemble the generation prompt: fixed instruction, source-attributed
/// context (or the explicit no-context marker), recent history, and the
/// user message.
fn build_prompt(
    retrieved: &[ScoredChunk],
    history: &[ConversationTurn],
    window: usize,
    message: &str,
) -> String {
    let mut prompt = String::from(SYSTEM_INSTRUCTION);
    prompt.push_str("\n\nContext:\n");

    if retrieved.is_empty() {
        prompt.push_str(NO_CONTEXT_MARKER);
        prompt.push('\n');
    } else {
        for result in retrieved {
            let source_id = result
                .chunk
                .metadata
                .get("source_id")
                .map(String::as_str)
                .unwrap_or(result.chunk.document_id.as_str());
            let title = result
                .chunk
                .metadata
                .get("title")
                .map(String::as_str)
                .unwrap_or("");
            prompt.push_str(&format!("[source: {} | {}]\n", source_id, title));
            prompt.push_str(&result.chunk.text);
            prompt.push_str("\n\n");
        }
    }

    let recent = trailing_window(history, window);
    if !recent.is_empty() {
        prompt.push_str("\nConversation so far:\n");
        for turn in recent {
            prompt.push_str(turn.role.label());
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push('\n');
        }
    }

    prompt.push_str("\nUser question: ");
    prompt.push_str(message);
    prompt.push_str("\nAnswer:");
    prompt
}

fn trailing_window(history: &[ConversationTurn], window: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}
