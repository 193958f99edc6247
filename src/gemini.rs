use std::env;
use std::time::Duration;

use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::{with_backoff, RetryPolicy};

const EMBEDDING_MODEL: &str = "models/text-embedding-004";
const GENERATION_MODEL_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";
const EMBEDDINGS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent";
const BATCH_EMBEDDINGS_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:batchEmbedContents";

/// The Gemini batch endpoint rejects requests with more than 100 contents.
const MAX_EMBED_BATCH: usize = 100;

/// Configuration for the Gemini API.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub embeddings_url: String,
    pub batch_embeddings_url: String,
    pub generate_url: String,
    /// Applied to every request so a stalled provider cannot hang a call.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Load configuration from environment variables. Endpoint URLs have
    /// working defaults; only the API key is required.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            RagError::Configuration(
                "GEMINI_API_KEY is not set; add it to your environment or .env file".to_string(),
            )
        })?;

        let embeddings_url =
            env::var("GEMINI_EMBEDDINGS_URL").unwrap_or_else(|_| EMBEDDINGS_URL.to_string());
        let batch_embeddings_url = env::var("GEMINI_BATCH_EMBEDDINGS_URL")
            .unwrap_or_else(|_| BATCH_EMBEDDINGS_URL.to_string());
        let generate_url =
            env::var("GEMINI_GENERATE_URL").unwrap_or_else(|_| GENERATION_MODEL_URL.to_string());

        let timeout_secs = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                RagError::Configuration(
                    "REQUEST_TIMEOUT_SECS must be a positive integer".to_string(),
                )
            })?,
            Err(_) => 30,
        };

        Ok(GeminiConfig {
            api_key,
            embeddings_url,
            batch_embeddings_url,
            generate_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Client for the Gemini embedding and generation endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RagError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(GeminiClient {
            config,
            client,
            retry,
        })
    }

    /// Embed a single text, retrying transient provider errors.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        with_backoff(self.retry, "gemini embedding", || self.embed_once(text)).await
    }

    /// Embed a batch of texts, preserving input order.
    ///
    /// Inputs are sent in API batches of at most [`MAX_EMBED_BATCH`]. A
    /// batch that still fails after retries surfaces as
    /// [`RagError::Embedding`] carrying the index of its first text;
    /// vectors from earlier batches are dropped with the error, so the
    /// unit of recovery is the whole input (one document during
    /// ingestion), not an individual batch. An empty input embeds
    /// nothing and succeeds.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_start, batch) in texts
            .chunks(MAX_EMBED_BATCH)
            .enumerate()
            .map(|(i, b)| (i * MAX_EMBED_BATCH, b))
        {
            let result =
                with_backoff(self.retry, "gemini batch embedding", || {
                    self.embed_batch_once(batch)
                })
                .await;

            match result {
                Ok(batch_vectors) => vectors.extend(batch_vectors),
                // Credential problems are configuration, not a bad batch.
                Err(e @ RagError::Configuration(_)) => return Err(e),
                Err(e) => {
                    return Err(RagError::Embedding {
                        batch_index: batch_start,
                        message: e.to_string(),
                    })
                }
            }
        }

        Ok(vectors)
    }

    /// Generate a response for an assembled prompt, retrying transient
    /// provider errors. The model's text is returned verbatim.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        with_backoff(self.retry, "gemini generation", || self.generate_once(prompt)).await
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbedRequest {
            model: EMBEDDING_MODEL,
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let url = format!("{}?key={}", self.config.embeddings_url, self.config.api_key);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;

        let data: EmbedResponse = response.json().await.map_err(request_error)?;
        Ok(data.embedding.values)
    }

    async fn embed_batch_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedRequest {
                    model: EMBEDDING_MODEL,
                    content: Content {
                        parts: vec![Part { text }],
                    },
                })
                .collect(),
        };

        let url = format!(
            "{}?key={}",
            self.config.batch_embeddings_url, self.config.api_key
        );
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;

        let data: BatchEmbedResponse = response.json().await.map_err(request_error)?;
        if data.embeddings.len() != texts.len() {
            return Err(RagError::provider(
                "gemini",
                format!(
                    "batch embedding returned {} vectors for {} inputs",
                    data.embeddings.len(),
                    texts.len()
                ),
            ));
        }

        debug!("Embedded batch of {} texts", texts.len());
        Ok(data.embeddings.into_iter().map(|e| e.values).collect())
    }

    async fn generate_once(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let url = format!("{}?key={}", self.config.generate_url, self.config.api_key);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;
        let response = check_status(response).await?;

        let data: GenerateResponse = response.json().await.map_err(request_error)?;
        first_candidate_text(data)
            .ok_or_else(|| RagError::provider("gemini", "no response candidates returned"))
    }
}

/// Map an HTTP-level failure (connect, timeout, decode) to a provider error.
fn request_error(e: reqwest::Error) -> RagError {
    RagError::provider("gemini", e.to_string())
}

/// Classify a non-success status: auth problems are configuration errors,
/// everything else is a provider error. Response bodies are logged into the
/// error message; secrets never appear in it.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RagError::Configuration(format!(
            "Gemini rejected the request ({}); check GEMINI_API_KEY",
            status
        )));
    }

    Err(RagError::provider(
        "gemini",
        format!("{} {}", status, body),
    ))
}

fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
}

// Request/response structures for the Gemini API.

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'static str,
    content: Content<'a>,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize, Debug)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
