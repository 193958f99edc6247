use std::collections::HashMap;
use std::env;
use std::time::Duration;

use log::{debug, info};
use qdrant_client::qdrant::{
    vectors_config, with_payload_selector, Condition, CreateCollectionBuilder,
    DeletePointsBuilder, Distance, Filter, GetCollectionInfoResponse, PointStruct, SearchPoints,
    UpsertPointsBuilder, Value, VectorParams, WithPayloadSelector,
};
use qdrant_client::{Qdrant, QdrantError};
use uuid::Uuid;

use crate::chunking::Chunk;
use crate::document::SourceType;
use crate::error::{RagError, Result};

/// Configuration for the Qdrant vector store.
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    /// Vector dimension of the index. Must match the embedder's output
    /// dimension for the lifetime of the collection.
    pub dimension: u64,
    pub timeout: Duration,
}

impl QdrantConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL").map_err(|_| {
            RagError::Configuration(
                "QDRANT_URL is not set; point it at your Qdrant instance".to_string(),
            )
        })?;
        let api_key = env::var("QDRANT_API_KEY").ok();
        let collection =
            env::var("QDRANT_COLLECTION").unwrap_or_else(|_| "portfolio_chunks".to_string());

        let dimension = match env::var("EMBEDDING_DIMENSION") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                RagError::Configuration("EMBEDDING_DIMENSION must be a positive integer".to_string())
            })?,
            Err(_) => 768,
        };

        let timeout_secs = match env::var("QDRANT_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                RagError::Configuration("QDRANT_TIMEOUT_SECS must be a positive integer".to_string())
            })?,
            Err(_) => 30,
        };

        Ok(QdrantConfig {
            url,
            api_key,
            collection,
            dimension,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// A chunk together with its vector, as persisted in the store.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub chunk_id: String,
    pub vector: Vec<f32>,
    /// Denormalized copy kept in the payload for retrieval display.
    pub chunk: Chunk,
}

/// A retrieved chunk with its similarity score (cosine, higher is better).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Optional metadata predicate pushed down to the store.
#[derive(Debug, Clone, Copy)]
pub struct SearchFilter {
    pub source_type: SourceType,
}

impl SearchFilter {
    fn to_qdrant(self) -> Filter {
        Filter::must([Condition::matches(
            "source_type",
            self.source_type.as_str().to_string(),
        )])
    }
}

/// Adapter owning the physical vector index behind a uniform interface.
pub struct VectorStore {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl VectorStore {
    /// Connect to Qdrant and make sure the collection exists with the
    /// configured dimension.
    pub async fn connect(config: QdrantConfig) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url).timeout(config.timeout);
        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }
        let client = builder
            .build()
            .map_err(|e| RagError::Configuration(format!("invalid QDRANT_URL: {}", e)))?;

        let store = VectorStore {
            client,
            collection: config.collection,
            dimension: config.dimension,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => {
                if let Some(existing) = configured_dimension(&info) {
                    if existing != self.dimension {
                        return Err(RagError::Configuration(format!(
                            "collection {} has dimension {} but EMBEDDING_DIMENSION is {}",
                            self.collection, existing, self.dimension
                        )));
                    }
                }
                debug!("Using existing collection {}", self.collection);
                Ok(())
            }
            Err(QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                info!(
                    "Creating collection {} (dimension {})",
                    self.collection, self.dimension
                );
                let create = CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
                    VectorParams {
                        size: self.dimension,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    },
                );
                self.client
                    .create_collection(create)
                    .await
                    .map_err(store_error)?;
                Ok(())
            }
            Err(e) => Err(store_error(e)),
        }
    }

    /// Replace all records for a document, then insert the new ones.
    ///
    /// Deleting by `document_id` first makes re-ingestion idempotent: the
    /// same document ingested twice leaves exactly one set of chunks.
    pub async fn upsert(&self, records: Vec<EmbeddingRecord>, document_id: &str) -> Result<usize> {
        check_dimension(&records, self.dimension)?;

        self.client
            .delete_points(
                DeletePointsBuilder::new(self.collection.clone())
                    .points(Filter::must([Condition::matches(
                        "document_id",
                        document_id.to_string(),
                    )]))
                    .wait(true),
            )
            .await
            .map_err(store_error)?;

        if records.is_empty() {
            return Ok(0);
        }

        let written = records.len();
        let points: Vec<PointStruct> = records
            .into_iter()
            .map(|record| {
                PointStruct::new(
                    Uuid::new_v4().to_string(),
                    record.vector,
                    chunk_payload(&record.chunk),
                )
            })
            .collect();

        self.client
            .upsert_points(
                UpsertPointsBuilder::new(self.collection.clone(), points)
                    .wait(true)
                    .build(),
            )
            .await
            .map_err(store_error)?;

        debug!("Upserted {} points for document {}", written, document_id);
        Ok(written)
    }

    /// Nearest-neighbor search, at most `top_k` results, descending score.
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        top_k: u64,
        filter: Option<SearchFilter>,
    ) -> Result<Vec<ScoredChunk>> {
        let search_request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: query_vector,
            limit: top_k,
            filter: filter.map(SearchFilter::to_qdrant),
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let response = self
            .client
            .search_points(search_request)
            .await
            .map_err(store_error)?;

        let results = response
            .result
            .into_iter()
            .filter_map(|point| {
                let chunk = chunk_from_payload(&point.payload)?;
                Some(ScoredChunk {
                    chunk,
                    score: point.score,
                })
            })
            .collect();

        Ok(order_results(results))
    }
}

/// Qdrant failures surface as store unavailability; the query pipeline
/// degrades instead of failing outright.
fn store_error(e: QdrantError) -> RagError {
    RagError::RetrievalUnavailable(e.to_string())
}

/// A record whose vector length disagrees with the index dimension is a
/// fatal configuration error, never silently truncated.
fn check_dimension(records: &[EmbeddingRecord], dimension: u64) -> Result<()> {
    for record in records {
        if record.vector.len() as u64 != dimension {
            return Err(RagError::Configuration(format!(
                "embedding for chunk {} has dimension {} but the index expects {}",
                record.chunk_id,
                record.vector.len(),
                dimension
            )));
        }
    }
    Ok(())
}

/// Stable descending order by score; insertion order breaks ties.
fn order_results(mut results: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

fn chunk_payload(chunk: &Chunk) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("text".to_string(), chunk.text.clone().into());
    payload.insert("chunk_id".to_string(), chunk.id.clone().into());
    payload.insert("document_id".to_string(), chunk.document_id.clone().into());
    payload.insert("ordinal".to_string(), (chunk.ordinal as i64).into());
    payload.insert("char_start".to_string(), (chunk.char_start as i64).into());
    payload.insert("char_end".to_string(), (chunk.char_end as i64).into());
    for (key, value) in &chunk.metadata {
        payload.insert(key.clone(), value.clone().into());
    }
    payload
}

fn chunk_from_payload(payload: &HashMap<String, Value>) -> Option<Chunk> {
    let text = payload.get("text")?.as_str()?.to_string();
    let id = payload.get("chunk_id")?.as_str()?.to_string();
    let document_id = payload.get("document_id")?.as_str()?.to_string();
    let ordinal = payload.get("ordinal").and_then(|v| v.as_integer()).unwrap_or(0) as usize;
    let char_start = payload
        .get("char_start")
        .and_then(|v| v.as_integer())
        .unwrap_or(0) as usize;
    let char_end = payload
        .get("char_end")
        .and_then(|v| v.as_integer())
        .unwrap_or(0) as usize;

    let mut metadata = HashMap::new();
    for (key, value) in payload {
        match key.as_str() {
            "text" | "chunk_id" | "document_id" | "ordinal" | "char_start" | "char_end" => {}
            _ => {
                if let Some(s) = value.as_str() {
                    metadata.insert(key.clone(), s.to_string());
                }
            }
        }
    }

    Some(Chunk {
        id,
        document_id,
        text,
        ordinal,
        char_start,
        char_end,
        metadata,
    })
}

fn configured_dimension(info: &GetCollectionInfoResponse) -> Option<u64> {
    let params = match info
        .result
        .as_ref()?
        .config
        .as_ref()?
        .params
        .as_ref()?
        .vectors_config
        .as_ref()?
        .config
        .as_ref()?
    {
        vectors_config::Config::Params(params) => params,
        vectors_config::Config::ParamsMap(_) => return None,
    };
    Some(params.size)
}
