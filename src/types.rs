use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Ordered key -> value metadata attached to every chunk
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Well-known metadata keys written by the ingestion pipeline
pub mod metadata_keys {
    /// Path of the ingested document; distinct values define a collection's document count
    pub const SOURCE: &str = "source";
    pub const FILENAME: &str = "filename";
    /// Index of the chunk within its document
    pub const POSITION: &str = "position";
    pub const CREATED_AT: &str = "created_at";
    pub const DOCUMENT_ID: &str = "document_id";
    /// Character offset of the chunk within its section
    pub const START_OFFSET: &str = "start_offset";
    pub const FORMAT: &str = "format";
}

/// A bounded span of document text plus its embedding and metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    /// Owning collection; assigned by the store on write
    pub collection: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: Metadata,
    /// Insertion sequence within the collection; assigned by the store on write
    #[serde(default)]
    pub sequence: u64,
}

impl Chunk {
    /// Build a chunk that has not been written yet
    pub fn new(id: impl Into<String>, text: impl Into<String>, vector: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            collection: String::new(),
            text: text.into(),
            vector,
            metadata,
            sequence: 0,
        }
    }

    /// The `source` metadata value, if present
    pub fn source(&self) -> Option<&str> {
        self.metadata
            .get(metadata_keys::SOURCE)
            .and_then(|v| v.as_str())
    }
}

/// Summary of one collection with derived counts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Number of distinct `source` values
    pub document_count: usize,
    pub chunk_count: usize,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Result of an explicit create call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Lifecycle of one document's ingestion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Pending,
    Processing,
    Indexed,
    Failed,
}

impl IngestionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, IngestionStatus::Indexed | IngestionStatus::Failed)
    }

    /// Allowed moves: pending -> processing -> indexed | failed, plus pending -> failed
    pub fn can_transition_to(self, next: IngestionStatus) -> bool {
        matches!(
            (self, next),
            (IngestionStatus::Pending, IngestionStatus::Processing)
                | (IngestionStatus::Pending, IngestionStatus::Failed)
                | (IngestionStatus::Processing, IngestionStatus::Indexed)
                | (IngestionStatus::Processing, IngestionStatus::Failed)
        )
    }
}

impl std::fmt::Display for IngestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Processing => "processing",
            IngestionStatus::Indexed => "indexed",
            IngestionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of ingesting one document
///
/// Only the ingestion pipeline moves a report through its states; callers
/// observe it through the accessors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionReport {
    document_id: String,
    filename: String,
    collection: String,
    status: IngestionStatus,
    chunk_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IngestionReport {
    pub(crate) fn new(
        document_id: impl Into<String>,
        filename: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            filename: filename.into(),
            collection: collection.into(),
            status: IngestionStatus::Pending,
            chunk_count: 0,
            error: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn status(&self) -> IngestionStatus {
        self.status
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn begin(&mut self) {
        self.transition(IngestionStatus::Processing);
    }

    pub(crate) fn complete(&mut self, chunk_count: usize) {
        if self.transition(IngestionStatus::Indexed) {
            self.chunk_count = chunk_count;
        }
    }

    pub(crate) fn fail(&mut self, error: impl std::fmt::Display) {
        if self.transition(IngestionStatus::Failed) {
            self.chunk_count = 0;
            self.error = Some(error.to_string());
        }
    }

    fn transition(&mut self, next: IngestionStatus) -> bool {
        if self.status.can_transition_to(next) {
            self.status = next;
            true
        } else {
            tracing::warn!(
                "Ignoring ingestion report transition {} -> {} for {}",
                self.status,
                next,
                self.document_id
            );
            false
        }
    }
}

/// Per-call ingestion options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Remove chunks previously ingested from the same source before adding
    #[serde(default)]
    pub overwrite_existing: bool,
}

/// Equality predicate over chunk metadata; every condition must hold
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, serde_json::Value>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata[key] == value`
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }
}

/// Request to query a collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question or search query
    pub query: String,
    pub collection_name: String,
    /// Number of chunks to return (default: 5)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Enable hybrid search (vector + keyword) - default: true
    #[serde(default = "default_hybrid")]
    pub hybrid: bool,
    #[serde(default)]
    pub filter: Option<MetadataFilter>,
}

fn default_top_k() -> usize {
    5
}

fn default_hybrid() -> bool {
    true
}

impl QueryRequest {
    pub fn new(query: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            collection_name: collection_name.into(),
            top_k: default_top_k(),
            hybrid: default_hybrid(),
            filter: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn with_filter(mut self, filter: MetadataFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// One retrieved chunk with its provenance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub text: String,
    pub metadata: Metadata,
    /// Fused score in [0, 1]
    pub score: f32,
    /// Normalized vector similarity in [0, 1]
    pub vector_score: f32,
    /// Normalized BM25 score in [0, 1] - only present in hybrid search
    pub lexical_score: Option<f32>,
}

/// Ranked answer to one query; produced fresh per call and never persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    pub query: String,
    /// Chunk texts, ordered like `sources`
    pub contexts: Vec<String>,
    /// Sources ordered by descending score
    pub sources: Vec<Source>,
    pub elapsed: Duration,
}

impl RetrievalResult {
    /// Build a result from ranked sources, keeping contexts aligned with them
    pub fn from_sources(query: impl Into<String>, sources: Vec<Source>, elapsed: Duration) -> Self {
        let contexts = sources.iter().map(|s| s.text.clone()).collect();
        Self {
            query: query.into(),
            contexts,
            sources,
            elapsed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Render contexts as numbered document blocks for a model prompt
    pub fn format_context(&self) -> String {
        let mut context = String::from("Relevant information for answering the question:\n\n");
        for (i, ctx) in self.contexts.iter().enumerate() {
            context.push_str(&format!("---DOCUMENT {}---\n{}\n\n", i + 1, ctx));
        }
        context
    }

    /// Render sources as `Source i [filename]: text` lines
    pub fn format_sources(&self) -> String {
        let mut out = String::new();
        for (i, source) in self.sources.iter().enumerate() {
            let name = source
                .metadata
                .get(metadata_keys::FILENAME)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Source {}", i + 1));
            out.push_str(&format!("Source {} [{}]: {}\n\n", i + 1, name, source.text));
        }
        out
    }
}

#[cfg(test)]
mod tests;
