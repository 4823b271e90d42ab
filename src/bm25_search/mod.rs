use anyhow::{Context, Result};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, doc};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// In-memory BM25 index over the chunk texts of one collection snapshot
///
/// Documents are identified by their position in the slice the index was
/// built from, so scores line up with the snapshot's chunk order. The index
/// is never mutated after construction; a changed collection gets a new one.
pub struct LexicalIndex {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    content_field: Field,
    len: usize,
}

/// Search result from BM25
#[derive(Debug, Clone, PartialEq)]
pub struct BM25Result {
    /// Position of the chunk in the indexed snapshot
    pub id: u64,
    pub score: f32,
}

impl LexicalIndex {
    /// Build an index over `texts`, in order
    pub fn build<'a, I>(texts: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut schema_builder = Schema::builder();
        let id_field = schema_builder.add_u64_field("id", STORED | INDEXED);
        let content_field = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);

        // Single thread keeps document order stable
        let mut index_writer: IndexWriter<TantivyDocument> = index
            .writer_with_num_threads(1, WRITER_MEMORY_BUDGET)
            .context("Failed to create index writer")?;

        let mut len = 0usize;
        for (position, text) in texts.into_iter().enumerate() {
            index_writer
                .add_document(doc!(
                    id_field => position as u64,
                    content_field => text,
                ))
                .context("Failed to add document")?;
            len += 1;
        }

        index_writer
            .commit()
            .context("Failed to commit documents")?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .context("Failed to create index reader")?;

        tracing::debug!("Built lexical index over {} chunks", len);

        Ok(Self {
            index,
            reader,
            id_field,
            content_field,
            len,
        })
    }

    /// Number of indexed chunks
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Search the index with BM25 scoring, best first
    pub fn search(&self, query_text: &str, limit: usize) -> Result<Vec<BM25Result>> {
        if limit == 0 || self.is_empty() || query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        // Lenient parsing: user questions routinely contain ':' '?' '(' etc.
        let query_parser = QueryParser::for_index(&self.index, vec![self.content_field]);
        let (query, _errors) = query_parser.parse_query_lenient(query_text);

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .context("Failed to execute search")?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher
                .doc(doc_address)
                .context("Failed to retrieve document")?;

            if let Some(id_value) = retrieved_doc.get_first(self.id_field)
                && let Some(id) = id_value.as_u64()
            {
                results.push(BM25Result { id, score });
            }
        }

        Ok(results)
    }

    /// BM25 score of every indexed chunk, by position; non-matching chunks score 0
    pub fn score_all(&self, query_text: &str) -> Result<Vec<f32>> {
        let mut scores = vec![0.0f32; self.len];
        for result in self.search(query_text, self.len)? {
            if let Some(slot) = scores.get_mut(result.id as usize) {
                *slot = result.score;
            }
        }
        Ok(scores)
    }
}

impl std::fmt::Debug for LexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalIndex").field("len", &self.len).finish()
    }
}
