//! Document loading and chunking
//!
//! Turns files on disk into normalized text sections and splits those into
//! overlapping, size-bounded chunks ready for embedding.

mod chunker;
pub mod loader;

pub use chunker::{SEPARATORS, TextChunker, TextSpan};
pub use loader::{
    DocumentFormat, LoadedDocument, Section, extract_pdf_to_markdown, load_document,
    normalize_text,
};

use crate::types::Metadata;

/// A piece of a document ready for embedding
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    /// The chunk text
    pub content: String,
    /// Section metadata plus chunk position and offset
    pub metadata: Metadata,
}

/// Chunk every section of a loaded document, numbering chunks across sections
pub fn chunk_document(document: &LoadedDocument, chunker: &TextChunker) -> Vec<DocumentChunk> {
    use crate::types::metadata_keys;

    let mut chunks = Vec::new();
    for section in &document.sections {
        for span in chunker.split_spans(&section.text) {
            let mut metadata = section.metadata.clone();
            metadata.insert(metadata_keys::POSITION.to_string(), chunks.len().into());
            metadata.insert(metadata_keys::START_OFFSET.to_string(), span.start.into());
            metadata.insert(
                metadata_keys::FORMAT.to_string(),
                document.format.as_str().into(),
            );
            chunks.push(DocumentChunk {
                content: span.text,
                metadata,
            });
        }
    }
    chunks
}
