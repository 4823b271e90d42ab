//! LanceDB collection store
//!
//! Each collection is one Lance table under `<data_dir>/lancedb`; descriptive
//! metadata lives in `<data_dir>/catalog.json`. Every write is a single Lance
//! commit issued while holding the collection's write lock, and readers take
//! the read lock, so a snapshot never observes a half-applied write.

use crate::error::{RagError, StorageError};
use crate::types::{Chunk, CollectionInfo, CreateOutcome, Metadata};
use crate::vector_db::catalog::{CATALOG_FILE, Catalog};
use crate::vector_db::{CollectionSnapshot, CollectionStore, validate_collection_name};
use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt64Array, types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Per-collection lock guarding the write generation counter
type Partition = Arc<RwLock<u64>>;

/// LanceDB-backed collection store (embedded, no server required)
pub struct LanceCollectionStore {
    connection: Connection,
    db_path: PathBuf,
    catalog_path: PathBuf,
    catalog: Mutex<Catalog>,
    /// Entries are never removed so generations stay monotonic per name
    partitions: RwLock<HashMap<String, Partition>>,
    dimension: usize,
}

fn storage_err(err: anyhow::Error) -> RagError {
    StorageError::Failure(format!("{:#}", err)).into()
}

impl LanceCollectionStore {
    /// Open (or create) the store rooted at `data_dir`
    pub async fn open(data_dir: &Path, dimension: usize) -> Result<Self, RagError> {
        let db_path = data_dir.join("lancedb");
        std::fs::create_dir_all(&db_path)
            .context("Failed to create LanceDB directory")
            .map_err(storage_err)?;

        tracing::info!("Connecting to LanceDB at: {}", db_path.display());

        let connection = lancedb::connect(&db_path.to_string_lossy())
            .execute()
            .await
            .context("Failed to connect to LanceDB")
            .map_err(storage_err)?;

        let catalog_path = data_dir.join(CATALOG_FILE);
        let catalog = match Catalog::load(&catalog_path) {
            Ok(catalog) => catalog,
            Err(e) => {
                // Descriptions and timestamps only; tables stay authoritative
                tracing::warn!("Ignoring unreadable catalog {:?}: {:#}", catalog_path, e);
                Catalog::default()
            }
        };

        Ok(Self {
            connection,
            db_path,
            catalog_path,
            catalog: Mutex::new(catalog),
            partitions: RwLock::new(HashMap::new()),
            dimension,
        })
    }

    /// Directory holding the Lance tables
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Create schema for a collection table
    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("seq", DataType::UInt64, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
        ]))
    }

    async fn partition(&self, name: &str) -> Partition {
        if let Some(partition) = self.partitions.read().await.get(name) {
            return partition.clone();
        }
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(0)))
            .clone()
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")
    }

    async fn open_table(&self, name: &str) -> Result<Option<Table>> {
        if !self.table_names().await?.iter().any(|t| t == name) {
            return Ok(None);
        }
        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table '{}'", name))?;
        Ok(Some(table))
    }

    async fn create_table(&self, name: &str) -> Result<Table> {
        let schema = Self::create_schema(self.dimension);
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema);

        let table = self
            .connection
            .create_table(name, Box::new(batches))
            .execute()
            .await
            .with_context(|| format!("Failed to create table '{}'", name))?;

        tracing::info!("Created collection '{}'", name);
        Ok(table)
    }

    async fn open_or_create_table(&self, name: &str) -> Result<Table, RagError> {
        let table = match self.open_table(name).await.map_err(storage_err)? {
            Some(table) => table,
            None => self.create_table(name).await.map_err(storage_err)?,
        };
        self.check_table_dimension(name, &table).await?;
        Ok(table)
    }

    /// Fail if the table's vector column was written with another dimension
    async fn check_table_dimension(&self, name: &str, table: &Table) -> Result<(), RagError> {
        let schema = table
            .schema()
            .await
            .context("Failed to read table schema")
            .map_err(storage_err)?;

        if let Ok(field) = schema.field_with_name("vector")
            && let DataType::FixedSizeList(_, width) = field.data_type()
            && *width as usize != self.dimension
        {
            return Err(StorageError::DimensionMismatch {
                collection: name.to_string(),
                expected: self.dimension,
                actual: *width as usize,
            }
            .into());
        }
        Ok(())
    }

    fn check_chunk_dimensions(&self, name: &str, chunks: &[Chunk]) -> Result<(), RagError> {
        if let Some(chunk) = chunks.iter().find(|c| c.vector.len() != self.dimension) {
            return Err(StorageError::DimensionMismatch {
                collection: name.to_string(),
                expected: self.dimension,
                actual: chunk.vector.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Next insertion sequence number (max existing + 1)
    async fn next_seq(table: &Table) -> Result<u64> {
        let batches: Vec<RecordBatch> = table
            .query()
            .select(Select::Columns(vec!["seq".to_string()]))
            .execute()
            .await
            .context("Failed to query sequence numbers")?
            .try_collect()
            .await
            .context("Failed to collect sequence numbers")?;

        let mut next = 0u64;
        for batch in &batches {
            let seq_array = batch
                .column_by_name("seq")
                .context("Missing seq column")?
                .as_any()
                .downcast_ref::<UInt64Array>()
                .context("Invalid seq type")?;
            for i in 0..seq_array.len() {
                next = next.max(seq_array.value(i) + 1);
            }
        }
        Ok(next)
    }

    /// Convert chunks to a RecordBatch, numbering them from `first_seq`
    fn create_record_batch(
        chunks: &[Chunk],
        first_seq: u64,
        dimension: usize,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            chunks
                .iter()
                .map(|c| Some(c.vector.iter().copied().map(Some))),
            dimension as i32,
        );

        let id_array = StringArray::from(chunks.iter().map(|c| c.id.as_str()).collect::<Vec<_>>());
        let seq_array = UInt64Array::from(
            (0..chunks.len() as u64)
                .map(|i| first_seq + i)
                .collect::<Vec<_>>(),
        );
        let source_array = StringArray::from(
            chunks
                .iter()
                .map(|c| c.source().unwrap_or(""))
                .collect::<Vec<_>>(),
        );
        let text_array =
            StringArray::from(chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>());
        let metadata_array = StringArray::from(
            chunks
                .iter()
                .map(|c| serde_json::to_string(&c.metadata))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to serialize chunk metadata")?,
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array),
                Arc::new(seq_array),
                Arc::new(source_array),
                Arc::new(text_array),
                Arc::new(metadata_array),
                Arc::new(vector_array),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    /// Append chunks to an open table as one commit
    async fn append(&self, name: &str, table: &Table, chunks: Vec<Chunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let schema = Self::create_schema(self.dimension);
        let first_seq = Self::next_seq(table).await?;
        let batch = Self::create_record_batch(&chunks, first_seq, self.dimension, schema.clone())?;
        let count = batch.num_rows();

        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);
        table
            .add(Box::new(batches))
            .execute()
            .await
            .with_context(|| format!("Failed to add records to '{}'", name))?;

        tracing::debug!("Appended {} chunks to '{}'", count, name);
        Ok(count)
    }

    /// Swap every row of `source` for `chunks` in a single commit
    ///
    /// Rows of `source` whose id is absent from `chunks` are deleted, matching
    /// ids are overwritten and the rest are inserted. A failed merge leaves the
    /// table at its previous version.
    async fn merge_source(
        &self,
        name: &str,
        table: &Table,
        source: &str,
        chunks: Vec<Chunk>,
    ) -> Result<usize> {
        let schema = Self::create_schema(self.dimension);
        let first_seq = Self::next_seq(table).await?;
        let batch = Self::create_record_batch(&chunks, first_seq, self.dimension, schema.clone())?;
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all()
            .when_not_matched_by_source_delete(Some(source_filter(source)));
        let result = merge
            .execute(Box::new(batches))
            .await
            .with_context(|| format!("Failed to replace chunks of {} in '{}'", source, name))?;

        tracing::debug!(
            "Replaced chunks of {} in '{}': {} inserted, {} updated, {} deleted",
            source,
            name,
            result.num_inserted_rows,
            result.num_updated_rows,
            result.num_deleted_rows
        );
        Ok((result.num_inserted_rows + result.num_updated_rows) as usize)
    }

    /// Decode stored rows back into chunks
    fn batch_to_chunks(&self, name: &str, batch: &RecordBatch) -> Result<Vec<Chunk>, RagError> {
        let corrupt = |reason: String| -> RagError {
            StorageError::CorruptRecord {
                collection: name.to_string(),
                reason,
            }
            .into()
        };

        let id_array = string_column(batch, "id")
            .ok_or_else(|| corrupt("missing or invalid id column".to_string()))?;
        let text_array = string_column(batch, "text")
            .ok_or_else(|| corrupt("missing or invalid text column".to_string()))?;
        let metadata_array = string_column(batch, "metadata")
            .ok_or_else(|| corrupt("missing or invalid metadata column".to_string()))?;
        let seq_array = batch
            .column_by_name("seq")
            .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
            .ok_or_else(|| corrupt("missing or invalid seq column".to_string()))?;
        let vector_array = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| corrupt("missing or invalid vector column".to_string()))?;

        let width = vector_array.value_length() as usize;
        if width != self.dimension {
            return Err(StorageError::DimensionMismatch {
                collection: name.to_string(),
                expected: self.dimension,
                actual: width,
            }
            .into());
        }

        let mut chunks = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let metadata: Metadata = serde_json::from_str(metadata_array.value(i))
                .map_err(|e| corrupt(format!("invalid metadata JSON: {}", e)))?;

            let values = vector_array.value(i);
            let floats = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| corrupt("vector items are not f32".to_string()))?;

            chunks.push(Chunk {
                id: id_array.value(i).to_string(),
                collection: name.to_string(),
                text: text_array.value(i).to_string(),
                vector: floats.values().to_vec(),
                metadata,
                sequence: seq_array.value(i),
            });
        }
        Ok(chunks)
    }

    async fn record_write(&self, name: &str) {
        let mut catalog = self.catalog.lock().await;
        catalog.touch(name);
        if let Err(e) = catalog.save(&self.catalog_path) {
            tracing::warn!("Failed to update catalog for '{}': {:#}", name, e);
        }
    }
}

fn string_column<'a>(batch: &'a RecordBatch, column: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(column)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

/// Merging keys on the chunk id, so a batch may not repeat one
fn check_unique_ids(chunks: &[Chunk]) -> Result<(), RagError> {
    let mut seen = HashSet::with_capacity(chunks.len());
    if let Some(chunk) = chunks.iter().find(|c| !seen.insert(c.id.as_str())) {
        return Err(StorageError::Failure(format!("duplicate chunk id '{}'", chunk.id)).into());
    }
    Ok(())
}

/// SQL predicate selecting every row of `source`
fn source_filter(source: &str) -> String {
    format!("source = '{}'", source.replace('\'', "''"))
}

#[async_trait::async_trait]
impl CollectionStore for LanceCollectionStore {
    async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<CreateOutcome, RagError> {
        validate_collection_name(name)?;
        let partition = self.partition(name).await;
        let mut generation = partition.write().await;

        if self.open_table(name).await.map_err(storage_err)?.is_some() {
            tracing::debug!("Collection '{}' already exists", name);
            return Ok(CreateOutcome::AlreadyExists);
        }

        self.create_table(name).await.map_err(storage_err)?;
        *generation += 1;

        let mut catalog = self.catalog.lock().await;
        catalog.remove(name);
        catalog.register(name, description);
        if let Err(e) = catalog.save(&self.catalog_path) {
            tracing::warn!("Failed to update catalog for '{}': {:#}", name, e);
        }

        Ok(CreateOutcome::Created)
    }

    async fn add(&self, name: &str, chunks: Vec<Chunk>) -> Result<usize, RagError> {
        validate_collection_name(name)?;
        self.check_chunk_dimensions(name, &chunks)?;

        let partition = self.partition(name).await;
        let mut generation = partition.write().await;

        let table = self.open_or_create_table(name).await?;
        let count = self
            .append(name, &table, chunks)
            .await
            .map_err(storage_err)?;

        *generation += 1;
        drop(generation);
        self.record_write(name).await;

        Ok(count)
    }

    async fn replace_source(
        &self,
        name: &str,
        source: &str,
        chunks: Vec<Chunk>,
    ) -> Result<usize, RagError> {
        validate_collection_name(name)?;
        self.check_chunk_dimensions(name, &chunks)?;
        check_unique_ids(&chunks)?;

        let partition = self.partition(name).await;
        let mut generation = partition.write().await;

        let table = self.open_or_create_table(name).await?;
        let count = self
            .merge_source(name, &table, source, chunks)
            .await
            .map_err(storage_err)?;

        *generation += 1;
        drop(generation);
        self.record_write(name).await;

        Ok(count)
    }

    async fn delete_source(&self, name: &str, source: &str) -> Result<usize, RagError> {
        if validate_collection_name(name).is_err() {
            return Err(StorageError::CollectionNotFound(name.to_string()).into());
        }
        let partition = self.partition(name).await;
        let mut generation = partition.write().await;

        let table = self
            .open_table(name)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| StorageError::CollectionNotFound(name.to_string()))?;

        let filter = source_filter(source);
        let removed = table
            .count_rows(Some(filter.clone()))
            .await
            .context("Failed to count rows")
            .map_err(storage_err)?;

        if removed > 0 {
            table
                .delete(&filter)
                .await
                .context("Failed to delete records")
                .map_err(storage_err)?;
            *generation += 1;
            drop(generation);
            self.record_write(name).await;
            tracing::info!("Deleted {} chunks of {} from '{}'", removed, source, name);
        }

        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<CollectionInfo>, RagError> {
        let mut names = self.table_names().await.map_err(storage_err)?;
        names.retain(|n| validate_collection_name(n).is_ok());
        names.sort();

        let mut infos = Vec::with_capacity(names.len());
        for name in names {
            let partition = self.partition(&name).await;
            let _guard = partition.read().await;

            // Dropped concurrently between listing and opening
            let Some(table) = self.open_table(&name).await.map_err(storage_err)? else {
                continue;
            };

            let batches: Vec<RecordBatch> = table
                .query()
                .select(Select::Columns(vec!["source".to_string()]))
                .execute()
                .await
                .context("Failed to query sources")
                .map_err(storage_err)?
                .try_collect()
                .await
                .context("Failed to collect sources")
                .map_err(storage_err)?;

            let mut sources = HashSet::new();
            let mut chunk_count = 0usize;
            for batch in &batches {
                let source_array =
                    string_column(batch, "source").ok_or_else(|| StorageError::CorruptRecord {
                        collection: name.clone(),
                        reason: "missing or invalid source column".to_string(),
                    })?;
                chunk_count += source_array.len();
                for i in 0..source_array.len() {
                    sources.insert(source_array.value(i).to_string());
                }
            }

            let catalog = self.catalog.lock().await;
            let entry = catalog.get(&name);
            infos.push(CollectionInfo {
                description: entry.and_then(|e| e.description.clone()),
                created_at: entry.map(|e| e.created_at.clone()),
                last_updated: entry.map(|e| e.last_updated.clone()),
                document_count: sources.len(),
                chunk_count,
                name,
            });
        }

        Ok(infos)
    }

    async fn delete(&self, name: &str) -> Result<bool, RagError> {
        // No collection can exist under an invalid name
        if validate_collection_name(name).is_err() {
            return Ok(false);
        }
        let partition = self.partition(name).await;
        let mut generation = partition.write().await;

        if self.open_table(name).await.map_err(storage_err)?.is_none() {
            return Ok(false);
        }

        self.connection
            .drop_table(name, &[])
            .await
            .with_context(|| format!("Failed to drop table '{}'", name))
            .map_err(storage_err)?;
        *generation += 1;

        let mut catalog = self.catalog.lock().await;
        catalog.remove(name);
        if let Err(e) = catalog.save(&self.catalog_path) {
            tracing::warn!("Failed to update catalog after deleting '{}': {:#}", name, e);
        }

        tracing::info!("Deleted collection '{}'", name);
        Ok(true)
    }

    async fn snapshot(&self, name: &str) -> Result<CollectionSnapshot, RagError> {
        if validate_collection_name(name).is_err() {
            return Err(StorageError::CollectionNotFound(name.to_string()).into());
        }
        let partition = self.partition(name).await;
        let generation = partition.read().await;

        let table = self
            .open_table(name)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| StorageError::CollectionNotFound(name.to_string()))?;
        self.check_table_dimension(name, &table).await?;

        let batches: Vec<RecordBatch> = table
            .query()
            .execute()
            .await
            .context("Failed to query collection")
            .map_err(storage_err)?
            .try_collect()
            .await
            .context("Failed to collect collection rows")
            .map_err(storage_err)?;

        let mut chunks = Vec::new();
        for batch in &batches {
            chunks.extend(self.batch_to_chunks(name, batch)?);
        }
        chunks.sort_by_key(|c| c.sequence);

        tracing::debug!(
            "Snapshot of '{}' at generation {}: {} chunks",
            name,
            *generation,
            chunks.len()
        );

        Ok(CollectionSnapshot {
            name: name.to_string(),
            generation: *generation,
            chunks,
        })
    }

    async fn exists(&self, name: &str) -> Result<bool, RagError> {
        if validate_collection_name(name).is_err() {
            return Ok(false);
        }
        let partition = self.partition(name).await;
        let _guard = partition.read().await;
        Ok(self.open_table(name).await.map_err(storage_err)?.is_some())
    }

    async fn generation(&self, name: &str) -> u64 {
        let partition = self.partitions.read().await.get(name).cloned();
        match partition {
            Some(partition) => *partition.read().await,
            None => 0,
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
