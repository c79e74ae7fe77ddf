
use crate::QaError;
use crate::embeddings::{DocumentChunk, Embedder};
use crate::retrieval::{ChunkSearch, RetrievedChunk};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TABLE_NAME: &str = "chunks";

/// On-disk LanceDB index of embedded chunks, bound to the embedder used for queries
pub struct VectorIndex {
    path: PathBuf,
    table: Table,
    dimension: usize,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for VectorIndex {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .field("embedder", &self.embedder.model_name())
            .finish()
    }
}

impl VectorIndex {
    /// Create a fresh index at `path` from chunks and their vectors
    ///
    /// Rows are written to a staging directory next to `path`, which is renamed into
    /// place once the table is complete. Fails if `path` already exists.
    #[inline]
    pub async fn build(
        path: &Path,
        dimension: usize,
        chunks: &[DocumentChunk],
        vectors: &[Vec<f32>],
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, QaError> {
        if path.exists() {
            return Err(QaError::Index(format!(
                "Index already exists at {}",
                path.display()
            )));
        }
        if dimension == 0 {
            return Err(QaError::Index("Vector dimension must be positive".to_string()));
        }
        if chunks.len() != vectors.len() {
            return Err(QaError::Index(format!(
                "Mismatch between chunk and vector counts: {} vs {}",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(QaError::Index(format!(
                "Vector dimension mismatch: expected {}, got {}",
                dimension,
                bad.len()
            )));
        }

        let staging = staging_path(path);
        info!(
            "Building index with {} chunks ({} dimensions) in {}",
            chunks.len(),
            dimension,
            staging.display()
        );

        if let Err(e) = write_table(&staging, dimension, chunks, vectors).await {
            if staging.exists() {
                remove_staging(&staging);
            }
            return Err(e);
        }

        std::fs::rename(&staging, path).map_err(|e| {
            remove_staging(&staging);
            QaError::Index(format!(
                "Failed to move index into place at {}: {}",
                path.display(),
                e
            ))
        })?;

        info!("Index written to {}", path.display());
        Self::open(path, embedder).await
    }

    /// Reopen a previously built index for querying with `embedder`
    #[inline]
    pub async fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, QaError> {
        if !path.is_dir() {
            return Err(QaError::Index(format!(
                "No index found at {}",
                path.display()
            )));
        }

        let connection = connect(path).await?;
        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to open table: {}", e)))?;
        let dimension = detect_vector_dimension(&table).await?;

        debug!(
            "Opened index at {} ({} dimensions, embedder {})",
            path.display(),
            dimension,
            embedder.model_name()
        );

        Ok(Self {
            path: path.to_path_buf(),
            table,
            dimension,
            embedder,
        })
    }

    /// Embed `text` and return the `k` nearest chunks, nearest first
    #[inline]
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedChunk>, QaError> {
        let vector = self
            .embedder
            .embed(text)
            .map_err(|e| QaError::Embedding(format!("Failed to embed query: {:#}", e)))?;
        self.query_vector(&vector, k).await
    }

    /// Return the `k` chunks nearest to `vector` by L2 distance
    #[inline]
    pub async fn query_vector(
        &self,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, QaError> {
        if k == 0 || self.is_empty().await? {
            return Ok(Vec::new());
        }
        if vector.len() != self.dimension {
            return Err(QaError::Index(format!(
                "Query vector dimension mismatch: index has {}, query has {}",
                self.dimension,
                vector.len()
            )));
        }

        debug!("Searching for {} nearest chunks", k);

        let results = self
            .table
            .vector_search(vector)
            .map_err(|e| QaError::Index(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::L2)
            .limit(k)
            .execute()
            .await
            .map_err(|e| QaError::Index(format!("Failed to execute search: {}", e)))?;

        let mut hits = parse_search_results_stream(results).await?;
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    /// Number of stored chunks
    #[inline]
    pub async fn len(&self) -> Result<usize, QaError> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Index(format!("Failed to count rows: {}", e)))
    }

    #[inline]
    pub async fn is_empty(&self) -> Result<bool, QaError> {
        Ok(self.len().await? == 0)
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChunkSearch for VectorIndex {
    #[inline]
    async fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
        Ok(self.query(query, k).await?)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".staging-{}", uuid::Uuid::new_v4()));
    path.with_file_name(name)
}

fn remove_staging(staging: &Path) {
    if let Err(e) = std::fs::remove_dir_all(staging) {
        warn!(
            "Failed to remove staging directory {}: {}",
            staging.display(),
            e
        );
    }
}

async fn connect(path: &Path) -> Result<Connection, QaError> {
    let uri = path.to_string_lossy();
    lancedb::connect(&uri)
        .execute()
        .await
        .map_err(|e| QaError::Index(format!("Failed to connect to LanceDB: {}", e)))
}

async fn write_table(
    path: &Path,
    dimension: usize,
    chunks: &[DocumentChunk],
    vectors: &[Vec<f32>],
) -> Result<(), QaError> {
    std::fs::create_dir_all(path)
        .map_err(|e| QaError::Index(format!("Failed to create index directory: {}", e)))?;

    let connection = connect(path).await?;
    let schema = create_schema(dimension);
    let table = connection
        .create_empty_table(TABLE_NAME, schema)
        .execute()
        .await
        .map_err(|e| QaError::Index(format!("Failed to create table: {}", e)))?;

    if chunks.is_empty() {
        warn!("No chunks to index, created an empty table");
        return Ok(());
    }

    let record_batch = create_record_batch(dimension, chunks, vectors)?;
    let schema = record_batch.schema();
    let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
    table
        .add(reader)
        .execute()
        .await
        .map_err(|e| QaError::Index(format!("Failed to insert chunks: {}", e)))?;

    info!("Stored {} chunks", chunks.len());
    Ok(())
}

fn create_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(
    dimension: usize,
    chunks: &[DocumentChunk],
    vectors: &[Vec<f32>],
) -> Result<RecordBatch, QaError> {
    let created_at = Utc::now().to_rfc3339();

    let chunk_indices = chunks
        .iter()
        .map(|c| u32::try_from(c.chunk_index))
        .collect::<Result<Vec<u32>, _>>()
        .map_err(|e| QaError::Index(format!("Chunk index out of range: {}", e)))?;

    let flat_values: Vec<f32> = vectors.iter().flatten().copied().collect();
    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        dimension as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| QaError::Index(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.id.as_str()))),
        Arc::new(vector_array),
        Arc::new(StringArray::from_iter_values(
            chunks.iter().map(|c| c.content.as_str()),
        )),
        Arc::new(StringArray::from_iter_values(
            chunks.iter().map(|c| c.source.as_str()),
        )),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from_iter_values(
            std::iter::repeat_n(created_at.as_str(), chunks.len()),
        )),
    ];

    RecordBatch::try_new(create_schema(dimension), arrays)
        .map_err(|e| QaError::Index(format!("Failed to create record batch: {}", e)))
}

async fn detect_vector_dimension(table: &Table) -> Result<usize, QaError> {
    let schema = table
        .schema()
        .await
        .map_err(|e| QaError::Index(format!("Failed to get table schema: {}", e)))?;

    for field in schema.fields() {
        if field.name() == "vector" {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                return Ok(*size as usize);
            }
        }
    }

    Err(QaError::Index(
        "Could not find vector column or determine dimension".to_string(),
    ))
}

async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<RetrievedChunk>, QaError> {
    let mut hits = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| QaError::Index(format!("Failed to read result stream: {}", e)))?
    {
        hits.extend(parse_search_batch(&batch)?);
    }

    debug!("Parsed {} search results from stream", hits.len());
    Ok(hits)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, QaError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| QaError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| QaError::Index(format!("Invalid {} column type", name)))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>, QaError> {
    let ids = string_column(batch, "id")?;
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| QaError::Index("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| QaError::Index("Invalid chunk_index column type".to_string()))?;
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    Ok((0..batch.num_rows())
        .map(|row| RetrievedChunk {
            chunk: DocumentChunk {
                id: ids.value(row).to_string(),
                source: sources.value(row).to_string(),
                chunk_index: chunk_indices.value(row) as usize,
                content: contents.value(row).to_string(),
            },
            distance: distances
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) }),
        })
        .collect())
}
