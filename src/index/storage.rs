// On-disk layout of a persisted index:
//   <location>/metadata.json   IndexMetadata as JSON
//   <location>/chunks.arrow    Arrow IPC file, one row per chunk

use arrow::array::{Array, FixedSizeListArray, Float32Array, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, warn};

use super::{EmbeddedChunk, INDEX_FORMAT_VERSION, IndexMetadata};
use crate::embeddings::Chunk;
use crate::{RagError, Result};

pub(super) const METADATA_FILE: &str = "metadata.json";
pub(super) const CHUNKS_FILE: &str = "chunks.arrow";

fn storage_error(context: &str, error: impl std::fmt::Display) -> RagError {
    RagError::Storage(format!("{}: {}", context, error))
}

fn chunk_schema(dimension: usize) -> Result<Arc<Schema>> {
    let width = i32::try_from(dimension)
        .map_err(|_| RagError::Storage(format!("dimension {} is too large", dimension)))?;

    Ok(Arc::new(Schema::new(vec![
        Field::new("text", DataType::Utf8, false),
        Field::new("source_index", DataType::UInt32, false),
        Field::new("overlap", DataType::UInt32, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                width,
            ),
            false,
        ),
    ])))
}

fn to_u32(value: usize, column: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| RagError::Storage(format!("{} value {} does not fit in u32", column, value)))
}

fn record_batch(schema: Arc<Schema>, dimension: usize, entries: &[EmbeddedChunk]) -> Result<RecordBatch> {
    let texts: Vec<&str> = entries.iter().map(|e| e.chunk.text.as_str()).collect();
    let source_indices = entries
        .iter()
        .map(|e| to_u32(e.chunk.source_index, "source_index"))
        .collect::<Result<Vec<_>>>()?;
    let overlaps = entries
        .iter()
        .map(|e| to_u32(e.chunk.overlap, "overlap"))
        .collect::<Result<Vec<_>>>()?;

    let mut flat_values = Vec::with_capacity(entries.len() * dimension);
    for entry in entries {
        flat_values.extend_from_slice(&entry.vector);
    }

    let item = Arc::new(Field::new("item", DataType::Float32, false));
    let vectors = FixedSizeListArray::try_new(
        item,
        i32::try_from(dimension)
            .map_err(|_| RagError::Storage(format!("dimension {} is too large", dimension)))?,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| storage_error("Failed to create vector array", e))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(texts)),
        Arc::new(UInt32Array::from(source_indices)),
        Arc::new(UInt32Array::from(overlaps)),
        Arc::new(vectors),
    ];

    RecordBatch::try_new(schema, arrays).map_err(|e| storage_error("Failed to create record batch", e))
}

fn write_chunks(path: &Path, dimension: usize, entries: &[EmbeddedChunk]) -> Result<()> {
    let schema = chunk_schema(dimension)?;
    let file = File::create(path)?;
    let mut writer = FileWriter::try_new(file, &schema)
        .map_err(|e| storage_error("Failed to open chunk file", e))?;

    if !entries.is_empty() {
        let batch = record_batch(Arc::clone(&schema), dimension, entries)?;
        writer
            .write(&batch)
            .map_err(|e| storage_error("Failed to write chunks", e))?;
    }

    writer
        .finish()
        .map_err(|e| storage_error("Failed to finish chunk file", e))?;
    let file = writer
        .into_inner()
        .map_err(|e| storage_error("Failed to flush chunk file", e))?;
    file.sync_all()?;
    Ok(())
}

fn write_metadata(path: &Path, metadata: &IndexMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| storage_error("Failed to serialize index metadata", e))?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Write the index next to `location` and swap it into place
pub(super) fn write_index(
    location: &Path,
    metadata: &IndexMetadata,
    entries: &[EmbeddedChunk],
) -> Result<()> {
    let parent = match location.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    if location.exists() {
        ensure_replaceable(location)?;
    }

    let staging = tempfile::Builder::new()
        .prefix(".field-rag-index-")
        .tempdir_in(parent)?;
    debug!("Staging index in {}", staging.path().display());

    write_chunks(&staging.path().join(CHUNKS_FILE), metadata.dimension, entries)?;
    write_metadata(&staging.path().join(METADATA_FILE), metadata)?;

    swap_into_place(staging, location, parent)
}

/// Only directories that already hold an index are overwritten
fn ensure_replaceable(location: &Path) -> Result<()> {
    if location.is_dir() && location.join(METADATA_FILE).is_file() {
        return Ok(());
    }

    let is_empty_dir = location.is_dir() && fs::read_dir(location)?.next().is_none();
    if is_empty_dir {
        return Ok(());
    }

    Err(RagError::Storage(format!(
        "refusing to replace {}: it exists and is not an index",
        location.display()
    )))
}

fn swap_into_place(staging: TempDir, location: &Path, parent: &Path) -> Result<()> {
    if !location.exists() {
        let staged = staging.keep();
        return fs::rename(&staged, location).map_err(|e| {
            let _ = fs::remove_dir_all(&staged);
            storage_error("Failed to move index into place", e)
        });
    }

    // The previous index is parked in a directory that is removed on drop
    let retired = tempfile::Builder::new()
        .prefix(".field-rag-retired-")
        .tempdir_in(parent)?;
    let retired_index = retired.path().join("index");
    fs::rename(location, &retired_index)
        .map_err(|e| storage_error("Failed to move previous index aside", e))?;

    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, location) {
        if let Err(restore) = fs::rename(&retired_index, location) {
            warn!(
                "Could not restore previous index to {}: {}",
                location.display(),
                restore
            );
        }
        let _ = fs::remove_dir_all(&staged);
        return Err(storage_error("Failed to move index into place", e));
    }

    Ok(())
}

/// Read and check the metadata file; the format version must match exactly
pub(super) fn read_metadata(location: &Path) -> Result<IndexMetadata> {
    let path = location.join(METADATA_FILE);
    if !path.is_file() {
        return Err(RagError::IndexNotFound(location.display().to_string()));
    }

    let contents = fs::read_to_string(&path)?;
    let value: serde_json::Value = serde_json::from_str(&contents)
        .map_err(|e| storage_error("Failed to parse index metadata", e))?;

    let version = value.get("format_version").and_then(serde_json::Value::as_u64);
    if version != Some(u64::from(INDEX_FORMAT_VERSION)) {
        return Err(RagError::IndexVersionMismatch(format!(
            "index at {} has format version {}, expected {}",
            location.display(),
            version.map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            INDEX_FORMAT_VERSION
        )));
    }

    serde_json::from_value(value).map_err(|e| storage_error("Failed to parse index metadata", e))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Storage(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| RagError::Storage(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Storage(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| RagError::Storage(format!("Invalid {} column type", name)))
}

fn parse_batch(batch: &RecordBatch, dimension: usize) -> Result<Vec<EmbeddedChunk>> {
    let texts = string_column(batch, "text")?;
    let source_indices = u32_column(batch, "source_index")?;
    let overlaps = u32_column(batch, "overlap")?;
    let vectors = batch
        .column_by_name("vector")
        .ok_or_else(|| RagError::Storage("Missing vector column".to_string()))?
        .as_any()
        .downcast_ref::<FixedSizeListArray>()
        .ok_or_else(|| RagError::Storage("Invalid vector column type".to_string()))?;

    if usize::try_from(vectors.value_length()).ok() != Some(dimension) {
        return Err(RagError::Storage(format!(
            "stored vectors have {} dimensions, metadata says {}",
            vectors.value_length(),
            dimension
        )));
    }

    let mut entries = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let values = vectors.value(row);
        let values = values
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| RagError::Storage("Invalid vector item type".to_string()))?;

        entries.push(EmbeddedChunk {
            chunk: Chunk {
                text: texts.value(row).to_string(),
                source_index: source_indices.value(row) as usize,
                overlap: overlaps.value(row) as usize,
            },
            vector: values.values().to_vec(),
        });
    }

    Ok(entries)
}

/// Read every stored chunk, checking the payload against `metadata`
pub(super) fn read_entries(location: &Path, metadata: &IndexMetadata) -> Result<Vec<EmbeddedChunk>> {
    let path = location.join(CHUNKS_FILE);
    let file = File::open(&path)
        .map_err(|e| storage_error(&format!("Failed to open {}", path.display()), e))?;
    let reader =
        FileReader::try_new(file, None).map_err(|e| storage_error("Failed to read chunk file", e))?;

    let mut entries = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| storage_error("Failed to read record batch", e))?;
        entries.extend(parse_batch(&batch, metadata.dimension)?);
    }

    if entries.len() != metadata.chunk_count {
        return Err(RagError::Storage(format!(
            "chunk file holds {} chunks, metadata says {}",
            entries.len(),
            metadata.chunk_count
        )));
    }

    Ok(entries)
}
