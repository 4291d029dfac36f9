use super::*;
use crate::embeddings::Embedder;
use std::cell::Cell;
use std::collections::HashMap;
use tempfile::TempDir;

/// Embeds text by table lookup; unknown text maps to the origin
struct TableEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
    calls: Cell<usize>,
}

impl TableEmbedder {
    fn new(dimension: usize, entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            dimension,
            calls: Cell::new(0),
        }
    }
}

impl Embedder for TableEmbedder {
    fn model_id(&self) -> &str {
        "table-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![0.0; self.dimension]))
    }

    fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.set(self.calls.get() + 1);
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn batch_size(&self) -> usize {
        2
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn model_id(&self) -> &str {
        "failing"
    }

    fn dimension(&self) -> usize {
        2
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding("model offline".to_string()))
    }
}

fn chunk(text: &str, source_index: usize) -> Chunk {
    Chunk {
        text: text.to_string(),
        source_index,
        overlap: 0,
    }
}

fn sample_chunks() -> Vec<Chunk> {
    vec![
        chunk("State: GUJARAT", 0),
        chunk("State: KERALA", 1),
        chunk("State: MAHARASHTRA", 2),
    ]
}

fn sample_embedder() -> TableEmbedder {
    TableEmbedder::new(
        2,
        &[
            ("State: GUJARAT", vec![1.0, 0.0]),
            ("State: KERALA", vec![0.0, 1.0]),
            ("State: MAHARASHTRA", vec![5.0, 5.0]),
        ],
    )
}

fn sample_index() -> VectorIndex {
    VectorIndex::build(sample_chunks(), &sample_embedder(), DistanceMetric::Euclidean)
        .expect("index should build")
}

#[test]
fn build_keeps_input_order_and_metadata() {
    let embedder = sample_embedder();
    let mut progress = Vec::new();

    let index = VectorIndex::build_with_progress(
        sample_chunks(),
        &embedder,
        DistanceMetric::Euclidean,
        |done| progress.push(done),
    )
    .expect("index should build");

    assert_eq!(index.len(), 3);
    assert_eq!(index.entries()[0].chunk.text, "State: GUJARAT");
    assert_eq!(index.entries()[2].vector, vec![5.0, 5.0]);

    let metadata = index.metadata();
    assert_eq!(metadata.format_version, INDEX_FORMAT_VERSION);
    assert_eq!(metadata.embedding_model_id, "table-embedder");
    assert_eq!(metadata.dimension, 2);
    assert_eq!(metadata.chunk_count, 3);

    // batch size 2 over three chunks
    assert_eq!(embedder.calls.get(), 2);
    assert_eq!(progress, vec![2, 3]);
}

#[test]
fn build_from_no_chunks_is_empty() {
    let index = VectorIndex::build(Vec::new(), &sample_embedder(), DistanceMetric::Cosine)
        .expect("empty build should succeed");

    assert!(index.is_empty());
    assert_eq!(index.metadata().chunk_count, 0);
    assert_eq!(index.metadata().metric, DistanceMetric::Cosine);
}

#[test]
fn build_fails_when_embedding_fails() {
    let result = VectorIndex::build(sample_chunks(), &FailingEmbedder, DistanceMetric::Euclidean);
    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[test]
fn build_rejects_wrong_dimension() {
    let embedder = TableEmbedder::new(2, &[("State: KERALA", vec![1.0, 2.0, 3.0])]);

    let result = VectorIndex::build(sample_chunks(), &embedder, DistanceMetric::Euclidean);
    assert!(matches!(result, Err(RagError::Embedding(message)) if message.contains("chunk 1")));
}

#[test]
fn build_rejects_non_finite_vectors() {
    let embedder = TableEmbedder::new(2, &[("State: GUJARAT", vec![f32::NAN, 0.0])]);

    let result = VectorIndex::build(sample_chunks(), &embedder, DistanceMetric::Euclidean);
    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[test]
fn search_orders_by_distance() {
    let index = sample_index();

    let results = index.search(&[0.9, 0.1], 3).expect("search should succeed");

    let texts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["State: GUJARAT", "State: KERALA", "State: MAHARASHTRA"]
    );
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn search_returns_at_most_k() {
    let index = sample_index();

    assert_eq!(index.search(&[0.0, 0.0], 1).expect("search").len(), 1);
    assert_eq!(index.search(&[0.0, 0.0], 10).expect("search").len(), 3);
    assert!(index.search(&[0.0, 0.0], 0).expect("search").is_empty());
}

#[test]
fn ties_keep_insertion_order() {
    let chunks = vec![chunk("b", 0), chunk("a", 1), chunk("c", 2)];
    let embedder = TableEmbedder::new(
        2,
        &[
            ("a", vec![1.0, 0.0]),
            ("b", vec![0.0, 1.0]),
            ("c", vec![-1.0, 0.0]),
        ],
    );
    let index =
        VectorIndex::build(chunks, &embedder, DistanceMetric::Euclidean).expect("index should build");

    // every stored vector is exactly 1.0 from the origin
    let first = index.search(&[0.0, 0.0], 3).expect("search");
    let second = index.search(&[0.0, 0.0], 3).expect("search");

    let texts: Vec<&str> = first.iter().map(|r| r.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["b", "a", "c"]);
    assert_eq!(first, second);
}

#[test]
fn cosine_metric_ignores_magnitude() {
    let index = VectorIndex::build(sample_chunks(), &sample_embedder(), DistanceMetric::Cosine)
        .expect("index should build");

    let results = index.search(&[10.0, 10.0], 1).expect("search");
    assert_eq!(results[0].chunk.text, "State: MAHARASHTRA");
    assert!(results[0].distance.abs() < 1e-6);
}

#[test]
fn empty_index_is_reported_before_query_checks() {
    let index = VectorIndex::empty("table-embedder", 2, DistanceMetric::Euclidean);

    assert!(matches!(index.search(&[1.0, 0.0], 3), Err(RagError::EmptyIndex)));
    assert!(matches!(index.search(&[1.0], 3), Err(RagError::EmptyIndex)));
}

#[test]
fn invalid_queries_are_rejected() {
    let index = sample_index();

    assert!(matches!(
        index.search(&[1.0, 0.0, 0.0], 3),
        Err(RagError::InvalidQuery(_))
    ));
    assert!(matches!(
        index.search(&[f32::INFINITY, 0.0], 3),
        Err(RagError::InvalidQuery(_))
    ));
}

#[test]
fn save_and_load_round_trip() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    let index = sample_index();

    index.save(&location).expect("index should save");
    assert!(location.join(storage::METADATA_FILE).is_file());
    assert!(location.join(storage::CHUNKS_FILE).is_file());

    let loaded = VectorIndex::load(&location, "table-embedder", 2).expect("index should load");

    assert_eq!(loaded.metadata(), index.metadata());
    assert_eq!(loaded.entries(), index.entries());
    assert_eq!(
        loaded.search(&[0.2, 0.9], 3).expect("search"),
        index.search(&[0.2, 0.9], 3).expect("search")
    );
}

#[test]
fn overlap_survives_persistence() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    let chunks = vec![
        chunk("State: GUJARAT ", 0),
        Chunk {
            text: "ARAT KERALA ".to_string(),
            source_index: 0,
            overlap: 5,
        },
    ];
    let index = VectorIndex::build(chunks, &sample_embedder(), DistanceMetric::Euclidean)
        .expect("index should build");

    index.save(&location).expect("index should save");
    let loaded = VectorIndex::load(&location, "table-embedder", 2).expect("index should load");

    assert_eq!(loaded.entries()[1].chunk.overlap, 5);
    assert_eq!(loaded.entries()[1].chunk.body(), "KERALA ");
}

#[test]
fn empty_index_round_trips() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");

    VectorIndex::empty("table-embedder", 2, DistanceMetric::Euclidean)
        .save(&location)
        .expect("empty index should save");

    let loaded = VectorIndex::load(&location, "table-embedder", 2).expect("index should load");
    assert!(loaded.is_empty());
    assert!(matches!(loaded.search(&[0.0, 0.0], 1), Err(RagError::EmptyIndex)));
}

#[test]
fn load_missing_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = VectorIndex::load(temp_dir.path().join("nowhere"), "table-embedder", 2);
    assert!(matches!(result, Err(RagError::IndexNotFound(_))));
}

#[test]
fn load_rejects_other_embedding_model() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    sample_index().save(&location).expect("index should save");

    let result = VectorIndex::load(&location, "nomic-embed-text", 2);
    assert!(matches!(result, Err(RagError::IndexVersionMismatch(_))));

    let result = VectorIndex::load(&location, "table-embedder", 768);
    assert!(matches!(result, Err(RagError::IndexVersionMismatch(_))));
}

#[test]
fn load_rejects_unknown_format_version() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    sample_index().save(&location).expect("index should save");

    let metadata_path = location.join(storage::METADATA_FILE);
    let contents = std::fs::read_to_string(&metadata_path).expect("metadata should read");
    let mut value: serde_json::Value = serde_json::from_str(&contents).expect("metadata is json");
    value["format_version"] = serde_json::json!(INDEX_FORMAT_VERSION + 1);
    std::fs::write(&metadata_path, value.to_string()).expect("metadata should write");

    let result = VectorIndex::load(&location, "table-embedder", 2);
    assert!(matches!(result, Err(RagError::IndexVersionMismatch(_))));
}

#[test]
fn load_detects_payload_disagreement() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    sample_index().save(&location).expect("index should save");

    let metadata_path = location.join(storage::METADATA_FILE);
    let contents = std::fs::read_to_string(&metadata_path).expect("metadata should read");
    let mut value: serde_json::Value = serde_json::from_str(&contents).expect("metadata is json");
    value["chunk_count"] = serde_json::json!(7);
    std::fs::write(&metadata_path, value.to_string()).expect("metadata should write");

    let result = VectorIndex::load(&location, "table-embedder", 2);
    assert!(matches!(result, Err(RagError::Storage(_))));
}

#[test]
fn load_rejects_absurd_chunk_count() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    sample_index().save(&location).expect("index should save");

    let metadata_path = location.join(storage::METADATA_FILE);
    let contents = std::fs::read_to_string(&metadata_path).expect("metadata should read");
    let mut value: serde_json::Value = serde_json::from_str(&contents).expect("metadata is json");
    value["chunk_count"] = serde_json::json!(u64::MAX);
    std::fs::write(&metadata_path, value.to_string()).expect("metadata should write");

    let result = VectorIndex::load(&location, "table-embedder", 2);
    assert!(matches!(result, Err(RagError::Storage(_))));
}

#[test]
fn save_replaces_previous_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");

    sample_index().save(&location).expect("first save");
    let smaller = VectorIndex::build(
        vec![chunk("State: KERALA", 0)],
        &sample_embedder(),
        DistanceMetric::Euclidean,
    )
    .expect("index should build");
    smaller.save(&location).expect("second save");

    let loaded = VectorIndex::load(&location, "table-embedder", 2).expect("index should load");
    assert_eq!(loaded.len(), 1);

    // no staging or retired directories are left behind
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .expect("should list dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != "index")
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn failed_save_leaves_existing_data_untouched() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("notes");
    std::fs::create_dir_all(&location).expect("should create dir");
    std::fs::write(location.join("todo.txt"), "keep me").expect("should write file");

    let result = sample_index().save(&location);

    assert!(matches!(result, Err(RagError::Storage(_))));
    assert_eq!(
        std::fs::read_to_string(location.join("todo.txt")).expect("file should remain"),
        "keep me"
    );
}

#[test]
fn read_metadata_without_checks() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let location = temp_dir.path().join("index");
    sample_index().save(&location).expect("index should save");

    let metadata = VectorIndex::read_metadata(&location).expect("metadata should read");
    assert_eq!(metadata.chunk_count, 3);
    assert_eq!(metadata.embedding_model_id, "table-embedder");
}
