use criterion::{Criterion, criterion_group, criterion_main};
use field_rag::embeddings::{Chunk, ChunkingConfig, Embedder, split_records};
use field_rag::index::{DistanceMetric, VectorIndex};
use field_rag::records::FieldRecord;
use std::hint::black_box;

const DIMENSION: usize = 384;

fn invoice_records(count: usize) -> Vec<FieldRecord> {
    (0..count)
        .map(|i| {
            FieldRecord::new(
                format!("Line Item {}", i),
                format!(
                    "Supply of {} units of industrial valves, HSN 8481, delivered to warehouse {} \
                     within 30 days.\nPayment terms: net 45 days from invoice date.",
                    i * 3 + 1,
                    i % 7
                ),
            )
        })
        .collect()
}

/// Deterministic pseudo-embedding derived from the text bytes
struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn model_id(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    fn embed(&self, text: &str) -> field_rag::Result<Vec<f32>> {
        let mut vector = vec![0.0; DIMENSION];
        for (i, byte) in text.bytes().enumerate() {
            vector[(i * 31 + byte as usize) % DIMENSION] += 1.0;
        }
        Ok(vector)
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let records = invoice_records(500);
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| split_records(black_box(&records), black_box(&config)))
    });

    let chunks: Vec<Chunk> = split_records(&records, &config).expect("records split");
    let index = VectorIndex::build(chunks, &HashEmbedder, DistanceMetric::Euclidean)
        .expect("index builds");
    let query = HashEmbedder
        .embed("What is the payment term for warehouse 3?")
        .expect("query embeds");
    c.bench_function("index_search", |b| {
        b.iter(|| index.search(black_box(&query), black_box(3)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
