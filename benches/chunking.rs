use criterion::{Criterion, criterion_group, criterion_main};
use press_qa::corpus::SourceDocument;
use press_qa::embeddings::chunking::{ChunkingConfig, chunk_documents};
use std::hint::black_box;

fn press_release(seed: usize) -> String {
    let mut text = format!("Press release {seed}\n\n");
    for paragraph in 0..40 {
        text.push_str(&format!(
            "Paragraph {paragraph}. The company announced progress on its network rollout, \
             reported growth across its mobile and fixed-line segments and confirmed its \
             outlook for the full year. Customers in rural regions benefit first.\n"
        ));
        if paragraph % 5 == 4 {
            text.push('\n');
        }
    }
    text
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let documents: Vec<SourceDocument> = (0..50)
        .map(|i| SourceDocument {
            source: format!("release-{i}.txt"),
            text: press_release(i),
        })
        .collect();

    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_documents(black_box(&documents), black_box(&config)))
    });

    let overlapping = ChunkingConfig {
        chunk_size: 500,
        chunk_overlap: 100,
    };
    c.bench_function("chunking_with_overlap", |b| {
        b.iter(|| chunk_documents(black_box(&documents), black_box(&overlapping)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
