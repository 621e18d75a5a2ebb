//! Orchestration Benchmarks
//!
//! Multi-agent retrieval over a pre-populated simulated backend, plus the
//! pure synthesis step on its own.
//!
//! Run with: cargo bench --bench orchestration

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use mnemos_memory::agents::{AgentKind, RelevantMemory, RetrievalContext};
use mnemos_memory::dst::SimConfig;
use mnemos_memory::orchestration::synthesize;
use mnemos_memory::storage::SimStorageBackend;
use mnemos_memory::{MemoryConfig, MemoryRecord, MemoryType, StorageBackend, TieredMemoryProvider};

const CONTENTS: [(MemoryType, &str); 3] = [
    (MemoryType::Social, "Talked with a friend about the release"),
    (MemoryType::Knowledge, "The release pipeline uses three stages"),
    (MemoryType::Experience, "Tried the release dry run and it succeeded"),
];

fn populated_provider(rt: &Runtime, records: usize) -> TieredMemoryProvider<SimStorageBackend> {
    let storage = SimStorageBackend::new(SimConfig::with_seed(42));
    rt.block_on(async {
        for n in 0..records {
            let (memory_type, content) = CONTENTS[n % CONTENTS.len()];
            let record = MemoryRecord::builder("bench", memory_type, content)
                .id(format!("m{n}"))
                .user_id("u1")
                .build();
            storage.store("bench", &record).await.unwrap();
        }
    });
    TieredMemoryProvider::new(Arc::new(storage), MemoryConfig::default())
}

// =============================================================================
// Orchestrated Retrieval
// =============================================================================

fn bench_orchestrate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("orchestrate");
    group.measurement_time(Duration::from_secs(5));

    for records in [30_usize, 300] {
        let memory = populated_provider(&rt, records);
        let context = RetrievalContext::new("bench").with_user("u1");

        for query in ["friend conversation", "release"] {
            group.bench_with_input(
                BenchmarkId::new(query, records),
                &query,
                |b, &query| {
                    b.to_async(&rt)
                        .iter(|| async { black_box(memory.orchestrate(query, &context).await.unwrap()) });
                },
            );
        }
    }
    group.finish();
}

// =============================================================================
// Synthesis
// =============================================================================

fn bench_synthesize(c: &mut Criterion) {
    let per_agent: Vec<(AgentKind, Vec<RelevantMemory>)> = AgentKind::all()
        .iter()
        .enumerate()
        .map(|(offset, kind)| {
            let results = (0..50)
                .map(|n| RelevantMemory {
                    memory: MemoryRecord::builder("bench", kind.domain_type(), "shared memory")
                        .id(format!("m{}", n + offset * 10))
                        .build(),
                    relevance_score: 0.5 + f64::from(u32::try_from(n % 5).unwrap_or(0)) * 0.1,
                    retrieval_reason: "keyword".to_string(),
                    context_match: 0.0,
                })
                .collect();
            (*kind, results)
        })
        .collect();

    c.bench_function("synthesize/3x50", |b| {
        b.iter(|| black_box(synthesize(black_box(&per_agent))));
    });
}

criterion_group!(benches, bench_orchestrate, bench_synthesize);
criterion_main!(benches);
