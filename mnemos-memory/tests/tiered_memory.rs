//! Integration Tests for Tiered Memory
//!
//! End-to-end behaviour of `TieredMemoryProvider` over the simulated
//! backend:
//! - Working memory eviction and promotion
//! - Idempotent consolidation
//! - Store / retrieve round trips and limit bounds
//! - Degraded retrieval under injected faults

use std::sync::Arc;

use mnemos_memory::dst::{FaultConfig, FaultType, SimConfig, Simulation};
use mnemos_memory::storage::{HealthState, SimStorageBackend};
use mnemos_memory::{
    MemoryConfig, MemoryError, MemoryRecord, MemoryType, RetrievalReason, TierKind,
    TieredMemoryProvider,
};

fn ids(records: &[MemoryRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

/// Insert `item1`..`item7`, then access `item7` `accesses` times.
async fn fill_working_memory(
    memory: &TieredMemoryProvider<SimStorageBackend>,
    accesses: usize,
) {
    for n in 1..=7 {
        memory
            .add_to_working_memory("a1", &format!("item{n}"), &format!("working note {n}"))
            .await
            .unwrap();
    }
    for _ in 0..accesses {
        memory.access_working_memory("a1", "item7").await.unwrap();
    }
}

// =============================================================================
// Working Memory Eviction
// =============================================================================

#[tokio::test]
async fn test_low_attention_eviction_is_dropped() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default());

    // Decay 0.1: item1 sits at 0.4 after six inserts, 0.3 after one access
    fill_working_memory(&memory, 1).await;
    let item1 = memory.working_memory("a1").await.into_iter().find(|i| i.id == "item1").unwrap();
    assert!((item1.attention - 0.3).abs() < 1e-9);

    let insert = memory.add_to_working_memory("a1", "item8", "working note 8").await.unwrap();

    assert_eq!(insert.evicted.as_ref().map(|i| i.id.as_str()), Some("item1"));
    assert!(!insert.promoted);
    let episodic = memory.retrieve_tier("a1", TierKind::Episodic, 10).await.unwrap();
    assert!(!ids(&episodic).contains(&"item1"));
    assert_eq!(memory.working_memory("a1").await.len(), 7);
}

#[tokio::test]
async fn test_attended_eviction_is_promoted_to_episodic() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default().with_working_decay_rate(0.05));

    // Decay 0.05: item1 sits at 0.7 after six inserts, 0.6 after two accesses
    fill_working_memory(&memory, 2).await;

    let insert = memory.add_to_working_memory("a1", "item8", "working note 8").await.unwrap();

    assert!(insert.promoted);
    let episodic = memory.retrieve_tier("a1", TierKind::Episodic, 10).await.unwrap();
    assert_eq!(ids(&episodic), vec!["item1"]);
    assert!((episodic[0].importance - 0.6).abs() < 1e-9);

    let working = memory.retrieve_tier("a1", TierKind::Working, 10).await.unwrap();
    assert_eq!(working.len(), 7);
    assert!(!ids(&working).contains(&"item1"));
}

#[tokio::test]
async fn test_agents_have_separate_working_memory() {
    let env = Simulation::new(SimConfig::with_seed(7)).build();
    let memory = env.provider(MemoryConfig::default());

    for n in 0..10 {
        memory.add_to_working_memory("a1", &format!("x{n}"), "note").await.unwrap();
    }
    memory.add_to_working_memory("a2", "y0", "note").await.unwrap();

    assert_eq!(memory.working_memory("a1").await.len(), 7);
    assert_eq!(memory.working_memory("a2").await.len(), 1);
}

// =============================================================================
// Consolidation
// =============================================================================

#[tokio::test]
async fn test_consolidating_twice_is_idempotent() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default());
    memory.add_to_working_memory("a1", "w1", "Met the new team lead").await.unwrap();

    let first = memory
        .consolidate_memory("a1", "w1", TierKind::Working, TierKind::Episodic)
        .await
        .unwrap();
    let after_first = memory.get_stats("a1").await.unwrap();

    let second = memory
        .consolidate_memory("a1", "w1", TierKind::Working, TierKind::Episodic)
        .await
        .unwrap();
    let after_second = memory.get_stats("a1").await.unwrap();

    assert!(first);
    assert!(!second);
    assert_eq!(after_first.total(), after_second.total());
    assert_eq!(after_second.persisted.total, 1);
    assert_eq!(after_second.working_items, 0);
    let history = memory.consolidation_history(Some("a1"));
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].memory_id, "w1");
}

#[tokio::test]
async fn test_rule_driven_consolidation_moves_each_memory_once_per_pass() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default());

    let vivid = MemoryRecord::builder("a1", MemoryType::Experience, "Won the hackathon")
        .id("e1")
        .importance(0.9)
        .build();
    memory.store_tier("a1", vivid, TierKind::Episodic).await.unwrap();

    let report = memory.run_consolidation("a1").await.unwrap();
    assert_eq!(report.consolidated, 1);
    let semantic = memory.retrieve_tier("a1", TierKind::Semantic, 10).await.unwrap();
    assert_eq!(ids(&semantic), vec!["e1"]);

    // Nothing left that satisfies a rule
    let again = memory.run_consolidation("a1").await.unwrap();
    assert_eq!(again.consolidated, 0);
}

// =============================================================================
// Round Trip and Bounds
// =============================================================================

#[tokio::test]
async fn test_store_then_retrieve_recent_round_trips() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default());

    let record = MemoryRecord::builder("a1", MemoryType::Fact, "Water boils at 100C at sea level")
        .id("f1")
        .importance(0.8)
        .tags(["physics", "water"])
        .timestamp(env.clock.now())
        .build();
    memory.store("a1", record.clone()).await.unwrap();

    let found = memory.retrieve("a1", "recent", 1).await.unwrap();

    assert_eq!(found.len(), 1);
    let stored = &found[0];
    assert_eq!(stored.id, record.id);
    assert_eq!(stored.agent_id, record.agent_id);
    assert_eq!(stored.memory_type, record.memory_type);
    assert_eq!(stored.content, record.content);
    assert_eq!(stored.tags, record.tags);
    assert_eq!(stored.timestamp, record.timestamp);
    assert!((stored.importance - record.importance).abs() < f64::EPSILON);
    // The attached provider embedded it on the way in
    assert!(stored.embedding.is_some());
}

#[tokio::test]
async fn test_retrieve_limit_bounds() {
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = env.provider(MemoryConfig::default());
    for n in 0..3 {
        let record = MemoryRecord::builder("a1", MemoryType::Observation, format!("note {n}"))
            .id(format!("n{n}"))
            .build();
        memory.store("a1", record).await.unwrap();
    }

    assert!(memory.retrieve("a1", "recent", 0).await.unwrap().is_empty());
    assert_eq!(memory.retrieve("a1", "recent", 50).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_empty_agent_id_is_validation_error() {
    let storage = Arc::new(SimStorageBackend::new(SimConfig::with_seed(1)));
    let memory = TieredMemoryProvider::new(storage, MemoryConfig::default());

    let err = memory.retrieve("", "recent", 5).await.unwrap_err();
    assert!(err.is_validation());
    assert!(matches!(
        memory.add_to_working_memory("a1", "w1", "   ").await,
        Err(MemoryError::Validation { .. })
    ));
}

// =============================================================================
// Degraded Retrieval
// =============================================================================

#[tokio::test]
async fn test_failed_keyword_retrieval_falls_back_to_recent() {
    Simulation::new(SimConfig::with_seed(42))
        .with_fault(FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("retrieve:text"))
        .run(|env| async move {
            let memory = env.provider(MemoryConfig::default());
            let record = MemoryRecord::builder("a1", MemoryType::Knowledge, "Tokio drives the runtime")
                .id("k1")
                .build();
            memory.store("a1", record).await?;

            let outcome = memory.retrieve_detailed("a1", "tokio", 5).await?;

            assert_eq!(outcome.reason, RetrievalReason::RecencyFallback);
            assert!(outcome.is_degraded());
            assert_eq!(ids(&outcome.records), vec!["k1"]);
            Ok::<_, MemoryError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_embedding_outage_falls_back_to_keywords() {
    Simulation::new(SimConfig::with_seed(42))
        .with_fault(FaultConfig::new(FaultType::EmbeddingUnavailable, 1.0).with_filter("embed"))
        .run(|env| async move {
            let memory = env.provider(MemoryConfig::default());
            let record = MemoryRecord::builder("a1", MemoryType::Knowledge, "Serde derives codecs")
                .id("k1")
                .build();
            // Stored without a vector since the provider is down
            memory.store("a1", record).await?;

            let outcome = memory.search_text("a1", "serde", 5).await?;

            assert_eq!(outcome.reason, RetrievalReason::KeywordFallback);
            assert_eq!(ids(&outcome.records), vec!["k1"]);
            Ok::<_, MemoryError>(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_check_survives_backend_outage() {
    let env = Simulation::new(SimConfig::with_seed(3))
        .with_fault(FaultConfig::new(FaultType::StorageReadFail, 1.0).with_filter("health"))
        .build();
    let memory = env.provider(MemoryConfig::default());

    let health = memory.health_check().await;

    assert_eq!(health.status, HealthState::Unhealthy);
    assert_eq!(health.details.get("embedding").map(String::as_str), Some("sim"));
}
