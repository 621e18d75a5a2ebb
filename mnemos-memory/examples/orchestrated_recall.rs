//! Orchestrated Recall Example
//!
//! Walks through the main memory workflow on the simulated backend:
//! working memory, consolidation, context-aware recall and multi-agent
//! retrieval with feedback, followed by one maintenance pass.
//!
//! Run with:
//!   MNEMOS_LOG=mnemos_memory=debug cargo run --example orchestrated_recall

use std::sync::Arc;

use anyhow::Context as _;
use mnemos_memory::agents::RetrievalContext;
use mnemos_memory::context::ExecutionContext;
use mnemos_memory::dst::{SimConfig, Simulation};
use mnemos_memory::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use mnemos_memory::{
    MaintenanceScheduler, MemoryConfig, MemoryRecord, MemoryType, TierKind,
};

const AGENT: &str = "assistant-1";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_telemetry(&TelemetryConfig::builder().format(LogFormat::Compact).build())
        .context("installing log subscriber")?;

    println!("=== Mnemos Memory: Orchestrated Recall ===\n");

    let config = MemoryConfig::from_env().context("reading MNEMOS_* configuration")?;
    let env = Simulation::new(SimConfig::with_seed(42)).build();
    let memory = Arc::new(env.provider(config));

    // === Working Memory ===
    println!("--- Working memory ---");
    for (id, note) in [
        ("w1", "User prefers short answers"),
        ("w2", "User is debugging a borrow checker error"),
        ("w3", "User mentioned their friend Sam reviews the code"),
    ] {
        memory.add_to_working_memory(AGENT, id, note).await?;
    }
    for item in memory.working_memory(AGENT).await {
        println!("  {:>4.2}  {}", item.attention, item.content);
    }

    let moved = memory
        .consolidate_memory(AGENT, "w2", TierKind::Working, TierKind::Episodic)
        .await?;
    println!("  consolidated w2 to Episodic: {moved}\n");

    // === Context-Aware Storage ===
    println!("--- Context-aware recall ---");
    let debugging = ExecutionContext::new()
        .with_scope("task:debug")
        .with_agent(AGENT)
        .with_env("language", "rust");
    let chatting = ExecutionContext::new().with_scope("chat").with_agent(AGENT);

    let fix = MemoryRecord::builder(AGENT, MemoryType::Knowledge, "Clone the Arc before moving into the task")
        .importance(0.6)
        .tag("rust")
        .build();
    let smalltalk = MemoryRecord::builder(AGENT, MemoryType::Social, "Sam said the conference was fun")
        .importance(0.6)
        .user_id("sam")
        .build();
    memory.store_in_context(AGENT, fix, &debugging).await?;
    memory.store_in_context(AGENT, smalltalk, &chatting).await?;

    for scored in memory.retrieve_in_context(AGENT, "recent", 5, &debugging).await? {
        println!("  {:>4.2}  {}", scored.score, scored.record.content);
    }
    println!();

    // === Multi-Agent Retrieval ===
    println!("--- Orchestrated retrieval ---");
    let context = RetrievalContext::new(AGENT).with_fingerprint(debugging.fingerprint().into_string());
    let result = memory
        .orchestrate("what did my friend say about the code", &context)
        .await?;
    println!("  agents: {:?}", result.agents_used);
    println!("  confidence {:.2}, quality {:.2}", result.confidence, result.quality);
    for found in result.primary() {
        println!("  [{} hits] {}", found.hits, found.memory.content);
    }
    memory.feedback(&result, 0.9)?;
    println!();

    // === Maintenance ===
    println!("--- Maintenance ---");
    env.advance_days(1);
    let report = MaintenanceScheduler::new(Arc::clone(&memory)).run_once().await;
    println!(
        "  agents {}, consolidated {}, archived {}",
        report.agents, report.consolidation.consolidated, report.archived
    );

    let stats = memory.get_stats(AGENT).await?;
    println!("  persisted {:?}", stats.persisted.by_tier);
    println!("  working items {}", stats.working_items);
    println!("  health {:?}", memory.health_check().await.status);

    Ok(())
}
