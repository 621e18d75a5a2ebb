//! Memory - RAM-Resident Tiers
//!
//! `TigerStyle`: Bounded, per-agent, never persisted.

mod working;

pub use working::{AgentWorkingMemory, WorkingMemoryItem, WorkingMemoryStore};
