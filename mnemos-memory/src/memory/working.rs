//! Working Memory - Bounded Attention Buffer per Agent
//!
//! `TigerStyle`: Explicit capacity, deterministic eviction, simulation-first testing.
//!
//! # Design
//!
//! Each agent owns a small buffer (default 7 items). Inserting or accessing
//! an item sets its attention to 1.0 and decays every other item by the
//! tier's decay rate, floored at 0. When the buffer is full the
//! lowest-attention item leaves; the caller decides whether it is promoted
//! to Episodic or dropped.
//!
//! Items never touch the storage backend while they live here.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::constants::{
    WORKING_MEMORY_ATTENTION_MAX, WORKING_MEMORY_ATTENTION_MIN,
    WORKING_MEMORY_PROMOTION_ATTENTION_THRESHOLD,
};
use crate::storage::{MemoryRecord, MemoryType};

// =============================================================================
// WorkingMemoryItem
// =============================================================================

/// An item held in working memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemoryItem {
    /// Identifier, reused as the record id on promotion
    pub id: String,
    /// Text content
    pub content: String,
    /// Attention in [0, 1]
    pub attention: f64,
    /// Last insert or access time
    pub last_accessed: DateTime<Utc>,
}

impl WorkingMemoryItem {
    /// Whether this item is promoted instead of dropped when evicted.
    #[must_use]
    pub fn deserves_promotion(&self) -> bool {
        self.attention > WORKING_MEMORY_PROMOTION_ATTENTION_THRESHOLD
    }

    /// Convert to a record for persistence. Importance is the attention.
    #[must_use]
    pub fn to_record(&self, agent_id: &str) -> MemoryRecord {
        MemoryRecord::builder(agent_id, MemoryType::Experience, self.content.clone())
            .id(self.id.clone())
            .importance(self.attention.clamp(0.0, 1.0))
            .timestamp(self.last_accessed)
            .build()
    }
}

// =============================================================================
// AgentWorkingMemory
// =============================================================================

/// Working memory of one agent.
#[derive(Debug, Clone)]
pub struct AgentWorkingMemory {
    capacity: usize,
    decay_rate: f64,
    items: BTreeMap<String, WorkingMemoryItem>,
}

impl AgentWorkingMemory {
    /// Create an empty buffer.
    ///
    /// # Panics
    /// Panics if capacity is zero or the decay rate is outside [0, 1].
    #[must_use]
    pub fn new(capacity: usize, decay_rate: f64) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        assert!(
            (0.0..=1.0).contains(&decay_rate),
            "decay rate must be in [0, 1], got {decay_rate}"
        );
        Self {
            capacity,
            decay_rate,
            items: BTreeMap::new(),
        }
    }

    /// Capacity of the buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up an item.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&WorkingMemoryItem> {
        self.items.get(id)
    }

    /// Items ordered by attention (highest first), then id.
    #[must_use]
    pub fn items(&self) -> Vec<WorkingMemoryItem> {
        let mut items: Vec<WorkingMemoryItem> = self.items.values().cloned().collect();
        items.sort_by(|a, b| {
            b.attention
                .total_cmp(&a.attention)
                .then_with(|| a.id.cmp(&b.id))
        });
        items
    }

    /// The item that must leave before `incoming_id` can be inserted.
    ///
    /// None if the buffer has room or `incoming_id` is already present
    /// (reinsertion never evicts). Ties on attention go to the least
    /// recently accessed item, then the smallest id.
    #[must_use]
    pub fn eviction_candidate(&self, incoming_id: &str) -> Option<&WorkingMemoryItem> {
        if self.items.contains_key(incoming_id) || self.items.len() < self.capacity {
            return None;
        }
        self.items.values().min_by(|a, b| {
            a.attention
                .total_cmp(&b.attention)
                .then_with(|| a.last_accessed.cmp(&b.last_accessed))
                .then_with(|| a.id.cmp(&b.id))
        })
    }

    /// Insert or replace an item at full attention.
    ///
    /// If the buffer is full, the eviction candidate is removed first and
    /// returned; callers wanting promotion handle the candidate before
    /// calling this.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<WorkingMemoryItem> {
        let id = id.into();
        let evicted = self
            .eviction_candidate(&id)
            .map(|item| item.id.clone())
            .and_then(|victim| self.items.remove(&victim));

        self.decay_others(&id);
        self.items.insert(
            id.clone(),
            WorkingMemoryItem {
                id,
                content: content.into(),
                attention: WORKING_MEMORY_ATTENTION_MAX,
                last_accessed: now,
            },
        );

        // Postcondition
        assert!(
            self.items.len() <= self.capacity,
            "working memory holds {} items, capacity {}",
            self.items.len(),
            self.capacity
        );
        evicted
    }

    /// Access an item: attention back to 1.0, every other item decays.
    pub fn access(&mut self, id: &str, now: DateTime<Utc>) -> Option<WorkingMemoryItem> {
        if !self.items.contains_key(id) {
            return None;
        }
        self.decay_others(id);
        let item = self.items.get_mut(id)?;
        item.attention = WORKING_MEMORY_ATTENTION_MAX;
        item.last_accessed = now;
        Some(item.clone())
    }

    /// Remove an item.
    pub fn remove(&mut self, id: &str) -> Option<WorkingMemoryItem> {
        self.items.remove(id)
    }

    fn decay_others(&mut self, except: &str) {
        for item in self.items.values_mut().filter(|item| item.id != except) {
            item.attention = (item.attention - self.decay_rate).max(WORKING_MEMORY_ATTENTION_MIN);
        }
    }
}

// =============================================================================
// WorkingMemoryStore
// =============================================================================

/// Per-agent working memory.
///
/// The map lock is only held to find or create an agent's slot; each slot
/// has its own async mutex, so agents never contend with each other and an
/// insert (with its decay, eviction and promotion) is atomic per agent.
#[derive(Debug)]
pub struct WorkingMemoryStore {
    capacity: usize,
    decay_rate: f64,
    agents: RwLock<HashMap<String, Arc<Mutex<AgentWorkingMemory>>>>,
}

impl WorkingMemoryStore {
    /// Create an empty store.
    ///
    /// # Panics
    /// Panics if capacity is zero or the decay rate is outside [0, 1].
    #[must_use]
    pub fn new(capacity: usize, decay_rate: f64) -> Self {
        assert!(capacity > 0, "capacity must be positive");
        assert!((0.0..=1.0).contains(&decay_rate), "decay rate must be in [0, 1]");
        Self {
            capacity,
            decay_rate,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Per-agent capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slot of an agent, created on first use.
    #[must_use]
    pub fn slot(&self, agent_id: &str) -> Arc<Mutex<AgentWorkingMemory>> {
        if let Some(slot) = self.existing_slot(agent_id) {
            return slot;
        }
        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(agents.entry(agent_id.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(AgentWorkingMemory::new(
                self.capacity,
                self.decay_rate,
            )))
        }))
    }

    /// Slot of an agent, if one exists.
    #[must_use]
    pub fn existing_slot(&self, agent_id: &str) -> Option<Arc<Mutex<AgentWorkingMemory>>> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent_id)
            .map(Arc::clone)
    }

    /// Snapshot of an agent's items, highest attention first.
    pub async fn snapshot(&self, agent_id: &str) -> Vec<WorkingMemoryItem> {
        match self.existing_slot(agent_id) {
            Some(slot) => slot.lock().await.items(),
            None => Vec::new(),
        }
    }

    /// Drop an agent's working memory entirely. Returns the number of items.
    pub async fn clear(&self, agent_id: &str) -> usize {
        let slot = self
            .agents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(agent_id);
        match slot {
            Some(slot) => slot.lock().await.len(),
            None => 0,
        }
    }

    /// Agents with a working memory slot, sorted.
    #[must_use]
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WORKING_MEMORY_DECAY_RATE_DEFAULT;

    fn now() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    #[test]
    fn test_insert_sets_full_attention_and_decays_others() {
        let mut wm = AgentWorkingMemory::new(7, 0.1);
        wm.insert("a", "alpha", now());
        wm.insert("b", "beta", now());

        assert!((wm.get("b").unwrap().attention - 1.0).abs() < 1e-9);
        assert!((wm.get("a").unwrap().attention - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let mut wm = AgentWorkingMemory::new(3, 0.6);
        wm.insert("a", "a", now());
        wm.insert("b", "b", now());
        wm.insert("c", "c", now());

        let a = wm.get("a").unwrap();
        assert!(a.attention >= 0.0);
        assert!(a.attention.abs() < 1e-9);
    }

    #[test]
    fn test_capacity_evicts_lowest_attention() {
        let mut wm = AgentWorkingMemory::new(2, 0.1);
        wm.insert("a", "a", now());
        wm.insert("b", "b", now());
        let evicted = wm.insert("c", "c", now()).unwrap();

        assert_eq!(evicted.id, "a");
        assert_eq!(wm.len(), 2);
        assert!(wm.get("a").is_none());
    }

    #[test]
    fn test_reinsert_replaces_without_eviction() {
        let mut wm = AgentWorkingMemory::new(2, 0.1);
        wm.insert("a", "old", now());
        wm.insert("b", "b", now());

        assert!(wm.eviction_candidate("a").is_none());
        assert!(wm.insert("a", "new", now()).is_none());
        assert_eq!(wm.len(), 2);

        let a = wm.get("a").unwrap();
        assert_eq!(a.content, "new");
        assert!((a.attention - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_access_resets_attention() {
        let mut wm = AgentWorkingMemory::new(7, 0.1);
        wm.insert("a", "a", now());
        wm.insert("b", "b", now());
        wm.insert("c", "c", now());

        let accessed = wm.access("a", now()).unwrap();
        assert!((accessed.attention - 1.0).abs() < 1e-9);
        assert!((wm.get("c").unwrap().attention - 0.9).abs() < 1e-9);
        assert!(wm.access("missing", now()).is_none());
    }

    #[test]
    fn test_promotion_threshold() {
        let item = |attention| WorkingMemoryItem {
            id: "x".into(),
            content: "x".into(),
            attention,
            last_accessed: now(),
        };
        assert!(item(0.8).deserves_promotion());
        assert!(!item(0.5).deserves_promotion());
        assert!(!item(0.2).deserves_promotion());
    }

    #[test]
    fn test_to_record_uses_attention_as_importance() {
        let item = WorkingMemoryItem {
            id: "w1".into(),
            content: "remember the milk".into(),
            attention: 0.7,
            last_accessed: now(),
        };
        let record = item.to_record("agent");
        assert_eq!(record.id, "w1");
        assert_eq!(record.agent_id, "agent");
        assert!((record.importance - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_store_isolates_agents() {
        let store = WorkingMemoryStore::new(2, WORKING_MEMORY_DECAY_RATE_DEFAULT);
        store.slot("a").lock().await.insert("x", "x", now());
        store.slot("b").lock().await.insert("y", "y", now());

        assert_eq!(store.snapshot("a").await.len(), 1);
        assert_eq!(store.snapshot("b").await[0].id, "y");
        assert!(store.snapshot("c").await.is_empty());
        assert_eq!(store.agent_ids(), vec!["a".to_string(), "b".to_string()]);

        assert_eq!(store.clear("a").await, 1);
        assert!(store.snapshot("a").await.is_empty());
    }
}

// =============================================================================
// DST Tests
// =============================================================================

#[cfg(test)]
mod dst_tests {
    use super::*;
    use crate::dst::{run_property_tests, DeterministicRng, PropertyTestable, SimClock};

    struct WorkingMemoryModel {
        memory: AgentWorkingMemory,
        last_evicted: Option<(WorkingMemoryItem, f64)>,
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(String),
        Access(String),
    }

    impl PropertyTestable for WorkingMemoryModel {
        type Operation = Op;

        fn generate_operation(&self, rng: &mut DeterministicRng) -> Self::Operation {
            let id = format!("item-{}", rng.next_usize(0, 15));
            if rng.next_bool(0.7) {
                Op::Insert(id)
            } else {
                Op::Access(id)
            }
        }

        fn apply_operation(&mut self, op: &Self::Operation, clock: &SimClock) {
            self.last_evicted = None;
            match op {
                Op::Insert(id) => {
                    let min_before = self
                        .memory
                        .eviction_candidate(id)
                        .map(|item| item.attention);
                    if let Some(evicted) = self.memory.insert(id.clone(), "content", clock.now()) {
                        self.last_evicted = min_before.map(|min| (evicted, min));
                    }
                }
                Op::Access(id) => {
                    self.memory.access(id, clock.now());
                }
            }
        }

        fn check_invariants(&self) -> Result<(), String> {
            if self.memory.len() > self.memory.capacity() {
                return Err(format!(
                    "{} items exceed capacity {}",
                    self.memory.len(),
                    self.memory.capacity()
                ));
            }
            for item in self.memory.items() {
                if !(0.0..=1.0).contains(&item.attention) {
                    return Err(format!("attention {} out of range", item.attention));
                }
            }
            if let Some((evicted, min)) = &self.last_evicted {
                if (evicted.attention - min).abs() > 1e-12 {
                    return Err("evicted item was not the minimum-attention item".into());
                }
                if self.memory.get(&evicted.id).is_some() {
                    return Err("evicted item still present".into());
                }
            }
            Ok(())
        }

        fn describe_state(&self) -> String {
            format!("{:?}", self.memory.items())
        }
    }

    #[test]
    fn test_capacity_and_eviction_properties() {
        run_property_tests(&[0, 1, 42, 7_777], 500, || WorkingMemoryModel {
            memory: AgentWorkingMemory::new(7, 0.1),
            last_evicted: None,
        });
    }
}
