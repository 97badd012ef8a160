//! GY-007: Recipe state. The interpreter cursor plus per-bake context.
//!
//! A [`RecipeState`] is everything a flow-control operation may read or
//! rewrite. The [`BakeContext`] inside it carries what is shared across one
//! top-level bake (registry, named-slot store, progress reporter) and is
//! cloned cheaply into sub-recipes.

use super::config::EngineConfig;
use super::dish::Dish;
use super::operation::{OperationInstance, OperationRegistry};
use super::types::ArgValue;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_BAKE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique bake identifier.
pub fn next_bake_id() -> u64 {
    NEXT_BAKE_ID.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// Progress reporting
// ============================================================================

/// Advisory progress callbacks for an external UI.
pub trait ProgressReporter: Send + Sync {
    /// Called before each executed step with its 1-based position.
    fn progress(&self, step: usize, total: usize);

    fn status(&self, message: &str) {
        let _ = message;
    }
}

// ============================================================================
// Named-slot store
// ============================================================================

#[derive(Debug, Default)]
struct Slots {
    values: IndexMap<String, String>,
    reset_for: Option<u64>,
}

/// Named string slots used by Store/Restore, scoped to one bake.
///
/// Clones share the same slots, so sub-recipes of a Fork see what the parent
/// stored.
#[derive(Debug, Clone, Default)]
pub struct SlotStore {
    inner: Arc<Mutex<Slots>>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.inner.lock().values.get(name).cloned()
    }

    pub fn insert(&self, name: &str, value: String) {
        self.inner.lock().values.insert(name.to_string(), value);
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.inner.lock().values.shift_remove(name)
    }

    pub fn clear(&self) {
        self.inner.lock().values.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.lock().values.keys().cloned().collect()
    }

    /// Clear the slots unless they were already reset for `bake_id`.
    /// Returns whether a reset happened.
    pub fn reset_once(&self, bake_id: u64) -> bool {
        let mut slots = self.inner.lock();
        if slots.reset_for == Some(bake_id) {
            return false;
        }
        slots.values.clear();
        slots.reset_for = Some(bake_id);
        true
    }
}

// ============================================================================
// Bake context
// ============================================================================

/// Engine-wide bounds threaded to flow-control operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Ceiling on every Jump's own max-jumps argument
    pub jump_ceiling: usize,
    /// Characters of data kept in a Magic result preview
    pub preview_length: usize,
    /// Prefix length brute-forced by intensive Magic
    pub brute_force_sample: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            jump_ceiling: 1000,
            preview_length: 100,
            brute_force_sample: 100,
        }
    }
}

impl Limits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            jump_ceiling: config.execution.jump_ceiling,
            preview_length: config.magic.preview_length,
            brute_force_sample: config.magic.brute_force_sample,
        }
    }
}

/// Shared per-bake context.
#[derive(Clone, Default)]
pub struct BakeContext {
    pub registry: OperationRegistry,
    pub store: SlotStore,
    pub bake_id: u64,
    pub reporter: Option<Arc<dyn ProgressReporter>>,
    pub limits: Limits,
}

impl BakeContext {
    /// A fresh context with its own slot store and bake id.
    pub fn new(registry: OperationRegistry) -> Self {
        Self {
            registry,
            store: SlotStore::new(),
            bake_id: next_bake_id(),
            reporter: None,
            limits: Limits::default(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_store(mut self, store: SlotStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

impl fmt::Debug for BakeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BakeContext")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .field("bake_id", &self.bake_id)
            .field("reporter", &self.reporter.is_some())
            .field("limits", &self.limits)
            .finish()
    }
}

// ============================================================================
// Recipe state
// ============================================================================

/// Interpreter cursor and everything flow-control operations may rewrite.
#[derive(Debug, Clone, Default)]
pub struct RecipeState {
    pub dish: Dish,
    pub op_list: Vec<OperationInstance>,
    /// Index of the next operation to execute
    pub progress: usize,
    /// Absolute index of `op_list[0]` in the top-level recipe
    pub fork_offset: usize,
    pub num_registers: usize,
    pub num_jumps: usize,
    /// Index of the last operation eligible for presentation
    pub last_run: Option<usize>,
    pub ctx: BakeContext,
}

impl RecipeState {
    pub fn new(dish: Dish, op_list: Vec<OperationInstance>, ctx: BakeContext) -> Self {
        Self {
            dish,
            op_list,
            progress: 0,
            fork_offset: 0,
            num_registers: 0,
            num_jumps: 0,
            last_run: None,
            ctx,
        }
    }

    /// The operation at the cursor.
    pub fn current(&self) -> Option<&OperationInstance> {
        self.op_list.get(self.progress)
    }

    /// Arguments of the operation at the cursor (empty past the end).
    pub fn current_args(&self) -> &[ArgValue] {
        self.current().map(|op| op.args.as_slice()).unwrap_or(&[])
    }

    pub fn arg(&self, index: usize) -> Option<&ArgValue> {
        self.current_args().get(index)
    }

    pub fn arg_str(&self, index: usize) -> String {
        self.arg(index).map(ArgValue::as_str).unwrap_or_default()
    }

    pub fn arg_bool(&self, index: usize) -> bool {
        self.arg(index).is_some_and(ArgValue::as_bool)
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.op_list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gy007_slot_store_basic() {
        let store = SlotStore::new();
        assert!(store.is_empty());
        store.insert("key", "value".into());
        assert_eq!(store.get("key").as_deref(), Some("value"));
        assert_eq!(store.remove("key").as_deref(), Some("value"));
        assert!(store.get("key").is_none());
    }

    #[test]
    fn test_gy007_slot_store_clones_share() {
        let store = SlotStore::new();
        let shared = store.clone();
        shared.insert("a", "1".into());
        assert_eq!(store.get("a").as_deref(), Some("1"));
    }

    #[test]
    fn test_gy007_reset_once_per_bake() {
        let store = SlotStore::new();
        store.insert("a", "1".into());
        assert!(store.reset_once(7));
        assert!(store.is_empty());
        store.insert("b", "2".into());
        assert!(!store.reset_once(7));
        assert_eq!(store.names(), vec!["b".to_string()]);
        assert!(store.reset_once(8));
        assert!(store.is_empty());
    }

    #[test]
    fn test_gy007_bake_ids_unique() {
        let a = BakeContext::new(OperationRegistry::new());
        let b = BakeContext::new(OperationRegistry::new());
        assert_ne!(a.bake_id, b.bake_id);
    }

    #[test]
    fn test_gy007_current_args_past_end_is_empty() {
        let state = RecipeState::default();
        assert!(state.current().is_none());
        assert!(state.current_args().is_empty());
        assert_eq!(state.arg_str(0), "");
        assert!(!state.arg_bool(1));
        assert!(state.is_complete());
    }
}
