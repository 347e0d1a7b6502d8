use lazy_static::lazy_static;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::DEFAULT_MAX_HISTORY_MESSAGES;
use crate::events::{Event, History};
use crate::execution::{ExecutionLevel, ExecutionMethod, QueryParams};

lazy_static! {
    static ref SHARED_GLOBAL_STATE: GlobalState = GlobalState::new();
}

// A panic while holding one of these locks cannot leave a map half-written,
// so a poisoned lock is still safe to use.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Thread-safe key/value context. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    entries: Arc<RwLock<BTreeMap<String, Value>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        write(&self.entries).insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        read(&self.entries).get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        write(&self.entries).remove(key)
    }

    /// Inserts every entry of `params`, overwriting existing keys.
    pub fn merge(&self, params: &QueryParams) {
        let mut entries = write(&self.entries);
        for (key, value) in params {
            entries.insert(key.clone(), value.clone());
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        read(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    pub fn clear(&self) {
        write(&self.entries).clear();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionStats {
    pub total: u64,
    pub by_level: BTreeMap<String, u64>,
    pub by_method: BTreeMap<String, u64>,
}

impl ExecutionStats {
    fn record(&mut self, level: ExecutionLevel, method: ExecutionMethod) {
        self.total += 1;
        *self.by_level.entry(level.value().to_string()).or_default() += 1;
        *self.by_method.entry(method.value().to_string()).or_default() += 1;
    }

    pub fn for_level(&self, level: ExecutionLevel) -> u64 {
        self.by_level.get(level.value()).copied().unwrap_or(0)
    }

    pub fn for_method(&self, method: ExecutionMethod) -> u64 {
        self.by_method.get(method.value()).copied().unwrap_or(0)
    }
}

/// System-wide state visible to every agent attached to it.
#[derive(Debug, Clone)]
pub struct GlobalState {
    context: ContextStore,
    history: Arc<RwLock<History>>,
    stats: Arc<RwLock<ExecutionStats>>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalState {
    /// A fresh state, not shared with agents created through `GeminiAgent::new`.
    /// Keeps the last [`DEFAULT_MAX_HISTORY_MESSAGES`] global messages.
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_MAX_HISTORY_MESSAGES)
    }

    /// A fresh state whose global history keeps at most `limit` messages.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            context: ContextStore::new(),
            history: Arc::new(RwLock::new(History::new(limit))),
            stats: Arc::new(RwLock::new(ExecutionStats::default())),
        }
    }

    /// The process-wide instance, capped at [`DEFAULT_MAX_HISTORY_MESSAGES`].
    pub fn shared() -> GlobalState {
        SHARED_GLOBAL_STATE.clone()
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn history_tail(&self, n: usize) -> Vec<Event> {
        read(&self.history).tail(n)
    }

    pub fn record_exchange(&self, user: Event, reply: Event) {
        let mut history = write(&self.history);
        history.push(user);
        history.push(reply);
    }

    pub fn record_execution(&self, level: ExecutionLevel, method: ExecutionMethod) {
        write(&self.stats).record(level, method);
    }

    pub fn stats(&self) -> ExecutionStats {
        read(&self.stats).clone()
    }

    pub fn reset(&self) {
        self.context.clear();
        write(&self.history).clear();
        *write(&self.stats) = ExecutionStats::default();
    }
}
