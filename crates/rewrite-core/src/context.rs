/*!
# Execution Context

Run-scoped state shared by every visitor invocation of one scheduling run:
the current cycle, a cancellation flag and a message sink recipes can use
to talk to each other. Sources of one cycle may run in parallel, so every
field here is safe to touch from several threads at once.
*/

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// A failure the scheduler captured and turned into a marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFailure {
    pub recipe: String,
    pub source_path: String,
    pub cycle: usize,
    pub message: String,
    pub detail: Option<String>,
}

/// Callback invoked for every captured failure
pub type ErrorListener = Arc<dyn Fn(&CapturedFailure) + Send + Sync>;

pub struct ExecutionContext {
    cycle: AtomicUsize,
    cancelled: AtomicBool,
    messages: DashMap<String, Value>,
    on_error: Option<ErrorListener>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self {
            cycle: AtomicUsize::new(1),
            cancelled: AtomicBool::new(false),
            messages: DashMap::new(),
            on_error: None,
        }
    }

    /// Register a listener that sees every failure the scheduler captures
    pub fn with_error_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&CapturedFailure) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(listener));
        self
    }

    /// Current cycle, starting at 1
    pub fn cycle(&self) -> usize {
        self.cycle.load(Ordering::Acquire)
    }

    pub(crate) fn set_cycle(&self, cycle: usize) {
        self.cycle.store(cycle, Ordering::Release);
    }

    /// Ask the scheduler to stop. Checked between sources only.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Store a message, replacing any previous value under `key`
    pub fn put_message<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.messages.insert(key.into(), value);
        Ok(())
    }

    /// Read a message back as `T`. Missing keys and type mismatches yield `None`.
    pub fn get_message<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.messages.get(key)?.value().clone();
        serde_json::from_value(value).ok()
    }

    pub fn get_raw_message(&self, key: &str) -> Option<Value> {
        self.messages.get(key).map(|entry| entry.value().clone())
    }

    /// Append `value` to the JSON array stored under `key`.
    ///
    /// The update happens under the entry's shard lock, so concurrent appends
    /// from parallel sources are all kept. A non-array value already stored
    /// under `key` becomes the first element of the array.
    pub fn append_message<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut entry = self
            .messages
            .entry(key.into())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry.value_mut() {
            Value::Array(items) => items.push(value),
            existing => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
        }
        Ok(())
    }

    pub fn remove_message(&self, key: &str) -> Option<Value> {
        self.messages.remove(key).map(|(_, value)| value)
    }

    pub fn message_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.messages.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub(crate) fn notify_error(&self, failure: &CapturedFailure) {
        if let Some(listener) = &self.on_error {
            listener(failure);
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cycle", &self.cycle())
            .field("cancelled", &self.is_cancelled())
            .field("messages", &self.messages.len())
            .field("on_error", &self.on_error.as_ref().map(|_| "<function>"))
            .finish()
    }
}
