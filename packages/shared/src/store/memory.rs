use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

use super::{Store, StoreError, TxDecision, TxFn, TxOutcome};

/// In-memory `Store` used by tests and the local match-processor.
///
/// Transactions are serialized behind one mutex, which trivially satisfies
/// the atomicity contract; a remote adapter would retry on contention
/// instead. Subscribers are pruned lazily when a push fails.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    values: HashMap<String, Value>,
    subscribers: HashMap<String, Vec<UnboundedSender<Option<Value>>>>,
    /// Last issued stamp, to keep `server_now` strictly monotonic even when
    /// the wall clock stalls within a millisecond.
    last_stamp: i64,
    /// Test hook: shifts the server clock forward to simulate deadlines.
    clock_offset_ms: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Mutex::new(Inner {
                values: HashMap::new(),
                subscribers: HashMap::new(),
                last_stamp: 0,
                clock_offset_ms: 0,
            }),
        }
    }

    /// Advances the server clock by `ms`. Deadlines compare stored stamps
    /// against `server_now`, so tests fast-forward instead of sleeping.
    pub fn advance_clock(&self, ms: i64) {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.clock_offset_ms += ms;
        inner.last_stamp += ms;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn stamp(&mut self) -> i64 {
        let wall = Utc::now().timestamp_millis() + self.clock_offset_ms;
        let stamp = wall.max(self.last_stamp + 1);
        self.last_stamp = stamp;
        stamp
    }

    /// Pushes the post-write value to every subscription whose path is the
    /// written node, an ancestor of it, or a descendant of it.
    fn notify(&mut self, written: &str) {
        let written_prefix = format!("{}/", written);
        let paths: Vec<String> = self
            .subscribers
            .keys()
            .filter(|sub| {
                sub.as_str() == written
                    || written.starts_with(&format!("{}/", sub))
                    || sub.starts_with(&written_prefix)
            })
            .cloned()
            .collect();

        for path in paths {
            let value = self.values.get(&path).cloned();
            if let Some(senders) = self.subscribers.get_mut(&path) {
                senders.retain(|tx| tx.send(value.clone()).is_ok());
                if senders.is_empty() {
                    self.subscribers.remove(&path);
                }
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.values.get(path).cloned())
    }

    async fn children(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let prefix = format!("{}/", path);
        let mut children: Vec<(String, Value)> = inner
            .values
            .iter()
            .filter_map(|(key, value)| {
                let rest = key.strip_prefix(&prefix)?;
                if rest.is_empty() || rest.contains('/') {
                    return None;
                }
                Some((rest.to_string(), value.clone()))
            })
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(children)
    }

    async fn transact<'a>(
        &'a self,
        path: &'a str,
        mut f: TxFn<'a>,
    ) -> Result<TxOutcome, StoreError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let current = inner.values.get(path).cloned();
        match f(current) {
            TxDecision::Commit(Value::Null) => {
                inner.values.remove(path);
                inner.notify(path);
                debug!(path, "store node deleted");
                Ok(TxOutcome::Committed)
            }
            TxDecision::Commit(next) => {
                inner.values.insert(path.to_string(), next);
                inner.notify(path);
                Ok(TxOutcome::Committed)
            }
            TxDecision::Abort => Ok(TxOutcome::Aborted),
        }
    }

    async fn subscribe(
        &self,
        path: &str,
    ) -> Result<UnboundedReceiver<Option<Value>>, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let current = inner.values.get(path).cloned();
        // Initial snapshot, then every subsequent change in write order.
        let _ = tx.send(current);
        inner
            .subscribers
            .entry(path.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    fn server_now(&self) -> i64 {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.stamp()
    }
}
