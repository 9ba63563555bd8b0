pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

pub use memory::MemoryStore;

#[derive(Debug)]
pub enum StoreError {
    /// An optimistic transaction lost the race repeatedly; the store gave up
    /// after its internal retry bound.
    Conflict,
    /// The store is unreachable; nothing was committed.
    Unavailable(String),
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Conflict => write!(f, "Transaction conflict"),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Decision produced by a transaction function from the current value at a
/// path. Committing `Value::Null` deletes the node.
pub enum TxDecision {
    Commit(Value),
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Committed,
    Aborted,
}

pub type TxFn<'a> = Box<dyn FnMut(Option<Value>) -> TxDecision + Send + 'a>;

/// The shared-state store the core synchronizes through. Paths address
/// hierarchical nodes (`rooms/{id}`, `queue`, ...); timestamps are assigned
/// by the store and are the authoritative clock for all duration math.
#[async_trait]
pub trait Store: Send + Sync {
    /// One-shot read of the value at `path`.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Direct children of a collection node, as (child key, value) pairs
    /// ordered by key.
    async fn children(&self, path: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// Atomic read-modify-write at `path`. The function sees the current
    /// value (or None) and either commits a replacement or aborts. The
    /// store retries internally on contention, so the function may run more
    /// than once and must be re-entrant.
    async fn transact<'a>(&'a self, path: &'a str, f: TxFn<'a>)
        -> Result<TxOutcome, StoreError>;

    /// Streams the value at `path`: the current value immediately, then the
    /// full value after every change at or under the path, in the store's
    /// per-path write order. Dropping the receiver ends the subscription.
    async fn subscribe(&self, path: &str)
        -> Result<UnboundedReceiver<Option<Value>>, StoreError>;

    /// Server-assigned epoch milliseconds, monotonic per store.
    fn server_now(&self) -> i64;
}
