//! In-memory write path used by the CLI and the tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use cstream_models::{ColumnChange, ConsistencyLevel, Mutation, MutationBatch};
use scc::hash_map::Entry::{Occupied, Vacant};
use tracing::debug;

use crate::error::WriteError;
use crate::proxy::StorageProxy;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub keyspace: String,
    pub table: String,
    pub key: Bytes,
}

impl RowKey {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        key: impl Into<Bytes>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            key: key.into(),
        }
    }

    fn of(mutation: &Mutation) -> Self {
        Self {
            keyspace: mutation.keyspace.clone(),
            table: mutation.table.clone(),
            key: mutation.key.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
    // None marks a tombstone
    value: Option<Bytes>,
    timestamp: i64,
}

/// Last-write-wins row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: BTreeMap<String, Cell>,
    deleted_at: Option<i64>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Bytes> {
        self.cells.get(column).and_then(|c| c.value.as_ref())
    }

    /// Live columns in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Bytes)> {
        self.cells
            .iter()
            .filter_map(|(name, cell)| cell.value.as_ref().map(|v| (name.as_str(), v)))
    }

    fn shadowed(&self, timestamp: i64) -> bool {
        self.deleted_at.is_some_and(|d| timestamp <= d)
    }

    fn put(&mut self, column: &str, value: Option<Bytes>, timestamp: i64) {
        match self.cells.get(column) {
            Some(existing) if existing.timestamp > timestamp => {}
            _ => {
                self.cells.insert(column.to_string(), Cell { value, timestamp });
            }
        }
    }

    fn apply(&mut self, change: &ColumnChange) {
        let timestamp = change.timestamp();
        if self.shadowed(timestamp) {
            return;
        }
        match change {
            ColumnChange::Write { column, value, .. } => {
                self.put(column, Some(value.clone()), timestamp)
            }
            ColumnChange::Delete { column, .. } => self.put(column, None, timestamp),
            ColumnChange::DeleteRow { .. } => {
                self.deleted_at = Some(timestamp);
                self.cells.retain(|_, cell| cell.timestamp > timestamp);
            }
        }
    }
}

/// Outcome of an accepted write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResponse {
    pub applied: usize,
    pub consistency: ConsistencyLevel,
    pub acknowledged: usize,
}

/// Single-process stand-in for a replicated write coordinator.
///
/// Replica availability is simulated: a write is rejected with
/// [`WriteError::Unavailable`] when fewer replicas are live than its
/// consistency level requires.
pub struct MemoryStorageProxy {
    rows: scc::HashMap<RowKey, Row>,
    replicas: usize,
    live: AtomicUsize,
}

impl MemoryStorageProxy {
    pub fn new(replicas: usize) -> Self {
        let replicas = replicas.max(1);
        Self {
            rows: scc::HashMap::new(),
            replicas,
            live: AtomicUsize::new(replicas),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn live_replicas(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Mark `live` replicas as reachable, capped at the replication factor.
    pub fn set_live_replicas(&self, live: usize) {
        self.live.store(live.min(self.replicas), Ordering::Release);
    }

    pub async fn get(&self, key: &RowKey) -> Option<Row> {
        self.rows.read_async(key, |_, row| row.clone()).await
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_available(&self, consistency: ConsistencyLevel) -> Result<usize, WriteError> {
        let alive = self.live_replicas();
        let required = consistency.block_for(self.replicas);
        if alive < required {
            return Err(WriteError::Unavailable {
                consistency,
                required,
                alive,
            });
        }
        Ok(alive)
    }

    async fn apply(&self, mutation: &Mutation) {
        match self.rows.entry_async(RowKey::of(mutation)).await {
            Occupied(mut occupied) => {
                let row = occupied.get_mut();
                for change in &mutation.changes {
                    row.apply(change);
                }
            }
            Vacant(vacant) => {
                let mut row = Row::default();
                for change in &mutation.changes {
                    row.apply(change);
                }
                vacant.insert_entry(row);
            }
        }
    }
}

#[async_trait]
impl StorageProxy for MemoryStorageProxy {
    type Response = WriteResponse;
    type Error = WriteError;

    /// Mutations are applied one at a time; an invalid mutation fails the
    /// call after the ones before it have been applied.
    async fn mutate(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<WriteResponse, WriteError> {
        let acknowledged = self.check_available(consistency)?;
        for mutation in mutations {
            mutation.validate()?;
            self.apply(mutation).await;
        }
        debug!(applied = mutations.len(), %consistency, "mutate applied");
        Ok(WriteResponse {
            applied: mutations.len(),
            consistency,
            acknowledged,
        })
    }

    async fn mutate_atomically(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<WriteResponse, WriteError> {
        let acknowledged = self.check_available(consistency)?;
        for mutation in mutations {
            mutation.validate()?;
        }
        for mutation in mutations {
            self.apply(mutation).await;
        }
        debug!(
            applied = mutations.len(),
            %consistency,
            "mutate_atomically applied"
        );
        Ok(WriteResponse {
            applied: mutations.len(),
            consistency,
            acknowledged,
        })
    }
}
