use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ModelError;

/// Microseconds since the unix epoch, the write timestamp resolution used
/// for last-write-wins reconciliation.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
}

/// A single column-level change carried by a [`Mutation`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnChange {
    Write {
        column: String,
        value: Bytes,
        timestamp: i64,
    },
    Delete {
        column: String,
        timestamp: i64,
    },
    DeleteRow {
        timestamp: i64,
    },
}

impl ColumnChange {
    pub fn timestamp(&self) -> i64 {
        match self {
            ColumnChange::Write { timestamp, .. }
            | ColumnChange::Delete { timestamp, .. }
            | ColumnChange::DeleteRow { timestamp } => *timestamp,
        }
    }
}

/// Row-level change against one `keyspace.table` partition key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mutation {
    pub keyspace: String,
    pub table: String,
    pub key: Bytes,
    pub changes: Vec<ColumnChange>,
}

impl Mutation {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        key: impl Into<Bytes>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            key: key.into(),
            changes: Vec::new(),
        }
    }

    pub fn set(self, column: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.set_at(column, value, now_micros())
    }

    pub fn set_at(
        mut self,
        column: impl Into<String>,
        value: impl Into<Bytes>,
        timestamp: i64,
    ) -> Self {
        self.changes.push(ColumnChange::Write {
            column: column.into(),
            value: value.into(),
            timestamp,
        });
        self
    }

    pub fn delete(mut self, column: impl Into<String>) -> Self {
        self.changes.push(ColumnChange::Delete {
            column: column.into(),
            timestamp: now_micros(),
        });
        self
    }

    pub fn delete_row(mut self) -> Self {
        self.changes.push(ColumnChange::DeleteRow {
            timestamp: now_micros(),
        });
        self
    }

    /// `keyspace.table` the mutation targets.
    pub fn target(&self) -> String {
        format!("{}.{}", self.keyspace, self.table)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.keyspace.is_empty() {
            return Err(ModelError::MissingTarget("keyspace"));
        }
        if self.table.is_empty() {
            return Err(ModelError::MissingTarget("table"));
        }
        if self.key.is_empty() {
            return Err(ModelError::EmptyKey(self.target()));
        }
        Ok(())
    }
}

/// Ordered mutations submitted by a single logical write.
///
/// The batch exposes no in-place mutation once built; the write path and
/// every observer of a write share it by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct MutationBatch {
    mutations: Vec<Mutation>,
}

impl MutationBatch {
    pub fn new(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.mutations.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn first(&self) -> Option<&Mutation> {
        self.mutations.first()
    }

    pub fn into_inner(self) -> Vec<Mutation> {
        self.mutations
    }
}

impl From<Vec<Mutation>> for MutationBatch {
    fn from(mutations: Vec<Mutation>) -> Self {
        Self::new(mutations)
    }
}

impl From<Mutation> for MutationBatch {
    fn from(mutation: Mutation) -> Self {
        Self::new(vec![mutation])
    }
}

impl FromIterator<Mutation> for MutationBatch {
    fn from_iter<T: IntoIterator<Item = Mutation>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a MutationBatch {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}

impl AsRef<[Mutation]> for MutationBatch {
    fn as_ref(&self) -> &[Mutation] {
        &self.mutations
    }
}
