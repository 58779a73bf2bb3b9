use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cstream_models::{ConsistencyLevel, MutationBatch};

/// Write-coordination component of the storage engine.
///
/// Both entry points take the batch by reference so that wrappers can
/// observe exactly the batch the inner write path applied.
#[async_trait]
pub trait StorageProxy: Send + Sync {
    type Response: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Apply each mutation of the batch independently.
    async fn mutate(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error>;

    /// Apply the batch all-or-nothing.
    async fn mutate_atomically(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error>;
}

#[async_trait]
impl<P: StorageProxy + ?Sized> StorageProxy for Arc<P> {
    type Response = P::Response;
    type Error = P::Error;

    async fn mutate(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error> {
        (**self).mutate(mutations, consistency).await
    }

    async fn mutate_atomically(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error> {
        (**self).mutate_atomically(mutations, consistency).await
    }
}

#[async_trait]
impl<P: StorageProxy + ?Sized> StorageProxy for Box<P> {
    type Response = P::Response;
    type Error = P::Error;

    async fn mutate(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error> {
        (**self).mutate(mutations, consistency).await
    }

    async fn mutate_atomically(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error> {
        (**self).mutate_atomically(mutations, consistency).await
    }
}

/// Which write entry point an invocation came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Mutate,
    MutateAtomically,
}

impl EntryPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Mutate => "mutate",
            EntryPoint::MutateAtomically => "mutate_atomically",
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
