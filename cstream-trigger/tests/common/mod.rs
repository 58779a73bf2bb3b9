#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use cstream_trigger::{Mutation, MutationBatch, TriggerError, TriggerGateway};

/// One observed dispatch.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub batch_addr: usize,
    pub mutations: Vec<Mutation>,
}

impl Dispatched {
    pub fn keys(&self) -> Vec<String> {
        self.mutations
            .iter()
            .map(|m| String::from_utf8_lossy(&m.key).into_owned())
            .collect()
    }
}

#[derive(Default)]
pub struct RecordingGateway {
    seen: Mutex<Vec<Dispatched>>,
}

impl RecordingGateway {
    pub fn dispatched(&self) -> Vec<Dispatched> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl TriggerGateway for RecordingGateway {
    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError> {
        self.seen.lock().unwrap().push(Dispatched {
            batch_addr: addr_of(mutations),
            mutations: mutations.as_slice().to_vec(),
        });
        Ok(())
    }
}

/// Records the dispatch, then fails the way the configured mode says.
pub struct FaultyGateway {
    pub mode: Fault,
    pub inner: RecordingGateway,
}

pub enum Fault {
    Error,
    Panic,
    /// Panic on the first dispatch only.
    PanicFirst,
    Hang(Duration),
}

impl FaultyGateway {
    pub fn new(mode: Fault) -> Self {
        Self {
            mode,
            inner: RecordingGateway::default(),
        }
    }
}

#[async_trait]
impl TriggerGateway for FaultyGateway {
    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError> {
        self.inner.dispatch(mutations).await?;
        match self.mode {
            Fault::Error => Err(TriggerError::execution("trigger rejected batch")),
            Fault::Panic => panic!("trigger crashed"),
            Fault::PanicFirst if self.inner.count() == 1 => panic!("trigger crashed"),
            Fault::PanicFirst => Ok(()),
            Fault::Hang(d) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }
}

pub fn addr_of(batch: &MutationBatch) -> usize {
    batch as *const MutationBatch as usize
}

pub fn row(key: &str) -> Mutation {
    Mutation::new("ks", "users", key.to_string()).set("name", key.to_string())
}

pub fn batch_of(keys: &[&str]) -> MutationBatch {
    keys.iter().map(|k| row(k)).collect()
}
