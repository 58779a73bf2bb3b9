use std::time::Duration;

use async_trait::async_trait;
use cstream_models::MutationBatch;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error};

use super::{TriggerGateway, dispatch_guarded};
use crate::error::TriggerError;

/// Hands committed batches to a bounded queue drained elsewhere.
///
/// `dispatch` waits for queue capacity, so a slow consumer slows the write
/// path down instead of dropping batches. Batches still queued when the
/// process stops are lost unless the consumer task is awaited first.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    tx: Sender<MutationBatch>,
}

impl ChannelGateway {
    pub fn new(bound: usize) -> (Self, Receiver<MutationBatch>) {
        let (tx, rx) = mpsc::channel(bound.max(1));
        (Self { tx }, rx)
    }

    /// Drain `receiver` into `downstream` on a background task until every
    /// sender is dropped.
    ///
    /// A downstream error, panic or elapsed `timeout` is logged and the
    /// consumer moves on to the next batch. Fails when called outside a
    /// tokio runtime.
    pub fn pipe<G>(
        mut receiver: Receiver<MutationBatch>,
        downstream: G,
        timeout: Option<Duration>,
    ) -> Result<JoinHandle<()>, TriggerError>
    where
        G: TriggerGateway + 'static,
    {
        let runtime = Handle::try_current().map_err(TriggerError::from)?;
        let consumer = async move {
            while let Some(batch) = receiver.recv().await {
                if let Err(e) = dispatch_guarded(&downstream, &batch, timeout).await {
                    error!(
                        mutations = batch.len(),
                        error = %e,
                        "queued trigger dispatch failed"
                    );
                }
            }
            debug!("trigger queue closed");
        };
        Ok(runtime.spawn(consumer.in_current_span()))
    }
}

#[async_trait]
impl TriggerGateway for ChannelGateway {
    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError> {
        self.tx
            .send(mutations.clone())
            .await
            .map_err(|_| TriggerError::ChannelClosed)
    }
}
