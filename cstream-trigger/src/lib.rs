pub mod error;
pub mod gateway;
pub mod interceptor;
pub mod memory;
pub mod proxy;

use std::sync::Arc;
use std::time::Duration;

use envconfig::Envconfig;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use cstream_models::{ColumnChange, ConsistencyLevel, ModelError, Mutation, MutationBatch};
pub use error::{TriggerError, WriteError};
pub use gateway::{ChannelGateway, FnGateway, LoggingGateway, TriggerGateway};
pub use interceptor::TriggeredStorageProxy;
pub use memory::{MemoryStorageProxy, Row, RowKey, WriteResponse};
pub use proxy::{EntryPoint, StorageProxy};

#[derive(Envconfig, Clone, Debug)]
pub struct CstreamConfig {
    #[envconfig(from = "CSTREAM_TRIGGERS_ENABLED", default = "true")]
    pub triggers_enabled: bool,
    #[envconfig(from = "CSTREAM_TRIGGER_TIMEOUT_MS", default = "0")]
    pub trigger_timeout_ms: u64,
    #[envconfig(from = "CSTREAM_TRIGGER_QUEUE_BOUND", default = "0")]
    pub trigger_queue_bound: usize,
    #[envconfig(from = "CSTREAM_REPLICAS", default = "3")]
    pub replicas: usize,
    #[envconfig(from = "CSTREAM_LIVE_REPLICAS")]
    pub live_replicas: Option<usize>,
}

impl Default for CstreamConfig {
    fn default() -> Self {
        Self {
            triggers_enabled: true,
            trigger_timeout_ms: 0,
            trigger_queue_bound: 0,
            replicas: 3,
            live_replicas: None,
        }
    }
}

impl CstreamConfig {
    /// `None` when dispatch may run for as long as the gateway needs.
    pub fn trigger_timeout(&self) -> Option<Duration> {
        (self.trigger_timeout_ms > 0)
            .then(|| Duration::from_millis(self.trigger_timeout_ms))
    }
}

pub type DynStorageProxy = Arc<dyn StorageProxy<Response = WriteResponse, Error = WriteError>>;

/// Write path assembled by [`build_write_path`].
pub struct WritePath {
    proxy: DynStorageProxy,
    consumer: Option<JoinHandle<()>>,
}

impl WritePath {
    pub fn proxy(&self) -> &DynStorageProxy {
        &self.proxy
    }

    /// Whether triggers are delivered through a background queue.
    pub fn is_queued(&self) -> bool {
        self.consumer.is_some()
    }

    /// Drop the write path and wait until every queued batch has been handed
    /// to the gateway. Clones of [`WritePath::proxy`] keep the queue open.
    pub async fn close(self) {
        let Self { proxy, consumer } = self;
        drop(proxy);
        if let Some(consumer) = consumer {
            if let Err(e) = consumer.await {
                error!(error = %e, "trigger queue consumer stopped abnormally");
            }
        }
    }
}

/// Wrap `engine` with trigger dispatch according to `conf`.
///
/// With `trigger_queue_bound > 0` the gateway sits behind a bounded queue
/// drained by a task on the current tokio runtime instead of running
/// in-line; building that queue outside a runtime fails. The configured
/// timeout bounds the in-line dispatch, or both the enqueue and each queued
/// delivery.
pub fn build_write_path<G>(
    conf: &CstreamConfig,
    engine: Arc<MemoryStorageProxy>,
    gateway: G,
) -> Result<WritePath, TriggerError>
where
    G: TriggerGateway + 'static,
{
    if !conf.triggers_enabled {
        info!("triggers disabled; write path is not intercepted");
        return Ok(WritePath {
            proxy: engine,
            consumer: None,
        });
    }
    if conf.trigger_queue_bound > 0 {
        info!(
            bound = conf.trigger_queue_bound,
            "dispatching triggers through a bounded queue"
        );
        let (queued, rx) = ChannelGateway::new(conf.trigger_queue_bound);
        let consumer = ChannelGateway::pipe(rx, gateway, conf.trigger_timeout())?;
        let proxy = with_timeout(TriggeredStorageProxy::new(engine, queued), conf);
        return Ok(WritePath {
            proxy: Arc::new(proxy),
            consumer: Some(consumer),
        });
    }
    let proxy = with_timeout(TriggeredStorageProxy::new(engine, gateway), conf);
    Ok(WritePath {
        proxy: Arc::new(proxy),
        consumer: None,
    })
}

fn with_timeout<P, G>(
    proxy: TriggeredStorageProxy<P, G>,
    conf: &CstreamConfig,
) -> TriggeredStorageProxy<P, G>
where
    P: StorageProxy,
    G: TriggerGateway,
{
    match conf.trigger_timeout() {
        Some(timeout) => proxy.with_dispatch_timeout(timeout),
        None => proxy,
    }
}
