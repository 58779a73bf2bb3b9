pub mod channel;
pub mod logging;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cstream_models::MutationBatch;
use futures_util::FutureExt;

use crate::error::TriggerError;

pub use channel::ChannelGateway;
pub use logging::LoggingGateway;

/// Single call-in point of the trigger subsystem.
///
/// `dispatch` is awaited in-line by the write path after a successful write;
/// whatever it returns is recorded, never handed back to the writer.
#[async_trait]
pub trait TriggerGateway: Send + Sync {
    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError>;
}

#[async_trait]
impl<G: TriggerGateway + ?Sized> TriggerGateway for Arc<G> {
    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError> {
        (**self).dispatch(mutations).await
    }
}

/// Gateway backed by a synchronous closure.
pub struct FnGateway<F> {
    f: F,
}

impl<F> FnGateway<F>
where
    F: Fn(&MutationBatch) -> Result<(), TriggerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> TriggerGateway for FnGateway<F>
where
    F: Fn(&MutationBatch) -> Result<(), TriggerError> + Send + Sync,
{
    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError> {
        (self.f)(mutations)
    }
}

/// Run `gateway.dispatch`, turning a panic or an elapsed `timeout` into a
/// [`TriggerError`].
pub(crate) async fn dispatch_guarded<G>(
    gateway: &G,
    mutations: &MutationBatch,
    timeout: Option<Duration>,
) -> Result<(), TriggerError>
where
    G: TriggerGateway + ?Sized,
{
    let call = gateway.dispatch(mutations);
    let call = AssertUnwindSafe(call).catch_unwind();
    let outcome = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(TriggerError::Timeout(timeout)),
        },
        None => call.await,
    };
    match outcome {
        Ok(res) => res,
        Err(panic) => Err(TriggerError::Panicked(panic_message(panic))),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
