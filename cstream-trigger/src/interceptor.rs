//! Post-commit trigger dispatch around a [`StorageProxy`].
//!
//! [`TriggeredStorageProxy`] implements the same write interface as the proxy
//! it wraps. Each call is delegated unchanged; once the inner write reports
//! success the very same batch is handed to the [`TriggerGateway`]. Gateway
//! errors, panics and timeouts are logged and dropped, so the caller always
//! sees the inner write's own result.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use cstream_models::{ConsistencyLevel, MutationBatch};
use tracing::{debug, error, info};

use crate::error::TriggerError;
use crate::gateway::{TriggerGateway, dispatch_guarded};
use crate::proxy::{EntryPoint, StorageProxy};

pub struct TriggeredStorageProxy<P, G> {
    inner: P,
    gateway: G,
    dispatch_timeout: Option<Duration>,
}

impl<P, G> TriggeredStorageProxy<P, G>
where
    P: StorageProxy,
    G: TriggerGateway,
{
    pub fn new(inner: P, gateway: G) -> Self {
        Self {
            inner,
            gateway,
            dispatch_timeout: None,
        }
    }

    /// Abandon a dispatch that runs longer than `timeout`. The abandoned
    /// dispatch is recorded as a failure.
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = Some(timeout);
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    async fn intercept<T, E, F>(
        &self,
        entry: EntryPoint,
        mutations: &MutationBatch,
        write: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        info!(
            %entry,
            mutations = mutations.len(),
            "mutation interceptor invoked"
        );
        let result = write.await;
        if result.is_ok() {
            if let Err(e) = self.dispatch(mutations).await {
                error!(
                    %entry,
                    mutations = mutations.len(),
                    first_target = %mutations.first().map(|m| m.target()).unwrap_or_default(),
                    error = %e,
                    "failed to process mutations"
                );
            }
        }
        result
    }

    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError> {
        let timeout = self.dispatch_timeout;
        dispatch_guarded(&self.gateway, mutations, timeout).await?;
        debug!(mutations = mutations.len(), "mutations dispatched");
        Ok(())
    }
}

#[async_trait]
impl<P, G> StorageProxy for TriggeredStorageProxy<P, G>
where
    P: StorageProxy,
    G: TriggerGateway,
{
    type Response = P::Response;
    type Error = P::Error;

    async fn mutate(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error> {
        self.intercept(
            EntryPoint::Mutate,
            mutations,
            self.inner.mutate(mutations, consistency),
        )
        .await
    }

    async fn mutate_atomically(
        &self,
        mutations: &MutationBatch,
        consistency: ConsistencyLevel,
    ) -> Result<Self::Response, Self::Error> {
        self.intercept(
            EntryPoint::MutateAtomically,
            mutations,
            self.inner.mutate_atomically(mutations, consistency),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::FnGateway;
    use cstream_models::Mutation;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("write rejected: {0}")]
    struct Rejected(&'static str);

    /// Inner proxy returning a scripted result and counting calls.
    struct Scripted {
        fail: bool,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(fail: bool) -> Self {
            Self {
                fail,
                calls: AtomicUsize::new(0),
            }
        }

        fn outcome(&self, n: usize) -> Result<usize, Rejected> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Rejected("quorum"))
            } else {
                Ok(n)
            }
        }
    }

    #[async_trait]
    impl StorageProxy for Scripted {
        type Response = usize;
        type Error = Rejected;

        async fn mutate(
            &self,
            mutations: &MutationBatch,
            _consistency: ConsistencyLevel,
        ) -> Result<usize, Rejected> {
            self.outcome(mutations.len())
        }

        async fn mutate_atomically(
            &self,
            mutations: &MutationBatch,
            _consistency: ConsistencyLevel,
        ) -> Result<usize, Rejected> {
            self.outcome(mutations.len() + 100)
        }
    }

    fn batch(n: usize) -> MutationBatch {
        (0..n)
            .map(|i| Mutation::new("ks", "t", format!("k{i}")))
            .collect()
    }

    #[tokio::test]
    async fn passes_the_same_batch_reference_to_the_gateway() {
        let seen = Mutex::new(Vec::new());
        let gateway = FnGateway::new(|b: &MutationBatch| {
            seen.lock().unwrap().push(b as *const MutationBatch as usize);
            Ok(())
        });
        let proxy = TriggeredStorageProxy::new(Scripted::new(false), gateway);
        let b = batch(2);
        let res = proxy.mutate(&b, ConsistencyLevel::One).await;
        assert_eq!(res, Ok(2));
        drop(proxy);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![&b as *const MutationBatch as usize]
        );
    }

    #[tokio::test]
    async fn atomic_path_returns_inner_response_untouched() {
        let calls = AtomicUsize::new(0);
        let gateway = FnGateway::new(|_: &MutationBatch| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let proxy = TriggeredStorageProxy::new(Scripted::new(false), gateway);
        let res = proxy
            .mutate_atomically(&batch(3), ConsistencyLevel::All)
            .await;
        assert_eq!(res, Ok(103));
        assert_eq!(proxy.inner().calls.load(Ordering::SeqCst), 1);
        drop(proxy);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_write_skips_dispatch() {
        let calls = AtomicUsize::new(0);
        let gateway = FnGateway::new(|_: &MutationBatch| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let proxy = TriggeredStorageProxy::new(Scripted::new(true), gateway);
        let res = proxy.mutate(&batch(1), ConsistencyLevel::Quorum).await;
        assert_eq!(res, Err(Rejected("quorum")));
        let res = proxy
            .mutate_atomically(&batch(1), ConsistencyLevel::Quorum)
            .await;
        assert_eq!(res, Err(Rejected("quorum")));
        drop(proxy);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gateway_error_does_not_reach_caller() {
        let gateway = FnGateway::new(|_: &MutationBatch| Err(TriggerError::execution("boom")));
        let proxy = TriggeredStorageProxy::new(Scripted::new(false), gateway);
        assert_eq!(proxy.mutate(&batch(1), ConsistencyLevel::One).await, Ok(1));
    }

    #[tokio::test]
    async fn dispatch_reports_panics_as_errors() {
        let gateway = FnGateway::new(|_: &MutationBatch| -> Result<(), TriggerError> {
            panic!("trigger blew up")
        });
        let proxy = TriggeredStorageProxy::new(Scripted::new(false), gateway);
        let res = proxy.dispatch(&batch(1)).await;
        assert!(matches!(res, Err(TriggerError::Panicked(msg)) if msg == "trigger blew up"));
    }
}
