use async_trait::async_trait;
use cstream_models::MutationBatch;
use tracing::info;

use super::TriggerGateway;
use crate::error::TriggerError;

/// Gateway that records every committed mutation in the log and does
/// nothing else.
#[derive(Debug, Clone, Default)]
pub struct LoggingGateway;

#[async_trait]
impl TriggerGateway for LoggingGateway {
    async fn dispatch(&self, mutations: &MutationBatch) -> Result<(), TriggerError> {
        if mutations.is_empty() {
            info!("committed empty mutation batch");
            return Ok(());
        }
        for (idx, mutation) in mutations.iter().enumerate() {
            info!(
                idx,
                table = %mutation.target(),
                key = %String::from_utf8_lossy(&mutation.key),
                changes = mutation.changes.len(),
                "committed mutation"
            );
        }
        Ok(())
    }
}
