use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;
use clap::Parser;
use cstream_trigger::{
    ConsistencyLevel, CstreamConfig, LoggingGateway, MemoryStorageProxy, ModelError, Mutation,
    MutationBatch, RowKey, StorageProxy, build_write_path,
};
use envconfig::Envconfig;
use tracing::{error, info};

/// Apply a row mutation through the trigger-dispatching write path.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[arg(long, default_value = "demo")]
    keyspace: String,
    #[arg(long, default_value = "events")]
    table: String,
    /// Partition key of the row
    #[arg(long)]
    key: String,
    /// Column assignment in `column=value` form
    #[arg(long = "set", value_parser = parse_assignment)]
    sets: Vec<(String, Bytes)>,
    /// Column to delete
    #[arg(long = "delete")]
    deletes: Vec<String>,
    /// Go through the atomic batch entry point
    #[arg(long)]
    atomic: bool,
    #[arg(long, default_value = "ONE")]
    consistency: ConsistencyLevel,
    /// Issue the same write this many times
    #[arg(long, default_value_t = 1)]
    repeat: usize,
}

fn parse_assignment(s: &str) -> Result<(String, Bytes), ModelError> {
    match s.split_once('=') {
        Some((column, value)) if !column.is_empty() => {
            Ok((column.to_string(), Bytes::from(value.to_string())))
        }
        _ => Err(ModelError::MalformedAssignment(s.to_string())),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_log();
    let cli = Cli::parse();
    let conf = CstreamConfig::init_from_env()?;

    let engine = Arc::new(MemoryStorageProxy::new(conf.replicas));
    if let Some(live) = conf.live_replicas {
        engine.set_live_replicas(live);
    }
    let write_path = build_write_path(&conf, engine.clone(), LoggingGateway)?;

    let mut mutation = Mutation::new(&*cli.keyspace, &*cli.table, cli.key.clone());
    for (column, value) in cli.sets {
        mutation = mutation.set(column, value);
    }
    for column in cli.deletes {
        mutation = mutation.delete(column);
    }
    let batch = MutationBatch::from(mutation);
    info!(batch = %serde_json::to_string(&batch)?, "prepared batch");

    let proxy = write_path.proxy();
    for attempt in 1..=cli.repeat {
        let res = if cli.atomic {
            proxy.mutate_atomically(&batch, cli.consistency).await
        } else {
            proxy.mutate(&batch, cli.consistency).await
        };
        match res {
            Ok(resp) => info!(
                attempt,
                applied = resp.applied,
                acknowledged = resp.acknowledged,
                consistency = %resp.consistency,
                "write accepted"
            ),
            Err(e) => {
                error!(attempt, error = %e, "write rejected");
                return Err(e.into());
            }
        }
    }

    write_path.close().await;

    let key = RowKey::new(cli.keyspace, cli.table, cli.key);
    match engine.get(&key).await {
        Some(row) => {
            for (column, value) in row.columns() {
                println!("{column} = {}", String::from_utf8_lossy(value));
            }
        }
        None => println!("row not found"),
    }
    Ok(())
}

fn init_log() {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("CSTREAM_LOG")
                .from_env_lossy(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_column_assignments() {
        assert_eq!(
            parse_assignment("name=alice"),
            Ok(("name".to_string(), Bytes::from("alice")))
        );
        assert_eq!(
            parse_assignment("expr=a=b"),
            Ok(("expr".to_string(), Bytes::from("a=b")))
        );
        assert!(parse_assignment("=x").is_err());
        assert_eq!(
            parse_assignment("novalue"),
            Err(ModelError::MalformedAssignment("novalue".to_string()))
        );
    }

    #[test]
    fn cli_accepts_repeated_sets() {
        let cli = Cli::try_parse_from([
            "cstream-trigger",
            "--key",
            "u1",
            "--set",
            "a=1",
            "--set",
            "b=2",
            "--consistency",
            "quorum",
            "--atomic",
        ])
        .unwrap();
        assert_eq!(cli.sets.len(), 2);
        assert_eq!(cli.consistency, ConsistencyLevel::Quorum);
        assert!(cli.atomic);
        assert_eq!(cli.repeat, 1);
    }
}
