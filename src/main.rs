use anyhow::Context;
use outcome_ledger::config::{Config, MetadataSource};
use outcome_ledger::datasource::{
    CachedMarketMetadata, HttpMarketMetadata, JsonLinesEventSource, MarketMetadata,
    NoMarketMetadata, StaticMarketMetadata,
};
use outcome_ledger::{init_db, EventSource, Indexer, Orchestrator, Repository};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("Failed to initialize database at {}", config.database_path))?;
    let repo = Arc::new(Repository::new(pool));

    let metadata: Arc<dyn MarketMetadata> = match &config.metadata_source {
        MetadataSource::None => Arc::new(NoMarketMetadata),
        MetadataSource::File(path) => Arc::new(
            StaticMarketMetadata::from_file(path)
                .with_context(|| format!("Failed to load market metadata from {}", path))?,
        ),
        MetadataSource::Http(url) => Arc::new(HttpMarketMetadata::new(url.clone())),
    };
    let metadata = Arc::new(CachedMarketMetadata::new(metadata));

    let indexer = Arc::new(Indexer::new(
        repo.clone(),
        config.event_shape,
        config.accounting_params(),
        metadata,
    ));

    let Some(events_path) = config.events_path.clone() else {
        if let Some(block) = config.rollback_to_block {
            let summary = indexer.rollback_to(block).await?;
            tracing::info!(?summary, "Rollback complete, no EVENTS_PATH set");
            return Ok(());
        }
        anyhow::bail!("EVENTS_PATH is required to replay events");
    };

    let source: Arc<dyn EventSource> = Arc::new(JsonLinesEventSource::new(events_path));
    let orchestrator =
        Orchestrator::new(source, indexer).with_history_retention(config.history_retention_blocks);
    let summary = orchestrator.replay(config.rollback_to_block).await?;

    tracing::info!(
        fetched = summary.fetched,
        applied = summary.batch.applied,
        duplicates = summary.batch.duplicates,
        ignored = summary.batch.ignored,
        malformed = summary.batch.malformed,
        out_of_order = summary.batch.out_of_order,
        history_pruned = summary.history_pruned,
        state_digest = %summary.state_digest,
        "Ledger replay finished"
    );
    Ok(())
}
