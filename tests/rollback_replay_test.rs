//! Reorg handling: rolling back to a block and reapplying must converge to
//! the state of a clean replay of the surviving chain.

use outcome_ledger::compile::{EventShape, Indexer};
use outcome_ledger::datasource::{JsonLinesEventSource, MockMarketMetadata};
use outcome_ledger::db::{init_db, JournalStatus, Repository};
use outcome_ledger::domain::{BlockTime, MarketId, RawEvent};
use outcome_ledger::engine::{AccountingParams, PositionBalance};
use outcome_ledger::Orchestrator;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

const SHARE: i128 = 1_000_000_000_000_000_000;
const USDC: i128 = 1_000_000;

async fn setup_indexer(dir: &TempDir, name: &str) -> Indexer {
    let db_path = dir.path().join(name).to_string_lossy().to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    Indexer::new(
        Arc::new(Repository::new(pool)),
        EventShape::Current,
        AccountingParams::default(),
        Arc::new(MockMarketMetadata::new().with_market(MarketId::new("0xf-7"), 2)),
    )
}

fn swap(tx: &str, block: u64, outcome: u32, collateral: i128, shares: i128) -> RawEvent {
    RawEvent {
        tx_hash: tx.to_string(),
        log_index: 0,
        block_number: block,
        block_timestamp: BlockTime::new(1_000 + block as i64),
        contract_address: "0xf".to_string(),
        event_name: "SharesSwapped".to_string(),
        parameters: json!({
            "user": "0xbob",
            "marketId": "7",
            "outcomeIndex": outcome,
            "collateral": collateral.to_string(),
            "shares": shares.to_string(),
        })
        .as_object()
        .cloned()
        .unwrap(),
    }
}

fn claim(tx: &str, block: u64, outcome: u32) -> RawEvent {
    RawEvent {
        tx_hash: tx.to_string(),
        log_index: 0,
        block_number: block,
        block_timestamp: BlockTime::new(1_000 + block as i64),
        contract_address: "0xf".to_string(),
        event_name: "WinningsClaimed".to_string(),
        parameters: json!({
            "user": "0xbob",
            "marketId": "7",
            "outcomeIndex": outcome,
            "amount": (10 * SHARE).to_string(),
            "payout": (10 * USDC).to_string(),
        })
        .as_object()
        .cloned()
        .unwrap(),
    }
}

fn canonical_chain() -> Vec<RawEvent> {
    vec![
        swap("0x01", 1, 0, -5 * USDC, 10 * SHARE),
        swap("0x02", 2, 1, -4 * USDC, 10 * SHARE),
        swap("0x03", 3, 0, -6 * USDC, 10 * SHARE),
        claim("0x04", 4, 0),
    ]
}

#[tokio::test]
async fn test_rollback_matches_clean_replay_of_prefix() {
    let dir = TempDir::new().unwrap();
    let full = setup_indexer(&dir, "full.db").await;
    full.apply_batch(canonical_chain()).await.unwrap();

    let summary = full.rollback_to(2).await.unwrap();
    assert_eq!(summary.events_removed, 2);
    assert_eq!(full.repo().cursor().await.unwrap(), Some((2, 0)));
    assert_eq!(full.repo().journal_status("0x03-0").await.unwrap(), None);

    let prefix = setup_indexer(&dir, "prefix.db").await;
    prefix
        .apply_batch(canonical_chain().into_iter().take(2).collect())
        .await
        .unwrap();

    assert_eq!(
        full.repo().state_digest().await.unwrap(),
        prefix.repo().state_digest().await.unwrap()
    );
}

#[tokio::test]
async fn test_reapply_after_rollback_converges() {
    let dir = TempDir::new().unwrap();
    let indexer = setup_indexer(&dir, "ledger.db").await;
    indexer.apply_batch(canonical_chain()).await.unwrap();
    let digest = indexer.repo().state_digest().await.unwrap();

    indexer.rollback_to(1).await.unwrap();
    let summary = indexer.apply_batch(canonical_chain()).await.unwrap();
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.applied, 3);
    assert_eq!(indexer.repo().state_digest().await.unwrap(), digest);
}

#[tokio::test]
async fn test_revised_chain_after_reorg() {
    let dir = TempDir::new().unwrap();
    let indexer = setup_indexer(&dir, "ledger.db").await;
    indexer.apply_batch(canonical_chain()).await.unwrap();

    // Blocks 3 and 4 are replaced: outcome 1 wins instead.
    indexer.rollback_to(2).await.unwrap();
    let revised = vec![
        swap("0x01", 1, 0, -5 * USDC, 10 * SHARE),
        swap("0x02", 2, 1, -4 * USDC, 10 * SHARE),
        claim("0x3b", 3, 1),
    ];
    indexer.apply_batch(revised.clone()).await.unwrap();

    let fresh = setup_indexer(&dir, "fresh.db").await;
    fresh.apply_batch(revised).await.unwrap();
    assert_eq!(
        indexer.repo().state_digest().await.unwrap(),
        fresh.repo().state_digest().await.unwrap()
    );

    let zero: PositionBalance = indexer.repo().get("0xbob-0xf-7-0").await.unwrap().unwrap();
    assert!(!zero.open);
    assert_eq!(zero.shares_big_int.raw(), 10 * SHARE);
    assert_eq!(
        indexer.repo().journal_status("0x04-0").await.unwrap(),
        None
    );
    assert_eq!(
        indexer.repo().journal_status("0x3b-0").await.unwrap(),
        Some(JournalStatus::Applied)
    );
}

#[tokio::test]
async fn test_orchestrated_replay_from_lz4_log() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("events.jsonl.lz4");
    let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
    for event in canonical_chain().into_iter().rev() {
        writeln!(encoder, "{}", serde_json::to_string(&event).unwrap()).unwrap();
    }
    std::fs::write(&log_path, encoder.finish().unwrap()).unwrap();

    let indexer = Arc::new(setup_indexer(&dir, "ledger.db").await);
    let orchestrator = Orchestrator::new(Arc::new(JsonLinesEventSource::new(&log_path)), indexer.clone());

    let summary = orchestrator.replay(None).await.unwrap();
    assert_eq!(summary.fetched, 4);
    assert_eq!(summary.batch.applied, 4);
    assert_eq!(summary.cursor, Some((4, 0)));

    let direct = setup_indexer(&dir, "direct.db").await;
    direct.apply_batch(canonical_chain()).await.unwrap();
    assert_eq!(summary.state_digest, direct.repo().state_digest().await.unwrap());
}
