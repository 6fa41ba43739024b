//! End-to-end walkthrough against the in-memory store
//!
//! Seeds two stores, compares them, copies the differences across, then
//! imports a dotenv file and exports the result.
//!
//! Run with:
//! ```bash
//! cargo run -p core-service --example compare_stores
//!
//! # JSON logs
//! cargo run -p core-service --example compare_stores -- json
//! ```

use anyhow::Context;
use bridge_memory::InMemorySecretStore;
use bridge_traits::StoreRef;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_runtime::CoreConfig;
use core_service::VaultSyncService;
use core_sync::{ConflictPolicy, SyncScope};
use core_transfer::{ExportOptions, TransferFormat};
use std::env;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let format = match env::args().nth(1) {
        Some(arg) => arg.parse::<LogFormat>()?,
        None => LogFormat::default(),
    };
    init_logging(LoggingConfig::default().with_format(format))?;

    let staging = StoreRef::new("memory://staging");
    let production = StoreRef::new("memory://production");

    let store = Arc::new(InMemorySecretStore::new());
    store.seed(&staging, "db-password", "staging-pw").await;
    store.seed(&staging, "api-key", "k-123").await;
    store.seed(&production, "api-key", "k-999").await;
    store.seed(&production, "legacy-token", "t-1").await;

    let config = CoreConfig::builder()
        .secret_store(store.clone())
        .max_concurrent_fetches(4)
        .build()
        .context("building core config")?;
    let service = VaultSyncService::new(config);

    let session = service.compare(staging.clone(), production.clone()).await?;
    let summary = session.load_all(None).await;
    println!(
        "Loaded {} of {} values ({} failed)",
        summary.loaded, summary.requested, summary.failed
    );
    for entry in session.entries() {
        println!("  {:<14} {}", entry.name, entry.status);
    }

    let outcome = service
        .sync_all(&session, SyncScope::SourceToTarget)
        .await?;
    println!(
        "Sync: {} written, {} failed, {} differences left",
        outcome.success,
        outcome.failed,
        session.stats().differences()
    );

    let dotenv = "API_KEY=\"k-456\"\nFEATURE_FLAG=on\n";
    let plan = service
        .prepare_import(&production, dotenv, None, ConflictPolicy::SkipAll)
        .await?;
    let outcome = service.commit_import(plan).await?;
    println!(
        "Import: {} written, {} skipped",
        outcome.success, outcome.skipped
    );

    let exported = service
        .export(&production, &ExportOptions::new(TransferFormat::Dotenv))
        .await?;
    println!("{}", exported);

    let stats = service.cache_stats().await;
    println!(
        "Cache: {} entries, {} hits, {} misses",
        stats.entries, stats.hits, stats.misses
    );
    Ok(())
}
