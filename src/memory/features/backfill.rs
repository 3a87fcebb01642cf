// src/memory/features/backfill.rs
//! Reconciliation sweep for memories whose vector write failed at creation.
//!
//! Runs on an interval, re-offering embedding to unsynced records in modest
//! batches. Safe and idempotent: a retried write upserts at the same key.

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::memory::service::MemoryService;

/// Spawn the background reconciliation task.
///
/// `interval` is the time between sweeps (e.g., 5 minutes).
pub fn spawn_backfill_sweep(
    service: Arc<MemoryService>,
    interval: Duration,
    batch_size: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match service.backfill_unsynced(batch_size).await {
                Ok(0) => {}
                Ok(synced) => info!("Backfill sweep synced {} vectors", synced),
                Err(err) => warn!("Backfill sweep failed: {err:#}"),
            }
            tokio::time::sleep(interval).await;
        }
    })
}
