use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{BatchId, ListingId};
use super::repository::{ListingStore, StoreError};

/// Whether a sweep mutates or only reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    Apply,
    DryRun,
}

impl SweepMode {
    pub const fn is_dry_run(self) -> bool {
        matches!(self, SweepMode::DryRun)
    }
}

/// A listing retired (or, in dry-run, eligible for retirement) by a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweptListing {
    pub listing_id: ListingId,
    pub batch_id: Option<BatchId>,
    pub address: String,
}

/// Live-unclaimed headcount left in a batch after the sweep. Reported for
/// observability, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRemaining {
    pub batch_id: BatchId,
    pub remaining_unclaimed: u32,
}

/// Outcome of one sweep invocation.
#[derive(Debug, Clone, Serialize)]
pub struct SweepOutcome {
    pub dry_run: bool,
    pub swept: Vec<SweptListing>,
    pub remaining: Vec<BatchRemaining>,
}

/// Retires imported listings whose claim window lapsed unclaimed. Each
/// row's soft delete is an independent conditional write guarded by
/// `claimed_at is null`, so a claim that lands first turns the delete into
/// a no-op and a mid-run store failure cannot leave partial corruption.
/// Cron owns the daily cadence; this type is the job body.
pub struct ExpirationSweeper<S> {
    store: Arc<S>,
}

impl<S> ExpirationSweeper<S>
where
    S: ListingStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn sweep(&self, now: DateTime<Utc>, mode: SweepMode) -> Result<SweepOutcome, SweepError> {
        let candidates = self.store.expired_unclaimed(now)?;
        let mut swept = Vec::with_capacity(candidates.len());
        let mut touched_batches: BTreeMap<String, BatchId> = BTreeMap::new();

        for listing in candidates {
            if !mode.is_dry_run() {
                let retired = self.store.retire_listing(&listing.id, now)?;
                if !retired {
                    // A claim committed between the select and this write.
                    warn!(listing_id = %listing.id.0, "sweep skipped: row claimed mid-sweep");
                    continue;
                }
                info!(listing_id = %listing.id.0, "unclaimed listing retired");
            }

            if let Some(batch_id) = &listing.import_batch_id {
                touched_batches.insert(batch_id.0.clone(), batch_id.clone());
            }
            swept.push(SweptListing {
                listing_id: listing.id.clone(),
                batch_id: listing.import_batch_id.clone(),
                address: listing.address.single_line(),
            });
        }

        let mut remaining = Vec::with_capacity(touched_batches.len());
        for batch_id in touched_batches.into_values() {
            let remaining_unclaimed = self.store.live_unclaimed_in_batch(&batch_id)?;
            remaining.push(BatchRemaining {
                batch_id,
                remaining_unclaimed,
            });
        }

        Ok(SweepOutcome {
            dry_run: mode.is_dry_run(),
            swept,
            remaining,
        })
    }
}

/// Sweep failure. The job logs it and exits non-zero; rows already
/// retired stay retired.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
