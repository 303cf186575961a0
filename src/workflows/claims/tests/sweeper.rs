use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::common::*;
use crate::workflows::claims::domain::{
    BatchId, BatchRecord, ClaimToken, ListingId, ListingRecord,
};
use crate::workflows::claims::memory::InMemoryListingStore;
use crate::workflows::claims::repository::{ClaimUpdate, ListingStore, StoreError};
use crate::workflows::claims::sweeper::{ExpirationSweeper, SweepError, SweepMode};

#[test]
fn sweep_retires_only_lapsed_unclaimed_imports() {
    let (_, store, _, _) = build_service();
    let batch = seed_batch(&store, "batch-000001", 3);
    seed_listing(
        &store,
        &batch.id,
        "listing-000001",
        "tok-lapsed",
        t0() - chrono::Duration::hours(1),
    );
    seed_listing(&store, &batch.id, "listing-000002", "tok-open", t0() + week());
    seed_listing(
        &store,
        &batch.id,
        "listing-000003",
        "tok-claimed",
        t0() - chrono::Duration::hours(1),
    );
    // The third row was claimed before its window lapsed.
    store
        .claim_listing(
            &ListingId("listing-000003".to_string()),
            ClaimUpdate {
                owner: crate::workflows::claims::domain::UserId("user-7".to_string()),
                claimed_at: t0() - chrono::Duration::hours(2),
                contact: Default::default(),
            },
        )
        .expect("store claim")
        .expect("row was unclaimed");

    let sweeper = ExpirationSweeper::new(store.clone());
    let outcome = sweeper.sweep(t0(), SweepMode::Apply).expect("sweep runs");

    assert!(!outcome.dry_run);
    assert_eq!(outcome.swept.len(), 1);
    assert_eq!(outcome.swept[0].listing_id.0, "listing-000001");

    let lapsed = store
        .fetch_listing(&ListingId("listing-000001".to_string()))
        .expect("fetch")
        .unwrap();
    assert_eq!(lapsed.state.deleted_at(), Some(t0()));
    assert!(lapsed.claim_token.is_some(), "audit fields stay intact");

    let open = store
        .fetch_listing(&ListingId("listing-000002".to_string()))
        .expect("fetch")
        .unwrap();
    assert!(open.state.is_live());
}

#[test]
fn sweep_is_idempotent() {
    let (_, store, _, _) = build_service();
    let batch = seed_batch(&store, "batch-000001", 2);
    seed_listing(
        &store,
        &batch.id,
        "listing-000001",
        "tok-a",
        t0() - chrono::Duration::hours(1),
    );
    seed_listing(
        &store,
        &batch.id,
        "listing-000002",
        "tok-b",
        t0() - chrono::Duration::hours(2),
    );

    let sweeper = ExpirationSweeper::new(store.clone());
    let first = sweeper.sweep(t0(), SweepMode::Apply).expect("first sweep");
    assert_eq!(first.swept.len(), 2);

    let second = sweeper.sweep(t0(), SweepMode::Apply).expect("second sweep");
    assert!(second.swept.is_empty());
    assert!(second.remaining.is_empty());
}

#[test]
fn claimed_rows_are_never_swept_at_any_later_time() {
    let (service, store, _, _) = build_service();
    let batch = seed_batch(&store, "batch-000001", 1);
    seed_listing(&store, &batch.id, "listing-000001", "tok-a", t0() + week());

    let claimed = service
        .resolve(&token("tok-a"), claim_request("user-7"))
        .expect("claim succeeds");

    let sweeper = ExpirationSweeper::new(store.clone());
    let far_future = t0() + chrono::Duration::days(365 * 10);
    let outcome = sweeper
        .sweep(far_future, SweepMode::Apply)
        .expect("sweep runs");
    assert!(outcome.swept.is_empty());

    let unchanged = store
        .fetch_listing(&claimed.id)
        .expect("fetch")
        .unwrap();
    assert_eq!(unchanged, claimed);
}

#[test]
fn dry_run_reports_without_mutating() {
    let (_, store, _, _) = build_service();
    let batch = seed_batch(&store, "batch-000001", 1);
    seed_listing(
        &store,
        &batch.id,
        "listing-000001",
        "tok-a",
        t0() - chrono::Duration::hours(1),
    );

    let sweeper = ExpirationSweeper::new(store.clone());
    let outcome = sweeper.sweep(t0(), SweepMode::DryRun).expect("dry run");

    assert!(outcome.dry_run);
    assert_eq!(outcome.swept.len(), 1);
    assert!(outcome.swept[0].address.contains("Des Moines"));

    let listing = store
        .fetch_listing(&ListingId("listing-000001".to_string()))
        .expect("fetch")
        .unwrap();
    assert!(listing.state.is_live());

    // The real sweep afterwards still finds the row.
    let applied = sweeper.sweep(t0(), SweepMode::Apply).expect("apply");
    assert_eq!(applied.swept.len(), 1);
}

#[test]
fn remaining_unclaimed_is_reported_per_batch() {
    let (_, store, _, _) = build_service();
    let first = seed_batch(&store, "batch-000001", 2);
    let second = seed_batch(&store, "batch-000002", 1);
    seed_listing(
        &store,
        &first.id,
        "listing-000001",
        "tok-a",
        t0() - chrono::Duration::hours(1),
    );
    seed_listing(&store, &first.id, "listing-000002", "tok-b", t0() + week());
    seed_listing(
        &store,
        &second.id,
        "listing-000003",
        "tok-c",
        t0() - chrono::Duration::hours(1),
    );

    let sweeper = ExpirationSweeper::new(store);
    let outcome = sweeper.sweep(t0(), SweepMode::Apply).expect("sweep runs");

    assert_eq!(outcome.swept.len(), 2);
    assert_eq!(outcome.remaining.len(), 2);

    let by_batch: std::collections::HashMap<_, _> = outcome
        .remaining
        .iter()
        .map(|entry| (entry.batch_id.0.as_str(), entry.remaining_unclaimed))
        .collect();
    assert_eq!(by_batch["batch-000001"], 1);
    assert_eq!(by_batch["batch-000002"], 0);
}

/// Store wrapper that fails the Nth conditional delete; everything else
/// passes through.
struct FailingRetireStore {
    inner: InMemoryListingStore,
    retire_calls: AtomicU32,
    fail_on_call: u32,
}

impl ListingStore for FailingRetireStore {
    fn insert_batch(&self, batch: BatchRecord) -> Result<BatchRecord, StoreError> {
        self.inner.insert_batch(batch)
    }
    fn update_batch(&self, batch: BatchRecord) -> Result<(), StoreError> {
        self.inner.update_batch(batch)
    }
    fn fetch_batch(&self, id: &BatchId) -> Result<Option<BatchRecord>, StoreError> {
        self.inner.fetch_batch(id)
    }
    fn insert_listing(&self, listing: ListingRecord) -> Result<ListingRecord, StoreError> {
        self.inner.insert_listing(listing)
    }
    fn fetch_listing(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError> {
        self.inner.fetch_listing(id)
    }
    fn find_by_token(&self, token: &ClaimToken) -> Result<Option<ListingRecord>, StoreError> {
        self.inner.find_by_token(token)
    }
    fn token_in_use(&self, token: &ClaimToken) -> Result<bool, StoreError> {
        self.inner.token_in_use(token)
    }
    fn claim_listing(
        &self,
        id: &ListingId,
        update: ClaimUpdate,
    ) -> Result<Option<ListingRecord>, StoreError> {
        self.inner.claim_listing(id, update)
    }
    fn retire_listing(&self, id: &ListingId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let call = self.retire_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            return Err(StoreError::Unavailable("store went away".to_string()));
        }
        self.inner.retire_listing(id, at)
    }
    fn increment_claimed(&self, id: &BatchId) -> Result<(), StoreError> {
        self.inner.increment_claimed(id)
    }
    fn expired_unclaimed(&self, now: DateTime<Utc>) -> Result<Vec<ListingRecord>, StoreError> {
        self.inner.expired_unclaimed(now)
    }
    fn live_unclaimed_in_batch(&self, id: &BatchId) -> Result<u32, StoreError> {
        self.inner.live_unclaimed_in_batch(id)
    }
}

#[test]
fn mid_run_failure_keeps_earlier_rows_retired() {
    let inner = InMemoryListingStore::new();
    let batch = seed_batch(&inner, "batch-000001", 2);
    seed_listing(
        &inner,
        &batch.id,
        "listing-000001",
        "tok-a",
        t0() - chrono::Duration::hours(2),
    );
    seed_listing(
        &inner,
        &batch.id,
        "listing-000002",
        "tok-b",
        t0() - chrono::Duration::hours(1),
    );

    let store = Arc::new(FailingRetireStore {
        inner: inner.clone(),
        retire_calls: AtomicU32::new(0),
        fail_on_call: 2,
    });

    let sweeper = ExpirationSweeper::new(store);
    match sweeper.sweep(t0(), SweepMode::Apply) {
        Err(SweepError::Store(StoreError::Unavailable(_))) => {}
        other => panic!("expected store failure, got {other:?}"),
    }

    // One row committed before the failure; the other is untouched and a
    // rerun picks it up.
    let retired: Vec<_> = inner
        .all_listings()
        .into_iter()
        .filter(|listing| !listing.state.is_live())
        .collect();
    assert_eq!(retired.len(), 1);

    let rerun = ExpirationSweeper::new(Arc::new(inner.clone()))
        .sweep(t0(), SweepMode::Apply)
        .expect("rerun succeeds");
    assert_eq!(rerun.swept.len(), 1);
}
