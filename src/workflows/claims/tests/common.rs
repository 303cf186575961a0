use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::workflows::claims::clock::FixedClock;
use crate::workflows::claims::domain::{
    BatchId, BatchRecord, ClaimRequest, ClaimToken, ListingId, ListingRecord, ListingStatus,
    OwnerContact, PropertyAddress, RecordState, UserId,
};
use crate::workflows::claims::memory::InMemoryListingStore;
use crate::workflows::claims::notify::{ClaimNotice, NoticeError, NoticePublisher};
use crate::workflows::claims::service::ClaimService;

/// Reference instant all claim fixtures are pinned to.
pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

pub(super) fn week() -> chrono::Duration {
    chrono::Duration::days(7)
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotices {
    events: Arc<Mutex<Vec<ClaimNotice>>>,
}

impl MemoryNotices {
    pub(super) fn events(&self) -> Vec<ClaimNotice> {
        self.events.lock().expect("notice mutex poisoned").clone()
    }
}

impl NoticePublisher for MemoryNotices {
    fn publish(&self, notice: ClaimNotice) -> Result<(), NoticeError> {
        self.events
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) type TestService = ClaimService<InMemoryListingStore, MemoryNotices, FixedClock>;

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryListingStore>,
    Arc<MemoryNotices>,
    Arc<FixedClock>,
) {
    let store = Arc::new(InMemoryListingStore::new());
    let notices = Arc::new(MemoryNotices::default());
    let clock = Arc::new(FixedClock::at(t0()));
    let service = ClaimService::with_clock(store.clone(), notices.clone(), clock.clone());
    (service, store, notices, clock)
}

pub(super) fn seed_batch(
    store: &InMemoryListingStore,
    id: &str,
    imported_count: u32,
) -> BatchRecord {
    use crate::workflows::claims::repository::ListingStore;

    store
        .insert_batch(BatchRecord {
            id: BatchId(id.to_string()),
            imported_by: UserId("admin-1".to_string()),
            source: "zillow".to_string(),
            original_filename: Some("zillow-export.csv".to_string()),
            total_records: imported_count,
            imported_count,
            failed_count: 0,
            claimed_count: 0,
            expires_at: t0() + week(),
            errors: Vec::new(),
            notes: None,
        })
        .expect("batch seeds")
}

pub(super) fn seed_listing(
    store: &InMemoryListingStore,
    batch_id: &BatchId,
    id: &str,
    token: &str,
    expires_at: DateTime<Utc>,
) -> ListingRecord {
    use crate::workflows::claims::repository::ListingStore;

    store
        .insert_listing(ListingRecord {
            id: ListingId(id.to_string()),
            address: PropertyAddress {
                street: format!("{} Maple Ct", id.len()),
                city: "Des Moines".to_string(),
                state: "IA".to_string(),
                postal_code: "50310".to_string(),
            },
            asking_price: Some(245_000),
            owner_user_id: None,
            original_owner_user_id: None,
            import_source: Some("zillow".to_string()),
            import_batch_id: Some(batch_id.clone()),
            claim_token: Some(ClaimToken(token.to_string())),
            claim_expires_at: Some(expires_at),
            claimed_at: None,
            contact: OwnerContact {
                name: Some("Hutchins Family Trust".to_string()),
                email: Some("records@example.com".to_string()),
                phone: None,
                mailing_address: None,
            },
            is_active: false,
            status: ListingStatus::Inactive,
            state: RecordState::Live,
        })
        .expect("listing seeds")
}

pub(super) fn claim_request(user: &str) -> ClaimRequest {
    ClaimRequest {
        user_id: UserId(user.to_string()),
        name: Some("Avery Claimer".to_string()),
        email: Some("avery@example.com".to_string()),
        phone: Some("515-555-0123".to_string()),
        mailing_address: None,
    }
}

pub(super) fn token(raw: &str) -> ClaimToken {
    ClaimToken(raw.to_string())
}
