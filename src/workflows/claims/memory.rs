use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::domain::{
    BatchId, BatchRecord, ClaimToken, ListingId, ListingRecord, RecordState,
};
use super::repository::{ClaimUpdate, ListingStore, StoreError};

#[derive(Default)]
struct Tables {
    batches: HashMap<BatchId, BatchRecord>,
    listings: HashMap<ListingId, ListingRecord>,
}

/// Mutex-backed store used by the demo server and the test suites. The
/// conditional-update contracts hold because every check-and-set runs
/// under the single table lock, mirroring what a relational store gets
/// from `UPDATE ... WHERE claimed_at IS NULL`.
#[derive(Default, Clone)]
pub struct InMemoryListingStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().expect("listing store mutex poisoned")
    }

    /// Snapshot of every listing, retired rows included. Test-facing.
    pub fn all_listings(&self) -> Vec<ListingRecord> {
        self.lock().listings.values().cloned().collect()
    }
}

impl ListingStore for InMemoryListingStore {
    fn insert_batch(&self, batch: BatchRecord) -> Result<BatchRecord, StoreError> {
        let mut tables = self.lock();
        if tables.batches.contains_key(&batch.id) {
            return Err(StoreError::Conflict);
        }
        tables.batches.insert(batch.id.clone(), batch.clone());
        Ok(batch)
    }

    fn update_batch(&self, batch: BatchRecord) -> Result<(), StoreError> {
        let mut tables = self.lock();
        if !tables.batches.contains_key(&batch.id) {
            return Err(StoreError::NotFound);
        }
        tables.batches.insert(batch.id.clone(), batch);
        Ok(())
    }

    fn fetch_batch(&self, id: &BatchId) -> Result<Option<BatchRecord>, StoreError> {
        Ok(self.lock().batches.get(id).cloned())
    }

    fn insert_listing(&self, listing: ListingRecord) -> Result<ListingRecord, StoreError> {
        let mut tables = self.lock();
        if tables.listings.contains_key(&listing.id) {
            return Err(StoreError::Conflict);
        }
        if listing.import_source.is_none()
            && (listing.claim_token.is_some() || listing.claim_expires_at.is_some())
        {
            return Err(StoreError::ClaimMetadataOnOrganicListing);
        }
        if let Some(token) = &listing.claim_token {
            let taken = tables
                .listings
                .values()
                .any(|existing| existing.claim_token.as_ref() == Some(token));
            if taken {
                return Err(StoreError::DuplicateToken);
            }
        }
        tables.listings.insert(listing.id.clone(), listing.clone());
        Ok(listing)
    }

    fn fetch_listing(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError> {
        Ok(self.lock().listings.get(id).cloned())
    }

    fn find_by_token(&self, token: &ClaimToken) -> Result<Option<ListingRecord>, StoreError> {
        Ok(self
            .lock()
            .listings
            .values()
            .find(|listing| listing.claim_token.as_ref() == Some(token))
            .cloned())
    }

    fn token_in_use(&self, token: &ClaimToken) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .listings
            .values()
            .any(|listing| listing.claim_token.as_ref() == Some(token)))
    }

    fn claim_listing(
        &self,
        id: &ListingId,
        update: ClaimUpdate,
    ) -> Result<Option<ListingRecord>, StoreError> {
        let mut tables = self.lock();
        let listing = tables.listings.get_mut(id).ok_or(StoreError::NotFound)?;

        if listing.claimed_at.is_some() || !listing.state.is_live() {
            return Ok(None);
        }

        listing.owner_user_id = Some(update.owner);
        listing.claimed_at = Some(update.claimed_at);
        listing.contact = update.contact;
        listing.status = super::domain::ListingStatus::ForSale;
        listing.is_active = true;

        Ok(Some(listing.clone()))
    }

    fn retire_listing(&self, id: &ListingId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut tables = self.lock();
        let listing = tables.listings.get_mut(id).ok_or(StoreError::NotFound)?;

        if listing.claimed_at.is_some() || !listing.state.is_live() {
            return Ok(false);
        }

        listing.state = RecordState::Deleted { at };
        Ok(true)
    }

    fn increment_claimed(&self, id: &BatchId) -> Result<(), StoreError> {
        let mut tables = self.lock();
        let batch = tables.batches.get_mut(id).ok_or(StoreError::NotFound)?;
        if batch.claimed_count >= batch.imported_count {
            return Err(StoreError::Conflict);
        }
        batch.claimed_count += 1;
        Ok(())
    }

    fn expired_unclaimed(&self, now: DateTime<Utc>) -> Result<Vec<ListingRecord>, StoreError> {
        Ok(self
            .lock()
            .listings
            .values()
            .filter(|listing| {
                listing.import_source.is_some()
                    && listing.claimed_at.is_none()
                    && listing.state.is_live()
                    && listing
                        .claim_expires_at
                        .is_some_and(|expires_at| expires_at <= now)
            })
            .cloned()
            .collect())
    }

    fn live_unclaimed_in_batch(&self, id: &BatchId) -> Result<u32, StoreError> {
        Ok(self
            .lock()
            .listings
            .values()
            .filter(|listing| {
                listing.import_batch_id.as_ref() == Some(id)
                    && listing.claimed_at.is_none()
                    && listing.state.is_live()
            })
            .count() as u32)
    }
}
