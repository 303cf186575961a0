use chrono::{DateTime, Utc};

use super::domain::{
    BatchId, BatchRecord, ClaimToken, ListingId, ListingRecord, OwnerContact, UserId,
};

/// Fields written by a successful claim. Applied by the store as one
/// conditional update so two racing claims cannot both observe
/// `claimed_at == null`.
#[derive(Debug, Clone)]
pub struct ClaimUpdate {
    pub owner: UserId,
    pub claimed_at: DateTime<Utc>,
    pub contact: OwnerContact,
}

/// Storage seam for batches and listings. The relational implementation
/// maps `claim_listing`/`retire_listing` to single conditional UPDATE
/// statements; zero rows affected surfaces as `Ok(None)` / `Ok(false)`,
/// never as an error, so callers can distinguish a lost race from a
/// transport failure.
pub trait ListingStore: Send + Sync {
    fn insert_batch(&self, batch: BatchRecord) -> Result<BatchRecord, StoreError>;
    fn update_batch(&self, batch: BatchRecord) -> Result<(), StoreError>;
    fn fetch_batch(&self, id: &BatchId) -> Result<Option<BatchRecord>, StoreError>;

    /// Insert a listing. Enforces the claim-token uniqueness constraint
    /// and rejects claim metadata on non-imported records.
    fn insert_listing(&self, listing: ListingRecord) -> Result<ListingRecord, StoreError>;
    fn fetch_listing(&self, id: &ListingId) -> Result<Option<ListingRecord>, StoreError>;
    fn find_by_token(&self, token: &ClaimToken) -> Result<Option<ListingRecord>, StoreError>;
    fn token_in_use(&self, token: &ClaimToken) -> Result<bool, StoreError>;

    /// Atomically claim a listing: applies `update`, marks the record
    /// active and for sale, but only while it is live and unclaimed.
    /// Returns the post-image; `Ok(None)` means another claim or the
    /// sweeper won the race.
    fn claim_listing(
        &self,
        id: &ListingId,
        update: ClaimUpdate,
    ) -> Result<Option<ListingRecord>, StoreError>;

    /// Atomically soft-delete a listing, guarded by `claimed_at is null`
    /// and the record still being live. `Ok(false)` means a claim won the
    /// race (or the row was already retired) and nothing changed.
    fn retire_listing(&self, id: &ListingId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Bump the batch's claimed counter by one, preserving
    /// `claimed_count <= imported_count`.
    fn increment_claimed(&self, id: &BatchId) -> Result<(), StoreError>;

    /// Live, unclaimed, imported listings whose claim window lapsed at or
    /// before `now`. Already-retired rows are excluded by the live filter.
    fn expired_unclaimed(&self, now: DateTime<Utc>) -> Result<Vec<ListingRecord>, StoreError>;

    /// Count of live unclaimed listings remaining in a batch.
    fn live_unclaimed_in_batch(&self, id: &BatchId) -> Result<u32, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("claim token already in use")]
    DuplicateToken,
    #[error("claim metadata is only valid on imported listings")]
    ClaimMetadataOnOrganicListing,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
