//! Imported-listing claim lifecycle: token issuance, claim resolution,
//! and the expiration sweep.
//!
//! Batch import creates listings on behalf of their owners-of-record,
//! each carrying a one-time claim token and a claim window. An owner
//! following the emailed link either claims the listing (terminal) or the
//! window lapses and the sweeper retires the row (also terminal). Every
//! decisive write is a conditional update in the store, so concurrent
//! claims and sweeps cannot both win.

pub mod clock;
pub mod domain;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweeper;
pub mod token;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use domain::{
    BatchErrorEntry, BatchId, BatchRecord, ClaimPhase, ClaimRequest, ClaimToken, ListingClaimView,
    ListingId, ListingRecord, ListingStatus, OwnerContact, PropertyAddress, RecordState, UserId,
};
pub use memory::InMemoryListingStore;
pub use notify::{ClaimNotice, LogNotices, NoticeError, NoticePublisher};
pub use repository::{ClaimUpdate, ListingStore, StoreError};
pub use router::claim_router;
pub use service::{ClaimError, ClaimService, ValidationError};
pub use sweeper::{BatchRemaining, ExpirationSweeper, SweepError, SweepMode, SweepOutcome};
pub use token::{ClaimTokenIssuer, IssuedClaim, TokenGenerationError};
