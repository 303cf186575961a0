use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier wrapper for listings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(pub String);

/// Identifier wrapper for import batches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub String);

/// Identifier wrapper for marketplace users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Opaque one-time claim token granting claim rights to a single listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimToken(pub String);

/// Marketplace-facing listing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingStatus {
    ForSale,
    Pending,
    Sold,
    Inactive,
}

impl ListingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ListingStatus::ForSale => "for_sale",
            ListingStatus::Pending => "pending",
            ListingStatus::Sold => "sold",
            ListingStatus::Inactive => "inactive",
        }
    }
}

/// Soft-delete tag. Retired records keep every other field for audit, so
/// read paths must exclude `Deleted` explicitly rather than relying on
/// implicit row filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordState {
    Live,
    Deleted { at: DateTime<Utc> },
}

impl RecordState {
    pub const fn is_live(self) -> bool {
        matches!(self, RecordState::Live)
    }

    pub fn deleted_at(self) -> Option<DateTime<Utc>> {
        match self {
            RecordState::Live => None,
            RecordState::Deleted { at } => Some(at),
        }
    }
}

/// Street address captured at import time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl PropertyAddress {
    pub fn single_line(&self) -> String {
        format!(
            "{}, {}, {} {}",
            self.street, self.city, self.state, self.postal_code
        )
    }
}

/// Owner contact block. Pre-claim these hold the owner-of-record details
/// captured from the import feed; after a claim they hold the merged
/// active contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mailing_address: Option<String>,
}

impl OwnerContact {
    /// Field-by-field precedence: pre-claim owner data first, the claiming
    /// user's submission as the fallback.
    pub fn merged_with(&self, fallback: &OwnerContact) -> OwnerContact {
        OwnerContact {
            name: self.name.clone().or_else(|| fallback.name.clone()),
            email: self.email.clone().or_else(|| fallback.email.clone()),
            phone: self.phone.clone().or_else(|| fallback.phone.clone()),
            mailing_address: self
                .mailing_address
                .clone()
                .or_else(|| fallback.mailing_address.clone()),
        }
    }
}

/// One import run and its aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: BatchId,
    pub imported_by: UserId,
    pub source: String,
    pub original_filename: Option<String>,
    pub total_records: u32,
    pub imported_count: u32,
    pub failed_count: u32,
    pub claimed_count: u32,
    pub expires_at: DateTime<Utc>,
    pub errors: Vec<BatchErrorEntry>,
    pub notes: Option<String>,
}

/// Structured per-row import failure kept on the batch for operator review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchErrorEntry {
    pub line: u64,
    pub message: String,
}

/// A property listing carrying import/claim metadata. Organic listings
/// (created directly by a seller) have `import_source == None` and never
/// carry claim machinery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub id: ListingId,
    pub address: PropertyAddress,
    pub asking_price: Option<u64>,
    pub owner_user_id: Option<UserId>,
    pub original_owner_user_id: Option<UserId>,
    pub import_source: Option<String>,
    pub import_batch_id: Option<BatchId>,
    pub claim_token: Option<ClaimToken>,
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub contact: OwnerContact,
    pub is_active: bool,
    pub status: ListingStatus,
    pub state: RecordState,
}

/// Where an imported listing sits in its claim lifecycle at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPhase {
    Claimable,
    Claimed,
    Expired,
}

impl ClaimPhase {
    pub const fn label(self) -> &'static str {
        match self {
            ClaimPhase::Claimable => "claimable",
            ClaimPhase::Claimed => "claimed",
            ClaimPhase::Expired => "expired",
        }
    }
}

impl ListingRecord {
    pub fn is_imported(&self) -> bool {
        self.import_source.is_some()
    }

    /// Classify the claim lifecycle. Claimed wins over expiry: a claimed
    /// record never expires regardless of its `claim_expires_at`.
    pub fn claim_phase(&self, now: DateTime<Utc>) -> ClaimPhase {
        if self.claimed_at.is_some() {
            return ClaimPhase::Claimed;
        }
        if !self.state.is_live() {
            return ClaimPhase::Expired;
        }
        match self.claim_expires_at {
            Some(expires_at) if expires_at <= now => ClaimPhase::Expired,
            _ => ClaimPhase::Claimable,
        }
    }

    pub fn status_view(&self, now: DateTime<Utc>) -> ListingClaimView {
        ListingClaimView {
            listing_id: self.id.clone(),
            address: self.address.single_line(),
            asking_price: self.asking_price,
            phase: self.claim_phase(now),
            claim_expires_at: match self.claim_phase(now) {
                ClaimPhase::Claimable => self.claim_expires_at,
                _ => None,
            },
            status: self.status.label(),
        }
    }
}

/// Sanitized claim-state snapshot rendered on the claim landing page.
#[derive(Debug, Clone, Serialize)]
pub struct ListingClaimView {
    pub listing_id: ListingId,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asking_price: Option<u64>,
    pub phase: ClaimPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub status: &'static str,
}

/// Inbound claim submission. When the claim link doubles as inline
/// registration the contact fields are the new account's details.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub user_id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mailing_address: Option<String>,
}

impl ClaimRequest {
    pub fn contact(&self) -> OwnerContact {
        OwnerContact {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            mailing_address: self.mailing_address.clone(),
        }
    }
}

/// Detail map payload attached to outbound notices.
pub type NoticeDetails = BTreeMap<String, String>;
