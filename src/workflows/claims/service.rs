use std::sync::Arc;

use tracing::info;

use super::clock::{Clock, SystemClock};
use super::domain::{
    ClaimRequest, ClaimToken, ListingClaimView, ListingRecord, NoticeDetails,
};
use super::notify::{ClaimNotice, NoticeError, NoticePublisher};
use super::repository::{ClaimUpdate, ListingStore, StoreError};

/// Resolves inbound claim tokens against the listing store. Per listing
/// the lifecycle is `UNCLAIMED_LIVE -> CLAIMED` (here) or
/// `UNCLAIMED_LIVE -> EXPIRED` (sweeper); both end states are terminal.
pub struct ClaimService<S, N, C = SystemClock> {
    store: Arc<S>,
    notices: Arc<N>,
    clock: Arc<C>,
}

impl<S, N> ClaimService<S, N, SystemClock>
where
    S: ListingStore + 'static,
    N: NoticePublisher + 'static,
{
    pub fn new(store: Arc<S>, notices: Arc<N>) -> Self {
        Self::with_clock(store, notices, Arc::new(SystemClock))
    }
}

impl<S, N, C> ClaimService<S, N, C>
where
    S: ListingStore + 'static,
    N: NoticePublisher + 'static,
    C: Clock + 'static,
{
    pub fn with_clock(store: Arc<S>, notices: Arc<N>, clock: Arc<C>) -> Self {
        Self {
            store,
            notices,
            clock,
        }
    }

    /// Claim-state snapshot for the landing page banner.
    pub fn preview(&self, token: &ClaimToken) -> Result<ListingClaimView, ClaimError> {
        let listing = self
            .store
            .find_by_token(token)?
            .ok_or(ClaimError::TokenNotFound)?;
        Ok(listing.status_view(self.clock.now()))
    }

    /// Validate the token and transfer ownership. At most one claim ever
    /// succeeds per listing: the decisive write is a conditional update in
    /// the store, so a concurrent claim or sweep losing the race is
    /// reported from the re-read, never double-applied.
    pub fn resolve(
        &self,
        token: &ClaimToken,
        request: ClaimRequest,
    ) -> Result<ListingRecord, ClaimError> {
        validate_submission(&request)?;

        let listing = self
            .store
            .find_by_token(token)?
            .ok_or(ClaimError::TokenNotFound)?;
        let now = self.clock.now();

        if !listing.state.is_live() {
            return Err(ClaimError::TokenExpired);
        }
        if listing.claimed_at.is_some() {
            return Err(ClaimError::AlreadyClaimed);
        }
        if listing
            .claim_expires_at
            .is_some_and(|expires_at| expires_at <= now)
        {
            return Err(ClaimError::TokenExpired);
        }

        let contact = listing.contact.merged_with(&request.contact());
        let update = ClaimUpdate {
            owner: request.user_id.clone(),
            claimed_at: now,
            contact,
        };

        let claimed = match self.store.claim_listing(&listing.id, update)? {
            Some(claimed) => claimed,
            // Zero rows affected: someone else finished first. Re-read to
            // report which terminal state won.
            None => {
                let current = self
                    .store
                    .fetch_listing(&listing.id)?
                    .ok_or(ClaimError::TokenNotFound)?;
                if current.claimed_at.is_some() {
                    return Err(ClaimError::AlreadyClaimed);
                }
                return Err(ClaimError::TokenExpired);
            }
        };

        if let Some(batch_id) = &claimed.import_batch_id {
            self.store.increment_claimed(batch_id)?;
        }

        let mut details = NoticeDetails::new();
        details.insert("address".to_string(), claimed.address.single_line());
        if let Some(email) = &claimed.contact.email {
            details.insert("owner_email".to_string(), email.clone());
        }
        self.notices.publish(ClaimNotice {
            template: "listing_claimed".to_string(),
            listing_id: claimed.id.clone(),
            details,
        })?;

        info!(
            listing_id = %claimed.id.0,
            owner = %request.user_id.0,
            "listing claimed"
        );

        Ok(claimed)
    }
}

fn validate_submission(request: &ClaimRequest) -> Result<(), ValidationError> {
    if request.user_id.0.trim().is_empty() {
        return Err(ValidationError::MissingField { field: "user_id" });
    }

    let name = request.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Err(ValidationError::MissingField { field: "name" });
    }

    let email = request.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        return Err(ValidationError::MissingField { field: "email" });
    }
    if !email.contains('@') {
        return Err(ValidationError::MalformedField { field: "email" });
    }

    Ok(())
}

/// Malformed claim submission (the claim link doubles as inline
/// registration, so account fields are required).
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },
    #[error("field '{field}' is malformed")]
    MalformedField { field: &'static str },
}

/// Error raised by the claim service. All variants are recoverable and
/// user-facing; the router maps each to a distinct status.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("claim token not found")]
    TokenNotFound,
    #[error("claim window has expired")]
    TokenExpired,
    #[error("listing has already been claimed")]
    AlreadyClaimed,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notice(#[from] NoticeError),
}
