use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ListingId, NoticeDetails};

/// Structured notification handed to the transactional mail pipeline.
/// Templates in use: `claim_invitation` (at import, carries the claim link
/// material) and `listing_claimed` (claim confirmation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimNotice {
    pub template: String,
    pub listing_id: ListingId,
    pub details: NoticeDetails,
}

/// Outbound notification hook (mail adapter boundary).
pub trait NoticePublisher: Send + Sync {
    fn publish(&self, notice: ClaimNotice) -> Result<(), NoticeError>;
}

/// Notice dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NoticeError {
    #[error("notice transport unavailable: {0}")]
    Transport(String),
}

/// Default wiring: emit the notice as a structured log line and let the
/// mail relay tail the event stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotices;

impl NoticePublisher for LogNotices {
    fn publish(&self, notice: ClaimNotice) -> Result<(), NoticeError> {
        info!(
            template = %notice.template,
            listing_id = %notice.listing_id.0,
            "claim notice queued"
        );
        Ok(())
    }
}
