//! Batch import of claimable listings from a property CSV feed.
//!
//! The importer is the producer side of the claim lifecycle: every valid
//! row becomes an unclaimed live listing with a freshly issued claim
//! token, and a claim invitation notice is queued for the owner of
//! record. Row failures are accounted on the batch, never fatal to the
//! run.

mod normalizer;
mod parser;

use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::workflows::claims::{
    BatchErrorEntry, BatchId, BatchRecord, ClaimNotice, ClaimTokenIssuer, ListingId,
    ListingRecord, ListingStatus, ListingStore, NoticeError, NoticePublisher, RecordState,
    StoreError, TokenGenerationError, UserId,
};
use crate::workflows::claims::domain::NoticeDetails;

use parser::ParsedRow;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Token(TokenGenerationError),
    Store(StoreError),
    Notice(NoticeError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read property export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid property CSV data: {}", err),
            ImportError::Token(err) => write!(f, "could not issue claim token: {}", err),
            ImportError::Store(err) => write!(f, "could not persist import run: {}", err),
            ImportError::Notice(err) => write!(f, "could not queue claim invitation: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Token(err) => Some(err),
            ImportError::Store(err) => Some(err),
            ImportError::Notice(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<TokenGenerationError> for ImportError {
    fn from(err: TokenGenerationError) -> Self {
        Self::Token(err)
    }
}

impl From<StoreError> for ImportError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<NoticeError> for ImportError {
    fn from(err: NoticeError) -> Self {
        Self::Notice(err)
    }
}

/// Caller-supplied description of one import run.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub imported_by: UserId,
    pub source: String,
    pub original_filename: Option<String>,
    pub claim_ttl: Duration,
    pub notes: Option<String>,
}

/// What one run produced: the finalized batch row and the created
/// listings in file order.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub batch: BatchRecord,
    pub listings: Vec<ListingRecord>,
}

static BATCH_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LISTING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_batch_id() -> BatchId {
    let id = BATCH_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BatchId(format!("batch-{id:06}"))
}

fn next_listing_id() -> ListingId {
    let id = LISTING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ListingId(format!("listing-{id:06}"))
}

pub struct BatchImporter<S, N> {
    store: Arc<S>,
    notices: Arc<N>,
    issuer: ClaimTokenIssuer,
}

impl<S, N> BatchImporter<S, N>
where
    S: ListingStore + 'static,
    N: NoticePublisher + 'static,
{
    pub fn new(store: Arc<S>, notices: Arc<N>) -> Self {
        Self::with_issuer(store, notices, ClaimTokenIssuer::default())
    }

    pub fn with_issuer(store: Arc<S>, notices: Arc<N>, issuer: ClaimTokenIssuer) -> Self {
        Self {
            store,
            notices,
            issuer,
        }
    }

    pub fn from_path<P: AsRef<Path>>(
        &self,
        path: P,
        request: ImportRequest,
        now: DateTime<Utc>,
    ) -> Result<ImportSummary, ImportError> {
        let file = std::fs::File::open(path)?;
        self.from_reader(file, request, now)
    }

    pub fn from_reader<R: Read>(
        &self,
        reader: R,
        request: ImportRequest,
        now: DateTime<Utc>,
    ) -> Result<ImportSummary, ImportError> {
        let rows = parser::parse_rows(reader)?;

        let mut batch = self.store.insert_batch(BatchRecord {
            id: next_batch_id(),
            imported_by: request.imported_by.clone(),
            source: request.source.clone(),
            original_filename: request.original_filename.clone(),
            total_records: rows.len() as u32,
            imported_count: 0,
            failed_count: 0,
            claimed_count: 0,
            expires_at: now + request.claim_ttl,
            errors: Vec::new(),
            notes: request.notes.clone(),
        })?;

        let mut listings = Vec::new();
        for row in rows {
            match self.import_row(row, &batch, &request, now)? {
                Ok(listing) => {
                    batch.imported_count += 1;
                    listings.push(listing);
                }
                Err(entry) => {
                    batch.failed_count += 1;
                    batch.errors.push(entry);
                }
            }
        }

        self.store.update_batch(batch.clone())?;

        info!(
            batch_id = %batch.id.0,
            source = %batch.source,
            imported = batch.imported_count,
            failed = batch.failed_count,
            "import run finished"
        );

        Ok(ImportSummary { batch, listings })
    }

    /// Outer `Err` aborts the run (infrastructure); inner `Err` is a row
    /// failure accounted on the batch.
    fn import_row(
        &self,
        row: ParsedRow,
        batch: &BatchRecord,
        request: &ImportRequest,
        now: DateTime<Utc>,
    ) -> Result<Result<ListingRecord, BatchErrorEntry>, ImportError> {
        let property = match row.outcome {
            Ok(property) => property,
            Err(issue) => {
                return Ok(Err(BatchErrorEntry {
                    line: row.line,
                    message: issue.to_string(),
                }))
            }
        };

        let issued = self
            .issuer
            .issue(self.store.as_ref(), request.claim_ttl, now)?;

        let listing = self.store.insert_listing(ListingRecord {
            id: next_listing_id(),
            address: property.address,
            asking_price: property.asking_price,
            owner_user_id: None,
            original_owner_user_id: None,
            import_source: Some(request.source.clone()),
            import_batch_id: Some(batch.id.clone()),
            claim_token: Some(issued.token.clone()),
            claim_expires_at: Some(issued.expires_at),
            claimed_at: None,
            contact: property.contact,
            is_active: false,
            status: ListingStatus::Inactive,
            state: RecordState::Live,
        })?;

        let mut details = NoticeDetails::new();
        details.insert("address".to_string(), listing.address.single_line());
        details.insert("claim_token".to_string(), issued.token.0.clone());
        details.insert("claim_expires_at".to_string(), issued.expires_at.to_rfc3339());
        if let Some(email) = &listing.contact.email {
            details.insert("owner_email".to_string(), email.clone());
        }
        self.notices.publish(ClaimNotice {
            template: "claim_invitation".to_string(),
            listing_id: listing.id.clone(),
            details,
        })?;

        Ok(Ok(listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::claims::InMemoryListingStore;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::io::Cursor;
    use std::sync::Mutex;

    const HEADER: &str =
        "Address,City,State,Zip,Price,Owner Name,Owner Email,Owner Phone,Owner Mailing Address\n";

    #[derive(Default)]
    struct CapturingNotices {
        events: Mutex<Vec<ClaimNotice>>,
    }

    impl CapturingNotices {
        fn events(&self) -> Vec<ClaimNotice> {
            self.events.lock().expect("notice mutex poisoned").clone()
        }
    }

    impl NoticePublisher for CapturingNotices {
        fn publish(&self, notice: ClaimNotice) -> Result<(), NoticeError> {
            self.events
                .lock()
                .expect("notice mutex poisoned")
                .push(notice);
            Ok(())
        }
    }

    fn import_request() -> ImportRequest {
        ImportRequest {
            imported_by: UserId("admin-1".to_string()),
            source: "zillow".to_string(),
            original_filename: Some("zillow-export.csv".to_string()),
            claim_ttl: Duration::days(30),
            notes: None,
        }
    }

    fn import_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn import_creates_batch_listings_and_invitations() {
        let store = Arc::new(InMemoryListingStore::new());
        let notices = Arc::new(CapturingNotices::default());
        let importer = BatchImporter::new(store.clone(), notices.clone());

        let csv = format!(
            "{HEADER}114 Maple Ct,Des Moines,IA,50310,\"$245,000\",Dale Hutchins,dale@example.com,,\n\
             87 Birch Ln,Ames,IA,50010,189000,Rosa Vega,rosa@example.com,515-555-0110,\n"
        );
        let summary = importer
            .from_reader(Cursor::new(csv), import_request(), import_time())
            .expect("import succeeds");

        assert_eq!(summary.batch.total_records, 2);
        assert_eq!(summary.batch.imported_count, 2);
        assert_eq!(summary.batch.failed_count, 0);
        assert_eq!(summary.batch.claimed_count, 0);
        assert_eq!(
            summary.batch.expires_at,
            import_time() + Duration::days(30)
        );
        assert_eq!(summary.listings.len(), 2);

        let persisted = store
            .fetch_batch(&summary.batch.id)
            .expect("fetch")
            .expect("batch stored");
        assert_eq!(persisted.imported_count, 2);

        for listing in &summary.listings {
            assert!(listing.claim_token.is_some());
            assert_eq!(
                listing.claim_expires_at,
                Some(import_time() + Duration::days(30))
            );
            assert!(listing.claimed_at.is_none());
            assert!(!listing.is_active);
        }

        let events = notices.events();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|notice| notice.template == "claim_invitation"));
        assert!(events
            .iter()
            .all(|notice| notice.details.contains_key("claim_token")));
    }

    #[test]
    fn issued_tokens_are_unique_across_the_batch() {
        let store = Arc::new(InMemoryListingStore::new());
        let notices = Arc::new(CapturingNotices::default());
        let importer = BatchImporter::new(store, notices);

        let mut csv = String::from(HEADER);
        for n in 0..40 {
            csv.push_str(&format!(
                "{n} Maple Ct,Des Moines,IA,50310,100000,Owner {n},owner{n}@example.com,,\n"
            ));
        }

        let summary = importer
            .from_reader(Cursor::new(csv), import_request(), import_time())
            .expect("import succeeds");

        let tokens: HashSet<_> = summary
            .listings
            .iter()
            .map(|listing| listing.claim_token.clone().expect("token present").0)
            .collect();
        assert_eq!(tokens.len(), 40);
    }

    #[test]
    fn bad_rows_are_counted_and_recorded() {
        let store = Arc::new(InMemoryListingStore::new());
        let notices = Arc::new(CapturingNotices::default());
        let importer = BatchImporter::new(store, notices.clone());

        let csv = format!(
            "{HEADER},Des Moines,IA,50310,100000,No Address,na@example.com,,\n\
             114 Maple Ct,Des Moines,IA,50310,100000,No Email,,,\n\
             87 Birch Ln,Ames,IA,50010,189000,Rosa Vega,rosa@example.com,,\n"
        );
        let summary = importer
            .from_reader(Cursor::new(csv), import_request(), import_time())
            .expect("import succeeds");

        assert_eq!(summary.batch.total_records, 3);
        assert_eq!(summary.batch.imported_count, 1);
        assert_eq!(summary.batch.failed_count, 2);
        assert_eq!(summary.batch.errors.len(), 2);
        assert_eq!(summary.batch.errors[0].line, 2);
        assert_eq!(summary.batch.errors[1].line, 3);
        assert_eq!(notices.events().len(), 1);
    }

    #[test]
    fn from_path_propagates_io_errors() {
        let store = Arc::new(InMemoryListingStore::new());
        let notices = Arc::new(CapturingNotices::default());
        let importer = BatchImporter::new(store, notices);

        let error = importer
            .from_path("./does-not-exist.csv", import_request(), import_time())
            .expect_err("expected io error");

        match error {
            ImportError::Io(_) => {}
            other => panic!("expected io error, got {other:?}"),
        }
    }
}
