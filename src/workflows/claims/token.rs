use chrono::{DateTime, Duration, Utc};
use rand::RngCore;

use super::domain::ClaimToken;
use super::repository::{ListingStore, StoreError};

const TOKEN_BYTES: usize = 16;
pub const DEFAULT_TOKEN_ATTEMPTS: u32 = 8;

/// Token plus the expiry stamped alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedClaim {
    pub token: ClaimToken,
    pub expires_at: DateTime<Utc>,
}

/// Generates unguessable claim tokens: 128 bits from the thread RNG,
/// hex-encoded, checked against the store and retried on collision up to
/// a bounded attempt budget. The store's unique token constraint backstops
/// the check at insert time.
#[derive(Debug, Clone, Copy)]
pub struct ClaimTokenIssuer {
    max_attempts: u32,
}

impl Default for ClaimTokenIssuer {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_TOKEN_ATTEMPTS,
        }
    }
}

impl ClaimTokenIssuer {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn issue<S: ListingStore>(
        &self,
        store: &S,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedClaim, TokenGenerationError> {
        for _ in 0..self.max_attempts {
            let token = random_token();
            if !store.token_in_use(&token)? {
                return Ok(IssuedClaim {
                    token,
                    expires_at: now + ttl,
                });
            }
        }

        Err(TokenGenerationError::AttemptsExhausted {
            attempts: self.max_attempts,
        })
    }
}

fn random_token() -> ClaimToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut encoded = String::with_capacity(TOKEN_BYTES * 2);
    for byte in bytes {
        encoded.push_str(&format!("{byte:02x}"));
    }
    ClaimToken(encoded)
}

/// An exhausted retry budget signals a broken RNG or a pathological token
/// namespace, not a user mistake.
#[derive(Debug, thiserror::Error)]
pub enum TokenGenerationError {
    #[error("could not produce a unique claim token after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },
    #[error(transparent)]
    Store(#[from] StoreError),
}
