//! The four operations the voting core needs from the backend.
//!
//! Implementations are expected to be externally synchronised: `consume_vote` must
//! decrement-if-positive atomically per user, and `increment_photo_tally` must be an
//! atomic per-photo increment. The core does no locking of its own.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::LedgerError;
use crate::models::{LedgerSnapshot, Photo};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoteLedger: Send + Sync {
    async fn get_vote_status(&self, user_id: &str, contest_id: &str) -> Result<LedgerSnapshot, LedgerError>;

    /// Spends one vote. Fails with [`LedgerError::QuotaExhausted`] when either budget is empty.
    async fn consume_vote(&self, user_id: &str, contest_id: &str) -> Result<LedgerSnapshot, LedgerError>;

    async fn increment_photo_tally(&self, photo_id: &str) -> Result<(), LedgerError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait PhotoSource: Send + Sync {
    async fn get_approved_photos(&self, contest_id: &str) -> Result<Vec<Photo>, LedgerError>;
}
