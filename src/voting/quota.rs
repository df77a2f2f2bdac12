use log::{error, info, warn};
use std::sync::Arc;

use crate::error::{LedgerError, VotingError};
use crate::ledger::VoteLedger;
use crate::models::VoteQuota;

/// Holds one user's quota for one contest and talks to the ledger on its behalf.
///
/// Local quota state is only ever replaced with a snapshot returned by the ledger.
pub struct VoteCoordinator {
    ledger: Arc<dyn VoteLedger>,
    user_id: Option<String>,
    contest_id: String,
    quota: VoteQuota,
}

impl VoteCoordinator {
    pub fn new(ledger: Arc<dyn VoteLedger>, user_id: Option<String>, contest_id: impl Into<String>) -> Self {
        let quota = if user_id.is_some() {
            VoteQuota::unknown()
        } else {
            VoteQuota::signed_out()
        };

        Self {
            ledger,
            user_id,
            contest_id: contest_id.into(),
            quota,
        }
    }

    pub fn contest_id(&self) -> &str {
        &self.contest_id
    }

    pub fn quota(&self) -> &VoteQuota {
        &self.quota
    }

    pub fn can_submit_vote(&self) -> bool {
        self.user_id.is_some() && self.quota.allows_vote()
    }

    /// Fetches the current quota. On a ledger failure the cached quota is left as it was.
    pub async fn load_quota(&mut self) -> Result<VoteQuota, VotingError> {
        let Some(user_id) = self.user_id.as_deref() else {
            self.quota = VoteQuota::signed_out();
            return Err(VotingError::NotAuthenticated);
        };

        let snapshot = self
            .ledger
            .get_vote_status(user_id, &self.contest_id)
            .await
            .map_err(|e| {
                error!("Failed to fetch vote status for {} in contest {}: {}", user_id, self.contest_id, e);
                VotingError::QuotaFetch(e.to_string())
            })?;

        let quota = VoteQuota::try_from(snapshot).map_err(|e| {
            warn!("Rejected vote status for {} in contest {}: {}", user_id, self.contest_id, e);
            VotingError::QuotaFetch(e.to_string())
        })?;

        self.quota = quota;
        Ok(quota)
    }

    /// Spends one vote and credits `winner_photo_id`.
    ///
    /// The quota call and the tally call are separate ledger operations issued in that
    /// order. If the tally call fails the vote stays spent and the returned error is
    /// [`VotingError::VoteSubmit`]; the cached quota already reflects the spend.
    /// A malformed post-vote snapshot is also a `VoteSubmit`, reported after the tally.
    pub async fn submit_vote(&mut self, winner_photo_id: &str, loser_photo_id: &str) -> Result<VoteQuota, VotingError> {
        let Some(user_id) = self.user_id.as_deref() else {
            return Err(VotingError::NotAuthenticated);
        };

        if let Some(scope) = self.quota.exhausted_scope() {
            warn!("Vote refused locally for {} in contest {}: {} quota spent", user_id, self.contest_id, scope);
            return Err(VotingError::QuotaExceeded(scope));
        }

        let snapshot = match self.ledger.consume_vote(user_id, &self.contest_id).await {
            Ok(snapshot) => snapshot,
            Err(LedgerError::QuotaExhausted(scope)) => {
                warn!("Ledger refused vote for {} in contest {}: {} quota spent", user_id, self.contest_id, scope);
                return Err(VotingError::QuotaExceeded(scope));
            }
            Err(e) => {
                error!("Failed to consume vote for {} in contest {}: {}", user_id, self.contest_id, e);
                return Err(VotingError::VoteSubmit(e.to_string()));
            }
        };

        // The vote is spent from here on, so the tally is issued whatever the snapshot looks like.
        let parsed = VoteQuota::try_from(snapshot);
        self.quota = match &parsed {
            Ok(quota) => *quota,
            Err(_) => VoteQuota::unknown(),
        };

        if let Err(e) = self.ledger.increment_photo_tally(winner_photo_id).await {
            error!(
                "Vote by {} in contest {} was spent but the tally for photo {} was not incremented: {}",
                user_id, self.contest_id, winner_photo_id, e
            );
            return Err(VotingError::VoteSubmit(e.to_string()));
        }

        let quota = parsed.map_err(|e| {
            error!(
                "Vote by {} in contest {} was recorded but the ledger returned a malformed snapshot: {}",
                user_id, self.contest_id, e
            );
            VotingError::VoteSubmit(e.to_string())
        })?;

        info!(
            "Recorded vote by {} in contest {}: {} over {} ({:?} total, {:?} today remaining)",
            user_id,
            self.contest_id,
            winner_photo_id,
            loser_photo_id,
            quota.total_votes_remaining,
            quota.daily_votes_remaining
        );
        Ok(quota)
    }
}
