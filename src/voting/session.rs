use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::watch;

use crate::error::VotingError;
use crate::models::{CandidatePool, PhotoPair, Side, VoteQuota};
use crate::voting::pairing::PairGenerator;
use crate::voting::quota::VoteCoordinator;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Loading,
    /// Fewer than two approved photos; nothing to compare until a new pool arrives.
    Insufficient,
    Active {
        pair: PhotoPair,
        votes_cast: u32,
    },
    Exhausted {
        votes_cast: u32,
    },
    /// A vote failed in transit. The pair is kept so the user can try it again.
    Error {
        pair: PhotoPair,
        votes_cast: u32,
        error: VotingError,
    },
}

impl SessionState {
    pub fn votes_cast(&self) -> u32 {
        match self {
            SessionState::Active { votes_cast, .. }
            | SessionState::Exhausted { votes_cast }
            | SessionState::Error { votes_cast, .. } => *votes_cast,
            SessionState::Loading | SessionState::Insufficient => 0,
        }
    }
}

/// One user voting on one contest.
///
/// `&mut self` on every transition means a session can have at most one vote in
/// flight; callers sharing a session across tasks hold it behind a mutex.
pub struct VotingSession<R = StdRng> {
    pool: CandidatePool,
    generator: PairGenerator<R>,
    coordinator: VoteCoordinator,
    state: SessionState,
    round: u64,
    state_tx: watch::Sender<SessionState>,
}

impl<R: Rng> VotingSession<R> {
    pub fn new(coordinator: VoteCoordinator, generator: PairGenerator<R>) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Loading);
        let pool = CandidatePool::new(coordinator.contest_id(), Vec::new());

        Self {
            pool,
            generator,
            coordinator,
            state: SessionState::Loading,
            round: 0,
            state_tx,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Receives every state the session moves through.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Increases each time a new pair is put on screen.
    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn contest_id(&self) -> &str {
        self.coordinator.contest_id()
    }

    pub fn pool(&self) -> &CandidatePool {
        &self.pool
    }

    pub fn quota(&self) -> &VoteQuota {
        self.coordinator.quota()
    }

    pub fn can_vote(&self) -> bool {
        self.coordinator.can_submit_vote()
    }

    pub fn current_pair(&self) -> Option<&PhotoPair> {
        match &self.state {
            SessionState::Active { pair, .. } | SessionState::Error { pair, .. } => Some(pair),
            _ => None,
        }
    }

    /// Installs `pool` and shows the first pair.
    ///
    /// A quota error is returned for the UI to display but does not block the
    /// session: the pair is still shown and the ledger remains the final judge.
    pub async fn start_session(&mut self, pool: CandidatePool) -> Result<(), VotingError> {
        if pool.contest_id() != self.coordinator.contest_id() {
            warn!(
                "Refusing pool for contest {} in session for contest {}",
                pool.contest_id(),
                self.coordinator.contest_id()
            );
            return Err(VotingError::ContestMismatch(pool.contest_id().to_string()));
        }
        self.pool = pool;
        self.set_state(SessionState::Loading);

        if self.pool.len() < 2 {
            info!("Contest {} has {} photo(s), not enough to vote", self.contest_id(), self.pool.len());
            self.set_state(SessionState::Insufficient);
            return Err(VotingError::PoolInsufficient);
        }

        let loaded = self.coordinator.load_quota().await;
        self.show_fresh_pair(0)?;
        info!("Started voting session on contest {} with {} photos", self.contest_id(), self.pool.len());

        loaded.map(|_| ())
    }

    /// Votes for the photo on `side` of the current pair.
    ///
    /// On success the next pair is drawn and the returned quota is the ledger's
    /// post-vote snapshot. A failed submission moves the session to
    /// [`SessionState::Error`] with the same pair; every other failure leaves the
    /// state untouched.
    pub async fn vote(&mut self, side: Side) -> Result<VoteQuota, VotingError> {
        let (pair, votes_cast) = match &self.state {
            SessionState::Active { pair, votes_cast } | SessionState::Error { pair, votes_cast, .. } => {
                (pair.clone(), *votes_cast)
            }
            SessionState::Insufficient => return Err(VotingError::PoolInsufficient),
            SessionState::Loading | SessionState::Exhausted { .. } => return Err(VotingError::SessionInactive),
        };

        let (winner, loser) = pair.pick(side);
        let submitted = self.coordinator.submit_vote(&winner.id, &loser.id).await;
        match submitted {
            Ok(quota) => {
                match self.generator.next_pair(&self.pool, Some(&pair)) {
                    Some(next) => {
                        self.round += 1;
                        self.set_state(SessionState::Active {
                            pair: next,
                            votes_cast: votes_cast + 1,
                        });
                    }
                    None => self.set_state(SessionState::Insufficient),
                }
                Ok(quota)
            }
            Err(error @ VotingError::VoteSubmit(_)) => {
                self.set_state(SessionState::Error {
                    pair,
                    votes_cast,
                    error: error.clone(),
                });
                Err(error)
            }
            Err(error) => Err(error),
        }
    }

    /// Puts the pair that failed back on screen.
    pub fn retry(&mut self) -> Result<(), VotingError> {
        match &self.state {
            SessionState::Error { pair, votes_cast, .. } => {
                let state = SessionState::Active {
                    pair: pair.clone(),
                    votes_cast: *votes_cast,
                };
                self.set_state(state);
                Ok(())
            }
            _ => Err(VotingError::SessionInactive),
        }
    }

    /// The user is done for now. Returns how many votes this session recorded.
    pub fn finish(&mut self) -> Result<u32, VotingError> {
        match &self.state {
            SessionState::Active { votes_cast, .. } | SessionState::Error { votes_cast, .. } => {
                let votes_cast = *votes_cast;
                info!("Finished voting session on contest {} after {} vote(s)", self.contest_id(), votes_cast);
                self.set_state(SessionState::Exhausted { votes_cast });
                Ok(votes_cast)
            }
            _ => Err(VotingError::SessionInactive),
        }
    }

    /// Starts over on the full pool with the session count back at zero.
    pub fn reset_session(&mut self) -> Result<(), VotingError> {
        if self.state == SessionState::Loading {
            return Err(VotingError::SessionInactive);
        }
        if self.pool.len() < 2 {
            self.set_state(SessionState::Insufficient);
            return Err(VotingError::PoolInsufficient);
        }

        self.show_fresh_pair(0)?;
        info!("Reset voting session on contest {}", self.contest_id());
        Ok(())
    }

    fn show_fresh_pair(&mut self, votes_cast: u32) -> Result<(), VotingError> {
        let Some(pair) = self.generator.next_pair(&self.pool, None) else {
            self.set_state(SessionState::Insufficient);
            return Err(VotingError::PoolInsufficient);
        };
        self.round += 1;
        self.set_state(SessionState::Active { pair, votes_cast });
        Ok(())
    }

    fn set_state(&mut self, state: SessionState) {
        self.state_tx.send_replace(state.clone());
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::MockVoteLedger;
    use crate::models::{LedgerSnapshot, Photo, QuotaScope};
    use std::sync::Arc;

    fn photo(id: &str) -> Photo {
        Photo {
            id: id.to_string(),
            photographer_name: format!("Photographer {}", id),
            photographer_avatar_url: None,
            image_url: format!("https://img.example/{}.jpg", id),
            description: Some(format!("Entry {}", id)),
        }
    }

    fn pool(ids: &[&str]) -> CandidatePool {
        CandidatePool::new("contest-1", ids.iter().map(|id| photo(id)).collect())
    }

    fn session(ledger: MockVoteLedger, user: Option<&str>) -> VotingSession {
        let coordinator = VoteCoordinator::new(Arc::new(ledger), user.map(str::to_string), "contest-1");
        VotingSession::new(coordinator, PairGenerator::seeded(17))
    }

    fn ledger_with_status(total: i64, daily: i64, can_vote: bool) -> MockVoteLedger {
        let mut ledger = MockVoteLedger::new();
        ledger
            .expect_get_vote_status()
            .returning(move |_, _| Ok(LedgerSnapshot::new(total, daily, can_vote)));
        ledger
    }

    #[tokio::test]
    async fn small_pool_is_insufficient_without_ledger_calls() {
        let mut session = session(MockVoteLedger::new(), Some("user-1"));

        assert_eq!(session.start_session(pool(&["p1"])).await, Err(VotingError::PoolInsufficient));
        assert_eq!(*session.state(), SessionState::Insufficient);
        assert!(session.current_pair().is_none());
        assert_eq!(session.vote(Side::Left).await, Err(VotingError::PoolInsufficient));
    }

    #[tokio::test]
    async fn pool_from_another_contest_is_refused() {
        let mut session = session(MockVoteLedger::new(), Some("user-1"));
        let other = CandidatePool::new("contest-2", vec![photo("p1"), photo("p2"), photo("p3")]);

        assert_eq!(
            session.start_session(other).await,
            Err(VotingError::ContestMismatch("contest-2".to_string()))
        );
        assert_eq!(*session.state(), SessionState::Loading);
        assert!(session.pool().is_empty());
        assert_eq!(session.vote(Side::Left).await, Err(VotingError::SessionInactive));
    }

    #[tokio::test]
    async fn start_shows_a_pair() {
        let mut session = session(ledger_with_status(10, 5, true), Some("user-1"));

        session.start_session(pool(&["p1", "p2", "p3"])).await.unwrap();

        assert!(matches!(session.state(), SessionState::Active { votes_cast: 0, .. }));
        assert!(session.current_pair().is_some());
        assert_eq!(session.quota().total_votes_remaining, Some(10));
        assert_eq!(session.round(), 1);
    }

    #[tokio::test]
    async fn accepted_vote_draws_a_different_pair() {
        let mut ledger = ledger_with_status(10, 5, true);
        let mut total = 10;
        ledger.expect_consume_vote().returning(move |_, _| {
            total -= 1;
            Ok(LedgerSnapshot::new(total, 5, true))
        });
        ledger.expect_increment_photo_tally().returning(|_| Ok(()));
        let mut session = session(ledger, Some("user-1"));
        session.start_session(pool(&["p1", "p2", "p3"])).await.unwrap();

        for expected in 1..=6 {
            let before = session.current_pair().cloned().unwrap();
            let quota = session.vote(Side::Left).await.unwrap();
            let after = session.current_pair().unwrap();

            assert!(!after.same_photos(&before));
            assert_eq!(session.state().votes_cast(), expected);
            assert_eq!(quota.total_votes_remaining, Some(10 - expected));
            assert_eq!(*session.quota(), quota);
        }
    }

    #[tokio::test]
    async fn winner_is_the_chosen_side() {
        let photos = pool(&["p1", "p2", "p3"]);
        let expected = PairGenerator::seeded(17)
            .next_pair(&photos, None)
            .unwrap()
            .right()
            .id
            .clone();

        let mut ledger = ledger_with_status(10, 5, true);
        ledger
            .expect_consume_vote()
            .returning(|_, _| Ok(LedgerSnapshot::new(9, 4, true)));
        ledger
            .expect_increment_photo_tally()
            .withf(move |photo_id| photo_id == expected)
            .times(1)
            .returning(|_| Ok(()));
        let mut session = session(ledger, Some("user-1"));

        session.start_session(photos).await.unwrap();
        session.vote(Side::Right).await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_quota_refuses_without_network() {
        let mut ledger = ledger_with_status(0, 5, false);
        ledger.expect_consume_vote().never();
        ledger.expect_increment_photo_tally().never();
        let mut session = session(ledger, Some("user-1"));
        session.start_session(pool(&["p1", "p2", "p3"])).await.unwrap();
        let before = session.state().clone();

        assert!(!session.can_vote());
        assert_eq!(
            session.vote(Side::Left).await,
            Err(VotingError::QuotaExceeded(QuotaScope::Lifetime))
        );
        assert_eq!(*session.state(), before);
    }

    #[tokio::test]
    async fn tally_failure_leaves_error_state_with_quota_spent() {
        let mut ledger = ledger_with_status(10, 5, true);
        ledger
            .expect_consume_vote()
            .times(1)
            .returning(|_, _| Ok(LedgerSnapshot::new(9, 4, true)));
        ledger
            .expect_increment_photo_tally()
            .times(1)
            .returning(|photo_id| Err(LedgerError::UnknownPhoto(photo_id.to_string())));
        let mut session = session(ledger, Some("user-1"));
        session.start_session(pool(&["p1", "p2", "p3"])).await.unwrap();
        let pair = session.current_pair().cloned().unwrap();

        let result = session.vote(Side::Left).await;

        assert!(matches!(result, Err(VotingError::VoteSubmit(_))));
        match session.state() {
            SessionState::Error { pair: kept, votes_cast, error } => {
                assert_eq!(*kept, pair);
                assert_eq!(*votes_cast, 0);
                assert!(matches!(error, VotingError::VoteSubmit(_)));
            }
            other => panic!("expected error state, got {:?}", other),
        }
        assert_eq!(session.quota().total_votes_remaining, Some(9));

        session.retry().unwrap();
        assert_eq!(
            *session.state(),
            SessionState::Active { pair, votes_cast: 0 }
        );
    }

    #[tokio::test]
    async fn transient_consume_failure_keeps_the_pair_voteable() {
        let mut ledger = ledger_with_status(10, 5, true);
        let mut attempts = 0;
        ledger.expect_consume_vote().times(2).returning(move |_, _| {
            attempts += 1;
            if attempts == 1 {
                Err(LedgerError::Malformed("connection reset".to_string()))
            } else {
                Ok(LedgerSnapshot::new(9, 4, true))
            }
        });
        ledger.expect_increment_photo_tally().times(1).returning(|_| Ok(()));
        let mut session = session(ledger, Some("user-1"));
        session.start_session(pool(&["p1", "p2", "p3"])).await.unwrap();

        assert!(session.vote(Side::Right).await.is_err());
        assert!(matches!(session.state(), SessionState::Error { .. }));

        session.vote(Side::Right).await.unwrap();
        assert!(matches!(session.state(), SessionState::Active { votes_cast: 1, .. }));
    }

    #[tokio::test]
    async fn reset_after_finish_starts_from_zero() {
        let mut ledger = ledger_with_status(10, 5, true);
        ledger
            .expect_consume_vote()
            .returning(|_, _| Ok(LedgerSnapshot::new(9, 4, true)));
        ledger.expect_increment_photo_tally().returning(|_| Ok(()));
        let mut session = session(ledger, Some("user-1"));
        session.start_session(pool(&["p1", "p2", "p3", "p4"])).await.unwrap();
        session.vote(Side::Left).await.unwrap();
        session.vote(Side::Right).await.unwrap();

        assert_eq!(session.finish(), Ok(2));
        assert_eq!(*session.state(), SessionState::Exhausted { votes_cast: 2 });
        assert!(session.current_pair().is_none());
        assert_eq!(session.vote(Side::Left).await, Err(VotingError::SessionInactive));

        session.reset_session().unwrap();
        assert!(matches!(session.state(), SessionState::Active { votes_cast: 0, .. }));
        assert_eq!(session.pool().len(), 4);
    }

    #[tokio::test]
    async fn signed_out_user_sees_pairs_but_cannot_vote() {
        let mut ledger = MockVoteLedger::new();
        ledger.expect_get_vote_status().never();
        ledger.expect_consume_vote().never();
        let mut session = session(ledger, None);

        assert_eq!(
            session.start_session(pool(&["p1", "p2", "p3"])).await,
            Err(VotingError::NotAuthenticated)
        );
        assert!(session.current_pair().is_some());
        assert!(!session.can_vote());
        assert_eq!(session.vote(Side::Left).await, Err(VotingError::NotAuthenticated));
    }

    #[tokio::test]
    async fn quota_fetch_failure_does_not_block_start() {
        let mut ledger = MockVoteLedger::new();
        ledger
            .expect_get_vote_status()
            .returning(|_, _| Err(LedgerError::UnknownContest("contest-1".to_string())));
        let mut session = session(ledger, Some("user-1"));

        let result = session.start_session(pool(&["p1", "p2"])).await;

        assert!(matches!(result, Err(VotingError::QuotaFetch(_))));
        assert!(matches!(session.state(), SessionState::Active { .. }));
        assert!(session.can_vote());
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let mut session = session(ledger_with_status(10, 5, true), Some("user-1"));
        let mut states = session.subscribe();
        assert_eq!(*states.borrow(), SessionState::Loading);

        session.start_session(pool(&["p1", "p2", "p3"])).await.unwrap();
        assert!(states.has_changed().unwrap());
        assert!(matches!(*states.borrow_and_update(), SessionState::Active { .. }));

        session.finish().unwrap();
        assert_eq!(*states.borrow_and_update(), SessionState::Exhausted { votes_cast: 0 });
    }

    #[tokio::test]
    async fn retry_and_finish_need_a_pair() {
        let mut session = session(MockVoteLedger::new(), Some("user-1"));
        assert_eq!(session.retry(), Err(VotingError::SessionInactive));
        assert_eq!(session.finish(), Err(VotingError::SessionInactive));
        assert_eq!(session.reset_session(), Err(VotingError::SessionInactive));
    }
}
