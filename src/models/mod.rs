use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

use crate::error::LedgerError;

#[derive(Debug, Clone)]
pub struct Contest {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Contest {
    pub fn new(name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            created_at: Utc::now(),
        }
    }
}

/// A contest entry as seen by the voting core. Read-only for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    pub photographer_name: String,
    pub photographer_avatar_url: Option<String>,
    pub image_url: String,
    pub description: Option<String>,
}

impl Photo {
    pub fn new(photographer_name: String, image_url: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            photographer_name,
            photographer_avatar_url: None,
            image_url,
            description: None,
        }
    }
}

/// Moderation status of a submitted photo. Only approved photos enter a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoStatus {
    Pending,
    Approved,
    Rejected,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Pending => "pending",
            PhotoStatus::Approved => "approved",
            PhotoStatus::Rejected => "rejected",
        }
    }
}

/// The fixed set of photos a session draws pairs from.
///
/// Photo ids are unique within a pool; later duplicates are dropped on construction
/// so a pair can never hold the same photo twice.
#[derive(Debug, Clone)]
pub struct CandidatePool {
    contest_id: String,
    photos: Vec<Photo>,
}

impl CandidatePool {
    pub fn new(contest_id: impl Into<String>, photos: Vec<Photo>) -> Self {
        let mut seen = HashSet::new();
        let photos = photos
            .into_iter()
            .filter(|photo| seen.insert(photo.id.clone()))
            .collect();

        Self {
            contest_id: contest_id.into(),
            photos,
        }
    }

    pub fn contest_id(&self) -> &str {
        &self.contest_id
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Photo> {
        self.photos.get(index)
    }

    pub fn position(&self, photo_id: &str) -> Option<usize> {
        self.photos.iter().position(|photo| photo.id == photo_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Two distinct photos shown side by side. Display order is kept, but comparisons
/// between pairs are order-insensitive (see [`PhotoPair::same_photos`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPair {
    left: Photo,
    right: Photo,
}

impl PhotoPair {
    pub fn new(left: Photo, right: Photo) -> Option<Self> {
        if left.id == right.id {
            return None;
        }
        Some(Self { left, right })
    }

    pub fn left(&self) -> &Photo {
        &self.left
    }

    pub fn right(&self) -> &Photo {
        &self.right
    }

    pub fn contains(&self, photo_id: &str) -> bool {
        self.left.id == photo_id || self.right.id == photo_id
    }

    pub fn same_photos(&self, other: &PhotoPair) -> bool {
        other.contains(&self.left.id) && other.contains(&self.right.id)
    }

    /// Returns `(winner, loser)` for a vote on `side`.
    pub fn pick(&self, side: Side) -> (&Photo, &Photo) {
        match side {
            Side::Left => (&self.left, &self.right),
            Side::Right => (&self.right, &self.left),
        }
    }
}

/// Which budget stopped a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    Lifetime,
    Daily,
}

impl fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaScope::Lifetime => write!(f, "lifetime"),
            QuotaScope::Daily => write!(f, "daily"),
        }
    }
}

/// Locally cached view of a user's quota for one contest.
///
/// `None` counts mean the ledger has not been asked yet. The struct is only ever
/// replaced wholesale with a ledger snapshot, never adjusted by arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteQuota {
    pub total_votes_remaining: Option<u32>,
    pub daily_votes_remaining: Option<u32>,
    pub can_vote: bool,
}

impl VoteQuota {
    pub fn unknown() -> Self {
        Self {
            total_votes_remaining: None,
            daily_votes_remaining: None,
            can_vote: true,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            can_vote: false,
            ..Self::unknown()
        }
    }

    pub fn allows_vote(&self) -> bool {
        self.can_vote
            && self.total_votes_remaining.map_or(true, |n| n > 0)
            && self.daily_votes_remaining.map_or(true, |n| n > 0)
    }

    /// The budget that blocks voting, or `None` while votes remain.
    ///
    /// A refusal without a zero counter is reported as daily: the ledger is
    /// holding the user back for now, which a later day may lift.
    pub fn exhausted_scope(&self) -> Option<QuotaScope> {
        if self.allows_vote() {
            return None;
        }
        if self.total_votes_remaining == Some(0) {
            Some(QuotaScope::Lifetime)
        } else {
            Some(QuotaScope::Daily)
        }
    }
}

impl Default for VoteQuota {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Quota payload exactly as the ledger returns it. Fields are optional so a
/// response with missing members can be rejected instead of guessed at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub total_votes_remaining: Option<i64>,
    pub daily_votes_remaining: Option<i64>,
    pub can_vote: Option<bool>,
}

impl LedgerSnapshot {
    pub fn new(total_votes_remaining: i64, daily_votes_remaining: i64, can_vote: bool) -> Self {
        Self {
            total_votes_remaining: Some(total_votes_remaining),
            daily_votes_remaining: Some(daily_votes_remaining),
            can_vote: Some(can_vote),
        }
    }
}

impl TryFrom<LedgerSnapshot> for VoteQuota {
    type Error = LedgerError;

    fn try_from(snapshot: LedgerSnapshot) -> Result<Self, Self::Error> {
        let total = snapshot
            .total_votes_remaining
            .ok_or_else(|| LedgerError::Malformed("missing totalVotesRemaining".to_string()))?;
        let daily = snapshot
            .daily_votes_remaining
            .ok_or_else(|| LedgerError::Malformed("missing dailyVotesRemaining".to_string()))?;
        let can_vote = snapshot
            .can_vote
            .ok_or_else(|| LedgerError::Malformed("missing canVote".to_string()))?;

        let total = u32::try_from(total)
            .map_err(|_| LedgerError::Malformed(format!("totalVotesRemaining out of range: {}", total)))?;
        let daily = u32::try_from(daily)
            .map_err(|_| LedgerError::Malformed(format!("dailyVotesRemaining out of range: {}", daily)))?;

        Ok(Self {
            total_votes_remaining: Some(total),
            daily_votes_remaining: Some(daily),
            can_vote,
        })
    }
}

/// Raw vote count of one photo, as stored by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoTally {
    pub photo: Photo,
    pub vote_count: i64,
}
