use thiserror::Error;

use crate::models::QuotaScope;

/// Failures at the ledger boundary (database, remote procedure, payload shape).
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No {0} votes remaining")]
    QuotaExhausted(QuotaScope),

    #[error("Contest not found: {0}")]
    UnknownContest(String),

    #[error("Photo not found: {0}")]
    UnknownPhoto(String),

    #[error("Malformed ledger response: {0}")]
    Malformed(String),
}

/// What the voting UI is told. Raw ledger errors never get past the coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VotingError {
    #[error("Sign in to vote")]
    NotAuthenticated,

    #[error("You have used all your {0} votes for this contest")]
    QuotaExceeded(QuotaScope),

    #[error("Could not load your remaining votes: {0}")]
    QuotaFetch(String),

    #[error("Your vote could not be recorded: {0}")]
    VoteSubmit(String),

    #[error("This contest needs at least two approved photos to vote")]
    PoolInsufficient,

    #[error("There is no pair to vote on right now")]
    SessionInactive,

    #[error("Photos from contest {0} cannot be voted on in this session")]
    ContestMismatch(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
