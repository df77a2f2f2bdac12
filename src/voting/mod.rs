pub mod pairing;
pub mod quota;
pub mod session;
pub mod standings;

pub use pairing::PairGenerator;
pub use quota::VoteCoordinator;
pub use session::{SessionState, VotingSession};
