use crate::models::PhotoTally;

// One photo's place on a contest leaderboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub photo_id: String,
    pub photographer_name: String,
    pub votes: i64,
    pub rank: usize,
}

/// Orders photos by raw vote count, highest first.
///
/// Equal counts share a rank and keep submission order (1, 1, 3 ...).
pub fn rank_photos(tallies: &[PhotoTally]) -> Vec<Standing> {
    let mut sorted: Vec<&PhotoTally> = tallies.iter().collect();
    sorted.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));

    let mut standings: Vec<Standing> = Vec::with_capacity(sorted.len());
    for (position, tally) in sorted.into_iter().enumerate() {
        let rank = match standings.last() {
            Some(prev) if prev.votes == tally.vote_count => prev.rank,
            _ => position + 1,
        };
        standings.push(Standing {
            photo_id: tally.photo.id.clone(),
            photographer_name: tally.photo.photographer_name.clone(),
            votes: tally.vote_count,
            rank,
        });
    }
    standings
}

/// Formats the top `limit` standings as chat text, leaders in bold.
pub fn format_leaderboard(standings: &[Standing], limit: usize) -> String {
    if standings.is_empty() {
        return "No approved photos in this contest yet.".to_string();
    }

    let total_votes: i64 = standings.iter().map(|s| s.votes).sum();
    let mut summary = String::new();

    for standing in standings.iter().take(limit) {
        let votes_label = if standing.votes == 1 { "vote" } else { "votes" };
        let line = if standing.rank == 1 {
            format!("**#{} {}**: {} {}", standing.rank, standing.photographer_name, standing.votes, votes_label)
        } else {
            format!("#{} {}: {} {}", standing.rank, standing.photographer_name, standing.votes, votes_label)
        };
        summary.push_str(&line);
        summary.push('\n');
    }

    summary.push_str(&format!("\n{} votes cast across {} photos.", total_votes, standings.len()));
    summary
}
