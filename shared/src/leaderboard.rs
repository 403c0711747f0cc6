use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry<T> {
    pub candidate: T,
    pub first_choice_votes: u64,
    pub total_votes: u64,
    /// Mean 1-based position over the ballots that rank this candidate.
    pub average_rank: Option<f64>,
}

#[derive(Debug, Default)]
struct RankMetrics {
    first: u64,
    total: u64,
    rank_sum: u64,
}

/// Non-eliminating ranking for live display: most first-choice votes first,
/// ties broken by the better average rank, then by input order.
pub fn rank<T: Clone + Eq + Hash>(candidates: &[T], ballots: &[Vec<T>]) -> Vec<LeaderboardEntry<T>> {
    let mut metrics: HashMap<&T, RankMetrics> = candidates.iter().map(|c| (c, RankMetrics::default())).collect();

    for ballot in ballots {
        let mut seen = HashSet::new();
        for (position, choice) in ballot.iter().enumerate() {
            if !seen.insert(choice) {
                continue;
            }
            if let Some(m) = metrics.get_mut(choice) {
                m.total += 1;
                m.rank_sum += position as u64 + 1;
                if position == 0 {
                    m.first += 1;
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut entries: Vec<LeaderboardEntry<T>> = candidates
        .iter()
        .filter(|c| seen.insert(*c))
        .map(|c| {
            let m = &metrics[c];
            LeaderboardEntry {
                candidate: c.clone(),
                first_choice_votes: m.first,
                total_votes: m.total,
                average_rank: (m.total > 0).then(|| m.rank_sum as f64 / m.total as f64),
            }
        })
        .collect();

    entries.sort_by(|a, b| {
        b.first_choice_votes.cmp(&a.first_choice_votes)
            .then_with(|| compare_average_rank(a.average_rank, b.average_rank))
    });
    entries
}

fn compare_average_rank(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Top entry, provided somebody ranked it first.
pub fn leader<T>(entries: &[LeaderboardEntry<T>]) -> Option<&LeaderboardEntry<T>> {
    entries.first().filter(|e| e.first_choice_votes > 0)
}

/// Plurality "winner" banner: the leader once the poll has closed.
/// Display only, the IRV outcome is authoritative.
pub fn declared_winner<T>(entries: &[LeaderboardEntry<T>], closed: bool) -> Option<&LeaderboardEntry<T>> {
    if closed { leader(entries) } else { None }
}
