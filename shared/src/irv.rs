//! Instant-runoff tally over ranked ballots.
//!
//! Ballots are ordered candidate lists, most preferred first, and may be
//! partial. Each round a ballot counts for its highest-ranked candidate that
//! is still active; a ballot with no active candidate left is exhausted and
//! counts for nobody. All candidates tied at the lowest count are eliminated
//! together, which can empty the active set. That case is reported as
//! [`Outcome::NoWinner`] rather than resolved by a tie-break.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "candidate")]
pub enum Outcome<T> {
    Winner(T),
    /// Every remaining candidate was eliminated in the same round.
    NoWinner,
    NoVotes,
    /// Live counts only, no elimination has been run.
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTally<T> {
    pub candidate: T,
    /// Count in the last round this candidate was active.
    pub votes: u64,
    /// One entry per round in which the candidate was active.
    pub round_votes: Vec<u64>,
    /// Round of elimination, 0 if never eliminated.
    pub eliminated_in: u32,
    pub is_winner: bool,
}

impl<T> CandidateTally<T> {
    fn new(candidate: T) -> Self {
        Self { candidate, votes: 0, round_votes: Vec::new(), eliminated_in: 0, is_winner: false }
    }

    fn record(&mut self, count: u64) {
        self.votes = count;
        self.round_votes.push(count);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round<T> {
    pub number: u32,
    pub active: Vec<T>,
    pub counts: Vec<(T, u64)>,
    pub total: u64,
    pub threshold: u64,
    pub exhausted: u64,
    pub eliminated: Vec<T>,
    pub winner: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrvResult<T> {
    pub candidates: Vec<CandidateTally<T>>,
    pub rounds: Vec<Round<T>>,
    pub outcome: Outcome<T>,
}

impl<T: PartialEq> IrvResult<T> {
    pub fn winner(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Winner(w) => Some(w),
            _ => None,
        }
    }

    pub fn candidate(&self, candidate: &T) -> Option<&CandidateTally<T>> {
        self.candidates.iter().find(|c| &c.candidate == candidate)
    }
}

/// Strictly more than half of `total`.
pub fn majority_threshold(total: u64) -> u64 {
    total / 2 + 1
}

/// Canonical tally. With `is_final` unset only first-choice counts are
/// reported; with it set the full elimination procedure runs.
pub fn tally<T: Clone + Eq + Hash>(candidates: &[T], ballots: &[Vec<T>], is_final: bool) -> IrvResult<T> {
    if is_final {
        return resolve(candidates, ballots);
    }

    let mut tallies: Vec<CandidateTally<T>> = candidates.iter().cloned().map(CandidateTally::new).collect();
    if ballots.is_empty() {
        return IrvResult { candidates: tallies, rounds: Vec::new(), outcome: Outcome::Pending };
    }

    let active = distinct(candidates);
    let (counts, exhausted) = count_first_choices(&active, ballots);
    record_counts(&mut tallies, &counts);
    let total = counts.iter().map(|(_, c)| *c).sum();

    IrvResult {
        candidates: tallies,
        rounds: vec![Round {
            number: 1,
            active,
            counts,
            total,
            threshold: majority_threshold(total),
            exhausted,
            eliminated: Vec::new(),
            winner: None,
        }],
        outcome: Outcome::Pending,
    }
}

/// Runs instant-runoff rounds until a majority winner emerges or the active set
/// shrinks to one or zero candidates.
pub fn resolve<T: Clone + Eq + Hash>(candidates: &[T], ballots: &[Vec<T>]) -> IrvResult<T> {
    let mut tallies: Vec<CandidateTally<T>> = candidates.iter().cloned().map(CandidateTally::new).collect();
    if ballots.is_empty() {
        return IrvResult { candidates: tallies, rounds: Vec::new(), outcome: Outcome::NoVotes };
    }

    let mut active = distinct(candidates);
    let mut rounds: Vec<Round<T>> = Vec::new();
    let mut number: u32 = 0;

    while active.len() > 1 {
        number += 1;
        let (counts, exhausted) = count_first_choices(&active, ballots);
        record_counts(&mut tallies, &counts);

        let total: u64 = counts.iter().map(|(_, c)| *c).sum();
        let threshold = majority_threshold(total);

        let majority = counts.iter().find(|(_, c)| *c >= threshold).map(|(w, _)| w.clone());
        if let Some(winner) = majority {
            mark_winner(&mut tallies, &winner);
            rounds.push(Round {
                number,
                active,
                counts,
                total,
                threshold,
                exhausted,
                eliminated: Vec::new(),
                winner: Some(winner.clone()),
            });
            return IrvResult { candidates: tallies, rounds, outcome: Outcome::Winner(winner) };
        }

        let min_votes = counts.iter().map(|(_, c)| *c).min().unwrap_or(0);
        let eliminated: Vec<T> = counts
            .iter()
            .filter(|(_, c)| *c == min_votes)
            .map(|(candidate, _)| candidate.clone())
            .collect();

        for tally in tallies.iter_mut().filter(|t| eliminated.contains(&t.candidate)) {
            tally.eliminated_in = number;
        }

        let survivors = active.iter().filter(|c| !eliminated.contains(c)).cloned().collect();
        rounds.push(Round {
            number,
            active,
            counts,
            total,
            threshold,
            exhausted,
            eliminated,
            winner: None,
        });
        active = survivors;
    }

    match active.as_slice() {
        [survivor] => {
            let survivor = survivor.clone();
            let total = ballots.len() as u64;
            for tally in tallies.iter_mut().filter(|t| t.candidate == survivor) {
                tally.record(total);
            }
            mark_winner(&mut tallies, &survivor);
            rounds.push(Round {
                number: number + 1,
                active: vec![survivor.clone()],
                counts: vec![(survivor.clone(), total)],
                total,
                threshold: majority_threshold(total),
                exhausted: 0,
                eliminated: Vec::new(),
                winner: Some(survivor.clone()),
            });
            IrvResult { candidates: tallies, rounds, outcome: Outcome::Winner(survivor) }
        }
        _ => IrvResult { candidates: tallies, rounds, outcome: Outcome::NoWinner },
    }
}

fn distinct<T: Clone + Eq + Hash>(candidates: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    candidates.iter().filter(|c| seen.insert(*c)).cloned().collect()
}

/// Counts in `active` order, plus the number of exhausted ballots.
fn count_first_choices<T: Clone + Eq + Hash>(active: &[T], ballots: &[Vec<T>]) -> (Vec<(T, u64)>, u64) {
    let active_set: HashSet<&T> = active.iter().collect();
    let mut by_candidate: HashMap<&T, u64> = HashMap::new();
    let mut exhausted = 0;

    for ballot in ballots {
        match ballot.iter().find(|c| active_set.contains(c)) {
            Some(choice) => *by_candidate.entry(choice).or_insert(0) += 1,
            None => exhausted += 1,
        }
    }

    let counts = active
        .iter()
        .map(|c| (c.clone(), by_candidate.get(c).copied().unwrap_or(0)))
        .collect();
    (counts, exhausted)
}

fn record_counts<T: Eq>(tallies: &mut [CandidateTally<T>], counts: &[(T, u64)]) {
    for (candidate, count) in counts {
        for tally in tallies.iter_mut().filter(|t| &t.candidate == candidate) {
            tally.record(*count);
        }
    }
}

fn mark_winner<T: Eq>(tallies: &mut [CandidateTally<T>], winner: &T) {
    for tally in tallies.iter_mut().filter(|t| &t.candidate == winner) {
        tally.is_winner = true;
    }
}
