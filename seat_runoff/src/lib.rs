mod config;
pub mod builder;
pub mod model;
pub mod outcome;
pub mod rounds;
pub mod snapshot;
pub mod store;

use log::debug;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use std::{cmp::Ordering, collections::HashSet};

pub use crate::config::*;
pub use crate::model::*;
pub use crate::rounds::ElectionCounter;
pub use crate::snapshot::*;
pub use crate::store::*;

// **** Private structures ****

// Candidates that received exactly the same number of votes.
// Invariant: never empty.
#[derive(Eq, PartialEq, Debug, Clone)]
struct TieGroup<'a> {
    votes: u64,
    members: Vec<&'a TallyEntry>,
}

// Accents and case folded away: "Émile" files next to "emile".
fn collation_key(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Orders names the way a reader expects: base letters first, then accents
/// and case, and the raw text only for names that are otherwise equal.
fn compare_names(left: &str, right: &str) -> Ordering {
    collation_key(left)
        .cmp(&collation_key(right))
        .then_with(|| left.to_lowercase().cmp(&right.to_lowercase()))
        .then_with(|| left.cmp(right))
}

// Most votes first. Equal counts are ordered by name for display only.
// The sort is stable: identical names keep the order of the input.
fn sorted_tally(tally: &[TallyEntry]) -> Vec<&TallyEntry> {
    let mut sorted: Vec<&TallyEntry> = tally.iter().collect();
    sorted.sort_by(|left, right| {
        right
            .votes
            .cmp(&left.votes)
            .then_with(|| compare_names(&left.name, &right.name))
    });
    sorted
}

fn tie_groups<'a>(sorted: &[&'a TallyEntry]) -> Vec<TieGroup<'a>> {
    let mut groups: Vec<TieGroup<'a>> = Vec::new();
    for entry in sorted.iter().copied() {
        match groups.last_mut() {
            Some(group) if group.votes == entry.votes => group.members.push(entry),
            _ => groups.push(TieGroup {
                votes: entry.votes,
                members: vec![entry],
            }),
        }
    }
    groups
}

/// Ranks the tally of one ballot.
///
/// Arguments:
/// * `tally` the vote count of every candidate present on the ballot
/// * `seats_available` the seats contested on this ballot
///
/// Groups of candidates with equal counts are walked from the top. A group
/// that fits in the seats still open is elected as a whole. The first group
/// that does not fit is tied for the seats that are left, and everybody
/// below it is eliminated. The alphabetical order of names never decides a
/// seat.
///
/// ```
/// use seat_runoff::{rank_ballot, CandidateId, TallyEntry};
///
/// let tally: Vec<TallyEntry> = [("a", "Anna", 12), ("b", "Bob", 8), ("c", "Clara", 8)]
///     .iter()
///     .map(|(id, name, votes)| TallyEntry {
///         candidate_id: (*id).into(),
///         name: name.to_string(),
///         votes: *votes,
///     })
///     .collect();
///
/// let ranking = rank_ballot(&tally, 2);
/// assert_eq!(ranking.winner_ids, vec![CandidateId::from("a")]);
/// assert_eq!(
///     ranking.tie_candidate_ids,
///     vec![CandidateId::from("b"), CandidateId::from("c")]
/// );
/// assert_eq!(ranking.remaining_seats, 1);
/// ```
pub fn rank_ballot(tally: &[TallyEntry], seats_available: u32) -> BallotRanking {
    let sorted = sorted_tally(tally);
    let groups = tie_groups(&sorted);
    debug!(
        "rank_ballot: {} candidates in {} groups for {} seats",
        sorted.len(),
        groups.len(),
        seats_available
    );

    let mut winner_ids: Vec<CandidateId> = Vec::new();
    let mut tie_candidate_ids: Vec<CandidateId> = Vec::new();
    let mut seats_remaining: u32 = seats_available;

    for group in groups.iter() {
        if seats_remaining == 0 {
            break;
        }
        let group_size = group.members.len() as u32;
        if group_size <= seats_remaining {
            debug!(
                "rank_ballot: group with {} votes elected: {:?}",
                group.votes, group.members
            );
            winner_ids.extend(group.members.iter().map(|e| e.candidate_id.clone()));
            seats_remaining -= group_size;
        } else {
            debug!(
                "rank_ballot: group with {} votes tied for {} seats: {:?}",
                group.votes, seats_remaining, group.members
            );
            tie_candidate_ids.extend(group.members.iter().map(|e| e.candidate_id.clone()));
            break;
        }
    }

    let winner_set: HashSet<&CandidateId> = winner_ids.iter().collect();
    let tie_set: HashSet<&CandidateId> = tie_candidate_ids.iter().collect();

    let mut ranked: Vec<RankedCandidate> = Vec::with_capacity(sorted.len());
    let mut current_rank: u32 = 0;
    let mut previous_votes: Option<u64> = None;
    for (position, entry) in sorted.iter().enumerate() {
        if previous_votes != Some(entry.votes) {
            current_rank = position as u32 + 1;
            previous_votes = Some(entry.votes);
        }
        ranked.push(RankedCandidate {
            candidate_id: entry.candidate_id.clone(),
            name: entry.name.clone(),
            votes: entry.votes,
            rank: current_rank,
            is_winner: winner_set.contains(&entry.candidate_id),
            in_tie: tie_set.contains(&entry.candidate_id),
        });
    }

    let remaining_seats = if tie_candidate_ids.is_empty() {
        0
    } else {
        seats_remaining.max(1)
    };

    BallotRanking {
        ranked,
        winner_ids,
        tie_candidate_ids,
        remaining_seats,
    }
}
