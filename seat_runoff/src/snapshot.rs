use std::collections::HashMap;

use crate::config::*;
use crate::model::*;
use crate::rank_ballot;
use crate::store::StoreTransaction;

/// A vote row joined with its candidate.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyLine {
    pub vote: BallotVote,
    pub candidate: Candidate,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotWithVotes {
    pub ballot: Ballot,
    /// By sort order of the candidates.
    pub votes: Vec<TallyLine>,
}

impl BallotWithVotes {
    pub fn tally(&self) -> Vec<TallyEntry> {
        self.votes
            .iter()
            .map(|line| TallyEntry {
                candidate_id: line.candidate.id.clone(),
                name: line.candidate.name.clone(),
                votes: line.vote.votes,
            })
            .collect()
    }

    /// The candidates present on this ballot.
    pub fn roster(&self) -> Vec<CandidateId> {
        self.votes.iter().map(|line| line.candidate.id.clone()).collect()
    }

    pub fn rank(&self) -> BallotResult {
        BallotResult {
            ballot_id: self.ballot.id.clone(),
            ballot_number: self.ballot.ballot_number,
            seats_available: self.ballot.seats_available,
            status: self.ballot.status,
            kind: self.ballot.kind,
            ranking: rank_ballot(&self.tally(), self.ballot.seats_available),
        }
    }
}

/// The ranking of a ballot, with the ballot it comes from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotResult {
    pub ballot_id: BallotId,
    pub ballot_number: BallotNumber,
    pub seats_available: u32,
    pub status: BallotStatus,
    pub kind: BallotType,
    pub ranking: BallotRanking,
}

/// Everything known about an election at one point in time.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionSnapshot {
    pub election: Election,
    /// By sort order.
    pub candidates: Vec<Candidate>,
    /// By ballot number.
    pub ballots: Vec<BallotWithVotes>,
    pub current_ballot: Option<BallotWithVotes>,
    pub latest_completed_ballot: Option<BallotWithVotes>,
    pub latest_result: Option<BallotResult>,
}

impl ElectionSnapshot {
    /// The elected candidates, in the order they were elected.
    pub fn winners(&self) -> Vec<&Candidate> {
        let mut res: Vec<&Candidate> = self.candidates.iter().filter(|c| c.is_elected()).collect();
        res.sort_by_key(|c| (c.elected_ballot_number(), c.sort_order));
        res
    }

    pub fn has_unresolved_tie(&self) -> bool {
        self.latest_result
            .as_ref()
            .map(|r| r.ranking.has_tie())
            .unwrap_or(false)
    }
}

pub(crate) fn load_ballot(
    tx: &dyn StoreTransaction,
    ballot: Ballot,
    candidates: &HashMap<CandidateId, Candidate>,
) -> ElectionResult<BallotWithVotes> {
    let mut votes: Vec<TallyLine> = Vec::new();
    for vote in tx.votes(&ballot.id)? {
        let candidate = match candidates.get(&vote.candidate_id) {
            Some(c) => c.clone(),
            None => {
                return NotFoundSnafu {
                    entity: "candidate",
                    id: vote.candidate_id.as_str(),
                }
                .fail()
            }
        };
        votes.push(TallyLine { vote, candidate });
    }
    Ok(BallotWithVotes { ballot, votes })
}

/// Reads the full state of an election.
pub fn load_snapshot(
    tx: &dyn StoreTransaction,
    election_id: &ElectionId,
) -> ElectionResult<ElectionSnapshot> {
    let election = match tx.election(election_id)? {
        Some(e) => e,
        None => {
            return NotFoundSnafu {
                entity: "election",
                id: election_id.as_str(),
            }
            .fail()
        }
    };
    let candidates = tx.candidates(election_id)?;
    let by_id: HashMap<CandidateId, Candidate> = candidates
        .iter()
        .map(|c| (c.id.clone(), c.clone()))
        .collect();

    let mut ballots: Vec<BallotWithVotes> = Vec::new();
    for ballot in tx.ballots(election_id)? {
        ballots.push(load_ballot(tx, ballot, &by_id)?);
    }

    let current_ballot = ballots.iter().find(|b| b.ballot.is_counting()).cloned();
    let latest_completed_ballot = ballots
        .iter()
        .filter(|b| b.ballot.status == BallotStatus::Completed)
        .max_by_key(|b| b.ballot.ballot_number)
        .cloned();
    let latest_result = latest_completed_ballot.as_ref().map(|b| b.rank());

    Ok(ElectionSnapshot {
        election,
        candidates,
        ballots,
        current_ballot,
        latest_completed_ballot,
        latest_result,
    })
}
