// ********* Input data structures ***********

use snafu::Snafu;

use crate::model::{BallotId, CandidateId, ElectionId};

/// A request to open a new election.
///
/// The candidate names are kept in the order given: this order becomes the
/// `sort_order` of the candidates.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct NewElection {
    pub description: String,
    pub position: String,
    pub term: String,
    pub seats: u32,
    pub election_date: String,
    pub candidates: Vec<String>,
}

/// The only two changes a teller can make to a tally.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VoteDelta {
    Increment,
    Decrement,
}

impl VoteDelta {
    /// Builds a delta out of a signed step. Only +1 and -1 are accepted.
    pub fn from_step(step: i64) -> Option<VoteDelta> {
        match step {
            1 => Some(VoteDelta::Increment),
            -1 => Some(VoteDelta::Decrement),
            _ => None,
        }
    }

    /// Applies the delta, never going below zero.
    pub fn apply(self, votes: u64) -> u64 {
        match self {
            VoteDelta::Increment => votes.saturating_add(1),
            VoteDelta::Decrement => votes.saturating_sub(1),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteAdjustment {
    pub ballot_id: BallotId,
    pub candidate_id: CandidateId,
    pub delta: VoteDelta,
}

/// An absolute count for one candidate on one ballot.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteUpdate {
    pub candidate_id: CandidateId,
    pub votes: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FinalizeCounting {
    pub election_id: ElectionId,
    pub ballot_id: BallotId,
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CreatedElection {
    pub election_id: ElectionId,
    pub ballot_id: BallotId,
    /// In the order of the candidate names of the request.
    pub candidate_ids: Vec<CandidateId>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AdjustedVote {
    pub ballot_id: BallotId,
    pub candidate_id: CandidateId,
    pub votes: u64,
}

/// One line of the tally of a ballot, as fed to the ranking.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyEntry {
    pub candidate_id: CandidateId,
    pub name: String,
    pub votes: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankedCandidate {
    pub candidate_id: CandidateId,
    pub name: String,
    pub votes: u64,
    /// Competition ranking: candidates with the same count share the rank.
    pub rank: u32,
    pub is_winner: bool,
    pub in_tie: bool,
}

/// The outcome of counting one ballot.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotRanking {
    /// All the candidates, most votes first.
    pub ranked: Vec<RankedCandidate>,
    pub winner_ids: Vec<CandidateId>,
    pub tie_candidate_ids: Vec<CandidateId>,
    /// The seats still open after this ballot: the seats of a runoff.
    /// Zero when nothing is tied.
    pub remaining_seats: u32,
}

impl BallotRanking {
    pub fn has_tie(&self) -> bool {
        !self.tie_candidate_ids.is_empty()
    }

    /// The candidates that are neither winners nor tied, in ranked order.
    pub fn eliminated_ids(&self) -> Vec<CandidateId> {
        self.ranked
            .iter()
            .filter(|rc| !rc.is_winner && !rc.in_tie)
            .map(|rc| rc.candidate_id.clone())
            .collect()
    }
}

/// Errors that prevent an operation from completing.
///
/// No operation writes anything when it returns one of these.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ElectionError {
    #[snafu(display("{entity} not found: {id}"))]
    NotFound { entity: &'static str, id: String },

    #[snafu(display("Invalid state: {reason}"))]
    InvalidState { reason: String },

    #[snafu(display("Invalid input: {reason}"))]
    InvalidInput { reason: String },

    /// Raised by the storage layer only. The caller may retry the operation.
    #[snafu(display("Storage conflict: {reason}"))]
    Conflict { reason: String },

    /// The election cannot move forward anymore.
    #[snafu(display("No progress possible: {reason}"))]
    NoProgress { reason: String },
}

pub type ElectionResult<T> = Result<T, ElectionError>;

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CountingRules {
    /// The highest ballot number an election may reach, runoffs included.
    /// No limit if not set.
    pub max_ballots: Option<u32>,
}

impl CountingRules {
    pub const DEFAULT_RULES: CountingRules = CountingRules {
        max_ballots: Some(100),
    };
}

impl Default for CountingRules {
    fn default() -> Self {
        CountingRules::DEFAULT_RULES
    }
}
