//! Entities of an election, as they are read from and written to the store.
//!
//! Every lifecycle field is a closed enumeration. The transitions are methods
//! that refuse illegal edges, so a caller cannot, for instance, complete a
//! ballot twice or elect a candidate that was already eliminated.

use std::fmt::Display;

use chrono::{DateTime, Utc};

use crate::config::*;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_id!(ElectionId);
string_id!(CandidateId);
string_id!(BallotId);
string_id!(BallotVoteId);

pub type BallotNumber = u32;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ElectionStatus {
    /// Reserved for a setup workflow. Elections are currently created counting.
    Draft,
    Counting,
    Finalized,
}

impl ElectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ElectionStatus::Draft => "draft",
            ElectionStatus::Counting => "counting",
            ElectionStatus::Finalized => "finalized",
        }
    }

    /// Only a counting election may receive ballots and votes.
    pub fn accepts_ballots(self) -> bool {
        self == ElectionStatus::Counting
    }

    pub fn finalize(self) -> ElectionResult<ElectionStatus> {
        match self {
            ElectionStatus::Counting => Ok(ElectionStatus::Finalized),
            ElectionStatus::Finalized => InvalidStateSnafu {
                reason: "the election is already finalized",
            }
            .fail(),
            ElectionStatus::Draft => InvalidStateSnafu {
                reason: "a draft election has no ballot to finalize",
            }
            .fail(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum BallotStatus {
    Counting,
    Completed,
}

impl BallotStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BallotStatus::Counting => "counting",
            BallotStatus::Completed => "completed",
        }
    }

    pub fn complete(self) -> ElectionResult<BallotStatus> {
        match self {
            BallotStatus::Counting => Ok(BallotStatus::Completed),
            BallotStatus::Completed => InvalidStateSnafu {
                reason: "this ballot has already been finalized",
            }
            .fail(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum BallotType {
    Primary,
    Runoff,
}

impl BallotType {
    pub fn as_str(self) -> &'static str {
        match self {
            BallotType::Primary => "primary",
            BallotType::Runoff => "runoff",
        }
    }
}

/// What happened to a candidate so far. Set at most once.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum CandidateOutcome {
    Pending,
    Elected(BallotNumber),
    Eliminated(BallotNumber),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Election {
    pub id: ElectionId,
    pub description: String,
    pub position: String,
    pub term: String,
    pub seats: u32,
    pub election_date: String,
    pub status: ElectionStatus,
    pub current_ballot_number: BallotNumber,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Election {
    pub fn finalize(&mut self, at: DateTime<Utc>) -> ElectionResult<()> {
        self.status = self.status.finalize()?;
        self.finalized_at = Some(at);
        Ok(())
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Candidate {
    pub id: CandidateId,
    pub election_id: ElectionId,
    pub name: String,
    pub sort_order: u32,
    pub created_at: DateTime<Utc>,
    pub outcome: CandidateOutcome,
}

impl Candidate {
    pub fn elected_ballot_number(&self) -> Option<BallotNumber> {
        match self.outcome {
            CandidateOutcome::Elected(n) => Some(n),
            _ => None,
        }
    }

    pub fn eliminated_ballot_number(&self) -> Option<BallotNumber> {
        match self.outcome {
            CandidateOutcome::Eliminated(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_elected(&self) -> bool {
        self.elected_ballot_number().is_some()
    }

    /// Records the outcome of a round. A decided candidate is never reassigned.
    pub fn decide(&mut self, outcome: CandidateOutcome) -> ElectionResult<()> {
        match (self.outcome, outcome) {
            (_, CandidateOutcome::Pending) => InvalidInputSnafu {
                reason: format!("no outcome given for candidate {}", self.name),
            }
            .fail(),
            (CandidateOutcome::Pending, o) => {
                self.outcome = o;
                Ok(())
            }
            (current, _) => InvalidStateSnafu {
                reason: format!(
                    "candidate {} has already been decided: {:?}",
                    self.name, current
                ),
            }
            .fail(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Ballot {
    pub id: BallotId,
    pub election_id: ElectionId,
    pub ballot_number: BallotNumber,
    pub seats_available: u32,
    pub kind: BallotType,
    pub status: BallotStatus,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Ballot {
    pub fn is_counting(&self) -> bool {
        self.status == BallotStatus::Counting
    }

    /// Closes the ballot. The notes are only replaced when some are given.
    pub fn complete(&mut self, notes: Option<String>, at: DateTime<Utc>) -> ElectionResult<()> {
        self.status = self.status.complete()?;
        self.finalized_at = Some(at);
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }

    /// Fails if the tallies of this ballot may not change anymore.
    pub fn ensure_counting(&self) -> ElectionResult<()> {
        if self.is_counting() {
            Ok(())
        } else {
            InvalidStateSnafu {
                reason: format!(
                    "ballot {} is {} and its votes cannot change",
                    self.ballot_number,
                    self.status.as_str()
                ),
            }
            .fail()
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotVote {
    pub id: BallotVoteId,
    pub ballot_id: BallotId,
    pub candidate_id: CandidateId,
    pub votes: u64,
    pub updated_at: DateTime<Utc>,
}
