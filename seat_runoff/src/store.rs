//! The storage the counting operations run against.
//!
//! An operation reads and writes through a [`StoreTransaction`]. The store
//! commits all of its writes when the operation succeeds, and none of them
//! otherwise.

use std::collections::BTreeMap;
use std::sync::Mutex;

use log::debug;
use uuid::Uuid;

use crate::config::*;
use crate::model::*;

/// The reads and writes available inside a transaction.
pub trait StoreTransaction {
    /// A fresh identity for a new row.
    fn next_id(&mut self) -> String;

    fn election(&self, id: &ElectionId) -> ElectionResult<Option<Election>>;
    /// The candidates of an election, by sort order.
    fn candidates(&self, election_id: &ElectionId) -> ElectionResult<Vec<Candidate>>;
    /// The ballots of an election, by ballot number.
    fn ballots(&self, election_id: &ElectionId) -> ElectionResult<Vec<Ballot>>;
    fn ballot(&self, id: &BallotId) -> ElectionResult<Option<Ballot>>;
    /// The vote rows of a ballot, by sort order of their candidates.
    fn votes(&self, ballot_id: &BallotId) -> ElectionResult<Vec<BallotVote>>;
    fn vote(
        &self,
        ballot_id: &BallotId,
        candidate_id: &CandidateId,
    ) -> ElectionResult<Option<BallotVote>>;

    fn insert_election(&mut self, election: Election) -> ElectionResult<()>;
    fn insert_candidate(&mut self, candidate: Candidate) -> ElectionResult<()>;
    fn insert_ballot(&mut self, ballot: Ballot) -> ElectionResult<()>;
    fn insert_vote(&mut self, vote: BallotVote) -> ElectionResult<()>;

    fn update_election(&mut self, election: &Election) -> ElectionResult<()>;
    fn update_candidate(&mut self, candidate: &Candidate) -> ElectionResult<()>;
    fn update_ballot(&mut self, ballot: &Ballot) -> ElectionResult<()>;
    fn update_vote(&mut self, vote: &BallotVote) -> ElectionResult<()>;
}

pub trait ElectionStore {
    /// Runs `f` as one atomic unit. Transactions of a store are serialized.
    fn transaction<T, F>(&self, f: F) -> ElectionResult<T>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> ElectionResult<T>;
}

#[derive(Debug, Clone, Default)]
struct Tables {
    elections: BTreeMap<ElectionId, Election>,
    candidates: BTreeMap<CandidateId, Candidate>,
    ballots: BTreeMap<BallotId, Ballot>,
    votes: BTreeMap<BallotVoteId, BallotVote>,
}

/// A store kept in memory, for tests and for the command line.
///
/// A transaction works on a copy of the tables, which replaces the tables on
/// success.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl ElectionStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> ElectionResult<T>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> ElectionResult<T>,
    {
        // Writes only land on commit: the tables behind a poisoned lock are
        // still consistent.
        let mut tables = self
            .tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut tx = MemoryTransaction {
            tables: tables.clone(),
        };
        match f(&mut tx) {
            Ok(res) => {
                *tables = tx.tables;
                Ok(res)
            }
            Err(e) => {
                debug!("MemoryStore: rolling back transaction: {}", e);
                Err(e)
            }
        }
    }
}

struct MemoryTransaction {
    tables: Tables,
}

impl MemoryTransaction {
    fn sort_order(&self, candidate_id: &CandidateId) -> u32 {
        self.tables
            .candidates
            .get(candidate_id)
            .map(|c| c.sort_order)
            .unwrap_or(u32::MAX)
    }
}

fn duplicate<T>(reason: String) -> ElectionResult<T> {
    ConflictSnafu { reason }.fail()
}

fn missing<T>(entity: &'static str, id: &str) -> ElectionResult<T> {
    NotFoundSnafu { entity, id }.fail()
}

impl StoreTransaction for MemoryTransaction {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }

    fn election(&self, id: &ElectionId) -> ElectionResult<Option<Election>> {
        Ok(self.tables.elections.get(id).cloned())
    }

    fn candidates(&self, election_id: &ElectionId) -> ElectionResult<Vec<Candidate>> {
        let mut res: Vec<Candidate> = self
            .tables
            .candidates
            .values()
            .filter(|c| c.election_id == *election_id)
            .cloned()
            .collect();
        res.sort_by_key(|c| c.sort_order);
        Ok(res)
    }

    fn ballots(&self, election_id: &ElectionId) -> ElectionResult<Vec<Ballot>> {
        let mut res: Vec<Ballot> = self
            .tables
            .ballots
            .values()
            .filter(|b| b.election_id == *election_id)
            .cloned()
            .collect();
        res.sort_by_key(|b| b.ballot_number);
        Ok(res)
    }

    fn ballot(&self, id: &BallotId) -> ElectionResult<Option<Ballot>> {
        Ok(self.tables.ballots.get(id).cloned())
    }

    fn votes(&self, ballot_id: &BallotId) -> ElectionResult<Vec<BallotVote>> {
        let mut res: Vec<BallotVote> = self
            .tables
            .votes
            .values()
            .filter(|v| v.ballot_id == *ballot_id)
            .cloned()
            .collect();
        res.sort_by_key(|v| (self.sort_order(&v.candidate_id), v.candidate_id.clone()));
        Ok(res)
    }

    fn vote(
        &self,
        ballot_id: &BallotId,
        candidate_id: &CandidateId,
    ) -> ElectionResult<Option<BallotVote>> {
        Ok(self
            .tables
            .votes
            .values()
            .find(|v| v.ballot_id == *ballot_id && v.candidate_id == *candidate_id)
            .cloned())
    }

    fn insert_election(&mut self, election: Election) -> ElectionResult<()> {
        if self.tables.elections.contains_key(&election.id) {
            return duplicate(format!("election {} already exists", election.id));
        }
        self.tables.elections.insert(election.id.clone(), election);
        Ok(())
    }

    fn insert_candidate(&mut self, candidate: Candidate) -> ElectionResult<()> {
        if !self.tables.elections.contains_key(&candidate.election_id) {
            return missing("election", candidate.election_id.as_str());
        }
        if self.tables.candidates.contains_key(&candidate.id) {
            return duplicate(format!("candidate {} already exists", candidate.id));
        }
        self.tables.candidates.insert(candidate.id.clone(), candidate);
        Ok(())
    }

    fn insert_ballot(&mut self, ballot: Ballot) -> ElectionResult<()> {
        if !self.tables.elections.contains_key(&ballot.election_id) {
            return missing("election", ballot.election_id.as_str());
        }
        let same_round = self.tables.ballots.values().any(|b| {
            b.election_id == ballot.election_id && b.ballot_number == ballot.ballot_number
        });
        if same_round || self.tables.ballots.contains_key(&ballot.id) {
            return duplicate(format!(
                "ballot {} of election {} already exists",
                ballot.ballot_number, ballot.election_id
            ));
        }
        self.tables.ballots.insert(ballot.id.clone(), ballot);
        Ok(())
    }

    fn insert_vote(&mut self, vote: BallotVote) -> ElectionResult<()> {
        if !self.tables.ballots.contains_key(&vote.ballot_id) {
            return missing("ballot", vote.ballot_id.as_str());
        }
        if !self.tables.candidates.contains_key(&vote.candidate_id) {
            return missing("candidate", vote.candidate_id.as_str());
        }
        if self.vote(&vote.ballot_id, &vote.candidate_id)?.is_some()
            || self.tables.votes.contains_key(&vote.id)
        {
            return duplicate(format!(
                "candidate {} already has votes on ballot {}",
                vote.candidate_id, vote.ballot_id
            ));
        }
        self.tables.votes.insert(vote.id.clone(), vote);
        Ok(())
    }

    fn update_election(&mut self, election: &Election) -> ElectionResult<()> {
        match self.tables.elections.get_mut(&election.id) {
            Some(row) => {
                *row = election.clone();
                Ok(())
            }
            None => missing("election", election.id.as_str()),
        }
    }

    fn update_candidate(&mut self, candidate: &Candidate) -> ElectionResult<()> {
        match self.tables.candidates.get_mut(&candidate.id) {
            Some(row) => {
                *row = candidate.clone();
                Ok(())
            }
            None => missing("candidate", candidate.id.as_str()),
        }
    }

    fn update_ballot(&mut self, ballot: &Ballot) -> ElectionResult<()> {
        match self.tables.ballots.get_mut(&ballot.id) {
            Some(row) => {
                *row = ballot.clone();
                Ok(())
            }
            None => missing("ballot", ballot.id.as_str()),
        }
    }

    fn update_vote(&mut self, vote: &BallotVote) -> ElectionResult<()> {
        match self.tables.votes.get_mut(&vote.id) {
            Some(row) => {
                *row = vote.clone();
                Ok(())
            }
            None => missing("vote", vote.id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn election(id: &str) -> Election {
        Election {
            id: id.into(),
            description: "Board".to_string(),
            position: "Member".to_string(),
            term: "2024".to_string(),
            seats: 1,
            election_date: "2024-05-01".to_string(),
            status: ElectionStatus::Counting,
            current_ballot_number: 1,
            created_at: Utc::now(),
            finalized_at: None,
        }
    }

    fn ballot(id: &str, number: BallotNumber) -> Ballot {
        Ballot {
            id: id.into(),
            election_id: "e1".into(),
            ballot_number: number,
            seats_available: 1,
            kind: BallotType::Primary,
            status: BallotStatus::Counting,
            notes: None,
            started_at: Utc::now(),
            finalized_at: None,
        }
    }

    #[test]
    fn failed_transaction_writes_nothing() {
        let store = MemoryStore::new();
        let res: ElectionResult<()> = store.transaction(|tx| {
            tx.insert_election(election("e1"))?;
            InvalidStateSnafu { reason: "stop" }.fail()
        });
        assert!(res.is_err());
        let found = store.transaction(|tx| tx.election(&"e1".into())).unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn ballot_numbers_are_unique() {
        let store = MemoryStore::new();
        store
            .transaction(|tx| {
                tx.insert_election(election("e1"))?;
                tx.insert_ballot(ballot("b1", 1))
            })
            .unwrap();
        let res = store.transaction(|tx| tx.insert_ballot(ballot("b2", 1)));
        assert!(matches!(res, Err(ElectionError::Conflict { .. })));
        let res = store.transaction(|tx| tx.insert_ballot(ballot("b3", 2)));
        assert!(res.is_ok());
    }

    #[test]
    fn updating_a_missing_row_fails() {
        let store = MemoryStore::new();
        let res = store.transaction(|tx| tx.update_ballot(&ballot("b1", 1)));
        assert!(matches!(res, Err(ElectionError::NotFound { .. })));
    }
}
