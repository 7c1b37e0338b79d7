//! The lifecycle of an election: primary ballot, runoffs for tied seats, and
//! finalization.
//!
//! Every operation runs as a single store transaction. All the preconditions
//! are checked before the first write, and a failing operation leaves the
//! store untouched.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::{debug, info, warn};

use crate::config::*;
use crate::model::*;
use crate::outcome::resolve_outcomes;
use crate::snapshot::*;
use crate::store::{ElectionStore, StoreTransaction};

/// What finalizing a ballot returns.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FinalizedCounting {
    pub result: BallotResult,
    pub snapshot: ElectionSnapshot,
}

/// Runs the counting operations of elections against a store.
///
/// ```
/// use seat_runoff::*;
///
/// let counter = ElectionCounter::new(MemoryStore::new(), &CountingRules::DEFAULT_RULES);
/// let created = counter.create_election(&NewElection {
///     description: "Board".to_string(),
///     position: "Member".to_string(),
///     term: "2024-2026".to_string(),
///     seats: 1,
///     election_date: "2024-05-01".to_string(),
///     candidates: vec!["Anna".to_string(), "Bob".to_string()],
/// })?;
///
/// counter.adjust_vote(&VoteAdjustment {
///     ballot_id: created.ballot_id.clone(),
///     candidate_id: created.candidate_ids[0].clone(),
///     delta: VoteDelta::Increment,
/// })?;
/// let counted = counter.finalize_counting(&FinalizeCounting {
///     election_id: created.election_id.clone(),
///     ballot_id: created.ballot_id.clone(),
/// })?;
/// assert_eq!(counted.result.ranking.winner_ids, vec![created.candidate_ids[0].clone()]);
///
/// let snapshot = counter.finalize_election(&created.election_id)?;
/// assert_eq!(snapshot.election.status, ElectionStatus::Finalized);
/// # Ok::<(), ElectionError>(())
/// ```
#[derive(Debug)]
pub struct ElectionCounter<S: ElectionStore> {
    store: S,
    rules: CountingRules,
}

fn refuse<T>(reason: String) -> ElectionResult<T> {
    warn!("Refused: {}", reason);
    InvalidStateSnafu { reason }.fail()
}

fn reject<T>(reason: String) -> ElectionResult<T> {
    warn!("Rejected: {}", reason);
    InvalidInputSnafu { reason }.fail()
}

fn stalled<T>(reason: String) -> ElectionResult<T> {
    warn!("Stalled: {}", reason);
    NoProgressSnafu { reason }.fail()
}

fn not_found<T>(entity: &'static str, id: &str) -> ElectionResult<T> {
    warn!("Not found: {} {}", entity, id);
    NotFoundSnafu { entity, id }.fail()
}

/// Loads a ballot whose votes may still change.
fn counting_ballot(tx: &dyn StoreTransaction, ballot_id: &BallotId) -> ElectionResult<Ballot> {
    let ballot = match tx.ballot(ballot_id)? {
        Some(b) => b,
        None => return not_found("ballot", ballot_id.as_str()),
    };
    if let Err(e) = ballot.ensure_counting() {
        warn!("Refused: {}", e);
        return Err(e);
    }
    Ok(ballot)
}

impl<S: ElectionStore> ElectionCounter<S> {
    pub fn new(store: S, rules: &CountingRules) -> ElectionCounter<S> {
        ElectionCounter {
            store,
            rules: rules.clone(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Opens an election with its first ballot, on which every candidate
    /// starts at zero.
    pub fn create_election(&self, request: &NewElection) -> ElectionResult<CreatedElection> {
        let names: Vec<String> = request
            .candidates
            .iter()
            .map(|n| n.trim().to_string())
            .collect();
        if request.seats == 0 {
            return reject("an election needs at least one seat".to_string());
        }
        if names.is_empty() {
            return reject("please provide at least one candidate".to_string());
        }
        if names.iter().any(|n| n.is_empty()) {
            return reject("candidate names may not be empty".to_string());
        }
        if (names.len() as u64) < request.seats as u64 {
            return reject(format!(
                "{} candidates cannot fill {} seats",
                names.len(),
                request.seats
            ));
        }

        let now = Utc::now();
        let created = self.store.transaction(|tx| {
            let election_id = ElectionId(tx.next_id());
            tx.insert_election(Election {
                id: election_id.clone(),
                description: request.description.trim().to_string(),
                position: request.position.trim().to_string(),
                term: request.term.trim().to_string(),
                seats: request.seats,
                election_date: request.election_date.clone(),
                status: ElectionStatus::Counting,
                current_ballot_number: 1,
                created_at: now,
                finalized_at: None,
            })?;

            let mut candidate_ids: Vec<CandidateId> = Vec::new();
            for (idx, name) in names.iter().enumerate() {
                let candidate_id = CandidateId(tx.next_id());
                tx.insert_candidate(Candidate {
                    id: candidate_id.clone(),
                    election_id: election_id.clone(),
                    name: name.clone(),
                    sort_order: idx as u32,
                    created_at: now,
                    outcome: CandidateOutcome::Pending,
                })?;
                candidate_ids.push(candidate_id);
            }

            let ballot_id = BallotId(tx.next_id());
            tx.insert_ballot(Ballot {
                id: ballot_id.clone(),
                election_id: election_id.clone(),
                ballot_number: 1,
                seats_available: request.seats,
                kind: BallotType::Primary,
                status: BallotStatus::Counting,
                notes: None,
                started_at: now,
                finalized_at: None,
            })?;
            insert_zero_votes(tx, &ballot_id, &candidate_ids, now)?;

            Ok(CreatedElection {
                election_id,
                ballot_id,
                candidate_ids,
            })
        })?;
        info!(
            "Election {} created: {} candidates for {} seats",
            created.election_id,
            created.candidate_ids.len(),
            request.seats
        );
        Ok(created)
    }

    /// Adds or removes one vote on the counting ballot. Counts never go below zero.
    pub fn adjust_vote(&self, adjustment: &VoteAdjustment) -> ElectionResult<AdjustedVote> {
        self.store.transaction(|tx| {
            counting_ballot(tx, &adjustment.ballot_id)?;
            let mut vote = match tx.vote(&adjustment.ballot_id, &adjustment.candidate_id)? {
                Some(v) => v,
                None => return not_found("vote", adjustment.candidate_id.as_str()),
            };
            vote.votes = adjustment.delta.apply(vote.votes);
            vote.updated_at = Utc::now();
            tx.update_vote(&vote)?;
            debug!(
                "adjust_vote: ballot {} candidate {} now at {}",
                vote.ballot_id, vote.candidate_id, vote.votes
            );
            Ok(AdjustedVote {
                ballot_id: vote.ballot_id,
                candidate_id: vote.candidate_id,
                votes: vote.votes,
            })
        })
    }

    /// Sets absolute counts on the counting ballot, all of them or none.
    pub fn set_votes(&self, ballot_id: &BallotId, updates: &[VoteUpdate]) -> ElectionResult<()> {
        self.store.transaction(|tx| {
            counting_ballot(tx, ballot_id)?;
            let now = Utc::now();
            for update in updates.iter() {
                let mut vote = match tx.vote(ballot_id, &update.candidate_id)? {
                    Some(v) => v,
                    None => return not_found("vote", update.candidate_id.as_str()),
                };
                vote.votes = update.votes;
                vote.updated_at = now;
                tx.update_vote(&vote)?;
            }
            debug!("set_votes: ballot {}: {} counts set", ballot_id, updates.len());
            Ok(())
        })
    }

    /// Closes the counting ballot: ranks it, records who is elected or
    /// eliminated, and marks the ballot completed.
    pub fn finalize_counting(
        &self,
        request: &FinalizeCounting,
    ) -> ElectionResult<FinalizedCounting> {
        let res = self.store.transaction(|tx| {
            let election = match tx.election(&request.election_id)? {
                Some(e) => e,
                None => return not_found("election", request.election_id.as_str()),
            };
            if !election.status.accepts_ballots() {
                return refuse(format!(
                    "election {} is {}",
                    election.id,
                    election.status.as_str()
                ));
            }
            let ballot = match tx.ballot(&request.ballot_id)? {
                Some(b) if b.election_id == election.id => b,
                _ => return not_found("ballot", request.ballot_id.as_str()),
            };
            if let Err(e) = ballot.ensure_counting() {
                warn!("Refused: {}", e);
                return Err(e);
            }

            let mut candidates: HashMap<CandidateId, Candidate> = tx
                .candidates(&election.id)?
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect();
            let counted = load_ballot(tx, ballot, &candidates)?;
            if counted.votes.is_empty() {
                return stalled(format!(
                    "ballot {} has no candidate to count",
                    counted.ballot.ballot_number
                ));
            }

            let ballot_number = counted.ballot.ballot_number;
            let mut result = counted.rank();
            for change in resolve_outcomes(&result.ranking, &counted.roster(), ballot_number) {
                let candidate = match candidates.get_mut(&change.candidate_id) {
                    Some(c) => c,
                    None => return not_found("candidate", change.candidate_id.as_str()),
                };
                candidate.decide(change.outcome)?;
                tx.update_candidate(candidate)?;
            }

            let notes = if result.ranking.has_tie() {
                Some(format!(
                    "Tie detected between {} candidates for {} seat(s)",
                    result.ranking.tie_candidate_ids.len(),
                    result.ranking.remaining_seats
                ))
            } else {
                None
            };
            let mut ballot = counted.ballot;
            ballot.complete(notes, Utc::now())?;
            tx.update_ballot(&ballot)?;
            result.status = ballot.status;

            let snapshot = load_snapshot(tx, &election.id)?;
            Ok(FinalizedCounting { result, snapshot })
        })?;
        info!(
            "Ballot {} finalized: {} elected, {} tied for {} seat(s)",
            res.result.ballot_number,
            res.result.ranking.winner_ids.len(),
            res.result.ranking.tie_candidate_ids.len(),
            res.result.ranking.remaining_seats
        );
        Ok(res)
    }

    /// Opens a runoff ballot between the candidates tied on the latest
    /// completed ballot. Their votes start again from zero.
    pub fn start_runoff(&self, election_id: &ElectionId) -> ElectionResult<ElectionSnapshot> {
        let snapshot = self.store.transaction(|tx| {
            let snapshot = load_snapshot(tx, election_id)?;
            let mut election = snapshot.election.clone();
            if !election.status.accepts_ballots() {
                return refuse(format!(
                    "election {} is {}: no further ballot may be created",
                    election.id,
                    election.status.as_str()
                ));
            }
            if snapshot.current_ballot.is_some() {
                return refuse(
                    "finalize the current ballot before starting a new count".to_string(),
                );
            }
            let (latest, result) = match (
                snapshot.latest_completed_ballot.as_ref(),
                snapshot.latest_result.as_ref(),
            ) {
                (Some(b), Some(r)) => (b, r),
                _ => return refuse("finalize a count before starting a new one".to_string()),
            };
            if !result.ranking.has_tie() {
                return refuse("there is no tie to resolve".to_string());
            }

            let ballot_number = snapshot
                .ballots
                .iter()
                .map(|b| b.ballot.ballot_number)
                .max()
                .unwrap_or(0)
                + 1;
            if let Some(max_ballots) = self.rules.max_ballots {
                if ballot_number > max_ballots {
                    return stalled(format!(
                        "ballot {} would exceed the limit of {} ballots",
                        ballot_number, max_ballots
                    ));
                }
            }

            let members: HashSet<&CandidateId> =
                snapshot.candidates.iter().map(|c| &c.id).collect();
            let mut seen: HashSet<&CandidateId> = HashSet::new();
            let mut candidate_ids: Vec<CandidateId> = Vec::new();
            for cid in result.ranking.tie_candidate_ids.iter() {
                if !members.contains(cid) {
                    return reject(format!("candidate {} is not part of the election", cid));
                }
                if seen.insert(cid) {
                    candidate_ids.push(cid.clone());
                }
            }
            let seats_available = result.ranking.remaining_seats.max(1);

            let now = Utc::now();
            let ballot_id = BallotId(tx.next_id());
            tx.insert_ballot(Ballot {
                id: ballot_id.clone(),
                election_id: election.id.clone(),
                ballot_number,
                seats_available,
                kind: BallotType::Runoff,
                status: BallotStatus::Counting,
                notes: Some(format!("Runoff after ballot {}", latest.ballot.ballot_number)),
                started_at: now,
                finalized_at: None,
            })?;
            insert_zero_votes(tx, &ballot_id, &candidate_ids, now)?;

            election.current_ballot_number = ballot_number;
            tx.update_election(&election)?;
            info!(
                "Runoff ballot {} started for election {}: {} candidates for {} seat(s)",
                ballot_number,
                election.id,
                candidate_ids.len(),
                seats_available
            );
            load_snapshot(tx, &election.id)
        })?;
        Ok(snapshot)
    }

    /// Closes the election once every seat is filled. Finalizing a finalized
    /// election does nothing.
    pub fn finalize_election(&self, election_id: &ElectionId) -> ElectionResult<ElectionSnapshot> {
        self.store.transaction(|tx| {
            let snapshot = load_snapshot(tx, election_id)?;
            if snapshot.election.status == ElectionStatus::Finalized {
                debug!("finalize_election: {} already finalized", election_id);
                return Ok(snapshot);
            }
            if snapshot.current_ballot.is_some() {
                return refuse(
                    "finish counting the active ballot before finalizing".to_string(),
                );
            }
            if snapshot.has_unresolved_tie() {
                return refuse("resolve every tie before finalizing the election".to_string());
            }
            let elected = snapshot.winners().len() as u64;
            if elected < snapshot.election.seats as u64 {
                return refuse(format!(
                    "all seats must be filled before finalizing: {} elected for {} seats",
                    elected, snapshot.election.seats
                ));
            }

            let mut election = snapshot.election;
            election.finalize(Utc::now())?;
            tx.update_election(&election)?;
            info!(
                "Election {} finalized with {} elected",
                election.id, elected
            );
            load_snapshot(tx, &election.id)
        })
    }

    pub fn load_election(&self, election_id: &ElectionId) -> ElectionResult<ElectionSnapshot> {
        self.store.transaction(|tx| load_snapshot(tx, election_id))
    }
}

fn insert_zero_votes(
    tx: &mut dyn StoreTransaction,
    ballot_id: &BallotId,
    candidate_ids: &[CandidateId],
    now: chrono::DateTime<Utc>,
) -> ElectionResult<()> {
    for cid in candidate_ids.iter() {
        let id = BallotVoteId(tx.next_id());
        tx.insert_vote(BallotVote {
            id,
            ballot_id: ballot_id.clone(),
            candidate_id: cid.clone(),
            votes: 0,
            updated_at: now,
        })?;
    }
    Ok(())
}
