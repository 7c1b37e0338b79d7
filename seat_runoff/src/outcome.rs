//! Turns the ranking of a ballot into the candidate outcomes to record.

use std::collections::HashSet;

use log::debug;

use crate::config::*;
use crate::model::*;

/// A change to write on a candidate once its ballot is finalized.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OutcomeChange {
    pub candidate_id: CandidateId,
    pub outcome: CandidateOutcome,
}

/// Computes the outcome of every candidate of a ballot.
///
/// Arguments:
/// * `ranking` the ranking of the ballot
/// * `roster` the candidates that were on the ballot
/// * `ballot_number` the number recorded on the decided candidates
///
/// Winners are elected, and the candidates that are neither winners nor tied are
/// eliminated. Tied candidates get no change: they go to the runoff.
pub fn resolve_outcomes(
    ranking: &BallotRanking,
    roster: &[CandidateId],
    ballot_number: BallotNumber,
) -> Vec<OutcomeChange> {
    let winners: HashSet<&CandidateId> = ranking.winner_ids.iter().collect();
    let tied: HashSet<&CandidateId> = ranking.tie_candidate_ids.iter().collect();

    let mut changes: Vec<OutcomeChange> = ranking
        .winner_ids
        .iter()
        .map(|cid| OutcomeChange {
            candidate_id: cid.clone(),
            outcome: CandidateOutcome::Elected(ballot_number),
        })
        .collect();
    changes.extend(
        roster
            .iter()
            .filter(|cid| !winners.contains(cid) && !tied.contains(cid))
            .map(|cid| OutcomeChange {
                candidate_id: cid.clone(),
                outcome: CandidateOutcome::Eliminated(ballot_number),
            }),
    );
    debug!(
        "resolve_outcomes: ballot {}: {} elected, {} tied, {} changes",
        ballot_number,
        winners.len(),
        tied.len(),
        changes.len()
    );
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank_ballot;

    fn tally(entries: &[(&str, u64)]) -> Vec<TallyEntry> {
        entries
            .iter()
            .map(|(name, votes)| TallyEntry {
                candidate_id: (*name).into(),
                name: name.to_string(),
                votes: *votes,
            })
            .collect()
    }

    fn roster(t: &[TallyEntry]) -> Vec<CandidateId> {
        t.iter().map(|e| e.candidate_id.clone()).collect()
    }

    #[test]
    fn winners_and_eliminated() {
        let t = tally(&[("A", 10), ("B", 7), ("C", 5)]);
        let changes = resolve_outcomes(&rank_ballot(&t, 2), &roster(&t), 1);
        assert_eq!(
            changes,
            vec![
                OutcomeChange {
                    candidate_id: "A".into(),
                    outcome: CandidateOutcome::Elected(1)
                },
                OutcomeChange {
                    candidate_id: "B".into(),
                    outcome: CandidateOutcome::Elected(1)
                },
                OutcomeChange {
                    candidate_id: "C".into(),
                    outcome: CandidateOutcome::Eliminated(1)
                },
            ]
        );
    }

    #[test]
    fn tied_candidates_are_left_alone() {
        let t = tally(&[("A", 12), ("B", 8), ("C", 8), ("D", 1)]);
        let changes = resolve_outcomes(&rank_ballot(&t, 2), &roster(&t), 3);
        let touched: Vec<&str> = changes.iter().map(|c| c.candidate_id.as_str()).collect();
        assert_eq!(touched, vec!["A", "D"]);
        assert_eq!(changes[0].outcome, CandidateOutcome::Elected(3));
        assert_eq!(changes[1].outcome, CandidateOutcome::Eliminated(3));
    }

    #[test]
    fn full_tie_changes_nothing() {
        let t = tally(&[("A", 15), ("B", 15)]);
        assert!(resolve_outcomes(&rank_ballot(&t, 1), &roster(&t), 1).is_empty());
    }
}
