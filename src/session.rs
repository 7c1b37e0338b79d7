use log::{debug, info, warn};

use seat_runoff::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::session::config_reader::*;
use crate::session::validation::*;

pub mod config_reader;
pub mod validation;

#[derive(Debug, Snafu)]
pub enum SessionError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson { source: std::io::Error, path: String },
    #[snafu(display("Error parsing JSON in {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingSummary { source: std::io::Error, path: String },

    #[snafu(display("Invalid session: {reason}"))]
    InvalidSession { reason: String },

    #[snafu(display("Counting failed at {step}: {source}"))]
    Counting {
        source: ElectionError,
        step: String,
    },

    #[snafu(display("The summary differs from the reference summary {path}"))]
    ReferenceMismatch { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SessionResult<T> = Result<T, SessionError>;

pub fn rules_from_args(args: &Args) -> CountingRules {
    match args.max_ballots {
        None => CountingRules::DEFAULT_RULES,
        Some(0) => CountingRules { max_ballots: None },
        Some(n) => CountingRules {
            max_ballots: Some(n),
        },
    }
}

fn result_stats_to_json(snapshot: &ElectionSnapshot) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for bwv in snapshot.ballots.iter() {
        let ballot = &bwv.ballot;
        let mut tally: JSMap<String, JSValue> = JSMap::new();
        for line in bwv.votes.iter() {
            tally.insert(line.candidate.name.clone(), json!(line.vote.votes));
        }

        // The ranking of a ballot still counting is not an outcome yet.
        let mut tally_results: Vec<JSValue> = Vec::new();
        if ballot.status == BallotStatus::Completed {
            for rc in bwv.rank().ranking.ranked {
                let key = if rc.is_winner {
                    "elected"
                } else if rc.in_tie {
                    "tied"
                } else {
                    "eliminated"
                };
                let mut entry: JSMap<String, JSValue> = JSMap::new();
                entry.insert(key.to_string(), json!(rc.name));
                tally_results.push(JSValue::Object(entry));
            }
        }

        l.push(json!({
            "ballot": ballot.ballot_number,
            "type": ballot.kind.as_str(),
            "seatsAvailable": ballot.seats_available,
            "status": ballot.status.as_str(),
            "notes": ballot.notes,
            "tally": tally,
            "tallyResults": tally_results
        }));
    }
    l
}

fn build_summary_js(snapshot: &ElectionSnapshot) -> JSValue {
    let e = &snapshot.election;
    let c = OutputConfig {
        contest: e.description.clone(),
        position: e.position.clone(),
        term: e.term.clone(),
        seats: e.seats,
        date: e.election_date.clone(),
    };
    let winners: Vec<String> = snapshot.winners().iter().map(|c| c.name.clone()).collect();
    json!({
        "config": c,
        "status": e.status.as_str(),
        "winners": winners,
        "results": result_stats_to_json(snapshot)
    })
}

/// Plays every round of a session against the counter.
fn play_session<S: ElectionStore>(
    counter: &ElectionCounter<S>,
    session: &ValidatedSession,
) -> SessionResult<ElectionSnapshot> {
    let created = counter
        .create_election(&session.election)
        .context(CountingSnafu {
            step: "election creation",
        })?;
    let election_id = created.election_id.clone();
    let by_name: HashMap<&str, CandidateId> = session
        .election
        .candidates
        .iter()
        .map(|n| n.as_str())
        .zip(created.candidate_ids.iter().cloned())
        .collect();
    let lookup = |name: &str| -> SessionResult<CandidateId> {
        match by_name.get(name) {
            Some(cid) => Ok(cid.clone()),
            None => whatever!("Candidate {} was not created", name),
        }
    };

    let mut ballot_id = created.ballot_id.clone();
    for (idx, round) in session.rounds.iter().enumerate() {
        let step = format!("ballot {}", idx + 1);
        if idx > 0 {
            let snapshot = counter
                .start_runoff(&election_id)
                .context(CountingSnafu { step: step.clone() })?;
            ballot_id = match snapshot.current_ballot {
                Some(b) => b.ballot.id,
                None => whatever!("No counting ballot after starting {}", step),
            };
        }

        let mut updates: Vec<VoteUpdate> = Vec::new();
        for (name, votes) in round.tally.iter() {
            updates.push(VoteUpdate {
                candidate_id: lookup(name)?,
                votes: *votes,
            });
        }
        counter
            .set_votes(&ballot_id, &updates)
            .context(CountingSnafu { step: step.clone() })?;

        for (name, delta) in round.adjustments.iter() {
            counter
                .adjust_vote(&VoteAdjustment {
                    ballot_id: ballot_id.clone(),
                    candidate_id: lookup(name)?,
                    delta: *delta,
                })
                .context(CountingSnafu { step: step.clone() })?;
        }

        let counted = counter
            .finalize_counting(&FinalizeCounting {
                election_id: election_id.clone(),
                ballot_id: ballot_id.clone(),
            })
            .context(CountingSnafu { step: step.clone() })?;
        info!(
            "{}: {} elected, {} tied",
            step,
            counted.result.ranking.winner_ids.len(),
            counted.result.ranking.tie_candidate_ids.len()
        );
    }

    let res = if session.finalize {
        counter.finalize_election(&election_id)
    } else {
        counter.load_election(&election_id)
    };
    res.context(CountingSnafu {
        step: "election finalization",
    })
}

fn write_summary(pretty: &str, out: &Option<String>) -> SessionResult<()> {
    match out.as_deref() {
        None | Some("") | Some("stdout") => {
            println!("{}", pretty);
            Ok(())
        }
        Some(path) => {
            info!("Writing summary to {}", path);
            fs::write(path, pretty).context(WritingSummarySnafu { path })
        }
    }
}

/// Runs a whole session file and returns its summary.
///
/// Arguments:
/// * `config_path` the session file
/// * `check_summary_path` a reference summary to compare with, if any
/// * `out` where to write the summary: standard output when not set
/// * `rules` the counting rules
pub fn run_session(
    config_path: &str,
    check_summary_path: Option<String>,
    out: Option<String>,
    rules: &CountingRules,
) -> SessionResult<JSValue> {
    let config = read_session(config_path)?;
    debug!("config: {:?}", config);

    let session = validate_session(&config)?;
    let counter = ElectionCounter::new(MemoryStore::new(), rules);
    let snapshot = play_session(&counter, &session)?;

    let result_js = build_summary_js(&snapshot);
    let pretty_js_stats = match serde_json::to_string_pretty(&result_js) {
        Ok(x) => x,
        Err(e) => whatever!("Could not print the summary: {}", e),
    };
    write_summary(&pretty_js_stats, &out)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p.as_str())?;
        let pretty_js_summary_ref = match serde_json::to_string_pretty(&summary_ref) {
            Ok(x) => x,
            Err(e) => whatever!("Could not print the reference summary: {}", e),
        };
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_str(),
                "\n",
            );
            return ReferenceMismatchSnafu { path: summary_p }.fail();
        }
    }

    Ok(result_js)
}

#[cfg(test)]
fn run_session_test(
    test_name: &str,
    config_lpath: &str,
    summary_lpath: &str,
    rules: &CountingRules,
) -> SessionResult<JSValue> {
    let test_dir = option_env!("SEATCOUNT_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests"));
    info!("Running test {}", test_name);
    let res = run_session(
        format!("{}/{}/{}", test_dir, test_name, config_lpath).as_str(),
        Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath)),
        None,
        rules,
    );
    if let Err(e) = &res {
        warn!("Error occured {:?}", e);
    }
    res
}

#[cfg(test)]
fn test_wrapper(test_name: &str) -> SessionResult<JSValue> {
    run_session_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
        &CountingRules::DEFAULT_RULES,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn board_clean_primary() {
        init();
        let summary = test_wrapper("board_clean_primary").unwrap();
        assert_eq!(summary["winners"], json!(["Alice", "Bob"]));
    }

    #[test]
    fn runoff_last_seat() {
        init();
        let summary = test_wrapper("runoff_last_seat").unwrap();
        assert_eq!(summary["results"].as_array().map(|l| l.len()), Some(2));
    }

    #[test]
    fn unresolved_tie_stays_open() {
        init();
        let summary = test_wrapper("unresolved_tie_stays_open").unwrap();
        assert_eq!(summary["status"], json!("counting"));
    }

    #[test]
    fn tie_cannot_be_finalized() {
        init();
        let res = test_wrapper("tie_cannot_be_finalized");
        assert!(matches!(
            res,
            Err(SessionError::Counting {
                source: ElectionError::InvalidState { .. },
                ..
            })
        ));
    }

    #[test]
    fn reference_mismatch() {
        init();
        let res = test_wrapper("reference_mismatch");
        assert!(matches!(res, Err(SessionError::ReferenceMismatch { .. })));
    }

    #[test]
    fn runoff_without_tie_is_refused() {
        init();
        let res = test_wrapper("runoff_without_tie");
        assert!(matches!(
            res,
            Err(SessionError::Counting {
                source: ElectionError::InvalidState { .. },
                ..
            })
        ));
    }

    #[test]
    fn ballot_limit_stops_repeated_ties() {
        init();
        let res = run_session_test(
            "repeated_ties",
            "repeated_ties_config.json",
            "repeated_ties_expected_summary.json",
            &CountingRules {
                max_ballots: Some(2),
            },
        );
        assert!(matches!(
            res,
            Err(SessionError::Counting {
                source: ElectionError::NoProgress { .. },
                ..
            })
        ));
    }

    #[test]
    fn unknown_candidate_is_rejected_before_counting() {
        init();
        let res = test_wrapper("unknown_candidate");
        assert!(matches!(res, Err(SessionError::InvalidSession { .. })));
    }

    #[test]
    fn missing_file() {
        let res = run_session(
            "/nonexistent/session.json",
            None,
            None,
            &CountingRules::DEFAULT_RULES,
        );
        assert!(matches!(res, Err(SessionError::OpeningJson { .. })));
    }
}
