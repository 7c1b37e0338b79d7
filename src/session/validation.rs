//! Checks the shape of a session file before anything reaches the counter.

use crate::session::config_reader::*;
use crate::session::*;
use seat_runoff::builder::Builder;

const MAX_DESCRIPTION_LEN: usize = 500;
const MAX_LABEL_LEN: usize = 200;
const MAX_NAME_LEN: usize = 200;
const MAX_SEATS: u32 = 50;
const MAX_CANDIDATES: usize = 50;
const MIN_DATE_LEN: usize = 4;

/// One round, with the names checked against the candidates.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ValidatedRound {
    pub tally: Vec<(String, u64)>,
    pub adjustments: Vec<(String, VoteDelta)>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ValidatedSession {
    pub election: NewElection,
    pub rounds: Vec<ValidatedRound>,
    pub finalize: bool,
}

fn invalid<T>(reason: String) -> SessionResult<T> {
    InvalidSessionSnafu { reason }.fail()
}

fn check_length(field: &str, value: &str, max_len: usize) -> SessionResult<()> {
    let len = value.trim().chars().count();
    if len == 0 {
        return invalid(format!("{} is required", field));
    }
    if len > max_len {
        return invalid(format!(
            "{} is too long: {} characters, at most {}",
            field, len, max_len
        ));
    }
    Ok(())
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

fn validate_election(settings: &ElectionSettings) -> SessionResult<NewElection> {
    check_length("description", &settings.description, MAX_DESCRIPTION_LEN)?;
    check_length("position", &settings.position, MAX_LABEL_LEN)?;
    check_length("term", &settings.term, MAX_LABEL_LEN)?;
    if settings.seats == 0 || settings.seats > MAX_SEATS {
        return invalid(format!(
            "seats must be between 1 and {}, got {}",
            MAX_SEATS, settings.seats
        ));
    }

    let election_date = match &settings.election_date {
        Some(d) if d.trim().chars().count() >= MIN_DATE_LEN => d.clone(),
        Some(d) => {
            return invalid(format!(
                "election date {:?} is too short: at least {} characters",
                d, MIN_DATE_LEN
            ))
        }
        None => today(),
    };

    for name in settings.candidates.iter() {
        if name.trim().chars().count() > MAX_NAME_LEN {
            return invalid(format!(
                "candidate name is too long: {:?}, at most {} characters",
                name, MAX_NAME_LEN
            ));
        }
    }

    let res = Builder::new(settings.seats)
        .and_then(|b| {
            b.description(&settings.description)
                .position(&settings.position)
                .term(&settings.term)
                .election_date(&election_date)
                .candidates(&settings.candidates)
        })
        .and_then(|b| b.build());
    let election = match res {
        Ok(x) => x,
        Err(e) => return invalid(e.to_string()),
    };
    if election.candidates.len() > MAX_CANDIDATES {
        return invalid(format!(
            "too many candidates: {}, at most {}",
            election.candidates.len(),
            MAX_CANDIDATES
        ));
    }
    Ok(election)
}

fn validate_round(
    idx: usize,
    round: &RoundSettings,
    names: &HashSet<&str>,
) -> SessionResult<ValidatedRound> {
    let known = |name: &str| -> SessionResult<String> {
        let name = name.trim();
        if !names.contains(name) {
            return invalid(format!(
                "round {}: {:?} is not a candidate of the election",
                idx + 1,
                name
            ));
        }
        Ok(name.to_string())
    };

    let mut tally: Vec<(String, u64)> = Vec::new();
    for (name, votes) in round.tally.iter() {
        let name = known(name)?;
        if tally.iter().any(|(n, _)| *n == name) {
            return invalid(format!(
                "round {}: the tally lists {} more than once",
                idx + 1,
                name
            ));
        }
        tally.push((name, *votes));
    }

    let mut adjustments: Vec<(String, VoteDelta)> = Vec::new();
    for mark in round.adjustments.iter() {
        let name = known(&mark.candidate)?;
        let delta = match VoteDelta::from_step(mark.delta) {
            Some(d) => d,
            None => {
                return invalid(format!(
                    "round {}: a vote moves by +1 or -1, got {} for {}",
                    idx + 1,
                    mark.delta,
                    name
                ))
            }
        };
        adjustments.push((name, delta));
    }
    Ok(ValidatedRound { tally, adjustments })
}

pub fn validate_session(config: &SessionConfig) -> SessionResult<ValidatedSession> {
    let election = validate_election(&config.election)?;
    let names: HashSet<&str> = election.candidates.iter().map(|s| s.as_str()).collect();
    let mut rounds: Vec<ValidatedRound> = Vec::new();
    for (idx, round) in config.rounds.iter().enumerate() {
        rounds.push(validate_round(idx, round, &names)?);
    }
    debug!(
        "validate_session: {} candidates, {} rounds",
        election.candidates.len(),
        rounds.len()
    );
    Ok(ValidatedSession {
        election,
        rounds,
        finalize: config.finalize.unwrap_or(true),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(candidates: &[&str]) -> ElectionSettings {
        ElectionSettings {
            description: "Annual board election".to_string(),
            position: "Board member".to_string(),
            term: "2024-2026".to_string(),
            seats: 1,
            election_date: Some("2024-05-01".to_string()),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn session(election: ElectionSettings, rounds: Vec<RoundSettings>) -> SessionConfig {
        SessionConfig {
            election,
            rounds,
            finalize: None,
        }
    }

    fn is_invalid(res: SessionResult<ValidatedSession>) -> bool {
        matches!(res, Err(SessionError::InvalidSession { .. }))
    }

    #[test]
    fn names_are_trimmed_and_blanks_dropped() {
        let config = session(settings(&[" Alice", "", "Bob  ", "   "]), vec![]);
        let validated = validate_session(&config).unwrap();
        assert_eq!(validated.election.candidates, vec!["Alice", "Bob"]);
        assert!(validated.finalize);
    }

    #[test]
    fn field_lengths() {
        let mut s = settings(&["Alice"]);
        s.description = "x".repeat(501);
        assert!(is_invalid(validate_session(&session(s, vec![]))));

        let mut s = settings(&["Alice"]);
        s.position = "  ".to_string();
        assert!(is_invalid(validate_session(&session(s, vec![]))));

        let mut s = settings(&["Alice"]);
        s.term = "y".repeat(200);
        assert!(validate_session(&session(s, vec![])).is_ok());

        assert!(is_invalid(validate_session(&session(
            settings(&["z".repeat(201).as_str()]),
            vec![]
        ))));
    }

    #[test]
    fn seat_bounds() {
        let mut s = settings(&["Alice"]);
        s.seats = 0;
        assert!(is_invalid(validate_session(&session(s, vec![]))));

        let mut s = settings(&["Alice"]);
        s.seats = 51;
        assert!(is_invalid(validate_session(&session(s, vec![]))));

        let mut s = settings(&["Alice"]);
        s.seats = 2;
        assert!(is_invalid(validate_session(&session(s, vec![]))));
    }

    #[test]
    fn candidate_list_bounds() {
        assert!(is_invalid(validate_session(&session(settings(&["", " "]), vec![]))));
        let many: Vec<String> = (0..51).map(|i| format!("Candidate {}", i)).collect();
        let refs: Vec<&str> = many.iter().map(|s| s.as_str()).collect();
        assert!(is_invalid(validate_session(&session(settings(&refs), vec![]))));
        assert!(is_invalid(validate_session(&session(
            settings(&["Alice", "Alice"]),
            vec![]
        ))));
    }

    #[test]
    fn election_date() {
        let mut s = settings(&["Alice"]);
        s.election_date = Some("May".to_string());
        assert!(is_invalid(validate_session(&session(s, vec![]))));

        let mut s = settings(&["Alice"]);
        s.election_date = None;
        let validated = validate_session(&session(s, vec![])).unwrap();
        assert_eq!(validated.election.election_date.len(), 10);
    }

    #[test]
    fn rounds_name_candidates() {
        let mut tally = BTreeMap::new();
        tally.insert("Alice".to_string(), 3);
        let good = RoundSettings {
            tally: tally.clone(),
            adjustments: vec![VoteMark {
                candidate: " Bob".to_string(),
                delta: -1,
            }],
        };
        let validated = validate_session(&session(settings(&["Alice", "Bob"]), vec![good])).unwrap();
        assert_eq!(
            validated.rounds[0],
            ValidatedRound {
                tally: vec![("Alice".to_string(), 3)],
                adjustments: vec![("Bob".to_string(), VoteDelta::Decrement)],
            }
        );

        let unknown = RoundSettings {
            tally: BTreeMap::new(),
            adjustments: vec![VoteMark {
                candidate: "Claire".to_string(),
                delta: 1,
            }],
        };
        assert!(is_invalid(validate_session(&session(
            settings(&["Alice", "Bob"]),
            vec![unknown]
        ))));

        let big_step = RoundSettings {
            tally,
            adjustments: vec![VoteMark {
                candidate: "Alice".to_string(),
                delta: 2,
            }],
        };
        assert!(is_invalid(validate_session(&session(
            settings(&["Alice", "Bob"]),
            vec![big_step]
        ))));
    }

    #[test]
    fn tally_names_a_candidate_once() {
        let mut tally = BTreeMap::new();
        tally.insert("Bob".to_string(), 3);
        tally.insert(" Bob".to_string(), 5);
        let round = RoundSettings {
            tally,
            adjustments: vec![],
        };
        assert!(is_invalid(validate_session(&session(
            settings(&["Alice", "Bob"]),
            vec![round]
        ))));
    }
}
