pub use crate::config::*;

/// A builder for opening an election.
///
/// Candidate names are trimmed and blank names are dropped, as they would be
/// when read from a form.
///
/// ```
/// pub use seat_runoff::builder::Builder;
/// # use seat_runoff::ElectionError;
///
/// let mut builder = Builder::new(2)?
///     .description("Annual meeting")
///     .position("Board member")
///     .term("2024-2026")
///     .candidates(&["Anna".to_string(), " Bob ".to_string(), "".to_string()])?;
///
/// builder.add_candidate("Clara")?;
///
/// let request = builder.build()?;
/// assert_eq!(request.candidates, vec!["Anna", "Bob", "Clara"]);
///
/// # Ok::<(), ElectionError>(())
/// ```
pub struct Builder {
    pub(crate) _seats: u32,
    pub(crate) _description: String,
    pub(crate) _position: String,
    pub(crate) _term: String,
    pub(crate) _election_date: String,
    pub(crate) _candidates: Vec<String>,
}

impl Builder {
    pub fn new(seats: u32) -> Result<Builder, ElectionError> {
        if seats == 0 {
            return InvalidInputSnafu {
                reason: "an election needs at least one seat",
            }
            .fail();
        }
        Ok(Builder {
            _seats: seats,
            _description: String::new(),
            _position: String::new(),
            _term: String::new(),
            _election_date: String::new(),
            _candidates: Vec::new(),
        })
    }

    pub fn description(self, description: &str) -> Builder {
        Builder {
            _description: description.trim().to_string(),
            ..self
        }
    }

    pub fn position(self, position: &str) -> Builder {
        Builder {
            _position: position.trim().to_string(),
            ..self
        }
    }

    pub fn term(self, term: &str) -> Builder {
        Builder {
            _term: term.trim().to_string(),
            ..self
        }
    }

    pub fn election_date(self, date: &str) -> Builder {
        Builder {
            _election_date: date.trim().to_string(),
            ..self
        }
    }

    /// Replaces the candidates, in the order of the ballot.
    pub fn candidates(self, cands: &[String]) -> Result<Builder, ElectionError> {
        let mut res = Builder {
            _candidates: Vec::new(),
            ..self
        };
        for name in cands.iter() {
            res.add_candidate(name)?;
        }
        Ok(res)
    }

    /// Adds a candidate at the end of the ballot.
    ///
    /// Blank names are ignored. A name may only appear once.
    pub fn add_candidate(&mut self, name: &str) -> Result<(), ElectionError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(());
        }
        if self._candidates.iter().any(|c| c == name) {
            return InvalidInputSnafu {
                reason: format!("candidate {} is listed twice", name),
            }
            .fail();
        }
        self._candidates.push(name.to_string());
        Ok(())
    }

    pub fn build(self) -> Result<NewElection, ElectionError> {
        if self._candidates.is_empty() {
            return InvalidInputSnafu {
                reason: "please provide at least one candidate",
            }
            .fail();
        }
        if (self._candidates.len() as u64) < self._seats as u64 {
            return InvalidInputSnafu {
                reason: format!(
                    "{} candidates cannot fill {} seats",
                    self._candidates.len(),
                    self._seats
                ),
            }
            .fail();
        }
        Ok(NewElection {
            description: self._description,
            position: self._position,
            term: self._term,
            seats: self._seats,
            election_date: self._election_date,
            candidates: self._candidates,
        })
    }
}
