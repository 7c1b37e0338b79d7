use crate::session::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSettings {
    pub description: String,
    pub position: String,
    pub term: String,
    pub seats: u32,
    #[serde(rename = "electionDate")]
    pub election_date: Option<String>,
    pub candidates: Vec<String>,
}

/// A single +1 or -1 made by a teller.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct VoteMark {
    pub candidate: String,
    pub delta: i64,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RoundSettings {
    /// Absolute counts, by candidate name.
    #[serde(default)]
    pub tally: BTreeMap<String, u64>,
    #[serde(default)]
    pub adjustments: Vec<VoteMark>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub election: ElectionSettings,
    #[serde(default)]
    pub rounds: Vec<RoundSettings>,
    pub finalize: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub contest: String,
    pub position: String,
    pub term: String,
    pub seats: u32,
    pub date: String,
}

pub fn read_session(path: &str) -> SessionResult<SessionConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}

pub fn read_summary(path: &str) -> SessionResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}
