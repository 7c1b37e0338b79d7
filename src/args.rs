use clap::Parser;

/// This is a counting program for multi-seat elections decided through runoff ballots.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file describing the election session: the election, its candidates and the
    /// tallies of each ballot, in JSON format.
    #[clap(short, long, value_parser)]
    pub config: String,
    /// (file path) A reference file containing the outcome of an election in JSON format. If provided, seatcount will
    /// check that the summary of the session matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the election will be written in JSON format to the given
    /// location. It is printed on the standard output otherwise.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (number, default 100) The highest ballot number an election may reach, runoffs included. 0 removes the limit.
    #[clap(long, value_parser)]
    pub max_ballots: Option<u32>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
