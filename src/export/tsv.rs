//! Tab-separated jam table with `# key=value` metadata comments on top.
//!
//! ```text
//! # team_1=Rollin Rebels
//! # team_2=Derby Dames
//! # source=live
//! prd_jam	PeriodNumber	Number	...
//! 1:01	1	1	...
//! ```

use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::Path,
};

use indexmap::IndexMap;
use thiserror::Error;

use crate::game::{DerbyGame, Jam, TeamJam};

const COMMENT_PREFIX: &str = "# ";

/// Failure while writing or reading a jam table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File or stream I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The tab-separated body could not be written or parsed.
    #[error("tsv error: {0}")]
    Tsv(#[from] csv::Error),
    /// A comment line is not of the form `# key=value`.
    #[error("malformed header line `{0}`")]
    MalformedHeader(String),
}

/// Jam table read back from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JamTable {
    /// Header comments.
    pub metadata: IndexMap<String, String>,
    /// Column names.
    pub columns: Vec<String>,
    /// One row per jam, aligned with `columns`.
    pub rows: Vec<Vec<String>>,
}

/// Column names in output order.
pub fn columns() -> Vec<String> {
    let mut columns: Vec<String> = [
        "prd_jam",
        "PeriodNumber",
        "Number",
        "duration_seconds",
        "jam_starttime_seconds",
        "jam_endtime_seconds",
        "Calloff_any",
        "team_with_lead",
        "time_to_lead",
    ]
    .map(String::from)
    .to_vec();
    for team in 1..=2 {
        columns.extend(TEAM_COLUMNS.iter().map(|name| format!("{name}_{team}")));
    }
    columns
}

const TEAM_COLUMNS: [&str; 14] = [
    "JamScore",
    "TotalScore",
    "net_points",
    "Lead",
    "Lost",
    "Calloff",
    "Injury",
    "NoInitial",
    "StarPass",
    "jammer_name",
    "jammer_number",
    "Skaters",
    "n_scoring_trips",
    "first_scoring_pass_durations",
];

/// Write the metadata comments, the column row and one row per jam.
pub fn write_jams<W: Write>(game: &DerbyGame, mut writer: W) -> Result<(), ExportError> {
    for (key, value) in &game.metadata {
        writeln!(
            writer,
            "{COMMENT_PREFIX}{}={}",
            single_line(key),
            single_line(value)
        )?;
    }

    let mut tsv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    tsv.write_record(columns())?;
    for jam in &game.jams {
        tsv.write_record(jam_row(jam))?;
    }
    tsv.flush()?;
    Ok(())
}

/// Header values must stay on their comment line.
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Render the table into a string (used by the HTTP download).
pub fn jams_to_string(game: &DerbyGame) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_jams(game, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|err| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}

/// Write the table to `path`, replacing any existing file.
pub fn write_jams_file(game: &DerbyGame, path: impl AsRef<Path>) -> Result<(), ExportError> {
    let file = File::create(path)?;
    write_jams(game, io::BufWriter::new(file))
}

/// Parse the leading `# key=value` comments; stops at the first other line.
pub fn read_header<R: BufRead>(reader: R) -> Result<IndexMap<String, String>, ExportError> {
    let mut metadata = IndexMap::new();
    for line in reader.lines() {
        let line = line?;
        let Some(comment) = line.strip_prefix(COMMENT_PREFIX) else {
            break;
        };
        let (key, value) = comment
            .split_once('=')
            .ok_or_else(|| ExportError::MalformedHeader(line.clone()))?;
        metadata.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(metadata)
}

/// Read a whole table written by [`write_jams`].
pub fn read_jams_file(path: impl AsRef<Path>) -> Result<JamTable, ExportError> {
    let path = path.as_ref();
    let metadata = read_header(BufReader::new(File::open(path)?))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
        .collect::<Result<_, csv::Error>>()?;

    Ok(JamTable {
        metadata,
        columns,
        rows,
    })
}

fn jam_row(jam: &Jam) -> Vec<String> {
    let mut row = vec![
        jam.prd_jam(),
        jam.period.to_string(),
        jam.number.to_string(),
        jam.duration_seconds.to_string(),
        jam.start_seconds.to_string(),
        jam.end_seconds.to_string(),
        jam.calloff_any().to_string(),
        optional(jam.team_with_lead()),
        optional(jam.time_to_lead()),
    ];
    for team in &jam.teams {
        row.extend(team_cells(team));
    }
    row
}

fn team_cells(team: &TeamJam) -> [String; 14] {
    [
        team.jam_score.to_string(),
        team.total_score.to_string(),
        team.net_points.to_string(),
        team.lead.to_string(),
        team.lost.to_string(),
        team.calloff.to_string(),
        team.injury.to_string(),
        team.no_initial.to_string(),
        team.star_pass.to_string(),
        team.jammer.as_ref().map(|j| j.name.clone()).unwrap_or_default(),
        team.jammer.as_ref().map(|j| j.number.clone()).unwrap_or_default(),
        team.skaters.join(", "),
        team.scoring_trips.to_string(),
        optional(team.first_trip_seconds),
    ]
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
