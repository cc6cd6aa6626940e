//! Structured view of a derby game, built from a raw scoreboard snapshot.

use std::fmt;

use indexmap::IndexMap;

/// Which of the two teams a value belongs to.
pub const TEAM_NUMBERS: [u8; 2] = [1, 2];

/// One skater of a team roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skater {
    /// Scoreboard identifier of the skater.
    pub id: String,
    /// Derby name.
    pub name: String,
    /// Number printed on the jersey; may contain letters.
    pub number: String,
}

/// A team with its roster.
#[derive(Debug, Clone)]
pub struct Team {
    /// 1 or 2.
    pub number: u8,
    /// Team name with apostrophes removed.
    pub name: String,
    /// Scoreboard background color, when the scoreboard carries one.
    pub color: Option<String>,
    /// Roster keyed by skater id, in scoreboard order.
    pub roster: IndexMap<String, Skater>,
}

/// What one team did during one jam.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamJam {
    /// Points scored in the jam.
    pub jam_score: i64,
    /// Running total after the jam.
    pub total_score: i64,
    /// `jam_score` minus the opponent's `jam_score`.
    pub net_points: i64,
    /// Jammer earned lead.
    pub lead: bool,
    /// Jammer lost lead eligibility.
    pub lost: bool,
    /// Jammer called the jam off.
    pub calloff: bool,
    /// Jam ended by an injury.
    pub injury: bool,
    /// Jammer did not complete the initial pass.
    pub no_initial: bool,
    /// The star was passed to the pivot.
    pub star_pass: bool,
    /// Jammer of the jam, when recorded and on the roster.
    pub jammer: Option<Skater>,
    /// Pivot of the jam, when recorded and on the roster.
    pub pivot: Option<Skater>,
    /// Every fielded skater found on the roster, in scoreboard order.
    pub lineup: Vec<Skater>,
    /// Names of the `lineup` skaters.
    pub skaters: Vec<String>,
    /// Number of scoring trips, including the initial pass.
    pub scoring_trips: u32,
    /// Duration of the initial pass in seconds.
    pub first_trip_seconds: Option<f64>,
}

/// One jam row.
#[derive(Debug, Clone, PartialEq)]
pub struct Jam {
    /// Period number (1-based).
    pub period: u32,
    /// Jam number within the period.
    pub number: u32,
    /// Jam length in seconds.
    pub duration_seconds: f64,
    /// Period clock elapsed at jam start, in seconds.
    pub start_seconds: f64,
    /// Period clock elapsed at jam end, in seconds.
    pub end_seconds: f64,
    /// Wall clock at jam start, in milliseconds since the epoch.
    pub walltime_start: Option<i64>,
    /// Team 1 and team 2 data.
    pub teams: [TeamJam; 2],
}

impl Jam {
    /// Sort key and display label, e.g. `2:07`.
    pub fn prd_jam(&self) -> String {
        format!("{}:{:02}", self.period, self.number)
    }

    /// Either jammer called the jam off.
    pub fn calloff_any(&self) -> bool {
        self.teams.iter().any(|team| team.calloff)
    }

    /// Team (1 or 2) whose jammer got lead.
    pub fn team_with_lead(&self) -> Option<u8> {
        TEAM_NUMBERS
            .into_iter()
            .zip(&self.teams)
            .find_map(|(number, team)| team.lead.then_some(number))
    }

    /// Seconds the lead jammer needed to earn lead.
    pub fn time_to_lead(&self) -> Option<f64> {
        let team = self.team_with_lead()?;
        self.teams[usize::from(team - 1)].first_trip_seconds
    }
}

/// Box status of a penalty. Ordered the way penalty tables list them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PenaltyStatus {
    /// Skater is in the box.
    Serving,
    /// Skater is on the way to the box.
    NotYet,
    /// Done.
    Served,
}

impl PenaltyStatus {
    /// Label shown in tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::Serving => "Serving",
            Self::NotYet => "Not Yet",
            Self::Served => "Served",
        }
    }

    /// The penalty still affects the current jam.
    pub fn is_open(self) -> bool {
        self != Self::Served
    }
}

impl fmt::Display for PenaltyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A penalty assessed to a rostered skater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Penalty {
    /// Team of the skater.
    pub team: u8,
    /// Skater id.
    pub skater_id: String,
    /// Skater name.
    pub skater_name: String,
    /// Skater jersey number.
    pub skater_number: String,
    /// Penalty letter code.
    pub code: String,
    /// Penalty name, when the code table is part of the snapshot.
    pub name: Option<String>,
    /// Period the penalty was called in.
    pub period: Option<u32>,
    /// Jam the penalty was called in.
    pub jam: Option<u32>,
    /// Wall clock of the call, in milliseconds since the epoch.
    pub time: Option<i64>,
    /// Box status.
    pub status: PenaltyStatus,
}

impl Penalty {
    /// Penalty name, falling back to the letter code.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.code)
    }
}

/// Everything the statistics and exports need about one game.
#[derive(Debug, Clone)]
pub struct DerbyGame {
    /// Major version of the scoreboard software that produced the data.
    pub version: u32,
    /// Team 1 and team 2.
    pub teams: [Team; 2],
    /// Jams sorted by period then jam number.
    pub jams: Vec<Jam>,
    /// Penalties, grouped by team then skater.
    pub penalties: Vec<Penalty>,
    /// Free-form `key=value` metadata (`team_1`, `team_2`, `source`, ...).
    pub metadata: IndexMap<String, String>,
}

impl DerbyGame {
    /// Team by number (1 or 2).
    pub fn team(&self, number: u8) -> &Team {
        &self.teams[usize::from(number.clamp(1, 2) - 1)]
    }
}
