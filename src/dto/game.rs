use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::status::PublishInfo,
    feed::PublishedSnapshot,
    game::{
        DerbyGame, Jam, TeamJam,
        stats::{
            self, GameSummary, JammerLine, RecentPenalty, RosterLine, SkaterPenalties, TeamTotals,
        },
    },
};

/// Whole-game figures.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSummaryDto {
    pub periods: usize,
    pub jams: usize,
    pub minutes: f64,
    pub final_score_1: i64,
    pub final_score_2: i64,
}

impl From<GameSummary> for GameSummaryDto {
    fn from(summary: GameSummary) -> Self {
        Self {
            periods: summary.periods,
            jams: summary.jams,
            minutes: summary.minutes,
            final_score_1: summary.final_score[0],
            final_score_2: summary.final_score[1],
        }
    }
}

/// Per-team sums (and the combined `sum` row).
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamTotalsDto {
    pub team: String,
    pub calloffs: u32,
    pub injuries: u32,
    pub jam_points: i64,
    pub leads: u32,
    pub lost: u32,
    pub no_initials: u32,
    pub star_passes: u32,
    pub scoring_trips: u32,
}

impl From<TeamTotals> for TeamTotalsDto {
    fn from(totals: TeamTotals) -> Self {
        Self {
            team: totals.team,
            calloffs: totals.calloffs,
            injuries: totals.injuries,
            jam_points: totals.jam_points,
            leads: totals.leads,
            lost: totals.lost,
            no_initials: totals.no_initials,
            star_passes: totals.star_passes,
            scoring_trips: totals.scoring_trips,
        }
    }
}

/// One team's side of a jam.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamJamDto {
    pub jam_score: i64,
    pub total_score: i64,
    pub net_points: i64,
    pub lead: bool,
    pub lost: bool,
    pub calloff: bool,
    pub injury: bool,
    pub no_initial: bool,
    pub star_pass: bool,
    pub jammer: Option<String>,
    pub jammer_number: Option<String>,
    pub pivot: Option<String>,
    pub skaters: Vec<String>,
    pub scoring_trips: u32,
    pub first_trip_seconds: Option<f64>,
}

impl From<&TeamJam> for TeamJamDto {
    fn from(team: &TeamJam) -> Self {
        Self {
            jam_score: team.jam_score,
            total_score: team.total_score,
            net_points: team.net_points,
            lead: team.lead,
            lost: team.lost,
            calloff: team.calloff,
            injury: team.injury,
            no_initial: team.no_initial,
            star_pass: team.star_pass,
            jammer: team.jammer.as_ref().map(|j| j.name.clone()),
            jammer_number: team.jammer.as_ref().map(|j| j.number.clone()),
            pivot: team.pivot.as_ref().map(|p| p.name.clone()),
            skaters: team.skaters.clone(),
            scoring_trips: team.scoring_trips,
            first_trip_seconds: team.first_trip_seconds,
        }
    }
}

/// One jam row.
#[derive(Debug, Serialize, ToSchema)]
pub struct JamDto {
    /// `period:jam`, e.g. `1:07`.
    pub prd_jam: String,
    pub period: u32,
    pub jam: u32,
    pub duration_seconds: f64,
    pub start_seconds: f64,
    pub end_seconds: f64,
    /// Wall clock at jam start, milliseconds since the epoch.
    pub walltime_start: Option<i64>,
    pub calloff_any: bool,
    pub team_with_lead: Option<u8>,
    pub time_to_lead: Option<f64>,
    pub team_1: TeamJamDto,
    pub team_2: TeamJamDto,
}

impl From<&Jam> for JamDto {
    fn from(jam: &Jam) -> Self {
        Self {
            prd_jam: jam.prd_jam(),
            period: jam.period,
            jam: jam.number,
            duration_seconds: jam.duration_seconds,
            start_seconds: jam.start_seconds,
            end_seconds: jam.end_seconds,
            walltime_start: jam.walltime_start,
            calloff_any: jam.calloff_any(),
            team_with_lead: jam.team_with_lead(),
            time_to_lead: jam.time_to_lead(),
            team_1: (&jam.teams[0]).into(),
            team_2: (&jam.teams[1]).into(),
        }
    }
}

/// A jammer's line.
#[derive(Debug, Serialize, ToSchema)]
pub struct JammerLineDto {
    pub name: String,
    pub number: String,
    pub jams: u32,
    pub points: i64,
    pub lead_count: u32,
    pub lost_count: u32,
    pub percent_lead: u32,
    pub mean_net_points: f64,
}

impl From<JammerLine> for JammerLineDto {
    fn from(line: JammerLine) -> Self {
        Self {
            name: line.name,
            number: line.number,
            jams: line.jams,
            points: line.points,
            lead_count: line.lead_count,
            lost_count: line.lost_count,
            percent_lead: line.percent_lead,
            mean_net_points: line.mean_net_points,
        }
    }
}

/// Penalty count of one skater.
#[derive(Debug, Serialize, ToSchema)]
pub struct SkaterPenaltiesDto {
    pub name: String,
    pub number: String,
    pub count: u32,
}

impl From<SkaterPenalties> for SkaterPenaltiesDto {
    fn from(row: SkaterPenalties) -> Self {
        Self {
            name: row.name,
            number: row.number,
            count: row.count,
        }
    }
}

/// Roster entry with jammer and pivot counts.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterLineDto {
    pub skater: String,
    pub jammed: u32,
    pub pivoted: u32,
}

impl From<RosterLine> for RosterLineDto {
    fn from(line: RosterLine) -> Self {
        Self {
            skater: line.skater,
            jammed: line.jammed,
            pivoted: line.pivoted,
        }
    }
}

/// A recently called penalty.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecentPenaltyDto {
    pub team: String,
    pub name: String,
    pub penalty: String,
    /// `Serving`, `Not Yet` or `Served`.
    pub status: String,
    pub period: Option<u32>,
    pub jam: Option<u32>,
    /// `m:ss` since jam start.
    pub time_in_jam: Option<String>,
}

impl From<RecentPenalty> for RecentPenaltyDto {
    fn from(row: RecentPenalty) -> Self {
        Self {
            team: row.team,
            name: row.name,
            penalty: row.penalty,
            status: row.status.to_string(),
            period: row.period,
            jam: row.jam,
            time_in_jam: row.time_in_jam,
        }
    }
}

/// Team header with its per-team tables.
#[derive(Debug, Serialize, ToSchema)]
pub struct TeamReportDto {
    pub number: u8,
    pub name: String,
    pub color: Option<String>,
    pub jammers: Vec<JammerLineDto>,
    pub penalties: Vec<SkaterPenaltiesDto>,
    pub roster: Vec<RosterLineDto>,
}

/// Response of `/api/game`: the built game and its statistics.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameResponse {
    /// Snapshot the game was built from.
    pub snapshot: PublishInfo,
    /// Scoreboard major version.
    pub version: u32,
    pub summary: GameSummaryDto,
    pub teams_summary: Vec<TeamTotalsDto>,
    pub teams: Vec<TeamReportDto>,
    pub jams: Vec<JamDto>,
    /// Latest penalties of both teams, newest first.
    pub recent_penalties: Vec<RecentPenaltyDto>,
}

impl GameResponse {
    /// Assemble the response from a snapshot and the game built from it.
    pub fn new(snapshot: &PublishedSnapshot, game: &DerbyGame) -> Self {
        let teams = game
            .teams
            .iter()
            .map(|team| TeamReportDto {
                number: team.number,
                name: team.name.clone(),
                color: team.color.clone(),
                jammers: stats::jammer_summary(game, team.number)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                penalties: stats::skater_penalty_counts(game, team.number)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
                roster: stats::roster_usage(game, team.number)
                    .into_iter()
                    .map(Into::into)
                    .collect(),
            })
            .collect();

        Self {
            snapshot: snapshot.into(),
            version: game.version,
            summary: stats::game_summary(game).into(),
            teams_summary: stats::teams_summary(game).into_iter().map(Into::into).collect(),
            teams,
            jams: game.jams.iter().map(Into::into).collect(),
            recent_penalties: stats::recent_penalties(game, stats::DEFAULT_RECENT_PENALTIES)
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}
