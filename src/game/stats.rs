//! Summary tables derived from a [`DerbyGame`].

use std::{
    cmp::Reverse,
    collections::{BTreeSet, HashMap},
};

use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};

use super::model::{DerbyGame, Jam, Penalty, PenaltyStatus, Skater, TEAM_NUMBERS};

/// Rows of the recent penalties table unless the caller asks otherwise.
pub const DEFAULT_RECENT_PENALTIES: usize = 10;

/// Whole-game figures.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSummary {
    /// Periods with at least one jam.
    pub periods: usize,
    /// Jams played.
    pub jams: usize,
    /// Latest jam end on the period clock, in minutes.
    pub minutes: f64,
    /// Highest running total per team.
    pub final_score: [i64; 2],
}

/// Per-team sums over every jam.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamTotals {
    /// Team name, or `sum` for the combined row.
    pub team: String,
    /// Jams called off by this team's jammer.
    pub calloffs: u32,
    /// Jams ended by an injury.
    pub injuries: u32,
    /// Points scored.
    pub jam_points: i64,
    /// Lead jammer awards.
    pub leads: u32,
    /// Lost lead eligibility.
    pub lost: u32,
    /// Jams without a completed initial pass.
    pub no_initials: u32,
    /// Star passes.
    pub star_passes: u32,
    /// Scoring trips, initial passes included.
    pub scoring_trips: u32,
}

impl TeamTotals {
    fn add(&mut self, other: &TeamTotals) {
        self.calloffs += other.calloffs;
        self.injuries += other.injuries;
        self.jam_points += other.jam_points;
        self.leads += other.leads;
        self.lost += other.lost;
        self.no_initials += other.no_initials;
        self.star_passes += other.star_passes;
        self.scoring_trips += other.scoring_trips;
    }
}

/// One jammer's line in the jammer table.
#[derive(Debug, Clone, PartialEq)]
pub struct JammerLine {
    /// Jammer name.
    pub name: String,
    /// Jersey number.
    pub number: String,
    /// Jams jammed.
    pub jams: u32,
    /// Points scored while jamming.
    pub points: i64,
    /// Lead awards.
    pub lead_count: u32,
    /// Lost lead eligibility.
    pub lost_count: u32,
    /// Share of jams with lead, truncated to a whole percentage.
    pub percent_lead: u32,
    /// Mean point differential of the jammer's jams.
    pub mean_net_points: f64,
}

/// Penalties of one skater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkaterPenalties {
    /// Skater name.
    pub name: String,
    /// Jersey number.
    pub number: String,
    /// Penalties served.
    pub count: u32,
}

/// One skater of a jam lineup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineupRow {
    /// `J`, `P` or `B`, with a note such as ` (L)` or ` (SP)`.
    pub position: String,
    /// Jersey number.
    pub number: String,
    /// Skater name.
    pub name: String,
    /// Penalties over the whole game.
    pub penalty_count: usize,
    /// Latest penalty of the jam as `name (status)`.
    pub penalty: Option<String>,
}

/// A row of the recent penalties table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPenalty {
    /// Team name.
    pub team: String,
    /// Skater name.
    pub name: String,
    /// Penalty name, or its code.
    pub penalty: String,
    pub status: PenaltyStatus,
    pub period: Option<u32>,
    pub jam: Option<u32>,
    /// `m:ss` between jam start and the call.
    pub time_in_jam: Option<String>,
}

/// A roster entry with how often the skater jammed and pivoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterLine {
    /// `<number> <name>`.
    pub skater: String,
    pub jammed: u32,
    pub pivoted: u32,
}

/// Periods, jams, duration and final score.
pub fn game_summary(game: &DerbyGame) -> GameSummary {
    let periods = game
        .jams
        .iter()
        .map(|jam| jam.period)
        .collect::<BTreeSet<_>>()
        .len();
    let minutes = game
        .jams
        .iter()
        .map(|jam| jam.end_seconds)
        .fold(0.0, f64::max)
        / 60.0;
    let final_score = [0, 1].map(|team| {
        game.jams
            .iter()
            .map(|jam| jam.teams[team].total_score)
            .max()
            .unwrap_or(0)
    });

    GameSummary {
        periods,
        jams: game.jams.len(),
        minutes,
        final_score,
    }
}

/// Rows for team 1, team 2 and their sum.
pub fn teams_summary(game: &DerbyGame) -> [TeamTotals; 3] {
    let [first, second] = [0, 1].map(|team| {
        let mut totals = TeamTotals {
            team: game.teams[team].name.clone(),
            ..TeamTotals::default()
        };
        for jam in &game.jams {
            let team_jam = &jam.teams[team];
            totals.calloffs += u32::from(team_jam.calloff);
            totals.injuries += u32::from(team_jam.injury);
            totals.jam_points += team_jam.jam_score;
            totals.leads += u32::from(team_jam.lead);
            totals.lost += u32::from(team_jam.lost);
            totals.no_initials += u32::from(team_jam.no_initial);
            totals.star_passes += u32::from(team_jam.star_pass);
            totals.scoring_trips += team_jam.scoring_trips;
        }
        totals
    });

    let mut sum = TeamTotals {
        team: "sum".to_string(),
        ..TeamTotals::default()
    };
    sum.add(&first);
    sum.add(&second);
    [first, second, sum]
}

/// Jammer table for one team (1 or 2), sorted by jersey number then name.
pub fn jammer_summary(game: &DerbyGame, team: u8) -> Vec<JammerLine> {
    let index = usize::from(team.clamp(1, 2) - 1);
    let mut lines: IndexMap<&str, (JammerLine, i64)> = IndexMap::new();

    for jam in &game.jams {
        let team_jam = &jam.teams[index];
        let Some(jammer) = &team_jam.jammer else {
            continue;
        };
        let (line, net_total) = lines.entry(jammer.id.as_str()).or_insert_with(|| {
            (
                JammerLine {
                    name: jammer.name.clone(),
                    number: jammer.number.clone(),
                    jams: 0,
                    points: 0,
                    lead_count: 0,
                    lost_count: 0,
                    percent_lead: 0,
                    mean_net_points: 0.0,
                },
                0,
            )
        });
        line.jams += 1;
        line.points += team_jam.jam_score;
        line.lead_count += u32::from(team_jam.lead);
        line.lost_count += u32::from(team_jam.lost);
        *net_total += team_jam.net_points;
    }

    let mut table: Vec<JammerLine> = lines
        .into_values()
        .map(|(mut line, net_total)| {
            line.percent_lead = line.lead_count * 100 / line.jams;
            line.mean_net_points = net_total as f64 / f64::from(line.jams);
            line
        })
        .collect();
    table.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)));
    table
}

/// Penalty counts per skater of one team, most penalized first.
pub fn skater_penalty_counts(game: &DerbyGame, team: u8) -> Vec<SkaterPenalties> {
    let mut counts: IndexMap<&str, SkaterPenalties> = IndexMap::new();
    for penalty in game.penalties.iter().filter(|p| p.team == team) {
        counts
            .entry(penalty.skater_id.as_str())
            .or_insert_with(|| SkaterPenalties {
                name: penalty.skater_name.clone(),
                number: penalty.skater_number.clone(),
                count: 0,
            })
            .count += 1;
    }

    let mut table: Vec<_> = counts.into_values().collect();
    // Stable sort keeps roster order among equal counts.
    table.sort_by(|a, b| b.count.cmp(&a.count));
    table
}

/// Lineup of one team (1 or 2) in `jam`: jammer, then pivot, then blockers
/// by jersey number.
///
/// With `attach_open`, penalties still `Serving` or `Not Yet` count as
/// penalties of this jam whatever jam they were called in. Use it for the
/// jam in progress.
pub fn jam_lineup(game: &DerbyGame, jam: &Jam, team: u8, attach_open: bool) -> Vec<LineupRow> {
    let team = team.clamp(1, 2);
    let team_jam = &jam.teams[usize::from(team - 1)];
    let team_penalties: Vec<&Penalty> =
        game.penalties.iter().filter(|p| p.team == team).collect();
    let is_this_jam = |penalty: &Penalty| {
        (attach_open && penalty.status.is_open())
            || (penalty.period == Some(jam.period) && penalty.jam == Some(jam.number))
    };

    let mut rows: Vec<(u8, LineupRow)> = team_jam
        .lineup
        .iter()
        .map(|skater| {
            let (rank, position) = if is_skater(&team_jam.jammer, skater) {
                let note = if team_jam.no_initial {
                    " (NI)"
                } else if team_jam.lost {
                    " (LO)"
                } else if team_jam.lead {
                    " (L)"
                } else {
                    ""
                };
                (0, format!("J{note}"))
            } else if is_skater(&team_jam.pivot, skater) {
                let note = if team_jam.star_pass { " (SP)" } else { "" };
                (1, format!("P{note}"))
            } else {
                (2, "B".to_string())
            };
            let own = team_penalties
                .iter()
                .copied()
                .filter(|p| p.skater_id == skater.id);
            let penalty = own
                .clone()
                .filter(|&p| is_this_jam(p))
                .min_by_key(|p| (p.status, Reverse(p.time)))
                .map(|p| format!("{} ({})", p.label(), p.status));
            let row = LineupRow {
                position,
                number: skater.number.clone(),
                name: skater.name.clone(),
                penalty_count: own.count(),
                penalty,
            };
            (rank, row)
        })
        .collect();
    rows.sort_by(|(a_rank, a), (b_rank, b)| {
        a_rank.cmp(b_rank).then_with(|| a.number.cmp(&b.number))
    });
    rows.into_iter().map(|(_, row)| row).collect()
}

/// The `limit` most recently called penalties of both teams, newest first.
pub fn recent_penalties(game: &DerbyGame, limit: usize) -> Vec<RecentPenalty> {
    let mut penalties: Vec<&Penalty> = game.penalties.iter().collect();
    penalties.sort_by_key(|p| Reverse(p.time));
    penalties
        .into_iter()
        .take(limit)
        .map(|penalty| {
            let started = game
                .jams
                .iter()
                .find(|jam| Some(jam.period) == penalty.period && Some(jam.number) == penalty.jam)
                .and_then(|jam| jam.walltime_start);
            let time_in_jam = penalty
                .time
                .zip(started)
                .map(|(called, started)| min_sec(called - started));
            RecentPenalty {
                team: game.team(penalty.team).name.clone(),
                name: penalty.skater_name.clone(),
                penalty: penalty.label().to_string(),
                status: penalty.status,
                period: penalty.period,
                jam: penalty.jam,
                time_in_jam,
            }
        })
        .collect()
}

/// Roster of one team sorted by jersey number, with jammer and pivot counts.
pub fn roster_usage(game: &DerbyGame, team: u8) -> Vec<RosterLine> {
    let index = usize::from(team.clamp(1, 2) - 1);
    let mut skaters: Vec<_> = game.teams[index].roster.values().collect();
    skaters.sort_by(|a, b| a.number.cmp(&b.number));
    skaters
        .into_iter()
        .map(|skater| {
            let mut line = RosterLine {
                skater: format!("{} {}", skater.number, skater.name),
                jammed: 0,
                pivoted: 0,
            };
            for team_jam in game.jams.iter().map(|jam| &jam.teams[index]) {
                line.jammed += u32::from(is_skater(&team_jam.jammer, skater));
                line.pivoted += u32::from(is_skater(&team_jam.pivot, skater));
            }
            line
        })
        .collect()
}

fn is_skater(slot: &Option<Skater>, skater: &Skater) -> bool {
    slot.as_ref().is_some_and(|fielded| fielded.id == skater.id)
}

/// Milliseconds as `m:ss`; negative spans read as zero.
fn min_sec(millis: i64) -> String {
    let seconds = millis.max(0) / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Replace every skater name in `game` with a random alias such as `Skater 4`.
///
/// One name always maps to the same alias within the game; aliases are
/// shuffled so they reveal nothing about roster order.
pub fn anonymize<R: Rng + ?Sized>(game: &mut DerbyGame, rng: &mut R) {
    let mut names: Vec<String> = game
        .teams
        .iter()
        .flat_map(|team| team.roster.values().map(|skater| skater.name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    names.shuffle(rng);
    let aliases: HashMap<String, String> = names
        .into_iter()
        .enumerate()
        .map(|(index, name)| (name, format!("Skater {}", index + 1)))
        .collect();
    let alias = |name: &mut String| {
        if let Some(replacement) = aliases.get(name.as_str()) {
            name.clone_from(replacement);
        }
    };

    for team in &mut game.teams {
        for skater in team.roster.values_mut() {
            alias(&mut skater.name);
        }
    }
    for jam in &mut game.jams {
        for number in TEAM_NUMBERS {
            let team_jam = &mut jam.teams[usize::from(number - 1)];
            let fielded = team_jam.jammer.iter_mut().chain(&mut team_jam.pivot);
            fielded
                .chain(&mut team_jam.lineup)
                .for_each(|skater| alias(&mut skater.name));
            team_jam.skaters.iter_mut().for_each(alias);
        }
    }
    for penalty in &mut game.penalties {
        alias(&mut penalty.skater_name);
    }
}
