//! Conversion of a raw scoreboard snapshot into a [`DerbyGame`].
//!
//! The builder understands the layouts written by scoreboard versions 4 and 5:
//!
//! * v5 live feed: everything lives under `ScoreBoard.CurrentGame`,
//! * v5 export: everything lives under `ScoreBoard.Game(<id>)`,
//! * v4: the game lives directly under `ScoreBoard`, rosters and colors under
//!   `ScoreBoard.PreparedTeam(<team name>)`.
//!
//! Optional fields default to zero, `false` or empty so partially filled
//! live snapshots still build.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::model::{
    DerbyGame, Jam, Penalty, PenaltyStatus, Skater, TEAM_NUMBERS, Team, TeamJam,
};
use crate::feed::path::split_keyed;

/// Major version assumed when the snapshot does not say.
pub const DEFAULT_VERSION: u32 = 5;

type Node = Map<String, Value>;

/// The snapshot does not contain a usable game.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// No `ScoreBoard` object at the top of the document.
    #[error("snapshot has no ScoreBoard")]
    MissingScoreBoard,
    /// One of the two teams is absent.
    #[error("snapshot has no Team({0})")]
    MissingTeam(u8),
    /// `ScoreBoard.Version(release)` is not of the form `v<major>...`.
    #[error("unrecognized scoreboard version `{0}`")]
    InvalidVersion(String),
}

/// Build the structured game from a merged snapshot document.
pub fn build_from_snapshot(document: &Value) -> Result<DerbyGame, BuildError> {
    let scoreboard = document
        .get("ScoreBoard")
        .and_then(Value::as_object)
        .ok_or(BuildError::MissingScoreBoard)?;
    let version = major_version(scoreboard)?;
    let root = game_root(scoreboard);

    let teams = [
        build_team(scoreboard, root, 1)?,
        build_team(scoreboard, root, 2)?,
    ];
    let jams = build_jams(root, &teams);
    let penalty_names = penalty_names(scoreboard, root);
    let penalties = build_penalties(scoreboard, root, &teams, &penalty_names);

    let mut metadata = IndexMap::new();
    metadata.insert("team_1".to_string(), teams[0].name.clone());
    metadata.insert("team_2".to_string(), teams[1].name.clone());

    debug!(
        version,
        jams = jams.len(),
        penalties = penalties.len(),
        "built derby game from snapshot"
    );
    Ok(DerbyGame {
        version,
        teams,
        jams,
        penalties,
        metadata,
    })
}

/// Remove characters that the scoreboard strips inconsistently.
pub fn cleanup_team_name(name: &str) -> String {
    name.replace('\'', "")
}

fn major_version(scoreboard: &Node) -> Result<u32, BuildError> {
    let Some(release) = scoreboard.get("Version(release)").and_then(Value::as_str) else {
        return Ok(DEFAULT_VERSION);
    };
    release
        .strip_prefix('v')
        .and_then(|rest| rest.split('.').next())
        .and_then(|major| major.parse().ok())
        .ok_or_else(|| BuildError::InvalidVersion(release.to_string()))
}

fn game_root(scoreboard: &Node) -> &Node {
    if let Some(current) = scoreboard.get("CurrentGame").and_then(Value::as_object) {
        return current;
    }
    scoreboard
        .iter()
        .find_map(|(key, value)| {
            matches!(split_keyed(key), Some(("Game", _)))
                .then(|| value.as_object())
                .flatten()
        })
        .unwrap_or(scoreboard)
}

fn build_team(scoreboard: &Node, root: &Node, number: u8) -> Result<Team, BuildError> {
    let node = root
        .get(&format!("Team({number})"))
        .and_then(Value::as_object)
        .ok_or(BuildError::MissingTeam(number))?;
    let raw_name = text(node, "Name").unwrap_or_else(|| format!("Team {number}"));
    let prepared = prepared_team(scoreboard, &raw_name);

    let color = text(node, "Color(scoreboard_bg)")
        .or_else(|| prepared.and_then(|team| text(team, "Color(scoreboard_bg)")));

    let roster_node = if has_skaters(node) {
        Some(node)
    } else {
        prepared
    };
    let roster: IndexMap<String, Skater> = roster_node
        .map(|team| {
            keyed_children(team, "Skater")
                .map(|(id, skater)| {
                    let skater = Skater {
                        id: id.to_string(),
                        name: text(skater, "Name").unwrap_or_default(),
                        number: text(skater, "RosterNumber").unwrap_or_default(),
                    };
                    (skater.id.clone(), skater)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Team {
        number,
        name: cleanup_team_name(&raw_name),
        color,
        roster,
    })
}

fn prepared_team<'a>(scoreboard: &'a Node, name: &str) -> Option<&'a Node> {
    [name.to_string(), cleanup_team_name(name)]
        .iter()
        .find_map(|candidate| {
            scoreboard
                .get(&format!("PreparedTeam({candidate})"))
                .and_then(Value::as_object)
        })
}

fn has_skaters(team: &Node) -> bool {
    keyed_children(team, "Skater").next().is_some()
}

fn build_jams(root: &Node, teams: &[Team; 2]) -> Vec<Jam> {
    let mut jams = Vec::new();
    for (period, period_node) in keyed_children(root, "Period") {
        let Some(period) = period.parse::<u32>().ok().filter(|p| *p >= 1) else {
            continue;
        };
        for (number, jam_node) in keyed_children(period_node, "Jam") {
            let Ok(number) = number.parse::<u32>() else {
                continue;
            };
            jams.push(build_jam(period, number, jam_node, teams));
        }
    }
    jams.sort_by_key(|jam| (jam.period, jam.number));
    jams
}

fn build_jam(period: u32, number: u32, node: &Node, teams: &[Team; 2]) -> Jam {
    let start = number_field(node, "PeriodClockElapsedStart");
    let end = number_field(node, "PeriodClockElapsedEnd");
    let mut team_jams = TEAM_NUMBERS.map(|team| {
        let empty = Node::new();
        let team_node = node
            .get(&format!("TeamJam({team})"))
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        build_team_jam(team_node, &teams[usize::from(team - 1)])
    });
    let net = team_jams[0].jam_score - team_jams[1].jam_score;
    team_jams[0].net_points = net;
    team_jams[1].net_points = -net;

    Jam {
        period,
        number,
        duration_seconds: number_field(node, "Duration") / 1000.0,
        start_seconds: start / 1000.0,
        end_seconds: end / 1000.0,
        walltime_start: timestamp(node, "WalltimeStart"),
        teams: team_jams,
    }
}

fn build_team_jam(node: &Node, team: &Team) -> TeamJam {
    let fielded = |position: &str| {
        keyed_children(node, "Fielding")
            .find(|(slot, _)| *slot == position)
            .and_then(|(_, fielding)| fielding.get("Skater").and_then(Value::as_str))
            .and_then(|id| team.roster.get(id))
            .cloned()
    };
    let jammer = fielded("Jammer");
    let pivot = fielded("Pivot");
    let lineup: Vec<Skater> = keyed_children(node, "Fielding")
        .filter_map(|(_, fielding)| fielding.get("Skater").and_then(Value::as_str))
        .filter_map(|id| team.roster.get(id))
        .cloned()
        .collect();
    let skaters = lineup.iter().map(|skater| skater.name.clone()).collect();
    let scoring_trips = keyed_children(node, "ScoringTrip")
        .filter_map(|(trip, _)| trip.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    let first_trip_seconds = node
        .get("ScoringTrip(1)")
        .and_then(Value::as_object)
        .and_then(|trip| trip.get("Duration"))
        .and_then(as_number)
        .map(|ms| ms / 1000.0);

    TeamJam {
        jam_score: integer_field(node, "JamScore"),
        total_score: integer_field(node, "TotalScore"),
        net_points: 0,
        lead: flag(node, "Lead"),
        lost: flag(node, "Lost"),
        calloff: flag(node, "Calloff"),
        injury: flag(node, "Injury"),
        no_initial: flag(node, "NoInitial"),
        star_pass: flag(node, "StarPass"),
        jammer,
        pivot,
        lineup,
        skaters,
        scoring_trips,
        first_trip_seconds,
    }
}

/// Map penalty letter codes to their (shortened) names.
fn penalty_names(scoreboard: &Node, root: &Node) -> BTreeMap<String, String> {
    let mut names = BTreeMap::new();
    collect_penalty_codes(root, &mut names);
    if let Some(codes) = scoreboard.get("PenaltyCodes").and_then(Value::as_object) {
        for (key, value) in codes {
            if let (Some(("Code", code)), Some(name)) = (split_keyed(key), value.as_str()) {
                names
                    .entry(code.to_string())
                    .or_insert_with(|| short_penalty_name(name));
            }
        }
    }
    names
}

fn collect_penalty_codes(node: &Node, names: &mut BTreeMap<String, String>) {
    for (key, value) in node {
        match (split_keyed(key), value) {
            (Some(("PenaltyCode", code)), Value::String(name)) => {
                names
                    .entry(code.to_string())
                    .or_insert_with(|| short_penalty_name(name));
            }
            (_, Value::Object(child)) => collect_penalty_codes(child, names),
            _ => {}
        }
    }
}

fn short_penalty_name(name: &str) -> String {
    name.split(',').next().unwrap_or(name).trim().to_string()
}

fn build_penalties(
    scoreboard: &Node,
    root: &Node,
    teams: &[Team; 2],
    names: &BTreeMap<String, String>,
) -> Vec<Penalty> {
    let mut penalties = Vec::new();
    for team in teams {
        let team_node = root
            .get(&format!("Team({})", team.number))
            .and_then(Value::as_object)
            .filter(|node| has_skaters(node))
            .or_else(|| prepared_team(scoreboard, &team.name));
        let Some(team_node) = team_node else {
            continue;
        };

        for (id, skater_node) in keyed_children(team_node, "Skater") {
            let Some(skater) = team.roster.get(id) else {
                continue;
            };
            let mut assessed: Vec<(u32, Penalty)> = keyed_children(skater_node, "Penalty")
                .filter_map(|(index, node)| {
                    let code = text(node, "Code")?;
                    let penalty = Penalty {
                        team: team.number,
                        skater_id: skater.id.clone(),
                        skater_name: skater.name.clone(),
                        skater_number: skater.number.clone(),
                        name: names.get(&code).cloned(),
                        code,
                        period: ordinal(node, "PeriodNumber"),
                        jam: ordinal(node, "JamNumber"),
                        time: timestamp(node, "Time"),
                        status: penalty_status(node),
                    };
                    Some((index.parse().unwrap_or(0), penalty))
                })
                .collect();
            assessed.sort_by_key(|(index, _)| *index);
            penalties.extend(assessed.into_iter().map(|(_, penalty)| penalty));
        }
    }
    penalties
}

/// Children of `node` whose key is `<kind>(<id>)` and whose value is an object.
fn keyed_children<'a>(node: &'a Node, kind: &'a str) -> impl Iterator<Item = (&'a str, &'a Node)> {
    node.iter().filter_map(move |(key, value)| match split_keyed(key) {
        Some((name, id)) if name == kind => value.as_object().map(|child| (id, child)),
        _ => None,
    })
}

fn text(node: &Node, key: &str) -> Option<String> {
    match node.get(key)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn number_field(node: &Node, key: &str) -> f64 {
    node.get(key).and_then(as_number).unwrap_or(0.0)
}

fn integer_field(node: &Node, key: &str) -> i64 {
    match node.get(key) {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn penalty_status(node: &Node) -> PenaltyStatus {
    if flag(node, "Serving") {
        PenaltyStatus::Serving
    } else if flag(node, "Served") {
        PenaltyStatus::Served
    } else {
        PenaltyStatus::NotYet
    }
}

/// Positive period or jam number.
fn ordinal(node: &Node, key: &str) -> Option<u32> {
    u32::try_from(integer_field(node, key)).ok().filter(|n| *n > 0)
}

/// Positive wall clock in milliseconds.
fn timestamp(node: &Node, key: &str) -> Option<i64> {
    Some(integer_field(node, key)).filter(|ms| *ms > 0)
}

fn flag(node: &Node, key: &str) -> bool {
    match node.get(key) {
        Some(Value::Bool(value)) => *value,
        Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::game::sample_snapshot;

    #[test]
    fn builds_jam_table_from_export() {
        let game = build_from_snapshot(&sample_snapshot()).unwrap();
        assert_eq!(game.version, 5);
        assert_eq!(game.teams[0].name, "Rollin Rebels");
        assert_eq!(game.teams[0].color.as_deref(), Some("#aa0000"));
        assert_eq!(game.teams[1].roster.len(), 3);

        let keys: Vec<_> = game.jams.iter().map(Jam::prd_jam).collect();
        assert_eq!(keys, ["1:01", "1:02", "2:01"]);

        let first = &game.jams[0];
        assert_eq!(first.duration_seconds, 90.0);
        assert_eq!(first.teams[0].jam_score, 4);
        assert_eq!(first.teams[0].net_points, 4);
        assert_eq!(first.teams[1].net_points, -4);
        assert!(first.calloff_any());
        assert_eq!(first.team_with_lead(), Some(1));
        assert_eq!(first.time_to_lead(), Some(12.0));
        assert_eq!(first.teams[0].scoring_trips, 2);
        assert_eq!(
            first.teams[0].jammer.as_ref().map(|s| s.name.as_str()),
            Some("Ada Lovelace")
        );
        assert_eq!(first.teams[0].skaters, ["Ada Lovelace", "Bea Bop"]);

        let second = &game.jams[1];
        assert_eq!(second.team_with_lead(), Some(2));
        assert_eq!(second.time_to_lead(), Some(9.0));
        assert_eq!(second.teams[1].scoring_trips, 3);
        assert_eq!(second.end_seconds, 240.0);
    }

    #[test]
    fn extracts_penalties_with_short_names() {
        let game = build_from_snapshot(&sample_snapshot()).unwrap();
        let summary: Vec<_> = game
            .penalties
            .iter()
            .map(|p| (p.team, p.skater_name.as_str(), p.code.as_str(), p.name.as_deref()))
            .collect();
        assert_eq!(
            summary,
            [
                (1, "Ada Lovelace", "X", Some("Cut")),
                (1, "Bea Bop", "B", Some("Back Block")),
                (1, "Bea Bop", "C", Some("Illegal Contact")),
                (2, "Dee Stroyer", "X", Some("Cut")),
            ]
        );
    }

    #[test]
    fn penalties_carry_jam_time_and_status() {
        let game = build_from_snapshot(&sample_snapshot()).unwrap();
        let details: Vec<_> = game
            .penalties
            .iter()
            .map(|p| (p.period, p.jam, p.status))
            .collect();
        assert_eq!(
            details,
            [
                (Some(1), Some(1), PenaltyStatus::Served),
                (Some(1), Some(2), PenaltyStatus::Served),
                (Some(2), Some(1), PenaltyStatus::Serving),
                (Some(2), Some(1), PenaltyStatus::NotYet),
            ]
        );
        assert_eq!(game.penalties[0].time, Some(1_700_000_030_000));
        assert_eq!(game.jams[0].walltime_start, Some(1_700_000_000_000));
    }

    #[test]
    fn reads_pivot_and_full_lineup() {
        let game = build_from_snapshot(&sample_snapshot()).unwrap();
        let first = &game.jams[0].teams[0];
        assert_eq!(first.pivot.as_ref().map(|s| s.id.as_str()), Some("s2"));
        let last = &game.jams[2].teams[1];
        let ids: Vec<_> = last.lineup.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["t2", "t3", "t1"]);
        assert_eq!(last.pivot.as_ref().map(|s| s.name.as_str()), Some("Fay Tality"));
        assert_eq!(game.jams[1].teams[0].pivot, None);
    }

    #[test]
    fn prefers_current_game_over_exported_games() {
        let document = json!({"ScoreBoard": {
            "Game(old)": {"Team(1)": {"Name": "Old A"}, "Team(2)": {"Name": "Old B"}},
            "CurrentGame": {"Team(1)": {"Name": "Live A"}, "Team(2)": {"Name": "Live B"}}
        }});
        let game = build_from_snapshot(&document).unwrap();
        assert_eq!(game.teams[0].name, "Live A");
        assert!(game.jams.is_empty());
    }

    #[test]
    fn reads_version_4_layout() {
        let document = json!({"ScoreBoard": {
            "Version(release)": "v4.1.2",
            "Team(1)": {"Name": "Home"},
            "Team(2)": {"Name": "Away"},
            "PreparedTeam(Home)": {
                "Color(scoreboard_bg)": "#123456",
                "Skater(h1)": {"Name": "Hank", "RosterNumber": 8, "Penalty(1)": {"Code": "B"}}
            },
            "PenaltyCodes": {"Code(B)": "Back Block, Blocking with back"},
            "Period(1)": {"Jam(1)": {"TeamJam(1)": {
                "JamScore": "3", "Lead": "true",
                "Fielding(Jammer)": {"Skater": "h1"}
            }}}
        }});
        let game = build_from_snapshot(&document).unwrap();
        assert_eq!(game.version, 4);
        assert_eq!(game.teams[0].color.as_deref(), Some("#123456"));
        assert_eq!(game.teams[0].roster["h1"].number, "8");

        let jam = &game.jams[0];
        assert_eq!(jam.teams[0].jam_score, 3);
        assert!(jam.teams[0].lead);
        assert_eq!(jam.teams[0].jammer.as_ref().map(|s| s.id.as_str()), Some("h1"));
        assert_eq!(jam.teams[0].first_trip_seconds, None);

        assert_eq!(game.penalties.len(), 1);
        assert_eq!(game.penalties[0].name.as_deref(), Some("Back Block"));
    }

    #[test]
    fn missing_structure_is_an_error() {
        assert_eq!(
            build_from_snapshot(&json!({})).unwrap_err(),
            BuildError::MissingScoreBoard
        );
        assert_eq!(
            build_from_snapshot(&json!({"ScoreBoard": {"CurrentGame": {"Team(1)": {}}}}))
                .unwrap_err(),
            BuildError::MissingTeam(2)
        );
        assert_eq!(
            build_from_snapshot(&json!({"ScoreBoard": {"Version(release)": "five"}})).unwrap_err(),
            BuildError::InvalidVersion("five".into())
        );
    }
}
