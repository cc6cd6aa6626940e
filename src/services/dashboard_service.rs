//! Server-rendered HTML dashboard.
//!
//! Every page carries a `<meta http-equiv="refresh">` so a browser left open on
//! the dashboard follows the game without scripting.

use tracing::debug;

use crate::{
    error::ServiceError,
    feed::PublishedSnapshot,
    game::{DerbyGame, Jam, TeamJam, stats},
    services::game_service,
    state::SharedState,
};

const LINEUP_LEGEND: &str = "<p>Positions: P=Pivot, J=Jammer, B=Blocker<br>\
Position notes: (NI)=No Initial, (L)=Lead, (LO)=Lost, (SP)=Star Pass</p>\n";

const STYLE: &str = "body{font-family:sans-serif;margin:1.5em}\
table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #999;padding:2px 6px;text-align:right}\
th{background:#eee}td.name{text-align:left}";

/// Render the dashboard for the current snapshot.
///
/// Never fails: a missing snapshot or an unbuildable game renders a page that
/// keeps refreshing until data arrives.
pub async fn render(state: &SharedState) -> String {
    let refresh = state.config().autorefresh_seconds;
    match game_service::current_game(state).await {
        Ok((snapshot, game)) => game_page(refresh, &snapshot, &game),
        Err(ServiceError::NotReady) => message_page(refresh, "No game data yet. Will retry."),
        Err(err) => {
            debug!(error = %err, "rendering error page");
            message_page(
                refresh,
                &format!("Error getting game from server: {err}. Will retry."),
            )
        }
    }
}

fn page(refresh: u64, title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"{refresh}\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        title = escape(title),
    )
}

fn message_page(refresh: u64, message: &str) -> String {
    page(refresh, "Jamstats", &format!("<h2>{}</h2>\n", escape(message)))
}

fn game_page(refresh: u64, snapshot: &PublishedSnapshot, game: &DerbyGame) -> String {
    let [team_1, team_2] = &game.teams;
    let title = format!("{} vs. {}", team_1.name, team_2.name);
    let mut body = format!(
        "<h1>{}</h1>\n<p>Snapshot #{} ({} messages merged)</p>\n",
        escape(&title),
        snapshot.sequence,
        snapshot.messages_merged
    );

    if let Some(current) = game.jams.last() {
        lineup_section(&mut body, game, "Current jam", current, true);
        if let [.., previous, _] = game.jams.as_slice() {
            lineup_section(&mut body, game, "Previous jam", previous, false);
        }
        body.push_str(LINEUP_LEGEND);
    }

    let recent: Vec<Vec<String>> = stats::recent_penalties(game, stats::DEFAULT_RECENT_PENALTIES)
        .into_iter()
        .map(|row| {
            vec![
                row.team,
                row.name,
                row.penalty,
                row.status.to_string(),
                row.period.map(|n| n.to_string()).unwrap_or_default(),
                row.jam.map(|n| n.to_string()).unwrap_or_default(),
                row.time_in_jam.unwrap_or_default(),
            ]
        })
        .collect();
    body.push_str("<h2>Recent penalties</h2>\n");
    if recent.is_empty() {
        body.push_str("<p>None</p>\n");
    } else {
        body.push_str(&table(
            &["Team", "Name", "Penalty", "Status", "Period", "Jam", "Time in Jam"],
            &recent,
        ));
    }

    let summary = stats::game_summary(game);
    body.push_str("<h2>Game summary</h2>\n");
    body.push_str(&table(
        &["Periods", "Jams", "Minutes", team_1.name.as_str(), team_2.name.as_str()],
        &[vec![
            summary.periods.to_string(),
            summary.jams.to_string(),
            format!("{:.1}", summary.minutes),
            summary.final_score[0].to_string(),
            summary.final_score[1].to_string(),
        ]],
    ));

    body.push_str("<h2>Teams summary</h2>\n");
    let totals: Vec<Vec<String>> = stats::teams_summary(game)
        .into_iter()
        .map(|row| {
            vec![
                row.team,
                row.calloffs.to_string(),
                row.injuries.to_string(),
                row.jam_points.to_string(),
                row.leads.to_string(),
                row.lost.to_string(),
                row.no_initials.to_string(),
                row.star_passes.to_string(),
                row.scoring_trips.to_string(),
            ]
        })
        .collect();
    body.push_str(&table(
        &[
            "Team",
            "Calloffs",
            "Injuries",
            "Points",
            "Leads",
            "Lost",
            "No initial",
            "Star passes",
            "Scoring trips",
        ],
        &totals,
    ));

    for team in &game.teams {
        let jammers: Vec<Vec<String>> = stats::jammer_summary(game, team.number)
            .into_iter()
            .map(|line| {
                vec![
                    line.name,
                    line.number,
                    line.jams.to_string(),
                    line.points.to_string(),
                    line.lead_count.to_string(),
                    line.lost_count.to_string(),
                    format!("{}%", line.percent_lead),
                    format!("{:.1}", line.mean_net_points),
                ]
            })
            .collect();
        body.push_str(&format!("<h2>Jammers: {}</h2>\n", escape(&team.name)));
        body.push_str(&table(
            &["Jammer", "Number", "Jams", "Points", "Leads", "Lost", "% lead", "Net/jam"],
            &jammers,
        ));

        let penalties: Vec<Vec<String>> = stats::skater_penalty_counts(game, team.number)
            .into_iter()
            .map(|row| vec![row.name, row.number, row.count.to_string()])
            .collect();
        body.push_str(&format!("<h2>Penalties: {}</h2>\n", escape(&team.name)));
        if penalties.is_empty() {
            body.push_str("<p>None</p>\n");
        } else {
            body.push_str(&table(&["Skater", "Number", "Penalties"], &penalties));
        }
    }

    body.push_str("<h2>Jams</h2>\n");
    let jammer_1 = format!("{} jammer", team_1.name);
    let jammer_2 = format!("{} jammer", team_2.name);
    let jams: Vec<Vec<String>> = game.jams.iter().map(jam_row).collect();
    body.push_str(&table(
        &[
            "Jam",
            "Duration",
            jammer_1.as_str(),
            "Pts",
            "Score",
            "",
            jammer_2.as_str(),
            "Pts",
            "Score",
            "",
        ],
        &jams,
    ));

    for team in &game.teams {
        let roster: Vec<Vec<String>> = stats::roster_usage(game, team.number)
            .into_iter()
            .map(|line| vec![line.skater, line.jammed.to_string(), line.pivoted.to_string()])
            .collect();
        body.push_str(&format!("<h2>Roster: {}</h2>\n", escape(&team.name)));
        body.push_str(&table(&["Skater", "Jammed", "Pivoted"], &roster));
    }

    page(refresh, &title, &body)
}

fn lineup_section(body: &mut String, game: &DerbyGame, heading: &str, jam: &Jam, current: bool) {
    body.push_str(&format!("<h2>{heading}: {}</h2>\n", jam.prd_jam()));
    for team in &game.teams {
        let rows: Vec<Vec<String>> = stats::jam_lineup(game, jam, team.number, current)
            .into_iter()
            .map(|row| {
                vec![
                    row.position,
                    row.number,
                    row.name,
                    row.penalty_count.to_string(),
                    row.penalty.unwrap_or_default(),
                ]
            })
            .collect();
        body.push_str(&format!("<h3>{}</h3>\n", escape(&team.name)));
        if rows.is_empty() {
            body.push_str("<p>No skaters recorded</p>\n");
        } else {
            body.push_str(&table(&["Pos", "#", "Name", "Pen. Count", "Penalty"], &rows));
        }
    }
}

fn jam_row(jam: &Jam) -> Vec<String> {
    let mut row = vec![jam.prd_jam(), format!("{:.0}s", jam.duration_seconds)];
    for team in &jam.teams {
        row.push(
            team.jammer
                .as_ref()
                .map(|jammer| format!("{} {}", jammer.number, jammer.name))
                .unwrap_or_default(),
        );
        row.push(team.jam_score.to_string());
        row.push(team.total_score.to_string());
        row.push(jam_flags(team));
    }
    row
}

fn jam_flags(team: &TeamJam) -> String {
    [
        (team.lead, "lead"),
        (team.lost, "lost"),
        (team.calloff, "call"),
        (team.star_pass, "SP"),
        (team.injury, "inj"),
        (team.no_initial, "NI"),
    ]
    .into_iter()
    .filter_map(|(set, label)| set.then_some(label))
    .collect::<Vec<_>>()
    .join(" ")
}

fn table<H: AsRef<str>>(headers: &[H], rows: &[Vec<String>]) -> String {
    let mut html = String::from("<table>\n<tr>");
    for header in headers {
        html.push_str(&format!("<th>{}</th>", escape(header.as_ref())));
    }
    html.push_str("</tr>\n");
    for row in rows {
        html.push_str("<tr>");
        for (index, cell) in row.iter().enumerate() {
            let class = if index == 0 { " class=\"name\"" } else { "" };
            html.push_str(&format!("<td{class}>{}</td>", escape(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

/// Escape text for HTML element and attribute content.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Instant};

    use super::*;
    use crate::{
        config::AppConfig,
        game::sample_snapshot,
        state::{AppState, FeedSource},
    };

    #[test]
    fn escape_handles_markup() {
        assert_eq!(
            escape("<b>\"Rock\" & 'Roll'</b>"),
            "&lt;b&gt;&quot;Rock&quot; &amp; &#39;Roll&#39;&lt;/b&gt;"
        );
    }

    #[tokio::test]
    async fn no_data_page_refreshes() {
        let state = AppState::new(AppConfig::default(), FeedSource::Live);
        let html = render(&state).await;
        assert!(html.contains("No game data yet"));
        assert!(html.contains("http-equiv=\"refresh\" content=\"30\""));
    }

    #[tokio::test]
    async fn error_page_for_unbuildable_snapshot() {
        let state = AppState::new(AppConfig::default(), FeedSource::Live);
        let publisher = Arc::clone(state.publisher());
        let generation = publisher.next_generation();
        publisher.offer(&serde_json::json!({"Other": 1}), generation, 1, 1, Instant::now());

        let html = render(&state).await;
        assert!(html.contains("Error getting game from server"));
        assert!(html.contains("http-equiv=\"refresh\""));
    }

    #[tokio::test]
    async fn game_page_lists_teams_and_jams() {
        let state = AppState::new(AppConfig::default(), FeedSource::Live);
        let publisher = Arc::clone(state.publisher());
        let generation = publisher.next_generation();
        publisher.offer(&sample_snapshot(), generation, 1, 1, Instant::now());

        let html = render(&state).await;
        assert!(html.contains("Rollin Rebels vs. Derby Dames"));
        assert!(html.contains("<h2>Teams summary</h2>"));
        assert!(html.contains("Jammers: Derby Dames"));
        assert!(html.contains("<td class=\"name\">1:01</td>"));
        assert!(html.contains("<td class=\"name\">2:01</td>"));
    }

    #[tokio::test]
    async fn game_page_shows_lineups_penalties_and_rosters() {
        let state = AppState::new(AppConfig::default(), FeedSource::Live);
        let publisher = Arc::clone(state.publisher());
        let generation = publisher.next_generation();
        publisher.offer(&sample_snapshot(), generation, 1, 1, Instant::now());

        let html = render(&state).await;
        assert!(html.contains("<h2>Current jam: 2:01</h2>"));
        assert!(html.contains("<h2>Previous jam: 1:02</h2>"));
        assert!(html.contains(
            "<td class=\"name\">P</td><td>7</td><td>Bea Bop</td><td>2</td>\
             <td>Illegal Contact (Serving)</td>"
        ));
        assert!(html.contains("<td class=\"name\">J (LO)</td><td>21</td>"));
        assert!(html.contains("Position notes: (NI)=No Initial"));

        assert!(html.contains("<h2>Recent penalties</h2>"));
        assert!(html.contains(
            "<td class=\"name\">Derby Dames</td><td>Dee Stroyer</td><td>Cut</td>\
             <td>Not Yet</td><td>2</td><td>1</td><td>0:45</td>"
        ));
        assert!(html.contains("<h2>Roster: Rollin Rebels</h2>"));
        assert!(html.contains("<td class=\"name\">7 Bea Bop</td><td>0</td><td>2</td>"));
    }

    #[test]
    fn single_jam_game_has_no_previous_lineup() {
        let mut game = crate::game::build_from_snapshot(&sample_snapshot()).unwrap();
        game.jams.truncate(1);
        let snapshot = PublishedSnapshot {
            document: serde_json::Value::Null,
            published_at: std::time::SystemTime::UNIX_EPOCH,
            sequence: 1,
            messages_merged: 1,
        };
        let html = game_page(30, &snapshot, &game);
        assert!(html.contains("<h2>Current jam: 1:01</h2>"));
        assert!(!html.contains("Previous jam"));
    }
}
