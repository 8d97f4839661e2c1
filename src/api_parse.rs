//! Boundary parsing of API-Football v3 payloads into typed records.
//!
//! Every endpoint wraps its data in `{"errors": .., "paging": .., "response": ..}`.
//! Items missing required keys (ids, team names, kickoff) are dropped with a
//! debug log rather than failing the whole page.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::model::{Fixture, FixtureStatus, Player, Standing, Team};

#[derive(Debug, Deserialize)]
struct WireFixtureItem {
    fixture: WireFixture,
    league: WireLeagueRef,
    teams: WireTeams,
    #[serde(default)]
    goals: WireGoals,
}

#[derive(Debug, Deserialize)]
struct WireFixture {
    id: u64,
    date: Option<String>,
    timestamp: Option<i64>,
    #[serde(default)]
    venue: Option<WireVenueRef>,
    status: WireStatus,
}

#[derive(Debug, Deserialize)]
struct WireVenueRef {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    short: String,
}

#[derive(Debug, Deserialize)]
struct WireLeagueRef {
    id: u32,
    season: Option<i32>,
    round: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTeams {
    home: WireTeamRef,
    away: WireTeamRef,
}

#[derive(Debug, Deserialize)]
struct WireTeamRef {
    id: u32,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireGoals {
    home: Option<i32>,
    away: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireStandingsItem {
    league: WireStandingsLeague,
}

#[derive(Debug, Deserialize)]
struct WireStandingsLeague {
    id: u32,
    #[serde(default)]
    standings: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct WireStandingRow {
    rank: u32,
    team: WireTeamRef,
    points: i32,
    #[serde(rename = "goalsDiff", default)]
    goals_diff: i32,
    form: Option<String>,
    all: WireRecord,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    played: Option<u32>,
    win: Option<u32>,
    draw: Option<u32>,
    lose: Option<u32>,
    goals: WireGoalsForAgainst,
}

#[derive(Debug, Deserialize)]
struct WireGoalsForAgainst {
    #[serde(rename = "for")]
    goals_for: Option<i32>,
    against: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireTeamItem {
    team: WireTeamInfo,
    #[serde(default)]
    venue: Option<WireVenueInfo>,
}

#[derive(Debug, Deserialize)]
struct WireTeamInfo {
    id: u32,
    name: String,
    country: Option<String>,
    founded: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct WireVenueInfo {
    name: Option<String>,
    capacity: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WirePlayerItem {
    player: WirePlayerInfo,
    #[serde(default)]
    statistics: Vec<WirePlayerStats>,
}

#[derive(Debug, Deserialize)]
struct WirePlayerInfo {
    id: u32,
    name: String,
    age: Option<u32>,
    nationality: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePlayerStats {
    team: Option<WireTeamId>,
    #[serde(default)]
    games: Option<WireGames>,
}

#[derive(Debug, Deserialize)]
struct WireTeamId {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct WireGames {
    position: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireSquadItem {
    team: WireTeamId,
    #[serde(default)]
    players: Vec<WireSquadPlayer>,
}

#[derive(Debug, Deserialize)]
struct WireSquadPlayer {
    id: u32,
    name: String,
    age: Option<u32>,
    position: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamStatistics {
    pub team_id: u32,
    pub league_id: u32,
    pub form: String,
    pub played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub clean_sheets: u32,
    pub failed_to_score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub current: u32,
    pub total: u32,
}

pub fn parse_body(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed).context("invalid api json")
}

/// Non-empty `errors` member, flattened to one message.
pub fn api_errors(body: &Value) -> Option<String> {
    let errors = body.get("errors")?;
    let message = match errors {
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(map) if !map.is_empty() => map
            .iter()
            .map(|(k, v)| format!("{k}: {}", value_to_text(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        _ => return None,
    };
    Some(message)
}

pub fn paging(body: &Value) -> Paging {
    let page = |key: &str| {
        body.get("paging")
            .and_then(|p| p.get(key))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1)
    };
    Paging {
        current: page("current"),
        total: page("total"),
    }
}

fn response_items(body: &Value) -> &[Value] {
    body.get("response")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn parse_fixtures(body: &Value) -> Vec<Fixture> {
    response_items(body)
        .iter()
        .filter_map(|item| match WireFixtureItem::deserialize(item) {
            Ok(wire) => fixture_from_wire(wire),
            Err(err) => {
                debug!(error = %err, "skipping malformed fixture");
                None
            }
        })
        .collect()
}

fn fixture_from_wire(wire: WireFixtureItem) -> Option<Fixture> {
    let kickoff = parse_kickoff(wire.fixture.date.as_deref(), wire.fixture.timestamp)?;
    Some(Fixture {
        id: wire.fixture.id,
        league_id: wire.league.id,
        season: wire.league.season,
        round: wire.league.round,
        home_team_id: wire.teams.home.id,
        home_team_name: wire.teams.home.name,
        away_team_id: wire.teams.away.id,
        away_team_name: wire.teams.away.name,
        kickoff,
        venue: wire
            .fixture
            .venue
            .and_then(|v| v.name)
            .filter(|n| !n.trim().is_empty()),
        status: FixtureStatus::from_short(&wire.fixture.status.short),
        home_goals: wire.goals.home,
        away_goals: wire.goals.away,
    })
}

pub fn parse_kickoff(date: Option<&str>, timestamp: Option<i64>) -> Option<DateTime<Utc>> {
    if let Some(parsed) = date.and_then(|d| DateTime::parse_from_rfc3339(d.trim()).ok()) {
        return Some(parsed.with_timezone(&Utc));
    }
    timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0))
}

/// Rows of the first standings group (the main table) of each league.
pub fn parse_standings(body: &Value) -> Vec<Standing> {
    let mut out = Vec::new();
    for item in response_items(body) {
        let wire = match WireStandingsItem::deserialize(item) {
            Ok(wire) => wire,
            Err(err) => {
                debug!(error = %err, "skipping malformed standings block");
                continue;
            }
        };
        let league_id = wire.league.id;
        let Some(group) = wire.league.standings.into_iter().next() else {
            continue;
        };
        for row in &group {
            match WireStandingRow::deserialize(row) {
                Ok(row) => out.push(standing_from_wire(league_id, row)),
                Err(err) => debug!(error = %err, league_id, "skipping malformed standing row"),
            }
        }
    }
    out
}

fn standing_from_wire(league_id: u32, row: WireStandingRow) -> Standing {
    Standing {
        league_id,
        team_id: row.team.id,
        team_name: row.team.name,
        rank: row.rank,
        played: row.all.played.unwrap_or(0),
        won: row.all.win.unwrap_or(0),
        drawn: row.all.draw.unwrap_or(0),
        lost: row.all.lose.unwrap_or(0),
        goals_for: row.all.goals.goals_for.unwrap_or(0),
        goals_against: row.all.goals.against.unwrap_or(0),
        goal_diff: row.goals_diff,
        points: row.points,
        form: row.form.filter(|f| !f.trim().is_empty()),
    }
}

pub fn parse_teams(body: &Value, league_id: u32) -> Vec<Team> {
    response_items(body)
        .iter()
        .filter_map(|item| match WireTeamItem::deserialize(item) {
            Ok(wire) => Some(Team {
                id: wire.team.id,
                name: wire.team.name,
                league_id,
                country: wire.team.country,
                founded: wire.team.founded,
                venue_name: wire.venue.as_ref().and_then(|v| v.name.clone()),
                venue_capacity: wire.venue.as_ref().and_then(|v| v.capacity),
            }),
            Err(err) => {
                debug!(error = %err, "skipping malformed team");
                None
            }
        })
        .collect()
}

/// Players from `/players`; the team comes from the first statistics block.
pub fn parse_players(body: &Value) -> Vec<Player> {
    response_items(body)
        .iter()
        .filter_map(|item| match WirePlayerItem::deserialize(item) {
            Ok(wire) => {
                let stats = wire.statistics.into_iter().next();
                let team_id = stats.as_ref().and_then(|s| s.team.as_ref()).map(|t| t.id)?;
                let position = stats.and_then(|s| s.games).and_then(|g| g.position);
                Some(Player {
                    id: wire.player.id,
                    name: wire.player.name,
                    team_id,
                    position,
                    age: wire.player.age,
                    nationality: wire.player.nationality,
                })
            }
            Err(err) => {
                debug!(error = %err, "skipping malformed player");
                None
            }
        })
        .collect()
}

pub fn parse_squad(body: &Value) -> Vec<Player> {
    let mut out = Vec::new();
    for item in response_items(body) {
        let wire = match WireSquadItem::deserialize(item) {
            Ok(wire) => wire,
            Err(err) => {
                debug!(error = %err, "skipping malformed squad");
                continue;
            }
        };
        out.extend(wire.players.into_iter().map(|p| Player {
            id: p.id,
            name: p.name,
            team_id: wire.team.id,
            position: p.position,
            age: p.age,
            nationality: None,
        }));
    }
    out
}

/// `/teams/statistics` returns a single object rather than a list.
pub fn parse_team_statistics(body: &Value) -> Option<TeamStatistics> {
    let data = body.get("response").filter(|v| v.is_object())?;
    let total = |path: &[&str]| -> Option<i64> {
        let mut cur = data;
        for key in path {
            cur = cur.get(*key)?;
        }
        cur.as_i64()
    };
    let as_u32 = |v: Option<i64>| v.and_then(|n| u32::try_from(n).ok()).unwrap_or(0);
    let as_i32 = |v: Option<i64>| v.and_then(|n| i32::try_from(n).ok()).unwrap_or(0);

    Some(TeamStatistics {
        team_id: as_u32(total(&["team", "id"])),
        league_id: as_u32(total(&["league", "id"])),
        form: data
            .get("form")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        played: as_u32(total(&["fixtures", "played", "total"])),
        wins: as_u32(total(&["fixtures", "wins", "total"])),
        draws: as_u32(total(&["fixtures", "draws", "total"])),
        losses: as_u32(total(&["fixtures", "loses", "total"])),
        goals_for: as_i32(total(&["goals", "for", "total", "total"])),
        goals_against: as_i32(total(&["goals", "against", "total", "total"])),
        clean_sheets: as_u32(total(&["clean_sheet", "total"])),
        failed_to_score: as_u32(total(&["failed_to_score", "total"])),
    })
}

/// Fixtures of the earliest round present, keeping response order.
pub fn first_round(fixtures: Vec<Fixture>) -> Vec<Fixture> {
    let Some(round) = fixtures.first().map(|f| f.round.clone()) else {
        return Vec::new();
    };
    fixtures.into_iter().filter(|f| f.round == round).collect()
}

fn value_to_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<Fixture>> {
    Ok(parse_fixtures(&parse_body(raw)?))
}

pub fn parse_standings_json(raw: &str) -> Result<Vec<Standing>> {
    Ok(parse_standings(&parse_body(raw)?))
}
