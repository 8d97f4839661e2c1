use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::SettingsOverrides;
use crate::model::{Fixture, FixtureStatus, Player, Standing, Team};

pub const SETTING_LEVEL1: &str = "prediction_threshold_level1";
pub const SETTING_LEVEL2: &str = "prediction_threshold_level2";
pub const SETTING_FORM_LENGTH: &str = "form_length";
pub const SETTING_LEAGUES: &str = "leagues";

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL,
            team_name TEXT NOT NULL,
            league_id INTEGER NOT NULL,
            league_name TEXT NOT NULL,
            fixture_id INTEGER NOT NULL,
            opponent_id INTEGER NOT NULL,
            opponent_name TEXT NOT NULL,
            match_date TEXT NOT NULL,
            venue TEXT NULL,
            performance_diff REAL NOT NULL,
            prediction TEXT NOT NULL,
            prediction_level INTEGER NOT NULL,
            result TEXT NULL,
            correct INTEGER NULL,
            created_at TEXT NOT NULL,
            UNIQUE(fixture_id, team_id)
        );
        CREATE INDEX IF NOT EXISTS idx_predictions_match_date ON predictions(match_date);

        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS fixtures (
            id INTEGER PRIMARY KEY,
            league_id INTEGER NOT NULL,
            season INTEGER NULL,
            round TEXT NULL,
            home_team_id INTEGER NOT NULL,
            home_team_name TEXT NOT NULL,
            away_team_id INTEGER NOT NULL,
            away_team_name TEXT NOT NULL,
            kickoff TEXT NOT NULL,
            match_date TEXT NOT NULL,
            venue TEXT NULL,
            status TEXT NOT NULL,
            home_score INTEGER NULL,
            away_score INTEGER NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_fixtures_league ON fixtures(league_id);
        CREATE INDEX IF NOT EXISTS idx_fixtures_kickoff ON fixtures(kickoff);

        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            league_id INTEGER NOT NULL,
            country TEXT NULL,
            founded INTEGER NULL,
            stadium TEXT NULL,
            capacity INTEGER NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            team_id INTEGER NOT NULL,
            position TEXT NULL,
            age INTEGER NULL,
            nationality TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS standings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            league_id INTEGER NOT NULL,
            team_id INTEGER NOT NULL,
            team_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            played INTEGER NOT NULL,
            won INTEGER NOT NULL,
            drawn INTEGER NOT NULL,
            lost INTEGER NOT NULL,
            goals_for INTEGER NOT NULL,
            goals_against INTEGER NOT NULL,
            goal_diff INTEGER NOT NULL,
            points INTEGER NOT NULL,
            form TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(league_id, team_id)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

// fixtures

pub fn upsert_fixture(conn: &Connection, f: &Fixture) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO fixtures (
            id, league_id, season, round,
            home_team_id, home_team_name, away_team_id, away_team_name,
            kickoff, match_date, venue, status, home_score, away_score,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8,
            ?9, ?10, ?11, ?12, ?13, ?14,
            ?15, ?15
        )
        ON CONFLICT(id) DO UPDATE SET
            league_id = excluded.league_id,
            season = excluded.season,
            round = excluded.round,
            home_team_id = excluded.home_team_id,
            home_team_name = excluded.home_team_name,
            away_team_id = excluded.away_team_id,
            away_team_name = excluded.away_team_name,
            kickoff = excluded.kickoff,
            match_date = excluded.match_date,
            venue = excluded.venue,
            status = excluded.status,
            home_score = excluded.home_score,
            away_score = excluded.away_score,
            updated_at = excluded.updated_at
        "#,
        params![
            f.id as i64,
            f.league_id as i64,
            f.season,
            f.round,
            f.home_team_id as i64,
            f.home_team_name,
            f.away_team_id as i64,
            f.away_team_name,
            f.kickoff.to_rfc3339(),
            f.match_date().to_string(),
            f.venue,
            f.status.short_code(),
            f.home_goals,
            f.away_goals,
            now,
        ],
    )
    .with_context(|| format!("upsert fixture {}", f.id))?;
    Ok(())
}

pub fn upsert_fixtures(conn: &mut Connection, fixtures: &[Fixture]) -> Result<usize> {
    let tx = conn.transaction().context("begin fixtures transaction")?;
    for f in fixtures {
        upsert_fixture(&tx, f)?;
    }
    tx.commit().context("commit fixtures transaction")?;
    Ok(fixtures.len())
}

const FIXTURE_COLUMNS: &str = "id, league_id, season, round, home_team_id, home_team_name, \
     away_team_id, away_team_name, kickoff, venue, status, home_score, away_score";

fn fixture_from_row(row: &Row<'_>) -> rusqlite::Result<Fixture> {
    let kickoff: String = row.get(8)?;
    let status: String = row.get(10)?;
    Ok(Fixture {
        id: row.get::<_, i64>(0)? as u64,
        league_id: row.get(1)?,
        season: row.get(2)?,
        round: row.get(3)?,
        home_team_id: row.get(4)?,
        home_team_name: row.get(5)?,
        away_team_id: row.get(6)?,
        away_team_name: row.get(7)?,
        kickoff: parse_timestamp(8, &kickoff)?,
        venue: row.get(9)?,
        status: FixtureStatus::from_short(&status),
        home_goals: row.get(11)?,
        away_goals: row.get(12)?,
    })
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub fn get_fixture(conn: &Connection, fixture_id: u64) -> Result<Option<Fixture>> {
    let sql = format!("SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE id = ?1");
    conn.query_row(&sql, params![fixture_id as i64], fixture_from_row)
        .optional()
        .with_context(|| format!("load fixture {fixture_id}"))
}

pub fn fixtures_by_league(conn: &Connection, league_id: u32) -> Result<Vec<Fixture>> {
    let sql = format!(
        "SELECT {FIXTURE_COLUMNS} FROM fixtures WHERE league_id = ?1 ORDER BY kickoff DESC, id DESC"
    );
    query_fixtures(conn, &sql, params![league_id as i64])
}

/// Not-started fixtures, soonest first, optionally for one team.
pub fn upcoming_fixtures(conn: &Connection, team_id: Option<u32>) -> Result<Vec<Fixture>> {
    let sql = format!(
        "SELECT {FIXTURE_COLUMNS} FROM fixtures
         WHERE status IN ('NS', 'TBD') AND (?1 IS NULL OR home_team_id = ?1 OR away_team_id = ?1)
         ORDER BY kickoff ASC, id ASC"
    );
    query_fixtures(conn, &sql, params![team_id.map(i64::from)])
}

/// Completed fixtures, most recent first, optionally for one team.
pub fn completed_fixtures(conn: &Connection, team_id: Option<u32>) -> Result<Vec<Fixture>> {
    let sql = format!(
        "SELECT {FIXTURE_COLUMNS} FROM fixtures
         WHERE status IN ('FT', 'AET', 'PEN') AND (?1 IS NULL OR home_team_id = ?1 OR away_team_id = ?1)
         ORDER BY kickoff DESC, id DESC"
    );
    query_fixtures(conn, &sql, params![team_id.map(i64::from)])
}

fn query_fixtures(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Fixture>> {
    let mut stmt = conn.prepare(sql).context("prepare fixtures query")?;
    let rows = stmt
        .query_map(args, fixture_from_row)
        .context("query fixtures")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode fixture row")?);
    }
    Ok(out)
}

pub fn update_fixture_score(
    conn: &Connection,
    fixture_id: u64,
    home_goals: i32,
    away_goals: i32,
    status: &FixtureStatus,
) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE fixtures SET home_score = ?1, away_score = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                home_goals,
                away_goals,
                status.short_code(),
                Utc::now().to_rfc3339(),
                fixture_id as i64
            ],
        )
        .with_context(|| format!("update score of fixture {fixture_id}"))?;
    Ok(changed > 0)
}

// teams, players, standings

pub fn upsert_teams(conn: &mut Connection, teams: &[Team]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin teams transaction")?;
    for t in teams {
        tx.execute(
            r#"
            INSERT INTO teams (id, name, league_id, country, founded, stadium, capacity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                league_id = excluded.league_id,
                country = excluded.country,
                founded = excluded.founded,
                stadium = excluded.stadium,
                capacity = excluded.capacity,
                updated_at = excluded.updated_at
            "#,
            params![
                t.id as i64,
                t.name,
                t.league_id as i64,
                t.country,
                t.founded,
                t.venue_name,
                t.venue_capacity,
                now
            ],
        )
        .with_context(|| format!("upsert team {}", t.id))?;
    }
    tx.commit().context("commit teams transaction")?;
    Ok(teams.len())
}

pub fn load_teams(conn: &Connection, league_id: Option<u32>) -> Result<Vec<Team>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, league_id, country, founded, stadium, capacity FROM teams
             WHERE ?1 IS NULL OR league_id = ?1 ORDER BY name ASC",
        )
        .context("prepare teams query")?;
    let rows = stmt
        .query_map(params![league_id.map(i64::from)], |row| {
            Ok(Team {
                id: row.get(0)?,
                name: row.get(1)?,
                league_id: row.get(2)?,
                country: row.get(3)?,
                founded: row.get(4)?,
                venue_name: row.get(5)?,
                venue_capacity: row.get(6)?,
            })
        })
        .context("query teams")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode team row")?);
    }
    Ok(out)
}

pub fn upsert_players(conn: &mut Connection, players: &[Player]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin players transaction")?;
    for p in players {
        tx.execute(
            r#"
            INSERT INTO players (id, name, team_id, position, age, nationality, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                team_id = excluded.team_id,
                position = COALESCE(excluded.position, players.position),
                age = COALESCE(excluded.age, players.age),
                nationality = COALESCE(excluded.nationality, players.nationality),
                updated_at = excluded.updated_at
            "#,
            params![
                p.id as i64,
                p.name,
                p.team_id as i64,
                p.position,
                p.age,
                p.nationality,
                now
            ],
        )
        .with_context(|| format!("upsert player {}", p.id))?;
    }
    tx.commit().context("commit players transaction")?;
    Ok(players.len())
}

pub fn load_players(conn: &Connection, team_id: u32) -> Result<Vec<Player>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, team_id, position, age, nationality FROM players
             WHERE team_id = ?1 ORDER BY name ASC",
        )
        .context("prepare players query")?;
    let rows = stmt
        .query_map(params![team_id as i64], |row| {
            Ok(Player {
                id: row.get(0)?,
                name: row.get(1)?,
                team_id: row.get(2)?,
                position: row.get(3)?,
                age: row.get(4)?,
                nationality: row.get(5)?,
            })
        })
        .context("query players")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode player row")?);
    }
    Ok(out)
}

pub fn upsert_standings(conn: &mut Connection, standings: &[Standing]) -> Result<usize> {
    let now = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin standings transaction")?;
    for s in standings {
        tx.execute(
            r#"
            INSERT INTO standings (
                league_id, team_id, team_name, position, played, won, drawn, lost,
                goals_for, goals_against, goal_diff, points, form, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            ON CONFLICT(league_id, team_id) DO UPDATE SET
                team_name = excluded.team_name,
                position = excluded.position,
                played = excluded.played,
                won = excluded.won,
                drawn = excluded.drawn,
                lost = excluded.lost,
                goals_for = excluded.goals_for,
                goals_against = excluded.goals_against,
                goal_diff = excluded.goal_diff,
                points = excluded.points,
                form = excluded.form,
                updated_at = excluded.updated_at
            "#,
            params![
                s.league_id as i64,
                s.team_id as i64,
                s.team_name,
                s.rank,
                s.played,
                s.won,
                s.drawn,
                s.lost,
                s.goals_for,
                s.goals_against,
                s.goal_diff,
                s.points,
                s.form,
                now
            ],
        )
        .with_context(|| format!("upsert standing {}/{}", s.league_id, s.team_id))?;
    }
    tx.commit().context("commit standings transaction")?;
    Ok(standings.len())
}

pub fn load_standings(conn: &Connection, league_id: u32) -> Result<Vec<Standing>> {
    let mut stmt = conn
        .prepare(
            "SELECT league_id, team_id, team_name, position, played, won, drawn, lost,
                    goals_for, goals_against, goal_diff, points, form
             FROM standings WHERE league_id = ?1 ORDER BY position ASC",
        )
        .context("prepare standings query")?;
    let rows = stmt
        .query_map(params![league_id as i64], |row| {
            Ok(Standing {
                league_id: row.get(0)?,
                team_id: row.get(1)?,
                team_name: row.get(2)?,
                rank: row.get(3)?,
                played: row.get(4)?,
                won: row.get(5)?,
                drawn: row.get(6)?,
                lost: row.get(7)?,
                goals_for: row.get(8)?,
                goals_against: row.get(9)?,
                goal_diff: row.get(10)?,
                points: row.get(11)?,
                form: row.get(12)?,
            })
        })
        .context("query standings")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode standing row")?);
    }
    Ok(out)
}

// settings

pub fn get_setting<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    let raw = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .with_context(|| format!("load setting {key}"))?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let value =
        serde_json::from_str(&raw).with_context(|| format!("decode setting {key}: {raw}"))?;
    Ok(Some(value))
}

pub fn set_setting<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value).with_context(|| format!("encode setting {key}"))?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, raw],
    )
    .with_context(|| format!("store setting {key}"))?;
    Ok(())
}

pub fn delete_setting(conn: &Connection, key: &str) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM settings WHERE key = ?1", params![key])
        .with_context(|| format!("delete setting {key}"))?;
    Ok(removed > 0)
}

pub fn load_overrides(conn: &Connection) -> Result<SettingsOverrides> {
    Ok(SettingsOverrides {
        level1: get_setting(conn, SETTING_LEVEL1)?,
        level2: get_setting(conn, SETTING_LEVEL2)?,
        form_length: get_setting(conn, SETTING_FORM_LENGTH)?,
        leagues: get_setting(conn, SETTING_LEAGUES)?,
    })
}

pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>> {
    let mut out = Vec::new();
    for table in ["fixtures", "teams", "players", "standings", "predictions", "settings"] {
        let count = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .with_context(|| format!("count {table}"))?;
        out.push((table, count));
    }
    Ok(out)
}
