use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{NewPrediction, Outcome, Prediction, PredictionLabel, TeamRole};
use crate::prediction::{actual_outcome, is_correct};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted(i64),
    /// A prediction for this (fixture, team) pair is already stored.
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LevelStats {
    pub total: usize,
    pub completed: usize,
    pub correct: usize,
}

impl LevelStats {
    /// Share of completed predictions that were correct, in percent.
    pub fn accuracy(&self) -> Option<f64> {
        if self.completed == 0 {
            return None;
        }
        Some(self.correct as f64 * 100.0 / self.completed as f64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionStats {
    pub overall: LevelStats,
    pub by_level: BTreeMap<u8, LevelStats>,
}

impl PredictionStats {
    pub fn pending(&self) -> usize {
        self.overall.total - self.overall.completed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    /// The fixture is finished but one of the scores is missing.
    MissingScore,
    ResultMismatch {
        stored: Outcome,
        actual: Outcome,
    },
    CorrectnessMismatch {
        stored: bool,
        actual: bool,
    },
    CorrectWithoutResult,
    /// The fixture is finished and scored but the prediction has no
    /// correct flag, so it was never resolved.
    Unresolved {
        actual: Outcome,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationIssue {
    pub prediction_id: i64,
    pub fixture_id: u64,
    pub team_name: String,
    pub kind: IssueKind,
}

impl fmt::Display for VerificationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "prediction {} ({}, fixture {}): ",
            self.prediction_id, self.team_name, self.fixture_id
        )?;
        match &self.kind {
            IssueKind::MissingScore => f.write_str("finished fixture has no score"),
            IssueKind::ResultMismatch { stored, actual } => {
                write!(f, "stored result {stored} but match ended {actual}")
            }
            IssueKind::CorrectnessMismatch { stored, actual } => {
                write!(f, "stored correct={stored} but derived correct={actual}")
            }
            IssueKind::CorrectWithoutResult => f.write_str("correct flag set without a result"),
            IssueKind::Unresolved { actual } => {
                write!(f, "match ended {actual} but the prediction was never resolved")
            }
        }
    }
}

const PREDICTION_COLUMNS: &str = "id, team_id, team_name, league_id, league_name, fixture_id, \
     opponent_id, opponent_name, match_date, venue, performance_diff, prediction, \
     prediction_level, result, correct, created_at";

const MATCH_DATE_FORMAT: &str = "%Y-%m-%d";

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn prediction_from_row(row: &Row<'_>) -> rusqlite::Result<Prediction> {
    let match_date: String = row.get(8)?;
    let label: String = row.get(11)?;
    let result: Option<String> = row.get(13)?;
    let correct: Option<i64> = row.get(14)?;

    let match_date = NaiveDate::parse_from_str(&match_date, MATCH_DATE_FORMAT)
        .map_err(|err| conversion_error(8, format!("match_date {match_date:?}: {err}")))?;
    let label = label
        .parse::<PredictionLabel>()
        .map_err(|err| conversion_error(11, err))?;
    let result = result
        .map(|raw| raw.parse::<Outcome>())
        .transpose()
        .map_err(|err| conversion_error(13, err))?;

    Ok(Prediction {
        id: row.get(0)?,
        team_id: row.get(1)?,
        team_name: row.get(2)?,
        league_id: row.get(3)?,
        league_name: row.get(4)?,
        fixture_id: row.get::<_, i64>(5)? as u64,
        opponent_id: row.get(6)?,
        opponent_name: row.get(7)?,
        match_date,
        venue: row.get(9)?,
        performance_diff: row.get(10)?,
        label,
        level: row.get(12)?,
        result,
        correct: correct.map(|v| v != 0),
        created_at: row.get(15)?,
    })
}

fn query_predictions(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Prediction>> {
    let sql = format!("SELECT {PREDICTION_COLUMNS} FROM predictions {filter}");
    let mut stmt = conn.prepare(&sql).context("prepare predictions query")?;
    let rows = stmt
        .query_map(args, prediction_from_row)
        .context("query predictions")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode prediction row")?);
    }
    Ok(out)
}

fn bool_to_i64(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

pub fn save_prediction(conn: &Connection, p: &NewPrediction) -> Result<SaveOutcome> {
    let inserted = conn
        .execute(
            r#"
            INSERT INTO predictions (
                team_id, team_name, league_id, league_name, fixture_id,
                opponent_id, opponent_name, match_date, venue, performance_diff,
                prediction, prediction_level, result, correct, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, NULL, NULL, ?13)
            ON CONFLICT(fixture_id, team_id) DO NOTHING
            "#,
            params![
                p.team_id as i64,
                p.team_name,
                p.league_id as i64,
                p.league_name,
                p.fixture_id as i64,
                p.opponent_id as i64,
                p.opponent_name,
                p.match_date.format(MATCH_DATE_FORMAT).to_string(),
                p.venue,
                p.performance_diff,
                p.label.to_string(),
                p.label.level(),
                Utc::now().to_rfc3339(),
            ],
        )
        .with_context(|| format!("insert prediction {}/{}", p.fixture_id, p.team_id))?;
    if inserted == 0 {
        return Ok(SaveOutcome::AlreadyExists);
    }
    Ok(SaveOutcome::Inserted(conn.last_insert_rowid()))
}

pub fn get_prediction(conn: &Connection, id: i64) -> Result<Option<Prediction>> {
    let sql = format!("SELECT {PREDICTION_COLUMNS} FROM predictions WHERE id = ?1");
    conn.query_row(&sql, params![id], prediction_from_row)
        .optional()
        .with_context(|| format!("load prediction {id}"))
}

/// Newest match first.
pub fn list_predictions(conn: &Connection) -> Result<Vec<Prediction>> {
    query_predictions(conn, "ORDER BY match_date DESC, id DESC", [])
}

pub fn pending_predictions(conn: &Connection) -> Result<Vec<Prediction>> {
    query_predictions(
        conn,
        "WHERE result IS NULL ORDER BY match_date ASC, id ASC",
        [],
    )
}

pub fn completed_predictions(conn: &Connection) -> Result<Vec<Prediction>> {
    query_predictions(
        conn,
        "WHERE result IS NOT NULL ORDER BY match_date DESC, id DESC",
        [],
    )
}

/// Unresolved predictions for matches dated before `today`.
pub fn predictions_to_check(conn: &Connection, today: NaiveDate) -> Result<Vec<Prediction>> {
    query_predictions(
        conn,
        "WHERE result IS NULL AND match_date < ?1 ORDER BY match_date ASC, id ASC",
        params![today.format(MATCH_DATE_FORMAT).to_string()],
    )
}

/// Overperforming teams, largest diff first.
pub fn form_changes(conn: &Connection) -> Result<Vec<Prediction>> {
    query_predictions(
        conn,
        "WHERE performance_diff > 0 ORDER BY performance_diff DESC, id ASC",
        [],
    )
}

/// Stores the result of a prediction. Returns false when a result was
/// already recorded; the first recorded result is kept.
pub fn record_result(
    conn: &Connection,
    prediction_id: i64,
    result: Outcome,
    correct: bool,
) -> Result<bool> {
    let updated = conn
        .execute(
            "UPDATE predictions SET result = ?1, correct = ?2 WHERE id = ?3 AND result IS NULL",
            params![result.as_str(), bool_to_i64(correct), prediction_id],
        )
        .with_context(|| format!("record result of prediction {prediction_id}"))?;
    Ok(updated > 0)
}

struct FixtureCheck {
    prediction: Prediction,
    role: Option<TeamRole>,
    score: Option<(i32, i32)>,
}

/// Predictions joined with their stored fixture when that fixture is finished.
fn completed_fixture_checks(conn: &Connection, only: Option<i64>) -> Result<Vec<FixtureCheck>> {
    let columns = PREDICTION_COLUMNS
        .split(", ")
        .map(|c| format!("p.{}", c.trim()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {columns}, f.home_team_id, f.away_team_id, f.home_score, f.away_score
         FROM predictions p JOIN fixtures f ON f.id = p.fixture_id
         WHERE f.status IN ('FT', 'AET', 'PEN') AND (?1 IS NULL OR p.id = ?1)
         ORDER BY p.id ASC"
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("prepare prediction verification query")?;
    let rows = stmt
        .query_map(params![only], |row| {
            let prediction = prediction_from_row(row)?;
            let home_id: u32 = row.get(16)?;
            let away_id: u32 = row.get(17)?;
            let home: Option<i32> = row.get(18)?;
            let away: Option<i32> = row.get(19)?;
            let role = if prediction.team_id == home_id {
                Some(TeamRole::Home)
            } else if prediction.team_id == away_id {
                Some(TeamRole::Away)
            } else {
                None
            };
            Ok(FixtureCheck {
                prediction,
                role,
                score: home.zip(away),
            })
        })
        .context("query prediction verification")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode prediction verification row")?);
    }
    Ok(out)
}

/// Compares stored results against finished fixtures. Issues are logged and
/// returned; nothing is modified.
pub fn verify_all_prediction_results(conn: &Connection) -> Result<Vec<VerificationIssue>> {
    let mut issues = Vec::new();
    for check in completed_fixture_checks(conn, None)? {
        let p = &check.prediction;
        let issue = |kind| VerificationIssue {
            prediction_id: p.id,
            fixture_id: p.fixture_id,
            team_name: p.team_name.clone(),
            kind,
        };

        if p.result.is_none() && p.correct.is_some() {
            issues.push(issue(IssueKind::CorrectWithoutResult));
        }
        let (Some((home, away)), Some(role)) = (check.score, check.role) else {
            if check.score.is_none() {
                issues.push(issue(IssueKind::MissingScore));
            }
            continue;
        };
        let actual = actual_outcome(home, away, role);
        match (p.result, p.correct) {
            (Some(stored), _) if stored != actual => {
                issues.push(issue(IssueKind::ResultMismatch { stored, actual }));
            }
            (_, None) => issues.push(issue(IssueKind::Unresolved { actual })),
            _ => {}
        }
        let derived = is_correct(p.label, actual);
        if let Some(stored) = p.correct
            && stored != derived
        {
            issues.push(issue(IssueKind::CorrectnessMismatch {
                stored,
                actual: derived,
            }));
        }
    }
    for issue in &issues {
        warn!(%issue, "prediction verification issue");
    }
    info!(issues = issues.len(), "prediction verification finished");
    Ok(issues)
}

/// Recomputes result and correctness from finished fixtures, either for one
/// prediction or for all of them. Returns how many rows changed.
pub fn update_prediction_correctness(conn: &mut Connection, only: Option<i64>) -> Result<usize> {
    let checks = completed_fixture_checks(conn, only)?;
    let tx = conn
        .transaction()
        .context("begin correctness transaction")?;
    let mut changed = 0usize;
    for check in checks {
        let (Some((home, away)), Some(role)) = (check.score, check.role) else {
            continue;
        };
        let p = &check.prediction;
        let actual = actual_outcome(home, away, role);
        let correct = is_correct(p.label, actual);
        if p.result == Some(actual) && p.correct == Some(correct) {
            continue;
        }
        tx.execute(
            "UPDATE predictions SET result = ?1, correct = ?2 WHERE id = ?3",
            params![actual.as_str(), bool_to_i64(correct), p.id],
        )
        .with_context(|| format!("update correctness of prediction {}", p.id))?;
        changed += 1;
    }
    tx.commit().context("commit correctness transaction")?;
    info!(changed, "prediction correctness updated");
    Ok(changed)
}

pub fn prediction_stats(conn: &Connection) -> Result<PredictionStats> {
    let mut stmt = conn
        .prepare(
            "SELECT prediction_level,
                    COUNT(*),
                    SUM(CASE WHEN result IS NOT NULL THEN 1 ELSE 0 END),
                    SUM(CASE WHEN correct = 1 THEN 1 ELSE 0 END)
             FROM predictions GROUP BY prediction_level ORDER BY prediction_level",
        )
        .context("prepare prediction stats query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, u8>(0)?,
                LevelStats {
                    total: row.get::<_, i64>(1)? as usize,
                    completed: row.get::<_, i64>(2)? as usize,
                    correct: row.get::<_, i64>(3)? as usize,
                },
            ))
        })
        .context("query prediction stats")?;

    let mut stats = PredictionStats::default();
    for row in rows {
        let (level, level_stats) = row.context("decode prediction stats row")?;
        stats.overall.total += level_stats.total;
        stats.overall.completed += level_stats.completed;
        stats.overall.correct += level_stats.correct;
        stats.by_level.insert(level, level_stats);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::LevelStats;

    #[test]
    fn accuracy_needs_completed_predictions() {
        let empty = LevelStats::default();
        assert_eq!(empty.accuracy(), None);

        let some = LevelStats {
            total: 5,
            completed: 4,
            correct: 3,
        };
        assert_eq!(some.accuracy(), Some(75.0));
    }
}
