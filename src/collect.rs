use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::api_client::FootballApi;
use crate::db;
use crate::model::{Fixture, NewPrediction};
use crate::prediction::{Thresholds, actual_outcome, generate, is_correct};
use crate::prediction_store::{self, SaveOutcome};
use crate::team_report::TeamFormReport;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CollectSummary {
    pub saved: usize,
    pub existing: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CheckSummary {
    pub checked: usize,
    pub resolved: usize,
    pub pending: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct IngestSummary {
    pub league_id: u32,
    pub fixtures: usize,
    pub teams: usize,
    pub standings: usize,
    pub players: usize,
    pub errors: Vec<String>,
}

/// Earliest not-started fixture of the team kicking off at or after `now`.
pub fn next_fixture<'a>(
    fixtures: &'a [Fixture],
    team_id: u32,
    now: DateTime<Utc>,
) -> Option<&'a Fixture> {
    fixtures
        .iter()
        .filter(|f| f.involves(team_id) && f.status.is_upcoming() && f.kickoff >= now)
        .min_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.id.cmp(&b.id)))
}

/// The prediction a report implies for `fixture`, if the deviation is large
/// enough for the side the team plays on.
pub fn plan_prediction(
    report: &TeamFormReport,
    fixture: &Fixture,
    thresholds: &Thresholds,
) -> Option<NewPrediction> {
    let role = fixture.role_of(report.team_id)?;
    let (opponent_id, opponent_name) = fixture.opponent_of(report.team_id)?;
    let signal = generate(report.season_ppg, report.form_ppg, role, thresholds)?;
    Some(NewPrediction {
        team_id: report.team_id,
        team_name: report.team_name.clone(),
        league_id: report.league_id,
        league_name: report.league_name.clone(),
        fixture_id: fixture.id,
        opponent_id,
        opponent_name: opponent_name.to_string(),
        match_date: fixture.match_date(),
        venue: fixture.venue.clone(),
        performance_diff: signal.performance_diff,
        label: signal.label,
    })
}

/// Stores a prediction for each report's next fixture. The fixture itself
/// is upserted first so results can be checked against it later.
pub fn store_predictions(
    conn: &Connection,
    reports: &[TeamFormReport],
    fixtures_for: impl Fn(&TeamFormReport) -> Result<Vec<Fixture>>,
    thresholds: &Thresholds,
    now: DateTime<Utc>,
) -> CollectSummary {
    let mut summary = CollectSummary::default();
    for report in reports {
        let fixtures = match fixtures_for(report) {
            Ok(fixtures) => fixtures,
            Err(err) => {
                warn!(team_id = report.team_id, error = %err, "fixtures unavailable");
                summary
                    .errors
                    .push(format!("{} fixtures: {err:#}", report.team_name));
                continue;
            }
        };
        let Some(fixture) = next_fixture(&fixtures, report.team_id, now) else {
            debug!(team_id = report.team_id, "no upcoming fixture");
            summary.skipped += 1;
            continue;
        };
        let Some(prediction) = plan_prediction(report, fixture, thresholds) else {
            summary.skipped += 1;
            continue;
        };

        let stored = db::upsert_fixture(conn, fixture)
            .and_then(|_| prediction_store::save_prediction(conn, &prediction));
        match stored {
            Ok(SaveOutcome::Inserted(id)) => {
                info!(
                    id,
                    team = %prediction.team_name,
                    fixture_id = prediction.fixture_id,
                    label = %prediction.label,
                    "prediction saved"
                );
                summary.saved += 1;
            }
            Ok(SaveOutcome::AlreadyExists) => summary.existing += 1,
            Err(err) => {
                warn!(fixture_id = fixture.id, error = %err, "failed to store prediction");
                summary.errors.push(format!(
                    "{} vs {}: {err:#}",
                    prediction.team_name, prediction.opponent_name
                ));
            }
        }
    }
    summary
}

pub fn collect_predictions(
    conn: &Connection,
    api: &FootballApi,
    reports: &[TeamFormReport],
    season: i32,
    thresholds: &Thresholds,
) -> CollectSummary {
    store_predictions(
        conn,
        reports,
        |report| Ok(api.fetch_fixtures(report.league_id, season, None)?),
        thresholds,
        Utc::now(),
    )
}

/// Resolves predictions for matches dated before `today` using the given
/// fixture lookup.
pub fn resolve_results(
    conn: &Connection,
    today: NaiveDate,
    fixture_by_id: impl Fn(u64) -> Result<Fixture>,
) -> Result<CheckSummary> {
    let mut summary = CheckSummary::default();
    for prediction in prediction_store::predictions_to_check(conn, today)? {
        summary.checked += 1;
        let fixture = match fixture_by_id(prediction.fixture_id) {
            Ok(fixture) => fixture,
            Err(err) => {
                warn!(fixture_id = prediction.fixture_id, error = %err, "fixture lookup failed");
                summary
                    .errors
                    .push(format!("fixture {}: {err:#}", prediction.fixture_id));
                summary.pending += 1;
                continue;
            }
        };
        if let Err(err) = db::upsert_fixture(conn, &fixture) {
            warn!(fixture_id = fixture.id, error = %err, "failed to store fixture");
            summary.errors.push(format!("fixture {}: {err:#}", fixture.id));
            summary.pending += 1;
            continue;
        }

        let (Some((home, away)), Some(role)) =
            (fixture.final_score(), fixture.role_of(prediction.team_id))
        else {
            summary.pending += 1;
            continue;
        };
        let actual = actual_outcome(home, away, role);
        let correct = is_correct(prediction.label, actual);
        match prediction_store::record_result(conn, prediction.id, actual, correct) {
            Ok(true) => {
                info!(
                    id = prediction.id,
                    team = %prediction.team_name,
                    predicted = %prediction.label,
                    %actual,
                    correct,
                    "prediction resolved"
                );
                summary.resolved += 1;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(id = prediction.id, error = %err, "failed to record result");
                summary
                    .errors
                    .push(format!("prediction {}: {err:#}", prediction.id));
                summary.pending += 1;
            }
        }
    }
    Ok(summary)
}

pub fn check_results(conn: &Connection, api: &FootballApi) -> Result<CheckSummary> {
    resolve_results(conn, Utc::now().date_naive(), |id| Ok(api.fetch_fixture(id)?))
}

/// Pulls fixtures, teams, standings and players of one league into the
/// database. Each dataset fails independently.
pub fn ingest_league(
    conn: &mut Connection,
    api: &FootballApi,
    league_id: u32,
    season: i32,
    max_player_pages: u32,
) -> IngestSummary {
    let mut summary = IngestSummary {
        league_id,
        ..IngestSummary::default()
    };

    match api
        .fetch_fixtures(league_id, season, None)
        .map_err(anyhow::Error::from)
        .and_then(|rows| db::upsert_fixtures(conn, &rows))
    {
        Ok(n) => summary.fixtures = n,
        Err(err) => summary.errors.push(format!("fixtures: {err:#}")),
    }
    match api
        .fetch_teams(league_id, season)
        .map_err(anyhow::Error::from)
        .and_then(|rows| db::upsert_teams(conn, &rows))
    {
        Ok(n) => summary.teams = n,
        Err(err) => summary.errors.push(format!("teams: {err:#}")),
    }
    match api
        .fetch_standings(league_id, season)
        .map_err(anyhow::Error::from)
        .and_then(|rows| db::upsert_standings(conn, &rows))
    {
        Ok(n) => summary.standings = n,
        Err(err) => summary.errors.push(format!("standings: {err:#}")),
    }
    match api
        .fetch_all_players(league_id, season, None, max_player_pages)
        .map_err(anyhow::Error::from)
        .and_then(|rows| db::upsert_players(conn, &rows))
    {
        Ok(n) => summary.players = n,
        Err(err) => summary.errors.push(format!("players: {err:#}")),
    }

    for err in &summary.errors {
        warn!(league_id, error = %err, "ingest step failed");
    }
    info!(
        league_id,
        fixtures = summary.fixtures,
        teams = summary.teams,
        standings = summary.standings,
        players = summary.players,
        "league ingested"
    );
    summary
}
