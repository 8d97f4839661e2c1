use std::sync::Mutex;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::api_client::FootballApi;
use crate::form::{TeamForm, analyze_team_form};
use crate::leagues::league_name;
use crate::model::{Fixture, Standing};
use crate::prediction::{Thresholds, performance_diff};

/// Season average against recent form for one team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamFormReport {
    pub league_id: u32,
    pub league_name: String,
    pub team_id: u32,
    pub team_name: String,
    pub rank: u32,
    pub played: u32,
    pub season_ppg: f64,
    pub form_ppg: f64,
    pub form: TeamForm,
    pub performance_diff: f64,
}

#[derive(Debug, Default)]
pub struct ReportScan {
    pub reports: Vec<TeamFormReport>,
    pub errors: Vec<String>,
}

/// Reports for every team of one league whose form deviates by more than
/// the level-1 threshold. Teams without a played match or without any
/// finished fixture in `fixtures` are skipped.
pub fn build_league_reports(
    league_id: u32,
    standings: &[Standing],
    fixtures: &[Fixture],
    form_length: usize,
    thresholds: &Thresholds,
) -> Vec<TeamFormReport> {
    let name = league_name(league_id);
    standings
        .iter()
        .filter_map(|standing| {
            let season_ppg = standing.points_per_game()?;
            let form = analyze_team_form(fixtures, standing.team_id, form_length);
            let form_ppg = form.form_ppg()?;
            let diff = performance_diff(season_ppg, form_ppg);
            if !thresholds.is_significant(diff) {
                return None;
            }
            Some(TeamFormReport {
                league_id,
                league_name: name.clone(),
                team_id: standing.team_id,
                team_name: standing.team_name.clone(),
                rank: standing.rank,
                played: standing.played,
                season_ppg,
                form_ppg,
                form,
                performance_diff: diff,
            })
        })
        .collect()
}

/// Largest absolute deviation first; ties keep league table order.
pub fn sort_by_deviation(reports: &mut [TeamFormReport]) {
    reports.sort_by(|a, b| {
        b.performance_diff
            .abs()
            .total_cmp(&a.performance_diff.abs())
            .then(a.league_id.cmp(&b.league_id))
            .then(a.rank.cmp(&b.rank))
    });
}

pub fn build_fetch_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(2, 32))
        .build()
        .ok()
}

pub fn with_fetch_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}

/// Scans each league (standings plus season fixtures) on the fetch pool.
/// A failing league is logged and recorded in `errors`.
pub fn fetch_team_reports(
    api: &FootballApi,
    league_ids: &[u32],
    season: i32,
    form_length: usize,
    thresholds: &Thresholds,
    parallelism: usize,
) -> ReportScan {
    let errors = Mutex::new(Vec::<String>::new());
    let pool = build_fetch_pool(parallelism);
    let per_league: Vec<Vec<TeamFormReport>> = with_fetch_pool(&pool, || {
        league_ids
            .par_iter()
            .map(|league_id| {
                let fetched = api
                    .fetch_standings(*league_id, season)
                    .and_then(|standings| {
                        let fixtures = api.fetch_fixtures(*league_id, season, None)?;
                        Ok((standings, fixtures))
                    });
                match fetched {
                    Ok((standings, fixtures)) => build_league_reports(
                        *league_id,
                        &standings,
                        &fixtures,
                        form_length,
                        thresholds,
                    ),
                    Err(err) => {
                        warn!(league_id, error = %err, "skipping league");
                        let mut guard = errors.lock().unwrap_or_else(|e| e.into_inner());
                        guard.push(format!("league {league_id}: {err}"));
                        Vec::new()
                    }
                }
            })
            .collect()
    });

    let mut reports: Vec<TeamFormReport> = per_league.into_iter().flatten().collect();
    sort_by_deviation(&mut reports);
    let errors = errors.into_inner().unwrap_or_else(|e| e.into_inner());
    info!(
        leagues = league_ids.len(),
        reports = reports.len(),
        errors = errors.len(),
        "team form scan finished"
    );
    ReportScan { reports, errors }
}
