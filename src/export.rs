use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::model::Prediction;
use crate::prediction_store::PredictionStats;
use crate::team_report::TeamFormReport;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub predictions: usize,
    pub reports: usize,
}

/// Writes predictions, the per-level summary and (when given) the latest
/// team form reports to an xlsx workbook.
pub fn export_predictions(
    path: &Path,
    predictions: &[Prediction],
    stats: &PredictionStats,
    reports: &[TeamFormReport],
) -> Result<ExportReport> {
    let mut prediction_rows = vec![prediction_header()];
    prediction_rows.extend(predictions.iter().map(prediction_row));
    let summary_rows = summary_rows(stats);
    let mut report_rows = vec![report_header()];
    report_rows.extend(reports.iter().map(report_row));

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Summary")?;
        write_rows(sheet, &summary_rows)?;
    }
    if !reports.is_empty() {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Form")?;
        write_rows(sheet, &report_rows)?;
    }

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        predictions: predictions.len(),
        reports: reports.len(),
    })
}

fn prediction_header() -> Vec<String> {
    [
        "Match date",
        "League",
        "Team",
        "Opponent",
        "Venue",
        "Diff",
        "Prediction",
        "Level",
        "Result",
        "Correct",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn prediction_row(p: &Prediction) -> Vec<String> {
    vec![
        p.match_date.to_string(),
        p.league_name.clone(),
        p.team_name.clone(),
        p.opponent_name.clone(),
        p.venue.clone().unwrap_or_default(),
        format!("{:+.2}", p.performance_diff),
        p.label.to_string(),
        p.level.to_string(),
        opt_to_string(p.result),
        match p.correct {
            Some(true) => "yes".to_string(),
            Some(false) => "no".to_string(),
            None => String::new(),
        },
    ]
}

fn summary_rows(stats: &PredictionStats) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Level".to_string(),
        "Total".to_string(),
        "Completed".to_string(),
        "Correct".to_string(),
        "Accuracy %".to_string(),
    ]];
    let levels = stats
        .by_level
        .iter()
        .map(|(level, s)| (level.to_string(), s))
        .chain(std::iter::once(("All".to_string(), &stats.overall)));
    for (name, s) in levels {
        rows.push(vec![
            name,
            s.total.to_string(),
            s.completed.to_string(),
            s.correct.to_string(),
            s.accuracy().map(|a| format!("{a:.1}")).unwrap_or_default(),
        ]);
    }
    rows
}

fn report_header() -> Vec<String> {
    [
        "League", "Rank", "Team", "Played", "Season PPG", "Form PPG", "Form", "Diff",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn report_row(r: &TeamFormReport) -> Vec<String> {
    vec![
        r.league_name.clone(),
        r.rank.to_string(),
        r.team_name.clone(),
        r.played.to_string(),
        format!("{:.2}", r.season_ppg),
        format!("{:.2}", r.form_ppg),
        r.form.form_string(),
        format!("{:+.2}", r.performance_diff),
    ]
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
