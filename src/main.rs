use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use form_tracker::api_client::FootballApi;
use form_tracker::collect;
use form_tracker::config::{AppConfig, parse_ids, validate_form_length};
use form_tracker::db;
use form_tracker::error::ConfigError;
use form_tracker::export;
use form_tracker::leagues::{self, LEAGUES};
use form_tracker::logging;
use form_tracker::model::Prediction;
use form_tracker::prediction::Thresholds;
use form_tracker::prediction_store;
use form_tracker::team_report::{self, ReportScan};

#[derive(Parser)]
#[command(name = "form-tracker")]
#[command(about = "Football form tracking and performance-based predictions", long_about = None)]
struct Cli {
    /// SQLite database path (defaults to FORM_TRACKER_DB or the user data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Season start year (defaults to FORM_TRACKER_SEASON or the current season)
    #[arg(long, global = true)]
    season: Option<i32>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Teams whose recent form deviates from their season average
    Teams {
        /// League id, or -1 for every catalog league
        #[arg(long, allow_hyphen_values = true)]
        league: Option<i64>,
    },
    /// Save predictions for the next fixture of every deviating team
    Collect {
        /// League id, or -1 for every catalog league
        #[arg(long, allow_hyphen_values = true)]
        league: Option<i64>,
    },
    /// Fetch finished fixtures and record prediction results
    CheckResults,
    /// List stored predictions
    Predictions {
        #[arg(long, conflicts_with_all = ["completed", "form_changes"])]
        pending: bool,
        #[arg(long, conflicts_with = "form_changes")]
        completed: bool,
        /// Only overperforming teams, largest diff first
        #[arg(long)]
        form_changes: bool,
    },
    /// Prediction accuracy overall and per level
    Stats,
    /// Report stored results that disagree with finished fixtures
    Verify,
    /// Recompute result and correctness from finished fixtures
    FixCorrectness {
        /// Only this prediction id
        #[arg(long)]
        id: Option<i64>,
    },
    /// Write predictions to an xlsx workbook
    Export {
        #[arg(long, default_value = "predictions.xlsx")]
        out: PathBuf,
        /// Also scan leagues and add a sheet with current form reports
        #[arg(long)]
        with_form: bool,
    },
    /// Season statistics and squad of one team
    Team {
        team_id: u32,
        #[arg(long)]
        league: u32,
    },
    /// Read or change persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Show the league catalog
    Leagues,
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show stored overrides and the effective configuration
    Get,
    /// Store an override (prediction_threshold_level1, prediction_threshold_level2,
    /// form_length, leagues)
    Set { key: String, value: String },
    /// Remove an override
    Unset { key: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "debug" } else { "info" });

    let mut config = AppConfig::load()?;
    if let Some(db_path) = cli.db.clone() {
        config.db_path = db_path;
    }
    if let Some(season) = cli.season {
        config.season = season;
    }

    if let Commands::Leagues = cli.command {
        print_leagues();
        return Ok(());
    }

    let mut conn = db::open_db(&config.db_path)?;
    config.apply_overrides(&db::load_overrides(&conn)?)?;

    match cli.command {
        Commands::Teams { league } => {
            let api = FootballApi::from_config(&config)?;
            let scan = scan(&api, &config, league)?;
            print_reports(&scan);
        }
        Commands::Collect { league } => {
            let api = FootballApi::from_config(&config)?;
            let scan = scan(&api, &config, league)?;
            let summary = collect::collect_predictions(
                &conn,
                &api,
                &scan.reports,
                config.season,
                &config.thresholds,
            );
            println!(
                "Predictions saved={} existing={} skipped={}",
                summary.saved, summary.existing, summary.skipped
            );
            print_errors(&summary.errors);
        }
        Commands::CheckResults => {
            let api = FootballApi::from_config(&config)?;
            let summary = collect::check_results(&conn, &api)?;
            println!(
                "Checked {} predictions: resolved={} pending={}",
                summary.checked, summary.resolved, summary.pending
            );
            print_errors(&summary.errors);
        }
        Commands::Predictions {
            pending,
            completed,
            form_changes,
        } => {
            let rows = if pending {
                prediction_store::pending_predictions(&conn)?
            } else if completed {
                prediction_store::completed_predictions(&conn)?
            } else if form_changes {
                prediction_store::form_changes(&conn)?
            } else {
                prediction_store::list_predictions(&conn)?
            };
            print_predictions(&rows);
        }
        Commands::Stats => {
            let stats = prediction_store::prediction_stats(&conn)?;
            println!(
                "Total {}  completed {}  pending {}",
                stats.overall.total,
                stats.overall.completed,
                stats.pending()
            );
            for (level, s) in stats.by_level.iter() {
                println!(
                    "  level {level}: {}/{} correct ({})",
                    s.correct,
                    s.completed,
                    fmt_accuracy(s.accuracy())
                );
            }
            println!("Accuracy: {}", fmt_accuracy(stats.overall.accuracy()));
        }
        Commands::Verify => {
            let issues = prediction_store::verify_all_prediction_results(&conn)?;
            if issues.is_empty() {
                println!("No issues found");
            }
            for issue in &issues {
                println!("{issue}");
            }
        }
        Commands::FixCorrectness { id } => {
            let changed = prediction_store::update_prediction_correctness(&mut conn, id)?;
            println!("Updated {changed} predictions");
        }
        Commands::Export { out, with_form } => {
            let predictions = prediction_store::list_predictions(&conn)?;
            let stats = prediction_store::prediction_stats(&conn)?;
            let reports = if with_form {
                let api = FootballApi::from_config(&config)?;
                scan(&api, &config, None)?.reports
            } else {
                Vec::new()
            };
            let report = export::export_predictions(&out, &predictions, &stats, &reports)?;
            println!(
                "Exported {} predictions ({} form rows) to {}",
                report.predictions,
                report.reports,
                out.display()
            );
        }
        Commands::Team { team_id, league } => {
            let api = FootballApi::from_config(&config)?;
            let stats = api.fetch_team_statistics(league, team_id, config.season)?;
            println!(
                "Team {team_id} in {}: P{} W{} D{} L{} GF{} GA{} form {}",
                leagues::league_name(league),
                stats.played,
                stats.wins,
                stats.draws,
                stats.losses,
                stats.goals_for,
                stats.goals_against,
                stats.form
            );
            for player in api.fetch_squad(team_id)? {
                println!(
                    "  {:<28} {:<12} {}",
                    player.name,
                    player.position.as_deref().unwrap_or("-"),
                    player.age.map(|a| a.to_string()).unwrap_or_default()
                );
            }
        }
        Commands::Settings { action } => run_settings(&conn, &config, action)?,
        Commands::Leagues => {}
    }
    Ok(())
}

fn scan(api: &FootballApi, config: &AppConfig, league: Option<i64>) -> Result<ReportScan> {
    let league_ids = match league {
        Some(selector) => {
            let ids = leagues::resolve_selector(selector);
            if ids.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "--league".to_string(),
                    value: selector.to_string(),
                }
                .into());
            }
            ids
        }
        None => config.league_ids.clone(),
    };
    Ok(team_report::fetch_team_reports(
        api,
        &league_ids,
        config.season,
        config.form_length,
        &config.thresholds,
        config.fetch_parallelism,
    ))
}

fn run_settings(conn: &Connection, config: &AppConfig, action: SettingsCommands) -> Result<()> {
    match action {
        SettingsCommands::Get => {
            let overrides = db::load_overrides(conn)?;
            println!("Stored: {}", serde_json::to_string(&overrides)?);
            println!(
                "Effective: level1={} level2={} form_length={} leagues={:?} season={}",
                config.thresholds.level1(),
                config.thresholds.level2(),
                config.form_length,
                config.league_ids,
                config.season
            );
            println!("DB: {}", config.db_path.display());
        }
        SettingsCommands::Set { key, value } => {
            store_setting(conn, config, &key, &value)?;
            println!("{key} = {value}");
        }
        SettingsCommands::Unset { key } => {
            if db::delete_setting(conn, &key)? {
                println!("{key} removed");
            } else {
                println!("{key} was not set");
            }
        }
    }
    Ok(())
}

fn store_setting(conn: &Connection, config: &AppConfig, key: &str, value: &str) -> Result<()> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    match key {
        db::SETTING_LEVEL1 => {
            let level1 = value.trim().parse::<f64>().map_err(|_| invalid())?;
            Thresholds::new(level1, config.thresholds.level2())?;
            db::set_setting(conn, key, &level1)
        }
        db::SETTING_LEVEL2 => {
            let level2 = value.trim().parse::<f64>().map_err(|_| invalid())?;
            Thresholds::new(config.thresholds.level1(), level2)?;
            db::set_setting(conn, key, &level2)
        }
        db::SETTING_FORM_LENGTH => {
            let length = value.trim().parse::<usize>().map_err(|_| invalid())?;
            db::set_setting(conn, key, &validate_form_length(length)?)
        }
        db::SETTING_LEAGUES => {
            let ids = parse_ids(value);
            if ids.is_empty() {
                return Err(invalid().into());
            }
            db::set_setting(conn, key, &ids)
        }
        other => Err(anyhow!("unknown setting {other}")),
    }
    .with_context(|| format!("store setting {key}"))
}

fn print_leagues() {
    for league in LEAGUES {
        println!("{:>4}  {:<24} {}", league.id, league.name, league.country);
    }
}

fn print_reports(scan: &ReportScan) {
    println!(
        "{:<22} {:<24} {:>4} {:>4} {:>7} {:>7} {:<10} {:>6}",
        "League", "Team", "Pos", "P", "Season", "Form", "Last", "Diff"
    );
    for r in &scan.reports {
        println!(
            "{:<22} {:<24} {:>4} {:>4} {:>7.2} {:>7.2} {:<10} {:>+6.2}",
            r.league_name,
            r.team_name,
            r.rank,
            r.played,
            r.season_ppg,
            r.form_ppg,
            r.form.form_string(),
            r.performance_diff
        );
    }
    println!("{} teams, {} league errors", scan.reports.len(), scan.errors.len());
    print_errors(&scan.errors);
}

fn print_predictions(rows: &[Prediction]) {
    let today = Utc::now().date_naive();
    for p in rows {
        let status = match (p.result, p.correct) {
            (Some(result), Some(true)) => format!("{result} ok"),
            (Some(result), _) => format!("{result} miss"),
            (None, _) if p.match_date < today => "awaiting result".to_string(),
            (None, _) => "upcoming".to_string(),
        };
        println!(
            "#{:<5} {} {:<22} {:<22} vs {:<22} {:>+6.2} {:<9} {}",
            p.id,
            p.match_date,
            p.league_name,
            p.team_name,
            p.opponent_name,
            p.performance_diff,
            p.label.to_string(),
            status
        );
    }
    println!("{} predictions", rows.len());
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!("  errors: {}", errors.len());
    for err in errors.iter().take(6) {
        println!("   - {err}");
    }
}

fn fmt_accuracy(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}%"))
        .unwrap_or_else(|| "n/a".to_string())
}
