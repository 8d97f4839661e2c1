use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

use form_tracker::api_client::FootballApi;
use form_tracker::collect;
use form_tracker::config::{AppConfig, parse_ids};
use form_tracker::db;
use form_tracker::logging;

const ALL_PLAYER_PAGES: u32 = 50;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Bulk ingest of fixtures, teams, standings and players", long_about = None)]
struct IngestArgs {
    /// SQLite database path (defaults to FORM_TRACKER_DB or the user data dir)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Season start year (defaults to FORM_TRACKER_SEASON or the current season)
    #[arg(long)]
    season: Option<i32>,

    /// Comma-separated league ids (defaults to the configured leagues)
    #[arg(long)]
    league_ids: Option<String>,

    /// Walk every player page instead of only the first
    #[arg(long)]
    all_player_pages: bool,
}

fn main() -> Result<()> {
    logging::init("info");
    let args = IngestArgs::parse();

    let mut config = AppConfig::load()?;
    if let Some(path) = args.db {
        config.db_path = path;
    }
    if let Some(season) = args.season {
        config.season = season;
    }

    let mut conn = db::open_db(&config.db_path)?;
    config.apply_overrides(&db::load_overrides(&conn)?)?;
    let league_ids = match args.league_ids.as_deref() {
        Some(raw) => parse_ids(raw),
        None => config.league_ids.clone(),
    };
    if league_ids.is_empty() {
        return Err(anyhow!("no league ids resolved for ingest"));
    }
    let max_player_pages = if args.all_player_pages {
        ALL_PLAYER_PAGES
    } else {
        1
    };

    let api = FootballApi::from_config(&config)?;
    let summaries = league_ids
        .iter()
        .map(|league_id| {
            collect::ingest_league(&mut conn, &api, *league_id, config.season, max_player_pages)
        })
        .collect::<Vec<_>>();

    println!("Ingest complete");
    println!("DB: {}", config.db_path.display());
    println!("Season: {}", config.season);
    for item in &summaries {
        println!(
            "league {}: fixtures={} teams={} standings={} players={}",
            item.league_id, item.fixtures, item.teams, item.standings, item.players
        );
        if !item.errors.is_empty() {
            println!("  errors: {}", item.errors.len());
            for err in item.errors.iter().take(6) {
                println!("   - {err}");
            }
        }
    }
    for (table, count) in db::table_counts(&conn)? {
        println!("{table}: {count} rows");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::IngestArgs;

    #[test]
    fn flags_parse_into_args() {
        let args = IngestArgs::try_parse_from([
            "ingest",
            "--db",
            "/tmp/form.sqlite",
            "--season",
            "2023",
            "--league-ids",
            "39,140",
            "--all-player-pages",
        ])
        .expect("valid flags");
        assert_eq!(args.db.as_deref(), Some(std::path::Path::new("/tmp/form.sqlite")));
        assert_eq!(args.season, Some(2023));
        assert_eq!(args.league_ids.as_deref(), Some("39,140"));
        assert!(args.all_player_pages);
    }

    #[test]
    fn misspelled_flags_and_positionals_are_rejected() {
        assert!(IngestArgs::try_parse_from(["ingest", "--league-id", "39"]).is_err());
        assert!(IngestArgs::try_parse_from(["ingest", "39"]).is_err());
        assert!(IngestArgs::try_parse_from(["ingest", "--season", "next"]).is_err());
    }
}
