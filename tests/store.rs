use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use rusqlite::params;

use form_tracker::api_parse::{
    parse_body, parse_fixtures_json, parse_players, parse_standings_json, parse_teams,
};
use form_tracker::config::SettingsOverrides;
use form_tracker::db;
use form_tracker::model::{FixtureStatus, NewPrediction, Outcome, PredictionLabel};
use form_tracker::prediction_store::{self, SaveOutcome};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn new_prediction(fixture_id: u64, team_id: u32, day: NaiveDate, diff: f64) -> NewPrediction {
    NewPrediction {
        team_id,
        team_name: format!("Team {team_id}"),
        league_id: 39,
        league_name: "Premier League".to_string(),
        fixture_id,
        opponent_id: 1,
        opponent_name: "Opponent".to_string(),
        match_date: day,
        venue: None,
        performance_diff: diff,
        label: PredictionLabel {
            outcome: if diff > 0.0 { Outcome::Win } else { Outcome::Loss },
            big: diff.abs() > 1.0,
        },
    }
}

#[test]
fn on_disk_database_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("football.sqlite");
    {
        let mut conn = db::open_db(&path).expect("open");
        let fixtures = parse_fixtures_json(&read_fixture("fixtures_league.json")).expect("parse");
        assert_eq!(db::upsert_fixtures(&mut conn, &fixtures).expect("upsert"), 26);
    }
    let conn = db::open_db(&path).expect("reopen");
    assert_eq!(db::fixtures_by_league(&conn, 39).expect("load").len(), 26);
}

#[test]
fn fixture_upserts_are_idempotent() {
    let mut conn = db::open_in_memory().expect("db");
    let fixtures = parse_fixtures_json(&read_fixture("fixtures_league.json")).expect("parse");
    db::upsert_fixtures(&mut conn, &fixtures).expect("first upsert");
    db::upsert_fixtures(&mut conn, &fixtures).expect("second upsert");

    let stored = db::fixtures_by_league(&conn, 39).expect("load");
    assert_eq!(stored.len(), fixtures.len());
    assert_eq!(stored[0].id, 1052, "latest kickoff first");

    let original = fixtures.iter().find(|f| f.id == 1004).expect("fixture");
    let loaded = db::get_fixture(&conn, 1004).expect("get").expect("stored");
    assert_eq!(&loaded, original);
    assert!(db::get_fixture(&conn, 424242).expect("get").is_none());
}

#[test]
fn fixture_queries_filter_by_status_and_team() {
    let mut conn = db::open_in_memory().expect("db");
    let fixtures = parse_fixtures_json(&read_fixture("fixtures_league.json")).expect("parse");
    db::upsert_fixtures(&mut conn, &fixtures).expect("upsert");

    let upcoming = db::upcoming_fixtures(&conn, Some(42)).expect("upcoming");
    assert_eq!(upcoming.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1050, 1052]);

    let completed = db::completed_fixtures(&conn, Some(40)).expect("completed");
    assert_eq!(completed.len(), 5);
    assert_eq!(completed[0].id, 1015);

    assert!(
        db::update_fixture_score(&conn, 1050, 1, 3, &FixtureStatus::Finished).expect("update")
    );
    let finished = db::get_fixture(&conn, 1050).expect("get").expect("stored");
    assert_eq!(finished.final_score(), Some((1, 3)));
    assert!(!db::update_fixture_score(&conn, 9, 0, 0, &FixtureStatus::Finished).expect("update"));
}

#[test]
fn teams_players_and_standings_round_trip() {
    let mut conn = db::open_in_memory().expect("db");

    let teams = parse_teams(&parse_body(&read_fixture("teams.json")).expect("json"), 39);
    db::upsert_teams(&mut conn, &teams).expect("teams");
    db::upsert_teams(&mut conn, &teams).expect("teams again");
    let stored = db::load_teams(&conn, Some(39)).expect("load teams");
    assert_eq!(stored, teams);
    assert!(db::load_teams(&conn, Some(140)).expect("load teams").is_empty());

    let players = parse_players(&parse_body(&read_fixture("players.json")).expect("json"));
    db::upsert_players(&mut conn, &players).expect("players");
    let arsenal = db::load_players(&conn, 42).expect("load players");
    assert_eq!(arsenal.len(), 1);
    assert_eq!(arsenal[0].name, "B. Saka");

    let standings = parse_standings_json(&read_fixture("standings.json")).expect("parse");
    db::upsert_standings(&mut conn, &standings).expect("standings");
    let mut updated = standings.clone();
    updated[0].points += 3;
    updated[0].played += 1;
    db::upsert_standings(&mut conn, &updated).expect("standings update");
    let table = db::load_standings(&conn, 39).expect("load standings");
    assert_eq!(table.len(), standings.len());
    assert_eq!(table[0].points, standings[0].points + 3);

    let counts = db::table_counts(&conn).expect("counts");
    assert!(counts.contains(&("standings", 5)));
    assert!(counts.contains(&("teams", 2)));
}

#[test]
fn settings_round_trip_as_overrides() {
    let conn = db::open_in_memory().expect("db");
    assert_eq!(
        db::load_overrides(&conn).expect("empty overrides"),
        SettingsOverrides::default()
    );

    db::set_setting(&conn, db::SETTING_LEVEL1, &0.5).expect("level1");
    db::set_setting(&conn, db::SETTING_LEVEL1, &0.45).expect("level1 again");
    db::set_setting(&conn, db::SETTING_FORM_LENGTH, &3usize).expect("form length");
    db::set_setting(&conn, db::SETTING_LEAGUES, &vec![39u32, 140]).expect("leagues");

    let overrides = db::load_overrides(&conn).expect("overrides");
    assert_eq!(overrides.level1, Some(0.45));
    assert_eq!(overrides.level2, None);
    assert_eq!(overrides.form_length, Some(3));
    assert_eq!(overrides.leagues, Some(vec![39, 140]));

    assert!(db::delete_setting(&conn, db::SETTING_LEAGUES).expect("delete"));
    assert!(!db::delete_setting(&conn, db::SETTING_LEAGUES).expect("delete again"));
    assert_eq!(db::load_overrides(&conn).expect("overrides").leagues, None);
}

#[test]
fn predictions_are_unique_per_fixture_and_team() {
    let conn = db::open_in_memory().expect("db");
    let p = new_prediction(1050, 42, date(2024, 10, 5), -1.2);

    let first = prediction_store::save_prediction(&conn, &p).expect("save");
    let SaveOutcome::Inserted(id) = first else {
        panic!("expected insert, got {first:?}");
    };
    assert_eq!(
        prediction_store::save_prediction(&conn, &p).expect("save again"),
        SaveOutcome::AlreadyExists
    );

    let other_side = new_prediction(1050, 40, date(2024, 10, 5), 1.5);
    assert!(matches!(
        prediction_store::save_prediction(&conn, &other_side).expect("save other side"),
        SaveOutcome::Inserted(_)
    ));

    let stored = prediction_store::get_prediction(&conn, id)
        .expect("get")
        .expect("stored");
    assert_eq!(stored.label.to_string(), "BIG LOSS");
    assert_eq!(stored.level, 2);
    assert_eq!(stored.match_date, date(2024, 10, 5));
    assert_eq!(stored.result, None);
    assert_eq!(stored.correct, None);
    assert_eq!(prediction_store::list_predictions(&conn).expect("list").len(), 2);
}

#[test]
fn results_are_recorded_once() {
    let conn = db::open_in_memory().expect("db");
    let SaveOutcome::Inserted(id) =
        prediction_store::save_prediction(&conn, &new_prediction(7, 42, date(2024, 9, 1), -0.8))
            .expect("save")
    else {
        panic!("expected insert");
    };

    assert!(prediction_store::record_result(&conn, id, Outcome::Loss, true).expect("record"));
    assert!(!prediction_store::record_result(&conn, id, Outcome::Win, false).expect("record"));

    let stored = prediction_store::get_prediction(&conn, id)
        .expect("get")
        .expect("stored");
    assert_eq!(stored.result, Some(Outcome::Loss));
    assert_eq!(stored.correct, Some(true));
    assert_eq!(prediction_store::completed_predictions(&conn).expect("completed").len(), 1);
    assert!(prediction_store::pending_predictions(&conn).expect("pending").is_empty());
}

#[test]
fn only_past_unresolved_predictions_are_checked() {
    let conn = db::open_in_memory().expect("db");
    for (fixture_id, day) in [(1, 1), (2, 5), (3, 6), (4, 20)] {
        prediction_store::save_prediction(
            &conn,
            &new_prediction(fixture_id, 42, date(2024, 10, day), -0.9),
        )
        .expect("save");
    }
    let resolved = prediction_store::list_predictions(&conn)
        .expect("list")
        .into_iter()
        .find(|p| p.fixture_id == 1)
        .expect("prediction");
    prediction_store::record_result(&conn, resolved.id, Outcome::Loss, true).expect("record");

    let due = prediction_store::predictions_to_check(&conn, date(2024, 10, 6)).expect("due");
    assert_eq!(due.iter().map(|p| p.fixture_id).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn form_changes_lists_overperformers_descending() {
    let conn = db::open_in_memory().expect("db");
    for (fixture_id, diff) in [(1, 0.7), (2, -1.4), (3, 1.6), (4, 0.9)] {
        prediction_store::save_prediction(
            &conn,
            &new_prediction(fixture_id, 10 + fixture_id as u32, date(2024, 10, 5), diff),
        )
        .expect("save");
    }
    let diffs = prediction_store::form_changes(&conn)
        .expect("form changes")
        .iter()
        .map(|p| p.performance_diff)
        .collect::<Vec<_>>();
    assert_eq!(diffs, vec![1.6, 0.9, 0.7]);
}

#[test]
fn stats_break_down_by_level() {
    let conn = db::open_in_memory().expect("db");
    let rows = [
        (1, -0.8, Some((Outcome::Loss, true))),
        (2, 0.7, Some((Outcome::Draw, false))),
        (3, -1.3, Some((Outcome::Loss, true))),
        (4, 1.2, None),
    ];
    for (fixture_id, diff, result) in rows {
        let saved = prediction_store::save_prediction(
            &conn,
            &new_prediction(fixture_id, 42, date(2024, 9, 1), diff),
        )
        .expect("save");
        if let (SaveOutcome::Inserted(id), Some((outcome, correct))) = (saved, result) {
            prediction_store::record_result(&conn, id, outcome, correct).expect("record");
        }
    }

    let stats = prediction_store::prediction_stats(&conn).expect("stats");
    assert_eq!(stats.overall.total, 4);
    assert_eq!(stats.overall.completed, 3);
    assert_eq!(stats.overall.correct, 2);
    assert_eq!(stats.pending(), 1);

    let level1 = stats.by_level[&1];
    assert_eq!((level1.total, level1.completed, level1.correct), (2, 2, 1));
    assert_eq!(level1.accuracy(), Some(50.0));
    let level2 = stats.by_level[&2];
    assert_eq!((level2.total, level2.completed, level2.correct), (2, 1, 1));
    assert_eq!(level2.accuracy(), Some(100.0));
}

#[test]
fn legacy_labels_still_decode() {
    let conn = db::open_in_memory().expect("db");
    conn.execute(
        "INSERT INTO predictions (team_id, team_name, league_id, league_name, fixture_id,
             opponent_id, opponent_name, match_date, venue, performance_diff, prediction,
             prediction_level, created_at)
         VALUES (1, 'A', 39, 'Premier League', 5, 2, 'B', '2024-09-01', NULL, -0.7, 'LOSE', 1, '')",
        params![],
    )
    .expect("raw insert");
    let rows = prediction_store::list_predictions(&conn).expect("list");
    assert_eq!(rows[0].label.outcome, Outcome::Loss);
    assert_eq!(rows[0].label.to_string(), "LOSS");
}
