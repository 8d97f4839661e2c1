use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use mockito::{Matcher, Server};

use form_tracker::api_client::FootballApi;
use form_tracker::error::ApiError;
use form_tracker::http_cache::CacheTier;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn api(server: &Server) -> FootballApi {
    FootballApi::new("test-key", &server.url())
        .expect("client")
        .with_retry_delay(Duration::ZERO)
}

fn league_season() -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("league".into(), "39".into()),
        Matcher::UrlEncoded("season".into(), "2024".into()),
    ])
}

#[test]
fn standings_are_served_from_cache_on_second_call() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/standings")
        .match_header("x-apisports-key", "test-key")
        .match_query(league_season())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(read_fixture("standings.json"))
        .expect(1)
        .create();

    let api = api(&server);
    let first = api.fetch_standings(39, 2024).expect("first fetch");
    let second = api.fetch_standings(39, 2024).expect("cached fetch");
    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
    assert_eq!(api.cache().len(CacheTier::Medium), 1);
    mock.assert();
}

#[test]
fn rate_limited_request_is_retried_once() {
    let mut server = Server::new();
    let limited = server
        .mock("GET", "/fixtures")
        .match_query(league_season())
        .with_status(429)
        .expect(1)
        .create();
    let ok = server
        .mock("GET", "/fixtures")
        .match_query(league_season())
        .with_status(200)
        .with_body(read_fixture("fixtures_league.json"))
        .expect(1)
        .create();

    let fixtures = api(&server)
        .fetch_fixtures(39, 2024, None)
        .expect("retry should succeed");
    assert_eq!(fixtures.len(), 26);
    limited.assert();
    ok.assert();
}

#[test]
fn second_rate_limit_is_transient() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/teams")
        .match_query(league_season())
        .with_status(429)
        .expect(2)
        .create();

    let err = api(&server).fetch_teams(39, 2024).expect_err("still limited");
    assert!(err.is_retryable(), "got {err:?}");
    mock.assert();
}

#[test]
fn server_errors_are_transient_and_client_errors_rejected() {
    let mut server = Server::new();
    server
        .mock("GET", "/teams")
        .match_query(league_season())
        .with_status(503)
        .create();
    server
        .mock("GET", "/players/squads")
        .match_query(Matcher::UrlEncoded("team".into(), "42".into()))
        .with_status(404)
        .with_body("not here")
        .create();

    let api = api(&server);
    let err = api.fetch_teams(39, 2024).expect_err("503");
    assert!(matches!(err, ApiError::Transient { .. }), "got {err:?}");

    let err = api.fetch_squad(42).expect_err("404");
    match err {
        ApiError::Rejected {
            status, message, ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(message, "not here");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(api.cache().is_empty(), "failures are not cached");
}

#[test]
fn api_error_member_is_rejected() {
    let mut server = Server::new();
    server
        .mock("GET", "/standings")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"errors": {"season": "The Season field must contain 4 characters"}, "response": []}"#)
        .create();

    let err = api(&server).fetch_standings(39, 24).expect_err("api error");
    assert!(!err.is_retryable());
    assert!(
        err.to_string().contains("Season field"),
        "unexpected message: {err}"
    );
}

#[test]
fn rate_limit_error_member_is_retried() {
    let mut server = Server::new();
    let limited = server
        .mock("GET", "/teams/statistics")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"errors": {"rateLimit": "Too many requests"}, "response": []}"#)
        .expect(1)
        .create();
    let ok = server
        .mock("GET", "/teams/statistics")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(read_fixture("team_statistics.json"))
        .expect(1)
        .create();

    let stats = api(&server)
        .fetch_team_statistics(39, 42, 2024)
        .expect("statistics");
    assert_eq!(stats.played, 10);
    limited.assert();
    ok.assert();
}

#[test]
fn empty_standings_and_missing_fixture_are_no_data() {
    let mut server = Server::new();
    server
        .mock("GET", "/standings")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"errors": [], "response": []}"#)
        .create();
    server
        .mock("GET", "/fixtures")
        .match_query(Matcher::UrlEncoded("id".into(), "5".into()))
        .with_status(200)
        .with_body(r#"{"errors": [], "response": []}"#)
        .create();

    let api = api(&server);
    assert!(api.fetch_standings(39, 2024).expect_err("empty").is_no_data());
    assert!(api.fetch_fixture(5).expect_err("missing").is_no_data());
}

#[test]
fn invalid_json_is_reported() {
    let mut server = Server::new();
    server
        .mock("GET", "/teams")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body("<html>maintenance</html>")
        .create();

    let err = api(&server).fetch_teams(39, 2024).expect_err("html body");
    assert!(matches!(err, ApiError::InvalidResponse { .. }), "got {err:?}");
}

#[test]
fn cache_only_mode_never_hits_the_network() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/standings")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(read_fixture("standings.json"))
        .expect(1)
        .create();

    let mut api = api(&server);
    api.fetch_standings(39, 2024).expect("warm cache");
    api.set_auto_fetch(false);
    assert!(api.fetch_standings(39, 2024).is_ok());
    let err = api.fetch_standings(140, 2024).expect_err("not cached");
    assert!(matches!(err, ApiError::NotCached(_)), "got {err:?}");
    mock.assert();
}

#[test]
fn player_pages_are_walked_up_to_the_limit() {
    let mut server = Server::new();
    let body = read_fixture("players.json");
    let mock = server
        .mock("GET", "/players")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(&body)
        .expect(2)
        .create();

    let players = api(&server)
        .fetch_all_players(39, 2024, None, 2)
        .expect("players");
    assert_eq!(players.len(), 4, "two pages of two players");
    mock.assert();
}
