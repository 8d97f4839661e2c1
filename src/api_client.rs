use std::thread;
use std::time::Duration;

use anyhow::Result;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api_parse::{self, Paging, TeamStatistics};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::http_cache::{CacheTier, ResponseCache, request_signature};
use crate::http_client::build_http_client;
use crate::model::{Fixture, Player, Standing, Team};

const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_secs(2);
const NEXT_FIXTURES_WINDOW: u32 = 10;
const MAX_ERROR_BODY: usize = 200;

/// API-Football v3 client with a tiered in-memory response cache.
#[derive(Debug)]
pub struct FootballApi {
    client: Client,
    base_url: String,
    cache: ResponseCache,
    retry_delay: Duration,
    auto_fetch: bool,
}

enum Attempt {
    Done(Value),
    RateLimited,
}

impl FootballApi {
    pub fn new(api_key: &str, base_url: &str) -> Result<Self> {
        Ok(Self {
            client: build_http_client(api_key)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: ResponseCache::new(),
            retry_delay: RATE_LIMIT_RETRY_DELAY,
            auto_fetch: true,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.require_api_key()?, &config.base_url)
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// With auto fetch off only cached responses are served.
    pub fn set_auto_fetch(&mut self, enabled: bool) {
        self.auto_fetch = enabled;
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn fetch_standings(&self, league_id: u32, season: i32) -> ApiResult<Vec<Standing>> {
        let params = [("league", league_id.to_string()), ("season", season.to_string())];
        let body = self.get_json("/standings", &params, CacheTier::Medium)?;
        let standings = api_parse::parse_standings(&body);
        if standings.is_empty() {
            return Err(ApiError::NoData(format!("standings for league {league_id}")));
        }
        Ok(standings)
    }

    pub fn fetch_fixtures(
        &self,
        league_id: u32,
        season: i32,
        team_id: Option<u32>,
    ) -> ApiResult<Vec<Fixture>> {
        let mut params = vec![("league", league_id.to_string()), ("season", season.to_string())];
        if let Some(team_id) = team_id {
            params.push(("team", team_id.to_string()));
        }
        let body = self.get_json("/fixtures", &params, CacheTier::Long)?;
        Ok(api_parse::parse_fixtures(&body))
    }

    pub fn fetch_fixture(&self, fixture_id: u64) -> ApiResult<Fixture> {
        let params = [("id", fixture_id.to_string())];
        let body = self.get_json("/fixtures", &params, CacheTier::Short)?;
        api_parse::parse_fixtures(&body)
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NoData(format!("fixture {fixture_id}")))
    }

    /// The earliest upcoming round of a league.
    pub fn fetch_next_fixtures(&self, league_id: u32, season: i32) -> ApiResult<Vec<Fixture>> {
        let params = [
            ("league", league_id.to_string()),
            ("season", season.to_string()),
            ("next", NEXT_FIXTURES_WINDOW.to_string()),
        ];
        let body = self.get_json("/fixtures", &params, CacheTier::Short)?;
        Ok(api_parse::first_round(api_parse::parse_fixtures(&body)))
    }

    pub fn fetch_teams(&self, league_id: u32, season: i32) -> ApiResult<Vec<Team>> {
        let params = [("league", league_id.to_string()), ("season", season.to_string())];
        let body = self.get_json("/teams", &params, CacheTier::Medium)?;
        Ok(api_parse::parse_teams(&body, league_id))
    }

    pub fn fetch_players(
        &self,
        league_id: u32,
        season: i32,
        team_id: Option<u32>,
        page: u32,
    ) -> ApiResult<(Vec<Player>, Paging)> {
        let mut params = vec![
            ("league", league_id.to_string()),
            ("season", season.to_string()),
            ("page", page.max(1).to_string()),
        ];
        if let Some(team_id) = team_id {
            params.push(("team", team_id.to_string()));
        }
        let body = self.get_json("/players", &params, CacheTier::Medium)?;
        Ok((api_parse::parse_players(&body), api_parse::paging(&body)))
    }

    /// Walks `/players` pages up to `max_pages`. A failing later page ends
    /// the walk with what was collected so far.
    pub fn fetch_all_players(
        &self,
        league_id: u32,
        season: i32,
        team_id: Option<u32>,
        max_pages: u32,
    ) -> ApiResult<Vec<Player>> {
        let (mut players, paging) = self.fetch_players(league_id, season, team_id, 1)?;
        let last = paging.total.min(max_pages.max(1));
        for page in 2..=last {
            match self.fetch_players(league_id, season, team_id, page) {
                Ok((rows, _)) => players.extend(rows),
                Err(err) => {
                    warn!(league_id, page, error = %err, "stopping player pagination");
                    break;
                }
            }
        }
        Ok(players)
    }

    pub fn fetch_team_statistics(
        &self,
        league_id: u32,
        team_id: u32,
        season: i32,
    ) -> ApiResult<TeamStatistics> {
        let params = [
            ("league", league_id.to_string()),
            ("team", team_id.to_string()),
            ("season", season.to_string()),
        ];
        let body = self.get_json("/teams/statistics", &params, CacheTier::Medium)?;
        api_parse::parse_team_statistics(&body)
            .ok_or_else(|| ApiError::NoData(format!("statistics for team {team_id}")))
    }

    pub fn fetch_squad(&self, team_id: u32) -> ApiResult<Vec<Player>> {
        let params = [("team", team_id.to_string())];
        let body = self.get_json("/players/squads", &params, CacheTier::Medium)?;
        Ok(api_parse::parse_squad(&body))
    }

    fn get_json(&self, path: &str, params: &[(&str, String)], tier: CacheTier) -> ApiResult<Value> {
        let key = request_signature(path, params);
        if let Some(hit) = self.cache.get(tier, &key) {
            debug!(%key, ?tier, "cache hit");
            return Ok(hit);
        }
        if !self.auto_fetch {
            return Err(ApiError::NotCached(key));
        }

        let url = format!("{}{}", self.base_url, path);
        let body = self.request(&url, params)?;
        self.cache.insert(tier, &key, body.clone());
        Ok(body)
    }

    /// One GET; on HTTP 429 waits `retry_delay` and tries exactly once more.
    fn request(&self, url: &str, params: &[(&str, String)]) -> ApiResult<Value> {
        match self.send_once(url, params)? {
            Attempt::Done(body) => Ok(body),
            Attempt::RateLimited => {
                warn!(url, ?params, "rate limit hit, retrying once");
                thread::sleep(self.retry_delay);
                match self.send_once(url, params)? {
                    Attempt::Done(body) => Ok(body),
                    Attempt::RateLimited => Err(ApiError::Transient {
                        url: url.to_string(),
                        message: "rate limited after retry".to_string(),
                    }),
                }
            }
        }
    }

    fn send_once(&self, url: &str, params: &[(&str, String)]) -> ApiResult<Attempt> {
        let transient = |err: reqwest::Error| ApiError::Transient {
            url: url.to_string(),
            message: err.to_string(),
        };

        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .map_err(transient)?;
        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::RateLimited);
        }
        let text = resp.text().map_err(transient)?;

        if status.is_server_error() {
            return Err(ApiError::Transient {
                url: url.to_string(),
                message: format!("http {status}"),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                message: truncate(&text, MAX_ERROR_BODY),
            });
        }

        let body = api_parse::parse_body(&text).map_err(|err| ApiError::InvalidResponse {
            url: url.to_string(),
            message: format!("{err:#}"),
        })?;
        if body
            .get("errors")
            .and_then(|e| e.get("rateLimit"))
            .is_some()
        {
            return Ok(Attempt::RateLimited);
        }
        if let Some(message) = api_parse::api_errors(&body) {
            return Err(ApiError::Rejected {
                url: url.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        Ok(Attempt::Done(body))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
