use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::leagues::PREMIER_LEAGUE_ID;
use crate::prediction::{DEFAULT_LEVEL1, DEFAULT_LEVEL2, Thresholds};

pub const DEFAULT_BASE_URL: &str = "https://v3.football.api-sports.io";
pub const DEFAULT_FORM_LENGTH: usize = 5;
pub const ALLOWED_FORM_LENGTHS: &[usize] = &[3, 5];

const DATA_DIR: &str = "form_tracker";
const DB_FILE: &str = "football.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub db_path: PathBuf,
    pub season: i32,
    pub league_ids: Vec<u32>,
    pub form_length: usize,
    pub thresholds: Thresholds,
    pub fetch_parallelism: usize,
}

/// Values persisted in the settings table that take precedence over env.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverrides {
    pub level1: Option<f64>,
    pub level2: Option<f64>,
    pub form_length: Option<usize>,
    pub leagues: Option<Vec<u32>>,
}

impl AppConfig {
    /// Reads `.env.local` and `.env` (if present) and then the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("API_FOOTBALL_KEY");
        let base_url = get("API_FOOTBALL_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let db_path = get("FORM_TRACKER_DB")
            .map(PathBuf::from)
            .or_else(default_db_path)
            .unwrap_or_else(|| PathBuf::from(DB_FILE));
        let season = match get("FORM_TRACKER_SEASON") {
            Some(raw) => parse_value::<i32>("FORM_TRACKER_SEASON", &raw)?,
            None => current_season(Utc::now().date_naive()),
        };
        let league_ids = match get("FORM_TRACKER_LEAGUE_IDS") {
            Some(raw) => {
                let ids = parse_ids(&raw);
                if ids.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: "FORM_TRACKER_LEAGUE_IDS".to_string(),
                        value: raw,
                    });
                }
                ids
            }
            None => vec![PREMIER_LEAGUE_ID],
        };
        let form_length = match get("FORM_LENGTH") {
            Some(raw) => validate_form_length(parse_value("FORM_LENGTH", &raw)?)?,
            None => DEFAULT_FORM_LENGTH,
        };
        let level1 = match get("PREDICTION_LEVEL1") {
            Some(raw) => parse_value("PREDICTION_LEVEL1", &raw)?,
            None => DEFAULT_LEVEL1,
        };
        let level2 = match get("PREDICTION_LEVEL2") {
            Some(raw) => parse_value("PREDICTION_LEVEL2", &raw)?,
            None => DEFAULT_LEVEL2,
        };
        let fetch_parallelism = get("FETCH_PARALLELISM")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(6)
            .clamp(2, 32);

        Ok(Self {
            api_key,
            base_url,
            db_path,
            season,
            league_ids,
            form_length,
            thresholds: Thresholds::new(level1, level2)?,
            fetch_parallelism,
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    pub fn apply_overrides(&mut self, overrides: &SettingsOverrides) -> Result<(), ConfigError> {
        let level1 = overrides.level1.unwrap_or(self.thresholds.level1());
        let level2 = overrides.level2.unwrap_or(self.thresholds.level2());
        self.thresholds = Thresholds::new(level1, level2)?;
        if let Some(length) = overrides.form_length {
            self.form_length = validate_form_length(length)?;
        }
        if let Some(leagues) = overrides.leagues.as_ref() {
            let ids = dedup_ids(leagues.iter().copied().filter(|id| *id != 0).collect());
            if !ids.is_empty() {
                self.league_ids = ids;
            }
        }
        Ok(())
    }
}

pub fn validate_form_length(length: usize) -> Result<usize, ConfigError> {
    if ALLOWED_FORM_LENGTHS.contains(&length) {
        Ok(length)
    } else {
        Err(ConfigError::InvalidFormLength(length))
    }
}

/// European seasons are named after the year they start in July.
pub fn current_season(today: NaiveDate) -> i32 {
    if today.month() >= 7 {
        today.year()
    } else {
        today.year() - 1
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR).join(DB_FILE));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(DATA_DIR)
            .join(DB_FILE),
    )
}

pub fn parse_ids(raw: &str) -> Vec<u32> {
    let ids = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|id| *id != 0)
        .collect::<Vec<_>>();
    dedup_ids(ids)
}

pub fn dedup_ids(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id) {
            out.push(id);
        }
    }
    out
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_env() {
        let cfg = config_from(&[("FORM_TRACKER_DB", "/tmp/x.sqlite")]).expect("config");
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.form_length, 5);
        assert_eq!(cfg.league_ids, vec![PREMIER_LEAGUE_ID]);
        assert_eq!(cfg.thresholds, Thresholds::default());
        assert_eq!(cfg.require_api_key(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn env_values_are_parsed_and_validated() {
        let cfg = config_from(&[
            ("API_FOOTBALL_KEY", " secret "),
            ("API_FOOTBALL_BASE_URL", "http://localhost:9000/"),
            ("FORM_TRACKER_SEASON", "2023"),
            ("FORM_TRACKER_LEAGUE_IDS", "39, 140;39 0"),
            ("FORM_LENGTH", "3"),
            ("PREDICTION_LEVEL1", "0.4"),
            ("PREDICTION_LEVEL2", "0.9"),
            ("FETCH_PARALLELISM", "100"),
        ])
        .expect("config");
        assert_eq!(cfg.require_api_key(), Ok("secret"));
        assert_eq!(cfg.base_url, "http://localhost:9000");
        assert_eq!(cfg.season, 2023);
        assert_eq!(cfg.league_ids, vec![39, 140]);
        assert_eq!(cfg.form_length, 3);
        assert_eq!(cfg.thresholds.level1(), 0.4);
        assert_eq!(cfg.fetch_parallelism, 32);

        assert_eq!(
            config_from(&[("FORM_LENGTH", "4")]),
            Err(ConfigError::InvalidFormLength(4))
        );
        assert!(matches!(
            config_from(&[("PREDICTION_LEVEL1", "1.5")]),
            Err(ConfigError::InvalidThresholds { .. })
        ));
        assert!(matches!(
            config_from(&[("FORM_TRACKER_SEASON", "next")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn overrides_win_over_env() {
        let mut cfg = config_from(&[]).expect("config");
        cfg.apply_overrides(&SettingsOverrides {
            level1: Some(0.3),
            level2: None,
            form_length: Some(3),
            leagues: Some(vec![78, 78, 61]),
        })
        .expect("overrides");
        assert_eq!(cfg.thresholds.level1(), 0.3);
        assert_eq!(cfg.thresholds.level2(), DEFAULT_LEVEL2);
        assert_eq!(cfg.form_length, 3);
        assert_eq!(cfg.league_ids, vec![78, 61]);

        let bad = SettingsOverrides {
            level1: Some(2.0),
            ..SettingsOverrides::default()
        };
        assert!(cfg.apply_overrides(&bad).is_err());
    }

    #[test]
    fn season_rolls_over_in_july() {
        let june = NaiveDate::from_ymd_opt(2025, 6, 30).expect("date");
        let july = NaiveDate::from_ymd_opt(2025, 7, 1).expect("date");
        assert_eq!(current_season(june), 2024);
        assert_eq!(current_season(july), 2025);
    }
}
