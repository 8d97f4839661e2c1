use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FixtureStatus {
    NotStarted,
    TimeToBeDefined,
    Live,
    Finished,
    FinishedAfterExtraTime,
    FinishedAfterPenalties,
    Postponed,
    Suspended,
    Cancelled,
    Abandoned,
    Awarded,
    Other(String),
}

impl FixtureStatus {
    /// Maps an API-Football short status code (`NS`, `FT`, `AET`, ...).
    pub fn from_short(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "NS" => Self::NotStarted,
            "TBD" => Self::TimeToBeDefined,
            "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "INT" | "LIVE" => Self::Live,
            "FT" => Self::Finished,
            "AET" => Self::FinishedAfterExtraTime,
            "PEN" => Self::FinishedAfterPenalties,
            "PST" => Self::Postponed,
            "SUSP" => Self::Suspended,
            "CANC" => Self::Cancelled,
            "ABD" => Self::Abandoned,
            "AWD" | "WO" => Self::Awarded,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn short_code(&self) -> &str {
        match self {
            Self::NotStarted => "NS",
            Self::TimeToBeDefined => "TBD",
            Self::Live => "LIVE",
            Self::Finished => "FT",
            Self::FinishedAfterExtraTime => "AET",
            Self::FinishedAfterPenalties => "PEN",
            Self::Postponed => "PST",
            Self::Suspended => "SUSP",
            Self::Cancelled => "CANC",
            Self::Abandoned => "ABD",
            Self::Awarded => "AWD",
            Self::Other(code) => code,
        }
    }

    /// Played to a result on the pitch. Awarded matches are excluded.
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::FinishedAfterExtraTime | Self::FinishedAfterPenalties
        )
    }

    pub fn is_upcoming(&self) -> bool {
        matches!(self, Self::NotStarted | Self::TimeToBeDefined)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub id: u64,
    pub league_id: u32,
    pub season: Option<i32>,
    pub round: Option<String>,
    pub home_team_id: u32,
    pub home_team_name: String,
    pub away_team_id: u32,
    pub away_team_name: String,
    pub kickoff: DateTime<Utc>,
    pub venue: Option<String>,
    pub status: FixtureStatus,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
}

impl Fixture {
    pub fn involves(&self, team_id: u32) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    pub fn role_of(&self, team_id: u32) -> Option<TeamRole> {
        if self.home_team_id == team_id {
            Some(TeamRole::Home)
        } else if self.away_team_id == team_id {
            Some(TeamRole::Away)
        } else {
            None
        }
    }

    pub fn score(&self) -> Option<(i32, i32)> {
        Some((self.home_goals?, self.away_goals?))
    }

    pub fn match_date(&self) -> NaiveDate {
        self.kickoff.date_naive()
    }

    /// Completed with both scores known.
    pub fn final_score(&self) -> Option<(i32, i32)> {
        if !self.status.is_completed() {
            return None;
        }
        self.score()
    }

    pub fn opponent_of(&self, team_id: u32) -> Option<(u32, &str)> {
        match self.role_of(team_id)? {
            TeamRole::Home => Some((self.away_team_id, self.away_team_name.as_str())),
            TeamRole::Away => Some((self.home_team_id, self.home_team_name.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    pub league_id: u32,
    pub country: Option<String>,
    pub founded: Option<i32>,
    pub venue_name: Option<String>,
    pub venue_capacity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub league_id: u32,
    pub team_id: u32,
    pub team_name: String,
    pub rank: u32,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub goals_for: i32,
    pub goals_against: i32,
    pub goal_diff: i32,
    pub points: i32,
    pub form: Option<String>,
}

impl Standing {
    /// Season points per game; `None` before the team has played.
    pub fn points_per_game(&self) -> Option<f64> {
        if self.played == 0 {
            return None;
        }
        Some(f64::from(self.points) / f64::from(self.played))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub team_id: u32,
    pub position: Option<String>,
    pub age: Option<u32>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeamRole {
    Home,
    Away,
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamRole::Home => f.write_str("Home"),
            TeamRole::Away => f.write_str("Away"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    pub fn points(self) -> u32 {
        match self {
            Outcome::Win => 3,
            Outcome::Draw => 1,
            Outcome::Loss => 0,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Draw => 'D',
            Outcome::Loss => 'L',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Draw => "DRAW",
            Outcome::Loss => "LOSS",
        }
    }

    /// Result for the side that scored `goals_for`.
    pub fn from_goals(goals_for: i32, goals_against: i32) -> Self {
        if goals_for > goals_against {
            Outcome::Win
        } else if goals_for < goals_against {
            Outcome::Loss
        } else {
            Outcome::Draw
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WIN" | "W" => Ok(Outcome::Win),
            "DRAW" | "D" => Ok(Outcome::Draw),
            "LOSS" | "LOSE" | "L" => Ok(Outcome::Loss),
            other => Err(format!("unknown outcome {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictionLabel {
    pub outcome: Outcome,
    pub big: bool,
}

impl PredictionLabel {
    pub fn level(self) -> u8 {
        if self.big { 2 } else { 1 }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.big {
            write!(f, "BIG {}", self.outcome)
        } else {
            write!(f, "{}", self.outcome)
        }
    }
}

impl FromStr for PredictionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("BIG ") {
            return Ok(PredictionLabel {
                outcome: rest.parse()?,
                big: true,
            });
        }
        Ok(PredictionLabel {
            outcome: upper.parse()?,
            big: false,
        })
    }
}

/// A prediction ready to be stored; the row id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrediction {
    pub team_id: u32,
    pub team_name: String,
    pub league_id: u32,
    pub league_name: String,
    pub fixture_id: u64,
    pub opponent_id: u32,
    pub opponent_name: String,
    pub match_date: NaiveDate,
    pub venue: Option<String>,
    pub performance_diff: f64,
    pub label: PredictionLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: i64,
    pub team_id: u32,
    pub team_name: String,
    pub league_id: u32,
    pub league_name: String,
    pub fixture_id: u64,
    pub opponent_id: u32,
    pub opponent_name: String,
    pub match_date: NaiveDate,
    pub venue: Option<String>,
    pub performance_diff: f64,
    pub label: PredictionLabel,
    pub level: u8,
    pub result: Option<Outcome>,
    pub correct: Option<bool>,
    pub created_at: String,
}
