use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Outcome, PredictionLabel, TeamRole};

pub const DEFAULT_LEVEL1: f64 = 0.6;
pub const DEFAULT_LEVEL2: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    level1: f64,
    level2: f64,
}

impl Thresholds {
    pub fn new(level1: f64, level2: f64) -> Result<Self, ConfigError> {
        let valid = level1.is_finite() && level2.is_finite() && level1 >= 0.0 && level1 < level2;
        if !valid {
            return Err(ConfigError::InvalidThresholds { level1, level2 });
        }
        Ok(Self { level1, level2 })
    }

    pub fn level1(&self) -> f64 {
        self.level1
    }

    pub fn level2(&self) -> f64 {
        self.level2
    }

    /// Whether a performance diff is large enough to report at all.
    pub fn is_significant(&self, performance_diff: f64) -> bool {
        performance_diff.abs() > self.level1
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            level1: DEFAULT_LEVEL1,
            level2: DEFAULT_LEVEL2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub label: PredictionLabel,
    pub level: u8,
    pub performance_diff: f64,
}

/// Form PPG minus season PPG, rounded to two decimals.
pub fn performance_diff(current_ppg: f64, form_ppg: f64) -> f64 {
    round2(form_ppg - current_ppg)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Label for a team whose form deviates from its season average.
///
/// Home sides keep the sign (overperforming -> WIN, underperforming -> LOSS);
/// away sides take the mirrored outcome.
pub fn label_for(
    performance_diff: f64,
    role: TeamRole,
    thresholds: &Thresholds,
) -> Option<PredictionLabel> {
    if !performance_diff.is_finite() || !thresholds.is_significant(performance_diff) {
        return None;
    }
    let big = performance_diff.abs() > thresholds.level2;
    let overperforming = performance_diff > 0.0;
    let outcome = match (role, overperforming) {
        (TeamRole::Home, true) | (TeamRole::Away, false) => Outcome::Win,
        (TeamRole::Home, false) | (TeamRole::Away, true) => Outcome::Loss,
    };
    Some(PredictionLabel { outcome, big })
}

pub fn generate(
    current_ppg: f64,
    form_ppg: f64,
    role: TeamRole,
    thresholds: &Thresholds,
) -> Option<Signal> {
    let diff = performance_diff(current_ppg, form_ppg);
    let label = label_for(diff, role, thresholds)?;
    Some(Signal {
        label,
        level: label.level(),
        performance_diff: diff,
    })
}

/// Result of a finished match for the team playing in `role`.
pub fn actual_outcome(home_goals: i32, away_goals: i32, role: TeamRole) -> Outcome {
    match role {
        TeamRole::Home => Outcome::from_goals(home_goals, away_goals),
        TeamRole::Away => Outcome::from_goals(away_goals, home_goals),
    }
}

/// The BIG prefix does not take part in the comparison.
pub fn is_correct(label: PredictionLabel, actual: Outcome) -> bool {
    label.outcome == actual
}
