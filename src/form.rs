use serde::{Deserialize, Serialize};

use crate::model::{Fixture, Outcome};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamForm {
    /// Oldest first.
    pub results: Vec<Outcome>,
    pub points: u32,
    pub matches_analyzed: usize,
    pub goals_for: i32,
    pub goals_against: i32,
}

impl TeamForm {
    /// Points per game over the analyzed window. `None` when the team has no
    /// completed match in the window, so "no data" never reads as 0.0 PPG.
    pub fn form_ppg(&self) -> Option<f64> {
        if self.matches_analyzed == 0 {
            return None;
        }
        Some(f64::from(self.points) / self.matches_analyzed as f64)
    }

    pub fn form_string(&self) -> String {
        self.results
            .iter()
            .map(|r| r.letter().to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn wins(&self) -> usize {
        self.results.iter().filter(|r| **r == Outcome::Win).count()
    }

    pub fn draws(&self) -> usize {
        self.results.iter().filter(|r| **r == Outcome::Draw).count()
    }
}

/// Form over the team's `lookback` most recent completed fixtures.
///
/// Fixtures not involving the team, not completed, or missing a score are
/// ignored. A lookback of zero analyzes nothing.
pub fn analyze_team_form(fixtures: &[Fixture], team_id: u32, lookback: usize) -> TeamForm {
    let mut played: Vec<&Fixture> = fixtures
        .iter()
        .filter(|f| f.involves(team_id))
        .filter(|f| f.final_score().is_some())
        .collect();

    played.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then(a.id.cmp(&b.id)));
    let start = played.len().saturating_sub(lookback);

    let mut form = TeamForm::default();
    for fixture in &played[start..] {
        let Some((home_goals, away_goals)) = fixture.final_score() else {
            continue;
        };
        let (goals_for, goals_against) = if fixture.home_team_id == team_id {
            (home_goals, away_goals)
        } else {
            (away_goals, home_goals)
        };
        let outcome = Outcome::from_goals(goals_for, goals_against);
        form.points += outcome.points();
        form.goals_for += goals_for;
        form.goals_against += goals_against;
        form.results.push(outcome);
        form.matches_analyzed += 1;
    }
    form
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::analyze_team_form;
    use crate::model::{Fixture, FixtureStatus, Outcome};

    fn played(id: u64, day: u32, home: u32, away: u32, hg: i32, ag: i32) -> Fixture {
        Fixture {
            id,
            league_id: 39,
            season: Some(2024),
            round: None,
            home_team_id: home,
            home_team_name: format!("T{home}"),
            away_team_id: away,
            away_team_name: format!("T{away}"),
            kickoff: Utc
                .with_ymd_and_hms(2024, 9, day, 15, 0, 0)
                .single()
                .expect("valid date"),
            venue: None,
            status: FixtureStatus::Finished,
            home_goals: Some(hg),
            away_goals: Some(ag),
        }
    }

    #[test]
    fn takes_most_recent_window_from_team_perspective() {
        let fixtures = vec![
            played(1, 1, 10, 20, 0, 3),
            played(2, 8, 30, 10, 1, 2),
            played(3, 15, 10, 40, 1, 1),
            played(4, 22, 50, 10, 2, 0),
            played(5, 29, 60, 70, 4, 0),
        ];
        let form = analyze_team_form(&fixtures, 10, 3);
        assert_eq!(form.matches_analyzed, 3);
        assert_eq!(
            form.results,
            vec![Outcome::Win, Outcome::Draw, Outcome::Loss]
        );
        assert_eq!(form.points, 4);
        assert_eq!(form.goals_for, 3);
        assert_eq!(form.goals_against, 4);
        assert_eq!(form.form_string(), "W D L");
        let ppg = form.form_ppg().expect("ppg");
        assert!((ppg - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ignores_unfinished_and_scoreless_rows() {
        let mut upcoming = played(7, 20, 10, 20, 0, 0);
        upcoming.status = FixtureStatus::NotStarted;
        upcoming.home_goals = None;
        upcoming.away_goals = None;
        let mut awarded = played(8, 21, 10, 20, 3, 0);
        awarded.status = FixtureStatus::Awarded;

        let fixtures = vec![played(6, 2, 20, 10, 0, 1), upcoming, awarded];
        let form = analyze_team_form(&fixtures, 10, 5);
        assert_eq!(form.matches_analyzed, 1);
        assert_eq!(form.points, 3);
    }

    #[test]
    fn no_matches_means_no_ppg() {
        let form = analyze_team_form(&[played(1, 1, 1, 2, 1, 0)], 99, 5);
        assert_eq!(form.matches_analyzed, 0);
        assert_eq!(form.form_ppg(), None);

        let zero_lookback = analyze_team_form(&[played(1, 1, 1, 2, 1, 0)], 1, 0);
        assert_eq!(zero_lookback.form_ppg(), None);
    }

    #[test]
    fn losing_run_has_zero_ppg_not_none() {
        let fixtures = vec![played(1, 1, 10, 20, 0, 1), played(2, 2, 20, 10, 2, 0)];
        let form = analyze_team_form(&fixtures, 10, 5);
        assert_eq!(form.form_ppg(), Some(0.0));
    }
}
