use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Selector meaning "every league in the catalog".
pub const ALL_LEAGUES: i64 = -1;

pub const PREMIER_LEAGUE_ID: u32 = 39;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeagueInfo {
    pub id: u32,
    pub name: &'static str,
    pub country: &'static str,
}

#[rustfmt::skip]
pub const LEAGUES: &[LeagueInfo] = &[
    LeagueInfo { id: 39, name: "Premier League", country: "England" },
    LeagueInfo { id: 140, name: "La Liga", country: "Spain" },
    LeagueInfo { id: 78, name: "Bundesliga", country: "Germany" },
    LeagueInfo { id: 135, name: "Serie A", country: "Italy" },
    LeagueInfo { id: 61, name: "Ligue 1", country: "France" },
    LeagueInfo { id: 88, name: "Eredivisie", country: "Netherlands" },
    LeagueInfo { id: 144, name: "Jupiler Pro League", country: "Belgium" },
    LeagueInfo { id: 94, name: "Primeira Liga", country: "Portugal" },
    LeagueInfo { id: 179, name: "Scottish Premiership", country: "Scotland" },
    LeagueInfo { id: 203, name: "Super Lig", country: "Turkey" },
    LeagueInfo { id: 207, name: "Swiss Super League", country: "Switzerland" },
    LeagueInfo { id: 113, name: "Allsvenskan", country: "Sweden" },
    LeagueInfo { id: 119, name: "Danish Superliga", country: "Denmark" },
    LeagueInfo { id: 103, name: "Eliteserien", country: "Norway" },
    LeagueInfo { id: 106, name: "Ekstraklasa", country: "Poland" },
    LeagueInfo { id: 152, name: "Czech First League", country: "Czech Republic" },
    LeagueInfo { id: 128, name: "Austrian Bundesliga", country: "Austria" },
    LeagueInfo { id: 319, name: "Slovakian Super Liga", country: "Slovakia" },
    LeagueInfo { id: 271, name: "Nemzeti Bajnoksag I", country: "Hungary" },
];

static BY_ID: Lazy<HashMap<u32, &'static LeagueInfo>> =
    Lazy::new(|| LEAGUES.iter().map(|l| (l.id, l)).collect());

pub fn league_info(id: u32) -> Option<&'static LeagueInfo> {
    BY_ID.get(&id).copied()
}

pub fn league_name(id: u32) -> String {
    league_info(id)
        .map(|l| l.name.to_string())
        .unwrap_or_else(|| format!("League {id}"))
}

pub fn all_league_ids() -> Vec<u32> {
    LEAGUES.iter().map(|l| l.id).collect()
}

/// Expands a selector (a league id or [`ALL_LEAGUES`]) into concrete ids.
pub fn resolve_selector(selector: i64) -> Vec<u32> {
    if selector == ALL_LEAGUES {
        return all_league_ids();
    }
    u32::try_from(selector)
        .ok()
        .filter(|id| *id != 0)
        .map(|id| vec![id])
        .unwrap_or_default()
}
