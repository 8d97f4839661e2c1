use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

/// How volatile a cached response is; each tier has its own map and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTier {
    /// Live-ish data: single fixtures, next round.
    Short,
    /// Standings, teams, players, statistics.
    Medium,
    /// Whole-season fixture lists.
    Long,
}

impl CacheTier {
    pub const ALL: [CacheTier; 3] = [CacheTier::Short, CacheTier::Medium, CacheTier::Long];

    pub fn ttl(self) -> Duration {
        match self {
            CacheTier::Short => Duration::from_secs(15 * 60),
            CacheTier::Medium => Duration::from_secs(6 * 60 * 60),
            CacheTier::Long => Duration::from_secs(24 * 60 * 60),
        }
    }

    fn index(self) -> usize {
        match self {
            CacheTier::Short => 0,
            CacheTier::Medium => 1,
            CacheTier::Long => 2,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    body: Value,
    fetched_at: Instant,
}

/// In-memory response cache. Nothing is persisted across restarts.
#[derive(Debug, Default)]
pub struct ResponseCache {
    tiers: Mutex<[HashMap<String, CacheEntry>; 3]>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tier: CacheTier, key: &str) -> Option<Value> {
        self.get_at(tier, key, Instant::now())
    }

    /// Looks up `key`, evicting it when older than the tier's TTL at `now`.
    pub fn get_at(&self, tier: CacheTier, key: &str, now: Instant) -> Option<Value> {
        let mut guard = self.tiers.lock().unwrap_or_else(|e| e.into_inner());
        let map = &mut guard[tier.index()];
        let entry = map.get(key)?;
        if now.saturating_duration_since(entry.fetched_at) < tier.ttl() {
            return Some(entry.body.clone());
        }
        map.remove(key);
        None
    }

    pub fn insert(&self, tier: CacheTier, key: &str, body: Value) {
        self.insert_at(tier, key, body, Instant::now());
    }

    /// Stores `body` and drops entries of the tier that expired by `fetched_at`.
    pub fn insert_at(&self, tier: CacheTier, key: &str, body: Value, fetched_at: Instant) {
        let mut guard = self.tiers.lock().unwrap_or_else(|e| e.into_inner());
        let map = &mut guard[tier.index()];
        let ttl = tier.ttl();
        map.retain(|_, entry| fetched_at.saturating_duration_since(entry.fetched_at) < ttl);
        map.insert(key.to_string(), CacheEntry { body, fetched_at });
    }

    pub fn len(&self, tier: CacheTier) -> usize {
        let guard = self.tiers.lock().unwrap_or_else(|e| e.into_inner());
        guard[tier.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        CacheTier::ALL.iter().all(|tier| self.len(*tier) == 0)
    }

    pub fn clear(&self) {
        let mut guard = self.tiers.lock().unwrap_or_else(|e| e.into_inner());
        for map in guard.iter_mut() {
            map.clear();
        }
    }
}

/// Stable key for a request: path plus params sorted by name.
pub fn request_signature(path: &str, params: &[(&str, String)]) -> String {
    let sorted: BTreeMap<&str, &str> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let query = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{query}")
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use serde_json::json;

    use super::{CacheTier, ResponseCache, request_signature};

    #[test]
    fn entries_expire_per_tier() {
        let cache = ResponseCache::new();
        let t0 = Instant::now();
        cache.insert_at(CacheTier::Short, "k", json!({"a": 1}), t0);
        cache.insert_at(CacheTier::Long, "k", json!({"a": 2}), t0);

        let later = t0 + Duration::from_secs(16 * 60);
        assert!(cache.get_at(CacheTier::Short, "k", later).is_none());
        assert_eq!(cache.len(CacheTier::Short), 0);
        assert_eq!(
            cache.get_at(CacheTier::Long, "k", later),
            Some(json!({"a": 2}))
        );

        let next_day = t0 + Duration::from_secs(24 * 60 * 60);
        assert!(cache.get_at(CacheTier::Long, "k", next_day).is_none());
    }

    #[test]
    fn inserts_sweep_expired_entries_of_the_tier() {
        let cache = ResponseCache::new();
        let t0 = Instant::now();
        cache.insert_at(CacheTier::Short, "old", json!(1), t0);
        cache.insert_at(CacheTier::Medium, "old", json!(1), t0);

        let later = t0 + Duration::from_secs(20 * 60);
        cache.insert_at(CacheTier::Short, "new", json!(2), later);
        assert_eq!(cache.len(CacheTier::Short), 1);
        assert_eq!(cache.get_at(CacheTier::Short, "new", later), Some(json!(2)));
        assert_eq!(cache.len(CacheTier::Medium), 1, "other tiers are left alone");
    }

    #[test]
    fn tiers_are_independent() {
        let cache = ResponseCache::new();
        cache.insert(CacheTier::Medium, "standings", json!([1]));
        assert!(cache.get(CacheTier::Short, "standings").is_none());
        assert!(cache.get(CacheTier::Medium, "standings").is_some());
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn signature_ignores_param_order() {
        let a = request_signature(
            "/fixtures",
            &[("season", "2024".to_string()), ("league", "39".to_string())],
        );
        let b = request_signature(
            "/fixtures",
            &[("league", "39".to_string()), ("season", "2024".to_string())],
        );
        assert_eq!(a, b);
        assert_eq!(a, "/fixtures?league=39&season=2024");
    }
}
