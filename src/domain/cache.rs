//! Injected memo for strength scores.
//!
//! Keys are `(kind, symbol, evaluation_date, window)` and each key is written at
//! most once, so dates evaluated in parallel can share one cache.

use crate::domain::error::RotatorError;
use crate::domain::indicator::StrengthPoint;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::RwLock;

/// Index and stock codes can overlap, so the key records which kind of
/// series the symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesKind {
    Index,
    Stock,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrengthKey {
    pub kind: SeriesKind,
    pub symbol: String,
    pub evaluation_date: NaiveDate,
    pub window: usize,
}

#[derive(Debug, Default)]
pub struct StrengthCache {
    entries: RwLock<HashMap<StrengthKey, StrengthPoint>>,
}

impl StrengthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &StrengthKey) -> Option<StrengthPoint> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .copied()
    }

    /// Stores `point` unless the key is already present. Returns the value
    /// held by the cache afterwards.
    pub fn insert(&self, key: StrengthKey, point: StrengthPoint) -> StrengthPoint {
        *self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key)
            .or_insert(point)
    }

    /// Returns the cached point or computes, stores and returns it. Errors
    /// are not cached.
    pub fn get_or_compute<F>(&self, key: StrengthKey, compute: F) -> Result<StrengthPoint, RotatorError>
    where
        F: FnOnce() -> Result<StrengthPoint, RotatorError>,
    {
        if let Some(point) = self.get(&key) {
            return Ok(point);
        }
        let point = compute()?;
        Ok(self.insert(key, point))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(symbol: &str, day: u32) -> StrengthKey {
        StrengthKey {
            kind: SeriesKind::Index,
            symbol: symbol.into(),
            evaluation_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            window: 5,
        }
    }

    fn point(day: u32, score: f64) -> StrengthPoint {
        StrengthPoint {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            score,
        }
    }

    #[test]
    fn first_insert_wins() {
        let cache = StrengthCache::new();
        assert_eq!(cache.insert(key("A", 5), point(5, 60.0)).score, 60.0);
        assert_eq!(cache.insert(key("A", 5), point(5, 99.0)).score, 60.0);
        assert_eq!(cache.get(&key("A", 5)).map(|p| p.score), Some(60.0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn get_or_compute_runs_once() {
        let cache = StrengthCache::new();
        let mut calls = 0;
        let first = cache.get_or_compute(key("A", 5), || {
            calls += 1;
            Ok(point(5, 70.0))
        });
        assert_eq!(first.unwrap().score, 70.0);
        let second = cache.get_or_compute(key("A", 5), || panic!("should be cached"));
        assert_eq!(second.unwrap().score, 70.0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = StrengthCache::new();
        let result = cache.get_or_compute(key("A", 5), || {
            Err(RotatorError::InsufficientData {
                symbol: "A".into(),
                bars: 1,
                required: 6,
            })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_distinguish_kind() {
        let cache = StrengthCache::new();
        cache.insert(key("000015", 5), point(5, 60.0));
        let stock_key = StrengthKey {
            kind: SeriesKind::Stock,
            ..key("000015", 5)
        };
        assert!(cache.get(&stock_key).is_none());
    }

    #[test]
    fn keys_distinguish_dates() {
        let cache = StrengthCache::new();
        cache.insert(key("A", 5), point(5, 60.0));
        assert!(cache.get(&key("A", 6)).is_none());
    }

    #[test]
    fn shared_across_threads() {
        let cache = StrengthCache::new();
        std::thread::scope(|s| {
            for day in 1..=8u32 {
                let cache = &cache;
                s.spawn(move || {
                    cache.insert(key("A", day), point(day, day as f64));
                });
            }
        });
        assert_eq!(cache.len(), 8);
    }
}
