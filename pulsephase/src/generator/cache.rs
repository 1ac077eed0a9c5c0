//! Single-entry cache of the last generated predictor.

use tracing::debug;

use crate::epoch::Mjd;
use crate::predictor::Predictor;

/// Holds the most recent predictor and the span it covers.
///
/// A request is served from the cache only when the cached span strictly
/// encloses it. Any change to generator settings must [`clear`](Self::clear)
/// the cache.
#[derive(Debug, Clone, Default)]
pub struct PredictorCache {
    entry: Option<CacheEntry>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    predictor: Predictor,
    start: Mjd,
    end: Mjd,
}

impl PredictorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached predictor, if it covers `(start, end)`.
    pub fn lookup(&mut self, start: &Mjd, end: &Mjd) -> Option<Predictor> {
        match &self.entry {
            Some(entry) if entry.start < *start && entry.end > *end => {
                self.hits += 1;
                debug!(start = %start, end = %end, "Predictor cache hit");
                Some(entry.predictor.clone())
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    /// Remember `predictor`. Empty predictors are not cached.
    pub fn store(&mut self, predictor: &Predictor) {
        self.entry = match (predictor.start_time(), predictor.end_time()) {
            (Some(start), Some(end)) => Some(CacheEntry {
                predictor: predictor.clone(),
                start,
                end,
            }),
            _ => None,
        };
    }

    pub fn clear(&mut self) {
        if self.entry.take().is_some() {
            debug!("Predictor cache cleared");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::Phase;
    use crate::predictor::Polyco;
    use crate::segment::Polynomial;

    fn day(n: i64) -> Mjd {
        Mjd::new(58000 + n, 0, 0.0)
    }

    /// A predictor spanning days 0 to 2.
    fn predictor() -> Predictor {
        Predictor::Polyco(Polyco::from_segments(vec![Polynomial::new(
            "J0437-4715",
            day(1),
            Phase::ZERO,
            173.7,
            vec![0.0],
        )
        .with_span(2880.0)]))
    }

    #[test]
    fn test_hit_requires_strict_enclosure() {
        let mut cache = PredictorCache::new();
        cache.store(&predictor());

        assert!(cache.lookup(&(day(0) + 1.0), &(day(2) - 1.0)).is_some());
        assert!(cache.lookup(&day(0), &day(1)).is_none());
        assert!(cache.lookup(&day(1), &day(2)).is_none());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_clear() {
        let mut cache = PredictorCache::new();
        cache.store(&predictor());
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.lookup(&(day(0) + 1.0), &(day(1))).is_none());
    }

    #[test]
    fn test_empty_predictor_not_cached() {
        let mut cache = PredictorCache::new();
        cache.store(&Predictor::Polyco(Polyco::new()));
        assert!(cache.is_empty());
    }
}
