// src/tracking/rate_limit.rs
//
// Two gates in front of event emission:
//   RateLimiter:   per-event-type cooldown + global sliding-window cap
//   LocationDedup: per-category "same spot fired recently" suppression
//
// Both are check-and-consume: a passing check records the fire/sighting.

use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::debug;

use crate::geometry::iou;
use crate::types::{Bbox, Category, EventType};

/// Length of the global rate-limit window.
const GLOBAL_WINDOW: f64 = 60.0;

pub struct RateLimiter {
    cooldown: f64,
    max_per_window: usize,
    last_fired: HashMap<&'static str, f64>,
    fired_times: VecDeque<f64>,
}

impl RateLimiter {
    pub fn new(cooldown: f64, max_per_window: usize) -> Self {
        Self {
            cooldown,
            max_per_window,
            last_fired: HashMap::new(),
            fired_times: VecDeque::new(),
        }
    }

    /// Whether `event_type` may fire at `now`. A pass is recorded; callers
    /// must only call this when they intend to fire. Firing exactly at the
    /// cooldown boundary is allowed.
    pub fn allow(&mut self, event_type: EventType, now: f64) -> bool {
        if let Some(&last) = self.last_fired.get(event_type.as_str()) {
            if now - last < self.cooldown {
                return false;
            }
        }

        while matches!(self.fired_times.front(), Some(&t) if now - t >= GLOBAL_WINDOW) {
            self.fired_times.pop_front();
        }
        if self.fired_times.len() >= self.max_per_window {
            debug!(
                "rate limited: {} events in the last minute",
                self.fired_times.len()
            );
            return false;
        }

        self.last_fired.insert(event_type.as_str(), now);
        self.fired_times.push_back(now);
        true
    }
}

struct RecentLocation {
    bbox: Bbox,
    last_seen: f64,
}

/// Suppresses repeat "detected" events for the same spot. Detector flicker
/// at a doorway would otherwise produce a burst of near-duplicate events.
pub struct LocationDedup {
    cooldown: f64,
    iou_threshold: f32,
    recent: BTreeMap<Category, Vec<RecentLocation>>,
}

impl LocationDedup {
    pub fn new(cooldown: f64, iou_threshold: f32) -> Self {
        Self {
            cooldown,
            iou_threshold,
            recent: BTreeMap::new(),
        }
    }

    /// True when this location has not fired within the cooldown window.
    /// A rejected sighting still refreshes the matching entry, so a
    /// persistently visible object stays suppressed instead of re-firing
    /// every cooldown period.
    pub fn is_new_location(&mut self, category: Category, bbox: &Bbox, now: f64) -> bool {
        let entries = self.recent.entry(category).or_default();
        entries.retain(|entry| now - entry.last_seen < self.cooldown);

        for entry in entries.iter_mut() {
            if iou(&entry.bbox, bbox) >= self.iou_threshold {
                entry.last_seen = now;
                return false;
            }
        }

        entries.push(RecentLocation {
            bbox: *bbox,
            last_seen: now,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_boundary_is_inclusive() {
        let mut limiter = RateLimiter::new(30.0, 100);
        assert!(limiter.allow(EventType::PersonDetected, 100.0));
        // Strictly inside the cooldown: rejected
        assert!(!limiter.allow(EventType::PersonDetected, 129.9));
        // Exactly at the boundary: accepted
        assert!(limiter.allow(EventType::PersonDetected, 130.0));
    }

    #[test]
    fn test_per_type_cooldowns_are_independent() {
        let mut limiter = RateLimiter::new(30.0, 100);
        assert!(limiter.allow(EventType::PersonDetected, 100.0));
        assert!(limiter.allow(EventType::VehicleDetected, 101.0));
        assert!(!limiter.allow(EventType::PersonDetected, 101.0));
    }

    #[test]
    fn test_global_cap_rejects_fourth_event_in_window() {
        let mut limiter = RateLimiter::new(0.0, 3);
        assert!(limiter.allow(EventType::PersonDetected, 0.0));
        assert!(limiter.allow(EventType::VehicleDetected, 1.0));
        assert!(limiter.allow(EventType::PackageDetected, 2.0));
        // Fourth event inside the rolling minute: rejected even though its
        // own per-type cooldown passes
        assert!(!limiter.allow(EventType::VehicleParked, 3.0));
        // Once the first fire ages out of the window it is allowed again
        assert!(limiter.allow(EventType::VehicleParked, 60.5));
    }

    #[test]
    fn test_rejected_event_does_not_consume() {
        let mut limiter = RateLimiter::new(30.0, 2);
        assert!(limiter.allow(EventType::PersonDetected, 0.0));
        assert!(!limiter.allow(EventType::PersonDetected, 10.0));
        // The rejected attempt must not have reset the cooldown clock
        assert!(limiter.allow(EventType::PersonDetected, 30.0));
    }

    #[test]
    fn test_dedup_suppresses_same_spot() {
        let mut dedup = LocationDedup::new(30.0, 0.5);
        let spot = [100, 100, 200, 200];
        assert!(dedup.is_new_location(Category::Package, &spot, 0.0));
        // Slightly jittered box at the same spot, inside the window
        assert!(!dedup.is_new_location(Category::Package, &[105, 102, 205, 203], 5.0));
        assert!(!dedup.is_new_location(Category::Package, &spot, 29.0));
    }

    #[test]
    fn test_dedup_rejection_refreshes_entry() {
        let mut dedup = LocationDedup::new(30.0, 0.5);
        let spot = [0, 0, 100, 100];
        assert!(dedup.is_new_location(Category::Person, &spot, 0.0));
        assert!(!dedup.is_new_location(Category::Person, &spot, 25.0));
        // 35 s after first sighting but only 10 s after the refresh
        assert!(!dedup.is_new_location(Category::Person, &spot, 35.0));
        // A full quiet cooldown later it fires again
        assert!(dedup.is_new_location(Category::Person, &spot, 70.0));
    }

    #[test]
    fn test_dedup_categories_are_independent() {
        let mut dedup = LocationDedup::new(30.0, 0.5);
        let spot = [0, 0, 100, 100];
        assert!(dedup.is_new_location(Category::Person, &spot, 0.0));
        assert!(dedup.is_new_location(Category::Vehicle, &spot, 1.0));
    }

    #[test]
    fn test_dedup_distinct_spot_fires() {
        let mut dedup = LocationDedup::new(30.0, 0.5);
        assert!(dedup.is_new_location(Category::Vehicle, &[0, 0, 100, 100], 0.0));
        assert!(dedup.is_new_location(Category::Vehicle, &[300, 0, 400, 100], 1.0));
    }
}
