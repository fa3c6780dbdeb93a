// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::types::ObjectClass;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

/// All tracking thresholds. Times are seconds, distances are pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Minimum IoU to match a detection to an existing track
    pub iou_threshold: f32,
    /// Additive match-score bonus when classification signatures agree
    pub signature_bonus: f32,

    /// Seconds a person must stay within `loiter_radius_px` to be dwelling
    pub loiter_time: f64,
    /// Maximum position spread that still counts as staying in one area
    pub loiter_radius_px: f32,

    /// Dwell time before a vehicle counts as stopped
    pub vehicle_stop_time: f64,
    /// Stationary time before a stopped vehicle is promoted to parked
    pub parking_time: f64,
    /// Unseen time before a stopped vehicle is silently dropped
    pub stopped_gone_timeout: f64,
    /// Unseen time before a parked vehicle fires vehicle_left (tolerant of
    /// detector flicker)
    pub parked_gone_timeout: f64,
    /// Delay after startup before visible vehicles register directly as parked
    pub startup_scan_delay: f64,
    /// Grid cell size for stationary-vehicle position keys
    pub grid_cell_px: i32,
    /// Fresh new-vehicle detections at one cell that auto-register it parked
    pub repeat_detection_threshold: usize,
    /// Window for the repeat-detection counter
    pub repeat_detection_window: f64,

    /// Track staleness for vehicles (detectors flicker more on vehicles)
    pub vehicle_stale_timeout: f64,
    /// Track staleness for people
    pub person_stale_timeout: f64,

    /// Minimum interval between events of the same type
    pub event_cooldown: f64,
    /// Global cap: events allowed per rolling 60 s window
    pub max_events_per_minute: usize,
    /// Cooldown before the same spot may fire another detected event
    pub location_cooldown: f64,
    /// Overlap that counts as "same spot" for location dedup
    pub location_iou_threshold: f32,
    /// Extra cooldown between vehicle_detected events (moving vehicles sweep
    /// across many locations)
    pub vehicle_detected_cooldown: f64,
    /// Extra cooldown between person_detected events
    pub person_detected_cooldown: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            signature_bonus: 0.3,
            loiter_time: 10.0,
            loiter_radius_px: 100.0,
            vehicle_stop_time: 5.0,
            parking_time: 180.0, // 3 minutes stationary = parked
            stopped_gone_timeout: 20.0,
            parked_gone_timeout: 60.0,
            startup_scan_delay: 10.0,
            grid_cell_px: 40,
            repeat_detection_threshold: 2,
            repeat_detection_window: 120.0,
            vehicle_stale_timeout: 5.0,
            person_stale_timeout: 3.0,
            event_cooldown: 30.0,
            max_events_per_minute: 3,
            location_cooldown: 30.0,
            location_iou_threshold: 0.5,
            vehicle_detected_cooldown: 10.0,
            person_detected_cooldown: 30.0,
        }
    }
}

impl TrackingConfig {
    /// Per-class track staleness window. Packages share the vehicle timeout;
    /// they sit still and flicker the same way.
    pub fn stale_timeout(&self, class: ObjectClass) -> f64 {
        match class {
            ObjectClass::Person => self.person_stale_timeout,
            _ => self.vehicle_stale_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = TrackingConfig::default();
        assert_eq!(cfg.iou_threshold, 0.3);
        assert_eq!(cfg.loiter_time, 10.0);
        assert_eq!(cfg.parking_time, 180.0);
        assert_eq!(cfg.max_events_per_minute, 3);
        assert_eq!(cfg.grid_cell_px, 40);
        assert_eq!(cfg.stale_timeout(ObjectClass::Person), 3.0);
        assert_eq!(cfg.stale_timeout(ObjectClass::Car), 5.0);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "tracking:\n  parking_time: 60.0\nlogging:\n  level: debug\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tracking.parking_time, 60.0);
        assert_eq!(config.tracking.loiter_time, 10.0); // untouched default
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_yaml_is_all_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.tracking.event_cooldown, 30.0);
        assert_eq!(config.logging.level, "info");
    }
}
