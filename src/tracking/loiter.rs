// src/tracking/loiter.rs
//
// Loitering is decided from the spatial spread of recent positions, not
// from continuous presence: someone walking through the frame covers a lot
// of ground, someone waiting by the door does not. No zone polygons needed.

use std::collections::VecDeque;

use crate::geometry::{bbox_center, distance};
use crate::types::Bbox;

/// Maximum retained position samples. 15 s of history at a 10 Hz detection
/// feed, the fastest rate the pipeline produces.
const POSITION_HISTORY_MAX: usize = 150;

/// Slack added to the loiter window when selecting recent samples.
const RECENT_WINDOW_BUFFER: f64 = 2.0;

/// Bounded ring of (timestamp, center) samples for one tracked person.
#[derive(Debug, Clone, Default)]
pub struct PositionHistory {
    samples: VecDeque<(f64, i32, i32)>,
}

impl PositionHistory {
    pub fn push(&mut self, bbox: &Bbox, now: f64) {
        let (cx, cy) = bbox_center(bbox);
        self.samples.push_back((now, cx, cy));
        while self.samples.len() > POSITION_HISTORY_MAX {
            self.samples.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// How long the person has stayed within `radius` of their current
    /// position, or None if they are still moving around (or the duration
    /// has not reached `loiter_time` yet).
    ///
    /// The spread check looks at samples from the last loiter window; the
    /// duration is measured back to the earliest sample still within the
    /// radius of the current position.
    pub fn loiter_duration(
        &self,
        current: &Bbox,
        loiter_time: f64,
        radius: f32,
        now: f64,
    ) -> Option<f64> {
        if self.samples.len() < 3 {
            return None;
        }

        let recent: Vec<&(f64, i32, i32)> = self
            .samples
            .iter()
            .filter(|(t, _, _)| now - t <= loiter_time + RECENT_WINDOW_BUFFER)
            .collect();
        if recent.len() < 2 {
            return None;
        }

        let x_min = recent.iter().map(|s| s.1).min().unwrap_or(0);
        let x_max = recent.iter().map(|s| s.1).max().unwrap_or(0);
        let y_min = recent.iter().map(|s| s.2).min().unwrap_or(0);
        let y_max = recent.iter().map(|s| s.2).max().unwrap_or(0);
        let x_range = (x_max - x_min) as f32;
        let y_range = (y_max - y_min) as f32;
        let spread = (x_range * x_range + y_range * y_range).sqrt();
        if spread > radius {
            return None;
        }

        // Walk the full history oldest-first: the first sample within the
        // radius of where they stand now marks when they entered this area.
        let center = bbox_center(current);
        let mut entered = recent[0].0;
        for (t, x, y) in &self.samples {
            if distance((*x, *y), center) <= radius {
                entered = *t;
                break;
            }
        }

        let duration = now - entered;
        if duration >= loiter_time {
            Some(duration)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_stationary(history: &mut PositionHistory, from: f64, to: f64, step: f64) {
        let mut t = from;
        while t < to {
            // a couple of pixels of bbox jitter
            let jitter = ((t * 10.0) as i32) % 3;
            history.push(&[100 + jitter, 100, 150 + jitter, 250], t);
            t += step;
        }
    }

    #[test]
    fn test_too_few_samples_is_not_loitering() {
        let mut history = PositionHistory::default();
        history.push(&[100, 100, 150, 250], 0.0);
        history.push(&[100, 100, 150, 250], 0.1);
        assert!(history
            .loiter_duration(&[100, 100, 150, 250], 10.0, 100.0, 0.2)
            .is_none());
    }

    #[test]
    fn test_standing_still_crosses_threshold() {
        let mut history = PositionHistory::default();
        feed_stationary(&mut history, 0.0, 10.5, 0.1);
        let duration = history.loiter_duration(&[100, 100, 150, 250], 10.0, 100.0, 10.5);
        assert!(duration.is_some());
        assert!(duration.unwrap() >= 10.0);
    }

    #[test]
    fn test_walking_through_is_not_loitering() {
        let mut history = PositionHistory::default();
        // 50 px per sample: sweeps across the frame
        for i in 0..40 {
            let x = i * 50;
            history.push(&[x, 100, x + 50, 250], i as f64 * 0.25);
        }
        assert!(history
            .loiter_duration(&[1950, 100, 2000, 250], 10.0, 100.0, 10.0)
            .is_none());
    }

    #[test]
    fn test_duration_counts_from_area_entry() {
        let mut history = PositionHistory::default();
        // First walk elsewhere for 5 s, then stand near the door
        for i in 0..10 {
            let x = 1000 - i * 60;
            history.push(&[x, 100, x + 50, 250], i as f64 * 0.5);
        }
        feed_stationary(&mut history, 5.0, 17.0, 0.5);
        let duration = history.loiter_duration(&[100, 100, 150, 250], 10.0, 100.0, 17.0);
        assert!(duration.is_some());
        // Entered the door area around t=5, so roughly 12 s, never 17
        let duration = duration.unwrap();
        assert!(duration >= 10.0 && duration < 14.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut history = PositionHistory::default();
        for i in 0..1000 {
            history.push(&[100, 100, 150, 250], i as f64 * 0.1);
        }
        assert_eq!(history.len(), POSITION_HISTORY_MAX);
    }
}
