// src/tracking/parking.rs
//
// Stationary-vehicle state machine: absent -> stopped -> parked -> absent.
// Records are keyed by a coarse grid cell of the bbox center so a vehicle
// can drift a few pixels and still count as the same physical car. Matching
// against live detections is deliberately lenient (IoU OR signature OR
// color); a missed match here produces duplicate parked/left spam, which
// is worse than occasionally merging two nearby vehicles.

use std::collections::BTreeMap;
use tracing::{debug, info};

use super::camera::CameraState;
use crate::config::TrackingConfig;
use crate::geometry::{bbox_center, iou};
use crate::types::{Bbox, Detection, Event, EventType, ObjectClass, ObjectStatus, ParkingStats, TrackStatus};

/// Grid cell key for a stationary-vehicle position.
pub type Cell = (i32, i32);

// Lenient match thresholds against live detections.
const STATIONARY_MATCH_IOU: f32 = 0.15;
const COLOR_MATCH_MIN_IOU: f32 = 0.05;

/// Stationary events carry a nominal confidence; the record may outlive
/// the detection that created it by minutes.
const STATIONARY_EVENT_CONFIDENCE: f32 = 0.9;

#[derive(Debug, Clone)]
struct StationaryVehicle {
    bbox: Bbox,
    first_seen: f64,
    last_seen: f64,
    class: ObjectClass,
    signature: Option<String>,
    color: Option<String>,
    description: Option<String>,
}

impl StationaryVehicle {
    fn from_detection(det: &Detection, now: f64) -> Self {
        Self {
            bbox: det.bbox,
            first_seen: now,
            last_seen: now,
            class: det.class,
            signature: det.signature.clone(),
            color: det.color.clone(),
            description: det.description.clone(),
        }
    }

    fn matches(&self, det: &Detection) -> bool {
        let overlap = iou(&det.bbox, &self.bbox);
        let sig_match = match (&det.signature, &self.signature) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        let color_match = match (&det.color, &self.color) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
        overlap >= STATIONARY_MATCH_IOU || sig_match || (color_match && overlap >= COLOR_MATCH_MIN_IOU)
    }

    fn refresh(&mut self, det: &Detection, now: f64) {
        self.last_seen = now;
        self.bbox = det.bbox;
        if self.signature.is_none() && det.signature.is_some() {
            self.signature = det.signature.clone();
        }
        if self.color.is_none() && det.color.is_some() {
            self.color = det.color.clone();
        }
        if det.description.is_some() {
            self.description = det.description.clone();
        }
    }

    fn describe(&self, verb: &str) -> String {
        match self.color.as_deref() {
            Some(color) if !color.is_empty() => {
                format!("{} {} {}", color, self.class.as_str(), verb)
            }
            _ => format!("{} {}", self.class.as_str(), verb),
        }
    }

    fn event(&self, event_type: EventType, now: f64, verb: &str, duration: f64) -> Event {
        let mut event = Event::new(
            event_type,
            now,
            self.class,
            STATIONARY_EVENT_CONFIDENCE,
            self.bbox,
        )
        .with_meta("parked_duration", duration);
        event.color = self.color.clone();
        event.description = Some(self.describe(verb));
        event
    }
}

pub struct ParkingMonitor {
    grid_cell_px: i32,
    parking_time: f64,
    stopped_gone_timeout: f64,
    parked_gone_timeout: f64,
    startup_scan_delay: f64,
    repeat_threshold: usize,
    repeat_window: f64,

    stopped: BTreeMap<Cell, StationaryVehicle>,
    parked: BTreeMap<Cell, StationaryVehicle>,
    /// Fresh new-vehicle detection timestamps per cell; repeated losses and
    /// re-acquisitions at one spot are themselves evidence of a parked car.
    detection_history: BTreeMap<Cell, Vec<f64>>,

    started_at: Option<f64>,
    startup_scan_done: bool,

    camera_has_moved: bool,
    settle_rescan_done: bool,
    camera_move_logged: bool,
}

impl ParkingMonitor {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            grid_cell_px: config.grid_cell_px,
            parking_time: config.parking_time,
            stopped_gone_timeout: config.stopped_gone_timeout,
            parked_gone_timeout: config.parked_gone_timeout,
            startup_scan_delay: config.startup_scan_delay,
            repeat_threshold: config.repeat_detection_threshold,
            repeat_window: config.repeat_detection_window,
            stopped: BTreeMap::new(),
            parked: BTreeMap::new(),
            detection_history: BTreeMap::new(),
            started_at: None,
            startup_scan_done: false,
            camera_has_moved: false,
            // Only flips to false when the camera actually moves; the cold
            // startup path must never trigger a settle re-scan.
            settle_rescan_done: true,
            camera_move_logged: false,
        }
    }

    fn cell(&self, bbox: &Bbox) -> Cell {
        let (cx, cy) = bbox_center(bbox);
        (
            cx.div_euclid(self.grid_cell_px),
            cy.div_euclid(self.grid_cell_px),
        )
    }

    /// True once the startup grace window has elapsed and visible vehicles
    /// were registered. Vehicle detected/stopped events are suppressed until
    /// then.
    pub fn startup_scan_done(&self) -> bool {
        self.startup_scan_done
    }

    /// Per-cycle pass over the state machine. Returns candidate events
    /// (promotions and departures); the caller owns the rate-limit gate.
    pub fn update(&mut self, vehicles: &[Detection], cam: CameraState, now: f64) -> Vec<Event> {
        let started_at = *self.started_at.get_or_insert(now);
        let mut events = Vec::new();

        // Camera in motion: positions are meaningless, so freeze the clock
        // on every record and skip expiry entirely. Departures resume once
        // the camera settles and the re-scan has rebuilt the maps.
        if cam.recently_moved {
            self.handle_camera_movement(vehicles, now);
            return events;
        }

        self.rescan_after_settle(vehicles, cam, now);

        if !self.startup_scan_done && now - started_at > self.startup_scan_delay {
            self.startup_scan_done = true;
            for det in vehicles {
                let cell = self.cell(&det.bbox);
                if !self.parked.contains_key(&cell) {
                    info!("startup: registered existing parked vehicle at {:?}", cell);
                    self.parked
                        .insert(cell, StationaryVehicle::from_detection(det, now));
                }
            }
        }

        // stopped -> parked
        let due: Vec<Cell> = self
            .stopped
            .iter()
            .filter(|(_, record)| now - record.first_seen >= self.parking_time)
            .map(|(cell, _)| *cell)
            .collect();
        for sid in due {
            if let Some(record) = self.stopped.remove(&sid) {
                let stationary_time = now - record.first_seen;
                let pid = self.cell(&record.bbox);
                info!("vehicle promoted to parked at {:?}", pid);
                events.push(record.event(EventType::VehicleParked, now, "parked", stationary_time));
                self.parked.insert(pid, record);
                // The bbox may have drifted across cells since registration;
                // a key must never live in both maps.
                self.stopped.remove(&pid);
            }
        }

        // stopped -> absent: it just moved on, no event
        let gone: Vec<Cell> = self
            .stopped
            .iter()
            .filter(|(_, record)| now - record.last_seen > self.stopped_gone_timeout)
            .map(|(cell, _)| *cell)
            .collect();
        for sid in gone {
            debug!("stopped vehicle at {:?} moved on", sid);
            self.stopped.remove(&sid);
        }

        // parked -> absent: fires vehicle_left
        let left: Vec<Cell> = self
            .parked
            .iter()
            .filter(|(_, record)| now - record.last_seen > self.parked_gone_timeout)
            .map(|(cell, _)| *cell)
            .collect();
        for pid in left {
            if let Some(record) = self.parked.remove(&pid) {
                info!("parked vehicle at {:?} has left", pid);
                events.push(record.event(
                    EventType::VehicleLeft,
                    now,
                    "left",
                    now - record.first_seen,
                ));
            }
        }

        events
    }

    /// Match a live detection against the stopped/parked records and refresh
    /// the first hit. Returns whether anything matched; unmatched detections
    /// that land on a known stationary vehicle are absorbed by the caller
    /// instead of becoming new tracks.
    pub fn refresh(&mut self, det: &Detection, now: f64) -> bool {
        if !det.class.is_vehicle() {
            return false;
        }
        for record in self.parked.values_mut().chain(self.stopped.values_mut()) {
            if record.matches(det) {
                record.refresh(det, now);
                return true;
            }
        }
        false
    }

    /// Register a vehicle that crossed the stop-dwell threshold. No-op when
    /// its cell already holds a record.
    pub fn register_stopped(&mut self, det: &Detection, now: f64) {
        if !det.class.is_vehicle() {
            return;
        }
        let cell = self.cell(&det.bbox);
        if self.stopped.contains_key(&cell) || self.parked.contains_key(&cell) {
            return;
        }
        debug!("registered stopped vehicle at {:?}", cell);
        self.stopped
            .insert(cell, StationaryVehicle::from_detection(det, now));
    }

    /// Count a fresh new-vehicle detection at its cell. When the tracker
    /// keeps losing and re-acquiring a vehicle at one spot, auto-register it
    /// as parked and report true so the caller fires nothing.
    pub fn note_new_vehicle(&mut self, det: &Detection, now: f64) -> bool {
        let cell = self.cell(&det.bbox);
        let history = self.detection_history.entry(cell).or_default();
        history.retain(|&t| now - t < self.repeat_window);
        history.push(now);

        if history.len() >= self.repeat_threshold {
            if !self.parked.contains_key(&cell) {
                let first = history.first().copied().unwrap_or(now);
                info!("auto-registered flickering vehicle as parked at {:?}", cell);
                let mut record = StationaryVehicle::from_detection(det, now);
                record.first_seen = first;
                self.parked.insert(cell, record);
                self.stopped.remove(&cell);
                self.detection_history.remove(&cell);
            }
            return true;
        }
        false
    }

    fn handle_camera_movement(&mut self, vehicles: &[Detection], now: f64) {
        self.settle_rescan_done = false;
        self.camera_has_moved = true;

        for record in self.parked.values_mut().chain(self.stopped.values_mut()) {
            record.last_seen = now;
        }

        if !self.camera_move_logged {
            info!("camera moving - extending stationary vehicle timeouts");
            self.camera_move_logged = true;
        }

        // Positions shift with the viewport, but signatures survive: keep
        // matching parked records alive by signature while the view changes.
        for det in vehicles {
            let Some(sig) = det.signature.as_deref() else {
                continue;
            };
            for record in self.parked.values_mut() {
                if record.signature.as_deref() == Some(sig) {
                    record.last_seen = now;
                    record.bbox = det.bbox;
                    break;
                }
            }
        }
    }

    /// One-time rebuild after the camera settles from a real movement: old
    /// cell keys are meaningless in the new viewport, so every visible
    /// vehicle re-registers as freshly parked.
    fn rescan_after_settle(&mut self, vehicles: &[Detection], cam: CameraState, now: f64) {
        if !self.camera_has_moved || self.settle_rescan_done || !cam.settled {
            return;
        }
        self.settle_rescan_done = true;
        self.camera_move_logged = false;

        let old_parked = self.parked.len();
        let old_stopped = self.stopped.len();
        self.parked.clear();
        self.stopped.clear();

        for det in vehicles {
            if det.class.is_vehicle() {
                self.parked
                    .insert(self.cell(&det.bbox), StationaryVehicle::from_detection(det, now));
            }
        }

        info!(
            "camera settled - re-registered {} vehicles (was: {} parked, {} stopped)",
            self.parked.len(),
            old_parked,
            old_stopped
        );
    }

    pub fn stationary_count(&self) -> usize {
        self.parked.len() + self.stopped.len()
    }

    pub fn stats(&self) -> ParkingStats {
        ParkingStats {
            parked_count: self.parked.len(),
            stopped_count: self.stopped.len(),
            parked_cells: self.parked.keys().copied().collect(),
        }
    }

    pub fn add_counts(&self, counts: &mut BTreeMap<ObjectClass, usize>) {
        for record in self.parked.values().chain(self.stopped.values()) {
            *counts.entry(record.class).or_insert(0) += 1;
        }
    }

    pub fn statuses(&self, out: &mut Vec<ObjectStatus>) {
        for (maps, status) in [
            (&self.parked, TrackStatus::Parked),
            (&self.stopped, TrackStatus::Stopped),
        ] {
            for (cell, record) in maps.iter() {
                let description = match &record.description {
                    Some(d) if !d.is_empty() => d.clone(),
                    _ => match record.color.as_deref() {
                        Some(color) if !color.is_empty() => {
                            format!("{} {}", color, record.class.as_str())
                        }
                        _ => record.class.as_str().to_string(),
                    },
                };
                out.push(ObjectStatus {
                    id: format!("cell:{}:{}", cell.0, cell.1),
                    class: record.class,
                    color: record.color.clone(),
                    description,
                    confidence: STATIONARY_EVENT_CONFIDENCE,
                    status,
                });
            }
        }
    }
}
