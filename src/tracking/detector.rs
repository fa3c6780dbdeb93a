// src/tracking/detector.rs
//
// EventDetector: turns the per-frame stream of bounding-box detections into
// temporally-meaningful events (dwell, stopped, parked, left) while
// suppressing detector flicker, camera-motion artifacts, and duplicate
// detections.
//
// Design:
//   - Greedy single-pass matching (sufficient for a handful of objects per
//     frame), class-gated IoU with a signature bonus for tie-breaks
//   - Registry iterated in track-id order so ties resolve to the
//     first-registered track on every platform
//   - Every fired event passes the per-type cooldown AND the global
//     sliding-window cap; there is no bypass path
//   - Single-threaded by contract: callers serialize update() per camera

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::camera::{CameraMotion, CameraState};
use super::loiter::PositionHistory;
use super::parking::ParkingMonitor;
use super::rate_limit::{LocationDedup, RateLimiter};
use crate::config::TrackingConfig;
use crate::geometry::iou;
use crate::types::{
    Bbox, Detection, Event, EventType, ObjectClass, ObjectStatus, ParkingStats, TrackStatus,
};

/// One object matched across frames. Ids are assigned monotonically and
/// never reused; a purged id is gone for good.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: u32,
    pub class: ObjectClass,
    pub first_seen: f64,
    pub last_seen: f64,
    pub bbox: Bbox,
    pub confidence: f32,
    /// Set once the object's dwell/stop event has fired; never cleared while
    /// the track lives.
    pub reported: bool,
    pub signature: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    history: PositionHistory,
}

impl TrackedObject {
    fn new(id: u32, det: &Detection, now: f64) -> Self {
        Self {
            id,
            class: det.class,
            first_seen: now,
            last_seen: now,
            bbox: det.bbox,
            confidence: det.confidence,
            reported: false,
            signature: det.signature.clone(),
            color: det.color.clone(),
            description: det.description.clone(),
            history: PositionHistory::default(),
        }
    }

    fn display_description(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => d.clone(),
            _ => self.class.as_str().to_string(),
        }
    }
}

pub struct EventDetector {
    config: TrackingConfig,
    objects: BTreeMap<u32, TrackedObject>,
    next_id: u32,
    limiter: RateLimiter,
    locations: LocationDedup,
    parking: ParkingMonitor,
    camera: Option<Arc<dyn CameraMotion>>,
    callbacks: Vec<Box<dyn FnMut(&Event)>>,
    last_person_detected: Option<f64>,
    last_vehicle_detected: Option<f64>,
}

impl EventDetector {
    pub fn new(config: TrackingConfig) -> Self {
        let limiter = RateLimiter::new(config.event_cooldown, config.max_events_per_minute);
        let locations = LocationDedup::new(config.location_cooldown, config.location_iou_threshold);
        let parking = ParkingMonitor::new(&config);
        Self {
            config,
            objects: BTreeMap::new(),
            next_id: 0,
            limiter,
            locations,
            parking,
            camera: None,
            callbacks: Vec::new(),
            last_person_detected: None,
            last_vehicle_detected: None,
        }
    }

    /// Install the PTZ motion-query collaborator. Queried (never mutated)
    /// once per update cycle.
    pub fn set_camera_motion(&mut self, camera: Arc<dyn CameraMotion>) {
        self.camera = Some(camera);
    }

    /// Register an event subscriber. Subscribers run synchronously in
    /// registration order; a panicking subscriber is logged and skipped.
    pub fn on_event(&mut self, callback: impl FnMut(&Event) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// Process one frame of detections. `now` is unix seconds. The slice is
    /// mutable so cached classification (signature/color/description) can be
    /// copied onto detections that lack it; downstream consumers of the
    /// same slice then see consistent labels without re-classifying.
    ///
    /// Frame dimensions are currently unused (reserved for normalized-zone
    /// support).
    pub fn update(
        &mut self,
        detections: &mut [Detection],
        _frame_width: u32,
        _frame_height: u32,
        now: f64,
    ) -> Vec<Event> {
        let cam = CameraState::query(self.camera.as_ref());
        let mut events = Vec::new();

        let vehicle_detections: Vec<Detection> = detections
            .iter()
            .filter(|d| d.class.is_vehicle())
            .cloned()
            .collect();
        for candidate in self.parking.update(&vehicle_detections, cam, now) {
            self.fire_gated(candidate, &mut events);
        }

        for det in detections.iter_mut() {
            match self.match_detection(det) {
                Some(oid) => self.process_matched(oid, det, now, &mut events),
                None => self.process_unmatched(det, cam, now, &mut events),
            }
        }

        // Purge stale tracks. Vehicles tolerate longer gaps than people;
        // detectors flicker more on large/occluded vehicles.
        let stale: Vec<u32> = self
            .objects
            .iter()
            .filter(|(_, obj)| now - obj.last_seen > self.config.stale_timeout(obj.class))
            .map(|(&id, _)| id)
            .collect();
        for id in stale {
            debug!("track {} went stale, removing", id);
            self.objects.remove(&id);
        }

        events
    }

    /// Best same-class candidate by IoU (threshold 0.3) plus a signature
    /// bonus that lets color/type classification rescue drifted boxes.
    /// Strictly-greater comparison over id-ordered iteration: ties go to the
    /// first-registered track.
    fn match_detection(&self, det: &Detection) -> Option<u32> {
        let mut best: Option<(f32, u32)> = None;
        for (&id, obj) in &self.objects {
            if obj.class != det.class {
                continue;
            }
            let overlap = iou(&det.bbox, &obj.bbox);
            if overlap < self.config.iou_threshold {
                continue;
            }
            let mut score = overlap;
            if let (Some(a), Some(b)) = (&det.signature, &obj.signature) {
                if a == b {
                    score += self.config.signature_bonus;
                }
            }
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, id));
            }
        }
        best.map(|(_, id)| id)
    }

    fn process_matched(
        &mut self,
        oid: u32,
        det: &mut Detection,
        now: f64,
        events: &mut Vec<Event>,
    ) {
        let mut loiter_duration: Option<f64> = None;
        let mut stop_dwell: Option<f64> = None;

        if let Some(obj) = self.objects.get_mut(&oid) {
            obj.last_seen = now;
            obj.bbox = det.bbox;
            obj.confidence = det.confidence;

            // Classification caching: a freshly classified detection updates
            // the track; an unclassified one inherits the cached labels.
            if det.signature.is_some() {
                obj.signature = det.signature.clone();
                obj.color = det.color.clone();
                obj.description = det.description.clone();
            } else if obj.signature.is_some() {
                det.signature = obj.signature.clone();
                det.color = obj.color.clone();
                det.description = obj.description.clone();
            }

            if obj.class == ObjectClass::Person {
                obj.history.push(&det.bbox, now);
                if !obj.reported {
                    loiter_duration = obj.history.loiter_duration(
                        &det.bbox,
                        self.config.loiter_time,
                        self.config.loiter_radius_px,
                        now,
                    );
                }
            }

            if obj.class.is_vehicle() {
                // Keep any overlapping stopped/parked record alive; a
                // continuously tracked car must still reach promotion.
                let covered = self.parking.refresh(det, now);

                let dwell = now - obj.first_seen;
                if dwell >= self.config.vehicle_stop_time && !obj.reported {
                    obj.reported = true;
                    // A car already covered by a stationary record (startup
                    // scan, flicker auto-park) is not news.
                    if self.parking.startup_scan_done() && !covered {
                        self.parking.register_stopped(det, now);
                        stop_dwell = Some(dwell);
                    }
                }
            }
        }

        if let Some(duration) = loiter_duration {
            if self.limiter.allow(EventType::PersonDwelling, now) {
                let (color, description) = match self.objects.get_mut(&oid) {
                    Some(obj) => {
                        obj.reported = true;
                        let description = match &obj.description {
                            Some(d) if !d.is_empty() => format!("{} loitering", d),
                            _ => "person loitering".to_string(),
                        };
                        (obj.color.clone(), description)
                    }
                    None => (None, "person loitering".to_string()),
                };
                let mut event = Event::new(
                    EventType::PersonDwelling,
                    now,
                    ObjectClass::Person,
                    det.confidence,
                    det.bbox,
                )
                .with_meta("dwell", duration);
                event.color = color;
                event.description = Some(description);
                self.fire(&event);
                events.push(event);
            }
        }

        if let Some(dwell) = stop_dwell {
            if self.limiter.allow(EventType::VehicleStopped, now) {
                let (color, description) = self
                    .objects
                    .get(&oid)
                    .map(|obj| (obj.color.clone(), obj.description.clone()))
                    .unwrap_or((None, None));
                let mut event =
                    Event::new(EventType::VehicleStopped, now, det.class, det.confidence, det.bbox)
                        .with_meta("stop_time", dwell);
                event.color = color;
                event.description = description;
                self.fire(&event);
                events.push(event);
            }
        }
    }

    fn process_unmatched(
        &mut self,
        det: &Detection,
        cam: CameraState,
        now: f64,
        events: &mut Vec<Event>,
    ) {
        // A re-acquired stationary vehicle is not a new object; absorb it
        // into the parked/stopped record it landed on.
        if self.parking.refresh(det, now) {
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, TrackedObject::new(id, det, now));

        match det.class {
            ObjectClass::Person => {
                // PTZ tracking motion causes lose/reacquire churn on the very
                // person being tracked; do not spam person_detected for it.
                if cam.recently_moved || !cam.settled {
                    debug!("suppressing person_detected - camera moving or settling");
                    return;
                }
                let cooled = self
                    .last_person_detected
                    .map_or(true, |t| now - t >= self.config.person_detected_cooldown);
                if cooled
                    && self
                        .locations
                        .is_new_location(det.class.category(), &det.bbox, now)
                    && self.limiter.allow(EventType::PersonDetected, now)
                {
                    self.last_person_detected = Some(now);
                    self.fire_detected(EventType::PersonDetected, det, now, events);
                }
            }
            ObjectClass::Car | ObjectClass::Truck => {
                // Repeated fresh detections at one cell = flickering parked
                // car; absorbed, not announced.
                if self.parking.note_new_vehicle(det, now) {
                    return;
                }
                // During the startup grace window visible vehicles are about
                // to be registered as already-parked; stay quiet.
                if !self.parking.startup_scan_done() {
                    return;
                }
                let cooled = self
                    .last_vehicle_detected
                    .map_or(true, |t| now - t >= self.config.vehicle_detected_cooldown);
                if cooled
                    && self
                        .locations
                        .is_new_location(det.class.category(), &det.bbox, now)
                    && self.limiter.allow(EventType::VehicleDetected, now)
                {
                    self.last_vehicle_detected = Some(now);
                    self.fire_detected(EventType::VehicleDetected, det, now, events);
                }
            }
            ObjectClass::Package => {
                if self
                    .locations
                    .is_new_location(det.class.category(), &det.bbox, now)
                    && self.limiter.allow(EventType::PackageDetected, now)
                {
                    self.fire_detected(EventType::PackageDetected, det, now, events);
                }
            }
        }
    }

    fn fire_detected(
        &mut self,
        event_type: EventType,
        det: &Detection,
        now: f64,
        events: &mut Vec<Event>,
    ) {
        let mut event = Event::new(event_type, now, det.class, det.confidence, det.bbox);
        event.color = det.color.clone();
        event.description = det.description.clone();
        self.fire(&event);
        events.push(event);
    }

    /// Gate a candidate event through the rate limiter, then fire it. The
    /// state transition that produced the candidate has already happened;
    /// suppression only drops the notification.
    fn fire_gated(&mut self, event: Event, events: &mut Vec<Event>) {
        if self.limiter.allow(event.event_type, event.timestamp) {
            self.fire(&event);
            events.push(event);
        }
    }

    fn fire(&mut self, event: &Event) {
        info!(
            "event: {} - {}",
            event.event_type.as_str(),
            event.display_name()
        );
        for callback in self.callbacks.iter_mut() {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(
                    "event subscriber panicked on {}, continuing",
                    event.event_type.as_str()
                );
            }
        }
    }

    /// Late classification results: cache them onto matching tracks that
    /// have not been classified yet.
    pub fn update_classifications(&mut self, detections: &[Detection]) {
        for det in detections {
            if det.signature.is_none() {
                continue;
            }
            if let Some(oid) = self.match_detection(det) {
                if let Some(obj) = self.objects.get_mut(&oid) {
                    if obj.signature.is_none() {
                        obj.signature = det.signature.clone();
                        obj.color = det.color.clone();
                        obj.description = det.description.clone();
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Status surface for the API/dashboard collaborators
    // ------------------------------------------------------------------

    /// All known objects, including stationary vehicles.
    pub fn tracked_count(&self) -> usize {
        self.objects.len() + self.parking.stationary_count()
    }

    /// Actively tracked (moving) objects only.
    pub fn active_count(&self) -> usize {
        self.objects.len()
    }

    pub fn counts_by_class(&self) -> BTreeMap<ObjectClass, usize> {
        let mut counts = BTreeMap::new();
        for obj in self.objects.values() {
            *counts.entry(obj.class).or_insert(0) += 1;
        }
        self.parking.add_counts(&mut counts);
        counts
    }

    pub fn parking_stats(&self) -> ParkingStats {
        self.parking.stats()
    }

    /// Snapshot of everything currently visible or known-stationary, for
    /// the dashboard's live-object list.
    pub fn current_objects(&self) -> Vec<ObjectStatus> {
        let mut out: Vec<ObjectStatus> = self
            .objects
            .values()
            .map(|obj| ObjectStatus {
                id: format!("track:{}", obj.id),
                class: obj.class,
                color: obj.color.clone(),
                description: obj.display_description(),
                confidence: obj.confidence,
                status: TrackStatus::Active,
            })
            .collect();
        self.parking.statuses(&mut out);
        out
    }
}
