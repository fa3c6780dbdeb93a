// src/lib.rs
//
// yardwatch: the event/tracking core of a home camera surveillance system.
// Feed it per-frame detections, get semantic events back (person dwelling,
// vehicle stopped/parked/left, package dropped) with detector flicker,
// camera pan/tilt motion, and duplicate detections filtered out.
//
// The model runtime, capture pipeline, PTZ protocol, recording, storage,
// and delivery channels all live elsewhere; this crate only speaks
// `Detection` in and `Event` out.

pub mod config;
pub mod geometry;
pub mod tracking;
pub mod types;

pub use config::{Config, LoggingConfig, TrackingConfig};
pub use tracking::{CameraMotion, EventDetector};
pub use types::{Bbox, Detection, Event, EventType, ObjectClass, ObjectStatus, ParkingStats};
