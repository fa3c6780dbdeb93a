// src/types.rs
//
// Domain types shared across the tracking core: detector input, fired
// events, and the status snapshots served to the dashboard.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis-aligned bounding box, (x1, y1, x2, y2) in pixels, origin top-left.
pub type Bbox = [i32; 4];

/// Object classes the detection collaborator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectClass {
    Person,
    Car,
    Truck,
    Package,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Car => "car",
            Self::Truck => "truck",
            Self::Package => "package",
        }
    }

    pub fn is_vehicle(&self) -> bool {
        matches!(self, Self::Car | Self::Truck)
    }

    /// Coarse category used by the location-dedup cache.
    pub fn category(&self) -> Category {
        match self {
            Self::Person => Category::Person,
            Self::Car | Self::Truck => Category::Vehicle,
            Self::Package => Category::Package,
        }
    }
}

/// Dedup category; both vehicle classes share one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Person,
    Vehicle,
    Package,
}

/// Single detection from the model runtime. Classification fields are only
/// populated on frames where the (expensive) classifier actually ran; the
/// tracker back-fills them from its cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class: ObjectClass,
    pub confidence: f32,
    pub bbox: Bbox,
    /// Compact classification signature, e.g. "black_truck".
    pub signature: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

impl Detection {
    pub fn new(class: ObjectClass, confidence: f32, bbox: Bbox) -> Self {
        Self {
            class,
            confidence,
            bbox,
            signature: None,
            color: None,
            description: None,
        }
    }
}

/// Semantic events raised by the tracking core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PersonDetected,
    PersonDwelling,
    VehicleDetected,
    VehicleStopped,
    VehicleParked,
    VehicleLeft,
    PackageDetected,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonDetected => "person_detected",
            Self::PersonDwelling => "person_dwelling",
            Self::VehicleDetected => "vehicle_detected",
            Self::VehicleStopped => "vehicle_stopped",
            Self::VehicleParked => "vehicle_parked",
            Self::VehicleLeft => "vehicle_left",
            Self::PackageDetected => "package_detected",
        }
    }
}

/// A fired event, delivered to subscribers and returned from `update`.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_type: EventType,
    /// Unix seconds.
    pub timestamp: f64,
    pub class: ObjectClass,
    pub confidence: f32,
    pub bbox: Bbox,
    /// Numeric metadata, e.g. {"dwell": 12.4} or {"parked_duration": 310.0}.
    pub metadata: BTreeMap<String, f64>,
    pub color: Option<String>,
    pub description: Option<String>,
}

impl Event {
    pub fn new(
        event_type: EventType,
        timestamp: f64,
        class: ObjectClass,
        confidence: f32,
        bbox: Bbox,
    ) -> Self {
        Self {
            event_type,
            timestamp,
            class,
            confidence,
            bbox,
            metadata: BTreeMap::new(),
            color: None,
            description: None,
        }
    }

    pub fn with_meta(mut self, key: &str, value: f64) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Human label for logs: description when classified, class otherwise.
    pub fn display_name(&self) -> &str {
        match &self.description {
            Some(d) if !d.is_empty() => d,
            _ => self.class.as_str(),
        }
    }

    /// Flatten into a plain key/value JSON object for downstream consumers
    /// (database insert, WebSocket broadcast, notification embed). Metadata
    /// keys are inlined as plain numbers.
    pub fn to_record(&self) -> serde_json::Value {
        let mut record = serde_json::Map::new();
        record.insert("type".into(), self.event_type.as_str().into());
        record.insert("timestamp".into(), self.timestamp.into());
        record.insert("class".into(), self.class.as_str().into());
        record.insert("confidence".into(), f64::from(self.confidence).into());
        record.insert(
            "bbox".into(),
            serde_json::Value::Array(self.bbox.iter().map(|&v| v.into()).collect()),
        );
        for (key, value) in &self.metadata {
            record.insert(key.clone(), (*value).into());
        }
        if let Some(color) = &self.color {
            if !color.is_empty() {
                record.insert("color".into(), color.clone().into());
            }
        }
        if let Some(description) = &self.description {
            if !description.is_empty() {
                record.insert("description".into(), description.clone().into());
            }
        }
        serde_json::Value::Object(record)
    }
}

/// Lifecycle state shown in the dashboard's live-object list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Active,
    Stopped,
    Parked,
}

/// Snapshot of one tracked or stationary object for the status API.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectStatus {
    pub id: String,
    pub class: ObjectClass,
    pub color: Option<String>,
    pub description: String,
    pub confidence: f32,
    pub status: TrackStatus,
}

/// Parking-system counters for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ParkingStats {
    pub parked_count: usize,
    pub stopped_count: usize,
    pub parked_cells: Vec<(i32, i32)>,
}
