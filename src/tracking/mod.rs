// src/tracking/mod.rs
//
// Event/tracking core modules.
//
// Signal flow:
//   Detections → detector (registry + matching) ─┬→ loiter  → person_dwelling
//                                                ├→ parking → stopped/parked/left
//                                                └→ rate_limit gates → fired Events
//   PTZ motion queries → camera snapshot, consulted by detector + parking
//
// Orchestrated by detector::EventDetector, one call per processed frame.

pub mod camera;
pub mod detector;
pub mod loiter;
pub mod parking;
pub mod rate_limit;

// Re-exports for ergonomic access from library consumers
pub use camera::{CameraMotion, CameraState};
pub use detector::{EventDetector, TrackedObject};
pub use parking::ParkingMonitor;
pub use rate_limit::{LocationDedup, RateLimiter};
