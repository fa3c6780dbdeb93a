// src/tracking/camera.rs
//
// Seam to the PTZ collaborator. The tracker only ever asks two questions,
// and only once per update cycle; the controller may be mutated by its own
// thread at any time, so the answers are snapshotted.

use std::sync::Arc;

/// Movement queries exposed by the PTZ controller.
pub trait CameraMotion: Send + Sync {
    /// Camera moved within its settle window; object positions are suspect.
    fn recently_moved(&self) -> bool;
    /// Camera has been still long enough to trust object positions again.
    fn is_settled(&self) -> bool;
}

/// Per-cycle snapshot of the camera state, taken at the top of `update`.
#[derive(Debug, Clone, Copy)]
pub struct CameraState {
    pub recently_moved: bool,
    pub settled: bool,
}

impl CameraState {
    pub fn query(camera: Option<&Arc<dyn CameraMotion>>) -> Self {
        match camera {
            Some(camera) => Self {
                recently_moved: camera.recently_moved(),
                settled: camera.is_settled(),
            },
            // No PTZ installed: a fixed camera never moves.
            None => Self::default(),
        }
    }
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            recently_moved: false,
            settled: true,
        }
    }
}
