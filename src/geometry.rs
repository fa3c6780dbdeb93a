// src/geometry.rs
//
// Bounding-box math shared by the tracker and the parking system.
// All functions are pure. Degenerate boxes (x2 <= x1 or y2 <= y1) are
// clamped to zero area rather than rejected; upstream detectors
// occasionally emit them.

use crate::types::Bbox;

/// Intersection-over-union of two axis-aligned boxes. 0.0 when the union
/// is empty.
pub fn iou(a: &Bbox, b: &Bbox) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0) as i64 * (y2 - y1).max(0) as i64;
    if inter <= 0 {
        return 0.0;
    }

    let union = bbox_area(a) + bbox_area(b) - inter;
    if union > 0 {
        inter as f32 / union as f32
    } else {
        0.0
    }
}

/// Center point of a bounding box.
pub fn bbox_center(bbox: &Bbox) -> (i32, i32) {
    ((bbox[0] + bbox[2]) / 2, (bbox[1] + bbox[3]) / 2)
}

/// Area in pixels, zero for degenerate boxes.
pub fn bbox_area(bbox: &Bbox) -> i64 {
    (bbox[2] - bbox[0]).max(0) as i64 * (bbox[3] - bbox[1]).max(0) as i64
}

/// Euclidean distance between two points.
pub fn distance(p1: (i32, i32), p2: (i32, i32)) -> f32 {
    let dx = (p1.0 - p2.0) as f32;
    let dy = (p1.1 - p2.1) as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Whether a point lies inside (or on the edge of) a bounding box.
pub fn point_in_bbox(point: (i32, i32), bbox: &Bbox) -> bool {
    let (x, y) = point;
    bbox[0] <= x && x <= bbox[2] && bbox[1] <= y && y <= bbox[3]
}

/// Build a bounding box around a center point.
pub fn bbox_from_center(center: (i32, i32), width: i32, height: i32) -> Bbox {
    let (cx, cy) = center;
    [
        cx - width / 2,
        cy - height / 2,
        cx + width / 2,
        cy + height / 2,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_boxes() {
        let a = [10, 10, 110, 210];
        assert_eq!(iou(&a, &a), 1.0);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = [0, 0, 50, 50];
        let b = [100, 100, 200, 200];
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = [0, 0, 100, 100];
        let b = [50, 50, 150, 150];
        let score = iou(&a, &b);
        assert!((score - 2500.0 / 17500.0).abs() < 0.001);
    }

    #[test]
    fn test_iou_containment() {
        // Inner box fully contained: IoU = area(inner) / area(outer)
        let outer = [0, 0, 100, 100];
        let inner = [25, 25, 75, 75];
        let score = iou(&outer, &inner);
        assert!((score - 2500.0 / 10000.0).abs() < 0.001);
    }

    #[test]
    fn test_iou_degenerate_box_is_zero() {
        let a = [50, 50, 50, 120]; // zero width
        let b = [0, 0, 100, 100];
        assert_eq!(iou(&a, &b), 0.0);
        let c = [80, 90, 20, 10]; // inverted
        assert_eq!(iou(&c, &b), 0.0);
    }

    #[test]
    fn test_center_and_area() {
        let b = [10, 20, 50, 80];
        assert_eq!(bbox_center(&b), (30, 50));
        assert_eq!(bbox_area(&b), 40 * 60);
        assert_eq!(bbox_area(&[50, 80, 10, 20]), 0);
    }

    #[test]
    fn test_point_in_bbox() {
        let b = [10, 10, 20, 20];
        assert!(point_in_bbox((10, 10), &b));
        assert!(point_in_bbox((15, 18), &b));
        assert!(!point_in_bbox((21, 15), &b));
    }

    #[test]
    fn test_bbox_from_center_round_trip() {
        let b = bbox_from_center((100, 60), 40, 20);
        assert_eq!(b, [80, 50, 120, 70]);
        assert_eq!(bbox_center(&b), (100, 60));
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance((0, 0), (3, 4)), 5.0);
        assert_eq!(distance((7, 7), (7, 7)), 0.0);
    }
}
