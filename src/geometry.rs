//! Geometric primitives over landmark point sets
//!
//! Pure helpers with no side effects. Degenerate input (missing points,
//! zero horizontal distance) resolves to 0.0 rather than an error.

use crate::types::Landmark;

/// Euclidean distance between two landmarks in normalized image space.
pub fn distance(a: Landmark, b: Landmark) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Midpoint of two landmarks.
pub fn midpoint(a: Landmark, b: Landmark) -> Landmark {
    Landmark::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

/// Eye aspect ratio over 6 ordered eye-contour points.
///
/// `(|p2-p6| + |p3-p5|) / (2 * |p1-p4|)` where p1/p4 are the horizontal
/// corners. Returns 0.0 when any point is missing or the horizontal
/// distance is 0, guarding the division.
pub fn eye_aspect_ratio(points: &[Option<Landmark>; 6]) -> f64 {
    let [p1, p2, p3, p4, p5, p6] = points;
    match (p1, p2, p3, p4, p5, p6) {
        (Some(p1), Some(p2), Some(p3), Some(p4), Some(p5), Some(p6)) => {
            let vert1 = distance(*p2, *p6);
            let vert2 = distance(*p3, *p5);
            let horz = distance(*p1, *p4);
            if horz > 0.0 {
                (vert1 + vert2) / (2.0 * horz)
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lm(x: f64, y: f64) -> Option<Landmark> {
        Some(Landmark::new(x, y))
    }

    #[test]
    fn test_distance() {
        let a = Landmark::new(0.0, 0.0);
        let b = Landmark::new(3.0, 4.0);
        assert!((distance(a, b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint() {
        let m = midpoint(Landmark::new(0.2, 0.4), Landmark::new(0.6, 0.8));
        assert!((m.x - 0.4).abs() < 1e-9);
        assert!((m.y - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_ear_open_eye() {
        // Wide-open synthetic contour: vertical gaps 0.2, horizontal span 0.4
        let points = [
            lm(0.0, 0.5),
            lm(0.1, 0.4),
            lm(0.3, 0.4),
            lm(0.4, 0.5),
            lm(0.3, 0.6),
            lm(0.1, 0.6),
        ];
        let ear = eye_aspect_ratio(&points);
        assert!((ear - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ear_closed_eye_is_near_zero() {
        // Lids touching: vertical pairs coincide
        let points = [
            lm(0.0, 0.5),
            lm(0.1, 0.5),
            lm(0.3, 0.5),
            lm(0.4, 0.5),
            lm(0.3, 0.5),
            lm(0.1, 0.5),
        ];
        assert_eq!(eye_aspect_ratio(&points), 0.0);
    }

    #[test]
    fn test_ear_missing_point_returns_zero() {
        let points = [
            lm(0.0, 0.5),
            None,
            lm(0.3, 0.4),
            lm(0.4, 0.5),
            lm(0.3, 0.6),
            lm(0.1, 0.6),
        ];
        assert_eq!(eye_aspect_ratio(&points), 0.0);
    }

    #[test]
    fn test_ear_zero_horizontal_distance_guarded() {
        // p1 == p4 makes the denominator zero
        let points = [
            lm(0.2, 0.5),
            lm(0.1, 0.4),
            lm(0.3, 0.4),
            lm(0.2, 0.5),
            lm(0.3, 0.6),
            lm(0.1, 0.6),
        ];
        assert_eq!(eye_aspect_ratio(&points), 0.0);
    }

    #[test]
    fn test_ear_never_negative() {
        let points = [
            lm(0.9, 0.1),
            lm(0.2, 0.8),
            lm(0.7, 0.3),
            lm(0.1, 0.9),
            lm(0.4, 0.2),
            lm(0.6, 0.5),
        ];
        assert!(eye_aspect_ratio(&points) >= 0.0);
    }
}
