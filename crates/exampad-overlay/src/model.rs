//! Stroke data model and persistence

use crate::error::OverlayError;
use serde::{Deserialize, Serialize};

/// One sampled input point in overlay-space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    /// Milliseconds since the start of the stroke.
    pub t_ms: u64,
    /// Pen pressure in `0.0..=1.0`; finger input reports 1.0.
    pub pressure: f32,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64, t_ms: u64, pressure: f32) -> Self {
        Self { x, y, t_ms, pressure }
    }
}

/// A single continuous pen-down-to-pen-up trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<StrokePoint>,
    /// Base stroke width in overlay points; the effective width at a
    /// sample is `width * pressure`.
    pub width: f64,
    /// Ink color as a hex string, e.g. "#1A1A1A".
    pub color: String,
}

impl Stroke {
    pub fn new(points: Vec<StrokePoint>, width: f64, color: impl Into<String>) -> Self {
        Self {
            points,
            width,
            color: color.into(),
        }
    }
}

/// Axis-aligned rectangle in overlay-space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl OverlayRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// The full drawing bound 1:1 to a displayed document.
///
/// Created empty when a document is opened, mutated while displayed,
/// persisted on dismissal, and consumed read-only by the compositor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    strokes: Vec<Stroke>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_stroke(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(|s| s.points.is_empty())
    }

    /// Bounding rectangle of all ink, inflated by half the stroke width
    /// at each sample. `None` when nothing has been drawn.
    pub fn bounds(&self) -> Option<OverlayRect> {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for stroke in &self.strokes {
            for p in &stroke.points {
                let r = (stroke.width * p.pressure as f64 / 2.0).max(0.0);
                min_x = min_x.min(p.x - r);
                min_y = min_y.min(p.y - r);
                max_x = max_x.max(p.x + r);
                max_y = max_y.max(p.y + r);
            }
        }

        if min_x.is_finite() {
            Some(OverlayRect::new(min_x, min_y, max_x - min_x, max_y - min_y))
        } else {
            None
        }
    }

    /// Serialize to the byte blob stored in the Drawings directory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OverlayError> {
        serde_json::to_vec(self).map_err(|e| OverlayError::Serialize(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OverlayError> {
        serde_json::from_slice(bytes).map_err(|e| OverlayError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line_stroke(x0: f64, y0: f64, x1: f64, y1: f64, width: f64) -> Stroke {
        Stroke::new(
            vec![
                StrokePoint::new(x0, y0, 0, 1.0),
                StrokePoint::new(x1, y1, 16, 1.0),
            ],
            width,
            "#000000",
        )
    }

    #[test]
    fn test_new_overlay_is_empty() {
        let overlay = Overlay::new();
        assert!(overlay.is_empty());
        assert!(overlay.bounds().is_none());
    }

    #[test]
    fn test_overlay_with_empty_stroke_is_empty() {
        let mut overlay = Overlay::new();
        overlay.push_stroke(Stroke::new(vec![], 2.0, "#000000"));
        assert!(overlay.is_empty());
        assert!(overlay.bounds().is_none());
    }

    #[test]
    fn test_bounds_inflated_by_half_width() {
        let mut overlay = Overlay::new();
        overlay.push_stroke(line_stroke(10.0, 20.0, 110.0, 20.0, 4.0));

        let b = overlay.bounds().unwrap();
        assert_eq!(b.x, 8.0);
        assert_eq!(b.y, 18.0);
        assert_eq!(b.width, 104.0);
        assert_eq!(b.height, 4.0);
    }

    #[test]
    fn test_bounds_covers_all_strokes() {
        let mut overlay = Overlay::new();
        overlay.push_stroke(line_stroke(0.0, 0.0, 10.0, 10.0, 2.0));
        overlay.push_stroke(line_stroke(100.0, 900.0, 120.0, 950.0, 2.0));

        let b = overlay.bounds().unwrap();
        assert_eq!(b.x, -1.0);
        assert_eq!(b.y, -1.0);
        assert_eq!(b.x + b.width, 121.0);
        assert_eq!(b.y + b.height, 951.0);
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut overlay = Overlay::new();
        overlay.push_stroke(Stroke::new(
            vec![
                StrokePoint::new(12.5, 640.25, 0, 0.3),
                StrokePoint::new(13.0, 641.0, 8, 0.55),
            ],
            3.5,
            "#1A2B3C",
        ));

        let bytes = overlay.to_bytes().unwrap();
        let restored = Overlay::from_bytes(&bytes).unwrap();
        assert_eq!(overlay, restored);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(Overlay::from_bytes(b"not json").is_err());
    }
}
