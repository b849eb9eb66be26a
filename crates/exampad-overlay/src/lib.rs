//! Freehand annotation overlay
//!
//! An overlay is the stylus drawing captured over a displayed exam: an
//! ordered sequence of strokes, each a sequence of timestamped 2D points
//! with pressure metadata. Overlay-space has its origin at the top-left
//! and grows downward, with pages stacked vertically one page-height
//! apart.
//!
//! The overlay is serializable to a byte blob for persistence between
//! sessions, and renderable to an RGBA raster for an arbitrary
//! rectangular slice of overlay-space — the two capabilities the
//! compositor consumes.

mod error;
mod model;
mod raster;

pub use error::OverlayError;
pub use model::{Overlay, OverlayRect, Stroke, StrokePoint};
pub use raster::Raster;
