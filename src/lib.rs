//! Deterministic watermark placement and compositing.
//!
//! The crate renders text, image, and tiled watermarks onto raster images
//! with CPU-only compositing, and carries the interaction layer around it:
//! anchor resolution, an overlay proxy for previews, drag and wheel
//! gestures, debounced recomposition, batch runs, and zip export.
//!
//! The core entry point is [`compositor::Compositor`]; batch work goes
//! through [`batch::process_all`] and [`package::export_archive`].

#![forbid(unsafe_code)]

pub mod assets;
pub mod batch;
pub mod composite;
pub mod compositor;
pub mod error;
pub mod gesture;
pub mod invalidate;
pub mod overlay;
pub mod package;
pub mod position;
pub mod spec;
pub mod text;
pub mod tile;

pub use assets::{ImageRecord, PreparedImage, WatermarkStore};
pub use compositor::{Compositor, FrameRgba, RenderOutcome};
pub use error::{TidemarkError, TidemarkResult};
pub use spec::{Placement, WatermarkKind, WatermarkSpec};
