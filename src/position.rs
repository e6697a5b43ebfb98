use crate::spec::{Placement, WatermarkSpec};

/// Horizontal safe margin as a fraction of the surface width. Larger than the
/// vertical margin so wide text is less likely to clip at the edges.
pub const SAFE_MARGIN_X: f64 = 0.07;
/// Vertical safe margin as a fraction of the surface height.
pub const SAFE_MARGIN_Y: f64 = 0.02;

/// Normalized point on a target surface at which the watermark's center is
/// placed. Always inside the safe rectangle
/// `[SAFE_MARGIN_X, 1 - SAFE_MARGIN_X] x [SAFE_MARGIN_Y, 1 - SAFE_MARGIN_Y]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

impl Anchor {
    /// Convert to integer pixel coordinates on a surface of the given size.
    pub fn to_pixels(self, width: u32, height: u32) -> (u32, u32) {
        (
            (self.x * f64::from(width)).round() as u32,
            (self.y * f64::from(height)).round() as u32,
        )
    }
}

/// Resolve the watermark anchor for the given spec.
///
/// Pure and shared by the interactive overlay and the compositor so the two
/// can never disagree about placement. Custom offsets are clamped into the
/// safe rectangle at resolution time; the stored offsets are never mutated.
/// No rotation-aware adjustment is performed, so large rotated text can still
/// clip at extreme corners.
pub fn resolve(spec: &WatermarkSpec) -> Anchor {
    let min_x = SAFE_MARGIN_X;
    let max_x = 1.0 - SAFE_MARGIN_X;
    let min_y = SAFE_MARGIN_Y;
    let max_y = 1.0 - SAFE_MARGIN_Y;

    let (x, y) = match spec.placement {
        Placement::TopLeft => (min_x, min_y),
        Placement::TopRight => (max_x, min_y),
        Placement::BottomLeft => (min_x, max_y),
        Placement::BottomRight => (max_x, max_y),
        Placement::Center => (0.5, 0.5),
        Placement::Custom => (
            (spec.offset_x / 100.0).clamp(min_x, max_x),
            (spec.offset_y / 100.0).clamp(min_y, max_y),
        ),
    };

    Anchor { x, y }
}

/// Anchor in pixel coordinates, the form the compositor consumes.
pub fn resolve_pixels(width: u32, height: u32, spec: &WatermarkSpec) -> (u32, u32) {
    resolve(spec).to_pixels(width, height)
}
