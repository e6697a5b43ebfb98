use crate::{
    position,
    spec::{FONT_SIZE_RANGE, IMAGE_SIZE_RANGE, Placement, WatermarkKind, WatermarkSpec},
};

/// Horizontal clamp for dragged offsets, in percent of the preview.
pub const DRAG_CLAMP_X: (f64, f64) = (7.0, 93.0);
/// Vertical clamp for dragged offsets, in percent of the preview.
pub const DRAG_CLAMP_Y: (f64, f64) = (2.0, 98.0);

/// What the pointer landed on when a gesture started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTarget {
    Handle,
    Content,
    Outside,
}

/// Result of a wheel event over the preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WheelOutcome {
    /// Font size changed to the given value.
    FontSize(u32),
    /// Image size changed to the given percentage.
    ImageSize(u32),
    /// The event did not apply (tiled mode, active drag, or a miss).
    Ignored,
}

#[derive(Clone, Copy, Debug)]
struct DragState {
    last_x: f64,
    last_y: f64,
    pending_x: f64,
    pending_y: f64,
    moved: bool,
    dirty: bool,
}

/// Translates pointer and wheel events into spec mutations.
///
/// A drag accumulates percent deltas against the preview dimensions and
/// writes them back in two phases: [`GestureController::commit_frame`] flushes
/// at the caller's frame cadence so a fast drag performs one mutation per
/// frame instead of one per pointer event, and [`GestureController::pointer_up`]
/// flushes whatever is left exactly once.
#[derive(Debug, Default)]
pub struct GestureController {
    drag: Option<DragState>,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Starts a drag. Returns whether the pointer was captured. Misses and
    /// animated sources (which are never recomposited) do not capture.
    pub fn pointer_down(
        &mut self,
        x: f64,
        y: f64,
        hit: HitTarget,
        animated: bool,
        spec: &WatermarkSpec,
    ) -> bool {
        if hit == HitTarget::Outside || animated {
            return false;
        }
        // Seed the pending offsets from the currently resolved anchor so the
        // first delta moves the watermark from where it is drawn, not from
        // whatever stale custom offsets the spec carries.
        let anchor = position::resolve(spec);
        self.drag = Some(DragState {
            last_x: x,
            last_y: y,
            pending_x: anchor.x * 100.0,
            pending_y: anchor.y * 100.0,
            moved: false,
            dirty: false,
        });
        true
    }

    /// Advances an active drag. Returns the clamped offsets the overlay
    /// should show immediately; the spec itself is only written at commit.
    pub fn pointer_move(
        &mut self,
        x: f64,
        y: f64,
        preview_w: f64,
        preview_h: f64,
    ) -> Option<(f64, f64)> {
        let drag = self.drag.as_mut()?;
        if preview_w <= 0.0 || preview_h <= 0.0 {
            return None;
        }

        let dx_pct = (x - drag.last_x) / preview_w * 100.0;
        let dy_pct = (y - drag.last_y) / preview_h * 100.0;
        drag.last_x = x;
        drag.last_y = y;

        drag.pending_x = (drag.pending_x + dx_pct).clamp(DRAG_CLAMP_X.0, DRAG_CLAMP_X.1);
        drag.pending_y = (drag.pending_y + dy_pct).clamp(DRAG_CLAMP_Y.0, DRAG_CLAMP_Y.1);
        drag.moved = true;
        drag.dirty = true;
        Some((drag.pending_x, drag.pending_y))
    }

    /// Flushes pending drag offsets into the spec. Call once per rendered
    /// frame while a drag is active. Returns whether the spec changed.
    pub fn commit_frame(&mut self, spec: &mut WatermarkSpec) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        if !drag.dirty {
            return false;
        }
        drag.dirty = false;
        apply_offsets(spec, drag.pending_x, drag.pending_y);
        true
    }

    /// Ends the drag, flushing any offsets not yet committed. Returns whether
    /// the spec changed during the whole gesture.
    pub fn pointer_up(&mut self, spec: &mut WatermarkSpec) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if drag.dirty {
            apply_offsets(spec, drag.pending_x, drag.pending_y);
        }
        drag.moved
    }

    /// Adjusts the watermark size by one step. Wheel-up (negative delta)
    /// grows, wheel-down shrinks. Tiled mode has no wheel affordance.
    pub fn wheel(&mut self, delta_y: f64, hit: HitTarget, spec: &mut WatermarkSpec) -> WheelOutcome {
        if self.drag.is_some() || hit == HitTarget::Outside || delta_y == 0.0 {
            return WheelOutcome::Ignored;
        }
        let step: i64 = if delta_y < 0.0 { 1 } else { -1 };
        match spec.kind {
            WatermarkKind::Text => {
                let next = step_clamped(spec.font_size, step, FONT_SIZE_RANGE);
                spec.font_size = next;
                WheelOutcome::FontSize(next)
            }
            WatermarkKind::Image => {
                let next = step_clamped(spec.image_size_pct, step, IMAGE_SIZE_RANGE);
                spec.image_size_pct = next;
                WheelOutcome::ImageSize(next)
            }
            WatermarkKind::Tiled => WheelOutcome::Ignored,
        }
    }
}

fn apply_offsets(spec: &mut WatermarkSpec, x_pct: f64, y_pct: f64) {
    spec.placement = Placement::Custom;
    spec.offset_x = x_pct;
    spec.offset_y = y_pct;
}

fn step_clamped(value: u32, step: i64, range: std::ops::RangeInclusive<u32>) -> u32 {
    let next = i64::from(value) + step;
    let next = next.clamp(i64::from(*range.start()), i64::from(*range.end()));
    next as u32
}
