//! Layout hints for renderers.
//!
//! Pure functions of the worker count; the engine never reads them back.

/// Top edge of the worker column.
pub const LANE_TOP: f64 = 80.0;
/// Height available to the worker column.
pub const LANE_HEIGHT: f64 = 440.0;
pub const MIN_SPACING: f64 = 36.0;
pub const MAX_SPACING: f64 = 120.0;

/// Vertical distance between adjacent workers.
pub fn worker_spacing(count: usize) -> f64 {
    if count <= 1 {
        return MAX_SPACING;
    }
    (LANE_HEIGHT / (count - 1) as f64).clamp(MIN_SPACING, MAX_SPACING)
}

/// Vertical midpoint of the worker column, where the queue lines up.
pub fn centerline(count: usize) -> f64 {
    if count == 0 {
        return LANE_TOP + LANE_HEIGHT / 2.0;
    }
    LANE_TOP + worker_spacing(count) * (count - 1) as f64 / 2.0
}
