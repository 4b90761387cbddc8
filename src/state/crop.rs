/// Pan/zoom state for the crop editor
///
/// Gestures arrive in sessions. A drag reports its total translation since
/// it started; only when it ends is that folded into `offset`. A pinch reports
/// its total magnification since it started; each update multiplies `scale`
/// by the change since the previous update and clamps it.

use cgmath::{Vector2, Zero};

/// Smallest zoom factor (image fills the crop circle)
pub const MIN_SCALE: f32 = 1.0;
/// Largest zoom factor
pub const MAX_SCALE: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropTransform {
    scale: f32,
    /// Committed pan offset in crop-view units
    offset: Vector2<f32>,
    /// Translation of the drag in progress
    drag: Vector2<f32>,
    /// Magnification last reported by the pinch in progress
    last_magnification: f32,
}

impl Default for CropTransform {
    fn default() -> Self {
        Self {
            scale: MIN_SCALE,
            offset: Vector2::zero(),
            drag: Vector2::zero(),
            last_magnification: 1.0,
        }
    }
}

impl CropTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Offset to render with, including any drag still in progress
    pub fn offset(&self) -> Vector2<f32> {
        self.offset + self.drag
    }

    /// True until the user has panned or zoomed
    pub fn is_identity(&self) -> bool {
        self.scale == MIN_SCALE && self.offset().is_zero()
    }

    /// Pinch update with the total magnification since the pinch began
    pub fn pinch_changed(&mut self, magnification: f32) {
        if !magnification.is_finite() || magnification <= 0.0 {
            return;
        }
        let delta = magnification / self.last_magnification;
        self.last_magnification = magnification;
        self.set_scale(self.scale * delta);
    }

    pub fn pinch_ended(&mut self) {
        self.last_magnification = 1.0;
    }

    /// Discrete zoom step (mouse wheel), multiplies the current scale
    pub fn zoom_by(&mut self, factor: f32) {
        if factor.is_finite() && factor > 0.0 {
            self.set_scale(self.scale * factor);
        }
    }

    /// Drag update with the total translation since the drag began
    pub fn drag_changed(&mut self, translation: Vector2<f32>) {
        self.drag = translation;
    }

    /// Drag finished with its final total translation
    pub fn drag_ended(&mut self, translation: Vector2<f32>) {
        self.offset += translation;
        self.drag = Vector2::zero();
    }

    /// Back to the untouched state; used when a new source image is loaded
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(MIN_SCALE, MAX_SCALE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        let crop = CropTransform::new();
        assert!(crop.is_identity());
        assert_eq!(crop.scale(), 1.0);
    }

    #[test]
    fn test_pinch_is_incremental_and_clamped() {
        let mut crop = CropTransform::new();
        crop.pinch_changed(1.5);
        crop.pinch_changed(2.0);
        assert!((crop.scale() - 2.0).abs() < 1e-5);
        crop.pinch_ended();

        // A new pinch starts from the current scale.
        crop.pinch_changed(2.0);
        assert!((crop.scale() - 4.0).abs() < 1e-5);
        crop.pinch_changed(10.0);
        assert_eq!(crop.scale(), MAX_SCALE);
        crop.pinch_ended();

        crop.pinch_changed(0.01);
        assert_eq!(crop.scale(), MIN_SCALE);
    }

    #[test]
    fn test_drag_accumulates_across_sessions() {
        let mut crop = CropTransform::new();
        crop.drag_changed(Vector2::new(5.0, -2.0));
        assert_eq!(crop.offset(), Vector2::new(5.0, -2.0));
        crop.drag_ended(Vector2::new(10.0, -4.0));

        crop.drag_changed(Vector2::new(1.0, 1.0));
        assert_eq!(crop.offset(), Vector2::new(11.0, -3.0));
        crop.drag_ended(Vector2::new(2.0, 2.0));
        assert_eq!(crop.offset(), Vector2::new(12.0, -2.0));
        assert!(!crop.is_identity());
    }

    #[test]
    fn test_zoom_by_ignores_bad_factors() {
        let mut crop = CropTransform::new();
        crop.zoom_by(f32::NAN);
        crop.zoom_by(-1.0);
        assert_eq!(crop.scale(), 1.0);
        crop.zoom_by(1.25);
        assert!((crop.scale() - 1.25).abs() < 1e-5);
    }

    #[test]
    fn test_reset() {
        let mut crop = CropTransform::new();
        crop.zoom_by(3.0);
        crop.drag_ended(Vector2::new(40.0, 40.0));
        crop.reset();
        assert!(crop.is_identity());
    }
}
