//! Image ↔ viewport coordinate mapping.
//!
//! The forward transform takes a continuous image point (pixel `(i, j)` covers
//! `[i, i+1) x [j, j+1)`) to viewport coordinates:
//!
//! 1. translate the image centre to the origin,
//! 2. scale (`Fit` picks the largest scale at which the rotated image fits),
//! 3. rotate clockwise by `quadrant * 90°` (viewport y points down),
//! 4. negate x and/or y for the flips,
//! 5. translate to the viewport centre plus the pan offset.
//!
//! [`GeometryTransform::viewport_to_image`] undoes each step in reverse order, so a
//! round trip is exact up to floating-point rounding.
//!
//! The transform is a plain value: a control change builds a new one with the
//! `with_*` methods rather than mutating shared state.

use serde::{Deserialize, Serialize};

use crate::region::Region;

/// Zoom factors offered by the zoom selector.
pub const ZOOM_PRESETS: [f64; 7] = [0.125, 0.25, 0.5, 1.0, 2.0, 4.0, 8.0];

/// Zoom factor applied per scroll notch.
pub const DEFAULT_ZOOM_STEP: f64 = 1.1;

/// Drags shorter than this in both axes (viewport pixels) clear the selection.
pub const MIN_SELECTION_DRAG: f64 = 2.0;

/// A position in image or viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Point at `(x, y)`.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Upright.
    #[default]
    R0,
    /// Quarter turn.
    R90,
    /// Half turn.
    R180,
    /// Three quarter turns.
    R270,
}

impl Rotation {
    /// Every rotation, in quarter-turn order.
    pub const ALL: [Rotation; 4] = [Self::R0, Self::R90, Self::R180, Self::R270];

    /// Rotation for `quadrant` quarter turns, taken modulo 4.
    #[must_use]
    pub fn from_quadrant(quadrant: u8) -> Self {
        match quadrant % 4 {
            0 => Self::R0,
            1 => Self::R90,
            2 => Self::R180,
            _ => Self::R270,
        }
    }

    /// Quarter turns, `0..=3`.
    #[must_use]
    pub fn quadrant(self) -> u8 {
        match self {
            Self::R0 => 0,
            Self::R90 => 1,
            Self::R180 => 2,
            Self::R270 => 3,
        }
    }

    /// One more quarter turn.
    #[must_use]
    pub fn clockwise(self) -> Self {
        Self::from_quadrant(self.quadrant() + 1)
    }

    /// One quarter turn back.
    #[must_use]
    pub fn counter_clockwise(self) -> Self {
        Self::from_quadrant(self.quadrant() + 3)
    }

    /// Whether width and height trade places.
    #[must_use]
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }

    fn apply(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::R0 => (x, y),
            Self::R90 => (-y, x),
            Self::R180 => (-x, -y),
            Self::R270 => (y, -x),
        }
    }

    fn undo(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::R0 => (x, y),
            Self::R90 => (y, -x),
            Self::R180 => (-x, -y),
            Self::R270 => (-y, x),
        }
    }
}

/// How image pixels are scaled to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zoom {
    /// Largest scale at which the whole image fits the viewport.
    #[default]
    Fit,
    /// Fixed scale, viewport pixels per image pixel.
    Fixed(f64),
}

/// Mapping between image and viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryTransform {
    /// Rotation applied after scaling.
    pub rotation: Rotation,
    /// Mirror horizontally.
    pub flip_x: bool,
    /// Mirror vertically.
    pub flip_y: bool,
    /// Scale policy.
    pub zoom: Zoom,
    /// Viewport width.
    pub viewport_w: f64,
    /// Viewport height.
    pub viewport_h: f64,
    /// Image width in pixels.
    pub image_w: u32,
    /// Image height in pixels.
    pub image_h: u32,
    /// Offset of the image centre from the viewport centre.
    pub pan: Point,
}

impl GeometryTransform {
    /// Unrotated, unflipped, fit-to-viewport transform.
    pub fn new(image_w: u32, image_h: u32, viewport_w: f64, viewport_h: f64) -> Self {
        Self {
            rotation: Rotation::R0,
            flip_x: false,
            flip_y: false,
            zoom: Zoom::Fit,
            viewport_w,
            viewport_h,
            image_w,
            image_h,
            pan: Point::default(),
        }
    }

    /// Set the rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set both mirror flags.
    #[must_use]
    pub fn with_flips(mut self, flip_x: bool, flip_y: bool) -> Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }

    /// Set the zoom policy.
    #[must_use]
    pub fn with_zoom(mut self, zoom: Zoom) -> Self {
        self.zoom = zoom;
        self
    }

    /// Set the pan offset.
    #[must_use]
    pub fn with_pan(mut self, pan: Point) -> Self {
        self.pan = pan;
        self
    }

    /// Resize the viewport.
    #[must_use]
    pub fn with_viewport(mut self, viewport_w: f64, viewport_h: f64) -> Self {
        self.viewport_w = viewport_w;
        self.viewport_h = viewport_h;
        self
    }

    /// Change the image size.
    #[must_use]
    pub fn with_image(mut self, image_w: u32, image_h: u32) -> Self {
        self.image_w = image_w;
        self.image_h = image_h;
        self
    }

    /// Image size after rotation, in image pixels.
    #[must_use]
    pub fn rotated_image_size(&self) -> (f64, f64) {
        let (w, h) = (f64::from(self.image_w), f64::from(self.image_h));
        if self.rotation.swaps_axes() {
            (h, w)
        } else {
            (w, h)
        }
    }

    /// Effective viewport pixels per image pixel.
    ///
    /// Falls back to 1.0 when the image or viewport is empty or the zoom is not a
    /// positive finite number.
    #[must_use]
    pub fn scale(&self) -> f64 {
        let scale = match self.zoom {
            Zoom::Fit => {
                let (eff_w, eff_h) = self.rotated_image_size();
                if eff_w <= 0.0 || eff_h <= 0.0 || self.viewport_w <= 0.0 || self.viewport_h <= 0.0 {
                    return 1.0;
                }
                (self.viewport_w / eff_w).min(self.viewport_h / eff_h)
            }
            Zoom::Fixed(s) => s,
        };
        if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        }
    }

    /// Forward mapping.
    #[must_use]
    pub fn image_to_viewport(&self, p: Point) -> Point {
        let s = self.scale();
        let x = (p.x - f64::from(self.image_w) / 2.0) * s;
        let y = (p.y - f64::from(self.image_h) / 2.0) * s;
        let (mut x, mut y) = self.rotation.apply(x, y);
        if self.flip_x {
            x = -x;
        }
        if self.flip_y {
            y = -y;
        }
        Point::new(
            x + self.viewport_w / 2.0 + self.pan.x,
            y + self.viewport_h / 2.0 + self.pan.y,
        )
    }

    /// Inverse mapping.
    #[must_use]
    pub fn viewport_to_image(&self, p: Point) -> Point {
        let mut x = p.x - self.viewport_w / 2.0 - self.pan.x;
        let mut y = p.y - self.viewport_h / 2.0 - self.pan.y;
        if self.flip_x {
            x = -x;
        }
        if self.flip_y {
            y = -y;
        }
        let (x, y) = self.rotation.undo(x, y);
        let s = self.scale();
        Point::new(
            x / s + f64::from(self.image_w) / 2.0,
            y / s + f64::from(self.image_h) / 2.0,
        )
    }

    /// Pixel under viewport point `p`, or `None` outside the image.
    #[must_use]
    pub fn viewport_to_pixel(&self, p: Point) -> Option<(i64, i64)> {
        let img = self.viewport_to_image(p);
        let (x, y) = (img.x.floor(), img.y.floor());
        let inside = x >= 0.0
            && y >= 0.0
            && x < f64::from(self.image_w)
            && y < f64::from(self.image_h);
        inside.then_some((x as i64, y as i64))
    }

    /// Pixel under viewport point `p`, clamped to the image.
    ///
    /// `None` only when the image has no pixels.
    #[must_use]
    pub fn viewport_to_pixel_clamped(&self, p: Point) -> Option<(i64, i64)> {
        if self.image_w == 0 || self.image_h == 0 {
            return None;
        }
        let img = self.viewport_to_image(p);
        let max_x = f64::from(self.image_w - 1);
        let max_y = f64::from(self.image_h - 1);
        // NaN clamps to 0 via the `as` conversion
        let x = img.x.floor().clamp(0.0, max_x) as i64;
        let y = img.y.floor().clamp(0.0, max_y) as i64;
        Some((x, y))
    }

    /// Whether viewport point `p` lies on the image.
    #[must_use]
    pub fn hit_test(&self, p: Point) -> bool {
        self.viewport_to_pixel(p).is_some()
    }

    /// Viewport corners of `region`'s pixel edges, for drawing a selection box.
    #[must_use]
    pub fn region_outline(&self, region: &Region) -> [Point; 4] {
        let (x1, y1) = (region.x1 as f64, region.y1 as f64);
        let (x2, y2) = ((region.x2 + 1) as f64, (region.y2 + 1) as f64);
        [
            self.image_to_viewport(Point::new(x1, y1)),
            self.image_to_viewport(Point::new(x2, y1)),
            self.image_to_viewport(Point::new(x2, y2)),
            self.image_to_viewport(Point::new(x1, y2)),
        ]
    }

    /// Selection spanned by a drag from `start` to `end` in viewport coordinates.
    ///
    /// A drag shorter than [`MIN_SELECTION_DRAG`] in both axes yields `None`, which
    /// clears the selection. Endpoints outside the image are clamped to it.
    #[must_use]
    pub fn selection_from_drag(&self, start: Point, end: Point) -> Option<Region> {
        if (end.x - start.x).abs() < MIN_SELECTION_DRAG && (end.y - start.y).abs() < MIN_SELECTION_DRAG
        {
            return None;
        }
        let a = self.viewport_to_pixel_clamped(start)?;
        let b = self.viewport_to_pixel_clamped(end)?;
        Some(Region::from_corners(a, b))
    }

    /// Replace `Fit` with the fixed scale it currently resolves to.
    #[must_use]
    pub fn without_fit(self) -> Self {
        match self.zoom {
            Zoom::Fit => self.with_zoom(Zoom::Fixed(self.scale())),
            Zoom::Fixed(_) => self,
        }
    }

    /// Fixed zoom at one of [`ZOOM_PRESETS`] (or any positive factor).
    #[must_use]
    pub fn with_preset(self, factor: f64) -> Self {
        if factor.is_finite() && factor > 0.0 {
            self.with_zoom(Zoom::Fixed(factor))
        } else {
            self
        }
    }

    /// Apply one scroll event: `dy < 0` zooms in by `step`, `dy > 0` zooms out.
    ///
    /// Leaves fit mode at the scale currently shown.
    #[must_use]
    pub fn scrolled(self, dy: f64, step: f64) -> Self {
        let current = self.without_fit();
        let scale = current.scale();
        let scale = if dy > 0.0 {
            scale / step
        } else if dy < 0.0 {
            scale * step
        } else {
            scale
        };
        current.with_preset(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn close(a: Point, b: Point) -> bool {
        (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS
    }

    #[test]
    fn test_identity_at_unit_zoom() {
        let g = GeometryTransform::new(100, 50, 100.0, 50.0).with_zoom(Zoom::Fixed(1.0));
        let p = Point::new(12.5, 40.25);
        assert!(close(g.image_to_viewport(p), p));
    }

    #[test]
    fn test_fit_scale_uses_rotated_extent() {
        let g = GeometryTransform::new(200, 100, 400.0, 400.0);
        assert_eq!(g.scale(), 2.0);
        let g = g.with_viewport(100.0, 400.0).with_rotation(Rotation::R90);
        // Rotated image is 100 wide, 200 tall
        assert_eq!(g.scale(), 1.0);
    }

    #[test]
    fn test_rotation_moves_corner_clockwise() {
        // Top-left corner of a square image ends up top-right after a quarter turn
        let g = GeometryTransform::new(10, 10, 10.0, 10.0).with_rotation(Rotation::R90);
        assert!(close(g.image_to_viewport(Point::new(0.0, 0.0)), Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_flips_mirror() {
        let g = GeometryTransform::new(10, 10, 10.0, 10.0).with_flips(true, false);
        assert!(close(g.image_to_viewport(Point::new(2.0, 3.0)), Point::new(8.0, 3.0)));
        let g = g.with_flips(false, true);
        assert!(close(g.image_to_viewport(Point::new(2.0, 3.0)), Point::new(2.0, 7.0)));
    }

    #[test]
    fn test_round_trip_all_orientations() {
        // Corners, edge midpoints and centre of a 64x48 image, plus two off-image points
        let mut points = Vec::new();
        for x in [0.0, 32.0, 64.0] {
            for y in [0.0, 24.0, 48.0] {
                points.push(Point::new(x, y));
            }
        }
        points.extend([Point::new(3.7, 41.2), Point::new(-4.0, 60.5)]);

        for rotation in Rotation::ALL {
            for (fx, fy) in [(false, false), (true, false), (false, true), (true, true)] {
                for zoom in [Zoom::Fit, Zoom::Fixed(2.0)] {
                    let g = GeometryTransform::new(64, 48, 333.0, 217.0)
                        .with_rotation(rotation)
                        .with_flips(fx, fy)
                        .with_zoom(zoom)
                        .with_pan(Point::new(5.5, -3.0));
                    for &p in &points {
                        let back = g.viewport_to_image(g.image_to_viewport(p));
                        let err = (back.x - p.x).abs().max((back.y - p.y).abs());
                        assert!(err < 1e-9, "{rotation:?} {fx} {fy} {zoom:?}: {p:?} -> {back:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_hit_test_and_pixel_lookup() {
        let g = GeometryTransform::new(4, 4, 8.0, 8.0);
        assert_eq!(g.scale(), 2.0);
        assert_eq!(g.viewport_to_pixel(Point::new(3.0, 5.0)), Some((1, 2)));
        assert!(g.hit_test(Point::new(7.9, 7.9)));
        assert!(!g.hit_test(Point::new(8.1, 1.0)));
        assert_eq!(g.viewport_to_pixel_clamped(Point::new(100.0, -3.0)), Some((3, 0)));
    }

    #[test]
    fn test_degenerate_geometry_scale() {
        assert_eq!(GeometryTransform::new(0, 10, 100.0, 100.0).scale(), 1.0);
        assert_eq!(GeometryTransform::new(10, 10, 0.0, 100.0).scale(), 1.0);
        let g = GeometryTransform::new(10, 10, 10.0, 10.0).with_zoom(Zoom::Fixed(-2.0));
        assert_eq!(g.scale(), 1.0);
        assert_eq!(GeometryTransform::new(0, 0, 10.0, 10.0).viewport_to_pixel_clamped(Point::default()), None);
    }

    #[test]
    fn test_selection_from_drag() {
        let g = GeometryTransform::new(10, 10, 10.0, 10.0).with_zoom(Zoom::Fixed(1.0));
        assert_eq!(g.selection_from_drag(Point::new(5.0, 5.0), Point::new(6.0, 6.5)), None);

        let sel = g.selection_from_drag(Point::new(7.5, 8.2), Point::new(2.1, 1.9));
        assert_eq!(sel, Some(Region::new(2, 1, 7, 8)));

        // Dragging past the edge clamps
        let sel = g.selection_from_drag(Point::new(5.0, 5.0), Point::new(50.0, -5.0));
        assert_eq!(sel, Some(Region::new(5, 0, 9, 5)));
    }

    #[test]
    fn test_region_outline_covers_pixel_edges() {
        let g = GeometryTransform::new(10, 10, 20.0, 20.0);
        let outline = g.region_outline(&Region::new(1, 2, 3, 4));
        assert!(close(outline[0], Point::new(2.0, 4.0)));
        assert!(close(outline[2], Point::new(8.0, 10.0)));
    }

    #[test]
    fn test_scroll_leaves_fit_at_current_scale() {
        let g = GeometryTransform::new(100, 100, 300.0, 300.0);
        let zoomed_in = g.scrolled(-1.0, DEFAULT_ZOOM_STEP);
        match zoomed_in.zoom {
            Zoom::Fixed(s) => assert!((s - 3.3).abs() < EPS),
            Zoom::Fit => panic!("scrolling must leave fit mode"),
        }
        let back = zoomed_in.scrolled(1.0, DEFAULT_ZOOM_STEP);
        assert!((back.scale() - 3.0).abs() < EPS);

        assert_eq!(g.without_fit().zoom, Zoom::Fixed(3.0));
        assert_eq!(g.with_preset(ZOOM_PRESETS[0]).scale(), 0.125);
        assert_eq!(g.with_preset(0.0).zoom, Zoom::Fit);
    }

    #[test]
    fn test_rotation_steps() {
        assert_eq!(Rotation::R270.clockwise(), Rotation::R0);
        assert_eq!(Rotation::R0.counter_clockwise(), Rotation::R270);
        assert_eq!(Rotation::from_quadrant(6), Rotation::R180);
    }
}
