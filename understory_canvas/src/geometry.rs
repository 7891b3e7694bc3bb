// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Building paths from shape point data.
//!
//! Shapes keep their model data in `f64`. Native paths are `f32`, so the
//! point at which model data is narrowed decides how geometry behaves
//! under zoom:
//!
//! - [`RenderPrecision::Double`] maps points to pixel space in `f64` and
//!   narrows afterwards. The path is rebuilt whenever the zoom changes and
//!   stays precise at any zoom level.
//! - [`RenderPrecision::Single`] narrows the model points once. A pixel
//!   transform (see [`ShapeView::pixel_transform`]) maps the path into
//!   pixel space when it is drawn, so zooming only rebuilds the
//!   transformed copy.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use alloc::vec::Vec;
use kurbo::{
    Affine, BezPath, Line, ParamCurve, ParamCurveNearest, Point, Rect, Shape as _, Stroke,
    StrokeOpts, Vec2,
};

/// Tolerance used when flattening stroke outlines for bounds.
const STROKE_TOLERANCE: f64 = 0.1;

/// How model data is lowered to native `f32` geometry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RenderPrecision {
    /// Narrow model points once and scale them at draw time.
    Single,
    /// Map points to pixels in `f64` before narrowing.
    #[default]
    Double,
}

/// The view parameters a shape's pixel geometry depends on.
///
/// Shape space is `model × pixel_zoom + origin`. `origin` is the pixel
/// viewport origin at the last render-offset reset, so it stays fixed while
/// the viewport pans incrementally.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShapeView {
    /// Zoom factor in pixel space.
    pub pixel_zoom: f64,
    /// Translation applied after scaling.
    pub origin: Vec2,
}

impl Default for ShapeView {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ShapeView {
    /// Unit zoom at the origin.
    pub const IDENTITY: Self = Self {
        pixel_zoom: 1.0,
        origin: Vec2::ZERO,
    };

    /// Maps a model point into shape space.
    #[inline]
    #[must_use]
    pub fn to_pixels(&self, point: Point) -> Point {
        (point.to_vec2() * self.pixel_zoom + self.origin).to_point()
    }

    /// Transform from narrowed model geometry to shape space for
    /// [`RenderPrecision::Single`] geometry.
    ///
    /// The scale is only applied when the pixel zoom exceeds `1.0`.
    #[must_use]
    pub fn pixel_transform(&self) -> Affine {
        let scale = if self.pixel_zoom > 1.0 {
            Affine::scale(self.pixel_zoom)
        } else {
            Affine::IDENTITY
        };
        Affine::translate(self.origin) * scale
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "single precision geometry is deliberately narrowed to f32"
)]
fn narrow(point: Point) -> Point {
    Point::new(f64::from(point.x as f32), f64::from(point.y as f32))
}

/// Builds the model path of a set of point rings.
///
/// Each ring becomes one sub-path; rings with fewer than two points are
/// skipped. Closed rings end with a close command.
#[must_use]
pub fn build_path(
    rings: &[Vec<Point>],
    closed: bool,
    precision: RenderPrecision,
    view: ShapeView,
) -> BezPath {
    let map = |p: Point| match precision {
        RenderPrecision::Double => view.to_pixels(p),
        RenderPrecision::Single => narrow(p),
    };
    let mut path = BezPath::new();
    for ring in rings {
        if ring.len() < 2 {
            continue;
        }
        let mut points = ring.iter().copied().map(map);
        if let Some(first) = points.next() {
            path.move_to(first);
        }
        for p in points {
            path.line_to(p);
        }
        if closed {
            path.close_path();
        }
    }
    path
}

/// Transform from the model path built by [`build_path`] to shape space.
#[must_use]
pub fn path_transform(precision: RenderPrecision, view: ShapeView) -> Affine {
    match precision {
        RenderPrecision::Double => Affine::IDENTITY,
        RenderPrecision::Single => view.pixel_transform(),
    }
}

/// Bounds of `path` widened by a stroke of `width`.
///
/// Returns the tight bounds when `width` is not positive.
#[must_use]
pub fn widened_bounds(path: &BezPath, width: f64) -> Rect {
    if path.elements().is_empty() {
        return Rect::ZERO;
    }
    if width <= 0.0 {
        return path.bounding_box();
    }
    kurbo::stroke(
        path.iter(),
        &Stroke::new(width),
        &StrokeOpts::default(),
        STROKE_TOLERANCE,
    )
    .bounding_box()
}

/// Collapses rects with a non-positive width or height to [`Rect::ZERO`].
#[inline]
#[must_use]
pub fn non_degenerate(rect: Rect) -> Rect {
    if rect.width() <= 0.0 || rect.height() <= 0.0 {
        Rect::ZERO
    } else {
        rect
    }
}

/// Whether `point` lies within `half_width` of any segment of `path`.
///
/// Distance is measured to the segment centerlines, like a stroked line hit
/// test without joins or caps.
#[must_use]
pub fn near_polyline(path: &BezPath, point: Point, half_width: f64) -> bool {
    let limit_sq = half_width * half_width;
    path.segments().any(|seg| {
        let line = Line::new(seg.start(), seg.end());
        line.nearest(point, 0.).distance_sq <= limit_sq
    })
}

/// Smallest integral rect containing `rect` outset by `pad` on every side.
#[must_use]
pub fn outset_to_pixels(rect: Rect, pad: f64) -> Rect {
    Rect::new(
        (rect.x0 - pad).floor(),
        (rect.y0 - pad).floor(),
        (rect.x1 + pad).ceil(),
        (rect.y1 + pad).ceil(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn double_precision_maps_before_narrowing() {
        let view = ShapeView {
            pixel_zoom: 2.0,
            origin: Vec2::new(5.0, 0.0),
        };
        let rings = vec![vec![Point::new(1.0, 1.0), Point::new(3.0, 1.0)]];
        let path = build_path(&rings, false, RenderPrecision::Double, view);
        assert_eq!(path.bounding_box(), Rect::new(7.0, 2.0, 11.0, 2.0));
        assert_eq!(path_transform(RenderPrecision::Double, view), Affine::IDENTITY);
    }

    #[test]
    fn single_precision_defers_the_scale() {
        let view = ShapeView {
            pixel_zoom: 2.0,
            origin: Vec2::ZERO,
        };
        let rings = vec![vec![Point::new(1.0, 1.0), Point::new(3.0, 1.0)]];
        let path = build_path(&rings, false, RenderPrecision::Single, view);
        assert_eq!(path.bounding_box(), Rect::new(1.0, 1.0, 3.0, 1.0));
        assert_eq!(
            path_transform(RenderPrecision::Single, view),
            Affine::scale(2.0)
        );
    }

    #[test]
    fn zoom_at_or_below_one_is_not_scaled() {
        let view = ShapeView {
            pixel_zoom: 1.0,
            origin: Vec2::new(3.0, 4.0),
        };
        assert_eq!(view.pixel_transform(), Affine::translate((3.0, 4.0)));
    }

    #[test]
    fn closed_rings_become_closed_subpaths() {
        let rings = vec![
            vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(4.0, 4.0)],
            vec![Point::new(9.0, 9.0)],
            vec![Point::new(10.0, 10.0), Point::new(12.0, 10.0), Point::new(12.0, 12.0)],
        ];
        let path = build_path(&rings, true, RenderPrecision::Double, ShapeView::IDENTITY);
        let closes = path
            .elements()
            .iter()
            .filter(|el| matches!(el, kurbo::PathEl::ClosePath))
            .count();
        assert_eq!(closes, 2, "degenerate ring should be skipped");
        assert!(path.contains(Point::new(3.0, 1.0)));
        assert!(path.contains(Point::new(11.5, 10.5)));
    }

    #[test]
    fn widened_bounds_cover_the_stroke() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        let b = widened_bounds(&path, 2.0);
        assert!(b.y0 <= -1.0 + 1e-9 && b.y1 >= 1.0 - 1e-9, "got {b:?}");
        assert_eq!(non_degenerate(path.bounding_box()), Rect::ZERO);
    }

    #[test]
    fn near_polyline_uses_half_width() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.0, 0.0));
        assert!(near_polyline(&path, Point::new(5.0, 0.5), 1.0));
        assert!(!near_polyline(&path, Point::new(5.0, 5.0), 1.0));
    }

    #[test]
    fn outset_snaps_outwards() {
        let r = outset_to_pixels(Rect::new(10.2, 10.0, 20.0, 20.5), 0.5);
        assert_eq!(r, Rect::new(9.0, 9.0, 21.0, 21.0));
    }
}
