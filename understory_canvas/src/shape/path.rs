// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry of lines, polylines and multi-polygons.

use alloc::vec::Vec;

use kurbo::{Affine, BezPath, Point, Rect, Shape as _};
use understory_imaging::{FillRule, GraphicsDevice, ResourceBackend, path_desc_from_bez};

use super::NativePath;
use crate::RenderContext;
use crate::geometry::{
    RenderPrecision, ShapeView, build_path, near_polyline, non_degenerate, path_transform,
    widened_bounds,
};
use crate::style::NativeBrushes;

/// Point rings plus everything derived from them.
///
/// For [`RenderPrecision::Double`] the model path is already in shape space
/// and depends on the view; for [`RenderPrecision::Single`] it is the
/// narrowed model data and only the transformed copy in `scaled` follows
/// the view.
#[derive(Debug)]
pub(crate) struct PathGeometry {
    rings: Vec<Vec<Point>>,
    closed: bool,
    precision: RenderPrecision,
    pub(crate) fill_rule: FillRule,
    view: Option<ShapeView>,
    model: Option<BezPath>,
    bounds: Option<Rect>,
    native: NativePath,
    scaled: NativePath,
}

impl PathGeometry {
    pub(crate) fn new(rings: Vec<Vec<Point>>, closed: bool) -> Self {
        Self {
            rings,
            closed,
            precision: RenderPrecision::Double,
            fill_rule: FillRule::EvenOdd,
            view: None,
            model: None,
            bounds: None,
            native: NativePath::default(),
            scaled: NativePath::default(),
        }
    }

    pub(crate) fn rings(&self) -> &[Vec<Point>] {
        &self.rings
    }

    pub(crate) fn set_rings(&mut self, rings: Vec<Vec<Point>>) {
        self.rings = rings;
        self.clear();
    }

    pub(crate) fn precision(&self) -> RenderPrecision {
        self.precision
    }

    pub(crate) fn set_precision(&mut self, precision: RenderPrecision) {
        self.precision = precision;
        self.clear();
    }

    /// Drops the model path, bounds and native paths.
    pub(crate) fn clear(&mut self) {
        self.model = None;
        self.bounds = None;
        self.view = None;
        self.native.retire();
        self.scaled.retire();
    }

    pub(crate) fn clear_bounds(&mut self) {
        self.bounds = None;
    }

    pub(crate) fn on_zoom_factor_changed(&mut self) {
        self.drop_view_data();
        self.view = None;
    }

    pub(crate) fn forget_native(&mut self) {
        self.native.forget();
        self.scaled.forget();
    }

    pub(crate) fn release<B: ResourceBackend + ?Sized>(&mut self, backend: &mut B) {
        self.native.release(backend);
        self.scaled.release(backend);
    }

    fn drop_view_data(&mut self) {
        if self.precision == RenderPrecision::Double {
            self.model = None;
            self.native.retire();
        }
        self.scaled.retire();
        self.bounds = None;
    }

    fn sync_view(&mut self, view: ShapeView) {
        if self.view != Some(view) {
            self.drop_view_data();
            self.view = Some(view);
        }
    }

    fn model(&mut self, view: ShapeView) -> &BezPath {
        self.sync_view(view);
        self.model
            .get_or_insert_with(|| build_path(&self.rings, self.closed, self.precision, view))
    }

    /// Scale between the model path and shape space.
    fn model_scale(&self, view: ShapeView) -> f64 {
        if self.precision == RenderPrecision::Single && view.pixel_zoom > 1.0 {
            view.pixel_zoom
        } else {
            1.0
        }
    }

    /// Creates the native path and, when the model needs a transform to
    /// reach shape space, its transformed copy.
    pub(crate) fn init_render<D: GraphicsDevice>(
        &mut self,
        cx: &mut RenderContext<D>,
        view: ShapeView,
    ) {
        self.sync_view(view);
        let device = cx.device_mut();
        self.native.flush(device);
        self.scaled.flush(device);
        if self.native.get().is_none() {
            let desc = path_desc_from_bez(self.model(view));
            self.native.set(device.create_path(desc));
        }
        let transform = path_transform(self.precision, view);
        if transform != Affine::IDENTITY && self.scaled.get().is_none() {
            let scaled = transform * self.model(view).clone();
            self.scaled.set(device.create_path(path_desc_from_bez(&scaled)));
        }
    }

    /// Pixel bounds: the transformed model bounds, outset by half the stroke
    /// on stroked closed shapes and by one pixel always.
    pub(crate) fn bounds(&mut self, view: ShapeView, thickness: f64, stroked: bool) -> Rect {
        self.sync_view(view);
        if let Some(bounds) = self.bounds {
            return bounds;
        }
        let closed = self.closed;
        let scale = self.model_scale(view);
        let model = self.model(view);
        let model_bounds = if closed {
            non_degenerate(model.bounding_box())
        } else {
            non_degenerate(widened_bounds(model, thickness / scale))
        };
        let bounds = if model_bounds == Rect::ZERO {
            Rect::ZERO
        } else {
            let half_stroke = if closed && stroked { thickness / 2.0 } else { 0.0 };
            let pad = half_stroke + 1.0;
            path_transform(self.precision, view)
                .transform_rect_bbox(model_bounds)
                .inflate(pad, pad)
        };
        self.bounds = Some(bounds);
        bounds
    }

    /// Closed shapes hit inside their fill; open ones within half the
    /// stroke thickness of a segment.
    pub(crate) fn hit_test(&mut self, point: Point, view: ShapeView, thickness: f64) -> bool {
        let local = path_transform(self.precision, view).inverse() * point;
        let scale = self.model_scale(view);
        let closed = self.closed;
        let fill_rule = self.fill_rule;
        let model = self.model(view);
        if closed {
            let winding = model.winding(local);
            match fill_rule {
                FillRule::EvenOdd => winding % 2 != 0,
                FillRule::NonZero => winding != 0,
            }
        } else {
            near_polyline(model, local, thickness / 2.0 / scale)
        }
    }

    pub(crate) fn render<D: GraphicsDevice>(
        &mut self,
        cx: &mut RenderContext<D>,
        view: ShapeView,
        native: NativeBrushes,
        thickness: f64,
    ) {
        self.init_render(cx, view);
        let Some(path) = self.scaled.get().or(self.native.get()) else {
            return;
        };
        if self.closed
            && let Some(fill) = native.fill
        {
            cx.fill_path(path, fill, self.fill_rule);
        }
        if let Some(stroke) = native.stroke
            && thickness > 0.0
        {
            cx.stroke_path(path, stroke, thickness);
        }
    }
}
