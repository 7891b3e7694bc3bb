// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry of rectangles.

use kurbo::{BezPath, Point, Rect, RoundedRect, Shape as _, Size};
use understory_imaging::{FillRule, GraphicsDevice, ResourceBackend, path_desc_from_bez};

use super::NativePath;
use crate::RenderContext;
use crate::geometry::{ShapeView, non_degenerate};
use crate::style::NativeBrushes;

/// Flattening tolerance for rounded corners, in pixels.
const CORNER_TOLERANCE: f64 = 0.1;

/// An axis-aligned rectangle in model units.
///
/// Unlike path shapes, rectangle bounds are exact: no stroke or antialiasing
/// outset is added.
#[derive(Debug)]
pub(crate) struct RectangleGeometry {
    pub(crate) location: Point,
    pub(crate) size: Size,
    pub(crate) corner_radius: f64,
    view: Option<ShapeView>,
    bounds: Option<Rect>,
    native: NativePath,
}

impl RectangleGeometry {
    pub(crate) fn new(location: Point, size: Size) -> Self {
        Self {
            location,
            size,
            corner_radius: 0.0,
            view: None,
            bounds: None,
            native: NativePath::default(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.view = None;
        self.bounds = None;
        self.native.retire();
    }

    pub(crate) fn forget_native(&mut self) {
        self.native.forget();
    }

    pub(crate) fn release<B: ResourceBackend + ?Sized>(&mut self, backend: &mut B) {
        self.native.release(backend);
    }

    fn sync_view(&mut self, view: ShapeView) {
        if self.view != Some(view) {
            self.clear();
            self.view = Some(view);
        }
    }

    pub(crate) fn bounds(&mut self, view: ShapeView) -> Rect {
        self.sync_view(view);
        *self.bounds.get_or_insert_with(|| {
            non_degenerate(Rect::from_origin_size(
                view.to_pixels(self.location),
                self.size * view.pixel_zoom,
            ))
        })
    }

    fn pixel_path(&mut self, view: ShapeView) -> BezPath {
        let rect = self.bounds(view);
        if rect == Rect::ZERO {
            return BezPath::new();
        }
        let radius = self.corner_radius * view.pixel_zoom;
        if radius > 0.0 {
            RoundedRect::from_rect(rect, radius).to_path(CORNER_TOLERANCE)
        } else {
            rect.to_path(CORNER_TOLERANCE)
        }
    }

    pub(crate) fn hit_test(&mut self, point: Point, view: ShapeView) -> bool {
        let rect = self.bounds(view);
        let radius = self.corner_radius * view.pixel_zoom;
        if radius > 0.0 {
            RoundedRect::from_rect(rect, radius).contains(point)
        } else {
            rect.contains(point)
        }
    }

    pub(crate) fn init_render<D: GraphicsDevice>(
        &mut self,
        cx: &mut RenderContext<D>,
        view: ShapeView,
    ) {
        self.sync_view(view);
        let device = cx.device_mut();
        self.native.flush(device);
        if self.native.get().is_none() {
            let path = self.pixel_path(view);
            self.native.set(device.create_path(path_desc_from_bez(&path)));
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
        let Some(path) = self.native.get() else {
            return;
        };
        if let Some(fill) = native.fill {
            cx.fill_path(path, fill, FillRule::NonZero);
        }
        if let Some(stroke) = native.stroke
            && thickness > 0.0
        {
            cx.stroke_path(path, stroke, thickness);
        }
    }
}
