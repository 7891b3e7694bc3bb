// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The canvas: layers, viewport and incremental rendering.
//!
//! ## Repaint model
//!
//! The canvas keeps a list of dirty rects in shape space. A frame draws the
//! previous frame's pixels (the viewport buffer) shifted by the pan since it
//! was captured, then repaints only the dirty rects on top, each under an
//! aliased clip. Panning by less than a viewport queues the newly exposed
//! strips; everything else queues a zero-sized rect, which repaints the
//! whole viewport without clearing it first.
//!
//! ## Coordinates
//!
//! Pan deltas accumulate in a render offset applied as a translation while
//! repainting, so shape geometry built in pixel space stays valid across
//! pans. The offset goes back to zero on the frame after a full reset.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::mem;

use kurbo::{Affine, Point, Rect, Size, Vec2};
use peniko::Color;
use understory_imaging::{DeviceError, GraphicsDevice, ImageDesc, ImageId, PixelRect, SurfaceOffset};

use crate::geometry::{ShapeView, outset_to_pixels};
use crate::label::TextRenderer;
use crate::layer::{LayerParams, ShapeKey, ShapeLayer};
use crate::viewport::{BASE_DPI, Viewport};
use crate::{CanvasError, RenderContext, Shape};

/// Initial configuration of a [`Canvas`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CanvasOptions {
    /// Display DPI; `96` maps one logical unit to one pixel.
    pub dpi: f64,
    /// Logical zoom factor, clamped to at least `1.0`.
    pub zoom_factor: f64,
    /// Logical viewport origin.
    pub viewport_origin: Point,
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self {
            dpi: BASE_DPI,
            zoom_factor: 1.0,
            viewport_origin: Point::ZERO,
        }
    }
}

/// A retained-mode surface of shape layers over a [`GraphicsDevice`].
///
/// The host drives the canvas through a few callbacks: [`resize`](Self::resize)
/// when the control changes size, [`display_invalidated`](Self::display_invalidated)
/// when the display or its DPI changes, [`loaded`](Self::loaded) and
/// [`unloaded`](Self::unloaded) around its visual lifetime, and
/// [`arrange`](Self::arrange) whenever [`needs_arrange`](Self::needs_arrange)
/// reports pending work.
///
/// ```rust
/// use kurbo::{Point, Size};
/// use peniko::Color;
/// use understory_canvas::{Canvas, LayerParams, Shape, ShapeStyle};
/// use understory_imaging_ref::RefDevice;
///
/// let mut canvas = Canvas::new(RefDevice::new());
/// canvas.resize(Size::new(200.0, 100.0)).unwrap();
///
/// let mut rect = Shape::rectangle(Point::new(10.0, 10.0), Size::new(50.0, 20.0));
/// rect.set_normal_style(Some(ShapeStyle::new().with_fill(Color::WHITE)));
/// let keys = canvas.set_shapes_for_layer(Some(vec![rect]), LayerParams::new(1, 0));
///
/// canvas.arrange().unwrap();
/// assert!(canvas.has_buffer());
/// assert_eq!(canvas.hit_test(Point::new(20.0, 20.0), None), Some(keys[0]));
/// ```
#[derive(Debug)]
pub struct Canvas<D> {
    cx: RenderContext<D>,
    viewport: Viewport,
    layers: Vec<ShapeLayer>,
    generation: u32,
    dirty: Vec<Rect>,
    render_offset: Vec2,
    offset_reset: bool,
    buffer: Option<ImageId>,
    buffer_origin: Vec2,
    has_buffer: bool,
    updating: bool,
    was_unloaded: bool,
    arrange_requested: bool,
}

impl<D: GraphicsDevice> Canvas<D> {
    /// A canvas at 96 DPI, zoom `1.0` and the logical origin.
    pub fn new(device: D) -> Self {
        Self::with_options(device, CanvasOptions::default())
    }

    /// A canvas with explicit initial options.
    ///
    /// The device is initialized right away; no surface exists until the
    /// first [`resize`](Self::resize) to a positive size.
    pub fn with_options(mut device: D, options: CanvasOptions) -> Self {
        if !device.is_ready() {
            device.initialize();
        }
        let mut viewport = Viewport::new(options.dpi);
        viewport.set_zoom(options.zoom_factor.max(1.0));
        viewport.set_origin(options.viewport_origin);
        Self {
            cx: RenderContext::new(device),
            viewport,
            layers: Vec::new(),
            generation: 0,
            dirty: vec![Rect::ZERO],
            render_offset: Vec2::ZERO,
            offset_reset: false,
            buffer: None,
            buffer_origin: Vec2::ZERO,
            has_buffer: false,
            updating: false,
            was_unloaded: false,
            arrange_requested: false,
        }
    }

    // --- accessors ------------------------------------------------------

    /// The device.
    pub fn device(&self) -> &D {
        self.cx.device()
    }

    /// Mutable access to the device.
    pub fn device_mut(&mut self) -> &mut D {
        self.cx.device_mut()
    }

    /// The render context.
    pub fn context(&self) -> &RenderContext<D> {
        &self.cx
    }

    /// Viewport origin, zoom and size.
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Pending repaint regions in shape space.
    ///
    /// A zero-sized rect stands for the whole viewport.
    pub fn dirty_rects(&self) -> &[Rect] {
        &self.dirty
    }

    /// Whether the previous frame's pixels are available for reuse.
    pub fn has_buffer(&self) -> bool {
        self.has_buffer
    }

    /// Accumulated pan since the last offset reset, in pixels.
    pub fn render_offset(&self) -> Vec2 {
        self.render_offset
    }

    /// Whether a shape-update batch is open.
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Whether the canvas has work for [`arrange`](Self::arrange).
    pub fn needs_arrange(&self) -> bool {
        self.arrange_requested
    }

    /// Parameters of every layer, bottom to top.
    pub fn layers(&self) -> impl Iterator<Item = &LayerParams> + '_ {
        self.layers.iter().map(|layer| &layer.params)
    }

    /// The view shapes are built against: pixel zoom and the pixel origin at
    /// the last offset reset.
    pub fn shape_view(&self) -> ShapeView {
        let origin = if self.offset_reset {
            self.viewport.pixel_origin().to_vec2()
        } else {
            self.viewport.pixel_origin().to_vec2() - self.render_offset
        };
        ShapeView {
            pixel_zoom: self.viewport.pixel_zoom(),
            origin,
        }
    }

    fn request_arrange(&mut self) {
        self.arrange_requested = true;
    }

    // --- layers ---------------------------------------------------------

    /// Replaces the shapes of the layer `params.id`.
    ///
    /// `None` removes the layer. Otherwise the layer is created if needed,
    /// its parameters are updated and `shapes` are attached to it. Prior
    /// shapes are detached and their native resources released. Returns
    /// handles to the attached shapes in order.
    pub fn set_shapes_for_layer(
        &mut self,
        shapes: Option<Vec<Shape>>,
        params: LayerParams,
    ) -> Vec<ShapeKey> {
        self.reset_drawing(true);

        let index = self.layers.iter().position(|l| l.params.id == params.id);
        if let Some(i) = index {
            for mut shape in self.layers[i].take_shapes() {
                shape.release(self.cx.device_mut());
            }
        }

        let Some(shapes) = shapes else {
            if let Some(i) = index {
                self.layers.remove(i);
                tracing::debug!(layer = params.id, "layer removed");
            }
            return Vec::new();
        };

        self.generation = self.generation.wrapping_add(1);
        let i = match index {
            Some(i) => {
                self.layers[i].params = params;
                i
            }
            None => {
                self.layers.push(ShapeLayer::new(params));
                self.layers.len() - 1
            }
        };
        tracing::debug!(layer = params.id, shapes = shapes.len(), "layer replaced");
        let keys = self.layers[i].set_shapes(shapes, self.generation);
        self.layers.sort_by_key(|l| l.params.z_index);
        keys
    }

    /// Whether a layer with this id exists.
    pub fn has_shapes_for_layer(&self, id: i32) -> bool {
        self.layers.iter().any(|l| l.params.id == id)
    }

    /// The shape behind `key`, unless the key is stale.
    pub fn shape(&self, key: ShapeKey) -> Option<&Shape> {
        self.layers.iter().find_map(|l| l.get(key))
    }

    /// Mutable access to the shape behind `key`.
    ///
    /// Changes made this way are not queued for repaint; use
    /// [`update_shape`](Self::update_shape) or follow up with
    /// [`invalidate_shape`](Self::invalidate_shape).
    pub fn shape_mut(&mut self, key: ShapeKey) -> Option<&mut Shape> {
        self.layers.iter_mut().find_map(|l| l.get_mut(key))
    }

    /// Opens a batch of shape changes. Rendering and per-shape invalidation
    /// are suspended until [`end_shape_update`](Self::end_shape_update).
    pub fn begin_shape_update(&mut self) {
        self.updating = true;
    }

    /// Closes a batch of shape changes and queues a full repaint.
    pub fn end_shape_update(&mut self) {
        self.updating = false;
        self.reset_viewport_buffer();
    }

    // --- hit testing ----------------------------------------------------

    /// Topmost shape under the logical `point`.
    ///
    /// Layers are searched from the top, shapes from last to first. With
    /// `z_index`, only layers of that z-index are searched.
    pub fn hit_test(&mut self, point: Point, z_index: Option<i32>) -> Option<ShapeKey> {
        let point = self.viewport.to_pixel_point(point) - self.render_offset;
        let view = self.shape_view();
        for layer in self.layers.iter_mut().rev() {
            if z_index.is_some_and(|z| z != layer.params.z_index) {
                continue;
            }
            let hit = layer
                .shapes
                .iter_mut()
                .rposition(|shape| shape.hit_test(point, view));
            if let Some(index) = hit {
                return Some(layer.key(index));
            }
        }
        None
    }

    // --- invalidation ---------------------------------------------------

    /// Queues the area of one shape for repaint.
    pub fn invalidate_shape(&mut self, key: ShapeKey) {
        if self.updating {
            return;
        }
        let view = self.shape_view();
        let Some(shape) = self.shape_mut(key) else {
            return;
        };
        let area = shape_area(shape, view);
        self.queue(area);
    }

    /// Runs `f` on the shape behind `key` and queues its old and new area
    /// for repaint if `f` left it in need of rendering.
    ///
    /// Returns `None` for a stale key.
    pub fn update_shape<R>(&mut self, key: ShapeKey, f: impl FnOnce(&mut Shape) -> R) -> Option<R> {
        let view = self.shape_view();
        let updating = self.updating;
        let shape = self.shape_mut(key)?;
        let before = shape_area(shape, view);
        let out = f(shape);
        if updating || (shape.is_valid() && shape.is_style_valid()) {
            return Some(out);
        }
        let after = shape_area(shape, view);
        self.queue(before);
        self.queue(after);
        Some(out)
    }

    fn queue(&mut self, area: Option<Rect>) {
        if let Some(rect) = area {
            tracing::trace!(?rect, "dirty rect queued");
            self.dirty.push(rect);
            self.request_arrange();
        }
    }

    // --- viewport -------------------------------------------------------

    /// Logical viewport origin.
    pub fn viewport_origin(&self) -> Point {
        self.viewport.origin()
    }

    /// Pans the viewport to `origin`.
    ///
    /// With a viewport buffer, a pan by less than the viewport size queues
    /// only the strips it exposes; a larger pan discards the buffer.
    pub fn set_viewport_origin(&mut self, origin: Point) {
        let old = self.viewport.origin();
        let delta = self.viewport.pixel_delta_to(origin);
        if delta == Vec2::ZERO {
            return;
        }
        let size = self.viewport.pixel_size();
        let offset = self.render_offset;

        if self.has_buffer {
            if delta.x.abs() >= size.width || delta.y.abs() >= size.height {
                self.reset_viewport_buffer();
            } else {
                let rightwards = origin.x > old.x;
                let mut strip_width = 0.0;
                if delta.x != 0.0 {
                    let (x, width) = if rightwards {
                        (-(offset.x + delta.x), delta.x)
                    } else {
                        (size.width - offset.x, -delta.x)
                    };
                    strip_width = width;
                    let strip =
                        Rect::from_origin_size((x, -offset.y), Size::new(width, size.height));
                    tracing::trace!(?strip, "vertical pan strip");
                    self.dirty.push(strip);
                }
                if delta.y != 0.0 {
                    let (mut x, mut width) = (-offset.x, size.width);
                    if rightwards {
                        x -= strip_width;
                    } else {
                        width += strip_width;
                    }
                    let (y, height) = if origin.y > old.y {
                        (-(offset.y + delta.y), delta.y)
                    } else {
                        (size.height - offset.y, -delta.y)
                    };
                    let strip = Rect::from_origin_size((x, y), Size::new(width, height));
                    tracing::trace!(?strip, "horizontal pan strip");
                    self.dirty.push(strip);
                }
            }
        }

        if !self.offset_reset {
            self.render_offset += delta;
        }
        self.viewport.set_origin(origin);
        self.request_arrange();
    }

    /// Logical zoom factor.
    pub fn zoom_factor(&self) -> f64 {
        self.viewport.zoom()
    }

    /// Sets the zoom factor, clamped to at least `1.0`. Every shape drops
    /// its zoom-dependent geometry and the whole viewport is repainted.
    pub fn set_zoom_factor(&mut self, zoom: f64) {
        let zoom = zoom.max(1.0);
        if zoom == self.viewport.zoom() {
            return;
        }
        self.viewport.set_zoom(zoom);
        self.for_each_shape(Shape::on_zoom_factor_changed);
        self.offset_reset = true;
        self.render_offset = Vec2::ZERO;
        self.reset_viewport_buffer();
    }

    /// Installs the text renderer used to measure and draw labels.
    pub fn set_text_renderer(&mut self, text: Option<Box<dyn TextRenderer>>) {
        self.cx.set_text_renderer(text);
        self.reset_drawing(false);
    }

    // --- host callbacks -------------------------------------------------

    /// The control changed size: the surface is re-created at the new pixel
    /// size and everything is repainted. A non-positive size leaves the
    /// canvas without a surface.
    pub fn resize(&mut self, size: Size) -> Result<(), CanvasError> {
        self.viewport.set_size(size);
        self.reset_drawing(true);
        self.clear_render_context(false);
        self.init_render_context()
    }

    /// The display or its DPI changed.
    pub fn display_invalidated(&mut self, dpi: f64) -> Result<(), CanvasError> {
        self.viewport.set_dpi(dpi);
        self.reset_drawing(true);
        self.clear_render_context(false);
        self.init_render_context()
    }

    /// The host control became visible again.
    pub fn loaded(&mut self) -> Result<(), CanvasError> {
        let reacquire = self.was_unloaded && !self.cx.is_initialized();
        self.was_unloaded = false;
        if reacquire {
            self.acquire()?;
        }
        Ok(())
    }

    /// The host control went away: every resource is released and all
    /// layers are dropped.
    pub fn unloaded(&mut self) {
        self.was_unloaded = true;
        self.clean_up();
    }

    /// The application is being suspended.
    pub fn clean_up_on_suspend(&mut self) {
        if self.cx.device().is_ready() {
            self.cx.device_mut().trim();
        }
    }

    /// Layout pass: re-acquires resources after an unload, then renders.
    pub fn arrange(&mut self) -> Result<(), CanvasError> {
        if self.was_unloaded && !self.cx.is_initialized() {
            self.acquire()?;
        }
        self.render()
    }

    fn acquire(&mut self) -> Result<(), CanvasError> {
        if !self.cx.device().is_ready() {
            self.cx.device_mut().initialize();
        }
        self.init_render_context()?;
        self.reset_viewport_buffer();
        Ok(())
    }

    fn clean_up(&mut self) {
        self.reset_drawing(true);
        self.clear_render_context(false);
        self.cx.device_mut().reset();
        for layer in &mut self.layers {
            layer.take_shapes();
        }
        self.layers.clear();
        tracing::debug!("canvas cleaned up");
    }

    // --- resets ---------------------------------------------------------

    fn for_each_shape(&mut self, mut f: impl FnMut(&mut Shape)) {
        for layer in &mut self.layers {
            layer.shapes.iter_mut().for_each(&mut f);
        }
    }

    /// Invalidates every shape and repaints the whole viewport.
    ///
    /// A display change also drops all native resources and schedules an
    /// offset reset for the next frame.
    fn reset_drawing(&mut self, display_changed: bool) {
        tracing::debug!(display_changed, "full repaint");
        self.invalidate_shapes(display_changed);
        self.reset_viewport_buffer();
    }

    fn invalidate_shapes(&mut self, display_changed: bool) {
        if display_changed {
            self.discard_shape_resources(false);
            self.offset_reset = true;
        } else {
            self.for_each_shape(|shape| shape.invalidate(true));
        }
    }

    /// Drops the native resources of every shape. They are destroyed on the
    /// device unless it was lost, in which case their ids are meaningless.
    fn discard_shape_resources(&mut self, device_lost: bool) {
        let release = !device_lost && self.cx.device().is_ready();
        let Self { cx, layers, .. } = self;
        for shape in layers.iter_mut().flat_map(|l| l.shapes.iter_mut()) {
            if release {
                shape.release(cx.device_mut());
            }
            shape.on_display_invalidated();
        }
    }

    /// Forgets the previous frame and queues a full repaint.
    pub fn reset_viewport_buffer(&mut self) {
        self.has_buffer = false;
        self.dirty.clear();
        self.dirty.push(Rect::ZERO);
        self.request_arrange();
    }

    fn init_render_context(&mut self) -> Result<(), CanvasError> {
        let Some((width, height)) = self.viewport.surface_extent() else {
            return Ok(());
        };
        if !self.cx.device().is_ready() {
            tracing::warn!("graphics device is not ready; surface not created");
            return Ok(());
        }
        self.cx.initialize(width, height)?;
        self.request_arrange();
        Ok(())
    }

    fn clear_render_context(&mut self, device_lost: bool) {
        self.discard_shape_resources(device_lost);
        self.cx.uninitialize();
        if let Some(image) = self.buffer.take()
            && !device_lost
        {
            self.cx.device_mut().destroy_image(image);
        }
        self.has_buffer = false;
    }

    // --- rendering ------------------------------------------------------

    /// Draws a frame: the shifted viewport buffer, then every dirty rect.
    ///
    /// Does nothing during a shape-update batch or without a ready device
    /// and surface. A lost device is re-created and the frame skipped.
    pub fn render(&mut self) -> Result<(), CanvasError> {
        self.arrange_requested = false;
        if self.updating || !self.cx.device().is_ready() || !self.cx.is_initialized() {
            return Ok(());
        }
        if self.offset_reset {
            self.offset_reset = false;
            self.render_offset = Vec2::ZERO;
        }

        let surface_offset = match self.cx.device_mut().begin_draw() {
            Ok(offset) => offset,
            Err(DeviceError::DeviceLost) => return self.recover_lost_device(),
            Err(err) => return Err(CanvasError::DrawSession(err)),
        };
        self.cx.begin_draw();
        if !surface_offset.is_zero() {
            self.cx.push_transform(Affine::translate(surface_offset.to_vec2()));
        }

        self.repaint();

        if !surface_offset.is_zero() {
            self.cx.pop_transform();
        }
        self.cx.end_draw()?;
        self.capture_viewport(surface_offset)?;
        self.cx
            .device_mut()
            .present()
            .map_err(CanvasError::DrawSession)
    }

    fn recover_lost_device(&mut self) -> Result<(), CanvasError> {
        tracing::warn!("graphics device lost; frame skipped");
        self.clear_render_context(true);
        self.cx.device_mut().initialize();
        self.reset_viewport_buffer();
        self.init_render_context()
    }

    fn repaint(&mut self) {
        let size = self.viewport.pixel_size();
        if self.has_buffer
            && let Some(image) = self.buffer
        {
            let at = (self.render_offset - self.buffer_origin).to_point();
            let dst = Rect::from_origin_size(at, size);
            self.cx.draw_image_nearest(image, dst);
        }

        let view = self.shape_view();
        let viewport = Rect::from_origin_size((-self.render_offset).to_point(), size);
        self.cx.push_transform(Affine::translate(self.render_offset));
        let dirty = mem::take(&mut self.dirty);
        tracing::trace!(rects = dirty.len(), "repainting");
        let Self { cx, layers, .. } = self;
        for rect in dirty {
            let full = rect.width() == 0.0 || rect.height() == 0.0;
            let clip = if full { viewport } else { rect };
            cx.push_axis_aligned_clip(clip);
            if !full {
                cx.clear(Color::TRANSPARENT);
            }
            for shape in layers.iter_mut().flat_map(|l| l.shapes.iter_mut()) {
                shape.render(cx, view, clip);
            }
            for shape in layers.iter_mut().flat_map(|l| l.shapes.iter_mut()) {
                shape.render_label(cx, view, clip);
            }
            cx.pop_axis_aligned_clip();
        }
        cx.pop_transform();
    }

    /// Copies the drawn viewport into the buffer image.
    fn capture_viewport(&mut self, surface_offset: SurfaceOffset) -> Result<(), CanvasError> {
        let Some((width, height)) = self.cx.surface_size() else {
            return Ok(());
        };
        let device = self.cx.device_mut();
        let image = match self.buffer {
            Some(image) => image,
            None => {
                let desc = ImageDesc::rgba8(width, height);
                let pixels = vec![0_u8; desc.byte_len()];
                let image = device.create_image(desc, &pixels);
                self.buffer = Some(image);
                image
            }
        };
        let src = PixelRect::new(surface_offset.x, surface_offset.y, width, height);
        device
            .copy_to_image(image, src)
            .map_err(CanvasError::DrawSession)?;
        self.buffer_origin = self.render_offset;
        self.has_buffer = true;
        Ok(())
    }
}

/// Repaint area of a shape: its bounds outset by half the stroke and
/// snapped outwards to whole pixels. `None` for shapes without area.
fn shape_area(shape: &mut Shape, view: ShapeView) -> Option<Rect> {
    let bounds = shape.bounds(view);
    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        return None;
    }
    Some(outset_to_pixels(bounds, shape.stroke_thickness() / 2.0))
}
