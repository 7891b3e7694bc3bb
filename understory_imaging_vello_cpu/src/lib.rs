// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_imaging_vello_cpu --heading-base-level=0

//! Vello CPU–backed graphics device.
//!
//! [`VelloCpuDevice`] implements [`GraphicsDevice`] on top of the
//! sparse-strips [`vello_cpu::RenderContext`]. The surface is a [`Pixmap`]
//! that is rasterized on [`flush`](GraphicsDevice::flush); regions of it
//! can then be copied into image resources, which is how a canvas keeps its
//! viewport buffer.
//!
//! Clips are kept as an axis-aligned stack in device space and applied to
//! each draw as a clip layer. [`DrawOp::Clear`] replaces the clipped pixels
//! by compositing with [`Compose::Copy`].

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Cap, Join, Rect};
use peniko::{BlendMode, Brush, Color, Compose, Fill, ImageData, Mix};
use understory_imaging::{
    ClipAntialias, ClipRect, DeviceError, DrawOp, FillRule, GraphicsDevice, ImageDesc, ImageId,
    ImagingBackend, PaintDesc, PaintId, PathCmd, PathDesc, PathId, PixelRect, RectF,
    ResourceBackend, StateOp, StrokeStyle, SurfaceOffset,
};
use vello_cpu::kurbo::{
    Affine as CpuAffine, BezPath, Cap as CpuCap, Join as CpuJoin, Rect as CpuRect, Stroke,
};
use vello_cpu::{Image as CpuImage, ImageSource, Pixmap, RenderContext};

fn affine_to_cpu(xf: Affine) -> CpuAffine {
    CpuAffine::new(xf.as_coeffs())
}

fn rect_to_cpu(rect: Rect) -> CpuRect {
    CpuRect::new(rect.x0, rect.y0, rect.x1, rect.y1)
}

fn rect_path(rect: Rect) -> BezPath {
    let mut path = BezPath::new();
    path.move_to((rect.x0, rect.y0));
    path.line_to((rect.x1, rect.y0));
    path.line_to((rect.x1, rect.y1));
    path.line_to((rect.x0, rect.y1));
    path.close_path();
    path
}

fn stroke_to_cpu(style: &StrokeStyle) -> Stroke {
    let mut stroke = Stroke::new(style.width);
    stroke.miter_limit = style.miter_limit;
    stroke.join = match style.join {
        Join::Bevel => CpuJoin::Bevel,
        Join::Miter => CpuJoin::Miter,
        Join::Round => CpuJoin::Round,
    };
    stroke.start_cap = match style.start_cap {
        Cap::Butt => CpuCap::Butt,
        Cap::Round => CpuCap::Round,
        Cap::Square => CpuCap::Square,
    };
    stroke.end_cap = match style.end_cap {
        Cap::Butt => CpuCap::Butt,
        Cap::Round => CpuCap::Round,
        Cap::Square => CpuCap::Square,
    };
    stroke
}

fn fill_to_cpu(rule: FillRule) -> Fill {
    match rule {
        FillRule::NonZero => Fill::NonZero,
        FillRule::EvenOdd => Fill::EvenOdd,
    }
}

/// Straight-alpha channel value of a premultiplied one.
#[expect(
    clippy::cast_possible_truncation,
    reason = "the quotient is clamped to 255"
)]
fn unpremultiply(c: u8, a: u8) -> u8 {
    if a == 0 {
        return 0;
    }
    let v = (u16::from(c) * 255 + u16::from(a) / 2) / u16::from(a);
    v.min(255) as u8
}

/// Device-space bounds of `clip` under `transform`, snapped if aliased.
fn device_clip(clip: ClipRect, transform: Affine) -> Rect {
    let rect = transform.transform_rect_bbox(clip.rect.to_kurbo());
    match clip.antialias {
        ClipAntialias::Aliased => rect.round(),
        ClipAntialias::PerPrimitive => rect,
    }
}

/// A surface rendered on the CPU with `vello_cpu`.
pub struct VelloCpuDevice {
    ready: bool,
    ctx: Option<RenderContext>,
    pixmap: Option<Pixmap>,
    drawing: bool,
    frames: u64,

    paths: Vec<Option<BezPath>>,
    images: Vec<Option<(ImageDesc, Vec<u8>)>>,
    paints: Vec<Option<PaintDesc>>,

    transform: Affine,
    paint: Option<PaintId>,
    /// Intersected device-space clips, innermost last.
    clips: Vec<Rect>,
}

impl fmt::Debug for VelloCpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VelloCpuDevice")
            .field("ready", &self.ready)
            .field("surface", &self.surface_size())
            .field("drawing", &self.drawing)
            .field("frames", &self.frames)
            .field("clips", &self.clips.len())
            .finish_non_exhaustive()
    }
}

impl Default for VelloCpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl VelloCpuDevice {
    /// Create a device that has not been initialized yet.
    pub fn new() -> Self {
        Self {
            ready: false,
            ctx: None,
            pixmap: None,
            drawing: false,
            frames: 0,
            paths: Vec::new(),
            images: Vec::new(),
            paints: Vec::new(),
            transform: Affine::IDENTITY,
            paint: None,
            clips: Vec::new(),
        }
    }

    /// Size of the surface, if one exists.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.pixmap
            .as_ref()
            .map(|p| (u32::from(p.width()), u32::from(p.height())))
    }

    /// Pixels of the last flushed frame.
    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    /// Straight-alpha RGBA8 pixels of an image resource.
    pub fn image_pixels(&self, id: ImageId) -> Option<&[u8]> {
        let (_, pixels) = self.images.get(id.0 as usize)?.as_ref()?;
        Some(pixels)
    }

    /// Number of presented frames.
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    fn surface_rect(&self) -> Option<Rect> {
        let (w, h) = self.surface_size()?;
        Some(Rect::new(0.0, 0.0, f64::from(w), f64::from(h)))
    }

    fn apply_paint(&mut self, id: PaintId) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let Some(Some(PaintDesc { brush })) = self.paints.get(id.0 as usize) else {
            return;
        };
        match brush.clone() {
            Brush::Solid(color) => ctx.set_paint(color),
            Brush::Gradient(gradient) => ctx.set_paint(gradient),
            Brush::Image(image_brush) => {
                let source = ImageSource::from_peniko_image_data(&image_brush.image);
                ctx.set_paint(CpuImage {
                    image: source,
                    sampler: image_brush.sampler,
                });
            }
        }
    }

    /// Runs `f` under the innermost clip. Draws under an empty clip are
    /// dropped.
    fn clipped(&mut self, f: impl FnOnce(&mut RenderContext)) {
        let transform = self.transform;
        let clip = self.clips.last().copied();
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        match clip {
            None => f(ctx),
            Some(clip) if clip.is_zero_area() => {}
            Some(clip) => {
                ctx.set_transform(CpuAffine::IDENTITY);
                ctx.push_clip_layer(&rect_path(clip));
                ctx.set_transform(affine_to_cpu(transform));
                f(ctx);
                ctx.pop_layer();
            }
        }
    }

    fn clear(&mut self, color: Color) {
        let Some(region) = self.clips.last().copied().or_else(|| self.surface_rect()) else {
            return;
        };
        if region.is_zero_area() {
            return;
        }
        let transform = self.transform;
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        ctx.set_transform(CpuAffine::IDENTITY);
        ctx.push_layer(
            Some(&rect_path(region)),
            Some(BlendMode::new(Mix::Normal, Compose::Copy)),
            None,
            None,
            None,
        );
        ctx.set_paint(color);
        ctx.fill_rect(&rect_to_cpu(region));
        ctx.pop_layer();
        ctx.set_transform(affine_to_cpu(transform));
        if let Some(paint) = self.paint {
            self.apply_paint(paint);
        }
    }

    fn draw_image_rect(
        &mut self,
        image: ImageId,
        src: Option<RectF>,
        dst: RectF,
        sampler: peniko::ImageSampler,
    ) {
        let Some(Some((desc, pixels))) = self.images.get(image.0 as usize) else {
            return;
        };
        let src = src.unwrap_or(RectF::new(
            0.0,
            0.0,
            desc.width as f32,
            desc.height as f32,
        ));
        if dst.width().abs() < f32::EPSILON
            || dst.height().abs() < f32::EPSILON
            || src.width().abs() < f32::EPSILON
            || src.height().abs() < f32::EPSILON
        {
            return;
        }
        let local = Affine::translate((f64::from(dst.x0), f64::from(dst.y0)))
            * Affine::scale_non_uniform(
                f64::from(dst.width() / src.width()),
                f64::from(dst.height() / src.height()),
            )
            * Affine::translate((-f64::from(src.x0), -f64::from(src.y0)));

        let image_data = ImageData {
            data: peniko::Blob::from(pixels.clone()),
            format: desc.format,
            alpha_type: desc.alpha_type,
            width: desc.width,
            height: desc.height,
        };
        let paint = CpuImage {
            image: ImageSource::from_peniko_image_data(&image_data),
            sampler,
        };
        let image_rect = CpuRect::new(0.0, 0.0, f64::from(desc.width), f64::from(desc.height));
        let dst_path = rect_path(dst.to_kurbo());
        let transform = self.transform;

        self.clipped(|ctx| {
            let saved_paint = ctx.paint().clone();
            // Clip to the destination in the current (non-image) transform.
            ctx.push_clip_layer(&dst_path);
            ctx.set_paint(paint);
            ctx.set_transform(affine_to_cpu(transform * local));
            ctx.fill_rect(&image_rect);
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint(saved_paint);
            ctx.pop_layer();
        });
    }
}

impl ResourceBackend for VelloCpuDevice {
    fn create_path(&mut self, desc: PathDesc) -> PathId {
        let mut p = BezPath::new();
        for cmd in desc.commands.iter() {
            match *cmd {
                PathCmd::MoveTo { x, y } => p.move_to((f64::from(x), f64::from(y))),
                PathCmd::LineTo { x, y } => p.line_to((f64::from(x), f64::from(y))),
                PathCmd::QuadTo { x1, y1, x, y } => {
                    p.quad_to((f64::from(x1), f64::from(y1)), (f64::from(x), f64::from(y)));
                }
                PathCmd::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                } => p.curve_to(
                    (f64::from(x1), f64::from(y1)),
                    (f64::from(x2), f64::from(y2)),
                    (f64::from(x), f64::from(y)),
                ),
                PathCmd::Close => p.close_path(),
            }
        }
        let id =
            u32::try_from(self.paths.len()).expect("VelloCpuDevice: too many paths for u32 PathId");
        self.paths.push(Some(p));
        PathId(id)
    }

    fn destroy_path(&mut self, id: PathId) {
        if let Some(slot) = self.paths.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    fn create_image(&mut self, desc: ImageDesc, pixels: &[u8]) -> ImageId {
        let id = u32::try_from(self.images.len())
            .expect("VelloCpuDevice: too many images for u32 ImageId");
        self.images.push(Some((desc, pixels.to_vec())));
        ImageId(id)
    }

    fn destroy_image(&mut self, id: ImageId) {
        if let Some(slot) = self.images.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    fn create_paint(&mut self, desc: PaintDesc) -> PaintId {
        let id = u32::try_from(self.paints.len())
            .expect("VelloCpuDevice: too many paints for u32 PaintId");
        self.paints.push(Some(desc));
        PaintId(id)
    }

    fn destroy_paint(&mut self, id: PaintId) {
        if let Some(slot) = self.paints.get_mut(id.0 as usize) {
            *slot = None;
        }
    }
}

impl ImagingBackend for VelloCpuDevice {
    fn state(&mut self, op: StateOp) {
        match op {
            StateOp::SetTransform(xf) => {
                self.transform = xf;
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.set_transform(affine_to_cpu(xf));
                }
            }
            StateOp::PushClip(clip) => {
                let mut rect = device_clip(clip, self.transform);
                if let Some(outer) = self.clips.last() {
                    rect = rect.intersect(*outer);
                }
                self.clips.push(rect);
            }
            StateOp::PopClip => {
                if self.clips.pop().is_none() {
                    tracing::warn!("PopClip with an empty clip stack");
                }
            }
            StateOp::SetPaint(id) => {
                self.paint = Some(id);
                self.apply_paint(id);
            }
            StateOp::SetStroke(style) => {
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.set_stroke(stroke_to_cpu(&style));
                }
            }
            StateOp::SetFillRule(rule) => {
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.set_fill_rule(fill_to_cpu(rule));
                }
            }
        }
    }

    fn draw(&mut self, op: DrawOp) {
        if !self.drawing {
            tracing::trace!(?op, "draw outside of a session ignored");
            return;
        }
        match op {
            DrawOp::Clear(color) => self.clear(color),
            DrawOp::FillPath(id) => {
                if let Some(Some(path)) = self.paths.get(id.0 as usize) {
                    let path = path.clone();
                    self.clipped(|ctx| ctx.fill_path(&path));
                }
            }
            DrawOp::StrokePath(id) => {
                if let Some(Some(path)) = self.paths.get(id.0 as usize) {
                    let path = path.clone();
                    self.clipped(|ctx| ctx.stroke_path(&path));
                }
            }
            DrawOp::FillRect(rect) => {
                let rect = rect_to_cpu(rect.to_kurbo());
                self.clipped(|ctx| ctx.fill_rect(&rect));
            }
            DrawOp::DrawImageRect {
                image,
                src,
                dst,
                sampler,
            } => self.draw_image_rect(image, src, dst, sampler),
        }
    }
}

impl GraphicsDevice for VelloCpuDevice {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn initialize(&mut self) {
        if !self.ready {
            self.ready = true;
            tracing::debug!("vello_cpu device initialized");
        }
    }

    fn reset(&mut self) {
        self.ready = false;
        self.release_surface();
        self.paths.clear();
        self.images.clear();
        self.paints.clear();
        self.paint = None;
        tracing::debug!("vello_cpu device reset");
    }

    fn trim(&mut self) {
        while matches!(self.paths.last(), Some(None)) {
            self.paths.pop();
        }
        while matches!(self.images.last(), Some(None)) {
            self.images.pop();
        }
        while matches!(self.paints.last(), Some(None)) {
            self.paints.pop();
        }
        self.paths.shrink_to_fit();
        self.images.shrink_to_fit();
        self.paints.shrink_to_fit();
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if !self.ready {
            return Err(DeviceError::ResourceCreation("surface"));
        }
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(DeviceError::ResourceCreation("surface"));
        };
        if w == 0 || h == 0 {
            return Err(DeviceError::ResourceCreation("surface"));
        }
        self.ctx = Some(RenderContext::new(w, h));
        self.pixmap = Some(Pixmap::new(w, h));
        self.drawing = false;
        tracing::debug!(width, height, "vello_cpu surface created");
        Ok(())
    }

    fn release_surface(&mut self) {
        self.ctx = None;
        self.pixmap = None;
        self.drawing = false;
        self.clips.clear();
    }

    fn begin_draw(&mut self) -> Result<SurfaceOffset, DeviceError> {
        if !self.ready {
            return Err(DeviceError::DeviceLost);
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(DeviceError::Draw("no surface"));
        };
        ctx.reset();
        self.transform = Affine::IDENTITY;
        self.clips.clear();
        self.drawing = true;
        if let Some(paint) = self.paint {
            self.apply_paint(paint);
        }
        Ok(SurfaceOffset::default())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        let (Some(ctx), Some(pixmap)) = (self.ctx.as_mut(), self.pixmap.as_mut()) else {
            return Err(DeviceError::Draw("no surface"));
        };
        if !self.clips.is_empty() {
            tracing::warn!(depth = self.clips.len(), "flush with clips still pushed");
            self.clips.clear();
        }
        ctx.flush();
        ctx.render_to_pixmap(pixmap);
        self.drawing = false;
        Ok(())
    }

    fn copy_to_image(&mut self, image: ImageId, src: PixelRect) -> Result<(), DeviceError> {
        let Some(pixmap) = self.pixmap.as_ref() else {
            return Err(DeviceError::Draw("no surface"));
        };
        let Some(Some((desc, pixels))) = self.images.get_mut(image.0 as usize) else {
            return Err(DeviceError::Draw("copy target"));
        };
        let pw = u32::from(pixmap.width());
        let ph = u32::from(pixmap.height());
        let width = src.width.min(desc.width).min(pw.saturating_sub(src.x));
        let height = src.height.min(desc.height).min(ph.saturating_sub(src.y));
        let data = pixmap.data();
        for row in 0..height {
            let from = ((src.y + row) * pw + src.x) as usize;
            let to = (row * desc.width) as usize * 4;
            for (i, p) in data[from..from + width as usize].iter().enumerate() {
                let at = to + i * 4;
                pixels[at..at + 4].copy_from_slice(&[
                    unpremultiply(p.r, p.a),
                    unpremultiply(p.g, p.a),
                    unpremultiply(p.b, p.a),
                    p.a,
                ]);
            }
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        if self.pixmap.is_none() {
            return Err(DeviceError::Draw("no surface"));
        }
        self.drawing = false;
        self.frames += 1;
        Ok(())
    }
}
