// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Draw sessions over a [`GraphicsDevice`].

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Affine, Point, Rect, Size};
use peniko::Color;
use understory_imaging::{
    ClipRect, DrawOp, FillRule, GraphicsDevice, ImageId, ImageQuality, ImageSampler,
    ImagingBackendExt, PaintId, PathId, RectF, StateOp, StrokeStyle,
};

use crate::CanvasError;
use crate::label::TextRenderer;

/// Lifecycle of a [`RenderContext`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No surface.
    #[default]
    Uninitialized,
    /// A surface exists; no draw session is open.
    Initialized,
    /// Between [`RenderContext::begin_draw`] and [`RenderContext::end_draw`].
    Drawing,
}

/// Transform stack, clip stack and draw session over a device.
///
/// The context owns the device for the lifetime of the canvas. Its surface
/// comes and goes with [`initialize`](Self::initialize) and
/// [`uninitialize`](Self::uninitialize).
pub struct RenderContext<D> {
    device: D,
    state: SessionState,
    transform: Affine,
    transforms: Vec<Affine>,
    clip_depth: usize,
    surface_size: Option<(u32, u32)>,
    text: Option<Box<dyn TextRenderer>>,
}

impl<D: fmt::Debug> fmt::Debug for RenderContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("device", &self.device)
            .field("state", &self.state)
            .field("transform", &self.transform)
            .field("transforms", &self.transforms.len())
            .field("clip_depth", &self.clip_depth)
            .field("surface_size", &self.surface_size)
            .field("text", &self.text.is_some())
            .finish()
    }
}

impl<D: GraphicsDevice> RenderContext<D> {
    /// Wraps a device. No surface is created yet.
    pub fn new(device: D) -> Self {
        Self {
            device,
            state: SessionState::Uninitialized,
            transform: Affine::IDENTITY,
            transforms: Vec::new(),
            clip_depth: 0,
            surface_size: None,
            text: None,
        }
    }

    /// The device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the device.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a surface exists.
    pub fn is_initialized(&self) -> bool {
        self.state != SessionState::Uninitialized
    }

    /// Whether a draw session is open.
    pub fn is_drawing(&self) -> bool {
        self.state == SessionState::Drawing
    }

    /// Size of the current surface.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface_size
    }

    /// Creates the drawing surface.
    pub fn initialize(&mut self, width: u32, height: u32) -> Result<(), CanvasError> {
        self.device
            .create_surface(width, height)
            .map_err(CanvasError::ResourceCreation)?;
        tracing::debug!(width, height, "render context initialized");
        self.surface_size = Some((width, height));
        self.state = SessionState::Initialized;
        Ok(())
    }

    /// Releases the drawing surface.
    pub fn uninitialize(&mut self) {
        if self.state == SessionState::Uninitialized {
            return;
        }
        self.device.release_surface();
        self.surface_size = None;
        self.reset_stacks();
        self.state = SessionState::Uninitialized;
    }

    /// Opens a draw session and clears the surface to transparent.
    ///
    /// Does nothing while a session is already open or without a surface.
    pub fn begin_draw(&mut self) {
        if self.state != SessionState::Initialized {
            return;
        }
        self.state = SessionState::Drawing;
        self.reset_stacks();
        self.device.state(StateOp::SetTransform(Affine::IDENTITY));
        self.device.draw(DrawOp::Clear(Color::TRANSPARENT));
    }

    /// Closes the draw session, unwinding any clips still pushed.
    ///
    /// Device loss is not detected here; failures are returned as
    /// [`CanvasError::DrawSession`].
    pub fn end_draw(&mut self) -> Result<(), CanvasError> {
        if self.state != SessionState::Drawing {
            return Ok(());
        }
        for _ in 0..self.clip_depth {
            self.device.state(StateOp::PopClip);
        }
        self.reset_stacks();
        self.state = SessionState::Initialized;
        self.device.flush().map_err(CanvasError::DrawSession)
    }

    /// Current transform.
    pub fn transform(&self) -> Affine {
        self.transform
    }

    /// Number of transforms that can be popped.
    pub fn transform_depth(&self) -> usize {
        self.transforms.len()
    }

    /// Composes `transform` with the current transform and saves the prior one.
    pub fn push_transform(&mut self, transform: Affine) {
        if !self.is_drawing() {
            return;
        }
        self.transforms.push(self.transform);
        self.transform *= transform;
        self.device.state(StateOp::SetTransform(self.transform));
    }

    /// Restores the most recently saved transform.
    pub fn pop_transform(&mut self) {
        if !self.is_drawing() {
            return;
        }
        let Some(prior) = self.transforms.pop() else {
            return;
        };
        self.transform = prior;
        self.device.state(StateOp::SetTransform(prior));
    }

    /// Pushes an aliased clip over `rect` in the current transform.
    pub fn push_axis_aligned_clip(&mut self, rect: Rect) {
        if !self.is_drawing() {
            return;
        }
        self.clip_depth += 1;
        self.device.clip_to_rect(RectF::from_kurbo(rect));
    }

    /// Pops the most recent clip.
    pub fn pop_axis_aligned_clip(&mut self) {
        if !self.is_drawing() || self.clip_depth == 0 {
            return;
        }
        self.clip_depth -= 1;
        self.device.clip_pop();
    }

    /// Replaces the pixels inside the current clip with `color`.
    pub fn clear(&mut self, color: Color) {
        if self.is_drawing() {
            self.device.draw(DrawOp::Clear(color));
        }
    }

    /// Fills `path` with `paint`.
    pub fn fill_path(&mut self, path: PathId, paint: PaintId, fill_rule: FillRule) {
        if !self.is_drawing() {
            return;
        }
        self.device.state(StateOp::SetFillRule(fill_rule));
        self.device.state(StateOp::SetPaint(paint));
        self.device.draw(DrawOp::FillPath(path));
    }

    /// Strokes `path` with `paint` at `thickness` pixels.
    pub fn stroke_path(&mut self, path: PathId, paint: PaintId, thickness: f64) {
        if !self.is_drawing() {
            return;
        }
        self.device.state(StateOp::SetStroke(StrokeStyle::new(thickness)));
        self.device.state(StateOp::SetPaint(paint));
        self.device.draw(DrawOp::StrokePath(path));
    }

    /// Draws a whole image into `dst` without filtering, clipped to `dst`.
    pub fn draw_image_nearest(&mut self, image: ImageId, dst: Rect) {
        if !self.is_drawing() {
            return;
        }
        let dst = RectF::from_kurbo(dst);
        self.device.with_clip_rect(ClipRect::aliased(dst), |device| {
            device.draw(DrawOp::DrawImageRect {
                image,
                src: None,
                dst,
                sampler: ImageSampler {
                    quality: ImageQuality::Low,
                    ..ImageSampler::default()
                },
            });
        });
    }

    /// Installs the text renderer used for labels.
    pub fn set_text_renderer(&mut self, text: Option<Box<dyn TextRenderer>>) {
        self.text = text;
    }

    /// Whether labels can be measured and drawn.
    pub fn has_text_renderer(&self) -> bool {
        self.text.is_some()
    }

    /// Draws label text. Does nothing without a text renderer.
    pub fn draw_text(&mut self, text: &str, font_size: f64, paint: PaintId, origin: Point) {
        if !self.is_drawing() {
            return;
        }
        if let Some(renderer) = self.text.as_deref_mut() {
            renderer.draw(&mut self.device, text, font_size, paint, origin);
        }
    }

    /// Measures label text, or `None` without a text renderer.
    pub fn measure_text(&mut self, text: &str, font_size: f64) -> Option<Size> {
        self.text
            .as_deref_mut()
            .map(|renderer| renderer.measure(text, font_size))
    }

    fn reset_stacks(&mut self) {
        self.transform = Affine::IDENTITY;
        self.transforms.clear();
        self.clip_depth = 0;
    }
}
