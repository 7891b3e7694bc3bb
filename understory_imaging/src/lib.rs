// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Imaging: backend-agnostic imaging IR, backend and device traits.
//!
//! This crate defines a small, plain‑old‑data (POD) friendly imaging
//! intermediate representation and the traits implemented by the renderers
//! that consume it. It sits between the retained shape canvas
//! (`understory_canvas`) and concrete rasterizers (a recording reference
//! device, Vello CPU, and so on).
//!
//! # Core concepts
//!
//! - **Resources**: small, opaque handles ([`PathId`], [`ImageId`],
//!   [`PaintId`]) whose lifetimes are managed via [`ResourceBackend`].
//! - **Imaging operations**: [`StateOp`] (mutate state) and [`DrawOp`]
//!   (produce pixels), combined into [`ImagingOp`] for logging and replay.
//! - **Backends**: [`ImagingBackend`] accepts imaging ops.
//! - **Devices**: [`GraphicsDevice`] adds the lifecycle of a presentable
//!   surface: initialization, draw sessions, copying drawn pixels into an
//!   image resource, and presentation. Failures are reported as
//!   [`DeviceError`].
//!
//! Clips are axis-aligned rectangles pushed and popped as state, optionally
//! with aliased (pixel-snapped) edges so that adjacent repaint regions never
//! show seams.
//!
//! # Example
//!
//! ```ignore
//! # use understory_imaging::*;
//! # use peniko::{Brush, Color};
//! let mut backend = MyBackend::default();
//!
//! let paint = backend.create_paint(PaintDesc {
//!     brush: Brush::Solid(Color::WHITE),
//! });
//! let path = backend.create_path(PathDesc {
//!     commands: Box::new([PathCmd::MoveTo { x: 0.0, y: 0.0 }]),
//! });
//!
//! backend.with_clip_rect(ClipRect::aliased(RectF::new(0.0, 0.0, 8.0, 8.0)), |b| {
//!     b.state(StateOp::SetPaint(paint));
//!     b.draw(DrawOp::FillPath(path));
//! });
//! ```

#![no_std]

extern crate alloc;

mod device;
mod path;

pub use device::{DeviceError, GraphicsDevice, PixelRect, SurfaceOffset};
pub use path::{bez_path_from_desc, path_desc_from_bez};

use alloc::boxed::Box;
use peniko::{Brush, Color};
pub use peniko::{Fill as FillRule, ImageAlphaType, ImageFormat, ImageQuality, ImageSampler};

/// Identifier for a path resource.
///
/// This is a small, opaque handle that is stable for the lifetime of the
/// resource. Paths are expected to be reused across frames while they
/// remain alive.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PathId(pub u32);

/// Identifier for an image resource.
///
/// Images are typically created once and reused across frames until
/// explicitly destroyed.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageId(pub u32);

/// Identifier for a paint resource.
///
/// Paints may be shared by many paths.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PaintId(pub u32);

/// Affine transform type used by the imaging IR.
pub type Affine = kurbo::Affine;

/// A simple axis-aligned rectangle in f32 coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RectF {
    /// Minimum X coordinate.
    pub x0: f32,
    /// Minimum Y coordinate.
    pub y0: f32,
    /// Maximum X coordinate.
    pub x1: f32,
    /// Maximum Y coordinate.
    pub y1: f32,
}

impl RectF {
    /// Create a new rectangle from min/max corners.
    #[inline]
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_origin_size(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Width of the rectangle.
    #[inline]
    #[must_use]
    pub fn width(self) -> f32 {
        self.x1 - self.x0
    }

    /// Height of the rectangle.
    #[inline]
    #[must_use]
    pub fn height(self) -> f32 {
        self.y1 - self.y0
    }

    /// Convert to kurbo's rectangle type.
    #[inline]
    pub fn to_kurbo(self) -> kurbo::Rect {
        kurbo::Rect::new(
            f64::from(self.x0),
            f64::from(self.y0),
            f64::from(self.x1),
            f64::from(self.y1),
        )
    }

    /// Narrow a kurbo rectangle to f32 coordinates.
    #[inline]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "The IR stores device-space coordinates as f32."
    )]
    pub fn from_kurbo(rect: kurbo::Rect) -> Self {
        Self::new(
            rect.x0 as f32,
            rect.y0 as f32,
            rect.x1 as f32,
            rect.y1 as f32,
        )
    }
}

/// Edge treatment of an axis-aligned clip.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ClipAntialias {
    /// Edges are antialiased like any other geometry.
    #[default]
    PerPrimitive,
    /// Edges snap to whole pixels. Use this for clips that must tile the
    /// target without seams.
    Aliased,
}

/// An axis-aligned clip rectangle, interpreted in the current transform.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ClipRect {
    /// Clip bounds in local coordinates.
    pub rect: RectF,
    /// Edge treatment.
    pub antialias: ClipAntialias,
}

impl ClipRect {
    /// An aliased clip over `rect`.
    #[inline]
    pub const fn aliased(rect: RectF) -> Self {
        Self {
            rect,
            antialias: ClipAntialias::Aliased,
        }
    }
}

/// Stroke style used by [`StateOp::SetStroke`].
///
/// This is currently a re-export of [`kurbo::Stroke`], which captures width,
/// joins, caps, dashes, and related stroke parameters.
pub type StrokeStyle = kurbo::Stroke;

/// State operations that mutate the current imaging state.
#[derive(Clone, Debug, PartialEq)]
pub enum StateOp {
    /// Set the current transform matrix.
    SetTransform(Affine),
    /// Push an axis-aligned clip. Clips must be well-nested: every
    /// `PushClip` is matched by a [`StateOp::PopClip`].
    PushClip(ClipRect),
    /// Pop the most recently pushed clip.
    PopClip,
    /// Set the current paint resource.
    SetPaint(PaintId),
    /// Set the current stroke style.
    SetStroke(StrokeStyle),
    /// Set the current fill rule used for filling paths.
    ///
    /// The default fill rule is [`FillRule::NonZero`].
    SetFillRule(FillRule),
}

/// Draw operations that produce pixels given the current state.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    /// Replace every pixel inside the current clip with `color`.
    ///
    /// Unlike a fill, this does not blend with what is already there.
    Clear(Color),
    /// Fill the given path with the current paint.
    FillPath(PathId),
    /// Stroke the given path with the current stroke and paint.
    StrokePath(PathId),
    /// Fill an axis-aligned rectangle with the current paint.
    FillRect(RectF),
    /// Draw an image mapped to a destination rect, optionally sampling from a source rect.
    ///
    /// - `dst` is in local coordinates (subject to the current transform).
    /// - `src` is in image pixel coordinates; `None` means the full image.
    ///
    /// `sampler.quality` selects the filtering mode. Nearest-neighbour
    /// ([`ImageQuality::Low`]) reproduces pixels exactly when `src` and
    /// `dst` have the same size and `dst` is pixel aligned.
    DrawImageRect {
        /// Image resource to draw.
        image: ImageId,
        /// Optional source rectangle in image pixel coordinates.
        src: Option<RectF>,
        /// Destination rectangle in local coordinates.
        dst: RectF,
        /// Parameters that specify how to sample the image.
        sampler: ImageSampler,
    },
}

/// A single imaging operation.
#[derive(Clone, Debug, PartialEq)]
pub enum ImagingOp {
    /// State mutation.
    State(StateOp),
    /// Pixel-producing operation.
    Draw(DrawOp),
}

/// Description of a path resource.
#[derive(Clone, Debug, PartialEq)]
pub struct PathDesc {
    /// Command buffer describing the path geometry.
    pub commands: Box<[PathCmd]>,
}

/// Simple path command enumeration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PathCmd {
    /// Move the current point without drawing.
    MoveTo {
        /// X coordinate of the new point.
        x: f32,
        /// Y coordinate of the new point.
        y: f32,
    },
    /// Draw a line from the current point to the given point.
    LineTo {
        /// X coordinate of the line end.
        x: f32,
        /// Y coordinate of the line end.
        y: f32,
    },
    /// Draw a quadratic Bézier curve from the current point to the given
    /// point, using a single control point.
    QuadTo {
        /// X coordinate of the control point.
        x1: f32,
        /// Y coordinate of the control point.
        y1: f32,
        /// X coordinate of the curve end.
        x: f32,
        /// Y coordinate of the curve end.
        y: f32,
    },
    /// Draw a cubic Bézier curve from the current point to the given point,
    /// using two control points.
    CurveTo {
        /// X coordinate of the first control point.
        x1: f32,
        /// Y coordinate of the first control point.
        y1: f32,
        /// X coordinate of the second control point.
        x2: f32,
        /// Y coordinate of the second control point.
        y2: f32,
        /// X coordinate of the curve end.
        x: f32,
        /// Y coordinate of the curve end.
        y: f32,
    },
    /// Close the current subpath.
    Close,
}

/// Description of an image resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageDesc {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Pixel format of the image buffer.
    pub format: ImageFormat,
    /// Alpha encoding of the pixels (straight vs premultiplied).
    pub alpha_type: ImageAlphaType,
}

impl ImageDesc {
    /// An RGBA8 image of the given size with straight alpha.
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Rgba8,
            alpha_type: ImageAlphaType::Alpha,
        }
    }

    /// Number of bytes in a tightly packed RGBA8 buffer of this size.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Description of a paint resource.
#[derive(Clone, Debug)]
pub struct PaintDesc {
    /// Brush used when rendering (solid color, gradient, image, etc.).
    ///
    /// This is a [`peniko::Brush`], so backends can directly map it onto their
    /// native paint representation.
    pub brush: Brush,
}

/// Resource lifetime interface.
///
/// Backends implement this to manage their own resource storage.
///
/// Implementations are free to choose how resources are allocated and stored,
/// but they must ensure that IDs remain valid and refer to the same logical
/// resource until the corresponding `destroy_*` function is called, or until
/// the owning device is reset.
pub trait ResourceBackend {
    /// Create a path resource.
    fn create_path(&mut self, desc: PathDesc) -> PathId;
    /// Destroy a previously created path.
    fn destroy_path(&mut self, id: PathId);

    /// Create an image resource from raw pixels.
    ///
    /// The `pixels` slice is expected to contain tightly packed, row-major
    /// RGBA8 data matching `desc`.
    fn create_image(&mut self, desc: ImageDesc, pixels: &[u8]) -> ImageId;
    /// Destroy a previously created image.
    fn destroy_image(&mut self, id: ImageId);

    /// Create a paint resource.
    fn create_paint(&mut self, desc: PaintDesc) -> PaintId;
    /// Destroy a previously created paint.
    fn destroy_paint(&mut self, id: PaintId);
}

/// Backend that consumes imaging operations.
pub trait ImagingBackend: ResourceBackend {
    /// Apply a state operation.
    fn state(&mut self, op: StateOp);

    /// Apply a draw operation.
    fn draw(&mut self, op: DrawOp);

    /// Convenience: push an aliased clip over the given rectangle.
    fn clip_to_rect(&mut self, rect: RectF) {
        self.state(StateOp::PushClip(ClipRect::aliased(rect)));
    }

    /// Convenience: pop the most recently pushed clip.
    fn clip_pop(&mut self) {
        self.state(StateOp::PopClip);
    }
}

/// Scoped helpers for [`ImagingBackend`].
pub trait ImagingBackendExt: ImagingBackend {
    /// Run `f` inside `clip`, popping it afterwards.
    fn with_clip_rect<R>(&mut self, clip: ClipRect, f: impl FnOnce(&mut Self) -> R) -> R {
        self.state(StateOp::PushClip(clip));
        let out = f(self);
        self.state(StateOp::PopClip);
        out
    }
}

impl<B: ImagingBackend + ?Sized> ImagingBackendExt for B {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Trivial in-memory backend that records operations for testing.
    #[derive(Default)]
    struct RecordingBackend {
        next_path: u32,
        next_image: u32,
        next_paint: u32,
        ops: Vec<ImagingOp>,
    }

    impl ResourceBackend for RecordingBackend {
        fn create_path(&mut self, _desc: PathDesc) -> PathId {
            let id = self.next_path;
            self.next_path += 1;
            PathId(id)
        }

        fn destroy_path(&mut self, _id: PathId) {}

        fn create_image(&mut self, _desc: ImageDesc, _pixels: &[u8]) -> ImageId {
            let id = self.next_image;
            self.next_image += 1;
            ImageId(id)
        }

        fn destroy_image(&mut self, _id: ImageId) {}

        fn create_paint(&mut self, _desc: PaintDesc) -> PaintId {
            let id = self.next_paint;
            self.next_paint += 1;
            PaintId(id)
        }

        fn destroy_paint(&mut self, _id: PaintId) {}
    }

    impl ImagingBackend for RecordingBackend {
        fn state(&mut self, op: StateOp) {
            self.ops.push(ImagingOp::State(op));
        }

        fn draw(&mut self, op: DrawOp) {
            self.ops.push(ImagingOp::Draw(op));
        }
    }

    #[test]
    fn record_basic_ops() {
        let mut backend = RecordingBackend::default();

        let paint = backend.create_paint(PaintDesc {
            brush: Brush::Solid(Color::WHITE),
        });
        let path = backend.create_path(PathDesc {
            commands: vec![PathCmd::MoveTo { x: 0.0, y: 0.0 }].into_boxed_slice(),
        });

        backend.state(StateOp::SetPaint(paint));
        backend.draw(DrawOp::FillPath(path));

        assert_eq!(backend.ops.len(), 2);
    }

    #[test]
    fn with_clip_rect_brackets_the_body() {
        let mut backend = RecordingBackend::default();
        let clip = ClipRect::aliased(RectF::new(1.0, 2.0, 3.0, 4.0));

        let seen = backend.with_clip_rect(clip, |b| {
            b.draw(DrawOp::Clear(Color::TRANSPARENT));
            b.ops.len()
        });

        assert_eq!(seen, 2, "body should run after the push");
        assert_eq!(
            backend.ops,
            vec![
                ImagingOp::State(StateOp::PushClip(clip)),
                ImagingOp::Draw(DrawOp::Clear(Color::TRANSPARENT)),
                ImagingOp::State(StateOp::PopClip),
            ]
        );
    }

    #[test]
    fn rect_conversions_keep_corners() {
        let r = RectF::from_origin_size(-2.0, 3.0, 10.0, 5.0);
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 5.0);
        assert_eq!(r.to_kurbo(), kurbo::Rect::new(-2.0, 3.0, 8.0, 8.0));
        assert_eq!(RectF::from_kurbo(r.to_kurbo()), r);
    }
}
