// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Presentable surfaces and their lifecycle.

use crate::{ImageId, ImagingBackend};

/// Errors reported by a [`GraphicsDevice`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The underlying device was removed or reset. All resources created on
    /// it are gone and the device must be initialized again.
    #[error("graphics device was removed or reset")]
    DeviceLost,
    /// A device resource could not be created.
    #[error("failed to create {0}")]
    ResourceCreation(&'static str),
    /// A draw session could not be completed.
    #[error("draw session failed: {0}")]
    Draw(&'static str),
}

/// Integer offset of the drawable region inside the acquired surface.
///
/// Surface providers may hand out a region of a larger shared texture; the
/// caller translates all drawing by this amount.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SurfaceOffset {
    /// Horizontal offset in pixels.
    pub x: u32,
    /// Vertical offset in pixels.
    pub y: u32,
}

impl SurfaceOffset {
    /// Whether this offset is `(0, 0)`.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.x == 0 && self.y == 0
    }

    /// The offset as a kurbo vector.
    #[inline]
    pub fn to_vec2(self) -> kurbo::Vec2 {
        kurbo::Vec2::new(f64::from(self.x), f64::from(self.y))
    }
}

/// Integer pixel rectangle on a surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PixelRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl PixelRect {
    /// Create a new pixel rectangle.
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A hardware (or simulated) device owning a presentable surface.
///
/// The device is also the [`ImagingBackend`] that draw operations go to while
/// a session is open. A typical frame looks like:
///
/// 1. [`begin_draw`](Self::begin_draw) acquires the surface. A
///    [`DeviceError::DeviceLost`] result means the caller must call
///    [`initialize`](Self::initialize) again and recreate its surface.
/// 2. State and draw operations are issued through [`ImagingBackend`].
/// 3. [`flush`](Self::flush) completes the drawing.
/// 4. [`copy_to_image`](Self::copy_to_image) optionally snapshots part of
///    the drawn surface into an image resource.
/// 5. [`present`](Self::present) hands the surface to the compositor.
pub trait GraphicsDevice: ImagingBackend {
    /// Whether the device has been created and can accept work.
    fn is_ready(&self) -> bool;

    /// Create the device. Idempotent.
    ///
    /// Failure is not reported: the device stays not ready and the caller
    /// retries on a later frame.
    fn initialize(&mut self);

    /// Release the device and every resource created on it.
    fn reset(&mut self);

    /// Release transient memory while the application is suspended.
    fn trim(&mut self);

    /// Create (or recreate) the presentable surface with the given pixel size.
    fn create_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError>;

    /// Release the presentable surface.
    fn release_surface(&mut self);

    /// Acquire the surface for drawing.
    fn begin_draw(&mut self) -> Result<SurfaceOffset, DeviceError>;

    /// Complete all drawing issued since [`begin_draw`](Self::begin_draw).
    fn flush(&mut self) -> Result<(), DeviceError>;

    /// Copy a region of the drawn surface into `image`, at `(0, 0)` of the image.
    fn copy_to_image(&mut self, image: ImageId, src: PixelRect) -> Result<(), DeviceError>;

    /// Present the surface.
    fn present(&mut self) -> Result<(), DeviceError>;
}
