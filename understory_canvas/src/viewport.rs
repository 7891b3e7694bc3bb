// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical to pixel conversion of the canvas viewport.

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;
use kurbo::{Point, Size, Vec2};

/// Logical DPI at which one logical unit is one pixel.
pub const BASE_DPI: f64 = 96.0;

/// Converts a logical length to whole pixels, rounding half away from zero.
#[inline]
#[must_use]
pub fn to_pixels(value: f64, dpi: f64) -> f64 {
    (value * dpi / BASE_DPI).round()
}

/// Converts a logical point to whole pixels, rounding half away from zero.
#[inline]
#[must_use]
pub fn point_to_pixels(point: Point, dpi: f64) -> Point {
    Point::new(to_pixels(point.x, dpi), to_pixels(point.y, dpi))
}

/// Converts a logical size to the pixel size of a surface covering it.
///
/// Fractional pixels are rounded up so the surface always covers the area.
#[inline]
#[must_use]
pub fn size_to_pixels(size: Size, dpi: f64) -> Size {
    Size::new(
        (size.width * dpi / BASE_DPI).ceil(),
        (size.height * dpi / BASE_DPI).ceil(),
    )
}

/// Viewport state of a canvas: origin, zoom and size in logical and pixel units.
///
/// The logical values are what the host sets; the pixel values are derived
/// from them and the display DPI. Pixel zoom is `zoom × dpi / 96`.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    dpi: f64,
    origin: Point,
    pixel_origin: Point,
    zoom: f64,
    pixel_zoom: f64,
    size: Size,
    pixel_size: Size,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(BASE_DPI)
    }
}

impl Viewport {
    /// Creates a viewport at the logical origin, zoom `1.0` and zero size.
    #[must_use]
    pub fn new(dpi: f64) -> Self {
        Self {
            dpi,
            origin: Point::ZERO,
            pixel_origin: Point::ZERO,
            zoom: 1.0,
            pixel_zoom: dpi / BASE_DPI,
            size: Size::ZERO,
            pixel_size: Size::ZERO,
        }
    }

    /// Display DPI.
    #[must_use]
    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    /// Updates the DPI and every derived pixel value.
    pub fn set_dpi(&mut self, dpi: f64) {
        self.dpi = dpi;
        self.pixel_origin = point_to_pixels(self.origin, dpi);
        self.pixel_zoom = self.zoom * dpi / BASE_DPI;
        self.pixel_size = size_to_pixels(self.size, dpi);
    }

    /// Logical viewport origin.
    #[must_use]
    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Viewport origin in whole pixels.
    #[must_use]
    pub fn pixel_origin(&self) -> Point {
        self.pixel_origin
    }

    /// Pixel delta a move to `origin` would produce.
    #[must_use]
    pub fn pixel_delta_to(&self, origin: Point) -> Vec2 {
        point_to_pixels(origin, self.dpi) - self.pixel_origin
    }

    /// Stores a new logical origin and its pixel conversion.
    pub fn set_origin(&mut self, origin: Point) {
        self.origin = origin;
        self.pixel_origin = point_to_pixels(origin, self.dpi);
    }

    /// Logical zoom factor.
    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Zoom factor in pixel space.
    #[must_use]
    pub fn pixel_zoom(&self) -> f64 {
        self.pixel_zoom
    }

    /// Stores a logical zoom factor. Callers clamp it beforehand.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
        self.pixel_zoom = zoom * self.dpi / BASE_DPI;
    }

    /// Logical size of the control.
    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    /// Size of the drawing surface in whole pixels.
    #[must_use]
    pub fn pixel_size(&self) -> Size {
        self.pixel_size
    }

    /// Stores a logical size and its pixel conversion.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        self.pixel_size = size_to_pixels(size, self.dpi);
    }

    /// Whether the viewport covers a drawable area.
    #[must_use]
    pub fn has_area(&self) -> bool {
        self.size.width > 0.0 && self.size.height > 0.0
    }

    /// Pixel size as surface dimensions, or `None` if the area is empty.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "pixel sizes are whole, non-negative and far below u32::MAX"
    )]
    pub fn surface_extent(&self) -> Option<(u32, u32)> {
        if !self.has_area() {
            return None;
        }
        Some((self.pixel_size.width as u32, self.pixel_size.height as u32))
    }

    /// Converts a logical point to pixels at the current DPI.
    #[must_use]
    pub fn to_pixel_point(&self, point: Point) -> Point {
        point_to_pixels(point, self.dpi)
    }
}
