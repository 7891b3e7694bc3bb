// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text labels attached to shapes.

use alloc::string::String;
use kurbo::{Point, Rect, Size, Vec2};
use understory_imaging::{GraphicsDevice, ImagingBackend, PaintId};

use crate::RenderContext;

/// Measures and draws label text.
///
/// Text shaping lives outside the canvas; hosts plug in their text stack
/// through this trait.
pub trait TextRenderer {
    /// Size of `text` laid out on a single line at `font_size`.
    fn measure(&mut self, text: &str, font_size: f64) -> Size;

    /// Draws `text` with its top-left corner at `origin` using `paint`.
    fn draw(
        &mut self,
        backend: &mut dyn ImagingBackend,
        text: &str,
        font_size: f64,
        paint: PaintId,
        origin: Point,
    );
}

/// When a label is drawn.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LabelVisibility {
    /// Only when the label fits inside the shape bounds.
    #[default]
    Auto,
    /// Always.
    Visible,
    /// Never.
    Hidden,
}

/// Label text and its cached measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeLabel {
    text: String,
    font_size: f64,
    size: Option<Size>,
}

impl ShapeLabel {
    /// Default font size in pixels.
    pub const DEFAULT_FONT_SIZE: f64 = 12.0;

    /// A label with the default font size.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_font_size(text, Self::DEFAULT_FONT_SIZE)
    }

    /// A label with an explicit font size.
    pub fn with_font_size(text: impl Into<String>, font_size: f64) -> Self {
        Self {
            text: text.into(),
            font_size,
            size: None,
        }
    }

    /// Label text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Font size in pixels.
    #[must_use]
    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    /// Measured size, if the label has been initialized for rendering.
    #[must_use]
    pub fn size(&self) -> Option<Size> {
        self.size
    }

    /// Measures the text if it has not been measured yet.
    pub(crate) fn init_render<D: GraphicsDevice>(&mut self, cx: &mut RenderContext<D>) {
        if self.size.is_none() {
            self.size = cx.measure_text(&self.text, self.font_size);
        }
    }

    /// Forgets the measurement.
    pub(crate) fn reset(&mut self) {
        self.size = None;
    }
}

/// Where a label of `size` is drawn for a shape with `bounds`.
///
/// `position` is a model-space anchor mapped through `zoom` and `origin`;
/// without one the anchor is the centre of `bounds`. The label is then
/// shifted by `size × label_origin`, so `(0.5, 0.5)` centres it on the
/// anchor.
#[must_use]
pub fn label_location(
    bounds: Rect,
    size: Size,
    position: Option<Point>,
    label_origin: Point,
    zoom: f64,
    origin: Vec2,
) -> Point {
    let anchor = match position {
        Some(p) => (p.to_vec2() * zoom + origin).to_point(),
        None => bounds.center(),
    };
    Point::new(
        anchor.x - size.width * label_origin.x,
        anchor.y - size.height * label_origin.y,
    )
}
