// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_canvas --heading-base-level=0

//! Understory Canvas: a retained-mode shape canvas with incremental repaint.
//!
//! The canvas holds layers of vector shapes (lines, polylines,
//! multi-polygons, rectangles and containers of shapes, each optionally
//! labelled) and renders them onto a presentable surface of a
//! [`GraphicsDevice`]. It is built for large scenes that are panned and
//! zoomed interactively:
//!
//! - Shapes cache native geometry and paints, rebuilding them only when
//!   they are invalidated.
//! - Repaint is clipped to dirty rects. The previous frame is kept in a
//!   viewport buffer, so a pan only repaints the strips it exposes.
//! - Model coordinates are `f64`; the [`RenderPrecision`] of a layer decides
//!   whether points are mapped to pixels before or after narrowing to `f32`.
//!
//! ## API overview
//!
//! - [`Canvas`]: layers, viewport origin and zoom, dirty rects and the
//!   render loop. Hosts call [`Canvas::resize`], [`Canvas::arrange`] and the
//!   other lifecycle callbacks.
//! - [`Shape`]: one node of the scene, with [`ShapeStyle`]s per [`UiState`]
//!   and an optional [`ShapeLabel`].
//! - [`LayerParams`] and [`ShapeKey`]: layers and handles to their shapes.
//! - [`RenderContext`]: draw session, transform and clip stacks over a device.
//! - [`TextRenderer`]: the host's text stack, used to measure and draw labels.
//!
//! ## Coordinates
//!
//! Logical units are device-independent pixels at 96 DPI. The canvas maps a
//! model point `p` to `p × zoom × dpi / 96 + origin` in whole-pixel space,
//! where `origin` is the viewport origin converted to pixels.
//!
//! ## Example
//!
//! ```rust
//! use kurbo::{Point, Size};
//! use peniko::Color;
//! use understory_canvas::{Canvas, LayerParams, Shape, ShapeStyle};
//! use understory_imaging_ref::RefDevice;
//!
//! let mut canvas = Canvas::new(RefDevice::new());
//! canvas.resize(Size::new(320.0, 200.0)).unwrap();
//!
//! let mut outline = Shape::polyline(vec![
//!     Point::new(10.0, 10.0),
//!     Point::new(100.0, 40.0),
//!     Point::new(150.0, 10.0),
//! ]);
//! outline.set_normal_style(Some(
//!     ShapeStyle::new().with_stroke(Color::BLACK).with_stroke_thickness(2.0),
//! ));
//! canvas.set_shapes_for_layer(Some(vec![outline]), LayerParams::new(0, 0));
//! canvas.arrange().unwrap();
//!
//! // Panning by a few pixels only repaints the exposed strip.
//! canvas.set_viewport_origin(Point::new(5.0, 0.0));
//! assert_eq!(canvas.dirty_rects().len(), 1);
//! canvas.arrange().unwrap();
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod canvas;
mod context;
mod error;
pub mod geometry;
mod label;
mod layer;
mod shape;
mod style;
pub mod viewport;

pub use canvas::{Canvas, CanvasOptions};
pub use context::{RenderContext, SessionState};
pub use error::CanvasError;
pub use geometry::{RenderPrecision, ShapeView};
pub use label::{LabelVisibility, ShapeLabel, TextRenderer, label_location};
pub use layer::{LayerParams, ShapeKey};
pub use shape::{Shape, ShapeType};
pub use style::{
    CurrentStyle, DEFAULT_STROKE_THICKNESS, NativeBrushes, ShapeStyle, StateStyles, UiState,
};
pub use viewport::Viewport;

pub use understory_imaging::GraphicsDevice;
