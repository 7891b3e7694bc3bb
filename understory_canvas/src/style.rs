// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape styles and their resolution per UI state.

use peniko::Brush;
use understory_imaging::{PaintDesc, PaintId, ResourceBackend};

/// Stroke thickness of a resolved style that sets none.
pub const DEFAULT_STROKE_THICKNESS: f64 = 1.0;

/// Interaction state of a shape, selecting which style applies.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum UiState {
    /// No interaction.
    #[default]
    Normal,
    /// The pointer is over the shape.
    PointerOver,
    /// The shape is selected.
    Selected,
}

/// Brushes and stroke thickness of a shape. Every field is optional so that
/// state styles can override only part of the normal style.
///
/// ```rust
/// use peniko::Color;
/// use understory_canvas::ShapeStyle;
///
/// let style = ShapeStyle::new()
///     .with_fill(Color::from_rgb8(0x20, 0x60, 0xc0))
///     .with_stroke(Color::BLACK)
///     .with_stroke_thickness(2.0);
/// assert_eq!(style.stroke_thickness, Some(2.0));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ShapeStyle {
    /// Brush filling closed geometry.
    pub fill: Option<Brush>,
    /// Brush stroking the outline.
    pub stroke: Option<Brush>,
    /// Brush used for label text.
    pub foreground: Option<Brush>,
    /// Stroke width in pixels.
    pub stroke_thickness: Option<f64>,
}

impl ShapeStyle {
    /// An empty style.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fill brush.
    #[must_use]
    pub fn with_fill(mut self, brush: impl Into<Brush>) -> Self {
        self.fill = Some(brush.into());
        self
    }

    /// Sets the stroke brush.
    #[must_use]
    pub fn with_stroke(mut self, brush: impl Into<Brush>) -> Self {
        self.stroke = Some(brush.into());
        self
    }

    /// Sets the label brush.
    #[must_use]
    pub fn with_foreground(mut self, brush: impl Into<Brush>) -> Self {
        self.foreground = Some(brush.into());
        self
    }

    /// Sets the stroke thickness.
    #[must_use]
    pub fn with_stroke_thickness(mut self, thickness: f64) -> Self {
        self.stroke_thickness = Some(thickness);
        self
    }

    /// Fills every unset field from `base`.
    fn inherit(&mut self, base: &Self) {
        if self.fill.is_none() {
            self.fill.clone_from(&base.fill);
        }
        if self.stroke.is_none() {
            self.stroke.clone_from(&base.stroke);
        }
        if self.foreground.is_none() {
            self.foreground.clone_from(&base.foreground);
        }
        if self.stroke_thickness.is_none() {
            self.stroke_thickness = base.stroke_thickness;
        }
    }
}

/// The normal, pointer-over and selected styles of a shape.
#[derive(Clone, Debug, Default)]
pub struct StateStyles {
    /// Style used when no state style applies, and for unset fields.
    pub normal: Option<ShapeStyle>,
    /// Style used while the pointer is over the shape.
    pub pointer_over: Option<ShapeStyle>,
    /// Style used while the shape is selected.
    pub selected: Option<ShapeStyle>,
}

impl StateStyles {
    /// Resolves the style for `state`.
    ///
    /// The state style is used if it is set, otherwise the normal style.
    /// Fields the chosen style leaves unset are then taken from the normal
    /// style, so a hover style may override only the stroke.
    #[must_use]
    pub fn resolve(&self, state: UiState) -> ShapeStyle {
        let chosen = match state {
            UiState::PointerOver => self.pointer_over.as_ref(),
            UiState::Selected => self.selected.as_ref(),
            UiState::Normal => None,
        }
        .or(self.normal.as_ref());
        let mut style = chosen.cloned().unwrap_or_default();
        if let Some(normal) = &self.normal {
            style.inherit(normal);
        }
        style
    }

    /// The stroke thickness and whether a stroke brush applies for `state`,
    /// without cloning brushes.
    #[must_use]
    pub fn stroke_for(&self, state: UiState) -> (f64, bool) {
        let chosen = match state {
            UiState::PointerOver => self.pointer_over.as_ref(),
            UiState::Selected => self.selected.as_ref(),
            UiState::Normal => None,
        }
        .or(self.normal.as_ref());
        let normal = self.normal.as_ref();
        let thickness = chosen
            .and_then(|s| s.stroke_thickness)
            .or_else(|| normal.and_then(|s| s.stroke_thickness))
            .unwrap_or(DEFAULT_STROKE_THICKNESS);
        let stroked = chosen.is_some_and(|s| s.stroke.is_some())
            || normal.is_some_and(|s| s.stroke.is_some());
        (thickness, stroked)
    }
}

/// Native paints created for a resolved style.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NativeBrushes {
    /// Fill paint.
    pub fill: Option<PaintId>,
    /// Stroke paint.
    pub stroke: Option<PaintId>,
    /// Label paint.
    pub foreground: Option<PaintId>,
}

/// A resolved style together with the device paints created for it.
#[derive(Clone, Debug, Default)]
pub struct CurrentStyle {
    style: ShapeStyle,
    native: NativeBrushes,
}

impl CurrentStyle {
    /// The resolved style.
    #[must_use]
    pub fn style(&self) -> &ShapeStyle {
        &self.style
    }

    /// Paints created by the last [`init`](Self::init).
    #[must_use]
    pub fn native(&self) -> NativeBrushes {
        self.native
    }

    /// Resolved stroke thickness.
    #[must_use]
    pub fn stroke_thickness(&self) -> f64 {
        self.style
            .stroke_thickness
            .unwrap_or(DEFAULT_STROKE_THICKNESS)
    }

    /// Replaces the resolved style and creates its native paints, destroying
    /// the previous ones.
    pub fn init<B: ResourceBackend + ?Sized>(&mut self, style: ShapeStyle, backend: &mut B) {
        self.release(backend);
        let mut create = |brush: &Option<Brush>| {
            brush.as_ref().map(|brush| {
                backend.create_paint(PaintDesc {
                    brush: brush.clone(),
                })
            })
        };
        self.native = NativeBrushes {
            fill: create(&style.fill),
            stroke: create(&style.stroke),
            foreground: create(&style.foreground),
        };
        self.style = style;
    }

    /// Destroys the native paints.
    pub fn release<B: ResourceBackend + ?Sized>(&mut self, backend: &mut B) {
        let native = core::mem::take(&mut self.native);
        for id in [native.fill, native.stroke, native.foreground]
            .into_iter()
            .flatten()
        {
            backend.destroy_paint(id);
        }
    }

    /// Drops the native paints without destroying them, for when the device
    /// that owned them is gone.
    pub fn forget(&mut self) {
        self.native = NativeBrushes::default();
    }
}
