// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Retained shapes.
//!
//! A [`Shape`] is one of a small set of kinds (lines, polylines,
//! multi-polygons, rectangles and containers of other shapes) plus the
//! state every kind shares: styles per [`UiState`], an optional label,
//! and two validity flags.
//!
//! ## Validity
//!
//! A shape starts *invalid*. [`Shape::init_render`] builds its native
//! geometry and marks it valid; any mutation moves it back through
//! [`Shape::invalidate`]. Style resolution has its own flag so a hover
//! change re-creates paints without rebuilding geometry.
//!
//! ## Coordinates
//!
//! Shapes do not know their canvas. Every operation that depends on the
//! view takes a [`ShapeView`], and cached pixel data is recomputed when the
//! view it was computed for changes.

mod container;
mod path;
mod rectangle;

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::any::Any;

use kurbo::{Point, Rect, Size};
use understory_imaging::{FillRule, GraphicsDevice, PathId, ResourceBackend};

use crate::RenderContext;
use crate::geometry::{RenderPrecision, ShapeView};
use crate::label::{LabelVisibility, ShapeLabel, label_location};
use crate::style::{CurrentStyle, ShapeStyle, StateStyles, UiState};

use container::Container;
use path::PathGeometry;
use rectangle::RectangleGeometry;

/// Which kind of shape a [`Shape`] is.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ShapeType {
    /// A single open segment.
    Line,
    /// An open sequence of segments.
    Polyline,
    /// One or more closed rings filled together.
    MultiPolygon,
    /// An axis-aligned, optionally rounded rectangle.
    Rectangle,
    /// A group of child shapes.
    Container,
}

#[derive(Debug)]
enum Geometry {
    Path(PathGeometry),
    Rectangle(RectangleGeometry),
    Container(Container),
}

/// A native path plus the ones it replaced that still have to be destroyed.
///
/// Caches are dropped in places that have no device at hand, so retired
/// paths wait here until the next [`flush`](Self::flush).
#[derive(Debug, Default)]
pub(crate) struct NativePath {
    current: Option<PathId>,
    retired: Vec<PathId>,
}

impl NativePath {
    pub(crate) fn get(&self) -> Option<PathId> {
        self.current
    }

    pub(crate) fn set(&mut self, id: PathId) {
        self.retire();
        self.current = Some(id);
    }

    pub(crate) fn retire(&mut self) {
        if let Some(id) = self.current.take() {
            self.retired.push(id);
        }
    }

    pub(crate) fn flush<B: ResourceBackend + ?Sized>(&mut self, backend: &mut B) {
        for id in self.retired.drain(..) {
            backend.destroy_path(id);
        }
    }

    pub(crate) fn release<B: ResourceBackend + ?Sized>(&mut self, backend: &mut B) {
        self.retire();
        self.flush(backend);
    }

    /// Drops every id without destroying it; the device that owned them is gone.
    pub(crate) fn forget(&mut self) {
        self.current = None;
        self.retired.clear();
    }
}

/// Whether two rects share a region of positive area.
#[inline]
pub(crate) fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// A drawable node of the canvas scene.
///
/// ```rust
/// use kurbo::{Point, Rect, Size};
/// use understory_canvas::{Shape, ShapeType, ShapeView};
///
/// let mut rect = Shape::rectangle(Point::new(10.0, 10.0), Size::new(20.0, 20.0));
/// assert_eq!(rect.shape_type(), ShapeType::Rectangle);
/// assert_eq!(rect.bounds(ShapeView::IDENTITY), Rect::new(10.0, 10.0, 30.0, 30.0));
/// ```
#[derive(Debug)]
pub struct Shape {
    shape_type: ShapeType,
    geometry: Geometry,
    styles: StateStyles,
    current: CurrentStyle,
    style_valid: bool,
    valid: bool,
    ui_state: UiState,
    label: Option<ShapeLabel>,
    label_visibility: LabelVisibility,
    label_render_position: Option<Point>,
    label_origin: Point,
    /// Layer id and the precision that layer applies.
    layer: Option<(i32, RenderPrecision)>,
    model: Option<Arc<dyn Any + Send + Sync>>,
}

impl Shape {
    fn with_geometry(shape_type: ShapeType, geometry: Geometry) -> Self {
        Self {
            shape_type,
            geometry,
            styles: StateStyles::default(),
            current: CurrentStyle::default(),
            style_valid: false,
            valid: false,
            ui_state: UiState::Normal,
            label: None,
            label_visibility: LabelVisibility::Auto,
            label_render_position: None,
            label_origin: Point::new(0.5, 0.5),
            layer: None,
            model: None,
        }
    }

    /// A line from `start` to `end`.
    pub fn line(start: Point, end: Point) -> Self {
        Self::with_geometry(
            ShapeType::Line,
            Geometry::Path(PathGeometry::new(vec![vec![start, end]], false)),
        )
    }

    /// An open polyline through `points`.
    pub fn polyline(points: Vec<Point>) -> Self {
        Self::with_geometry(
            ShapeType::Polyline,
            Geometry::Path(PathGeometry::new(vec![points], false)),
        )
    }

    /// A filled shape made of closed `rings`, even-odd filled by default.
    pub fn multi_polygon(rings: Vec<Vec<Point>>) -> Self {
        Self::with_geometry(
            ShapeType::MultiPolygon,
            Geometry::Path(PathGeometry::new(rings, true)),
        )
    }

    /// A rectangle at `location` (model units) of `size`.
    pub fn rectangle(location: Point, size: Size) -> Self {
        Self::with_geometry(
            ShapeType::Rectangle,
            Geometry::Rectangle(RectangleGeometry::new(location, size)),
        )
    }

    /// A group of `children`, drawn in order.
    pub fn container(children: Vec<Self>) -> Self {
        Self::with_geometry(
            ShapeType::Container,
            Geometry::Container(Container::new(children)),
        )
    }

    /// Kind of this shape.
    #[must_use]
    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    // --- validity -------------------------------------------------------

    /// Whether native geometry is built and current.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the resolved style matches the styles and UI state.
    #[must_use]
    pub fn is_style_valid(&self) -> bool {
        self.style_valid
    }

    /// Marks the shape invalid. With `clear_cache`, also drops cached
    /// geometry and bounds so they are rebuilt from model data.
    ///
    /// Does nothing for an already invalid shape; containers forward to
    /// their children either way.
    pub fn invalidate(&mut self, clear_cache: bool) {
        if self.valid {
            self.invalidate_core(clear_cache);
            self.valid = false;
        }
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(|child| child.invalidate(clear_cache));
        }
    }

    fn invalidate_core(&mut self, clear_cache: bool) {
        match &mut self.geometry {
            Geometry::Path(g) => {
                if clear_cache {
                    g.clear();
                }
            }
            Geometry::Rectangle(r) => {
                if clear_cache {
                    r.clear();
                }
            }
            Geometry::Container(c) => c.clear_bounds(),
        }
    }

    /// Drops every cache after a geometry mutation, valid or not.
    fn geometry_changed(&mut self) {
        self.invalidate_core(true);
        self.valid = false;
    }

    /// A style or state change: paints are re-created, geometry is kept.
    fn on_ui_changed(&mut self) {
        self.invalidate(false);
        self.style_valid = false;
        match &mut self.geometry {
            Geometry::Path(g) => g.clear_bounds(),
            Geometry::Rectangle(_) => {}
            Geometry::Container(c) => c.clear_bounds(),
        }
    }

    /// Builds what rendering needs: native paints for the resolved style
    /// when it is out of date, native geometry and label measurement when
    /// the shape is invalid. Repeated calls are no-ops.
    pub fn init_render<D: GraphicsDevice>(&mut self, cx: &mut RenderContext<D>, view: ShapeView) {
        if !self.style_valid {
            let style = self.styles.resolve(self.ui_state);
            self.current.init(style, cx.device_mut());
            self.style_valid = true;
        }
        if !self.valid {
            if let Some(label) = &mut self.label {
                label.init_render(cx);
            }
            match &mut self.geometry {
                Geometry::Path(g) => g.init_render(cx, view),
                Geometry::Rectangle(r) => r.init_render(cx, view),
                Geometry::Container(_) => {}
            }
            self.valid = true;
        }
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(|child| child.init_render(cx, view));
        }
    }

    /// Zoom changed: geometry that depends on zoom is dropped.
    pub fn on_zoom_factor_changed(&mut self) {
        self.invalidate(false);
        match &mut self.geometry {
            Geometry::Path(g) => g.on_zoom_factor_changed(),
            Geometry::Rectangle(r) => r.clear(),
            Geometry::Container(c) => {
                c.clear_bounds();
                c.for_each(Self::on_zoom_factor_changed);
            }
        }
    }

    /// The device was lost or the display changed: every native resource is
    /// forgotten and the shape starts over.
    pub fn on_display_invalidated(&mut self) {
        self.current.forget();
        if let Some(label) = &mut self.label {
            label.reset();
        }
        match &mut self.geometry {
            Geometry::Path(g) => g.forget_native(),
            Geometry::Rectangle(r) => r.forget_native(),
            Geometry::Container(c) => c.for_each(Self::on_display_invalidated),
        }
        self.invalidate(true);
        self.style_valid = false;
    }

    /// Destroys every native resource on `backend`.
    pub fn release<B: ResourceBackend + ?Sized>(&mut self, backend: &mut B) {
        self.current.release(backend);
        match &mut self.geometry {
            Geometry::Path(g) => g.release(backend),
            Geometry::Rectangle(r) => r.release(backend),
            Geometry::Container(c) => c.for_each(|child| child.release(backend)),
        }
        self.valid = false;
        self.style_valid = false;
    }

    // --- attachment -----------------------------------------------------

    /// Id of the layer this shape is attached to.
    #[must_use]
    pub fn layer_id(&self) -> Option<i32> {
        self.layer.map(|(id, _)| id)
    }

    /// Whether the shape belongs to a canvas layer.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.layer.is_some()
    }

    pub(crate) fn attach(&mut self, layer: i32, precision: RenderPrecision) {
        self.layer = Some((layer, precision));
        self.set_render_precision(precision);
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(|child| child.attach(layer, precision));
        }
    }

    pub(crate) fn detach(&mut self) {
        self.layer = None;
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(Self::detach);
        }
    }

    // --- geometry -------------------------------------------------------

    /// Points of a line or polyline, or the first ring of a multi-polygon.
    #[must_use]
    pub fn points(&self) -> Option<&[Point]> {
        match &self.geometry {
            Geometry::Path(g) => Some(g.rings().first().map_or(&[][..], Vec::as_slice)),
            _ => None,
        }
    }

    /// Replaces the points of a line, polyline or single-ring multi-polygon.
    ///
    /// A line keeps only its first two points. Returns `false` for shape
    /// kinds without points.
    pub fn set_points(&mut self, mut points: Vec<Point>) -> bool {
        if self.shape_type == ShapeType::Line {
            points.truncate(2);
        }
        self.set_rings(vec![points])
    }

    /// Rings of a path-based shape.
    #[must_use]
    pub fn rings(&self) -> Option<&[Vec<Point>]> {
        match &self.geometry {
            Geometry::Path(g) => Some(g.rings()),
            _ => None,
        }
    }

    /// Replaces all rings of a path-based shape. Returns `false` for
    /// rectangles and containers.
    pub fn set_rings(&mut self, rings: Vec<Vec<Point>>) -> bool {
        let Geometry::Path(g) = &mut self.geometry else {
            return false;
        };
        g.set_rings(rings);
        self.geometry_changed();
        true
    }

    /// Location of a rectangle in model units.
    #[must_use]
    pub fn location(&self) -> Option<Point> {
        match &self.geometry {
            Geometry::Rectangle(r) => Some(r.location),
            _ => None,
        }
    }

    /// Moves a rectangle. Returns `false` for other kinds.
    pub fn set_location(&mut self, location: Point) -> bool {
        self.update_rectangle(|r| r.location = location)
    }

    /// Size of a rectangle in model units.
    #[must_use]
    pub fn size(&self) -> Option<Size> {
        match &self.geometry {
            Geometry::Rectangle(r) => Some(r.size),
            _ => None,
        }
    }

    /// Resizes a rectangle. Returns `false` for other kinds.
    pub fn set_size(&mut self, size: Size) -> bool {
        self.update_rectangle(|r| r.size = size)
    }

    /// Corner radius of a rectangle in model units.
    #[must_use]
    pub fn corner_radius(&self) -> Option<f64> {
        match &self.geometry {
            Geometry::Rectangle(r) => Some(r.corner_radius),
            _ => None,
        }
    }

    /// Rounds the corners of a rectangle. Returns `false` for other kinds.
    pub fn set_corner_radius(&mut self, radius: f64) -> bool {
        self.update_rectangle(|r| r.corner_radius = radius)
    }

    fn update_rectangle(&mut self, f: impl FnOnce(&mut RectangleGeometry)) -> bool {
        let Geometry::Rectangle(r) = &mut self.geometry else {
            return false;
        };
        f(r);
        self.geometry_changed();
        true
    }

    /// Fill rule of a path-based shape.
    #[must_use]
    pub fn fill_rule(&self) -> Option<FillRule> {
        match &self.geometry {
            Geometry::Path(g) => Some(g.fill_rule),
            _ => None,
        }
    }

    /// Sets the fill rule of a path-based shape.
    pub fn set_fill_rule(&mut self, fill_rule: FillRule) {
        if let Geometry::Path(g) = &mut self.geometry
            && g.fill_rule != fill_rule
        {
            g.fill_rule = fill_rule;
            self.invalidate(false);
        }
    }

    /// How model data is lowered to native geometry.
    #[must_use]
    pub fn render_precision(&self) -> RenderPrecision {
        match &self.geometry {
            Geometry::Path(g) => g.precision(),
            _ => RenderPrecision::Double,
        }
    }

    /// Changes the render precision; containers forward it to children.
    pub fn set_render_precision(&mut self, precision: RenderPrecision) {
        match &mut self.geometry {
            Geometry::Path(g) => {
                if g.precision() != precision {
                    g.set_precision(precision);
                    self.geometry_changed();
                }
            }
            Geometry::Rectangle(_) => {}
            Geometry::Container(c) => {
                c.for_each(|child| child.set_render_precision(precision));
                c.clear_bounds();
            }
        }
    }

    /// Child shapes of a container.
    #[must_use]
    pub fn children(&self) -> Option<&[Self]> {
        match &self.geometry {
            Geometry::Container(c) => Some(c.children()),
            _ => None,
        }
    }

    /// Mutable access to the children of a container.
    ///
    /// The container's cached bounds are dropped and it is marked invalid,
    /// since children may move.
    pub fn children_mut(&mut self) -> Option<&mut [Self]> {
        match &mut self.geometry {
            Geometry::Container(c) => {
                c.clear_bounds();
                self.valid = false;
                Some(c.children_mut())
            }
            _ => None,
        }
    }

    /// Appends a child to a container, attaching it like its siblings.
    /// Returns the shape back for other kinds.
    pub fn add_child(&mut self, mut child: Self) -> Result<(), Self> {
        let Geometry::Container(c) = &mut self.geometry else {
            return Err(child);
        };
        if let Some((layer, precision)) = self.layer {
            child.attach(layer, precision);
        }
        c.push(child);
        self.invalidate(false);
        Ok(())
    }

    // --- styles ---------------------------------------------------------

    /// Style used in the normal state and for fields other styles leave unset.
    #[must_use]
    pub fn normal_style(&self) -> Option<&ShapeStyle> {
        self.styles.normal.as_ref()
    }

    /// Sets the normal style; containers forward it to their children.
    pub fn set_normal_style(&mut self, style: Option<ShapeStyle>) {
        self.set_style_with(style, |s| &mut s.normal, Self::set_normal_style);
    }

    /// Style used while the pointer is over the shape.
    #[must_use]
    pub fn pointer_over_style(&self) -> Option<&ShapeStyle> {
        self.styles.pointer_over.as_ref()
    }

    /// Sets the pointer-over style; containers forward it to their children.
    pub fn set_pointer_over_style(&mut self, style: Option<ShapeStyle>) {
        self.set_style_with(style, |s| &mut s.pointer_over, Self::set_pointer_over_style);
    }

    /// Style used while the shape is selected.
    #[must_use]
    pub fn selected_style(&self) -> Option<&ShapeStyle> {
        self.styles.selected.as_ref()
    }

    /// Sets the selected style; containers forward it to their children.
    pub fn set_selected_style(&mut self, style: Option<ShapeStyle>) {
        self.set_style_with(style, |s| &mut s.selected, Self::set_selected_style);
    }

    fn set_style_with(
        &mut self,
        style: Option<ShapeStyle>,
        slot: impl Fn(&mut StateStyles) -> &mut Option<ShapeStyle>,
        forward: impl Fn(&mut Self, Option<ShapeStyle>),
    ) {
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(|child| forward(child, style.clone()));
        }
        *slot(&mut self.styles) = style;
        self.on_ui_changed();
    }

    /// The style that applies in the current UI state.
    #[must_use]
    pub fn current_style(&self) -> ShapeStyle {
        self.styles.resolve(self.ui_state)
    }

    /// Stroke thickness that applies in the current UI state.
    #[must_use]
    pub fn stroke_thickness(&self) -> f64 {
        self.styles.stroke_for(self.ui_state).0
    }

    /// Interaction state.
    #[must_use]
    pub fn ui_state(&self) -> UiState {
        self.ui_state
    }

    /// Changes the interaction state; containers forward it to children.
    /// Setting the current state again does nothing.
    pub fn set_ui_state(&mut self, state: UiState) {
        if self.ui_state == state {
            return;
        }
        self.ui_state = state;
        self.on_ui_changed();
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(|child| child.set_ui_state(state));
        }
    }

    // --- label ----------------------------------------------------------

    /// The label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&ShapeLabel> {
        self.label.as_ref()
    }

    /// Replaces the label.
    pub fn set_label(&mut self, label: Option<ShapeLabel>) {
        self.label = label;
        self.invalidate(false);
    }

    /// When the label is drawn.
    #[must_use]
    pub fn label_visibility(&self) -> LabelVisibility {
        self.label_visibility
    }

    /// Sets when the label is drawn.
    pub fn set_label_visibility(&mut self, visibility: LabelVisibility) {
        if self.label_visibility != visibility {
            self.label_visibility = visibility;
            self.invalidate(false);
        }
    }

    /// Model-space anchor of the label; `None` anchors at the bounds centre.
    #[must_use]
    pub fn label_render_position(&self) -> Option<Point> {
        self.label_render_position
    }

    /// Sets the label anchor.
    pub fn set_label_render_position(&mut self, position: Option<Point>) {
        if self.label_render_position != position {
            self.label_render_position = position;
            self.invalidate(false);
        }
    }

    /// Fraction of the label size placed before the anchor.
    #[must_use]
    pub fn label_origin(&self) -> Point {
        self.label_origin
    }

    /// Sets the label origin; `(0.5, 0.5)` centres the label on its anchor.
    pub fn set_label_origin(&mut self, origin: Point) {
        if self.label_origin != origin {
            self.label_origin = origin;
            self.invalidate(false);
        }
    }

    // --- model ----------------------------------------------------------

    /// Caller data associated with this shape.
    #[must_use]
    pub fn model(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.model.as_ref()
    }

    /// Associates caller data with this shape.
    pub fn set_model(&mut self, model: Option<Arc<dyn Any + Send + Sync>>) {
        self.model = model;
    }

    // --- queries --------------------------------------------------------

    /// Pixel bounds in shape space.
    ///
    /// Empty geometry yields [`Rect::ZERO`].
    pub fn bounds(&mut self, view: ShapeView) -> Rect {
        let (thickness, stroked) = self.styles.stroke_for(self.ui_state);
        match &mut self.geometry {
            Geometry::Path(g) => g.bounds(view, thickness, stroked),
            Geometry::Rectangle(r) => r.bounds(view),
            Geometry::Container(c) => c.bounds(view),
        }
    }

    /// Whether `point` (shape space) hits this shape.
    pub fn hit_test(&mut self, point: Point, view: ShapeView) -> bool {
        let thickness = self.stroke_thickness();
        match &mut self.geometry {
            Geometry::Path(g) => g.hit_test(point, view, thickness),
            Geometry::Rectangle(r) => r.hit_test(point, view),
            Geometry::Container(c) => c.hit_test(point, view),
        }
    }

    // --- rendering ------------------------------------------------------

    /// Draws fill and stroke if the shape overlaps `rect`.
    pub fn render<D: GraphicsDevice>(
        &mut self,
        cx: &mut RenderContext<D>,
        view: ShapeView,
        rect: Rect,
    ) {
        self.init_render(cx, view);
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(|child| child.render(cx, view, rect));
            return;
        }
        let bounds = self.bounds(view);
        if !overlaps(bounds, rect) {
            return;
        }
        let native = self.current.native();
        let thickness = self.current.stroke_thickness();
        match &mut self.geometry {
            Geometry::Path(g) => g.render(cx, view, native, thickness),
            Geometry::Rectangle(r) => r.render(cx, view, native, thickness),
            Geometry::Container(_) => {}
        }
    }

    /// Draws the label, and the labels of children.
    pub fn render_label<D: GraphicsDevice>(
        &mut self,
        cx: &mut RenderContext<D>,
        view: ShapeView,
        rect: Rect,
    ) {
        if let Geometry::Container(c) = &mut self.geometry {
            c.for_each(|child| child.render_label(cx, view, rect));
        }
        if self.label_visibility == LabelVisibility::Hidden {
            return;
        }
        let Some(paint) = self.current.native().foreground else {
            return;
        };
        let Some(size) = self.label.as_ref().and_then(ShapeLabel::size) else {
            return;
        };
        let bounds = self.bounds(view);
        if self.label_visibility == LabelVisibility::Auto
            && (size.width > bounds.width() || size.height > bounds.height())
        {
            return;
        }
        let location = label_location(
            bounds,
            size,
            self.label_render_position,
            self.label_origin,
            view.pixel_zoom,
            view.origin,
        );
        if let Some(label) = &self.label {
            cx.draw_text(label.text(), label.font_size(), paint, location);
        }
    }
}
