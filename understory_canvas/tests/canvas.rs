// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layers, invalidation, rendering and device lifecycle of the canvas.

use kurbo::{Point, Rect, Size};
use peniko::Color;
use understory_canvas::{
    Canvas, CanvasError, CanvasOptions, GraphicsDevice, LabelVisibility, LayerParams,
    RenderPrecision, Shape, ShapeLabel, ShapeStyle, TextRenderer, UiState,
};
use understory_imaging::{
    ClipRect, DrawOp, ImagingBackend, ImagingOp, PaintId, PixelRect, RectF, StateOp,
    SurfaceOffset,
};
use understory_imaging_ref::{DeviceEvent, RefDevice};

fn canvas() -> Canvas<RefDevice> {
    let mut canvas = Canvas::new(RefDevice::new());
    canvas.resize(Size::new(100.0, 80.0)).unwrap();
    canvas
}

fn filled(shape: Shape) -> Shape {
    let mut shape = shape;
    shape.set_normal_style(Some(
        ShapeStyle::new()
            .with_fill(Color::WHITE)
            .with_stroke(Color::BLACK)
            .with_foreground(Color::BLACK),
    ));
    shape
}

fn rect(x: f64, y: f64, w: f64, h: f64) -> Shape {
    filled(Shape::rectangle(Point::new(x, y), Size::new(w, h)))
}

fn draw_ops(canvas: &Canvas<RefDevice>) -> Vec<DrawOp> {
    canvas.device().backend().draw_ops().cloned().collect()
}

/// Fixed-advance text: half an em per byte.
struct MonoText;

impl TextRenderer for MonoText {
    fn measure(&mut self, text: &str, font_size: f64) -> Size {
        Size::new(text.len() as f64 * font_size / 2.0, font_size)
    }

    fn draw(
        &mut self,
        backend: &mut dyn ImagingBackend,
        text: &str,
        font_size: f64,
        paint: PaintId,
        origin: Point,
    ) {
        let size = self.measure(text, font_size);
        backend.state(StateOp::SetPaint(paint));
        backend.draw(DrawOp::FillRect(RectF::from_kurbo(Rect::from_origin_size(
            origin, size,
        ))));
    }
}

#[test]
fn full_repaint_clips_to_the_viewport_without_clearing() {
    let mut canvas = canvas();
    canvas.set_shapes_for_layer(
        Some(vec![rect(10.0, 10.0, 20.0, 20.0)]),
        LayerParams::new(1, 0),
    );
    assert_eq!(canvas.dirty_rects(), [Rect::ZERO]);
    canvas.device_mut().clear_log();

    canvas.render().unwrap();

    let ops = draw_ops(&canvas);
    assert_eq!(
        ops.iter().filter(|op| matches!(op, DrawOp::Clear(_))).count(),
        1,
        "only the session clear"
    );
    assert!(!ops.iter().any(|op| matches!(op, DrawOp::DrawImageRect { .. })));
    assert!(ops.iter().any(|op| matches!(op, DrawOp::FillPath(_))));
    assert!(canvas.device().backend().ops().contains(&ImagingOp::State(
        StateOp::PushClip(ClipRect::aliased(RectF::new(0.0, 0.0, 100.0, 80.0)))
    )));
    assert!(matches!(
        canvas.device().log(),
        [
            DeviceEvent::BeginDraw,
            DeviceEvent::Flush,
            DeviceEvent::Copy {
                src: PixelRect {
                    x: 0,
                    y: 0,
                    width: 100,
                    height: 80
                },
                ..
            },
            DeviceEvent::Present,
        ]
    ));
    assert!(canvas.dirty_rects().is_empty());
    assert!(canvas.has_buffer());
}

#[test]
fn surface_offset_translates_and_offsets_the_capture() {
    let mut canvas = canvas();
    canvas
        .device_mut()
        .set_surface_offset(SurfaceOffset { x: 3, y: 4 });
    canvas.render().unwrap();

    assert!(canvas.device().log().iter().any(|event| matches!(
        event,
        DeviceEvent::Copy { src, .. } if *src == PixelRect::new(3, 4, 100, 80)
    )));
    assert!(canvas.device().backend().ops().contains(&ImagingOp::State(
        StateOp::SetTransform(kurbo::Affine::translate((3.0, 4.0)))
    )));
}

#[test]
fn shapes_are_not_rebuilt_when_panning() {
    let mut canvas = canvas();
    canvas.set_shapes_for_layer(
        Some(vec![
            filled(Shape::polyline(vec![Point::ZERO, Point::new(50.0, 50.0)])),
            rect(60.0, 10.0, 10.0, 10.0),
        ]),
        LayerParams::new(1, 0),
    );
    canvas.render().unwrap();
    let paths = canvas.device().backend().paths_created();
    assert_eq!(paths, 2);

    for step in 1..5 {
        canvas.set_viewport_origin(Point::new(f64::from(step) * 3.0, 0.0));
        canvas.render().unwrap();
    }
    assert_eq!(canvas.device().backend().paths_created(), paths);
    assert_eq!(canvas.device().frames_presented(), 5);
}

#[test]
fn hit_test_prefers_the_topmost_shape() {
    let mut canvas = canvas();
    let bottom = canvas.set_shapes_for_layer(
        Some(vec![rect(0.0, 0.0, 50.0, 50.0)]),
        LayerParams::new(1, 0),
    );
    let top = canvas.set_shapes_for_layer(
        Some(vec![rect(0.0, 0.0, 30.0, 30.0), rect(10.0, 10.0, 30.0, 30.0)]),
        LayerParams::new(2, 5),
    );
    canvas.render().unwrap();

    assert_eq!(canvas.hit_test(Point::new(15.0, 15.0), None), Some(top[1]));
    assert_eq!(canvas.hit_test(Point::new(5.0, 5.0), None), Some(top[0]));
    assert_eq!(canvas.hit_test(Point::new(45.0, 45.0), None), Some(bottom[0]));
    assert_eq!(canvas.hit_test(Point::new(15.0, 15.0), Some(0)), Some(bottom[0]));
    assert_eq!(canvas.hit_test(Point::new(90.0, 70.0), None), None);
}

#[test]
fn hit_test_follows_pan_and_zoom() {
    let mut canvas = canvas();
    let keys = canvas.set_shapes_for_layer(
        Some(vec![rect(10.0, 10.0, 10.0, 10.0)]),
        LayerParams::new(1, 0),
    );
    canvas.render().unwrap();
    canvas.set_viewport_origin(Point::new(20.0, 0.0));
    canvas.render().unwrap();
    assert_eq!(canvas.hit_test(Point::new(35.0, 15.0), None), Some(keys[0]));
    assert_eq!(canvas.hit_test(Point::new(15.0, 15.0), None), None);

    canvas.set_zoom_factor(2.0);
    canvas.render().unwrap();
    assert_eq!(canvas.hit_test(Point::new(55.0, 25.0), None), Some(keys[0]));
}

#[test]
fn layers_stay_sorted_by_z_index() {
    let mut canvas = canvas();
    canvas.set_shapes_for_layer(Some(vec![]), LayerParams::new(1, 10));
    canvas.set_shapes_for_layer(Some(vec![]), LayerParams::new(2, -1));
    canvas.set_shapes_for_layer(Some(vec![]), LayerParams::new(3, 4));
    let ids: Vec<i32> = canvas.layers().map(|p| p.id).collect();
    assert_eq!(ids, [2, 3, 1]);
}

#[test]
fn removing_a_layer_detaches_and_releases_its_shapes() {
    let mut canvas = canvas();
    let params = LayerParams::new(4, 0);
    let keys = canvas.set_shapes_for_layer(Some(vec![rect(0.0, 0.0, 10.0, 10.0)]), params);
    canvas.render().unwrap();
    assert_eq!(canvas.device().backend().live_paths(), 1);

    canvas.set_shapes_for_layer(None, params);
    assert!(!canvas.has_shapes_for_layer(4));
    assert!(canvas.shape(keys[0]).is_none());
    assert_eq!(canvas.device().backend().live_paths(), 0);
    assert_eq!(canvas.device().backend().live_paints(), 0);
    assert_eq!(canvas.dirty_rects(), [Rect::ZERO]);

    canvas.set_shapes_for_layer(None, LayerParams::new(99, 0));
    assert!(!canvas.has_shapes_for_layer(99));
}

#[test]
fn replacing_a_layer_stales_old_keys_and_applies_precision() {
    let mut canvas = canvas();
    let old = canvas.set_shapes_for_layer(
        Some(vec![rect(0.0, 0.0, 1.0, 1.0)]),
        LayerParams::new(1, 0),
    );
    let new = canvas.set_shapes_for_layer(
        Some(vec![filled(Shape::polyline(vec![Point::ZERO, Point::new(5.0, 5.0)]))]),
        LayerParams::new(1, 0).with_precision(RenderPrecision::Single),
    );
    assert!(canvas.shape(old[0]).is_none());
    let shape = canvas.shape(new[0]).unwrap();
    assert_eq!(shape.layer_id(), Some(1));
    assert_eq!(shape.render_precision(), RenderPrecision::Single);
}

#[test]
fn invalidate_shape_queues_its_outset_bounds() {
    let mut canvas = canvas();
    let mut shape = rect(10.0, 10.0, 20.0, 20.0);
    shape.set_normal_style(Some(
        ShapeStyle::new()
            .with_fill(Color::WHITE)
            .with_stroke_thickness(3.0),
    ));
    let keys = canvas.set_shapes_for_layer(Some(vec![shape]), LayerParams::new(1, 0));
    canvas.render().unwrap();

    canvas.invalidate_shape(keys[0]);
    assert_eq!(canvas.dirty_rects(), [Rect::new(8.0, 8.0, 32.0, 32.0)]);
    assert!(canvas.needs_arrange());

    canvas.device_mut().clear_log();
    canvas.render().unwrap();
    let clears = draw_ops(&canvas)
        .iter()
        .filter(|op| matches!(op, DrawOp::Clear(_)))
        .count();
    assert_eq!(clears, 2);
}

#[test]
fn update_shape_queues_old_and_new_area() {
    let mut canvas = canvas();
    let keys = canvas.set_shapes_for_layer(
        Some(vec![rect(10.0, 10.0, 20.0, 20.0)]),
        LayerParams::new(1, 0),
    );
    canvas.render().unwrap();

    let moved = canvas.update_shape(keys[0], |shape| shape.set_location(Point::new(50.0, 10.0)));
    assert_eq!(moved, Some(true));
    assert_eq!(
        canvas.dirty_rects(),
        [Rect::new(9.0, 9.0, 31.0, 31.0), Rect::new(49.0, 9.0, 71.0, 31.0)]
    );

    canvas.render().unwrap();
    let kind = canvas.update_shape(keys[0], |shape| shape.shape_type());
    assert!(kind.is_some());
    assert!(canvas.dirty_rects().is_empty(), "reads queue nothing");

    canvas.update_shape(keys[0], |shape| shape.set_ui_state(UiState::PointerOver));
    assert_eq!(canvas.dirty_rects().len(), 2);
}

#[test]
fn moving_a_container_child_queues_old_and_new_area() {
    let mut canvas = canvas();
    let group = filled(Shape::container(vec![rect(10.0, 10.0, 20.0, 20.0)]));
    let keys = canvas.set_shapes_for_layer(Some(vec![group]), LayerParams::new(1, 0));
    canvas.render().unwrap();

    let moved = canvas.update_shape(keys[0], |group| {
        group.children_mut().unwrap()[0].set_location(Point::new(50.0, 10.0))
    });
    assert_eq!(moved, Some(true));
    assert_eq!(
        canvas.dirty_rects(),
        [Rect::new(9.0, 9.0, 31.0, 31.0), Rect::new(49.0, 9.0, 71.0, 31.0)]
    );

    canvas.render().unwrap();
    assert!(canvas.shape(keys[0]).unwrap().is_valid());
}

#[test]
fn added_child_takes_the_layer_precision() {
    let mut canvas = canvas();
    let keys = canvas.set_shapes_for_layer(
        Some(vec![Shape::container(vec![])]),
        LayerParams::new(1, 0).with_precision(RenderPrecision::Single),
    );

    let child = filled(Shape::polyline(vec![Point::ZERO, Point::new(5.0, 5.0)]));
    let added = canvas.update_shape(keys[0], |group| group.add_child(child).is_ok());
    assert_eq!(added, Some(true));

    let child = &canvas.shape(keys[0]).unwrap().children().unwrap()[0];
    assert_eq!(child.layer_id(), Some(1));
    assert_eq!(child.render_precision(), RenderPrecision::Single);
}

#[test]
fn hiding_a_label_repaints_without_it() {
    let mut canvas = canvas();
    canvas.set_text_renderer(Some(Box::new(MonoText)));
    let mut shape = rect(0.0, 0.0, 40.0, 40.0);
    shape.set_label(Some(ShapeLabel::new("a")));
    let keys = canvas.set_shapes_for_layer(Some(vec![shape]), LayerParams::new(1, 0));
    canvas.render().unwrap();
    let ops = draw_ops(&canvas);
    assert!(ops.iter().any(|op| matches!(op, DrawOp::FillRect(_))));

    canvas.update_shape(keys[0], |shape| {
        shape.set_label_visibility(LabelVisibility::Hidden);
    });
    assert_eq!(canvas.dirty_rects().len(), 2);

    canvas.device_mut().clear_log();
    canvas.render().unwrap();
    let ops = draw_ops(&canvas);
    assert!(ops.iter().any(|op| matches!(op, DrawOp::FillPath(_))));
    assert!(!ops.iter().any(|op| matches!(op, DrawOp::FillRect(_))));

    canvas.update_shape(keys[0], |shape| {
        shape.set_label_visibility(LabelVisibility::Hidden);
    });
    assert!(canvas.dirty_rects().is_empty(), "unchanged visibility");
}

#[test]
fn shape_update_batch_defers_everything() {
    let mut canvas = canvas();
    let keys = canvas.set_shapes_for_layer(
        Some(vec![rect(0.0, 0.0, 10.0, 10.0)]),
        LayerParams::new(1, 0),
    );
    canvas.render().unwrap();

    canvas.begin_shape_update();
    canvas.invalidate_shape(keys[0]);
    canvas.update_shape(keys[0], |shape| shape.set_size(Size::new(20.0, 20.0)));
    assert!(canvas.dirty_rects().is_empty());
    canvas.render().unwrap();
    assert_eq!(canvas.device().frames_presented(), 1);

    canvas.end_shape_update();
    assert_eq!(canvas.dirty_rects(), [Rect::ZERO]);
    canvas.render().unwrap();
    assert_eq!(canvas.device().frames_presented(), 2);
}

#[test]
fn labels_render_after_all_shapes() {
    let mut canvas = canvas();
    canvas.set_text_renderer(Some(Box::new(MonoText)));
    let mut a = rect(0.0, 0.0, 40.0, 40.0);
    a.set_label(Some(ShapeLabel::new("a")));
    let mut b = rect(50.0, 0.0, 40.0, 40.0);
    b.set_label(Some(ShapeLabel::new("b")));
    canvas.set_shapes_for_layer(Some(vec![a, b]), LayerParams::new(1, 0));
    canvas.device_mut().clear_log();
    canvas.render().unwrap();

    let kinds: Vec<&str> = draw_ops(&canvas)
        .iter()
        .filter_map(|op| match op {
            DrawOp::FillPath(_) => Some("fill"),
            DrawOp::FillRect(_) => Some("label"),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, ["fill", "fill", "label", "label"]);
    assert!(draw_ops(&canvas).contains(&DrawOp::FillRect(RectF::new(17.0, 14.0, 23.0, 26.0))));
}

#[test]
fn lost_device_is_recreated_and_the_frame_skipped() {
    let mut canvas = canvas();
    canvas.set_shapes_for_layer(
        Some(vec![rect(0.0, 0.0, 10.0, 10.0)]),
        LayerParams::new(1, 0),
    );
    canvas.render().unwrap();
    canvas.set_viewport_origin(Point::new(2.0, 0.0));

    canvas.device_mut().lose_device();
    canvas.render().unwrap();
    assert_eq!(canvas.device().frames_presented(), 1);
    assert_eq!(canvas.device().count(&DeviceEvent::DeviceLost), 1);
    assert_eq!(
        canvas.device().count(&DeviceEvent::SurfaceCreated {
            width: 100,
            height: 80
        }),
        2
    );
    assert!(!canvas.has_buffer());
    assert_eq!(canvas.dirty_rects(), [Rect::ZERO]);
    assert!(canvas.needs_arrange());

    canvas.arrange().unwrap();
    assert_eq!(canvas.device().frames_presented(), 2);
    assert_eq!(canvas.device().backend().live_paths(), 1);
    assert_eq!(canvas.device().backend().live_paints(), 3);
    assert!(canvas.has_buffer());
}

#[test]
fn copy_failure_is_fatal() {
    let mut canvas = canvas();
    canvas.device_mut().fail_copy = true;
    assert!(matches!(canvas.render(), Err(CanvasError::DrawSession(_))));
}

#[test]
fn surface_failure_surfaces_on_resize() {
    let mut device = RefDevice::new();
    device.fail_surface = true;
    let mut canvas = Canvas::new(device);
    assert!(matches!(
        canvas.resize(Size::new(10.0, 10.0)),
        Err(CanvasError::ResourceCreation(_))
    ));
    assert!(canvas.render().is_ok());
    assert_eq!(canvas.device().frames_presented(), 0);
}

#[test]
fn empty_size_has_no_surface() {
    let mut canvas = Canvas::new(RefDevice::new());
    canvas.resize(Size::new(0.0, 50.0)).unwrap();
    assert!(!canvas.context().is_initialized());
    canvas.arrange().unwrap();
    assert_eq!(canvas.device().frames_presented(), 0);
}

#[test]
fn unload_releases_everything_and_load_reacquires() {
    let mut canvas = canvas();
    canvas.set_shapes_for_layer(
        Some(vec![rect(0.0, 0.0, 10.0, 10.0)]),
        LayerParams::new(1, 0),
    );
    canvas.render().unwrap();

    canvas.unloaded();
    assert!(!canvas.has_shapes_for_layer(1));
    assert!(!canvas.device().is_ready());
    assert_eq!(canvas.device().count(&DeviceEvent::Reset), 1);

    canvas.loaded().unwrap();
    assert!(canvas.context().is_initialized());
    canvas.arrange().unwrap();
    assert_eq!(canvas.device().frames_presented(), 2);
}

#[test]
fn suspend_trims_a_ready_device() {
    let mut canvas = canvas();
    canvas.clean_up_on_suspend();
    assert_eq!(canvas.device().count(&DeviceEvent::Trimmed), 1);
}

#[test]
fn options_set_the_initial_view() {
    let canvas = Canvas::with_options(
        RefDevice::new(),
        CanvasOptions {
            dpi: 192.0,
            zoom_factor: 0.5,
            viewport_origin: Point::new(1.5, 2.0),
        },
    );
    assert_eq!(canvas.zoom_factor(), 1.0);
    assert_eq!(canvas.viewport().pixel_zoom(), 2.0);
    assert_eq!(canvas.viewport().pixel_origin(), Point::new(3.0, 4.0));
    assert_eq!(canvas.device().count(&DeviceEvent::Initialized), 1);
}
