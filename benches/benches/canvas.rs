// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use kurbo::{Point, Size};
use peniko::Color;
use understory_canvas::{Canvas, GraphicsDevice, LayerParams, RenderPrecision, Shape, ShapeStyle};
use understory_imaging_ref::RefDevice;
use understory_imaging_vello_cpu::VelloCpuDevice;

#[derive(Clone)]
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        // Numerical Recipes LCG parameters.
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        f64::from((self.0 >> 32) as u32) / f64::from(u32::MAX)
    }
}

/// A grid-ish scatter of polylines and rectangles over `extent`.
fn scene(count: usize, extent: f64, seed: u64) -> Vec<Shape> {
    let mut rng = Lcg(seed);
    let style = ShapeStyle::new()
        .with_fill(Color::from_rgb8(200, 220, 255))
        .with_stroke(Color::BLACK)
        .with_stroke_thickness(1.5);
    (0..count)
        .map(|i| {
            let x = rng.next_f64() * extent;
            let y = rng.next_f64() * extent;
            let mut shape = if i % 2 == 0 {
                let points = (0..8)
                    .map(|k| {
                        Point::new(
                            x + f64::from(k) * 6.0,
                            y + rng.next_f64() * 20.0,
                        )
                    })
                    .collect();
                Shape::polyline(points)
            } else {
                Shape::rectangle(Point::new(x, y), Size::new(12.0, 8.0))
            };
            shape.set_normal_style(Some(style.clone()));
            shape
        })
        .collect()
}

fn canvas<D: GraphicsDevice>(device: D, precision: RenderPrecision) -> Canvas<D> {
    let mut canvas = Canvas::new(device);
    canvas.resize(Size::new(640.0, 480.0)).unwrap();
    canvas.set_shapes_for_layer(
        Some(scene(2_000, 2_000.0, 0xCA5E_0000_0000_0001)),
        LayerParams::new(0, 0).with_precision(precision),
    );
    canvas.render().unwrap();
    canvas
}

fn bench_ref_device(c: &mut Criterion) {
    let mut group = c.benchmark_group("canvas_ref");
    group.sample_size(30);

    for precision in [RenderPrecision::Double, RenderPrecision::Single] {
        group.bench_function(format!("pan_step({precision:?})"), |b| {
            let mut canvas = canvas(RefDevice::new(), precision);
            let mut x = 0.0;
            b.iter(|| {
                x += 3.0;
                canvas.set_viewport_origin(Point::new(x, x / 2.0));
                canvas.render().unwrap();
                canvas.device_mut().clear_log();
                black_box(canvas.render_offset());
            });
        });

        group.bench_function(format!("full_repaint({precision:?})"), |b| {
            let mut canvas = canvas(RefDevice::new(), precision);
            b.iter(|| {
                canvas.reset_viewport_buffer();
                canvas.render().unwrap();
                canvas.device_mut().clear_log();
            });
        });

        group.bench_function(format!("zoom({precision:?})"), |b| {
            b.iter_batched(
                || canvas(RefDevice::new(), precision),
                |mut canvas| {
                    canvas.set_zoom_factor(2.0);
                    canvas.render().unwrap();
                    black_box(canvas);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("hit_test", |b| {
        let mut canvas = canvas(RefDevice::new(), RenderPrecision::Double);
        let mut rng = Lcg(7);
        b.iter(|| {
            let p = Point::new(rng.next_f64() * 640.0, rng.next_f64() * 480.0);
            black_box(canvas.hit_test(p, None));
        });
    });

    group.finish();
}

fn bench_vello_cpu(c: &mut Criterion) {
    let mut group = c.benchmark_group("canvas_vello_cpu");
    group.sample_size(10);

    group.bench_function("pan_step", |b| {
        let mut canvas = canvas(VelloCpuDevice::new(), RenderPrecision::Double);
        let mut x = 0.0;
        b.iter(|| {
            x += 3.0;
            canvas.set_viewport_origin(Point::new(x, 0.0));
            canvas.render().unwrap();
        });
    });

    group.bench_function("full_repaint", |b| {
        let mut canvas = canvas(VelloCpuDevice::new(), RenderPrecision::Double);
        b.iter(|| {
            canvas.reset_viewport_buffer();
            canvas.render().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ref_device, bench_vello_cpu);
criterion_main!(benches);
