// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape layers and handles to the shapes they own.

use alloc::vec::Vec;

use crate::Shape;
use crate::geometry::RenderPrecision;

/// Identity, stacking order and precision of a layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayerParams {
    /// Id, unique among the layers of a canvas.
    pub id: i32,
    /// Stacking order; higher layers are drawn later and hit first.
    pub z_index: i32,
    /// Render precision applied to every shape of the layer.
    pub precision: RenderPrecision,
}

impl LayerParams {
    /// A double-precision layer.
    #[must_use]
    pub const fn new(id: i32, z_index: i32) -> Self {
        Self {
            id,
            z_index,
            precision: RenderPrecision::Double,
        }
    }

    /// Sets the render precision.
    #[must_use]
    pub const fn with_precision(mut self, precision: RenderPrecision) -> Self {
        self.precision = precision;
        self
    }
}

/// Handle to a shape owned by a canvas layer.
///
/// A key goes stale once the content of its layer is replaced; lookups with
/// a stale key return `None`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    layer: i32,
    generation: u32,
    index: usize,
}

impl ShapeKey {
    /// Id of the layer owning the shape.
    #[must_use]
    pub fn layer_id(self) -> i32 {
        self.layer
    }

    /// Position of the shape within its layer.
    #[must_use]
    pub fn index(self) -> usize {
        self.index
    }
}

/// A layer: its parameters and the shapes in drawing order.
#[derive(Debug)]
pub(crate) struct ShapeLayer {
    pub(crate) params: LayerParams,
    generation: u32,
    pub(crate) shapes: Vec<Shape>,
}

impl ShapeLayer {
    pub(crate) fn new(params: LayerParams) -> Self {
        Self {
            params,
            generation: 0,
            shapes: Vec::new(),
        }
    }

    /// Detaches every shape and hands them back.
    pub(crate) fn take_shapes(&mut self) -> Vec<Shape> {
        let mut shapes = core::mem::take(&mut self.shapes);
        for shape in &mut shapes {
            shape.detach();
        }
        shapes
    }

    /// Attaches `shapes` as the new content under `generation`.
    pub(crate) fn set_shapes(&mut self, shapes: Vec<Shape>, generation: u32) -> Vec<ShapeKey> {
        self.generation = generation;
        self.shapes = shapes;
        let (id, precision) = (self.params.id, self.params.precision);
        for shape in &mut self.shapes {
            shape.attach(id, precision);
        }
        (0..self.shapes.len())
            .map(|index| self.key(index))
            .collect()
    }

    pub(crate) fn key(&self, index: usize) -> ShapeKey {
        ShapeKey {
            layer: self.params.id,
            generation: self.generation,
            index,
        }
    }

    pub(crate) fn owns(&self, key: ShapeKey) -> bool {
        key.layer == self.params.id && key.generation == self.generation
    }

    pub(crate) fn get(&self, key: ShapeKey) -> Option<&Shape> {
        if self.owns(key) {
            self.shapes.get(key.index)
        } else {
            None
        }
    }

    pub(crate) fn get_mut(&mut self, key: ShapeKey) -> Option<&mut Shape> {
        if self.owns(key) {
            self.shapes.get_mut(key.index)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use kurbo::{Point, Size};

    #[test]
    fn keys_go_stale_with_the_generation() {
        let mut layer =
            ShapeLayer::new(LayerParams::new(7, 0).with_precision(RenderPrecision::Single));
        let keys = layer.set_shapes(
            vec![Shape::rectangle(Point::ZERO, Size::new(1.0, 1.0))],
            1,
        );
        assert_eq!(keys[0].layer_id(), 7);
        assert!(layer.get(keys[0]).is_some_and(Shape::is_attached));

        let old = layer.take_shapes();
        assert!(old.iter().all(|s| !s.is_attached()));
        layer.set_shapes(vec![Shape::polyline(vec![Point::ZERO])], 2);
        assert!(layer.get(keys[0]).is_none());
        assert_eq!(
            layer.get(layer.key(0)).map(Shape::render_precision),
            Some(RenderPrecision::Single)
        );
    }
}
