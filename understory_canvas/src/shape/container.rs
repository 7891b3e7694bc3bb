// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shapes grouping other shapes.

use alloc::vec::Vec;

use kurbo::{Point, Rect};

use super::Shape;
use crate::geometry::ShapeView;

/// Children in insertion order plus their cached union bounds.
#[derive(Debug)]
pub(crate) struct Container {
    children: Vec<Shape>,
    bounds: Option<(ShapeView, Rect)>,
}

impl Container {
    pub(crate) fn new(children: Vec<Shape>) -> Self {
        Self {
            children,
            bounds: None,
        }
    }

    pub(crate) fn for_each(&mut self, f: impl FnMut(&mut Shape)) {
        self.children.iter_mut().for_each(f);
    }

    pub(crate) fn clear_bounds(&mut self) {
        self.bounds = None;
    }

    pub(crate) fn children(&self) -> &[Shape] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [Shape] {
        &mut self.children
    }

    pub(crate) fn push(&mut self, child: Shape) {
        self.children.push(child);
        self.bounds = None;
    }

    /// Union of the non-empty bounds of every child.
    pub(crate) fn bounds(&mut self, view: ShapeView) -> Rect {
        if let Some((cached, bounds)) = self.bounds
            && cached == view
        {
            return bounds;
        }
        let bounds = self
            .children
            .iter_mut()
            .map(|child| child.bounds(view))
            .filter(|b| b.width() > 0.0 && b.height() > 0.0)
            .reduce(|a, b| a.union(b))
            .unwrap_or(Rect::ZERO);
        self.bounds = Some((view, bounds));
        bounds
    }

    /// The topmost child decides: children are tested last to first.
    pub(crate) fn hit_test(&mut self, point: Point, view: ShapeView) -> bool {
        self.children
            .iter_mut()
            .rev()
            .any(|child| child.hit_test(point, view))
    }
}
