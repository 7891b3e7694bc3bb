// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversions between kurbo paths and [`PathDesc`] command buffers.

use alloc::vec::Vec;
use kurbo::{BezPath, PathEl, Point};

use crate::{PathCmd, PathDesc};

#[expect(
    clippy::cast_possible_truncation,
    reason = "Path commands are stored in f32."
)]
fn narrow(p: Point) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Lower a kurbo path into an f32 command buffer.
pub fn path_desc_from_bez(path: &BezPath) -> PathDesc {
    let mut commands = Vec::with_capacity(path.elements().len());
    for el in path.elements() {
        let cmd = match *el {
            PathEl::MoveTo(p) => {
                let (x, y) = narrow(p);
                PathCmd::MoveTo { x, y }
            }
            PathEl::LineTo(p) => {
                let (x, y) = narrow(p);
                PathCmd::LineTo { x, y }
            }
            PathEl::QuadTo(p1, p) => {
                let (x1, y1) = narrow(p1);
                let (x, y) = narrow(p);
                PathCmd::QuadTo { x1, y1, x, y }
            }
            PathEl::CurveTo(p1, p2, p) => {
                let (x1, y1) = narrow(p1);
                let (x2, y2) = narrow(p2);
                let (x, y) = narrow(p);
                PathCmd::CurveTo {
                    x1,
                    y1,
                    x2,
                    y2,
                    x,
                    y,
                }
            }
            PathEl::ClosePath => PathCmd::Close,
        };
        commands.push(cmd);
    }
    PathDesc {
        commands: commands.into_boxed_slice(),
    }
}

/// Rebuild a kurbo path from a command buffer.
pub fn bez_path_from_desc(desc: &PathDesc) -> BezPath {
    let mut p = BezPath::new();
    for cmd in desc.commands.iter() {
        match *cmd {
            PathCmd::MoveTo { x, y } => p.move_to((f64::from(x), f64::from(y))),
            PathCmd::LineTo { x, y } => p.line_to((f64::from(x), f64::from(y))),
            PathCmd::QuadTo { x1, y1, x, y } => {
                p.quad_to((f64::from(x1), f64::from(y1)), (f64::from(x), f64::from(y)));
            }
            PathCmd::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => p.curve_to(
                (f64::from(x1), f64::from(y1)),
                (f64::from(x2), f64::from(y2)),
                (f64::from(x), f64::from(y)),
            ),
            PathCmd::Close => p.close_path(),
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowering_keeps_element_order() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((10.5, 0.0));
        path.quad_to((12.0, 2.0), (10.5, 4.0));
        path.close_path();

        let desc = path_desc_from_bez(&path);
        assert_eq!(desc.commands.len(), 4);
        assert_eq!(desc.commands[1], PathCmd::LineTo { x: 10.5, y: 0.0 });
        assert_eq!(desc.commands[3], PathCmd::Close);
        assert_eq!(bez_path_from_desc(&desc), path);
    }
}
