// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_imaging_ref --heading-base-level=0

//! Understory Imaging Reference Backend.
//!
//! This crate provides a small, stateful implementation of
//! [`ImagingBackend`] and [`ResourceBackend`]
//! for **IR recording and state tracing**, plus [`RefDevice`], a
//! [`GraphicsDevice`](understory_imaging::GraphicsDevice) wrapper around it
//! whose lifecycle failures can be scripted.
//!
//! It is intentionally *not* a “reference renderer”:
//! - It does **not** rasterize to pixels.
//! - It does **not** establish “golden” rendering behavior across backends.
//! - It is intended primarily for tests and debugging that want to assert on
//!   emitted ops and the imaging state at the time each op is applied.

#![no_std]

extern crate alloc;

mod device;

pub use device::{DeviceEvent, RefDevice};

use alloc::vec::Vec;

use understory_imaging::{
    Affine, ClipRect, DrawOp, FillRule, ImageDesc, ImageId, ImagingBackend, ImagingOp, PaintDesc,
    PaintId, PathDesc, PathId, ResourceBackend, StateOp, StrokeStyle,
};

/// Snapshot of the current imaging state inside the backend.
#[derive(Clone, Debug)]
pub struct StateSnapshot {
    /// Current transform.
    pub transform: Affine,
    /// Number of active clips on the clip stack.
    pub clip_depth: u32,
    /// The most recently pushed clip, if any.
    pub clip_top: Option<ClipRect>,
    /// Current paint, if set.
    pub paint: Option<PaintId>,
    /// Current stroke style, if set.
    pub stroke: Option<StrokeStyle>,
    /// Current fill rule used for filling paths.
    pub fill_rule: FillRule,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            clip_depth: 0,
            clip_top: None,
            paint: None,
            stroke: None,
            fill_rule: FillRule::NonZero,
        }
    }
}

/// Event recorded by the reference backend.
#[derive(Clone, Debug)]
pub enum Event {
    /// State operation and the resulting state snapshot.
    State {
        /// State operation that was applied.
        op: StateOp,
        /// Snapshot after applying the state operation.
        state: StateSnapshot,
    },
    /// Draw operation and the state snapshot used for drawing.
    Draw {
        /// Draw operation that was applied.
        op: DrawOp,
        /// Snapshot at the time of drawing.
        state: StateSnapshot,
    },
}

/// Simple reference implementation of the imaging backend.
///
/// This backend:
/// - Stores resource descriptors in vectors keyed by their IDs,
/// - Tracks current imaging state,
/// - Records high-level [`Event`]s as state and draw operations are applied.
#[derive(Default, Debug)]
pub struct RefBackend {
    paths: Vec<Option<PathDesc>>,
    images: Vec<Option<(ImageDesc, Vec<u8>)>>,
    paints: Vec<Option<PaintDesc>>,

    /// Log of events in the order they were applied.
    events: Vec<Event>,
    /// Underlying imaging ops.
    ops: Vec<ImagingOp>,
    /// Current imaging state.
    state: StateSnapshot,
    clip_stack: Vec<ClipRect>,
}

impl RefBackend {
    /// Returns a slice of recorded events.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Returns a slice of raw imaging operations.
    pub fn ops(&self) -> &[ImagingOp] {
        &self.ops
    }

    /// Iterate over the recorded draw operations only.
    pub fn draw_ops(&self) -> impl Iterator<Item = &DrawOp> + '_ {
        self.ops.iter().filter_map(|op| match op {
            ImagingOp::Draw(d) => Some(d),
            ImagingOp::State(_) => None,
        })
    }

    /// Clears all recorded events and ops but keeps resources.
    pub fn clear_events(&mut self) {
        self.events.clear();
        self.ops.clear();
    }

    /// Drops every resource and resets the imaging state, as a device reset would.
    ///
    /// IDs handed out afterwards start from zero again.
    pub fn clear_resources(&mut self) {
        self.paths.clear();
        self.images.clear();
        self.paints.clear();
        self.state = StateSnapshot::default();
        self.clip_stack.clear();
    }

    /// Returns the descriptor of a live path.
    pub fn path(&self, id: PathId) -> Option<&PathDesc> {
        self.paths.get(id.0 as usize)?.as_ref()
    }

    /// Returns the descriptor of a live paint.
    pub fn paint(&self, id: PaintId) -> Option<&PaintDesc> {
        self.paints.get(id.0 as usize)?.as_ref()
    }

    /// Returns the descriptor and pixels of a live image.
    pub fn image(&self, id: ImageId) -> Option<&(ImageDesc, Vec<u8>)> {
        self.images.get(id.0 as usize)?.as_ref()
    }

    /// Mutable access to the pixels of a live image.
    pub fn image_mut(&mut self, id: ImageId) -> Option<&mut (ImageDesc, Vec<u8>)> {
        self.images.get_mut(id.0 as usize)?.as_mut()
    }

    /// Number of paths that are currently alive.
    pub fn live_paths(&self) -> usize {
        self.paths.iter().filter(|p| p.is_some()).count()
    }

    /// Number of paints that are currently alive.
    pub fn live_paints(&self) -> usize {
        self.paints.iter().filter(|p| p.is_some()).count()
    }

    /// Number of paths created since the last resource reset, including destroyed ones.
    pub fn paths_created(&self) -> usize {
        self.paths.len()
    }

    /// Current imaging state.
    pub fn current_state(&self) -> &StateSnapshot {
        &self.state
    }

    fn sync_clip_state(&mut self) {
        self.state.clip_depth = u32::try_from(self.clip_stack.len())
            .expect("RefBackend: too many clip stack entries for u32");
        self.state.clip_top = self.clip_stack.last().copied();
    }
}

impl ResourceBackend for RefBackend {
    fn create_path(&mut self, desc: PathDesc) -> PathId {
        let id =
            u32::try_from(self.paths.len()).expect("RefBackend: too many paths for u32 PathId");
        self.paths.push(Some(desc));
        PathId(id)
    }

    fn destroy_path(&mut self, id: PathId) {
        let idx = id.0 as usize;
        if let Some(slot) = self.paths.get_mut(idx) {
            *slot = None;
        }
    }

    fn create_image(&mut self, desc: ImageDesc, pixels: &[u8]) -> ImageId {
        let id =
            u32::try_from(self.images.len()).expect("RefBackend: too many images for u32 ImageId");
        self.images.push(Some((desc, pixels.to_vec())));
        ImageId(id)
    }

    fn destroy_image(&mut self, id: ImageId) {
        let idx = id.0 as usize;
        if let Some(slot) = self.images.get_mut(idx) {
            *slot = None;
        }
    }

    fn create_paint(&mut self, desc: PaintDesc) -> PaintId {
        let id =
            u32::try_from(self.paints.len()).expect("RefBackend: too many paints for u32 PaintId");
        self.paints.push(Some(desc));
        PaintId(id)
    }

    fn destroy_paint(&mut self, id: PaintId) {
        let idx = id.0 as usize;
        if let Some(slot) = self.paints.get_mut(idx) {
            *slot = None;
        }
    }
}

impl ImagingBackend for RefBackend {
    fn state(&mut self, op: StateOp) {
        match &op {
            StateOp::SetTransform(tx) => self.state.transform = *tx,
            StateOp::PushClip(clip) => {
                self.clip_stack.push(*clip);
                self.sync_clip_state();
            }
            StateOp::PopClip => {
                self.clip_stack.pop();
                self.sync_clip_state();
            }
            StateOp::SetPaint(id) => self.state.paint = Some(*id),
            StateOp::SetStroke(style) => self.state.stroke = Some(style.clone()),
            StateOp::SetFillRule(rule) => self.state.fill_rule = *rule,
        }

        self.ops.push(ImagingOp::State(op.clone()));
        self.events.push(Event::State {
            op,
            state: self.state.clone(),
        });
    }

    fn draw(&mut self, op: DrawOp) {
        self.ops.push(ImagingOp::Draw(op.clone()));
        self.events.push(Event::Draw {
            op,
            state: self.state.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use peniko::{Brush, Color};
    use understory_imaging::{ImageDesc, PaintDesc, PathCmd, RectF, StateOp};

    #[test]
    fn basic_state_and_draw() {
        let mut backend = RefBackend::default();

        let paint = backend.create_paint(PaintDesc {
            brush: Brush::Solid(Color::WHITE),
        });
        let path = backend.create_path(PathDesc {
            commands: vec![PathCmd::MoveTo { x: 0.0, y: 0.0 }].into_boxed_slice(),
        });

        backend.state(StateOp::SetPaint(paint));
        backend.draw(DrawOp::FillPath(path));

        assert_eq!(backend.events().len(), 2);
        assert_eq!(backend.ops().len(), 2);
        assert_eq!(backend.draw_ops().count(), 1);
    }

    #[test]
    fn state_snapshot_tracks_clips() {
        let mut backend = RefBackend::default();
        let outer = ClipRect::aliased(RectF::new(0.0, 0.0, 10.0, 10.0));
        let inner = ClipRect::aliased(RectF::new(2.0, 2.0, 4.0, 4.0));

        backend.state(StateOp::SetTransform(Affine::scale(2.0)));
        backend.state(StateOp::PushClip(outer));
        backend.state(StateOp::PushClip(inner));

        let Some(Event::State { state, .. }) = backend.events().last() else {
            panic!("expected final event to be State");
        };
        assert_eq!(state.transform, Affine::scale(2.0));
        assert_eq!(state.clip_depth, 2);
        assert_eq!(state.clip_top, Some(inner));

        backend.state(StateOp::PopClip);
        assert_eq!(backend.current_state().clip_top, Some(outer));
    }

    #[test]
    fn clear_events_keeps_resources_usable() {
        let mut backend = RefBackend::default();

        let paint = backend.create_paint(PaintDesc {
            brush: Brush::Solid(Color::WHITE),
        });
        let path = backend.create_path(PathDesc {
            commands: vec![PathCmd::MoveTo { x: 0.0, y: 0.0 }].into_boxed_slice(),
        });

        backend.state(StateOp::SetPaint(paint));
        backend.draw(DrawOp::FillPath(path));
        backend.clear_events();
        assert!(backend.events().is_empty());
        assert!(backend.ops().is_empty());

        backend.state(StateOp::SetPaint(paint));
        backend.draw(DrawOp::FillPath(path));
        assert_eq!(backend.events().len(), 2);
        assert!(backend.path(path).is_some());
    }

    #[test]
    fn resource_destroy_is_tolerant() {
        let mut backend = RefBackend::default();

        let path = backend.create_path(PathDesc {
            commands: vec![PathCmd::MoveTo { x: 0.0, y: 0.0 }].into_boxed_slice(),
        });
        let img = backend.create_image(ImageDesc::rgba8(1, 1), &[0_u8, 0, 0, 0]);
        let paint = backend.create_paint(PaintDesc {
            brush: Brush::Solid(Color::WHITE),
        });

        backend.destroy_path(path);
        backend.destroy_image(img);
        backend.destroy_paint(paint);
        assert_eq!(backend.live_paths(), 0);
        assert_eq!(backend.live_paints(), 0);
        assert_eq!(backend.paths_created(), 1);

        // Double-destroy should not panic.
        backend.destroy_path(path);
        backend.destroy_image(img);
        backend.destroy_paint(paint);
    }

    #[test]
    fn clear_resources_restarts_ids() {
        let mut backend = RefBackend::default();
        let first = backend.create_paint(PaintDesc {
            brush: Brush::Solid(Color::WHITE),
        });
        backend.clear_resources();
        let second = backend.create_paint(PaintDesc {
            brush: Brush::Solid(Color::BLACK),
        });
        assert_eq!(first, second);
        assert_eq!(backend.live_paints(), 1);
    }
}
