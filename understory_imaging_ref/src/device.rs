// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A scriptable [`GraphicsDevice`] over [`RefBackend`].

use alloc::vec::Vec;

use understory_imaging::{
    DeviceError, DrawOp, GraphicsDevice, ImageDesc, ImageId, ImagingBackend, PaintDesc, PaintId,
    PathDesc, PathId, PixelRect, ResourceBackend, StateOp, SurfaceOffset,
};

use crate::RefBackend;

/// Lifecycle call observed by a [`RefDevice`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    /// `initialize` succeeded.
    Initialized,
    /// `initialize` was called but left the device unready.
    InitializeFailed,
    /// `reset`.
    Reset,
    /// `trim`.
    Trimmed,
    /// `create_surface` with the given size.
    SurfaceCreated {
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
    /// `release_surface`.
    SurfaceReleased,
    /// `begin_draw` succeeded.
    BeginDraw,
    /// `begin_draw` reported a lost device.
    DeviceLost,
    /// `flush`.
    Flush,
    /// `copy_to_image`.
    Copy {
        /// Destination image.
        image: ImageId,
        /// Copied region.
        src: PixelRect,
    },
    /// `present`.
    Present,
}

/// Recording device for tests.
///
/// Draw operations go to an inner [`RefBackend`]; lifecycle calls are logged
/// as [`DeviceEvent`]s. Failures can be scripted with the `fail_*` and
/// [`lose_device`](Self::lose_device) knobs.
#[derive(Debug, Default)]
pub struct RefDevice {
    backend: RefBackend,
    ready: bool,
    surface: Option<(u32, u32)>,
    drawing: bool,
    log: Vec<DeviceEvent>,
    surface_offset: SurfaceOffset,
    lose_device: bool,
    /// When set, `initialize` leaves the device unready.
    pub fail_initialize: bool,
    /// When set, `create_surface` fails.
    pub fail_surface: bool,
    /// When set, `flush` fails.
    pub fail_flush: bool,
    /// When set, `copy_to_image` fails.
    pub fail_copy: bool,
    /// When set, `present` fails.
    pub fail_present: bool,
}

impl RefDevice {
    /// Create a device that has not been initialized yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an initialized device.
    pub fn ready() -> Self {
        let mut device = Self::new();
        device.initialize();
        device
    }

    /// The recording backend behind this device.
    pub fn backend(&self) -> &RefBackend {
        &self.backend
    }

    /// Mutable access to the recording backend, e.g. to clear its events.
    pub fn backend_mut(&mut self) -> &mut RefBackend {
        &mut self.backend
    }

    /// Lifecycle calls in the order they happened.
    pub fn log(&self) -> &[DeviceEvent] {
        &self.log
    }

    /// Forget lifecycle calls and recorded imaging events.
    pub fn clear_log(&mut self) {
        self.log.clear();
        self.backend.clear_events();
    }

    /// Make the next `begin_draw` report a lost device. The device becomes
    /// unready and drops its resources, as a removed adapter would.
    pub fn lose_device(&mut self) {
        self.lose_device = true;
    }

    /// Offset reported by `begin_draw`.
    pub fn set_surface_offset(&mut self, offset: SurfaceOffset) {
        self.surface_offset = offset;
    }

    /// Current surface size, if a surface exists.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface
    }

    /// Whether a draw session is open.
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Number of times the given event was logged.
    pub fn count(&self, event: &DeviceEvent) -> usize {
        self.log.iter().filter(|e| *e == event).count()
    }

    /// Number of presented frames.
    pub fn frames_presented(&self) -> usize {
        self.count(&DeviceEvent::Present)
    }
}

impl ResourceBackend for RefDevice {
    fn create_path(&mut self, desc: PathDesc) -> PathId {
        self.backend.create_path(desc)
    }

    fn destroy_path(&mut self, id: PathId) {
        self.backend.destroy_path(id);
    }

    fn create_image(&mut self, desc: ImageDesc, pixels: &[u8]) -> ImageId {
        self.backend.create_image(desc, pixels)
    }

    fn destroy_image(&mut self, id: ImageId) {
        self.backend.destroy_image(id);
    }

    fn create_paint(&mut self, desc: PaintDesc) -> PaintId {
        self.backend.create_paint(desc)
    }

    fn destroy_paint(&mut self, id: PaintId) {
        self.backend.destroy_paint(id);
    }
}

impl ImagingBackend for RefDevice {
    fn state(&mut self, op: StateOp) {
        self.backend.state(op);
    }

    fn draw(&mut self, op: DrawOp) {
        self.backend.draw(op);
    }
}

impl GraphicsDevice for RefDevice {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn initialize(&mut self) {
        if self.ready {
            return;
        }
        if self.fail_initialize {
            self.log.push(DeviceEvent::InitializeFailed);
            return;
        }
        self.ready = true;
        self.log.push(DeviceEvent::Initialized);
    }

    fn reset(&mut self) {
        self.ready = false;
        self.surface = None;
        self.drawing = false;
        self.backend.clear_resources();
        self.log.push(DeviceEvent::Reset);
    }

    fn trim(&mut self) {
        self.log.push(DeviceEvent::Trimmed);
    }

    fn create_surface(&mut self, width: u32, height: u32) -> Result<(), DeviceError> {
        if self.fail_surface || !self.ready {
            return Err(DeviceError::ResourceCreation("surface"));
        }
        self.surface = Some((width, height));
        self.log.push(DeviceEvent::SurfaceCreated { width, height });
        Ok(())
    }

    fn release_surface(&mut self) {
        if self.surface.take().is_some() {
            self.log.push(DeviceEvent::SurfaceReleased);
        }
        self.drawing = false;
    }

    fn begin_draw(&mut self) -> Result<SurfaceOffset, DeviceError> {
        if self.lose_device {
            self.lose_device = false;
            self.ready = false;
            self.surface = None;
            self.backend.clear_resources();
            self.log.push(DeviceEvent::DeviceLost);
            return Err(DeviceError::DeviceLost);
        }
        if self.surface.is_none() {
            return Err(DeviceError::Draw("no surface"));
        }
        self.drawing = true;
        self.log.push(DeviceEvent::BeginDraw);
        Ok(self.surface_offset)
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        self.log.push(DeviceEvent::Flush);
        if self.fail_flush {
            return Err(DeviceError::Draw("flush"));
        }
        Ok(())
    }

    fn copy_to_image(&mut self, image: ImageId, src: PixelRect) -> Result<(), DeviceError> {
        if self.fail_copy || self.backend.image(image).is_none() {
            return Err(DeviceError::Draw("copy"));
        }
        self.log.push(DeviceEvent::Copy { image, src });
        Ok(())
    }

    fn present(&mut self) -> Result<(), DeviceError> {
        self.drawing = false;
        if self.fail_present {
            return Err(DeviceError::Draw("present"));
        }
        self.log.push(DeviceEvent::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peniko::{Brush, Color};

    #[test]
    fn initialize_is_idempotent() {
        let mut device = RefDevice::new();
        device.initialize();
        device.initialize();
        assert!(device.is_ready());
        assert_eq!(device.count(&DeviceEvent::Initialized), 1);
    }

    #[test]
    fn failed_initialize_stays_unready() {
        let mut device = RefDevice::new();
        device.fail_initialize = true;
        device.initialize();
        assert!(!device.is_ready());
        assert_eq!(
            device.create_surface(4, 4),
            Err(DeviceError::ResourceCreation("surface"))
        );
    }

    #[test]
    fn lost_device_drops_resources_once() {
        let mut device = RefDevice::ready();
        device.create_surface(8, 8).unwrap();
        device.create_paint(PaintDesc {
            brush: Brush::Solid(Color::WHITE),
        });
        device.lose_device();

        assert_eq!(device.begin_draw(), Err(DeviceError::DeviceLost));
        assert!(!device.is_ready());
        assert_eq!(device.backend().live_paints(), 0);

        device.initialize();
        device.create_surface(8, 8).unwrap();
        assert_eq!(device.begin_draw(), Ok(SurfaceOffset::default()));
    }

    #[test]
    fn frame_sequence_is_logged() {
        let mut device = RefDevice::ready();
        device.create_surface(2, 2).unwrap();
        let image = device.create_image(ImageDesc::rgba8(2, 2), &[0; 16]);

        device.begin_draw().unwrap();
        device.flush().unwrap();
        device.copy_to_image(image, PixelRect::new(0, 0, 2, 2)).unwrap();
        device.present().unwrap();

        assert_eq!(
            &device.log()[2..],
            &[
                DeviceEvent::BeginDraw,
                DeviceEvent::Flush,
                DeviceEvent::Copy {
                    image,
                    src: PixelRect::new(0, 0, 2, 2)
                },
                DeviceEvent::Present,
            ]
        );
        assert_eq!(device.frames_presented(), 1);
    }
}
