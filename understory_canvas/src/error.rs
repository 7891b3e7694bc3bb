// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use understory_imaging::DeviceError;

/// Errors surfaced by the canvas.
///
/// Device loss while acquiring a surface is not an error: the canvas
/// recovers from it by recreating its resources and skipping the frame.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CanvasError {
    /// The drawing surface or another device resource could not be created.
    #[error("resource creation failed")]
    ResourceCreation(#[source] DeviceError),
    /// A draw session could not be completed or presented.
    #[error("draw session failed")]
    DrawSession(#[source] DeviceError),
}
