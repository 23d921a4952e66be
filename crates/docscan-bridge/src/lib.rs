// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-bridge — Native platform bridge abstractions.
//
// Defines the camera and storage traits the scanner talks to, a stub for
// builds with no camera, and a desktop implementation backed by files.

pub mod desktop;
pub mod stub;
pub mod traits;

pub use desktop::{DesktopBridge, DirectoryStore, FrameCamera};
pub use stub::StubBridge;
pub use traits::{ImageStore, PlatformBridge, StillCamera, StillImage};
