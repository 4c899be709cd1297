// SPDX-License-Identifier: MPL-2.0

//! Collaborators at the edge of the device
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Frame pipeline               │
//! └───────────▲─────────────────────▲────────────┘
//!             │ bytes               │ commands
//! ┌───────────┴──────────┐ ┌────────┴───────────┐
//! │ Camera (HTTP MJPEG)  │ │ Control (multicast)│
//! └──────────────────────┘ └────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: HTTP transport and multipart frame extraction
//! - [`control`]: Recorder commands received over the control session

pub mod camera;
pub mod control;
