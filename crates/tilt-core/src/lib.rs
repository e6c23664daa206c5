//! Core types and shared infrastructure for the ASG tilt platform stack.
//!
//! This crate carries everything the driver and any UI surface need to
//! agree on: the error taxonomy, async serial port abstractions, the
//! device event bus, and the persisted user settings. It deliberately
//! contains no device protocol knowledge; that lives in `tilt-driver`.

pub mod error;
pub mod events;
pub mod serial;
pub mod settings;

pub use error::{TiltError, TiltResult};
pub use events::{DeviceEvent, EventBus};
pub use settings::Settings;
