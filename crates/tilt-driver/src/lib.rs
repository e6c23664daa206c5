//! Serial command protocol driver for the ASG four-motor electronic
//! tilt platform.
//!
//! Protocol overview:
//! - Format: newline-terminated ASCII command/response
//! - Baud: 9600 default (up to 115200), 8N1, no flow control
//! - Commands: two-character opcode, optional signed argument
//!   (`tl,25`, `zr`, `cA,100`)
//! - Responses: a variable, unterminated number of lines; end of
//!   response is inferred from a quiet period, not a terminator
//! - Structured replies arrive as sentinel-delimited blocks
//!   (`***Get Current Positions***` .. `***End Current Positions***`)
//!
//! Layering, leaf-first: [`orientation`] and [`response`] are pure;
//! [`transport`] owns the port; [`protocol`] adds read-until-quiet
//! framing; [`coordinator`] is the single shared handle consumers
//! hold.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tilt_driver::{Coordinator, Direction};
//! use tilt_core::Settings;
//!
//! let coordinator = Coordinator::new(Settings::load());
//! if coordinator.connect("/dev/ttyUSB0", 9600).await {
//!     // Logical "top" is remapped for the mounting orientation.
//!     let outcome = coordinator.tilt(Direction::Top, 25).await;
//!     for line in &outcome.lines {
//!         println!("<< {line}");
//!     }
//! }
//! ```

pub mod command;
pub mod coordinator;
pub mod orientation;
pub mod protocol;
pub mod response;
pub mod transport;

pub use command::{Command, Corner, Direction, Motor};
pub use coordinator::{CommandOutcome, Coordinator};
pub use orientation::Orientation;
pub use response::{EepromValues, ParsedResponse, PositionSnapshot};
