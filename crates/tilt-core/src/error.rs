//! Error types for the tilt control stack.
//!
//! One enum covers the whole stack. The split mirrors how failures are
//! actually handled:
//!
//! - `Connection` and `Io` end in a disconnected transport plus an
//!   error event; the caller may retry.
//! - `NotConnected` and `Config` are caller mistakes surfaced directly.
//!
//! Read timeouts are intentionally *not* represented here. The device
//! terminates its responses with silence, so a timed-out read is the
//! normal end-of-response condition and is handled inside the protocol
//! layer, never returned as an error.

use thiserror::Error;

/// Convenience alias for results using the stack-wide error type.
pub type TiltResult<T> = std::result::Result<T, TiltError>;

/// Primary error type for the tilt control stack.
#[derive(Error, Debug)]
pub enum TiltError {
    /// Opening the serial port failed (device absent, permission denied,
    /// port already in use). The transport stays disconnected.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// An operation that requires an open port was attempted while
    /// disconnected.
    #[error("Not connected to tilt device")]
    NotConnected,

    /// I/O failure on an established connection (cable pulled, device
    /// reset unexpectedly). The transport transitions to disconnected.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings value failed validation.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = TiltError::Connection("port busy".into());
        assert_eq!(err.to_string(), "Connection failed: port busy");
        assert_eq!(
            TiltError::NotConnected.to_string(),
            "Not connected to tilt device"
        );
    }

    #[test]
    fn io_error_converts() {
        fn fails() -> TiltResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"))?;
            Ok(())
        }
        assert!(matches!(fails(), Err(TiltError::Io(_))));
    }
}
