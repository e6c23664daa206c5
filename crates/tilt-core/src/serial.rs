//! Async serial port abstractions.
//!
//! The device speaks a newline-terminated ASCII protocol, so everything
//! here is built around buffered line reading. Any type implementing
//! the async I/O traits can stand in for the hardware port, which is
//! how the tests drive the full stack over `tokio::io::duplex`.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Trait alias for async serial port I/O.
///
/// Satisfied by `tokio_serial::SerialStream` (real hardware) and
/// `tokio::io::DuplexStream` (tests).
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased boxed serial port.
pub type DynSerial = Box<dyn SerialPortIO>;

/// Baud rates the device firmware accepts.
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Whether `baud` is one of [`SUPPORTED_BAUD_RATES`].
pub fn is_supported_baud(baud: u32) -> bool {
    SUPPORTED_BAUD_RATES.contains(&baud)
}

/// Enumerate OS-visible serial ports, lexically sorted.
///
/// Returns an empty list if enumeration fails; callers treat "no ports"
/// and "cannot enumerate" the same way.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => {
            let mut names: Vec<String> =
                ports.into_iter().map(|p| p.port_name).collect();
            names.sort();
            names
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not enumerate serial ports");
            Vec::new()
        }
    }
}

/// Open a serial port asynchronously with the device's fixed framing:
/// 8 data bits, no parity, 1 stop bit, no hardware handshake.
///
/// The blocking open call runs under `spawn_blocking` so it cannot
/// stall the async runtime.
pub async fn open_serial_async(
    port_path: &str,
    baud_rate: u32,
) -> crate::TiltResult<tokio_serial::SerialStream> {
    use tokio::task::spawn_blocking;
    use tokio_serial::SerialPortBuilderExt;

    let path = port_path.to_string();
    spawn_blocking(move || {
        tokio_serial::new(&path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                crate::TiltError::Connection(format!("{}: {}", path, e))
            })
    })
    .await
    .map_err(|e| {
        crate::TiltError::Connection(format!("port open task failed: {}", e))
    })?
}

/// Read and discard whatever is sitting in the port's input buffer.
///
/// Used before sending a command (a prior command's straggling bytes
/// must not contaminate the next response) and after connect (the
/// device prints a boot banner when the control line toggles).
///
/// Returns the number of bytes discarded.
pub async fn drain_serial_buffer<R: AsyncRead + Unpin>(
    port: &mut R,
    timeout_ms: u64,
) -> usize {
    let mut discard = [0u8; 256];
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    let mut total = 0usize;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, port.read(&mut discard)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => total += n,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Ok(Err(_)) => break,
            Err(_) => break,
        }
    }

    total
}
