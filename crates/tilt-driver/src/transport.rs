//! Serial transport: port lifecycle and raw line primitives.
//!
//! The transport owns the physical port handle and nothing else
//! touches it. The device (an Arduino-class board) reboots when the
//! DTR line toggles on open, so `connect` pulses the control line
//! deliberately, waits out the boot, and discards the banner before
//! reporting the connection ready.
//!
//! All transport methods take `&mut self`; the protocol layer keeps
//! the transport behind a single async mutex so a complete
//! write-then-read exchange is never interleaved with another.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::sleep;
use tokio_serial::SerialPort;

use tilt_core::serial::{drain_serial_buffer, open_serial_async, DynSerial};
use tilt_core::{DeviceEvent, EventBus, TiltError, TiltResult};

/// Settle window after open; the device runs its boot sequence and
/// prints a banner during this time.
const DEVICE_SETTLE: Duration = Duration::from_secs(2);

/// Hold time of the reset pulse on the control line.
const RESET_PULSE: Duration = Duration::from_millis(2);

/// Outcome of a single line read.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A line arrived; already trimmed, may be empty.
    Line(String),
    /// No line terminator arrived within the window. Not an error:
    /// the device signals end-of-response with silence.
    TimedOut,
}

/// Owns the serial port handle and the connection identity.
pub struct Transport {
    io: Option<BufReader<DynSerial>>,
    port_name: String,
    baud: u32,
    events: EventBus,
}

impl Transport {
    /// A transport with no open port.
    pub fn new(events: EventBus) -> Self {
        Self {
            io: None,
            port_name: String::new(),
            baud: 0,
            events,
        }
    }

    /// A transport already "connected" to an arbitrary I/O stream.
    ///
    /// Used by tests and device simulators in place of real hardware;
    /// no reset pulse or settle delay is applied.
    pub fn with_io(io: DynSerial, events: EventBus) -> Self {
        Self {
            io: Some(BufReader::new(io)),
            port_name: "mock".to_string(),
            baud: 0,
            events,
        }
    }

    /// Open `port` at `baud` with 8N1 framing and no handshake.
    ///
    /// Any existing connection is closed first, so reconnecting is
    /// idempotent. On failure an error event and a
    /// `ConnectionChanged(false)` event are published and
    /// [`TiltError::Connection`] is returned.
    pub async fn connect(&mut self, port: &str, baud: u32) -> TiltResult<()> {
        self.disconnect().await;

        match self.open(port, baud).await {
            Ok(()) => {
                tracing::info!(port, baud, "connected to tilt device");
                self.events.publish(DeviceEvent::ConnectionChanged(true));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(port, baud, error = %e, "connection failed");
                self.events.publish(DeviceEvent::Error(e.to_string()));
                self.events.publish(DeviceEvent::ConnectionChanged(false));
                Err(e)
            }
        }
    }

    async fn open(&mut self, port: &str, baud: u32) -> TiltResult<()> {
        let mut stream = open_serial_async(port, baud).await?;

        // The board resets when DTR toggles; pulse it deliberately so
        // every connect starts from a known firmware state.
        stream
            .write_data_terminal_ready(false)
            .map_err(|e| TiltError::Connection(e.to_string()))?;
        sleep(RESET_PULSE).await;
        stream
            .write_data_terminal_ready(true)
            .map_err(|e| TiltError::Connection(e.to_string()))?;

        // Let the boot sequence finish, then throw away the banner.
        sleep(DEVICE_SETTLE).await;
        let mut io = BufReader::new(Box::new(stream) as DynSerial);
        let discarded = drain_serial_buffer(&mut io, 50).await;
        if discarded > 0 {
            tracing::debug!(discarded, "discarded boot banner bytes");
        }

        self.io = Some(io);
        self.port_name = port.to_string();
        self.baud = baud;
        Ok(())
    }

    /// Close the port. Safe to call when already closed; publishes
    /// `ConnectionChanged(false)` exactly once per successful open.
    pub async fn disconnect(&mut self) {
        if let Some(mut io) = self.io.take() {
            let _ = drain_serial_buffer(&mut io, 20).await;
            drop(io);
            self.port_name.clear();
            self.baud = 0;
            tracing::info!("disconnected from tilt device");
            self.events.publish(DeviceEvent::ConnectionChanged(false));
        }
    }

    pub fn is_connected(&self) -> bool {
        self.io.is_some()
    }

    /// Port name of the live connection, empty when closed.
    pub fn connected_port(&self) -> &str {
        &self.port_name
    }

    /// Baud rate of the live connection, 0 when closed.
    pub fn connected_baud(&self) -> u32 {
        self.baud
    }

    /// Discard any bytes sitting in the input buffer.
    pub async fn drain_input(&mut self) {
        if let Some(io) = self.io.as_mut() {
            let discarded = drain_serial_buffer(io, 20).await;
            if discarded > 0 {
                tracing::debug!(discarded, "discarded stray input bytes");
            }
        }
    }

    /// Write `text` followed by a line break.
    pub async fn write_line(&mut self, text: &str) -> TiltResult<()> {
        let io = self.io.as_mut().ok_or(TiltError::NotConnected)?;
        io.get_mut().write_all(text.trim().as_bytes()).await?;
        io.get_mut().write_all(b"\n").await?;
        io.get_mut().flush().await?;
        Ok(())
    }

    /// Read one line, waiting up to `timeout`.
    ///
    /// A timeout is a normal outcome, not an error. EOF means the
    /// device went away and is reported as an I/O error.
    pub async fn read_line(&mut self, timeout: Duration) -> TiltResult<ReadOutcome> {
        let io = self.io.as_mut().ok_or(TiltError::NotConnected)?;
        let mut buf = String::new();
        match tokio::time::timeout(timeout, io.read_line(&mut buf)).await {
            Ok(Ok(0)) => Err(TiltError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "serial port closed",
            ))),
            Ok(Ok(_)) => Ok(ReadOutcome::Line(buf.trim().to_string())),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(ReadOutcome::TimedOut),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn mock_transport() -> (tokio::io::DuplexStream, Transport, EventBus) {
        let (host, device) = tokio::io::duplex(256);
        let events = EventBus::new(16);
        let transport = Transport::with_io(Box::new(device), events.clone());
        (host, transport, events)
    }

    #[tokio::test]
    async fn write_line_appends_terminator() {
        let (mut host, mut transport, _events) = mock_transport();

        transport.write_line("tp,25").await.unwrap();

        let mut buf = [0u8; 16];
        let n = host.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"tp,25\n");
    }

    #[tokio::test]
    async fn read_line_trims_and_times_out() {
        let (mut host, mut transport, _events) = mock_transport();

        host.write_all(b"  hello \r\n").await.unwrap();
        match transport.read_line(Duration::from_millis(100)).await.unwrap() {
            ReadOutcome::Line(line) => assert_eq!(line, "hello"),
            other => panic!("expected line, got {:?}", other),
        }

        match transport.read_line(Duration::from_millis(30)).await.unwrap() {
            ReadOutcome::TimedOut => {}
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn eof_is_an_io_error() {
        let (host, mut transport, _events) = mock_transport();
        drop(host);

        let result = transport.read_line(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(TiltError::Io(_))));
    }

    #[tokio::test]
    async fn disconnect_clears_identity_and_publishes_once() {
        let (_host, mut transport, events) = mock_transport();
        let mut rx = events.subscribe();

        assert!(transport.is_connected());
        transport.disconnect().await;
        transport.disconnect().await; // no-op, no second event

        assert!(!transport.is_connected());
        assert_eq!(transport.connected_port(), "");
        assert_eq!(transport.connected_baud(), 0);

        assert_eq!(rx.recv().await.unwrap(), DeviceEvent::ConnectionChanged(false));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn io_after_disconnect_reports_not_connected() {
        let (_host, mut transport, _events) = mock_transport();
        transport.disconnect().await;

        assert!(matches!(
            transport.write_line("cp").await,
            Err(TiltError::NotConnected)
        ));
        assert!(matches!(
            transport.read_line(Duration::from_millis(10)).await,
            Err(TiltError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn drain_input_discards_stale_bytes() {
        let (mut host, mut transport, _events) = mock_transport();

        host.write_all(b"stale junk\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.drain_input().await;

        match transport.read_line(Duration::from_millis(30)).await.unwrap() {
            ReadOutcome::TimedOut => {}
            other => panic!("expected empty buffer, got {:?}", other),
        }
    }
}
