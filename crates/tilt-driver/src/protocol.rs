//! Read-until-quiet command framing.
//!
//! The device does not delimit the end of a response; it simply stops
//! sending. Completion is therefore inferred from silence: the first
//! read waits the full caller-supplied timeout (the device may need
//! noticeable time to start replying, e.g. after a motor move), every
//! subsequent read waits only a short quiet period, and the first
//! timeout ends the response.
//!
//! A long timeout alone would hang on commands that answer with one
//! short line; a short timeout alone would truncate the multi-line
//! position/EEPROM bursts. The two-window split satisfies both.
//!
//! `send` holds the transport lock for its whole duration, so
//! concurrent callers serialize in arrival order and can never
//! interleave bytes on the wire. There is no mid-flight cancellation:
//! once the command line has been written the device has received it
//! and will act on it, so the only cancellation point is before the
//! lock is acquired.

use std::time::Duration;

use tokio::sync::Mutex;

use tilt_core::serial::DynSerial;
use tilt_core::{DeviceEvent, EventBus, TiltError, TiltResult};

use crate::transport::{ReadOutcome, Transport};

/// Synthetic single-line batch returned when no port is open.
pub const NOT_CONNECTED_RESPONSE: &str = "[ERROR] Not connected to tilt device.";
/// Synthetic single-line batch returned when the device never replied.
pub const TIMEOUT_RESPONSE: &str = "[TIMEOUT] No response from device.";

/// Command/response engine over one [`Transport`].
pub struct Protocol {
    transport: Mutex<Transport>,
    events: EventBus,
}

impl Protocol {
    pub fn new(events: EventBus) -> Self {
        Self {
            transport: Mutex::new(Transport::new(events.clone())),
            events,
        }
    }

    /// A protocol over an arbitrary I/O stream, for tests and device
    /// simulators.
    pub fn with_io(io: DynSerial, events: EventBus) -> Self {
        Self {
            transport: Mutex::new(Transport::with_io(io, events.clone())),
            events,
        }
    }

    pub async fn connect(&self, port: &str, baud: u32) -> TiltResult<()> {
        self.transport.lock().await.connect(port, baud).await
    }

    pub async fn disconnect(&self) {
        self.transport.lock().await.disconnect().await;
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    /// Port name and baud of the live connection, if any.
    pub async fn connection_identity(&self) -> Option<(String, u32)> {
        let transport = self.transport.lock().await;
        transport
            .is_connected()
            .then(|| (transport.connected_port().to_string(), transport.connected_baud()))
    }

    /// Send one command and collect every response line until the
    /// device goes quiet.
    ///
    /// Never returns an empty batch and never fails: a closed port
    /// yields a single [`NOT_CONNECTED_RESPONSE`] line, a silent
    /// device a single [`TIMEOUT_RESPONSE`] line, and a hard I/O
    /// failure disconnects the transport, publishes an error event and
    /// yields a synthetic `[ERROR]` line.
    pub async fn send(&self, command: &str, timeout: Duration, quiet: Duration) -> Vec<String> {
        let mut transport = self.transport.lock().await;

        if !transport.is_connected() {
            return vec![NOT_CONNECTED_RESPONSE.to_string()];
        }

        // A prior command's straggling bytes must not contaminate this
        // response.
        transport.drain_input().await;

        tracing::debug!(command, "sending");
        if let Err(e) = transport.write_line(command).await {
            return vec![self.fail(&mut transport, e).await];
        }

        let mut lines: Vec<String> = Vec::new();
        let mut window = timeout;
        loop {
            match transport.read_line(window).await {
                Ok(ReadOutcome::Line(line)) => {
                    if !line.is_empty() {
                        tracing::trace!(line = %line, "received");
                        self.events.publish(DeviceEvent::LineReceived(line.clone()));
                        lines.push(line);
                    }
                    window = quiet;
                }
                Ok(ReadOutcome::TimedOut) => break,
                Err(e) => {
                    lines.push(self.fail(&mut transport, e).await);
                    break;
                }
            }
        }

        if lines.is_empty() {
            vec![TIMEOUT_RESPONSE.to_string()]
        } else {
            lines
        }
    }

    /// Hard transport failure: tear down the connection, notify, and
    /// produce the synthetic error line.
    async fn fail(&self, transport: &mut Transport, error: TiltError) -> String {
        tracing::warn!(error = %error, "transport failure, disconnecting");
        self.events.publish(DeviceEvent::Error(error.to_string()));
        transport.disconnect().await;
        format!("[ERROR] {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    const TIMEOUT: Duration = Duration::from_millis(500);
    const QUIET: Duration = Duration::from_millis(50);

    fn mock_protocol() -> (tokio::io::DuplexStream, Protocol, EventBus) {
        let (host, device) = tokio::io::duplex(1024);
        let events = EventBus::new(32);
        let protocol = Protocol::with_io(Box::new(device), events.clone());
        (host, protocol, events)
    }

    /// Reads one command line from the host side, then writes the given
    /// response lines and keeps the port open.
    fn scripted_reply(host: tokio::io::DuplexStream, reply: &'static [&'static str]) {
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(host);
            let mut lines = BufReader::new(read).lines();
            if let Ok(Some(_cmd)) = lines.next_line().await {
                for line in reply {
                    write.write_all(line.as_bytes()).await.unwrap();
                    write.write_all(b"\n").await.unwrap();
                }
            }
            // Keep our side open so the protocol sees silence, not EOF.
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
    }

    #[tokio::test]
    async fn not_connected_yields_synthetic_line() {
        let protocol = Protocol::new(EventBus::new(4));
        let batch = protocol.send("cp", TIMEOUT, QUIET).await;
        assert_eq!(batch, vec![NOT_CONNECTED_RESPONSE.to_string()]);
    }

    #[tokio::test]
    async fn single_line_response() {
        let (host, protocol, _events) = mock_protocol();
        scripted_reply(host, &["All positions reset to 0"]);

        let batch = protocol.send("zr", TIMEOUT, QUIET).await;
        assert_eq!(batch, vec!["All positions reset to 0".to_string()]);
    }

    #[tokio::test]
    async fn multi_line_burst_is_collected_in_order() {
        let (host, protocol, _events) = mock_protocol();
        scripted_reply(
            host,
            &[
                "***Get Current Positions***",
                "120",
                "-45",
                "300",
                "10",
                "***End Current Positions***",
            ],
        );

        let batch = protocol.send("cp", TIMEOUT, QUIET).await;
        assert_eq!(batch.len(), 6);
        assert_eq!(batch[0], "***Get Current Positions***");
        assert_eq!(batch[5], "***End Current Positions***");
    }

    #[tokio::test]
    async fn blank_lines_are_dropped() {
        let (host, protocol, _events) = mock_protocol();
        scripted_reply(host, &["", "ok", "  "]);

        let batch = protocol.send("up", TIMEOUT, QUIET).await;
        assert_eq!(batch, vec!["ok".to_string()]);
    }

    #[tokio::test]
    async fn silent_device_yields_timeout_line() {
        let (host, protocol, _events) = mock_protocol();
        // Swallow the command but never answer; keep the port open.
        tokio::spawn(async move {
            let (read, _write) = tokio::io::split(host);
            let mut lines = BufReader::new(read).lines();
            let _ = lines.next_line().await;
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let batch = protocol.send("cp", TIMEOUT, QUIET).await;
        assert_eq!(batch, vec![TIMEOUT_RESPONSE.to_string()]);
    }

    #[tokio::test]
    async fn stale_input_is_drained_before_send() {
        let (mut host, protocol, _events) = mock_protocol();
        host.write_all(b"straggler from last command\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        scripted_reply(host, &["fresh"]);

        let batch = protocol.send("cp", TIMEOUT, QUIET).await;
        assert_eq!(batch, vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn device_loss_disconnects_and_reports() {
        let (host, protocol, events) = mock_protocol();
        let mut rx = events.subscribe();
        drop(host); // cable pulled

        let batch = protocol.send("cp", TIMEOUT, QUIET).await;
        assert_eq!(batch.len(), 1);
        assert!(batch[0].starts_with("[ERROR]"), "got {:?}", batch[0]);
        assert!(!protocol.is_connected().await);

        // Error event, then the disconnect transition.
        assert!(matches!(rx.recv().await.unwrap(), DeviceEvent::Error(_)));
        assert_eq!(rx.recv().await.unwrap(), DeviceEvent::ConnectionChanged(false));
    }

    #[tokio::test]
    async fn response_lines_are_published_as_events() {
        let (host, protocol, events) = mock_protocol();
        let mut rx = events.subscribe();
        scripted_reply(host, &["FW: 7.2.1"]);

        let _ = protocol.send("fv", TIMEOUT, QUIET).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            DeviceEvent::LineReceived("FW: 7.2.1".to_string())
        );
    }
}
