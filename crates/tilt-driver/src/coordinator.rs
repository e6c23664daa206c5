//! Shared connection coordinator.
//!
//! One `Coordinator` is constructed at process start and cloned (as an
//! `Arc`) into every consumer that needs device access. All connect,
//! disconnect and send calls from any surface go through this one
//! instance, so two independent views of the device can never diverge
//! in believed connection state. State transitions are observed
//! through the event bus, never polled.
//!
//! The coordinator also owns the last-known position snapshot. The
//! snapshot only changes when a well-formed position block arrives,
//! and resets to unknown when the connection goes away.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use tilt_core::serial::DynSerial;
use tilt_core::{DeviceEvent, EventBus, Settings};

use crate::command::{Command, Corner, Direction, Motor};
use crate::orientation::Orientation;
use crate::protocol::Protocol;
use crate::response::{parse_batch, EepromValues, ParsedResponse, PositionSnapshot};

/// Response lines plus the structured data extracted from them.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// Every line the device sent, in arrival order; never empty.
    pub lines: Vec<String>,
    /// Structured signals found in those lines.
    pub parsed: ParsedResponse,
}

/// The single shared owner of the protocol/transport pair.
pub struct Coordinator {
    protocol: Protocol,
    events: EventBus,
    settings: RwLock<Settings>,
    positions: Mutex<PositionSnapshot>,
    eeprom: Mutex<Option<EepromValues>>,
}

impl Coordinator {
    /// Build the shared coordinator. Call once at process start and
    /// clone the `Arc` into every consumer.
    pub fn new(settings: Settings) -> Arc<Self> {
        let events = EventBus::default();
        Arc::new(Self {
            protocol: Protocol::new(events.clone()),
            events,
            settings: RwLock::new(settings),
            positions: Mutex::new(PositionSnapshot::default()),
            eeprom: Mutex::new(None),
        })
    }

    /// A coordinator over an arbitrary I/O stream, for tests and
    /// device simulators.
    pub fn with_io(settings: Settings, io: DynSerial) -> Arc<Self> {
        let events = EventBus::default();
        Arc::new(Self {
            protocol: Protocol::with_io(io, events.clone()),
            events,
            settings: RwLock::new(settings),
            positions: Mutex::new(PositionSnapshot::default()),
            eeprom: Mutex::new(None),
        })
    }

    /// Subscribe to connection, error and traffic events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Mutate the shared settings in place.
    pub fn update_settings(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings.write());
    }

    /// Open the port. Returns `true` on success; failures are reported
    /// through the event bus, never raised.
    pub async fn connect(&self, port: &str, baud: u32) -> bool {
        *self.positions.lock() = PositionSnapshot::default();
        match self.protocol.connect(port, baud).await {
            Ok(()) => {
                let mut settings = self.settings.write();
                settings.selected_port = port.to_string();
                let _ = settings.set_baud_rate(baud);
                true
            }
            Err(_) => false,
        }
    }

    /// Close the port and forget the last-known positions.
    pub async fn disconnect(&self) {
        self.protocol.disconnect().await;
        *self.positions.lock() = PositionSnapshot::default();
    }

    pub async fn is_connected(&self) -> bool {
        self.protocol.is_connected().await
    }

    /// Port name and baud of the live connection, if any.
    pub async fn connection_identity(&self) -> Option<(String, u32)> {
        self.protocol.connection_identity().await
    }

    /// Send a typed command.
    pub async fn send(&self, command: Command) -> CommandOutcome {
        self.send_raw(&command.to_wire()).await
    }

    /// Send raw command text (diagnostic escape hatch).
    pub async fn send_raw(&self, text: &str) -> CommandOutcome {
        let (timeout, quiet) = {
            let settings = self.settings.read();
            (
                Duration::from_millis(settings.command_timeout_ms),
                Duration::from_millis(settings.quiet_period_ms),
            )
        };

        let lines = self.protocol.send(text, timeout, quiet).await;
        let parsed = parse_batch(&lines);
        self.absorb(&parsed);

        // A hard I/O failure mid-exchange tears the connection down;
        // the cached positions are stale at that point.
        if !self.protocol.is_connected().await {
            *self.positions.lock() = PositionSnapshot::default();
        }

        CommandOutcome { lines, parsed }
    }

    /// Fold structured response data into the shared state.
    fn absorb(&self, parsed: &ParsedResponse) {
        if let Some(snapshot) = &parsed.positions {
            *self.positions.lock() = snapshot.clone();
        }
        if let Some(eeprom) = &parsed.eeprom {
            *self.eeprom.lock() = Some(eeprom.clone());
            let mut settings = self.settings.write();
            if let Some(speed) = eeprom.speed {
                settings.set_motor_speed(speed);
            }
            if let Some(max_speed) = eeprom.max_speed {
                settings.set_motor_max_speed(max_speed);
            }
            if let Some(acceleration) = eeprom.acceleration {
                settings.set_motor_acceleration(acceleration);
            }
            if let Some(orientation) = eeprom.orientation {
                let _ = settings.set_orientation(orientation);
            }
        }
    }

    /// Mounting orientation as currently configured. Read fresh on
    /// every remap; a second surface may change it between calls.
    pub fn orientation(&self) -> Orientation {
        Orientation::from_code(self.settings.read().orientation)
            .unwrap_or(Orientation::Normal)
    }

    /// Tilt in a screen-relative direction; the logical direction is
    /// remapped to the physical motors for the current orientation.
    pub async fn tilt(&self, direction: Direction, steps: i32) -> CommandOutcome {
        let physical = direction.rotated(self.orientation());
        self.send(Command::DirectionalTilt(physical, steps)).await
    }

    /// Tilt a screen-relative corner, remapped like [`Self::tilt`].
    pub async fn tilt_corner(&self, corner: Corner, steps: i32) -> CommandOutcome {
        let physical = corner.rotated(self.orientation());
        self.send(Command::CornerTilt(physical, steps)).await
    }

    /// Move all four motors the same direction.
    pub async fn backfocus(&self, steps: i32) -> CommandOutcome {
        self.send(Command::Backfocus(steps)).await
    }

    /// Zero/reset all axes.
    pub async fn zero(&self) -> CommandOutcome {
        self.send(Command::Zero).await
    }

    /// Query the device and return the refreshed physical snapshot.
    pub async fn refresh_positions(&self) -> PositionSnapshot {
        self.send(Command::QueryPositions).await;
        self.positions()
    }

    /// Query the device's persisted values. Motor configuration and
    /// orientation from the reply are folded into the settings.
    pub async fn load_eeprom(&self) -> Option<EepromValues> {
        self.send(Command::QueryEeprom).await.parsed.eeprom
    }

    /// Persist current positions to device non-volatile storage.
    pub async fn save_to_eeprom(&self) -> CommandOutcome {
        self.send(Command::SavePositions).await
    }

    /// Query the firmware version.
    pub async fn firmware_version(&self) -> Option<String> {
        self.send(Command::QueryFirmwareVersion).await.parsed.firmware
    }

    pub async fn set_speed(&self, value: u32) -> CommandOutcome {
        self.settings.write().set_motor_speed(value);
        self.send(Command::SetSpeed(value)).await
    }

    pub async fn set_max_speed(&self, value: u32) -> CommandOutcome {
        self.settings.write().set_motor_max_speed(value);
        self.send(Command::SetMaxSpeed(value)).await
    }

    pub async fn set_acceleration(&self, value: u32) -> CommandOutcome {
        self.settings.write().set_motor_acceleration(value);
        self.send(Command::SetAcceleration(value)).await
    }

    /// Store a new mounting orientation on the device and in settings.
    pub async fn set_orientation(&self, orientation: Orientation) -> CommandOutcome {
        let _ = self.settings.write().set_orientation(orientation.code());
        self.send(Command::SetOrientation(orientation)).await
    }

    /// Force-set a single motor's absolute position.
    pub async fn set_motor_position(&self, motor: Motor, position: i32) -> CommandOutcome {
        self.send(Command::SetMotorPosition(motor, position)).await
    }

    /// Last-known positions in physical motor order.
    pub fn positions(&self) -> PositionSnapshot {
        self.positions.lock().clone()
    }

    /// Last-known positions relabelled into logical screen corners for
    /// the current orientation.
    pub fn logical_positions(&self) -> PositionSnapshot {
        let physical = self.positions();
        let orientation = self.orientation();
        let mut logical = PositionSnapshot::default();

        for corner in Corner::ALL {
            let value = match corner {
                Corner::TopLeft => physical.tl.clone(),
                Corner::TopRight => physical.tr.clone(),
                Corner::BottomLeft => physical.bl.clone(),
                Corner::BottomRight => physical.br.clone(),
            };
            // A reading at physical `corner` belongs at the logical
            // corner that maps onto it.
            match corner.unrotated(orientation) {
                Corner::TopLeft => logical.tl = value,
                Corner::TopRight => logical.tr = value,
                Corner::BottomLeft => logical.bl = value,
                Corner::BottomRight => logical.br = value,
            }
        }

        logical
    }

    /// Last EEPROM values seen, if any.
    pub fn eeprom(&self) -> Option<EepromValues> {
        self.eeprom.lock().clone()
    }
}
