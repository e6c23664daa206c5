//! Typed device commands and their wire serialization.
//!
//! The firmware accepts two-character opcodes with an optional signed
//! integer argument, `"<opcode>,<argument>"` or a bare opcode. Rather
//! than pass opcode strings around, every command is a variant of
//! [`Command`] and [`Command::to_wire`] is the single place wire text
//! is produced. A malformed opcode is therefore unrepresentable.

use std::fmt;
use std::str::FromStr;

use crate::orientation::Orientation;

/// Screen-relative tilt direction. A directional tilt drives all four
/// motors.
///
/// Declaration order is the clockwise ring used for orientation
/// remapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Top,
    Right,
    Bottom,
    Left,
}

impl Direction {
    pub const ALL: [Direction; 4] =
        [Direction::Top, Direction::Right, Direction::Bottom, Direction::Left];

    /// Wire opcode for this direction.
    pub fn opcode(self) -> &'static str {
        match self {
            Direction::Top => "tp",
            Direction::Right => "rt",
            Direction::Bottom => "bt",
            Direction::Left => "lt",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top" | "up" | "tp" => Ok(Direction::Top),
            "right" | "rt" => Ok(Direction::Right),
            "bottom" | "down" | "bt" => Ok(Direction::Bottom),
            "left" | "lt" => Ok(Direction::Left),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Screen-relative sensor corner. A corner tilt drives two motors in
/// opposition.
///
/// Declaration order is the clockwise ring used for orientation
/// remapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomRight,
        Corner::BottomLeft,
    ];

    /// Wire opcode for this corner.
    pub fn opcode(self) -> &'static str {
        match self {
            Corner::TopLeft => "tl",
            Corner::TopRight => "tr",
            Corner::BottomRight => "br",
            Corner::BottomLeft => "bl",
        }
    }
}

impl FromStr for Corner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "top-left" | "topleft" | "tl" => Ok(Corner::TopLeft),
            "top-right" | "topright" | "tr" => Ok(Corner::TopRight),
            "bottom-right" | "bottomright" | "br" => Ok(Corner::BottomRight),
            "bottom-left" | "bottomleft" | "bl" => Ok(Corner::BottomLeft),
            other => Err(format!("unknown corner '{}'", other)),
        }
    }
}

/// One of the four stepper motors, addressed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    M1,
    M2,
    M3,
    M4,
}

impl Motor {
    /// Wire opcode for force-setting this motor's absolute position.
    pub fn opcode(self) -> &'static str {
        match self {
            Motor::M1 => "m1",
            Motor::M2 => "m2",
            Motor::M3 => "m3",
            Motor::M4 => "m4",
        }
    }
}

/// A complete device command, one variant per opcode family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Paired corner tilt, two motors in opposition.
    CornerTilt(Corner, i32),
    /// Directional tilt, all four motors.
    DirectionalTilt(Direction, i32),
    /// Move all four motors the same direction (backfocus).
    Backfocus(i32),
    /// Zero/reset all axes.
    Zero,
    /// Query motor positions; the device answers with a position block.
    QueryPositions,
    /// Query persisted values; the device answers with an EEPROM block.
    QueryEeprom,
    /// Persist current positions to device non-volatile storage.
    SavePositions,
    /// Set motor speed.
    SetSpeed(u32),
    /// Set motor maximum speed.
    SetMaxSpeed(u32),
    /// Set motor acceleration.
    SetAcceleration(u32),
    /// Store the mounting orientation on the device.
    SetOrientation(Orientation),
    /// Force-set a single motor's absolute position.
    SetMotorPosition(Motor, i32),
    /// Query the firmware version; the device answers `FW: <version>`.
    QueryFirmwareVersion,
}

impl Command {
    /// Serialize to the newline-free wire text.
    pub fn to_wire(&self) -> String {
        match *self {
            Command::CornerTilt(corner, steps) => {
                format!("{},{}", corner.opcode(), steps)
            }
            Command::DirectionalTilt(direction, steps) => {
                format!("{},{}", direction.opcode(), steps)
            }
            Command::Backfocus(steps) => format!("bf,{}", steps),
            Command::Zero => "zr".to_string(),
            Command::QueryPositions => "cp".to_string(),
            Command::QueryEeprom => "ep".to_string(),
            Command::SavePositions => "up".to_string(),
            Command::SetSpeed(value) => format!("cA,{}", value),
            Command::SetMaxSpeed(value) => format!("cB,{}", value),
            Command::SetAcceleration(value) => format!("cC,{}", value),
            Command::SetOrientation(orientation) => {
                format!("or,{}", orientation.code())
            }
            Command::SetMotorPosition(motor, position) => {
                format!("{},{}", motor.opcode(), position)
            }
            Command::QueryFirmwareVersion => "fv".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_and_directional_wire_text() {
        assert_eq!(Command::CornerTilt(Corner::TopLeft, 25).to_wire(), "tl,25");
        assert_eq!(Command::CornerTilt(Corner::BottomRight, -40).to_wire(), "br,-40");
        assert_eq!(Command::DirectionalTilt(Direction::Top, 25).to_wire(), "tp,25");
        assert_eq!(Command::DirectionalTilt(Direction::Left, -5).to_wire(), "lt,-5");
    }

    #[test]
    fn bare_opcodes() {
        assert_eq!(Command::Zero.to_wire(), "zr");
        assert_eq!(Command::QueryPositions.to_wire(), "cp");
        assert_eq!(Command::QueryEeprom.to_wire(), "ep");
        assert_eq!(Command::SavePositions.to_wire(), "up");
        assert_eq!(Command::QueryFirmwareVersion.to_wire(), "fv");
    }

    #[test]
    fn configuration_opcodes() {
        assert_eq!(Command::Backfocus(-100).to_wire(), "bf,-100");
        assert_eq!(Command::SetSpeed(100).to_wire(), "cA,100");
        assert_eq!(Command::SetMaxSpeed(500).to_wire(), "cB,500");
        assert_eq!(Command::SetAcceleration(300).to_wire(), "cC,300");
        assert_eq!(
            Command::SetOrientation(Orientation::Rot180).to_wire(),
            "or,3"
        );
        assert_eq!(Command::SetMotorPosition(Motor::M3, 550).to_wire(), "m3,550");
    }

    #[test]
    fn direction_and_corner_parsing() {
        assert_eq!("top".parse::<Direction>().unwrap(), Direction::Top);
        assert_eq!("Down".parse::<Direction>().unwrap(), Direction::Bottom);
        assert!("diagonal".parse::<Direction>().is_err());

        assert_eq!("top-left".parse::<Corner>().unwrap(), Corner::TopLeft);
        assert_eq!("BR".parse::<Corner>().unwrap(), Corner::BottomRight);
        assert!("middle".parse::<Corner>().is_err());
    }
}
