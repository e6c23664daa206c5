//! Response batch parsing.
//!
//! The device interleaves free-form diagnostic text with three
//! structured signals:
//!
//! - a standalone completion marker after a long-running move,
//! - a position block bracketed by sentinel lines with exactly four
//!   payload lines (TL, TR, BL, BR),
//! - an EEPROM block bracketed by sentinel lines with `key: value`
//!   payload lines.
//!
//! Firmware version queries answer with a single `FW:`-prefixed line.
//!
//! Parsing never fails. A malformed position block (payload count other
//! than four) yields no snapshot so the caller keeps its prior values,
//! unrecognized EEPROM keys are skipped, and lines outside any block
//! are ignored.

/// Start marker of a position block.
pub const POSITION_BLOCK_START: &str = "***Get Current Positions***";
/// End marker of a position block.
pub const POSITION_BLOCK_END: &str = "***End Current Positions***";
/// Start marker of an EEPROM block.
pub const EEPROM_BLOCK_START: &str = "***Current EEPROM***";
/// End marker of an EEPROM block.
pub const EEPROM_BLOCK_END: &str = "***End Current EEPROM***";
/// Standalone marker signalling a dispatched movement has completed.
pub const FINISHED_MOVEMENT: &str = "***finished movement***";
/// Prefix of the firmware version line.
pub const FIRMWARE_PREFIX: &str = "FW:";

/// Last-known motor positions, physical motor order.
///
/// Fields are `None` until a well-formed position block arrives and
/// after disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionSnapshot {
    pub tl: Option<String>,
    pub tr: Option<String>,
    pub bl: Option<String>,
    pub br: Option<String>,
}

impl PositionSnapshot {
    /// Whether all four positions are known.
    pub fn is_known(&self) -> bool {
        self.tl.is_some() && self.tr.is_some() && self.bl.is_some() && self.br.is_some()
    }
}

/// Values reported by an EEPROM block. Only recognized keys are
/// captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EepromValues {
    pub tl: Option<i64>,
    pub tr: Option<i64>,
    pub bl: Option<i64>,
    pub br: Option<i64>,
    pub speed: Option<u32>,
    pub max_speed: Option<u32>,
    pub acceleration: Option<u32>,
    pub orientation: Option<u8>,
}

/// Structured data extracted from one response batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    /// A previously dispatched movement has completed.
    pub finished_movement: bool,
    /// A well-formed position block was present.
    pub positions: Option<PositionSnapshot>,
    /// An EEPROM block was present.
    pub eeprom: Option<EepromValues>,
    /// A firmware version line was present.
    pub firmware: Option<String>,
}

/// Scan an ordered batch of response lines for structured data.
///
/// The batch may carry any mix of signals; each is extracted
/// independently.
pub fn parse_batch(lines: &[String]) -> ParsedResponse {
    ParsedResponse {
        finished_movement: lines.iter().any(|l| l == FINISHED_MOVEMENT),
        positions: parse_position_block(lines),
        eeprom: parse_eeprom_block(lines),
        firmware: parse_firmware_line(lines),
    }
}

fn parse_position_block(lines: &[String]) -> Option<PositionSnapshot> {
    let mut in_block = false;
    let mut values: Vec<&str> = Vec::new();
    let mut snapshot = None;

    for line in lines {
        if line == POSITION_BLOCK_START {
            in_block = true;
            values.clear();
            continue;
        }
        if line == POSITION_BLOCK_END {
            in_block = false;
            // Exactly four payload lines, in TL, TR, BL, BR order.
            // Anything else leaves the prior snapshot untouched.
            if values.len() == 4 {
                snapshot = Some(PositionSnapshot {
                    tl: Some(values[0].to_string()),
                    tr: Some(values[1].to_string()),
                    bl: Some(values[2].to_string()),
                    br: Some(values[3].to_string()),
                });
            }
            continue;
        }
        if in_block {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                values.push(trimmed);
            }
        }
    }

    snapshot
}

fn parse_eeprom_block(lines: &[String]) -> Option<EepromValues> {
    let mut in_block = false;
    let mut seen = false;
    let mut values = EepromValues::default();

    for line in lines {
        if line == EEPROM_BLOCK_START {
            in_block = true;
            seen = true;
            continue;
        }
        if line == EEPROM_BLOCK_END {
            in_block = false;
            continue;
        }
        if !in_block {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "TL" => values.tl = value.parse().ok(),
            "TR" => values.tr = value.parse().ok(),
            "BL" => values.bl = value.parse().ok(),
            "BR" => values.br = value.parse().ok(),
            "Speed" => values.speed = value.parse().ok(),
            "MaxSpeed" => values.max_speed = value.parse().ok(),
            "Acceleration" => values.acceleration = value.parse().ok(),
            "Orientation" => values.orientation = value.parse().ok(),
            _ => {}
        }
    }

    seen.then_some(values)
}

fn parse_firmware_line(lines: &[String]) -> Option<String> {
    lines
        .iter()
        .find_map(|l| l.strip_prefix(FIRMWARE_PREFIX))
        .map(|v| v.trim().to_string())
}
