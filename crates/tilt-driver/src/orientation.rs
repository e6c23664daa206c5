//! Logical-to-physical axis remapping.
//!
//! The platform can be mounted in any of four rotations. UI surfaces
//! speak in screen-relative ("logical") directions and corners; the
//! firmware addresses fixed ("physical") motors. Remapping is a pure
//! rotation along two independent four-element rings:
//!
//! - directions: top, right, bottom, left
//! - corners: top-left, top-right, bottom-right, bottom-left
//!
//! Orientation `1` is the identity; orientation `o` rotates `o - 1`
//! steps clockwise. The inverse mapping relabels already-physical
//! position readings back into logical screen positions.
//!
//! Orientation is owned by the settings store and may be changed by a
//! second UI surface at any time, so it is passed explicitly on every
//! call and never cached here.

use crate::command::{Corner, Direction};

/// Device mounting rotation, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// 0 degrees (identity).
    Normal,
    /// 90 degrees clockwise.
    Rot90,
    /// 180 degrees.
    Rot180,
    /// 270 degrees clockwise.
    Rot270,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Normal,
        Orientation::Rot90,
        Orientation::Rot180,
        Orientation::Rot270,
    ];

    /// Parse the wire/settings code 1-4.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Orientation::Normal),
            2 => Some(Orientation::Rot90),
            3 => Some(Orientation::Rot180),
            4 => Some(Orientation::Rot270),
            _ => None,
        }
    }

    /// The wire/settings code 1-4.
    pub fn code(self) -> u8 {
        match self {
            Orientation::Normal => 1,
            Orientation::Rot90 => 2,
            Orientation::Rot180 => 3,
            Orientation::Rot270 => 4,
        }
    }

    /// Clockwise ring steps applied by this orientation.
    fn steps(self) -> usize {
        (self.code() - 1) as usize
    }
}

impl Direction {
    /// Map a logical direction to the physical direction for the given
    /// mounting orientation.
    pub fn rotated(self, orientation: Orientation) -> Direction {
        let index = Direction::ALL
            .iter()
            .position(|d| *d == self)
            .unwrap_or(0);
        Direction::ALL[(index + orientation.steps()) % 4]
    }

    /// Inverse of [`Direction::rotated`]: map a physical direction back
    /// to its logical screen direction.
    pub fn unrotated(self, orientation: Orientation) -> Direction {
        let index = Direction::ALL
            .iter()
            .position(|d| *d == self)
            .unwrap_or(0);
        Direction::ALL[(index + 4 - orientation.steps()) % 4]
    }
}

impl Corner {
    /// Map a logical corner to the physical corner for the given
    /// mounting orientation.
    pub fn rotated(self, orientation: Orientation) -> Corner {
        let index = Corner::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Corner::ALL[(index + orientation.steps()) % 4]
    }

    /// Inverse of [`Corner::rotated`]: map a physical corner back to
    /// its logical screen corner.
    pub fn unrotated(self, orientation: Orientation) -> Corner {
        let index = Corner::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Corner::ALL[(index + 4 - orientation.steps()) % 4]
    }
}
