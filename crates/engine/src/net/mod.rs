mod client;
mod saved_move;
mod server;

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::math::Vec2;
use crate::movement::MovementMode;

pub use client::{
    ClientPredictionData, PredictionDataProvider, PredictionStats, ServerMovePacket,
    DEFAULT_MAX_SAVED_MOVE_COUNT, MAX_COMBINED_DELTA_TIME,
};
pub use saved_move::{BasicSavedMove, PredictedMovement, SavedMove, SavedMoveCore};
pub use server::{
    MoveCorrection, MoveResponse, ServerMove, ServerMoveHandler, MAX_POSITION_ERROR_SQUARED,
    MAX_SERVER_MOVE_DELTA_TIME,
};

/// Which copy of a networked character this simulation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetRole {
    /// The server: authoritative state.
    Authority,
    /// The owning client: predicts ahead and reconciles.
    AutonomousProxy,
    /// Another player's client: mirrors replicated state only.
    SimulatedProxy,
}

impl NetRole {
    pub fn is_authority(self) -> bool {
        self == Self::Authority
    }
}

/// Movement state the authority pushes to simulated proxies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicatedMovement {
    pub location: Vec2,
    pub velocity: Vec2,
    pub mode: MovementMode,
}

/// Per-move input bits sent with every move. Bits 0..4 belong to the base
/// simulation; extensions may only use the `CUSTOM_*` bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompressedFlags(u8);

impl CompressedFlags {
    pub const NONE: Self = Self(0);
    pub const JUMP_PRESSED: Self = Self(0x01);
    pub const WANTS_TO_CROUCH: Self = Self(0x02);
    pub const RESERVED_1: Self = Self(0x04);
    pub const RESERVED_2: Self = Self(0x08);
    pub const CUSTOM_0: Self = Self(0x10);
    pub const CUSTOM_1: Self = Self(0x20);
    pub const CUSTOM_2: Self = Self(0x40);
    pub const CUSTOM_3: Self = Self(0x80);

    const BASE_MASK: u8 = 0x0f;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    pub const fn is_custom(self) -> bool {
        self.0 & Self::BASE_MASK == 0
    }
}

impl BitOr for CompressedFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for CompressedFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_bits_never_overlap_base_bits() {
        for custom in [
            CompressedFlags::CUSTOM_0,
            CompressedFlags::CUSTOM_1,
            CompressedFlags::CUSTOM_2,
            CompressedFlags::CUSTOM_3,
        ] {
            assert!(custom.is_custom());
        }
        assert!(!CompressedFlags::JUMP_PRESSED.is_custom());
        assert!(!CompressedFlags::RESERVED_2.is_custom());
    }

    #[test]
    fn set_and_clear_single_bit() {
        let mut flags = CompressedFlags::JUMP_PRESSED;
        flags.set(CompressedFlags::CUSTOM_0, true);
        assert_eq!(flags.bits(), 0x11);
        flags.set(CompressedFlags::JUMP_PRESSED, false);
        assert_eq!(flags, CompressedFlags::CUSTOM_0);
        assert!(flags.contains(CompressedFlags::CUSTOM_0));
        assert!(!flags.contains(CompressedFlags::JUMP_PRESSED));
    }
}
