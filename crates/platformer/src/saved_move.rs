use engine::math::nearly_equal;
use engine::{CompressedFlags, SavedMove, SavedMoveCore, Vec2};

use crate::character::PlatformerCharacter;

/// Compressed flag carrying the climb intent.
pub const FLAG_CLIMB_PRESSED: CompressedFlags = CompressedFlags::CUSTOM_0;
/// Cooldowns closer than this are treated as equal when merging or comparing moves.
pub const CLIMB_COOLDOWN_TOLERANCE: f32 = 0.01;

/// Saved move carrying climb intent and cooldown next to the base record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClimbSavedMove {
    core: SavedMoveCore,
    pub wants_to_climb: bool,
    pub climb_cooldown: f32,
}

impl SavedMove for ClimbSavedMove {
    type Character = PlatformerCharacter;

    fn core(&self) -> &SavedMoveCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SavedMoveCore {
        &mut self.core
    }

    fn clear(&mut self) {
        self.core.clear();
        self.wants_to_climb = false;
        self.climb_cooldown = 0.0;
    }

    fn set_move_for(&mut self, character: &PlatformerCharacter, dt: f32, acceleration: Vec2) {
        let climbing = character.climbing();
        self.climb_cooldown = climbing.climb_cooldown();
        self.wants_to_climb = climbing.wants_to_climb();
        self.core.set_move_for(climbing.base(), dt, acceleration);
    }

    fn prep_move_for(&self, character: &mut PlatformerCharacter) {
        let climbing = character.climbing_mut();
        climbing.set_climb_cooldown(self.climb_cooldown);
        climbing.set_wants_to_climb(self.wants_to_climb);
        self.core.prep_move_for(climbing.base_mut());
    }

    fn compressed_flags(&self) -> CompressedFlags {
        let mut flags = self.core.compressed_flags();
        flags.set(FLAG_CLIMB_PRESSED, self.wants_to_climb);
        flags
    }

    fn can_combine_with(&self, new_move: &Self, max_delta_time: f32) -> bool {
        if !nearly_equal(
            self.climb_cooldown,
            new_move.climb_cooldown,
            CLIMB_COOLDOWN_TOLERANCE,
        ) {
            return false;
        }
        if (self.climb_cooldown <= 0.0) != (new_move.climb_cooldown <= 0.0) {
            return false;
        }
        if self.compressed_flags() != new_move.compressed_flags() {
            return false;
        }
        self.core.can_combine_with(&new_move.core, max_delta_time)
    }

    fn combine_with(&mut self, old_move: &Self, character: &mut PlatformerCharacter) {
        self.climb_cooldown = old_move.climb_cooldown;
        let climbing = character.climbing_mut();
        climbing.set_climb_cooldown(old_move.climb_cooldown);
        self.core.combine_with(&old_move.core, climbing.base_mut());
    }

    fn is_important_move(&self, last_acked: Option<&Self>) -> bool {
        let Some(last_acked) = last_acked else {
            return false;
        };
        if !nearly_equal(
            self.climb_cooldown,
            last_acked.climb_cooldown,
            CLIMB_COOLDOWN_TOLERANCE,
        ) {
            return true;
        }
        self.core.is_important_move(
            self.compressed_flags(),
            &last_acked.core,
            last_acked.compressed_flags(),
        )
    }
}
