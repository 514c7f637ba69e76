use std::fmt;

use crate::collision::CollisionWorld;
use crate::math::{Vec2, KINDA_SMALL_NUMBER};
use crate::movement::{CharacterMovement, MovementMode};

use super::CompressedFlags;

/// Acceleration directions closer than this (cosine) may be merged into one move.
pub const ACCEL_DOT_THRESHOLD_COMBINE: f32 = 0.996;
/// Acceleration directions further apart than this (cosine) make a move important.
pub const ACCEL_DOT_THRESHOLD_IMPORTANT: f32 = 0.9;

/// A simulated character as seen by client prediction and the server move handler.
pub trait PredictedMovement {
    type World: ?Sized;

    fn movement(&self) -> &CharacterMovement;
    fn movement_mut(&mut self) -> &mut CharacterMovement;

    fn update_from_compressed_flags(&mut self, flags: CompressedFlags) {
        self.movement_mut()
            .set_pressed_jump(flags.contains(CompressedFlags::JUMP_PRESSED));
    }

    /// Simulates one move with the given (already scaled) acceleration.
    fn perform_move(&mut self, world: &Self::World, acceleration: Vec2, dt: f32);

    /// Called after prediction rewrote location, velocity or mode outside the simulation.
    fn after_correction(&mut self, _world: &Self::World) {}

    /// Replayed moves must not re-notify observers of events they already saw.
    fn set_replaying(&mut self, _replaying: bool) {}
}

impl PredictedMovement for CharacterMovement {
    type World = CollisionWorld;

    fn movement(&self) -> &CharacterMovement {
        self
    }

    fn movement_mut(&mut self) -> &mut CharacterMovement {
        self
    }

    fn perform_move(&mut self, world: &CollisionWorld, acceleration: Vec2, dt: f32) {
        CharacterMovement::perform_move(self, world, acceleration, dt);
    }
}

/// Base per-move record shared by every saved move type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SavedMoveCore {
    pub sequence: u32,
    pub timestamp: f32,
    pub delta_time: f32,
    pub acceleration: Vec2,
    pub pressed_jump: bool,
    pub start_location: Vec2,
    pub start_velocity: Vec2,
    pub start_mode: MovementMode,
    pub start_jump_count: u32,
    pub saved_location: Vec2,
    pub saved_velocity: Vec2,
    pub end_mode: MovementMode,
    pub force_no_combine: bool,
}

impl SavedMoveCore {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn set_move_for(&mut self, movement: &CharacterMovement, dt: f32, acceleration: Vec2) {
        self.delta_time = dt;
        self.acceleration = acceleration;
        self.pressed_jump = movement.pressed_jump();
        self.force_no_combine =
            movement.just_teleported() || movement.has_root_motion_override();
        self.set_initial_position(movement);
    }

    pub fn set_initial_position(&mut self, movement: &CharacterMovement) {
        self.start_location = movement.position().unwrap_or(Vec2::ZERO);
        self.start_velocity = movement.velocity();
        self.start_mode = movement.mode();
        self.start_jump_count = movement.jump_count();
    }

    pub fn post_update(&mut self, movement: &CharacterMovement) {
        self.saved_location = movement.position().unwrap_or(Vec2::ZERO);
        self.saved_velocity = movement.velocity();
        self.end_mode = movement.mode();
    }

    pub fn prep_move_for(&self, movement: &mut CharacterMovement) {
        movement.set_jump_count(self.start_jump_count);
    }

    pub fn compressed_flags(&self) -> CompressedFlags {
        let mut flags = CompressedFlags::NONE;
        flags.set(CompressedFlags::JUMP_PRESSED, self.pressed_jump);
        flags
    }

    pub fn can_combine_with(&self, new_move: &SavedMoveCore, max_delta_time: f32) -> bool {
        if self.force_no_combine || new_move.force_no_combine {
            return false;
        }

        let self_zero = self.acceleration.is_nearly_zero(KINDA_SMALL_NUMBER);
        let new_zero = new_move.acceleration.is_nearly_zero(KINDA_SMALL_NUMBER);
        if self_zero != new_zero {
            return false;
        }
        if !self_zero {
            let alignment = self
                .acceleration
                .normalize_or_zero()
                .dot(new_move.acceleration.normalize_or_zero());
            if alignment < ACCEL_DOT_THRESHOLD_COMBINE {
                return false;
            }
        }

        if self.delta_time + new_move.delta_time > max_delta_time {
            return false;
        }
        if self.pressed_jump != new_move.pressed_jump {
            return false;
        }
        if self.start_mode != new_move.start_mode || self.end_mode != new_move.start_mode {
            return false;
        }
        self.start_jump_count == new_move.start_jump_count
    }

    /// Folds `old_move` into this one and rewinds `movement` to where `old_move` started.
    pub fn combine_with(&mut self, old_move: &SavedMoveCore, movement: &mut CharacterMovement) {
        movement.restore_state(
            old_move.start_location,
            old_move.start_velocity,
            old_move.start_mode,
        );
        movement.set_jump_count(old_move.start_jump_count);

        self.delta_time += old_move.delta_time;
        self.start_location = old_move.start_location;
        self.start_velocity = old_move.start_velocity;
        self.start_mode = old_move.start_mode;
        self.start_jump_count = old_move.start_jump_count;
    }

    pub fn is_important_move(
        &self,
        flags: CompressedFlags,
        last_acked: &SavedMoveCore,
        last_acked_flags: CompressedFlags,
    ) -> bool {
        if flags != last_acked_flags {
            return true;
        }
        let self_zero = self.acceleration.is_nearly_zero(KINDA_SMALL_NUMBER);
        let acked_zero = last_acked.acceleration.is_nearly_zero(KINDA_SMALL_NUMBER);
        if self_zero != acked_zero {
            return true;
        }
        !self_zero
            && self
                .acceleration
                .normalize_or_zero()
                .dot(last_acked.acceleration.normalize_or_zero())
                < ACCEL_DOT_THRESHOLD_IMPORTANT
    }
}

/// A move record usable by client prediction. Every default delegates to
/// [`SavedMoveCore`]; extensions override and call the core for the base behavior.
pub trait SavedMove: Clone + Default + fmt::Debug {
    type Character: PredictedMovement;

    fn core(&self) -> &SavedMoveCore;
    fn core_mut(&mut self) -> &mut SavedMoveCore;

    fn clear(&mut self) {
        self.core_mut().clear();
    }

    fn set_move_for(&mut self, character: &Self::Character, dt: f32, acceleration: Vec2) {
        self.core_mut()
            .set_move_for(character.movement(), dt, acceleration);
    }

    fn set_initial_position(&mut self, character: &Self::Character) {
        self.core_mut().set_initial_position(character.movement());
    }

    fn post_update(&mut self, character: &Self::Character) {
        self.core_mut().post_update(character.movement());
    }

    /// Writes recorded state back into the character before the move is replayed.
    fn prep_move_for(&self, character: &mut Self::Character) {
        self.core().prep_move_for(character.movement_mut());
    }

    fn compressed_flags(&self) -> CompressedFlags {
        self.core().compressed_flags()
    }

    fn can_combine_with(&self, new_move: &Self, max_delta_time: f32) -> bool {
        self.core().can_combine_with(new_move.core(), max_delta_time)
    }

    fn combine_with(&mut self, old_move: &Self, character: &mut Self::Character) {
        self.core_mut()
            .combine_with(old_move.core(), character.movement_mut());
    }

    fn is_important_move(&self, last_acked: Option<&Self>) -> bool {
        let Some(last_acked) = last_acked else {
            return false;
        };
        self.core().is_important_move(
            self.compressed_flags(),
            last_acked.core(),
            last_acked.compressed_flags(),
        )
    }
}

/// Saved move for a plain [`CharacterMovement`] with no extension state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicSavedMove {
    core: SavedMoveCore,
}

impl SavedMove for BasicSavedMove {
    type Character = CharacterMovement;

    fn core(&self) -> &SavedMoveCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SavedMoveCore {
        &mut self.core
    }
}
