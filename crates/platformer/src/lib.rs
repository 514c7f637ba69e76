pub mod character;
pub mod chest;
pub mod climbable_volume;
pub mod climbing;
pub mod config;
pub mod interactable;
pub mod level;
pub mod prediction;
pub mod saved_move;
pub mod scene;
pub mod session;

#[cfg(test)]
mod tests;

pub use character::{CharacterAnimation, Facing, PlatformerCharacter, CHARACTER_HALF_EXTENTS};
pub use chest::{Chest, ChestConfig, SpriteSlot};
pub use climbable_volume::{ClimbableVolume, VolumeId};
pub use climbing::{
    ClimbEndReason, ClimbEntryVelocity, ClimbEvent, ClimbTuning, ClimbingMovement, CLIMBING,
};
pub use config::{ConfigError, PlatformerConfig, CONFIG_ENV_VAR};
pub use interactable::{
    Interactable, InteractableConfig, InteractableNotification, InteractableState,
    InteractionContext,
};
pub use level::{BoxDesc, ChestDesc, InteractableDesc, Level, LevelError, LevelLayout};
pub use prediction::ClimbPredictionProvider;
pub use saved_move::{ClimbSavedMove, CLIMB_COOLDOWN_TOLERANCE, FLAG_CLIMB_PRESSED};
pub use scene::{InteractableActor, PlatformerScene};
pub use session::{NetSession, NetSessionConfig, SessionStats, SessionTick};
