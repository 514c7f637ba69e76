use std::collections::BTreeSet;

use engine::{
    CharacterMovement, CompressedFlags, MoveCorrection, MovementParams, NetRole,
    PredictedMovement, PredictionDataProvider, ReplicatedMovement, ServerMovePacket, UpdatedBody,
    Vec2,
};
use tracing::debug;

use crate::climbable_volume::VolumeId;
use crate::climbing::{ClimbTuning, ClimbingMovement};
use crate::level::Level;
use crate::prediction::ClimbPredictionProvider;
use crate::saved_move::FLAG_CLIMB_PRESSED;

pub const CHARACTER_HALF_EXTENTS: Vec2 = Vec2::new(16.0, 28.0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Facing {
    #[default]
    Right,
    Left,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CharacterAnimation {
    #[default]
    Idle,
    Running,
    ClimbingIdle,
    ClimbingRunning,
}

impl CharacterAnimation {
    pub fn sprite_key(self) -> &'static str {
        match self {
            Self::Idle => "hero_idle",
            Self::Running => "hero_run",
            Self::ClimbingIdle => "hero_climb_idle",
            Self::ClimbingRunning => "hero_climb",
        }
    }
}

/// Player character: climbing movement, controller input, volume membership
/// and presentation state.
#[derive(Debug)]
pub struct PlatformerCharacter {
    movement: ClimbingMovement,
    prediction: ClimbPredictionProvider,
    climbable_volumes: BTreeSet<VolumeId>,
    facing: Facing,
    animation: CharacterAnimation,
    input: Vec2,
}

impl PlatformerCharacter {
    pub fn new(
        role: NetRole,
        params: MovementParams,
        tuning: ClimbTuning,
        spawn: Vec2,
    ) -> Self {
        let body = UpdatedBody::new(spawn, CHARACTER_HALF_EXTENTS);
        let base = CharacterMovement::new(params, Some(body));
        Self {
            movement: ClimbingMovement::new(base, tuning, role),
            prediction: ClimbPredictionProvider::default(),
            climbable_volumes: BTreeSet::new(),
            facing: Facing::default(),
            animation: CharacterAnimation::default(),
            input: Vec2::ZERO,
        }
    }

    pub fn climbing(&self) -> &ClimbingMovement {
        &self.movement
    }

    pub fn climbing_mut(&mut self) -> &mut ClimbingMovement {
        &mut self.movement
    }

    pub fn role(&self) -> NetRole {
        self.movement.role()
    }

    pub fn position(&self) -> Option<Vec2> {
        self.movement.base().position()
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn animation(&self) -> CharacterAnimation {
        self.animation
    }

    pub fn prediction(&self) -> &ClimbPredictionProvider {
        &self.prediction
    }

    pub fn move_right(&mut self, value: f32) {
        self.input.x = value.clamp(-1.0, 1.0);
    }

    /// Vertical input only counts while climbing.
    pub fn move_up(&mut self, value: f32) {
        if self.movement.is_climbing() {
            self.input.y = value.clamp(-1.0, 1.0);
        }
    }

    pub fn jump(&mut self) {
        self.movement.base_mut().jump();
    }

    pub fn stop_jumping(&mut self) {
        self.movement.base_mut().stop_jumping();
    }

    pub fn can_climb(&self) -> bool {
        !self.movement.is_climbing() && !self.movement.base().is_simulating_physics()
    }

    pub fn start_climb(&mut self) {
        if self.can_climb() {
            self.movement.request_climb();
        }
    }

    pub fn stop_climb(&mut self) {
        self.movement.request_stop_climb();
    }

    pub fn climbable_volume_count(&self) -> usize {
        self.climbable_volumes.len()
    }

    pub fn add_climbable_volume(&mut self, volume: VolumeId) {
        self.climbable_volumes.insert(volume);
        self.set_climb_enabled(true);
    }

    pub fn remove_climbable_volume(&mut self, volume: VolumeId) {
        self.climbable_volumes.remove(&volume);
        if self.climbable_volumes.is_empty() {
            self.set_climb_enabled(false);
        }
    }

    pub fn set_climb_enabled(&mut self, enabled: bool) {
        self.movement.set_climb_eligible(enabled);
    }

    /// Scaled acceleration for this tick's input. The input is consumed.
    pub fn consume_input_acceleration(&mut self) -> Vec2 {
        let input = std::mem::take(&mut self.input);
        self.movement.base().scale_input_acceleration(input)
    }

    /// Reconciles volume membership with the body's current position.
    pub fn refresh_climbable_volumes(&mut self, level: &Level) {
        let Some(bounds) = self.movement.base().bounds() else {
            return;
        };
        let inside: BTreeSet<VolumeId> = level
            .volumes_overlapping(&bounds)
            .map(|volume| volume.id())
            .collect();

        let left: Vec<VolumeId> = self.climbable_volumes.difference(&inside).copied().collect();
        for volume in left.into_iter().filter_map(|id| level.volume(id)) {
            volume.on_overlap_end(self);
        }
        let entered: Vec<VolumeId> = inside.difference(&self.climbable_volumes).copied().collect();
        for volume in entered.into_iter().filter_map(|id| level.volume(id)) {
            volume.on_overlap_begin(self);
        }
    }

    /// Applies the authority's replicated state on a simulated proxy.
    pub fn apply_replicated_movement(&mut self, level: &Level, replicated: &ReplicatedMovement) {
        self.movement.apply_replicated_movement(replicated);
        self.refresh_climbable_volumes(level);
        self.update_presentation();
    }

    pub fn teleport(&mut self, level: &Level, position: Vec2) {
        self.movement.base_mut().teleport(position);
        self.refresh_climbable_volumes(level);
    }

    fn update_presentation(&mut self) {
        let velocity = self.movement.base().velocity();
        let moving = velocity.length_squared() > 0.0;
        self.animation = match (self.movement.is_climbing(), moving) {
            (true, true) => CharacterAnimation::ClimbingRunning,
            (true, false) => CharacterAnimation::ClimbingIdle,
            (false, true) => CharacterAnimation::Running,
            (false, false) => CharacterAnimation::Idle,
        };
        if velocity.x > 0.0 {
            self.facing = Facing::Right;
        } else if velocity.x < 0.0 {
            self.facing = Facing::Left;
        }
    }

    /// Local simulation for a character that is not predicted, such as the
    /// offline player or the authority.
    pub fn tick(&mut self, level: &Level, dt: f32) {
        let acceleration = self.consume_input_acceleration();
        self.perform_move(level, acceleration, dt);
    }

    /// Predicts one move on the owning client. Returns moves to send to the server.
    pub fn replicate_move(&mut self, level: &Level, dt: f32) -> Option<ServerMovePacket> {
        let acceleration = self.consume_input_acceleration();
        let role = self.role();
        let mut prediction = std::mem::take(&mut self.prediction);
        let packet = prediction
            .prediction_data_client(role)
            .replicate_move(self, level, dt, acceleration);
        self.prediction = prediction;
        packet
    }

    pub fn set_move_combining(&mut self, allow: bool) {
        let role = self.role();
        self.prediction
            .prediction_data_client(role)
            .allow_move_combining = allow;
    }

    pub fn acknowledge_move(&mut self, sequence: u32) {
        let role = self.role();
        self.prediction
            .prediction_data_client(role)
            .acknowledge_move(sequence);
    }

    /// Adopts the server state and replays unacknowledged moves.
    pub fn handle_correction(&mut self, level: &Level, correction: &MoveCorrection) -> usize {
        let role = self.role();
        let mut prediction = std::mem::take(&mut self.prediction);
        let replayed = prediction
            .prediction_data_client(role)
            .handle_correction(self, level, correction);
        self.prediction = prediction;
        self.update_presentation();
        replayed
    }
}

impl PredictedMovement for PlatformerCharacter {
    type World = Level;

    fn movement(&self) -> &CharacterMovement {
        self.movement.base()
    }

    fn movement_mut(&mut self) -> &mut CharacterMovement {
        self.movement.base_mut()
    }

    fn update_from_compressed_flags(&mut self, flags: CompressedFlags) {
        self.movement
            .base_mut()
            .set_pressed_jump(flags.contains(CompressedFlags::JUMP_PRESSED));
        self.movement
            .set_wants_to_climb(flags.contains(FLAG_CLIMB_PRESSED));
    }

    fn perform_move(&mut self, level: &Level, acceleration: Vec2, dt: f32) {
        if !self.movement.update_before_movement(acceleration, dt) {
            return;
        }
        self.movement.run_physics(level.collision(), dt);
        self.refresh_climbable_volumes(level);
        self.movement.update_after_movement();
        self.update_presentation();
    }

    fn after_correction(&mut self, level: &Level) {
        debug!(volumes = self.climbable_volumes.len(), "character_state_rewound");
        self.refresh_climbable_volumes(level);
    }

    fn set_replaying(&mut self, replaying: bool) {
        self.movement.set_replaying(replaying);
    }
}
