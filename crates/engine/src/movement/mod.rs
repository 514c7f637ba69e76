mod params;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::collision::{Aabb, CollisionWorld, FloorHit, MoveResult, SweepHit, SWEEP_SKIN};
use crate::math::{Vec2, KINDA_SMALL_NUMBER};

pub use params::MovementParams;

/// Physics steps shorter than this are skipped.
pub const MIN_TICK_TIME: f32 = 1.0e-6;
/// Braking integrates in substeps no longer than this.
pub const MAX_BRAKING_SUBSTEP: f32 = 1.0 / 33.0;
/// Speeds below this snap to zero once braking is applied.
pub const BRAKE_TO_STOP_VELOCITY: f32 = 10.0;
/// Falling bodies land when a floor is this close below them.
pub const LANDING_TOLERANCE: f32 = 0.5;
const SLIDE_ITERATIONS: u32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementMode {
    #[default]
    None,
    Walking,
    Falling,
    /// Extension-defined mode, dispatched by tag.
    Custom(u8),
}

/// The collision proxy moved by the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdatedBody {
    pub position: Vec2,
    pub half_extents: Vec2,
    pub simulating_physics: bool,
}

impl UpdatedBody {
    pub fn new(position: Vec2, half_extents: Vec2) -> Self {
        Self {
            position,
            half_extents,
            simulating_physics: false,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.position, self.half_extents)
    }
}

/// Default walking/falling simulation. Extensions compose it and call its
/// queries and steps instead of overriding them.
#[derive(Debug, Clone)]
pub struct CharacterMovement {
    params: MovementParams,
    mode: MovementMode,
    body: Option<UpdatedBody>,
    velocity: Vec2,
    acceleration: Vec2,
    pressed_jump: bool,
    jump_count: u32,
    just_teleported: bool,
    root_motion_velocity: Option<Vec2>,
}

impl CharacterMovement {
    pub fn new(params: MovementParams, body: Option<UpdatedBody>) -> Self {
        let mode = if body.is_some() {
            MovementMode::Falling
        } else {
            MovementMode::None
        };
        Self {
            params,
            mode,
            body,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            pressed_jump: false,
            jump_count: 0,
            just_teleported: false,
            root_motion_velocity: None,
        }
    }

    pub fn params(&self) -> &MovementParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut MovementParams {
        &mut self.params
    }

    pub fn mode(&self) -> MovementMode {
        self.mode
    }

    pub fn body(&self) -> Option<&UpdatedBody> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> Option<&mut UpdatedBody> {
        self.body.as_mut()
    }

    pub fn set_body(&mut self, body: Option<UpdatedBody>) {
        self.body = body;
        if self.body.is_none() {
            self.mode = MovementMode::None;
        }
    }

    pub fn has_valid_data(&self) -> bool {
        self.body.is_some()
    }

    pub fn position(&self) -> Option<Vec2> {
        self.body.map(|body| body.position)
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.body.map(|body| body.bounds())
    }

    pub fn is_simulating_physics(&self) -> bool {
        self.body.is_some_and(|body| body.simulating_physics)
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    pub fn acceleration(&self) -> Vec2 {
        self.acceleration
    }

    pub fn pressed_jump(&self) -> bool {
        self.pressed_jump
    }

    pub fn set_pressed_jump(&mut self, pressed: bool) {
        self.pressed_jump = pressed;
    }

    pub fn jump_count(&self) -> u32 {
        self.jump_count
    }

    pub fn set_jump_count(&mut self, jump_count: u32) {
        self.jump_count = jump_count;
    }

    pub fn just_teleported(&self) -> bool {
        self.just_teleported
    }

    pub fn clear_just_teleported(&mut self) {
        self.just_teleported = false;
    }

    pub fn is_falling(&self) -> bool {
        self.mode == MovementMode::Falling
    }

    pub fn is_moving_on_ground(&self) -> bool {
        self.mode == MovementMode::Walking
    }

    pub fn is_custom_mode(&self, tag: u8) -> bool {
        self.mode == MovementMode::Custom(tag)
    }

    /// Externally driven velocity (root motion or a scripted override). While
    /// set, the physics steps use it verbatim and leave it untouched.
    pub fn set_root_motion_velocity(&mut self, velocity: Option<Vec2>) {
        self.root_motion_velocity = velocity;
    }

    pub fn root_motion_velocity(&self) -> Option<Vec2> {
        self.root_motion_velocity
    }

    pub fn has_root_motion_override(&self) -> bool {
        self.root_motion_velocity.is_some()
    }

    pub fn set_movement_mode(&mut self, mode: MovementMode) {
        if self.mode == mode {
            return;
        }
        trace!(from = ?self.mode, to = ?mode, "movement_mode_changed");
        self.mode = mode;
        if mode == MovementMode::Walking {
            self.velocity.y = 0.0;
        }
    }

    pub fn max_speed(&self) -> f32 {
        match self.mode {
            MovementMode::Walking | MovementMode::Falling => self.params.max_walk_speed,
            MovementMode::Custom(_) => self.params.max_custom_movement_speed,
            MovementMode::None => 0.0,
        }
    }

    pub fn max_braking_deceleration(&self) -> f32 {
        match self.mode {
            MovementMode::Walking => self.params.braking_deceleration_walking,
            MovementMode::Falling => self.params.braking_deceleration_falling,
            MovementMode::Custom(_) | MovementMode::None => 0.0,
        }
    }

    /// Maps a controller input vector (each axis in [-1, 1]) to an acceleration.
    pub fn scale_input_acceleration(&self, input: Vec2) -> Vec2 {
        input.clamp_length_max(1.0) * self.params.max_acceleration
    }

    /// Ground and air locomotion cannot accelerate vertically; custom modes can.
    pub fn constrain_input_acceleration(&self, acceleration: Vec2) -> Vec2 {
        match self.mode {
            MovementMode::Walking | MovementMode::Falling => Vec2::new(acceleration.x, 0.0),
            MovementMode::Custom(_) => acceleration,
            MovementMode::None => Vec2::ZERO,
        }
    }

    pub fn set_acceleration(&mut self, acceleration: Vec2) {
        let clamped = acceleration.clamp_length_max(self.params.max_acceleration);
        self.acceleration = self.constrain_input_acceleration(clamped);
    }

    /// Updates velocity toward the current acceleration, braking when there is
    /// none or when over `max_speed`.
    pub fn calc_velocity(&mut self, dt: f32, friction: f32, max_speed: f32, braking_deceleration: f32) {
        if dt < MIN_TICK_TIME || !self.has_valid_data() || self.has_root_motion_override() {
            return;
        }

        let friction = friction.max(0.0);
        let zero_acceleration = self.acceleration.is_nearly_zero(KINDA_SMALL_NUMBER);
        let exceeding_max_speed = self.velocity.length_squared() > (max_speed * 1.01).powi(2);

        if zero_acceleration || exceeding_max_speed {
            let old_velocity = self.velocity;
            self.apply_velocity_braking(dt, friction, braking_deceleration);

            // Braking below max speed while still accelerating forward keeps max speed.
            if exceeding_max_speed
                && self.velocity.length_squared() < max_speed * max_speed
                && self.acceleration.dot(old_velocity) > 0.0
            {
                self.velocity = old_velocity.normalize_or_zero() * max_speed;
            }
        } else {
            let accel_dir = self.acceleration.normalize_or_zero();
            let speed = self.velocity.length();
            self.velocity =
                self.velocity - (self.velocity - accel_dir * speed) * (dt * friction).min(1.0);
        }

        self.velocity += self.acceleration * dt;
        self.velocity = self.velocity.clamp_length_max(max_speed);
    }

    pub fn apply_velocity_braking(&mut self, dt: f32, friction: f32, braking_deceleration: f32) {
        if self.velocity.is_nearly_zero(KINDA_SMALL_NUMBER)
            || dt < MIN_TICK_TIME
            || (friction == 0.0 && braking_deceleration == 0.0)
        {
            return;
        }

        let friction = friction * self.params.braking_friction_factor.max(0.0);
        let braking_deceleration = braking_deceleration.max(0.0);
        let reverse_acceleration = -self.velocity.normalize_or_zero() * braking_deceleration;
        let old_velocity = self.velocity;

        let mut remaining = dt;
        while remaining >= MIN_TICK_TIME {
            let step = remaining.min(MAX_BRAKING_SUBSTEP);
            remaining -= step;
            self.velocity += (self.velocity * -friction + reverse_acceleration) * step;
            if self.velocity.dot(old_velocity) <= 0.0 {
                self.velocity = Vec2::ZERO;
                return;
            }
        }

        if self.velocity.length_squared() < BRAKE_TO_STOP_VELOCITY * BRAKE_TO_STOP_VELOCITY {
            self.velocity = Vec2::ZERO;
        }
    }

    pub fn can_attempt_jump(&self) -> bool {
        self.params.can_ever_jump && (self.is_moving_on_ground() || self.is_falling())
    }

    fn jump_count_allows(&self) -> bool {
        let max = self.params.max_jump_count;
        if self.jump_count == 0 && self.is_falling() {
            // Walking off a ledge consumes the first jump.
            return self.jump_count + 1 < max;
        }
        self.jump_count < max
    }

    pub fn jump(&mut self) {
        self.pressed_jump = true;
    }

    pub fn stop_jumping(&mut self) {
        self.pressed_jump = false;
    }

    pub fn reset_jump_state(&mut self) {
        self.pressed_jump = false;
        if !self.is_falling() {
            self.jump_count = 0;
        }
    }

    /// Consumes a latched jump press when `can_attempt` and the jump count allow it.
    pub fn check_jump_input(&mut self, can_attempt: bool) -> bool {
        if !self.pressed_jump || !can_attempt || !self.jump_count_allows() {
            return false;
        }
        if self.do_jump() {
            self.jump_count = self.jump_count.saturating_add(1);
            return true;
        }
        false
    }

    pub fn do_jump(&mut self) -> bool {
        if !self.has_valid_data() || !self.params.can_ever_jump {
            return false;
        }
        self.velocity.y = self.velocity.y.max(self.params.jump_y_velocity);
        self.set_movement_mode(MovementMode::Falling);
        true
    }

    pub fn teleport(&mut self, position: Vec2) {
        if let Some(body) = self.body.as_mut() {
            body.position = position;
            self.just_teleported = true;
        }
    }

    /// Restores a previously captured state without running any physics.
    pub fn restore_state(&mut self, position: Vec2, velocity: Vec2, mode: MovementMode) {
        let Some(body) = self.body.as_mut() else {
            return;
        };
        body.position = position;
        self.velocity = velocity;
        self.mode = mode;
    }

    /// Collision-safe move of the updated body. No-op without a body.
    pub fn safe_move_updated_body(&mut self, world: &CollisionWorld, delta: Vec2) -> Option<SweepHit> {
        let body = self.body.as_mut()?;
        let result = world.safe_move(&body.bounds(), delta);
        body.position = result.position;
        result.hit
    }

    fn slide_updated_body(&mut self, world: &CollisionWorld, delta: Vec2) -> Option<MoveResult> {
        let body = self.body.as_mut()?;
        let result = world.slide_move(&body.bounds(), delta, SLIDE_ITERATIONS);
        body.position = result.position;
        Some(result)
    }

    pub fn find_floor(&self, world: &CollisionWorld) -> Option<FloorHit> {
        world.find_floor(&self.bounds()?)
    }

    /// Runs the built-in physics for the current mode. Custom modes are left to
    /// the extension that owns them.
    pub fn start_new_physics(
        &mut self,
        world: &CollisionWorld,
        dt: f32,
        max_speed: f32,
        braking_deceleration: f32,
    ) {
        match self.mode {
            MovementMode::Walking => self.phys_walking(world, dt, max_speed, braking_deceleration),
            MovementMode::Falling => self.phys_falling(world, dt, max_speed, braking_deceleration),
            MovementMode::Custom(_) | MovementMode::None => {}
        }
    }

    pub fn phys_walking(
        &mut self,
        world: &CollisionWorld,
        dt: f32,
        max_speed: f32,
        braking_deceleration: f32,
    ) {
        if dt < MIN_TICK_TIME {
            return;
        }
        let Some(old_location) = self.position() else {
            return;
        };

        self.just_teleported = false;
        self.velocity.y = 0.0;
        self.acceleration.y = 0.0;
        match self.root_motion_velocity {
            Some(velocity) => self.velocity = Vec2::new(velocity.x, 0.0),
            None => {
                let friction = self.params.ground_friction;
                self.calc_velocity(dt, friction, max_speed, braking_deceleration);
            }
        }

        let delta = Vec2::new(self.velocity.x * dt, 0.0);
        self.slide_updated_body(world, delta);

        match self.find_floor(world) {
            Some(floor) => {
                let snap = floor.distance - SWEEP_SKIN;
                if snap > 0.0 {
                    self.safe_move_updated_body(world, Vec2::new(0.0, -snap));
                }
            }
            None => {
                self.set_movement_mode(MovementMode::Falling);
            }
        }

        if !self.just_teleported && !self.has_root_motion_override() {
            if let Some(new_location) = self.position() {
                let mut velocity = (new_location - old_location) / dt;
                if self.is_moving_on_ground() {
                    velocity.y = 0.0;
                }
                self.velocity = velocity;
            }
        }
    }

    pub fn phys_falling(
        &mut self,
        world: &CollisionWorld,
        dt: f32,
        max_speed: f32,
        braking_deceleration: f32,
    ) {
        if dt < MIN_TICK_TIME || !self.has_valid_data() {
            return;
        }

        self.just_teleported = false;
        let vertical = self.velocity.y;
        match self.root_motion_velocity {
            Some(velocity) => self.velocity = velocity,
            None => {
                let full_acceleration = self.acceleration;
                self.acceleration = Vec2::new(full_acceleration.x * self.params.air_control, 0.0);
                self.velocity.y = 0.0;
                self.calc_velocity(dt, 0.0, max_speed, braking_deceleration);
                self.acceleration = full_acceleration;
                self.velocity.y = vertical + self.params.gravity() * dt;
                let terminal = self.params.terminal_velocity;
                self.velocity.y = self.velocity.y.clamp(-terminal, terminal);
            }
        }

        let delta = self.velocity * dt;
        let Some(result) = self.slide_updated_body(world, delta) else {
            return;
        };

        if let Some(hit) = result.hit {
            if hit.normal.y < -0.7 && self.velocity.y > 0.0 {
                self.velocity.y = 0.0;
            }
            if hit.normal.x.abs() > 0.7 {
                self.velocity.x = 0.0;
            }
        }

        if self.velocity.y <= 0.0 {
            if let Some(floor) = self.find_floor(world) {
                if floor.distance <= LANDING_TOLERANCE {
                    self.process_landed();
                }
            }
        }
    }

    fn process_landed(&mut self) {
        self.set_movement_mode(MovementMode::Walking);
        self.reset_jump_state();
        trace!("landed");
    }

    /// Full default tick: acceleration, jump input, then built-in physics.
    pub fn perform_move(&mut self, world: &CollisionWorld, acceleration: Vec2, dt: f32) {
        if !self.has_valid_data() || self.is_simulating_physics() {
            return;
        }
        self.set_acceleration(acceleration);
        let can_attempt = self.can_attempt_jump();
        self.check_jump_input(can_attempt);
        self.set_acceleration(acceleration);
        let max_speed = self.max_speed();
        let braking = self.max_braking_deceleration();
        self.start_new_physics(world, dt, max_speed, braking);
    }
}
