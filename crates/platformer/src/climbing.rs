use engine::movement::MIN_TICK_TIME;
use engine::{CharacterMovement, CollisionWorld, MovementMode, NetRole, ReplicatedMovement, Vec2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Custom movement mode tag for climbing.
pub const CLIMBING: u8 = 0;

/// What happens to velocity when a climb starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimbEntryVelocity {
    #[default]
    Zero,
    Preserve,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClimbTuning {
    pub max_climb_speed: f32,
    pub climb_braking_deceleration: f32,
    pub climb_cooldown_seconds: f32,
    pub entry_velocity: ClimbEntryVelocity,
}

impl Default for ClimbTuning {
    fn default() -> Self {
        Self {
            max_climb_speed: 150.0,
            climb_braking_deceleration: 2048.0,
            climb_cooldown_seconds: 0.5,
            entry_velocity: ClimbEntryVelocity::Zero,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimbEndReason {
    /// Climb intent was released.
    Released,
    /// Left every climbable volume, or physics took over the body.
    Ineligible,
    Jumped,
    /// The authority's replicated mode left climbing.
    Replicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClimbEvent {
    Started,
    Ended { reason: ClimbEndReason },
}

/// Climbing layered over the base walking/falling simulation.
#[derive(Debug, Clone)]
pub struct ClimbingMovement {
    base: CharacterMovement,
    tuning: ClimbTuning,
    role: NetRole,
    climb_eligible: bool,
    wants_to_climb: bool,
    climb_cooldown: f32,
    replaying: bool,
    events: Vec<ClimbEvent>,
}

impl ClimbingMovement {
    pub fn new(base: CharacterMovement, tuning: ClimbTuning, role: NetRole) -> Self {
        Self {
            base,
            tuning,
            role,
            climb_eligible: false,
            wants_to_climb: false,
            climb_cooldown: 0.0,
            replaying: false,
            events: Vec::new(),
        }
    }

    pub fn base(&self) -> &CharacterMovement {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut CharacterMovement {
        &mut self.base
    }

    pub fn tuning(&self) -> &ClimbTuning {
        &self.tuning
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn set_climb_eligible(&mut self, eligible: bool) {
        self.climb_eligible = eligible;
    }

    pub fn climb_eligible(&self) -> bool {
        self.climb_eligible
    }

    pub fn request_climb(&mut self) {
        self.wants_to_climb = true;
    }

    pub fn request_stop_climb(&mut self) {
        self.wants_to_climb = false;
    }

    pub fn wants_to_climb(&self) -> bool {
        self.wants_to_climb
    }

    pub fn set_wants_to_climb(&mut self, wants_to_climb: bool) {
        self.wants_to_climb = wants_to_climb;
    }

    pub fn climb_cooldown(&self) -> f32 {
        self.climb_cooldown
    }

    pub fn set_climb_cooldown(&mut self, seconds: f32) {
        self.climb_cooldown = seconds.max(0.0);
    }

    pub fn is_climbing(&self) -> bool {
        self.base.is_custom_mode(CLIMBING) && self.base.has_valid_data()
    }

    pub fn can_climb_now(&self) -> bool {
        self.climb_eligible
            && self.climb_cooldown <= 0.0
            && self.base.has_valid_data()
            && !self.base.is_simulating_physics()
    }

    pub fn max_speed(&self) -> f32 {
        if self.is_climbing() {
            return self.tuning.max_climb_speed;
        }
        self.base.max_speed()
    }

    pub fn max_braking_deceleration(&self) -> f32 {
        if self.is_climbing() {
            return self.tuning.climb_braking_deceleration;
        }
        self.base.max_braking_deceleration()
    }

    pub fn can_attempt_jump(&self) -> bool {
        if self.base.params().can_ever_jump && self.is_climbing() {
            return true;
        }
        self.base.can_attempt_jump()
    }

    pub fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    pub fn drain_events(&mut self) -> Vec<ClimbEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: ClimbEvent) {
        if self.replaying {
            return;
        }
        debug!(?event, role = ?self.role, "climb_event");
        self.events.push(event);
    }

    /// Cooldown, jump input and climb transitions. Returns false when there is
    /// nothing to simulate.
    pub fn update_before_movement(&mut self, acceleration: Vec2, dt: f32) -> bool {
        if !self.base.has_valid_data() || self.base.is_simulating_physics() {
            return false;
        }

        if self.climb_cooldown > 0.0 {
            self.climb_cooldown = (self.climb_cooldown - dt).max(0.0);
        }

        self.base.set_acceleration(acceleration);
        let was_climbing = self.is_climbing();
        let can_attempt = self.can_attempt_jump();
        if self.base.check_jump_input(can_attempt) && was_climbing {
            self.climb_cooldown = self.tuning.climb_cooldown_seconds;
            self.emit(ClimbEvent::Ended {
                reason: ClimbEndReason::Jumped,
            });
        }

        if self.role != NetRole::SimulatedProxy {
            let climbing = self.is_climbing();
            if climbing && !self.wants_to_climb {
                self.unclimb(ClimbEndReason::Released);
            } else if climbing && !self.can_climb_now() {
                self.unclimb(ClimbEndReason::Ineligible);
            } else if !climbing && self.wants_to_climb && self.can_climb_now() {
                self.climb();
            }
        }

        // Mode may have changed; recompute the allowed acceleration for it.
        self.base.set_acceleration(acceleration);
        true
    }

    pub fn run_physics(&mut self, world: &CollisionWorld, dt: f32) {
        let max_speed = self.max_speed();
        let braking = self.max_braking_deceleration();
        match self.base.mode() {
            MovementMode::Custom(CLIMBING) => self.phys_climbing(world, dt),
            _ => self.base.start_new_physics(world, dt, max_speed, braking),
        }
    }

    pub fn update_after_movement(&mut self) {
        if self.role != NetRole::SimulatedProxy && self.is_climbing() && !self.can_climb_now() {
            self.unclimb(ClimbEndReason::Ineligible);
        }
    }

    fn climb(&mut self) {
        if !self.base.has_valid_data() || !self.can_climb_now() {
            return;
        }
        self.base.set_movement_mode(MovementMode::Custom(CLIMBING));
        if self.tuning.entry_velocity == ClimbEntryVelocity::Zero {
            self.base.set_velocity(Vec2::ZERO);
        }
        self.base.reset_jump_state();
        self.emit(ClimbEvent::Started);
    }

    fn unclimb(&mut self, reason: ClimbEndReason) {
        if !self.base.has_valid_data() {
            return;
        }
        self.base.set_movement_mode(MovementMode::Falling);
        self.climb_cooldown = self.tuning.climb_cooldown_seconds;
        self.emit(ClimbEvent::Ended { reason });
    }

    fn phys_climbing(&mut self, world: &CollisionWorld, dt: f32) {
        if dt < MIN_TICK_TIME {
            return;
        }
        let Some(old_location) = self.base.position() else {
            return;
        };

        match self.base.root_motion_velocity() {
            Some(velocity) => self.base.set_velocity(velocity),
            None => {
                let friction = self.base.params().ground_friction;
                let max_speed = self.max_speed();
                let braking = self.max_braking_deceleration();
                self.base.calc_velocity(dt, friction, max_speed, braking);
            }
        }

        self.base.clear_just_teleported();
        let delta = self.base.velocity() * dt;
        self.base.safe_move_updated_body(world, delta);

        if !self.base.just_teleported() && !self.base.has_root_motion_override() {
            if let Some(new_location) = self.base.position() {
                self.base.set_velocity((new_location - old_location) / dt);
            }
        }
    }

    /// Applies the authority's movement state on a simulated proxy. This is the
    /// only path that changes a proxy's mode.
    pub fn apply_replicated_movement(&mut self, replicated: &ReplicatedMovement) {
        let was_climbing = self.is_climbing();
        self.base
            .restore_state(replicated.location, replicated.velocity, replicated.mode);
        match (was_climbing, self.is_climbing()) {
            (false, true) => self.emit(ClimbEvent::Started),
            (true, false) => self.emit(ClimbEvent::Ended {
                reason: ClimbEndReason::Replicated,
            }),
            _ => {}
        }
    }

    pub fn replicated_movement(&self) -> Option<ReplicatedMovement> {
        Some(ReplicatedMovement {
            location: self.base.position()?,
            velocity: self.base.velocity(),
            mode: self.base.mode(),
        })
    }
}
