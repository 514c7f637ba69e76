use serde::{Deserialize, Serialize};

/// Tuning for the default walking/falling simulation. Units are world units
/// (centimetres) and seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MovementParams {
    pub max_walk_speed: f32,
    pub max_custom_movement_speed: f32,
    pub max_acceleration: f32,
    pub braking_deceleration_walking: f32,
    pub braking_deceleration_falling: f32,
    pub ground_friction: f32,
    pub braking_friction_factor: f32,
    pub gravity_y: f32,
    pub gravity_scale: f32,
    pub terminal_velocity: f32,
    pub jump_y_velocity: f32,
    pub air_control: f32,
    pub max_jump_count: u32,
    pub can_ever_jump: bool,
}

impl Default for MovementParams {
    fn default() -> Self {
        Self {
            max_walk_speed: 225.0,
            max_custom_movement_speed: 600.0,
            max_acceleration: 2048.0,
            braking_deceleration_walking: 2048.0,
            braking_deceleration_falling: 0.0,
            ground_friction: 3.0,
            braking_friction_factor: 2.0,
            gravity_y: -980.0,
            gravity_scale: 2.0,
            terminal_velocity: 4000.0,
            jump_y_velocity: 800.0,
            air_control: 0.8,
            max_jump_count: 1,
            can_ever_jump: true,
        }
    }
}

impl MovementParams {
    pub fn gravity(&self) -> f32 {
        self.gravity_y * self.gravity_scale
    }
}
