use engine::{Aabb, CollisionWorld, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chest::ChestConfig;
use crate::climbable_volume::{ClimbableVolume, VolumeId};

/// Axis-aligned box given by its corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoxDesc {
    pub min: Vec2,
    pub max: Vec2,
}

impl BoxDesc {
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn to_aabb(self) -> Aabb {
        Aabb::from_min_max(self.min, self.max)
    }

    fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x < self.max.x
            && self.min.y < self.max.y
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChestDesc {
    pub position: Vec2,
    #[serde(default = "default_chest_half_extents")]
    pub half_extents: Vec2,
    #[serde(default)]
    pub config: Option<ChestConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractableDesc {
    pub position: Vec2,
    #[serde(default = "default_chest_half_extents")]
    pub half_extents: Vec2,
    #[serde(default)]
    pub reset_delay_seconds: f32,
}

fn default_chest_half_extents() -> Vec2 {
    Vec2::new(16.0, 16.0)
}

/// Data description of a level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LevelLayout {
    pub spawn: Vec2,
    /// Characters below this height are respawned by a level reset.
    pub kill_height: f32,
    pub solids: Vec<BoxDesc>,
    pub climbable_volumes: Vec<BoxDesc>,
    pub chests: Vec<ChestDesc>,
    pub interactables: Vec<InteractableDesc>,
}

impl Default for LevelLayout {
    fn default() -> Self {
        Self {
            spawn: Vec2::new(0.0, 28.05),
            kill_height: -500.0,
            solids: vec![
                BoxDesc::new(Vec2::new(-2000.0, -100.0), Vec2::new(2000.0, 0.0)),
                BoxDesc::new(Vec2::new(360.0, 380.0), Vec2::new(760.0, 400.0)),
                BoxDesc::new(Vec2::new(-2100.0, -100.0), Vec2::new(-2000.0, 600.0)),
            ],
            // Two overlapping segments form one ladder.
            climbable_volumes: vec![
                BoxDesc::new(Vec2::new(300.0, 0.0), Vec2::new(340.0, 250.0)),
                BoxDesc::new(Vec2::new(300.0, 200.0), Vec2::new(340.0, 460.0)),
            ],
            chests: vec![ChestDesc {
                position: Vec2::new(-200.0, 16.0),
                half_extents: default_chest_half_extents(),
                config: Some(ChestConfig::default()),
            }],
            interactables: vec![InteractableDesc {
                position: Vec2::new(-400.0, 16.0),
                half_extents: default_chest_half_extents(),
                reset_delay_seconds: 2.0,
            }],
        }
    }
}

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("parse level layout at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {kind} box at index {index}: min must be below max")]
    InvalidBox { kind: &'static str, index: usize },
    #[error("invalid {field}: {value}")]
    InvalidValue { field: &'static str, value: f32 },
}

impl LevelLayout {
    pub fn from_json_str(raw: &str) -> Result<Self, LevelError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let layout: LevelLayout = serde_path_to_error::deserialize(&mut deserializer).map_err(
            |error| LevelError::Parse {
                path: error.path().to_string(),
                source: error.into_inner(),
            },
        )?;
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<(), LevelError> {
        if !self.spawn.is_finite() {
            return Err(LevelError::InvalidValue {
                field: "spawn",
                value: f32::NAN,
            });
        }
        if !self.kill_height.is_finite() {
            return Err(LevelError::InvalidValue {
                field: "kill_height",
                value: self.kill_height,
            });
        }
        for (kind, boxes) in [("solid", &self.solids), ("climbable", &self.climbable_volumes)] {
            if let Some(index) = boxes.iter().position(|desc| !desc.is_valid()) {
                return Err(LevelError::InvalidBox { kind, index });
            }
        }
        for interactable in &self.interactables {
            let delay = interactable.reset_delay_seconds;
            if !delay.is_finite() || delay < 0.0 {
                return Err(LevelError::InvalidValue {
                    field: "reset_delay_seconds",
                    value: delay,
                });
            }
        }
        Ok(())
    }
}

/// Static geometry the character simulates against.
#[derive(Debug, Clone, Default)]
pub struct Level {
    collision: CollisionWorld,
    volumes: Vec<ClimbableVolume>,
    spawn: Vec2,
    kill_height: f32,
}

impl Level {
    pub fn from_layout(layout: &LevelLayout) -> Result<Self, LevelError> {
        layout.validate()?;
        let collision =
            CollisionWorld::from_solids(layout.solids.iter().map(|desc| desc.to_aabb()).collect());
        let volumes = layout
            .climbable_volumes
            .iter()
            .zip(0u32..)
            .map(|(desc, index)| ClimbableVolume::new(VolumeId(index), desc.to_aabb()))
            .collect();
        Ok(Self {
            collision,
            volumes,
            spawn: layout.spawn,
            kill_height: layout.kill_height,
        })
    }

    pub fn collision(&self) -> &CollisionWorld {
        &self.collision
    }

    pub fn volumes(&self) -> &[ClimbableVolume] {
        &self.volumes
    }

    pub fn volume(&self, id: VolumeId) -> Option<&ClimbableVolume> {
        self.volumes.iter().find(|volume| volume.id() == id)
    }

    pub fn spawn(&self) -> Vec2 {
        self.spawn
    }

    pub fn kill_height(&self) -> f32 {
        self.kill_height
    }

    pub fn volumes_overlapping<'a>(
        &'a self,
        shape: &'a Aabb,
    ) -> impl Iterator<Item = &'a ClimbableVolume> + 'a {
        self.volumes.iter().filter(move |volume| volume.overlaps(shape))
    }
}
