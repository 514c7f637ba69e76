use engine::Aabb;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::character::PlatformerCharacter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VolumeId(pub u32);

/// Trigger region that makes an overlapping character eligible to climb.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimbableVolume {
    id: VolumeId,
    bounds: Aabb,
}

impl ClimbableVolume {
    pub fn new(id: VolumeId, bounds: Aabb) -> Self {
        Self { id, bounds }
    }

    pub fn id(&self) -> VolumeId {
        self.id
    }

    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn overlaps(&self, shape: &Aabb) -> bool {
        self.bounds.overlaps(shape)
    }

    pub fn on_overlap_begin(&self, character: &mut PlatformerCharacter) {
        trace!(volume = self.id.0, "climbable_volume_entered");
        character.add_climbable_volume(self.id);
    }

    pub fn on_overlap_end(&self, character: &mut PlatformerCharacter) {
        trace!(volume = self.id.0, "climbable_volume_left");
        character.remove_climbable_volume(self.id);
    }
}
