use std::collections::BTreeSet;

use crate::app::EntityId;
use crate::collision::Aabb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapEvent {
    Begin { volume: EntityId, actor: EntityId },
    End { volume: EntityId, actor: EntityId },
}

impl OverlapEvent {
    pub fn volume(&self) -> EntityId {
        match *self {
            Self::Begin { volume, .. } | Self::End { volume, .. } => volume,
        }
    }

    pub fn actor(&self) -> EntityId {
        match *self {
            Self::Begin { actor, .. } | Self::End { actor, .. } => actor,
        }
    }
}

/// Tracks which actors are inside which trigger volumes and reports the
/// begin/end edges between updates.
#[derive(Debug, Default)]
pub struct OverlapTracker {
    pairs: BTreeSet<(EntityId, EntityId)>,
}

impl OverlapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes every (volume, actor) pair. End events are reported before
    /// begin events, each sorted by volume then actor.
    pub fn update(
        &mut self,
        volumes: &[(EntityId, Aabb)],
        actors: &[(EntityId, Aabb)],
    ) -> Vec<OverlapEvent> {
        let mut current = BTreeSet::new();
        for (volume, volume_bounds) in volumes {
            for (actor, actor_bounds) in actors {
                if volume != actor && volume_bounds.overlaps(actor_bounds) {
                    current.insert((*volume, *actor));
                }
            }
        }

        let mut events: Vec<OverlapEvent> = self
            .pairs
            .difference(&current)
            .map(|&(volume, actor)| OverlapEvent::End { volume, actor })
            .collect();
        events.extend(
            current
                .difference(&self.pairs)
                .map(|&(volume, actor)| OverlapEvent::Begin { volume, actor }),
        );
        self.pairs = current;
        events
    }

    /// Ends every pair involving `entity`.
    pub fn remove_entity(&mut self, entity: EntityId) -> Vec<OverlapEvent> {
        let ended: Vec<(EntityId, EntityId)> = self
            .pairs
            .iter()
            .filter(|(volume, actor)| *volume == entity || *actor == entity)
            .copied()
            .collect();
        for pair in &ended {
            self.pairs.remove(pair);
        }
        ended
            .into_iter()
            .map(|(volume, actor)| OverlapEvent::End { volume, actor })
            .collect()
    }

    pub fn is_overlapping(&self, volume: EntityId, actor: EntityId) -> bool {
        self.pairs.contains(&(volume, actor))
    }

    pub fn overlapping_actors(&self, volume: EntityId) -> Vec<EntityId> {
        self.pairs
            .iter()
            .filter(|(pair_volume, _)| *pair_volume == volume)
            .map(|(_, actor)| *actor)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}
