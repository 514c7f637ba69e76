use super::input::{ActionStates, InputAction};
use crate::collision::{Aabb, CollisionWorld};
use crate::math::Vec2;
use crate::overlap::{OverlapEvent, OverlapTracker};
use crate::timers::TimerManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
    ResetLevel,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    pressed: ActionStates,
    released: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_states(
        actions: ActionStates,
        pressed: ActionStates,
        released: ActionStates,
    ) -> Self {
        Self {
            actions,
            pressed,
            released,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.actions.is_down(InputAction::Quit)
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// True only on the tick the action went down.
    pub fn pressed(&self, action: InputAction) -> bool {
        self.pressed.is_down(action)
    }

    /// True only on the tick the action went up.
    pub fn released(&self, action: InputAction) -> bool {
        self.released.is_down(action)
    }

    /// -1, 0 or 1 from a pair of opposing actions.
    pub fn axis(&self, negative: InputAction, positive: InputAction) -> f32 {
        match (self.is_down(negative), self.is_down(positive)) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.set(action, true);
        self.pressed.set(action, true);
        self
    }

    pub fn with_action_released(mut self, action: InputAction) -> Self {
        self.actions.set(action, false);
        self.released.set(action, true);
        self
    }

    pub(crate) fn held_states(&self) -> ActionStates {
        self.actions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub position: Vec2,
    pub half_extents: Vec2,
    /// Actors are the things that enter trigger volumes.
    pub actor: bool,
    pub trigger: bool,
    /// False once a despawn is queued.
    pub alive: bool,
    pub debug_name: &'static str,
}

impl Entity {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.position, self.half_extents)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EntityDesc {
    pub position: Vec2,
    pub half_extents: Vec2,
    pub debug_name: &'static str,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Counters a scene can surface to the loop metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneCounters {
    pub corrections: u64,
    pub replayed_moves: u64,
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_spawns: Vec<Entity>,
    pending_despawns: Vec<EntityId>,
    collision: CollisionWorld,
    timers: TimerManager,
    overlaps: OverlapTracker,
    pending_overlap_events: Vec<OverlapEvent>,
}

impl SceneWorld {
    pub fn spawn(&mut self, desc: EntityDesc) -> EntityId {
        self.spawn_internal(desc, false, false)
    }

    pub fn spawn_actor(&mut self, desc: EntityDesc) -> EntityId {
        self.spawn_internal(desc, true, false)
    }

    pub fn spawn_trigger(&mut self, desc: EntityDesc) -> EntityId {
        self.spawn_internal(desc, false, true)
    }

    fn spawn_internal(&mut self, desc: EntityDesc, actor: bool, trigger: bool) -> EntityId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Entity {
            id,
            position: desc.position,
            half_extents: desc.half_extents,
            actor,
            trigger,
            alive: true,
            debug_name: desc.debug_name,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> bool {
        let mut found = false;
        for entity in self
            .entities
            .iter_mut()
            .chain(self.pending_spawns.iter_mut())
            .filter(|entity| entity.id == id)
        {
            entity.alive = false;
            found = true;
        }
        if found {
            self.pending_despawns.push(id);
        }
        found
    }

    /// Applies queued despawns and spawns. Despawned entities lose their timers
    /// and their overlaps end on the next `update_overlaps`.
    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort_by_key(|id| id.0);
            self.pending_despawns.dedup();
            for id in &self.pending_despawns {
                self.timers.clear_all_for_owner(*id);
                let ended = self.overlaps.remove_entity(*id);
                self.pending_overlap_events.extend(ended);
            }
            let pending = &self.pending_despawns;
            self.entities.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            self.pending_spawns.retain(|entity| {
                pending
                    .binary_search_by_key(&entity.id.0, |id| id.0)
                    .is_err()
            });
            self.pending_despawns.clear();
        }

        self.entities.append(&mut self.pending_spawns);
    }

    /// Recomputes trigger overlaps, including ends caused by despawns since the last call.
    pub fn update_overlaps(&mut self) -> Vec<OverlapEvent> {
        let volumes: Vec<(EntityId, Aabb)> = self
            .entities
            .iter()
            .filter(|entity| entity.trigger && entity.alive)
            .map(|entity| (entity.id, entity.bounds()))
            .collect();
        let actors: Vec<(EntityId, Aabb)> = self
            .entities
            .iter()
            .filter(|entity| entity.actor && entity.alive)
            .map(|entity| (entity.id, entity.bounds()))
            .collect();

        let mut events = std::mem::take(&mut self.pending_overlap_events);
        events.extend(self.overlaps.update(&volumes, &actors));
        events
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.pending_overlap_events.clear();
        self.collision.clear();
        self.timers.clear();
        self.overlaps.clear();
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.find_entity(id).is_some_and(|entity| entity.alive)
    }

    pub fn set_entity_position(&mut self, id: EntityId, position: Vec2) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn collision(&self) -> &CollisionWorld {
        &self.collision
    }

    pub fn set_collision(&mut self, collision: CollisionWorld) {
        self.collision = collision;
    }

    pub fn timers(&self) -> &TimerManager {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerManager {
        &mut self.timers
    }

    pub fn overlaps(&self) -> &OverlapTracker {
        &self.overlaps
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    /// Handles `SceneCommand::ResetLevel`. Defaults to a full reload.
    fn reset(&mut self, world: &mut SceneWorld) {
        self.unload(world);
        world.clear();
        self.load(world);
    }
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
    fn debug_counters(&self) -> SceneCounters {
        SceneCounters::default()
    }
}
