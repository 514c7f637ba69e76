use engine::{
    EntityDesc, EntityId, InputAction, InputSnapshot, OverlapEvent, Scene, SceneCommand,
    SceneCounters, SceneWorld, TimerHandle,
};
use tracing::{error, info, warn};

use crate::character::{PlatformerCharacter, CHARACTER_HALF_EXTENTS};
use crate::chest::Chest;
use crate::config::PlatformerConfig;
use crate::interactable::{Interactable, InteractableConfig, InteractableNotification};
use crate::level::{Level, LevelError};
use crate::session::NetSession;

/// An interactable placed in the level.
#[derive(Debug)]
pub enum InteractableActor {
    Lever(Interactable),
    Chest(Chest),
}

impl InteractableActor {
    pub fn id(&self) -> EntityId {
        self.interactable().id()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lever(_) => "lever",
            Self::Chest(_) => "chest",
        }
    }

    pub fn interactable(&self) -> &Interactable {
        match self {
            Self::Lever(lever) => lever,
            Self::Chest(chest) => chest.interactable(),
        }
    }

    fn interactable_mut(&mut self) -> &mut Interactable {
        match self {
            Self::Lever(lever) => lever,
            Self::Chest(chest) => chest.interactable_mut(),
        }
    }

    pub fn as_chest(&self) -> Option<&Chest> {
        match self {
            Self::Chest(chest) => Some(chest),
            Self::Lever(_) => None,
        }
    }

    fn interact(&mut self, world: &mut SceneWorld, actor: EntityId) -> bool {
        match self {
            Self::Lever(lever) => lever.interact(world, actor),
            Self::Chest(chest) => chest.interact(world, actor),
        }
    }

    fn on_timer_fired(&mut self, world: &SceneWorld, handle: TimerHandle) -> bool {
        self.interactable_mut().on_timer_fired(world, handle)
    }

    fn reset_level(&mut self, world: &mut SceneWorld) {
        self.interactable_mut().cancel_reset_timer(world);
        match self {
            Self::Lever(lever) => lever.reset(&*world),
            Self::Chest(chest) => chest.reset(&*world),
        }
    }
}

/// Single-level platformer driven through a client/server session.
pub struct PlatformerScene {
    config: PlatformerConfig,
    session: Option<NetSession>,
    player_entity: Option<EntityId>,
    interactables: Vec<InteractableActor>,
    last_notifications: Vec<(EntityId, InteractableNotification)>,
}

impl PlatformerScene {
    pub fn new(config: PlatformerConfig) -> Result<Self, LevelError> {
        config.level.validate()?;
        Ok(Self {
            config,
            session: None,
            player_entity: None,
            interactables: Vec::new(),
            last_notifications: Vec::new(),
        })
    }

    pub fn session(&self) -> Option<&NetSession> {
        self.session.as_ref()
    }

    pub fn player(&self) -> Option<&PlatformerCharacter> {
        self.session.as_ref().map(NetSession::client)
    }

    pub fn player_entity(&self) -> Option<EntityId> {
        self.player_entity
    }

    pub fn interactables(&self) -> &[InteractableActor] {
        &self.interactables
    }

    /// Notifications raised during the most recent update.
    pub fn last_notifications(&self) -> &[(EntityId, InteractableNotification)] {
        &self.last_notifications
    }

    fn start_session(&mut self) -> Option<&mut NetSession> {
        let level = match Level::from_layout(&self.config.level) {
            Ok(level) => level,
            Err(err) => {
                error!(error = %err, "level_build_failed");
                return None;
            }
        };
        let session = NetSession::new(&self.config, level, self.config.network);
        Some(self.session.insert(session))
    }

    fn apply_player_input(player: &mut PlatformerCharacter, input: &InputSnapshot) {
        player.move_right(input.axis(InputAction::MoveLeft, InputAction::MoveRight));
        player.move_up(input.axis(InputAction::MoveDown, InputAction::MoveUp));
        if input.pressed(InputAction::Jump) {
            player.jump();
        }
        if input.released(InputAction::Jump) {
            player.stop_jumping();
        }
        if input.pressed(InputAction::Climb) {
            player.start_climb();
        }
        if input.released(InputAction::Climb) {
            player.stop_climb();
        }
    }

    fn route_overlaps(&mut self, world: &mut SceneWorld) {
        for event in world.update_overlaps() {
            let Some(target) = self
                .interactables
                .iter_mut()
                .find(|candidate| candidate.id() == event.volume())
            else {
                continue;
            };
            match event {
                OverlapEvent::Begin { actor, .. } => {
                    target.interactable_mut().on_overlap_begin(&*world, actor);
                }
                OverlapEvent::End { actor, .. } => {
                    target.interactable_mut().on_overlap_end(actor);
                }
            }
        }
    }

    /// Interacts with the first enabled interactable the actor overlaps, falling
    /// back to a disabled one so the ignored attempt is still logged.
    fn interact_with_overlapping(&mut self, world: &mut SceneWorld, actor: EntityId) {
        let overlapping: Vec<usize> = self
            .interactables
            .iter()
            .enumerate()
            .filter(|(_, candidate)| world.overlaps().is_overlapping(candidate.id(), actor))
            .map(|(index, _)| index)
            .collect();
        let Some(index) = overlapping
            .iter()
            .copied()
            .find(|index| self.interactables[*index].interactable().is_enabled())
            .or_else(|| overlapping.first().copied())
        else {
            return;
        };
        let target = &mut self.interactables[index];
        if !target.interact(world, actor) {
            info!(interactable = target.id().0, kind = target.kind(), "interact_ignored");
        }
    }

    fn dispatch_timers(&mut self, world: &mut SceneWorld, dt: f32) {
        for fired in world.timers_mut().advance(dt) {
            let claimed = self
                .interactables
                .iter_mut()
                .find(|candidate| candidate.id() == fired.owner)
                .is_some_and(|target| target.on_timer_fired(&*world, fired.handle));
            if !claimed {
                warn!(owner = fired.owner.0, "unclaimed_timer");
            }
        }
    }

    fn collect_notifications(&mut self) {
        for target in &mut self.interactables {
            let id = target.id();
            let kind = target.kind();
            for notification in target.interactable_mut().drain_notifications() {
                match notification {
                    InteractableNotification::Begin => {
                        info!(interactable = id.0, kind, "interactable_begin");
                    }
                    InteractableNotification::End => {
                        info!(interactable = id.0, kind, "interactable_end");
                    }
                    InteractableNotification::Interacted { actor } => {
                        info!(interactable = id.0, kind, actor = actor.0, "interacted");
                    }
                }
                self.last_notifications.push((id, notification));
            }
        }
    }
}

impl Scene for PlatformerScene {
    fn load(&mut self, world: &mut SceneWorld) {
        let Some(session) = self.start_session() else {
            return;
        };
        let level = session.level();
        world.set_collision(level.collision().clone());
        let spawn = level.spawn();

        self.player_entity = Some(world.spawn_actor(EntityDesc {
            position: spawn,
            half_extents: CHARACTER_HALF_EXTENTS,
            debug_name: "player",
        }));

        self.interactables.clear();
        for desc in &self.config.level.chests {
            let id = world.spawn_trigger(EntityDesc {
                position: desc.position,
                half_extents: desc.half_extents,
                debug_name: "chest",
            });
            self.interactables
                .push(InteractableActor::Chest(Chest::new(id, desc.config.clone())));
        }
        for desc in &self.config.level.interactables {
            let id = world.spawn_trigger(EntityDesc {
                position: desc.position,
                half_extents: desc.half_extents,
                debug_name: "lever",
            });
            let config = InteractableConfig {
                reset_delay_seconds: desc.reset_delay_seconds,
            };
            self.interactables
                .push(InteractableActor::Lever(Interactable::new(id, config)));
        }
        info!(
            interactables = self.interactables.len(),
            volumes = self.config.level.climbable_volumes.len(),
            "platformer_scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        self.last_notifications.clear();
        let (Some(session), Some(player_entity)) = (self.session.as_mut(), self.player_entity)
        else {
            return SceneCommand::None;
        };

        Self::apply_player_input(session.client_mut(), input);
        session.tick(fixed_dt_seconds);
        let kill_height = session.level().kill_height();
        let position = session.client().position();

        if let Some(position) = position {
            world.set_entity_position(player_entity, position);
        }
        self.route_overlaps(world);
        if input.pressed(InputAction::Interact) {
            self.interact_with_overlapping(world, player_entity);
        }
        self.dispatch_timers(world, fixed_dt_seconds);
        self.collect_notifications();

        if position.is_some_and(|position| position.y < kill_height) {
            info!(kill_height, "player_fell");
            return SceneCommand::ResetLevel;
        }
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        for target in &mut self.interactables {
            target.interactable_mut().destroy(world);
        }
        self.interactables.clear();
        self.session = None;
        self.player_entity = None;
        info!("platformer_scene_unloaded");
    }

    fn reset(&mut self, world: &mut SceneWorld) {
        for target in &mut self.interactables {
            target.reset_level(world);
        }
        self.collect_notifications();
        let Some(session) = self.start_session() else {
            return;
        };
        let spawn = session.level().spawn();
        if let Some(player_entity) = self.player_entity {
            world.set_entity_position(player_entity, spawn);
        }
        info!(x = spawn.x, y = spawn.y, "player_respawned");
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        let player = self.player()?;
        Some(format!(
            "platformer | {:?} | climbing={} | volumes={}",
            player.animation(),
            player.climbing().is_climbing(),
            player.climbable_volume_count()
        ))
    }

    fn debug_counters(&self) -> SceneCounters {
        self.session
            .as_ref()
            .map(NetSession::counters)
            .unwrap_or_default()
    }
}
