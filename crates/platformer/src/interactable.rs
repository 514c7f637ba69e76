use std::collections::BTreeSet;

use engine::{EntityId, SceneWorld, TimerHandle, TimerManager};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What an interactable needs to know about the world around it.
pub trait InteractionContext {
    /// Whether `actor` still exists and may take part in interactions.
    fn is_eligible_actor(&self, actor: EntityId) -> bool;
    /// Eligible actors currently overlapping `interactable`.
    fn overlapping_actors(&self, interactable: EntityId) -> Vec<EntityId>;
    fn timers(&mut self) -> &mut TimerManager;
}

impl InteractionContext for SceneWorld {
    fn is_eligible_actor(&self, actor: EntityId) -> bool {
        self.find_entity(actor)
            .is_some_and(|entity| entity.alive && entity.actor)
    }

    fn overlapping_actors(&self, interactable: EntityId) -> Vec<EntityId> {
        self.overlaps()
            .overlapping_actors(interactable)
            .into_iter()
            .filter(|actor| self.is_eligible_actor(*actor))
            .collect()
    }

    fn timers(&mut self) -> &mut TimerManager {
        self.timers_mut()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InteractableConfig {
    /// Seconds until a used interactable re-enables itself. Zero keeps it disabled.
    pub reset_delay_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractableState {
    Disabled,
    EnabledIdle,
    EnabledActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractableNotification {
    Begin,
    End,
    Interacted { actor: EntityId },
}

/// Overlap-scoped interaction with enable, disable and timed reset.
#[derive(Debug, Clone)]
pub struct Interactable {
    id: EntityId,
    enabled: bool,
    overlapping: BTreeSet<EntityId>,
    reset_timer: Option<TimerHandle>,
    config: InteractableConfig,
    notifications: Vec<InteractableNotification>,
}

impl Interactable {
    pub fn new(id: EntityId, config: InteractableConfig) -> Self {
        Self {
            id,
            enabled: true,
            overlapping: BTreeSet::new(),
            reset_timer: None,
            config,
            notifications: Vec::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn config(&self) -> &InteractableConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> InteractableState {
        match (self.enabled, self.overlapping.is_empty()) {
            (false, _) => InteractableState::Disabled,
            (true, true) => InteractableState::EnabledIdle,
            (true, false) => InteractableState::EnabledActive,
        }
    }

    pub fn overlapping_count(&self) -> usize {
        self.overlapping.len()
    }

    pub fn reset_timer(&self) -> Option<TimerHandle> {
        self.reset_timer
    }

    pub fn drain_notifications(&mut self) -> Vec<InteractableNotification> {
        std::mem::take(&mut self.notifications)
    }

    fn notify(&mut self, notification: InteractableNotification) {
        debug!(interactable = self.id.0, ?notification, "interactable_notification");
        self.notifications.push(notification);
    }

    pub fn on_overlap_begin(&mut self, ctx: &impl InteractionContext, actor: EntityId) {
        if !self.enabled || !ctx.is_eligible_actor(actor) {
            return;
        }
        let was_empty = self.overlapping.is_empty();
        if self.overlapping.insert(actor) && was_empty {
            self.notify(InteractableNotification::Begin);
        }
    }

    pub fn on_overlap_end(&mut self, actor: EntityId) {
        if !self.enabled {
            return;
        }
        if self.overlapping.remove(&actor) && self.overlapping.is_empty() {
            self.notify(InteractableNotification::End);
        }
    }

    /// Uses the interactable. Ignored while disabled or for ineligible actors.
    pub fn interact(&mut self, ctx: &mut impl InteractionContext, actor: EntityId) -> bool {
        if !self.enabled || !ctx.is_eligible_actor(actor) {
            return false;
        }
        self.notify(InteractableNotification::Interacted { actor });

        if self.config.reset_delay_seconds > 0.0 {
            self.cancel_reset_timer(ctx);
            self.reset_timer = ctx
                .timers()
                .set_timer(self.id, self.config.reset_delay_seconds);
        }
        self.set_enabled(&*ctx, false);
        true
    }

    /// Single state-transition path for local and replicated enable changes.
    pub fn set_enabled(&mut self, ctx: &impl InteractionContext, enabled: bool) {
        self.enabled = enabled;
        self.overlapping.clear();
        if !enabled {
            self.notify(InteractableNotification::End);
            return;
        }

        self.overlapping.extend(ctx.overlapping_actors(self.id));
        if self.overlapping.is_empty() {
            self.notify(InteractableNotification::End);
        } else {
            self.notify(InteractableNotification::Begin);
        }
    }

    pub fn reset(&mut self, ctx: &impl InteractionContext) {
        info!(interactable = self.id.0, "interactable_reset");
        self.set_enabled(ctx, true);
    }

    /// Applies an enabled flag received from the authority.
    pub fn on_rep_enabled(&mut self, ctx: &impl InteractionContext, enabled: bool) {
        self.set_enabled(ctx, enabled);
    }

    /// Returns true when `handle` was this interactable's reset timer.
    pub fn on_timer_fired(&mut self, ctx: &impl InteractionContext, handle: TimerHandle) -> bool {
        if self.reset_timer != Some(handle) {
            return false;
        }
        self.reset_timer = None;
        self.reset(ctx);
        true
    }

    pub fn cancel_reset_timer(&mut self, ctx: &mut impl InteractionContext) {
        if let Some(handle) = self.reset_timer.take() {
            ctx.timers().clear_timer(handle);
        }
    }

    pub fn destroy(&mut self, ctx: &mut impl InteractionContext) {
        self.cancel_reset_timer(ctx);
        self.overlapping.clear();
        self.enabled = false;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::{BTreeMap, BTreeSet};

    use engine::{EntityId, TimerManager};

    use super::InteractionContext;

    /// Scripted world: explicit actor liveness and overlaps.
    #[derive(Debug, Default)]
    pub(crate) struct FakeContext {
        pub(crate) alive: BTreeSet<EntityId>,
        pub(crate) overlaps: BTreeMap<EntityId, Vec<EntityId>>,
        pub(crate) timers: TimerManager,
    }

    impl InteractionContext for FakeContext {
        fn is_eligible_actor(&self, actor: EntityId) -> bool {
            self.alive.contains(&actor)
        }

        fn overlapping_actors(&self, interactable: EntityId) -> Vec<EntityId> {
            self.overlaps
                .get(&interactable)
                .into_iter()
                .flatten()
                .copied()
                .filter(|actor| self.alive.contains(actor))
                .collect()
        }

        fn timers(&mut self) -> &mut TimerManager {
            &mut self.timers
        }
    }
}
