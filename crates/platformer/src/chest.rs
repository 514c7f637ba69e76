use engine::EntityId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::interactable::{
    Interactable, InteractableConfig, InteractableNotification, InteractionContext,
};

/// Sprite keys for the two chest states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChestConfig {
    pub closed_sprite: String,
    pub opened_sprite: String,
}

impl Default for ChestConfig {
    fn default() -> Self {
        Self {
            closed_sprite: "chest_closed".to_string(),
            opened_sprite: "chest_opened".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpriteSlot {
    pub sprite: Option<String>,
    pub visible: bool,
}

/// One-way openable chest. Only a level reset closes it again.
#[derive(Debug, Clone)]
pub struct Chest {
    interactable: Interactable,
    opened: bool,
    config: Option<ChestConfig>,
    closed_slot: SpriteSlot,
    opened_slot: SpriteSlot,
}

impl Chest {
    pub fn new(id: EntityId, config: Option<ChestConfig>) -> Self {
        let mut chest = Self {
            interactable: Interactable::new(id, InteractableConfig::default()),
            opened: false,
            config,
            closed_slot: SpriteSlot::default(),
            opened_slot: SpriteSlot::default(),
        };
        chest.refresh_config();
        chest.set_opened(false);
        chest
    }

    pub fn id(&self) -> EntityId {
        self.interactable.id()
    }

    pub fn interactable(&self) -> &Interactable {
        &self.interactable
    }

    pub fn interactable_mut(&mut self) -> &mut Interactable {
        &mut self.interactable
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn closed_slot(&self) -> &SpriteSlot {
        &self.closed_slot
    }

    pub fn opened_slot(&self) -> &SpriteSlot {
        &self.opened_slot
    }

    /// The sprite currently shown, if any.
    pub fn visible_sprite(&self) -> Option<&str> {
        [&self.closed_slot, &self.opened_slot]
            .into_iter()
            .find(|slot| slot.visible)
            .and_then(|slot| slot.sprite.as_deref())
    }

    /// Opens the chest. Returns false when it was already open.
    pub fn interact(&mut self, ctx: &mut impl InteractionContext, actor: EntityId) -> bool {
        if self.opened {
            return false;
        }
        if !self.interactable.interact(ctx, actor) {
            return false;
        }
        self.set_opened(true);
        info!(chest = self.id().0, actor = actor.0, "chest_opened");
        true
    }

    fn set_opened(&mut self, opened: bool) {
        self.opened = opened;
        self.closed_slot.visible = !opened;
        self.opened_slot.visible = opened;
    }

    /// Applies an opened flag received from the authority.
    pub fn on_rep_opened(&mut self, opened: bool) {
        self.set_opened(opened);
    }

    /// Level reset: closes the chest and makes it usable again.
    pub fn reset(&mut self, ctx: &impl InteractionContext) {
        self.interactable.reset(ctx);
        self.set_opened(false);
    }

    pub fn set_config(&mut self, config: Option<ChestConfig>) {
        self.config = config;
        self.refresh_config();
    }

    pub fn refresh_config(&mut self) {
        match &self.config {
            Some(config) => {
                self.closed_slot.sprite = Some(config.closed_sprite.clone());
                self.opened_slot.sprite = Some(config.opened_sprite.clone());
            }
            None => {
                self.closed_slot.sprite = None;
                self.opened_slot.sprite = None;
            }
        }
    }

    pub fn drain_notifications(&mut self) -> Vec<InteractableNotification> {
        self.interactable.drain_notifications()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactable::test_support::FakeContext;
    use crate::interactable::InteractableState;

    const CHEST: EntityId = EntityId(20);
    const HERO: EntityId = EntityId(1);

    fn setup() -> (Chest, FakeContext) {
        let mut ctx = FakeContext::default();
        ctx.alive.insert(HERO);
        ctx.overlaps.insert(CHEST, vec![HERO]);
        (Chest::new(CHEST, Some(ChestConfig::default())), ctx)
    }

    #[test]
    fn opening_is_one_way() {
        let (mut chest, mut ctx) = setup();
        assert_eq!(chest.visible_sprite(), Some("chest_closed"));

        assert!(chest.interact(&mut ctx, HERO));
        assert!(chest.is_opened());
        assert_eq!(chest.visible_sprite(), Some("chest_opened"));
        assert_eq!(chest.interactable().state(), InteractableState::Disabled);

        assert!(!chest.interact(&mut ctx, HERO));
        assert!(chest.is_opened());
        assert_eq!(ctx.timers.active_count(), 0);
    }

    #[test]
    fn level_reset_closes_and_reenables() {
        let (mut chest, mut ctx) = setup();
        chest.interact(&mut ctx, HERO);
        chest.drain_notifications();

        chest.reset(&ctx);
        assert!(!chest.is_opened());
        assert_eq!(chest.visible_sprite(), Some("chest_closed"));
        assert_eq!(chest.interactable().state(), InteractableState::EnabledActive);
        assert_eq!(chest.drain_notifications(), vec![InteractableNotification::Begin]);
    }

    #[test]
    fn missing_config_clears_sprites() {
        let (mut chest, _ctx) = setup();
        chest.set_config(None);
        assert_eq!(chest.closed_slot().sprite, None);
        assert_eq!(chest.opened_slot().sprite, None);
        assert!(chest.closed_slot().visible);

        chest.set_config(Some(ChestConfig {
            closed_sprite: "crate_shut".to_string(),
            opened_sprite: "crate_open".to_string(),
        }));
        assert_eq!(chest.visible_sprite(), Some("crate_shut"));
    }

    #[test]
    fn replicated_open_flag_swaps_visibility() {
        let (mut chest, _ctx) = setup();
        chest.on_rep_opened(true);
        assert!(chest.opened_slot().visible);
        assert!(!chest.closed_slot().visible);
    }
}
