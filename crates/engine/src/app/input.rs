#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Jump,
    Climb,
    Interact,
    Quit,
}

const ACTION_COUNT: usize = 8;

impl InputAction {
    pub const ALL: [InputAction; ACTION_COUNT] = [
        InputAction::MoveLeft,
        InputAction::MoveRight,
        InputAction::MoveUp,
        InputAction::MoveDown,
        InputAction::Jump,
        InputAction::Climb,
        InputAction::Interact,
        InputAction::Quit,
    ];

    const fn index(self) -> usize {
        match self {
            InputAction::MoveLeft => 0,
            InputAction::MoveRight => 1,
            InputAction::MoveUp => 2,
            InputAction::MoveDown => 3,
            InputAction::Jump => 4,
            InputAction::Climb => 5,
            InputAction::Interact => 6,
            InputAction::Quit => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }
}

/// Turns held-action states into per-tick snapshots with press/release edges.
/// Edges are reported on the first tick after the change only.
#[derive(Debug, Default)]
pub(crate) struct InputCollector {
    held: ActionStates,
    pressed: ActionStates,
    released: ActionStates,
}

impl InputCollector {
    pub(crate) fn set_held(&mut self, held: ActionStates) {
        for action in InputAction::ALL {
            let was_down = self.held.is_down(action);
            let is_down = held.is_down(action);
            if is_down && !was_down {
                self.pressed.set(action, true);
            }
            if !is_down && was_down {
                self.released.set(action, true);
            }
        }
        self.held = held;
    }

    pub(crate) fn snapshot_for_tick(&mut self) -> super::InputSnapshot {
        let snapshot = super::InputSnapshot::from_states(self.held, self.pressed, self.released);
        self.pressed = ActionStates::default();
        self.released = ActionStates::default();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(actions: &[InputAction]) -> ActionStates {
        let mut states = ActionStates::default();
        for action in actions {
            states.set(*action, true);
        }
        states
    }

    #[test]
    fn press_is_edge_triggered_for_single_tick() {
        let mut input = InputCollector::default();
        input.set_held(held(&[InputAction::Jump]));

        let first = input.snapshot_for_tick();
        let second = input.snapshot_for_tick();

        assert!(first.pressed(InputAction::Jump));
        assert!(!second.pressed(InputAction::Jump));
        assert!(second.is_down(InputAction::Jump));
    }

    #[test]
    fn held_action_does_not_spam_press_edges() {
        let mut input = InputCollector::default();
        input.set_held(held(&[InputAction::Climb]));
        let first = input.snapshot_for_tick();
        input.set_held(held(&[InputAction::Climb]));
        let second = input.snapshot_for_tick();
        input.set_held(held(&[]));
        let third = input.snapshot_for_tick();

        assert!(first.pressed(InputAction::Climb));
        assert!(!second.pressed(InputAction::Climb));
        assert!(third.released(InputAction::Climb));
        assert!(!third.is_down(InputAction::Climb));
    }
}
