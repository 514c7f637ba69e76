use engine::{
    run_headless, HeadlessFrame, InputAction, InputSnapshot, LoopConfig, MetricsHandle, NetRole,
    PredictedMovement, Scene, SceneCommand, SceneWorld, Vec2,
};

use crate::character::PlatformerCharacter;
use crate::climbing::{ClimbEndReason, ClimbEvent, ClimbTuning};
use crate::config::PlatformerConfig;
use crate::interactable::{InteractableNotification, InteractableState};
use crate::level::{BoxDesc, ChestDesc, InteractableDesc, Level, LevelLayout};
use crate::saved_move::ClimbSavedMove;
use crate::scene::PlatformerScene;
use crate::session::NetSessionConfig;
use engine::{ClientPredictionData, SavedMove};

const DT: f32 = 1.0 / 60.0;

fn layout_with_spawn(spawn: Vec2) -> LevelLayout {
    LevelLayout {
        spawn,
        ..LevelLayout::default()
    }
}

fn loaded_scene(layout: LevelLayout) -> (PlatformerScene, SceneWorld) {
    let config = PlatformerConfig {
        level: layout,
        network: NetSessionConfig {
            latency_ticks: 0,
            allow_move_combining: true,
        },
        ..PlatformerConfig::default()
    };
    let mut scene = PlatformerScene::new(config).expect("scene");
    let mut world = SceneWorld::default();
    scene.load(&mut world);
    world.apply_pending();
    (scene, world)
}

fn step(scene: &mut PlatformerScene, world: &mut SceneWorld, input: &InputSnapshot) -> SceneCommand {
    let command = scene.update(DT, input, world);
    world.apply_pending();
    command
}

fn idle(scene: &mut PlatformerScene, world: &mut SceneWorld, ticks: usize) {
    for _ in 0..ticks {
        step(scene, world, &InputSnapshot::empty());
    }
}

fn press(action: InputAction) -> InputSnapshot {
    InputSnapshot::empty().with_action_pressed(action)
}

fn notifications_of(scene: &PlatformerScene) -> Vec<InteractableNotification> {
    scene
        .last_notifications()
        .iter()
        .map(|(_, notification)| *notification)
        .collect()
}

#[test]
fn chest_opens_once_and_stays_open() {
    let (mut scene, mut world) = loaded_scene(layout_with_spawn(Vec2::new(-200.0, 28.05)));
    step(&mut scene, &mut world, &InputSnapshot::empty());
    assert_eq!(notifications_of(&scene), vec![InteractableNotification::Begin]);

    step(&mut scene, &mut world, &press(InputAction::Interact));
    let chest = scene.interactables()[0].as_chest().expect("chest");
    assert!(chest.is_opened());
    assert_eq!(chest.visible_sprite(), Some("chest_opened"));

    idle(&mut scene, &mut world, 3);
    step(&mut scene, &mut world, &press(InputAction::Interact));
    let chest = scene.interactables()[0].as_chest().expect("chest");
    assert!(chest.is_opened());
    assert!(notifications_of(&scene).is_empty());
}

#[test]
fn lever_resets_and_fires_begin_again_while_occupied() {
    let (mut scene, mut world) = loaded_scene(layout_with_spawn(Vec2::new(-400.0, 28.05)));
    step(&mut scene, &mut world, &InputSnapshot::empty());
    assert_eq!(notifications_of(&scene), vec![InteractableNotification::Begin]);

    step(&mut scene, &mut world, &press(InputAction::Interact));
    let player = scene.player_entity().expect("player");
    assert_eq!(
        notifications_of(&scene),
        vec![
            InteractableNotification::Interacted { actor: player },
            InteractableNotification::End
        ]
    );
    let lever = scene.interactables()[1].interactable();
    assert_eq!(lever.state(), InteractableState::Disabled);

    let mut begins = 0;
    for _ in 0..125 {
        step(&mut scene, &mut world, &InputSnapshot::empty());
        begins += notifications_of(&scene)
            .iter()
            .filter(|notification| **notification == InteractableNotification::Begin)
            .count();
    }
    assert_eq!(begins, 1);
    let lever = scene.interactables()[1].interactable();
    assert_eq!(lever.state(), InteractableState::EnabledActive);
}

#[test]
fn interact_skips_an_opened_chest_for_a_lever_on_the_same_spot() {
    let layout = LevelLayout {
        spawn: Vec2::new(-200.0, 28.05),
        interactables: vec![InteractableDesc {
            position: Vec2::new(-200.0, 16.0),
            half_extents: Vec2::new(16.0, 16.0),
            reset_delay_seconds: 5.0,
        }],
        ..LevelLayout::default()
    };
    let (mut scene, mut world) = loaded_scene(layout);
    let player = scene.player_entity().expect("player");
    step(&mut scene, &mut world, &InputSnapshot::empty());

    step(&mut scene, &mut world, &press(InputAction::Interact));
    assert!(scene.interactables()[0].as_chest().expect("chest").is_opened());
    assert!(scene.interactables()[1].interactable().is_enabled());

    idle(&mut scene, &mut world, 2);
    step(&mut scene, &mut world, &press(InputAction::Interact));
    let lever = scene.interactables()[1].interactable();
    assert_eq!(lever.state(), InteractableState::Disabled);
    assert!(scene
        .last_notifications()
        .contains(&(lever.id(), InteractableNotification::Interacted { actor: player })));
}

#[test]
fn walking_away_ends_interaction() {
    let (mut scene, mut world) = loaded_scene(layout_with_spawn(Vec2::new(-200.0, 28.05)));
    step(&mut scene, &mut world, &InputSnapshot::empty());

    let mut ended = false;
    for _ in 0..40 {
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveRight, true);
        step(&mut scene, &mut world, &input);
        ended |= notifications_of(&scene).contains(&InteractableNotification::End);
    }
    assert!(ended);
    let chest = scene.interactables()[0].interactable();
    assert_eq!(chest.state(), InteractableState::EnabledIdle);
}

#[test]
fn falling_out_of_the_level_requests_reset_and_closes_chests() {
    let layout = LevelLayout {
        spawn: Vec2::new(-200.0, 28.05),
        solids: vec![BoxDesc::new(Vec2::new(-250.0, -100.0), Vec2::new(-150.0, 0.0))],
        ..LevelLayout::default()
    };
    let (mut scene, mut world) = loaded_scene(layout);
    step(&mut scene, &mut world, &InputSnapshot::empty());
    step(&mut scene, &mut world, &press(InputAction::Interact));
    assert!(scene.interactables()[0].as_chest().expect("chest").is_opened());

    let mut command = SceneCommand::None;
    for _ in 0..240 {
        let input = InputSnapshot::empty().with_action_down(InputAction::MoveRight, true);
        command = step(&mut scene, &mut world, &input);
        if command == SceneCommand::ResetLevel {
            break;
        }
    }
    assert_eq!(command, SceneCommand::ResetLevel);

    scene.reset(&mut world);
    world.apply_pending();
    assert!(!scene.interactables()[0].as_chest().expect("chest").is_opened());
    let position = scene.player().and_then(PlatformerCharacter::position).expect("player");
    assert_eq!(position, Vec2::new(-200.0, 28.05));
}

#[test]
fn climbing_through_scene_input() {
    let (mut scene, mut world) = loaded_scene(layout_with_spawn(Vec2::new(320.0, 28.05)));
    idle(&mut scene, &mut world, 2);

    let climb_up = InputSnapshot::empty()
        .with_action_down(InputAction::Climb, true)
        .with_action_down(InputAction::MoveUp, true);
    step(&mut scene, &mut world, &press(InputAction::Climb));
    for _ in 0..60 {
        step(&mut scene, &mut world, &climb_up);
    }
    let player = scene.player().expect("player");
    assert!(player.climbing().is_climbing());
    assert!(player.position().expect("body").y > 100.0);

    step(
        &mut scene,
        &mut world,
        &InputSnapshot::empty().with_action_released(InputAction::Climb),
    );
    assert!(!scene.player().expect("player").climbing().is_climbing());
}

#[test]
fn headless_run_reports_ticks_and_counters() {
    let config = PlatformerConfig::default();
    let mut scene = PlatformerScene::new(config).expect("scene");
    let loop_config = LoopConfig::default();
    let frames: Vec<HeadlessFrame> = (0..90)
        .map(|_| {
            HeadlessFrame::new(
                loop_config.fixed_dt(),
                InputSnapshot::empty().with_action_down(InputAction::MoveRight, true),
            )
        })
        .collect();
    let metrics = MetricsHandle::default();
    let report = run_headless(&loop_config, &mut scene, frames, &metrics).expect("run");
    assert_eq!(report.frames, 90);
    assert_eq!(report.ticks, 90);
    assert_eq!(report.resets, 0);
    let published = metrics.snapshot();
    assert!(published.ticks_per_second > 0.0);
    assert_eq!(published.corrections, 0);
}

fn ladder_level() -> Level {
    Level::from_layout(&LevelLayout::default()).expect("level")
}

fn climber(level: &Level, role: NetRole, spawn: Vec2) -> PlatformerCharacter {
    let mut character = PlatformerCharacter::new(
        role,
        engine::MovementParams::default(),
        ClimbTuning::default(),
        spawn,
    );
    character.refresh_climbable_volumes(level);
    character
}

/// Scripted climb: start, climb, jump off, wait out the cooldown, climb again.
fn climb_script(tick: usize, character: &mut PlatformerCharacter) {
    match tick {
        2 => character.start_climb(),
        3..=40 => character.move_up(1.0),
        41 => character.jump(),
        42 => character.stop_jumping(),
        50..=70 => character.move_right(-0.2),
        _ => {}
    }
}

fn snapshot(character: &PlatformerCharacter) -> (Vec2, Vec2, engine::MovementMode, f32) {
    let movement = character.movement();
    (
        movement.position().expect("body"),
        movement.velocity(),
        movement.mode(),
        character.climbing().climb_cooldown(),
    )
}

fn assert_replay_matches_live(allow_move_combining: bool) {
    let level = ladder_level();
    let spawn = Vec2::new(320.0, 28.05);
    let mut client = climber(&level, NetRole::AutonomousProxy, spawn);
    client.set_move_combining(allow_move_combining);
    let start = snapshot(&client);

    let mut events = Vec::new();
    for tick in 0..90 {
        climb_script(tick, &mut client);
        client.replicate_move(&level, DT);
        events.extend(client.climbing_mut().drain_events());
    }
    assert!(events.contains(&ClimbEvent::Started));
    assert!(events.contains(&ClimbEvent::Ended {
        reason: ClimbEndReason::Jumped
    }));
    let live = snapshot(&client);

    // A correction to the exact starting state replays the whole buffer.
    let correction = engine::MoveCorrection {
        sequence: 0,
        location: start.0,
        velocity: start.1,
        mode: start.2,
    };
    let replayed = client.handle_correction(&level, &correction);
    assert!(replayed > 0);
    let replay = snapshot(&client);
    assert!(live.0.distance_squared(replay.0) < 1.0e-6, "{live:?} vs {replay:?}");
    assert!(live.1.distance_squared(replay.1) < 1.0e-6);
    assert_eq!(live.2, replay.2);
    assert!((live.3 - replay.3).abs() < 1.0e-6);
    assert!(client.climbing_mut().drain_events().is_empty());
}

#[test]
fn replay_reproduces_live_prediction_with_combining() {
    assert_replay_matches_live(true);
}

#[test]
fn replay_reproduces_live_prediction_without_combining() {
    assert_replay_matches_live(false);
}

#[test]
fn combined_moves_stay_within_delta_budget_and_order() {
    let level = ladder_level();
    let mut client = climber(&level, NetRole::AutonomousProxy, Vec2::new(320.0, 28.05));
    let mut data: ClientPredictionData<ClimbSavedMove> = ClientPredictionData::new();

    for tick in 0..120 {
        climb_script(tick, &mut client);
        let acceleration = client.consume_input_acceleration();
        data.replicate_move(&mut client, &level, DT, acceleration);
    }
    assert!(data.stats().combined_moves > 0);
    for saved in data.saved_moves().chain(data.pending_move()) {
        let core = saved.core();
        assert!(core.delta_time <= 0.125 + 1.0e-6);
    }
    let mut previous: Option<&ClimbSavedMove> = None;
    for saved in data.saved_moves() {
        if let Some(previous) = previous {
            assert!(previous.core().sequence < saved.core().sequence);
        }
        previous = Some(saved);
    }
}

#[test]
fn volume_reference_counting_a_then_b() {
    let level = ladder_level();
    let mut character = climber(&level, NetRole::Authority, Vec2::new(0.0, 28.05));
    let a = &level.volumes()[0];
    let b = &level.volumes()[1];

    a.on_overlap_begin(&mut character);
    b.on_overlap_begin(&mut character);
    a.on_overlap_end(&mut character);
    assert!(character.climbing().climb_eligible());
    b.on_overlap_end(&mut character);
    assert!(!character.climbing().climb_eligible());
}

#[test]
fn level_file_round_trip_through_config() {
    let layout = LevelLayout {
        chests: vec![ChestDesc {
            position: Vec2::new(10.0, 16.0),
            half_extents: Vec2::new(8.0, 8.0),
            config: None,
        }],
        interactables: vec![InteractableDesc {
            position: Vec2::new(50.0, 16.0),
            half_extents: Vec2::new(8.0, 8.0),
            reset_delay_seconds: 0.25,
        }],
        ..LevelLayout::default()
    };
    let raw = serde_json::to_string(&layout).expect("encode");
    assert_eq!(LevelLayout::from_json_str(&raw).expect("decode"), layout);
}
