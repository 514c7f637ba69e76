use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use super::input::InputCollector;
use super::metrics::TickRateWindow;
use super::{InputSnapshot, MetricsHandle, Scene, SceneCommand, SceneWorld};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
        }
    }
}

impl LoopConfig {
    pub fn fixed_dt(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_tps.max(1) as f64)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("headless run needs at least one frame")]
    NoFrames,
}

/// One scripted frame: how much wall time passed and which actions are held.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessFrame {
    pub frame_dt: Duration,
    pub input: InputSnapshot,
}

impl HeadlessFrame {
    pub fn new(frame_dt: Duration, input: InputSnapshot) -> Self {
        Self { frame_dt, input }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessReport {
    pub frames: u64,
    pub ticks: u64,
    pub resets: u32,
    pub quit_requested: bool,
    pub dropped_backlog: Duration,
}

/// Drives `scene` with a fixed timestep from a scripted sequence of frames.
pub fn run_headless<I>(
    config: &LoopConfig,
    scene: &mut dyn Scene,
    frames: I,
    metrics_handle: &MetricsHandle,
) -> Result<HeadlessReport, AppError>
where
    I: IntoIterator<Item = HeadlessFrame>,
{
    let mut frames = frames.into_iter().peekable();
    if frames.peek().is_none() {
        return Err(AppError::NoFrames);
    }

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = config.fixed_dt();
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    let mut world = SceneWorld::default();
    scene.load(&mut world);
    world.apply_pending();
    info!(entity_count = world.entity_count(), "scene_loaded");

    let mut report = HeadlessReport::default();
    let mut input_collector = InputCollector::default();
    let mut accumulator = Duration::ZERO;
    let mut sim_clock = Duration::ZERO;
    let mut tick_rate = TickRateWindow::new(metrics_log_interval);

    'frames: for frame in frames {
        report.frames += 1;
        input_collector.set_held(frame.input.held_states());

        let clamped_frame_dt = clamp_frame_delta(frame.frame_dt, max_frame_delta);
        accumulator = accumulator.saturating_add(clamped_frame_dt);
        sim_clock = sim_clock.saturating_add(clamped_frame_dt);

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let input_snapshot = input_collector.snapshot_for_tick();
            let command = if input_snapshot.quit_requested() {
                SceneCommand::Quit
            } else {
                scene.update(fixed_dt_seconds, &input_snapshot, &mut world)
            };
            world.apply_pending();
            tick_rate.record_tick();
            report.ticks += 1;

            match command {
                SceneCommand::None => {}
                SceneCommand::ResetLevel => {
                    scene.reset(&mut world);
                    world.apply_pending();
                    report.resets += 1;
                    info!(entity_count = world.entity_count(), "level_reset");
                }
                SceneCommand::Quit => {
                    info!(reason = "scene_command", "shutdown_requested");
                    report.quit_requested = true;
                    break 'frames;
                }
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            report.dropped_backlog = report.dropped_backlog.saturating_add(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = tick_rate.close_if_elapsed(sim_clock, scene.debug_counters()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.ticks_per_second,
                corrections = snapshot.corrections,
                replayed_moves = snapshot.replayed_moves,
                entity_count = world.entity_count(),
                title = %scene.debug_title(&world).unwrap_or_default(),
                "loop_metrics"
            );
        }
    }

    scene.unload(&mut world);
    world.clear();
    info!(frames = report.frames, ticks = report.ticks, "shutdown");
    Ok(report)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{EntityDesc, InputAction};
    use crate::math::Vec2;

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        assert_eq!(
            clamp_frame_delta(Duration::from_millis(600), max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[derive(Default)]
    struct CountingScene {
        loads: u32,
        unloads: u32,
        updates: u32,
        jump_presses: u32,
        reset_on_update: Option<u32>,
    }

    impl Scene for CountingScene {
        fn load(&mut self, world: &mut SceneWorld) {
            self.loads += 1;
            world.spawn_actor(EntityDesc {
                position: Vec2::ZERO,
                half_extents: Vec2::new(1.0, 1.0),
                debug_name: "probe",
            });
        }

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            input: &InputSnapshot,
            _world: &mut SceneWorld,
        ) -> SceneCommand {
            self.updates += 1;
            if input.pressed(InputAction::Jump) {
                self.jump_presses += 1;
            }
            if self.reset_on_update == Some(self.updates) {
                return SceneCommand::ResetLevel;
            }
            SceneCommand::None
        }

        fn unload(&mut self, _world: &mut SceneWorld) {
            self.unloads += 1;
        }
    }

    fn frames(count: usize, input: InputSnapshot) -> Vec<HeadlessFrame> {
        vec![HeadlessFrame::new(Duration::from_millis(20), input); count]
    }

    #[test]
    fn headless_run_ticks_at_fixed_rate() {
        let mut scene = CountingScene::default();
        let config = LoopConfig::default();
        let held_jump = InputSnapshot::empty().with_action_down(InputAction::Jump, true);
        let two_ticks = HeadlessFrame::new(config.fixed_dt() * 2, held_jump);
        let report = run_headless(&config, &mut scene, vec![two_ticks; 36], &MetricsHandle::default())
            .expect("run");

        assert_eq!(report.frames, 36);
        assert_eq!(report.ticks, 72);
        assert_eq!(report.dropped_backlog, Duration::ZERO);
        assert_eq!(scene.updates, 72);
        assert_eq!(scene.jump_presses, 1);
        assert_eq!((scene.loads, scene.unloads), (1, 1));
    }

    #[test]
    fn fractional_frames_carry_the_remainder() {
        let mut scene = CountingScene::default();
        let config = LoopConfig::default();
        let report = run_headless(
            &config,
            &mut scene,
            frames(60, InputSnapshot::empty()),
            &MetricsHandle::default(),
        )
        .expect("run");

        let elapsed = Duration::from_millis(20) * 60;
        let expected = (elapsed.as_nanos() / config.fixed_dt().as_nanos()) as u64;
        assert_eq!(report.ticks, expected);
        assert_eq!(u64::from(scene.updates), expected);
    }

    #[test]
    fn quit_action_stops_the_run() {
        let mut scene = CountingScene::default();
        let quit = InputSnapshot::empty().with_action_down(InputAction::Quit, true);
        let mut script = frames(3, InputSnapshot::empty());
        script.extend(frames(3, quit));
        let report = run_headless(&LoopConfig::default(), &mut scene, script, &MetricsHandle::default())
            .expect("run");
        assert!(report.quit_requested);
        assert!(report.frames < 6);
    }

    #[test]
    fn reset_command_reloads_scene() {
        let mut scene = CountingScene {
            reset_on_update: Some(2),
            ..CountingScene::default()
        };
        let report = run_headless(
            &LoopConfig::default(),
            &mut scene,
            frames(5, InputSnapshot::empty()),
            &MetricsHandle::default(),
        )
        .expect("run");
        assert_eq!(report.resets, 1);
        assert_eq!(scene.loads, 2);
        assert_eq!(scene.unloads, 2);
    }

    #[test]
    fn metrics_are_published_on_interval() {
        let mut scene = CountingScene::default();
        let handle = MetricsHandle::default();
        run_headless(
            &LoopConfig::default(),
            &mut scene,
            frames(100, InputSnapshot::empty()),
            &handle,
        )
        .expect("run");
        let snapshot = handle.snapshot();
        assert!(
            (snapshot.ticks_per_second - 60.0).abs() < 2.0,
            "tps = {}",
            snapshot.ticks_per_second
        );
    }

    #[test]
    fn empty_script_is_an_error() {
        let mut scene = CountingScene::default();
        let result = run_headless(
            &LoopConfig::default(),
            &mut scene,
            Vec::new(),
            &MetricsHandle::default(),
        );
        assert!(matches!(result, Err(AppError::NoFrames)));
    }
}
