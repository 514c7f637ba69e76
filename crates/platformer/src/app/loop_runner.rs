use std::process::ExitCode;
use std::time::Duration;

use engine::{run_headless, HeadlessFrame, InputAction, InputSnapshot, MetricsHandle};
use platformer::PlatformerScene;
use tracing::{error, info};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let config = match app.config {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    let mut scene = match PlatformerScene::new(config) {
        Ok(scene) => scene,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    let frame_dt = app.loop_config.fixed_dt();
    let frames = demo_script(app.demo_ticks, frame_dt);
    let metrics = MetricsHandle::default();
    match run_headless(&app.loop_config, &mut scene, frames, &metrics) {
        Ok(report) => {
            let published = metrics.snapshot();
            info!(
                frames = report.frames,
                ticks = report.ticks,
                resets = report.resets,
                corrections = published.corrections,
                replayed_moves = published.replayed_moves,
                "demo_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "startup_failed");
            ExitCode::FAILURE
        }
    }
}

/// Scripted input: walk to the ladder, climb it, jump off, walk back and open the chest.
fn demo_script(ticks: u32, frame_dt: Duration) -> Vec<HeadlessFrame> {
    (0..ticks)
        .map(|tick| HeadlessFrame::new(frame_dt, demo_input(tick)))
        .collect()
}

fn demo_input(tick: u32) -> InputSnapshot {
    let input = InputSnapshot::empty();
    match tick % 600 {
        0..=79 => input.with_action_down(InputAction::MoveRight, true),
        80..=199 => input
            .with_action_down(InputAction::Climb, true)
            .with_action_down(InputAction::MoveUp, true),
        200..=209 => input
            .with_action_down(InputAction::Climb, true)
            .with_action_down(InputAction::Jump, true),
        210..=449 => input.with_action_down(InputAction::MoveLeft, true),
        450..=455 => input.with_action_down(InputAction::Interact, true),
        _ => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_script_covers_every_tick() {
        let frames = demo_script(30, Duration::from_millis(16));
        assert_eq!(frames.len(), 30);
    }

    #[test]
    fn demo_input_climbs_after_walking() {
        assert!(demo_input(10).is_down(InputAction::MoveRight));
        assert!(demo_input(100).is_down(InputAction::Climb));
        assert!(demo_input(205).is_down(InputAction::Jump));
        assert!(!demo_input(500).is_down(InputAction::Interact));
    }
}
