mod input;
mod loop_runner;
mod metrics;
mod scene;

pub use input::InputAction;
pub use loop_runner::{run_headless, AppError, HeadlessFrame, HeadlessReport, LoopConfig};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{
    Entity, EntityDesc, EntityId, EntityIdAllocator, InputSnapshot, Scene, SceneCommand,
    SceneCounters, SceneWorld,
};
