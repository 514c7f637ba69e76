pub mod app;
pub mod collision;
pub mod math;
pub mod movement;
pub mod net;
pub mod overlap;
pub mod timers;

pub use app::{
    run_headless, AppError, Entity, EntityDesc, EntityId, HeadlessFrame, HeadlessReport,
    InputAction, InputSnapshot, LoopConfig, LoopMetricsSnapshot, MetricsHandle, Scene,
    SceneCommand, SceneCounters, SceneWorld,
};
pub use collision::{Aabb, CollisionWorld, FloorHit, MoveResult, SweepHit};
pub use math::Vec2;
pub use movement::{CharacterMovement, MovementMode, MovementParams, UpdatedBody};
pub use net::{
    ClientPredictionData, CompressedFlags, MoveCorrection, MoveResponse, NetRole,
    PredictedMovement, PredictionDataProvider, ReplicatedMovement, SavedMove, SavedMoveCore,
    ServerMove, ServerMoveHandler, ServerMovePacket,
};
pub use overlap::{OverlapEvent, OverlapTracker};
pub use timers::{FiredTimer, TimerHandle, TimerManager};
