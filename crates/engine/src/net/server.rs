use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::math::Vec2;
use crate::movement::{MovementMode, MIN_TICK_TIME};

use super::client::ServerMovePacket;
use super::saved_move::{PredictedMovement, SavedMove};
use super::CompressedFlags;

/// Squared distance between client and server locations that triggers a correction.
pub const MAX_POSITION_ERROR_SQUARED: f32 = 3.0;
/// Longest delta time the server accepts for a single move.
pub const MAX_SERVER_MOVE_DELTA_TIME: f32 = 0.125;

/// One client move as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMove {
    pub sequence: u32,
    pub timestamp: f32,
    pub delta_time: f32,
    pub acceleration: Vec2,
    pub flags: CompressedFlags,
    pub client_location: Vec2,
    pub client_mode: MovementMode,
}

impl ServerMove {
    pub fn from_saved<M: SavedMove>(saved_move: &M) -> Self {
        let core = saved_move.core();
        Self {
            sequence: core.sequence,
            timestamp: core.timestamp,
            delta_time: core.delta_time,
            acceleration: core.acceleration,
            flags: saved_move.compressed_flags(),
            client_location: core.saved_location,
            client_mode: core.end_mode,
        }
    }
}

/// Authoritative state the client must adopt for the move `sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveCorrection {
    pub sequence: u32,
    pub location: Vec2,
    pub velocity: Vec2,
    pub mode: MovementMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MoveResponse {
    Ack { sequence: u32 },
    Correction(MoveCorrection),
}

/// Server half of movement replication for one character.
#[derive(Debug, Clone, Default)]
pub struct ServerMoveHandler {
    last_processed_sequence: Option<u32>,
    last_client_timestamp: f32,
    corrections_sent: u64,
}

impl ServerMoveHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_processed_sequence(&self) -> Option<u32> {
        self.last_processed_sequence
    }

    pub fn last_client_timestamp(&self) -> f32 {
        self.last_client_timestamp
    }

    pub fn corrections_sent(&self) -> u64 {
        self.corrections_sent
    }

    /// Simulates one client move. Returns `None` for stale, duplicate or malformed moves.
    pub fn receive_move<C: PredictedMovement>(
        &mut self,
        character: &mut C,
        world: &C::World,
        server_move: &ServerMove,
    ) -> Option<MoveResponse> {
        if self
            .last_processed_sequence
            .is_some_and(|last| server_move.sequence <= last)
        {
            trace!(sequence = server_move.sequence, "stale_move_ignored");
            return None;
        }
        if !server_move.delta_time.is_finite() || !server_move.acceleration.is_finite() {
            debug!(sequence = server_move.sequence, "malformed_move_ignored");
            return None;
        }
        if !character.movement().has_valid_data() {
            return None;
        }

        self.last_processed_sequence = Some(server_move.sequence);
        self.last_client_timestamp = server_move.timestamp;

        let dt = server_move.delta_time.min(MAX_SERVER_MOVE_DELTA_TIME);
        let max_acceleration = character.movement().params().max_acceleration;
        let acceleration = server_move.acceleration.clamp_length_max(max_acceleration);

        character.update_from_compressed_flags(server_move.flags);
        if dt >= MIN_TICK_TIME {
            character.perform_move(world, acceleration, dt);
        }

        let movement = character.movement();
        let location = movement.position().unwrap_or(Vec2::ZERO);
        let error_squared = location.distance_squared(server_move.client_location);
        if error_squared > MAX_POSITION_ERROR_SQUARED || movement.mode() != server_move.client_mode {
            self.corrections_sent += 1;
            debug!(
                sequence = server_move.sequence,
                error_squared,
                server_mode = ?movement.mode(),
                client_mode = ?server_move.client_mode,
                "server_correction_sent"
            );
            return Some(MoveResponse::Correction(MoveCorrection {
                sequence: server_move.sequence,
                location,
                velocity: movement.velocity(),
                mode: movement.mode(),
            }));
        }

        Some(MoveResponse::Ack {
            sequence: server_move.sequence,
        })
    }

    pub fn receive_packet<C: PredictedMovement>(
        &mut self,
        character: &mut C,
        world: &C::World,
        packet: &ServerMovePacket,
    ) -> Vec<MoveResponse> {
        packet
            .moves
            .iter()
            .filter_map(|server_move| self.receive_move(character, world, server_move))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{Aabb, CollisionWorld};
    use crate::movement::{CharacterMovement, MovementParams, UpdatedBody};

    const DT: f32 = 1.0 / 60.0;

    fn world_with_wall(wall: bool) -> CollisionWorld {
        let mut world = CollisionWorld::from_solids(vec![Aabb::from_min_max(
            Vec2::new(-5000.0, -100.0),
            Vec2::new(5000.0, 0.0),
        )]);
        if wall {
            world.add_solid(Aabb::from_min_max(Vec2::new(20.0, 0.0), Vec2::new(40.0, 300.0)));
        }
        world
    }

    fn character(world: &CollisionWorld) -> CharacterMovement {
        let body = UpdatedBody::new(Vec2::new(0.0, 28.05), Vec2::new(16.0, 28.0));
        let mut movement = CharacterMovement::new(MovementParams::default(), Some(body));
        movement.perform_move(world, Vec2::ZERO, DT);
        movement
    }

    fn walk_right(sequence: u32, client_location: Vec2) -> ServerMove {
        ServerMove {
            sequence,
            timestamp: sequence as f32 * DT,
            delta_time: 0.1,
            acceleration: Vec2::new(2048.0, 0.0),
            flags: CompressedFlags::NONE,
            client_location,
            client_mode: MovementMode::Walking,
        }
    }

    #[test]
    fn divergent_client_is_corrected() {
        let world = world_with_wall(true);
        let mut server = character(&world);
        let mut handler = ServerMoveHandler::new();
        let mut response = None;
        for sequence in 1..=6 {
            let claimed = Vec2::new(sequence as f32 * 20.0, 28.05);
            response = handler.receive_move(&mut server, &world, &walk_right(sequence, claimed));
        }
        match response {
            Some(MoveResponse::Correction(correction)) => {
                assert_eq!(correction.sequence, 6);
                assert!(correction.location.x < 4.0);
            }
            other => panic!("expected correction, got {other:?}"),
        }
        assert!(handler.corrections_sent() > 0);
    }

    #[test]
    fn stale_and_duplicate_moves_are_ignored() {
        let world = world_with_wall(false);
        let mut server = character(&world);
        let mut handler = ServerMoveHandler::new();
        let first = walk_right(5, Vec2::ZERO);
        assert!(handler.receive_move(&mut server, &world, &first).is_some());
        let position = server.position();
        assert!(handler.receive_move(&mut server, &world, &first).is_none());
        assert!(handler
            .receive_move(&mut server, &world, &walk_right(3, Vec2::ZERO))
            .is_none());
        assert_eq!(server.position(), position);
        assert_eq!(handler.last_processed_sequence(), Some(5));
    }

    #[test]
    fn oversized_delta_time_is_capped() {
        let world = world_with_wall(false);
        let mut capped = character(&world);
        let mut reference = capped.clone();
        let mut handler = ServerMoveHandler::new();
        let mut long_move = walk_right(1, Vec2::ZERO);
        long_move.delta_time = 5.0;
        handler.receive_move(&mut capped, &world, &long_move);
        reference.perform_move(&world, Vec2::new(2048.0, 0.0), MAX_SERVER_MOVE_DELTA_TIME);
        assert_eq!(capped.position(), reference.position());
    }

    #[test]
    fn missing_body_yields_no_response() {
        let world = world_with_wall(false);
        let mut server = CharacterMovement::new(MovementParams::default(), None);
        let mut handler = ServerMoveHandler::new();
        assert!(handler
            .receive_move(&mut server, &world, &walk_right(1, Vec2::ZERO))
            .is_none());
    }
}
