use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::math::Vec2;
use crate::movement::MIN_TICK_TIME;

use super::saved_move::{PredictedMovement, SavedMove};
use super::server::{MoveCorrection, ServerMove};
use super::NetRole;

pub const DEFAULT_MAX_SAVED_MOVE_COUNT: usize = 96;
const DEFAULT_MAX_FREE_MOVE_COUNT: usize = 96;
/// Moves are only merged while their combined delta time stays within this.
pub const MAX_COMBINED_DELTA_TIME: f32 = 0.125;

type WorldOf<M> = <<M as SavedMove>::Character as PredictedMovement>::World;

/// Moves sent to the server in one client update, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerMovePacket {
    pub moves: Vec<ServerMove>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PredictionStats {
    pub sent_moves: u64,
    pub combined_moves: u64,
    pub dropped_moves: u64,
    pub corrections: u64,
    pub replayed_moves: u64,
}

/// Supplies the client prediction buffer for a character.
pub trait PredictionDataProvider {
    type Move: SavedMove;

    /// Only valid on a non-authoritative copy; calling it on the authority is a bug.
    fn prediction_data_client(&mut self, role: NetRole) -> &mut ClientPredictionData<Self::Move>;
}

/// Client-side move buffer: records each predicted move until the server
/// acknowledges it and replays the unacknowledged tail after a correction.
#[derive(Debug)]
pub struct ClientPredictionData<M: SavedMove> {
    saved_moves: VecDeque<M>,
    pending_move: Option<M>,
    last_acked_move: Option<M>,
    free_moves: Vec<M>,
    current_timestamp: f32,
    next_sequence: u32,
    max_saved_move_count: usize,
    max_free_move_count: usize,
    pub allow_move_combining: bool,
    stats: PredictionStats,
}

impl<M: SavedMove> Default for ClientPredictionData<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: SavedMove> ClientPredictionData<M> {
    pub fn new() -> Self {
        Self {
            saved_moves: VecDeque::new(),
            pending_move: None,
            last_acked_move: None,
            free_moves: Vec::new(),
            current_timestamp: 0.0,
            next_sequence: 1,
            max_saved_move_count: DEFAULT_MAX_SAVED_MOVE_COUNT,
            max_free_move_count: DEFAULT_MAX_FREE_MOVE_COUNT,
            allow_move_combining: true,
            stats: PredictionStats::default(),
        }
    }

    pub fn with_max_saved_move_count(mut self, max: usize) -> Self {
        assert!(max > 0, "max saved move count must be positive");
        self.max_saved_move_count = max;
        self
    }

    pub fn saved_moves(&self) -> impl Iterator<Item = &M> {
        self.saved_moves.iter()
    }

    pub fn saved_move_count(&self) -> usize {
        self.saved_moves.len()
    }

    pub fn pending_move(&self) -> Option<&M> {
        self.pending_move.as_ref()
    }

    pub fn last_acked_move(&self) -> Option<&M> {
        self.last_acked_move.as_ref()
    }

    pub fn current_timestamp(&self) -> f32 {
        self.current_timestamp
    }

    pub fn stats(&self) -> PredictionStats {
        self.stats
    }

    pub fn free_move_count(&self) -> usize {
        self.free_moves.len()
    }

    /// Returns a cleared record, reusing a recycled one when available.
    pub fn allocate_new_move(&mut self) -> M {
        match self.free_moves.pop() {
            Some(mut recycled) => {
                recycled.clear();
                recycled
            }
            None => M::default(),
        }
    }

    fn free_move(&mut self, mut saved_move: M) {
        if self.free_moves.len() < self.max_free_move_count {
            saved_move.clear();
            self.free_moves.push(saved_move);
        }
    }

    /// Records and simulates one locally predicted move. Returns the moves to
    /// send, or `None` while the move is held back for combining.
    pub fn replicate_move(
        &mut self,
        character: &mut M::Character,
        world: &WorldOf<M>,
        dt: f32,
        acceleration: Vec2,
    ) -> Option<ServerMovePacket> {
        if dt < MIN_TICK_TIME || !character.movement().has_valid_data() {
            return None;
        }

        let mut new_move = self.allocate_new_move();
        new_move.set_move_for(character, dt, acceleration);
        self.current_timestamp += dt;
        {
            let core = new_move.core_mut();
            core.sequence = self.next_sequence;
            core.timestamp = self.current_timestamp;
        }
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if let Some(pending) = self.pending_move.take() {
            if self.allow_move_combining && pending.can_combine_with(&new_move, MAX_COMBINED_DELTA_TIME)
            {
                new_move.combine_with(&pending, character);
                character.after_correction(world);
                trace!(
                    pending = pending.core().sequence,
                    into = new_move.core().sequence,
                    "moves_combined"
                );
                self.stats.combined_moves += 1;
                self.free_move(pending);
            } else {
                self.pending_move = Some(pending);
            }
        }

        let (move_acceleration, move_dt) = (new_move.core().acceleration, new_move.core().delta_time);
        character.perform_move(world, move_acceleration, move_dt);
        new_move.post_update(character);

        if self.allow_move_combining
            && self.pending_move.is_none()
            && !new_move.core().force_no_combine
            && !new_move.is_important_move(self.last_acked_move.as_ref())
        {
            self.pending_move = Some(new_move);
            return None;
        }

        Some(self.send_moves(new_move))
    }

    fn send_moves(&mut self, new_move: M) -> ServerMovePacket {
        let mut moves = Vec::with_capacity(3);

        let last_acked = self.last_acked_move.as_ref();
        if let Some(old_move) = self
            .saved_moves
            .iter()
            .find(|saved| saved.is_important_move(last_acked))
        {
            moves.push(ServerMove::from_saved(old_move));
        }
        if let Some(pending) = self.pending_move.take() {
            moves.push(ServerMove::from_saved(&pending));
            self.push_saved_move(pending);
        }
        moves.push(ServerMove::from_saved(&new_move));
        self.push_saved_move(new_move);

        self.stats.sent_moves += moves.len() as u64;
        ServerMovePacket { moves }
    }

    fn push_saved_move(&mut self, saved_move: M) {
        self.saved_moves.push_back(saved_move);
        while self.saved_moves.len() > self.max_saved_move_count {
            if let Some(dropped) = self.saved_moves.pop_front() {
                warn!(
                    sequence = dropped.core().sequence,
                    max = self.max_saved_move_count,
                    "saved_move_buffer_overflow"
                );
                self.stats.dropped_moves += 1;
                self.free_move(dropped);
            }
        }
    }

    /// Drops every buffered move up to and including `sequence`.
    pub fn acknowledge_move(&mut self, sequence: u32) {
        while self
            .saved_moves
            .front()
            .is_some_and(|saved| saved.core().sequence <= sequence)
        {
            let Some(acked) = self.saved_moves.pop_front() else {
                break;
            };
            if let Some(previous) = self.last_acked_move.replace(acked) {
                self.free_move(previous);
            }
        }
    }

    /// Restores the server's state and replays every move it has not yet seen.
    /// Returns the number of replayed moves.
    pub fn handle_correction(
        &mut self,
        character: &mut M::Character,
        world: &WorldOf<M>,
        correction: &MoveCorrection,
    ) -> usize {
        self.acknowledge_move(correction.sequence);
        self.stats.corrections += 1;

        character
            .movement_mut()
            .restore_state(correction.location, correction.velocity, correction.mode);
        character.after_correction(world);

        let live_pressed_jump = character.movement().pressed_jump();
        character.set_replaying(true);
        let mut replayed = 0;
        for saved_move in self.saved_moves.iter_mut().chain(self.pending_move.iter_mut()) {
            saved_move.prep_move_for(character);
            character.update_from_compressed_flags(saved_move.compressed_flags());
            let core = saved_move.core();
            let (acceleration, dt) = (core.acceleration, core.delta_time);
            character.perform_move(world, acceleration, dt);
            saved_move.post_update(character);
            replayed += 1;
        }
        character.set_replaying(false);
        character.movement_mut().set_pressed_jump(live_pressed_jump);

        self.stats.replayed_moves += replayed as u64;
        debug!(
            sequence = correction.sequence,
            replayed,
            x = correction.location.x,
            y = correction.location.y,
            "move_corrected"
        );
        replayed
    }
}
