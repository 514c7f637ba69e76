use std::collections::VecDeque;

use engine::{
    MoveResponse, NetRole, ReplicatedMovement, SceneCounters, ServerMoveHandler, ServerMovePacket,
    Vec2,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::character::PlatformerCharacter;
use crate::climbing::{ClimbEndReason, ClimbEvent};
use crate::config::PlatformerConfig;
use crate::level::Level;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetSessionConfig {
    /// One-way delay of every link, in simulation ticks.
    pub latency_ticks: u32,
    pub allow_move_combining: bool,
}

impl Default for NetSessionConfig {
    fn default() -> Self {
        Self {
            latency_ticks: 3,
            allow_move_combining: true,
        }
    }
}

/// In-order link that delivers each message a fixed number of ticks after it was sent.
#[derive(Debug)]
struct LatencyChannel<T> {
    latency_ticks: u64,
    in_flight: VecDeque<(u64, T)>,
}

impl<T> LatencyChannel<T> {
    fn new(latency_ticks: u32) -> Self {
        Self {
            latency_ticks: u64::from(latency_ticks),
            in_flight: VecDeque::new(),
        }
    }

    fn send(&mut self, now: u64, message: T) {
        self.in_flight.push_back((now + self.latency_ticks, message));
    }

    fn receive(&mut self, now: u64) -> Vec<T> {
        let mut delivered = Vec::new();
        while self.in_flight.front().is_some_and(|(due, _)| *due <= now) {
            if let Some((_, message)) = self.in_flight.pop_front() {
                delivered.push(message);
            }
        }
        delivered
    }

    fn len(&self) -> usize {
        self.in_flight.len()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub packets_sent: u64,
    pub moves_sent: u64,
    pub acks: u64,
    pub corrections: u64,
    pub replayed_moves: u64,
}

/// Client events surfaced by one session tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTick {
    pub climb_events: Vec<ClimbEvent>,
    pub proxy_climb_events: Vec<ClimbEvent>,
    pub corrections: u32,
}

/// A server, the owning client and one observing proxy of the same character,
/// connected by in-memory links.
#[derive(Debug)]
pub struct NetSession {
    config: NetSessionConfig,
    level: Level,
    now: u64,
    server: PlatformerCharacter,
    server_handler: ServerMoveHandler,
    client: PlatformerCharacter,
    proxy: PlatformerCharacter,
    uplink: LatencyChannel<ServerMovePacket>,
    downlink: LatencyChannel<MoveResponse>,
    proxy_link: LatencyChannel<ReplicatedMovement>,
    stats: SessionStats,
}

impl NetSession {
    pub fn new(config: &PlatformerConfig, level: Level, session: NetSessionConfig) -> Self {
        let spawn = level.spawn();
        let make = |role| {
            let mut character =
                PlatformerCharacter::new(role, config.movement, config.climb, spawn);
            character.refresh_climbable_volumes(&level);
            character
        };
        let server = make(NetRole::Authority);
        let mut client = make(NetRole::AutonomousProxy);
        let proxy = make(NetRole::SimulatedProxy);
        client.set_move_combining(session.allow_move_combining);

        info!(
            latency_ticks = session.latency_ticks,
            allow_move_combining = session.allow_move_combining,
            "net_session_started"
        );
        Self {
            config: session,
            level,
            now: 0,
            server,
            server_handler: ServerMoveHandler::new(),
            client,
            proxy,
            uplink: LatencyChannel::new(session.latency_ticks),
            downlink: LatencyChannel::new(session.latency_ticks),
            proxy_link: LatencyChannel::new(session.latency_ticks),
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &NetSessionConfig {
        &self.config
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn client(&self) -> &PlatformerCharacter {
        &self.client
    }

    /// The locally controlled character. Controller input goes here.
    pub fn client_mut(&mut self) -> &mut PlatformerCharacter {
        &mut self.client
    }

    pub fn server(&self) -> &PlatformerCharacter {
        &self.server
    }

    pub fn proxy(&self) -> &PlatformerCharacter {
        &self.proxy
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn counters(&self) -> SceneCounters {
        SceneCounters {
            corrections: self.stats.corrections,
            replayed_moves: self.stats.replayed_moves,
        }
    }

    pub fn messages_in_flight(&self) -> usize {
        self.uplink.len() + self.downlink.len() + self.proxy_link.len()
    }

    /// Moves the authoritative character without telling the client, as a
    /// server-side gameplay effect would.
    pub fn server_teleport(&mut self, position: Vec2) {
        self.server.teleport(&self.level, position);
        debug!(x = position.x, y = position.y, "server_teleport");
    }

    /// Advances the client, the links, the server and the proxy by one tick.
    pub fn tick(&mut self, dt: f32) -> SessionTick {
        let mut tick = SessionTick::default();

        if let Some(packet) = self.client.replicate_move(&self.level, dt) {
            self.stats.packets_sent += 1;
            self.stats.moves_sent += packet.moves.len() as u64;
            self.uplink.send(self.now, packet);
        }

        for packet in self.uplink.receive(self.now) {
            let responses =
                self.server_handler
                    .receive_packet(&mut self.server, &self.level, &packet);
            for response in responses {
                self.downlink.send(self.now, response);
            }
        }
        self.server.climbing_mut().drain_events();
        if let Some(replicated) = self.server.climbing().replicated_movement() {
            self.proxy_link.send(self.now, replicated);
        }

        for response in self.downlink.receive(self.now) {
            match response {
                MoveResponse::Ack { sequence } => {
                    self.client.acknowledge_move(sequence);
                    self.stats.acks += 1;
                }
                MoveResponse::Correction(correction) => {
                    let replayed = self.client.handle_correction(&self.level, &correction);
                    self.stats.corrections += 1;
                    self.stats.replayed_moves += replayed as u64;
                    tick.corrections += 1;
                }
            }
        }
        tick.climb_events = self.client.climbing_mut().drain_events();

        for replicated in self.proxy_link.receive(self.now) {
            self.proxy
                .apply_replicated_movement(&self.level, &replicated);
        }
        tick.proxy_climb_events = self.proxy.climbing_mut().drain_events();

        for event in &tick.climb_events {
            log_climb_event(*event);
        }
        self.now += 1;
        tick
    }
}

pub(crate) fn log_climb_event(event: ClimbEvent) {
    match event {
        ClimbEvent::Started => info!("climb_started"),
        ClimbEvent::Ended { reason } => {
            let reason = match reason {
                ClimbEndReason::Released => "released",
                ClimbEndReason::Ineligible => "ineligible",
                ClimbEndReason::Jumped => "jumped",
                ClimbEndReason::Replicated => "replicated",
            };
            info!(reason, "climb_ended");
        }
    }
}
