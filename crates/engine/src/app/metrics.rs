use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::warn;

use super::scene::SceneCounters;

/// Latest published loop figures. `ticks_per_second` is measured on the
/// simulation clock; the prediction counters are cumulative scene totals.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub ticks_per_second: f32,
    pub corrections: u64,
    pub replayed_moves: u64,
}

/// Shared read side of the loop metrics. A poisoned lock keeps serving the
/// last value.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    latest: Arc<RwLock<LoopMetricsSnapshot>>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        *self.latest.read().unwrap_or_else(|poisoned| {
            warn!(operation = "read", "metrics_lock_poisoned");
            poisoned.into_inner()
        })
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        let mut latest = self.latest.write().unwrap_or_else(|poisoned| {
            warn!(operation = "write", "metrics_lock_poisoned");
            PoisonError::into_inner(poisoned)
        });
        *latest = snapshot;
    }
}

/// Counts ticks between publications on the simulation clock.
#[derive(Debug)]
pub(crate) struct TickRateWindow {
    opened_at: Duration,
    length: Duration,
    ticks: u32,
}

impl TickRateWindow {
    pub(crate) fn new(length: Duration) -> Self {
        Self {
            opened_at: Duration::ZERO,
            length,
            ticks: 0,
        }
    }

    pub(crate) fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    /// Closes the window once `length` of simulated time has passed.
    pub(crate) fn close_if_elapsed(
        &mut self,
        now: Duration,
        counters: SceneCounters,
    ) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_sub(self.opened_at);
        if elapsed < self.length {
            return None;
        }

        let snapshot = LoopMetricsSnapshot {
            ticks_per_second: self.ticks as f32 / elapsed.as_secs_f32().max(f32::EPSILON),
            corrections: counters.corrections,
            replayed_moves: counters.replayed_moves,
        };
        self.opened_at = now;
        self.ticks = 0;
        Some(snapshot)
    }
}
