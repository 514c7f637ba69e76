use crate::app::EntityId;

/// Identifies one scheduled timer. Handles are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub owner: EntityId,
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    handle: TimerHandle,
    owner: EntityId,
    fire_at: f64,
}

/// One-shot delayed callbacks on the simulation clock. Firing is reported to
/// the caller, which dispatches to the owning entity.
#[derive(Debug, Default)]
pub struct TimerManager {
    now: f64,
    next_handle: u64,
    timers: Vec<TimerEntry>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    /// Schedules a one-shot timer. A non-positive or non-finite delay schedules nothing.
    pub fn set_timer(&mut self, owner: EntityId, delay_seconds: f32) -> Option<TimerHandle> {
        if !delay_seconds.is_finite() || delay_seconds <= 0.0 {
            return None;
        }
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        self.timers.push(TimerEntry {
            handle,
            owner,
            fire_at: self.now + f64::from(delay_seconds),
        });
        Some(handle)
    }

    pub fn clear_timer(&mut self, handle: TimerHandle) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.handle != handle);
        self.timers.len() != before
    }

    /// Cancels every timer owned by `owner`; used when an entity is destroyed.
    pub fn clear_all_for_owner(&mut self, owner: EntityId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.owner != owner);
        before - self.timers.len()
    }

    pub fn is_active(&self, handle: TimerHandle) -> bool {
        self.timers.iter().any(|timer| timer.handle == handle)
    }

    pub fn remaining(&self, handle: TimerHandle) -> Option<f32> {
        self.timers
            .iter()
            .find(|timer| timer.handle == handle)
            .map(|timer| (timer.fire_at - self.now).max(0.0) as f32)
    }

    /// Advances the clock and returns the timers that came due, ordered by fire
    /// time and then by scheduling order.
    pub fn advance(&mut self, dt_seconds: f32) -> Vec<FiredTimer> {
        if dt_seconds > 0.0 && dt_seconds.is_finite() {
            self.now += f64::from(dt_seconds);
        }

        let now = self.now;
        let mut due: Vec<TimerEntry> = Vec::new();
        self.timers.retain(|timer| {
            if timer.fire_at <= now {
                due.push(*timer);
                false
            } else {
                true
            }
        });
        due.sort_by(|a, b| {
            a.fire_at
                .total_cmp(&b.fire_at)
                .then_with(|| a.handle.cmp(&b.handle))
        });
        due.into_iter()
            .map(|timer| FiredTimer {
                handle: timer.handle,
                owner: timer.owner,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn timer_fires_once_after_delay() {
        let mut timers = TimerManager::new();
        let handle = timers.set_timer(EntityId(1), 0.5).expect("handle");
        let mut fired = Vec::new();
        for _ in 0..29 {
            fired.extend(timers.advance(DT));
        }
        assert!(fired.is_empty());
        assert!(timers.is_active(handle));

        for _ in 0..2 {
            fired.extend(timers.advance(DT));
        }
        assert_eq!(
            fired,
            vec![FiredTimer {
                handle,
                owner: EntityId(1)
            }]
        );
        assert!(!timers.is_active(handle));
        assert!(timers.advance(1.0).is_empty());
    }

    #[test]
    fn non_positive_delay_schedules_nothing() {
        let mut timers = TimerManager::new();
        assert!(timers.set_timer(EntityId(1), 0.0).is_none());
        assert!(timers.set_timer(EntityId(1), -1.0).is_none());
        assert!(timers.set_timer(EntityId(1), f32::NAN).is_none());
        assert_eq!(timers.active_count(), 0);
    }

    #[test]
    fn cleared_owner_never_fires() {
        let mut timers = TimerManager::new();
        timers.set_timer(EntityId(1), 0.1);
        timers.set_timer(EntityId(1), 0.2);
        let other = timers.set_timer(EntityId(2), 0.1).expect("handle");
        assert_eq!(timers.clear_all_for_owner(EntityId(1)), 2);
        let fired = timers.advance(1.0);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].handle, other);
    }

    #[test]
    fn due_timers_are_ordered_by_fire_time_then_handle() {
        let mut timers = TimerManager::new();
        let late = timers.set_timer(EntityId(1), 0.3).expect("late");
        let early = timers.set_timer(EntityId(2), 0.1).expect("early");
        let tie = timers.set_timer(EntityId(3), 0.3).expect("tie");
        let order: Vec<TimerHandle> = timers.advance(1.0).iter().map(|t| t.handle).collect();
        assert_eq!(order, vec![early, late, tie]);
    }

    #[test]
    fn remaining_counts_down() {
        let mut timers = TimerManager::new();
        let handle = timers.set_timer(EntityId(1), 1.0).expect("handle");
        timers.advance(0.25);
        let remaining = timers.remaining(handle).expect("active");
        assert!((remaining - 0.75).abs() < 1.0e-5);
        assert!(timers.clear_timer(handle));
        assert!(timers.remaining(handle).is_none());
    }
}
