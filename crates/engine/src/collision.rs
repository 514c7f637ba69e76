use serde::{Deserialize, Serialize};

use crate::math::{Vec2, KINDA_SMALL_NUMBER, SMALL_NUMBER};

/// Distance kept between a swept shape and the surface that blocked it.
pub const SWEEP_SKIN: f32 = 0.1;
/// How far below the body `find_floor` looks for a standable surface.
pub const FLOOR_PROBE_DISTANCE: f32 = 2.4;
/// Minimum upward component of a hit normal for the surface to count as floor.
pub const WALKABLE_FLOOR_NORMAL_Y: f32 = 0.71;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec2,
    pub half_extents: Vec2,
}

impl Aabb {
    pub const fn new(center: Vec2, half_extents: Vec2) -> Self {
        Self {
            center,
            half_extents,
        }
    }

    pub fn from_min_max(min: Vec2, max: Vec2) -> Self {
        Self {
            center: (min + max) * 0.5,
            half_extents: (max - min) * 0.5,
        }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.half_extents
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.half_extents
    }

    /// Strict overlap: boxes that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        a_min.x < b_max.x && a_max.x > b_min.x && a_min.y < b_max.y && a_max.y > b_min.y
    }

    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            center: self.center + delta,
            half_extents: self.half_extents,
        }
    }

    pub fn with_center(&self, center: Vec2) -> Self {
        Self {
            center,
            half_extents: self.half_extents,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Fraction of the requested delta travelled before contact, in [0, 1].
    pub time: f32,
    pub normal: Vec2,
}

impl SweepHit {
    pub fn is_walkable_floor(&self) -> bool {
        self.normal.y >= WALKABLE_FLOOR_NORMAL_Y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorHit {
    pub distance: f32,
    pub normal: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveResult {
    pub position: Vec2,
    pub hit: Option<SweepHit>,
}

#[derive(Debug, Clone, Default)]
pub struct CollisionWorld {
    solids: Vec<Aabb>,
}

impl CollisionWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_solids(solids: Vec<Aabb>) -> Self {
        Self { solids }
    }

    pub fn add_solid(&mut self, solid: Aabb) -> usize {
        self.solids.push(solid);
        self.solids.len() - 1
    }

    pub fn solids(&self) -> &[Aabb] {
        &self.solids
    }

    pub fn clear(&mut self) {
        self.solids.clear();
    }

    pub fn overlaps_any(&self, shape: &Aabb) -> bool {
        self.solids.iter().any(|solid| solid.overlaps(shape))
    }

    /// Earliest blocking hit for `shape` translated by `delta`.
    pub fn sweep(&self, shape: &Aabb, delta: Vec2) -> Option<SweepHit> {
        let mut best: Option<SweepHit> = None;
        for solid in &self.solids {
            let expanded_min = solid.min() - shape.half_extents;
            let expanded_max = solid.max() + shape.half_extents;
            let Some(hit) = sweep_point(shape.center, delta, expanded_min, expanded_max) else {
                continue;
            };
            if best.map_or(true, |current| hit.time < current.time) {
                best = Some(hit);
            }
        }
        best
    }

    /// Moves `shape` along `delta`, stopping short of the first blocking surface.
    pub fn safe_move(&self, shape: &Aabb, delta: Vec2) -> MoveResult {
        if delta.is_nearly_zero(SMALL_NUMBER) {
            return MoveResult {
                position: shape.center,
                hit: None,
            };
        }

        match self.sweep(shape, delta) {
            None => MoveResult {
                position: shape.center + delta,
                hit: None,
            },
            Some(hit) => {
                let length = delta.length();
                let time = (hit.time - SWEEP_SKIN / length).max(0.0);
                MoveResult {
                    position: shape.center + delta * time,
                    hit: Some(SweepHit {
                        time,
                        normal: hit.normal,
                    }),
                }
            }
        }
    }

    /// Safe move that slides the unconsumed part of `delta` along each blocking surface.
    /// Reports the first blocking hit.
    pub fn slide_move(&self, shape: &Aabb, delta: Vec2, max_iterations: u32) -> MoveResult {
        let mut position = shape.center;
        let mut remaining = delta;
        let mut first_hit = None;

        for _ in 0..max_iterations.max(1) {
            let step = self.safe_move(&shape.with_center(position), remaining);
            position = step.position;
            let Some(hit) = step.hit else {
                break;
            };
            first_hit.get_or_insert(hit);
            remaining = (remaining * (1.0 - hit.time)).project_onto_plane(hit.normal);
            if remaining.is_nearly_zero(KINDA_SMALL_NUMBER) {
                break;
            }
        }

        MoveResult {
            position,
            hit: first_hit,
        }
    }

    pub fn find_floor(&self, shape: &Aabb) -> Option<FloorHit> {
        let probe = Vec2::new(0.0, -FLOOR_PROBE_DISTANCE);
        let hit = self.sweep(shape, probe)?;
        if !hit.is_walkable_floor() {
            return None;
        }
        Some(FloorHit {
            distance: hit.time * FLOOR_PROBE_DISTANCE,
            normal: hit.normal,
        })
    }
}

/// Point-vs-box sweep against a box already expanded by the moving shape's extents.
fn sweep_point(origin: Vec2, delta: Vec2, min: Vec2, max: Vec2) -> Option<SweepHit> {
    let inside = origin.x > min.x && origin.x < max.x && origin.y > min.y && origin.y < max.y;
    if inside {
        let exits = [
            (origin.x - min.x, Vec2::new(-1.0, 0.0)),
            (max.x - origin.x, Vec2::new(1.0, 0.0)),
            (origin.y - min.y, Vec2::new(0.0, -1.0)),
            (max.y - origin.y, Vec2::new(0.0, 1.0)),
        ];
        let (_, push_out) = exits
            .into_iter()
            .fold((f32::INFINITY, Vec2::ZERO), |best, candidate| {
                if candidate.0 < best.0 {
                    candidate
                } else {
                    best
                }
            });
        // Penetrating shapes may only move out or along the shallowest face.
        return (delta.dot(push_out) < 0.0).then_some(SweepHit {
            time: 0.0,
            normal: push_out,
        });
    }

    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec2::ZERO;

    for (o, d, lo, hi, axis) in [
        (origin.x, delta.x, min.x, max.x, Vec2::RIGHT),
        (origin.y, delta.y, min.y, max.y, Vec2::UP),
    ] {
        if d.abs() <= SMALL_NUMBER {
            if o <= lo || o >= hi {
                return None;
            }
            continue;
        }
        let inv = d.recip();
        let (mut near, mut far) = ((lo - o) * inv, (hi - o) * inv);
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        if near > t_enter {
            t_enter = near;
            normal = axis * -d.signum();
        }
        t_exit = t_exit.min(far);
    }

    if t_enter >= t_exit || t_exit <= 0.0 || t_enter > 1.0 || t_enter < 0.0 {
        return None;
    }

    Some(SweepHit {
        time: t_enter,
        normal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor_world() -> CollisionWorld {
        CollisionWorld::from_solids(vec![Aabb::from_min_max(
            Vec2::new(-1000.0, -100.0),
            Vec2::new(1000.0, 0.0),
        )])
    }

    fn body_at(x: f32, y: f32) -> Aabb {
        Aabb::new(Vec2::new(x, y), Vec2::new(16.0, 28.0))
    }

    #[test]
    fn touching_boxes_do_not_overlap() {
        let a = Aabb::from_min_max(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        let b = Aabb::from_min_max(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&b.translated(Vec2::new(-0.5, 0.0))));
    }

    #[test]
    fn falling_body_stops_above_floor() {
        let world = floor_world();
        let result = world.safe_move(&body_at(0.0, 40.0), Vec2::new(0.0, -50.0));
        let hit = result.hit.expect("floor hit");
        assert!(hit.is_walkable_floor());
        assert!(result.position.y > 28.0);
        assert!(result.position.y <= 28.0 + SWEEP_SKIN + 1.0e-3);
    }

    #[test]
    fn sliding_along_touching_floor_is_not_blocked() {
        let world = floor_world();
        let result = world.safe_move(&body_at(0.0, 28.0), Vec2::new(25.0, 0.0));
        assert!(result.hit.is_none());
        assert_eq!(result.position, Vec2::new(25.0, 28.0));
    }

    #[test]
    fn slide_move_keeps_horizontal_motion_on_diagonal_landing() {
        let world = floor_world();
        let result = world.slide_move(&body_at(0.0, 30.0), Vec2::new(10.0, -10.0), 2);
        assert!(result.hit.is_some());
        assert!(result.position.x > 9.0);
        assert!(result.position.y >= 28.0);
    }

    #[test]
    fn penetrating_body_can_leave_but_not_sink() {
        let world = floor_world();
        let sunk = body_at(0.0, 27.99);
        assert!(world.sweep(&sunk, Vec2::new(0.0, -1.0)).is_some());
        assert!(world.sweep(&sunk, Vec2::new(0.0, 1.0)).is_none());
        assert!(world.sweep(&sunk, Vec2::new(5.0, 0.0)).is_none());
    }

    #[test]
    fn wall_blocks_horizontal_move() {
        let world = CollisionWorld::from_solids(vec![Aabb::from_min_max(
            Vec2::new(100.0, -50.0),
            Vec2::new(120.0, 200.0),
        )]);
        let result = world.safe_move(&body_at(0.0, 50.0), Vec2::new(200.0, 0.0));
        let hit = result.hit.expect("wall hit");
        assert_eq!(hit.normal, Vec2::new(-1.0, 0.0));
        assert!(result.position.x < 84.0);
    }

    #[test]
    fn find_floor_reports_gap() {
        let world = floor_world();
        let floor = world.find_floor(&body_at(0.0, 29.0)).expect("floor");
        assert!((floor.distance - 1.0).abs() < 1.0e-3);
        assert!(world.find_floor(&body_at(0.0, 60.0)).is_none());
    }
}
