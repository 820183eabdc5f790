/// Wanderer: drifts in a random cardinal direction, re-rolling on an
/// interval or when stuck against a wall.

use rand::seq::SliceRandom;

use super::{move_by, track_contact, BehaviorOutcome, Frame};
use crate::domain::entity::{Direction, Entity};
use crate::sim::context::GameContext;

pub fn decide(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) {
    let speed = ctx.tuning.behavior.wander_speed;
    wander(e, frame, ctx, speed);
}

pub fn interact(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) -> Option<BehaviorOutcome> {
    track_contact(e, frame, ctx.now);
    None
}

/// Shared by every archetype that wanders when it has nothing better to do.
pub fn wander(e: &mut Entity, frame: &Frame, ctx: &mut GameContext, speed: f32) {
    let now = ctx.now;
    let interval = ctx.tuning.behavior.change_direction_interval_ms;
    let stuck_after = ctx.tuning.behavior.stuck_threshold_ms;
    let margin = ctx.tuning.world.corner_buffer;

    if now.saturating_sub(e.behavior.last_direction_change) >= interval {
        if let Some(&dir) = Direction::ALL.choose(&mut ctx.rng) {
            turn(e, dir, now);
        }
    }

    let velocity = e.direction.unit().scale(speed * frame.delta);
    let moved = move_by(e, velocity, frame.bounds, margin);

    if !moved.is_zero() {
        e.behavior.stuck_timer = now;
    } else if frame.delta > 0.0 && now.saturating_sub(e.behavior.stuck_timer) >= stuck_after {
        // Blocked: skip the blocked heading and the one before it so the
        // entity does not bounce between two walls.
        let current = e.direction;
        let previous = e.behavior.previous_direction;
        let options: Vec<Direction> = Direction::ALL
            .iter()
            .copied()
            .filter(|&d| d != current && Some(d) != previous)
            .collect();
        if let Some(&dir) = options.choose(&mut ctx.rng) {
            turn(e, dir, now);
        }
        e.behavior.stuck_timer = now;
    }
}

fn turn(e: &mut Entity, dir: Direction, now: u64) {
    e.behavior.previous_direction = Some(e.direction);
    e.direction = dir;
    e.behavior.last_direction_change = now;
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::domain::entity::{Archetype, InputSnapshot};

    #[test]
    fn moves_along_heading() {
        let mut c = ctx();
        c.now = 100;
        let input = InputSnapshot::default();
        let f = frame(600.0, 500.0, &input);
        let mut e = npc(Archetype::Wanderer, 300.0, 300.0);
        e.direction = Direction::Right;
        decide(&mut e, &f, &mut c);
        assert!((e.pos.x - 301.5).abs() < 1e-4);
        assert_eq!(e.pos.y, 300.0);
        assert!(!e.is_idle);
    }

    #[test]
    fn rerolls_after_interval() {
        let mut c = ctx();
        c.now = 2_000;
        let input = InputSnapshot::default();
        let f = frame(600.0, 500.0, &input);
        let mut e = npc(Archetype::Wanderer, 300.0, 300.0);
        decide(&mut e, &f, &mut c);
        assert_eq!(e.behavior.last_direction_change, 2_000);
        assert_eq!(e.behavior.previous_direction, Some(Direction::Down));
    }

    #[test]
    fn stuck_picks_new_heading() {
        let mut c = ctx();
        let input = InputSnapshot::default();
        let f = frame(600.0, 500.0, &input);
        let mut e = npc(Archetype::Wanderer, 40.0, 300.0);
        e.direction = Direction::Left;
        e.behavior.previous_direction = Some(Direction::Right);
        c.now = 600;
        decide(&mut e, &f, &mut c);
        assert!(e.direction == Direction::Up || e.direction == Direction::Down);
        assert_eq!(e.behavior.stuck_timer, 600);
    }

    #[test]
    fn stays_inside_corner_buffer() {
        let mut c = ctx();
        let input = InputSnapshot::default();
        let f = frame(600.0, 500.0, &input);
        let mut e = npc(Archetype::Wanderer, 300.0, 300.0);
        for t in 0..2_000u64 {
            c.now = t * 16;
            decide(&mut e, &f, &mut c);
            assert!(e.pos.x >= 40.0 && e.pos.x <= 800.0 - 32.0 - 40.0);
            assert!(e.pos.y >= 40.0 && e.pos.y <= 600.0 - 32.0 - 40.0);
        }
    }
}
