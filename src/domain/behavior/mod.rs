/// Behavior engine: per-archetype movement and interaction.
///
/// Each archetype is a pair of plain functions in a dispatch table.
/// `decide` moves the entity; `interact` resolves contact with the player
/// and returns an outcome the orchestrator acts on. Behaviors never hold a
/// reference to the orchestrator.
///
/// Tick order per NPC (driven by `sim::step`):
///   1. `advance` : skip if paused/caught/disappearing, run `decide`, animate
///   2. `interact`: after every NPC has moved

pub mod chaser;
pub mod encounter;
pub mod fleer;
pub mod wanderer;

use super::entity::{Entity, InputSnapshot, SpriteTag};
use super::geometry::{direction_of, Bounds, Rect, Vec2};
use crate::sim::context::GameContext;

/// Read-only view of the tick for behaviors.
pub struct Frame<'a> {
    pub player: Rect,
    pub bounds: Bounds,
    /// Frame-normalized elapsed time.
    pub delta: f32,
    pub input: &'a InputSnapshot,
}

/// What the orchestrator must do after an interaction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BehaviorOutcome {
    /// Schedule removal after the disappear delay.
    Disappear,
    /// Keep the entity until the game-over final screen.
    RemoveAfterGameOver,
}

pub type DecideFn = fn(&mut Entity, &Frame, &mut GameContext);
pub type InteractFn = fn(&mut Entity, &Frame, &mut GameContext) -> Option<BehaviorOutcome>;

#[derive(Clone, Copy)]
pub struct ArchetypeRoutines {
    pub decide: DecideFn,
    pub interact: InteractFn,
}

pub fn routines(archetype: super::entity::Archetype) -> ArchetypeRoutines {
    use super::entity::Archetype::*;
    match archetype {
        Wanderer => ArchetypeRoutines { decide: wanderer::decide, interact: wanderer::interact },
        Fleer => ArchetypeRoutines { decide: fleer::decide, interact: fleer::interact },
        Chaser => ArchetypeRoutines { decide: chaser::decide, interact: chaser::interact },
        TollCollector | Ambush => ArchetypeRoutines { decide: encounter::decide, interact: encounter::interact },
    }
}

fn is_frozen(e: &Entity) -> bool {
    e.is_paused || e.is_caught || e.behavior.is_disappearing
}

/// Movement and animation for one tick. No-op while paused or caught.
pub fn advance(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) {
    if is_frozen(e) {
        return;
    }
    (routines(e.archetype).decide)(e, frame, ctx);
    let anim_ms = ctx.tuning.timing.animation_interval_ms;
    e.animation.advance(ctx.now, anim_ms, e.is_idle);
}

/// Contact resolution for one tick.
pub fn interact(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) -> Option<BehaviorOutcome> {
    if is_frozen(e) {
        return None;
    }
    (routines(e.archetype).interact)(e, frame, ctx)
}

// ── Shared helpers ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Contact {
    None,
    /// Overlap started this tick.
    Began,
    /// Overlapping for this many milliseconds.
    Held(u64),
    /// Overlap ended this tick.
    Ended,
}

/// Update collision flags against the player box.
pub fn track_contact(e: &mut Entity, frame: &Frame, now: u64) -> Contact {
    let overlapping = e.is_visible && e.rect().overlaps(&frame.player);
    let b = &mut e.behavior;
    match (b.is_colliding, overlapping) {
        (false, true) => {
            b.is_colliding = true;
            b.can_interact = true;
            b.contact_since = Some(now);
            Contact::Began
        }
        (true, true) => Contact::Held(now.saturating_sub(b.contact_since.unwrap_or(now))),
        (true, false) => {
            b.clear_contact();
            Contact::Ended
        }
        (false, false) => Contact::None,
    }
}

/// Move along `velocity` (already delta-scaled), clamped to the world.
/// Returns the actual displacement.
pub fn move_by(e: &mut Entity, velocity: Vec2, bounds: Bounds, margin: f32) -> Vec2 {
    let before = e.pos;
    e.pos = bounds.clamp_move(before, before + velocity, e.size, margin);
    let moved = e.pos - before;
    if let Some(dir) = direction_of(velocity) {
        e.direction = dir;
    }
    e.is_idle = moved.is_zero();
    e.sprite = if e.is_idle { SpriteTag::Idle } else { SpriteTag::Walking };
    moved
}

/// Flip the zigzag sign if the interval has passed.
pub fn update_zigzag(e: &mut Entity, now: u64, interval_ms: u64) {
    let b = &mut e.behavior;
    if now.saturating_sub(b.zigzag_toggled_at) >= interval_ms {
        b.zigzag_direction = -b.zigzag_direction;
        b.zigzag_toggled_at = now;
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;
    use crate::domain::entity::Archetype;

    #[test]
    fn paused_entity_does_not_move() {
        let mut c = ctx();
        let input = InputSnapshot::default();
        let f = frame(105.0, 100.0, &input);
        let mut e = npc(Archetype::Fleer, 100.0, 100.0);
        e.pause_updates();
        c.now = 500;
        advance(&mut e, &f, &mut c);
        assert_eq!(e.pos, Vec2::new(100.0, 100.0));
        assert!(e.is_idle);
    }

    #[test]
    fn caught_entity_does_not_move() {
        let mut c = ctx();
        let input = InputSnapshot::default();
        let f = frame(105.0, 100.0, &input);
        let mut e = npc(Archetype::Chaser, 300.0, 300.0);
        e.is_caught = true;
        c.now = 500;
        advance(&mut e, &f, &mut c);
        assert_eq!(e.pos, Vec2::new(300.0, 300.0));
    }

    #[test]
    fn contact_lifecycle() {
        let input = InputSnapshot::default();
        let mut e = npc(Archetype::Wanderer, 100.0, 100.0);
        let on = frame(110.0, 100.0, &input);
        let off = frame(400.0, 400.0, &input);
        assert_eq!(track_contact(&mut e, &on, 0), Contact::Began);
        assert_eq!(track_contact(&mut e, &on, 40), Contact::Held(40));
        e.behavior.sound_played = true;
        assert_eq!(track_contact(&mut e, &off, 80), Contact::Ended);
        assert!(!e.behavior.sound_played);
        assert!(!e.behavior.is_colliding);
        assert_eq!(track_contact(&mut e, &off, 90), Contact::None);
    }

    #[test]
    fn zigzag_flips_on_interval() {
        let mut e = npc(Archetype::Chaser, 0.0, 0.0);
        update_zigzag(&mut e, 100, 300);
        assert_eq!(e.behavior.zigzag_direction, 1.0);
        update_zigzag(&mut e, 300, 300);
        assert_eq!(e.behavior.zigzag_direction, -1.0);
    }
}
