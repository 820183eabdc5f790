/// Entities: Player, NPC (one struct, archetype-tagged), input snapshot.
///
/// Behavior lives in `domain::behavior`; this module only holds the data,
/// the animation accumulator and the pause/resume contract.

use std::collections::HashSet;

use serde::Deserialize;

use super::geometry::{Bounds, Rect, Size, Vec2};
use crate::sim::timers::{DelayQueue, TimerId, TimerOwner};

pub type EntityId = u32;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Wanderer,
    Fleer,
    Chaser,
    TollCollector,
    Ambush,
}

impl Archetype {
    pub const ALL: [Archetype; 5] = [
        Archetype::Wanderer,
        Archetype::Fleer,
        Archetype::Chaser,
        Archetype::TollCollector,
        Archetype::Ambush,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Archetype::Wanderer => "wanderer",
            Archetype::Fleer => "fleer",
            Archetype::Chaser => "chaser",
            Archetype::TollCollector => "toll-collector",
            Archetype::Ambush => "ambush",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::new(0.0, -1.0),
            Direction::Down => Vec2::new(0.0, 1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
        }
    }
}

/// Rendering hint only; the core never branches on it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpriteTag {
    Idle,
    Walking,
    Attack,
}

/// Discrete actions read from the per-tick input snapshot.
/// All are edge-triggered (fresh press this tick).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Action {
    RewardA,
    RewardB,
    Confirm,
}

/// Per-tick input: continuous movement plus freshly pressed actions.
#[derive(Clone, Debug, Default)]
pub struct InputSnapshot {
    /// Each component in [-1, 1].
    pub movement: Vec2,
    pub actions: HashSet<Action>,
}

impl InputSnapshot {
    pub fn pressed(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

/// Elapsed-time animation: one frame step whenever the interval has passed
/// since the last step, so visual speed does not depend on tick rate.
#[derive(Clone, Debug)]
pub struct Animation {
    pub frame: u32,
    pub total_frames: u32,
    pub last_frame_at: u64,
}

impl Animation {
    pub fn new(total_frames: u32, now: u64) -> Self {
        Animation { frame: 0, total_frames: total_frames.max(1), last_frame_at: now }
    }

    /// Advance by at most one frame. Idle actors hold their frame but keep
    /// the accumulator current so they do not jump when they start moving.
    pub fn advance(&mut self, now: u64, interval_ms: u64, idle: bool) {
        if idle {
            self.last_frame_at = now;
            return;
        }
        if now.saturating_sub(self.last_frame_at) >= interval_ms {
            self.frame = (self.frame + 1) % self.total_frames;
            self.last_frame_at = now;
        }
    }
}

/// Archetype-specific timers and interaction flags, embedded in every NPC.
/// Timestamps are simulation milliseconds.
#[derive(Clone, Debug)]
pub struct BehaviorState {
    pub move_timer: u64,
    pub last_direction_change: u64,
    pub previous_direction: Option<Direction>,
    /// Last time the entity achieved net displacement.
    pub stuck_timer: u64,
    /// +1.0 / -1.0, flips every zigzag interval.
    pub zigzag_direction: f32,
    pub zigzag_toggled_at: u64,
    /// Cooldown stamp of the last repeatable effect.
    pub last_effect_at: Option<u64>,
    /// Start of the current overlap with the player.
    pub contact_since: Option<u64>,

    pub is_colliding: bool,
    /// Set on contact start, consumed by the first effect of that contact.
    pub can_interact: bool,
    pub has_interacted: bool,
    pub is_disappearing: bool,
    pub sound_played: bool,
    pub window_open: bool,
    pub window_timer: Option<TimerId>,
    pub encounters: u32,
}

impl BehaviorState {
    pub fn new(now: u64) -> Self {
        BehaviorState {
            move_timer: now,
            last_direction_change: now,
            previous_direction: None,
            stuck_timer: now,
            zigzag_direction: 1.0,
            zigzag_toggled_at: now,
            last_effect_at: None,
            contact_since: None,
            is_colliding: false,
            can_interact: false,
            has_interacted: false,
            is_disappearing: false,
            sound_played: false,
            window_open: false,
            window_timer: None,
            encounters: 0,
        }
    }

    /// Leaving the player's box: every "just collided" flag goes back so a
    /// later contact can trigger again (cooldowns still apply).
    pub fn clear_contact(&mut self) {
        self.is_colliding = false;
        self.contact_since = None;
        self.can_interact = false;
        self.sound_played = false;
    }

    pub fn cooldown_ready(&self, now: u64, cooldown_ms: u64) -> bool {
        match self.last_effect_at {
            Some(t) => now.saturating_sub(t) >= cooldown_ms,
            None => true,
        }
    }
}

/// An NPC in the active roster.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub archetype: Archetype,
    pub pos: Vec2,
    pub size: Size,
    pub direction: Direction,
    pub animation: Animation,
    pub sprite: SpriteTag,
    pub is_idle: bool,
    pub is_paused: bool,
    pub is_visible: bool,
    pub is_caught: bool,
    /// Created by a random spawn policy (at most one alive per level).
    pub spawned_by_policy: bool,
    pub behavior: BehaviorState,
}

impl Entity {
    pub fn new(id: EntityId, archetype: Archetype, pos: Vec2, size: Size, frames: u32, now: u64) -> Self {
        Entity {
            id,
            archetype,
            pos,
            size,
            direction: Direction::Down,
            animation: Animation::new(frames, now),
            sprite: SpriteTag::Idle,
            is_idle: true,
            is_paused: false,
            is_visible: true,
            is_caught: false,
            spawned_by_policy: false,
            behavior: BehaviorState::new(now),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect { pos: self.pos, size: self.size }
    }

    pub fn frame(&self) -> u32 {
        self.animation.frame
    }

    /// Keep the position inside the world (minus size).
    pub fn clamp_to(&mut self, bounds: Bounds, margin: f32) {
        self.pos = bounds.clamp(self.pos, self.size, margin);
    }

    pub fn pause_updates(&mut self) {
        self.is_paused = true;
    }

    /// Every "time since" stamp restarts at `now`, so the first tick after
    /// a pause never sees the paused span as elapsed time.
    pub fn resume_updates(&mut self, now: u64) {
        self.is_paused = false;
        self.animation.last_frame_at = now;
        let b = &mut self.behavior;
        b.move_timer = now;
        b.last_direction_change = now;
        b.stuck_timer = now;
        b.zigzag_toggled_at = now;
        if b.contact_since.is_some() {
            b.contact_since = Some(now);
        }
        if b.last_effect_at.is_some() {
            b.last_effect_at = Some(now);
        }
    }

    /// Terminal sub-state: never moves again, hidden, waits for removal.
    pub fn start_disappearing(&mut self) {
        let b = &mut self.behavior;
        b.is_disappearing = true;
        b.window_open = false;
        self.is_visible = false;
        self.is_idle = true;
        self.sprite = SpriteTag::Idle;
    }

    /// Release every timer and interaction this entity holds.
    pub fn cleanup(&mut self, timers: &mut DelayQueue) {
        timers.cancel_owner(TimerOwner::Entity(self.id));
        let b = &mut self.behavior;
        b.window_timer = None;
        b.window_open = false;
        b.clear_contact();
    }
}

/// The player actor. Movement comes straight from the input snapshot.
#[derive(Clone, Debug)]
pub struct Player {
    pub pos: Vec2,
    pub size: Size,
    pub direction: Direction,
    pub animation: Animation,
    pub is_idle: bool,
    pub frozen: bool,
}

impl Player {
    pub fn new(pos: Vec2, size: Size, frames: u32, now: u64) -> Self {
        Player {
            pos,
            size,
            direction: Direction::Down,
            animation: Animation::new(frames, now),
            is_idle: true,
            frozen: false,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect { pos: self.pos, size: self.size }
    }

    pub fn update(&mut self, movement: Vec2, speed: f32, delta: f32, bounds: Bounds, now: u64, anim_ms: u64) {
        if self.frozen {
            self.is_idle = true;
            return;
        }
        let step = movement.clamp_unit().scale(speed * delta);
        if step.is_zero() {
            self.is_idle = true;
        } else {
            self.pos = bounds.clamp(self.pos + step, self.size, 0.0);
            if let Some(dir) = super::geometry::direction_of(step) {
                self.direction = dir;
            }
            self.is_idle = false;
        }
        self.animation.advance(now, anim_ms, self.is_idle);
    }

    pub fn place_at(&mut self, pos: Vec2, bounds: Bounds) {
        self.pos = bounds.clamp(pos, self.size, 0.0);
    }
}
