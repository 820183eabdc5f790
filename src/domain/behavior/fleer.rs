/// Fleer: runs from the player when close, wanders otherwise.
///
/// Flight heads directly away from the player, jittered by a bounded random
/// perturbation and a zigzag that flips on an interval. A cornered fleer
/// breaks toward the world center instead. Each rewarded encounter makes
/// it warier (larger trigger radius, capped).

use std::f32::consts::PI;

use log::debug;
use rand::Rng;

use super::{move_by, track_contact, update_zigzag, wanderer, BehaviorOutcome, Contact, Frame};
use crate::config::BehaviorConfig;
use crate::domain::entity::Entity;
use crate::domain::geometry::{bound_perturbation, Vec2};
use crate::sim::context::GameContext;
use crate::sim::event::SoundId;
use crate::sim::score::Resource;

pub fn flee_radius(e: &Entity, cfg: &BehaviorConfig) -> f32 {
    let grown = cfg.flee_trigger_radius + e.behavior.encounters as f32 * cfg.fleer_radius_per_encounter;
    grown.min(cfg.fleer_radius_cap.max(cfg.flee_trigger_radius))
}

pub fn decide(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) {
    let cfg = &ctx.tuning.behavior;
    let radius = flee_radius(e, cfg);
    let wander_speed = cfg.wander_speed;
    let speed = cfg.wander_speed * cfg.flee_speed_multiplier;
    let zigzag_ms = cfg.zigzag_interval_ms;
    let zigzag = bound_perturbation(cfg.zigzag_angle);
    let jitter = bound_perturbation(cfg.flee_perturbation).abs();
    let corner_buffer = ctx.tuning.world.corner_buffer;
    let now = ctx.now;

    let center = e.rect().center();
    let player = frame.player.center();
    if center.distance(player) >= radius {
        wanderer::wander(e, frame, ctx, wander_speed);
        return;
    }

    update_zigzag(e, now, zigzag_ms);
    let angle = if frame.bounds.in_corner(e.pos, e.size, corner_buffer) {
        (frame.bounds.center() - center).angle()
    } else {
        let away = center - player;
        let base = if away.is_zero() { ctx.rng.gen_range(-PI..PI) } else { away.angle() };
        let noise = if jitter > 0.0 { ctx.rng.gen_range(-jitter..=jitter) } else { 0.0 };
        base + noise + zigzag * e.behavior.zigzag_direction
    };

    move_by(e, Vec2::from_angle(angle).scale(speed * frame.delta), frame.bounds, 0.0);
    e.behavior.stuck_timer = now;
}

/// Sustained contact earns friendship once per contact, gated by cooldown.
pub fn interact(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) -> Option<BehaviorOutcome> {
    let now = ctx.now;
    let held = match track_contact(e, frame, now) {
        Contact::Began => 0,
        Contact::Held(ms) => ms,
        Contact::Ended | Contact::None => return None,
    };
    let cfg = &ctx.tuning.behavior;
    let reward = cfg.fleer_friendship_reward;
    if held < cfg.contact_sustain_ms
        || !e.behavior.can_interact
        || !e.behavior.cooldown_ready(now, cfg.effect_cooldown_ms)
    {
        return None;
    }

    let b = &mut e.behavior;
    b.can_interact = false;
    b.has_interacted = true;
    b.last_effect_at = Some(now);
    b.encounters += 1;
    debug!("fleer {} befriended (encounter {})", e.id, b.encounters);
    ctx.adjust(Resource::Friendship, reward);
    ctx.play_sound(SoundId::Reward);
    None
}
