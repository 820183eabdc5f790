/// Chaser: homes in on the player with a zigzag and drains energy on
/// contact, once per cooldown.

use log::debug;

use super::{move_by, track_contact, update_zigzag, BehaviorOutcome, Contact, Frame};
use crate::domain::entity::{Entity, SpriteTag};
use crate::domain::geometry::{bound_perturbation, Vec2};
use crate::sim::context::GameContext;
use crate::sim::event::SoundId;
use crate::sim::score::Resource;

pub fn decide(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) {
    let cfg = &ctx.tuning.behavior;
    let speed = cfg.chase_speed;
    let zigzag = bound_perturbation(cfg.zigzag_angle);
    let zigzag_ms = cfg.zigzag_interval_ms;

    let to_player = frame.player.center() - e.rect().center();
    if to_player.length() < 1.0 {
        e.is_idle = true;
        e.sprite = SpriteTag::Attack;
        return;
    }
    update_zigzag(e, ctx.now, zigzag_ms);
    let angle = to_player.angle() + zigzag * e.behavior.zigzag_direction;
    move_by(e, Vec2::from_angle(angle).scale(speed * frame.delta), frame.bounds, 0.0);
}

pub fn interact(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) -> Option<BehaviorOutcome> {
    let now = ctx.now;
    match track_contact(e, frame, now) {
        Contact::Began | Contact::Held(_) => {}
        Contact::Ended | Contact::None => return None,
    }
    let cfg = &ctx.tuning.behavior;
    let penalty = cfg.chaser_energy_penalty;
    if !e.behavior.can_interact || !e.behavior.cooldown_ready(now, cfg.effect_cooldown_ms) {
        return None;
    }

    let b = &mut e.behavior;
    b.can_interact = false;
    b.has_interacted = true;
    b.last_effect_at = Some(now);
    b.encounters += 1;
    e.sprite = SpriteTag::Attack;
    debug!("chaser {} caught the player", e.id);
    ctx.adjust(Resource::Energy, -penalty);
    ctx.play_sound(SoundId::Penalty);
    None
}
