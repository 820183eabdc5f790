/// Toll-Collector and Ambush: wander until the player bumps into them, then
/// stop and offer a choice for a limited window.
///
/// Toll-Collector: Reward-A pays in love (which costs energy), Reward-B in
/// friendship. Either way it disappears, as it does when the window lapses.
///
/// Ambush: looks the same. Accepting (Reward-A) springs the trap and ends
/// the game; the entity stays on screen until the final game-over screen.
/// Declining (Reward-B) earns a little friendship.

use log::{debug, info};

use super::{track_contact, wanderer, BehaviorOutcome, Contact, Frame};
use crate::domain::entity::{Action, Archetype, Entity, SpriteTag};
use crate::sim::context::GameContext;
use crate::sim::event::{MessageKey, SoundId};
use crate::sim::game_over::{self, GameOverCause};
use crate::sim::score::Resource;
use crate::sim::timers::{Task, TimerOwner};

pub fn decide(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) {
    if e.behavior.window_open || e.behavior.has_interacted {
        e.is_idle = true;
        return;
    }
    let speed = ctx.tuning.behavior.wander_speed;
    wanderer::wander(e, frame, ctx, speed);
}

pub fn interact(e: &mut Entity, frame: &Frame, ctx: &mut GameContext) -> Option<BehaviorOutcome> {
    let contact = track_contact(e, frame, ctx.now);
    if e.behavior.has_interacted {
        return None;
    }

    if contact == Contact::Began {
        if !e.behavior.window_open {
            open_window(e, ctx);
        }
        if !e.behavior.sound_played {
            e.behavior.sound_played = true;
            ctx.play_sound(SoundId::TollBell);
        }
    }
    // Choices only count while touching; walking away lets the window lapse.
    if !e.behavior.window_open || !e.behavior.is_colliding {
        return None;
    }

    if frame.input.pressed(Action::RewardA) {
        Some(accept(e, ctx))
    } else if frame.input.pressed(Action::RewardB) {
        Some(decline(e, ctx))
    } else {
        None
    }
}

/// The interaction window lapsed with no choice made.
pub fn expire_window(e: &mut Entity, ctx: &mut GameContext) -> Option<BehaviorOutcome> {
    if !e.behavior.window_open || e.behavior.has_interacted || e.behavior.is_disappearing {
        return None;
    }
    e.behavior.window_timer = None;
    debug!("{} {} window expired", e.archetype.name(), e.id);
    Some(disappear(e, ctx))
}

fn open_window(e: &mut Entity, ctx: &mut GameContext) {
    let window = ctx.tuning.behavior.interaction_window_ms;
    let b = &mut e.behavior;
    b.window_open = true;
    b.window_timer = Some(ctx.timers.schedule(
        ctx.now,
        window,
        TimerOwner::Entity(e.id),
        Task::InteractionExpired(e.id),
    ));
    e.is_idle = true;
    e.sprite = SpriteTag::Attack;
    ctx.show_message(MessageKey::Offer(e.archetype));
    debug!("{} {} offers a choice for {}ms", e.archetype.name(), e.id, window);
}

fn close_window(e: &mut Entity, ctx: &mut GameContext) {
    let b = &mut e.behavior;
    if let Some(id) = b.window_timer.take() {
        ctx.timers.cancel(id);
    }
    b.window_open = false;
    b.has_interacted = true;
    b.encounters += 1;
}

fn accept(e: &mut Entity, ctx: &mut GameContext) -> BehaviorOutcome {
    close_window(e, ctx);
    match e.archetype {
        Archetype::Ambush => {
            info!("ambush {} sprung", e.id);
            ctx.play_sound(SoundId::AmbushSting);
            ctx.play_sound(SoundId::AmbushLaugh);
            game_over::trigger(ctx, GameOverCause::Ambushed);
            BehaviorOutcome::RemoveAfterGameOver
        }
        _ => {
            let love = ctx.tuning.behavior.toll_love_reward;
            ctx.grant_love(love);
            ctx.play_sound(SoundId::Reward);
            disappear(e, ctx)
        }
    }
}

fn decline(e: &mut Entity, ctx: &mut GameContext) -> BehaviorOutcome {
    close_window(e, ctx);
    let friendship = match e.archetype {
        Archetype::Ambush => ctx.tuning.behavior.ambush_decline_friendship,
        _ => ctx.tuning.behavior.toll_friendship_reward,
    };
    ctx.adjust(Resource::Friendship, friendship);
    ctx.play_sound(SoundId::Reward);
    disappear(e, ctx)
}

fn disappear(e: &mut Entity, ctx: &mut GameContext) -> BehaviorOutcome {
    e.start_disappearing();
    ctx.play_sound(SoundId::Disappear);
    BehaviorOutcome::Disappear
}

#[cfg(test)]
mod tests {
    use super::super::testutil::*;
    use super::*;
    use crate::domain::entity::InputSnapshot;
    use crate::sim::event::GameEvent;

    fn pressing(action: Action) -> InputSnapshot {
        let mut input = InputSnapshot::default();
        input.actions.insert(action);
        input
    }

    fn bell_count(events: &[GameEvent]) -> usize {
        events.iter().filter(|e| **e == GameEvent::PlaySound(SoundId::TollBell)).count()
    }

    #[test]
    fn collision_sound_plays_once_per_contact() {
        let mut c = ctx();
        let idle = InputSnapshot::default();
        let on = frame(110.0, 100.0, &idle);
        let off = frame(500.0, 500.0, &idle);
        let mut e = npc(Archetype::TollCollector, 100.0, 100.0);

        c.now = 10;
        interact(&mut e, &on, &mut c);
        assert!(e.behavior.sound_played);
        assert!(e.behavior.window_open);
        assert_eq!(e.sprite, SpriteTag::Attack);
        for t in 2..6 {
            c.now = t * 10;
            interact(&mut e, &on, &mut c);
            assert!(e.behavior.sound_played);
        }
        assert_eq!(bell_count(&c.take_events()), 1);

        c.now = 100;
        interact(&mut e, &off, &mut c);
        assert!(!e.behavior.sound_played);
        c.now = 110;
        interact(&mut e, &on, &mut c);
        assert_eq!(bell_count(&c.take_events()), 1);
    }

    #[test]
    fn frozen_while_window_open() {
        let mut c = ctx();
        let idle = InputSnapshot::default();
        let on = frame(110.0, 100.0, &idle);
        let mut e = npc(Archetype::TollCollector, 100.0, 100.0);
        e.direction = crate::domain::entity::Direction::Right;
        interact(&mut e, &on, &mut c);
        c.now = 16;
        decide(&mut e, &on, &mut c);
        assert_eq!(e.pos.x, 100.0);
        assert!(e.is_idle);
    }

    #[test]
    fn reward_a_grants_love_once() {
        let mut c = ctx();
        let idle = InputSnapshot::default();
        let a = pressing(Action::RewardA);
        let mut e = npc(Archetype::TollCollector, 100.0, 100.0);

        interact(&mut e, &frame(110.0, 100.0, &idle), &mut c);
        c.now = 50;
        let out = interact(&mut e, &frame(110.0, 100.0, &a), &mut c);
        assert_eq!(out, Some(BehaviorOutcome::Disappear));
        assert_eq!(c.score.get(Resource::Love), 65);
        assert_eq!(c.score.get(Resource::Energy), 85);
        assert!(e.behavior.is_disappearing);
        assert!(!e.is_visible);
        assert!(c.timers.is_empty());

        c.now = 60;
        let again = interact(&mut e, &frame(110.0, 100.0, &a), &mut c);
        assert_eq!(again, None);
        assert_eq!(c.score.get(Resource::Love), 65);
    }

    #[test]
    fn reward_b_grants_friendship() {
        let mut c = ctx();
        c.adjust(Resource::Friendship, -40);
        let b = pressing(Action::RewardB);
        let mut e = npc(Archetype::TollCollector, 100.0, 100.0);
        let out = interact(&mut e, &frame(110.0, 100.0, &b), &mut c);
        assert_eq!(out, Some(BehaviorOutcome::Disappear));
        assert_eq!(c.score.get(Resource::Friendship), 70);
        assert_eq!(c.score.get(Resource::Love), 50);
    }

    #[test]
    fn choice_ignored_once_player_walks_away() {
        let mut c = ctx();
        let idle = InputSnapshot::default();
        let a = pressing(Action::RewardA);
        let mut e = npc(Archetype::Ambush, 100.0, 100.0);

        interact(&mut e, &frame(110.0, 100.0, &idle), &mut c);
        assert!(e.behavior.window_open);
        c.now = 50;
        let out = interact(&mut e, &frame(600.0, 500.0, &a), &mut c);
        assert_eq!(out, None);
        assert!(!c.is_game_over());
        assert!(e.behavior.window_open);

        // Back in contact before the window lapses: the choice counts again
        c.now = 80;
        let out = interact(&mut e, &frame(110.0, 100.0, &a), &mut c);
        assert_eq!(out, Some(BehaviorOutcome::RemoveAfterGameOver));
    }

    #[test]
    fn window_expiry_disappears() {
        let mut c = ctx();
        let idle = InputSnapshot::default();
        let mut e = npc(Archetype::TollCollector, 100.0, 100.0);
        interact(&mut e, &frame(110.0, 100.0, &idle), &mut c);
        let fired = c.timers.drain_due(4_000);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].task, Task::InteractionExpired(1));
        assert_eq!(expire_window(&mut e, &mut c), Some(BehaviorOutcome::Disappear));
        assert!(e.behavior.is_disappearing);
        assert_eq!(expire_window(&mut e, &mut c), None);
    }

    #[test]
    fn ambush_accept_ends_game() {
        let mut c = ctx();
        let a = pressing(Action::RewardA);
        let mut e = npc(Archetype::Ambush, 100.0, 100.0);
        let out = interact(&mut e, &frame(110.0, 100.0, &a), &mut c);
        assert_eq!(out, Some(BehaviorOutcome::RemoveAfterGameOver));
        assert_eq!(c.score.latched_cause(), Some(GameOverCause::Ambushed));
        assert!(e.is_visible);
        let ev = c.take_events();
        let sting = ev.iter().position(|x| *x == GameEvent::PlaySound(SoundId::AmbushSting));
        let laugh = ev.iter().position(|x| *x == GameEvent::PlaySound(SoundId::AmbushLaugh));
        assert!(sting.is_some() && laugh.is_some());
        assert!(sting < laugh);
    }

    #[test]
    fn ambush_decline_is_small_reward() {
        let mut c = ctx();
        c.adjust(Resource::Friendship, -40);
        let b = pressing(Action::RewardB);
        let mut e = npc(Archetype::Ambush, 100.0, 100.0);
        let out = interact(&mut e, &frame(110.0, 100.0, &b), &mut c);
        assert_eq!(out, Some(BehaviorOutcome::Disappear));
        assert_eq!(c.score.get(Resource::Friendship), 65);
        assert!(!c.is_game_over());
    }
}
