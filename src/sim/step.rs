/// The step function: advances the world by one tick.
///
/// Processing order:
///   1. Clock (delta ticks, simulation time)
///   2. Due timers (decay, interaction windows, removals, spawns, game over)
///   3. Transition settling
///   4. Game-over sequence (final screen, reset animation, new game)
///   5. Score bar flashes
///   6. Player movement
///   7. NPC behaviors (all move, then all interact)
///   8. Score check (game-over latch)
///   9. Transition zones
///
/// Steps 6–9 are skipped while the game is stopped (transition in flight
/// or game over), and on the tick a transition settles. Every timer
/// callback re-checks the stop flag itself, since it may fire long after
/// it was scheduled.

use log::{debug, error};

use crate::domain::behavior::{self, encounter, Frame};
use crate::domain::entity::{Action, InputSnapshot};
use crate::sim::event::GameEvent;
use crate::sim::game_over::{self, GameOverPhase};
use crate::sim::score::Resource;
use crate::sim::timers::Task;
use crate::sim::world::WorldState;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, input: &InputSnapshot, now: u64) -> Vec<GameEvent> {
    if world.paused {
        return vec![];
    }

    let delta = world.clock.tick(now);
    world.ctx.now = now;
    world.tick += 1;

    resolve_timers(world);
    let settled = world.orchestrator.update(now);
    resolve_game_over(world, input);
    world.ctx.score.update_flash(now);

    if !settled && !world.is_game_stopped() {
        resolve_player(world, input, delta);
        resolve_npcs(world, input, delta);
        game_over::check_scores(&mut world.ctx);
        if world.ctx.is_game_over() {
            world.player.frozen = true;
        }
    } else {
        world.player.is_idle = true;
    }
    if !settled && !world.is_game_stopped() {
        resolve_zones(world);
    }

    if world.message.is_some_and(|m| now >= m.until) {
        world.message = None;
    }

    let events = world.ctx.take_events();
    world.absorb(&events);
    events
}

// ══════════════════════════════════════════════════════════════
// Timers
// ══════════════════════════════════════════════════════════════

fn resolve_timers(world: &mut WorldState) {
    let now = world.ctx.now;
    for fired in world.ctx.timers.drain_due(now) {
        match fired.task {
            Task::FriendshipDecay | Task::EnergyDecay => {
                if world.is_game_stopped() {
                    debug!("{:?} skipped: game stopped", fired.task);
                    continue;
                }
                let cfg = &world.ctx.tuning.score;
                let (r, amount) = match fired.task {
                    Task::EnergyDecay => (Resource::Energy, cfg.energy_decay),
                    _ => (Resource::Friendship, cfg.friendship_decay),
                };
                world.ctx.adjust(r, -amount);
            }
            Task::InteractionExpired(id) => {
                if world.is_game_stopped() {
                    continue;
                }
                let Some(e) = world.orchestrator.entity_mut(id) else {
                    continue;
                };
                if e.is_paused {
                    continue;
                }
                if let Some(outcome) = encounter::expire_window(e, &mut world.ctx) {
                    world.orchestrator.handle_outcome(id, outcome, &mut world.ctx);
                }
            }
            Task::RemoveEntity(id) => {
                world.orchestrator.remove_entity(id, &mut world.ctx);
            }
            Task::RandomSpawn => {
                if world.is_game_stopped() {
                    continue;
                }
                world.orchestrator.spawn_random(&mut world.ctx);
            }
            Task::GameOverFinal => {
                for id in game_over::finalize(&mut world.ctx) {
                    world.orchestrator.remove_entity(id, &mut world.ctx);
                }
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Game over
// ══════════════════════════════════════════════════════════════

fn resolve_game_over(world: &mut WorldState, input: &InputSnapshot) {
    match world.ctx.game_over.phase() {
        GameOverPhase::Final => {
            if input.pressed(Action::Confirm) {
                game_over::confirm_restart(&mut world.ctx);
            }
        }
        GameOverPhase::Resetting => {
            if game_over::update(&mut world.ctx) {
                game_over::finish(&mut world.ctx);
                let start = world.ctx.tuning.world.start_level;
                if let Err(e) = world.orchestrator.restart(start, &mut world.player, &mut world.ctx) {
                    error!("new game could not enter level {}: {}", start, e);
                }
            }
        }
        GameOverPhase::Inactive | GameOverPhase::Announcing => {}
    }
}

// ══════════════════════════════════════════════════════════════
// Actors
// ══════════════════════════════════════════════════════════════

fn resolve_player(world: &mut WorldState, input: &InputSnapshot, delta: f32) {
    let speed = world.ctx.tuning.world.player_speed;
    let anim_ms = world.ctx.tuning.timing.animation_interval_ms;
    let bounds = world.ctx.bounds;
    world.player.update(input.movement, speed, delta, bounds, world.ctx.now, anim_ms);
}

fn resolve_npcs(world: &mut WorldState, input: &InputSnapshot, delta: f32) {
    let frame = Frame { player: world.player.rect(), bounds: world.ctx.bounds, delta, input };

    for e in world.orchestrator.roster_mut() {
        behavior::advance(e, &frame, &mut world.ctx);
    }

    let mut outcomes = vec![];
    for e in world.orchestrator.roster_mut() {
        // A sprung ambush freezes the rest of the roster on the same tick.
        if world.ctx.is_game_over() {
            break;
        }
        if let Some(outcome) = behavior::interact(e, &frame, &mut world.ctx) {
            outcomes.push((e.id, outcome));
        }
    }
    for (id, outcome) in outcomes {
        world.orchestrator.handle_outcome(id, outcome, &mut world.ctx);
    }
}

// ══════════════════════════════════════════════════════════════
// Transition zones
// ══════════════════════════════════════════════════════════════

fn resolve_zones(world: &mut WorldState) {
    let target = match world.orchestrator.current_def() {
        Ok(def) => def.zone_hit(&world.player.rect()),
        Err(_) => None,
    };
    if let Some(target) = target {
        if let Err(e) = world.orchestrator.start_transition(target, &mut world.player, &mut world.ctx) {
            debug!("zone transition refused: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::domain::entity::Archetype;
    use crate::domain::geometry::Vec2;
    use crate::sim::event::SoundId;
    use crate::sim::game_over::GameOverCause;
    use crate::sim::level::{builtin_levels, LevelDef, LevelTable, Placement, SpawnPolicy};

    const TICK: u64 = 16;

    fn idle() -> InputSnapshot {
        InputSnapshot::default()
    }

    fn pressing(action: Action) -> InputSnapshot {
        let mut i = InputSnapshot::default();
        i.actions.insert(action);
        i
    }

    /// One level with a single NPC sitting on the player's anchor.
    fn encounter_world(archetype: Archetype) -> WorldState {
        let def = LevelDef {
            id: 1,
            name: "test".into(),
            background: String::new(),
            zones: vec![],
            spawn: SpawnPolicy::Fixed { placements: vec![Placement { archetype, x: 410.0, y: 300.0 }] },
            anchor: [400.0, 300.0],
        };
        WorldState::new(Tuning::default(), LevelTable::from_defs(vec![def]), Some(5))
    }

    /// Step until the start transition has settled. Returns the current time.
    fn settle(w: &mut WorldState, mut now: u64) -> u64 {
        while w.orchestrator.is_transitioning() {
            now += TICK;
            step(w, &idle(), now);
            assert!(now < 10_000);
        }
        now
    }

    #[test]
    fn paused_world_does_nothing() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        w.toggle_pause(0);
        assert!(step(&mut w, &idle(), 5_000).is_empty());
        assert!(w.orchestrator.is_transitioning());
    }

    #[test]
    fn friendship_decays_once_settled() {
        let mut tuning = Tuning::default();
        tuning.timing.transition_ms = 2_000;
        let mut w = WorldState::new(tuning, builtin_levels(), Some(1));
        w.start(0);
        step(&mut w, &idle(), 1_000);
        assert_eq!(w.ctx.score.get(Resource::Friendship), 100);
        step(&mut w, &idle(), 2_000);
        assert!(!w.orchestrator.is_transitioning());
        step(&mut w, &idle(), 3_000);
        assert_eq!(w.ctx.score.get(Resource::Friendship), 99);
    }

    #[test]
    fn exhaustion_during_transition_waits_for_settle() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        w.ctx.adjust(Resource::Energy, -100);
        step(&mut w, &idle(), TICK);
        assert!(!w.ctx.is_game_over());
        step(&mut w, &idle(), 600);
        assert!(!w.orchestrator.is_transitioning());
        assert!(!w.ctx.is_game_over());
        let ev = step(&mut w, &idle(), 600 + TICK);
        assert_eq!(w.ctx.score.latched_cause(), Some(GameOverCause::Exhausted(Resource::Energy)));
        assert!(ev.contains(&GameEvent::GameOver(GameOverCause::Exhausted(Resource::Energy))));
        assert!(w.player.frozen);
    }

    #[test]
    fn zone_starts_transition() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        let now = settle(&mut w, 0);
        w.player.pos = Vec2::new(768.0, 284.0);
        let ev = step(&mut w, &idle(), now + TICK);
        assert!(ev.contains(&GameEvent::TransitionStarted { from: 1, to: 2 }));
        assert_eq!(w.orchestrator.current_level(), 2);
        assert_eq!(w.player.pos, Vec2::new(60.0, 284.0));
        assert!(w.is_game_stopped());
    }

    #[test]
    fn player_still_during_transition() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        let before = w.player.pos;
        let mut input = idle();
        input.movement = Vec2::new(1.0, 0.0);
        step(&mut w, &input, TICK);
        step(&mut w, &input, 2 * TICK);
        assert_eq!(w.player.pos, before);
    }

    #[test]
    fn toll_window_expires_and_entity_is_removed() {
        let mut w = encounter_world(Archetype::TollCollector);
        w.start(0);
        let now = settle(&mut w, 0);
        let ev = step(&mut w, &idle(), now + TICK);
        assert!(ev.contains(&GameEvent::PlaySound(SoundId::TollBell)));
        let opened = now + TICK;

        step(&mut w, &idle(), opened + 4_000);
        let e = &w.orchestrator.roster()[0];
        assert!(e.behavior.is_disappearing);

        let ev = step(&mut w, &idle(), opened + 4_400);
        assert!(w.orchestrator.roster().is_empty());
        assert!(ev.iter().any(|e| matches!(e, GameEvent::EntityRemoved { .. })));
    }

    #[test]
    fn toll_reward_a_applies_once() {
        let mut w = encounter_world(Archetype::TollCollector);
        w.start(0);
        let now = settle(&mut w, 0);
        let a = pressing(Action::RewardA);
        step(&mut w, &a, now + TICK);
        step(&mut w, &a, now + 2 * TICK);
        step(&mut w, &a, now + 3 * TICK);
        assert_eq!(w.ctx.score.get(Resource::Love), 65);
    }

    #[test]
    fn ambush_removal_waits_for_final_screen() {
        let mut w = encounter_world(Archetype::Ambush);
        w.start(0);
        let now = settle(&mut w, 0);
        step(&mut w, &pressing(Action::RewardA), now + TICK);
        assert_eq!(w.ctx.score.latched_cause(), Some(GameOverCause::Ambushed));
        assert_eq!(w.orchestrator.roster().len(), 1);

        step(&mut w, &idle(), now + TICK + 3_000);
        assert!(w.orchestrator.roster().is_empty());
        assert!(w.new_game_affordance);
    }

    #[test]
    fn full_game_over_cycle_starts_new_game() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        let mut now = settle(&mut w, 0);
        w.ctx.adjust(Resource::Love, -100);
        now += TICK;
        step(&mut w, &idle(), now);
        assert!(w.ctx.is_game_over());

        // Transitions are locked out
        w.player.pos = Vec2::new(768.0, 284.0);
        now += TICK;
        step(&mut w, &idle(), now);
        assert_eq!(w.orchestrator.current_level(), 1);

        now += 3_000;
        step(&mut w, &idle(), now);
        assert_eq!(w.ctx.game_over.phase(), GameOverPhase::Final);
        now += TICK;
        step(&mut w, &pressing(Action::Confirm), now);
        assert_eq!(w.ctx.game_over.phase(), GameOverPhase::Resetting);

        let mut restarted = false;
        for _ in 0..200 {
            now += TICK;
            if step(&mut w, &idle(), now).contains(&GameEvent::NewGame) {
                restarted = true;
                break;
            }
        }
        assert!(restarted);
        assert!(!w.ctx.is_game_over());
        assert!(!w.player.frozen);
        assert!(!w.new_game_affordance);
        assert_eq!(w.ctx.score.get(Resource::Love), 50);
        assert_eq!(w.orchestrator.current_level(), 1);
        assert!(w.orchestrator.is_transitioning());
    }

    #[test]
    fn load_during_transition_is_rejected_in_play() {
        let mut w = WorldState::new(Tuning::default(), builtin_levels(), Some(1));
        w.start(0);
        let now = settle(&mut w, 0);
        w.ctx.now = now;
        w.orchestrator.load_level(3, &mut w.player, &mut w.ctx).unwrap();
        assert!(w.orchestrator.load_level(2, &mut w.player, &mut w.ctx).is_err());
        assert_eq!(w.orchestrator.transition().target, 3);
    }
}
