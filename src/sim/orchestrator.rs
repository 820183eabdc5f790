/// Level orchestrator: owns the roster and runs level transitions.
///
/// ## Transition
///
/// ```text
/// Idle ─▶ Starting ─▶ Clearing ─▶ Populating ─▶ Settling ─(duration)─▶ Idle
/// ```
///
/// Starting through Populating run synchronously inside `start_transition`;
/// Settling holds the world paused for the configured duration and is
/// completed by `update`. While `in_progress` is set every gameplay system
/// stands still (`WorldState::is_game_stopped`).
///
/// Any failure after Starting rolls back: the level id reverts, the
/// transition is cleared and whatever roster exists is resumed.

use std::collections::HashMap;

use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::domain::behavior::BehaviorOutcome;
use crate::domain::entity::{Archetype, Direction, Entity, EntityId, Player};
use crate::domain::geometry::{Size, Vec2};
use crate::domain::snapshot::Snapshot;
use crate::error::{GameError, GameResult};
use crate::sim::context::GameContext;
use crate::sim::event::{GameEvent, MessageKey, SoundId};
use crate::sim::level::{LevelDef, LevelId, LevelTable, SpawnPolicy};
use crate::sim::timers::{Task, TimerOwner};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransitionPhase {
    Idle,
    Starting,
    Clearing,
    Populating,
    Settling,
}

#[derive(Clone, Debug)]
pub struct TransitionState {
    pub in_progress: bool,
    pub phase: TransitionPhase,
    pub start_time: u64,
    pub duration: u64,
    pub source: LevelId,
    pub target: LevelId,
}

impl TransitionState {
    fn idle(level: LevelId) -> Self {
        TransitionState {
            in_progress: false,
            phase: TransitionPhase::Idle,
            start_time: 0,
            duration: 0,
            source: level,
            target: level,
        }
    }
}

pub struct LevelOrchestrator {
    levels: LevelTable,
    current_level: LevelId,
    roster: Vec<Entity>,
    transition: TransitionState,
    /// Cross-level memory, one snapshot per archetype.
    preserved: HashMap<Archetype, Snapshot>,
    next_entity_id: EntityId,
}

impl LevelOrchestrator {
    pub fn new(levels: LevelTable, start: LevelId) -> Self {
        LevelOrchestrator {
            levels,
            current_level: start,
            roster: Vec::new(),
            transition: TransitionState::idle(start),
            preserved: HashMap::new(),
            next_entity_id: 1,
        }
    }

    pub fn current_level(&self) -> LevelId {
        self.current_level
    }

    pub fn current_def(&self) -> GameResult<&LevelDef> {
        self.levels.get(self.current_level)
    }

    pub fn transition(&self) -> &TransitionState {
        &self.transition
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.in_progress
    }

    pub fn roster(&self) -> &[Entity] {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut [Entity] {
        &mut self.roster
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.roster.iter_mut().find(|e| e.id == id)
    }

    pub fn preserved(&self, archetype: Archetype) -> Option<&Snapshot> {
        self.preserved.get(&archetype)
    }

    // ══════════════════════════════════════════════════════════════
    // Transitions
    // ══════════════════════════════════════════════════════════════

    /// Public entry point for moving to another level.
    pub fn load_level(&mut self, target: LevelId, player: &mut Player, ctx: &mut GameContext) -> GameResult<()> {
        self.start_transition(target, player, ctx)
    }

    pub fn start_transition(&mut self, target: LevelId, player: &mut Player, ctx: &mut GameContext) -> GameResult<()> {
        if self.transition.in_progress {
            let err = GameError::TransitionInProgress { requested: target, target: self.transition.target };
            warn!("{}", err);
            return Err(err);
        }
        if ctx.is_game_over() {
            debug!("transition to level {} ignored: game over", target);
            return Err(GameError::GameStopped);
        }
        if let Err(err) = self.levels.get(target).and_then(check_spawn) {
            error!("{}", err);
            return Err(err);
        }

        let source = self.current_level;
        info!("transition {} -> {}", source, target);
        self.transition = TransitionState {
            in_progress: true,
            phase: TransitionPhase::Starting,
            start_time: ctx.now,
            duration: ctx.tuning.timing.transition_ms,
            source,
            target,
        };
        for e in self.roster.iter_mut() {
            e.pause_updates();
        }
        ctx.emit(GameEvent::TransitionStarted { from: source, to: target });
        ctx.play_sound(SoundId::Transition);

        self.transition.phase = TransitionPhase::Clearing;
        self.clear_roster(ctx);

        self.transition.phase = TransitionPhase::Populating;
        match self.populate(target, ctx) {
            Ok(anchor) => {
                if !ctx.is_game_over() {
                    player.place_at(anchor, ctx.bounds);
                }
            }
            Err(err) => {
                error!("populating level {} failed: {}", target, err);
                self.rollback(source, ctx);
                return Err(err);
            }
        }

        self.transition.phase = TransitionPhase::Settling;
        Ok(())
    }

    /// Finish Settling once the minimum duration has elapsed.
    /// Returns true on the tick the transition completes.
    pub fn update(&mut self, now: u64) -> bool {
        if self.transition.phase != TransitionPhase::Settling {
            return false;
        }
        if now.saturating_sub(self.transition.start_time) < self.transition.duration {
            return false;
        }
        for e in self.roster.iter_mut() {
            e.resume_updates(now);
        }
        debug!("level {} settled", self.current_level);
        self.transition = TransitionState::idle(self.current_level);
        true
    }

    /// Return to `source` with a live roster. The old roster was already
    /// released, so the source level is populated again.
    fn rollback(&mut self, source: LevelId, ctx: &mut GameContext) {
        self.clear_roster(ctx);
        if let Err(err) = self.populate(source, ctx) {
            error!("could not restore level {}: {}", source, err);
        }
        self.current_level = source;
        self.transition = TransitionState::idle(source);
        for e in self.roster.iter_mut() {
            e.resume_updates(ctx.now);
        }
        warn!("transition rolled back to level {}", source);
    }

    /// Snapshot every entity's preserved fields, then release them.
    fn clear_roster(&mut self, ctx: &mut GameContext) {
        ctx.timers.cancel_owner(TimerOwner::Level);
        for mut e in self.roster.drain(..) {
            self.preserved.insert(e.archetype, Snapshot::capture(&e));
            e.cleanup(&mut ctx.timers);
        }
    }

    /// Build the roster for `target`. Returns the player anchor.
    fn populate(&mut self, target: LevelId, ctx: &mut GameContext) -> GameResult<Vec2> {
        let def = self.levels.get(target)?.clone();
        check_spawn(&def)?;
        self.current_level = target;

        match &def.spawn {
            SpawnPolicy::Fixed { placements } => {
                for p in placements {
                    let id = self.spawn(p.archetype, Vec2::new(p.x, p.y), false, ctx);
                    ctx.emit(GameEvent::EntitySpawned { id, archetype: p.archetype });
                }
            }
            SpawnPolicy::RandomSingle { interval_ms, .. } => {
                self.spawn_random(ctx);
                let every = interval_ms.unwrap_or(ctx.tuning.behavior.spawn_interval_ms);
                ctx.timers.schedule_every(ctx.now, every, TimerOwner::Level, Task::RandomSpawn);
            }
            SpawnPolicy::None => {}
        }
        for e in self.roster.iter_mut() {
            e.pause_updates();
        }

        ctx.emit(GameEvent::LevelEntered(target));
        ctx.show_message(MessageKey::LevelName(target));
        Ok(def.anchor())
    }

    fn spawn(&mut self, archetype: Archetype, pos: Vec2, by_policy: bool, ctx: &mut GameContext) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        let size = Size::new(ctx.tuning.world.npc_size, ctx.tuning.world.npc_size);
        let frames = ctx.tuning.timing.animation_frames;
        let mut e = Entity::new(id, archetype, pos, size, frames, ctx.now);
        e.clamp_to(ctx.bounds, 0.0);
        e.spawned_by_policy = by_policy;
        if let Some(&dir) = Direction::ALL.choose(&mut ctx.rng) {
            e.direction = dir;
        }
        if let Some(snap) = self.preserved.get(&archetype) {
            snap.apply(&mut e);
        }
        debug!("spawned {} {} at ({:.0}, {:.0})", archetype.name(), id, e.pos.x, e.pos.y);
        self.roster.push(e);
        id
    }

    /// Random-single policy: spawn one entity from the pool unless one it
    /// spawned earlier is still around.
    pub fn spawn_random(&mut self, ctx: &mut GameContext) -> Option<EntityId> {
        let pool = match self.levels.get(self.current_level) {
            Ok(LevelDef { spawn: SpawnPolicy::RandomSingle { pool, .. }, .. }) => pool.clone(),
            _ => return None,
        };
        if self.roster.iter().any(|e| e.spawned_by_policy && !e.behavior.is_disappearing) {
            return None;
        }
        let archetype = *pool.choose(&mut ctx.rng)?;
        let size = ctx.tuning.world.npc_size;
        let margin = ctx.tuning.world.corner_buffer;
        let max_x = (ctx.bounds.width - size - margin).max(margin + 1.0);
        let max_y = (ctx.bounds.height - size - margin).max(margin + 1.0);
        let pos = Vec2::new(ctx.rng.gen_range(margin..max_x), ctx.rng.gen_range(margin..max_y));
        let id = self.spawn(archetype, pos, true, ctx);
        ctx.emit(GameEvent::EntitySpawned { id, archetype });
        ctx.play_sound(SoundId::Spawn);
        Some(id)
    }

    // ══════════════════════════════════════════════════════════════
    // Roster maintenance
    // ══════════════════════════════════════════════════════════════

    /// React to a behavior outcome for entity `id`.
    pub fn handle_outcome(&mut self, id: EntityId, outcome: BehaviorOutcome, ctx: &mut GameContext) {
        match outcome {
            BehaviorOutcome::Disappear => {
                let delay = ctx.tuning.timing.disappear_delay_ms;
                ctx.timers.schedule(ctx.now, delay, TimerOwner::Entity(id), Task::RemoveEntity(id));
            }
            BehaviorOutcome::RemoveAfterGameOver => ctx.game_over.defer_removal(id),
        }
    }

    pub fn remove_entity(&mut self, id: EntityId, ctx: &mut GameContext) -> bool {
        let Some(idx) = self.roster.iter().position(|e| e.id == id) else {
            return false;
        };
        let mut e = self.roster.remove(idx);
        self.preserved.insert(e.archetype, Snapshot::capture(&e));
        e.cleanup(&mut ctx.timers);
        ctx.emit(GameEvent::EntityRemoved { id });
        debug!("removed {} {}", e.archetype.name(), id);
        true
    }

    pub fn pause_all(&mut self) {
        for e in self.roster.iter_mut() {
            e.pause_updates();
        }
    }

    pub fn resume_all(&mut self, now: u64) {
        for e in self.roster.iter_mut() {
            e.resume_updates(now);
        }
    }

    /// Fresh session: forget cross-level memory, drop the roster and
    /// enter `start` as a regular transition.
    pub fn restart(&mut self, start: LevelId, player: &mut Player, ctx: &mut GameContext) -> GameResult<()> {
        for mut e in self.roster.drain(..) {
            e.cleanup(&mut ctx.timers);
        }
        self.preserved.clear();
        self.transition = TransitionState::idle(self.current_level);
        player.frozen = false;
        self.start_transition(start, player, ctx)
    }
}

/// A level whose spawn policy cannot produce a roster is refused before
/// anything is torn down.
fn check_spawn(def: &LevelDef) -> GameResult<()> {
    match &def.spawn {
        SpawnPolicy::RandomSingle { pool, .. } if pool.is_empty() => Err(GameError::EmptySpawnPool(def.id)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::sim::game_over::{self, GameOverCause};
    use crate::sim::level::{builtin_levels, Placement, TransitionZone};

    fn setup() -> (LevelOrchestrator, Player, GameContext) {
        let ctx = GameContext::new(Tuning::default(), Some(3));
        let player = Player::new(Vec2::new(400.0, 300.0), Size::new(32.0, 32.0), 4, 0);
        (LevelOrchestrator::new(builtin_levels(), 1), player, ctx)
    }

    fn settle(o: &mut LevelOrchestrator, ctx: &mut GameContext) {
        ctx.now += ctx.tuning.timing.transition_ms;
        assert!(o.update(ctx.now));
    }

    #[test]
    fn load_populates_and_pauses_until_settled() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(2, &mut p, &mut c).unwrap();
        assert!(o.is_transitioning());
        assert_eq!(o.transition().phase, TransitionPhase::Settling);
        assert_eq!(o.current_level(), 2);
        assert_eq!(o.roster().len(), 3);
        assert!(o.roster().iter().all(|e| e.is_paused));
        assert_eq!(p.pos, Vec2::new(60.0, 284.0));

        c.now += 100;
        assert!(!o.update(c.now));
        settle(&mut o, &mut c);
        assert!(!o.is_transitioning());
        assert!(o.roster().iter().all(|e| !e.is_paused));
    }

    #[test]
    fn second_load_during_transition_is_rejected() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(3, &mut p, &mut c).unwrap();
        let err = o.load_level(2, &mut p, &mut c).unwrap_err();
        assert!(matches!(err, GameError::TransitionInProgress { requested: 2, target: 3 }));
        assert_eq!(o.current_level(), 3);
        assert_eq!(o.transition().target, 3);
    }

    #[test]
    fn unknown_level_changes_nothing() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(1, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        let before: Vec<EntityId> = o.roster().iter().map(|e| e.id).collect();
        let err = o.load_level(42, &mut p, &mut c).unwrap_err();
        assert!(matches!(err, GameError::UnknownLevel(42)));
        assert_eq!(o.current_level(), 1);
        assert!(!o.is_transitioning());
        let after: Vec<EntityId> = o.roster().iter().map(|e| e.id).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn empty_pool_rolls_back() {
        let defs = vec![
            LevelDef {
                id: 1,
                name: "a".into(),
                background: String::new(),
                zones: vec![TransitionZone { rect: [0.0, 0.0, 1.0, 1.0], target: 2 }],
                spawn: SpawnPolicy::None,
                anchor: [100.0, 100.0],
            },
            LevelDef {
                id: 2,
                name: "b".into(),
                background: String::new(),
                zones: vec![],
                spawn: SpawnPolicy::RandomSingle { pool: vec![], interval_ms: None },
                anchor: [10.0, 10.0],
            },
        ];
        let mut c = GameContext::new(Tuning::default(), Some(3));
        let mut p = Player::new(Vec2::new(400.0, 300.0), Size::new(32.0, 32.0), 4, 0);
        let mut o = LevelOrchestrator::new(LevelTable::from_defs(defs), 1);
        o.load_level(1, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);

        let err = o.load_level(2, &mut p, &mut c).unwrap_err();
        assert!(matches!(err, GameError::EmptySpawnPool(2)));
        assert_eq!(o.current_level(), 1);
        assert!(!o.is_transitioning());
        assert_eq!(o.transition().phase, TransitionPhase::Idle);
    }

    #[test]
    fn refused_target_keeps_populated_source() {
        let defs = vec![
            LevelDef {
                id: 1,
                name: "a".into(),
                background: String::new(),
                zones: vec![],
                spawn: SpawnPolicy::Fixed {
                    placements: vec![Placement { archetype: Archetype::Fleer, x: 200.0, y: 200.0 }],
                },
                anchor: [100.0, 100.0],
            },
            LevelDef {
                id: 2,
                name: "b".into(),
                background: String::new(),
                zones: vec![],
                spawn: SpawnPolicy::RandomSingle { pool: vec![], interval_ms: None },
                anchor: [10.0, 10.0],
            },
        ];
        let mut c = GameContext::new(Tuning::default(), Some(3));
        let mut p = Player::new(Vec2::new(400.0, 300.0), Size::new(32.0, 32.0), 4, 0);
        let mut o = LevelOrchestrator::new(LevelTable::from_defs(defs), 1);
        o.load_level(1, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        let before: Vec<EntityId> = o.roster().iter().map(|e| e.id).collect();
        let player_before = p.pos;

        assert!(o.load_level(2, &mut p, &mut c).is_err());
        assert_eq!(o.current_level(), 1);
        let after: Vec<EntityId> = o.roster().iter().map(|e| e.id).collect();
        assert_eq!(before, after);
        assert_eq!(before.len(), 1);
        assert!(o.roster().iter().all(|e| !e.is_paused));
        assert_eq!(p.pos, player_before);
    }

    #[test]
    fn rollback_repopulates_source() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(1, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        let count = o.roster().len();
        assert!(count > 0);
        o.transition.in_progress = true;
        o.clear_roster(&mut c);
        o.rollback(1, &mut c);
        assert_eq!(o.roster().len(), count);
        assert!(!o.is_transitioning());
        assert!(o.roster().iter().all(|e| !e.is_paused));
    }

    #[test]
    fn preserved_state_follows_archetype() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(1, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        for e in o.roster_mut() {
            if e.archetype == Archetype::Fleer {
                e.behavior.encounters = 4;
                e.behavior.last_effect_at = Some(1);
            }
        }
        o.load_level(2, &mut p, &mut c).unwrap();
        let fleer = o.roster().iter().find(|e| e.archetype == Archetype::Fleer).unwrap();
        assert_eq!(fleer.behavior.encounters, 4);
        assert_eq!(fleer.behavior.last_effect_at, None);
        assert_eq!(o.preserved(Archetype::Fleer).map(|s| s.archetype), Some(Archetype::Fleer));
    }

    #[test]
    fn clearing_cancels_entity_and_level_timers() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(3, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        assert_eq!(c.timers.pending_for(TimerOwner::Level), 1);
        let id = o.roster()[0].id;
        c.timers.schedule(c.now, 50, TimerOwner::Entity(id), Task::InteractionExpired(id));
        o.load_level(4, &mut p, &mut c).unwrap();
        assert!(c.timers.is_empty());
        assert!(o.roster().is_empty());
    }

    #[test]
    fn random_single_keeps_one_alive() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(3, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        assert_eq!(o.roster().len(), 1);
        assert_eq!(o.spawn_random(&mut c), None);
        let id = o.roster()[0].id;
        o.roster_mut()[0].start_disappearing();
        assert!(o.spawn_random(&mut c).is_some());
        assert!(o.remove_entity(id, &mut c));
        assert_eq!(o.roster().len(), 1);
    }

    #[test]
    fn random_spawn_ignored_on_fixed_level() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(2, &mut p, &mut c).unwrap();
        assert_eq!(o.spawn_random(&mut c), None);
    }

    #[test]
    fn game_over_blocks_transitions_and_keeps_player() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(1, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        game_over::trigger(&mut c, GameOverCause::Ambushed);
        let err = o.load_level(2, &mut p, &mut c).unwrap_err();
        assert!(matches!(err, GameError::GameStopped));
        assert_eq!(o.current_level(), 1);
    }

    #[test]
    fn disappear_outcome_schedules_removal() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(2, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        let id = o.roster()[2].id;
        o.handle_outcome(id, BehaviorOutcome::Disappear, &mut c);
        let fired = c.timers.drain_due(c.now + 400);
        assert!(fired.iter().any(|f| f.task == Task::RemoveEntity(id)));
    }

    #[test]
    fn restart_forgets_memory() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(2, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        o.load_level(1, &mut p, &mut c).unwrap();
        settle(&mut o, &mut c);
        assert!(o.preserved(Archetype::Chaser).is_some());
        p.frozen = true;
        o.restart(1, &mut p, &mut c).unwrap();
        assert!(o.preserved(Archetype::Chaser).is_none());
        assert!(!p.frozen);
        assert_eq!(p.pos, Vec2::new(80.0, 284.0));
    }

    #[test]
    fn fixed_placements_are_used() {
        let (mut o, mut p, mut c) = setup();
        o.load_level(1, &mut p, &mut c).unwrap();
        let first = &o.roster()[0];
        let Placement { x, y, .. } = place_of(&o, 1, 0);
        assert_eq!(first.pos, Vec2::new(x, y));
    }

    fn place_of(o: &LevelOrchestrator, level: LevelId, idx: usize) -> Placement {
        match &o.levels.get(level).unwrap().spawn {
            SpawnPolicy::Fixed { placements } => placements[idx].clone(),
            _ => panic!("not fixed"),
        }
    }
}
