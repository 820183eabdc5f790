/// Game-over sequence.
///
/// ```text
/// Inactive ──trigger──▶ Announcing ──final delay──▶ Final ──confirm──▶ Resetting ──bars restored──▶ Inactive
/// ```
///
/// The latch itself lives in `ScoreState` so every system can test it
/// cheaply; this controller only tracks where the sequence is.

use log::{debug, info};

use crate::domain::entity::EntityId;
use crate::sim::context::GameContext;
use crate::sim::event::{GameEvent, MessageKey, SoundId};
use crate::sim::score::Resource;
use crate::sim::timers::{Task, TimerOwner};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GameOverCause {
    Exhausted(Resource),
    Ambushed,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameOverPhase {
    Inactive,
    Announcing,
    Final,
    Resetting,
}

#[derive(Debug)]
pub struct GameOverController {
    phase: GameOverPhase,
    /// Entities whose removal waits for the final screen.
    deferred: Vec<EntityId>,
}

impl GameOverController {
    pub fn new() -> Self {
        GameOverController { phase: GameOverPhase::Inactive, deferred: Vec::new() }
    }

    pub fn phase(&self) -> GameOverPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase != GameOverPhase::Inactive
    }

    pub fn defer_removal(&mut self, id: EntityId) {
        if !self.deferred.contains(&id) {
            self.deferred.push(id);
        }
    }
}

/// Latch game over for the first resource that reached zero.
/// Callers skip this while a level transition is in flight.
pub fn check_scores(ctx: &mut GameContext) -> bool {
    if ctx.score.is_latched() {
        return false;
    }
    match ctx.score.first_exhausted() {
        Some(r) => trigger(ctx, GameOverCause::Exhausted(r)),
        None => false,
    }
}

/// Set the latch and start the sequence. Returns false if already latched.
pub fn trigger(ctx: &mut GameContext, cause: GameOverCause) -> bool {
    if !ctx.score.latch(cause) {
        debug!("game over ({:?}) ignored: already latched", cause);
        return false;
    }
    info!("game over: {:?}", cause);

    ctx.game_over.phase = GameOverPhase::Announcing;
    ctx.timers.cancel_owner(TimerOwner::Score);
    ctx.timers.cancel_entities();
    ctx.timers.cancel_owner(TimerOwner::Level);

    let message = match cause {
        GameOverCause::Exhausted(r) => MessageKey::Exhausted(r),
        GameOverCause::Ambushed => MessageKey::Ambushed,
    };
    let fade = ctx.tuning.score.music_fade_ms;
    ctx.emit(GameEvent::StopEffects);
    ctx.emit(GameEvent::FadeOutMusic { duration_ms: fade });
    ctx.play_sound(SoundId::GameOver);
    ctx.show_message(message);
    ctx.emit(GameEvent::GameOver(cause));

    let delay = ctx.tuning.score.final_delay_ms;
    ctx.timers.schedule(ctx.now, delay, TimerOwner::GameOver, Task::GameOverFinal);
    true
}

/// Final screen. Returns the entities whose removal was deferred.
pub fn finalize(ctx: &mut GameContext) -> Vec<EntityId> {
    if ctx.game_over.phase != GameOverPhase::Announcing {
        return vec![];
    }
    ctx.game_over.phase = GameOverPhase::Final;
    ctx.show_message(MessageKey::GameOver);
    ctx.emit(GameEvent::ShowNewGameAffordance);
    std::mem::take(&mut ctx.game_over.deferred)
}

/// Player asked for a new game from the final screen.
pub fn confirm_restart(ctx: &mut GameContext) -> bool {
    if ctx.game_over.phase != GameOverPhase::Final {
        return false;
    }
    ctx.game_over.phase = GameOverPhase::Resetting;
    debug!("score reset animation started");
    true
}

/// One frame of the reset animation. True when the bars are back and the
/// caller should rebuild the session.
pub fn update(ctx: &mut GameContext) -> bool {
    if ctx.game_over.phase != GameOverPhase::Resetting {
        return false;
    }
    let step = ctx.tuning.score.reset_step;
    ctx.score.restore_step(step)
}

/// Clear the latch and start a fresh session's timers.
pub fn finish(ctx: &mut GameContext) {
    ctx.score.reset();
    ctx.game_over.phase = GameOverPhase::Inactive;
    ctx.game_over.deferred.clear();
    ctx.timers.cancel_owner(TimerOwner::GameOver);
    ctx.start_decay();
    ctx.emit(GameEvent::NewGame);
    ctx.emit(GameEvent::StartMusic);
    ctx.show_message(MessageKey::NewGame);
    info!("new game");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;

    fn ctx() -> GameContext {
        GameContext::new(Tuning::default(), Some(7))
    }

    #[test]
    fn check_scores_latches_first_exhausted() {
        let mut c = ctx();
        c.adjust(Resource::Love, -100);
        c.adjust(Resource::Energy, -100);
        assert!(check_scores(&mut c));
        assert_eq!(c.score.latched_cause(), Some(GameOverCause::Exhausted(Resource::Love)));
        assert_eq!(c.game_over.phase(), GameOverPhase::Announcing);
        // Second check is a no-op
        assert!(!check_scores(&mut c));
    }

    #[test]
    fn nothing_exhausted_nothing_latched() {
        let mut c = ctx();
        assert!(!check_scores(&mut c));
        assert!(!c.is_game_over());
    }

    #[test]
    fn trigger_cancels_gameplay_timers() {
        let mut c = ctx();
        c.start_decay();
        c.timers.schedule(0, 100, TimerOwner::Entity(3), Task::InteractionExpired(3));
        c.timers.schedule_every(0, 100, TimerOwner::Level, Task::RandomSpawn);
        assert!(trigger(&mut c, GameOverCause::Ambushed));
        assert_eq!(c.timers.len(), 1);
        assert_eq!(c.timers.pending_for(TimerOwner::GameOver), 1);
        let ev = c.take_events();
        assert!(ev.contains(&GameEvent::GameOver(GameOverCause::Ambushed)));
        assert!(ev.contains(&GameEvent::FadeOutMusic { duration_ms: 2000 }));
    }

    #[test]
    fn full_sequence_returns_to_inactive() {
        let mut c = ctx();
        c.adjust(Resource::Energy, -100);
        check_scores(&mut c);
        c.game_over.defer_removal(9);
        assert!(!confirm_restart(&mut c));
        assert_eq!(finalize(&mut c), vec![9]);
        assert_eq!(c.game_over.phase(), GameOverPhase::Final);
        assert!(confirm_restart(&mut c));
        let mut frames = 0;
        while !update(&mut c) {
            frames += 1;
            assert!(frames < 100);
        }
        assert_eq!(c.score.get(Resource::Energy), 100);
        finish(&mut c);
        assert!(!c.is_game_over());
        assert_eq!(c.game_over.phase(), GameOverPhase::Inactive);
        assert_eq!(c.timers.pending_for(TimerOwner::Score), 1);
    }
}
