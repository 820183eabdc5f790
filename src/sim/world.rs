/// WorldState: the complete state of a running game.
///
/// ## Ownership
///
///   - `ctx`         : shared services (score, timers, rng, events)
///   - `orchestrator`: level id, roster, transition state, cross-level memory
///   - `player`      : the player actor
///
/// ## Stop flag
///
/// `is_game_stopped()` is true while a transition is in flight or the
/// game-over latch is set. Every gameplay mutation (behaviors, decay,
/// interaction windows, spawns, zone checks) tests it first.

use log::{error, info};

use crate::config::Tuning;
use crate::domain::entity::Player;
use crate::domain::geometry::{Size, Vec2};
use crate::sim::clock::Clock;
use crate::sim::context::GameContext;
use crate::sim::event::{GameEvent, MessageKey};
use crate::sim::level::LevelTable;
use crate::sim::orchestrator::LevelOrchestrator;

/// Banner text shown for a while after it is raised.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Message {
    pub key: MessageKey,
    pub until: u64,
}

pub struct WorldState {
    pub ctx: GameContext,
    pub orchestrator: LevelOrchestrator,
    pub player: Player,
    pub clock: Clock,
    pub paused: bool,
    pub message: Option<Message>,
    pub new_game_affordance: bool,
    pub tick: u64,
}

impl WorldState {
    pub fn new(tuning: Tuning, levels: LevelTable, seed: Option<u64>) -> Self {
        let start = tuning.world.start_level;
        let size = Size::new(tuning.world.player_size, tuning.world.player_size);
        let frames = tuning.timing.animation_frames;
        let clock = Clock::new(tuning.timing.frame_ms, tuning.timing.max_delta_ticks);
        let ctx = GameContext::new(tuning, seed);
        let player = Player::new(ctx.bounds.center() - Vec2::new(size.w / 2.0, size.h / 2.0), size, frames, 0);
        WorldState {
            ctx,
            orchestrator: LevelOrchestrator::new(levels, start),
            player,
            clock,
            paused: false,
            message: None,
            new_game_affordance: false,
            tick: 0,
        }
    }

    /// Enter the start level and arm the session timers.
    pub fn start(&mut self, now: u64) -> Vec<GameEvent> {
        self.clock.tick(now);
        self.ctx.now = now;
        self.ctx.start_decay();
        self.ctx.emit(GameEvent::StartMusic);
        let start = self.ctx.tuning.world.start_level;
        if let Err(e) = self.orchestrator.load_level(start, &mut self.player, &mut self.ctx) {
            error!("could not enter start level {}: {}", start, e);
        }
        info!("session started at level {}", self.orchestrator.current_level());
        let events = self.ctx.take_events();
        self.absorb(&events);
        events
    }

    pub fn is_game_stopped(&self) -> bool {
        self.orchestrator.is_transitioning() || self.ctx.is_game_over()
    }

    pub fn set_message(&mut self, key: MessageKey) {
        let until = self.ctx.now + self.ctx.tuning.timing.message_ms;
        self.message = Some(Message { key, until });
    }

    /// Track the message banner and new-game affordance from step events.
    pub fn absorb(&mut self, events: &[GameEvent]) {
        for ev in events {
            match ev {
                GameEvent::ShowMessage(key) => self.set_message(*key),
                GameEvent::ShowNewGameAffordance => self.new_game_affordance = true,
                GameEvent::NewGame => self.new_game_affordance = false,
                _ => {}
            }
        }
    }

    /// User pause. Simulation time does not advance while paused; the
    /// caller stops feeding wall-clock time.
    pub fn toggle_pause(&mut self, now: u64) {
        if self.paused {
            self.paused = false;
            self.clock.resync();
            if !self.orchestrator.is_transitioning() {
                self.orchestrator.resume_all(now);
            }
            self.message = None;
            info!("resumed");
        } else {
            self.paused = true;
            self.orchestrator.pause_all();
            self.message = Some(Message { key: MessageKey::Paused, until: u64::MAX });
            info!("paused");
        }
    }
}
