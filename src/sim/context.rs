/// GameContext: the shared services every system reads and writes during a
/// tick. Passed explicitly; there is no global instance.

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::Tuning;
use crate::domain::geometry::Bounds;
use crate::sim::event::{GameEvent, MessageKey, SoundId};
use crate::sim::game_over::GameOverController;
use crate::sim::score::{Resource, ScoreState};
use crate::sim::timers::{DelayQueue, Task, TimerOwner};

pub struct GameContext {
    /// Simulation time of the current tick, in milliseconds.
    pub now: u64,
    pub tuning: Tuning,
    pub bounds: Bounds,
    pub score: ScoreState,
    pub timers: DelayQueue,
    pub game_over: GameOverController,
    pub rng: StdRng,
    events: Vec<GameEvent>,
}

impl GameContext {
    /// `seed` pins the RNG for reproducible runs and tests.
    pub fn new(tuning: Tuning, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        GameContext {
            now: 0,
            bounds: Bounds::new(tuning.world.width, tuning.world.height),
            score: ScoreState::new(&tuning.score),
            timers: DelayQueue::new(),
            game_over: GameOverController::new(),
            rng,
            events: Vec::new(),
            tuning,
        }
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn play_sound(&mut self, id: SoundId) {
        self.events.push(GameEvent::PlaySound(id));
    }

    pub fn show_message(&mut self, key: MessageKey) {
        self.events.push(GameEvent::ShowMessage(key));
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_game_over(&self) -> bool {
        self.score.is_latched()
    }

    pub fn adjust(&mut self, r: Resource, delta: i32) {
        if self.score.apply(r, delta, self.now, &mut self.events) {
            self.arm_energy_decay();
        }
    }

    pub fn grant_love(&mut self, amount: i32) {
        if self.score.grant_love(amount, self.now, &mut self.events) {
            self.arm_energy_decay();
        }
    }

    /// (Re)start the recurring decay timers for a fresh session.
    pub fn start_decay(&mut self) {
        self.timers.cancel_owner(TimerOwner::Score);
        let interval = self.tuning.score.decay_interval_ms;
        self.timers.schedule_every(self.now, interval, TimerOwner::Score, Task::FriendshipDecay);
        if self.score.energy_decay_armed() {
            self.timers.schedule_every(self.now, interval, TimerOwner::Score, Task::EnergyDecay);
        }
    }

    fn arm_energy_decay(&mut self) {
        let interval = self.tuning.score.decay_interval_ms;
        self.timers.schedule_every(self.now, interval, TimerOwner::Score, Task::EnergyDecay);
        info!("energy decay scheduled every {}ms", interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arming_schedules_energy_decay() {
        let mut ctx = GameContext::new(Tuning::default(), Some(1));
        ctx.start_decay();
        assert_eq!(ctx.timers.pending_for(TimerOwner::Score), 1);
        ctx.adjust(Resource::Friendship, -60);
        assert_eq!(ctx.timers.pending_for(TimerOwner::Score), 2);
        // Restart keeps both while armed
        ctx.start_decay();
        assert_eq!(ctx.timers.pending_for(TimerOwner::Score), 2);
    }

    #[test]
    fn events_are_drained() {
        let mut ctx = GameContext::new(Tuning::default(), Some(1));
        ctx.play_sound(SoundId::Reward);
        assert_eq!(ctx.take_events(), vec![GameEvent::PlaySound(SoundId::Reward)]);
        assert!(ctx.take_events().is_empty());
    }
}
