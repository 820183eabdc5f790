/// Score state: the three resource meters, their warnings and flashes,
/// and the game-over latch.
///
/// ## Invariants
///
///   - Every value stays in `0..=100`; mutations clamp.
///   - Mutating a value never triggers game over by itself. Exhaustion is
///     only acted on by `game_over::check_scores`, which the step skips
///     while a transition is in flight.
///   - The latch is first-writer-wins: once set, later causes are ignored
///     until a new game resets it.
///   - Each warning fires at most once per session.

use log::{debug, info};

use crate::config::ScoreConfig;
use crate::sim::event::{GameEvent, MessageKey, SoundId};
use crate::sim::game_over::GameOverCause;

pub const MAX_VALUE: i32 = 100;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Resource {
    Energy,
    Love,
    Friendship,
}

impl Resource {
    /// Also the order exhaustion is checked in.
    pub const ALL: [Resource; 3] = [Resource::Energy, Resource::Love, Resource::Friendship];

    fn index(self) -> usize {
        match self {
            Resource::Energy => 0,
            Resource::Love => 1,
            Resource::Friendship => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Resource::Energy => "energy",
            Resource::Love => "love",
            Resource::Friendship => "friendship",
        }
    }
}

/// Bar flash after hitting zero or recovering from it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Flash {
    pub active: bool,
    /// Completed hide/show cycles.
    pub cycle_count: u32,
    pub last_flash_time: u64,
    /// Bar currently drawn.
    pub lit: bool,
}

#[derive(Clone, Debug)]
struct Meter {
    value: i32,
    initial: i32,
    warning: i32,
    warning_shown: bool,
    flash: Flash,
    /// Order in which this meter reached zero (None while above zero).
    zeroed_seq: Option<u64>,
}

impl Meter {
    fn new(initial: i32, warning: i32) -> Self {
        let initial = initial.clamp(0, MAX_VALUE);
        Meter {
            value: initial,
            initial,
            warning,
            warning_shown: false,
            flash: Flash { lit: true, ..Flash::default() },
            zeroed_seq: None,
        }
    }

    fn start_flash(&mut self, now: u64) {
        self.flash = Flash { active: true, cycle_count: 0, last_flash_time: now, lit: false };
    }
}

#[derive(Clone, Debug)]
pub struct ScoreState {
    meters: [Meter; 3],
    energy_decay_armed: bool,
    latch: Option<GameOverCause>,
    seq: u64,
    cfg: ScoreConfig,
}

impl ScoreState {
    pub fn new(cfg: &ScoreConfig) -> Self {
        ScoreState {
            meters: [
                Meter::new(cfg.initial_energy, cfg.energy_warning),
                Meter::new(cfg.initial_love, cfg.love_warning),
                Meter::new(cfg.initial_friendship, cfg.friendship_warning),
            ],
            energy_decay_armed: false,
            latch: None,
            seq: 0,
            cfg: cfg.clone(),
        }
    }

    pub fn get(&self, r: Resource) -> i32 {
        self.meters[r.index()].value
    }

    pub fn flash(&self, r: Resource) -> &Flash {
        &self.meters[r.index()].flash
    }

    /// Is the bar drawn this frame (false during the dark half of a flash)?
    pub fn bar_visible(&self, r: Resource) -> bool {
        let f = &self.meters[r.index()].flash;
        !f.active || f.lit
    }

    pub fn energy_decay_armed(&self) -> bool {
        self.energy_decay_armed
    }

    /// Add `delta` (may be negative) to a meter. Returns true when this call
    /// armed energy decay, so the caller can schedule it.
    pub fn apply(&mut self, r: Resource, delta: i32, now: u64, events: &mut Vec<GameEvent>) -> bool {
        if delta == 0 {
            return false;
        }
        let m = &mut self.meters[r.index()];
        let old = m.value;
        let new = (old + delta).clamp(0, MAX_VALUE);
        m.value = new;

        if old > 0 && new == 0 {
            m.zeroed_seq = Some(self.seq);
            self.seq += 1;
            m.start_flash(now);
            info!("{} exhausted", r.name());
        } else if old == 0 && new > 0 {
            m.zeroed_seq = None;
            m.start_flash(now);
            debug!("{} recovered to {}", r.name(), new);
        }

        if !m.warning_shown && old > m.warning && new <= m.warning {
            m.warning_shown = true;
            events.push(GameEvent::PlaySound(SoundId::Warning));
            events.push(GameEvent::ShowMessage(MessageKey::Low(r)));
            info!("{} low ({})", r.name(), new);
        }

        if r == Resource::Friendship && !self.energy_decay_armed && new < self.cfg.energy_decay_arm_below {
            self.energy_decay_armed = true;
            info!("energy decay armed (friendship {})", new);
            return true;
        }
        false
    }

    /// Love costs energy at the configured ratio.
    pub fn grant_love(&mut self, amount: i32, now: u64, events: &mut Vec<GameEvent>) -> bool {
        let cost = (amount as f32 * self.cfg.love_energy_ratio).round() as i32;
        let a = self.apply(Resource::Love, amount, now, events);
        let b = self.apply(Resource::Energy, -cost, now, events);
        a || b
    }

    /// The resource that reached zero first among those currently at zero.
    pub fn first_exhausted(&self) -> Option<Resource> {
        Resource::ALL
            .iter()
            .filter_map(|&r| self.meters[r.index()].zeroed_seq.map(|s| (s, r)))
            .min_by_key(|(s, _)| *s)
            .map(|(_, r)| r)
    }

    pub fn is_latched(&self) -> bool {
        self.latch.is_some()
    }

    pub fn latched_cause(&self) -> Option<GameOverCause> {
        self.latch
    }

    /// Set the game-over latch. Returns false if it was already set.
    pub fn latch(&mut self, cause: GameOverCause) -> bool {
        if self.latch.is_some() {
            return false;
        }
        self.latch = Some(cause);
        true
    }

    pub fn update_flash(&mut self, now: u64) {
        let interval = self.cfg.flash_interval_ms;
        let cycles = self.cfg.flash_cycles;
        for m in self.meters.iter_mut() {
            let f = &mut m.flash;
            if !f.active || now.saturating_sub(f.last_flash_time) < interval {
                continue;
            }
            f.lit = !f.lit;
            f.last_flash_time = now;
            if f.lit {
                f.cycle_count += 1;
                if f.cycle_count >= cycles {
                    f.active = false;
                }
            }
        }
    }

    /// One frame of the reset animation: move each value `step` points
    /// toward its initial value. No warnings or flashes. Returns true once
    /// every meter is back.
    pub fn restore_step(&mut self, step: i32) -> bool {
        let step = step.max(1);
        let mut done = true;
        for m in self.meters.iter_mut() {
            if m.value < m.initial {
                m.value = (m.value + step).min(m.initial);
            } else if m.value > m.initial {
                m.value = (m.value - step).max(m.initial);
            }
            done &= m.value == m.initial;
        }
        done
    }

    /// New session: initial values, fresh warnings, latch cleared.
    pub fn reset(&mut self) {
        *self = ScoreState::new(&self.cfg);
    }
}
