/// Delay queue: every deferred effect in the game is an entry here.
///
/// Entries are keyed off the simulation clock (the same millisecond clock
/// that drives animation), so tests advance time by passing timestamps
/// instead of sleeping. Each entry has an owner; clearing a level or
/// resetting the game cancels by owner, so no entry can outlive the entity
/// it refers to.

use crate::domain::entity::EntityId;

pub type TimerId = u64;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TimerOwner {
    Entity(EntityId),
    Score,
    Level,
    GameOver,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Task {
    FriendshipDecay,
    EnergyDecay,
    InteractionExpired(EntityId),
    RemoveEntity(EntityId),
    RandomSpawn,
    GameOverFinal,
}

#[derive(Clone, Debug)]
struct Entry {
    id: TimerId,
    due: u64,
    owner: TimerOwner,
    task: Task,
    /// Some(interval) for recurring entries.
    every: Option<u64>,
}

/// A task whose due time has passed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Fired {
    pub id: TimerId,
    pub owner: TimerOwner,
    pub task: Task,
}

#[derive(Debug, Default)]
pub struct DelayQueue {
    next_id: TimerId,
    entries: Vec<Entry>,
}

impl DelayQueue {
    pub fn new() -> Self {
        DelayQueue { next_id: 1, entries: Vec::new() }
    }

    pub fn schedule(&mut self, now: u64, delay_ms: u64, owner: TimerOwner, task: Task) -> TimerId {
        self.push(now + delay_ms, owner, task, None)
    }

    pub fn schedule_every(&mut self, now: u64, interval_ms: u64, owner: TimerOwner, task: Task) -> TimerId {
        let interval = interval_ms.max(1);
        self.push(now + interval, owner, task, Some(interval))
    }

    fn push(&mut self, due: u64, owner: TimerOwner, task: Task, every: Option<u64>) -> TimerId {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.entries.push(Entry { id, due, owner, task, every });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn cancel_owner(&mut self, owner: TimerOwner) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.owner != owner);
        before - self.entries.len()
    }

    /// Cancel every entry owned by any entity.
    pub fn cancel_entities(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !matches!(e.owner, TimerOwner::Entity(_)));
        before - self.entries.len()
    }

    pub fn pending_for(&self, owner: TimerOwner) -> usize {
        self.entries.iter().filter(|e| e.owner == owner).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pop everything due at `now`, ordered by due time then creation.
    /// Recurring entries keep their cadence; after a stall longer than one
    /// interval they re-arm one interval after `now`, so the stall produces
    /// one firing instead of a burst.
    pub fn drain_due(&mut self, now: u64) -> Vec<Fired> {
        let mut due: Vec<(u64, Fired)> = vec![];
        let mut kept = Vec::with_capacity(self.entries.len());

        for mut entry in self.entries.drain(..) {
            if entry.due > now {
                kept.push(entry);
                continue;
            }
            due.push((entry.due, Fired { id: entry.id, owner: entry.owner, task: entry.task }));
            if let Some(every) = entry.every {
                entry.due += every;
                if entry.due <= now {
                    entry.due = now + every;
                }
                kept.push(entry);
            }
        }

        self.entries = kept;
        due.sort_by_key(|(t, f)| (*t, f.id));
        due.into_iter().map(|(_, f)| f).collect()
    }
}
