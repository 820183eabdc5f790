/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound, music and messages.

use crate::domain::entity::{Archetype, EntityId};
use crate::sim::game_over::GameOverCause;
use crate::sim::level::LevelId;
use crate::sim::score::Resource;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SoundId {
    Warning,
    Reward,
    Penalty,
    TollBell,
    AmbushSting,
    AmbushLaugh,
    Disappear,
    Spawn,
    Transition,
    GameOver,
}

/// Keys into the message table; the renderer owns the wording.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MessageKey {
    LevelName(LevelId),
    Low(Resource),
    Exhausted(Resource),
    Offer(Archetype),
    Ambushed,
    GameOver,
    NewGame,
    Paused,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    PlaySound(SoundId),
    /// Cut every in-flight sound effect.
    StopEffects,
    StartMusic,
    FadeOutMusic { duration_ms: u64 },
    ShowMessage(MessageKey),
    ShowNewGameAffordance,
    TransitionStarted { from: LevelId, to: LevelId },
    LevelEntered(LevelId),
    EntitySpawned { id: EntityId, archetype: Archetype },
    EntityRemoved { id: EntityId },
    GameOver(GameOverCause),
    NewGame,
}
