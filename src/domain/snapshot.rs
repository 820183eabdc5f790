/// Cross-level memory: per-archetype state that survives a level change.
///
/// Each archetype declares a schema of fields and, per field, whether the
/// value carries over or resets. The orchestrator captures a snapshot when
/// an entity leaves the roster and applies it to the next entity of the
/// same archetype it spawns.

use super::entity::{Archetype, Direction, Entity};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PreservedField {
    Encounters,
    HasInteracted,
    Direction,
    SoundPlayed,
    Cooldown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldRule {
    CarryOver,
    ResetToDefault,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FieldValue {
    Count(u32),
    Flag(bool),
    Facing(Direction),
    Stamp(Option<u64>),
}

pub fn schema(archetype: Archetype) -> &'static [(PreservedField, FieldRule)] {
    use FieldRule::*;
    use PreservedField::*;
    match archetype {
        Archetype::Wanderer => &[(Direction, CarryOver)],
        Archetype::Fleer => &[(Encounters, CarryOver), (Direction, CarryOver), (Cooldown, ResetToDefault)],
        Archetype::Chaser => &[(Encounters, CarryOver), (Cooldown, ResetToDefault)],
        Archetype::TollCollector => &[(Encounters, CarryOver), (SoundPlayed, ResetToDefault)],
        Archetype::Ambush => &[(Encounters, CarryOver), (HasInteracted, ResetToDefault)],
    }
}

fn read(e: &Entity, field: PreservedField) -> FieldValue {
    match field {
        PreservedField::Encounters => FieldValue::Count(e.behavior.encounters),
        PreservedField::HasInteracted => FieldValue::Flag(e.behavior.has_interacted),
        PreservedField::Direction => FieldValue::Facing(e.direction),
        PreservedField::SoundPlayed => FieldValue::Flag(e.behavior.sound_played),
        PreservedField::Cooldown => FieldValue::Stamp(e.behavior.last_effect_at),
    }
}

fn default_value(field: PreservedField) -> FieldValue {
    match field {
        PreservedField::Encounters => FieldValue::Count(0),
        PreservedField::HasInteracted | PreservedField::SoundPlayed => FieldValue::Flag(false),
        PreservedField::Direction => FieldValue::Facing(Direction::Down),
        PreservedField::Cooldown => FieldValue::Stamp(None),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub archetype: Archetype,
    pub fields: Vec<(PreservedField, FieldValue)>,
}

impl Snapshot {
    pub fn capture(e: &Entity) -> Snapshot {
        let fields = schema(e.archetype)
            .iter()
            .map(|&(field, rule)| {
                let value = match rule {
                    FieldRule::CarryOver => read(e, field),
                    FieldRule::ResetToDefault => default_value(field),
                };
                (field, value)
            })
            .collect();
        Snapshot { archetype: e.archetype, fields }
    }

    /// Write the preserved fields into a freshly spawned entity.
    /// Snapshots of another archetype are ignored.
    pub fn apply(&self, e: &mut Entity) {
        if e.archetype != self.archetype {
            return;
        }
        for &(field, value) in &self.fields {
            match (field, value) {
                (PreservedField::Encounters, FieldValue::Count(n)) => e.behavior.encounters = n,
                (PreservedField::HasInteracted, FieldValue::Flag(f)) => e.behavior.has_interacted = f,
                (PreservedField::Direction, FieldValue::Facing(d)) => e.direction = d,
                (PreservedField::SoundPlayed, FieldValue::Flag(f)) => e.behavior.sound_played = f,
                (PreservedField::Cooldown, FieldValue::Stamp(s)) => e.behavior.last_effect_at = s,
                _ => {}
            }
        }
    }
}
