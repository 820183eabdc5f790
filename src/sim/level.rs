/// Level table: backgrounds, transition zones, spawn policies, anchors.
///
/// ## Sources (priority order):
///   1. `levels_file` from config (TOML)
///   2. Built-in table
///
/// ## File format:
///   ```toml
///   [[level]]
///   id = 1
///   name = "Meadow"
///   background = "meadow"
///   anchor = [80.0, 284.0]
///   spawn = { kind = "fixed", placements = [{ archetype = "fleer", x = 560.0, y = 380.0 }] }
///
///   [[level.zone]]
///   rect = [780.0, 250.0, 20.0, 100.0]
///   target = 2
///   ```
///
/// Spawn kinds: `fixed` (placements), `random_single` (pool, optional
/// interval_ms), `none`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::domain::entity::Archetype;
use crate::domain::geometry::{Rect, Vec2};
use crate::error::{GameError, GameResult};

pub type LevelId = u32;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Placement {
    pub archetype: Archetype,
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnPolicy {
    Fixed {
        placements: Vec<Placement>,
    },
    /// At most one policy-spawned entity alive; respawn on an interval.
    RandomSingle {
        pool: Vec<Archetype>,
        #[serde(default)]
        interval_ms: Option<u64>,
    },
    None,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TransitionZone {
    /// x, y, w, h
    pub rect: [f32; 4],
    pub target: LevelId,
}

impl TransitionZone {
    pub fn rect(&self) -> Rect {
        let [x, y, w, h] = self.rect;
        Rect::new(x, y, w, h)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LevelDef {
    pub id: LevelId,
    pub name: String,
    #[serde(default)]
    pub background: String,
    #[serde(default, rename = "zone")]
    pub zones: Vec<TransitionZone>,
    pub spawn: SpawnPolicy,
    /// Player placement on entry.
    pub anchor: [f32; 2],
}

impl LevelDef {
    pub fn anchor(&self) -> Vec2 {
        Vec2::new(self.anchor[0], self.anchor[1])
    }

    /// First zone the player box overlaps.
    pub fn zone_hit(&self, player: &Rect) -> Option<LevelId> {
        self.zones.iter().find(|z| z.rect().overlaps(player)).map(|z| z.target)
    }
}

#[derive(Deserialize)]
struct LevelFile {
    #[serde(default)]
    level: Vec<LevelDef>,
}

#[derive(Clone, Debug)]
pub struct LevelTable {
    levels: BTreeMap<LevelId, LevelDef>,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

impl LevelTable {
    pub fn from_defs(defs: Vec<LevelDef>) -> Self {
        LevelTable { levels: defs.into_iter().map(|d| (d.id, d)).collect() }
    }

    /// Levels from `path`, or the built-in table. A broken file is reported
    /// and the built-in table used instead.
    pub fn load(path: Option<&Path>) -> (Self, Option<GameError>) {
        let Some(path) = path else {
            return (builtin_levels(), None);
        };
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(source) => {
                return (builtin_levels(), Some(GameError::ConfigRead { path: path.to_path_buf(), source }));
            }
        };
        match Self::parse(&text) {
            Ok(table) if !table.levels.is_empty() => (table, None),
            Ok(_) => (builtin_levels(), None),
            Err(source) => (builtin_levels(), Some(GameError::ConfigParse { path: path.to_path_buf(), source })),
        }
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let file: LevelFile = toml::from_str(text)?;
        Ok(Self::from_defs(file.level))
    }

    pub fn get(&self, id: LevelId) -> GameResult<&LevelDef> {
        self.levels.get(&id).ok_or(GameError::UnknownLevel(id))
    }

    pub fn contains(&self, id: LevelId) -> bool {
        self.levels.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = LevelId> + '_ {
        self.levels.keys().copied()
    }

    /// Configuration mistakes that only surface when a level is entered.
    pub fn problems(&self) -> Vec<GameError> {
        let mut out = vec![];
        for def in self.levels.values() {
            for zone in &def.zones {
                if !self.contains(zone.target) {
                    out.push(GameError::UnknownLevel(zone.target));
                }
            }
            if let SpawnPolicy::RandomSingle { pool, .. } = &def.spawn {
                if pool.is_empty() {
                    out.push(GameError::EmptySpawnPool(def.id));
                }
            }
        }
        out
    }
}

// ══════════════════════════════════════════════════════════════
// Built-in levels
// ══════════════════════════════════════════════════════════════

fn zone(x: f32, y: f32, w: f32, h: f32, target: LevelId) -> TransitionZone {
    TransitionZone { rect: [x, y, w, h], target }
}

fn place(archetype: Archetype, x: f32, y: f32) -> Placement {
    Placement { archetype, x, y }
}

/// Four screens for an 800×600 world.
pub fn builtin_levels() -> LevelTable {
    use Archetype::*;
    LevelTable::from_defs(vec![
        LevelDef {
            id: 1,
            name: "Meadow".into(),
            background: "meadow".into(),
            zones: vec![zone(780.0, 250.0, 20.0, 100.0, 2)],
            spawn: SpawnPolicy::Fixed {
                placements: vec![place(Wanderer, 200.0, 150.0), place(Fleer, 560.0, 380.0)],
            },
            anchor: [80.0, 284.0],
        },
        LevelDef {
            id: 2,
            name: "Orchard".into(),
            background: "orchard".into(),
            zones: vec![zone(0.0, 250.0, 20.0, 100.0, 1), zone(350.0, 580.0, 100.0, 20.0, 3)],
            spawn: SpawnPolicy::Fixed {
                placements: vec![
                    place(Fleer, 300.0, 200.0),
                    place(Chaser, 640.0, 120.0),
                    place(TollCollector, 480.0, 440.0),
                ],
            },
            anchor: [60.0, 284.0],
        },
        LevelDef {
            id: 3,
            name: "Hollow".into(),
            background: "hollow".into(),
            zones: vec![zone(350.0, 0.0, 100.0, 20.0, 2), zone(780.0, 250.0, 20.0, 100.0, 4)],
            spawn: SpawnPolicy::RandomSingle { pool: vec![Chaser, TollCollector, Ambush], interval_ms: None },
            anchor: [384.0, 60.0],
        },
        LevelDef {
            id: 4,
            name: "Clearing".into(),
            background: "clearing".into(),
            zones: vec![zone(0.0, 250.0, 20.0, 100.0, 3)],
            spawn: SpawnPolicy::None,
            anchor: [60.0, 284.0],
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_is_consistent() {
        let t = builtin_levels();
        assert_eq!(t.ids().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(t.problems().is_empty());
    }

    #[test]
    fn anchors_clear_of_zones() {
        let t = builtin_levels();
        for id in t.ids().collect::<Vec<_>>() {
            let def = t.get(id).unwrap();
            let a = def.anchor();
            let player = Rect::new(a.x, a.y, 32.0, 32.0);
            assert_eq!(def.zone_hit(&player), None, "level {id}");
        }
    }

    #[test]
    fn unknown_level_is_an_error() {
        let t = builtin_levels();
        assert!(matches!(t.get(99), Err(GameError::UnknownLevel(99))));
    }

    #[test]
    fn parse_file_format() {
        let text = r#"
            [[level]]
            id = 7
            name = "Test"
            anchor = [10.0, 10.0]
            spawn = { kind = "random_single", pool = ["fleer", "ambush"] }

            [[level.zone]]
            rect = [0.0, 0.0, 10.0, 10.0]
            target = 8

            [[level]]
            id = 8
            name = "Empty"
            anchor = [0.0, 0.0]
            spawn = { kind = "none" }
        "#;
        let t = LevelTable::parse(text).unwrap();
        let seven = t.get(7).unwrap();
        assert_eq!(
            seven.spawn,
            SpawnPolicy::RandomSingle { pool: vec![Archetype::Fleer, Archetype::Ambush], interval_ms: None }
        );
        assert_eq!(seven.zones[0].target, 8);
        assert_eq!(t.get(8).unwrap().spawn, SpawnPolicy::None);
    }

    #[test]
    fn problems_report_dangling_zone_and_empty_pool() {
        let text = r#"
            [[level]]
            id = 1
            name = "Broken"
            anchor = [0.0, 0.0]
            spawn = { kind = "random_single", pool = [] }
            [[level.zone]]
            rect = [0.0, 0.0, 10.0, 10.0]
            target = 5
        "#;
        let t = LevelTable::parse(text).unwrap();
        let p = t.problems();
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let (t, err) = LevelTable::load(Some(Path::new("/nonexistent/levels.toml")));
        assert!(matches!(err, Some(GameError::ConfigRead { .. })));
        assert!(t.contains(1));
    }

    #[test]
    fn zone_hit_uses_overlap() {
        let t = builtin_levels();
        let def = t.get(1).unwrap();
        assert_eq!(def.zone_hit(&Rect::new(770.0, 280.0, 32.0, 32.0)), Some(2));
        assert_eq!(def.zone_hit(&Rect::new(400.0, 280.0, 32.0, 32.0)), None);
    }
}
