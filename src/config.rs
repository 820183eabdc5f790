/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
/// Every gameplay constant lives here so call sites never hard-code one.

use log::{info, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{GameError, GameResult};
use crate::sim::level::LevelId;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tuning: Tuning,
    pub gamepad: GamepadConfig,
    pub levels_file: Option<PathBuf>,
    pub log_file: PathBuf,
    pub log_level: String,
}

/// Everything the simulation core reads at runtime.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub timing: TimingConfig,
    pub world: WorldConfig,
    pub score: ScoreConfig,
    pub behavior: BehaviorConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Real-time cadence of the redraw loop.
    pub tick_rate_ms: u64,
    /// Nominal frame period that one "delta tick" stands for.
    pub frame_ms: f32,
    /// Upper clamp on delta ticks (no catch-up jumps after stalls).
    pub max_delta_ticks: f32,
    pub animation_interval_ms: u64,
    pub animation_frames: u32,
    /// Minimum visible duration of a level transition.
    pub transition_ms: u64,
    pub disappear_delay_ms: u64,
    pub message_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
    pub corner_buffer: f32,
    pub player_speed: f32,
    pub player_size: f32,
    pub npc_size: f32,
    pub start_level: LevelId,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub initial_energy: i32,
    pub initial_love: i32,
    pub initial_friendship: i32,
    pub energy_warning: i32,
    pub love_warning: i32,
    pub friendship_warning: i32,
    pub decay_interval_ms: u64,
    pub friendship_decay: i32,
    pub energy_decay: i32,
    /// Energy decay is armed once friendship first drops below this.
    pub energy_decay_arm_below: i32,
    /// Energy spent per point of love granted.
    pub love_energy_ratio: f32,
    pub flash_cycles: u32,
    pub flash_interval_ms: u64,
    pub final_delay_ms: u64,
    pub music_fade_ms: u64,
    /// Bar points restored per tick during the score-reset animation.
    pub reset_step: i32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub wander_speed: f32,
    pub change_direction_interval_ms: u64,
    pub stuck_threshold_ms: u64,
    pub flee_trigger_radius: f32,
    pub flee_speed_multiplier: f32,
    pub fleer_radius_per_encounter: f32,
    pub fleer_radius_cap: f32,
    pub zigzag_interval_ms: u64,
    /// Radians; bounded to 45° at use.
    pub zigzag_angle: f32,
    /// Radians; bounded to 45° at use.
    pub flee_perturbation: f32,
    pub chase_speed: f32,
    pub contact_sustain_ms: u64,
    pub effect_cooldown_ms: u64,
    pub interaction_window_ms: u64,
    pub fleer_friendship_reward: i32,
    pub chaser_energy_penalty: i32,
    pub toll_love_reward: i32,
    pub toll_friendship_reward: i32,
    pub ambush_decline_friendship: i32,
    pub spawn_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub reward_a: Vec<String>,
    pub reward_b: Vec<String>,
    pub confirm: Vec<String>,
    pub pause: Vec<String>,
    pub quit: Vec<String>,
}

// ── Defaults ──

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            tick_rate_ms: 33,
            frame_ms: 1000.0 / 60.0,
            max_delta_ticks: 3.0,
            animation_interval_ms: 150,
            animation_frames: 4,
            transition_ms: 600,
            disappear_delay_ms: 400,
            message_ms: 2500,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            width: 800.0,
            height: 600.0,
            corner_buffer: 40.0,
            player_speed: 4.0,
            player_size: 32.0,
            npc_size: 32.0,
            start_level: 1,
        }
    }
}

impl Default for ScoreConfig {
    fn default() -> Self {
        ScoreConfig {
            initial_energy: 100,
            initial_love: 50,
            initial_friendship: 100,
            energy_warning: 20,
            love_warning: 15,
            friendship_warning: 20,
            decay_interval_ms: 1000,
            friendship_decay: 1,
            energy_decay: 1,
            energy_decay_arm_below: 50,
            love_energy_ratio: 1.0,
            flash_cycles: 3,
            flash_interval_ms: 250,
            final_delay_ms: 3000,
            music_fade_ms: 2000,
            reset_step: 2,
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        BehaviorConfig {
            wander_speed: 1.5,
            change_direction_interval_ms: 2000,
            stuck_threshold_ms: 500,
            flee_trigger_radius: 150.0,
            flee_speed_multiplier: 1.8,
            fleer_radius_per_encounter: 10.0,
            fleer_radius_cap: 250.0,
            zigzag_interval_ms: 300,
            zigzag_angle: 0.35,
            flee_perturbation: 0.2,
            chase_speed: 1.2,
            contact_sustain_ms: 150,
            effect_cooldown_ms: 2000,
            interaction_window_ms: 4000,
            fleer_friendship_reward: 10,
            chaser_energy_penalty: 10,
            toll_love_reward: 15,
            toll_friendship_reward: 10,
            ambush_decline_friendship: 5,
            spawn_interval_ms: 8000,
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TimingConfig,
    #[serde(default)]
    world: WorldConfig,
    #[serde(default)]
    score: ScoreConfig,
    #[serde(default)]
    behavior: BehaviorConfig,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_reward_a")]
    reward_a: Vec<String>,
    #[serde(default = "default_reward_b")]
    reward_b: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_pause")]
    pause: Vec<String>,
    #[serde(default = "default_quit")]
    quit: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default)]
    levels_file: Option<String>,
    #[serde(default = "default_log_file")]
    log_file: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

fn default_reward_a() -> Vec<String> { vec!["A".into(), "L1".into()] }
fn default_reward_b() -> Vec<String> { vec!["B".into(), "R1".into()] }
fn default_confirm() -> Vec<String> { vec!["Start".into(), "X".into()] }
fn default_pause() -> Vec<String> { vec!["Y".into()] }
fn default_quit() -> Vec<String> { vec!["Select".into()] }
fn default_log_file() -> String { "heartbound.log".into() }
fn default_log_level() -> String { "info".into() }

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            reward_a: default_reward_a(),
            reward_b: default_reward_b(),
            confirm: default_confirm(),
            pause: default_pause(),
            quit: default_quit(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_file: None,
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    ///
    /// Runs before the logger exists, so problems are returned alongside the
    /// config and logged by the caller once logging is up.
    pub fn load() -> (Self, Vec<GameError>) {
        let search_dirs = candidate_dirs();
        let mut problems = vec![];

        let toml_cfg = match find_config(&search_dirs) {
            Some(path) => match parse_file(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    problems.push(e);
                    TomlConfig::default()
                }
            },
            None => TomlConfig::default(),
        };

        let levels_file = toml_cfg.general.levels_file.as_ref().map(|name| {
            let p = PathBuf::from(name);
            if p.is_absolute() {
                p
            } else {
                search_dirs.iter()
                    .map(|d| d.join(name))
                    .find(|c| c.is_file())
                    .unwrap_or(p)
            }
        });

        let config = GameConfig {
            tuning: Tuning {
                timing: toml_cfg.timing,
                world: toml_cfg.world,
                score: toml_cfg.score,
                behavior: toml_cfg.behavior,
            },
            gamepad: GamepadConfig {
                reward_a: toml_cfg.gamepad.reward_a,
                reward_b: toml_cfg.gamepad.reward_b,
                confirm: toml_cfg.gamepad.confirm,
                pause: toml_cfg.gamepad.pause,
                quit: toml_cfg.gamepad.quit,
            },
            levels_file,
            log_file: PathBuf::from(toml_cfg.general.log_file),
            log_level: toml_cfg.general.log_level,
        };
        (config, problems)
    }

    /// Log the resolved settings that are worth knowing when reading a log.
    pub fn log_summary(&self) {
        info!(
            "world {}x{}, tick {}ms, love/energy ratio {}",
            self.tuning.world.width,
            self.tuning.world.height,
            self.tuning.timing.tick_rate_ms,
            self.tuning.score.love_energy_ratio,
        );
        if let Some(path) = &self.levels_file {
            if !path.is_file() {
                warn!("levels file {} not found, using built-in levels", path.display());
            }
        }
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/heartbound)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/heartbound");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/heartbound)
    let sys = PathBuf::from("/usr/share/heartbound");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

fn find_config(search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs.iter()
        .map(|d| d.join("config.toml"))
        .find(|p| p.exists())
}

fn parse_file(path: &Path) -> GameResult<TomlConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| GameError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text).map_err(|source| GameError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_str(text: &str) -> Result<TomlConfig, toml::de::Error> {
    toml::from_str::<TomlConfig>(text)
}
