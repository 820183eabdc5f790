/// Entry point and game loop.

mod config;
mod domain;
mod error;
mod logging;
mod sim;
mod ui;

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags};
use crossterm::{execute, terminal};
use log::{error, info, warn};

use config::GameConfig;
use sim::level::LevelTable;
use sim::step;
use sim::world::WorldState;
use ui::gamepad::GamepadState;
use ui::input::{InputState, Meta};
use ui::renderer::Renderer;
use ui::sound::{self, SoundEngine};

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Milliseconds of unpaused play since startup. The simulation never sees
/// wall-clock time directly, so a pause does not count toward any timer.
struct SimClock {
    origin: Instant,
    paused_total: Duration,
    paused_at: Option<Instant>,
}

impl SimClock {
    fn new() -> Self {
        SimClock { origin: Instant::now(), paused_total: Duration::ZERO, paused_at: None }
    }

    fn now_ms(&self) -> u64 {
        let end = self.paused_at.unwrap_or_else(Instant::now);
        end.duration_since(self.origin).saturating_sub(self.paused_total).as_millis() as u64
    }

    fn set_paused(&mut self, paused: bool) {
        match (paused, self.paused_at) {
            (true, None) => self.paused_at = Some(Instant::now()),
            (false, Some(at)) => {
                self.paused_total += at.elapsed();
                self.paused_at = None;
            }
            _ => {}
        }
    }
}

fn main() {
    let (config, problems) = GameConfig::load();
    logging::init(&config.log_level, &config.log_file);
    for p in &problems {
        warn!("{}", p);
    }
    config.log_summary();

    let (levels, level_problem) = LevelTable::load(config.levels_file.as_deref());
    if let Some(e) = level_problem {
        warn!("{}; using built-in levels", e);
    }
    info!("levels: {:?}", levels.ids().collect::<Vec<_>>());
    for p in levels.problems() {
        warn!("level table: {}", p);
    }

    let mut world = WorldState::new(config.tuning.clone(), levels, None);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let mut sound = SoundEngine::new();
    if sound.is_none() {
        info!("no audio output, playing silently");
    }

    let result = game_loop(&mut world, &mut renderer, sound.as_mut(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        error!("game loop failed: {}", e);
        eprintln!("Game error: {e}");
    }

    info!("session ended at level {}", world.orchestrator.current_level());
    println!();
    println!("Thanks for playing Heartbound!");
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    mut sound: Option<&mut SoundEngine>,
    config: &GameConfig,
) -> io::Result<()> {
    let mut kb = InputState::new();
    kb.honor_release = enable_key_release();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    if gp.connected {
        info!("gamepad detected");
    }

    let mut clock = SimClock::new();
    let tick_rate = Duration::from_millis(config.tuning.timing.tick_rate_ms.max(1));
    let mut last_tick = Instant::now();

    let events = world.start(clock.now_ms());
    if let Some(engine) = sound.as_deref_mut() {
        sound::dispatch(engine, &events);
    }

    loop {
        kb.drain_events();
        gp.update();

        match kb.meta().or_else(|| gp.meta()) {
            Some(Meta::Quit) => break,
            Some(Meta::Pause) => {
                let now = clock.now_ms();
                world.toggle_pause(now);
                clock.set_paused(world.paused);
            }
            None => {}
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
            let mut input = kb.snapshot();
            gp.merge_into(&mut input);

            let events = step::step(world, &input, clock.now_ms());
            if let Some(engine) = sound.as_deref_mut() {
                sound::dispatch(engine, &events);
            }
        }

        if let Some(engine) = sound.as_deref_mut() {
            engine.update();
        }
        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    if kb.honor_release {
        let _ = execute!(io::stdout(), PopKeyboardEnhancementFlags);
    }
    Ok(())
}

/// Ask the terminal for key release events; fall back to hold timeouts.
fn enable_key_release() -> bool {
    if !terminal::supports_keyboard_enhancement().unwrap_or(false) {
        return false;
    }
    execute!(
        io::stdout(),
        PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
    )
    .is_ok()
}
