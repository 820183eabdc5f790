/// Logger initialisation.
///
/// The terminal runs in raw mode on the alternate screen, so log records are
/// piped into a file instead of stderr. `RUST_LOG` still overrides the level.

use std::fs::OpenOptions;
use std::path::Path;

use env_logger::{Builder, Env, Target};

pub fn init(level: &str, path: &Path) {
    let env = Env::default().default_filter_or(level);
    let mut builder = Builder::from_env(env);

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            // No writable log file: drop records rather than corrupt the screen.
            builder.filter_level(log::LevelFilter::Off);
        }
    }

    // `try_init` only fails if a logger is already installed (tests).
    let _ = builder.try_init();
}
