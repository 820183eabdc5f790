pub mod clock;
pub mod context;
pub mod event;
pub mod game_over;
pub mod level;
pub mod orchestrator;
pub mod score;
pub mod step;
pub mod timers;
pub mod world;
