pub mod behavior;
pub mod entity;
pub mod geometry;
pub mod snapshot;
