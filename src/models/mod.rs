//! Core data models for player records and battle logs.

mod battle;
mod player;
mod tag;

pub use battle::*;
pub use player::*;
pub use tag::*;
