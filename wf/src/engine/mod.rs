//! Turn processing engine

mod turn;

pub use turn::{ProcessedTurn, TurnEngine};
