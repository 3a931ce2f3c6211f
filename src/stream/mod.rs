//! Reassembly of streamed model turns.

pub mod accumulator;

pub use accumulator::{PendingToolUse, TurnAccumulator, TurnOutput};
