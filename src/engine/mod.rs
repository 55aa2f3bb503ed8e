//! Core engine: the pieces of one anchoring round and the loop that repeats it.

pub mod fee;
pub mod scanner;
pub mod profit;
pub mod submitter;
pub mod round;
pub mod scheduler;

pub use round::{open_connections, AnchorRound, RoundOptions, RoundOutcome, Stage};
pub use scheduler::{RetryScheduler, SchedulerState};
