//! Event queue consumption

pub mod replayer;

pub use replayer::{EventQueueReplayer, ReplayOutcome, ReplayStats};
