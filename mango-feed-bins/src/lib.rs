//! Shared setup for the feed binaries

pub mod common;
