//! CSV adapters used by the command-line replay.

pub mod contestant_reader;
pub mod event_reader;
pub mod standings_writer;
