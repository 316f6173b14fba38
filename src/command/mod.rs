//! Spoken command recognition.
//!
//! * [`CommandMatcher`] — generic ordered keyword table.
//! * [`default_commands`] — the tour command table.
//! * [`dispatch`] — applies a [`TourCommand`] to a tour orchestrator.

pub mod commands;
pub mod matcher;

pub use commands::{default_commands, dispatch, jump_target, Dispatch, TourCommand};
pub use matcher::{CommandMatch, CommandMatcher};
