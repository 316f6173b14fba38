//! Spoken tour commands and their dispatch onto a [`TourOrchestrator`].

use crate::tour::TourOrchestrator;

use super::matcher::CommandMatcher;

/// What a visitor can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourCommand {
    End,
    Start,
    /// Jump to a named section; the name follows the keyword.
    Jump,
    Back,
    Next,
    Pause,
    Resume,
    /// Describe the current section.
    Describe,
}

impl TourCommand {
    pub fn label(&self) -> &'static str {
        match self {
            TourCommand::End => "end",
            TourCommand::Start => "start",
            TourCommand::Jump => "jump",
            TourCommand::Back => "back",
            TourCommand::Next => "next",
            TourCommand::Pause => "pause",
            TourCommand::Resume => "resume",
            TourCommand::Describe => "describe",
        }
    }
}

/// Outcome of [`dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Accepted,
    /// Not applicable right now (idle, debounced, unknown section …).
    Ignored,
    /// Needs collaborators the orchestrator does not have (page analysis,
    /// narration); the caller handles it.
    Delegated,
}

/// The built-in command table, most specific phrases first.
pub fn default_commands() -> CommandMatcher<TourCommand> {
    CommandMatcher::new()
        .with(
            &["stop the tour", "stop tour", "end the tour", "end tour", "exit tour", "quit tour"],
            TourCommand::End,
        )
        .with(
            &["start the tour", "start tour", "begin tour", "give me a tour", "show me around"],
            TourCommand::Start,
        )
        .with(&["take me to", "go to", "jump to", "skip to", "show me"], TourCommand::Jump)
        .with(&["go back", "previous", "back"], TourCommand::Back)
        .with(&["next", "continue", "forward"], TourCommand::Next)
        .with(&["pause", "hold on", "wait"], TourCommand::Pause)
        .with(&["resume", "keep going", "carry on"], TourCommand::Resume)
        .with(
            &["what is this", "what's this", "tell me more", "describe"],
            TourCommand::Describe,
        )
}

/// Section name spoken after a jump keyword, without filler words.
pub fn jump_target(remainder: &str) -> &str {
    let mut name = remainder.trim().trim_end_matches(['.', '!', '?']).trim();
    for prefix in ["the ", "my ", "your "] {
        name = name.strip_prefix(prefix).unwrap_or(name);
    }
    for suffix in [" section", " page", " part"] {
        name = name.strip_suffix(suffix).unwrap_or(name);
    }
    name.trim()
}

/// Apply `command` to `tours`.
pub async fn dispatch(tours: &TourOrchestrator, command: TourCommand, remainder: &str) -> Dispatch {
    let accepted = match command {
        TourCommand::Start | TourCommand::Describe => return Dispatch::Delegated,
        TourCommand::End => {
            let active = tours.is_active();
            tours.end_tour();
            active
        }
        TourCommand::Next => tours.next_step().await,
        TourCommand::Back => tours.previous_step().await,
        TourCommand::Jump => {
            let name = jump_target(remainder);
            !name.is_empty() && tours.skip_to_section(name).await
        }
        TourCommand::Pause => {
            tours.pause();
            tours.is_active()
        }
        TourCommand::Resume => {
            tours.resume(None);
            tours.is_active()
        }
    };
    log::debug!("command: {} -> {}", command.label(), if accepted { "accepted" } else { "ignored" });
    if accepted {
        Dispatch::Accepted
    } else {
        Dispatch::Ignored
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
