//! Built-in handler actions for declarative (config-file) scripts.
//!
//! spec.md §9 leaves the choice of handler representation to the
//! implementer: "Handlers can be expressed as named entry points in that
//! runtime, or as built-in actions selected by name." Rust embedders use
//! real closures (see each trigger module's `new`); the declarative TOML
//! front end (`crate::config`) instead names one of these actions.
use std::process::Command;

use crate::context::Scratch;
use crate::trigger::Base;

/// What happened, passed to a [`HandlerAction`] so it can log something
/// useful or stash a value in scratch.
pub enum Event<'a> {
    /// A [`crate::trigger::timer::TimerTrigger`] fired.
    Timer,
    /// A [`crate::trigger::process::ProcessTrigger`]'s child exited.
    Process {
        /// the child's exit code
        exit_code: i32,
    },
    /// A [`crate::trigger::remote_task::RemoteTaskTrigger`] reached a terminal status.
    RemoteTask {
        /// `"SUCCEEDED"` or `"FAILED"`
        status: &'static str,
    },
    /// A [`crate::trigger::reader::ReaderTrigger`] forwarded a matching line.
    Line {
        /// the forwarded line, including its line terminator
        text: &'a str,
    },
}

/// A built-in handler action, named from a declarative script.
#[derive(Debug, Clone)]
pub enum HandlerAction {
    /// Logs a fixed message, or a description of the event if none is given.
    Log {
        /// the message to log; `None` logs a description of the event
        message: Option<String>,
    },
    /// Requests supervisor shutdown.
    Shutdown,
    /// Writes a fixed value into [`crate::context::Context::scratch_get`].
    SetScratch {
        /// the scratch key to write
        key: String,
        /// the value to write
        value: Scratch,
    },
    /// Spawns `command` (tokenised on whitespace) and does not wait for it.
    RunCommand {
        /// the command line to spawn
        command: String,
    },
    /// Runs every action in order.
    Chain(Vec<HandlerAction>),
}

impl HandlerAction {
    /// Executes this action. Called from a trigger's handler closure, with
    /// `base` identifying the firing trigger.
    pub fn invoke(&self, base: &Base, event: &Event<'_>) {
        match self {
            HandlerAction::Log { message } => {
                let text = message.clone().unwrap_or_else(|| describe(event));
                base.info(&text);
            }
            HandlerAction::Shutdown => base.request_shutdown(),
            HandlerAction::SetScratch { key, value } => {
                base.handle().scratch_set(key.clone(), value.clone());
            }
            HandlerAction::RunCommand { command } => {
                let tokens: Vec<&str> = command.split_whitespace().collect();
                if let Some((program, args)) = tokens.split_first() {
                    match Command::new(program).args(args).spawn() {
                        Ok(child) => base.debug(&format!("spawned pid {}", child.id())),
                        Err(error) => {
                            tracing::warn!(trigger = %base.display(), %error, command, "run_command failed to spawn");
                        }
                    }
                }
            }
            HandlerAction::Chain(actions) => {
                for action in actions {
                    action.invoke(base, event);
                }
            }
        }
    }
}

fn describe(event: &Event<'_>) -> String {
    match event {
        Event::Timer => "timer fired".to_string(),
        Event::Process { exit_code } => format!("process exited with code {exit_code}"),
        Event::RemoteTask { status } => format!("remote task reached status {status}"),
        Event::Line { text } => format!("line: {}", text.trim_end()),
    }
}
