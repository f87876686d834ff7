//! The trigger factory: dispatches `kind` to a constructor and registers the
//! result, per spec.md §4.2.
use toml::Value;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::handler::HandlerAction;
use crate::trigger::{process::ProcessTrigger, reader::ReaderTrigger};
use crate::trigger::{remote_task::RemoteTaskTrigger, timer::TimerTrigger};
use crate::trigger::Trigger;

/// A trigger's option dictionary, as read from one `[[trigger]]` table of a
/// declarative script. Free-form, like the original's `**kwargs`
/// (spec.md §4.3's `key` helper).
pub type Options = toml::value::Table;

/// Reads a required string option, or a configuration error naming
/// `desc` (the trigger's `"<name> <id>"` or, before an id exists, its raw
/// `name` field) and `key`.
pub fn require_str(opts: &Options, desc: &str, key: &str) -> Result<String> {
    opts.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::missing_option(desc, key))
}

/// Reads an optional string option, falling back to `default`.
pub fn opt_str(opts: &Options, key: &str, default: &str) -> String {
    opts.get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| default.to_owned())
}

/// Reads an optional floating-point option, falling back to `default`.
pub fn opt_f64(opts: &Options, key: &str, default: f64) -> f64 {
    opts.get(key).and_then(Value::as_float).unwrap_or(default)
}

/// Reads a required table option (used for the `handler` sub-table).
pub fn require_table<'a>(opts: &'a Options, desc: &str, key: &str) -> Result<&'a Options> {
    opts.get(key)
        .and_then(Value::as_table)
        .ok_or_else(|| Error::missing_option(desc, key))
}

/// Constructs triggers by `kind` and registers them with a [`Context`].
///
/// The recognised set of kinds is closed, per spec.md §4.2:
/// `timer`, `process`, `globus`, `reader`.
pub struct Factory<'ctx> {
    context: &'ctx mut Context,
}

impl<'ctx> Factory<'ctx> {
    /// Creates a factory bound to `context` for the duration of script
    /// evaluation.
    pub fn new(context: &'ctx mut Context) -> Self {
        Self { context }
    }

    /// Constructs a trigger from `options["kind"]` and registers it,
    /// returning the trigger's assigned id.
    ///
    /// `options["handler"]` (a sub-table naming a [`HandlerAction`]) is
    /// required for every kind, per spec.md §6's option table.
    pub fn new_trigger(&mut self, options: &Options) -> Result<u64> {
        let kind = options
            .get("kind")
            .and_then(Value::as_str)
            .ok_or(Error::MissingKind)?
            .to_owned();
        // Checked before the handler table is parsed: an unknown kind is a
        // more specific failure than a missing `handler`, and spec.md §8's
        // unknown-kind scenario must be rejected even when `handler` is
        // absent entirely.
        if !matches!(kind.as_str(), "timer" | "process" | "globus" | "reader") {
            return Err(Error::UnknownKind(kind));
        }

        let name = opt_str(options, "name", "<unnamed>");
        let handler_table = require_table(options, &name, "handler")?;
        let action = HandlerAction::from_table(handler_table)?;

        let handle = self.context.handle();
        let trigger: Box<dyn Trigger> = match kind.as_str() {
            "timer" => Box::new(TimerTrigger::from_options(handle, options, action)?),
            "process" => Box::new(ProcessTrigger::from_options(handle, options, action)?),
            "globus" => Box::new(RemoteTaskTrigger::from_options(handle, options, action)?),
            "reader" => Box::new(ReaderTrigger::from_options(handle, options, action)?),
            _ => unreachable!("kind validated above"),
        };
        Ok(self.context.add(trigger))
    }
}

impl HandlerAction {
    /// Parses a `handler` sub-table into a [`HandlerAction`].
    ///
    /// Recognised shapes: `{action = "log", message = "..."}`,
    /// `{action = "shutdown"}`, `{action = "set_scratch", key = "...",
    /// value = ...}`, `{action = "run_command", command = "..."}`, and
    /// `{action = "chain", actions = [ {...}, {...} ]}`.
    pub fn from_table(table: &Options) -> Result<Self> {
        let action = table
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_option("handler", "action"))?;
        match action {
            "log" => Ok(HandlerAction::Log {
                message: table.get("message").and_then(Value::as_str).map(str::to_owned),
            }),
            "shutdown" => Ok(HandlerAction::Shutdown),
            "set_scratch" => {
                let key = require_str(table, "handler", "key")?;
                let raw = table
                    .get("value")
                    .ok_or_else(|| Error::missing_option("handler", "value"))?;
                Ok(HandlerAction::SetScratch {
                    key,
                    value: scratch_from_toml(raw)?,
                })
            }
            "run_command" => Ok(HandlerAction::RunCommand {
                command: require_str(table, "handler", "command")?,
            }),
            "chain" => {
                let list = table
                    .get("actions")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::missing_option("handler", "actions"))?;
                let mut actions = Vec::with_capacity(list.len());
                for item in list {
                    let item_table = item
                        .as_table()
                        .ok_or_else(|| Error::failed("chain entries must be tables"))?;
                    actions.push(HandlerAction::from_table(item_table)?);
                }
                Ok(HandlerAction::Chain(actions))
            }
            other => Err(Error::failed(format!("unknown handler action: {other}"))),
        }
    }
}

fn scratch_from_toml(value: &Value) -> Result<crate::context::Scratch> {
    use crate::context::Scratch;
    match value {
        Value::Boolean(b) => Ok(Scratch::Bool(*b)),
        Value::Integer(i) => Ok(Scratch::Int(*i)),
        Value::Float(f) => Ok(Scratch::Float(*f)),
        Value::String(s) => Ok(Scratch::Text(s.clone())),
        other => Err(Error::failed(format!(
            "unsupported scratch value: {other:?}"
        ))),
    }
}
