//! The trigger contract and the four concrete trigger kinds.
use crate::context::Handle;

/// Process trigger: spawns a child process and reports its exit code.
pub mod process;
/// File-tailing trigger: forwards appended lines matching an optional pattern.
pub mod reader;
/// Remote-task trigger: polls an external transfer service for a terminal status.
pub mod remote_task;
/// Timer trigger: fires its handler once an interval has elapsed.
pub mod timer;

/// The capability every trigger kind must provide to the supervisor loop.
///
/// Default `poll`/`shutdown` implementations on concrete triggers log at
/// info level and otherwise do nothing, matching the base `Trigger` class in
/// the original implementation (spec.md §4.3).
pub trait Trigger {
    /// The trigger's id, assigned at construction and never changed.
    fn id(&self) -> u64;
    /// The trigger's kind tag (`"timer"`, `"process"`, `"globus"`, `"reader"`).
    fn kind(&self) -> &'static str;
    /// The trigger's name, as given at construction.
    fn name(&self) -> &str;
    /// Called once per polling iteration while the trigger is registered.
    fn poll(&mut self);
    /// Called exactly once, during the shutdown broadcast.
    fn shutdown(&mut self);
}

/// Fields and helpers shared by every concrete trigger kind.
///
/// Mirrors the original `Trigger` base class (spec.md §4.3): a
/// `"<name> <id>"` stringification, info/debug logging prefixed with it, and
/// a `request_shutdown` shortcut onto the [`Handle`]. Self-removal
/// (`request_removal`) is the same shape but was left off the base class in
/// the original; it is folded in here since every concrete trigger needs it.
pub struct Base {
    id: u64,
    kind: &'static str,
    name: String,
    handle: Handle,
}

impl Base {
    /// Allocates a fresh id from `handle` and builds a new base.
    pub fn new(handle: Handle, kind: &'static str, name: String) -> Self {
        let id = handle.make_id();
        let base = Self {
            id,
            kind,
            name,
            handle,
        };
        base.info("registered");
        base
    }

    /// `"<name> <id>"`, as logged by the original implementation's `__str__`.
    pub fn display(&self) -> String {
        format!("{} <{}>", self.name, self.id)
    }

    /// Logs `message` at info level, prefixed with [`Base::display`].
    pub fn info(&self, message: &str) {
        tracing::info!(trigger = %self.display(), kind = self.kind, "{message}");
    }

    /// Logs `message` at debug level, prefixed with [`Base::display`].
    pub fn debug(&self, message: &str) {
        tracing::debug!(trigger = %self.display(), kind = self.kind, "{message}");
    }

    /// Asks the supervisor to shut down, citing this trigger as the requester.
    pub fn request_shutdown(&self) {
        self.handle.request_shutdown(&self.display());
    }

    /// Asks the supervisor to remove this trigger at the end of the current
    /// polling iteration.
    pub fn request_removal(&self) {
        self.handle.remove(self.id, &self.display());
    }

    /// The handle this trigger was constructed with, for triggers that need
    /// further access (scratch, further removals of other triggers, etc).
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn kind(&self) -> &'static str {
        self.kind
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }
}
