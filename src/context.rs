//! The trigger supervisor: id allocation, the trigger registry, and the
//! cooperative polling loop.
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    thread,
    time::Duration,
};

use crate::trigger::Trigger;

/// Step used to chunk the inter-iteration sleep so a host interrupt wakes the
/// loop promptly instead of after the full `interval` has elapsed.
const INTERRUPT_POLL_STEP: Duration = Duration::from_millis(50);

/// A value that may be stashed in [`Context::scratch`].
///
/// `scratch` is free-form shared state for handlers (spec.md §3); a small
/// closed enum is used instead of `Box<dyn Any>` because every documented
/// use (counters, flags, short text) fits one of these variants and it keeps
/// the crate free of an `Any`-downcasting API surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Scratch {
    /// A boolean flag
    Bool(bool),
    /// A signed integer, e.g. a counter
    Int(i64),
    /// A floating point value
    Float(f64),
    /// Freeform text
    Text(String),
}

impl Scratch {
    /// Returns the value as `i64`, if it is an [`Scratch::Int`]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scratch::Int(v) => Some(*v),
            _ => None,
        }
    }
}

struct Shared {
    id_counter: Cell<u64>,
    removals: RefCell<Vec<u64>>,
    shutdown_requested: Cell<bool>,
    // `Arc`, not `Cell`: a background signal-handling thread (see
    // `Context::install_signal_handler`) sets this flag, so it must be
    // `Send`/`Sync` independently of the rest of `Shared`, which stays on
    // the single supervisor thread and is reached only through `Rc`.
    interrupted: Arc<AtomicBool>,
    scratch: RefCell<BTreeMap<String, Scratch>>,
}

/// A cheap, cloneable handle onto a [`Context`]'s shared state.
///
/// Triggers are given one at construction so they can request their own
/// removal or a supervisor-wide shutdown from inside `poll()`, without the
/// supervisor loop having to hand out a second mutable borrow of the
/// registry it is currently iterating. This is the "deferred removal"
/// mechanism described in spec.md §4.1 and §9: a `Handle::remove` call only
/// appends to a pending list; the actual `BTreeMap` deletion happens between
/// iterations, in [`Context::run`].
#[derive(Clone)]
pub struct Handle(Rc<Shared>);

impl Handle {
    fn new() -> Self {
        Self(Rc::new(Shared {
            id_counter: Cell::new(1),
            removals: RefCell::new(Vec::new()),
            shutdown_requested: Cell::new(false),
            interrupted: Arc::new(AtomicBool::new(false)),
            scratch: RefCell::new(BTreeMap::new()),
        }))
    }

    /// Allocates a fresh id, strictly greater than every id previously
    /// returned by this handle's `Context`.
    pub fn make_id(&self) -> u64 {
        let id = self.0.id_counter.get();
        self.0.id_counter.set(id + 1);
        id
    }

    /// Schedules `id` for removal from the registry at the end of the
    /// current polling iteration. Idempotent: requesting the same id twice
    /// in one iteration has no additional effect.
    pub fn remove(&self, id: u64, display: &str) {
        tracing::debug!(trigger = display, "removal requested");
        self.0.removals.borrow_mut().push(id);
    }

    /// Requests supervisor shutdown. `requester` is logged for traceability.
    pub fn request_shutdown(&self, requester: &str) {
        tracing::info!(requested_by = requester, "shutdown requested");
        self.0.shutdown_requested.set(true);
    }

    /// True once [`Handle::request_shutdown`] has been called, or a host
    /// interrupt was observed.
    pub fn shutdown_requested(&self) -> bool {
        self.0.shutdown_requested.get() || self.0.interrupted.load(Ordering::SeqCst)
    }

    /// True if a host interrupt (SIGINT/SIGTERM) was observed.
    pub fn interrupted(&self) -> bool {
        self.0.interrupted.load(Ordering::SeqCst)
    }

    fn take_removals(&self) -> Vec<u64> {
        std::mem::take(&mut self.0.removals.borrow_mut())
    }

    /// Reads a value out of the shared scratch map.
    pub fn scratch_get(&self, key: &str) -> Option<Scratch> {
        self.0.scratch.borrow().get(key).cloned()
    }

    /// Writes a value into the shared scratch map.
    pub fn scratch_set(&self, key: impl Into<String>, value: Scratch) {
        self.0.scratch.borrow_mut().insert(key.into(), value);
    }
}

/// The supervisor. Owns the trigger registry and runs the polling loop.
///
/// A `Context` is created once per invocation (spec.md §3) and handed to the
/// script-loading front end (here, [`crate::config`]) so it can register
/// triggers via a [`crate::factory::Factory`] before [`Context::run`] is
/// called.
pub struct Context {
    handle: Handle,
    triggers: BTreeMap<u64, Box<dyn Trigger>>,
    interval: Duration,
}

impl Context {
    /// Creates a new context with the default 1.0s poll interval.
    pub fn new() -> Self {
        Self::with_interval(Duration::from_secs(1))
    }

    /// Creates a new context with a custom poll interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            handle: Handle::new(),
            triggers: BTreeMap::new(),
            interval,
        }
    }

    /// Returns a cloneable handle to this context's shared state, to be
    /// passed to trigger constructors.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Allocates a fresh trigger id.
    pub fn make_id(&self) -> u64 {
        self.handle.make_id()
    }

    /// Registers an already-constructed trigger. Called by
    /// [`crate::factory::Factory`] immediately after construction.
    pub fn add(&mut self, trigger: Box<dyn Trigger>) -> u64 {
        let id = trigger.id();
        self.triggers.insert(id, trigger);
        id
    }

    /// Schedules a trigger for removal (deferred to the end of the current
    /// iteration, or immediately if called outside `run`).
    pub fn remove(&self, id: u64) {
        self.handle.remove(id, &id.to_string());
    }

    /// Requests shutdown of the polling loop.
    pub fn request_shutdown(&self, requester: &str) {
        self.handle.request_shutdown(requester);
    }

    /// Number of triggers currently registered.
    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Reads a scratch value.
    pub fn scratch_get(&self, key: &str) -> Option<Scratch> {
        self.handle.scratch_get(key)
    }

    /// Writes a scratch value.
    pub fn scratch_set(&self, key: impl Into<String>, value: Scratch) {
        self.handle.scratch_set(key, value);
    }

    /// Installs a SIGINT/SIGTERM handler that sets this context's
    /// interrupted flag, so [`Context::run`] exits its sleep promptly and
    /// performs a normal shutdown broadcast.
    ///
    /// Mirrors the teacher's signal-handling thread
    /// (`roboplc::controller::Controller::register_signals`), simplified: no
    /// live-reload support, no real-time scheduling, just "set a flag and
    /// let the loop notice".
    pub fn install_signal_handler(&self) -> crate::Result<()> {
        let flag = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(signal_hook::consts::SIGINT, flag.clone())?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, flag.clone())?;
        let interrupted = Arc::clone(&self.handle.0.interrupted);
        thread::Builder::new()
            .name("tack-signal".into())
            .spawn(move || loop {
                if flag.load(Ordering::SeqCst) {
                    interrupted.store(true, Ordering::SeqCst);
                    return;
                }
                thread::sleep(INTERRUPT_POLL_STEP);
            })?;
        Ok(())
    }

    /// Runs the polling loop until shutdown is requested or a host interrupt
    /// is observed, then broadcasts `shutdown` to every registered trigger.
    ///
    /// One iteration: poll every trigger present in the registry at the
    /// iteration's start (triggers added mid-iteration are picked up next
    /// time around); if shutdown becomes requested partway through, the
    /// remaining triggers in this iteration are skipped. Pending removals
    /// (self-requested during `poll`) are then applied. If shutdown was
    /// requested or an interrupt was observed, the loop exits without
    /// sleeping; otherwise it sleeps for `interval` before repeating.
    pub fn run(mut self) {
        loop {
            let snapshot: Vec<u64> = self.triggers.keys().copied().collect();
            for id in snapshot {
                if let Some(trigger) = self.triggers.get_mut(&id) {
                    trigger.poll();
                }
                if self.handle.shutdown_requested() {
                    break;
                }
            }
            for id in self.handle.take_removals() {
                self.triggers.remove(&id);
            }
            if self.handle.shutdown_requested() {
                break;
            }
            sleep_interruptible(self.interval, &self.handle);
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        for trigger in self.triggers.values_mut() {
            trigger.shutdown();
        }
        if self.handle.interrupted() {
            tracing::info!("shutdown complete (after interrupt)");
        } else {
            tracing::info!("normal shutdown");
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

fn sleep_interruptible(total: Duration, handle: &Handle) {
    let mut remaining = total;
    while remaining > Duration::ZERO {
        if handle.shutdown_requested() {
            return;
        }
        let step = remaining.min(INTERRUPT_POLL_STEP);
        thread::sleep(step);
        remaining -= step;
    }
}
