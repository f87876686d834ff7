//! Timer trigger: fires once more than `interval` seconds have elapsed since
//! the last fire (spec.md §4.4).
use std::time::SystemTime;

use crate::context::Handle;
use crate::error::Result;
use crate::factory::{opt_f64, Options};
use crate::handler::{Event, HandlerAction};
use crate::trigger::{Base, Trigger};

/// A handler invoked with the firing trigger's [`Base`] and the wall-clock
/// time of the fire.
pub type TimerHandler = Box<dyn FnMut(&Base, SystemTime)>;

/// Fires `handler` once strictly more than `interval_seconds` have elapsed
/// since the previous fire (or since construction, for the first fire).
pub struct TimerTrigger {
    base: Base,
    interval_seconds: f64,
    last_poll: SystemTime,
    handler: TimerHandler,
}

impl TimerTrigger {
    /// Creates a new timer trigger and logs its construction.
    pub fn new(handle: Handle, name: impl Into<String>, interval_seconds: f64, handler: TimerHandler) -> Self {
        let base = Base::new(handle, "timer", name.into());
        base.info(&format!("new timer ({interval_seconds:.3}s)"));
        Self {
            base,
            interval_seconds,
            last_poll: SystemTime::now(),
            handler,
        }
    }

    pub(crate) fn from_options(handle: Handle, options: &Options, action: HandlerAction) -> Result<Self> {
        let name = crate::factory::opt_str(options, "name", "<unnamed>");
        let interval = opt_f64(options, "interval", 0.0);
        let handler: TimerHandler = Box::new(move |base, _at| action.invoke(base, &Event::Timer));
        Ok(Self::new(handle, name, interval, handler))
    }
}

impl Trigger for TimerTrigger {
    fn id(&self) -> u64 {
        self.base.id()
    }

    fn kind(&self) -> &'static str {
        self.base.kind()
    }

    fn name(&self) -> &str {
        self.base.name()
    }

    fn poll(&mut self) {
        self.base.debug("poll()");
        let now = SystemTime::now();
        let elapsed = now
            .duration_since(self.last_poll)
            .unwrap_or_default()
            .as_secs_f64();
        if elapsed > self.interval_seconds {
            self.base.debug("calling handler");
            (self.handler)(&self.base, now);
            self.last_poll = now;
        }
    }

    fn shutdown(&mut self) {
        self.base.info("default shutdown()");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn zero_interval_fires_every_poll() {
        let ctx = Context::new();
        let fires = Rc::new(RefCell::new(0));
        let fires_clone = fires.clone();
        let handler: TimerHandler = Box::new(move |_base, _at| {
            *fires_clone.borrow_mut() += 1;
        });
        let mut timer = TimerTrigger::new(ctx.handle(), "t", 0.0, handler);
        // the strict `>` comparison means the very first poll only fires
        // once a non-zero amount of wall-clock time has passed since
        // construction.
        std::thread::sleep(std::time::Duration::from_millis(5));
        timer.poll();
        timer.poll();
        timer.poll();
        assert_eq!(*fires.borrow(), 3);
    }

    #[test]
    fn positive_interval_does_not_refire_immediately() {
        let ctx = Context::new();
        let fires = Rc::new(RefCell::new(0));
        let fires_clone = fires.clone();
        let handler: TimerHandler = Box::new(move |_base, _at| {
            *fires_clone.borrow_mut() += 1;
        });
        let mut timer = TimerTrigger::new(ctx.handle(), "t", 1.0, handler);
        timer.poll();
        timer.poll();
        assert_eq!(*fires.borrow(), 0, "interval has not elapsed yet");
    }
}
