//! Process trigger: spawns a child process on a background worker and
//! reports its exit code exactly once (spec.md §4.5).
use std::process::Command;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::context::Handle;
use crate::error::Result;
use crate::factory::{require_str, Options};
use crate::handler::{Event, HandlerAction};
use crate::trigger::{Base, Trigger};

/// Sent down to the worker to request early termination of the child.
struct Terminate;

/// A handler invoked with the firing trigger's [`Base`] and the child's
/// exit code.
pub type ProcessHandler = Box<dyn FnMut(&Base, i32)>;

const WAIT_STEP: Duration = Duration::from_secs(1);

/// Spawns `command` (tokenised on whitespace) and reports its exit code to
/// `handler` exactly once. `shutdown` terminates the child if it is still
/// running and blocks until the worker has confirmed this.
pub struct ProcessTrigger {
    base: Base,
    command: String,
    handler: ProcessHandler,
    down_tx: Sender<Terminate>,
    up_rx: Receiver<i32>,
    worker: Option<JoinHandle<()>>,
    reported: bool,
}

impl ProcessTrigger {
    /// Creates a new process trigger, spawning its background worker.
    pub fn new(handle: Handle, name: impl Into<String>, command: impl Into<String>, handler: ProcessHandler) -> Self {
        let command = command.into();
        let base = Base::new(handle, "process", name.into());
        base.info(&format!("new process trigger ({command})"));
        let (down_tx, down_rx) = bounded::<Terminate>(1);
        let (up_tx, up_rx) = bounded::<i32>(1);
        let worker_command = command.clone();
        let worker = thread::Builder::new()
            .name("tack-process".into())
            .spawn(move || run_worker(&worker_command, &down_rx, &up_tx))
            .ok();
        Self {
            base,
            command,
            handler,
            down_tx,
            up_rx,
            worker,
            reported: false,
        }
    }

    pub(crate) fn from_options(handle: Handle, options: &Options, action: HandlerAction) -> Result<Self> {
        let name = crate::factory::opt_str(options, "name", "<unnamed>");
        let command = require_str(options, &name, "command")?;
        let handler: ProcessHandler = Box::new(move |base, exit_code| {
            action.invoke(base, &Event::Process { exit_code });
        });
        Ok(Self::new(handle, name, command, handler))
    }
}

fn run_worker(command: &str, down_rx: &Receiver<Terminate>, up_tx: &Sender<i32>) {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    let Some((program, args)) = tokens.split_first() else {
        let _ = up_tx.send(-1);
        return;
    };
    let mut child = match Command::new(program).args(args).spawn() {
        Ok(child) => child,
        Err(_) => {
            let _ = up_tx.send(-1);
            return;
        }
    };
    let exit_code = loop {
        match down_rx.recv_timeout(WAIT_STEP) {
            Ok(Terminate) => {
                // best-effort: the process may have already exited
                let _ = child.kill();
                let status = child.wait();
                break status.ok().and_then(|s| s.code()).unwrap_or(-1);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if let Ok(Some(status)) = child.try_wait() {
                    break status.code().unwrap_or(-1);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                // no one will ever send TERMINATE; keep waiting for natural exit
                if let Ok(status) = child.wait() {
                    break status.code().unwrap_or(-1);
                }
                break -1;
            }
        }
    };
    let _ = up_tx.send(exit_code);
}

impl Trigger for ProcessTrigger {
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
        match self.up_rx.try_recv() {
            Ok(exit_code) => {
                self.base.debug(&format!("exit code: {exit_code}"));
                self.reported = true;
                (self.handler)(&self.base, exit_code);
                self.base.request_removal();
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {}
        }
    }

    fn shutdown(&mut self) {
        if !self.reported {
            let _ = self.down_tx.send(Terminate);
            if let Ok(exit_code) = self.up_rx.recv() {
                self.base.debug(&format!("terminated, exit code: {exit_code}"));
                self.reported = true;
            }
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.base.info(&format!("shutdown complete ({})", self.command));
    }
}

impl Drop for ProcessTrigger {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.down_tx.send(Terminate);
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn reports_exit_code_once_and_self_removes() {
        let ctx = Context::new();
        let reported: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        let reported_clone = reported.clone();
        let handler: ProcessHandler = Box::new(move |_base, code| reported_clone.borrow_mut().push(code));
        let mut trigger = ProcessTrigger::new(ctx.handle(), "p", "true", handler);
        for _ in 0..200 {
            trigger.poll();
            if !reported.borrow().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(*reported.borrow(), vec![0]);
        // a Process trigger's handler fires at most once
        trigger.poll();
        assert_eq!(*reported.borrow(), vec![0]);
    }

    #[test]
    fn slow_process_is_terminated_on_shutdown() {
        let ctx = Context::new();
        let handler: ProcessHandler = Box::new(|_base, _code| {});
        let mut trigger = ProcessTrigger::new(ctx.handle(), "p", "sleep 30", handler);
        let start = std::time::Instant::now();
        trigger.shutdown();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
