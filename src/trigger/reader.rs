//! Reader trigger: tails an append-only text file, forwarding lines that
//! match an optional pattern until a configured EOF line is seen
//! (spec.md §4.7).
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};
use regex::Regex;

use crate::context::Handle;
use crate::error::{Error, Result};
use crate::factory::{opt_str, require_str, Options};
use crate::handler::{Event, HandlerAction};
use crate::trigger::{Base, Trigger};

const DELAY_MIN: Duration = Duration::from_millis(100);
const DELAY_MAX: Duration = Duration::from_secs(1);

/// A handler invoked with the firing trigger's [`Base`] and a forwarded
/// line (including its line terminator).
pub type ReaderHandler = Box<dyn FnMut(&Base, &str)>;

enum Message {
    Line(String),
    /// the distinguished EOF sentinel, carrying the line that triggered it
    Eof(String),
}

/// Tails `filename`, forwarding lines matching `pattern` (or every line, if
/// `pattern` is unset) until a line exactly equal to `eof` is read.
pub struct ReaderTrigger {
    base: Base,
    handler: ReaderHandler,
    rx: Receiver<Message>,
    worker: Option<JoinHandle<()>>,
}

impl ReaderTrigger {
    /// Opens `filename` and spawns the tailing worker. File-not-found and
    /// permission errors, and an invalid `pattern`, are returned here
    /// (fatal at construction time, per spec.md §7).
    pub fn new(
        handle: Handle,
        name: impl Into<String>,
        filename: impl AsRef<Path>,
        eof: impl Into<String>,
        pattern: Option<&str>,
        handler: ReaderHandler,
    ) -> Result<Self> {
        let base = Base::new(handle, "reader", name.into());
        let file = File::open(filename.as_ref())?;
        let pattern = pattern.map(Regex::new).transpose()?;
        let eof = eof.into();
        base.info(&format!("new reader ({})", filename.as_ref().display()));
        let (tx, rx) = bounded(64);
        let worker = thread::Builder::new()
            .name("tack-reader".into())
            .spawn(move || run_worker(file, &eof, pattern.as_ref(), &tx))
            .ok();
        Ok(Self {
            base,
            handler,
            rx,
            worker,
        })
    }

    pub(crate) fn from_options(handle: Handle, options: &Options, action: HandlerAction) -> Result<Self> {
        let name = opt_str(options, "name", "<unnamed>");
        let filename = require_str(options, &name, "filename")?;
        let eof = require_str(options, &name, "eof")?;
        let pattern = options.get("pattern").and_then(|v| v.as_str()).map(str::to_owned);
        let handler: ReaderHandler = Box::new(move |base, line| {
            action.invoke(base, &Event::Line { text: line });
        });
        Self::new(handle, name, filename, eof, pattern.as_deref(), handler)
    }
}

fn grow_delay(delay: Duration) -> Duration {
    if delay < DELAY_MAX {
        (delay + Duration::from_millis(100)).min(DELAY_MAX)
    } else {
        (delay + Duration::from_secs(1)).min(DELAY_MAX)
    }
}

fn run_worker(file: File, eof: &str, pattern: Option<&Regex>, tx: &Sender<Message>) {
    let mut reader = BufReader::new(file);
    let mut delay = DELAY_MIN;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                thread::sleep(delay);
                delay = grow_delay(delay);
            }
            Ok(_) => {
                // Open Question in spec.md §9: EOF must be checked before
                // the pattern filter, or an `eof` line that does not match
                // `pattern` would never terminate the reader.
                if line == eof {
                    let _ = tx.send(Message::Eof(line));
                    return;
                }
                if pattern.map_or(true, |re| re.is_match(&line)) {
                    if tx.send(Message::Line(line)).is_err() {
                        return;
                    }
                    delay = DELAY_MIN;
                }
            }
            Err(_) => return,
        }
    }
}

impl Trigger for ReaderTrigger {
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
        match self.rx.try_recv() {
            Ok(Message::Line(line)) => {
                (self.handler)(&self.base, &line);
            }
            Ok(Message::Eof(line)) => {
                self.base.info(&format!("EOF reached at line: {}", line.trim_end()));
                self.base.request_removal();
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.base.info("default shutdown()");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn forwards_only_matching_lines_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alpha").unwrap();
        writeln!(file, "beta").unwrap();
        writeln!(file, "gamma").unwrap();
        writeln!(file, "END").unwrap();
        file.flush().unwrap();

        let ctx = Context::new();
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let handler: ReaderHandler = Box::new(move |_base, line| seen_clone.borrow_mut().push(line.to_owned()));
        let mut trigger = ReaderTrigger::new(
            ctx.handle(),
            "r",
            file.path(),
            "END\n",
            Some("^b"),
            handler,
        )
        .unwrap();

        let mut removed = false;
        for _ in 0..300 {
            trigger.poll();
            if ctx.handle().shutdown_requested() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
            // a Reader self-removes via `Base::request_removal`, which we
            // cannot observe directly without a Context driving it; detect
            // completion from the forwarded content instead.
            if seen.borrow().len() == 1 {
                removed = true;
                break;
            }
        }
        assert!(removed);
        assert_eq!(*seen.borrow(), vec!["beta\n".to_string()]);
    }

    #[test]
    fn missing_file_is_fatal_at_construction() {
        let ctx = Context::new();
        let handler: ReaderHandler = Box::new(|_base, _line| {});
        let err = ReaderTrigger::new(
            ctx.handle(),
            "r",
            "/no/such/file/surely",
            "END\n",
            None,
            handler,
        );
        assert!(matches!(err, Err(Error::Io(_))));
    }
}
