//! RemoteTask trigger: polls an external service for a terminal status
//! (spec.md §4.6).
//!
//! The concrete transfer-service client is explicitly out of scope
//! (spec.md §1's Non-goals); this module specifies the polling contract as
//! the [`RemoteTaskClient`] trait and ships one minimal, concrete
//! implementation (`HttpRemoteTaskClient`) behind it.
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::context::Handle;
use crate::error::{Error, Result};
use crate::factory::{opt_str, require_str, Options};
use crate::handler::{Event, HandlerAction};
use crate::trigger::{Base, Trigger};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The polling contract a remote-task transport must satisfy.
///
/// `poll_status` is called repeatedly until it returns a terminal status
/// (`"SUCCEEDED"` or `"FAILED"`); any other string is treated as "still
/// running" and polled again after [`POLL_INTERVAL`]. A transport error is
/// treated as transient and retried, matching spec.md §7's "do not sandbox,
/// but do not give up on a single failed poll" stance.
pub trait RemoteTaskClient: Send {
    /// Polls the remote service once for `task_id`'s current status, using
    /// `token` for authentication.
    fn poll_status(&self, task_id: &str, token: &str) -> Result<String>;
}

/// A minimal `RemoteTaskClient` backed by a blocking HTTP GET against
/// `{base_url}/tasks/{task_id}`, expecting a JSON body `{"status": "..."}`.
pub struct HttpRemoteTaskClient {
    base_url: String,
}

impl HttpRemoteTaskClient {
    /// Creates a client against `base_url` (no trailing slash expected).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl RemoteTaskClient for HttpRemoteTaskClient {
    fn poll_status(&self, task_id: &str, token: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct StatusResponse {
            status: String,
        }

        let url = format!("{}/tasks/{}", self.base_url, task_id);
        let response = ureq::get(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .call()
            .map_err(|error| Error::RemoteTransport(error.to_string()))?;
        let body: StatusResponse = response
            .into_json()
            .map_err(|error| Error::RemoteTransport(error.to_string()))?;
        Ok(body.status)
    }
}

/// A handler invoked with the firing trigger's [`Base`] and the terminal
/// status reached (`"SUCCEEDED"` or `"FAILED"`).
pub type RemoteTaskHandler = Box<dyn FnMut(&Base, &'static str)>;

/// Polls `client` for `task_id`'s status on a background worker until a
/// terminal status is reached, then reports it to `handler` exactly once.
pub struct RemoteTaskTrigger {
    base: Base,
    /// the `user` option (spec.md §6: required for `globus`, but not used
    /// by the transport itself — `RemoteTaskClient::poll_status` only takes
    /// a token)
    user: String,
    handler: RemoteTaskHandler,
    rx: Receiver<&'static str>,
    worker: Option<JoinHandle<()>>,
    reported: bool,
}

impl RemoteTaskTrigger {
    /// Creates a new remote-task trigger, spawning its polling worker.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        handle: Handle,
        name: impl Into<String>,
        task_id: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
        client: Box<dyn RemoteTaskClient + Send>,
        handler: RemoteTaskHandler,
    ) -> Self {
        let task_id = task_id.into();
        let user = user.into();
        let token = token.into();
        let base = Base::new(handle, "globus", name.into());
        base.info(&format!("new remote task ({task_id})"));
        let (tx, rx) = bounded(1);
        let worker = thread::Builder::new()
            .name("tack-remote-task".into())
            .spawn(move || run_worker(client.as_ref(), &task_id, &token, &tx))
            .ok();
        Self {
            base,
            user,
            handler,
            rx,
            worker,
            reported: false,
        }
    }

    /// The `user` this trigger was configured with (spec.md §6).
    pub fn user(&self) -> &str {
        &self.user
    }

    pub(crate) fn from_options(handle: Handle, options: &Options, action: HandlerAction) -> Result<Self> {
        let name = opt_str(options, "name", "<unnamed>");
        let task_id = require_str(options, &name, "task")?;
        let user = require_str(options, &name, "user")?;
        let raw_token = require_str(options, &name, "token")?;
        let token = if raw_token == "ENV" {
            std::env::var("TOKEN").map_err(|_| Error::TokenEnvUnset)?
        } else {
            raw_token
        };
        let base_url = opt_str(options, "base_url", "http://localhost");
        let client: Box<dyn RemoteTaskClient + Send> = Box::new(HttpRemoteTaskClient::new(base_url));
        let handler: RemoteTaskHandler = Box::new(move |base, status| {
            action.invoke(base, &Event::RemoteTask { status });
        });
        Ok(Self::new(handle, name, task_id, user, token, client, handler))
    }
}

fn run_worker(client: &dyn RemoteTaskClient, task_id: &str, token: &str, tx: &Sender<&'static str>) {
    loop {
        match client.poll_status(task_id, token) {
            Ok(status) => match status.as_str() {
                "SUCCEEDED" => {
                    let _ = tx.send("SUCCEEDED");
                    return;
                }
                "FAILED" => {
                    let _ = tx.send("FAILED");
                    return;
                }
                _ => {}
            },
            Err(error) => {
                tracing::debug!(%error, "remote task poll failed, retrying");
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl Trigger for RemoteTaskTrigger {
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
            Ok(status) => {
                self.reported = true;
                (self.handler)(&self.base, status);
                self.base.request_removal();
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
    }

    fn shutdown(&mut self) {
        // The worker polls an external service on its own schedule; unlike
        // Process, shutdown does not need to terminate it early (spec.md
        // §9's remote-task design notes).
        if self.reported {
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
        }
        self.base.info("default shutdown()");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    struct MockRemoteTaskClient {
        calls: Arc<AtomicUsize>,
        succeed_after: usize,
    }

    impl RemoteTaskClient for MockRemoteTaskClient {
        fn poll_status(&self, _task_id: &str, _token: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n + 1 >= self.succeed_after {
                Ok("SUCCEEDED".to_string())
            } else {
                Ok("RUNNING".to_string())
            }
        }
    }

    #[test]
    fn reports_terminal_status_once() {
        let ctx = Context::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let client: Box<dyn RemoteTaskClient + Send> = Box::new(MockRemoteTaskClient {
            calls: calls.clone(),
            succeed_after: 1,
        });
        let seen: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let handler: RemoteTaskHandler = Box::new(move |_base, status| seen_clone.borrow_mut().push(status));
        let mut trigger = RemoteTaskTrigger::new(ctx.handle(), "rt", "task-1", "alice", "tok", client, handler);
        assert_eq!(trigger.user(), "alice");

        for _ in 0..200 {
            trigger.poll();
            if !seen.borrow().is_empty() {
                break;
            }
            thread::sleep(StdDuration::from_millis(10));
        }
        assert_eq!(*seen.borrow(), vec!["SUCCEEDED"]);
        trigger.poll();
        assert_eq!(seen.borrow().len(), 1, "handler fires at most once");
    }

    #[test]
    fn token_env_unset_is_an_error() {
        std::env::remove_var("TOKEN");
        let mut options = Options::new();
        options.insert("task".into(), toml::Value::String("t1".into()));
        options.insert("user".into(), toml::Value::String("alice".into()));
        options.insert("token".into(), toml::Value::String("ENV".into()));
        let action = HandlerAction::Log { message: None };
        let ctx = Context::new();
        let err = RemoteTaskTrigger::from_options(ctx.handle(), &options, action);
        assert!(matches!(err, Err(Error::TokenEnvUnset)));
    }

    #[test]
    fn missing_user_is_an_error() {
        let mut options = Options::new();
        options.insert("task".into(), toml::Value::String("t1".into()));
        options.insert("token".into(), toml::Value::String("tok".into()));
        let action = HandlerAction::Log { message: None };
        let ctx = Context::new();
        let err = RemoteTaskTrigger::from_options(ctx.handle(), &options, action);
        assert!(matches!(err, Err(Error::MissingOption { ref key, .. }) if key == "user"));
    }
}
