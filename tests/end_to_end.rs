//! End-to-end scenarios against the public API (spec.md §8).
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tack::context::Context;
use tack::trigger::process::{ProcessHandler, ProcessTrigger};
use tack::trigger::reader::{ReaderHandler, ReaderTrigger};
use tack::trigger::timer::{TimerHandler, TimerTrigger};

#[test]
fn timer_fires_requested_number_of_times_then_shuts_down() {
    let mut context = Context::with_interval(Duration::from_millis(10));
    let handle = context.handle();
    let fires = Rc::new(RefCell::new(0));
    let fires_clone = fires.clone();
    let handle_clone = handle.clone();
    let handler: TimerHandler = Box::new(move |_base, _at| {
        *fires_clone.borrow_mut() += 1;
        if *fires_clone.borrow() >= 5 {
            handle_clone.request_shutdown("test");
        }
    });
    let timer = TimerTrigger::new(handle, "t", 0.0, handler);
    context.add(Box::new(timer));

    context.run();
    assert_eq!(*fires.borrow(), 5);
}

#[test]
fn process_completion_reports_exit_code_then_removes_itself() {
    let mut context = Context::with_interval(Duration::from_millis(10));
    let handle = context.handle();
    let seen: Rc<RefCell<Option<i32>>> = Rc::new(RefCell::new(None));
    let seen_clone = seen.clone();
    let handle_clone = handle.clone();
    let handler: ProcessHandler = Box::new(move |_base, code| {
        *seen_clone.borrow_mut() = Some(code);
        handle_clone.request_shutdown("test");
    });
    let process = ProcessTrigger::new(handle, "p", "true", handler);
    context.add(Box::new(process));

    let start = Instant::now();
    context.run();
    assert_eq!(*seen.borrow(), Some(0));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn slow_process_is_killed_promptly_on_shutdown() {
    let mut context = Context::with_interval(Duration::from_millis(10));
    let handle = context.handle();

    let never_called: ProcessHandler = Box::new(|_base, _code| {
        panic!("a killed process must not report a normal completion");
    });
    let process = ProcessTrigger::new(handle.clone(), "slow", "sleep 30", never_called);
    context.add(Box::new(process));

    // fires once, almost immediately, and asks the supervisor to stop —
    // exercising ProcessTrigger::shutdown's kill path, not a natural exit.
    let shutdown_handler: TimerHandler = Box::new(move |_base, _at| {
        handle.request_shutdown("test");
    });
    let timer = TimerTrigger::new(context.handle(), "stop", 0.0, shutdown_handler);
    context.add(Box::new(timer));

    let start = Instant::now();
    context.run();
    assert!(
        start.elapsed() < Duration::from_secs(5),
        "shutdown should kill the child well before its natural 30s exit"
    );
}

#[test]
fn reader_forwards_matching_lines_and_ignores_the_rest() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "alpha").unwrap();
    writeln!(file, "beta").unwrap();
    writeln!(file, "gamma").unwrap();
    writeln!(file, "beta again").unwrap();
    writeln!(file, "END").unwrap();
    file.flush().unwrap();

    let mut context = Context::with_interval(Duration::from_millis(20));
    let handle = context.handle();
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    let handler: ReaderHandler = Box::new(move |_base, line| seen_clone.borrow_mut().push(line.to_owned()));
    let reader = ReaderTrigger::new(handle.clone(), "r", file.path(), "END\n", Some("^b"), handler).unwrap();
    context.add(Box::new(reader));

    // bounds the test: fires once, well after the reader has had time to
    // drain the already-fully-written file, and stops the loop.
    let bound_handler: TimerHandler = Box::new(move |_base, _at| {
        handle.request_shutdown("test");
    });
    let bound = TimerTrigger::new(context.handle(), "bound", 0.5, bound_handler);
    context.add(Box::new(bound));

    context.run();
    assert_eq!(*seen.borrow(), vec!["beta\n".to_string(), "beta again\n".to_string()]);
}

#[test]
fn unknown_trigger_kind_fails_before_the_loop_starts() {
    // no `handler` table at all: an unknown kind must still be rejected,
    // ahead of any other missing-option failure (spec.md §8 scenario 5).
    let script = tack::config::parse(
        r#"
        [[trigger]]
        kind = "nonsense"
        name = "x"
        "#,
    )
    .unwrap();
    let err = tack::config::build_context(&script);
    assert!(matches!(err, Err(tack::Error::UnknownKind(ref k)) if k == "nonsense"));
    assert_eq!(err.unwrap_err().to_string(), "No such kind: nonsense");
}

#[test]
fn remote_task_with_unset_env_token_fails_before_the_loop_starts() {
    std::env::remove_var("TOKEN");
    let script = tack::config::parse(
        r#"
        [[trigger]]
        kind = "globus"
        name = "x"
        task = "abc"
        user = "alice"
        token = "ENV"

        [trigger.handler]
        action = "log"
        "#,
    )
    .unwrap();
    let err = tack::config::build_context(&script);
    assert!(matches!(err, Err(tack::Error::TokenEnvUnset)));
}
