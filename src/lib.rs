//! `tack` is an event-driven automation runtime: a long-lived supervisor
//! loads a set of *triggers*, each watching an external condition, and
//! invokes a handler when one fires. Handlers may register further
//! triggers, request shutdown, or let their trigger remove itself.
//!
//! Two ways to use it:
//!
//! - As a library: build a [`Context`](context::Context), register triggers
//!   with Rust closures via each trigger module's `new` constructor, and call
//!   [`Context::run`](context::Context::run).
//! - Via the `tack` binary: point it at a declarative TOML script (see
//!   [`config`]) describing triggers with built-in handler actions (see
//!   [`handler`]).
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod handler;
pub mod logging;
pub mod trigger;

pub use context::Context;
pub use error::{Error, Result};
