//! Declarative TOML script loading (spec.md §2's "script front end",
//! resolved in SPEC_FULL.md §2 as a typed config surface rather than an
//! embedded interpreter).
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::context::Context;
use crate::error::Result;
use crate::factory::{Factory, Options};

/// The on-disk representation of a script: a poll interval and a list of
/// trigger declarations.
#[derive(Debug, Deserialize)]
pub struct ScriptFile {
    /// Poll interval, in seconds. Defaults to 1.0 (spec.md §4.1).
    #[serde(default = "default_interval")]
    pub interval: f64,
    /// One entry per `[[trigger]]` table.
    #[serde(default, rename = "trigger")]
    pub triggers: Vec<Options>,
}

fn default_interval() -> f64 {
    1.0
}

/// Parses `text` as a script.
pub fn parse(text: &str) -> Result<ScriptFile> {
    Ok(toml::from_str(text)?)
}

/// Reads and parses the script at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<ScriptFile> {
    let text = fs::read_to_string(path)?;
    parse(&text)
}

/// Builds a [`Context`] from a parsed script, registering every declared
/// trigger via [`Factory::new_trigger`].
///
/// Returns on the first trigger that fails to construct (spec.md §7: a
/// malformed script is a fatal configuration error, surfaced before the
/// polling loop ever starts).
pub fn build_context(script: &ScriptFile) -> Result<Context> {
    let mut context = Context::with_interval(Duration::from_secs_f64(script.interval));
    let mut factory = Factory::new(&mut context);
    for options in &script.triggers {
        factory.new_trigger(options)?;
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_script() {
        let script = parse(
            r#"
            interval = 0.5

            [[trigger]]
            kind = "timer"
            name = "t1"
            interval = 2.0

            [trigger.handler]
            action = "log"
            message = "tick"
            "#,
        )
        .unwrap();
        assert_eq!(script.interval, 0.5);
        assert_eq!(script.triggers.len(), 1);
    }

    #[test]
    fn default_interval_is_one_second() {
        let script = parse("").unwrap();
        assert_eq!(script.interval, 1.0);
        assert!(script.triggers.is_empty());
    }

    #[test]
    fn unknown_kind_fails_before_the_loop_starts() {
        let script = parse(
            r#"
            [[trigger]]
            kind = "nonsense"
            name = "x"

            [trigger.handler]
            action = "log"
            "#,
        )
        .unwrap();
        assert!(build_context(&script).is_err());
    }
}
