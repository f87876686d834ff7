use std::fmt;

/// The crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// The crate error type
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A trigger was declared with no `kind` field
    #[error("trigger declared with no kind")]
    MissingKind,
    /// A trigger was declared with a `kind` not in the closed set
    #[error("No such kind: {0}")]
    UnknownKind(String),
    /// A required option was missing from a trigger's declaration
    #[error("{trigger}: missing required option `{key}`")]
    MissingOption {
        /// the trigger's `"<name> <id>"` stringification
        trigger: String,
        /// the missing key
        key: String,
    },
    /// `token = "ENV"` was given but `TOKEN` is not set in the environment
    #[error("token requested from environment but TOKEN is not set")]
    TokenEnvUnset,
    /// A channel between a worker and the supervisor has been disconnected
    #[error("channel disconnected")]
    ChannelClosed,
    /// Standard I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The declarative script file failed to parse
    #[error("script parse error: {0}")]
    ScriptParse(#[from] toml::de::Error),
    /// A regular expression given as a `pattern` option failed to compile
    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),
    /// A remote-task transport error, surfaced by a [`crate::trigger::remote_task::RemoteTaskClient`]
    #[error("remote task transport error: {0}")]
    RemoteTransport(String),
    /// Any other failure not covered by a dedicated variant
    #[error("{0}")]
    Failed(String),
}

impl Error {
    /// Creates a new [`Error::Failed`] from any displayable value
    pub fn failed<S: fmt::Display>(msg: S) -> Self {
        Error::Failed(msg.to_string())
    }

    /// Creates a new [`Error::MissingOption`]
    pub fn missing_option(trigger: impl Into<String>, key: impl Into<String>) -> Self {
        Error::MissingOption {
            trigger: trigger.into(),
            key: key.into(),
        }
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    fn from(_: crossbeam_channel::RecvError) -> Self {
        Error::ChannelClosed
    }
}
