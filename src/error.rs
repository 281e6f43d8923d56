use crate::state::Role;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub const USAGE: &str = "Usage: dp [--strict] [--report] [--block-size BYTES] <cmd1 arg...> : <cmd2 arg...> : <cmd3 arg...>";

/// Malformed command line. Detected before any pipe or process exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("no command given")]
    NoArguments,

    #[error("bad command syntax - only one command found")]
    OnlyOneCommand,

    #[error("bad command syntax - only two commands found")]
    OnlyTwoCommands,

    #[error("bad command syntax - missing third command")]
    MissingThirdCommand,

    #[error("bad command syntax - command {position} is empty")]
    EmptyCommand { position: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error("failed to create pipe: {0}")]
    Pipe(nix::Error),

    #[error("failed to fork: {0}")]
    Fork(nix::Error),

    #[error("failed to reset SIGCHLD disposition: {0}")]
    Signal(nix::Error),

    #[error("failed to wait for child {pid}: {errno}")]
    Wait { pid: nix::unistd::Pid, errno: nix::Error },

    #[error("argument contains a NUL byte: {0:?}")]
    Argument(String),

    #[error("{0} pipe endpoint was already handed out")]
    EndpointTaken(Role),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn os_errors_are_named_once() {
        let err = anyhow::Error::new(Error::Fork(Errno::EAGAIN)).context("failed to run pipeline");
        let text = format!("{:#}", err);
        assert_eq!(text.matches("EAGAIN").count(), 1, "{}", text);

        let err = Error::Wait {
            pid: nix::unistd::Pid::from_raw(7),
            errno: Errno::ECHILD,
        };
        assert!(std::error::Error::source(&err).is_none());
        assert_eq!(format!("{:#}", anyhow::Error::new(err)).matches("ECHILD").count(), 1);
    }
}
