//! Fork/exec of the head and leg commands.

use crate::command::Command;
use crate::error::{Error, Result};
use crate::pipe::Plumbing;
use crate::state::{ChildProcess, Role};
use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult};
use std::ffi::CString;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// Exit status of a child whose stream could not be rewired.
pub const BIND_FAILURE: i32 = 1;
/// Exit status when the program does not exist.
pub const EXEC_NOT_FOUND: i32 = 127;
/// Exit status for every other exec failure.
pub const EXEC_FAILURE: i32 = 126;

/// The standard stream a pipe endpoint is bound onto in the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdStream {
    Stdin,
    Stdout,
}

impl StdStream {
    pub fn raw_fd(self) -> RawFd {
        match self {
            StdStream::Stdin => nix::libc::STDIN_FILENO,
            StdStream::Stdout => nix::libc::STDOUT_FILENO,
        }
    }
}

/// Forks a child that runs `command` with `source` bound onto `target`.
///
/// `source` must already be taken out of `plumbing`. The parent closes its
/// copy of `source` and returns at once; the child closes every endpoint
/// still in `plumbing` before it execs, and never returns.
pub fn launch(
    role: Role,
    command: &Command,
    source: OwnedFd,
    target: StdStream,
    plumbing: &mut Plumbing,
) -> Result<ChildProcess> {
    let argv = command.to_argv()?;

    // SAFETY: the caller is single-threaded; the child only rewires
    // descriptors and then execs or exits.
    match unsafe { unistd::fork() }.map_err(Error::Fork)? {
        ForkResult::Parent { child } => {
            drop(source);
            tracing::debug!(%role, pid = %child, %command, "launched");
            Ok(ChildProcess { role, pid: child })
        }
        ForkResult::Child => exec_child(role, &argv, source, target, plumbing),
    }
}

fn exec_child(
    role: Role,
    argv: &[CString],
    source: OwnedFd,
    target: StdStream,
    plumbing: &mut Plumbing,
) -> ! {
    if let Err(e) = bind(source, target) {
        eprintln!("dp: {role}: failed to duplicate file descriptor: {e}");
        std::process::exit(BIND_FAILURE);
    }
    plumbing.close_all();

    // Rust starts with SIGPIPE ignored and exec keeps ignored dispositions.
    // SAFETY: installing SIG_DFL runs no handler code.
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    let err = match unistd::execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    eprintln!(
        "dp: {role}: execvp failed: {}: {err}",
        argv[0].to_string_lossy()
    );
    std::process::exit(if err == Errno::ENOENT {
        EXEC_NOT_FOUND
    } else {
        EXEC_FAILURE
    });
}

/// Makes `target` refer to the pipe, then closes the now redundant `source`.
/// The Rust runtime reopens closed descriptors 0-2 on `/dev/null` before
/// `main`, so a pipe end never already sits on `target`.
fn bind(source: OwnedFd, target: StdStream) -> nix::Result<()> {
    unistd::dup2(source.as_raw_fd(), target.raw_fd())?;
    Ok(())
}
