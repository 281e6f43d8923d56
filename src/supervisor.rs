//! The parent process: builds the head -> relay -> legs topology, keeps no
//! pipe endpoint for itself and reaps every child exactly once.

use crate::command::Pipeline;
use crate::config::{ExitPolicy, RunConfig};
use crate::error::{Error, Result};
use crate::pipe::Plumbing;
use crate::process::{self, StdStream};
use crate::relay;
use crate::state::{ChildExit, ChildProcess, Reaped, Role, Stage};
use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::waitpid;
use serde::Serialize;

/// Exit information for every child, in spawn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub children: Vec<Reaped>,
}

impl Outcome {
    pub fn exit_code(&self, policy: ExitPolicy) -> u8 {
        match policy {
            ExitPolicy::AlwaysZero => 0,
            ExitPolicy::WorstChild => {
                let worst = self.children.iter().map(|c| c.exit.code()).max().unwrap_or(0);
                worst.clamp(0, 255) as u8
            }
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.children.iter().all(|c| c.exit.success())
    }
}

pub struct Supervisor {
    config: RunConfig,
    stage: Stage,
    children: Vec<ChildProcess>,
}

impl Supervisor {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            stage: Stage::Idle,
            children: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Runs the whole invocation. Any error aborts the sequence where it
    /// happens; already spawned children are left to finish on their own.
    ///
    /// Must be called from a single-threaded process: children are forked
    /// and the relay runs ordinary Rust code after the fork.
    pub fn run(&mut self, pipeline: &Pipeline) -> Result<Outcome> {
        for command in std::iter::once(&pipeline.head).chain(&pipeline.legs) {
            command.to_argv()?;
        }

        // An inherited SIG_IGN for SIGCHLD makes the kernel discard exit
        // statuses, and waitpid would fail with ECHILD.
        // SAFETY: installing SIG_DFL runs no handler code.
        unsafe { signal::signal(Signal::SIGCHLD, SigHandler::SigDfl) }.map_err(Error::Signal)?;

        let mut plumbing = Plumbing::allocate(pipeline.legs.len())?;
        self.advance(Stage::PipesCreated);

        let head_out = plumbing.take_head_write()?;
        let head = process::launch(
            Role::Head,
            &pipeline.head,
            head_out,
            StdStream::Stdout,
            &mut plumbing,
        )?;
        self.children.push(head);
        self.advance(Stage::HeadSpawned);

        let relay = relay::spawn_relay(&mut plumbing, self.config.block_size)?;
        self.children.push(relay);
        self.advance(Stage::RelaySpawned);

        for (i, leg) in pipeline.legs.iter().enumerate() {
            let leg_in = plumbing.take_leg_read(i)?;
            let child = process::launch(Role::Leg(i), leg, leg_in, StdStream::Stdin, &mut plumbing)?;
            self.children.push(child);
        }
        self.advance(Stage::LegsSpawned);

        self.advance(Stage::Cleanup);
        plumbing.close_all();
        debug_assert_eq!(plumbing.open_ends(), 0);
        if let Some(pipes) = crate::pipe::open_pipe_count() {
            tracing::debug!(pipes, "supervisor pipe descriptors");
        }

        self.advance(Stage::Reaping);
        let children = std::mem::take(&mut self.children);
        let reaped = children.into_iter().map(reap).collect::<Result<Vec<_>>>()?;

        self.advance(Stage::Done);
        Ok(Outcome { children: reaped })
    }

    fn advance(&mut self, next: Stage) {
        debug_assert_eq!(self.stage.next(), Some(next), "stage skipped");
        tracing::debug!(from = ?self.stage, to = ?next, "supervisor stage");
        self.stage = next;
    }
}

/// Blocks until `child` terminates and collects its status.
fn reap(child: ChildProcess) -> Result<Reaped> {
    loop {
        match waitpid(child.pid, None) {
            Ok(status) => {
                if let Some(exit) = ChildExit::from_wait_status(status) {
                    tracing::debug!(role = %child.role, pid = %child.pid, ?exit, "reaped");
                    return Ok(Reaped {
                        role: child.role,
                        pid: child.pid,
                        exit,
                    });
                }
            }
            Err(Errno::EINTR) => continue,
            Err(errno) => {
                return Err(Error::Wait {
                    pid: child.pid,
                    errno,
                })
            }
        }
    }
}
