use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;
use serde::Serialize;
use std::fmt;

/// Position of a process in the head -> relay -> legs topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Head,
    Relay,
    /// Zero-based leg index. Displayed one-based (`leg1`, `leg2`).
    Leg(usize),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Head => f.write_str("head"),
            Role::Relay => f.write_str("relay"),
            Role::Leg(i) => write!(f, "leg{}", i + 1),
        }
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A forked child that has not been reaped yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildProcess {
    pub role: Role,
    pub pid: Pid,
}

/// How a reaped child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildExit {
    Code(i32),
    Signal(i32),
}

impl ChildExit {
    /// Maps a terminal wait status. Returns `None` for stop/continue
    /// notifications, which are not terminations.
    pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(ChildExit::Code(code)),
            WaitStatus::Signaled(_, sig, _) => Some(ChildExit::Signal(sig as i32)),
            _ => None,
        }
    }

    /// Shell-style status: the exit code, or 128 + signal number.
    pub fn code(self) -> i32 {
        match self {
            ChildExit::Code(code) => code,
            ChildExit::Signal(sig) => 128 + sig,
        }
    }

    pub fn success(self) -> bool {
        self == ChildExit::Code(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reaped {
    pub role: Role,
    #[serde(serialize_with = "serialize_pid")]
    pub pid: Pid,
    pub exit: ChildExit,
}

fn serialize_pid<S: serde::Serializer>(pid: &Pid, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i32(pid.as_raw())
}

/// Supervisor progress. Transitions only ever move one step forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    PipesCreated,
    HeadSpawned,
    RelaySpawned,
    LegsSpawned,
    Cleanup,
    Reaping,
    Done,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::PipesCreated),
            Stage::PipesCreated => Some(Stage::HeadSpawned),
            Stage::HeadSpawned => Some(Stage::RelaySpawned),
            Stage::RelaySpawned => Some(Stage::LegsSpawned),
            Stage::LegsSpawned => Some(Stage::Cleanup),
            Stage::Cleanup => Some(Stage::Reaping),
            Stage::Reaping => Some(Stage::Done),
            Stage::Done => None,
        }
    }
}
