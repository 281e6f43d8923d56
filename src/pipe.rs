//! Pipe allocation and per-endpoint ownership.
//!
//! Every endpoint is an [`OwnedFd`] held in an `Option` slot. A role takes
//! the endpoints it is entitled to out of [`Plumbing`]; whatever is left
//! behind is closed by dropping it. Because a forked child starts with a
//! copy of the parent's slots, the child calls [`Plumbing::close_all`] after
//! taking its own ends, so no stray write end keeps a reader from seeing
//! end-of-stream.

use crate::error::{Error, Result};
use crate::state::Role;
use std::fs::File;
use std::os::fd::OwnedFd;

/// Counts the pipe descriptors open in this process, for `debug` logs.
/// `None` where `/proc/self/fd` is unavailable.
pub fn open_pipe_count() -> Option<usize> {
    let entries = std::fs::read_dir("/proc/self/fd").ok()?;
    let count = entries
        .filter_map(|entry| std::fs::read_link(entry.ok()?.path()).ok())
        .filter(|target| target.to_string_lossy().starts_with("pipe:"))
        .count();
    Some(count)
}

/// One unidirectional byte channel.
#[derive(Debug)]
pub struct Pipe {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl Pipe {
    pub fn open() -> Result<Self> {
        let (read, write) = nix::unistd::pipe().map_err(Error::Pipe)?;
        Ok(Self {
            read: Some(read),
            write: Some(write),
        })
    }

    pub fn take_read(&mut self) -> Option<OwnedFd> {
        self.read.take()
    }

    pub fn take_write(&mut self) -> Option<OwnedFd> {
        self.write.take()
    }

    pub fn close(&mut self) {
        self.read = None;
        self.write = None;
    }

    pub fn open_ends(&self) -> usize {
        usize::from(self.read.is_some()) + usize::from(self.write.is_some())
    }
}

/// All channels of one invocation: head -> relay, and relay -> each leg.
#[derive(Debug)]
pub struct Plumbing {
    pub head: Pipe,
    pub legs: Vec<Pipe>,
}

impl Plumbing {
    /// Opens `1 + legs` pipes. On failure every pipe opened so far is
    /// dropped again, so callers never see a partial set.
    pub fn allocate(legs: usize) -> Result<Self> {
        let head = Pipe::open()?;
        let legs = (0..legs).map(|_| Pipe::open()).collect::<Result<Vec<_>>>()?;
        tracing::debug!(pipes = legs.len() + 1, "allocated pipes");
        Ok(Self { head, legs })
    }

    pub fn close_all(&mut self) {
        self.head.close();
        for pipe in &mut self.legs {
            pipe.close();
        }
    }

    /// Number of endpoints this process still holds.
    pub fn open_ends(&self) -> usize {
        self.head.open_ends() + self.legs.iter().map(Pipe::open_ends).sum::<usize>()
    }

    pub fn take_head_write(&mut self) -> Result<OwnedFd> {
        self.head.take_write().ok_or(Error::EndpointTaken(Role::Head))
    }

    pub fn take_leg_read(&mut self, leg: usize) -> Result<OwnedFd> {
        self.legs
            .get_mut(leg)
            .and_then(Pipe::take_read)
            .ok_or(Error::EndpointTaken(Role::Leg(leg)))
    }

    /// Takes the head's read end and every leg's write end: the relay's share.
    pub fn take_relay_ends(&mut self) -> Result<(File, Vec<File>)> {
        let source = self.head.take_read().ok_or(Error::EndpointTaken(Role::Relay))?;
        let sinks = self
            .legs
            .iter_mut()
            .map(|p| p.take_write().map(File::from))
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::EndpointTaken(Role::Relay))?;
        Ok((File::from(source), sinks))
    }
}
