//! The relay: reads the head's output once and writes it to every leg.

use crate::error::{Error, Result};
use crate::pipe::Plumbing;
use crate::state::{ChildProcess, Role};
use nix::unistd::{self, ForkResult};
use std::io::{self, Read, Write};

pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Copies one byte stream to a list of sinks, block by block.
///
/// Each block is written completely to sink 0, then sink 1, and so on. A
/// sink whose reader has gone away (`BrokenPipe`) is dropped and the
/// remaining sinks keep receiving data; once no sink is left the relay
/// stops reading.
pub struct Relay<R, W> {
    source: R,
    sinks: Vec<(Role, W)>,
    block_size: usize,
}

impl<R: Read, W: Write> Relay<R, W> {
    pub fn new(source: R, sinks: Vec<W>, block_size: usize) -> Self {
        let sinks = sinks
            .into_iter()
            .enumerate()
            .map(|(i, w)| (Role::Leg(i), w))
            .collect();
        Self {
            source,
            sinks,
            block_size: block_size.max(1),
        }
    }

    /// Relays until end-of-stream. Returns the number of bytes read from the
    /// source.
    pub fn run(&mut self) -> io::Result<u64> {
        let mut buf = vec![0u8; self.block_size];
        let mut total = 0u64;
        while !self.sinks.is_empty() {
            let n = match self.source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            self.fan_out(&buf[..n])?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Sinks still receiving data.
    pub fn live_sinks(&self) -> usize {
        self.sinks.len()
    }

    pub fn into_sinks(self) -> Vec<W> {
        self.sinks.into_iter().map(|(_, w)| w).collect()
    }

    fn fan_out(&mut self, block: &[u8]) -> io::Result<()> {
        let mut i = 0;
        while i < self.sinks.len() {
            let (role, sink) = &mut self.sinks[i];
            match sink.write_all(block) {
                Ok(()) => i += 1,
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::warn!(leg = %role, "leg closed its input, no longer relaying to it");
                    self.sinks.remove(i);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Forks the relay process. It takes the head's read end and every leg's
/// write end out of `plumbing`; the parent closes its copies of those on
/// return.
pub fn spawn_relay(plumbing: &mut Plumbing, block_size: usize) -> Result<ChildProcess> {
    let (source, sinks) = plumbing.take_relay_ends()?;

    // SAFETY: the caller is single-threaded.
    match unsafe { unistd::fork() }.map_err(Error::Fork)? {
        ForkResult::Parent { child } => {
            drop(source);
            drop(sinks);
            tracing::debug!(pid = %child, block_size, "spawned relay");
            Ok(ChildProcess {
                role: Role::Relay,
                pid: child,
            })
        }
        ForkResult::Child => {
            plumbing.close_all();
            if let Some(pipes) = crate::pipe::open_pipe_count() {
                tracing::debug!(pipes, "relay pipe descriptors");
            }
            let mut relay = Relay::new(source, sinks, block_size);
            let code = match relay.run() {
                Ok(bytes) => {
                    tracing::debug!(bytes, "relay reached end of stream");
                    0
                }
                Err(e) => {
                    tracing::error!("relay I/O failed: {}", e);
                    eprintln!("dp: relay: {e}");
                    1
                }
            };
            // closes the source and every leg's write end so legs see EOF
            drop(relay);
            std::process::exit(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;
    use std::io::Cursor;

    /// Accepts at most `limit` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        limit: usize,
        calls: usize,
    }

    impl Trickle {
        fn new(limit: usize) -> Self {
            Self {
                data: Vec::new(),
                limit,
                calls: 0,
            }
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            let n = buf.len().min(self.limit);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Fails with `BrokenPipe` after accepting `accept` bytes.
    struct Hangup {
        data: Vec<u8>,
        accept: usize,
    }

    impl Write for Hangup {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.data.len() >= self.accept {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            let n = buf.len().min(self.accept - self.data.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Returns `Interrupted` before every successful read.
    struct Flaky {
        inner: Cursor<Vec<u8>>,
        interrupt_next: bool,
    }

    impl Read for Flaky {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.interrupt_next = !self.interrupt_next;
            if self.interrupt_next {
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn both_sinks_get_identical_copies() {
        let input = b"hello, world\n".to_vec();
        let mut relay = Relay::new(Cursor::new(input.clone()), vec![Vec::new(), Vec::new()], 1024);
        assert_eq!(relay.run().unwrap(), input.len() as u64);
        let sinks = relay.into_sinks();
        assert_eq!(sinks[0], input);
        assert_eq!(sinks[1], input);
    }

    #[test]
    fn empty_source_ends_immediately() {
        let mut relay = Relay::new(Cursor::new(Vec::new()), vec![Vec::new(), Vec::new()], 1024);
        assert_eq!(relay.run().unwrap(), 0);
        assert!(relay.into_sinks().iter().all(Vec::is_empty));
    }

    #[test]
    fn payload_larger_than_block_spans_many_reads() {
        let mut input = vec![0u8; 1 << 20];
        rand::thread_rng().fill_bytes(&mut input);
        let mut relay = Relay::new(Cursor::new(input.clone()), vec![Vec::new(), Vec::new()], 1024);
        assert_eq!(relay.run().unwrap(), input.len() as u64);
        for sink in relay.into_sinks() {
            assert!(sink == input);
        }
    }

    #[test]
    fn short_writes_are_retried_until_drained() {
        let mut input = vec![0u8; 10_000];
        rand::thread_rng().fill_bytes(&mut input);
        let mut relay = Relay::new(Cursor::new(input.clone()), vec![Trickle::new(7), Trickle::new(3)], 1024);
        relay.run().unwrap();
        let sinks = relay.into_sinks();
        assert!(sinks[0].data == input);
        assert!(sinks[1].data == input);
        assert!(sinks[1].calls > sinks[0].calls);
    }

    #[test]
    fn closed_leg_does_not_stop_the_other() {
        let mut input = vec![0u8; 5000];
        rand::thread_rng().fill_bytes(&mut input);
        let sinks = vec![
            Hangup { data: Vec::new(), accept: 100 },
            Hangup { data: Vec::new(), accept: usize::MAX },
        ];
        let mut relay = Relay::new(Cursor::new(input.clone()), sinks, 256);
        assert_eq!(relay.run().unwrap(), input.len() as u64);
        assert_eq!(relay.live_sinks(), 1);
        let sinks = relay.into_sinks();
        assert!(sinks[0].data == input);
    }

    #[test]
    fn stops_reading_once_every_leg_is_gone() {
        let mut input = vec![0u8; 5000];
        rand::thread_rng().fill_bytes(&mut input);
        let sinks = vec![
            Hangup { data: Vec::new(), accept: 10 },
            Hangup { data: Vec::new(), accept: 20 },
        ];
        let mut relay = Relay::new(Cursor::new(input), sinks, 256);
        assert_eq!(relay.run().unwrap(), 256);
        assert_eq!(relay.live_sinks(), 0);
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let source = Flaky {
            inner: Cursor::new(b"abcdef".to_vec()),
            interrupt_next: false,
        };
        let mut relay = Relay::new(source, vec![Vec::new(), Vec::new()], 2);
        assert_eq!(relay.run().unwrap(), 6);
        for sink in relay.into_sinks() {
            assert_eq!(sink, b"abcdef");
        }
    }

    #[test]
    fn other_write_errors_abort() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::ErrorKind::PermissionDenied.into())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut relay = Relay::new(Cursor::new(b"x".to_vec()), vec![Broken], 16);
        let err = relay.run().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
