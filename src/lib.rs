//! dp: duplicate one command's standard output into the standard input of
//! two other commands.
//!
//! The parent ([`supervisor::Supervisor`]) forks four children: the head
//! command, a relay that copies bytes, and two leg commands. The only
//! synchronization between them is blocking pipe I/O.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod pipe;
pub mod process;
pub mod relay;
pub mod state;
pub mod supervisor;

pub use error::{Error, Result, UsageError};
