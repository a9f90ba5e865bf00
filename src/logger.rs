//! Logging plumbing
//!
//! One bare-bones drain that prints each record's message on its own line,
//! nothing else. Simulation output needs to stay grep-able.

use slog::{Drain, Logger, OwnedKVList, Record};
use std::cell::RefCell;
use std::io;
use std::sync::Mutex;

/// A drain that writes the message and nothing but the message
#[derive(Debug)]
pub struct MsgDrain<W: io::Write> {
    out: RefCell<W>,
}

impl<W> MsgDrain<W>
where
    W: io::Write,
{
    /// Wraps `out` as a drain
    pub fn new(out: W) -> MsgDrain<W> {
        MsgDrain {
            out: RefCell::new(out),
        }
    }
}

impl<W> Drain for MsgDrain<W>
where
    W: io::Write,
{
    type Ok = ();
    type Err = io::Error;

    fn log(&self, record: &Record, _values: &OwnedKVList) -> io::Result<()> {
        let mut out = self.out.borrow_mut();
        writeln!(out, "{}", record.msg())
    }
}

/// The binaries' root logger, message-per-line on stderr
pub fn term_logger() -> Logger {
    let drain = Mutex::new(MsgDrain::new(io::stderr())).fuse();
    Logger::root(drain, slog::o!())
}

/// A logger that swallows everything; tests use it
pub fn null_logger() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}
