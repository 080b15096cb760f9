//! # Console logging
//!
//! A `log::Log` implementation for host-side tools and test harnesses. Lines
//! are written as `[LEVEL] target: message` to standard error (or standard
//! output), matching what the firmware drivers emit on a serial console.

use driver_sync::SyncOnceCell;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fmt::Write as _;
use std::io::{self, Write as _};

static LOGGER: SyncOnceCell<ConsoleLogger> = SyncOnceCell::new();

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Stream {
    Stdout,
    Stderr,
}

#[derive(Debug)]
pub struct ConsoleLogger {
    max_level: LevelFilter,
    stream: Stream,
}

impl ConsoleLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            stream: Stream::Stderr,
        }
    }

    #[must_use]
    pub const fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    /// Install as the global logger. Call once during startup.
    ///
    /// # Errors
    /// Fails if a logger (this or another) is already installed.
    pub fn init(self) -> Result<(), SetLoggerError> {
        let max_level = self.max_level;
        let logger = LOGGER.get_or_init(|| self);
        log::set_logger(logger)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

/// Map a `-v` count to a level: 0 → warn, 1 → info, 2 → debug, more → trace.
#[must_use]
pub const fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// `[LEVEL] target: message`
#[must_use]
pub fn format_record(record: &Record<'_>) -> String {
    let mut line = String::new();
    let _ = writeln!(
        line,
        "[{}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    );
    line
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_record(record);
        // Write errors are dropped.
        let _ = match self.stream {
            Stream::Stdout => io::stdout().lock().write_all(line.as_bytes()),
            Stream::Stderr => io::stderr().lock().write_all(line.as_bytes()),
        };
    }

    fn flush(&self) {
        let _ = match self.stream {
            Stream::Stdout => io::stdout().flush(),
            Stream::Stderr => io::stderr().flush(),
        };
    }
}
