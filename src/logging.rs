//! Logger setup for the `geoblock` binary.
//!
//! Every line is prefixed with its severity (`[ERROR]`, `[WARNING]`, `[INFO]`,
//! ...), coloured when writing to a terminal.

use std::io::Write;

use colored::Colorize;
use log::{Level, LevelFilter};

/// Log verbosity selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Severity tag printed in front of every message.
pub fn severity_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "[ERROR]",
        Level::Warn => "[WARNING]",
        Level::Info => "[INFO]",
        Level::Debug => "[DEBUG]",
        Level::Trace => "[TRACE]",
    }
}

/// Initialize `env_logger`.
///
/// `RUST_LOG` is read first and `level` then overrides it for this crate, so
/// `RUST_LOG=reqwest=debug` still works for dependencies. Initializing twice
/// is reported as an error, not a panic.
pub fn init_logger(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();

    builder.filter_level(level);
    builder.filter_module("html5ever", LevelFilter::Error);
    builder.filter_module("selectors", LevelFilter::Warn);
    builder.filter_module("reqwest", LevelFilter::Info);
    builder.filter_module("hyper", LevelFilter::Info);
    builder.filter_module("geoblock", level);

    builder.format(|buf, record| {
        let tag = severity_tag(record.level());
        let tag = match record.level() {
            Level::Error => tag.red().bold(),
            Level::Warn => tag.yellow(),
            Level::Info => tag.green(),
            Level::Debug => tag.blue(),
            Level::Trace => tag.purple(),
        };
        writeln!(buf, "{} {}", tag, record.args())
    });

    builder.try_init()
}
