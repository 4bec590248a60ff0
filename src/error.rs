//! Error taxonomy shared by every stage of the pipeline.
//!
//! All errors are terminal for a run: the library never exits the process, it
//! returns a [`GeoblockError`] and the binary decides how to report it.

use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = GeoblockError> = std::result::Result<T, E>;

/// Every way a geoblock run can fail.
#[derive(Error, Debug)]
pub enum GeoblockError {
    /// Bad or unknown command-line arguments.
    #[error("{0}")]
    Usage(String),

    /// A country code that is not exactly two ASCII letters.
    #[error("invalid country code: '{0}'")]
    InvalidCountryCode(String),

    /// An address interval whose start lies after its end.
    #[error("invalid range: {start} is greater than {end}")]
    InvalidRange { start: Ipv4Addr, end: Ipv4Addr },

    /// A string that is not a dotted-decimal IPv4 address.
    #[error("invalid IPv4 address: '{0}'")]
    InvalidAddress(String),

    /// A CIDR block with a bad prefix or host bits set.
    #[error("invalid CIDR block: {0}")]
    InvalidCidr(String),

    /// The geolocation database file does not exist.
    #[error("missing database file: {}", .0.display())]
    MissingDatabaseFile(PathBuf),

    /// A database row that cannot be turned into a record.
    #[error("malformed database record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    /// The database download could not be performed.
    #[error("database download failed: {0}")]
    DownloadFailure(String),

    /// The downloaded file is not a usable archive; carries the server's reply.
    #[error("downloaded archive is invalid (download limit reached or bad token): {message}")]
    BadArchive { message: String },

    /// The version marker could not be located on the version page.
    #[error("could not find the release date of '{file}' on the version page")]
    ScrapeFailure { file: String },

    /// The packet-filter tool failed or could not be started.
    #[error("`{command}` failed: {reason}")]
    ExternalToolFailure { command: String, reason: String },

    /// The configuration file could not be parsed or written.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl GeoblockError {
    /// Process exit code the binary uses for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            GeoblockError::Usage(_) => 2,
            _ => 1,
        }
    }
}

impl From<clap::Error> for GeoblockError {
    fn from(err: clap::Error) -> Self {
        GeoblockError::Usage(err.to_string().trim_end().to_string())
    }
}
