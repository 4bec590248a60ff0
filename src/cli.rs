//! Command-line arguments of the `geoblock` binary.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::error::Result;
use crate::logging::LogLevel;

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Block all addresses of China and Russia in a set called "geoblock-cn-ru"
/// geoblock --countries cn,ru --name geoblock-cn-ru
///
/// # Only refresh the database
/// geoblock --update-database
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "geoblock",
    version,
    about = "Creates an ipset with every IPv4 range of the given countries."
)]
pub struct Cli {
    /// Comma-separated two-letter country codes, e.g. `us,fr`
    #[arg(long, value_name = "CODES", required_unless_present = "update_database")]
    pub countries: Option<String>,

    /// Name of the ipset to create (random if omitted)
    #[arg(long)]
    pub name: Option<String>,

    /// Download the latest database and exit
    #[arg(long)]
    pub update_database: bool,

    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log the ipset commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

impl Cli {
    /// Parse arguments (the first item is the program name).
	///
	/// # Errors
	/// Unknown flags and missing values become [`crate::GeoblockError::Usage`].
	/// `--help` and `--version` also come back as errors; see
	/// [`clap::Error::use_stderr`] to tell them apart.
    pub fn parse_from_args<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(args)
    }

    /// Same as [`Cli::parse_from_args`], with usage errors converted.
    pub fn try_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::parse_from_args(args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoblockError;

    #[test]
    fn test_full_invocation() {
        let cli = Cli::try_from_args([
            "geoblock",
            "--countries",
            "us,fr",
            "--name",
            "blocked",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.countries.as_deref(), Some("us,fr"));
        assert_eq!(cli.name.as_deref(), Some("blocked"));
        assert!(cli.dry_run);
        assert!(!cli.update_database);
        assert_eq!(cli.config, PathBuf::from("geoblock.toml"));
        assert_eq!(cli.log_level, LogLevel::Info);
    }

    #[test]
    fn test_values_are_positional() {
        // A name that looks like a country list is still the name.
        let cli = Cli::try_from_args(["geoblock", "--name", "us", "--countries", "us"]).unwrap();
        assert_eq!(cli.name.as_deref(), Some("us"));
        assert_eq!(cli.countries.as_deref(), Some("us"));
    }

    #[test]
    fn test_update_database_alone() {
        let cli = Cli::try_from_args(["geoblock", "--update-database"]).unwrap();
        assert!(cli.update_database);
        assert!(cli.countries.is_none());
    }

    #[test]
    fn test_usage_errors() {
        for args in [
            vec!["geoblock"],
            vec!["geoblock", "--countries"],
            vec!["geoblock", "--countries", "us", "--name"],
            vec!["geoblock", "--countries", "us", "--verbose"],
        ] {
            let err = Cli::try_from_args(args.clone()).unwrap_err();
            assert!(matches!(err, GeoblockError::Usage(_)), "{:?} should be rejected", args);
            assert_eq!(err.exit_code(), 2);
        }
    }
}
