//! The end-to-end pipeline: freshness check, filtering, set creation.
//!
//! The driver only wires stages together; every external effect goes through
//! one of the [`Collaborators`], so the whole run can be exercised with stubs.

use rand::Rng;

use crate::cli::Cli;
use crate::config::{Config, ConfigStore};
use crate::country::{parse_country_list, CountryCode};
use crate::database::{filter_records, GeoCsvReader};
use crate::error::{GeoblockError, Result};
use crate::ipset::{sync, SetBackend, SetRequest, SyncOutcome};
use crate::prompt::Confirm;
use crate::version::{force_refresh, reconcile, DatabaseRefresher, VersionSource};

/// Prefix of generated set names.
pub const GENERATED_NAME_PREFIX: &str = "geoblock-";

/// What the run should do, validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub countries: Vec<CountryCode>,
    pub name: Option<String>,
    pub update_database: bool,
}

impl RunOptions {
    /// Validate command-line arguments.
	///
	/// Country codes are checked here, before anything touches the network or
	/// the database.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let countries = match &cli.countries {
            Some(list) => parse_country_list(list)?,
            None if cli.update_database => Vec::new(),
            None => return Err(GeoblockError::Usage("No countries specified!".to_string())),
        };
        let name = cli.name.clone().filter(|n| !n.is_empty());
        Ok(RunOptions {
            countries,
            name,
            update_database: cli.update_database,
        })
    }
}

/// The external world as seen by the pipeline.
pub struct Collaborators<'a> {
    pub version_source: &'a dyn VersionSource,
    pub refresher: &'a dyn DatabaseRefresher,
    pub confirm: &'a mut dyn Confirm,
    pub backend: &'a mut dyn SetBackend,
    pub store: &'a mut dyn ConfigStore,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    /// `--update-database` finished.
    DatabaseUpdated { version: String },
    /// The set was created and filled.
    SetCommitted {
        name: String,
        blocks: usize,
        addresses: u64,
    },
    /// The operator stopped the run at a prompt; nothing was changed.
    Aborted { name: Option<String> },
}

/// Generate a set name such as `geoblock-qhzkve`.
pub fn random_set_name<R: Rng>(rng: &mut R) -> String {
    let suffix: String = (0..6).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
    format!("{}{}", GENERATED_NAME_PREFIX, suffix)
}

/// Run the whole pipeline.
///
/// Stages run strictly in order; the first error ends the run.
pub fn run(options: &RunOptions, config: &mut Config, io: Collaborators<'_>) -> Result<RunReport> {
    if options.update_database {
        let outcome = force_refresh(config, io.version_source, io.refresher, io.store)?;
        log::info!("Database refreshed: {:?}", outcome);
        return Ok(RunReport::DatabaseUpdated {
            version: config.database.database_version_date.clone(),
        });
    }

    let countries: Vec<&str> = options.countries.iter().map(CountryCode::as_str).collect();
    log::info!("Countries: {:?}", countries);

    reconcile(config, io.version_source, io.confirm, io.refresher, io.store)?;

    let records = GeoCsvReader::open(&config.database.file)?;

    let name = match &options.name {
        Some(name) => {
            log::info!("List name: {}", name);
            name.clone()
        }
        None => {
            log::warn!("You have not specified a name. A random name will be generated for the list!");
            let name = random_set_name(&mut rand::thread_rng());
            log::info!("Generated list name: {}", name);
            if io
                .confirm
                .confirm("Do you want to start over and define your own list name using --name?")
            {
                log::info!("Exiting...");
                return Ok(RunReport::Aborted { name: None });
            }
            name
        }
    };

    let request = SetRequest::from_matches(name, filter_records(records, &options.countries))?;
    log::info!(
        "{} blocks covering {} addresses matched",
        request.blocks.len(),
        request.total_addresses
    );

    log::warn!(
        "Very large IPsets can take longer to traverse and lower the performance due to high \
         traffic. Increased RAM usage can also become a problem."
    );

    match sync(&request, io.backend, io.confirm)? {
        SyncOutcome::Committed { added } => Ok(RunReport::SetCommitted {
            name: request.name,
            blocks: added,
            addresses: request.total_addresses,
        }),
        SyncOutcome::Declined => {
            log::info!("Exiting...");
            Ok(RunReport::Aborted {
                name: Some(request.name),
            })
        }
    }
}
