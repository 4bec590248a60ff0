#[cfg(feature = "download")]
use std::process;

#[cfg(feature = "download")]
use geoblock::download::{HttpVersionSource, Ip2LocationDownloader};
#[cfg(feature = "download")]
use geoblock::{
    logging, Cli, Collaborators, Config, FileStore, GeoblockError, Ipset, RunOptions, RunReport,
    TerminalPrompt,
};

#[cfg(feature = "download")]
fn main() {
    let cli = match Cli::parse_from_args(std::env::args_os()) {
        Ok(cli) => cli,
        // --help / --version
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => fail(&GeoblockError::from(e)),
    };

    if let Err(e) = logging::init_logger(cli.log_level.into()) {
        eprintln!("[WARNING] logger already initialized: {}", e);
    }

    match execute(&cli) {
        Ok(RunReport::SetCommitted { name, blocks, addresses }) => {
            println!();
            println!(
                "{} was created successfully with {} blocks ({} IPs)! Reference it from an \
                 iptables/nftables rule to use it as a block list or allow list.",
                name, blocks, addresses
            );
            let ipset = Ipset::new("ipset", cli.dry_run);
            println!("To check your ipset execute: {} | less", ipset.list_command(&name));
            println!("To destroy your ipset execute: {}", ipset.destroy_command(&name));
        }
        Ok(RunReport::DatabaseUpdated { version }) => {
            println!("The database was successfully updated ({}).", version);
        }
        Ok(RunReport::Aborted { .. }) => {}
        Err(e) => fail(&e),
    }
}

#[cfg(feature = "download")]
fn execute(cli: &Cli) -> Result<RunReport, GeoblockError> {
    let options = RunOptions::from_cli(cli)?;
    let mut config = Config::load(&cli.config)?;

    let mut ipset = Ipset::new("ipset", cli.dry_run);
    if !options.update_database {
        ipset.ensure_available()?;
    }

    let mut prompt = TerminalPrompt::stdio();
    let mut store = FileStore::new(&cli.config);
    let version_source = HttpVersionSource::default();
    let refresher = Ip2LocationDownloader::default();

    geoblock::run(
        &options,
        &mut config,
        Collaborators {
            version_source: &version_source,
            refresher: &refresher,
            confirm: &mut prompt,
            backend: &mut ipset,
            store: &mut store,
        },
    )
}

#[cfg(feature = "download")]
fn fail(e: &GeoblockError) -> ! {
    if log::log_enabled!(log::Level::Error) {
        log::error!("{}", e);
    } else {
        eprintln!("[ERROR] {}", e);
    }
    if matches!(e, GeoblockError::Usage(_)) {
        eprintln!("Use --help to see available options!");
    }
    process::exit(e.exit_code())
}

#[cfg(not(feature = "download"))]
fn main() {
    eprintln!("geoblock needs the `download` feature to check and fetch the database.");
    eprintln!("Run: cargo run --features download --bin geoblock -- --help");
    std::process::exit(1);
}
