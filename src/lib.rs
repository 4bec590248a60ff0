//! # Country-wide ipset generation
//!
//! This crate turns the IP2Location LITE DB1 geolocation database into a kernel
//! `ipset` set containing every IPv4 range attributed to a list of countries,
//! ready to be referenced by iptables/nftables rules as a block list or an
//! allow list.
//!
//! ## What this crate does
//!
//! - Reduces each database interval to the **minimal list of CIDR blocks**.
//! - Streams the database **once**, keeping only the rows of wanted countries.
//! - Checks the vendor's release date and **offers a refresh** when the copy on
//!   disk is stale.
//! - Creates the set sized for the matched addresses and **adds every block**,
//!   stopping at the first failure.
//!
//! ## What this crate does NOT do
//!
//! - It does **not** write firewall rules; it only builds the set.
//! - It does **not** handle IPv6 (DB1 LITE CSV is IPv4 only).
//! - It does **not** check whether a set of the same name already exists;
//!   destroy it first or pick a fresh name.
//!
//! ## Pipeline
//!
//! ```text
//! version check ──► database filter ──► CIDR reduction ──► ipset create/add
//! ```
//!
//! Everything with an external effect (HTTP, the `ipset` tool, prompts, the
//! configuration file) sits behind a small trait so each stage can be driven
//! with deterministic stubs.
//!
//! ## Features
//!
//! - `download` (default): HTTP implementations of [`VersionSource`] and
//!   [`DatabaseRefresher`] using blocking `reqwest` and `zip`.

mod cidr;
pub mod cli;
pub mod config;
mod country;
mod database;
#[cfg(feature = "download")]
pub mod download;
mod error;
mod ipset;
pub mod logging;
mod prompt;
mod run;
mod version;

// Re-export public API
pub use cidr::{parse_ipv4, range_to_cidrs, reduce, total_size, CidrBlock};
pub use cli::Cli;
pub use config::{Config, ConfigStore, DatabaseConfig, FileStore};
pub use country::{parse_country_list, CountryCode};
pub use database::{filter_records, CountryFilter, GeoCsvReader, GeoRecord, MatchedRecord};
pub use error::{GeoblockError, Result};
pub use ipset::{sync, Ipset, SetBackend, SetRequest, SyncOutcome, MAXELEM_HEADROOM, SET_TYPE};
pub use prompt::{Confirm, TerminalPrompt};
pub use run::{random_set_name, run, Collaborators, RunOptions, RunReport};
pub use version::{
    extract_version_date, fetch_remote_version, force_refresh, reconcile, DatabaseRefresher,
    Reconciliation, VersionSource,
};
