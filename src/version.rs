//! Database freshness check.
//!
//! The vendor publishes the release date of every LITE database next to its
//! download link. The date of the copy on disk is kept in the configuration;
//! when the two differ the operator is offered a refresh.
//!
//! ## States
//!
//! ```text
//! Checking ──equal──────────────────────────────► UpToDate
//!    │
//!    └─differ─► RefreshPending ─declined──────────► (unchanged, asked again next run)
//!                     │
//!                     └─confirmed─► refresh ─ok──► Refreshed (date saved once)
//!                                          └─err─► error, nothing saved
//! ```

use scraper::{ElementRef, Html, Selector};

use crate::config::{Config, ConfigStore};
use crate::error::{GeoblockError, Result};
use crate::prompt::Confirm;

/// Supplies the markup of the vendor's version page.
pub trait VersionSource {
    fn fetch_markup(&self) -> Result<String>;
}

/// Replaces the database on disk with the latest release.
pub trait DatabaseRefresher {
    fn refresh(&self, config: &Config) -> Result<()>;
}

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Stored and remote release dates are equal.
    UpToDate { version: String },
    /// A newer release exists but the operator declined the download.
    Declined { stored: String, remote: String },
    /// The database was refreshed and the new date persisted.
    Refreshed { previous: String, current: String },
}

/// Find the release date published next to `file_name` on the version page.
///
/// The date is the text of the element that follows the link's parent, i.e.
/// the next table cell in the vendor's listing.
///
/// # Errors
/// Returns [`GeoblockError::ScrapeFailure`] if there is no link to `file_name`,
/// no following element, or the element is empty.
///
/// # Examples
/// ```
/// use geoblock::extract_version_date;
///
/// let page = r#"<table><tr>
///     <td><a href="IP2LOCATION-LITE-DB1.CSV.ZIP">DB1</a></td>
///     <td> Oct 01, 2026 </td>
/// </tr></table>"#;
/// let date = extract_version_date(page, "IP2LOCATION-LITE-DB1.CSV.ZIP").unwrap();
/// assert_eq!(date, "Oct 01, 2026");
/// ```
pub fn extract_version_date(markup: &str, file_name: &str) -> Result<String> {
    let scrape_failure = || GeoblockError::ScrapeFailure {
        file: file_name.to_string(),
    };

    let document = Html::parse_document(markup);
    let links = Selector::parse("a[href]").map_err(|_| scrape_failure())?;

    let anchor = document
        .select(&links)
        .find(|a| a.value().attr("href") == Some(file_name))
        .ok_or_else(scrape_failure)?;

    let cell = anchor
        .parent()
        .and_then(|parent| parent.next_siblings().find_map(ElementRef::wrap))
        .ok_or_else(scrape_failure)?;

    // Only the cell's own text; nested markup is not part of the date.
    cell.children()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(scrape_failure)
}

/// Fetch the version page and extract the latest release date.
pub fn fetch_remote_version(source: &dyn VersionSource, config: &Config) -> Result<String> {
    let markup = source.fetch_markup()?;
    extract_version_date(&markup, &config.database.database_version_file)
}

/// Compare the stored release date with the published one and refresh on request.
///
/// The configuration is saved through `store` exactly once, and only after
/// `refresher` succeeded. On any error nothing is saved.
pub fn reconcile(
    config: &mut Config,
    source: &dyn VersionSource,
    confirm: &mut dyn Confirm,
    refresher: &dyn DatabaseRefresher,
    store: &mut dyn ConfigStore,
) -> Result<Reconciliation> {
    log::info!("Checking for new database version...");
    let remote = fetch_remote_version(source, config)?;
    let stored = config.database.database_version_date.clone();

    log::info!("Your database version is from: {}", display_date(&stored));
    log::info!("Latest database version is from: {}", remote);

    if remote == stored {
        log::info!("Nothing to update.");
        return Ok(Reconciliation::UpToDate { version: stored });
    }

    if !confirm.confirm("Would you like to download the latest version of the database?") {
        log::warn!("Keeping the database from {}", display_date(&stored));
        return Ok(Reconciliation::Declined { stored, remote });
    }

    refresher.refresh(config)?;
    commit_version(config, &remote, store)?;
    Ok(Reconciliation::Refreshed {
        previous: stored,
        current: remote,
    })
}

/// Refresh the database without asking, then record the published release date.
///
/// The date is fetched before downloading so a scrape failure aborts early.
pub fn force_refresh(
    config: &mut Config,
    source: &dyn VersionSource,
    refresher: &dyn DatabaseRefresher,
    store: &mut dyn ConfigStore,
) -> Result<Reconciliation> {
    let remote = fetch_remote_version(source, config)?;
    let previous = config.database.database_version_date.clone();

    refresher.refresh(config)?;
    commit_version(config, &remote, store)?;
    Ok(Reconciliation::Refreshed {
        previous,
        current: remote,
    })
}

fn commit_version(config: &mut Config, remote: &str, store: &mut dyn ConfigStore) -> Result<()> {
    let previous = std::mem::replace(&mut config.database.database_version_date, remote.to_string());
    if let Err(e) = store.save(config) {
        config.database.database_version_date = previous;
        return Err(e);
    }
    log::info!("The database was successfully updated to the {} release", remote);
    Ok(())
}

fn display_date(date: &str) -> &str {
    if date.is_empty() { "(never downloaded)" } else { date }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const PAGE: &str = r#"<html><body><table>
        <tr><th>File</th><th>Date</th></tr>
        <tr>
            <td><a href="IP2LOCATION-LITE-DB1.CSV.ZIP">IP2LOCATION-LITE-DB1.CSV.ZIP</a></td>
            <td>
                Oct 01, 2026
            </td>
        </tr>
        <tr>
            <td><a href="IP2LOCATION-LITE-DB3.CSV.ZIP">IP2LOCATION-LITE-DB3.CSV.ZIP</a></td>
            <td>Sep 01, 2026</td>
        </tr>
    </table></body></html>"#;

    struct StaticPage(&'static str);

    impl VersionSource for StaticPage {
        fn fetch_markup(&self) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct CountingRefresher {
        calls: Cell<usize>,
        fail: bool,
    }

    impl DatabaseRefresher for CountingRefresher {
        fn refresh(&self, _config: &Config) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                Err(GeoblockError::DownloadFailure("connection reset".into()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Vec<Config>,
    }

    impl ConfigStore for RecordingStore {
        fn save(&mut self, config: &Config) -> Result<()> {
            self.saved.push(config.clone());
            Ok(())
        }
    }

    fn config_dated(date: &str) -> Config {
        let mut config = Config::default();
        config.database.database_version_date = date.to_string();
        config
    }

    #[test]
    fn test_extract_picks_the_row_of_the_file() {
        assert_eq!(
            extract_version_date(PAGE, "IP2LOCATION-LITE-DB1.CSV.ZIP").unwrap(),
            "Oct 01, 2026"
        );
        assert_eq!(
            extract_version_date(PAGE, "IP2LOCATION-LITE-DB3.CSV.ZIP").unwrap(),
            "Sep 01, 2026"
        );
    }

    #[test]
    fn test_extract_fails_without_anchor_or_date() {
        let err = extract_version_date(PAGE, "IP2LOCATION-LITE-DB11.CSV.ZIP").unwrap_err();
        assert!(matches!(err, GeoblockError::ScrapeFailure { ref file } if file == "IP2LOCATION-LITE-DB11.CSV.ZIP"));

        let no_sibling = r#"<table><tr><td><a href="DB1.ZIP">x</a></td></tr></table>"#;
        assert!(extract_version_date(no_sibling, "DB1.ZIP").is_err());

        let empty_cell = r#"<table><tr><td><a href="DB1.ZIP">x</a></td><td>  </td></tr></table>"#;
        assert!(extract_version_date(empty_cell, "DB1.ZIP").is_err());
    }

    #[test]
    fn test_extract_ignores_nested_markup_in_the_cell() {
        let page = r#"<table><tr>
            <td><a href="DB1.ZIP">DB1</a></td>
            <td>
                Oct 01, 2026
                <span class="badge">New</span>
            </td>
        </tr></table>"#;
        assert_eq!(extract_version_date(page, "DB1.ZIP").unwrap(), "Oct 01, 2026");

        let only_nested = r#"<table><tr><td><a href="DB1.ZIP">x</a></td><td><span>Oct 01, 2026</span></td></tr></table>"#;
        assert!(extract_version_date(only_nested, "DB1.ZIP").is_err());
    }

    #[test]
    fn test_equal_versions_do_nothing() {
        let mut config = config_dated("Oct 01, 2026");
        let refresher = CountingRefresher::default();
        let mut store = RecordingStore::default();
        let mut asked = 0;
        let mut confirm = |_: &str| {
            asked += 1;
            true
        };

        let outcome = reconcile(&mut config, &StaticPage(PAGE), &mut confirm, &refresher, &mut store)
            .unwrap();

        assert_eq!(outcome, Reconciliation::UpToDate { version: "Oct 01, 2026".into() });
        assert_eq!(asked, 0);
        assert_eq!(refresher.calls.get(), 0);
        assert!(store.saved.is_empty());
    }

    #[test]
    fn test_declined_refresh_changes_nothing() {
        let mut config = config_dated("Sep 01, 2026");
        let refresher = CountingRefresher::default();
        let mut store = RecordingStore::default();
        let mut confirm = |_: &str| false;

        let outcome = reconcile(&mut config, &StaticPage(PAGE), &mut confirm, &refresher, &mut store)
            .unwrap();

        assert!(matches!(outcome, Reconciliation::Declined { .. }));
        assert_eq!(refresher.calls.get(), 0);
        assert!(store.saved.is_empty());
        assert_eq!(config.database.database_version_date, "Sep 01, 2026");
    }

    #[test]
    fn test_confirmed_refresh_saves_once() {
        let mut config = config_dated("");
        let refresher = CountingRefresher::default();
        let mut store = RecordingStore::default();
        let mut confirm = |_: &str| true;

        let outcome = reconcile(&mut config, &StaticPage(PAGE), &mut confirm, &refresher, &mut store)
            .unwrap();

        assert_eq!(
            outcome,
            Reconciliation::Refreshed {
                previous: String::new(),
                current: "Oct 01, 2026".into()
            }
        );
        assert_eq!(refresher.calls.get(), 1);
        assert_eq!(store.saved.len(), 1);
        assert_eq!(store.saved[0].database.database_version_date, "Oct 01, 2026");
        assert_eq!(config.database.database_version_date, "Oct 01, 2026");
    }

    #[test]
    fn test_failed_refresh_saves_nothing() {
        let mut config = config_dated("Sep 01, 2026");
        let refresher = CountingRefresher { fail: true, ..Default::default() };
        let mut store = RecordingStore::default();
        let mut confirm = |_: &str| true;

        let err = reconcile(&mut config, &StaticPage(PAGE), &mut confirm, &refresher, &mut store)
            .unwrap_err();

        assert!(matches!(err, GeoblockError::DownloadFailure(_)));
        assert!(store.saved.is_empty());
        assert_eq!(config.database.database_version_date, "Sep 01, 2026");
    }

    #[test]
    fn test_scrape_failure_aborts_before_asking() {
        let mut config = config_dated("Sep 01, 2026");
        config.database.database_version_file = "MISSING.ZIP".into();
        let refresher = CountingRefresher::default();
        let mut store = RecordingStore::default();
        let mut asked = false;
        let mut confirm = |_: &str| {
            asked = true;
            true
        };

        let err = reconcile(&mut config, &StaticPage(PAGE), &mut confirm, &refresher, &mut store)
            .unwrap_err();

        assert!(matches!(err, GeoblockError::ScrapeFailure { .. }));
        assert!(!asked);
        assert!(store.saved.is_empty());
    }

    #[test]
    fn test_force_refresh_records_published_date() {
        let mut config = config_dated("Oct 01, 2026");
        let refresher = CountingRefresher::default();
        let mut store = RecordingStore::default();

        force_refresh(&mut config, &StaticPage(PAGE), &refresher, &mut store).unwrap();

        assert_eq!(refresher.calls.get(), 1);
        assert_eq!(store.saved.len(), 1);
    }
}
