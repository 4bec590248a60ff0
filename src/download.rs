//! HTTP access to the IP2Location LITE service.
//!
//! Two collaborators of the pipeline live here:
//!
//! - [`HttpVersionSource`] fetches the page listing the release date of every
//!   LITE database
//! - [`Ip2LocationDownloader`] downloads the zipped database with the user's
//!   token and extracts the CSV next to where the configuration expects it
//!
//! Both use blocking `reqwest`; the pipeline is strictly sequential.
//!
//! ## Failure handling
//!
//! When the token is invalid or the daily download limit is reached the
//! service answers with a short text message instead of an archive. That
//! message is reported in [`GeoblockError::BadArchive`] and the downloaded
//! file is removed, so no partial artifact is left behind.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::config::Config;
use crate::error::{GeoblockError, Result};
use crate::version::{DatabaseRefresher, VersionSource};

/// Page listing the LITE databases and their release dates.
pub const VERSION_PAGE_URL: &str = "https://download.ip2location.com/lite/";

/// Token-authenticated download endpoint.
pub const DOWNLOAD_URL: &str = "https://www.ip2location.com/download/";

/// Name of the downloaded archive, stored next to the database file.
pub const ARCHIVE_NAME: &str = "DATABASE.ZIP";

/// Longest server message kept in a [`GeoblockError::BadArchive`].
const MAX_DIAGNOSTIC_LEN: usize = 512;

fn http_error(e: reqwest::Error) -> GeoblockError {
    // The download URL carries the token; keep it out of messages.
    GeoblockError::DownloadFailure(e.without_url().to_string())
}

fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let resp = reqwest::blocking::get(url)
        .map_err(http_error)?
        .error_for_status()
        .map_err(http_error)?;

    let bytes = resp.bytes().map_err(http_error)?;
    Ok(bytes.to_vec())
}

/// Fetches the version page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVersionSource {
    url: String,
}

impl HttpVersionSource {
    pub fn new(url: impl Into<String>) -> Self {
        HttpVersionSource { url: url.into() }
    }
}

impl Default for HttpVersionSource {
    fn default() -> Self {
        Self::new(VERSION_PAGE_URL)
    }
}

impl VersionSource for HttpVersionSource {
    fn fetch_markup(&self) -> Result<String> {
        log::debug!("Fetching {}", self.url);
        let bytes = fetch_bytes(&self.url)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Downloads and unpacks the database archive.
#[derive(Debug, Clone)]
pub struct Ip2LocationDownloader {
    base_url: String,
}

impl Ip2LocationDownloader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Ip2LocationDownloader {
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, config: &Config) -> String {
        format!(
            "{}?token={}&file={}",
            self.base_url, config.database.token, config.database.database_code
        )
    }
}

impl Default for Ip2LocationDownloader {
    fn default() -> Self {
        Self::new(DOWNLOAD_URL)
    }
}

impl DatabaseRefresher for Ip2LocationDownloader {
    fn refresh(&self, config: &Config) -> Result<()> {
        if config.database.token.trim().is_empty() {
            return Err(GeoblockError::DownloadFailure(
                "You need to specify a download token found in your IP2Location profile \
                 https://lite.ip2location.com/file-download"
                    .to_string(),
            ));
        }

        let dest = &config.database.file;
        let member = dest
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                GeoblockError::Config(format!("database file has no name: {}", dest.display()))
            })?;
        let archive = archive_path(dest);

        log::info!("Beginning download of {}...", ARCHIVE_NAME);
        let bytes = download_to(&self.url_for(config), &archive)?;
        log::info!("Downloaded {} bytes, unzipping {}...", bytes, member);

        let extracted = extract_member(&archive, member, dest);

        log::debug!("Deleting {}", archive.display());
        if let Err(e) = fs::remove_file(&archive) {
            log::warn!("Could not delete {}: {}", archive.display(), e);
        }

        let written = extracted?;
        log::info!("Extracted {} bytes into {}", written, dest.display());
        Ok(())
    }
}

/// Where the archive for `database_file` is downloaded to.
pub fn archive_path(database_file: &Path) -> PathBuf {
    database_file.with_file_name(ARCHIVE_NAME)
}

/// Download `url` into `path`, replacing any existing file.
///
/// The download is written to a temporary file next to the destination and
/// then renamed into place. Returns the number of bytes written.
pub fn download_to(url: &str, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let bytes = fetch_bytes(url)?;

    let tmp_path = path.with_extension("part");
    let written = File::create(&tmp_path).and_then(|mut f| {
        f.write_all(&bytes)?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    if path.exists() {
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp_path, path)?;

    Ok(bytes.len() as u64)
}

/// Extract the entry `member` of the zip `archive` into `dest`.
///
/// # Errors
/// Returns [`GeoblockError::BadArchive`] if `archive` is not a zip file (with
/// the file's text as the message), does not contain `member`, or the member
/// fails to decompress. No partial file is left next to `dest`.
pub fn extract_member(archive: &Path, member: &str, dest: &Path) -> Result<u64> {
    let file = File::open(archive)?;
    let mut zip = match ZipArchive::new(file) {
        Ok(zip) => zip,
        Err(e) => {
            log::debug!("{} is not a zip archive: {}", archive.display(), e);
            return Err(GeoblockError::BadArchive {
                message: diagnostic_text(archive),
            });
        }
    };

    let mut entry = zip.by_name(member).map_err(|e| GeoblockError::BadArchive {
        message: format!("{} not found in archive: {}", member, e),
    })?;

    let tmp_path = dest.with_extension("tmp");
    let mut out = File::create(&tmp_path)?;
    let copied = io::copy(&mut entry, &mut out)
        .map_err(|e| GeoblockError::BadArchive {
            message: format!("{} could not be extracted: {}", member, e),
        })
        .and_then(|written| {
            out.sync_all()?;
            Ok(written)
        });
    drop(out);

    let written = match copied {
        Ok(written) => written,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
    };

    if dest.exists() {
        let _ = fs::remove_file(dest);
    }
    fs::rename(&tmp_path, dest)?;

    Ok(written)
}

fn diagnostic_text(path: &Path) -> String {
    let text = fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default();
    if text.is_empty() {
        return "(empty response)".to_string();
    }
    text.chars().take(MAX_DIAGNOSTIC_LEN).collect()
}
