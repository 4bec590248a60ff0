//! Geolocation database streaming and country filtering.
//!
//! The IP2Location LITE DB1 database is a CSV file where each row maps a
//! closed interval of IPv4 addresses (stored as decimal integers) to a country:
//!
//! ```text
//! "16777216","16777471","US","United States of America"
//! ```
//!
//! ## Structure
//!
//! - [`GeoRecord`] is one parsed row
//! - [`GeoCsvReader`] streams rows from a file or any reader, one pass
//! - [`CountryFilter`] selects the rows of the wanted countries and reduces
//!   each one to CIDR blocks
//!
//! Nothing here buffers the whole database: a full DB1 file is a few hundred
//! thousand rows and only the matched ones are kept by the caller.

use std::fs::File;
use std::io::{self, Read};
use std::net::Ipv4Addr;
use std::path::Path;

use crate::cidr::{range_to_cidrs, total_size, CidrBlock};
use crate::country::CountryCode;
use crate::error::{GeoblockError, Result};

/// One database row: an address interval and the country it is attributed to.
///
/// The country is kept as the raw column text because the vendor uses `-` for
/// unassigned space.
///
/// Records only come from [`GeoRecord::new`] or the reader, so the interval is
/// never inverted:
///
/// ```compile_fail
/// use geoblock::GeoRecord;
///
/// let record = GeoRecord { range_start: 10, range_end: 2, country: "US".into() };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoRecord {
    range_start: u32,
    range_end: u32,
    country: String,
}

impl GeoRecord {
    /// Build a record, enforcing `range_start <= range_end`.
    pub fn new(range_start: u32, range_end: u32, country: impl Into<String>) -> Result<Self> {
        if range_start > range_end {
            return Err(GeoblockError::InvalidRange {
                start: Ipv4Addr::from(range_start),
                end: Ipv4Addr::from(range_end),
            });
        }
        Ok(GeoRecord {
            range_start,
            range_end,
            country: country.into(),
        })
    }

    /// Interval start as stored in the database.
    pub fn range_start(&self) -> u32 {
        self.range_start
    }

    /// Interval end (inclusive) as stored in the database.
    pub fn range_end(&self) -> u32 {
        self.range_end
    }

    /// Country column, `-` for unassigned space.
    pub fn country(&self) -> &str {
        &self.country
    }

    /// First address of the interval.
    pub fn start_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.range_start)
    }

    /// Last address of the interval.
    pub fn end_ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.range_end)
    }

    /// Number of addresses in the interval.
    pub fn address_count(&self) -> u64 {
        u64::from(self.range_end) - u64::from(self.range_start) + 1
    }

    fn from_csv(row: &csv::StringRecord, line: u64) -> Result<Self> {
        if row.len() < 3 {
            return Err(GeoblockError::MalformedRecord {
                line,
                reason: format!("expected at least 3 columns, found {}", row.len()),
            });
        }

        let number = |idx: usize| -> Result<u32> {
            let field = row[idx].trim();
            field.parse::<u32>().map_err(|_| GeoblockError::MalformedRecord {
                line,
                reason: format!("column {} is not an IPv4 number: '{}'", idx + 1, field),
            })
        };

        let start = number(0)?;
        let end = number(1)?;
        GeoRecord::new(start, end, row[2].trim()).map_err(|_| GeoblockError::MalformedRecord {
            line,
            reason: format!("range start {} is greater than range end {}", start, end),
        })
    }
}

/// Single-pass reader over the rows of a geolocation CSV file.
///
/// Yields `Result<GeoRecord>`; a malformed row yields an error and the caller
/// decides whether to stop.
pub struct GeoCsvReader<R> {
    rows: csv::StringRecordsIntoIter<R>,
}

impl GeoCsvReader<File> {
    /// Open a database file for streaming.
	///
	/// # Errors
	/// Returns [`GeoblockError::MissingDatabaseFile`] if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => Ok(Self::from_reader(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(GeoblockError::MissingDatabaseFile(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<R: Read> GeoCsvReader<R> {
    /// Stream records from any reader (header-less CSV, quoted fields allowed).
    pub fn from_reader(reader: R) -> Self {
        let rows = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader)
            .into_records();
        GeoCsvReader { rows }
    }
}

impl<R: Read> Iterator for GeoCsvReader<R> {
    type Item = Result<GeoRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(match row {
            Ok(row) => {
                let line = row.position().map(|p| p.line()).unwrap_or(0);
                GeoRecord::from_csv(&row, line)
            }
            Err(e) => Err(GeoblockError::MalformedRecord {
                line: e.position().map(|p| p.line()).unwrap_or(0),
                reason: e.to_string(),
            }),
        })
    }
}

/// A record of a wanted country together with its CIDR reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRecord {
    pub record: GeoRecord,
    pub blocks: Vec<CidrBlock>,
    /// Sum of the sizes of `blocks`; equals the record's address count.
    pub block_size: u64,
    /// Addresses matched so far, this record included.
    pub running_total: u64,
}

/// Lazy filter over a record stream; see [`filter_records`].
pub struct CountryFilter<'a, I> {
    records: I,
    wanted: &'a [CountryCode],
    running_total: u64,
}

impl<I> CountryFilter<'_, I> {
    /// Addresses matched so far.
    pub fn running_total(&self) -> u64 {
        self.running_total
    }
}

/// Select the records of `wanted` countries and reduce each one to CIDR blocks.
///
/// The input is consumed exactly once, in source order, as the returned
/// iterator is advanced. Input errors are passed through unchanged. Each match
/// is reported at `info` level.
///
/// # Examples
/// ```
/// use geoblock::{filter_records, CountryCode, GeoRecord};
///
/// let records = vec![
///     GeoRecord::new(167772160, 167772163, "US"),
///     GeoRecord::new(167772164, 167772167, "FR"),
/// ];
/// let wanted = [CountryCode::parse("us").unwrap()];
/// let matches: Vec<_> = filter_records(records, &wanted).collect::<Result<_, _>>().unwrap();
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].block_size, 4);
/// ```
pub fn filter_records<I>(records: I, wanted: &[CountryCode]) -> CountryFilter<'_, I::IntoIter>
where
    I: IntoIterator<Item = Result<GeoRecord>>,
{
    CountryFilter {
        records: records.into_iter(),
        wanted,
        running_total: 0,
    }
}

impl<I> Iterator for CountryFilter<'_, I>
where
    I: Iterator<Item = Result<GeoRecord>>,
{
    type Item = Result<MatchedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => return Some(Err(e)),
            };

            if !self.wanted.iter().any(|code| code.matches(&record.country)) {
                continue;
            }

            let blocks = match range_to_cidrs(record.start_ip(), record.end_ip()) {
                Ok(blocks) => blocks,
                Err(e) => return Some(Err(e)),
            };
            let block_size = total_size(&blocks);
            self.running_total += block_size;

            log::info!(
                "{} FROM {} TO {} CIDR {} SIZE {}",
                record.country,
                record.start_ip(),
                record.end_ip(),
                blocks
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
                block_size
            );

            return Some(Ok(MatchedRecord {
                record,
                blocks,
                block_size,
                running_total: self.running_total,
            }));
        }
    }
}
