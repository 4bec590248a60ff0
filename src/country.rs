//! ISO-3166 alpha-2 country codes as typed on the command line.

use std::fmt;
use std::str::FromStr;

use crate::error::{GeoblockError, Result};

/// A validated two-letter country code, stored upper-case as two ASCII bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    /// Validate and upper-case a country code.
	///
	/// # Errors
	/// Returns [`GeoblockError::InvalidCountryCode`] unless `code` is exactly two
	/// ASCII letters.
    pub fn parse(code: &str) -> Result<Self> {
        match code.as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Ok(CountryCode([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => Err(GeoblockError::InvalidCountryCode(code.to_string())),
        }
    }

    /// The code as a string slice, e.g. `"DE"`.
    pub fn as_str(&self) -> &str {
        // Only ASCII letters get past `parse`.
        std::str::from_utf8(&self.0).unwrap_or("??")
    }

    /// Return `true` if a raw database country column refers to this country.
    #[inline]
    pub fn matches(&self, column: &str) -> bool {
        column.as_bytes() == self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = GeoblockError;

    fn from_str(s: &str) -> Result<Self> {
        CountryCode::parse(s)
    }
}

/// Parse a comma-separated list such as `"us,fr,DE"`.
///
/// Every entry must be a valid code; the whole list is rejected otherwise.
/// Duplicates are dropped, keeping the first occurrence.
pub fn parse_country_list(list: &str) -> Result<Vec<CountryCode>> {
    let mut codes: Vec<CountryCode> = Vec::new();
    for entry in list.split(',') {
        let code = CountryCode::parse(entry)?;
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    Ok(codes)
}
