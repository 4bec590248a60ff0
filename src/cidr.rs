//! IPv4 interval to CIDR reduction.
//!
//! Geolocation databases describe address space as closed intervals
//! `[start, end]`, while `ipset` (and most firewalls) want CIDR blocks. This
//! module converts one into the other.
//!
//! ## Algorithm
//!
//! Starting at the low bound, take the largest block that
//!
//! - is aligned on the current address (its host bits are zero), and
//! - does not extend past the end of the interval,
//!
//! emit it, advance past it, and repeat. The result is the minimal ordered
//! list of blocks covering exactly the interval.
//!
//! All arithmetic is done in `u64` so that the full IPv4 space (`/0`, 2^32
//! addresses) and intervals ending at `255.255.255.255` need no special case.
//! Blocks are `ipnet` networks wrapped in [`CidrBlock`].

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;

use crate::error::{GeoblockError, Result};

/// An [`Ipv4Net`] whose base address has no host bits set.
///
/// `ipnet` happily stores `10.0.0.1/30`; a block handed to `ipset` must be the
/// network itself, so [`CidrBlock::new`] and parsing reject such values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CidrBlock(Ipv4Net);

impl CidrBlock {
    /// Build a block, rejecting prefixes above 32 and misaligned base addresses.
    ///
    /// # Examples
    /// ```
    /// use geoblock::CidrBlock;
    /// use std::net::Ipv4Addr;
    ///
    /// let block = CidrBlock::new(Ipv4Addr::new(10, 0, 0, 0), 30).unwrap();
    /// assert_eq!(block.size(), 4);
    /// assert!(CidrBlock::new(Ipv4Addr::new(10, 0, 0, 1), 30).is_err());
    /// ```
    pub fn new(network: Ipv4Addr, prefix: u8) -> Result<Self> {
        let net = Ipv4Net::new(network, prefix)
            .map_err(|_| GeoblockError::InvalidCidr(format!("{}/{}", network, prefix)))?;
        Self::from_net(net)
    }

    fn from_net(net: Ipv4Net) -> Result<Self> {
        if net.trunc() != net {
            return Err(GeoblockError::InvalidCidr(format!("{} has host bits set", net)));
        }
        Ok(CidrBlock(net))
    }

    /// Base (first) address of the block.
    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// Prefix length, `0..=32`.
    pub fn prefix(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Number of addresses covered, `2^(32 - prefix)`.
    #[inline]
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix()))
    }

    /// First address covered (same as [`CidrBlock::network`]).
    pub fn first(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// Last address covered.
    pub fn last(&self) -> Ipv4Addr {
        self.0.broadcast()
    }

    /// Return `true` if `ip` falls inside this block.
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        self.0.contains(&ip)
    }

    /// The underlying network.
    pub fn as_net(&self) -> &Ipv4Net {
        &self.0
    }
}

impl From<CidrBlock> for Ipv4Net {
    fn from(block: CidrBlock) -> Self {
        block.0
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for CidrBlock {
    type Err = GeoblockError;

    fn from_str(s: &str) -> Result<Self> {
        let net = s
            .trim()
            .parse::<Ipv4Net>()
            .map_err(|_| GeoblockError::InvalidCidr(s.to_string()))?;
        Self::from_net(net)
    }
}

/// Parse a dotted-decimal IPv4 address.
pub fn parse_ipv4(s: &str) -> Result<Ipv4Addr> {
    s.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| GeoblockError::InvalidAddress(s.to_string()))
}

/// Convert the closed interval `[start, end]` into the minimal list of CIDR blocks.
///
/// Blocks are returned in ascending address order, are pairwise disjoint, and
/// their union is exactly the interval.
///
/// # Errors
/// Returns [`GeoblockError::InvalidRange`] if `start > end`.
///
/// # Examples
/// ```
/// use geoblock::range_to_cidrs;
/// use std::net::Ipv4Addr;
///
/// let blocks = range_to_cidrs(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 3)).unwrap();
/// let shown: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
/// assert_eq!(shown, ["10.0.0.1/32", "10.0.0.2/31"]);
/// ```
pub fn range_to_cidrs(start: Ipv4Addr, end: Ipv4Addr) -> Result<Vec<CidrBlock>> {
    if start > end {
        return Err(GeoblockError::InvalidRange { start, end });
    }

    let mut blocks = Vec::new();
    let mut current = u64::from(u32::from(start));
    let end = u64::from(u32::from(end));

    while current <= end {
        // Largest block aligned on `current` (0 is aligned on everything).
        let align_bits = current.trailing_zeros().min(32);
        // Largest power of two that still fits in what is left.
        let remaining = end - current + 1;
        let fit_bits = 63 - remaining.leading_zeros();

        let host_bits = align_bits.min(fit_bits);
        let net = Ipv4Net::new(Ipv4Addr::from(current as u32), (32 - host_bits) as u8)
            .map_err(|e| GeoblockError::InvalidCidr(e.to_string()))?;
        blocks.push(CidrBlock(net));
        current += 1u64 << host_bits;
    }

    Ok(blocks)
}

/// Same as [`range_to_cidrs`], for dotted-decimal strings.
///
/// # Errors
/// Returns [`GeoblockError::InvalidAddress`] if either bound does not parse,
/// and [`GeoblockError::InvalidRange`] if `start > end`.
pub fn reduce(start: &str, end: &str) -> Result<Vec<CidrBlock>> {
    range_to_cidrs(parse_ipv4(start)?, parse_ipv4(end)?)
}

/// Total number of addresses covered by `blocks`.
pub fn total_size(blocks: &[CidrBlock]) -> u64 {
    blocks.iter().map(CidrBlock::size).sum()
}
