//! Inclusive IP address ranges: single addresses, CIDR blocks and
//! explicit `first-last` ranges.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, RuleError};

use super::parsing::{Cursor, Parser};

lazy_static::lazy_static! {
    static ref IP_TOKEN: regex::Regex = regex::Regex::new(r"^[0-9A-Fa-f.:/\-]+").unwrap();
}

/// An inclusive range of addresses of one family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpRange {
    first: IpAddr,
    last: IpAddr,
}

impl IpRange {
    /// Builds the range `first..=last`. Both ends must be of the same
    /// family and in ascending order.
    pub fn new(first: IpAddr, last: IpAddr) -> Result<Self> {
        if first.is_ipv4() != last.is_ipv4() || first > last {
            return Err(RuleError::InvalidIp(format!("{}-{}", first, last)));
        }
        Ok(IpRange { first, last })
    }

    /// The network of `addr/len`. Host bits in `addr` are ignored.
    pub fn with_prefix(addr: IpAddr, len: u8) -> Result<Self> {
        let network = cidr::IpInet::new(addr, len)
            .map_err(|_| RuleError::InvalidIp(format!("{}/{}", addr, len)))?
            .network();
        Ok(network.into())
    }

    pub fn first(&self) -> IpAddr {
        self.first
    }

    pub fn last(&self) -> IpAddr {
        self.last
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        addr.is_ipv4() == self.first.is_ipv4() && self.first <= *addr && *addr <= self.last
    }

    /// Whether `other` lies wholly inside this range.
    pub fn contains_range(&self, other: &IpRange) -> bool {
        self.contains(&other.first) && self.contains(&other.last)
    }

    /// Tests a candidate string: an address must be inside the range, a
    /// range must be wholly contained in it.
    pub fn matches(&self, candidate: &str) -> bool {
        match IpAddr::from_str(candidate) {
            Ok(addr) => self.contains(&addr),
            Err(_) => IpRange::from_str(candidate)
                .map(|other| self.contains_range(&other))
                .unwrap_or(false),
        }
    }

    /// The prefix length when the range is exactly one CIDR block.
    fn prefix_len(&self) -> Option<u8> {
        let (first, last, bits) = match (self.first, self.last) {
            (IpAddr::V4(first), IpAddr::V4(last)) => {
                (u32::from(first) as u128, u32::from(last) as u128, 32)
            }
            (IpAddr::V6(first), IpAddr::V6(last)) => (u128::from(first), u128::from(last), 128),
            _ => return None,
        };
        let span = last - first;
        let aligned = span & span.wrapping_add(1) == 0 && first & span == 0;
        aligned.then(|| bits - span.count_ones() as u8)
    }

    /// Lexes an IP literal at the cursor. The literal must not run into
    /// further unquoted text, so `192.0.2.1x` is not an address.
    pub fn parser() -> Parser<IpRange> {
        Parser::new(|cursor: Cursor<'_>| {
            let token = IP_TOKEN.find(cursor.rest())?;
            let next = cursor.advance(token.end());
            let continues = next
                .rest()
                .chars()
                .next()
                .map_or(false, |c| !c.is_whitespace() && !"\\()\"*!=/".contains(c));
            if continues {
                return None;
            }
            let range = IpRange::from_str(token.as_str()).ok()?;
            Some((range, next))
        })
    }
}

impl From<IpAddr> for IpRange {
    fn from(addr: IpAddr) -> Self {
        IpRange {
            first: addr,
            last: addr,
        }
    }
}

impl From<cidr::IpCidr> for IpRange {
    fn from(network: cidr::IpCidr) -> Self {
        IpRange {
            first: network.first_address(),
            last: network.last_address(),
        }
    }
}

impl FromStr for IpRange {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RuleError::InvalidIp(s.to_string());

        if let Some((first, last)) = s.split_once('-') {
            let first = IpAddr::from_str(first).map_err(|_| invalid())?;
            let last = IpAddr::from_str(last).map_err(|_| invalid())?;
            return IpRange::new(first, last).map_err(|_| invalid());
        }

        if let Some((addr, len)) = s.split_once('/') {
            let addr = IpAddr::from_str(addr).map_err(|_| invalid())?;
            let len = len.parse::<u8>().map_err(|_| invalid())?;
            return IpRange::with_prefix(addr, len).map_err(|_| invalid());
        }

        IpAddr::from_str(s).map(IpRange::from).map_err(|_| invalid())
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            return write!(f, "{}", self.first);
        }
        match self.prefix_len() {
            Some(len) => write!(f, "{}/{}", self.first, len),
            None => write!(f, "{}-{}", self.first, self.last),
        }
    }
}

impl Serialize for IpRange {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

struct IpRangeVisitor;

impl de::Visitor<'_> for IpRangeVisitor {
    type Value = IpRange;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an IP address, a CIDR block or a first-last address range")
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        IpRange::from_str(value).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for IpRange {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(IpRangeVisitor)
    }
}
