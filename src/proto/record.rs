//! Leaf records: `CIDR` and `Domain` messages.

use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use super::format::*;
use super::varint::{put_varint, varint_len};
use crate::{Error, Result};

/// An IPv4 address plus prefix length, encoded as a `CIDR` message.
///
/// The address is kept exactly as written; host bits are not masked off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRange {
    net: Ipv4Net,
}

impl AddressRange {
    /// Create a range, failing if `prefix` is greater than 32.
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        let net = Ipv4Net::new(addr, prefix)
            .map_err(|_| Error::EncodingFailure(format!("prefix /{} exceeds 32", prefix)))?;
        Ok(Self { net })
    }

    /// A single host (`/32`).
    pub fn host(addr: Ipv4Addr) -> Self {
        Self {
            net: Ipv4Net::from(addr),
        }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.net.addr()
    }

    pub fn prefix(&self) -> u8 {
        self.net.prefix_len()
    }

    pub fn octets(&self) -> [u8; 4] {
        self.net.addr().octets()
    }

    pub fn as_net(&self) -> Ipv4Net {
        self.net
    }
}

impl From<Ipv4Net> for AddressRange {
    fn from(net: Ipv4Net) -> Self {
        Self { net }
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.net.addr(), self.net.prefix_len())
    }
}

/// `Domain.Type` values understood by V2Ray routers.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainKind {
    /// Substring match
    Plain = 0,
    /// Regular expression match
    Regex = 1,
    /// Domain and all of its subdomains
    RootDomain = 2,
    /// Exact match
    Full = 3,
}

impl DomainKind {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Plain),
            1 => Some(Self::Regex),
            2 => Some(Self::RootDomain),
            3 => Some(Self::Full),
            _ => None,
        }
    }
}

/// A domain matching rule, encoded as a `Domain` message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainPattern {
    kind: DomainKind,
    value: String,
}

impl DomainPattern {
    pub fn new(kind: DomainKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    /// Match `value` and every subdomain of it.
    pub fn root_domain(value: impl Into<String>) -> Self {
        Self::new(DomainKind::RootDomain, value)
    }

    pub fn kind(&self) -> DomainKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for DomainPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DomainKind::Plain => write!(f, "keyword:{}", self.value),
            DomainKind::Regex => write!(f, "regexp:{}", self.value),
            DomainKind::RootDomain => write!(f, "domain:{}", self.value),
            DomainKind::Full => write!(f, "full:{}", self.value),
        }
    }
}

/// Which of the two leaf record kinds a category holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Address,
    Domain,
}

impl RecordKind {
    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Address => "address",
            RecordKind::Domain => "domain",
        }
    }
}

/// A leaf record of either database kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LeafRecord {
    Address(AddressRange),
    Domain(DomainPattern),
}

impl LeafRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            LeafRecord::Address(_) => RecordKind::Address,
            LeafRecord::Domain(_) => RecordKind::Domain,
        }
    }

    /// Encode the record payload (without the enclosing field tag).
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            LeafRecord::Address(range) => Ok(build_address_record(range)),
            LeafRecord::Domain(pattern) => build_domain_record(pattern),
        }
    }
}

impl From<AddressRange> for LeafRecord {
    fn from(range: AddressRange) -> Self {
        LeafRecord::Address(range)
    }
}

impl From<DomainPattern> for LeafRecord {
    fn from(pattern: DomainPattern) -> Self {
        LeafRecord::Domain(pattern)
    }
}

impl fmt::Display for LeafRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafRecord::Address(range) => fmt::Display::fmt(range, f),
            LeafRecord::Domain(pattern) => fmt::Display::fmt(pattern, f),
        }
    }
}

/// Append `tag`, the varint length of `payload`, then `payload`.
#[inline]
pub fn put_length_delimited(tag: u8, payload: &[u8], buf: &mut Vec<u8>) {
    buf.push(tag);
    put_varint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

/// Append `tag` followed by the varint `value`.
#[inline]
pub fn put_varint_field(tag: u8, value: u64, buf: &mut Vec<u8>) {
    buf.push(tag);
    put_varint(value, buf);
}

/// Size of a length-delimited field carrying `payload_len` bytes.
#[inline]
pub fn length_delimited_len(payload_len: usize) -> usize {
    1 + varint_len(payload_len as u64) + payload_len
}

/// Encode a `CIDR` message: `0x0A len ip-bytes 0x10 prefix`.
pub fn build_address_record(range: &AddressRange) -> Vec<u8> {
    let octets = range.octets();
    let mut buf = Vec::with_capacity(length_delimited_len(octets.len()) + 2);
    put_length_delimited(CIDR_IP_TAG, &octets, &mut buf);
    put_varint_field(CIDR_PREFIX_TAG, range.prefix() as u64, &mut buf);
    buf
}

/// Encode a `Domain` message: `0x08 type 0x12 len value`.
pub fn build_domain_record(pattern: &DomainPattern) -> Result<Vec<u8>> {
    let value = pattern.value().as_bytes();
    if value.is_empty() {
        return Err(Error::EncodingFailure("empty domain value".to_string()));
    }

    let mut buf = Vec::with_capacity(2 + length_delimited_len(value.len()));
    put_varint_field(DOMAIN_TYPE_TAG, pattern.kind().as_u8() as u64, &mut buf);
    put_length_delimited(DOMAIN_VALUE_TAG, value, &mut buf);
    Ok(buf)
}
