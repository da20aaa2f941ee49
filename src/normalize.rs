//! Validation of raw IP/CIDR and domain lines.
//!
//! Bad lines are expected in scraped sources, so nothing here returns a
//! crate [`Error`](crate::Error): every line either becomes a value or a
//! [`Rejection`] that the caller counts and logs.

use std::net::Ipv4Addr;

use crate::error::Rejection;
use crate::proto::{AddressRange, DomainPattern};

/// Prefix stripped from v2fly-style domain lines.
const DOMAIN_PREFIX: &str = "domain:";

/// Attribute marker stripped from the end of domain lines.
const ADS_ATTRIBUTE: &str = "@ads";

/// Accepted values in input order plus every rejected line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<Rejection>,
}

impl<T> Normalized<T> {
    pub fn new() -> Self {
        Self {
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `a.b.c.d` or `a.b.c.d/n` into an [`AddressRange`].
///
/// A missing prefix means `/32`.
pub fn normalize_ip(line: &str) -> Result<AddressRange, Rejection> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(Rejection::malformed(line, "empty line"));
    }

    let (addr_part, prefix_part) = match trimmed.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (trimmed, None),
    };

    let addr = parse_octets(addr_part).map_err(|msg| Rejection::malformed(line, msg))?;

    let prefix = match prefix_part {
        None => 32,
        Some(p) => parse_prefix(p).map_err(|msg| Rejection::malformed(line, msg))?,
    };

    AddressRange::new(addr, prefix).map_err(|e| Rejection::malformed(line, e.to_string()))
}

fn parse_octets(addr: &str) -> Result<Ipv4Addr, String> {
    let parts: Vec<&str> = addr.split('.').collect();
    if parts.len() != 4 {
        return Err(format!("expected 4 octets, found {}", parts.len()));
    }

    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid octet {:?}", part));
        }
        let value: u16 = part
            .parse()
            .map_err(|_| format!("invalid octet {:?}", part))?;
        if value > 255 {
            return Err(format!("octet {} out of range", value));
        }
        *slot = value as u8;
    }
    Ok(Ipv4Addr::from(octets))
}

fn parse_prefix(prefix: &str) -> Result<u8, String> {
    if prefix.is_empty() || prefix.len() > 2 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid prefix {:?}", prefix));
    }
    let value: u8 = prefix
        .parse()
        .map_err(|_| format!("invalid prefix {:?}", prefix))?;
    if value > 32 {
        return Err(format!("prefix /{} out of range", value));
    }
    Ok(value)
}

/// Canonicalize a domain line into a with-subdomains [`DomainPattern`].
///
/// Strips surrounding whitespace, a leading `domain:` marker and a trailing
/// `@ads` attribute. The remaining value must contain a dot and no whitespace.
pub fn normalize_domain(line: &str) -> Result<DomainPattern, Rejection> {
    let mut value = line.trim();
    if let Some(rest) = value.strip_prefix(DOMAIN_PREFIX) {
        value = rest.trim();
    }
    if let Some(rest) = value.strip_suffix(ADS_ATTRIBUTE) {
        value = rest.trim();
    }

    if value.is_empty() {
        return Err(Rejection::malformed(line, "empty domain"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Rejection::malformed(line, "domain contains whitespace"));
    }
    if !value.contains('.') {
        return Err(Rejection::malformed(line, "domain must contain at least one dot"));
    }

    Ok(DomainPattern::root_domain(value))
}

/// Normalize a batch of IP/CIDR lines, logging each rejection.
pub fn normalize_ips<I, S>(lines: I) -> Normalized<AddressRange>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    normalize_with(lines, normalize_ip)
}

/// Normalize a batch of domain lines, logging each rejection.
pub fn normalize_domains<I, S>(lines: I) -> Normalized<DomainPattern>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    normalize_with(lines, normalize_domain)
}

fn normalize_with<I, S, T, F>(lines: I, f: F) -> Normalized<T>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: Fn(&str) -> Result<T, Rejection>,
{
    let mut out = Normalized::new();
    for line in lines {
        match f(line.as_ref()) {
            Ok(value) => out.accepted.push(value),
            Err(rejection) => {
                log::warn!("Skipping {}", rejection);
                out.rejected.push(rejection);
            }
        }
    }
    out
}
