//! geodat - extend V2Ray `geoip.dat` / `geosite.dat` with whitelist categories.
//!
//! Both databases are protobuf lists of categories. New categories are
//! encoded and appended after the last byte of the original file; the
//! existing entries are never decoded or rewritten, so any reader of the
//! original format sees every original category followed by the new ones.
//!
//! # Quick Start
//!
//! ```
//! use geodat::proto::{merge, CategoryEntry, DatabaseKind};
//! use geodat::normalize::normalize_ips;
//!
//! let ips = normalize_ips(["10.0.0.0/24", "999.1.1.1"]);
//! assert_eq!(ips.rejected.len(), 1);
//!
//! let entry = CategoryEntry::with_records("WHITELIST", ips.accepted);
//! let original: Vec<u8> = Vec::new();
//! let out = merge(DatabaseKind::GeoIp, &original, &[entry])?;
//! assert_eq!(out.bytes.len(), 23);
//! # Ok::<(), geodat::Error>(())
//! ```
//!
//! # Pipeline
//!
//! The [`pipeline`] module ties the pieces together the way the
//! `geodat-gen` binary runs them:
//!
//! 1. [`pipeline::fetch_databases`] downloads the original databases
//! 2. [`pipeline::collect_whitelist`] scrapes whitelist sources into list files
//! 3. [`pipeline::build_databases`] merges the lists and writes the outputs
//!
//! # Modules
//!
//! - [`proto`]: varint, record, category and merge encoding
//! - [`normalize`]: validation of raw IP/CIDR and domain lines
//! - [`converter`]: text sources and list files
//! - [`remote`]: GitHub releases, directory listings and raw files
//! - [`config`]: JSON run configuration

mod error;
mod metadata;

pub mod config;
pub mod converter;
pub mod normalize;
pub mod pipeline;
pub mod proto;
pub mod remote;

// Re-export core types
pub use error::{Error, RejectReason, Rejection, Result};

pub use config::Config;
pub use metadata::FetchMetadata;
pub use proto::{
    AddressRange, AppendMerger, CategoryEntry, DatabaseKind, DomainKind, DomainPattern,
    LeafRecord, MergeOutput, TopLevelFraming,
};
