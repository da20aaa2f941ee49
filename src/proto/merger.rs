//! Append new categories to an existing database blob.
//!
//! A protobuf message is a flat sequence of fields, and repeated fields may
//! appear any number of times. Appending more `entry` instances after the last
//! byte of an existing list therefore extends the list without touching any
//! prior bytes.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::category::CategoryEntry;
use super::format::LIST_ENTRY_TAG;
use super::record::{put_length_delimited, RecordKind};
use crate::error::Rejection;
use crate::{Error, Result};

/// How an encoded category is placed at the top level of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopLevelFraming {
    /// `0x0A varint(len) category`, one `entry` instance
    Wrapped,
    /// Category fields appended as they are
    Bare,
}

impl TopLevelFraming {
    /// Append `category` to `buf` using this framing.
    pub fn frame(&self, category: &[u8], buf: &mut Vec<u8>) {
        match self {
            TopLevelFraming::Wrapped => put_length_delimited(LIST_ENTRY_TAG, category, buf),
            TopLevelFraming::Bare => buf.extend_from_slice(category),
        }
    }
}

/// The two database files this crate extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseKind {
    /// `geoip.dat`: categories of address ranges
    GeoIp,
    /// `geosite.dat`: categories of domain patterns
    GeoSite,
}

impl DatabaseKind {
    pub fn name(&self) -> &'static str {
        match self {
            DatabaseKind::GeoIp => "geoip",
            DatabaseKind::GeoSite => "geosite",
        }
    }

    /// Conventional file name of the database.
    pub fn file_name(&self) -> &'static str {
        match self {
            DatabaseKind::GeoIp => "geoip.dat",
            DatabaseKind::GeoSite => "geosite.dat",
        }
    }

    /// Record kind every appended category must hold.
    pub fn record_kind(&self) -> RecordKind {
        match self {
            DatabaseKind::GeoIp => RecordKind::Address,
            DatabaseKind::GeoSite => RecordKind::Domain,
        }
    }

    /// Framing used by the existing release pipeline for this database.
    pub fn default_framing(&self) -> TopLevelFraming {
        match self {
            DatabaseKind::GeoIp => TopLevelFraming::Wrapped,
            DatabaseKind::GeoSite => TopLevelFraming::Bare,
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-category statistics for one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryStats {
    /// Category code
    pub code: String,
    /// Records written
    pub records: usize,
    /// Bytes appended for this category, framing included
    pub bytes: usize,
}

/// Output of [`AppendMerger::merge`].
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Original bytes followed by every framed category
    pub bytes: Vec<u8>,
    /// Size of the original blob
    pub original_len: usize,
    /// Statistics in the order categories were appended
    pub categories: Vec<CategoryStats>,
    /// Records skipped while encoding
    pub rejections: Vec<Rejection>,
}

impl MergeOutput {
    /// Bytes added on top of the original.
    pub fn appended_len(&self) -> usize {
        self.bytes.len() - self.original_len
    }

    /// The appended tail alone.
    pub fn appended(&self) -> &[u8] {
        &self.bytes[self.original_len..]
    }
}

/// Appends categories to a database of one kind.
#[derive(Debug, Clone, Copy)]
pub struct AppendMerger {
    kind: DatabaseKind,
    framing: TopLevelFraming,
}

impl AppendMerger {
    /// Create a merger using the default framing for `kind`.
    pub fn new(kind: DatabaseKind) -> Self {
        Self {
            kind,
            framing: kind.default_framing(),
        }
    }

    /// Override the top-level framing.
    pub fn with_framing(mut self, framing: TopLevelFraming) -> Self {
        self.framing = framing;
        self
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub fn framing(&self) -> TopLevelFraming {
        self.framing
    }

    /// Return `original` followed by every entry, encoded and framed, in order.
    ///
    /// `original` is copied verbatim and never inspected. All entries are
    /// encoded before anything is returned, so a failing entry yields no
    /// output at all.
    pub fn merge(&self, original: &[u8], entries: &[CategoryEntry]) -> Result<MergeOutput> {
        let mut encoded = Vec::with_capacity(entries.len());
        for entry in entries {
            let category = entry.encode()?;
            if let Some(found) = category.kind {
                let expected = self.kind.record_kind();
                if found != expected {
                    return Err(Error::RecordKindMismatch {
                        code: category.code,
                        database: self.kind.name(),
                        expected: expected.name(),
                        found: found.name(),
                    });
                }
            }
            encoded.push(category);
        }

        let extra: usize = encoded.iter().map(|c| c.bytes.len() + 11).sum();
        let mut bytes = Vec::with_capacity(original.len() + extra);
        bytes.extend_from_slice(original);

        let mut categories = Vec::with_capacity(encoded.len());
        let mut rejections = Vec::new();
        for category in encoded {
            let start = bytes.len();
            self.framing.frame(&category.bytes, &mut bytes);
            log::debug!(
                "{}: appended {} ({} records, {} bytes)",
                self.kind,
                category.code,
                category.record_count,
                bytes.len() - start
            );
            categories.push(CategoryStats {
                code: category.code,
                records: category.record_count,
                bytes: bytes.len() - start,
            });
            rejections.extend(category.rejections);
        }

        Ok(MergeOutput {
            bytes,
            original_len: original.len(),
            categories,
            rejections,
        })
    }
}

/// Merge `entries` into `original` with the default framing for `kind`.
pub fn merge(kind: DatabaseKind, original: &[u8], entries: &[CategoryEntry]) -> Result<MergeOutput> {
    AppendMerger::new(kind).merge(original, entries)
}
