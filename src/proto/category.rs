//! Category entries: one `GeoIP` or `GeoSite` message.

use super::format::*;
use super::record::{put_length_delimited, LeafRecord, RecordKind};
use crate::error::Rejection;
use crate::{Error, Result};

/// Encode a category entry from already-built record payloads.
///
/// Emits the code as field 1, then one field-2 instance per record in the
/// order given. The output depends only on the inputs.
pub fn encode_category<R: AsRef<[u8]>>(code: &str, records: &[R]) -> Vec<u8> {
    let payload_len: usize = records.iter().map(|r| r.as_ref().len() + 6).sum();
    let mut buf = Vec::with_capacity(code.len() + 6 + payload_len);

    put_length_delimited(CATEGORY_CODE_TAG, code.as_bytes(), &mut buf);
    for record in records {
        put_length_delimited(CATEGORY_RECORD_TAG, record.as_ref(), &mut buf);
    }
    buf
}

/// A named group of leaf records, all of the same kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    code: String,
    records: Vec<LeafRecord>,
}

/// Result of encoding a [`CategoryEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCategory {
    /// Category code
    pub code: String,
    /// Kind of record the category holds, `None` when it is empty
    pub kind: Option<RecordKind>,
    /// Serialized category message (not yet framed for the top level)
    pub bytes: Vec<u8>,
    /// Number of records that made it into `bytes`
    pub record_count: usize,
    /// Records skipped because they could not be encoded
    pub rejections: Vec<Rejection>,
}

impl CategoryEntry {
    /// Create an empty category.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            records: Vec::new(),
        }
    }

    /// Create a category from records, keeping their order.
    pub fn with_records<I, R>(code: impl Into<String>, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<LeafRecord>,
    {
        Self {
            code: code.into(),
            records: records.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a record.
    pub fn push(&mut self, record: impl Into<LeafRecord>) {
        self.records.push(record.into());
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn records(&self) -> &[LeafRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record kind held by this category.
    ///
    /// Returns `Ok(None)` for an empty category and
    /// [`Error::MixedRecordKinds`] if address and domain records are mixed.
    pub fn kind(&self) -> Result<Option<RecordKind>> {
        let mut kinds = self.records.iter().map(LeafRecord::kind);
        let first = match kinds.next() {
            Some(kind) => kind,
            None => return Ok(None),
        };
        if kinds.any(|k| k != first) {
            return Err(Error::MixedRecordKinds(self.code.clone()));
        }
        Ok(Some(first))
    }

    /// Encode every record and wrap them in a category message.
    ///
    /// Records that fail to encode are skipped and reported in
    /// [`EncodedCategory::rejections`].
    pub fn encode(&self) -> Result<EncodedCategory> {
        if self.code.trim().is_empty() {
            return Err(Error::InvalidCategoryCode(self.code.clone()));
        }
        let kind = self.kind()?;

        let mut encoded = Vec::with_capacity(self.records.len());
        let mut rejections = Vec::new();
        for record in &self.records {
            match record.encode() {
                Ok(bytes) => encoded.push(bytes),
                Err(e) => {
                    let rejection = Rejection::encoding(&record.to_string(), e.to_string());
                    log::warn!("{}: skipping record: {}", self.code, rejection);
                    rejections.push(rejection);
                }
            }
        }

        Ok(EncodedCategory {
            code: self.code.clone(),
            kind,
            bytes: encode_category(&self.code, &encoded),
            record_count: encoded.len(),
            rejections,
        })
    }
}
