//! Protobuf encoding for V2Ray routing databases.
//!
//! Only the forward direction is needed to extend a database: build leaf
//! records, wrap them in a category, frame the category for the top level and
//! append it to the original bytes.
//!
//! # Layering
//!
//! ```text
//! varint    7-bit groups with continuation bit
//!   record    CIDR { ip, prefix }          Domain { type, value }
//!     category  GeoIP / GeoSite { code, repeated record }
//!       merger    original ++ framed categories
//! ```
//!
//! [`reader`] walks fields back for verification and inspection.

mod category;
mod format;
mod merger;
pub mod reader;
mod record;
pub mod varint;

#[cfg(test)]
mod tests;

pub use category::{encode_category, CategoryEntry, EncodedCategory};
pub use format::*;
pub use merger::{merge, AppendMerger, CategoryStats, DatabaseKind, MergeOutput, TopLevelFraming};
pub use reader::{category_info, read_fields, CategoryInfo, Field, FieldReader, FieldValue};
pub use record::{
    build_address_record, build_domain_record, put_length_delimited, put_varint_field,
    AddressRange, DomainKind, DomainPattern, LeafRecord, RecordKind,
};
pub use varint::{decode_varint, encode_varint, put_varint, varint_len};
