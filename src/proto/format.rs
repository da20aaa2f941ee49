//! Wire-format constants for V2Ray `geoip.dat` / `geosite.dat` files.
//!
//! Both files are protobuf messages:
//!
//! ```text
//! GeoIPList   { repeated GeoIP   entry  = 1; }
//! GeoIP       { string country_code = 1; repeated CIDR   cidr   = 2; }
//! CIDR        { bytes  ip = 1;          uint32 prefix = 2; }
//!
//! GeoSiteList { repeated GeoSite entry  = 1; }
//! GeoSite     { string country_code = 1; repeated Domain domain = 2; }
//! Domain      { Type   type = 1;        string value  = 2; }
//! ```

/// Protobuf wire types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    /// Base-128 varint
    Varint = 0,
    /// Little-endian 8 bytes
    Fixed64 = 1,
    /// Varint length followed by that many bytes
    LengthDelimited = 2,
    /// Deprecated group start
    StartGroup = 3,
    /// Deprecated group end
    EndGroup = 4,
    /// Little-endian 4 bytes
    Fixed32 = 5,
}

impl WireType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            3 => Some(Self::StartGroup),
            4 => Some(Self::EndGroup),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }
}

/// Build a single-byte field tag. Valid for field numbers 1..=15.
pub const fn field_tag(field_number: u8, wire_type: WireType) -> u8 {
    (field_number << 3) | wire_type as u8
}

/// `GeoIPList.entry` wrapper around an appended GeoIP category
pub const LIST_ENTRY_TAG: u8 = field_tag(1, WireType::LengthDelimited);

/// `GeoIP.country_code` / `GeoSite.country_code`
pub const CATEGORY_CODE_TAG: u8 = field_tag(1, WireType::LengthDelimited);

/// `GeoIP.cidr` / `GeoSite.domain`
pub const CATEGORY_RECORD_TAG: u8 = field_tag(2, WireType::LengthDelimited);

/// `CIDR.ip`
pub const CIDR_IP_TAG: u8 = field_tag(1, WireType::LengthDelimited);

/// `CIDR.prefix`
pub const CIDR_PREFIX_TAG: u8 = field_tag(2, WireType::Varint);

/// `Domain.type`
pub const DOMAIN_TYPE_TAG: u8 = field_tag(1, WireType::Varint);

/// `Domain.value`
pub const DOMAIN_VALUE_TAG: u8 = field_tag(2, WireType::LengthDelimited);

/// Field number of the category code inside a category entry.
pub const CATEGORY_CODE_FIELD: u32 = 1;

/// Field number of the repeated leaf record inside a category entry.
pub const CATEGORY_RECORD_FIELD: u32 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_constants() {
        assert_eq!(LIST_ENTRY_TAG, 0x0A);
        assert_eq!(CATEGORY_CODE_TAG, 0x0A);
        assert_eq!(CATEGORY_RECORD_TAG, 0x12);
        assert_eq!(CIDR_IP_TAG, 0x0A);
        assert_eq!(CIDR_PREFIX_TAG, 0x10);
        assert_eq!(DOMAIN_TYPE_TAG, 0x08);
        assert_eq!(DOMAIN_VALUE_TAG, 0x12);
    }

    #[test]
    fn test_wire_type_from_u8() {
        assert_eq!(WireType::from_u8(0), Some(WireType::Varint));
        assert_eq!(WireType::from_u8(2), Some(WireType::LengthDelimited));
        assert_eq!(WireType::from_u8(5), Some(WireType::Fixed32));
        assert_eq!(WireType::from_u8(6), None);
        assert_eq!(WireType::from_u8(7), None);
    }
}
