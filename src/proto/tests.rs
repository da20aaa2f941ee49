//! Tests for the full encode → merge path.
//!
//! These check exact output bytes for small inputs and verify that merged
//! files still read back as a clean sequence of top-level fields.

use std::net::Ipv4Addr;

use super::*;

fn v4(a: u8, b: u8, c: u8, d: u8, prefix: u8) -> AddressRange {
    AddressRange::new(Ipv4Addr::new(a, b, c, d), prefix).unwrap()
}

/// A small geoip.dat-like blob with one wrapped entry per code.
fn geoip_original(codes: &[&str]) -> Vec<u8> {
    let entries: Vec<_> = codes
        .iter()
        .enumerate()
        .map(|(i, code)| CategoryEntry::with_records(*code, [v4(1, i as u8, 0, 0, 16)]))
        .collect();
    merge(DatabaseKind::GeoIp, &[], &entries).unwrap().bytes
}

/// A small geosite.dat-like blob; upstream files wrap every entry.
fn geosite_original(codes: &[&str]) -> Vec<u8> {
    let entries: Vec<_> = codes
        .iter()
        .map(|code| {
            CategoryEntry::with_records(
                *code,
                [DomainPattern::root_domain(format!("{}.example", code.to_lowercase()))],
            )
        })
        .collect();
    AppendMerger::new(DatabaseKind::GeoSite)
        .with_framing(TopLevelFraming::Wrapped)
        .merge(&[], &entries)
        .unwrap()
        .bytes
}

// ============================================================================
// Exact bytes
// ============================================================================

#[test]
fn test_geoip_whitelist_exact_bytes() {
    let entries = [CategoryEntry::with_records("WHITELIST", [v4(10, 0, 0, 0, 24)])];
    let out = merge(DatabaseKind::GeoIp, &[], &entries).unwrap();

    let mut expected = vec![0x0A, 0x15, 0x0A, 0x09];
    expected.extend_from_slice(b"WHITELIST");
    expected.extend_from_slice(&[0x12, 0x08, 0x0A, 0x04, 10, 0, 0, 0, 0x10, 0x18]);

    assert_eq!(out.bytes.len(), 23);
    assert_eq!(out.bytes, expected);
    assert_eq!(out.categories[0].bytes, 23);
    assert_eq!(out.categories[0].records, 1);
}

#[test]
fn test_bare_framing_exact_bytes() {
    let entries = [CategoryEntry::with_records("WHITELIST", [v4(10, 0, 0, 0, 24)])];
    let out = AppendMerger::new(DatabaseKind::GeoIp)
        .with_framing(TopLevelFraming::Bare)
        .merge(&[], &entries)
        .unwrap();

    let mut expected = vec![0x0A, 0x09];
    expected.extend_from_slice(b"WHITELIST");
    expected.extend_from_slice(&[0x12, 0x08, 0x0A, 0x04, 10, 0, 0, 0, 0x10, 0x18]);

    assert_eq!(out.bytes.len(), 21);
    assert_eq!(out.bytes, expected);
}

#[test]
fn test_geosite_domain_exact_bytes() {
    let entries = [CategoryEntry::with_records(
        "WHITELIST-RU",
        [DomainPattern::root_domain("example.com")],
    )];
    let out = merge(DatabaseKind::GeoSite, &[], &entries).unwrap();

    let mut expected = vec![0x0A, 0x0C];
    expected.extend_from_slice(b"WHITELIST-RU");
    expected.extend_from_slice(&[0x12, 0x0F, 0x08, 0x02, 0x12, 0x0B]);
    expected.extend_from_slice(b"example.com");

    assert_eq!(out.bytes.len(), 31);
    assert_eq!(out.bytes, expected);
}

#[test]
fn test_geosite_wrapped_exact_bytes() {
    let entries = [CategoryEntry::with_records(
        "WHITELIST-RU",
        [DomainPattern::root_domain("example.com")],
    )];
    let out = AppendMerger::new(DatabaseKind::GeoSite)
        .with_framing(TopLevelFraming::Wrapped)
        .merge(&[], &entries)
        .unwrap();

    assert_eq!(out.bytes.len(), 33);
    assert_eq!(&out.bytes[..2], &[0x0A, 0x1F]);
}

// ============================================================================
// Append invariant
// ============================================================================

#[test]
fn test_geoip_append_preserves_original_entries() {
    let original = geoip_original(&["CN", "RU", "US"]);
    let original_fields = read_fields(&original).unwrap();
    assert_eq!(original_fields.len(), 3);

    let new = [
        CategoryEntry::with_records("WHITELIST", [v4(10, 0, 0, 0, 8), v4(192, 168, 0, 1, 32)]),
        CategoryEntry::with_records("EXTRA", [v4(172, 16, 0, 0, 12)]),
    ];
    let out = merge(DatabaseKind::GeoIp, &original, &new).unwrap();
    let fields = read_fields(&out.bytes).unwrap();

    assert_eq!(fields.len(), 5);
    for (before, after) in original_fields.iter().zip(&fields) {
        assert_eq!(before.raw, after.raw);
        assert_eq!(before.offset, after.offset);
    }

    let codes: Vec<_> = fields
        .iter()
        .map(|f| category_info(f.bytes().unwrap()).unwrap().code.unwrap())
        .collect();
    assert_eq!(codes, vec!["CN", "RU", "US", "WHITELIST", "EXTRA"]);

    let whitelist = category_info(fields[3].bytes().unwrap()).unwrap();
    assert_eq!(whitelist.records, 2);
}

#[test]
fn test_geosite_bare_append_layout() {
    let original = geosite_original(&["GOOGLE", "YANDEX"]);
    let new = [
        CategoryEntry::with_records(
            "WHITELIST-RU",
            [
                DomainPattern::root_domain("gosuslugi.ru"),
                DomainPattern::root_domain("ya.ru"),
            ],
        ),
        CategoryEntry::with_records("WHITELIST-ADS", [DomainPattern::root_domain("ads.vk.com")]),
    ];
    let out = merge(DatabaseKind::GeoSite, &original, &new).unwrap();

    assert_eq!(&out.bytes[..original.len()], &original[..]);

    // Original entries read back untouched.
    let fields = read_fields(&out.bytes).unwrap();
    let original_fields = read_fields(&original).unwrap();
    for (before, after) in original_fields.iter().zip(&fields) {
        assert_eq!(before.raw, after.raw);
    }

    // Bare framing: each category contributes its code field and one field
    // per record, in order.
    let tail: Vec<_> = FieldReader::at(&out.bytes, original.len())
        .collect::<crate::Result<_>>()
        .unwrap();
    let numbers: Vec<_> = tail.iter().map(|f| f.number).collect();
    assert_eq!(numbers, vec![1, 2, 2, 1, 2]);
    assert_eq!(tail[0].bytes(), Some(&b"WHITELIST-RU"[..]));
    assert_eq!(tail[3].bytes(), Some(&b"WHITELIST-ADS"[..]));
    assert_eq!(fields.len(), original_fields.len() + tail.len());
}

#[test]
fn test_geosite_wrapped_override_yields_one_instance_per_category() {
    let original = geosite_original(&["GOOGLE"]);
    let new = [
        CategoryEntry::with_records("A", [DomainPattern::root_domain("a.example")]),
        CategoryEntry::with_records("B", [DomainPattern::root_domain("b.example")]),
    ];
    let out = AppendMerger::new(DatabaseKind::GeoSite)
        .with_framing(TopLevelFraming::Wrapped)
        .merge(&original, &new)
        .unwrap();

    let fields = read_fields(&out.bytes).unwrap();
    assert_eq!(fields.len(), 3);
    assert!(fields.iter().all(|f| f.number == 1));
    let last = category_info(fields[2].bytes().unwrap()).unwrap();
    assert_eq!(last.code.as_deref(), Some("B"));
}

#[test]
fn test_append_onto_opaque_bytes() {
    // The merger never looks at the original, even when it is not protobuf.
    let original = b"\xff\xfe not protobuf".to_vec();
    let entries = [CategoryEntry::with_records("WHITELIST", [v4(1, 1, 1, 1, 32)])];
    let out = merge(DatabaseKind::GeoIp, &original, &entries).unwrap();

    assert!(out.bytes.starts_with(&original));
    let tail = read_fields(out.appended()).unwrap();
    assert_eq!(tail.len(), 1);
}

#[test]
fn test_large_category_multibyte_lengths() {
    let entry = CategoryEntry::with_records(
        "WHITELIST",
        (0..2000u32).map(|i| {
            let [_, _, c, d] = i.to_be_bytes();
            v4(10, 1, c, d, 32)
        }),
    );
    let out = merge(DatabaseKind::GeoIp, &[], &[entry]).unwrap();

    let fields = read_fields(&out.bytes).unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].raw.len(), out.bytes.len());

    let info = category_info(fields[0].bytes().unwrap()).unwrap();
    assert_eq!(info.records, 2000);

    // 11 bytes of code + 2000 * 10 bytes of records
    let (len, start) = decode_varint(&out.bytes, 1).unwrap();
    assert_eq!(len, 11 + 2000 * 10);
    assert_eq!(start, 4);
}

// ============================================================================
// Determinism and ordering
// ============================================================================

#[test]
fn test_merge_is_deterministic() {
    let original = geoip_original(&["CN"]);
    let entries = [CategoryEntry::with_records(
        "WHITELIST",
        [v4(5, 6, 7, 8, 32), v4(1, 2, 3, 0, 24)],
    )];

    let a = merge(DatabaseKind::GeoIp, &original, &entries).unwrap();
    let b = merge(DatabaseKind::GeoIp, &original, &entries).unwrap();
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn test_record_order_is_preserved() {
    let entry = CategoryEntry::with_records(
        "ORDER",
        [
            DomainPattern::root_domain("z.example"),
            DomainPattern::root_domain("a.example"),
            DomainPattern::root_domain("m.example"),
        ],
    );
    let out = merge(DatabaseKind::GeoSite, &[], &[entry]).unwrap();

    let values: Vec<_> = read_fields(&out.bytes)
        .unwrap()
        .into_iter()
        .filter(|f| f.number == CATEGORY_RECORD_FIELD)
        .map(|f| {
            let domain = read_fields(f.bytes().unwrap()).unwrap();
            String::from_utf8(domain[1].bytes().unwrap().to_vec()).unwrap()
        })
        .collect();
    assert_eq!(values, vec!["z.example", "a.example", "m.example"]);
}

#[test]
fn test_rejections_collected_across_categories() {
    let entries = [
        CategoryEntry::with_records(
            "A",
            [DomainPattern::root_domain(""), DomainPattern::root_domain("a.ru")],
        ),
        CategoryEntry::with_records("B", [DomainPattern::new(DomainKind::Full, "")]),
    ];
    let out = merge(DatabaseKind::GeoSite, &[], &entries).unwrap();
    assert_eq!(out.rejections.len(), 2);
    assert_eq!(out.categories[0].records, 1);
    assert_eq!(out.categories[1].records, 0);
}
