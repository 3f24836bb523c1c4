//! End-to-end wire layouts for the documented example values.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};

use wire_formatter::{deserialize, get_length, serialize_to_vec, Formattable};

#[derive(Debug, PartialEq, Formattable)]
struct Record {
    id: i32,
    name: String,
}

#[derive(Debug, PartialEq, Formattable)]
struct Holder {
    values: Option<Vec<i32>>,
}

#[test]
fn test_record_layout() {
    let record = Record {
        id: 123,
        name: String::from("测试"),
    };
    let bytes = serialize_to_vec(&record).unwrap();

    // INT32 code, big-endian 123
    assert_eq!(&bytes[..5], &[0xD2, 0x00, 0x00, 0x00, 0x7B]);
    // fixstr header for six UTF-8 bytes, then the bytes
    assert_eq!(bytes[5], 0xA6);
    assert_eq!(&bytes[6..], "测试".as_bytes());
    assert_eq!(bytes.len(), 12);
    assert_eq!(get_length(&record).unwrap(), 12);

    let decoded: Record = deserialize(&bytes).unwrap();
    assert_eq!(decoded, record);
}

#[test]
fn test_empty_and_missing_collections_are_distinct() {
    let empty = Holder {
        values: Some(Vec::new()),
    };
    let missing = Holder { values: None };

    let empty_bytes = serialize_to_vec(&empty).unwrap();
    let missing_bytes = serialize_to_vec(&missing).unwrap();
    assert_eq!(empty_bytes, vec![0x90]);
    assert_eq!(missing_bytes, vec![0xC0]);

    assert_eq!(deserialize::<Holder>(&empty_bytes).unwrap(), empty);
    assert_eq!(deserialize::<Holder>(&missing_bytes).unwrap(), missing);
}

#[test]
fn test_list_preserves_order() {
    let list: Vec<i32> = (1..=10).rev().collect();
    let bytes = serialize_to_vec(&list).unwrap();
    assert_eq!(bytes[0], 0x9A);
    assert_eq!(bytes.len(), 1 + 10 * 5);

    let decoded: Vec<i32> = deserialize(&bytes).unwrap();
    assert_eq!(decoded, list);
}

#[test]
fn test_nil_rejected_for_non_optional() {
    let err = deserialize::<Record>(&[0xC0]).unwrap_err();
    assert!(err.is_decode_fault());
    let err = deserialize::<Vec<i32>>(&[0xC0]).unwrap_err();
    assert!(err.is_decode_fault());
    assert_eq!(deserialize::<Option<Vec<i32>>>(&[0xC0]).unwrap(), None);
}

#[test]
fn test_long_headers() {
    let text = "x".repeat(40);
    let bytes = serialize_to_vec(&text).unwrap();
    assert_eq!(&bytes[..5], &[0xDB, 0, 0, 0, 40]);

    let list = vec![0u8; 300];
    let bytes = serialize_to_vec(&list).unwrap();
    assert_eq!(&bytes[..5], &[0xC6, 0, 0, 1, 44]);

    let map: BTreeMap<u8, bool> = (0..20).map(|i| (i, i % 2 == 0)).collect();
    let bytes = serialize_to_vec(&map).unwrap();
    assert_eq!(&bytes[..5], &[0xDF, 0, 0, 0, 20]);
    assert_eq!(deserialize::<BTreeMap<u8, bool>>(&bytes).unwrap(), map);
}

#[test]
fn test_small_byte_array_uses_bin8() {
    let bytes = serialize_to_vec(&vec![1u8, 2, 3]).unwrap();
    assert_eq!(bytes, vec![0xC4, 3, 1, 2, 3]);
}

#[test]
fn test_hash_map_round_trip() {
    let mut map = HashMap::new();
    map.insert(String::from("alpha"), vec![1i64, -2]);
    map.insert(String::from("beta"), Vec::new());
    let bytes = serialize_to_vec(&map).unwrap();
    assert_eq!(bytes[0], 0x82);
    assert_eq!(deserialize::<HashMap<String, Vec<i64>>>(&bytes).unwrap(), map);
}
