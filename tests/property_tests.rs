//! Property-based tests using proptest
//!
//! These tests check formatter invariants across randomly generated values,
//! segment sizes and corrupted inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashSet};

use proptest::prelude::*;
use wire_formatter::buffer::{BlockPool, SequenceBuffer, SequenceBufferPool};
use wire_formatter::{
    deserialize, get_length, serialize_to_vec, ByteBuffer, Formattable, Formatter, Resolver,
    SequenceReader,
};

#[derive(Debug, Clone, PartialEq, Formattable)]
struct Sample {
    id: i64,
    flag: bool,
    name: String,
    scores: Vec<u16>,
    blob: Vec<u8>,
    tags: Option<BTreeMap<String, i32>>,
    ratio: f64,
}

fn sample_strategy() -> impl Strategy<Value = Sample> {
    (
        any::<i64>(),
        any::<bool>(),
        ".{0,40}",
        prop::collection::vec(any::<u16>(), 0..40),
        prop::collection::vec(any::<u8>(), 0..400),
        prop::option::of(prop::collection::btree_map(".{0,8}", any::<i32>(), 0..20)),
        -1.0e12f64..1.0e12,
    )
        .prop_map(|(id, flag, name, scores, blob, tags, ratio)| Sample {
            id,
            flag,
            name,
            scores,
            blob,
            tags,
            ratio,
        })
}

// Property: any value reads back equal to what was written
proptest! {
    #[test]
    fn prop_sample_roundtrip(sample in sample_strategy()) {
        let bytes = serialize_to_vec(&sample).expect("serialize should not fail");
        let decoded: Sample = deserialize(&bytes).expect("deserialize should not fail");
        prop_assert_eq!(decoded, sample);
    }
}

// Property: get_length is never below the encoded size
proptest! {
    #[test]
    fn prop_length_is_upper_bound(sample in sample_strategy()) {
        let bytes = serialize_to_vec(&sample).unwrap();
        prop_assert!(get_length(&sample).unwrap() >= bytes.len() as u64);
    }
}

// Property: fixed-width scalars report their exact size
proptest! {
    #[test]
    fn prop_scalar_length_exact(a in any::<u64>(), b in any::<i32>(), c in any::<u8>(), d in any::<i8>()) {
        prop_assert_eq!(get_length(&a).unwrap(), serialize_to_vec(&a).unwrap().len() as u64);
        prop_assert_eq!(get_length(&b).unwrap(), serialize_to_vec(&b).unwrap().len() as u64);
        prop_assert_eq!(get_length(&c).unwrap(), serialize_to_vec(&c).unwrap().len() as u64);
        prop_assert_eq!(get_length(&d).unwrap(), serialize_to_vec(&d).unwrap().len() as u64);
    }
}

// Property: strings round trip, including multi-byte text
proptest! {
    #[test]
    fn prop_string_roundtrip(text in "\\PC{0,200}") {
        let bytes = serialize_to_vec(&text).unwrap();
        prop_assert_eq!(get_length(&text).unwrap(), bytes.len() as u64);
        let decoded: String = deserialize(&bytes).unwrap();
        prop_assert_eq!(decoded, text);
    }
}

// Property: serialization is deterministic
proptest! {
    #[test]
    fn prop_serialization_deterministic(values in prop::collection::vec(any::<i32>(), 0..100)) {
        let first = serialize_to_vec(&values).unwrap();
        let second = serialize_to_vec(&values).unwrap();
        prop_assert_eq!(first, second);
    }
}

// Property: set decoding keeps every distinct element
proptest! {
    #[test]
    fn prop_set_roundtrip(values in prop::collection::hash_set(any::<u32>(), 0..64)) {
        let bytes = serialize_to_vec(&values).unwrap();
        let decoded: HashSet<u32> = deserialize(&bytes).unwrap();
        prop_assert_eq!(decoded, values);
    }
}

// Property: segment size never changes the bytes or the decoded value
proptest! {
    #[test]
    fn prop_segment_size_invariant(sample in sample_strategy(), block in 1usize..64) {
        let formatter = Resolver::global().get_formatter::<Sample>().unwrap();
        let pool = SequenceBufferPool::new(BlockPool::fixed(block, 16), 2);

        let mut buffer = ByteBuffer::new(&pool, 1);
        formatter.serialize(&mut buffer, &sample).unwrap();
        prop_assert_eq!(buffer.to_vec().unwrap(), serialize_to_vec(&sample).unwrap());

        let mut reader = buffer.reader().unwrap();
        prop_assert_eq!(formatter.deserialize(&mut reader).unwrap(), sample);
        prop_assert!(reader.is_end());
    }
}

// Property: bytes written in arbitrary chunks are read back intact
proptest! {
    #[test]
    fn prop_chunked_writes(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        chunk in 1usize..300,
        block in 1usize..128,
    ) {
        let mut sequence = SequenceBuffer::new(BlockPool::fixed(block, 8));
        for piece in data.chunks(chunk) {
            sequence.write(piece).unwrap();
        }
        let frozen = sequence.freeze();
        prop_assert_eq!(frozen.len(), data.len());

        let mut reader = SequenceReader::new(frozen);
        let mut out = vec![0u8; data.len()];
        prop_assert_eq!(reader.read(&mut out), data.len());
        prop_assert_eq!(out, data);
    }
}

// Property: advance then rewind returns to the same position
proptest! {
    #[test]
    fn prop_rewind_inverts_advance(
        len in 1usize..500,
        block in 1usize..32,
        split in any::<prop::sample::Index>(),
        back in any::<prop::sample::Index>(),
    ) {
        let mut sequence = SequenceBuffer::new(BlockPool::fixed(block, 8));
        let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
        sequence.write(&data).unwrap();
        let mut reader = SequenceReader::new(sequence.freeze());

        let forward = split.index(len + 1);
        reader.advance(forward).unwrap();
        let step = back.index(forward + 1);
        reader.rewind(step).unwrap();
        prop_assert_eq!(reader.consumed(), forward - step);
        prop_assert_eq!(reader.try_peek(), data.get(forward - step).copied());
    }
}

// Property: corrupted input never panics
proptest! {
    #[test]
    fn prop_random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = deserialize::<Sample>(&bytes);
        let _ = deserialize::<Vec<String>>(&bytes);
        let _ = deserialize::<BTreeMap<String, Option<u64>>>(&bytes);
    }
}

// Property: truncating a valid encoding is always a decode fault
proptest! {
    #[test]
    fn prop_truncation_is_fault(sample in sample_strategy(), cut in any::<prop::sample::Index>()) {
        let bytes = serialize_to_vec(&sample).unwrap();
        let at = cut.index(bytes.len());
        let err = deserialize::<Sample>(&bytes[..at]).unwrap_err();
        prop_assert!(err.is_decode_fault());
    }
}
