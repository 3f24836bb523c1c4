#![no_main]

use std::collections::BTreeMap;

use libfuzzer_sys::fuzz_target;
use wire_formatter::{deserialize, AnyObject, Formattable};

#[derive(Debug, Formattable)]
struct Node {
    name: String,
    weight: Option<f64>,
    tags: BTreeMap<String, i64>,
    children: Vec<Node>,
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary input must fail cleanly, never panic or loop.
    let _ = deserialize::<Node>(data);
    let _ = deserialize::<Vec<Option<String>>>(data);
    let _ = deserialize::<(u8, i32, Vec<u8>)>(data);
    let _ = deserialize::<AnyObject>(data);
});
