//! Example: Round-Tripping Values Through the Wire Format
//!
//! Serializes a derived struct, a runtime-typed payload and a plain struct
//! described with an `ObjectShape`, then reads each one back.
//!
//! Run with: `cargo run --example round_trip`

#![allow(clippy::uninlined_format_args)]

use std::collections::BTreeMap;

use wire_formatter::config::FormatterConfig;
use wire_formatter::utils::logging::init_logging;
use wire_formatter::utils::metrics::global_metrics;
use wire_formatter::{AnyObject, Formattable, ObjectShape, WireSerializer};

#[derive(Debug, Clone, PartialEq, Formattable)]
struct Reading {
    sensor: String,
    celsius: f64,
    flags: Vec<bool>,
    labels: BTreeMap<String, String>,
    previous: Option<Box<Reading>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Formattable)]
#[repr(u8)]
enum Severity {
    Info = 1,
    Warning = 2,
}

#[derive(Debug, Default, PartialEq)]
struct Endpoint {
    host: String,
    port: u16,
}

#[derive(Debug, Formattable)]
struct Event {
    severity: Severity,
    payload: AnyObject,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = FormatterConfig::default();
    let _guard = init_logging(&config.logging)?;
    let serializer = WireSerializer::from_config(&config)?;

    println!("=== Wire Formatter Round Trip ===\n");

    // 1. Derived struct, including a recursive optional member
    let reading = Reading {
        sensor: String::from("probe-7"),
        celsius: 21.5,
        flags: vec![true, false],
        labels: BTreeMap::from([(String::from("room"), String::from("lab"))]),
        previous: Some(Box::new(Reading {
            sensor: String::from("probe-7"),
            celsius: 21.0,
            flags: Vec::new(),
            labels: BTreeMap::new(),
            previous: None,
        })),
    };
    let bytes = serializer.serialize_to_vec(&reading)?;
    println!("1. DERIVED STRUCT");
    println!("   - Encoded size: {} bytes", bytes.len());
    println!("   - Length bound: {} bytes", serializer.get_length(&reading)?);
    println!("   - Hex: {}", hex::encode(&bytes[..bytes.len().min(24)]));
    let decoded: Reading = serializer.deserialize(&bytes)?;
    println!("   - Roundtrip: {}\n", status(decoded == reading));

    // 2. Runtime-typed payload
    serializer
        .resolver()
        .register_polymorphic::<Reading>("reading");
    let event = Event {
        severity: Severity::Warning,
        payload: AnyObject::new(reading.clone()),
    };
    let bytes = serializer.serialize_to_vec(&event)?;
    let decoded: Event = serializer.deserialize(&bytes)?;
    println!("2. POLYMORPHIC PAYLOAD");
    println!("   - Encoded size: {} bytes", bytes.len());
    println!("   - Severity: {:?}", decoded.severity);
    println!(
        "   - Roundtrip: {}\n",
        status(decoded.payload.downcast_ref::<Reading>() == Some(&reading))
    );

    // 3. A type without a derive, described at runtime
    serializer.resolver().register_shape(
        ObjectShape::<Endpoint>::new("endpoint")
            .member("host", |e| &e.host, |e, host| e.host = host)
            .member("port", |e| &e.port, |e, port| e.port = port)
            .constructor(Endpoint::default),
    );
    let endpoint = Endpoint {
        host: String::from("10.0.0.7"),
        port: 8443,
    };
    let formatter = serializer.resolver().resolve::<Endpoint>()?;
    let buffer = serializer.serialize_with(formatter.as_ref(), &endpoint)?;
    println!("3. OBJECT SHAPE");
    println!("{}", buffer);
    let decoded = serializer.deserialize_with(formatter.as_ref(), &buffer.to_vec()?)?;
    println!("   - Roundtrip: {}\n", status(decoded == endpoint));

    global_metrics().log_metrics();
    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok {
        "✓ Success"
    } else {
        "✗ Failed"
    }
}
