//! Runtime-typed values carried through `AnyObject`.

#![allow(clippy::unwrap_used)]

use wire_formatter::error::constants::ERR_UNKNOWN_OBJECT_TYPE;
use wire_formatter::{AnyObject, Formattable, Resolver, WireSerializer};

#[derive(Debug, Clone, PartialEq, Formattable)]
struct Ping {
    seq: u32,
}

#[derive(Debug, Clone, PartialEq, Formattable)]
struct Chat {
    from: String,
    text: String,
}

#[derive(Debug, Formattable)]
struct Envelope {
    topic: String,
    body: AnyObject,
}

struct NotRegistered;

fn serializer() -> (Resolver, WireSerializer) {
    let resolver = Resolver::new();
    resolver.register_polymorphic::<Ping>("ping");
    resolver.register_polymorphic::<Chat>("chat");
    let serializer = WireSerializer::new().with_resolver(resolver.clone());
    (resolver, serializer)
}

#[test]
fn test_envelope_carries_registered_body() {
    let (_, serializer) = serializer();
    let envelope = Envelope {
        topic: String::from("t"),
        body: AnyObject::new(Ping { seq: 9 }),
    };
    let bytes = serializer.serialize_to_vec(&envelope).unwrap();
    // topic, then the type name, then the body's own layout
    assert_eq!(
        bytes,
        vec![0xA1, b't', 0xA4, b'p', b'i', b'n', b'g', 0xCE, 0, 0, 0, 9]
    );

    let decoded: Envelope = serializer.deserialize(&bytes).unwrap();
    assert_eq!(decoded.topic, "t");
    assert_eq!(decoded.body.downcast_ref::<Ping>(), Some(&Ping { seq: 9 }));
}

#[test]
fn test_heterogeneous_list() {
    let (_, serializer) = serializer();
    let items = vec![
        AnyObject::new(Ping { seq: 1 }),
        AnyObject::nil(),
        AnyObject::new(Chat {
            from: String::from("a"),
            text: String::from("hi"),
        }),
        AnyObject::new(String::from("plain")),
        AnyObject::new(-5i64),
    ];
    let bytes = serializer.serialize_to_vec(&items).unwrap();
    assert!(serializer.get_length(&items).unwrap() >= bytes.len() as u64);

    let decoded: Vec<AnyObject> = serializer.deserialize(&bytes).unwrap();
    assert_eq!(decoded.len(), 5);
    assert_eq!(decoded[0].downcast_ref::<Ping>(), Some(&Ping { seq: 1 }));
    assert!(decoded[1].is_nil());
    assert_eq!(decoded[2].downcast_ref::<Chat>().unwrap().text, "hi");
    assert_eq!(decoded[3].downcast_ref::<String>().unwrap(), "plain");
    assert_eq!(decoded[4].downcast_ref::<i64>(), Some(&-5));
}

#[test]
fn test_unregistered_runtime_type_written_as_nil() {
    let (_, serializer) = serializer();
    let envelope = Envelope {
        topic: String::new(),
        body: AnyObject::new(NotRegistered),
    };
    let bytes = serializer.serialize_to_vec(&envelope).unwrap();
    assert_eq!(bytes, vec![0xA0, 0xC0]);
    let decoded: Envelope = serializer.deserialize(&bytes).unwrap();
    assert!(decoded.body.is_nil());
}

#[test]
fn test_name_unknown_to_reader_is_fault() {
    let (_, writer) = serializer();
    let bytes = writer
        .serialize_to_vec(&AnyObject::new(Ping { seq: 1 }))
        .unwrap();

    let reader = WireSerializer::new().with_resolver(Resolver::new());
    let err = reader.deserialize::<AnyObject>(&bytes).unwrap_err();
    assert!(err.is_decode_fault());
    assert!(err.to_string().contains(ERR_UNKNOWN_OBJECT_TYPE));
}

#[test]
fn test_rename_changes_wire_name() {
    let (resolver, serializer) = serializer();
    resolver.register_polymorphic::<Ping>("p");
    let bytes = serializer
        .serialize_to_vec(&AnyObject::new(Ping { seq: 2 }))
        .unwrap();
    assert_eq!(&bytes[..2], &[0xA1, b'p']);

    let decoded: AnyObject = serializer.deserialize(&bytes).unwrap();
    assert_eq!(decoded.downcast::<Ping>().unwrap(), Ping { seq: 2 });
    let stale = [0xA4, b'p', b'i', b'n', b'g', 0xCE, 0, 0, 0, 2];
    assert!(serializer.deserialize::<AnyObject>(&stale).is_err());
}

#[test]
fn test_optional_object_field() {
    let (_, serializer) = serializer();
    let value: Option<AnyObject> = Some(AnyObject::nil());
    let bytes = serializer.serialize_to_vec(&value).unwrap();
    // A nil object inside Some needs the present marker.
    assert_eq!(bytes, vec![0xC1, 0xC0]);
    let decoded: Option<AnyObject> = serializer.deserialize(&bytes).unwrap();
    assert!(decoded.unwrap().is_nil());
}
