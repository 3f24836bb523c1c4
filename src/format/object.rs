//! # Object Formatter
//!
//! [`AnyObject`] holds a value whose concrete type is only known at runtime. It is
//! written as nil, or as the registered type name (a string) followed by the value
//! in that type's own format.
//!
//! Concrete types are made known with
//! [`Resolver::register_polymorphic`](crate::resolver::Resolver::register_polymorphic).
//! The adapter for a type resolves its formatter on first use and keeps it, so
//! repeated values of the same type pay one map lookup. A runtime type without an
//! adapter is written as nil instead of failing.

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, Weak};

use tracing::warn;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{constants::*, FormatterError, Result};
use crate::format::code;
use crate::format::{Formattable, Formatter, FormatterKind};
use crate::resolver::{Resolver, ResolverInner};

/// A value of any registered type, or nil
#[derive(Default)]
pub struct AnyObject {
    value: Option<Box<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl AnyObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Some(Box::new(value)),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn nil() -> Self {
        Self::default()
    }

    pub fn is_nil(&self) -> bool {
        self.value.is_none()
    }

    /// Rust type name of the held value
    pub fn type_name(&self) -> Option<&'static str> {
        self.value.as_ref().map(|_| self.type_name)
    }

    /// `TypeId` of the held value (not of its box).
    pub fn value_type_id(&self) -> Option<TypeId> {
        self.value.as_deref().map(|value| value.type_id())
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|value| value.downcast_ref::<T>())
    }

    /// Take the value out as `T`, or get `self` back unchanged.
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        match self.value {
            Some(value) if value.is::<T>() => match value.downcast::<T>() {
                Ok(value) => Ok(*value),
                Err(value) => Err(Self {
                    value: Some(value),
                    type_name: self.type_name,
                }),
            },
            value => Err(Self {
                value,
                type_name: self.type_name,
            }),
        }
    }
}

impl fmt::Debug for AnyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_name() {
            Some(name) => write!(f, "AnyObject({name})"),
            None => write!(f, "AnyObject(nil)"),
        }
    }
}

/// Boxing/unboxing bridge between [`AnyObject`] and one concrete type.
pub(crate) trait ObjectAdapter: Send + Sync {
    fn type_name(&self) -> &str;

    fn serialize(
        &self,
        resolver: &Resolver,
        buffer: &mut ByteBuffer,
        value: &(dyn Any + Send + Sync),
    ) -> Result<()>;

    fn deserialize(&self, resolver: &Resolver, reader: &mut SequenceReader) -> Result<AnyObject>;

    fn get_length(&self, resolver: &Resolver, value: &(dyn Any + Send + Sync)) -> u64;
}

pub(crate) struct TypedAdapter<T> {
    name: String,
    formatter: OnceLock<Arc<dyn Formatter<T>>>,
    _type: PhantomData<fn() -> T>,
}

impl<T: Formattable + Send + Sync> TypedAdapter<T> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            formatter: OnceLock::new(),
            _type: PhantomData,
        }
    }

    fn formatter(&self, resolver: &Resolver) -> Result<&Arc<dyn Formatter<T>>> {
        if let Some(formatter) = self.formatter.get() {
            return Ok(formatter);
        }
        let formatter = resolver.get_formatter::<T>()?;
        Ok(self.formatter.get_or_init(|| formatter))
    }

    fn typed<'a>(&self, value: &'a (dyn Any + Send + Sync)) -> Result<&'a T> {
        value
            .downcast_ref::<T>()
            .ok_or_else(FormatterError::unresolved::<T>)
    }
}

impl<T: Formattable + Send + Sync> ObjectAdapter for TypedAdapter<T> {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn serialize(
        &self,
        resolver: &Resolver,
        buffer: &mut ByteBuffer,
        value: &(dyn Any + Send + Sync),
    ) -> Result<()> {
        self.formatter(resolver)?
            .serialize(buffer, self.typed(value)?)
    }

    fn deserialize(&self, resolver: &Resolver, reader: &mut SequenceReader) -> Result<AnyObject> {
        self.formatter(resolver)?
            .deserialize(reader)
            .map(AnyObject::new)
    }

    fn get_length(&self, resolver: &Resolver, value: &(dyn Any + Send + Sync)) -> u64 {
        match (self.formatter(resolver), self.typed(value)) {
            (Ok(formatter), Ok(value)) => formatter.get_length(value),
            _ => 1,
        }
    }
}

/// Runtime-type dispatching formatter for [`AnyObject`]
pub struct ObjectFormatter {
    resolver: Weak<ResolverInner>,
}

impl ObjectFormatter {
    pub(crate) fn new(resolver: Weak<ResolverInner>) -> Self {
        Self { resolver }
    }

    fn resolver(&self) -> Result<Resolver> {
        self.resolver
            .upgrade()
            .map(Resolver::from_inner)
            .ok_or_else(FormatterError::unresolved::<AnyObject>)
    }
}

impl Formatter<AnyObject> for ObjectFormatter {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &AnyObject) -> Result<()> {
        let Some(inner) = value.value.as_deref() else {
            return code::write_nil(buffer);
        };
        let resolver = self.resolver()?;
        match resolver.object_adapter(inner.type_id()) {
            Some(adapter) => buffer.nested(|buffer| {
                code::write_str(buffer, adapter.type_name())?;
                adapter.serialize(&resolver, buffer, inner)
            }),
            None => {
                warn!(
                    type_name = value.type_name,
                    "Runtime type has no registered adapter; writing nil"
                );
                code::write_nil(buffer)
            }
        }
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<AnyObject> {
        if code::try_read_nil(reader)? {
            return Ok(AnyObject::nil());
        }
        let resolver = self.resolver()?;
        let offset = reader.consumed() as u64;
        let name = code::read_str(reader)?;
        let adapter = resolver.object_adapter_named(&name).ok_or_else(|| {
            FormatterError::decode_owned(offset, format!("{ERR_UNKNOWN_OBJECT_TYPE}: {name}"))
        })?;
        reader.nested(|reader| adapter.deserialize(&resolver, reader))
    }

    fn get_length(&self, value: &AnyObject) -> u64 {
        let Some(inner) = value.value.as_deref() else {
            return 1;
        };
        let Ok(resolver) = self.resolver() else {
            return 1;
        };
        match resolver.object_adapter(inner.type_id()) {
            Some(adapter) => {
                let name = adapter.type_name().len();
                code::str_header_len(name) + name as u64 + adapter.get_length(&resolver, inner)
            }
            None => 1,
        }
    }

    fn default_length(&self) -> u64 {
        1
    }
}

impl Formattable for AnyObject {
    const KIND: FormatterKind = FormatterKind::Container;
    const NIL_FREE: bool = false;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        Ok(Arc::new(ObjectFormatter::new(resolver.downgrade())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::code::NIL;

    struct Unregistered;

    fn round_trip(resolver: &Resolver, value: &AnyObject) -> (Vec<u8>, AnyObject) {
        let formatter = resolver.get_formatter::<AnyObject>().unwrap();
        let mut buffer = ByteBuffer::from_slice(&[]);
        formatter.serialize(&mut buffer, value).unwrap();
        assert!(formatter.get_length(value) >= buffer.len() as u64);
        let bytes = buffer.to_vec().unwrap();
        let decoded = formatter.deserialize(&mut buffer.reader().unwrap()).unwrap();
        (bytes, decoded)
    }

    #[test]
    fn test_builtin_types_are_registered() {
        let resolver = Resolver::new();
        let (bytes, decoded) = round_trip(&resolver, &AnyObject::new(7i32));
        assert_eq!(&bytes[..4], &[0xA3, b'i', b'3', b'2']);
        assert_eq!(decoded.downcast_ref::<i32>(), Some(&7));
    }

    #[test]
    fn test_unregistered_type_degrades_to_nil() {
        let resolver = Resolver::new();
        let (bytes, decoded) = round_trip(&resolver, &AnyObject::new(Unregistered));
        assert_eq!(bytes, vec![NIL]);
        assert!(decoded.is_nil());
    }

    #[test]
    fn test_unknown_name_is_fault() {
        let resolver = Resolver::new();
        let formatter = resolver.get_formatter::<AnyObject>().unwrap();
        let mut buffer = ByteBuffer::from_slice(&[0xA3, b'f', b'o', b'o', 1]);
        let err = formatter
            .deserialize(&mut buffer.reader().unwrap())
            .unwrap_err();
        assert!(err.to_string().contains(ERR_UNKNOWN_OBJECT_TYPE));
    }

    #[test]
    fn test_downcast_returns_self_on_mismatch() {
        let object = AnyObject::new(String::from("x"));
        let object = object.downcast::<u8>().unwrap_err();
        assert_eq!(object.downcast::<String>().unwrap(), "x");
    }
}
