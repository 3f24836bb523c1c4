//! Runtime member descriptions for types that cannot derive `Formattable`.
//!
//! A foreign type (one from another crate) is described once with accessor
//! closures and a constructor, registered with
//! [`Resolver::register_shape`](super::Resolver::register_shape), and resolved with
//! [`Resolver::resolve`](super::Resolver::resolve). The layout matches a derived
//! struct: members back to back in the order they were declared.
//!
//! ```rust
//! use wire_formatter::resolver::{ObjectShape, Resolver};
//!
//! #[derive(Default)]
//! struct Endpoint {
//!     host: String,
//!     port: u16,
//! }
//!
//! let resolver = Resolver::new();
//! resolver.register_shape(
//!     ObjectShape::<Endpoint>::new("endpoint")
//!         .member("host", |e| &e.host, |e, v| e.host = v)
//!         .member("port", |e| &e.port, |e, v| e.port = v)
//!         .constructor(Endpoint::default),
//! );
//! let formatter = resolver.resolve::<Endpoint>().unwrap();
//! ```

use std::sync::Arc;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{FormatterError, Result};
use crate::format::{Formattable, Formatter};
use crate::resolver::Resolver;

type Getter<T, F> = Arc<dyn Fn(&T) -> &F + Send + Sync>;
type Setter<T, F> = Arc<dyn Fn(&mut T, F) + Send + Sync>;
type Constructor<T> = Arc<dyn Fn() -> T + Send + Sync>;
type ResolveFn<F> = fn(&Resolver) -> Result<Arc<dyn Formatter<F>>>;

trait MemberSpec<T>: Send + Sync {
    fn name(&self) -> &str;

    fn bind(&self, resolver: &Resolver) -> Result<Box<dyn BoundMember<T>>>;
}

trait BoundMember<T>: Send + Sync {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()>;

    fn deserialize_into(&self, reader: &mut SequenceReader, value: &mut T) -> Result<()>;

    fn get_length(&self, value: &T) -> u64;

    fn default_length(&self) -> u64;
}

struct Member<T, F> {
    name: String,
    getter: Getter<T, F>,
    setter: Setter<T, F>,
    resolve: ResolveFn<F>,
}

impl<T: 'static, F: 'static> MemberSpec<T> for Member<T, F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind(&self, resolver: &Resolver) -> Result<Box<dyn BoundMember<T>>> {
        Ok(Box::new(Bound {
            getter: self.getter.clone(),
            setter: self.setter.clone(),
            formatter: (self.resolve)(resolver)?,
        }))
    }
}

struct Bound<T, F> {
    getter: Getter<T, F>,
    setter: Setter<T, F>,
    formatter: Arc<dyn Formatter<F>>,
}

impl<T, F> BoundMember<T> for Bound<T, F> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()> {
        self.formatter.serialize(buffer, (self.getter)(value))
    }

    fn deserialize_into(&self, reader: &mut SequenceReader, value: &mut T) -> Result<()> {
        let member = self.formatter.deserialize(reader)?;
        (self.setter)(value, member);
        Ok(())
    }

    fn get_length(&self, value: &T) -> u64 {
        self.formatter.get_length((self.getter)(value))
    }

    fn default_length(&self) -> u64 {
        self.formatter.default_length()
    }
}

/// Builder describing how to read, write and construct a `T`
pub struct ObjectShape<T> {
    name: String,
    members: Vec<Box<dyn MemberSpec<T>>>,
    constructor: Option<Constructor<T>>,
}

impl<T: 'static> ObjectShape<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            constructor: None,
        }
    }

    /// Add a member whose type implements [`Formattable`].
    pub fn member<F, G, S>(self, name: impl Into<String>, getter: G, setter: S) -> Self
    where
        F: Formattable,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        self.push_member(name.into(), getter, setter, Resolver::get_formatter::<F>)
    }

    /// Add a member whose type is itself registered as a shape or formatter.
    pub fn foreign_member<F, G, S>(self, name: impl Into<String>, getter: G, setter: S) -> Self
    where
        F: 'static,
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        self.push_member(name.into(), getter, setter, Resolver::resolve::<F>)
    }

    /// Function producing the blank value that members are decoded into.
    pub fn constructor<C>(mut self, constructor: C) -> Self
    where
        C: Fn() -> T + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(constructor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|member| member.name())
    }

    /// Resolve every member formatter. Fails with `MissingConstructor` when no
    /// constructor was given.
    pub fn build(&self, resolver: &Resolver) -> Result<Arc<dyn Formatter<T>>> {
        let constructor = self
            .constructor
            .clone()
            .ok_or(FormatterError::MissingConstructor(std::any::type_name::<T>()))?;
        let members = self
            .members
            .iter()
            .map(|member| member.bind(resolver))
            .collect::<Result<Vec<_>>>()?;
        let default_length = members.iter().map(|m| m.default_length()).sum();
        Ok(Arc::new(ShapeFormatter {
            name: self.name.clone(),
            members,
            constructor,
            default_length,
        }))
    }

    fn push_member<F: 'static, G, S>(
        mut self,
        name: String,
        getter: G,
        setter: S,
        resolve: ResolveFn<F>,
    ) -> Self
    where
        G: Fn(&T) -> &F + Send + Sync + 'static,
        S: Fn(&mut T, F) + Send + Sync + 'static,
    {
        self.members.push(Box::new(Member {
            name,
            getter: Arc::new(getter),
            setter: Arc::new(setter),
            resolve,
        }));
        self
    }
}

/// Formatter built from an [`ObjectShape`]
pub struct ShapeFormatter<T> {
    name: String,
    members: Vec<Box<dyn BoundMember<T>>>,
    constructor: Constructor<T>,
    default_length: u64,
}

impl<T> ShapeFormatter<T> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> Formatter<T> for ShapeFormatter<T> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()> {
        buffer.nested(|buffer| {
            self.members
                .iter()
                .try_for_each(|member| member.serialize(buffer, value))
        })
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<T> {
        reader.nested(|reader| {
            let mut value = (self.constructor)();
            for member in &self.members {
                member.deserialize_into(reader, &mut value)?;
            }
            Ok(value)
        })
    }

    fn get_length(&self, value: &T) -> u64 {
        self.members.iter().map(|m| m.get_length(value)).sum()
    }

    fn default_length(&self) -> u64 {
        self.default_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Endpoint {
        host: String,
        port: u16,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Route {
        from: Endpoint,
        hops: Vec<u8>,
    }

    fn endpoint_shape() -> ObjectShape<Endpoint> {
        ObjectShape::<Endpoint>::new("endpoint")
            .member("host", |e| &e.host, |e, v| e.host = v)
            .member("port", |e| &e.port, |e, v| e.port = v)
            .constructor(Endpoint::default)
    }

    #[test]
    fn test_shape_round_trip() {
        let resolver = Resolver::new();
        assert!(resolver.register_shape(endpoint_shape()));
        let formatter = resolver.resolve::<Endpoint>().unwrap();

        let value = Endpoint {
            host: String::from("h"),
            port: 80,
        };
        let mut buffer = ByteBuffer::from_slice(&[]);
        formatter.serialize(&mut buffer, &value).unwrap();
        assert_eq!(buffer.to_vec().unwrap(), vec![0xA1, b'h', 0xCD, 0, 80]);
        assert_eq!(formatter.get_length(&value), 5);
        assert_eq!(formatter.deserialize(&mut buffer.reader().unwrap()).unwrap(), value);
    }

    #[test]
    fn test_missing_constructor_fails_at_build() {
        let resolver = Resolver::new();
        resolver.register_shape(
            ObjectShape::<Endpoint>::new("endpoint").member("port", |e| &e.port, |e, v| e.port = v),
        );
        let err = resolver.resolve::<Endpoint>().err().unwrap();
        assert!(matches!(err, FormatterError::MissingConstructor(name) if name.contains("Endpoint")));
        assert!(!resolver.is_resolved::<Endpoint>());
    }

    #[test]
    fn test_nested_foreign_member() {
        let resolver = Resolver::new();
        resolver.register_shape(endpoint_shape());
        resolver.register_shape(
            ObjectShape::<Route>::new("route")
                .foreign_member("from", |r| &r.from, |r, v| r.from = v)
                .member("hops", |r| &r.hops, |r, v| r.hops = v)
                .constructor(Route::default),
        );
        let formatter = resolver.resolve::<Route>().unwrap();
        let value = Route {
            from: Endpoint {
                host: String::from("a"),
                port: 1,
            },
            hops: vec![1, 2],
        };
        let mut buffer = ByteBuffer::from_slice(&[]);
        formatter.serialize(&mut buffer, &value).unwrap();
        assert_eq!(formatter.deserialize(&mut buffer.reader().unwrap()).unwrap(), value);
        assert!(resolver.is_resolved::<Endpoint>());
    }

    #[test]
    fn test_member_names_in_order() {
        let shape = endpoint_shape();
        assert_eq!(shape.name(), "endpoint");
        assert_eq!(shape.member_names().collect::<Vec<_>>(), vec!["host", "port"]);
    }
}
