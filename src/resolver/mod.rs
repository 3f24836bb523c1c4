//! # Resolver
//!
//! Type to formatter lookup. A formatter is built once per type and cached for the
//! lifetime of the resolver; every later lookup is a read-locked map hit.
//!
//! ## Resolution order
//! 1. Cache
//! 2. Primitive table (`FormatterKind::Primitive`, never overridden)
//! 3. Formatters registered with [`Resolver::register`]
//! 4. Shapes registered with [`Resolver::register_shape`]
//! 5. [`Formattable::build_formatter`]: containers and derived types
//!
//! Steps 4 and 5 run under a re-entrant compile lock with a double check, so racing
//! first use from many threads compiles a type exactly once. A type requested again
//! while it is still being compiled on the same thread (a recursive type) receives a
//! [`DeferredFormatter`] that forwards to the final formatter once it exists.
//! Formatters built during one top-level compile are published together, so a
//! failed compile leaves nothing half-built in the cache.
//!
//! ## Example
//! ```rust
//! use wire_formatter::resolver::Resolver;
//!
//! let resolver = Resolver::new();
//! let formatter = resolver.get_formatter::<Vec<u32>>().unwrap();
//! assert_eq!(formatter.get_length(&vec![1, 2, 3]), 4);
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, warn};

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{FormatterError, Result};
use crate::format::object::{ObjectAdapter, TypedAdapter};
use crate::format::{Formattable, Formatter, FormatterKind};
use crate::utils::metrics::{global_metrics, Timer};

pub mod auto;
pub mod shape;

pub use auto::{AutoFormatter, EnumFormatter};
pub use shape::{ObjectShape, ShapeFormatter};

/// Size hint reported by a deferred formatter before its target is known
const DEFERRED_DEFAULT_LENGTH: u64 = 16;

/// Type-erased map holding one `Arc<...>` per `TypeId`
type TypeMap = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

static GLOBAL: Lazy<Resolver> = Lazy::new(Resolver::new);

#[derive(Default)]
struct CompileState {
    /// Nesting of `compile` calls on the thread holding the lock
    depth: usize,
    /// `Arc<DeferredFormatter<T>>` for every type currently being built
    pending: TypeMap,
    /// `Arc<dyn Formatter<T>>` built but not yet published
    staged: TypeMap,
}

pub(crate) struct ResolverInner {
    cache: RwLock<TypeMap>,
    registered: RwLock<TypeMap>,
    shapes: RwLock<TypeMap>,
    compile_lock: ReentrantMutex<RefCell<CompileState>>,
    polymorphic_by_type: DashMap<TypeId, Arc<dyn ObjectAdapter>>,
    polymorphic_by_name: DashMap<String, Arc<dyn ObjectAdapter>>,
}

/// Shared handle to a formatter cache; clones see the same cache.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<ResolverInner>,
}

impl Resolver {
    /// Create an empty resolver with the built-in polymorphic names registered.
    pub fn new() -> Self {
        let resolver = Self {
            inner: Arc::new(ResolverInner {
                cache: RwLock::new(HashMap::new()),
                registered: RwLock::new(HashMap::new()),
                shapes: RwLock::new(HashMap::new()),
                compile_lock: ReentrantMutex::new(RefCell::new(CompileState::default())),
                polymorphic_by_type: DashMap::new(),
                polymorphic_by_name: DashMap::new(),
            }),
        };
        resolver.register_builtin_objects();
        resolver
    }

    /// Process-wide default instance
    pub fn global() -> &'static Resolver {
        &GLOBAL
    }

    pub(crate) fn from_inner(inner: Arc<ResolverInner>) -> Self {
        Self { inner }
    }

    /// Non-owning handle for formatters that call back into the resolver, so a
    /// cached formatter never keeps its own resolver alive.
    pub(crate) fn downgrade(&self) -> Weak<ResolverInner> {
        Arc::downgrade(&self.inner)
    }

    /// Resolve the formatter for `T`, building and caching it on first use.
    pub fn get_formatter<T: Formattable>(&self) -> Result<Arc<dyn Formatter<T>>> {
        if let Some(formatter) = self.cached::<T>() {
            return Ok(formatter);
        }

        if T::KIND == FormatterKind::Primitive {
            // Stateless and cheap: a lost race only drops a duplicate.
            let formatter = T::build_formatter(self)?;
            return Ok(self.publish(formatter));
        }

        if let Some(formatter) = self.registered::<T>() {
            return Ok(self.publish(formatter));
        }
        if let Some(shape) = self.shape::<T>() {
            return self.compile::<T, _>(T::KIND, move |resolver| shape.build(resolver));
        }
        self.compile::<T, _>(T::KIND, T::build_formatter)
    }

    /// Resolve a formatter for a type that does not implement [`Formattable`]:
    /// cache, then registered formatters, then registered shapes.
    pub fn resolve<T: 'static>(&self) -> Result<Arc<dyn Formatter<T>>> {
        if let Some(formatter) = self.cached::<T>() {
            return Ok(formatter);
        }
        if let Some(formatter) = self.registered::<T>() {
            return Ok(self.publish(formatter));
        }
        match self.shape::<T>() {
            Some(shape) => {
                self.compile::<T, _>(FormatterKind::Object, move |resolver| shape.build(resolver))
            }
            None => Err(FormatterError::unresolved::<T>()),
        }
    }

    /// Register an explicit formatter for `T`, overriding the container or derived
    /// formatter. Returns `false` when `T` is already resolved; the cached formatter
    /// then stays in effect for this resolver.
    pub fn register<T: 'static>(&self, formatter: Arc<dyn Formatter<T>>) -> bool {
        if self.cached::<T>().is_some() {
            warn!(
                type_name = std::any::type_name::<T>(),
                "Formatter already resolved; registration has no effect"
            );
            return false;
        }
        self.inner
            .registered
            .write()
            .insert(TypeId::of::<T>(), Box::new(formatter));
        true
    }

    /// Register a member-by-member description of `T`. Same caching rules as
    /// [`register`](Self::register).
    pub fn register_shape<T: 'static>(&self, shape: ObjectShape<T>) -> bool {
        if self.cached::<T>().is_some() {
            warn!(
                type_name = std::any::type_name::<T>(),
                "Formatter already resolved; shape registration has no effect"
            );
            return false;
        }
        self.inner
            .shapes
            .write()
            .insert(TypeId::of::<T>(), Box::new(Arc::new(shape)));
        true
    }

    /// Make `T` usable inside [`AnyObject`](crate::format::AnyObject) under `name`.
    /// A later registration of the same type or name replaces the earlier one.
    pub fn register_polymorphic<T: Formattable + Send + Sync>(&self, name: impl Into<String>) {
        let name = name.into();
        let adapter: Arc<dyn ObjectAdapter> = Arc::new(TypedAdapter::<T>::new(name.clone()));
        if let Some(previous) = self
            .inner
            .polymorphic_by_type
            .insert(TypeId::of::<T>(), adapter.clone())
        {
            if previous.type_name() != name {
                self.inner.polymorphic_by_name.remove(previous.type_name());
            }
        }
        self.inner.polymorphic_by_name.insert(name, adapter);
    }

    /// Whether a formatter for `T` is already cached.
    pub fn is_resolved<T: 'static>(&self) -> bool {
        self.cached::<T>().is_some()
    }

    /// Number of cached formatters
    pub fn cached_count(&self) -> usize {
        self.inner.cache.read().len()
    }

    pub(crate) fn object_adapter(&self, type_id: TypeId) -> Option<Arc<dyn ObjectAdapter>> {
        self.inner
            .polymorphic_by_type
            .get(&type_id)
            .map(|adapter| adapter.value().clone())
    }

    pub(crate) fn object_adapter_named(&self, name: &str) -> Option<Arc<dyn ObjectAdapter>> {
        self.inner
            .polymorphic_by_name
            .get(name)
            .map(|adapter| adapter.value().clone())
    }

    fn register_builtin_objects(&self) {
        self.register_polymorphic::<bool>("bool");
        self.register_polymorphic::<u8>("u8");
        self.register_polymorphic::<u16>("u16");
        self.register_polymorphic::<u32>("u32");
        self.register_polymorphic::<u64>("u64");
        self.register_polymorphic::<i8>("i8");
        self.register_polymorphic::<i16>("i16");
        self.register_polymorphic::<i32>("i32");
        self.register_polymorphic::<i64>("i64");
        self.register_polymorphic::<f32>("f32");
        self.register_polymorphic::<f64>("f64");
        self.register_polymorphic::<char>("char");
        self.register_polymorphic::<String>("string");
        self.register_polymorphic::<Vec<u8>>("bytes");
    }

    fn cached<T: 'static>(&self) -> Option<Arc<dyn Formatter<T>>> {
        self.inner
            .cache
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Formatter<T>>>())
            .cloned()
    }

    fn registered<T: 'static>(&self) -> Option<Arc<dyn Formatter<T>>> {
        self.inner
            .registered
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Formatter<T>>>())
            .cloned()
    }

    fn shape<T: 'static>(&self) -> Option<Arc<ObjectShape<T>>> {
        self.inner
            .shapes
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<ObjectShape<T>>>())
            .cloned()
    }

    /// Insert unless another thread got there first; returns the winner.
    fn publish<T: 'static>(&self, formatter: Arc<dyn Formatter<T>>) -> Arc<dyn Formatter<T>> {
        let mut cache = self.inner.cache.write();
        cache
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(formatter.clone()))
            .downcast_ref::<Arc<dyn Formatter<T>>>()
            .cloned()
            .unwrap_or(formatter)
    }

    fn compile<T, F>(&self, kind: FormatterKind, build: F) -> Result<Arc<dyn Formatter<T>>>
    where
        T: 'static,
        F: FnOnce(&Resolver) -> Result<Arc<dyn Formatter<T>>>,
    {
        let guard = self.inner.compile_lock.lock();
        if let Some(formatter) = self.cached::<T>() {
            return Ok(formatter);
        }

        let type_id = TypeId::of::<T>();
        let deferred = {
            let mut state = guard.borrow_mut();
            if let Some(formatter) = state
                .staged
                .get(&type_id)
                .and_then(|entry| entry.downcast_ref::<Arc<dyn Formatter<T>>>())
            {
                return Ok(formatter.clone());
            }
            if let Some(deferred) = state
                .pending
                .get(&type_id)
                .and_then(|entry| entry.downcast_ref::<Arc<DeferredFormatter<T>>>())
            {
                return Ok(deferred.clone());
            }
            let deferred = Arc::new(DeferredFormatter::<T>::new());
            state.pending.insert(type_id, Box::new(deferred.clone()));
            state.depth += 1;
            deferred
        };

        let timer = Timer::start("compile_formatter");
        let built = build(self);

        let mut state = guard.borrow_mut();
        state.pending.remove(&type_id);
        state.depth -= 1;

        let formatter = match built {
            Ok(formatter) => formatter,
            Err(e) => {
                if state.depth == 0 {
                    state.staged.clear();
                }
                return Err(e);
            }
        };

        deferred.resolve(formatter.clone());
        global_metrics().formatter_compiled();
        debug!(
            type_name = std::any::type_name::<T>(),
            kind = ?kind,
            default_length = formatter.default_length(),
            duration_us = timer.elapsed().as_micros() as u64,
            "Compiled formatter"
        );

        state
            .staged
            .insert(type_id, Box::new(formatter.clone()));
        if state.depth == 0 {
            let staged = std::mem::take(&mut state.staged);
            let mut cache = self.inner.cache.write();
            for (id, entry) in staged {
                cache.entry(id).or_insert(entry);
            }
        }
        Ok(formatter)
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cached", &self.cached_count())
            .field("registered", &self.inner.registered.read().len())
            .field("shapes", &self.inner.shapes.read().len())
            .field("polymorphic", &self.inner.polymorphic_by_type.len())
            .finish()
    }
}

/// Stand-in handed out while `T` is still being compiled; forwards every call to
/// the formatter it is resolved to.
pub struct DeferredFormatter<T> {
    target: OnceLock<Arc<dyn Formatter<T>>>,
}

impl<T> DeferredFormatter<T> {
    fn new() -> Self {
        Self {
            target: OnceLock::new(),
        }
    }

    fn resolve(&self, formatter: Arc<dyn Formatter<T>>) {
        let _ = self.target.set(formatter);
    }

    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    fn target(&self) -> Result<&Arc<dyn Formatter<T>>> {
        self.target
            .get()
            .ok_or_else(FormatterError::unresolved::<T>)
    }
}

impl<T> Formatter<T> for DeferredFormatter<T> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &T) -> Result<()> {
        self.target()?.serialize(buffer, value)
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<T> {
        self.target()?.deserialize(reader)
    }

    fn get_length(&self, value: &T) -> u64 {
        match self.target.get() {
            Some(target) => target.get_length(value),
            None => DEFERRED_DEFAULT_LENGTH,
        }
    }

    // A recursive type's default length cannot include itself.
    fn default_length(&self) -> u64 {
        DEFERRED_DEFAULT_LENGTH
    }
}
