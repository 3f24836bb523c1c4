//! # Dictionary Formatters
//!
//! A map header followed by key/value pairs in iteration order. Duplicate keys in a
//! payload are a decode fault. [`DashMap`] targets are pre-sized with a shard count
//! derived from available parallelism.

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{constants::*, FormatterError, Result};
use crate::format::code;
use crate::format::{Formattable, Formatter, FormatterKind};
use crate::resolver::Resolver;

/// Pairs budgeted by `default_length` for a typical map
const DEFAULT_PAIR_BUDGET: u64 = 8;

/// Shard count for decoded [`DashMap`]s: four shards per core, rounded up to a
/// power of two.
pub fn concurrent_shard_amount() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (parallelism * 4).next_power_of_two().max(2)
}

/// Shape of a dictionary container.
pub trait MapShape: Sized {
    type Key;
    type Value;

    fn with_capacity(capacity: usize) -> Self;

    /// Insert a pair; `false` signals a duplicate key.
    fn insert_pair(&mut self, key: Self::Key, value: Self::Value) -> bool;

    fn pair_count(&self) -> usize;

    fn try_for_each_pair<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&Self::Key, &Self::Value) -> Result<()>;

    fn for_each_pair<F>(&self, f: F)
    where
        F: FnMut(&Self::Key, &Self::Value);
}

impl<K: Eq + Hash, V, S: BuildHasher + Default> MapShape for HashMap<K, V, S> {
    type Key = K;
    type Value = V;

    fn with_capacity(capacity: usize) -> Self {
        HashMap::with_capacity_and_hasher(capacity, S::default())
    }

    fn insert_pair(&mut self, key: K, value: V) -> bool {
        self.insert(key, value).is_none()
    }

    fn pair_count(&self) -> usize {
        self.len()
    }

    fn try_for_each_pair<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&K, &V) -> Result<()>,
    {
        self.iter().try_for_each(|(k, v)| f(k, v))
    }

    fn for_each_pair<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }
}

impl<K: Ord, V> MapShape for BTreeMap<K, V> {
    type Key = K;
    type Value = V;

    fn with_capacity(_capacity: usize) -> Self {
        BTreeMap::new()
    }

    fn insert_pair(&mut self, key: K, value: V) -> bool {
        self.insert(key, value).is_none()
    }

    fn pair_count(&self) -> usize {
        self.len()
    }

    fn try_for_each_pair<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&K, &V) -> Result<()>,
    {
        self.iter().try_for_each(|(k, v)| f(k, v))
    }

    fn for_each_pair<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for (k, v) in self.iter() {
            f(k, v);
        }
    }
}

impl<K: Eq + Hash, V, S: BuildHasher + Clone + Default> MapShape for DashMap<K, V, S> {
    type Key = K;
    type Value = V;

    fn with_capacity(capacity: usize) -> Self {
        DashMap::with_capacity_and_hasher_and_shard_amount(
            capacity,
            S::default(),
            concurrent_shard_amount(),
        )
    }

    fn insert_pair(&mut self, key: K, value: V) -> bool {
        self.insert(key, value).is_none()
    }

    fn pair_count(&self) -> usize {
        self.len()
    }

    fn try_for_each_pair<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&K, &V) -> Result<()>,
    {
        for entry in self.iter() {
            f(entry.key(), entry.value())?;
        }
        Ok(())
    }

    fn for_each_pair<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for entry in self.iter() {
            f(entry.key(), entry.value());
        }
    }
}

/// Key/value-driven formatter for any [`MapShape`]
pub struct MapFormatter<M: MapShape> {
    key: Arc<dyn Formatter<M::Key>>,
    value: Arc<dyn Formatter<M::Value>>,
    _map: PhantomData<fn() -> M>,
}

impl<M: MapShape> MapFormatter<M> {
    pub fn new(key: Arc<dyn Formatter<M::Key>>, value: Arc<dyn Formatter<M::Value>>) -> Self {
        Self {
            key,
            value,
            _map: PhantomData,
        }
    }
}

impl<M: MapShape> Formatter<M> for MapFormatter<M> {
    fn serialize(&self, buffer: &mut ByteBuffer, map: &M) -> Result<()> {
        buffer.nested(|buffer| {
            code::write_map_header(buffer, map.pair_count())?;
            map.try_for_each_pair(|key, value| {
                self.key.serialize(buffer, key)?;
                self.value.serialize(buffer, value)
            })
        })
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<M> {
        reader.nested(|reader| {
            let count = code::read_map_header(reader)?;
            // Each pair takes at least two bytes.
            let mut map = M::with_capacity(count.min(reader.remaining() / 2));
            for _ in 0..count {
                reader.check_cancelled()?;
                let offset = reader.consumed();
                let key = self.key.deserialize(reader)?;
                let value = self.value.deserialize(reader)?;
                if !map.insert_pair(key, value) {
                    return Err(FormatterError::decode(offset as u64, ERR_DUPLICATE_KEY));
                }
            }
            Ok(map)
        })
    }

    fn get_length(&self, map: &M) -> u64 {
        let mut total = code::map_header_len(map.pair_count());
        map.for_each_pair(|key, value| {
            total += self.key.get_length(key) + self.value.get_length(value);
        });
        total
    }

    fn default_length(&self) -> u64 {
        code::MAX_HEADER_LEN
            + DEFAULT_PAIR_BUDGET * (self.key.default_length() + self.value.default_length())
    }
}

fn map_formatter<M, K, V>(resolver: &Resolver) -> Result<Arc<dyn Formatter<M>>>
where
    M: MapShape<Key = K, Value = V> + 'static,
    K: Formattable,
    V: Formattable,
{
    let key = resolver.get_formatter::<K>()?;
    let value = resolver.get_formatter::<V>()?;
    Ok(Arc::new(MapFormatter::<M>::new(key, value)))
}

impl<K, V, S> Formattable for HashMap<K, V, S>
where
    K: Formattable + Eq + Hash,
    V: Formattable,
    S: BuildHasher + Default + 'static,
{
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        map_formatter::<Self, K, V>(resolver)
    }
}

impl<K: Formattable + Ord, V: Formattable> Formattable for BTreeMap<K, V> {
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        map_formatter::<Self, K, V>(resolver)
    }
}

impl<K, V, S> Formattable for DashMap<K, V, S>
where
    K: Formattable + Eq + Hash,
    V: Formattable,
    S: BuildHasher + Clone + Default + 'static,
{
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        map_formatter::<Self, K, V>(resolver)
    }
}
