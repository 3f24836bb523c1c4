//! # Collection Formatters
//!
//! Sequences are an array header followed by each element in iteration order.
//! Decoding reads the header, rejects counts above the configured maximum, pre-sizes
//! the target with `min(count, remaining bytes)` (every element takes at least one
//! byte), then reads `count` elements, polling cancellation between them.
//!
//! Byte sequences (`Vec<u8>`, `Box<[u8]>`, `[u8; N]`, [`Bytes`]) skip per-element
//! dispatch and use the binary layout with a bulk copy.

use std::any::TypeId;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;

use crate::buffer::{ByteBuffer, SequenceReader};
use crate::error::{constants::*, FormatterError, Result};
use crate::format::code;
use crate::format::{cast_formatter, Formattable, Formatter, FormatterKind};
use crate::resolver::Resolver;

/// Elements budgeted by `default_length` for a typical collection
const DEFAULT_ELEMENT_BUDGET: u64 = 8;

/// Shape of a growable sequence container.
pub trait SequenceShape: Sized {
    type Item;
    type Builder;

    fn builder(capacity: usize) -> Self::Builder;

    /// Add an element; `false` signals a duplicate in a set.
    fn push(builder: &mut Self::Builder, item: Self::Item) -> bool;

    fn finish(builder: Self::Builder) -> Result<Self>;

    fn item_count(&self) -> usize;

    fn try_for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&Self::Item) -> Result<()>;

    fn for_each_item<F>(&self, f: F)
    where
        F: FnMut(&Self::Item);
}

impl<T> SequenceShape for Vec<T> {
    type Item = T;
    type Builder = Vec<T>;

    fn builder(capacity: usize) -> Vec<T> {
        Vec::with_capacity(capacity)
    }

    fn push(builder: &mut Vec<T>, item: T) -> bool {
        builder.push(item);
        true
    }

    fn finish(builder: Vec<T>) -> Result<Self> {
        Ok(builder)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn try_for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&T) -> Result<()>,
    {
        self.iter().try_for_each(f)
    }

    fn for_each_item<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.iter().for_each(f)
    }
}

impl<T> SequenceShape for VecDeque<T> {
    type Item = T;
    type Builder = VecDeque<T>;

    fn builder(capacity: usize) -> VecDeque<T> {
        VecDeque::with_capacity(capacity)
    }

    fn push(builder: &mut VecDeque<T>, item: T) -> bool {
        builder.push_back(item);
        true
    }

    fn finish(builder: VecDeque<T>) -> Result<Self> {
        Ok(builder)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn try_for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&T) -> Result<()>,
    {
        self.iter().try_for_each(f)
    }

    fn for_each_item<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.iter().for_each(f)
    }
}

impl<T> SequenceShape for Box<[T]> {
    type Item = T;
    type Builder = Vec<T>;

    fn builder(capacity: usize) -> Vec<T> {
        Vec::with_capacity(capacity)
    }

    fn push(builder: &mut Vec<T>, item: T) -> bool {
        builder.push(item);
        true
    }

    fn finish(builder: Vec<T>) -> Result<Self> {
        Ok(builder.into_boxed_slice())
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn try_for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&T) -> Result<()>,
    {
        self.iter().try_for_each(f)
    }

    fn for_each_item<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.iter().for_each(f)
    }
}

impl<T: Eq + Hash, S: BuildHasher + Default> SequenceShape for HashSet<T, S> {
    type Item = T;
    type Builder = HashSet<T, S>;

    fn builder(capacity: usize) -> HashSet<T, S> {
        HashSet::with_capacity_and_hasher(capacity, S::default())
    }

    fn push(builder: &mut HashSet<T, S>, item: T) -> bool {
        builder.insert(item)
    }

    fn finish(builder: HashSet<T, S>) -> Result<Self> {
        Ok(builder)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn try_for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&T) -> Result<()>,
    {
        self.iter().try_for_each(f)
    }

    fn for_each_item<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.iter().for_each(f)
    }
}

impl<T: Ord> SequenceShape for BTreeSet<T> {
    type Item = T;
    type Builder = BTreeSet<T>;

    fn builder(_capacity: usize) -> BTreeSet<T> {
        BTreeSet::new()
    }

    fn push(builder: &mut BTreeSet<T>, item: T) -> bool {
        builder.insert(item)
    }

    fn finish(builder: BTreeSet<T>) -> Result<Self> {
        Ok(builder)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn try_for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&T) -> Result<()>,
    {
        self.iter().try_for_each(f)
    }

    fn for_each_item<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.iter().for_each(f)
    }
}

impl<T, const N: usize> SequenceShape for [T; N] {
    type Item = T;
    type Builder = Vec<T>;

    fn builder(capacity: usize) -> Vec<T> {
        Vec::with_capacity(capacity.min(N))
    }

    fn push(builder: &mut Vec<T>, item: T) -> bool {
        builder.push(item);
        true
    }

    fn finish(builder: Vec<T>) -> Result<Self> {
        let len = builder.len();
        <[T; N]>::try_from(builder).map_err(|_| {
            FormatterError::decode_owned(0, format!("{ERR_LENGTH_MISMATCH}: {len} != {N}"))
        })
    }

    fn item_count(&self) -> usize {
        N
    }

    fn try_for_each<F>(&self, f: F) -> Result<()>
    where
        F: FnMut(&T) -> Result<()>,
    {
        self.iter().try_for_each(f)
    }

    fn for_each_item<F>(&self, f: F)
    where
        F: FnMut(&T),
    {
        self.iter().for_each(f)
    }
}

/// Element-driven formatter for any [`SequenceShape`]
pub struct CollectionFormatter<C: SequenceShape> {
    element: Arc<dyn Formatter<C::Item>>,
    fixed_len: Option<usize>,
    _collection: PhantomData<fn() -> C>,
}

impl<C: SequenceShape> CollectionFormatter<C> {
    pub fn new(element: Arc<dyn Formatter<C::Item>>) -> Self {
        Self {
            element,
            fixed_len: None,
            _collection: PhantomData,
        }
    }

    /// Require the decoded count to be exactly `len`.
    pub fn fixed(element: Arc<dyn Formatter<C::Item>>, len: usize) -> Self {
        Self {
            element,
            fixed_len: Some(len),
            _collection: PhantomData,
        }
    }
}

impl<C: SequenceShape> Formatter<C> for CollectionFormatter<C> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &C) -> Result<()> {
        buffer.nested(|buffer| {
            code::write_array_header(buffer, value.item_count())?;
            value.try_for_each(|item| self.element.serialize(buffer, item))
        })
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<C> {
        reader.nested(|reader| {
            let count = code::read_array_header(reader)?;
            if self.fixed_len.is_some_and(|len| len != count) {
                return Err(reader.fault(ERR_LENGTH_MISMATCH));
            }
            let mut builder = C::builder(count.min(reader.remaining()));
            for _ in 0..count {
                reader.check_cancelled()?;
                let offset = reader.consumed();
                let item = self.element.deserialize(reader)?;
                if !C::push(&mut builder, item) {
                    return Err(FormatterError::decode(offset as u64, ERR_DUPLICATE_KEY));
                }
            }
            C::finish(builder)
        })
    }

    fn get_length(&self, value: &C) -> u64 {
        let mut total = code::array_header_len(value.item_count());
        value.for_each_item(|item| total += self.element.get_length(item));
        total
    }

    fn default_length(&self) -> u64 {
        code::MAX_HEADER_LEN + DEFAULT_ELEMENT_BUDGET * self.element.default_length()
    }
}

/// Owned byte containers written with the binary layout
pub trait ByteShape: Sized {
    fn as_bytes(&self) -> &[u8];
    fn from_vec(bytes: Vec<u8>) -> Result<Self>;
}

impl ByteShape for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        Ok(bytes)
    }
}

impl ByteShape for Box<[u8]> {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        Ok(bytes.into_boxed_slice())
    }
}

impl ByteShape for Bytes {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        Ok(Bytes::from(bytes))
    }
}

impl<const N: usize> ByteShape for [u8; N] {
    fn as_bytes(&self) -> &[u8] {
        self
    }

    fn from_vec(bytes: Vec<u8>) -> Result<Self> {
        let len = bytes.len();
        <[u8; N]>::try_from(bytes).map_err(|_| {
            FormatterError::decode_owned(0, format!("{ERR_LENGTH_MISMATCH}: {len} != {N}"))
        })
    }
}

/// Bulk-copy formatter for byte containers
pub struct BinaryFormatter<B>(PhantomData<fn() -> B>);

impl<B> BinaryFormatter<B> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<B> Default for BinaryFormatter<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ByteShape> Formatter<B> for BinaryFormatter<B> {
    fn serialize(&self, buffer: &mut ByteBuffer, value: &B) -> Result<()> {
        code::write_bin(buffer, value.as_bytes())
    }

    fn deserialize(&self, reader: &mut SequenceReader) -> Result<B> {
        let start = reader.consumed() as u64;
        let bytes = code::read_bin(reader)?;
        B::from_vec(bytes).map_err(|e| match e {
            FormatterError::Decode { reason, .. } => FormatterError::Decode {
                offset: start,
                reason,
            },
            other => other,
        })
    }

    fn get_length(&self, value: &B) -> u64 {
        let len = value.as_bytes().len();
        code::bin_header_len(len) + len as u64
    }

    fn default_length(&self) -> u64 {
        code::MAX_HEADER_LEN + 64
    }
}

/// Binary formatter when `T` is `u8`, element-wise collection formatter otherwise.
fn sequence_formatter<C, T, B>(resolver: &Resolver) -> Result<Arc<dyn Formatter<C>>>
where
    C: SequenceShape<Item = T> + 'static,
    T: Formattable,
    B: ByteShape + 'static,
{
    if TypeId::of::<T>() == TypeId::of::<u8>() {
        let binary: Arc<dyn Formatter<B>> = Arc::new(BinaryFormatter::<B>::new());
        if let Some(formatter) = cast_formatter::<B, C>(binary) {
            return Ok(formatter);
        }
    }
    let element = resolver.get_formatter::<T>()?;
    Ok(Arc::new(CollectionFormatter::<C>::new(element)))
}

impl<T: Formattable> Formattable for Vec<T> {
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        sequence_formatter::<Self, T, Vec<u8>>(resolver)
    }
}

impl<T: Formattable> Formattable for Box<[T]> {
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        sequence_formatter::<Self, T, Box<[u8]>>(resolver)
    }
}

impl<T: Formattable, const N: usize> Formattable for [T; N] {
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        if TypeId::of::<T>() == TypeId::of::<u8>() {
            let binary: Arc<dyn Formatter<[u8; N]>> = Arc::new(BinaryFormatter::<[u8; N]>::new());
            if let Some(formatter) = cast_formatter::<[u8; N], Self>(binary) {
                return Ok(formatter);
            }
        }
        let element = resolver.get_formatter::<T>()?;
        Ok(Arc::new(CollectionFormatter::<Self>::fixed(element, N)))
    }
}

impl<T: Formattable> Formattable for VecDeque<T> {
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        let element = resolver.get_formatter::<T>()?;
        Ok(Arc::new(CollectionFormatter::<Self>::new(element)))
    }
}

impl<T, S> Formattable for HashSet<T, S>
where
    T: Formattable + Eq + Hash,
    S: BuildHasher + Default + 'static,
{
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        let element = resolver.get_formatter::<T>()?;
        Ok(Arc::new(CollectionFormatter::<Self>::new(element)))
    }
}

impl<T: Formattable + Ord> Formattable for BTreeSet<T> {
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        let element = resolver.get_formatter::<T>()?;
        Ok(Arc::new(CollectionFormatter::<Self>::new(element)))
    }
}

impl Formattable for Bytes {
    const KIND: FormatterKind = FormatterKind::Container;

    fn build_formatter(_resolver: &Resolver) -> Result<Arc<dyn Formatter<Self>>> {
        Ok(Arc::new(BinaryFormatter::<Bytes>::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::code::{BIN8, NIL};
    use crate::options::SerializerOptions;

    fn encode<T: Formattable>(value: &T) -> Vec<u8> {
        let formatter = Resolver::new().get_formatter::<T>().unwrap();
        let mut buffer = ByteBuffer::from_slice(&[]);
        formatter.serialize(&mut buffer, value).unwrap();
        assert!(formatter.get_length(value) >= buffer.len() as u64);
        buffer.to_vec().unwrap()
    }

    fn decode<T: Formattable>(bytes: &[u8]) -> Result<T> {
        let formatter = Resolver::new().get_formatter::<T>().unwrap();
        let mut buffer = ByteBuffer::from_slice(bytes);
        let mut reader = buffer.reader().unwrap();
        formatter.deserialize(&mut reader)
    }

    #[test]
    fn test_get_length_sums_every_element() {
        let value: Vec<u16> = (0..20).map(|n| n * 1000).collect();
        let formatter = Resolver::new().get_formatter::<Vec<u16>>().unwrap();
        assert_eq!(formatter.get_length(&value), 5 + 20 * 3);
        assert_eq!(encode(&value).len(), 65);

        let set: BTreeSet<u32> = [1, 2, 3].into_iter().collect();
        let formatter = Resolver::new().get_formatter::<BTreeSet<u32>>().unwrap();
        assert_eq!(formatter.get_length(&set), 1 + 3 * 5);
    }

    #[test]
    fn test_empty_vec_is_header_only() {
        assert_eq!(encode::<Vec<i32>>(&Vec::new()), vec![0x90]);
        assert_eq!(decode::<Vec<i32>>(&[0x90]).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn test_byte_vec_uses_binary_layout() {
        assert_eq!(encode(&vec![1u8, 2, 3]), vec![BIN8, 3, 1, 2, 3]);
        assert_eq!(decode::<Vec<u8>>(&[BIN8, 2, 9, 8]).unwrap(), vec![9, 8]);
        assert_eq!(encode(&[7u8; 2]), vec![BIN8, 2, 7, 7]);
        assert_eq!(
            decode::<Bytes>(&[BIN8, 1, 5]).unwrap(),
            Bytes::from_static(&[5])
        );
    }

    #[test]
    fn test_fixed_array_length_checked() {
        let bytes = encode(&[1u16, 2, 3]);
        assert_eq!(decode::<[u16; 3]>(&bytes).unwrap(), [1, 2, 3]);
        assert!(decode::<[u16; 2]>(&bytes).unwrap_err().is_decode_fault());
        assert!(decode::<[u8; 4]>(&[BIN8, 3, 1, 2, 3]).unwrap_err().is_decode_fault());
    }

    #[test]
    fn test_set_rejects_duplicates() {
        let err = decode::<HashSet<u8>>(&[0x92, 1, 1]).unwrap_err();
        assert!(err.to_string().contains(ERR_DUPLICATE_KEY));
        let set = decode::<BTreeSet<u8>>(&[0x92, 2, 1]).unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_nil_for_plain_vec_is_fault() {
        let err = decode::<Vec<String>>(&[NIL]).unwrap_err();
        assert!(err.to_string().contains(ERR_UNEXPECTED_NIL));
    }

    #[test]
    fn test_huge_header_rejected_before_allocation() {
        let formatter = Resolver::new().get_formatter::<Vec<u32>>().unwrap();
        let mut buffer = ByteBuffer::from_slice(&[0xDD, 0xFF, 0xFF, 0xFF, 0xFF]);
        buffer.set_options(SerializerOptions::default().with_max_collection_len(1024));
        let mut reader = buffer.reader().unwrap();
        let err = formatter.deserialize(&mut reader).unwrap_err();
        assert!(err.to_string().contains(ERR_COLLECTION_TOO_LONG));
    }

    #[test]
    fn test_truncated_elements_fail() {
        // Header promises three elements, only one present.
        assert!(decode::<Vec<u8>>(&[0x93, 1]).is_err());
        assert!(decode::<VecDeque<i32>>(&[0x93, 0xD2, 0, 0, 0, 1])
            .unwrap_err()
            .is_decode_fault());
    }
}
