//! The type registry (§4.5): a bounded table associating a user type id
//! with the size of one element and the encoder/decoder pair used to
//! read and write it, consulted by the record layer whenever a caller
//! leaves a field's codec or allocation size implicit.
//!
//! The teacher's registries are all static (DBI stream indices, TPI
//! hash tables resolved at compile time); this one is the one place the
//! format genuinely needs dynamic dispatch, so type-erased closures
//! stand in for the C original's function pointers.

use std::any::Any;
use std::sync::Arc;

use derive_getters::Getters;

use crate::buffer::Buffer;
use crate::error::{Error, Result};

/// A type-erased encoder: writes the *value* form (no outer tag or
/// type id) of a boxed record.
pub type EncodeFn = Arc<dyn Fn(&mut Buffer, &dyn Any) -> Result<()> + Send + Sync>;

/// A type-erased decoder: reads the *value* form of a record and
/// returns it boxed.
pub type DecodeFn = Arc<dyn Fn(&mut Buffer) -> Result<Box<dyn Any>> + Send + Sync>;

/// One entry of the registry: everything needed to encode, decode, and
/// allocate storage for a single user record type.
#[derive(Clone, Getters)]
pub struct TypeSpec {
    typeid: i64,
    element_size: usize,
    encode: EncodeFn,
    decode: DecodeFn,
}

impl TypeSpec {
    pub fn new<T>(
        typeid: i64,
        element_size: usize,
        encode: impl Fn(&mut Buffer, &T) -> Result<()> + Send + Sync + 'static,
        decode: impl Fn(&mut Buffer) -> Result<T> + Send + Sync + 'static,
    ) -> Self
    where
        T: 'static,
    {
        TypeSpec {
            typeid,
            element_size,
            encode: Arc::new(move |buf, val| {
                let val = val.downcast_ref::<T>().ok_or_else(|| {
                    Error::Invalid(format!("registry encoder called with wrong type for id {typeid}"))
                })?;
                encode(buf, val)
            }),
            decode: Arc::new(move |buf| decode(buf).map(|v| Box::new(v) as Box<dyn Any>)),
        }
    }
}

/// Four allocator callbacks a registry routes decoder allocations
/// through, so that a caller may install an arena or an instrumented
/// allocator instead of the platform default.
pub trait Allocator: Send + Sync {
    fn alloc(&self, size: usize) -> Result<Box<[u8]>>;
    fn zalloc(&self, size: usize) -> Result<Box<[u8]>>;
    fn resize(&self, block: Box<[u8]>, new_size: usize) -> Result<Box<[u8]>>;
    fn free(&self, _block: Box<[u8]>) {}
}

/// Falls back to the platform allocator via `Vec`, the "defaults" the
/// spec describes for when a registry installs no custom allocator.
#[derive(Debug, Default)]
pub struct DefaultAllocator;

impl Allocator for DefaultAllocator {
    fn alloc(&self, size: usize) -> Result<Box<[u8]>> {
        let mut v = Vec::new();
        v.try_reserve_exact(size).map_err(|_| Error::NoMemory(size))?;
        v.resize(size, 0xAA);
        Ok(v.into_boxed_slice())
    }

    fn zalloc(&self, size: usize) -> Result<Box<[u8]>> {
        let mut v = Vec::new();
        v.try_reserve_exact(size).map_err(|_| Error::NoMemory(size))?;
        v.resize(size, 0);
        Ok(v.into_boxed_slice())
    }

    fn resize(&self, block: Box<[u8]>, new_size: usize) -> Result<Box<[u8]>> {
        let mut v = block.into_vec();
        v.try_reserve_exact(new_size.saturating_sub(v.len())).map_err(|_| Error::NoMemory(new_size))?;
        v.resize(new_size, 0);
        Ok(v.into_boxed_slice())
    }
}

/// Finite table of [`TypeSpec`]s plus the allocator callbacks used for
/// decode-time allocation. Lookup is a linear scan, which the spec notes
/// is adequate for the expected cardinality of a few tens of types.
pub struct Registry<'a> {
    slots: Vec<Option<TypeSpec>>,
    owns_slots: bool,
    allocator: Box<dyn Allocator + 'a>,
}

impl<'a> Default for Registry<'a> {
    fn default() -> Self {
        Registry {
            slots: Vec::new(),
            owns_slots: true,
            allocator: Box::new(DefaultAllocator),
        }
    }
}

impl<'a> Registry<'a> {
    /// An empty registry with room for `capacity` entries before
    /// `register` needs to grow the table.
    pub fn with_capacity(capacity: usize) -> Self {
        Registry {
            slots: Vec::with_capacity(capacity),
            owns_slots: true,
            allocator: Box::new(DefaultAllocator),
        }
    }

    /// A registry built from a caller-supplied, already-populated table.
    /// Its slot storage is treated as borrowed: `release` will not drop
    /// it early (there's nothing more to release than dropping `self`
    /// already does, but the fixed-capacity intent is preserved by never
    /// growing `slots` past what was handed in).
    pub fn from_fixed(specs: Vec<TypeSpec>) -> Self {
        Registry {
            slots: specs.into_iter().map(Some).collect(),
            owns_slots: false,
            allocator: Box::new(DefaultAllocator),
        }
    }

    pub fn with_allocator(mut self, allocator: impl Allocator + 'a) -> Self {
        self.allocator = Box::new(allocator);
        self
    }

    pub fn allocator(&self) -> &dyn Allocator {
        self.allocator.as_ref()
    }

    pub fn find(&self, typeid: i64) -> Option<&TypeSpec> {
        self.slots.iter().flatten().find(|spec| spec.typeid == typeid)
    }

    /// Places `spec` into the first free slot (one whose `typeid` was
    /// zeroed by `unregister`), or appends it. Returns the slot index.
    pub fn register(&mut self, spec: TypeSpec) -> usize {
        if let Some(free) = self.slots.iter().position(|s| s.is_none()) {
            self.slots[free] = Some(spec);
            return free;
        }
        self.slots.push(Some(spec));
        self.slots.len() - 1
    }

    /// Marks the slot holding `typeid` as free. Invariant (§3): at most
    /// one live entry carries a given `typeid`, so this clears the
    /// first match.
    pub fn unregister(&mut self, typeid: i64) -> bool {
        if let Some(slot) = self.slots.iter_mut().find(|s| matches!(s, Some(spec) if spec.typeid == typeid)) {
            *slot = None;
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn owns_slots(&self) -> bool {
        self.owns_slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_spec(typeid: i64) -> TypeSpec {
        TypeSpec::new::<u32>(
            typeid,
            4,
            |buf, v| buf.write_uvarint(*v as u64).map(|_| ()),
            |buf| buf.read_uvarint().map(|v| v as u32),
        )
    }

    #[test]
    fn find_register_unregister_roundtrip() {
        let mut reg = Registry::default();
        assert!(reg.find(100).is_none());

        let idx = reg.register(dummy_spec(100));
        assert_eq!(idx, 0);
        assert!(reg.find(100).is_some());
        assert_eq!(reg.len(), 1);

        assert!(reg.unregister(100));
        assert!(reg.find(100).is_none());
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn register_reuses_freed_slot() {
        let mut reg = Registry::default();
        reg.register(dummy_spec(1));
        reg.register(dummy_spec(2));
        reg.unregister(1);
        let idx = reg.register(dummy_spec(3));
        assert_eq!(idx, 0);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn default_allocator_zeroes_zalloc() {
        let alloc = DefaultAllocator;
        let block = alloc.zalloc(8).unwrap();
        assert_eq!(&*block, &[0u8; 8]);
    }
}
