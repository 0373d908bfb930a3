//! Foreign objects: streams, hash tables and host values behind opaque
//! handles.

use crate::atom_table::*;
use crate::machine::lib_machine::Term;
use crate::machine::streams::Stream;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::Arc;

/// A platform-level fault raised by a stream or a foreign object.
#[derive(Debug, Error)]
pub enum ForeignError {
    /// An I/O operation failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The object has no field of this name.
    #[error("{type_name} has no field {field}")]
    NoSuchField {
        /// The object's type name.
        type_name: String,
        /// The requested field.
        field: String,
    },
    /// The field cannot hold the given value.
    #[error("field {field} cannot hold {value}")]
    FieldType {
        /// The field being set.
        field: String,
        /// The rejected value, printed.
        value: String,
    },
    /// Any other fault reported by a foreign object.
    #[error("{0}")]
    Custom(String),
}

/// A host value reachable from logic programs through a foreign handle.
///
/// Field access defaults to [`ForeignError::NoSuchField`]. Implementors
/// downcast through `&dyn Any`.
pub trait ForeignValue: Any + Send + fmt::Debug {
    /// The name used in diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Reads a field as a term.
    fn get_field(&self, field: &str) -> Result<Term, ForeignError> {
        Err(ForeignError::NoSuchField {
            type_name: self.type_name().to_owned(),
            field: field.to_owned(),
        })
    }

    /// Stores a term into a field.
    fn set_field(&mut self, field: &str, value: Term) -> Result<(), ForeignError> {
        let _ = value;

        Err(ForeignError::NoSuchField {
            type_name: self.type_name().to_owned(),
            field: field.to_owned(),
        })
    }
}

/// A hash table of owned terms. Iteration follows insertion order.
#[derive(Debug, Default, Clone)]
pub struct TermHashTable {
    table: IndexMap<Term, Term, FxBuildHasher>,
}

impl TermHashTable {
    /// An empty table.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the value it replaces.
    #[inline]
    pub fn put(&mut self, key: Term, value: Term) -> Option<Term> {
        self.table.insert(key, value)
    }

    /// The value stored under `key`.
    #[inline]
    pub fn get(&self, key: &Term) -> Option<&Term> {
        self.table.get(key)
    }

    /// Removes `key`, keeping the order of the remaining entries.
    #[inline]
    pub fn remove(&mut self, key: &Term) -> Option<Term> {
        self.table.shift_remove(key)
    }

    /// True if `key` has a value.
    #[inline]
    pub fn contains_key(&self, key: &Term) -> bool {
        self.table.contains_key(key)
    }

    /// The number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if the table has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// The keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &Term> {
        self.table.keys()
    }

    /// Removes every entry.
    #[inline]
    pub fn clear(&mut self) {
        self.table.clear()
    }
}

/// The resource a foreign handle refers to.
#[derive(Debug)]
pub enum ForeignObject {
    /// A byte stream.
    Stream(Stream),
    /// A term hash table.
    HashTable(TermHashTable),
    /// A wrapped fault, carried by `foreign_error/1` conditions.
    Fault(ForeignError),
    /// A host value with named fields.
    Value(Box<dyn ForeignValue>),
}

impl ForeignObject {
    fn tag(&self) -> Atom {
        match self {
            ForeignObject::Stream(_) => atom!("$stream"),
            ForeignObject::HashTable(_) => atom!("$hash"),
            ForeignObject::Fault(_) => atom!("$fault"),
            ForeignObject::Value(_) => atom!("$object"),
        }
    }
}

#[derive(Debug)]
struct ForeignCell {
    tag: Atom,
    object: Mutex<ForeignObject>,
}

/// An opaque, shareable reference to a foreign object.
///
/// Handles compare and hash by identity. The tag names the kind of object
/// and never changes, even when a stream is closed.
#[derive(Clone)]
pub struct ForeignHandle {
    inner: Arc<ForeignCell>,
}

impl ForeignHandle {
    /// Wraps `object` in a fresh handle.
    pub fn new(object: ForeignObject) -> Self {
        ForeignHandle {
            inner: Arc::new(ForeignCell {
                tag: object.tag(),
                object: Mutex::new(object),
            }),
        }
    }

    /// A handle to `stream`.
    #[inline]
    pub fn from_stream(stream: Stream) -> Self {
        Self::new(ForeignObject::Stream(stream))
    }

    /// A handle to a host value.
    #[inline]
    pub fn from_value<T: ForeignValue>(value: T) -> Self {
        Self::new(ForeignObject::Value(Box::new(value)))
    }

    #[inline]
    pub(crate) fn from_fault(err: ForeignError) -> Self {
        Self::new(ForeignObject::Fault(err))
    }

    /// The kind of object: `$stream`, `$hash`, `$fault` or `$object`.
    #[inline]
    pub fn tag(&self) -> Atom {
        self.inner.tag
    }

    /// True for stream handles, open or closed.
    #[inline]
    pub fn is_stream(&self) -> bool {
        self.tag() == atom!("$stream")
    }

    /// True for hash table handles.
    #[inline]
    pub fn is_hash_table(&self) -> bool {
        self.tag() == atom!("$hash")
    }

    /// True for host value handles.
    #[inline]
    pub fn is_value(&self) -> bool {
        self.tag() == atom!("$object")
    }

    /// Locks the object for exclusive access. Must not be held across a
    /// call that may lock the same handle.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ForeignObject> {
        self.inner.object.lock()
    }

    /// Runs `f` on the stream behind this handle, if it is one.
    pub fn with_stream<R>(&self, f: impl FnOnce(&mut Stream) -> R) -> Option<R> {
        match &mut *self.lock() {
            ForeignObject::Stream(stream) => Some(f(stream)),
            _ => None,
        }
    }

    /// Runs `f` on the hash table behind this handle, if it is one.
    pub fn with_hash_table<R>(&self, f: impl FnOnce(&mut TermHashTable) -> R) -> Option<R> {
        match &mut *self.lock() {
            ForeignObject::HashTable(table) => Some(f(table)),
            _ => None,
        }
    }

    /// Runs `f` on the host value behind this handle if it has type `T`.
    pub fn downcast_with<T: ForeignValue, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        match &mut *self.lock() {
            ForeignObject::Value(value) => {
                let value: &mut dyn Any = &mut **value;
                value.downcast_mut::<T>().map(f)
            }
            _ => None,
        }
    }

    #[inline]
    fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl PartialEq for ForeignHandle {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ForeignHandle {}

impl Hash for ForeignHandle {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl fmt::Debug for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for ForeignHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", self.tag().quoted(), self.addr())
    }
}
