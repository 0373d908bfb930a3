//! Heap cells and the small value types shared across the engine.

use crate::atom_table::*;
use crate::machine::foreign::ForeignHandle;

use ordered_float::OrderedFloat;

use std::fmt;

/// A name/arity pair identifying a predicate.
pub type PredicateKey = (Atom, usize);

/// A single cell of the term heap.
///
/// Cells are the engine's term references: a `Var(h)` cell points at heap
/// slot `h`, which holds `Var(h)` itself while the variable is unbound and
/// the bound value otherwise. `Str(s)` points at a `Functor` header whose
/// arguments occupy the following `arity` slots; `Lis(l)` points at a car
/// cell at `l` followed by its cdr at `l + 1`.
#[derive(Clone, PartialEq)]
pub enum HeapCellValue {
    /// A variable reference.
    Var(usize),
    /// An atom, including `[]`.
    Atom(Atom),
    /// An integer.
    Fixnum(i64),
    /// A floating point number.
    Float(OrderedFloat<f64>),
    /// A compound structure.
    Str(usize),
    /// A list cell.
    Lis(usize),
    /// The header of a compound structure. Only found at `Str` targets.
    Functor(Atom, usize),
    /// An opaque foreign-object handle.
    Foreign(ForeignHandle),
}

impl HeapCellValue {
    /// True for a variable reference. Only meaningful on dereferenced cells.
    #[inline]
    pub fn is_var(&self) -> bool {
        matches!(self, HeapCellValue::Var(_))
    }

    /// True for any atom, `[]` included.
    #[inline]
    pub fn is_atom(&self) -> bool {
        matches!(self, HeapCellValue::Atom(_))
    }

    /// True for integers.
    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, HeapCellValue::Fixnum(_))
    }

    /// True for integers and floats.
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, HeapCellValue::Fixnum(_) | HeapCellValue::Float(_))
    }

    /// True for the empty list atom.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, HeapCellValue::Atom(name) if *name == atom!("[]"))
    }

    /// True for a non-empty list cell.
    #[inline]
    pub fn is_list(&self) -> bool {
        matches!(self, HeapCellValue::Lis(_))
    }

    /// True for compound terms, list cells included.
    #[inline]
    pub fn is_compound(&self) -> bool {
        matches!(self, HeapCellValue::Str(_) | HeapCellValue::Lis(_))
    }

    /// True for foreign-object handles.
    #[inline]
    pub fn is_foreign(&self) -> bool {
        matches!(self, HeapCellValue::Foreign(_))
    }

    /// True for atoms, numbers and foreign handles.
    #[inline]
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            HeapCellValue::Atom(_)
                | HeapCellValue::Fixnum(_)
                | HeapCellValue::Float(_)
                | HeapCellValue::Foreign(_)
        )
    }

    /// The heap slot of a variable reference.
    #[inline]
    pub fn as_var(&self) -> Option<usize> {
        match self {
            HeapCellValue::Var(h) => Some(*h),
            _ => None,
        }
    }

    /// The atom of an atom cell.
    #[inline]
    pub fn as_atom(&self) -> Option<Atom> {
        match self {
            HeapCellValue::Atom(name) => Some(*name),
            _ => None,
        }
    }

    /// The value of an integer cell.
    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            HeapCellValue::Fixnum(n) => Some(*n),
            _ => None,
        }
    }

    /// The handle of a foreign cell.
    #[inline]
    pub fn as_foreign(&self) -> Option<&ForeignHandle> {
        match self {
            HeapCellValue::Foreign(handle) => Some(handle),
            _ => None,
        }
    }
}

impl From<Atom> for HeapCellValue {
    #[inline]
    fn from(name: Atom) -> Self {
        HeapCellValue::Atom(name)
    }
}

impl From<i64> for HeapCellValue {
    #[inline]
    fn from(n: i64) -> Self {
        HeapCellValue::Fixnum(n)
    }
}

impl From<f64> for HeapCellValue {
    #[inline]
    fn from(f: f64) -> Self {
        HeapCellValue::Float(OrderedFloat(f))
    }
}

impl From<ForeignHandle> for HeapCellValue {
    #[inline]
    fn from(handle: ForeignHandle) -> Self {
        HeapCellValue::Foreign(handle)
    }
}

impl fmt::Debug for HeapCellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapCellValue::Var(h) => write!(f, "Var({})", h),
            HeapCellValue::Atom(name) => write!(f, "Atom({})", name.quoted()),
            HeapCellValue::Fixnum(n) => write!(f, "Fixnum({})", n),
            HeapCellValue::Float(n) => write!(f, "Float({})", n),
            HeapCellValue::Str(s) => write!(f, "Str({})", s),
            HeapCellValue::Lis(l) => write!(f, "Lis({})", l),
            HeapCellValue::Functor(name, arity) => {
                write!(f, "Functor({}/{})", name.quoted(), arity)
            }
            HeapCellValue::Foreign(handle) => write!(f, "Foreign({:?})", handle),
        }
    }
}

/// A saved or-stack depth. Cutting to a barrier discards every choice point
/// pushed after it was captured.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CutBarrier(pub(crate) usize);

impl CutBarrier {
    /// The or-stack depth this barrier restores on cut.
    #[inline]
    pub fn depth(self) -> usize {
        self.0
    }
}
