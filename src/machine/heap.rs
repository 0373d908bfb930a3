//! The term arena.

use crate::atom_table::*;
use crate::types::*;

use std::ops::{Index, IndexMut};

/// The term arena. Every term built during a query lives here and is
/// addressed by index; backtracking truncates it back to the top saved in
/// the choice point.
#[derive(Debug, Default)]
pub struct Heap {
    cells: Vec<HeapCellValue>,
}

impl Heap {
    /// An empty heap.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty heap with room for `cap` cells.
    #[inline]
    pub fn with_capacity(cap: usize) -> Self {
        Heap {
            cells: Vec::with_capacity(cap),
        }
    }

    /// The number of cells, i.e. the address of the next one.
    #[inline]
    pub fn cell_len(&self) -> usize {
        self.cells.len()
    }

    /// True if no cell has been allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub(crate) fn push(&mut self, cell: HeapCellValue) -> usize {
        let h = self.cells.len();
        self.cells.push(cell);
        h
    }

    #[inline]
    pub(crate) fn truncate(&mut self, h: usize) {
        self.cells.truncate(h);
    }

    /// Allocates a fresh unbound variable.
    #[inline]
    pub fn new_var(&mut self) -> HeapCellValue {
        let h = self.cells.len();
        self.cells.push(HeapCellValue::Var(h));
        HeapCellValue::Var(h)
    }

    /// Builds `name(args...)`. A structure of no arguments is the atom
    /// `name`.
    pub fn put_structure(&mut self, name: Atom, args: &[HeapCellValue]) -> HeapCellValue {
        if args.is_empty() {
            return HeapCellValue::Atom(name);
        }

        let s = self.push(HeapCellValue::Functor(name, args.len()));
        self.cells.extend_from_slice(args);

        HeapCellValue::Str(s)
    }

    /// Builds the cons cell `[head|tail]`.
    pub fn put_list_cell(&mut self, head: HeapCellValue, tail: HeapCellValue) -> HeapCellValue {
        let l = self.push(head);
        self.push(tail);

        HeapCellValue::Lis(l)
    }

    /// Builds a list of `items` ending in `tail`. With no items the result
    /// is `tail` itself.
    pub fn put_list<I>(&mut self, items: I, tail: HeapCellValue) -> HeapCellValue
    where
        I: IntoIterator<Item = HeapCellValue>,
    {
        let mut items = items.into_iter().peekable();

        if items.peek().is_none() {
            return tail;
        }

        let start = self.cells.len();

        while let Some(item) = items.next() {
            self.push(item);

            // the next car sits just past this cdr slot.
            let cdr = if items.peek().is_some() {
                HeapCellValue::Lis(self.cells.len() + 1)
            } else {
                tail.clone()
            };

            self.push(cdr);
        }

        HeapCellValue::Lis(start)
    }

    /// The name and arity of a compound or atomic cell. Lists answer
    /// `'.'/2`, atoms answer arity 0. Variables and numbers answer `None`.
    pub fn name_and_arity(&self, cell: &HeapCellValue) -> Option<(Atom, usize)> {
        match cell {
            HeapCellValue::Atom(name) => Some((*name, 0)),
            HeapCellValue::Lis(_) => Some((atom!("."), 2)),
            HeapCellValue::Str(s) => match &self.cells[*s] {
                HeapCellValue::Functor(name, arity) => Some((*name, *arity)),
                _ => None,
            },
            _ => None,
        }
    }

    /// The `i`th argument (1-based) of a compound cell, not dereferenced.
    pub fn arg(&self, cell: &HeapCellValue, i: usize) -> Option<HeapCellValue> {
        match cell {
            HeapCellValue::Str(s) => match &self.cells[*s] {
                HeapCellValue::Functor(_, arity) if (1..=*arity).contains(&i) => {
                    Some(self.cells[s + i].clone())
                }
                _ => None,
            },
            HeapCellValue::Lis(l) if i == 1 || i == 2 => Some(self.cells[l + i - 1].clone()),
            _ => None,
        }
    }

    /// All arguments of a compound cell, in order. Empty for atoms.
    pub fn args(&self, cell: &HeapCellValue) -> Vec<HeapCellValue> {
        match cell {
            HeapCellValue::Str(s) => match &self.cells[*s] {
                HeapCellValue::Functor(_, arity) => self.cells[s + 1..=s + arity].to_vec(),
                _ => vec![],
            },
            HeapCellValue::Lis(l) => self.cells[*l..l + 2].to_vec(),
            _ => vec![],
        }
    }
}

impl Index<usize> for Heap {
    type Output = HeapCellValue;

    #[inline]
    fn index(&self, h: usize) -> &Self::Output {
        &self.cells[h]
    }
}

impl IndexMut<usize> for Heap {
    #[inline]
    fn index_mut(&mut self, h: usize) -> &mut Self::Output {
        &mut self.cells[h]
    }
}
