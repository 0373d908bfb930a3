//! The binding trail.

use crate::machine::heap::Heap;
use crate::types::*;

/// The undo log of variable bindings.
///
/// Every binding is recorded. The trail grows during forward execution and
/// only ever shrinks by [`undo_to`](Trail::undo_to) a previously taken mark.
#[derive(Debug, Default)]
pub struct Trail {
    entries: Vec<usize>,
}

impl Trail {
    /// An empty trail.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current position, to undo back to later.
    #[inline]
    pub fn mark(&self) -> usize {
        self.entries.len()
    }

    /// The number of recorded bindings.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub(crate) fn push(&mut self, h: usize) {
        self.entries.push(h);
    }

    /// Resets every variable bound after `mark` to unbound, most recent
    /// first, then truncates the trail to `mark`.
    pub fn undo_to(&mut self, mark: usize, heap: &mut Heap) {
        for &h in self.entries[mark..].iter().rev() {
            if h < heap.cell_len() {
                heap[h] = HeapCellValue::Var(h);
            }
        }

        self.entries.truncate(mark);
    }
}
