//! Dereferencing, unification and structural identity.

use crate::machine::machine_state::*;
use crate::types::*;

use fxhash::FxHashSet;
use smallvec::SmallVec;

/// The heap address that identifies a compound cell.
#[inline]
fn compound_addr(cell: &HeapCellValue) -> Option<usize> {
    match cell {
        HeapCellValue::Str(s) => Some(*s),
        HeapCellValue::Lis(l) => Some(*l),
        _ => None,
    }
}

impl MachineState {
    /// Follows variable bindings until reaching an unbound variable or a
    /// non-variable cell.
    pub fn deref(&self, mut cell: HeapCellValue) -> HeapCellValue {
        while let HeapCellValue::Var(h) = cell {
            match &self.heap[h] {
                HeapCellValue::Var(h1) if *h1 == h => break,
                value => cell = value.clone(),
            }
        }

        cell
    }

    /// Binds the unbound variable at `h` to `value`, recording it on the
    /// trail.
    #[inline]
    pub(crate) fn bind(&mut self, h: usize, value: HeapCellValue) {
        self.heap[h] = value;
        self.trail.push(h);
    }

    /// Unifies two cells, using the occurs check if the engine was built
    /// with it.
    ///
    /// A failed unification leaves the bindings it made before failing in
    /// place; callers that continue after failure undo to a trail mark taken
    /// beforehand.
    #[inline]
    pub fn unify(&mut self, a: HeapCellValue, b: HeapCellValue) -> bool {
        let occurs_check = self.occurs_check;
        self.unify_internal(a, b, occurs_check)
    }

    /// Unifies two cells, refusing to bind a variable to a term containing
    /// it.
    #[inline]
    pub fn unify_with_occurs_check(&mut self, a: HeapCellValue, b: HeapCellValue) -> bool {
        self.unify_internal(a, b, true)
    }

    fn unify_internal(&mut self, a: HeapCellValue, b: HeapCellValue, occurs_check: bool) -> bool {
        let mut pdl: SmallVec<[(HeapCellValue, HeapCellValue); 16]> = SmallVec::new();
        // compound pairs already being compared. revisiting one means both
        // sides are cyclic and the pair is consistent so far.
        let mut visited: FxHashSet<(usize, usize)> = FxHashSet::default();

        pdl.push((a, b));

        while let Some((a, b)) = pdl.pop() {
            let a = self.deref(a);
            let b = self.deref(b);

            match (&a, &b) {
                (HeapCellValue::Var(h1), HeapCellValue::Var(h2)) => {
                    // the newer variable is bound to the older one.
                    if h1 < h2 {
                        self.bind(*h2, a.clone());
                    } else if h1 > h2 {
                        self.bind(*h1, b.clone());
                    }
                }
                (HeapCellValue::Var(h), _) => {
                    if occurs_check && self.occurs(*h, &b) {
                        return false;
                    }

                    self.bind(*h, b.clone());
                }
                (_, HeapCellValue::Var(h)) => {
                    if occurs_check && self.occurs(*h, &a) {
                        return false;
                    }

                    self.bind(*h, a.clone());
                }
                (HeapCellValue::Atom(n1), HeapCellValue::Atom(n2)) => {
                    if n1 != n2 {
                        return false;
                    }
                }
                (HeapCellValue::Fixnum(n1), HeapCellValue::Fixnum(n2)) => {
                    if n1 != n2 {
                        return false;
                    }
                }
                (HeapCellValue::Float(f1), HeapCellValue::Float(f2)) => {
                    if f1 != f2 {
                        return false;
                    }
                }
                (HeapCellValue::Foreign(h1), HeapCellValue::Foreign(h2)) => {
                    if h1 != h2 {
                        return false;
                    }
                }
                (
                    HeapCellValue::Str(_) | HeapCellValue::Lis(_),
                    HeapCellValue::Str(_) | HeapCellValue::Lis(_),
                ) => {
                    let (s1, s2) = match (compound_addr(&a), compound_addr(&b)) {
                        (Some(s1), Some(s2)) => (s1, s2),
                        _ => return false,
                    };

                    if s1 == s2 && std::mem::discriminant(&a) == std::mem::discriminant(&b) {
                        continue;
                    }

                    if self.heap.name_and_arity(&a) != self.heap.name_and_arity(&b) {
                        return false;
                    }

                    if !visited.insert((s1, s2)) {
                        continue;
                    }

                    let args1 = self.heap.args(&a);
                    let args2 = self.heap.args(&b);

                    // pushed in reverse so the leftmost pair is unified first.
                    for pair in args1.into_iter().zip(args2).rev() {
                        pdl.push(pair);
                    }
                }
                _ => return false,
            }
        }

        true
    }

    /// True if the unbound variable at `h` occurs in `cell`.
    fn occurs(&self, h: usize, cell: &HeapCellValue) -> bool {
        let mut stack = vec![cell.clone()];
        let mut visited = FxHashSet::default();

        while let Some(cell) = stack.pop() {
            match self.deref(cell) {
                HeapCellValue::Var(h1) => {
                    if h1 == h {
                        return true;
                    }
                }
                cell @ (HeapCellValue::Str(_) | HeapCellValue::Lis(_)) => {
                    if let Some(addr) = compound_addr(&cell) {
                        if visited.insert(addr) {
                            stack.extend(self.heap.args(&cell));
                        }
                    }
                }
                _ => {}
            }
        }

        false
    }

    /// True if the two cells are structurally identical without binding
    /// anything.
    pub fn is_identical(&self, a: HeapCellValue, b: HeapCellValue) -> bool {
        let mut pdl = vec![(a, b)];
        let mut visited: FxHashSet<(usize, usize)> = FxHashSet::default();

        while let Some((a, b)) = pdl.pop() {
            let a = self.deref(a);
            let b = self.deref(b);

            match (&a, &b) {
                (
                    HeapCellValue::Str(_) | HeapCellValue::Lis(_),
                    HeapCellValue::Str(_) | HeapCellValue::Lis(_),
                ) => {
                    if self.heap.name_and_arity(&a) != self.heap.name_and_arity(&b) {
                        return false;
                    }

                    if let (Some(s1), Some(s2)) = (compound_addr(&a), compound_addr(&b)) {
                        if visited.insert((s1, s2)) {
                            let args = self.heap.args(&a).into_iter().zip(self.heap.args(&b));
                            pdl.extend(args);
                        }
                    }
                }
                _ if a != b => return false,
                _ => {}
            }
        }

        true
    }
}
