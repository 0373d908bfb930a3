//! Printing heap terms for traces and error messages.

use crate::atom_table::*;
use crate::machine::heap::Heap;
use crate::machine::machine_state::MachineState;
use crate::types::*;

use ordered_float::OrderedFloat;

use std::fmt::Write;

/// Formats a float so that it reads back as a float, e.g. `1.0e10`.
pub fn fmt_float(mut fl: f64) -> String {
    if OrderedFloat(fl) == -0f64 {
        fl = 0f64;
    }

    let mut buffer = ryu::Buffer::new();
    let fl_str = buffer.format(fl);

    // ryu prints integral floats in scientific notation without a fractional
    // part, which does not read back as a float.
    if let Some(e_index) = fl_str.find('e') {
        if !fl_str[0..e_index].contains('.') {
            return fl_str[0..e_index].to_string() + ".0" + &fl_str[e_index..];
        }
    }

    fl_str.to_string()
}

/// Prints heap terms in canonical form, without operators.
///
/// Printing stops descending once `max_depth` nested terms or list
/// elements have been printed, writing `...` in their place, so cyclic
/// terms print in bounded space. A `max_depth` of 0 disables the bound and
/// must only be used on terms known to be acyclic.
#[derive(Debug)]
pub struct HCPrinter<'a> {
    machine_st: &'a MachineState,
    output: String,
    /// Quote atoms that would not read back unquoted.
    pub quoted: bool,
    /// The nesting bound; 0 for none.
    pub max_depth: usize,
}

impl<'a> HCPrinter<'a> {
    /// A printer over the heap of `machine_st`, quoting atoms, unbounded.
    pub fn new(machine_st: &'a MachineState) -> Self {
        HCPrinter {
            machine_st,
            output: String::new(),
            quoted: true,
            max_depth: 0,
        }
    }

    #[inline]
    fn heap(&self) -> &'a Heap {
        &self.machine_st.heap
    }

    /// Prints `cell`, consuming the printer.
    pub fn print(mut self, cell: HeapCellValue) -> String {
        let depth = self.max_depth;
        self.print_cell(cell, depth);
        self.output
    }

    /// Prints a goal of the given name and argument cells.
    pub fn print_goal(mut self, name: Atom, args: &[HeapCellValue]) -> String {
        let depth = self.max_depth;
        self.print_functor(name, args, depth);
        self.output
    }

    #[inline]
    fn exhausted(&self, depth: usize) -> bool {
        self.max_depth > 0 && depth == 0
    }

    #[inline]
    fn descend(depth: usize) -> usize {
        depth.saturating_sub(1)
    }

    fn print_atom(&mut self, name: Atom) {
        if self.quoted {
            self.output.push_str(&name.quoted());
        } else {
            self.output.push_str(name.as_str());
        }
    }

    fn print_functor(&mut self, name: Atom, args: &[HeapCellValue], depth: usize) {
        self.print_atom(name);

        if args.is_empty() {
            return;
        }

        self.output.push('(');

        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.output.push(',');
            }

            self.print_cell(arg.clone(), depth);
        }

        self.output.push(')');
    }

    fn print_cell(&mut self, cell: HeapCellValue, depth: usize) {
        if self.exhausted(depth) {
            self.output.push_str("...");
            return;
        }

        match self.machine_st.deref(cell) {
            HeapCellValue::Var(h) => {
                let _ = write!(self.output, "_{}", h);
            }
            HeapCellValue::Atom(name) => self.print_atom(name),
            HeapCellValue::Fixnum(n) => {
                let _ = write!(self.output, "{}", n);
            }
            HeapCellValue::Float(n) => self.output.push_str(&fmt_float(n.0)),
            HeapCellValue::Foreign(handle) => {
                let _ = write!(self.output, "{}", handle);
            }
            cell @ HeapCellValue::Lis(_) => self.print_list(cell, depth),
            cell @ HeapCellValue::Str(_) => match self.heap().name_and_arity(&cell) {
                Some((name, _)) => {
                    let args = self.heap().args(&cell);
                    self.print_functor(name, &args, Self::descend(depth));
                }
                None => self.output.push_str("..."),
            },
            HeapCellValue::Functor(name, arity) => {
                let _ = write!(self.output, "{}/{}", name.quoted(), arity);
            }
        }
    }

    fn print_list(&mut self, mut cell: HeapCellValue, mut depth: usize) {
        self.output.push('[');

        let mut first = true;

        loop {
            match &cell {
                HeapCellValue::Lis(l) => {
                    if !first {
                        self.output.push(',');
                    }

                    if self.exhausted(depth) {
                        self.output.push_str("...");
                        break;
                    }

                    let l = *l;
                    let head = self.heap()[l].clone();

                    self.print_cell(head, Self::descend(depth));

                    depth = Self::descend(depth);
                    first = false;
                    cell = self.machine_st.deref(self.heap()[l + 1].clone());
                }
                tail if tail.is_nil() => break,
                tail => {
                    self.output.push('|');
                    self.print_cell(tail.clone(), depth);
                    break;
                }
            }
        }

        self.output.push(']');
    }
}
