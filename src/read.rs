//! Writing owned terms onto the heap.

use crate::atom_table::Atom;
use crate::machine::heap::Heap;
use crate::machine::lib_machine::Term;
use crate::types::*;

use indexmap::IndexMap;

/// Named variables of a written term, in order of first appearance.
pub type HeapVarDict = IndexMap<String, HeapCellValue>;

/// Writes `term` onto the heap, returning the cell that refers to it.
///
/// Variables with the same name share one heap variable, recorded in
/// `var_dict` so later writes reuse them; `_` is always fresh. Arguments are
/// written before the structures that hold them.
pub(crate) fn write_term_to_heap(
    heap: &mut Heap,
    term: &Term,
    var_dict: &mut HeapVarDict,
) -> HeapCellValue {
    let mut writer = TermWriter {
        heap,
        var_dict,
        frames: vec![WriteFrame::Term(term)],
        cells: vec![],
    };

    writer.write()
}

enum WriteFrame<'t> {
    Term(&'t Term),
    /// Builds a structure from the last `arity` written cells.
    Structure(Atom, usize),
    /// Builds a proper list from the last `len` written cells.
    List(usize),
    /// Builds a list cell from the last two written cells.
    Cons,
}

struct TermWriter<'a, 't> {
    heap: &'a mut Heap,
    var_dict: &'a mut HeapVarDict,
    frames: Vec<WriteFrame<'t>>,
    cells: Vec<HeapCellValue>,
}

impl<'t> TermWriter<'_, 't> {
    fn push_args(&mut self, args: &'t [Term]) {
        self.frames.extend(args.iter().rev().map(WriteFrame::Term));
    }

    fn write_leaf(&mut self, term: &Term) -> HeapCellValue {
        match term {
            Term::Integer(n) => HeapCellValue::Fixnum(*n),
            Term::Float(n) => HeapCellValue::Float(*n),
            Term::Atom(name) => HeapCellValue::Atom(atom!(name.as_str())),
            Term::Foreign(handle) => HeapCellValue::Foreign(handle.clone()),
            Term::Var(name) if name == "_" => self.heap.new_var(),
            Term::Var(name) => {
                if let Some(cell) = self.var_dict.get(name) {
                    return cell.clone();
                }

                let cell = self.heap.new_var();
                self.var_dict.insert(name.clone(), cell.clone());
                cell
            }
            Term::List(_) | Term::Compound(..) => unreachable!("compound terms are framed"),
        }
    }

    fn write(&mut self) -> HeapCellValue {
        while let Some(frame) = self.frames.pop() {
            match frame {
                WriteFrame::Term(Term::List(elems)) => {
                    self.frames.push(WriteFrame::List(elems.len()));
                    self.push_args(elems);
                }
                WriteFrame::Term(Term::Compound(name, args)) if name == "." && args.len() == 2 => {
                    self.frames.push(WriteFrame::Cons);
                    self.push_args(args);
                }
                WriteFrame::Term(Term::Compound(name, args)) => {
                    self.frames
                        .push(WriteFrame::Structure(atom!(name.as_str()), args.len()));
                    self.push_args(args);
                }
                WriteFrame::Term(term) => {
                    let cell = self.write_leaf(term);
                    self.cells.push(cell);
                }
                WriteFrame::Structure(name, arity) => {
                    let args = self.cells.split_off(self.cells.len() - arity);
                    let cell = self.heap.put_structure(name, &args);
                    self.cells.push(cell);
                }
                WriteFrame::List(len) => {
                    let elems = self.cells.split_off(self.cells.len() - len);
                    let cell = self.heap.put_list(elems, empty_list_as_cell!());
                    self.cells.push(cell);
                }
                WriteFrame::Cons => {
                    let args = self.cells.split_off(self.cells.len() - 2);
                    let cell = self.heap.put_list_cell(args[0].clone(), args[1].clone());
                    self.cells.push(cell);
                }
            }
        }

        match self.cells.pop() {
            Some(cell) => cell,
            None => unreachable!("every frame leaves one cell"),
        }
    }
}
