//! The host-facing API: owned terms, leaf answers and query iterators.

use std::collections::BTreeMap;
use std::fmt;

use crate::atom_table::*;
use crate::heap_print::fmt_float;
use crate::machine::code::*;
use crate::machine::foreign::ForeignHandle;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::{HeapMark, MachineState};
use crate::machine::Machine;
use crate::read::write_term_to_heap;
use crate::types::*;

use fxhash::FxHashSet;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;


/// Represents a leaf answer from a query.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafAnswer {
    /// A `true` leaf answer.
    True,
    /// A `false` leaf answer.
    ///
    /// This means that there are no more answers for the query.
    False,
    /// An exception leaf answer.
    Exception(Term),
    /// A leaf answer with bindings.
    #[non_exhaustive]
    LeafAnswer {
        /// The bindings of variables in the query.
        bindings: BTreeMap<String, Term>,
    },
}

impl LeafAnswer {
    /// Creates a leaf answer from its bindings.
    pub fn from_bindings<S: Into<String>>(bindings: impl IntoIterator<Item = (S, Term)>) -> Self {
        LeafAnswer::LeafAnswer {
            bindings: bindings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// A term owned outside the heap.
///
/// Owned terms carry conditions, hash-table entries and answers across
/// backtracking, which truncates the heap they were read from.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// An integer.
    Integer(i64),
    /// A float.
    Float(OrderedFloat<f64>),
    /// A Prolog atom.
    Atom(String),
    /// A proper Prolog list. `[]` is the empty list.
    List(Vec<Term>),
    /// A Prolog compound term. Partial lists are `'.'/2` compounds.
    Compound(String, Vec<Term>),
    /// A Prolog variable.
    Var(String),
    /// An opaque foreign-object handle.
    Foreign(ForeignHandle),
}

impl Term {
    /// Creates an integer term.
    pub fn integer(value: impl Into<i64>) -> Self {
        Term::Integer(value.into())
    }

    /// Creates a float term.
    pub fn float(value: impl Into<f64>) -> Self {
        Term::Float(OrderedFloat(value.into()))
    }

    /// Creates an atom term.
    pub fn atom(value: impl Into<String>) -> Self {
        Term::Atom(value.into())
    }

    /// Creates a list term.
    pub fn list(value: impl IntoIterator<Item = Term>) -> Self {
        Term::List(value.into_iter().collect())
    }

    /// Creates a compound term.
    pub fn compound(functor: impl Into<String>, args: impl IntoIterator<Item = Term>) -> Self {
        Term::Compound(functor.into(), args.into_iter().collect())
    }

    /// Creates a variable.
    pub fn variable(value: impl Into<String>) -> Self {
        Term::Var(value.into())
    }

    /// Creates a conjunction, giving the atom `true` if empty.
    pub fn conjunction(value: impl IntoIterator<Item = Term>) -> Self {
        Term::try_conjunction(value).unwrap_or(Term::atom("true"))
    }

    /// Creates a conjunction, giving `None` if empty.
    pub fn try_conjunction(value: impl IntoIterator<Item = Term>) -> Option<Self> {
        Term::fold_right(",", value)
    }

    /// Creates a disjunction, giving the atom `false` if empty.
    pub fn disjunction(value: impl IntoIterator<Item = Term>) -> Self {
        Term::try_disjunction(value).unwrap_or(Term::atom("false"))
    }

    /// Creates a disjunction, giving `None` if empty.
    pub fn try_disjunction(value: impl IntoIterator<Item = Term>) -> Option<Self> {
        Term::fold_right(";", value)
    }

    fn fold_right(op: &str, value: impl IntoIterator<Item = Term>) -> Option<Self> {
        let mut terms: Vec<_> = value.into_iter().collect();
        let last = terms.pop()?;

        Some(
            terms
                .into_iter()
                .rev()
                .fold(last, |rest, term| Term::compound(op, [term, rest])),
        )
    }

    fn is_infix_op(&self) -> bool {
        matches!(self, Term::Compound(name, args) if args.len() == 2 && infix_op(name))
    }
}

fn infix_op(name: &str) -> bool {
    matches!(name, "/" | "-" | "+" | "*" | ":" | "=")
}

enum CloneFrame<'a> {
    Term(&'a Term),
    List(usize),
    Compound(&'a str, usize),
}

impl Clone for Term {
    fn clone(&self) -> Self {
        let mut frames = vec![CloneFrame::Term(self)];
        let mut terms = vec![];

        while let Some(frame) = frames.pop() {
            match frame {
                CloneFrame::Term(Term::Integer(n)) => terms.push(Term::Integer(*n)),
                CloneFrame::Term(Term::Float(n)) => terms.push(Term::Float(*n)),
                CloneFrame::Term(Term::Atom(name)) => terms.push(Term::Atom(name.clone())),
                CloneFrame::Term(Term::Var(name)) => terms.push(Term::Var(name.clone())),
                CloneFrame::Term(Term::Foreign(handle)) => terms.push(Term::Foreign(handle.clone())),
                CloneFrame::Term(Term::List(elems)) => {
                    frames.push(CloneFrame::List(elems.len()));
                    frames.extend(elems.iter().rev().map(CloneFrame::Term));
                }
                CloneFrame::Term(Term::Compound(name, args)) => {
                    frames.push(CloneFrame::Compound(name, args.len()));
                    frames.extend(args.iter().rev().map(CloneFrame::Term));
                }
                CloneFrame::List(len) => {
                    let elems = terms.split_off(terms.len() - len);
                    terms.push(Term::List(elems));
                }
                CloneFrame::Compound(name, arity) => {
                    let args = terms.split_off(terms.len() - arity);
                    terms.push(Term::Compound(name.to_owned(), args));
                }
            }
        }

        match terms.pop() {
            Some(term) => term,
            None => unreachable!("every frame leaves one term"),
        }
    }
}

// Nested arguments are released from an explicit stack.
impl Drop for Term {
    fn drop(&mut self) {
        let mut pending = match self {
            Term::List(children) | Term::Compound(_, children) if !children.is_empty() => {
                std::mem::take(children)
            }
            _ => return,
        };

        while let Some(mut term) = pending.pop() {
            if let Term::List(children) | Term::Compound(_, children) = &mut term {
                pending.append(children);
            }
        }
    }
}

enum Piece<'a> {
    Term(&'a Term),
    /// An operand of an infix operator, parenthesized when it is itself
    /// an operation or a negative number.
    Operand(&'a Term),
    Text(&'a str),
}

fn needs_parens(term: &Term) -> bool {
    match term {
        Term::Integer(n) => *n < 0,
        Term::Float(n) => n.0 < 0.0,
        term => term.is_infix_op(),
    }
}

/// Pushes `args` so they pop in order, separated by commas.
fn push_args<'a>(pieces: &mut Vec<Piece<'a>>, args: &'a [Term]) {
    for (i, arg) in args.iter().enumerate().rev() {
        pieces.push(Piece::Term(arg));

        if i > 0 {
            pieces.push(Piece::Text(","));
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pieces = vec![Piece::Term(self)];

        while let Some(piece) = pieces.pop() {
            let term = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Operand(term) if needs_parens(term) => {
                    f.write_str("(")?;
                    pieces.push(Piece::Text(")"));
                    term
                }
                Piece::Operand(term) | Piece::Term(term) => term,
            };

            match term {
                Term::Integer(n) => write!(f, "{}", n)?,
                Term::Float(n) => f.write_str(&fmt_float(n.0))?,
                Term::Atom(name) => f.write_str(&quote_atom(name))?,
                Term::Var(name) => f.write_str(name)?,
                Term::Foreign(handle) => write!(f, "{}", handle)?,
                Term::List(elems) => {
                    f.write_str("[")?;
                    pieces.push(Piece::Text("]"));
                    push_args(&mut pieces, elems);
                }
                Term::Compound(name, args) if args.len() == 2 && infix_op(name) => {
                    pieces.push(Piece::Operand(&args[1]));
                    pieces.push(Piece::Text(name));
                    pieces.push(Piece::Operand(&args[0]));
                }
                Term::Compound(name, args) => {
                    write!(f, "{}(", quote_atom(name))?;
                    pieces.push(Piece::Text(")"));
                    push_args(&mut pieces, args);
                }
            }
        }

        Ok(())
    }
}

/// This is an auxiliary function to turn a count into names of anonymous variables like _A, _B,
/// _AB, etc...
fn count_to_letter_code(mut count: usize) -> String {
    let mut letters = Vec::new();

    loop {
        let letter_idx = (count % 26) as u8;
        letters.push((b'A' + letter_idx) as char);
        count /= 26;

        if count == 0 {
            break;
        }
    }

    letters.into_iter().chain("_".chars()).rev().collect()
}

/// Names given to unbound variables while reading terms off the heap.
#[derive(Debug, Default)]
pub(crate) struct VarNames {
    names: IndexMap<usize, String>,
    anon_count: usize,
}

impl VarNames {
    fn name_of(&mut self, h: usize) -> String {
        if let Some(name) = self.names.get(&h) {
            return name.clone();
        }

        let name = loop {
            let name = count_to_letter_code(self.anon_count);
            self.anon_count += 1;

            if !self.names.values().any(|v| *v == name) {
                break name;
            }
        };

        self.names.insert(h, name.clone());
        name
    }
}

impl MachineState {
    /// Reads the term at `cell` into an owned term. Unbound variables are
    /// named `_A`, `_B`, ... in order of appearance. A cyclic term is a
    /// representation error.
    pub fn read_term(&self, cell: HeapCellValue) -> Result<Term, MachineError> {
        self.read_term_with_names(cell, &mut VarNames::default())
    }

    pub(crate) fn read_term_with_names(
        &self,
        cell: HeapCellValue,
        var_names: &mut VarNames,
    ) -> Result<Term, MachineError> {
        let mut path = FxHashSet::default();

        self.read_term_internal(cell, var_names, &mut path)
            .ok_or_else(|| self.representation_error(RepFlag::Term))
    }

    fn read_term_internal(
        &self,
        cell: HeapCellValue,
        var_names: &mut VarNames,
        path: &mut FxHashSet<usize>,
    ) -> Option<Term> {
        let mut frames = vec![ReadFrame::Cell(cell)];
        let mut terms = vec![];

        while let Some(frame) = frames.pop() {
            match frame {
                ReadFrame::Cell(cell) => match self.deref(cell) {
                    HeapCellValue::Var(h) => terms.push(Term::Var(var_names.name_of(h))),
                    HeapCellValue::Atom(name) if name == atom!("[]") => {
                        terms.push(Term::List(vec![]))
                    }
                    HeapCellValue::Atom(name) => terms.push(Term::Atom(name.as_str().to_owned())),
                    HeapCellValue::Fixnum(n) => terms.push(Term::Integer(n)),
                    HeapCellValue::Float(n) => terms.push(Term::Float(n)),
                    HeapCellValue::Foreign(handle) => terms.push(Term::Foreign(handle)),
                    cell @ (HeapCellValue::Lis(_) | HeapCellValue::Str(_))
                        if self.heap.name_and_arity(&cell) == Some((atom!("."), 2)) =>
                    {
                        self.frame_list(cell, &mut frames, path)?;
                    }
                    cell @ HeapCellValue::Str(s) => {
                        let (name, arity) = self.heap.name_and_arity(&cell)?;

                        if !path.insert(s) {
                            return None;
                        }

                        frames.push(ReadFrame::Compound(name, arity, s));
                        frames.extend(self.heap.args(&cell).into_iter().rev().map(ReadFrame::Cell));
                    }
                    HeapCellValue::Lis(_) | HeapCellValue::Functor(..) => return None,
                },
                ReadFrame::Compound(name, arity, s) => {
                    let args = terms.split_off(terms.len().checked_sub(arity)?);
                    path.remove(&s);
                    terms.push(Term::Compound(name.as_str().to_owned(), args));
                }
                ReadFrame::List(spine) => {
                    let mut tail = terms.pop()?;
                    let mut elems = terms.split_off(terms.len().checked_sub(spine.len())?);

                    for addr in spine {
                        path.remove(&addr);
                    }

                    let list = match &mut tail {
                        Term::List(rest) => {
                            elems.append(rest);
                            Term::List(elems)
                        }
                        _ => elems
                            .into_iter()
                            .rev()
                            .fold(tail, |tail, head| Term::Compound(".".into(), vec![head, tail])),
                    };

                    terms.push(list);
                }
            }
        }

        terms.pop()
    }

    /// Walks the spine of the list at `cell`, framing its elements and tail
    /// to be read in order. The spine stays on `path` until the list is
    /// assembled.
    fn frame_list(
        &self,
        mut cell: HeapCellValue,
        frames: &mut Vec<ReadFrame>,
        path: &mut FxHashSet<usize>,
    ) -> Option<()> {
        let mut spine = vec![];
        let mut heads = vec![];

        let tail = loop {
            let addr = match &cell {
                HeapCellValue::Lis(l) => *l,
                HeapCellValue::Str(s) if self.heap.name_and_arity(&cell) == Some((atom!("."), 2)) => *s,
                _ => break cell,
            };

            if !path.insert(addr) {
                return None;
            }

            spine.push(addr);
            heads.push(self.heap.arg(&cell, 1)?);

            cell = self.deref(self.heap.arg(&cell, 2)?);
        };

        frames.push(ReadFrame::List(spine));
        frames.push(ReadFrame::Cell(tail));
        frames.extend(heads.into_iter().rev().map(ReadFrame::Cell));

        Some(())
    }
}

enum ReadFrame {
    Cell(HeapCellValue),
    /// Assembles a compound from the last `arity` terms read, then leaves
    /// the structure at the given address.
    Compound(Atom, usize, usize),
    /// Assembles a list from one term per spine cell followed by the tail.
    List(Vec<usize>),
}

/// The solutions of a goal run through [`Machine::run_goal`].
///
/// Each `Ok(())` is a solution whose bindings are visible through the cells
/// the goal was built from. An uncaught condition is yielded once as
/// `Err`, after which the iterator is exhausted. The last solution's cells
/// outlive the iterator; release them with [`Machine::reset_heap`].
pub struct Solutions<'a> {
    machine: &'a mut Machine,
    goal: Option<GoalRef>,
    done: bool,
}

impl Solutions<'_> {
    /// Reads a cell of the current solution.
    pub fn read_term(&self, cell: HeapCellValue) -> Result<Term, Term> {
        self.machine
            .machine_st
            .read_term(cell)
            .map_err(|err| err.formal().clone())
    }

    /// The engine, for inspecting the current solution.
    pub fn machine(&mut self) -> &mut Machine {
        self.machine
    }
}

impl Iterator for Solutions<'_> {
    type Item = Result<(), Term>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.machine.next_solution(&mut self.goal) {
            Ok(true) => {
                self.done = self.machine.machine_st.or_stack.is_empty();
                Some(Ok(()))
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(stub) => {
                self.done = true;
                Some(Err(stub.into_ball()))
            }
        }
    }
}

impl Drop for Solutions<'_> {
    fn drop(&mut self) {
        self.machine.machine_st.or_stack.clear();
    }
}

/// An iterator though the leaf answers of a query.
///
/// Answers are owned terms. Dropping the iterator releases every cell the
/// query built.
pub struct QueryState<'a> {
    machine: &'a mut Machine,
    goal: Option<GoalRef>,
    var_dict: IndexMap<String, HeapCellValue>,
    heap_mark: HeapMark,
    done: bool,
}

impl QueryState<'_> {
    fn bindings(&self) -> Result<BTreeMap<String, Term>, Term> {
        let machine_st = &self.machine.machine_st;
        let mut var_names = VarNames::default();

        for (name, cell) in &self.var_dict {
            if let HeapCellValue::Var(h) = machine_st.deref(cell.clone()) {
                var_names.names.entry(h).or_insert_with(|| name.clone());
            }
        }

        let mut bindings = BTreeMap::new();

        for (name, cell) in &self.var_dict {
            if name.starts_with('_') {
                continue;
            }

            let term = machine_st
                .read_term_with_names(cell.clone(), &mut var_names)
                .map_err(|err| err.formal().clone())?;

            if let Term::Var(ref term_name) = term {
                if term_name == name {
                    continue;
                }
            }

            bindings.insert(name.clone(), term);
        }

        Ok(bindings)
    }
}

impl Iterator for QueryState<'_> {
    type Item = Result<LeafAnswer, Term>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.machine.next_solution(&mut self.goal) {
            Ok(true) => {
                self.done = self.machine.machine_st.or_stack.is_empty();

                Some(self.bindings().map(|bindings| {
                    if bindings.is_empty() {
                        LeafAnswer::True
                    } else {
                        LeafAnswer::LeafAnswer { bindings }
                    }
                }))
            }
            Ok(false) => {
                self.done = true;
                Some(Ok(LeafAnswer::False))
            }
            Err(stub) => {
                self.done = true;

                let exception_term = stub.into_ball();

                if let Term::Compound(functor, args) = &exception_term {
                    if functor == "error" && args.len() == 2 {
                        return Some(Err(exception_term));
                    }
                }

                Some(Ok(LeafAnswer::Exception(exception_term)))
            }
        }
    }
}

impl Drop for QueryState<'_> {
    fn drop(&mut self) {
        self.machine.machine_st.reset_heap(self.heap_mark);
    }
}

impl Machine {
    /// Runs a goal built on this engine's heap, returning its solutions.
    pub fn run_goal(&mut self, goal: GoalRef) -> Solutions<'_> {
        self.begin_query();

        Solutions {
            machine: self,
            goal: Some(goal),
            done: false,
        }
    }

    /// Writes `query` onto the heap and runs it through `call/1`.
    pub fn run_query(&mut self, query: Term) -> QueryState<'_> {
        self.begin_query();

        let heap_mark = self.machine_st.heap_mark();
        let mut var_dict = IndexMap::new();
        let cell = write_term_to_heap(&mut self.machine_st.heap, &query, &mut var_dict);
        let goal = Goal::builtin(BuiltinType::Call, &[cell], Goal::succeed());

        QueryState {
            machine: self,
            goal: Some(goal),
            var_dict,
            heap_mark,
            done: false,
        }
    }

    /// Collects every leaf answer of `query`, stopping at the first error.
    pub fn run_query_to_vec(&mut self, query: Term) -> Result<Vec<LeafAnswer>, Term> {
        self.run_query(query).collect()
    }
}
