//! The engine and its trampoline.

pub mod code;
pub mod config;
pub mod foreign;
pub mod heap;
pub mod lib_machine;
pub mod machine_errors;
pub mod machine_state;
pub mod or_stack;
pub mod registry;
pub mod streams;
pub mod system_calls;
pub mod trail;
pub mod unify;

use crate::atom_table::*;
use crate::machine::code::*;
use crate::machine::config::MachineBuilder;
use crate::machine::foreign::*;
use crate::machine::lib_machine::Term;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::*;
use crate::machine::registry::*;
use crate::machine::streams::*;
use crate::read::{write_term_to_heap, HeapVarDict};
use crate::types::*;

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use tracing::{debug, trace};

/// A logic engine: the machine state, the code directory `call/1` resolves
/// predicates through, and the resource registries builtins reach.
pub struct Machine {
    pub(crate) machine_st: MachineState,
    pub(crate) code_dir: IndexMap<PredicateKey, CodeIndex, FxBuildHasher>,
    pub(crate) registries: Registries,
    pub(crate) user_input: ForeignHandle,
    pub(crate) user_output: ForeignHandle,
    pub(crate) user_error: ForeignHandle,
    /// Standard stream aliases this engine registered, released on drop.
    pub(crate) registered_aliases: Vec<(Atom, ForeignHandle)>,
    pub(crate) step_limit: Option<u64>,
    pub(crate) steps: u64,
}

impl Default for Machine {
    #[inline]
    fn default() -> Self {
        MachineBuilder::default().build()
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        for (alias, handle) in self.registered_aliases.drain(..) {
            self.registries.streams.unregister_if(alias, &handle);
        }
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("heap_len", &self.machine_st.heap.cell_len())
            .field("choice_points", &self.machine_st.or_stack.len())
            .field("predicates", &self.code_dir.len())
            .field("step_limit", &self.step_limit)
            .finish()
    }
}

impl Machine {
    /// Clears the control state of the previous query.
    pub(crate) fn begin_query(&mut self) {
        self.machine_st.reset_query();
        self.steps = 0;
    }

    /// Runs to the next solution. The first call starts `goal`; later calls
    /// resume from the most recent choice point.
    pub(crate) fn next_solution(
        &mut self,
        goal: &mut Option<GoalRef>,
    ) -> Result<bool, MachineStub> {
        let goal = match goal.take() {
            Some(goal) => goal,
            None => match self.machine_st.backtrack() {
                Some(alternative) => alternative,
                None => return Ok(false),
            },
        };

        self.dispatch_loop(goal)
    }

    /// The trampoline. Executes goals until the continuation chain reaches
    /// `Goal::Succeed`, every choice point is exhausted, or a ball escapes
    /// all catch frames.
    pub(crate) fn dispatch_loop(&mut self, mut goal: GoalRef) -> Result<bool, MachineStub> {
        loop {
            if let Goal::Succeed = *goal {
                return Ok(true);
            }

            if let Some(limit) = self.step_limit {
                if self.steps >= limit {
                    return Err(self.step_limit_exceeded(limit));
                }
            }

            self.steps += 1;

            trace!(
                goal = %goal.display(&self.machine_st),
                depth = self.machine_st.or_stack.len(),
                "step"
            );

            goal = match self.execute(&goal) {
                Ok(Step::Continue(next)) => next,
                Ok(Step::Fail) => match self.machine_st.backtrack() {
                    Some(alternative) => alternative,
                    None => return Ok(false),
                },
                Err(stub) => self.machine_st.throw(stub)?,
            };
        }
    }

    // the step limit abandons the query, bypassing every catch frame.
    fn step_limit_exceeded(&mut self, limit: u64) -> MachineStub {
        let err = self.machine_st.resource_error(ResourceError::Steps);
        let stub = self
            .machine_st
            .error_form(err, functor_stub(atom!("query"), 0), 0);

        debug!(limit, "step limit exceeded");

        self.machine_st.or_stack.clear();
        self.machine_st.ball.set(stub.ball().clone());

        stub
    }

    /// Installs a compiled predicate, replacing any earlier definition of
    /// the same name and arity.
    pub fn define_predicate(&mut self, name: &str, arity: usize, ctor: PredicateCtor) {
        self.code_dir
            .insert((atom!(name), arity), CodeIndex::Compiled(ctor));
    }

    /// Whether `call/1` can resolve `name/arity`.
    pub fn is_defined(&self, name: &str, arity: usize) -> bool {
        self.code_dir.contains_key(&(atom!(name), arity))
    }

    /// The machine state, for inspecting the heap and registers.
    #[inline]
    pub fn machine_st(&self) -> &MachineState {
        &self.machine_st
    }

    /// The machine state, mutably.
    #[inline]
    pub fn machine_st_mut(&mut self) -> &mut MachineState {
        &mut self.machine_st
    }

    /// The alias registries of this engine.
    #[inline]
    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    /// The last raised condition, if it has not been claimed.
    #[inline]
    pub fn exception(&self) -> Option<&Term> {
        self.machine_st.exception()
    }

    /// Follows variable bindings from `cell`.
    #[inline]
    pub fn deref(&self, cell: HeapCellValue) -> HeapCellValue {
        self.machine_st.deref(cell)
    }

    /// Unifies two cells, using the occurs check when the engine was built
    /// with it. Bindings made before a mismatch are left for the caller to
    /// undo.
    #[inline]
    pub fn unify(&mut self, a: HeapCellValue, b: HeapCellValue) -> bool {
        self.machine_st.unify(a, b)
    }

    /// Unifies two cells, refusing to bind a variable to a term containing it.
    #[inline]
    pub fn unify_with_occurs_check(&mut self, a: HeapCellValue, b: HeapCellValue) -> bool {
        self.machine_st.unify_with_occurs_check(a, b)
    }

    /// The current trail position, for [`undo_to`](Machine::undo_to).
    #[inline]
    pub fn trail_mark(&self) -> usize {
        self.machine_st.trail_mark()
    }

    /// Undoes every binding made since `mark`.
    #[inline]
    pub fn undo_to(&mut self, mark: usize) {
        self.machine_st.undo_to(mark)
    }

    /// Marks the heap so the cells of later goals can be released with
    /// [`reset_heap`](Machine::reset_heap). [`run_query`](Machine::run_query)
    /// releases its own cells; cells built for [`run_goal`](Machine::run_goal)
    /// stay until the caller releases them.
    #[inline]
    pub fn heap_mark(&self) -> HeapMark {
        self.machine_st.heap_mark()
    }

    /// Drops every cell and binding made since `mark`.
    #[inline]
    pub fn reset_heap(&mut self, mark: HeapMark) {
        self.machine_st.reset_heap(mark)
    }

    /// Pushes a choice point that resumes at `alternative`.
    #[inline]
    pub fn push_choice_point(&mut self, alternative: GoalRef) {
        self.machine_st.push_choice_point(alternative)
    }

    /// Captures the cut barrier of the predicate being entered. Compiled
    /// predicates call this before pushing any choice point of their own.
    #[inline]
    pub fn set_b0(&mut self) -> CutBarrier {
        self.machine_st.set_b0();
        self.machine_st.cut_barrier()
    }

    /// The barrier captured by the last [`set_b0`](Machine::set_b0).
    #[inline]
    pub fn cut_barrier(&self) -> CutBarrier {
        self.machine_st.cut_barrier()
    }

    /// Discards every choice point pushed since `barrier`.
    #[inline]
    pub fn cut(&mut self, barrier: CutBarrier) {
        self.machine_st.cut(barrier)
    }

    /// Allocates a fresh variable.
    #[inline]
    pub fn new_var(&mut self) -> HeapCellValue {
        self.machine_st.heap.new_var()
    }

    /// Builds `name(args...)`; an atom when `args` is empty.
    #[inline]
    pub fn put_structure(&mut self, name: &str, args: &[HeapCellValue]) -> HeapCellValue {
        self.machine_st.heap.put_structure(atom!(name), args)
    }

    /// Builds a list of `items` ending in `tail`.
    #[inline]
    pub fn put_list<I>(&mut self, items: I, tail: HeapCellValue) -> HeapCellValue
    where
        I: IntoIterator<Item = HeapCellValue>,
    {
        self.machine_st.heap.put_list(items, tail)
    }

    /// Reads a heap cell back as an owned term.
    #[inline]
    pub fn read_term(&self, cell: HeapCellValue) -> Result<Term, MachineError> {
        self.machine_st.read_term(cell)
    }

    /// Writes an owned term onto the heap. Variables of the same name are
    /// shared within this call.
    pub fn write_term(&mut self, term: &Term) -> HeapCellValue {
        let mut var_dict = HeapVarDict::new();
        write_term_to_heap(&mut self.machine_st.heap, term, &mut var_dict)
    }

    /// Wraps `stream` in a handle, registering it under `alias` if given.
    /// An alias already in use is a permission error.
    pub fn add_stream(
        &mut self,
        mut stream: Stream,
        alias: Option<Atom>,
    ) -> Result<ForeignHandle, MachineError> {
        if let Some(alias) = alias {
            stream.options_mut().set_alias_to_atom_opt(Some(alias));
        }

        let handle = ForeignHandle::from_stream(stream);
        self.register_alias(&self.registries.streams, alias, &handle)?;

        Ok(handle)
    }

    /// Wraps a host value in a handle reachable from `get_field/3` and
    /// `set_field/3`, registering it under `alias` if given.
    pub fn add_object<T: ForeignValue>(
        &mut self,
        value: T,
        alias: Option<Atom>,
    ) -> Result<ForeignHandle, MachineError> {
        let handle = ForeignHandle::from_value(value);
        self.register_alias(&self.registries.objects, alias, &handle)?;

        Ok(handle)
    }

    pub(crate) fn register_alias(
        &self,
        registry: &AliasRegistry,
        alias: Option<Atom>,
        handle: &ForeignHandle,
    ) -> Result<(), MachineError> {
        match alias {
            Some(alias) if !registry.register(alias, handle.clone()) => {
                Err(self.machine_st.permission_error(
                    Permission::Create,
                    registry.kind(),
                    Term::compound("alias", [Term::atom(alias.as_str())]),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Whether `handle` is one of this engine's standard streams.
    #[inline]
    pub(crate) fn is_standard_handle(&self, handle: &ForeignHandle) -> bool {
        handle == &self.user_input || handle == &self.user_output || handle == &self.user_error
    }

    /// The bytes written to `user_output`, when it is a memory stream.
    pub fn user_output_contents(&self) -> Option<Vec<u8>> {
        self.user_output
            .with_stream(|stream| stream.memory_contents().map(<[u8]>::to_vec))
            .flatten()
    }

    /// The bytes written to `user_output` as a string, replacing invalid
    /// UTF-8.
    pub fn user_output_string(&self) -> Option<String> {
        self.user_output_contents()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }
}
