//! Goals, continuations and the compiled-predicate interface.

use crate::atom_table::*;
use crate::heap_print::HCPrinter;
use crate::machine::machine_errors::*;
use crate::machine::machine_state::MachineState;
use crate::machine::Machine;
use crate::types::*;

use smallvec::SmallVec;

use std::fmt;
use std::rc::Rc;

/// What a goal does next when it succeeds or fails.
#[derive(Debug)]
pub enum Step {
    /// Continue with this goal.
    Continue(GoalRef),
    /// No solution from this state; resume the most recent choice point.
    Fail,
}

/// The result of executing a goal. `Err` raises the condition.
pub type CallResult = Result<Step, MachineStub>;

/// A shared reference to a goal. Continuations are shared between the
/// alternatives that resume them.
pub type GoalRef = Rc<Goal>;

/// Builds a compiled predicate from its argument cells and success
/// continuation.
pub type PredicateCtor = fn(Vec<HeapCellValue>, GoalRef) -> GoalRef;

/// A compiled predicate, as emitted by a compiler.
///
/// Each activation holds its argument cells and continuation. Predicates
/// with several clauses call [`Machine::set_b0`] on entry and try their
/// clauses through [`Goal::try_clauses`]; each clause captures
/// [`Machine::cut_barrier`] before running its body.
pub trait Predicate {
    /// The name and arity the predicate was called as.
    fn key(&self) -> PredicateKey;
    /// The argument cells of this activation.
    fn args(&self) -> &[HeapCellValue];
    /// Runs the activation, returning the next step.
    fn exec(&self, machine: &mut Machine) -> CallResult;

    /// The number of arguments.
    #[inline]
    fn arity(&self) -> usize {
        self.args().len()
    }
}

/// The builtins installed in every engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    /// `true/0`
    True,
    /// `fail/0`
    Fail,
    /// `=/2`
    Unify,
    /// `call/1`
    Call,
    /// `catch/3`
    Catch,
    /// `throw/1`
    Throw,
    /// `'$get_exception'/1`: the ball in the exception slot, or `[]`.
    GetException,
    /// `atom_chars/2`
    AtomChars,
    /// `get_byte/2`
    GetByte,
    /// `put_byte/2`
    PutByte,
    /// `close/1`
    Close,
    /// `new_hash/2`
    NewHash,
    /// `hash_put/3`
    HashPut,
    /// `hash_get/3`
    HashGet,
    /// `hash_remove/2`
    HashRemove,
    /// `hash_contains_key/2`
    HashContainsKey,
    /// `hash_size/2`
    HashSize,
    /// `hash_keys/2`
    HashKeys,
    /// `hash_clear/1`
    HashClear,
    /// `close_hash/1`
    CloseHash,
    /// `get_field/3`
    GetField,
    /// `set_field/3`
    SetField,
}

impl BuiltinType {
    pub(crate) const ALL: [BuiltinType; 22] = [
        BuiltinType::True,
        BuiltinType::Fail,
        BuiltinType::Unify,
        BuiltinType::Call,
        BuiltinType::Catch,
        BuiltinType::Throw,
        BuiltinType::GetException,
        BuiltinType::AtomChars,
        BuiltinType::GetByte,
        BuiltinType::PutByte,
        BuiltinType::Close,
        BuiltinType::NewHash,
        BuiltinType::HashPut,
        BuiltinType::HashGet,
        BuiltinType::HashRemove,
        BuiltinType::HashContainsKey,
        BuiltinType::HashSize,
        BuiltinType::HashKeys,
        BuiltinType::HashClear,
        BuiltinType::CloseHash,
        BuiltinType::GetField,
        BuiltinType::SetField,
    ];

    /// The predicate name.
    pub fn name(self) -> Atom {
        match self {
            BuiltinType::True => atom!("true"),
            BuiltinType::Fail => atom!("fail"),
            BuiltinType::Unify => atom!("="),
            BuiltinType::Call => atom!("call"),
            BuiltinType::Catch => atom!("catch"),
            BuiltinType::Throw => atom!("throw"),
            BuiltinType::GetException => atom!("$get_exception"),
            BuiltinType::AtomChars => atom!("atom_chars"),
            BuiltinType::GetByte => atom!("get_byte"),
            BuiltinType::PutByte => atom!("put_byte"),
            BuiltinType::Close => atom!("close"),
            BuiltinType::NewHash => atom!("new_hash"),
            BuiltinType::HashPut => atom!("hash_put"),
            BuiltinType::HashGet => atom!("hash_get"),
            BuiltinType::HashRemove => atom!("hash_remove"),
            BuiltinType::HashContainsKey => atom!("hash_contains_key"),
            BuiltinType::HashSize => atom!("hash_size"),
            BuiltinType::HashKeys => atom!("hash_keys"),
            BuiltinType::HashClear => atom!("hash_clear"),
            BuiltinType::CloseHash => atom!("close_hash"),
            BuiltinType::GetField => atom!("get_field"),
            BuiltinType::SetField => atom!("set_field"),
        }
    }

    /// The number of arguments.
    pub fn arity(self) -> usize {
        match self {
            BuiltinType::True | BuiltinType::Fail => 0,
            BuiltinType::Call
            | BuiltinType::Throw
            | BuiltinType::GetException
            | BuiltinType::Close
            | BuiltinType::HashClear
            | BuiltinType::CloseHash => 1,
            BuiltinType::Unify
            | BuiltinType::AtomChars
            | BuiltinType::GetByte
            | BuiltinType::PutByte
            | BuiltinType::NewHash
            | BuiltinType::HashRemove
            | BuiltinType::HashContainsKey
            | BuiltinType::HashSize
            | BuiltinType::HashKeys => 2,
            BuiltinType::Catch
            | BuiltinType::HashPut
            | BuiltinType::HashGet
            | BuiltinType::GetField
            | BuiltinType::SetField => 3,
        }
    }

    /// The name and arity.
    #[inline]
    pub fn key(self) -> PredicateKey {
        (self.name(), self.arity())
    }
}

/// An executable goal. The variants are the control constructs and
/// builtins the engine knows; everything a compiler emits enters through
/// [`Goal::Compiled`].
pub enum Goal {
    /// The end of a query's continuation chain: a solution.
    Succeed,
    /// Runs a builtin on its argument cells.
    Builtin {
        /// The builtin to run.
        ty: BuiltinType,
        /// Its argument cells.
        args: SmallVec<[HeapCellValue; 3]>,
        /// The continuation on success.
        cont: GoalRef,
    },
    /// Cuts back to the barrier, then continues.
    Cut(CutBarrier, GoalRef),
    /// Runs the arm at the index, leaving a choice point for the arms
    /// after it.
    Disjunction(Rc<[GoalRef]>, usize),
    /// Runs `cond`; on its first solution cuts the `otherwise` branch and
    /// continues with `then`.
    IfThenElse {
        /// The condition, run through `call/1`.
        cond: HeapCellValue,
        /// Runs after the condition's first solution.
        then: GoalRef,
        /// Runs if the condition has no solution.
        otherwise: GoalRef,
    },
    /// Resumed when a ball unwinds into the catch frame, or when the
    /// caught goal fails back through it.
    CatchPoint {
        /// Unified with the ball.
        catcher: HeapCellValue,
        /// Called once the catcher unifies.
        recovery: HeapCellValue,
        /// The continuation of the recovery goal.
        cont: GoalRef,
    },
    /// Leaves the dynamic extent of a `catch/3` goal.
    ExitCatch {
        /// The catch frame active before this one.
        prev_block: usize,
        /// The catch frame being left.
        block: usize,
        /// The continuation of the `catch/3` call.
        cont: GoalRef,
    },
    /// An activation of a compiled predicate.
    Compiled(Rc<dyn Predicate>),
}

impl Goal {
    /// The goal that ends a continuation chain.
    #[inline]
    pub fn succeed() -> GoalRef {
        Rc::new(Goal::Succeed)
    }

    /// A goal with no solutions.
    #[inline]
    pub fn fail() -> GoalRef {
        Goal::builtin(BuiltinType::Fail, &[], Goal::succeed())
    }

    /// Runs the builtin `ty` on `args`, then `cont`.
    pub fn builtin(ty: BuiltinType, args: &[HeapCellValue], cont: GoalRef) -> GoalRef {
        Rc::new(Goal::Builtin {
            ty,
            args: args.iter().cloned().collect(),
            cont,
        })
    }

    /// Cuts back to `barrier`, then runs `cont`.
    #[inline]
    pub fn cut(barrier: CutBarrier, cont: GoalRef) -> GoalRef {
        Rc::new(Goal::Cut(barrier, cont))
    }

    /// Tries each clause in order, leaving a choice point for the rest.
    pub fn try_clauses(clauses: impl IntoIterator<Item = GoalRef>) -> GoalRef {
        let clauses: Rc<[GoalRef]> = clauses.into_iter().collect();

        match clauses.len() {
            0 => Goal::fail(),
            1 => clauses[0].clone(),
            _ => Rc::new(Goal::Disjunction(clauses, 0)),
        }
    }

    /// Wraps a compiled predicate activation.
    #[inline]
    pub fn compiled<P: Predicate + 'static>(pred: P) -> GoalRef {
        Rc::new(Goal::Compiled(Rc::new(pred)))
    }

    /// A goal whose body is the closure `f`, called with the argument
    /// cells and the continuation.
    pub fn closure<F>(key: PredicateKey, args: Vec<HeapCellValue>, cont: GoalRef, f: F) -> GoalRef
    where
        F: Fn(&mut Machine, &[HeapCellValue], &GoalRef) -> CallResult + 'static,
    {
        Goal::compiled(ClosureGoal {
            key,
            args,
            cont,
            f,
        })
    }

    /// The diagnostic form of the goal, with arguments printed to a
    /// bounded depth.
    pub fn display(&self, machine_st: &MachineState) -> String {
        let mut printer = HCPrinter::new(machine_st);
        printer.max_depth = 5;

        match self {
            Goal::Succeed => "true".to_owned(),
            Goal::Builtin { ty, args, .. } => printer.print_goal(ty.name(), args),
            Goal::Cut(barrier, _) => format!("!({})", barrier.depth()),
            Goal::Disjunction(arms, i) => format!("';'({}/{})", i + 1, arms.len()),
            Goal::IfThenElse { cond, .. } => printer.print_goal(atom!("->"), &[cond.clone()]),
            Goal::CatchPoint { catcher, .. } => {
                printer.print_goal(atom!("$catch_point"), &[catcher.clone()])
            }
            Goal::ExitCatch { block, .. } => format!("'$exit_catch'({})", block),
            Goal::Compiled(pred) => printer.print_goal(pred.key().0, pred.args()),
        }
    }
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Succeed => write!(f, "Succeed"),
            Goal::Builtin { ty, args, .. } => write!(f, "Builtin({:?}, {:?})", ty, args),
            Goal::Cut(barrier, _) => write!(f, "Cut({:?})", barrier),
            Goal::Disjunction(arms, i) => write!(f, "Disjunction({}/{})", i, arms.len()),
            Goal::IfThenElse { cond, .. } => write!(f, "IfThenElse({:?})", cond),
            Goal::CatchPoint { catcher, .. } => write!(f, "CatchPoint({:?})", catcher),
            Goal::ExitCatch { block, .. } => write!(f, "ExitCatch({})", block),
            Goal::Compiled(pred) => {
                let (name, arity) = pred.key();
                write!(f, "Compiled({}/{})", name.quoted(), arity)
            }
        }
    }
}

struct ClosureGoal<F> {
    key: PredicateKey,
    args: Vec<HeapCellValue>,
    cont: GoalRef,
    f: F,
}

impl<F> Predicate for ClosureGoal<F>
where
    F: Fn(&mut Machine, &[HeapCellValue], &GoalRef) -> CallResult,
{
    #[inline]
    fn key(&self) -> PredicateKey {
        self.key
    }

    #[inline]
    fn args(&self) -> &[HeapCellValue] {
        &self.args
    }

    #[inline]
    fn exec(&self, machine: &mut Machine) -> CallResult {
        (self.f)(machine, &self.args, &self.cont)
    }
}

/// How a callable term is resolved by `call/1`.
#[derive(Clone, Copy)]
pub enum CodeIndex {
    /// Dispatched to the builtin.
    Builtin(BuiltinType),
    /// Built by the constructor, then run.
    Compiled(PredicateCtor),
}

impl fmt::Debug for CodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeIndex::Builtin(ty) => write!(f, "Builtin({:?})", ty),
            CodeIndex::Compiled(_) => write!(f, "Compiled"),
        }
    }
}

impl Machine {
    /// Executes one goal. `Goal::Succeed` is handled by the dispatch loop.
    pub(crate) fn execute(&mut self, goal: &Goal) -> CallResult {
        match goal {
            Goal::Succeed => Ok(Step::Continue(Goal::succeed())),
            Goal::Builtin { ty, args, cont } => self.system_call(*ty, args, cont),
            Goal::Cut(barrier, cont) => {
                self.machine_st.cut(*barrier);
                Ok(Step::Continue(cont.clone()))
            }
            Goal::Disjunction(arms, i) => {
                if i + 1 < arms.len() {
                    self.machine_st
                        .push_choice_point(Rc::new(Goal::Disjunction(arms.clone(), i + 1)));
                }

                Ok(Step::Continue(arms[*i].clone()))
            }
            Goal::IfThenElse {
                cond,
                then,
                otherwise,
            } => {
                let b = self.machine_st.current_barrier();
                self.machine_st.push_choice_point(otherwise.clone());

                // cut inside the condition is local to it.
                let cond_barrier = self.machine_st.current_barrier();
                let cond_goal = self.meta_goal(
                    cond.clone(),
                    cond_barrier,
                    Goal::cut(b, then.clone()),
                    functor_stub(atom!("->"), 2),
                )?;

                Ok(Step::Continue(cond_goal))
            }
            Goal::CatchPoint {
                catcher,
                recovery,
                cont,
            } => self.catch_point(catcher, recovery, cont),
            Goal::ExitCatch {
                prev_block,
                block,
                cont,
            } => {
                // a deterministic exit leaves the catch frame on top.
                if self.machine_st.or_stack.len() == *block {
                    self.machine_st.or_stack.pop();
                }

                self.machine_st.block = *prev_block;
                Ok(Step::Continue(cont.clone()))
            }
            Goal::Compiled(pred) => pred.exec(self),
        }
    }

    /// Translates a callable term into a goal continuing with `cont`.
    ///
    /// Control constructs are interpreted with `barrier` as the target of
    /// any cut they contain. Sub-goals that are variables or name unknown
    /// predicates are deferred to `call/1`, so they are only reported if
    /// reached. A non-callable sub-goal makes the whole term a type error.
    pub(crate) fn meta_goal(
        &self,
        goal: HeapCellValue,
        barrier: CutBarrier,
        cont: GoalRef,
        stub: FunctorStub,
    ) -> Result<GoalRef, MachineStub> {
        let goal = self.machine_st.deref(goal);

        if goal.is_var() {
            let err = self.machine_st.instantiation_error();
            return Err(self.machine_st.error_form(err, stub, 1));
        }

        match self.translate(goal.clone(), barrier, cont, true) {
            Ok(goal) => Ok(goal),
            Err(Untranslatable::NotCallable) => {
                let err = self.machine_st.type_error(ValidType::Callable, goal);
                Err(self.machine_st.error_form(err, stub, 1))
            }
            Err(Untranslatable::Unknown(name, arity)) => {
                let err = self
                    .machine_st
                    .existence_error(ExistenceError::Procedure(name, arity));
                Err(self.machine_st.error_form(err, functor_stub(name, arity), 0))
            }
        }
    }

    fn translate(
        &self,
        goal: HeapCellValue,
        barrier: CutBarrier,
        cont: GoalRef,
        top: bool,
    ) -> Result<GoalRef, Untranslatable> {
        let goal = self.machine_st.deref(goal);

        if goal.is_var() {
            return Ok(Goal::builtin(BuiltinType::Call, &[goal], cont));
        }

        let heap = &self.machine_st.heap;

        let (name, arity) = match &goal {
            HeapCellValue::Atom(_) | HeapCellValue::Str(_) => heap
                .name_and_arity(&goal)
                .ok_or(Untranslatable::NotCallable)?,
            _ => return Err(Untranslatable::NotCallable),
        };

        let args = heap.args(&goal);

        match (name.as_str(), arity) {
            ("true", 0) => Ok(cont),
            ("!", 0) => Ok(Goal::cut(barrier, cont)),
            (",", 2) => {
                let rhs = self.translate(args[1].clone(), barrier, cont, false)?;
                self.translate(args[0].clone(), barrier, rhs, false)
            }
            (";", 2) => {
                let lhs = self.machine_st.deref(args[0].clone());

                if heap.name_and_arity(&lhs) == Some((atom!("->"), 2)) {
                    let cond_then = heap.args(&lhs);

                    self.check_callable(&cond_then[0])?;

                    return Ok(Rc::new(Goal::IfThenElse {
                        cond: cond_then[0].clone(),
                        then: self.translate(cond_then[1].clone(), barrier, cont.clone(), false)?,
                        otherwise: self.translate(args[1].clone(), barrier, cont, false)?,
                    }));
                }

                let arms: Rc<[GoalRef]> = Rc::new([
                    self.translate(lhs, barrier, cont.clone(), false)?,
                    self.translate(args[1].clone(), barrier, cont, false)?,
                ]);

                Ok(Rc::new(Goal::Disjunction(arms, 0)))
            }
            ("->", 2) => {
                self.check_callable(&args[0])?;

                Ok(Rc::new(Goal::IfThenElse {
                    cond: args[0].clone(),
                    then: self.translate(args[1].clone(), barrier, cont, false)?,
                    otherwise: Goal::fail(),
                }))
            }
            ("\\+", 1) => {
                self.check_callable(&args[0])?;

                Ok(Rc::new(Goal::IfThenElse {
                    cond: args[0].clone(),
                    then: Goal::fail(),
                    otherwise: cont,
                }))
            }
            _ => match self.code_dir.get(&(name, arity)) {
                Some(CodeIndex::Builtin(ty)) => Ok(Goal::builtin(*ty, &args, cont)),
                Some(CodeIndex::Compiled(ctor)) => Ok(ctor(args, cont)),
                None if top => Err(Untranslatable::Unknown(name, arity)),
                None => Ok(Goal::builtin(BuiltinType::Call, &[goal], cont)),
            },
        }
    }

    fn check_callable(&self, goal: &HeapCellValue) -> Result<(), Untranslatable> {
        match self.machine_st.deref(goal.clone()) {
            HeapCellValue::Var(_) | HeapCellValue::Atom(_) | HeapCellValue::Str(_) => Ok(()),
            _ => Err(Untranslatable::NotCallable),
        }
    }
}

enum Untranslatable {
    NotCallable,
    Unknown(Atom, usize),
}
