//! A logic-programming engine: a term heap with trail-based undo,
//! unification, a continuation-passing trampoline with chronological
//! backtracking, cut, catch/throw, and alias registries through which
//! builtins reach streams, hash tables and host objects.
//!
//! Programs enter the engine as goal objects. A compiler, or Rust code
//! written the way one would emit it, builds [`Goal`]s over heap cells and
//! installs predicate constructors with [`Machine::define_predicate`].
#![warn(missing_docs)]

#[macro_use]
extern crate static_assertions;

#[macro_use]
mod macros;
#[macro_use]
pub mod atom_table;
pub mod heap_print;
pub mod machine;
pub mod read;
pub mod types;

// Re-exports
pub use atom_table::Atom;
pub use machine::code::{
    BuiltinType, CallResult, Goal, GoalRef, Predicate, PredicateCtor, Step,
};
pub use machine::config::*;
pub use machine::foreign::{
    ForeignError, ForeignHandle, ForeignObject, ForeignValue, TermHashTable,
};
pub use machine::lib_machine::*;
pub use machine::machine_errors::{foreign_fault, MachineError, MachineStub};
pub use machine::machine_state::HeapMark;
pub use machine::registry::{AliasRegistry, Registries};
pub use machine::streams::Stream;
pub use machine::Machine;
pub use types::{CutBarrier, HeapCellValue, PredicateKey};
