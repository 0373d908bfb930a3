//! ISO error terms and the conditions that carry them.

use crate::atom_table::*;
use crate::machine::foreign::*;
use crate::machine::lib_machine::Term;
use crate::machine::machine_state::*;
use crate::types::*;

use std::fmt;

/// The predicate a condition is reported against.
pub type FunctorStub = PredicateKey;

#[inline(always)]
pub(crate) fn functor_stub(name: Atom, arity: usize) -> FunctorStub {
    (name, arity)
}

/// A raised condition, carrying the ball a catch point unifies against.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineStub {
    ball: Term,
}

impl MachineStub {
    /// Wraps an arbitrary ball, as `throw/1` does.
    #[inline]
    pub fn new(ball: Term) -> Self {
        MachineStub { ball }
    }

    /// The ball.
    #[inline]
    pub fn ball(&self) -> &Term {
        &self.ball
    }

    /// Unwraps the ball.
    #[inline]
    pub fn into_ball(self) -> Term {
        self.ball
    }
}

impl fmt::Display for MachineStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ball)
    }
}

/// The formal part of an ISO error term, e.g. `type_error(atom, 1)`.
/// [`MachineState::error_form`] wraps it with its context.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineError {
    stub: Term,
}

impl MachineError {
    /// The formal term.
    #[inline]
    pub fn formal(&self) -> &Term {
        &self.stub
    }
}

/// The types of `type_error/2`, from 7.12.2 b) of 13211-1:1995.
#[derive(Debug, Clone, Copy)]
pub enum ValidType {
    /// An atom.
    Atom,
    /// An integer in 0..=255.
    Byte,
    /// An atom or compound term.
    Callable,
    /// A one-character atom.
    Character,
    /// A byte or -1.
    InByte,
    /// A list.
    List,
}

impl ValidType {
    pub(crate) fn as_atom(self) -> Atom {
        match self {
            ValidType::Atom => atom!("atom"),
            ValidType::Byte => atom!("byte"),
            ValidType::Callable => atom!("callable"),
            ValidType::Character => atom!("character"),
            ValidType::InByte => atom!("in_byte"),
            ValidType::List => atom!("list"),
        }
    }
}

/// The domains of `domain_error/2`.
#[derive(Debug, Clone, Copy)]
pub enum DomainErrorType {
    /// An option of `new_hash/2`.
    HashOption,
    /// A hash table handle or alias.
    HashOrAlias,
    /// A host object handle or alias.
    ObjectOrAlias,
    /// A stream handle or alias.
    StreamOrAlias,
}

impl DomainErrorType {
    pub(crate) fn as_atom(self) -> Atom {
        match self {
            DomainErrorType::HashOption => atom!("hash_option"),
            DomainErrorType::HashOrAlias => atom!("hash_or_alias"),
            DomainErrorType::ObjectOrAlias => atom!("object_or_alias"),
            DomainErrorType::StreamOrAlias => atom!("stream_or_alias"),
        }
    }
}

/// The operations of `permission_error/3`.
#[derive(Debug, Clone, Copy)]
pub enum Permission {
    /// Creating an alias already in use.
    Create,
    /// Reading from a stream.
    InputStream,
    /// Writing to a stream.
    OutputStream,
}

impl Permission {
    #[inline]
    pub(crate) fn as_atom(self) -> Atom {
        match self {
            Permission::Create => atom!("create"),
            Permission::InputStream => atom!("input"),
            Permission::OutputStream => atom!("output"),
        }
    }
}

/// The flags of `representation_error/1`, from 7.12.2 f) of
/// 13211-1:1995.
#[derive(Debug, Clone, Copy)]
pub enum RepFlag {
    /// A byte read from a stream.
    InByte,
    /// A term that can be read off the heap, i.e. an acyclic one.
    Term,
}

impl RepFlag {
    pub(crate) fn as_atom(self) -> Atom {
        match self {
            RepFlag::InByte => atom!("in_byte"),
            RepFlag::Term => atom!("term"),
        }
    }
}

/// The resources of `resource_error/1`.
#[derive(Debug, Clone, Copy)]
pub enum ResourceError {
    /// The per-query step limit.
    Steps,
}

/// The missing things of `existence_error/2`.
#[derive(Debug)]
pub enum ExistenceError {
    /// An unknown predicate.
    Procedure(Atom, usize),
    /// A missing alias in the registry of the given kind.
    Alias(Atom, Atom),
    /// A resource of the given kind that no longer exists, e.g. a closed
    /// stream.
    Resource(Atom, Term),
}

/// Anything that can be reported as the culprit of an error.
pub trait ErrorCulprit {
    /// The culprit as an owned term. A cyclic culprit is reported as a
    /// representation error instead.
    fn into_culprit(self, machine_st: &MachineState) -> Result<Term, MachineError>;
}

impl ErrorCulprit for HeapCellValue {
    #[inline]
    fn into_culprit(self, machine_st: &MachineState) -> Result<Term, MachineError> {
        machine_st.read_term(self)
    }
}

impl ErrorCulprit for Term {
    #[inline]
    fn into_culprit(self, _machine_st: &MachineState) -> Result<Term, MachineError> {
        Ok(self)
    }
}

impl ErrorCulprit for Atom {
    #[inline]
    fn into_culprit(self, _machine_st: &MachineState) -> Result<Term, MachineError> {
        Ok(Term::atom(self.as_str()))
    }
}

impl MachineState {
    /// `instantiation_error`
    pub fn instantiation_error(&self) -> MachineError {
        MachineError {
            stub: Term::atom("instantiation_error"),
        }
    }

    /// `type_error(Type, Culprit)`
    pub fn type_error<T: ErrorCulprit>(&self, valid_type: ValidType, culprit: T) -> MachineError {
        match culprit.into_culprit(self) {
            Ok(culprit) => MachineError {
                stub: Term::compound(
                    "type_error",
                    [Term::atom(valid_type.as_atom().as_str()), culprit],
                ),
            },
            Err(err) => err,
        }
    }

    /// `domain_error(Domain, Culprit)`
    pub fn domain_error<T: ErrorCulprit>(
        &self,
        error: DomainErrorType,
        culprit: T,
    ) -> MachineError {
        match culprit.into_culprit(self) {
            Ok(culprit) => MachineError {
                stub: Term::compound(
                    "domain_error",
                    [Term::atom(error.as_atom().as_str()), culprit],
                ),
            },
            Err(err) => err,
        }
    }

    /// `existence_error(Kind, Culprit)`
    pub fn existence_error(&self, err: ExistenceError) -> MachineError {
        let (kind, culprit) = match err {
            ExistenceError::Procedure(name, arity) => (
                Term::atom("procedure"),
                Term::compound("/", [Term::atom(name.as_str()), Term::integer(arity as i64)]),
            ),
            ExistenceError::Alias(kind, alias) => {
                (Term::atom(kind.as_str()), Term::atom(alias.as_str()))
            }
            ExistenceError::Resource(kind, culprit) => (Term::atom(kind.as_str()), culprit),
        };

        MachineError {
            stub: Term::compound("existence_error", [kind, culprit]),
        }
    }

    /// `permission_error(Action, Type, Culprit)`
    pub fn permission_error<T: ErrorCulprit>(
        &self,
        perm: Permission,
        type_atom: Atom,
        culprit: T,
    ) -> MachineError {
        match culprit.into_culprit(self) {
            Ok(culprit) => MachineError {
                stub: Term::compound(
                    "permission_error",
                    [
                        Term::atom(perm.as_atom().as_str()),
                        Term::atom(type_atom.as_str()),
                        culprit,
                    ],
                ),
            },
            Err(err) => err,
        }
    }

    /// `representation_error(Flag)`
    pub fn representation_error(&self, flag: RepFlag) -> MachineError {
        MachineError {
            stub: Term::compound("representation_error", [Term::atom(flag.as_atom().as_str())]),
        }
    }

    /// `resource_error(Resource)`
    pub fn resource_error(&self, err: ResourceError) -> MachineError {
        let resource = match err {
            ResourceError::Steps => "steps",
        };

        MachineError {
            stub: Term::compound("resource_error", [Term::atom(resource)]),
        }
    }

    /// Wraps a platform fault in a foreign handle so the condition carries
    /// the original error.
    pub fn foreign_error(&self, err: ForeignError) -> MachineError {
        let fault = ForeignHandle::from_fault(err);

        MachineError {
            stub: Term::compound("foreign_error", [Term::Foreign(fault)]),
        }
    }

    /// Builds `error(Formal, context(Name/Arity, ArgNo))`. `arg` is 0 when no
    /// single argument is at fault.
    pub fn error_form(&self, err: MachineError, src: FunctorStub, arg: usize) -> MachineStub {
        let (name, arity) = src;

        let context = Term::compound(
            "context",
            [
                Term::compound("/", [Term::atom(name.as_str()), Term::integer(arity as i64)]),
                Term::integer(arg as i64),
            ],
        );

        MachineStub::new(Term::compound("error", [err.stub, context]))
    }
}

/// The fault wrapped by a `foreign_error/1` condition, if `ball` is one.
pub fn foreign_fault(ball: &Term) -> Option<&ForeignHandle> {
    match ball {
        Term::Compound(name, args) if name == "error" && args.len() == 2 => match &args[0] {
            Term::Compound(name, args) if name == "foreign_error" && args.len() == 1 => {
                match &args[0] {
                    Term::Foreign(handle) => Some(handle),
                    _ => None,
                }
            }
            _ => None,
        },
        _ => None,
    }
}
