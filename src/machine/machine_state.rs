//! Machine registers, choice points and the exception slot.

use crate::machine::code::*;
use crate::machine::heap::*;
use crate::machine::lib_machine::Term;
use crate::machine::machine_errors::*;
use crate::machine::or_stack::*;
use crate::machine::trail::*;
use crate::types::*;

use std::fmt;

use tracing::{debug, trace};

/// The exception slot. Holds the ball while it unwinds to a catch point;
/// cleared when a catch point claims it or a new query begins. Balls are
/// owned copies so they survive the heap truncation of backtracking.
#[derive(Debug, Default)]
pub(crate) struct Ball {
    stub: Option<Term>,
}

impl Ball {
    #[inline]
    pub(crate) fn set(&mut self, stub: Term) {
        self.stub = Some(stub);
    }

    #[inline]
    pub(crate) fn take(&mut self) -> Option<Term> {
        self.stub.take()
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<&Term> {
        self.stub.as_ref()
    }

    #[inline]
    pub(crate) fn reset(&mut self) {
        self.stub = None;
    }
}

/// A heap top and trail length saved by [`MachineState::heap_mark`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapMark {
    h: usize,
    tr: usize,
}

/// The mutable state of one engine: term arena, trail, choice points and
/// the control registers.
pub struct MachineState {
    pub(crate) heap: Heap,
    pub(crate) trail: Trail,
    pub(crate) or_stack: OrStack,
    /// Or-stack depth at the entry of the current predicate.
    pub(crate) b0: usize,
    /// Or-stack depth just above the innermost active catch frame; 0 when
    /// no catch is active.
    pub(crate) block: usize,
    pub(crate) ball: Ball,
    pub(crate) occurs_check: bool,
}

impl MachineState {
    pub(crate) fn new(occurs_check: bool) -> Self {
        MachineState {
            heap: Heap::with_capacity(256),
            trail: Trail::new(),
            or_stack: OrStack::new(),
            b0: 0,
            block: 0,
            ball: Ball::default(),
            occurs_check,
        }
    }

    /// Prepares for a new query. The heap and trail are kept, so cells
    /// built by the host before the query stay valid and a [`HeapMark`]
    /// taken before it can still be released.
    pub(crate) fn reset_query(&mut self) {
        self.reset_control();
        self.ball.reset();
    }

    fn reset_control(&mut self) {
        self.or_stack.clear();
        self.b0 = 0;
        self.block = 0;
    }

    /// Marks the current heap top and trail length.
    #[inline]
    pub fn heap_mark(&self) -> HeapMark {
        HeapMark {
            h: self.heap.cell_len(),
            tr: self.trail.mark(),
        }
    }

    /// Releases everything built since `mark`: bindings made after it are
    /// undone, cells above it are dropped and every choice point is
    /// discarded. Cells read out of the heap before the release must not be
    /// used after it.
    pub fn reset_heap(&mut self, mark: HeapMark) {
        trace!(
            heap_len = self.heap.cell_len(),
            heap_mark = mark.h,
            "reset heap"
        );

        let tr = mark.tr.min(self.trail.len());

        self.trail.undo_to(tr, &mut self.heap);
        self.heap.truncate(mark.h);
        self.reset_control();
    }

    /// Pushes a choice point resuming at `alternative`.
    pub fn push_choice_point(&mut self, alternative: GoalRef) {
        self.or_stack.push(Frame {
            tr: self.trail.mark(),
            h: self.heap.cell_len(),
            b0: self.b0,
            block: self.block,
            alternative,
        });
    }

    /// Pops the most recent choice point, restoring the state saved in it,
    /// and returns its alternative. `None` when no choice point remains.
    pub fn backtrack(&mut self) -> Option<GoalRef> {
        let frame = self.or_stack.pop()?;

        trace!(
            depth = self.or_stack.len(),
            trail_mark = frame.tr,
            bindings_undone = self.trail.len() - frame.tr,
            "backtrack"
        );

        self.trail.undo_to(frame.tr, &mut self.heap);
        self.heap.truncate(frame.h);
        self.b0 = frame.b0;
        self.block = frame.block;

        Some(frame.alternative)
    }

    /// Sets the cut register to the current or-stack depth. Compiled
    /// predicates call this on entry.
    #[inline]
    pub fn set_b0(&mut self) {
        self.b0 = self.or_stack.len();
    }

    /// The barrier a clause captures on entry.
    #[inline]
    pub fn cut_barrier(&self) -> CutBarrier {
        CutBarrier(self.b0)
    }

    /// The barrier at the current or-stack depth.
    #[inline]
    pub fn current_barrier(&self) -> CutBarrier {
        CutBarrier(self.or_stack.len())
    }

    /// Discards every choice point pushed since `barrier` was captured.
    pub fn cut(&mut self, barrier: CutBarrier) {
        let depth = self.or_stack.len();

        if depth > barrier.depth() {
            trace!(
                barrier = barrier.depth(),
                discarded = depth - barrier.depth(),
                "cut"
            );

            self.or_stack.truncate(barrier.depth());
        }
    }

    /// Raises `err`: stores the ball and unwinds to the innermost catch
    /// frame, returning the catch point to resume. An uncaught ball is
    /// returned as `Err`, with the or-stack emptied and the ball left in
    /// the slot.
    pub(crate) fn throw(&mut self, err: MachineStub) -> Result<GoalRef, MachineStub> {
        let ball = err.into_ball();
        debug!(ball = %ball, block = self.block, "throw");

        if self.block > 0 {
            self.or_stack.truncate(self.block);

            if let Some(catch_point) = self.backtrack() {
                self.ball.set(ball);
                return Ok(catch_point);
            }
        }

        debug!(ball = %ball, "uncaught");

        self.or_stack.clear();
        self.ball.set(ball.clone());

        Err(MachineStub::new(ball))
    }

    /// The last raised condition, if it has not been claimed.
    #[inline]
    pub fn exception(&self) -> Option<&Term> {
        self.ball.peek()
    }

    /// The term arena.
    #[inline]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// The term arena, for building cells by hand.
    #[inline]
    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    /// A trail position to pass to [`undo_to`](MachineState::undo_to).
    #[inline]
    pub fn trail_mark(&self) -> usize {
        self.trail.mark()
    }

    /// The number of recorded bindings.
    #[inline]
    pub fn trail_len(&self) -> usize {
        self.trail.len()
    }

    /// Undoes every binding made since `mark`.
    #[inline]
    pub fn undo_to(&mut self, mark: usize) {
        self.trail.undo_to(mark, &mut self.heap);
    }

    /// The number of live choice points.
    #[inline]
    pub fn choice_point_depth(&self) -> usize {
        self.or_stack.len()
    }
}

impl fmt::Debug for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineState")
            .field("heap_len", &self.heap.cell_len())
            .field("trail_len", &self.trail.len())
            .field("choice_points", &self.or_stack.len())
            .field("b0", &self.b0)
            .field("block", &self.block)
            .field("ball", &self.ball.peek())
            .finish()
    }
}
