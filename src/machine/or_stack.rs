//! The choice-point stack.

use crate::machine::code::GoalRef;

use std::ops::Index;

/// A choice point: the state to restore and the goal to resume when
/// execution fails back into it.
pub struct Frame {
    /// Trail length when the frame was pushed.
    pub tr: usize,
    /// Heap top when the frame was pushed.
    pub h: usize,
    /// The `b0` cut register when the frame was pushed.
    pub b0: usize,
    /// The catch block register when the frame was pushed.
    pub block: usize,
    /// The goal to resume.
    pub alternative: GoalRef,
}

/// The choice-point stack. Cutting truncates it, so discarded frames can
/// never be resumed.
#[derive(Default)]
pub struct OrStack(Vec<Frame>);

impl OrStack {
    /// An empty stack.
    #[inline]
    pub fn new() -> Self {
        OrStack(Vec::new())
    }

    /// Pushes a choice point.
    #[inline]
    pub fn push(&mut self, frame: Frame) {
        self.0.push(frame);
    }

    /// Pops the most recent choice point.
    #[inline]
    pub fn pop(&mut self) -> Option<Frame> {
        self.0.pop()
    }

    /// The number of live choice points.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Discards every choice point.
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear()
    }

    /// The most recent choice point.
    #[inline]
    pub fn top(&self) -> Option<&Frame> {
        self.0.last()
    }

    /// Discards every frame at or above depth `b`.
    #[inline]
    pub fn truncate(&mut self, b: usize) {
        self.0.truncate(b);
    }

    /// True if no choice point is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<usize> for OrStack {
    type Output = Frame;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}
