//! Thread control blocks and the structures that hold them.
//!
//! A thread is an index into a fixed arena of [`Tcb`]s. The arena owns every
//! TCB; the free, ready and done queues and the mutex wait queues only record
//! membership and order through each TCB's intrusive `next` link.

use crate::arch::Arch;
use crate::mem::Stack;
use crate::time::{Ticks, UNSET};

extern crate alloc;
use alloc::boxed::Box;

pub mod pool;
pub mod queue;

pub use pool::Pool;
pub use queue::{Links, Queue};

/// Body of a thread: any callable taking one integer argument.
///
/// Periodic threads run their body once per period, so it must be callable
/// more than once.
pub type Task = Box<dyn Fn(i32) + Send + 'static>;

/// Index of a thread control block in the pool.
///
/// Ids are stable: a TCB keeps its id for the life of the kernel and is
/// recycled through the free queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(u16);

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "t[{}]", self.0)
    }
}

impl ThreadId {
    /// Create a thread ID from a pool index.
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Position of this thread in the pool.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scheduling parameters of a thread.
///
/// Queues are ordered by `(deadline, period)` ascending, which puts the most
/// urgent thread at the head and threads without deadline last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchedParams {
    /// Absolute deadline in ticks, or [`UNSET`]
    pub deadline: Ticks,
    /// Relative period in ticks, or [`UNSET`] for one-shot threads
    pub period: Ticks,
}

impl SchedParams {
    /// Parameters of a thread without deadline or period.
    pub const NONE: Self = Self {
        deadline: UNSET,
        period: UNSET,
    };

    pub const fn new(deadline: Ticks, period: Ticks) -> Self {
        Self { deadline, period }
    }

    /// A thread is periodic iff it has a period.
    pub fn is_periodic(&self) -> bool {
        self.period != UNSET
    }

    /// Whether a thread with these parameters belongs before `other` in an
    /// ordered queue. Equal keys keep arrival order.
    pub fn precedes(&self, other: &SchedParams) -> bool {
        self < other
    }
}

impl Default for SchedParams {
    fn default() -> Self {
        Self::NONE
    }
}

/// How a thread leaves the processor when its body returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Always back to the free queue (`spawn`)
    Free,
    /// Done queue if periodic, free queue otherwise (`spawn_with_deadline`)
    ByPeriod,
}

/// Thread control block.
pub struct Tcb<A: Arch> {
    pub(crate) id: ThreadId,
    pub(crate) task: Option<Task>,
    pub(crate) arg: i32,
    pub(crate) params: SchedParams,
    pub(crate) completion: Completion,
    pub(crate) next: Option<ThreadId>,
    pub(crate) context: A::SavedContext,
    pub(crate) stack: Stack,
}

impl<A: Arch> Tcb<A> {
    pub(crate) fn new(id: ThreadId, stack: Stack) -> Self {
        Self {
            id,
            task: None,
            arg: -1,
            params: SchedParams::NONE,
            completion: Completion::Free,
            next: None,
            context: A::SavedContext::default(),
            stack,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn arg(&self) -> i32 {
        self.arg
    }

    pub fn params(&self) -> SchedParams {
        self.params
    }

    /// Forget the body and scheduling parameters of a finished thread.
    pub(crate) fn clear(&mut self) {
        self.task = None;
        self.arg = -1;
        self.params = SchedParams::NONE;
        self.completion = Completion::Free;
    }
}
