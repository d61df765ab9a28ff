//! The thread pool: arena, system queues and the running thread.
//!
//! Everything here is plain state manipulation. Operations that end in a
//! dispatch return a [`Switch`] holding the two contexts involved; the
//! kernel performs the actual switch after releasing its locks.

use super::queue::{Links, Queue};
use super::{Completion, SchedParams, Task, Tcb, ThreadId};
use crate::arch::{Arch, ContextEntry};
use crate::config::KernelConfig;
use crate::errors::InitError;
use crate::mem::Stack;
use crate::time::Ticks;

extern crate alloc;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Fixed storage of thread control blocks.
pub struct Arena<A: Arch> {
    tcbs: Vec<Tcb<A>>,
}

impl<A: Arch> Arena<A> {
    pub fn capacity(&self) -> usize {
        self.tcbs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tcb<A>> {
        self.tcbs.iter()
    }
}

impl<A: Arch> core::ops::Index<ThreadId> for Arena<A> {
    type Output = Tcb<A>;

    fn index(&self, id: ThreadId) -> &Tcb<A> {
        &self.tcbs[id.index()]
    }
}

impl<A: Arch> core::ops::IndexMut<ThreadId> for Arena<A> {
    fn index_mut(&mut self, id: ThreadId) -> &mut Tcb<A> {
        &mut self.tcbs[id.index()]
    }
}

impl<A: Arch> Links for Arena<A> {
    fn next(&self, id: ThreadId) -> Option<ThreadId> {
        self[id].next
    }

    fn set_next(&mut self, id: ThreadId, next: Option<ThreadId>) {
        self[id].next = next;
    }

    fn params(&self, id: ThreadId) -> SchedParams {
        self[id].params
    }
}

/// The two contexts of a pending context switch.
pub struct Switch<A: Arch> {
    pub prev: *mut A::SavedContext,
    pub next: *const A::SavedContext,
}

/// Kernel scheduling state.
///
/// Every TCB is, at any observation point, in exactly one of the free,
/// ready or done queues, in one mutex wait queue, or is `current`.
pub struct Pool<A: Arch> {
    pub(crate) arena: Arena<A>,
    pub(crate) free: Queue,
    pub(crate) ready: Queue,
    pub(crate) done: Queue,
    /// Running thread; `None` while the idle context runs
    pub(crate) current: Option<ThreadId>,
    /// Threads parked in some mutex wait queue
    pub(crate) blocked: usize,
    /// Saved context of the code that called `init` (the idle pseudo-thread)
    idle: Box<A::SavedContext>,
}

impl<A: Arch> Pool<A> {
    /// Allocate `config.max_threads` TCBs and put them all in the free
    /// queue in id order.
    pub fn new(config: &KernelConfig) -> Result<Self, InitError> {
        if config.max_threads > u16::MAX as usize {
            return Err(InitError::TooManyThreads(config.max_threads));
        }

        let mut tcbs = Vec::new();
        tcbs.try_reserve_exact(config.max_threads)
            .map_err(|_| InitError::OutOfMemory)?;
        for index in 0..config.max_threads {
            let stack = Stack::new(config.stack_size).ok_or(InitError::OutOfMemory)?;
            tcbs.push(Tcb::new(ThreadId::new(index as u16), stack));
        }

        let mut pool = Self {
            arena: Arena { tcbs },
            free: Queue::new(),
            ready: Queue::new(),
            done: Queue::new(),
            current: None,
            blocked: 0,
            idle: Box::new(A::SavedContext::default()),
        };
        for index in 0..config.max_threads {
            pool.free.push_back(&mut pool.arena, ThreadId::new(index as u16));
        }
        Ok(pool)
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    /// Scheduling parameters of whatever is running; the idle context has
    /// neither deadline nor period.
    pub fn current_params(&self) -> SchedParams {
        self.current
            .map(|id| self.arena[id].params)
            .unwrap_or(SchedParams::NONE)
    }

    /// Take a TCB from the free queue and give it a body.
    ///
    /// Returns `None` when the pool is exhausted; nothing is modified then.
    pub fn allocate(
        &mut self,
        task: Task,
        arg: i32,
        params: SchedParams,
        completion: Completion,
    ) -> Option<ThreadId> {
        let id = self.free.dequeue(&mut self.arena)?;
        let tcb = &mut self.arena[id];
        tcb.task = Some(task);
        tcb.arg = arg;
        tcb.params = params;
        tcb.completion = completion;
        Some(id)
    }

    /// Give `id` a fresh context that starts `entry(arg)` on its own stack.
    ///
    /// `id` must not be running, nor suspended with a context anybody will
    /// resume.
    pub fn prepare_context(&mut self, id: ThreadId, entry: ContextEntry, arg: usize) {
        debug_assert_ne!(self.current, Some(id), "re-initializing the running thread");
        let tcb = &mut self.arena[id];
        let top = tcb.stack.top();
        // Safety: the stack belongs to this TCB alone and the TCB is not
        // running, so no live frame sits on it.
        unsafe { A::init_context(&mut tcb.context, top, entry, arg) };
    }

    /// Put `id` in the ready queue in deadline order.
    pub fn make_ready(&mut self, id: ThreadId) {
        self.ready.enqueue(&mut self.arena, id);
    }

    /// Switch to the ready head if `preempt(current, head)` says so.
    ///
    /// The running thread goes back into the ready queue; the idle context
    /// is never queued. Returns `None` (keep running) when the ready queue
    /// is empty or the predicate declines.
    pub fn rotate<F>(&mut self, preempt: F) -> Option<Switch<A>>
    where
        F: FnOnce(&SchedParams, &SchedParams) -> bool,
    {
        let head = self.ready.head()?;
        if !preempt(&self.current_params(), &self.arena[head].params) {
            return None;
        }

        let next = self.ready.dequeue(&mut self.arena);
        if let Some(current) = self.current {
            self.ready.enqueue(&mut self.arena, current);
        }
        Some(self.switch_to(next))
    }

    /// Hand the body of the running thread to the trampoline.
    pub fn take_current_task(&mut self) -> Option<(Task, i32)> {
        let tcb = &mut self.arena[self.current?];
        let task = tcb.task.take()?;
        Some((task, tcb.arg))
    }

    /// Route the running thread after its body returned and dispatch the
    /// next ready thread (or the idle context).
    ///
    /// Periodic threads spawned with a deadline keep their body and their
    /// expired deadline in the done queue; everything else is cleared and
    /// returned to the free queue, and the body is handed back so the caller
    /// can drop it once no kernel lock is held.
    ///
    /// # Panics
    ///
    /// Panics if the idle context is running: it has no body to finish.
    pub fn retire_current(&mut self, task: Task) -> (Switch<A>, Option<Task>) {
        let id = match self.current {
            Some(id) => id,
            None => panic!("idle context cannot finish a thread body"),
        };

        let tcb = &mut self.arena[id];
        let retired = if tcb.completion == Completion::ByPeriod && tcb.params.is_periodic() {
            tcb.task = Some(task);
            self.done.enqueue(&mut self.arena, id);
            None
        } else {
            tcb.clear();
            self.free.enqueue(&mut self.arena, id);
            Some(task)
        };

        let next = self.ready.dequeue(&mut self.arena);
        (self.switch_to(next), retired)
    }

    /// Park the running thread at the tail of `wait_queue` and dispatch the
    /// ready head (or the idle context). Returns `None` if the idle context
    /// is running, since it cannot be queued.
    pub fn park_current(&mut self, wait_queue: &mut Queue) -> Option<Switch<A>> {
        let id = self.current?;
        wait_queue.push_back(&mut self.arena, id);
        self.blocked += 1;

        let next = self.ready.dequeue(&mut self.arena);
        Some(self.switch_to(next))
    }

    /// Move the head of `wait_queue` to the ready queue.
    pub fn wake_one(&mut self, wait_queue: &mut Queue) -> Option<ThreadId> {
        let id = wait_queue.dequeue(&mut self.arena)?;
        self.blocked -= 1;
        self.ready.enqueue(&mut self.arena, id);
        Some(id)
    }

    /// Re-admit every done thread whose deadline divides `now`.
    ///
    /// Each one gets its deadline advanced by its period and a fresh context
    /// so its body restarts from the top. Returns how many were re-admitted.
    ///
    /// # Panics
    ///
    /// Panics if a due thread cannot be removed from the done queue, which
    /// means the queue links are corrupted.
    pub fn readmit_due(&mut self, now: Ticks, entry: ContextEntry, arg: usize) -> usize {
        let mut readmitted = 0;
        let mut cursor = self.done.head();

        while let Some(id) = cursor {
            // Saved before `id` is unlinked.
            cursor = self.arena.next(id);

            let deadline = self.arena[id].params.deadline;
            if deadline == 0 || now % deadline != 0 {
                continue;
            }

            self.readmit(id, entry, arg);
            readmitted += 1;
        }

        readmitted
    }

    /// Move `id` from the done queue to the ready queue with its deadline
    /// advanced by one period.
    fn readmit(&mut self, id: ThreadId, entry: ContextEntry, arg: usize) {
        if self.done.dequeue_by_id(&mut self.arena, id).is_none() {
            panic!("periodic thread {} vanished from the done queue", id);
        }

        let params = &mut self.arena[id].params;
        params.deadline = params.deadline.saturating_add(params.period);
        self.prepare_context(id, entry, arg);
        self.ready.enqueue(&mut self.arena, id);
    }

    /// Check that the running thread's stack canary is intact.
    pub fn current_stack_intact(&self) -> bool {
        self.current
            .map(|id| self.arena[id].stack.canary_intact())
            .unwrap_or(true)
    }

    fn context_ptr(&mut self, id: Option<ThreadId>) -> *mut A::SavedContext {
        match id {
            Some(id) => &mut self.arena[id].context,
            None => &mut *self.idle,
        }
    }

    fn switch_to(&mut self, next: Option<ThreadId>) -> Switch<A> {
        let prev = self.context_ptr(self.current);
        self.current = next;
        Switch {
            prev,
            next: self.context_ptr(next),
        }
    }
}
