//! The kernel: thread lifecycle, dispatch and mutex blocking.
//!
//! One [`Kernel`] value owns the whole scheduling state. Every operation
//! runs inside a [`CriticalSection`], takes the state lock, computes the
//! outcome on the [`Pool`], and releases the lock before any context switch.
//! The code that called [`Kernel::init`] becomes the idle context: it runs
//! whenever no thread does and is never placed in a queue.

use crate::arch::{Arch, CriticalSection};
use crate::config::KernelConfig;
use crate::errors::{InitError, SpawnError};
use crate::sched::Policy;
use crate::sync::{LockGuard, Mutex};
use crate::thread::pool::Switch;
use crate::thread::{Completion, Pool, SchedParams, Task, ThreadId};
use crate::time::{TickCounter, Ticks, TIMER_FREQUENCY_HZ, UNSET};
use portable_atomic::{AtomicBool, Ordering};

extern crate alloc;
use alloc::boxed::Box;

/// Main kernel handle.
///
/// Threads refer back to the kernel through a raw pointer stored in their
/// initial context, so spawning needs a `&'static Kernel`: put it in a
/// `static` or leak it.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
/// * `P` - Dispatch policy
pub struct Kernel<A: Arch, P: Policy> {
    policy: P,
    config: KernelConfig,
    clock: TickCounter,
    /// Set once the pool exists; never cleared
    initialized: AtomicBool,
    state: spin::Mutex<Option<Pool<A>>>,
}

impl<A: Arch, P: Policy> Kernel<A, P> {
    /// Create a kernel. Nothing is allocated until [`Kernel::init`] or the
    /// first spawn.
    pub const fn new(policy: P, config: KernelConfig) -> Self {
        Self {
            policy,
            config,
            clock: TickCounter::new(TIMER_FREQUENCY_HZ),
            initialized: AtomicBool::new(false),
            state: spin::Mutex::new(None),
        }
    }

    /// Build the thread pool: `max_threads` TCBs with their stacks, all in
    /// the free queue.
    ///
    /// The calling context becomes the idle context. Spawning initializes
    /// the kernel implicitly, so calling this is only needed to allocate
    /// early or to observe allocation failure.
    pub fn init(&self) -> Result<(), InitError> {
        let _cs = CriticalSection::<A>::enter();
        let mut state = self.state.lock();
        if state.is_some() {
            return Err(InitError::AlreadyInitialized);
        }
        self.build_pool(&mut state)
    }

    /// Check if the kernel has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Pool size and stack size this kernel was built with.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The dispatch policy consulted on every scheduler pass.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The tick counter sampled by deadline and period arithmetic.
    ///
    /// A timer driver that only counts may advance it directly; use
    /// [`Kernel::tick`] to count and reschedule.
    pub fn clock(&self) -> &TickCounter {
        &self.clock
    }

    /// Current tick.
    pub fn now(&self) -> Ticks {
        self.clock.ticks()
    }

    /// Id of the running thread, or `None` for the idle context.
    pub fn current(&self) -> Option<ThreadId> {
        let _cs = CriticalSection::<A>::enter();
        self.state.lock().as_ref().and_then(Pool::current)
    }

    /// Create a thread running `entry(arg)` without deadline or period.
    ///
    /// The thread is placed in the ready queue; it runs at the next
    /// dispatch. When `entry` returns the TCB goes back to the free queue.
    ///
    /// # Errors
    ///
    /// [`SpawnError::PoolExhausted`] if every TCB is in use. No queue is
    /// modified then.
    pub fn spawn<F>(&'static self, entry: F, arg: i32) -> Result<ThreadId, SpawnError>
    where
        F: Fn(i32) + Send + 'static,
    {
        self.spawn_task(Box::new(entry), arg, SchedParams::NONE, Completion::Free)
    }

    /// Create a thread with an absolute `deadline` and a `period`.
    ///
    /// Pass [`UNSET`] as `period` for a one-shot thread with a deadline. A
    /// periodic thread parks in the done queue when `entry` returns and is
    /// restarted from the top at tick `deadline` with a new deadline of
    /// `deadline + period`.
    ///
    /// # Errors
    ///
    /// [`SpawnError::InvalidDeadline`] or [`SpawnError::InvalidPeriod`] for
    /// zero values, [`SpawnError::PoolExhausted`] if every TCB is in use.
    pub fn spawn_with_deadline<F>(
        &'static self,
        entry: F,
        arg: i32,
        deadline: Ticks,
        period: Ticks,
    ) -> Result<ThreadId, SpawnError>
    where
        F: Fn(i32) + Send + 'static,
    {
        if deadline == 0 {
            return Err(SpawnError::InvalidDeadline);
        }
        if period == 0 {
            return Err(SpawnError::InvalidPeriod);
        }
        self.spawn_task(
            Box::new(entry),
            arg,
            SchedParams::new(deadline, period),
            Completion::ByPeriod,
        )
    }

    fn spawn_task(
        &'static self,
        task: Task,
        arg: i32,
        params: SchedParams,
        completion: Completion,
    ) -> Result<ThreadId, SpawnError> {
        let _cs = CriticalSection::<A>::enter();
        let mut state = self.state.lock();
        if state.is_none() {
            self.build_pool(&mut state)?;
        }
        let pool = state
            .as_mut()
            .ok_or(SpawnError::Init(InitError::OutOfMemory))?;

        let Some(id) = pool.allocate(task, arg, params, completion) else {
            log::warn!("spawn rejected: all {} threads in use", pool.capacity());
            return Err(SpawnError::PoolExhausted);
        };
        pool.prepare_context(id, trampoline::<A, P>, self.as_entry_arg());
        pool.make_ready(id);

        log::debug!(
            "spawned {} arg={} deadline={} period={}",
            id,
            arg,
            Ticked(params.deadline),
            Ticked(params.period)
        );
        Ok(id)
    }

    /// Give the processor to the head of the ready queue.
    ///
    /// The head is taken out before the running thread re-enters the ready
    /// queue in deadline order, so a non-empty ready queue always means a
    /// switch. The idle context yields without being queued and resumes once
    /// the ready queue runs dry. Returns at once if the ready queue is empty.
    pub fn yield_now(&self) {
        self.dispatch_if(|_, _| true);
    }

    /// Re-admit periodic threads whose deadline is the current tick.
    ///
    /// Each re-admitted thread gets a deadline one period later and restarts
    /// its body from the beginning.
    pub fn respawn_periodic_tasks(&'static self) {
        if !self.is_initialized() {
            return;
        }

        let _cs = CriticalSection::<A>::enter();
        let now = self.now();
        let mut state = self.state.lock();
        let Some(pool) = state.as_mut() else {
            return;
        };

        let readmitted = pool.readmit_due(now, trampoline::<A, P>, self.as_entry_arg());
        if readmitted > 0 {
            log::debug!("tick {}: re-admitted {} periodic thread(s)", now, readmitted);
        }
    }

    /// One scheduler pass: re-admit due periodic threads, then let the
    /// policy decide whether the running thread yields to the ready head.
    pub fn scheduler(&'static self) {
        if !self.is_initialized() {
            return;
        }

        self.respawn_periodic_tasks();
        let policy = &self.policy;
        self.dispatch_if(|current, head| policy.preempts(current, head));
    }

    /// Timer interrupt entry point: advance the clock and run a scheduler
    /// pass.
    pub fn tick(&'static self) {
        let now = self.clock.increment();
        log::trace!("tick {}", now);
        self.scheduler();
    }

    /// Acquire `mutex`, parking the running thread while another holds it.
    ///
    /// A parked thread resumes only once ownership was handed to it by
    /// [`Kernel::unlock`], so the mutex is held when this returns. The idle
    /// context cannot be parked; it yields until the mutex is released.
    pub fn lock(&self, mutex: &Mutex) {
        loop {
            let _cs = CriticalSection::<A>::enter();
            let switch = {
                let mut state = self.state.lock();
                let mut m = mutex.state.lock();
                if !m.locked {
                    m.locked = true;
                    return;
                }
                state.as_mut().and_then(|pool| pool.park_current(&mut m.wait_queue))
            };

            match switch {
                Some(switch) => {
                    log::trace!("parked on mutex {:p}", mutex);
                    // Safety: both contexts live in the pool, which is never
                    // freed once built; interrupts are masked.
                    unsafe { Self::switch(switch) };
                    return;
                }
                None => {
                    drop(_cs);
                    self.yield_now();
                    core::hint::spin_loop();
                }
            }
        }
    }

    /// Release `mutex`.
    ///
    /// With waiters, the first one moves to the ready queue and the mutex
    /// stays locked on its behalf; the caller keeps running. Without
    /// waiters the mutex becomes free.
    pub fn unlock(&self, mutex: &Mutex) {
        let _cs = CriticalSection::<A>::enter();
        let mut state = self.state.lock();
        let mut m = mutex.state.lock();

        let woken = state.as_mut().and_then(|pool| pool.wake_one(&mut m.wait_queue));
        match woken {
            Some(id) => log::trace!("mutex {:p} handed to {}", mutex, id),
            None => m.locked = false,
        }
    }

    /// [`Kernel::lock`] returning a guard that unlocks on drop.
    pub fn lock_guard<'a>(&'a self, mutex: &'a Mutex) -> LockGuard<'a, A, P> {
        self.lock(mutex);
        LockGuard { kernel: self, mutex }
    }

    /// Access the state under a critical section. `None` before init.
    pub(crate) fn with_pool<R>(&self, f: impl FnOnce(Option<&Pool<A>>) -> R) -> R {
        let _cs = CriticalSection::<A>::enter();
        let state = self.state.lock();
        f(state.as_ref())
    }

    fn build_pool(&self, state: &mut Option<Pool<A>>) -> Result<(), InitError> {
        let pool = Pool::new(&self.config)?;
        log::debug!(
            "kernel initialized: {} threads, {} byte stacks, {} policy",
            self.config.max_threads,
            self.config.stack_size,
            self.policy.name()
        );
        *state = Some(pool);
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn dispatch_if<F>(&self, preempt: F)
    where
        F: FnOnce(&SchedParams, &SchedParams) -> bool,
    {
        let _cs = CriticalSection::<A>::enter();
        let switch = {
            let mut state = self.state.lock();
            let Some(pool) = state.as_mut() else {
                return;
            };
            let from = pool.current();
            let switch = pool.rotate(preempt);
            if switch.is_some() {
                log::trace!("dispatch {:?} -> {:?}", from, pool.current());
            }
            switch
        };

        if let Some(switch) = switch {
            // Safety: both contexts live in the pool; interrupts are masked.
            unsafe { Self::switch(switch) };
        }
    }

    /// Run the body of the thread that was just switched in.
    fn run_current(&self) -> Option<Task> {
        let (task, arg) = {
            let _cs = CriticalSection::<A>::enter();
            let mut state = self.state.lock();
            state.as_mut()?.take_current_task()?
        };
        task(arg);
        Some(task)
    }

    /// Route the finished thread and dispatch the next one. Never returns:
    /// the context saved here is re-initialized before the TCB runs again.
    fn finish_current(&self, task: Task) -> ! {
        let _cs = CriticalSection::<A>::enter();
        let (switch, retired) = {
            let mut state = self.state.lock();
            let Some(pool) = state.as_mut() else {
                panic!("thread finished on a kernel without pool");
            };
            if !pool.current_stack_intact() {
                panic!("stack overflow in {:?}", pool.current());
            }
            let finished = pool.current();
            let retired = pool.retire_current(task);
            log::debug!("{:?} finished, dispatch {:?}", finished, pool.current());
            retired
        };
        // Captures may call back into the kernel when dropped (a moved
        // `LockGuard` unlocks), so the state lock must be free here.
        drop(retired);

        // Safety: both contexts live in the pool; interrupts are masked.
        unsafe { Self::switch(switch) };
        panic!("finished thread was resumed");
    }

    fn as_entry_arg(&'static self) -> usize {
        self as *const Self as usize
    }

    /// # Safety
    ///
    /// Interrupts must be masked and no kernel lock may be held.
    unsafe fn switch(switch: Switch<A>) {
        // Safety: forwarded from the caller; the pool owns both contexts.
        unsafe { A::switch_context(switch.prev, switch.next) }
    }
}

/// First frame of every thread.
extern "C" fn trampoline<A: Arch, P: Policy>(kernel: usize) -> ! {
    // Safety: `kernel` was produced by `as_entry_arg` from a `&'static Kernel`.
    let kernel = unsafe { &*(kernel as *const Kernel<A, P>) };

    // The switch that started this thread happened inside a critical
    // section that this stack never entered.
    A::enable_interrupts();

    match kernel.run_current() {
        Some(task) => kernel.finish_current(task),
        None => panic!("thread started without a body"),
    }
}

/// Tick value that prints `-` for [`UNSET`].
struct Ticked(Ticks);

impl core::fmt::Display for Ticked {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.0 == UNSET {
            write!(f, "-")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::DefaultArch;
    use crate::sched::RoundRobin;

    fn leak(config: KernelConfig) -> &'static Kernel<DefaultArch, RoundRobin> {
        Box::leak(Box::new(Kernel::new(RoundRobin, config)))
    }

    #[test]
    fn test_init_once() {
        let kernel = leak(KernelConfig::new().with_stack_size(1024));
        assert!(!kernel.is_initialized());
        assert_eq!(kernel.init(), Ok(()));
        assert!(kernel.is_initialized());
        assert_eq!(kernel.init(), Err(InitError::AlreadyInitialized));
    }

    #[test]
    fn test_init_rejects_oversized_pool() {
        let kernel = leak(KernelConfig::new().with_max_threads(70_000));
        assert_eq!(kernel.init(), Err(InitError::TooManyThreads(70_000)));
        assert!(!kernel.is_initialized());
    }

    #[test]
    fn test_lazy_spawn_reports_init_cause() {
        let kernel = leak(KernelConfig::new().with_max_threads(70_000));
        assert_eq!(
            kernel.spawn(|_| {}, 0),
            Err(SpawnError::Init(InitError::TooManyThreads(70_000)))
        );
        assert!(!kernel.is_initialized());
    }

    #[test]
    fn test_spawn_initializes_lazily() {
        let kernel = leak(KernelConfig::new().with_stack_size(1024));
        assert!(kernel.spawn(|_| {}, 0).is_ok());
        assert!(kernel.is_initialized());
        assert_eq!(kernel.current(), None);
    }

    #[test]
    fn test_spawn_validates_timing() {
        let kernel = leak(KernelConfig::new().with_stack_size(1024));
        assert_eq!(
            kernel.spawn_with_deadline(|_| {}, 0, 0, 10),
            Err(SpawnError::InvalidDeadline)
        );
        assert_eq!(
            kernel.spawn_with_deadline(|_| {}, 0, 10, 0),
            Err(SpawnError::InvalidPeriod)
        );
        assert!(!kernel.is_initialized());
    }

    #[test]
    fn test_operations_before_init_are_noops() {
        let kernel = leak(KernelConfig::new());
        kernel.yield_now();
        kernel.tick();
        assert_eq!(kernel.now(), 1);
        assert!(!kernel.is_initialized());
    }

    #[test]
    fn test_uncontended_lock_from_idle() {
        let kernel = leak(KernelConfig::new());
        let mutex = Mutex::new();
        {
            let _guard = kernel.lock_guard(&mutex);
            assert!(mutex.is_locked());
        }
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_ticked_display() {
        assert_eq!(alloc::format!("{}", Ticked(UNSET)), "-");
        assert_eq!(alloc::format!("{}", Ticked(42)), "42");
    }
}
