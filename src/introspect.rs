//! Read-only views of the kernel state.

use crate::arch::Arch;
use crate::kernel::Kernel;
use crate::sched::Policy;
use crate::thread::{Pool, Queue, SchedParams, ThreadId};
use crate::time::{Ticks, UNSET};
use core::fmt;

extern crate alloc;
use alloc::vec::Vec;

/// One thread as seen in a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub arg: i32,
    pub params: SchedParams,
}

/// Copy of the kernel state at one instant.
///
/// Queues are listed head first. A freshly built kernel reports every thread
/// as free; an uninitialized one reports no threads at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Tick at which the snapshot was taken
    pub now: Ticks,
    /// Size of the pool
    pub capacity: usize,
    /// Running thread, `None` for the idle context
    pub current: Option<ThreadInfo>,
    pub free: Vec<ThreadId>,
    pub ready: Vec<ThreadInfo>,
    pub done: Vec<ThreadInfo>,
    /// Threads parked on some mutex
    pub blocked: usize,
}

impl Snapshot {
    /// Threads accounted for: free + ready + done + blocked + running.
    pub fn accounted(&self) -> usize {
        self.free.len()
            + self.ready.len()
            + self.done.len()
            + self.blocked
            + usize::from(self.current.is_some())
    }

    /// Whether `id` is in the ready queue.
    pub fn is_ready(&self, id: ThreadId) -> bool {
        self.ready.iter().any(|info| info.id == id)
    }

    /// Whether `id` is in the done queue.
    pub fn is_done(&self, id: ThreadId) -> bool {
        self.done.iter().any(|info| info.id == id)
    }
}

fn info<A: Arch>(pool: &Pool<A>, id: ThreadId) -> ThreadInfo {
    let tcb = &pool.arena[id];
    ThreadInfo {
        id,
        arg: tcb.arg(),
        params: tcb.params(),
    }
}

fn infos<A: Arch>(pool: &Pool<A>, queue: &Queue) -> Vec<ThreadInfo> {
    queue.iter(&pool.arena).map(|id| info(pool, id)).collect()
}

struct Deadline(Ticks);

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == UNSET {
            write!(f, "{:>10}", "-")
        } else {
            write!(f, "{:>10}", self.0)
        }
    }
}

fn capture<A: Arch>(pool: &Pool<A>, now: Ticks) -> Snapshot {
    Snapshot {
        now,
        capacity: pool.capacity(),
        current: pool.current().map(|id| info(pool, id)),
        free: pool.free.iter(&pool.arena).collect(),
        ready: infos(pool, &pool.ready),
        done: infos(pool, &pool.done),
        blocked: pool.blocked,
    }
}

/// One line of the thread table printed by [`Kernel::dump`].
struct Row {
    thread: ThreadInfo,
    stack_intact: bool,
}

fn rows<A: Arch>(pool: &Pool<A>) -> Vec<Row> {
    pool.arena
        .iter()
        .map(|tcb| Row {
            thread: ThreadInfo {
                id: tcb.id(),
                arg: tcb.arg(),
                params: tcb.params(),
            },
            stack_intact: tcb.stack.canary_intact(),
        })
        .collect()
}

fn write_queue<W: fmt::Write>(
    out: &mut W,
    name: &str,
    ids: impl Iterator<Item = ThreadId>,
) -> fmt::Result {
    write!(out, "{}:", name)?;
    for id in ids {
        write!(out, " {}", id.index())?;
    }
    writeln!(out)
}

impl<A: Arch, P: Policy> Kernel<A, P> {
    /// Copy the queues and the running thread.
    pub fn snapshot(&self) -> Snapshot {
        let now = self.now();
        self.with_pool(|pool| match pool {
            None => Snapshot {
                now,
                ..Snapshot::default()
            },
            Some(pool) => capture(pool, now),
        })
    }

    /// Write the thread table, the running thread and the free, ready and
    /// done queues to `out`, one item per line.
    ///
    /// The state is copied first and written after the kernel lock is
    /// released, so `out` may itself lock a kernel [`Mutex`].
    ///
    /// [`Mutex`]: crate::sync::Mutex
    pub fn dump<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let now = self.now();
        let copied = self.with_pool(|pool| pool.map(|pool| (capture(pool, now), rows(pool))));
        let Some((snapshot, rows)) = copied else {
            return writeln!(out, "kernel not initialized");
        };

        writeln!(out, "tick {} policy {}", now, self.policy().name())?;
        writeln!(out, "  id        arg   deadline     period  stack")?;
        for row in &rows {
            writeln!(
                out,
                "{:>4} {:>10} {} {}  {}",
                row.thread.id.index(),
                row.thread.arg,
                Deadline(row.thread.params.deadline),
                Deadline(row.thread.params.period),
                if row.stack_intact { "ok" } else { "OVERFLOW" }
            )?;
        }

        match snapshot.current {
            Some(info) => writeln!(out, "current: {}", info.id.index())?,
            None => writeln!(out, "current: idle")?,
        }
        write_queue(out, "freeQ", snapshot.free.iter().copied())?;
        write_queue(out, "readyQ", snapshot.ready.iter().map(|info| info.id))?;
        write_queue(out, "doneQ", snapshot.done.iter().map(|info| info.id))?;
        writeln!(out, "blocked: {}", snapshot.blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::DefaultArch;
    use crate::config::KernelConfig;
    use crate::sched::EarliestDeadlineFirst;
    use crate::sync::Mutex;
    use alloc::boxed::Box;
    use alloc::string::String;

    fn leak(threads: usize) -> &'static Kernel<DefaultArch, EarliestDeadlineFirst> {
        let config = KernelConfig::new().with_max_threads(threads).with_stack_size(1024);
        Box::leak(Box::new(Kernel::new(EarliestDeadlineFirst, config)))
    }

    #[test]
    fn test_snapshot_before_init_is_empty() {
        let kernel = leak(3);
        let snapshot = kernel.snapshot();
        assert_eq!(snapshot.capacity, 0);
        assert_eq!(snapshot.accounted(), 0);
    }

    #[test]
    fn test_snapshot_lists_queues_in_order() {
        let kernel = leak(4);
        let late = kernel.spawn_with_deadline(|_| {}, 7, 300, 300).unwrap();
        let early = kernel.spawn_with_deadline(|_| {}, 8, 100, UNSET).unwrap();

        let snapshot = kernel.snapshot();
        assert_eq!(snapshot.capacity, 4);
        assert_eq!(snapshot.current, None);
        assert_eq!(snapshot.free, [ThreadId::new(2), ThreadId::new(3)]);
        let ready: Vec<_> = snapshot.ready.iter().map(|info| (info.id, info.arg)).collect();
        assert_eq!(ready, [(early, 8), (late, 7)]);
        assert_eq!(snapshot.accounted(), 4);
    }

    #[test]
    fn test_dump_format() {
        let kernel = leak(2);
        kernel.spawn_with_deadline(|_| {}, 42, 100, 100).unwrap();

        let mut out = String::new();
        kernel.dump(&mut out).unwrap();

        assert!(out.starts_with("tick 0 policy earliest-deadline-first\n"));
        assert!(out.contains("   0         42        100        100  ok\n"));
        assert!(out.contains("   1         -1          -          -  ok\n"));
        assert!(out.contains("current: idle\n"));
        assert!(out.contains("freeQ: 1\n"));
        assert!(out.contains("readyQ: 0\n"));
        assert!(out.contains("doneQ:\n"));
        assert!(out.ends_with("blocked: 0\n"));
    }

    /// Console that serializes its writers through a kernel mutex.
    struct LockedConsole {
        kernel: &'static Kernel<DefaultArch, EarliestDeadlineFirst>,
        mutex: &'static Mutex,
        text: String,
    }

    impl fmt::Write for LockedConsole {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let _guard = self.kernel.lock_guard(self.mutex);
            self.text.push_str(s);
            Ok(())
        }
    }

    #[test]
    fn test_dump_into_sink_taking_kernel_mutex() {
        let kernel = leak(2);
        kernel.spawn(|_| {}, 5).unwrap();
        let mut console = LockedConsole {
            kernel,
            mutex: Box::leak(Box::new(Mutex::new())),
            text: String::new(),
        };

        kernel.dump(&mut console).unwrap();

        assert!(console.text.contains("readyQ: 0\n"));
        assert!(!console.mutex.is_locked());
    }

    #[test]
    fn test_dump_uninitialized() {
        let kernel = leak(2);
        let mut out = String::new();
        kernel.dump(&mut out).unwrap();
        assert_eq!(out, "kernel not initialized\n");
    }
}
