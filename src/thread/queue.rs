//! Ordered intrusive queues of thread ids.
//!
//! A [`Queue`] is only a head index. The links live in the arena, reached
//! through the [`Links`] trait, so splicing a thread in or out never moves or
//! allocates anything. Insertion is an explicit O(n) scan.

use super::{SchedParams, ThreadId};

/// Access to the intrusive `next` links and sort keys of an arena.
pub trait Links {
    /// The thread following `id` in whatever queue it belongs to.
    fn next(&self, id: ThreadId) -> Option<ThreadId>;

    /// Overwrite the link of `id`.
    fn set_next(&mut self, id: ThreadId, next: Option<ThreadId>);

    /// Sort key of `id`.
    fn params(&self, id: ThreadId) -> SchedParams;
}

/// Singly-linked queue of threads.
#[derive(Debug, Default)]
pub struct Queue {
    head: Option<ThreadId>,
}

impl Queue {
    pub const fn new() -> Self {
        Self { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// First thread of the queue without removing it.
    pub fn head(&self) -> Option<ThreadId> {
        self.head
    }

    /// Insert `id` ordered ascending by `(deadline, period)`.
    ///
    /// The new element goes after every element with an equal key, so a
    /// queue of threads without deadlines behaves as a FIFO.
    pub fn enqueue<L: Links>(&mut self, links: &mut L, id: ThreadId) {
        let key = links.params(id);

        match self.head {
            Some(head) if !key.precedes(&links.params(head)) => {
                let mut prev = head;
                while let Some(next) = links.next(prev) {
                    if key.precedes(&links.params(next)) {
                        break;
                    }
                    prev = next;
                }
                links.set_next(id, links.next(prev));
                links.set_next(prev, Some(id));
            }
            head => {
                links.set_next(id, head);
                self.head = Some(id);
            }
        }
    }

    /// Append `id` at the tail regardless of its scheduling parameters.
    pub fn push_back<L: Links>(&mut self, links: &mut L, id: ThreadId) {
        links.set_next(id, None);
        match self.tail(links) {
            Some(tail) => links.set_next(tail, Some(id)),
            None => self.head = Some(id),
        }
    }

    /// Remove and return the head, or `None` if the queue is empty.
    pub fn dequeue<L: Links>(&mut self, links: &mut L) -> Option<ThreadId> {
        let head = self.head?;
        self.head = links.next(head);
        links.set_next(head, None);
        Some(head)
    }

    /// Remove `id` from anywhere in the queue. `None` if it is not a member.
    pub fn dequeue_by_id<L: Links>(&mut self, links: &mut L, id: ThreadId) -> Option<ThreadId> {
        if self.head == Some(id) {
            return self.dequeue(links);
        }

        let mut prev = self.head?;
        while let Some(next) = links.next(prev) {
            if next == id {
                links.set_next(prev, links.next(id));
                links.set_next(id, None);
                return Some(id);
            }
            prev = next;
        }
        None
    }

    fn tail<L: Links>(&self, links: &L) -> Option<ThreadId> {
        let mut tail = self.head?;
        while let Some(next) = links.next(tail) {
            tail = next;
        }
        Some(tail)
    }

    /// Iterate over the members from head to tail.
    pub fn iter<'a, L: Links>(&self, links: &'a L) -> Iter<'a, L> {
        Iter {
            links,
            cursor: self.head,
        }
    }

    pub fn len<L: Links>(&self, links: &L) -> usize {
        self.iter(links).count()
    }

    pub fn contains<L: Links>(&self, links: &L, id: ThreadId) -> bool {
        self.iter(links).any(|member| member == id)
    }
}

/// Iterator over the members of a [`Queue`].
pub struct Iter<'a, L: Links> {
    links: &'a L,
    cursor: Option<ThreadId>,
}

impl<'a, L: Links> Iterator for Iter<'a, L> {
    type Item = ThreadId;

    fn next(&mut self) -> Option<ThreadId> {
        let current = self.cursor?;
        self.cursor = self.links.next(current);
        Some(current)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::time::UNSET;
    use alloc::vec::Vec;

    /// Bare arena of links and keys.
    pub(crate) struct TestLinks {
        pub(crate) nodes: Vec<(SchedParams, Option<ThreadId>)>,
    }

    impl TestLinks {
        pub(crate) fn with_params(params: &[SchedParams]) -> Self {
            Self {
                nodes: params.iter().map(|p| (*p, None)).collect(),
            }
        }
    }

    impl Links for TestLinks {
        fn next(&self, id: ThreadId) -> Option<ThreadId> {
            self.nodes[id.index()].1
        }

        fn set_next(&mut self, id: ThreadId, next: Option<ThreadId>) {
            self.nodes[id.index()].1 = next;
        }

        fn params(&self, id: ThreadId) -> SchedParams {
            self.nodes[id.index()].0
        }
    }

    fn t(i: u16) -> ThreadId {
        ThreadId::new(i)
    }

    fn members(queue: &Queue, links: &TestLinks) -> Vec<u16> {
        queue.iter(links).map(|id| id.index() as u16).collect()
    }

    #[test]
    fn test_enqueue_orders_by_deadline_then_period() {
        let mut links = TestLinks::with_params(&[
            SchedParams::new(300, 100),
            SchedParams::new(100, 100),
            SchedParams::new(200, 50),
            SchedParams::new(200, 20),
            SchedParams::NONE,
        ]);
        let mut queue = Queue::new();
        for i in [4, 0, 1, 2, 3] {
            queue.enqueue(&mut links, t(i));
        }

        assert_eq!(members(&queue, &links), [1, 3, 2, 0, 4]);
    }

    #[test]
    fn test_equal_keys_keep_arrival_order() {
        let mut links = TestLinks::with_params(&[SchedParams::NONE; 4]);
        let mut queue = Queue::new();
        for i in [2, 0, 3, 1] {
            queue.enqueue(&mut links, t(i));
        }

        assert_eq!(members(&queue, &links), [2, 0, 3, 1]);
    }

    #[test]
    fn test_push_back_ignores_keys() {
        let mut links = TestLinks::with_params(&[
            SchedParams::new(500, 500),
            SchedParams::new(10, 10),
            SchedParams::NONE,
        ]);
        let mut queue = Queue::new();
        for i in [0, 2, 1] {
            queue.push_back(&mut links, t(i));
        }

        assert_eq!(members(&queue, &links), [0, 2, 1]);
    }

    #[test]
    fn test_dequeue_empty_is_none() {
        let mut links = TestLinks::with_params(&[]);
        let mut queue = Queue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(&mut links), None);
    }

    #[test]
    fn test_dequeue_takes_head_and_clears_link() {
        let mut links = TestLinks::with_params(&[SchedParams::new(1, UNSET), SchedParams::new(2, UNSET)]);
        let mut queue = Queue::new();
        queue.enqueue(&mut links, t(1));
        queue.enqueue(&mut links, t(0));

        assert_eq!(queue.dequeue(&mut links), Some(t(0)));
        assert_eq!(links.next(t(0)), None);
        assert_eq!(queue.head(), Some(t(1)));
        assert_eq!(queue.dequeue(&mut links), Some(t(1)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dequeue_by_id_head_middle_tail_and_missing() {
        let mut links = TestLinks::with_params(&[SchedParams::NONE; 5]);
        let mut queue = Queue::new();
        for i in 0..4 {
            queue.push_back(&mut links, t(i));
        }

        assert_eq!(queue.dequeue_by_id(&mut links, t(2)), Some(t(2)));
        assert_eq!(members(&queue, &links), [0, 1, 3]);
        assert_eq!(queue.dequeue_by_id(&mut links, t(0)), Some(t(0)));
        assert_eq!(members(&queue, &links), [1, 3]);
        assert_eq!(queue.dequeue_by_id(&mut links, t(3)), Some(t(3)));
        assert_eq!(members(&queue, &links), [1]);
        assert_eq!(queue.dequeue_by_id(&mut links, t(4)), None);
        assert_eq!(members(&queue, &links), [1]);
    }

    #[test]
    fn test_len_and_contains() {
        let mut links = TestLinks::with_params(&[SchedParams::NONE; 3]);
        let mut queue = Queue::new();
        queue.enqueue(&mut links, t(0));
        queue.enqueue(&mut links, t(2));

        assert_eq!(queue.len(&links), 2);
        assert!(queue.contains(&links, t(2)));
        assert!(!queue.contains(&links, t(1)));
    }
}
