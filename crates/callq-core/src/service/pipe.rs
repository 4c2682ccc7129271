//! Named pipes: FIFO queues where only the head is in flight.
//!
//! A prioritized arrival goes to position 1, behind the dispatched head and
//! ahead of every waiter. Pipes are created on first use and kept when empty.

use std::collections::{HashMap, VecDeque};

use crate::call::CallId;
use crate::error::ServiceError;

/// Why a member is leaving its pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// The member's transport outcome arrived; it must be the head.
    Settled,
    /// The member was abandoned; it may sit anywhere in the queue.
    Abandoned,
}

/// Anything stored in a pipe must say which call it is.
pub(crate) trait Keyed {
    fn key(&self) -> CallId;
}

#[derive(Debug)]
struct Pipe<T> {
    queue: VecDeque<T>,
}

impl<T: Keyed> Pipe<T> {
    fn enqueue(&mut self, item: T, prioritize: bool) -> usize {
        if prioritize && !self.queue.is_empty() {
            self.queue.insert(1, item);
        } else {
            self.queue.push_back(item);
        }
        self.queue.len()
    }

    fn position(&self, id: CallId) -> Option<usize> {
        self.queue.iter().position(|item| item.key() == id)
    }
}

#[derive(Debug)]
pub(crate) struct PipeTable<T> {
    pipes: HashMap<String, Pipe<T>>,
}

impl<T> Default for PipeTable<T> {
    fn default() -> Self {
        Self {
            pipes: HashMap::new(),
        }
    }
}

impl<T: Keyed + Clone> PipeTable<T> {
    /// Add `item` to pipe `name` (creating it) and return the new length.
    /// A length above one means the item must wait.
    pub(crate) fn enqueue(&mut self, name: &str, item: T, prioritize: bool) -> usize {
        self.pipes
            .entry(name.to_string())
            .or_insert_with(|| Pipe {
                queue: VecDeque::new(),
            })
            .enqueue(item, prioritize)
    }

    pub(crate) fn len(&self, name: &str) -> Result<usize, ServiceError> {
        self.pipes
            .get(name)
            .map(|p| p.queue.len())
            .ok_or_else(|| ServiceError::PipeNotFound(name.to_string()))
    }

    /// Remove call `id` from pipe `name`. Relative order of the remaining
    /// members is preserved. Returns the new head when the removed member was
    /// the head, i.e. the member that must be dispatched next.
    pub(crate) fn remove(
        &mut self,
        name: &str,
        id: CallId,
        removal: Removal,
    ) -> Result<Option<T>, ServiceError> {
        let pipe = self
            .pipes
            .get_mut(name)
            .ok_or_else(|| ServiceError::PipeNotFound(name.to_string()))?;
        let pos = pipe.position(id).ok_or_else(|| ServiceError::NotInPipe {
            call: id,
            pipe: name.to_string(),
        })?;
        if pos != 0 && removal == Removal::Settled {
            return Err(ServiceError::NotPipeHead {
                call: id,
                pipe: name.to_string(),
            });
        }
        pipe.queue.remove(pos);
        if pos == 0 {
            Ok(pipe.queue.front().cloned())
        } else {
            Ok(None)
        }
    }

    #[cfg(test)]
    pub(crate) fn members(&self, name: &str) -> Vec<CallId> {
        self.pipes
            .get(name)
            .map(|p| p.queue.iter().map(Keyed::key).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Keyed for CallId {
        fn key(&self) -> CallId {
            *self
        }
    }

    fn id(n: u64) -> CallId {
        CallId(n)
    }

    #[test]
    fn first_member_is_alone_later_members_wait() {
        let mut table = PipeTable::default();
        assert_eq!(table.enqueue("p", id(1), false), 1);
        assert_eq!(table.enqueue("p", id(2), false), 2);
        assert_eq!(table.len("p"), Ok(2));
    }

    #[test]
    fn prioritized_member_goes_second() {
        let mut table = PipeTable::default();
        table.enqueue("p", id(1), false);
        table.enqueue("p", id(2), false);
        table.enqueue("p", id(3), true);
        assert_eq!(table.members("p"), vec![id(1), id(3), id(2)]);

        table.enqueue("p", id(4), true);
        assert_eq!(table.members("p"), vec![id(1), id(4), id(3), id(2)]);
    }

    #[test]
    fn prioritized_member_on_empty_pipe_is_head() {
        let mut table = PipeTable::default();
        assert_eq!(table.enqueue("p", id(1), true), 1);
        assert_eq!(table.members("p"), vec![id(1)]);
    }

    #[test]
    fn unknown_pipe_is_an_error_but_emptied_pipe_is_not() {
        let mut table = PipeTable::default();
        assert_eq!(
            table.len("orders"),
            Err(ServiceError::PipeNotFound("orders".to_string()))
        );
        table.enqueue("orders", id(1), false);
        table.remove("orders", id(1), Removal::Settled).unwrap();
        assert_eq!(table.len("orders"), Ok(0));
    }

    #[test]
    fn removing_head_returns_next_head() {
        let mut table = PipeTable::default();
        table.enqueue("p", id(1), false);
        table.enqueue("p", id(2), false);
        assert_eq!(table.remove("p", id(1), Removal::Settled), Ok(Some(id(2))));
        assert_eq!(table.remove("p", id(2), Removal::Settled), Ok(None));
    }

    #[test]
    fn settling_a_waiter_is_rejected() {
        let mut table = PipeTable::default();
        table.enqueue("p", id(1), false);
        table.enqueue("p", id(2), false);
        assert_eq!(
            table.remove("p", id(2), Removal::Settled),
            Err(ServiceError::NotPipeHead {
                call: id(2),
                pipe: "p".to_string()
            })
        );
        assert_eq!(table.members("p"), vec![id(1), id(2)]);
    }

    #[test]
    fn abandoning_a_waiter_preserves_order_and_does_not_advance() {
        let mut table = PipeTable::default();
        for n in 1..=4 {
            table.enqueue("p", id(n), false);
        }
        assert_eq!(table.remove("p", id(3), Removal::Abandoned), Ok(None));
        assert_eq!(table.members("p"), vec![id(1), id(2), id(4)]);
    }

    #[test]
    fn removing_a_stranger_is_an_error() {
        let mut table = PipeTable::default();
        table.enqueue("p", id(1), false);
        assert!(matches!(
            table.remove("p", id(9), Removal::Abandoned),
            Err(ServiceError::NotInPipe { .. })
        ));
        assert!(matches!(
            table.remove("q", id(1), Removal::Abandoned),
            Err(ServiceError::PipeNotFound(_))
        ));
    }
}
