//! Property-based tests for the priority queue's ordering invariant and
//! the digest cache's terminality invariant.

use digestd::cache::{DigestCache, SnapshotState, Terminal};
use digestd::queue::{PriorityQueue, QueueItem, WorkItem};
use digestd::wire::Request;
use proptest::prelude::*;

fn costs_strategy() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..1_000_000, 1..30)
}

fn hex_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{64}".prop_map(String::from)
}

proptest! {
    /// Contract: whatever order items are pushed in, popping them all back
    /// out yields non-decreasing cost — the queue's ordering invariant.
    #[test]
    fn queue_pops_in_non_decreasing_cost_order(costs in costs_strategy()) {
        let queue = PriorityQueue::new();
        for (i, &cost) in costs.iter().enumerate() {
            queue.push(QueueItem {
                item: WorkItem::Dispatch(Request::new(1, format!("/p{i}")).unwrap()),
                cost,
            });
        }

        let mut popped = Vec::with_capacity(costs.len());
        for _ in 0..costs.len() {
            popped.push(queue.pop().cost);
        }

        prop_assert!(popped.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Contract: among items of equal cost, pop order matches push order.
    #[test]
    fn queue_preserves_fifo_order_within_equal_cost(count in 1usize..20) {
        let queue = PriorityQueue::new();
        for i in 0..count {
            queue.push(QueueItem {
                item: WorkItem::Dispatch(Request::new(1, format!("/same/{i}")).unwrap()),
                cost: 7,
            });
        }

        let mut paths = Vec::with_capacity(count);
        for _ in 0..count {
            match queue.pop().item {
                WorkItem::Dispatch(request) => paths.push(request.path),
                WorkItem::Shutdown => unreachable!("no shutdown items were pushed"),
            }
        }

        let expected: Vec<String> = (0..count).map(|i| format!("/same/{i}")).collect();
        prop_assert_eq!(paths, expected);
    }

    /// Contract: once an entry resolves to `Ready`, every later observation
    /// through `await_result`, `try_get`, and `snapshot` reports that same
    /// digest, no matter how many times it's queried — the cache's
    /// terminality invariant.
    #[test]
    fn completed_entry_is_stable_under_repeated_observation(hex in hex_strategy(), observations in 1usize..10) {
        let cache = DigestCache::new();
        let (entry, created) = cache.lookup_or_insert("/tmp/stable");
        prop_assert!(created);
        cache.complete(&entry, Terminal::Ready(hex.clone()));

        for _ in 0..observations {
            prop_assert_eq!(cache.await_result(&entry), Terminal::Ready(hex.clone()));
            prop_assert_eq!(cache.try_get("/tmp/stable"), Some(hex.clone()));

            let snapshot = cache.snapshot();
            let tag = snapshot
                .iter()
                .find(|(path, _)| path == "/tmp/stable")
                .map(|(_, tag)| tag.clone());
            prop_assert_eq!(tag, Some(SnapshotState::Ready(hex.clone())));
        }
    }

    /// Contract: a failed entry stays `Failed` forever and is never
    /// surfaced as a digest by `try_get`.
    #[test]
    fn failed_entry_is_stable_and_never_surfaced_by_try_get(observations in 1usize..10) {
        let cache = DigestCache::new();
        let (entry, created) = cache.lookup_or_insert("/tmp/gone");
        prop_assert!(created);
        cache.complete(&entry, Terminal::Failed);

        for _ in 0..observations {
            prop_assert_eq!(cache.await_result(&entry), Terminal::Failed);
            prop_assert_eq!(cache.try_get("/tmp/gone"), None);
        }
    }
}
