//! Property-based tests for the request queue using proptest
//!
//! These tests verify that queue order, sequence numbers and completion
//! flags keep their invariants under arbitrary interleavings of enqueue and
//! drain operations.

use crate::queue::{Answer, Parameters, RequestQueue};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn test_fifo_ordering_single_thread(
        batches in prop::collection::vec(
            prop::collection::vec("[a-z]{1,8}", 1..10),
            1..5
        )
    ) {
        let queue = RequestQueue::new();
        let mut expected = Vec::new();
        let mut handles = Vec::new();

        for batch in &batches {
            for value in batch {
                handles.push(queue.enqueue(Parameters::from_pairs([("v", value.clone())])));
                expected.push(value.clone());
            }
        }

        for value in &expected {
            let request = queue.dequeue_one();
            prop_assert!(request.is_some());
            let request = request.unwrap();
            prop_assert_eq!(request.parameters().get("v"), Some(value.as_str()));
            request.signal_completion(Answer::Text(value.clone()));
        }

        prop_assert!(queue.is_empty());
        for (handle, value) in handles.iter_mut().zip(expected) {
            prop_assert!(handle.await_completion(Duration::from_millis(10)));
            prop_assert_eq!(handle.take_answer(), Some(Answer::Text(value)));
        }
    }

    #[test]
    fn test_interleaved_ids_strictly_increase(
        operations in prop::collection::vec(
            prop::bool::weighted(0.6), // 60% enqueue, 40% drain
            1..200
        )
    ) {
        let queue = RequestQueue::new();
        let mut handles = Vec::new();
        let mut last_drained: Option<u64> = None;
        let mut expected_len = 0usize;

        for &should_enqueue in &operations {
            if should_enqueue {
                handles.push(queue.enqueue(Parameters::new()));
                expected_len += 1;
            } else if let Some(request) = queue.dequeue_one() {
                if let Some(last) = last_drained {
                    prop_assert!(request.id() > last);
                }
                last_drained = Some(request.id());
                request.signal_completion(Answer::Text(String::new()));
                expected_len -= 1;
            } else {
                prop_assert_eq!(expected_len, 0);
            }

            prop_assert_eq!(queue.len(), expected_len);
            prop_assert_eq!(queue.has_work(), expected_len > 0);
        }

        let drained = handles.iter().filter(|h| h.is_completed()).count();
        prop_assert_eq!(drained + expected_len, handles.len());
    }
}
