//! Work Queue Tests
//!
//! Concurrency properties of the bounded SPMC ring.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use cinevault::worker::WorkQueue;

#[test]
fn test_multiset_preserved_across_consumers() {
    const ITEMS: i32 = 2000;
    const CONSUMERS: usize = 4;

    let queue = Arc::new(WorkQueue::with_capacity(128));
    let taken = Arc::new(AtomicUsize::new(0));

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let taken = Arc::clone(&taken);
            thread::spawn(move || {
                let mut local = Vec::new();
                while taken.load(Ordering::Relaxed) < ITEMS as usize {
                    if let Some(item) = queue.pop() {
                        taken.fetch_add(1, Ordering::Relaxed);
                        local.push(item);
                    } else {
                        std::hint::spin_loop();
                    }
                }
                local
            })
        })
        .collect();

    for item in 0..ITEMS {
        while !queue.push(item) {
            std::hint::spin_loop();
        }
    }

    let mut popped: Vec<i32> = Vec::new();
    let mut per_consumer: Vec<Vec<i32>> = Vec::new();
    for consumer in consumers {
        let local = consumer.join().unwrap();
        popped.extend_from_slice(&local);
        per_consumer.push(local);
    }

    // every pushed item came out exactly once
    popped.sort_unstable();
    assert_eq!(popped, (0..ITEMS).collect::<Vec<_>>());

    // each consumer observed a strictly increasing subsequence
    for local in per_consumer {
        assert!(local.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[test]
fn test_push_wakes_a_blocked_waiter() {
    let queue = Arc::new(WorkQueue::with_capacity(8));
    let cancel = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = mpsc::channel();

    let waiter = {
        let queue = Arc::clone(&queue);
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            queue.wait_not_empty(&cancel);
            sender.send(queue.pop()).unwrap();
        })
    };

    // let the waiter reach the condition wait, then publish one item
    thread::sleep(Duration::from_millis(50));
    assert!(queue.push(99));

    let woken = receiver
        .recv_timeout(Duration::from_secs(2))
        .expect("waiter never woke up");
    assert_eq!(woken, Some(99));
    waiter.join().unwrap();
}

#[test]
fn test_cancel_unblocks_waiters() {
    let queue = Arc::new(WorkQueue::with_capacity(8));
    let cancel = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = mpsc::channel();

    let waiter = {
        let queue = Arc::clone(&queue);
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            queue.wait_not_empty(&cancel);
            sender.send(()).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(50));
    cancel.store(true, Ordering::Relaxed);
    queue.wake_all();

    receiver
        .recv_timeout(Duration::from_secs(2))
        .expect("cancelled waiter never woke up");
    waiter.join().unwrap();
}

#[test]
fn test_capacity_bound_holds_under_contention() {
    let queue = Arc::new(WorkQueue::with_capacity(4));
    for item in 0..4 {
        assert!(queue.push(item));
    }
    assert!(!queue.push(4));

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut seen = Vec::new();
            while seen.len() < 4 {
                if let Some(item) = queue.pop() {
                    seen.push(item);
                }
            }
            seen
        })
    };
    assert_eq!(consumer.join().unwrap(), vec![0, 1, 2, 3]);
    assert!(queue.is_empty());
    assert!(queue.push(4));
}
