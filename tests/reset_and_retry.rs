// tests/reset_and_retry.rs
//
// Caller-driven retry: Reset reopens failed nodes only.

mod common;
use crate::common::{Calls, WAIT, init_tracing};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tasker::dag::{GraphBuilder, NodeState};

#[test]
fn reset_is_a_noop_without_failures() {
    init_tracing();
    let calls = Calls::new();

    let mut b = GraphBuilder::<()>::new();
    let c = calls.clone();
    let a = b
        .create("a", move |_| {
            c.record("a");
            Ok(true)
        })
        .unwrap();
    let c = calls.clone();
    let d = b
        .create("b", move |_| {
            c.record("b");
            Ok(true)
        })
        .unwrap();
    b.continue_with(a, d).unwrap();
    let graph = b.build();

    assert!(graph.run(()).wait(WAIT));
    assert_eq!(graph.reset(), 0);

    // Everything is terminal and succeeded: a new run launches nothing.
    assert!(graph.run(()).wait(WAIT));
    assert_eq!(calls.count("a"), 1);
    assert_eq!(calls.count("b"), 1);
}

#[test]
fn reset_reopens_failed_and_keeps_successors_gated() {
    init_tracing();

    let mut b = GraphBuilder::<()>::new();
    let ok = b.create("ok", |_| Ok(true)).unwrap();
    let bad = b.create("bad", |_| Ok(false)).unwrap();
    let after = b.create("after", |_| Ok(true)).unwrap();
    b.continue_with(ok, bad).unwrap();
    b.continue_with(bad, after).unwrap();
    let graph = b.build();

    assert!(graph.run(()).wait(WAIT));
    assert_eq!(graph.failed(), vec!["bad"]);

    assert_eq!(graph.reset(), 1);
    assert_eq!(graph.state_of("ok"), Some(NodeState::Succeeded));
    assert_eq!(graph.state_of("bad"), Some(NodeState::Idle));
    assert_eq!(graph.state_of("after"), Some(NodeState::Idle));
    assert!(!graph.is_failed());
    assert_eq!(graph.unfinished(), vec!["bad", "after"]);

    // Still failing: `after` never opens.
    assert!(graph.run(()).wait(WAIT));
    assert_eq!(graph.state_of("after"), Some(NodeState::Idle));
}

#[test]
fn retry_loop_until_success() {
    init_tracing();
    let attempts = Arc::new(AtomicUsize::new(0));

    let mut b = GraphBuilder::<()>::new();
    let at = Arc::clone(&attempts);
    let flaky = b
        .create("flaky", move |_| {
            // Fails on the first two attempts.
            Ok(at.fetch_add(1, Ordering::SeqCst) >= 2)
        })
        .unwrap();
    let publish = b.create("publish", |_| Ok(true)).unwrap();
    b.continue_with(flaky, publish).unwrap();
    let graph = b.build();

    let mut passes = 0;
    loop {
        passes += 1;
        assert!(graph.run(()).wait(WAIT));
        if !graph.is_failed() || passes == 5 {
            break;
        }
        graph.reset();
    }

    assert_eq!(passes, 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(graph.state_of("publish"), Some(NodeState::Succeeded));
}
