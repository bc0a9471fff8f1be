//! Cycle Collector Tests
//!
//! Each test states a claim about reclaiming reference cycles and tries to
//! break it. Collector state is process-wide, so every test runs serially.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{deletes, watch, Node};
use proptest::prelude::*;
use serial_test::serial;
use trueno_flow::gc::{self, deferral_depth, DeferredCollection};
use trueno_flow::prelude::{Config, Pipeline};

// ============================================================================
// SECTION 1: Immediate Collection
// ============================================================================

/// Claim 1: A two-node cycle is reclaimed once the last outside handle drops.
#[test]
#[serial]
fn claim_01_two_cycle_reclaimed() {
    let a = Node::new();
    let b = Node::new();
    Node::link(&a, &b);
    Node::link(&b, &a);
    let (da, db) = (watch(&a), watch(&b));

    drop(b);
    assert_eq!(deletes(&db), 0, "b is still reachable from a");
    drop(a);
    assert_eq!((deletes(&da), deletes(&db)), (1, 1));
}

/// Claim 2: A self-loop is a cycle like any other.
#[test]
#[serial]
fn claim_02_self_loop_reclaimed() {
    let a = Node::new();
    Node::link(&a, &a);
    let da = watch(&a);
    drop(a);
    assert_eq!(deletes(&da), 1);
}

/// Claim 3: Objects reachable from a live root survive a collection pass.
#[test]
#[serial]
fn claim_03_reachable_from_live_root_survives() {
    let root = Node::new();
    let x = Node::new();
    let y = Node::new();
    Node::link(&root, &x);
    Node::link(&x, &y);
    Node::link(&y, &x);
    let (dx, dy) = (watch(&x), watch(&y));

    drop(x);
    drop(y);
    assert_eq!((deletes(&dx), deletes(&dy)), (0, 0));
    assert!(!root.edges.lock()[0].is_destroyed());

    drop(root);
    assert_eq!((deletes(&dx), deletes(&dy)), (1, 1));
}

// ============================================================================
// SECTION 2: Deferred Collection
// ============================================================================

/// Claim 4: Nothing is destroyed while a deferral scope is open; closing the
/// outermost scope reclaims the cycle exactly once.
#[test]
#[serial]
fn claim_04_nested_deferral_collects_on_outermost_pop() {
    let a = Node::new();
    let b = Node::new();
    Node::link(&a, &b);
    Node::link(&b, &a);
    let (da, db) = (watch(&a), watch(&b));

    {
        let _outer = DeferredCollection::new();
        {
            let _inner = DeferredCollection::new();
            drop(a);
            drop(b);
            assert_eq!(deferral_depth(), 2);
        }
        assert_eq!(deletes(&da) + deletes(&db), 0, "inner pop must not collect");
    }
    assert_eq!(deferral_depth(), 0);
    assert_eq!((deletes(&da), deletes(&db)), (1, 1));
}

/// Claim 5: An acyclic participant whose last handle drops inside a scope is
/// released when the scope closes, not before.
#[test]
#[serial]
fn claim_05_deferred_plain_release() {
    let a = Node::new();
    let da = watch(&a);
    {
        let _guard = DeferredCollection::new();
        drop(a);
        assert_eq!(deletes(&da), 0);
    }
    assert_eq!(deletes(&da), 1);
}

/// Claim 6: A cycle built inside a scope and handed back out survives.
#[test]
#[serial]
fn claim_06_cycle_escaping_scope_survives() {
    let keep = {
        let _guard = DeferredCollection::new();
        let a = Node::new();
        let b = Node::new();
        Node::link(&a, &b);
        Node::link(&b, &a);
        drop(b);
        a
    };
    let da = watch(&keep);
    assert!(!keep.is_destroyed());
    assert_eq!(keep.reference_count(), 2);
    drop(keep);
    assert_eq!(deletes(&da), 1);
}

// ============================================================================
// SECTION 3: Disabled Detection
// ============================================================================

/// Claim 7: With detection off, a cycle leaks instead of being reclaimed.
#[test]
#[serial]
fn claim_07_disabled_collector_leaks_cycles() {
    gc::set_enabled(false);
    let a = Node::new();
    let b = Node::new();
    Node::link(&a, &b);
    Node::link(&b, &a);
    let (da, db) = (watch(&a), watch(&b));
    drop(a);
    drop(b);
    gc::set_enabled(true);

    assert_eq!((deletes(&da), deletes(&db)), (0, 0));
}

/// Claim 8: Building a pipeline never flips the process-wide setting; only
/// an explicit apply does.
#[test]
#[serial]
fn claim_08_pipeline_construction_keeps_collector_setting() {
    gc::set_enabled(false);
    let _default = Pipeline::new();
    let _configured = Pipeline::with_config(Config::new());
    assert!(!gc::is_enabled());

    Config::new().collector.apply();
    assert!(gc::is_enabled());
}

// ============================================================================
// SECTION 4: Random Graphs
// ============================================================================

fn reachable(n: usize, edges: &[(usize, usize)], root: usize) -> Vec<bool> {
    let mut seen = vec![false; n];
    let mut stack = vec![root];
    while let Some(i) = stack.pop() {
        if std::mem::replace(&mut seen[i], true) {
            continue;
        }
        stack.extend(edges.iter().filter(|(from, _)| *from == i).map(|(_, to)| *to));
    }
    seen
}

fn graph_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>, usize)> {
    (1usize..8).prop_flat_map(|n| {
        (Just(n), prop::collection::vec((0..n, 0..n), 0..16), 0..n)
    })
}

proptest! {
    /// Claim 9: Dropping every outside handle but one deletes exactly the
    /// nodes the survivor cannot reach, each exactly once. Dropping the last
    /// handle deletes the rest.
    #[test]
    #[serial]
    fn claim_09_random_graph_reclaimed_exactly_once((n, edges, keep) in graph_strategy()) {
        let nodes: Vec<_> = (0..n).map(|_| Node::new()).collect();
        for &(from, to) in &edges {
            Node::link(&nodes[from], &nodes[to]);
        }
        let counters: Vec<_> = nodes.iter().map(watch).collect();
        let live = reachable(n, &edges, keep);

        let mut survivor = None;
        for (i, node) in nodes.into_iter().enumerate() {
            if i == keep {
                survivor = Some(node);
            }
        }

        for i in 0..n {
            let expected = usize::from(!live[i]);
            prop_assert_eq!(deletes(&counters[i]), expected, "node {} after partial drop", i);
        }

        drop(survivor);
        for counter in &counters {
            prop_assert_eq!(deletes(counter), 1);
        }
    }

    /// Claim 10: Dropping everything inside one deferral scope gives the same
    /// result as dropping outside it.
    #[test]
    #[serial]
    fn claim_10_deferred_random_graph_reclaimed((n, edges, _keep) in graph_strategy()) {
        let nodes: Vec<_> = (0..n).map(|_| Node::new()).collect();
        for &(from, to) in &edges {
            Node::link(&nodes[from], &nodes[to]);
        }
        let counters: Vec<_> = nodes.iter().map(watch).collect();

        {
            let _guard = DeferredCollection::new();
            drop(nodes);
            for counter in &counters {
                prop_assert_eq!(deletes(counter), 0);
            }
        }
        for counter in &counters {
            prop_assert_eq!(deletes(counter), 1);
        }
    }
}
