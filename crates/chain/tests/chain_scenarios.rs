//! End-to-end chain scenarios against mock cluster collaborators.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing_test::traced_test;
use txchain_chain::{
    ChainError, ChainState, ChainTransaction, ChainedTransactionFactory, TransactionChain,
};
use txchain_messages::ClusterMessage;
use txchain_test_helpers::{ready_after, ready_ok, settle, MockRouter, ReadyTrigger, TestCluster};
use txchain_types::ShardName;

fn alpha() -> ShardName {
    ShardName::new("alpha")
}

fn make_chain() -> (TransactionChain, TestCluster) {
    let cluster = TestCluster::new(MockRouter::new().with_leader("alpha", "member-3/shard-alpha"));
    let chain = TransactionChain::new(cluster.context.clone(), ChainedTransactionFactory);
    (chain, cluster)
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn routing_waits_for_slow_ready_then_answers() {
    let (chain, cluster) = make_chain();
    let start = Instant::now();

    let t1 = chain.new_write_only_transaction().unwrap();
    assert!(chain.state().is_allocated());

    t1.ready(vec![ready_after(Duration::from_millis(50))]).unwrap();
    assert!(chain.state().is_submitted());

    let mut lookup = chain.resolve_shard_for_routing(&alpha());

    // Not available before the ready future resolves.
    assert!(timeout(Duration::from_millis(49), &mut lookup).await.is_err());
    assert_eq!(cluster.router.lookup_count(), 0);

    let leader = lookup.await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(50));
    assert_eq!(Ok(leader), cluster.router.expected(&alpha()));

    settle().await;
    assert!(chain.state().is_idle());
}

#[tokio::test]
#[traced_test]
async fn late_completion_is_a_no_op_after_newer_ready() {
    let (chain, _cluster) = make_chain();

    let t1 = chain.new_write_only_transaction().unwrap();
    let (slow, slow_ready) = ReadyTrigger::pending("alpha");
    t1.ready(vec![slow_ready]).unwrap();
    let submitted_t1 = chain.state();

    let t2 = chain.new_write_only_transaction().unwrap();
    let t2_id = t2.identifier().clone();
    t2.ready(vec![ready_ok()]).unwrap();

    // T2's own completion resets the chain; T1's is still outstanding.
    settle().await;
    assert!(chain.state().is_idle());

    let t3 = chain.new_write_only_transaction().unwrap();
    let allocated_t3 = chain.state();
    assert_ne!(t3.identifier(), &t2_id);

    slow.succeed();
    settle().await;

    // T1's reset targeted its own submitted instance, which is long gone.
    let state = chain.state();
    assert!(Arc::ptr_eq(&state, &allocated_t3));
    assert!(!Arc::ptr_eq(&state, &submitted_t1));
    assert_eq!(state.transaction(), Some(t3.identifier()));
}

#[tokio::test]
#[traced_test]
async fn close_wins_over_pending_ready() {
    let (chain, cluster) = make_chain();

    let t1 = chain.new_write_only_transaction().unwrap();
    let (trigger, ready) = ReadyTrigger::pending("alpha");
    t1.ready(vec![ready]).unwrap();
    assert!(chain.state().is_submitted());

    chain.close();
    assert!(chain.state().is_closed());

    trigger.succeed();
    settle().await;
    assert!(chain.state().is_closed());

    assert_eq!(
        chain.new_write_only_transaction().unwrap_err(),
        ChainError::ChainClosed
    );

    let messages = cluster.broadcast.messages();
    assert_eq!(messages.len(), 1);
    let ClusterMessage::CloseTransactionChain(close) = &messages[0];
    assert_eq!(close.chain_id(), chain.chain_id());
}

#[tokio::test]
#[traced_test]
async fn sequential_pairs_keep_one_allocated_transaction() {
    let (chain, _cluster) = make_chain();

    for round in 0..20 {
        let tx = if round % 2 == 0 {
            chain.new_write_only_transaction().unwrap()
        } else {
            chain.new_read_write_transaction().unwrap()
        };

        // At most one allocated transaction at any instant.
        assert!(matches!(
            chain.new_write_only_transaction(),
            Err(ChainError::PreviousTransactionNotReady { .. })
        ));

        let id = tx.identifier().clone();
        let futures = if round % 3 == 0 { Vec::new() } else { vec![ready_ok()] };
        chain.ready(&id, futures).unwrap();
        assert!(!chain.state().is_allocated());
    }

    settle().await;
    assert!(matches!(*chain.state(), ChainState::Idle));
}

#[tokio::test]
#[traced_test]
async fn routing_after_idle_goes_straight_to_router() {
    let (chain, cluster) = make_chain();

    let t1 = chain.new_write_only_transaction().unwrap();
    t1.ready(vec![ready_ok()]).unwrap();
    settle().await;
    assert!(chain.state().is_idle());

    let t2 = chain.new_write_only_transaction().unwrap();
    let leader = t2.resolve_shard(&alpha()).await.unwrap();

    assert_eq!(leader.leader, "member-3/shard-alpha");
    assert_eq!(cluster.router.lookups(), vec![alpha()]);
}

#[tokio::test]
#[traced_test]
async fn failed_ready_fails_queued_lookups_without_routing() {
    let (chain, cluster) = make_chain();

    let t1 = chain.new_write_only_transaction().unwrap();
    let (trigger, ready) = ReadyTrigger::pending("alpha");
    t1.ready(vec![ready]).unwrap();

    let t2 = chain.new_write_only_transaction().unwrap();
    let first = tokio::spawn(t2.resolve_shard(&alpha()));
    let second = tokio::spawn(t2.resolve_shard(&ShardName::new("beta")));
    settle().await;

    trigger.fail("shard stopped");

    for lookup in [first, second] {
        let err = lookup.await.unwrap().unwrap_err();
        assert!(matches!(err, ChainError::Readiness(_)));
    }
    assert_eq!(cluster.router.lookup_count(), 0);

    // T1's failed completion cannot reset over T2's allocation.
    settle().await;
    assert_eq!(chain.state().transaction(), Some(t2.identifier()));
}
