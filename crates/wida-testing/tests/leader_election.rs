//! Leader-uniqueness property: at most one scheduler instance holds
//! leadership at any instant, and killing the leader lets another take
//! over within the election period.

use wida_core::leader::LeaderElection;
use wida_testing::InMemoryLeaderElection;

#[tokio::test]
async fn only_one_instance_is_leader_at_a_time() {
    let mut cluster = InMemoryLeaderElection::cluster(&["a", "b"]);
    let b = cluster.pop().unwrap();
    let a = cluster.pop().unwrap();

    assert!(a.try_acquire().await.unwrap());
    assert!(!b.try_acquire().await.unwrap());
    assert!(a.is_leader());
    assert!(!b.is_leader());

    // Re-acquiring is idempotent for the current holder.
    assert!(a.try_acquire().await.unwrap());
}

#[tokio::test]
async fn killing_the_leader_lets_another_instance_take_over() {
    let mut cluster = InMemoryLeaderElection::cluster(&["a", "b"]);
    let b = cluster.pop().unwrap();
    let a = cluster.pop().unwrap();

    assert!(a.try_acquire().await.unwrap());
    assert!(!b.try_acquire().await.unwrap());

    // The leader crashes without releasing cleanly.
    a.simulate_crash();
    assert!(!a.is_leader());

    // The lock is now up for grabs; the surviving instance takes over on
    // its next election tick.
    assert!(b.try_acquire().await.unwrap());
    assert!(b.is_leader());
}
