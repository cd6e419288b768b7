//! Follow and unfollow through the public API.

use std::sync::Arc;

use relation_cache::{CacheConfig, MutationOutcome, RemoteError, RemoteOp, UserId};

use crate::support::{fixture, gated_fixture};

fn ids(names: &[&str]) -> Vec<UserId> {
    names.iter().map(|name| UserId::from(*name)).collect()
}

#[tokio::test]
async fn follow_updates_both_views_and_counts() {
    let fx = fixture("a", CacheConfig::default());
    fx.remote.add_user("b");

    assert_eq!(fx.cache.follow("b").await.unwrap(), MutationOutcome::Committed);

    assert!(fx.cache.is_following("b").unwrap());
    assert_eq!(fx.cache.followers_of("b").unwrap(), ids(&["a"]));
    assert_eq!(fx.cache.following_of("a").unwrap(), ids(&["b"]));
    assert_eq!(fx.cache.follower_count("b").unwrap(), 1);
    assert_eq!(fx.cache.following_count("a").unwrap(), 1);
    assert!(fx.remote.is_following("a", "b"));
}

#[tokio::test]
async fn follow_is_optimistic_and_rolls_back() {
    let fx = gated_fixture("a", CacheConfig::default());
    fx.remote.inner.add_user("b");
    fx.remote
        .inner
        .fail_next(RemoteOp::ApplyFollow, RemoteError::Unavailable("offline".into()));

    let cache = Arc::clone(&fx.cache);
    let in_flight = tokio::spawn(async move { cache.follow("b").await });
    fx.remote.wait_for_parked(1).await;
    assert!(fx.cache.is_following("b").unwrap());
    assert_eq!(fx.cache.follower_count("b").unwrap(), 1);

    fx.remote.release(1);
    assert_eq!(in_flight.await.unwrap().unwrap(), MutationOutcome::RolledBack);
    assert!(!fx.cache.is_following("b").unwrap());
    assert_eq!(fx.cache.follower_count("b").unwrap(), 0);
    assert_eq!(fx.cache.following_count("a").unwrap(), 0);
    assert!(!fx.remote.inner.is_following("a", "b"));
}

#[tokio::test]
async fn unfollow_round_trip_restores_counts() {
    let fx = fixture("a", CacheConfig::default());
    fx.remote.add_follow("c", "b");
    fx.cache.load_followers("b").await.unwrap();
    fx.cache.load_following("a").await.unwrap();

    fx.cache.follow("b").await.unwrap();
    assert_eq!(fx.cache.follower_count("b").unwrap(), 2);

    fx.cache.unfollow("b").await.unwrap();
    assert_eq!(fx.cache.followers_of("b").unwrap(), ids(&["c"]));
    assert_eq!(fx.cache.follower_count("b").unwrap(), 1);
    assert_eq!(fx.cache.following_count("a").unwrap(), 0);
}

#[tokio::test]
async fn reconciliation_picks_up_edges_made_elsewhere() {
    let fx = fixture("a", CacheConfig::default());
    fx.remote.add_user("b");
    fx.cache.load_followers("b").await.unwrap();
    // Someone else follows b after our load.
    fx.remote.add_follow("d", "b");

    fx.cache.follow("b").await.unwrap();

    assert_eq!(fx.cache.followers_of("b").unwrap(), ids(&["a", "d"]));
    assert_eq!(fx.cache.follower_count("b").unwrap(), 2);
}

#[tokio::test]
async fn without_reconciliation_only_the_local_delta_applies() {
    let fx = fixture("a", CacheConfig::default().with_reconciliation(false));
    fx.remote.add_user("b");
    fx.cache.load_followers("b").await.unwrap();
    fx.remote.add_follow("d", "b");

    fx.cache.follow("b").await.unwrap();

    assert_eq!(fx.cache.followers_of("b").unwrap(), ids(&["a"]));
    assert_eq!(
        fx.remote.calls(),
        vec![RemoteOp::FetchFollowers, RemoteOp::ApplyFollow]
    );
}

#[tokio::test]
async fn load_replaces_follow_sets_wholesale() {
    let fx = fixture("a", CacheConfig::default().with_reconciliation(false));
    fx.remote.add_user("b");
    fx.cache.follow("b").await.unwrap();
    fx.remote.remove_follow("a", "b");
    fx.remote.add_follow("a", "c");

    let following = fx.cache.load_following("a").await.unwrap();

    assert_eq!(following.len(), 1);
    assert_eq!(fx.cache.following_of("a").unwrap(), ids(&["c"]));
    assert_eq!(fx.cache.following_count("a").unwrap(), 1);
}

#[tokio::test]
async fn unknown_user_loads_as_empty() {
    let fx = fixture("a", CacheConfig::default());

    assert!(fx.cache.load_followers("ghost").await.unwrap().is_empty());
    assert!(fx.cache.load_following("ghost").await.unwrap().is_empty());
    assert_eq!(fx.cache.follower_count("ghost").unwrap(), 0);
}

#[tokio::test]
async fn follow_unknown_user_rolls_back() {
    let fx = fixture("a", CacheConfig::default());

    assert_eq!(
        fx.cache.follow("ghost").await.unwrap(),
        MutationOutcome::RolledBack
    );
    assert!(!fx.cache.is_following("ghost").unwrap());
    assert_eq!(fx.cache.following_count("a").unwrap(), 0);
}
