//! Like toggling through the public API.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use relation_cache::{
    CacheConfig, MutationKind, MutationOutcome, MutationState, Post, RemoteError, RemoteOp,
};

use crate::support::{count_notifications, fixture, gated_fixture};

#[tokio::test]
async fn like_is_visible_before_remote_confirms() {
    let fx = gated_fixture("u", CacheConfig::default());
    fx.remote.inner.add_post(Post::new("p").with_like_count(5));
    fx.cache.load_posts().await.unwrap();

    let cache = Arc::clone(&fx.cache);
    let in_flight = tokio::spawn(async move { cache.toggle_like("p").await });
    fx.remote.wait_for_parked(1).await;

    assert_eq!(fx.cache.like_count("p").unwrap(), 6);
    assert!(fx.cache.is_post_liked_by_current_user("p").unwrap());
    let pending = fx.cache.pending_mutations().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind(), MutationKind::Like);
    assert_eq!(pending[0].state(), MutationState::AppliedLocally);

    fx.remote.release(1);
    assert_eq!(in_flight.await.unwrap().unwrap(), MutationOutcome::Committed);
    assert_eq!(fx.cache.like_count("p").unwrap(), 6);
    assert!(fx.cache.pending_mutations().unwrap().is_empty());
    assert_eq!(fx.remote.inner.post("p").unwrap().like_count, 6);
}

#[tokio::test]
async fn failed_unlike_restores_the_like() {
    let fx = gated_fixture("u", CacheConfig::default());
    fx.remote
        .inner
        .add_post(Post::new("p").with_like_count(3).liked_by(["u", "v"]));
    fx.cache.load_posts().await.unwrap();
    let hits = count_notifications(&fx.cache);
    fx.remote
        .inner
        .fail_next(RemoteOp::ApplyUnlike, RemoteError::Unavailable("timeout".into()));

    let cache = Arc::clone(&fx.cache);
    let in_flight = tokio::spawn(async move { cache.toggle_like("p").await });
    fx.remote.wait_for_parked(1).await;
    assert_eq!(fx.cache.like_count("p").unwrap(), 2);
    assert!(!fx.cache.is_post_liked_by_current_user("p").unwrap());

    fx.remote.release(1);
    assert_eq!(in_flight.await.unwrap().unwrap(), MutationOutcome::RolledBack);
    assert_eq!(fx.cache.like_count("p").unwrap(), 3);
    assert!(fx.cache.is_post_liked_by_current_user("p").unwrap());
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn posts_do_not_interfere() {
    let fx = gated_fixture("u", CacheConfig::default());
    fx.remote.inner.add_post(Post::new("p1").with_like_count(1));
    fx.remote.inner.add_post(Post::new("p2").with_like_count(7));
    fx.cache.load_posts().await.unwrap();
    fx.remote
        .inner
        .fail_next(RemoteOp::ApplyLike, RemoteError::Unavailable("503".into()));

    let first = {
        let cache = Arc::clone(&fx.cache);
        tokio::spawn(async move { cache.toggle_like("p1").await })
    };
    fx.remote.wait_for_parked(1).await;
    let second = {
        let cache = Arc::clone(&fx.cache);
        tokio::spawn(async move { cache.toggle_like("p2").await })
    };
    fx.remote.wait_for_parked(2).await;

    fx.remote.release(1);
    assert_eq!(first.await.unwrap().unwrap(), MutationOutcome::RolledBack);
    // p2 was still in flight while p1 rolled back.
    assert_eq!(fx.cache.like_count("p2").unwrap(), 8);
    fx.remote.release(1);
    assert_eq!(second.await.unwrap().unwrap(), MutationOutcome::Committed);

    assert_eq!(fx.cache.like_count("p1").unwrap(), 1);
    assert!(!fx.cache.is_post_liked_by_current_user("p1").unwrap());
    assert_eq!(fx.cache.like_count("p2").unwrap(), 8);
    assert!(fx.cache.is_post_liked_by_current_user("p2").unwrap());
}

#[tokio::test]
async fn load_posts_reports_viewer_membership() {
    let fx = fixture("u2", CacheConfig::default());
    fx.remote
        .add_post(Post::new("p").with_like_count(10).liked_by(["u1", "u2"]));

    fx.cache.load_posts().await.unwrap();

    assert_eq!(fx.cache.like_count("p").unwrap(), 10);
    assert!(fx.cache.is_post_liked_by_current_user("p").unwrap());
}

#[tokio::test]
async fn like_count_never_goes_negative() {
    let fx = fixture("u", CacheConfig::default());
    // Membership says liked but the aggregate already reads zero.
    fx.cache
        .initialize_like_state(&[Post::new("p").with_like_count(0).liked_by(["u"])])
        .unwrap();
    fx.remote.add_post(Post::new("p").liked_by(["u"]));

    fx.cache.toggle_like("p").await.unwrap();

    assert_eq!(fx.cache.like_count("p").unwrap(), 0);
    assert!(!fx.cache.is_post_liked_by_current_user("p").unwrap());
}

#[tokio::test]
async fn sign_out_blocks_further_likes() {
    let fx = fixture("u", CacheConfig::default());
    fx.remote.add_post(Post::new("p"));
    fx.cache.load_posts().await.unwrap();

    fx.identity.sign_out().unwrap();

    assert!(fx.cache.toggle_like("p").await.is_err());
    assert_eq!(fx.cache.like_count("p").unwrap(), 0);
    assert_eq!(fx.remote.calls(), vec![RemoteOp::FetchPosts]);
}

#[tokio::test]
async fn like_cancelled_by_caller_timeout_is_rolled_back() {
    let fx = gated_fixture("u", CacheConfig::default());
    fx.remote.inner.add_post(Post::new("p").with_like_count(5));
    fx.cache.load_posts().await.unwrap();
    let hits = count_notifications(&fx.cache);

    let timed_out =
        tokio::time::timeout(Duration::from_millis(20), fx.cache.toggle_like("p")).await;
    fx.remote.release(1);

    assert!(timed_out.is_err());
    assert!(fx.cache.pending_mutations().unwrap().is_empty());
    assert_eq!(fx.cache.like_count("p").unwrap(), 5);
    assert!(!fx.cache.is_post_liked_by_current_user("p").unwrap());
    assert_eq!(fx.remote.inner.post("p").unwrap().like_count, 5);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(fx.cache.export_snapshot().is_ok());
}
