//! Session lifecycle: login, refresh, logout and warm start.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use relation_cache::{
    CacheConfig, CacheError, CacheSession, InMemoryRemoteStore, InMemorySnapshotStore, Post,
    SessionIdentity, SnapshotStore, UserId,
};

use crate::support::init_tracing;

fn backend(identity: &Arc<SessionIdentity>) -> InMemoryRemoteStore {
    InMemoryRemoteStore::new(identity.clone())
        .with_user("alice")
        .with_user("bob")
        .with_post(Post::new("p1").with_like_count(2).with_author("bob"))
}

#[tokio::test]
async fn warm_start_restores_the_previous_session() {
    init_tracing();
    let identity = Arc::new(SessionIdentity::signed_in("alice"));
    let remote = Arc::new(backend(&identity));
    let snapshots = Arc::new(InMemorySnapshotStore::new());

    let first = CacheSession::begin(identity.clone(), remote.clone(), CacheConfig::default())
        .unwrap()
        .with_snapshots(snapshots.clone())
        .unwrap();
    first.refresh().await.unwrap();
    first.cache().toggle_like("p1").await.unwrap();
    first.cache().follow("bob").await.unwrap();
    first.end().unwrap();
    assert!(snapshots.get_snapshot("alice").unwrap().is_some());

    remote.set_offline(true);
    let second = CacheSession::begin(identity, remote, CacheConfig::default())
        .unwrap()
        .with_snapshots(snapshots)
        .unwrap();

    let cache = second.cache();
    assert_eq!(cache.like_count("p1").unwrap(), 3);
    assert!(cache.is_post_liked_by_current_user("p1").unwrap());
    assert!(cache.is_following("bob").unwrap());
    assert_eq!(cache.posts().unwrap()[0].author_id, Some(UserId::from("bob")));
}

#[tokio::test]
async fn logout_then_login_as_someone_else() {
    init_tracing();
    let identity = Arc::new(SessionIdentity::signed_in("alice"));
    let remote = Arc::new(backend(&identity));
    let snapshots = Arc::new(InMemorySnapshotStore::new());

    let alice = CacheSession::begin(identity.clone(), remote.clone(), CacheConfig::default())
        .unwrap()
        .with_snapshots(snapshots.clone())
        .unwrap();
    alice.refresh().await.unwrap();
    alice.cache().toggle_like("p1").await.unwrap();
    alice.end().unwrap();
    identity.sign_out().unwrap();

    assert_eq!(
        CacheSession::begin(identity.clone(), remote.clone(), CacheConfig::default()).err(),
        Some(CacheError::Unauthenticated)
    );

    identity.sign_in("bob").unwrap();
    let bob = CacheSession::begin(identity, remote, CacheConfig::default())
        .unwrap()
        .with_snapshots(snapshots.clone())
        .unwrap();
    assert_eq!(bob.user_id().as_str(), "bob");
    // Nothing of alice's session leaks into bob's.
    assert!(bob.cache().posts().unwrap().is_empty());

    bob.refresh().await.unwrap();
    assert_eq!(bob.cache().like_count("p1").unwrap(), 3);
    assert!(!bob.cache().is_post_liked_by_current_user("p1").unwrap());
    assert_eq!(snapshots.users().unwrap(), vec![UserId::from("alice")]);
}

#[tokio::test]
async fn session_listeners_are_dropped_at_end() {
    init_tracing();
    let identity = Arc::new(SessionIdentity::signed_in("alice"));
    let session = CacheSession::begin(
        identity.clone(),
        Arc::new(backend(&identity)),
        CacheConfig::default(),
    )
    .unwrap();
    let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let id = session.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    session.on_failure(|_| {});

    session.refresh().await.unwrap();
    let after_refresh = hits.load(Ordering::SeqCst);
    assert_eq!(after_refresh, 3);

    assert!(session.unsubscribe(id));
    assert!(!session.unsubscribe(id));
    let cache = Arc::clone(session.cache());
    session.end().unwrap();

    assert_eq!(cache.notifier().listener_count(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), after_refresh);
}
