//! End-to-end flows through the data-access client against an on-disk store.
//!
//! Covers:
//! - Like / unlike counting
//! - Friend request accept and reject
//! - Accepted friendships are permanent
//! - Friendship privacy
//! - Ownership of deletes
//! - Profile deletion cascade
//! - Feed and comment ordering
//! - Concurrent writers

use std::sync::Arc;

use kith::client::Client;
use kith::db;
use kith::db::models::FriendshipStatus;
use kith::identity::accounts;
use kith::relationships::Relationships;
use kith::store::{DataStore, Query, SqliteStore, StoreError, Table};
use tempfile::TempDir;

struct World {
    _dir: TempDir,
    pool: kith::state::DbPool,
    store: Arc<dyn DataStore>,
}

impl World {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let pool = db::create_pool(&dir.path().join("test.db")).expect("create pool");
        db::run_migrations(&pool).expect("migrations");
        let store: Arc<dyn DataStore> = Arc::new(SqliteStore::new(pool.clone()));
        Self {
            _dir: dir,
            pool,
            store,
        }
    }

    async fn user(&self, username: &str) -> Client {
        let id = accounts::create_account(
            &self.pool,
            &format!("{}@example.com", username),
            "password123",
        )
        .unwrap();
        let client = Client::new(self.store.clone(), id);
        client.create_profile(username, None).await.unwrap();
        client
    }
}

// ============================================================================
// LIKES
// ============================================================================

#[tokio::test]
async fn like_then_unlike_updates_count() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let post = alice.create_post("hello world", None).await.unwrap();
    assert_eq!(alice.like_count(&post.id).await.unwrap(), 0);

    bob.like(&post.id).await.unwrap();
    assert_eq!(alice.like_count(&post.id).await.unwrap(), 1);

    let dup = bob.like(&post.id).await.unwrap_err();
    assert!(matches!(dup, StoreError::Constraint(_)));
    assert_eq!(alice.like_count(&post.id).await.unwrap(), 1);

    bob.unlike(&post.id).await.unwrap();
    assert_eq!(alice.like_count(&post.id).await.unwrap(), 0);
}

// ============================================================================
// FRIENDSHIPS
// ============================================================================

#[tokio::test]
async fn friend_request_accepted_by_recipient() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let request = alice
        .send_friend_request(bob.caller().as_str())
        .await
        .unwrap();
    assert_eq!(request.status, FriendshipStatus::Pending);
    assert_eq!(request.requester_id, alice.caller().as_str());

    let bob_view = Relationships::load(&bob).await.unwrap();
    assert_eq!(bob_view.incoming.len(), 1);
    assert_eq!(bob_view.incoming[0].profile.username, "alice");
    assert!(bob_view.friends.is_empty());

    let alice_view = Relationships::load(&alice).await.unwrap();
    assert_eq!(alice_view.outgoing.len(), 1);
    assert!(alice_view.incoming.is_empty());

    let accepted = bob.accept_friend_request(&request.id).await.unwrap();
    assert_eq!(accepted.status, FriendshipStatus::Accepted);

    let alice_view = Relationships::load(&alice).await.unwrap();
    let bob_view = Relationships::load(&bob).await.unwrap();
    assert!(alice_view.is_friend(bob.caller().as_str()));
    assert!(bob_view.is_friend(alice.caller().as_str()));
    assert!(alice_view.outgoing.is_empty());
    assert!(bob_view.incoming.is_empty());
}

#[tokio::test]
async fn rejecting_a_request_deletes_it() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let request = alice
        .send_friend_request(bob.caller().as_str())
        .await
        .unwrap();
    bob.reject_friend_request(&request.id).await.unwrap();

    assert!(alice.friendships().await.unwrap().is_empty());
    assert!(bob.friendships().await.unwrap().is_empty());

    // The pair is free again
    alice
        .send_friend_request(bob.caller().as_str())
        .await
        .unwrap();
}

#[tokio::test]
async fn accepted_friendship_cannot_move_back() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let request = alice
        .send_friend_request(bob.caller().as_str())
        .await
        .unwrap();
    bob.accept_friend_request(&request.id).await.unwrap();

    let mut changes = kith::store::Row::new();
    changes.insert("status".into(), "pending".into());
    let err = alice
        .update(Table::Friendships, &request.id, changes)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Constraint(_)));
}

#[tokio::test]
async fn accepted_friendship_cannot_be_deleted() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let request = alice
        .send_friend_request(bob.caller().as_str())
        .await
        .unwrap();
    bob.accept_friend_request(&request.id).await.unwrap();

    for participant in [&alice, &bob] {
        let err = participant
            .reject_friend_request(&request.id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Denied));
    }

    let remaining = alice.friendships().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, FriendshipStatus::Accepted);
    assert!(Relationships::load(&bob)
        .await
        .unwrap()
        .is_friend(alice.caller().as_str()));
}

#[tokio::test]
async fn friendship_is_invisible_to_third_party() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;
    let carol = world.user("carol").await;

    let request = alice
        .send_friend_request(bob.caller().as_str())
        .await
        .unwrap();

    let rows = carol
        .select(Table::Friendships, &Query::new().eq("id", request.id.as_str()))
        .await
        .unwrap();
    assert!(rows.is_empty());

    let err = carol.reject_friend_request(&request.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
}

#[tokio::test]
async fn self_friendship_and_self_follow_fail() {
    let world = World::new();
    let alice = world.user("alice").await;
    let me = alice.caller().as_str().to_string();

    assert!(matches!(
        alice.send_friend_request(&me).await,
        Err(StoreError::Constraint(_))
    ));
    assert!(matches!(
        alice.follow(&me).await,
        Err(StoreError::Constraint(_))
    ));
}

// ============================================================================
// OWNERSHIP
// ============================================================================

#[tokio::test]
async fn only_owners_delete_their_rows() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let post = alice.create_post("mine", None).await.unwrap();
    let comment = alice.add_comment(&post.id, "also mine").await.unwrap();
    let follow = alice.follow(bob.caller().as_str()).await.unwrap();

    // Bob can read all of it
    assert_eq!(bob.feed().await.unwrap().len(), 1);
    assert_eq!(bob.comments(&post.id).await.unwrap().len(), 1);

    for (table, id) in [
        (Table::Posts, &post.id),
        (Table::Comments, &comment.id),
        (Table::Follows, &follow.id),
    ] {
        let err = bob.delete(table, id).await.unwrap_err();
        assert!(matches!(err, StoreError::Denied), "{}", table);
    }

    alice.unfollow(bob.caller().as_str()).await.unwrap();
    alice.delete(Table::Comments, &comment.id).await.unwrap();
    alice.delete_post(&post.id).await.unwrap();
    assert!(bob.feed().await.unwrap().is_empty());
}

#[tokio::test]
async fn profile_updates_are_owner_only() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let mut changes = kith::store::Row::new();
    changes.insert("bio".into(), "gardener".into());

    let err = bob
        .update(Table::Profiles, alice.caller().as_str(), changes.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Denied));

    alice
        .update(Table::Profiles, alice.caller().as_str(), changes)
        .await
        .unwrap();
    let profile = bob
        .profile(alice.caller().as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.bio.as_deref(), Some("gardener"));
}

// ============================================================================
// CASCADE
// ============================================================================

#[tokio::test]
async fn deleting_profile_removes_everything_it_owns() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let alice_post = alice.create_post("alice's", None).await.unwrap();
    let bob_post = bob.create_post("bob's", None).await.unwrap();
    alice.add_comment(&bob_post.id, "nice").await.unwrap();
    alice.like(&bob_post.id).await.unwrap();
    bob.like(&alice_post.id).await.unwrap();
    alice.follow(bob.caller().as_str()).await.unwrap();
    bob.follow(alice.caller().as_str()).await.unwrap();
    bob.send_friend_request(alice.caller().as_str())
        .await
        .unwrap();

    alice
        .delete(Table::Profiles, alice.caller().as_str())
        .await
        .unwrap();

    let feed = bob.feed().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, bob_post.id);
    assert!(bob.comments(&bob_post.id).await.unwrap().is_empty());
    assert_eq!(bob.like_count(&bob_post.id).await.unwrap(), 0);
    assert!(bob.following_edges().await.unwrap().is_empty());
    assert!(bob.follower_edges().await.unwrap().is_empty());
    assert!(bob.friendships().await.unwrap().is_empty());
}

// ============================================================================
// ORDERING
// ============================================================================

#[tokio::test]
async fn feed_is_newest_first_and_comments_oldest_first() {
    let world = World::new();
    let alice = world.user("alice").await;
    let bob = world.user("bob_b").await;

    let first = alice.create_post("first", None).await.unwrap();
    let second = bob.create_post("second", None).await.unwrap();

    let feed = alice.feed().await.unwrap();
    let ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);

    let c1 = bob.add_comment(&first.id, "one").await.unwrap();
    let c2 = alice.add_comment(&first.id, "two").await.unwrap();
    let comments = bob.comments(&first.id).await.unwrap();
    let ids: Vec<&str> = comments.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec![c1.id.as_str(), c2.id.as_str()]);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_writers_all_succeed() {
    let world = World::new();
    let mut users = Vec::new();
    for name in ["alice", "bob_b", "carol", "dave", "erin", "frank"] {
        users.push(world.user(name).await);
    }
    let post = users[0].create_post("busy thread", None).await.unwrap();

    let mut tasks = Vec::new();
    for user in users.iter().cloned() {
        let post_id = post.id.clone();
        tasks.push(tokio::spawn(async move {
            let mut changes = kith::store::Row::new();
            changes.insert("bio".into(), "updated".into());
            user.update(Table::Profiles, user.caller().as_str(), changes)
                .await?;
            let like = user.like(&post_id).await?;
            user.delete(Table::Likes, &like.id).await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(users[1].like_count(&post.id).await.unwrap(), 0);
}
