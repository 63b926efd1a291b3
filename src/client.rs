//! Data-access client.
//!
//! A thin pass-through from application intents to [`DataStore`] calls made
//! on behalf of one caller. No retries, no caching, no authorization of its
//! own: every failure comes straight from the store.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::db::models::{Comment, Follow, Friendship, FriendshipStatus, Like, Post, Profile};
use crate::identity::UserId;
use crate::store::{DataStore, Order, Query, Row, StoreError, Table};

#[derive(Clone)]
pub struct Client {
    store: Arc<dyn DataStore>,
    caller: UserId,
}

fn object(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn decode<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(decode).collect()
}

impl Client {
    pub fn new(store: Arc<dyn DataStore>, caller: UserId) -> Self {
        Self { store, caller }
    }

    pub fn caller(&self) -> &UserId {
        &self.caller
    }

    // --- Generic operations ---

    pub async fn select(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.store.select(&self.caller, table, query).await
    }

    pub async fn insert(&self, table: Table, values: Row) -> Result<Row, StoreError> {
        self.store.insert(&self.caller, table, values).await
    }

    pub async fn update(&self, table: Table, id: &str, changes: Row) -> Result<Row, StoreError> {
        self.store.update(&self.caller, table, id, changes).await
    }

    pub async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        self.store.delete(&self.caller, table, id).await
    }

    // --- Profiles ---

    pub async fn profiles(&self) -> Result<Vec<Profile>, StoreError> {
        let rows = self
            .select(Table::Profiles, &Query::new().order(Order::asc("username")))
            .await?;
        decode_all(rows)
    }

    pub async fn profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let rows = self
            .select(Table::Profiles, &Query::new().eq("id", id))
            .await?;
        rows.into_iter().next().map(decode).transpose()
    }

    pub async fn create_profile(
        &self,
        username: &str,
        full_name: Option<&str>,
    ) -> Result<Profile, StoreError> {
        let row = self
            .insert(
                Table::Profiles,
                object(json!({
                    "id": self.caller.as_str(),
                    "username": username,
                    "full_name": full_name,
                })),
            )
            .await?;
        decode(row)
    }

    // --- Posts and comments ---

    /// Every post, newest first.
    pub async fn feed(&self) -> Result<Vec<Post>, StoreError> {
        let rows = self
            .select(Table::Posts, &Query::new().order(Order::desc("created_at")))
            .await?;
        decode_all(rows)
    }

    pub async fn create_post(
        &self,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Post, StoreError> {
        let row = self
            .insert(
                Table::Posts,
                object(json!({
                    "author_id": self.caller.as_str(),
                    "content": content,
                    "image_url": image_url,
                })),
            )
            .await?;
        decode(row)
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<(), StoreError> {
        self.delete(Table::Posts, post_id).await
    }

    /// Comments on a post, oldest first.
    pub async fn comments(&self, post_id: &str) -> Result<Vec<Comment>, StoreError> {
        let rows = self
            .select(
                Table::Comments,
                &Query::new()
                    .eq("post_id", post_id)
                    .order(Order::asc("created_at")),
            )
            .await?;
        decode_all(rows)
    }

    pub async fn add_comment(&self, post_id: &str, content: &str) -> Result<Comment, StoreError> {
        let row = self
            .insert(
                Table::Comments,
                object(json!({
                    "post_id": post_id,
                    "author_id": self.caller.as_str(),
                    "content": content,
                })),
            )
            .await?;
        decode(row)
    }

    // --- Likes ---

    pub async fn likes(&self, post_id: &str) -> Result<Vec<Like>, StoreError> {
        let rows = self
            .select(Table::Likes, &Query::new().eq("post_id", post_id))
            .await?;
        decode_all(rows)
    }

    pub async fn like_count(&self, post_id: &str) -> Result<usize, StoreError> {
        Ok(self.likes(post_id).await?.len())
    }

    pub async fn like(&self, post_id: &str) -> Result<Like, StoreError> {
        let row = self
            .insert(
                Table::Likes,
                object(json!({"post_id": post_id, "user_id": self.caller.as_str()})),
            )
            .await?;
        decode(row)
    }

    pub async fn unlike(&self, post_id: &str) -> Result<(), StoreError> {
        let rows = self
            .select(
                Table::Likes,
                &Query::new()
                    .eq("post_id", post_id)
                    .eq("user_id", self.caller.as_str()),
            )
            .await?;
        let like: Like = rows
            .into_iter()
            .next()
            .map(decode)
            .transpose()?
            .ok_or(StoreError::NotFound)?;
        self.delete(Table::Likes, &like.id).await
    }

    // --- Follows ---

    pub async fn following_edges(&self) -> Result<Vec<Follow>, StoreError> {
        let rows = self
            .select(
                Table::Follows,
                &Query::new().eq("follower_id", self.caller.as_str()),
            )
            .await?;
        decode_all(rows)
    }

    pub async fn follower_edges(&self) -> Result<Vec<Follow>, StoreError> {
        let rows = self
            .select(
                Table::Follows,
                &Query::new().eq("followee_id", self.caller.as_str()),
            )
            .await?;
        decode_all(rows)
    }

    pub async fn follow(&self, user_id: &str) -> Result<Follow, StoreError> {
        let row = self
            .insert(
                Table::Follows,
                object(json!({"follower_id": self.caller.as_str(), "followee_id": user_id})),
            )
            .await?;
        decode(row)
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<(), StoreError> {
        let edge = self
            .following_edges()
            .await?
            .into_iter()
            .find(|f| f.followee_id == user_id)
            .ok_or(StoreError::NotFound)?;
        self.delete(Table::Follows, &edge.id).await
    }

    // --- Friendships ---

    /// Friendship rows the caller participates in (the store hides the rest).
    pub async fn friendships(&self) -> Result<Vec<Friendship>, StoreError> {
        let rows = self
            .select(
                Table::Friendships,
                &Query::new().order(Order::asc("created_at")),
            )
            .await?;
        decode_all(rows)
    }

    pub async fn send_friend_request(&self, user_id: &str) -> Result<Friendship, StoreError> {
        let row = self
            .insert(
                Table::Friendships,
                object(json!({
                    "user_id_1": self.caller.as_str(),
                    "user_id_2": user_id,
                    "requester_id": self.caller.as_str(),
                })),
            )
            .await?;
        decode(row)
    }

    pub async fn accept_friend_request(&self, friendship_id: &str) -> Result<Friendship, StoreError> {
        let row = self
            .update(
                Table::Friendships,
                friendship_id,
                object(json!({"status": FriendshipStatus::Accepted.as_str()})),
            )
            .await?;
        decode(row)
    }

    /// Reject or cancel a request. Rejection is modeled as deletion.
    pub async fn reject_friend_request(&self, friendship_id: &str) -> Result<(), StoreError> {
        self.delete(Table::Friendships, friendship_id).await
    }
}
