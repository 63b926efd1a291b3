use std::collections::HashMap;

use serde::Serialize;

use crate::client::Client;
use crate::db::models::{FriendshipStatus, Profile};
use crate::store::StoreError;

#[derive(Debug, Clone, Serialize)]
pub struct PendingRequest {
    pub friendship_id: String,
    pub profile: Profile,
}

/// The caller's social graph, re-derived from the store on every load.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Relationships {
    pub friends: Vec<Profile>,
    pub following: Vec<Profile>,
    pub followers: Vec<Profile>,
    /// Requests other people sent to the caller.
    pub incoming: Vec<PendingRequest>,
    /// Requests the caller sent that are still pending.
    pub outgoing: Vec<PendingRequest>,
}

impl Relationships {
    pub async fn load(client: &Client) -> Result<Self, StoreError> {
        let me = client.caller().as_str().to_string();

        let profiles: HashMap<String, Profile> = client
            .profiles()
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        let lookup = |id: &str| profiles.get(id).cloned();

        let mut out = Relationships::default();

        for friendship in client.friendships().await? {
            let Some(other) = friendship.other_participant(&me).and_then(lookup) else {
                continue;
            };
            match friendship.status {
                FriendshipStatus::Accepted => out.friends.push(other),
                FriendshipStatus::Pending => {
                    let request = PendingRequest {
                        friendship_id: friendship.id.clone(),
                        profile: other,
                    };
                    if friendship.requester_id == me {
                        out.outgoing.push(request);
                    } else {
                        out.incoming.push(request);
                    }
                }
                FriendshipStatus::Rejected => {}
            }
        }

        out.following = client
            .following_edges()
            .await?
            .iter()
            .filter_map(|f| lookup(f.followee_id.as_str()))
            .collect();
        out.followers = client
            .follower_edges()
            .await?
            .iter()
            .filter_map(|f| lookup(f.follower_id.as_str()))
            .collect();

        for list in [&mut out.friends, &mut out.following, &mut out.followers] {
            list.sort_by(|a, b| a.username.cmp(&b.username));
        }

        Ok(out)
    }

    pub fn is_friend(&self, user_id: &str) -> bool {
        self.friends.iter().any(|p| p.id == user_id)
    }
}
