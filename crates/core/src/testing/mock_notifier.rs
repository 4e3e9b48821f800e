//! Mock notification sink and member directory for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::channel::{ChannelError, Member, MemberDirectory, NotificationSink};
use crate::ids::{ChannelId, GuildId, RoleId, UserId};

/// A notice posted through the mock sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_id: ChannelId,
    pub content: String,
}

/// Mock implementation of the NotificationSink trait.
#[derive(Debug, Default)]
pub struct MockNotificationSink {
    posted: Arc<RwLock<Vec<PostedMessage>>>,
    /// When set, every post fails with this error.
    failure: Arc<RwLock<Option<ChannelError>>>,
}

impl MockNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_failure(&self, error: Option<ChannelError>) {
        *self.failure.write().await = error;
    }

    pub async fn posted(&self) -> Vec<PostedMessage> {
        self.posted.read().await.clone()
    }

    /// Messages posted to one channel, in order.
    pub async fn posted_to(&self, channel_id: ChannelId) -> Vec<String> {
        self.posted
            .read()
            .await
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .map(|m| m.content.clone())
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MockNotificationSink {
    async fn post_message(&self, channel_id: ChannelId, content: &str) -> Result<(), ChannelError> {
        if let Some(error) = self.failure.read().await.clone() {
            return Err(error);
        }
        self.posted.write().await.push(PostedMessage {
            channel_id,
            content: content.to_string(),
        });
        Ok(())
    }
}

/// Mock implementation of the MemberDirectory trait.
///
/// Unknown members are reported as `NotFound`, like a user who left the guild.
#[derive(Debug, Default)]
pub struct MockMemberDirectory {
    members: Arc<RwLock<HashMap<(GuildId, UserId), Member>>>,
    lookups: Arc<RwLock<usize>>,
}

impl MockMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, guild_id: GuildId, member: Member) {
        self.members
            .write()
            .await
            .insert((guild_id, member.user_id), member);
    }

    /// Shorthand for a member with the given display name and roles.
    pub async fn add(&self, guild_id: GuildId, user_id: UserId, name: &str, roles: &[RoleId]) {
        self.add_member(
            guild_id,
            Member {
                user_id,
                display_name: name.to_string(),
                role_ids: roles.to_vec(),
            },
        )
        .await;
    }

    /// Number of lookups served so far.
    pub async fn lookups(&self) -> usize {
        *self.lookups.read().await
    }
}

#[async_trait]
impl MemberDirectory for MockMemberDirectory {
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> Result<Member, ChannelError> {
        *self.lookups.write().await += 1;
        self.members
            .read()
            .await
            .get(&(guild_id, user_id))
            .cloned()
            .ok_or_else(|| ChannelError::NotFound(format!("member {} in guild {}", user_id, guild_id)))
    }
}
