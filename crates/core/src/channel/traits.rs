//! Trait definitions for the chat platform collaborators.

use async_trait::async_trait;

use crate::ids::{CategoryId, ChannelId, GuildId, UserId};

use super::error::ChannelError;
use super::types::{ChannelAccess, ChannelMessage, Member};

/// Creates and manages ticket channels on the chat platform.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Returns the name of this provider implementation.
    fn name(&self) -> &str;

    /// Create a text channel under `category_id`, visible only to the
    /// owner and the staff roles in `access`.
    async fn create_channel(
        &self,
        guild_id: GuildId,
        category_id: CategoryId,
        name: &str,
        access: &ChannelAccess,
    ) -> Result<ChannelId, ChannelError>;

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> Result<(), ChannelError>;

    /// Move a channel under another category.
    async fn move_channel(
        &self,
        channel_id: ChannelId,
        category_id: CategoryId,
    ) -> Result<(), ChannelError>;

    /// Leave every member of the channel able to read it but not post in
    /// it. Staff roles keep their access.
    async fn lock_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError>;

    /// Undo [`lock_channel`](Self::lock_channel) for every member.
    async fn unlock_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError>;

    /// False once the channel was removed from the platform, by us or anyone else.
    async fn channel_exists(&self, channel_id: ChannelId) -> Result<bool, ChannelError>;

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError>;

    /// Let `user_id` see and post in the channel.
    async fn grant_access(&self, channel_id: ChannelId, user_id: UserId)
        -> Result<(), ChannelError>;

    /// Up to `limit` most recent messages, oldest first.
    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChannelError>;
}

/// Posts human-readable notices into channels.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post_message(&self, channel_id: ChannelId, content: &str)
        -> Result<(), ChannelError>;
}

/// Looks up guild members and their roles.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> Result<Member, ChannelError>;
}
