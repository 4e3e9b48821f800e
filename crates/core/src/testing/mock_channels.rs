//! Mock chat platform for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::channel::{ChannelAccess, ChannelError, ChannelMessage, ChannelProvider};
use crate::ids::{CategoryId, ChannelId, GuildId, UserId};

/// A recorded channel operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    Create {
        guild_id: GuildId,
        category_id: CategoryId,
        name: String,
        access: ChannelAccess,
        channel_id: ChannelId,
    },
    Rename {
        channel_id: ChannelId,
        name: String,
    },
    Move {
        channel_id: ChannelId,
        category_id: CategoryId,
    },
    Lock {
        channel_id: ChannelId,
    },
    Unlock {
        channel_id: ChannelId,
    },
    Exists {
        channel_id: ChannelId,
    },
    Delete {
        channel_id: ChannelId,
    },
    GrantAccess {
        channel_id: ChannelId,
        user_id: UserId,
    },
    FetchMessages {
        channel_id: ChannelId,
        limit: usize,
    },
}

impl ChannelCall {
    /// Operation name, matching the keys of [`MockChannelProvider::fail_operation`].
    pub fn operation(&self) -> &'static str {
        match self {
            ChannelCall::Create { .. } => "create_channel",
            ChannelCall::Rename { .. } => "rename_channel",
            ChannelCall::Move { .. } => "move_channel",
            ChannelCall::Lock { .. } => "lock_channel",
            ChannelCall::Unlock { .. } => "unlock_channel",
            ChannelCall::Exists { .. } => "channel_exists",
            ChannelCall::Delete { .. } => "delete_channel",
            ChannelCall::GrantAccess { .. } => "grant_access",
            ChannelCall::FetchMessages { .. } => "fetch_messages",
        }
    }
}

/// State of a channel that exists in the mock.
#[derive(Debug, Clone)]
pub struct MockChannel {
    pub guild_id: GuildId,
    pub name: String,
    pub category_id: CategoryId,
    /// Members who can read but not post.
    pub locked_for: Vec<UserId>,
    /// Users with their own access: the owner and anyone granted later.
    pub members: Vec<UserId>,
    pub messages: Vec<ChannelMessage>,
}

/// Mock implementation of the ChannelProvider trait.
///
/// Provides controllable behavior for testing:
/// - Track every call for assertions
/// - Keep per-channel state (name, category, lock, history)
/// - Fail the next call, or every call of one operation
/// - Simulate platform latency
///
/// # Example
///
/// ```rust,ignore
/// use warden_core::testing::MockChannelProvider;
///
/// let channels = MockChannelProvider::new();
/// channels.fail_operation("delete_channel", ChannelError::Network("down".into())).await;
///
/// // ... drive the engine ...
///
/// assert_eq!(channels.count_calls("delete_channel").await, 1);
/// ```
#[derive(Debug)]
pub struct MockChannelProvider {
    calls: Arc<RwLock<Vec<ChannelCall>>>,
    channels: Arc<RwLock<HashMap<ChannelId, MockChannel>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<ChannelError>>>,
    /// Operations that fail until cleared.
    failing: Arc<RwLock<HashMap<String, ChannelError>>>,
    /// Simulated latency per call.
    delay: Arc<RwLock<Option<Duration>>>,
    next_id: AtomicU64,
}

impl Default for MockChannelProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChannelProvider {
    /// Create a new mock. Channel ids start at 1000.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            failing: Arc::new(RwLock::new(HashMap::new())),
            delay: Arc::new(RwLock::new(None)),
            next_id: AtomicU64::new(1000),
        }
    }

    /// Make the next call (of any operation) fail.
    pub async fn set_next_error(&self, error: ChannelError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make every call of `operation` fail until [`clear_failures`](Self::clear_failures).
    pub async fn fail_operation(&self, operation: &str, error: ChannelError) {
        self.failing
            .write()
            .await
            .insert(operation.to_string(), error);
    }

    pub async fn clear_failures(&self) {
        self.failing.write().await.clear();
        *self.next_error.write().await = None;
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Seed the history of a channel.
    pub async fn set_messages(&self, channel_id: ChannelId, messages: Vec<ChannelMessage>) {
        if let Some(channel) = self.channels.write().await.get_mut(&channel_id) {
            channel.messages = messages;
        }
    }

    /// Remove a channel behind the engine's back, as a moderator would.
    pub async fn remove_externally(&self, channel_id: ChannelId) {
        self.channels.write().await.remove(&channel_id);
    }

    pub async fn calls(&self) -> Vec<ChannelCall> {
        self.calls.read().await.clone()
    }

    pub async fn count_calls(&self, operation: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub async fn channel(&self, channel_id: ChannelId) -> Option<MockChannel> {
        self.channels.read().await.get(&channel_id).cloned()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    /// Record the call and return the configured failure, if any.
    async fn enter(&self, call: ChannelCall) -> Result<(), ChannelError> {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let operation = call.operation();
        self.calls.write().await.push(call);

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if let Some(error) = self.failing.read().await.get(operation) {
            return Err(error.clone());
        }
        Ok(())
    }

    async fn with_channel<T>(
        &self,
        channel_id: ChannelId,
        f: impl FnOnce(&mut MockChannel) -> T,
    ) -> Result<T, ChannelError> {
        let mut channels = self.channels.write().await;
        let channel = channels
            .get_mut(&channel_id)
            .ok_or_else(|| ChannelError::NotFound(format!("channel {}", channel_id)))?;
        Ok(f(channel))
    }
}

#[async_trait]
impl ChannelProvider for MockChannelProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_channel(
        &self,
        guild_id: GuildId,
        category_id: CategoryId,
        name: &str,
        access: &ChannelAccess,
    ) -> Result<ChannelId, ChannelError> {
        let channel_id = ChannelId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.enter(ChannelCall::Create {
            guild_id,
            category_id,
            name: name.to_string(),
            access: access.clone(),
            channel_id,
        })
        .await?;

        self.channels.write().await.insert(
            channel_id,
            MockChannel {
                guild_id,
                name: name.to_string(),
                category_id,
                locked_for: Vec::new(),
                members: vec![access.owner_id],
                messages: Vec::new(),
            },
        );
        Ok(channel_id)
    }

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> Result<(), ChannelError> {
        self.enter(ChannelCall::Rename {
            channel_id,
            name: name.to_string(),
        })
        .await?;
        self.with_channel(channel_id, |c| c.name = name.to_string())
            .await
    }

    async fn move_channel(
        &self,
        channel_id: ChannelId,
        category_id: CategoryId,
    ) -> Result<(), ChannelError> {
        self.enter(ChannelCall::Move {
            channel_id,
            category_id,
        })
        .await?;
        self.with_channel(channel_id, |c| c.category_id = category_id)
            .await
    }

    async fn lock_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError> {
        self.enter(ChannelCall::Lock { channel_id }).await?;
        self.with_channel(channel_id, |c| c.locked_for = c.members.clone())
            .await
    }

    async fn unlock_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError> {
        self.enter(ChannelCall::Unlock { channel_id }).await?;
        self.with_channel(channel_id, |c| c.locked_for.clear()).await
    }

    async fn channel_exists(&self, channel_id: ChannelId) -> Result<bool, ChannelError> {
        self.enter(ChannelCall::Exists { channel_id }).await?;
        Ok(self.channels.read().await.contains_key(&channel_id))
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError> {
        self.enter(ChannelCall::Delete { channel_id }).await?;
        match self.channels.write().await.remove(&channel_id) {
            Some(_) => Ok(()),
            None => Err(ChannelError::NotFound(format!("channel {}", channel_id))),
        }
    }

    async fn grant_access(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), ChannelError> {
        self.enter(ChannelCall::GrantAccess {
            channel_id,
            user_id,
        })
        .await?;
        self.with_channel(channel_id, |c| {
            if !c.members.contains(&user_id) {
                c.members.push(user_id);
            }
        })
        .await
    }

    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChannelError> {
        self.enter(ChannelCall::FetchMessages { channel_id, limit })
            .await?;
        self.with_channel(channel_id, |c| {
            let skip = c.messages.len().saturating_sub(limit);
            c.messages[skip..].to_vec()
        })
        .await
    }
}
