//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait,
//! allowing the lifecycle engine and scheduler to be exercised without a
//! chat platform.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::testing::{fixtures, TestHarness};
//!
//! let harness = TestHarness::new();
//! harness.configure(fixtures::guild_config(fixtures::GUILD)).await;
//! harness.members.add(fixtures::GUILD, fixtures::STAFF, "Mod", &[fixtures::STAFF_ROLE]).await;
//!
//! let ticket = harness.engine.handle_create(fixtures::GUILD, fixtures::OWNER, "support").await?;
//! ```

mod clock;
mod mock_channels;
mod mock_notifier;
mod mock_transcripts;

pub use clock::ManualClock;
pub use mock_channels::{ChannelCall, MockChannel, MockChannelProvider};
pub use mock_notifier::{MockMemberDirectory, MockNotificationSink, PostedMessage};
pub use mock_transcripts::MockTranscriptStore;

use std::sync::Arc;

use crate::guild_config::{GuildTicketConfig, SqliteConfigStore};
use crate::lifecycle::{Collaborators, EngineConfig, TicketLifecycleEngine};
use crate::scheduler::{ArchivalScheduler, SchedulerConfig};
use crate::ticket::SqliteTicketRegistry;

/// An engine wired to in-memory stores and mock collaborators.
pub struct TestHarness {
    pub engine: Arc<TicketLifecycleEngine>,
    pub configs: Arc<SqliteConfigStore>,
    pub registry: Arc<SqliteTicketRegistry>,
    pub channels: Arc<MockChannelProvider>,
    pub notifier: Arc<MockNotificationSink>,
    pub members: Arc<MockMemberDirectory>,
    pub transcripts: Arc<MockTranscriptStore>,
    pub clock: Arc<ManualClock>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Build a harness with in-memory SQLite stores.
    ///
    /// Panics if the in-memory database cannot be opened.
    pub fn new() -> Self {
        let configs = Arc::new(
            SqliteConfigStore::in_memory().expect("in-memory config store should open"),
        );
        let registry = Arc::new(
            SqliteTicketRegistry::in_memory(configs.clone())
                .expect("in-memory ticket registry should open"),
        );
        let channels = Arc::new(MockChannelProvider::new());
        let notifier = Arc::new(MockNotificationSink::new());
        let members = Arc::new(MockMemberDirectory::new());
        let transcripts = Arc::new(MockTranscriptStore::new());
        let clock = Arc::new(ManualClock::default());

        let engine = Arc::new(TicketLifecycleEngine::new(
            EngineConfig::default(),
            configs.clone(),
            registry.clone(),
            Collaborators {
                channels: channels.clone(),
                notifier: notifier.clone(),
                members: members.clone(),
                transcripts: transcripts.clone(),
                clock: clock.clone(),
            },
        ));

        Self {
            engine,
            configs,
            registry,
            channels,
            notifier,
            members,
            transcripts,
            clock,
        }
    }

    /// Store a guild config through the engine.
    ///
    /// Panics if the config is rejected.
    pub async fn configure(&self, config: GuildTicketConfig) -> GuildTicketConfig {
        self.engine
            .handle_config_update(config.guild_id, config)
            .await
            .expect("fixture config should be valid")
    }

    /// A scheduler over this harness's engine and clock.
    pub fn scheduler(&self, config: SchedulerConfig) -> ArchivalScheduler {
        ArchivalScheduler::new(config, self.engine.clone(), self.clock.clone())
    }

    /// Register the fixture staff member and the fixture owner.
    pub async fn with_default_members(self) -> Self {
        self.members
            .add(fixtures::GUILD, fixtures::OWNER, "Owner", &[])
            .await;
        self.members
            .add(
                fixtures::GUILD,
                fixtures::STAFF,
                "Mod Jane",
                &[fixtures::STAFF_ROLE],
            )
            .await;
        self.members
            .add(fixtures::GUILD, fixtures::OUTSIDER, "Random", &[])
            .await;
        self
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Duration, Utc};

    use crate::channel::ChannelMessage;
    use crate::guild_config::{GuildTicketConfig, TicketTypeDef};
    use crate::ids::{CategoryId, ChannelId, GuildId, RoleId, UserId};

    pub const GUILD: GuildId = GuildId(100);
    pub const OTHER_GUILD: GuildId = GuildId(200);
    pub const OWNER: UserId = UserId(1);
    pub const STAFF: UserId = UserId(2);
    pub const OUTSIDER: UserId = UserId(3);
    pub const STAFF_ROLE: RoleId = RoleId(50);
    pub const SUPPORT_CATEGORY: CategoryId = CategoryId(10);
    pub const ARCHIVE_CATEGORY: CategoryId = CategoryId(90);
    pub const LOG_CHANNEL: ChannelId = ChannelId(9);

    /// A guild with one "support" type, staff role, archive category and log channel.
    pub fn guild_config(guild_id: GuildId) -> GuildTicketConfig {
        let mut config = GuildTicketConfig::new(guild_id)
            .with_staff_role(STAFF_ROLE)
            .with_ticket_type(
                TicketTypeDef::new("support", SUPPORT_CATEGORY)
                    .with_welcome("Hello {user}, describe your {type} issue."),
            )
            .with_retention(3600, 7200);
        config.archive_category_id = Some(ARCHIVE_CATEGORY);
        config.log_channel_id = Some(LOG_CHANNEL);
        config
    }

    /// A chat message `offset_secs` after 2024-01-01T00:00:00Z.
    pub fn message(author_id: UserId, content: &str, offset_secs: i64) -> ChannelMessage {
        let base = DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap_or_default();
        ChannelMessage {
            author_id,
            author_name: format!("user{}", author_id),
            content: content.to_string(),
            timestamp: base + Duration::seconds(offset_secs),
            attachments: Vec::new(),
            embed_count: 0,
        }
    }
}
