pub mod channel;
pub mod clock;
pub mod config;
pub mod guild_config;
pub mod ids;
pub mod lifecycle;
pub mod locks;
pub mod metrics;
pub mod scheduler;
pub mod testing;
pub mod ticket;
pub mod transcript;

pub use channel::{
    ChannelError, ChannelProvider, DiscordClient, MemberDirectory, NotificationSink, RetryPolicy,
};
pub use clock::{Clock, SystemClock};
pub use config::{
    config_path, load_config, load_config_from_str, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use guild_config::{
    ConfigStore, ConfigStoreError, GuildTicketConfig, RetentionPolicy, SqliteConfigStore,
    TicketTypeDef,
};
pub use ids::{CategoryId, ChannelId, GuildId, RoleId, TicketId, UserId};
pub use lifecycle::{
    Collaborators, EngineConfig, ErrorKind, LifecycleError, TicketLifecycleEngine,
    TranscriptSnapshot,
};
pub use scheduler::{ArchivalScheduler, CycleReport, SchedulerConfig, SchedulerStatus};
pub use ticket::{SqliteTicketRegistry, Ticket, TicketError, TicketRegistry, TicketStatus};
pub use transcript::{FsTranscriptStore, TranscriptError, TranscriptStore};
