//! Chat platform collaborators: channels, notices and member lookups.

mod discord;
mod error;
mod retry;
mod traits;
mod types;

pub use discord::DiscordClient;
pub use error::ChannelError;
pub use retry::RetryPolicy;
pub use traits::{ChannelProvider, MemberDirectory, NotificationSink};
pub use types::{
    claimed_channel_name, slugify, ticket_channel_name, ChannelAccess, ChannelMessage, Member,
    MAX_CHANNEL_NAME_LEN,
};
