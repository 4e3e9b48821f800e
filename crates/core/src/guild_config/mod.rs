//! Per-guild ticket configuration and its storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteConfigStore;
pub use store::{ConfigStore, ConfigStoreError};
pub use types::{
    GuildTicketConfig, RetentionPolicy, TicketTypeDef, MAX_OPEN_TICKETS_LIMIT, MAX_TYPE_NAME_LEN,
};
