pub mod error;
pub mod guild_config;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod tickets;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;
