use std::sync::Arc;

use warden_core::{ArchivalScheduler, Config, SanitizedConfig, TicketLifecycleEngine};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<TicketLifecycleEngine>,
    scheduler: Arc<ArchivalScheduler>,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<TicketLifecycleEngine>,
        scheduler: Arc<ArchivalScheduler>,
    ) -> Self {
        Self {
            config,
            engine,
            scheduler,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &TicketLifecycleEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &ArchivalScheduler {
        &self.scheduler
    }

    /// The bearer key every non-health route requires, if configured.
    pub fn api_key(&self) -> Option<&str> {
        self.config
            .api
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}
