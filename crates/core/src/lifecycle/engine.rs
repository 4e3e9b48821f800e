//! Ticket lifecycle engine.
//!
//! Every mutating operation runs under a per-ticket lock (or, for creation,
//! a per-user-and-type lock) so that the read, the transition and the
//! channel side effects of one operation are never interleaved with another
//! operation on the same ticket.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::channel::{
    claimed_channel_name, ticket_channel_name, ChannelAccess, ChannelError, ChannelProvider,
    Member, MemberDirectory, NotificationSink,
};
use crate::clock::Clock;
use crate::guild_config::{ConfigStore, ConfigStoreError, GuildTicketConfig};
use crate::ids::{ChannelId, GuildId, TicketId, UserId};
use crate::locks::KeyedLocks;
use crate::metrics;
use crate::ticket::{
    Ticket, TicketError, TicketRegistry, TicketStatus, TicketTypeSnapshot, Transition,
};
use crate::transcript::{render_html_transcript, render_transcript, TranscriptStore};

use super::config::EngineConfig;
use super::error::LifecycleError;

const DEFAULT_WELCOME: &str =
    "Welcome {user}! Thanks for opening a {type} ticket ({ticket}). Staff will be with you shortly.";

/// The chat platform and storage collaborators of the engine.
#[derive(Clone)]
pub struct Collaborators {
    pub channels: Arc<dyn ChannelProvider>,
    pub notifier: Arc<dyn NotificationSink>,
    pub members: Arc<dyn MemberDirectory>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub clock: Arc<dyn Clock>,
}

/// An HTML transcript of a ticket's channel, taken on request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptSnapshot {
    pub ticket_id: TicketId,
    /// Suggested download name, e.g. `transcript-support-0042.html`.
    pub file_name: String,
    pub message_count: usize,
    pub html: String,
}

type CreationKey = (GuildId, UserId, String);

fn mention_user(user_id: UserId) -> String {
    format!("<@{}>", user_id)
}

fn mention_channel(channel_id: ChannelId) -> String {
    format!("<#{}>", channel_id)
}

/// Fill the welcome template placeholders.
fn render_welcome(ticket: &Ticket) -> String {
    let template = if ticket.ticket_type.welcome_template.trim().is_empty() {
        DEFAULT_WELCOME
    } else {
        ticket.ticket_type.welcome_template.as_str()
    };

    template
        .replace("{user}", &mention_user(ticket.owner_id))
        .replace("{type}", ticket.ticket_type.label())
        .replace("{ticket}", &format!("#{:04}", ticket.id.number))
}

/// Count the outcome of an operation and pass it through.
fn observe<T>(operation: &str, result: Result<T, LifecycleError>) -> Result<T, LifecycleError> {
    let label = match &result {
        Ok(_) => "ok",
        Err(e) => e.kind().as_str(),
    };
    metrics::TRANSITIONS_TOTAL
        .with_label_values(&[operation, label])
        .inc();
    result
}

/// Drives tickets through `Open -> Claimed -> Closed -> Archived -> Deleted`.
pub struct TicketLifecycleEngine {
    config: EngineConfig,
    configs: Arc<dyn ConfigStore>,
    registry: Arc<dyn TicketRegistry>,
    collaborators: Collaborators,

    ticket_locks: KeyedLocks<TicketId>,
    creation_locks: KeyedLocks<CreationKey>,
    config_locks: KeyedLocks<GuildId>,
}

impl TicketLifecycleEngine {
    /// Create a new engine.
    pub fn new(
        config: EngineConfig,
        configs: Arc<dyn ConfigStore>,
        registry: Arc<dyn TicketRegistry>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            configs,
            registry,
            collaborators,
            ticket_locks: KeyedLocks::new(),
            creation_locks: KeyedLocks::new(),
            config_locks: KeyedLocks::new(),
        }
    }

    pub fn registry(&self) -> &Arc<dyn TicketRegistry> {
        &self.registry
    }

    pub fn configs(&self) -> &Arc<dyn ConfigStore> {
        &self.configs
    }

    pub fn transcripts(&self) -> &Arc<dyn TranscriptStore> {
        &self.collaborators.transcripts
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Open a new ticket of `ticket_type` for `user_id`.
    pub async fn handle_create(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        ticket_type: &str,
    ) -> Result<Ticket, LifecycleError> {
        observe("create", self.create(guild_id, user_id, ticket_type).await)
    }

    /// Assign an open ticket to a staff member.
    pub async fn handle_claim(
        &self,
        ticket_id: TicketId,
        actor_id: UserId,
    ) -> Result<Ticket, LifecycleError> {
        observe("claim", self.claim(ticket_id, actor_id).await)
    }

    /// Close an open or claimed ticket.
    pub async fn handle_close(
        &self,
        ticket_id: TicketId,
        actor_id: UserId,
    ) -> Result<Ticket, LifecycleError> {
        observe("close", self.close(ticket_id, actor_id).await)
    }

    /// Reopen a closed ticket that has not been archived yet.
    pub async fn handle_reopen(
        &self,
        ticket_id: TicketId,
        actor_id: UserId,
    ) -> Result<Ticket, LifecycleError> {
        observe("reopen", self.reopen(ticket_id, actor_id).await)
    }

    /// Give another user access to an open ticket's channel.
    pub async fn handle_add_member(
        &self,
        ticket_id: TicketId,
        actor_id: UserId,
        user_id: UserId,
    ) -> Result<Ticket, LifecycleError> {
        observe(
            "add_member",
            self.add_member(ticket_id, actor_id, user_id).await,
        )
    }

    /// Render the current history of a ticket's channel as HTML.
    ///
    /// Read-only: the ticket is not changed and nothing is stored.
    pub async fn handle_transcript(
        &self,
        ticket_id: TicketId,
        actor_id: UserId,
    ) -> Result<TranscriptSnapshot, LifecycleError> {
        observe("transcript", self.snapshot_transcript(ticket_id, actor_id).await)
    }

    /// Close every open ticket of a guild whose channel no longer exists,
    /// so it stops counting against its owner's cap.
    pub async fn handle_cleanup_ghosts(
        &self,
        guild_id: GuildId,
    ) -> Result<Vec<Ticket>, LifecycleError> {
        observe("cleanup_ghosts", self.cleanup_ghosts(guild_id).await)
    }

    /// Replace the ticket configuration of a guild.
    pub async fn handle_config_update(
        &self,
        guild_id: GuildId,
        config: GuildTicketConfig,
    ) -> Result<GuildTicketConfig, LifecycleError> {
        let result = async {
            if config.guild_id != guild_id {
                return Err(LifecycleError::Validation(format!(
                    "config is for guild {}, not {}",
                    config.guild_id, guild_id
                )));
            }

            let _guard = self.config_locks.lock(guild_id).await;
            let stored = self.configs.upsert(config)?;
            info!(guild_id = %guild_id, types = stored.ticket_types.len(), enabled = stored.enabled, "Guild ticket config updated");
            Ok(stored)
        }
        .await;
        observe("config_update", result)
    }

    /// Remove the ticket configuration of a guild.
    ///
    /// Existing tickets keep their snapshots; the due listings fall back to
    /// the default retention for them.
    pub async fn handle_config_delete(&self, guild_id: GuildId) -> Result<(), LifecycleError> {
        let result = async {
            let _guard = self.config_locks.lock(guild_id).await;
            self.configs.delete(guild_id)?;
            info!(guild_id = %guild_id, "Guild ticket config removed");
            Ok(())
        }
        .await;
        observe("config_delete", result)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, LifecycleError> {
        Ok(self.registry.get(ticket_id)?)
    }

    pub fn open_tickets_for(
        &self,
        guild_id: GuildId,
        user_id: UserId,
    ) -> Result<Vec<Ticket>, LifecycleError> {
        Ok(self.registry.find_open_by_user(guild_id, user_id)?)
    }

    pub fn get_config(&self, guild_id: GuildId) -> Result<GuildTicketConfig, LifecycleError> {
        Ok(self.configs.get(guild_id)?)
    }

    // =========================================================================
    // Scheduler-driven transitions
    // =========================================================================

    /// Archive a ticket the registry listed as due.
    ///
    /// Side effects (transcript, move or lock) run first and the status is
    /// committed last, so a failure leaves the ticket Closed for the next
    /// cycle. Returns `Conflict` if the ticket changed since it was listed.
    pub async fn archive_ticket(&self, due: &Ticket) -> Result<Ticket, LifecycleError> {
        observe("archive", self.archive(due).await)
    }

    /// Delete an archived ticket the registry listed as due.
    ///
    /// The status is committed first; if the channel deletion then fails the
    /// ticket stays pending channel release and the error is returned.
    pub async fn delete_ticket(&self, due: &Ticket) -> Result<Ticket, LifecycleError> {
        observe("delete", self.delete(due).await)
    }

    /// Retry removing the channel of a deleted ticket.
    pub async fn release_channel(&self, ticket_id: TicketId) -> Result<Ticket, LifecycleError> {
        observe("release_channel", self.release(ticket_id).await)
    }

    // =========================================================================
    // Implementation
    // =========================================================================

    async fn create(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        type_name: &str,
    ) -> Result<Ticket, LifecycleError> {
        let config = self.configs.get(guild_id)?;
        if !config.enabled {
            return Err(LifecycleError::Conflict(format!(
                "tickets are disabled in guild {}",
                guild_id
            )));
        }

        let def = config.ticket_type(type_name).ok_or_else(|| {
            LifecycleError::NotFound(format!(
                "ticket type '{}' in guild {}",
                type_name, guild_id
            ))
        })?;
        let snapshot = TicketTypeSnapshot::resolve(&config, def);

        let _guard = self
            .creation_locks
            .lock((guild_id, user_id, snapshot.name.clone()))
            .await;

        // Fail fast before touching the platform. The registry re-checks on insert.
        let open: Vec<Ticket> = self
            .registry
            .find_open_by_user(guild_id, user_id)?
            .into_iter()
            .filter(|t| t.ticket_type.name == snapshot.name)
            .collect();
        let mut live = open.len() as u32;
        if live >= snapshot.open_cap {
            // Tickets whose channel was deleted by hand still hold a slot.
            for ticket in &open {
                match self.close_if_ghost(ticket.id).await {
                    Ok(Some(_)) => live -= 1,
                    Ok(None) => {}
                    Err(e) => {
                        warn!(ticket_id = %ticket.id, error = %e, "Could not check ticket channel");
                    }
                }
            }
        }
        if live >= snapshot.open_cap {
            return Err(TicketError::CapReached {
                owner_id: user_id,
                ticket_type: snapshot.name.clone(),
                open: live,
                cap: snapshot.open_cap,
            }
            .into());
        }

        let ticket_id = self.registry.allocate_id(guild_id)?;
        let channel_name = ticket_channel_name(&snapshot.name, ticket_id.number);
        let access = ChannelAccess {
            owner_id: user_id,
            staff_role_ids: snapshot.staff_role_ids.clone(),
        };

        let channel_id = self
            .collaborators
            .channels
            .create_channel(guild_id, snapshot.category_id, &channel_name, &access)
            .await?;

        let ticket = Ticket::new(
            ticket_id,
            user_id,
            snapshot,
            channel_id,
            self.collaborators.clock.now(),
        );

        let ticket = match self.registry.insert(ticket) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(ticket_id = %ticket_id, channel_id = %channel_id, error = %e, "Insert failed, removing the new channel");
                if let Err(cleanup) = self.collaborators.channels.delete_channel(channel_id).await
                {
                    warn!(channel_id = %channel_id, error = %cleanup, "Failed to remove orphaned ticket channel");
                    self.side_effect_failed("cleanup");
                }
                return Err(e.into());
            }
        };

        info!(
            ticket_id = %ticket.id,
            owner_id = %user_id,
            ticket_type = %ticket.ticket_type.name,
            channel_id = %channel_id,
            "Ticket created"
        );

        self.notify("welcome", channel_id, &render_welcome(&ticket))
            .await;

        if ticket.ticket_type.staff_ping && !ticket.ticket_type.staff_role_ids.is_empty() {
            let roles: Vec<String> = ticket
                .ticket_type
                .staff_role_ids
                .iter()
                .map(|role| format!("<@&{}>", role))
                .collect();
            let ping = format!(
                "{} new {} ticket from {}",
                roles.join(" "),
                ticket.ticket_type.label(),
                mention_user(user_id)
            );
            self.notify("staff_ping", channel_id, &ping).await;
        }

        self.log_notice(
            &config,
            &format!(
                "Ticket {} ({}) opened by {} in {}",
                ticket.id,
                ticket.ticket_type.label(),
                mention_user(user_id),
                mention_channel(channel_id)
            ),
        )
        .await;

        Ok(ticket)
    }

    async fn claim(&self, ticket_id: TicketId, actor_id: UserId) -> Result<Ticket, LifecycleError> {
        let _guard = self.ticket_locks.lock(ticket_id).await;
        let now = self.collaborators.clock.now();
        let transition = Transition::Claim { by: actor_id, at: now };

        let ticket = self.registry.get(ticket_id)?;
        ticket.apply(&transition)?;

        let member = self.member(ticket_id.guild_id, actor_id).await?;
        if !ticket.ticket_type.is_staff(&member.role_ids) {
            return Err(LifecycleError::PermissionDenied(format!(
                "user {} has no staff role for '{}' tickets",
                actor_id, ticket.ticket_type.name
            )));
        }

        let ticket = self.registry.update(ticket_id, &transition)?;
        info!(ticket_id = %ticket_id, claimed_by = %actor_id, "Ticket claimed");

        let name = claimed_channel_name(
            &ticket.ticket_type.name,
            ticket_id.number,
            &member.display_name,
        );
        if let Err(e) = self
            .collaborators
            .channels
            .rename_channel(ticket.channel_id, &name)
            .await
        {
            warn!(ticket_id = %ticket_id, error = %e, "Failed to rename claimed ticket channel");
            self.side_effect_failed("rename");
        }

        self.notify(
            "notice",
            ticket.channel_id,
            &format!(
                "This ticket has been claimed by {}.",
                mention_user(actor_id)
            ),
        )
        .await;

        Ok(ticket)
    }

    async fn close(&self, ticket_id: TicketId, actor_id: UserId) -> Result<Ticket, LifecycleError> {
        let _guard = self.ticket_locks.lock(ticket_id).await;
        let transition = Transition::Close {
            at: self.collaborators.clock.now(),
        };

        let ticket = self.registry.get(ticket_id)?;
        ticket.apply(&transition)?;
        self.authorize_participant(&ticket, actor_id).await?;

        let config = self.config_if_present(ticket_id.guild_id)?;
        let ticket = self.registry.update(ticket_id, &transition)?;
        info!(ticket_id = %ticket_id, closed_by = %actor_id, "Ticket closed");

        self.notify(
            "notice",
            ticket.channel_id,
            &format!("This ticket has been closed by {}.", mention_user(actor_id)),
        )
        .await;

        if config.as_ref().map_or(true, |c| c.lock_on_close) {
            if let Err(e) = self
                .collaborators
                .channels
                .lock_channel(ticket.channel_id)
                .await
            {
                warn!(ticket_id = %ticket_id, error = %e, "Failed to lock closed ticket channel");
                self.side_effect_failed("lock");
            }
        }

        if let Some(config) = &config {
            self.log_notice(
                config,
                &format!(
                    "Ticket {} closed by {}",
                    ticket.id,
                    mention_user(actor_id)
                ),
            )
            .await;
        }

        Ok(ticket)
    }

    async fn reopen(&self, ticket_id: TicketId, actor_id: UserId) -> Result<Ticket, LifecycleError> {
        let _guard = self.ticket_locks.lock(ticket_id).await;
        let transition = Transition::Reopen {
            at: self.collaborators.clock.now(),
        };

        let ticket = self.registry.get(ticket_id)?;
        ticket.apply(&transition)?;

        let config = self.config_if_present(ticket_id.guild_id)?;
        if !config.as_ref().is_some_and(|c| c.reopen_allowed) {
            return Err(LifecycleError::Conflict(format!(
                "reopening tickets is disabled in guild {}",
                ticket_id.guild_id
            )));
        }

        self.authorize_participant(&ticket, actor_id).await?;
        let was_claimed = ticket.claimed_by.is_some();

        let ticket = self.registry.update(ticket_id, &transition)?;
        info!(ticket_id = %ticket_id, reopened_by = %actor_id, "Ticket reopened");

        let channels = &self.collaborators.channels;
        if let Err(e) = channels.unlock_channel(ticket.channel_id).await {
            warn!(ticket_id = %ticket_id, error = %e, "Failed to unlock reopened ticket channel");
            self.side_effect_failed("unlock");
        }

        // The claim was cleared, so the claimer's name goes too.
        if was_claimed {
            let name = ticket_channel_name(&ticket.ticket_type.name, ticket_id.number);
            if let Err(e) = channels.rename_channel(ticket.channel_id, &name).await {
                warn!(ticket_id = %ticket_id, error = %e, "Failed to rename reopened ticket channel");
                self.side_effect_failed("rename");
            }
        }

        self.notify(
            "notice",
            ticket.channel_id,
            &format!(
                "This ticket has been reopened by {}.",
                mention_user(actor_id)
            ),
        )
        .await;

        Ok(ticket)
    }

    async fn add_member(
        &self,
        ticket_id: TicketId,
        actor_id: UserId,
        user_id: UserId,
    ) -> Result<Ticket, LifecycleError> {
        let _guard = self.ticket_locks.lock(ticket_id).await;

        let ticket = self.registry.get(ticket_id)?;
        if !ticket.status.is_open() {
            return Err(LifecycleError::Conflict(format!(
                "cannot add members to ticket {}: current status is {}",
                ticket_id, ticket.status
            )));
        }
        self.authorize_participant(&ticket, actor_id).await?;

        self.collaborators
            .channels
            .grant_access(ticket.channel_id, user_id)
            .await?;
        info!(ticket_id = %ticket_id, user_id = %user_id, added_by = %actor_id, "User added to ticket");

        self.notify(
            "notice",
            ticket.channel_id,
            &format!(
                "{} was added to this ticket by {}.",
                mention_user(user_id),
                mention_user(actor_id)
            ),
        )
        .await;

        Ok(ticket)
    }

    async fn archive(&self, due: &Ticket) -> Result<Ticket, LifecycleError> {
        let _guard = self.ticket_locks.lock(due.id).await;

        let ticket = self.registry.get(due.id)?;
        if ticket.status != TicketStatus::Closed || ticket.closed_at != due.closed_at {
            return Err(LifecycleError::Conflict(format!(
                "ticket {} changed since it was listed for archival",
                due.id
            )));
        }

        let config = self.config_if_present(due.id.guild_id)?;
        let channels = &self.collaborators.channels;
        let mut channel_gone = ticket.channel_released;

        let transcript = if !channel_gone && config.as_ref().map_or(true, |c| c.transcripts_enabled) {
            match channels
                .fetch_messages(ticket.channel_id, self.config.transcript_max_messages)
                .await
            {
                Ok(messages) => {
                    let rendered = render_transcript(&ticket, &messages);
                    Some(
                        self.collaborators
                            .transcripts
                            .save(&ticket, &rendered)
                            .await?,
                    )
                }
                Err(ChannelError::NotFound(_)) => {
                    warn!(ticket_id = %ticket.id, "Ticket channel is gone, archiving without transcript");
                    channel_gone = true;
                    None
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            None
        };

        if !channel_gone {
            let result = match config.as_ref().and_then(|c| c.archive_category_id) {
                Some(category_id) => channels.move_channel(ticket.channel_id, category_id).await,
                None => channels.lock_channel(ticket.channel_id).await,
            };
            match result {
                Ok(()) => {}
                Err(ChannelError::NotFound(_)) => {
                    warn!(ticket_id = %ticket.id, "Ticket channel is gone, archiving anyway");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let archived = self.registry.update(
            ticket.id,
            &Transition::Archive {
                transcript,
                at: self.collaborators.clock.now(),
            },
        )?;
        info!(ticket_id = %archived.id, transcript = ?archived.transcript, "Ticket archived");

        if let Some(config) = &config {
            self.log_notice(config, &format!("Ticket {} archived", archived.id))
                .await;
        }

        Ok(archived)
    }

    async fn delete(&self, due: &Ticket) -> Result<Ticket, LifecycleError> {
        let _guard = self.ticket_locks.lock(due.id).await;

        let ticket = self.registry.get(due.id)?;
        if ticket.status != TicketStatus::Archived {
            return Err(LifecycleError::Conflict(format!(
                "ticket {} changed since it was listed for deletion",
                due.id
            )));
        }

        let deleted = self.registry.update(
            ticket.id,
            &Transition::Delete {
                at: self.collaborators.clock.now(),
            },
        )?;
        info!(ticket_id = %deleted.id, "Ticket deleted");

        self.remove_channel(deleted).await
    }

    async fn release(&self, ticket_id: TicketId) -> Result<Ticket, LifecycleError> {
        let _guard = self.ticket_locks.lock(ticket_id).await;

        let ticket = self.registry.get(ticket_id)?;
        if ticket.status != TicketStatus::Deleted || ticket.channel_released {
            debug!(ticket_id = %ticket_id, "Nothing to release");
            return Ok(ticket);
        }

        self.remove_channel(ticket).await
    }

    /// Delete the channel of a deleted ticket and record it. A channel that
    /// is already gone counts as removed.
    async fn remove_channel(&self, ticket: Ticket) -> Result<Ticket, LifecycleError> {
        if ticket.channel_released {
            return Ok(ticket);
        }

        match self
            .collaborators
            .channels
            .delete_channel(ticket.channel_id)
            .await
        {
            Ok(()) => {}
            Err(ChannelError::NotFound(_)) => {
                debug!(ticket_id = %ticket.id, channel_id = %ticket.channel_id, "Channel already gone");
            }
            Err(e) => {
                warn!(ticket_id = %ticket.id, error = %e, "Channel deletion failed, will retry");
                return Err(e.into());
            }
        }

        Ok(self.registry.mark_channel_released(ticket.id)?)
    }

    async fn snapshot_transcript(
        &self,
        ticket_id: TicketId,
        actor_id: UserId,
    ) -> Result<TranscriptSnapshot, LifecycleError> {
        let ticket = self.registry.get(ticket_id)?;
        if ticket.status == TicketStatus::Deleted || ticket.channel_released {
            return Err(LifecycleError::Conflict(format!(
                "ticket {} no longer has a channel",
                ticket_id
            )));
        }

        let config = self.config_if_present(ticket_id.guild_id)?;
        if !config.as_ref().map_or(true, |c| c.transcripts_enabled) {
            return Err(LifecycleError::Conflict(format!(
                "transcripts are disabled in guild {}",
                ticket_id.guild_id
            )));
        }

        self.authorize_participant(&ticket, actor_id).await?;

        let messages = match self
            .collaborators
            .channels
            .fetch_messages(ticket.channel_id, self.config.transcript_max_messages)
            .await
        {
            Ok(messages) => messages,
            Err(ChannelError::NotFound(_)) => {
                return Err(LifecycleError::NotFound(format!(
                    "channel {} of ticket {}",
                    ticket.channel_id, ticket_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        info!(ticket_id = %ticket_id, requested_by = %actor_id, messages = messages.len(), "Transcript generated");

        Ok(TranscriptSnapshot {
            ticket_id,
            file_name: format!(
                "transcript-{}.html",
                ticket_channel_name(&ticket.ticket_type.name, ticket_id.number)
            ),
            message_count: messages.len(),
            html: render_html_transcript(&ticket, &messages),
        })
    }

    async fn cleanup_ghosts(&self, guild_id: GuildId) -> Result<Vec<Ticket>, LifecycleError> {
        let mut closed = Vec::new();
        for ticket in self.registry.list_open_in_guild(guild_id)? {
            if let Some(ghost) = self.close_if_ghost(ticket.id).await? {
                closed.push(ghost);
            }
        }

        if !closed.is_empty() {
            info!(guild_id = %guild_id, count = closed.len(), "Ghost tickets closed");
        }
        Ok(closed)
    }

    /// Close an open ticket whose channel was removed outside the bot and
    /// record the channel as released. `None` if the ticket is no longer
    /// open or its channel still exists.
    async fn close_if_ghost(&self, ticket_id: TicketId) -> Result<Option<Ticket>, LifecycleError> {
        let _guard = self.ticket_locks.lock(ticket_id).await;

        let ticket = self.registry.get(ticket_id)?;
        if !ticket.status.is_open() {
            return Ok(None);
        }
        if self
            .collaborators
            .channels
            .channel_exists(ticket.channel_id)
            .await?
        {
            return Ok(None);
        }

        self.registry.update(
            ticket_id,
            &Transition::Close {
                at: self.collaborators.clock.now(),
            },
        )?;
        let closed = self.registry.mark_channel_released(ticket_id)?;
        warn!(ticket_id = %ticket_id, channel_id = %ticket.channel_id, "Ticket channel is gone, ticket closed");

        Ok(Some(closed))
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn member(&self, guild_id: GuildId, user_id: UserId) -> Result<Member, LifecycleError> {
        match self.collaborators.members.member(guild_id, user_id).await {
            Ok(member) => Ok(member),
            Err(ChannelError::NotFound(_)) => Err(LifecycleError::PermissionDenied(format!(
                "user {} is not a member of guild {}",
                user_id, guild_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Owner and claimer pass without a lookup; anyone else needs a staff role.
    async fn authorize_participant(
        &self,
        ticket: &Ticket,
        actor_id: UserId,
    ) -> Result<(), LifecycleError> {
        if ticket.is_participant(actor_id, &[]) {
            return Ok(());
        }

        let member = self.member(ticket.id.guild_id, actor_id).await?;
        if ticket.is_participant(actor_id, &member.role_ids) {
            Ok(())
        } else {
            Err(LifecycleError::PermissionDenied(format!(
                "user {} is not the owner, the claimer or staff of ticket {}",
                actor_id, ticket.id
            )))
        }
    }

    fn config_if_present(
        &self,
        guild_id: GuildId,
    ) -> Result<Option<GuildTicketConfig>, LifecycleError> {
        match self.configs.get(guild_id) {
            Ok(config) => Ok(Some(config)),
            Err(ConfigStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn notify(&self, operation: &'static str, channel_id: ChannelId, content: &str) {
        if let Err(e) = self
            .collaborators
            .notifier
            .post_message(channel_id, content)
            .await
        {
            warn!(channel_id = %channel_id, operation, error = %e, "Failed to post notice");
            self.side_effect_failed(operation);
        }
    }

    async fn log_notice(&self, config: &GuildTicketConfig, content: &str) {
        if let Some(log_channel_id) = config.log_channel_id {
            self.notify("log", log_channel_id, content).await;
        }
    }

    fn side_effect_failed(&self, operation: &str) {
        metrics::SIDE_EFFECT_FAILURES
            .with_label_values(&[operation])
            .inc();
    }
}
