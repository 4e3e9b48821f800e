//! Ticket lifecycle integration tests.
//!
//! These tests drive the engine against in-memory stores and mock
//! collaborators: create -> claim -> close -> archive -> delete.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use warden_core::{
    channel::{claimed_channel_name, ChannelError},
    guild_config::TicketTypeDef,
    testing::{fixtures, ChannelCall, TestHarness},
    Clock, ErrorKind, GuildTicketConfig, SchedulerConfig, TicketRegistry, TicketStatus, UserId,
};

async fn harness() -> TestHarness {
    let harness = TestHarness::new().with_default_members().await;
    harness
        .configure(fixtures::guild_config(fixtures::GUILD))
        .await;
    harness
}

#[tokio::test]
async fn test_full_ticket_lifecycle() {
    let h = harness().await;
    let scheduler = h.scheduler(SchedulerConfig::default());

    // Create
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.id.number, 1);
    assert_eq!(ticket.owner_id, fixtures::OWNER);

    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert_eq!(channel.name, "support-0001");
    assert_eq!(channel.category_id, fixtures::SUPPORT_CATEGORY);

    let welcome = h.notifier.posted_to(ticket.channel_id).await;
    assert_eq!(welcome[0], "Hello <@1>, describe your support issue.");
    assert_eq!(h.notifier.posted_to(fixtures::LOG_CHANNEL).await.len(), 1);

    // A second open ticket of the same type is over the cap
    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.channels.count_calls("create_channel").await, 1);

    // Claim
    let ticket = h
        .engine
        .handle_claim(ticket.id, fixtures::STAFF)
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Claimed);
    assert_eq!(ticket.claimed_by, Some(fixtures::STAFF));
    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert_eq!(channel.name, claimed_channel_name("support", 1, "Mod Jane"));

    // Close
    h.clock.advance_secs(60);
    let closed_at = h.clock.now();
    let ticket = h
        .engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Closed);
    assert_eq!(ticket.closed_at, Some(closed_at));
    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert_eq!(channel.locked_for, vec![fixtures::OWNER]);

    h.channels
        .set_messages(
            ticket.channel_id,
            vec![
                fixtures::message(fixtures::OWNER, "my printer is on fire", 0),
                fixtures::message(fixtures::STAFF, "have you tried water", 30),
            ],
        )
        .await;

    // Not yet due
    let report = scheduler.run_cycle(closed_at + chrono::Duration::seconds(10)).await;
    assert_eq!(report.archived, 0);

    // Archive
    let report = scheduler
        .run_cycle(closed_at + chrono::Duration::seconds(3600))
        .await;
    assert_eq!(report.archived, 1);
    assert_eq!(report.failed, 0);

    let ticket = h.engine.get_ticket(ticket.id).unwrap();
    assert_eq!(ticket.status, TicketStatus::Archived);
    assert_eq!(ticket.closed_at, Some(closed_at));
    let pointer = ticket.transcript.clone().unwrap();
    let transcript = h.transcripts.get(&pointer).await.unwrap();
    assert!(transcript.contains("my printer is on fire"));
    assert!(transcript.contains("have you tried water"));
    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert_eq!(channel.category_id, fixtures::ARCHIVE_CATEGORY);

    // Delete
    let report = scheduler
        .run_cycle(closed_at + chrono::Duration::seconds(7200))
        .await;
    assert_eq!(report.deleted, 1);

    let ticket = h.engine.get_ticket(ticket.id).unwrap();
    assert_eq!(ticket.status, TicketStatus::Deleted);
    assert!(ticket.channel_released);
    assert_eq!(ticket.transcript, Some(pointer));
    assert!(h.channels.channel(ticket.channel_id).await.is_none());

    // Further cycles leave the deleted ticket alone
    let report = scheduler
        .run_cycle(closed_at + chrono::Duration::seconds(100_000))
        .await;
    assert_eq!(report.processed(), 0);
    assert_eq!(h.channels.count_calls("delete_channel").await, 1);
}

#[tokio::test]
async fn test_concurrent_creates_respect_cap() {
    let h = harness().await;
    let config = fixtures::guild_config(fixtures::GUILD).with_max_open_per_user(3);
    h.configure(config).await;
    h.channels.set_delay(Duration::from_millis(5)).await;

    let engine = Arc::clone(&h.engine);
    let attempts = (0..10).map(|_| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
                .await
        })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let created: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(created.len(), 3);
    for result in &results {
        if let Err(e) = result {
            assert_eq!(e.kind(), ErrorKind::Conflict);
        }
    }

    let channels: HashSet<_> = created.iter().map(|t| t.channel_id).collect();
    assert_eq!(channels.len(), 3);
    assert_eq!(h.channels.channel_count().await, 3);
    assert_eq!(
        h.engine
            .open_tickets_for(fixtures::GUILD, fixtures::OWNER)
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_concurrent_claims_one_winner() {
    let h = harness().await;
    let second_staff = UserId(4);
    h.members
        .add(fixtures::GUILD, second_staff, "Mod Bob", &[fixtures::STAFF_ROLE])
        .await;
    h.channels.set_delay(Duration::from_millis(5)).await;

    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    let a = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.handle_claim(ticket.id, fixtures::STAFF).await })
    };
    let b = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.handle_claim(ticket.id, second_staff).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::Conflict);

    let stored = h.engine.get_ticket(ticket.id).unwrap();
    assert_eq!(stored.claimed_by, winners[0].claimed_by);
    assert_eq!(h.channels.count_calls("rename_channel").await, 1);
}

#[tokio::test]
async fn test_illegal_transitions_have_no_side_effects() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    h.engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();

    h.channels.clear_calls().await;
    let posted_before = h.notifier.posted().await.len();
    let before = h.engine.get_ticket(ticket.id).unwrap();

    let err = h
        .engine
        .handle_claim(ticket.id, fixtures::STAFF)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = h
        .engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(h.engine.get_ticket(ticket.id).unwrap(), before);
    assert!(h.channels.calls().await.is_empty());
    assert_eq!(h.notifier.posted().await.len(), posted_before);
}

#[tokio::test]
async fn test_claim_requires_staff_role() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    let err = h
        .engine
        .handle_claim(ticket.id, fixtures::OUTSIDER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // Unknown to the guild
    let err = h
        .engine
        .handle_claim(ticket.id, UserId(999))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // Owners cannot claim their own ticket without a staff role
    let err = h
        .engine
        .handle_claim(ticket.id, fixtures::OWNER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    assert_eq!(
        h.engine.get_ticket(ticket.id).unwrap().status,
        TicketStatus::Open
    );
}

#[tokio::test]
async fn test_close_authorization() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    let err = h
        .engine
        .handle_close(ticket.id, fixtures::OUTSIDER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    // Staff may close tickets they have not claimed
    let closed = h
        .engine
        .handle_close(ticket.id, fixtures::STAFF)
        .await
        .unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
}

#[tokio::test]
async fn test_reopen_and_cap() {
    let h = harness().await;
    let first = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    h.engine
        .handle_close(first.id, fixtures::OWNER)
        .await
        .unwrap();

    // Closed tickets do not count towards the cap
    let second = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    assert_eq!(second.id.number, 2);

    // Reopening the first would exceed the cap
    let err = h
        .engine
        .handle_reopen(first.id, fixtures::OWNER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.engine
        .handle_close(second.id, fixtures::OWNER)
        .await
        .unwrap();
    let reopened = h
        .engine
        .handle_reopen(first.id, fixtures::OWNER)
        .await
        .unwrap();
    assert_eq!(reopened.status, TicketStatus::Open);
    assert!(reopened.closed_at.is_none());
    let channel = h.channels.channel(first.channel_id).await.unwrap();
    assert!(channel.locked_for.is_empty());
}

#[tokio::test]
async fn test_reopen_disabled_by_config() {
    let h = harness().await;
    let mut config = fixtures::guild_config(fixtures::GUILD);
    config.reopen_allowed = false;
    h.configure(config).await;

    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    h.engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();

    let err = h
        .engine
        .handle_reopen(ticket.id, fixtures::OWNER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_create_errors() {
    let h = TestHarness::new().with_default_members().await;

    // No config
    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut config = fixtures::guild_config(fixtures::GUILD);
    h.configure(config.clone()).await;

    // Unknown type
    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "billing")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Disabled guild
    config.enabled = false;
    h.configure(config).await;
    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(h.channels.count_calls("create_channel").await, 0);
}

#[tokio::test]
async fn test_create_channel_failure_is_external() {
    let h = harness().await;
    h.channels
        .set_next_error(ChannelError::Forbidden("missing permissions".into()))
        .await;

    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
    assert!(h
        .engine
        .open_tickets_for(fixtures::GUILD, fixtures::OWNER)
        .unwrap()
        .is_empty());

    // The failed attempt does not block the next one
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
}

#[tokio::test]
async fn test_notification_failures_do_not_fail_commands() {
    let h = harness().await;
    h.notifier
        .set_failure(Some(ChannelError::Network("gateway down".into())))
        .await;

    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    let ticket = h
        .engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Closed);
    assert!(h.notifier.posted().await.is_empty());
}

#[tokio::test]
async fn test_type_override_allows_multiple_and_staff_ping() {
    let h = harness().await;
    let bug_role = warden_core::RoleId(77);
    let mut bug = TicketTypeDef::new("bug", fixtures::SUPPORT_CATEGORY)
        .with_staff_role(bug_role)
        .with_max_open(2);
    bug.display_name = Some("Bug Report".to_string());
    bug.staff_ping = true;
    let config = fixtures::guild_config(fixtures::GUILD).with_ticket_type(bug);
    h.configure(config).await;

    let first = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "bug")
        .await
        .unwrap();
    h.engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "bug")
        .await
        .unwrap();
    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "bug")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Other types keep their own cap
    h.engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    let access = h
        .channels
        .calls()
        .await
        .into_iter()
        .find_map(|call| match call {
            ChannelCall::Create {
                channel_id, access, ..
            } if channel_id == first.channel_id => Some(access),
            _ => None,
        })
        .unwrap();
    assert!(access.staff_role_ids.contains(&bug_role));
    assert!(access.staff_role_ids.contains(&fixtures::STAFF_ROLE));

    let posted = h.notifier.posted_to(first.channel_id).await;
    assert!(posted.iter().any(|m| m.contains("<@&77>")));
}

#[tokio::test]
async fn test_config_changes_do_not_touch_open_tickets() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    // Replace the config with one that drops the staff role
    let config = GuildTicketConfig::new(fixtures::GUILD).with_ticket_type(TicketTypeDef::new(
        "support",
        fixtures::SUPPORT_CATEGORY,
    ));
    h.configure(config).await;

    // The ticket still carries the staff role it was created with
    let claimed = h
        .engine
        .handle_claim(ticket.id, fixtures::STAFF)
        .await
        .unwrap();
    assert_eq!(claimed.status, TicketStatus::Claimed);
}

#[tokio::test]
async fn test_add_member() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    let guest = UserId(55);

    let err = h
        .engine
        .handle_add_member(ticket.id, fixtures::OUTSIDER, guest)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    h.engine
        .handle_add_member(ticket.id, fixtures::OWNER, guest)
        .await
        .unwrap();
    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert!(channel.members.contains(&guest));

    h.engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    let err = h
        .engine
        .handle_add_member(ticket.id, fixtures::OWNER, UserId(56))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_config_update_guild_mismatch() {
    let h = harness().await;
    let err = h
        .engine
        .handle_config_update(
            fixtures::OTHER_GUILD,
            fixtures::guild_config(fixtures::GUILD),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let mut invalid = fixtures::guild_config(fixtures::GUILD);
    invalid.max_open_per_user = 0;
    let err = h
        .engine
        .handle_config_update(fixtures::GUILD, invalid)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // The stored config is unchanged
    let stored = h.engine.get_config(fixtures::GUILD).unwrap();
    assert_eq!(stored, fixtures::guild_config(fixtures::GUILD));
}

#[tokio::test]
async fn test_counts_by_status() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    h.engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    h.engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    let counts = h.registry.count_by_status().unwrap();
    let count = |status| {
        counts
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.count)
            .unwrap()
    };
    assert_eq!(count(TicketStatus::Open), 1);
    assert_eq!(count(TicketStatus::Closed), 1);
    assert_eq!(count(TicketStatus::Deleted), 0);
}

#[tokio::test]
async fn test_close_locks_added_members() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    let guest = UserId(77);
    h.engine
        .handle_add_member(ticket.id, fixtures::OWNER, guest)
        .await
        .unwrap();

    h.engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert!(channel.locked_for.contains(&fixtures::OWNER));
    assert!(channel.locked_for.contains(&guest));

    h.engine
        .handle_reopen(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert!(channel.locked_for.is_empty());
}

#[tokio::test]
async fn test_reopen_drops_claimer_from_channel_name() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    h.engine
        .handle_claim(ticket.id, fixtures::STAFF)
        .await
        .unwrap();
    h.engine
        .handle_close(ticket.id, fixtures::OWNER)
        .await
        .unwrap();

    let reopened = h
        .engine
        .handle_reopen(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    assert!(reopened.claimed_by.is_none());
    let channel = h.channels.channel(ticket.channel_id).await.unwrap();
    assert_eq!(channel.name, "support-0001");

    // Never claimed: nothing to rename
    let other = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::STAFF, "support")
        .await
        .unwrap();
    h.engine
        .handle_close(other.id, fixtures::STAFF)
        .await
        .unwrap();
    h.channels.clear_calls().await;
    h.engine
        .handle_reopen(other.id, fixtures::STAFF)
        .await
        .unwrap();
    assert_eq!(h.channels.count_calls("rename_channel").await, 0);
}

#[tokio::test]
async fn test_deleted_channel_frees_cap() {
    let h = harness().await;
    let ghost = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    // A moderator deleted the channel by hand
    h.channels.remove_externally(ghost.channel_id).await;

    let fresh = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    assert_eq!(fresh.status, TicketStatus::Open);
    assert_eq!(fresh.id.number, 2);

    let ghost = h.engine.get_ticket(ghost.id).unwrap();
    assert_eq!(ghost.status, TicketStatus::Closed);
    assert!(ghost.closed_at.is_some());
    assert!(ghost.channel_released);

    // A live ticket still holds the slot
    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_cap_holds_when_channel_check_fails() {
    let h = harness().await;
    h.engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    h.channels
        .fail_operation("channel_exists", ChannelError::Network("down".into()))
        .await;

    let err = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.channels.count_calls("create_channel").await, 1);
}

#[tokio::test]
async fn test_cleanup_ghosts() {
    let h = harness().await;
    let gone = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    let kept = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::STAFF, "support")
        .await
        .unwrap();
    h.channels.remove_externally(gone.channel_id).await;

    let closed = h.engine.handle_cleanup_ghosts(fixtures::GUILD).await.unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].id, gone.id);
    assert_eq!(closed[0].status, TicketStatus::Closed);

    assert_eq!(
        h.engine.get_ticket(kept.id).unwrap().status,
        TicketStatus::Open
    );

    // Nothing left to clean up
    assert!(h
        .engine
        .handle_cleanup_ghosts(fixtures::GUILD)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_transcript_on_demand() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();
    h.channels
        .set_messages(
            ticket.channel_id,
            vec![
                fixtures::message(fixtures::OWNER, "the <button> is broken", 0),
                fixtures::message(fixtures::STAFF, "looking", 20),
            ],
        )
        .await;

    let err = h
        .engine
        .handle_transcript(ticket.id, fixtures::OUTSIDER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let snapshot = h
        .engine
        .handle_transcript(ticket.id, fixtures::OWNER)
        .await
        .unwrap();
    assert_eq!(snapshot.ticket_id, ticket.id);
    assert_eq!(snapshot.file_name, "transcript-support-0001.html");
    assert_eq!(snapshot.message_count, 2);
    assert!(snapshot.html.contains("the &lt;button&gt; is broken"));

    // Staff may take one too, and nothing about the ticket changes
    h.engine
        .handle_transcript(ticket.id, fixtures::STAFF)
        .await
        .unwrap();
    assert_eq!(h.engine.get_ticket(ticket.id).unwrap(), ticket);
    assert_eq!(h.transcripts.count().await, 0);
}

#[tokio::test]
async fn test_transcript_on_demand_disabled_or_gone() {
    let h = harness().await;
    let ticket = h
        .engine
        .handle_create(fixtures::GUILD, fixtures::OWNER, "support")
        .await
        .unwrap();

    let mut config = fixtures::guild_config(fixtures::GUILD);
    config.transcripts_enabled = false;
    h.configure(config).await;
    let err = h
        .engine
        .handle_transcript(ticket.id, fixtures::OWNER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.channels.count_calls("fetch_messages").await, 0);

    h.configure(fixtures::guild_config(fixtures::GUILD)).await;
    h.channels.remove_externally(ticket.channel_id).await;
    let err = h
        .engine
        .handle_transcript(ticket.id, fixtures::OWNER)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_concurrent_config_updates_serialize_per_guild() {
    let h = harness().await;

    let updates = (1..=8u32).flat_map(|cap| {
        [fixtures::GUILD, fixtures::OTHER_GUILD].map(|guild_id| {
            let engine = Arc::clone(&h.engine);
            let mut config = fixtures::guild_config(guild_id);
            config.max_open_per_user = cap;
            tokio::spawn(async move { engine.handle_config_update(guild_id, config).await })
        })
    });
    let results = join_all(updates).await;
    assert!(results.into_iter().all(|r| r.unwrap().is_ok()));

    for guild_id in [fixtures::GUILD, fixtures::OTHER_GUILD] {
        let stored = h.engine.get_config(guild_id).unwrap();
        assert!((1..=8).contains(&stored.max_open_per_user));
        assert_eq!(stored.ticket_types.len(), 1);
    }

    // A leaked guild lock would block this delete
    h.engine
        .handle_config_delete(fixtures::OTHER_GUILD)
        .await
        .unwrap();
    let err = h.engine.get_config(fixtures::OTHER_GUILD).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
