//! Plain-text transcript rendering.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::channel::{ticket_channel_name, ChannelMessage};
use crate::ticket::Ticket;

const RULE_WIDTH: usize = 50;

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render a ticket's message history as a plain-text transcript.
///
/// `messages` must be oldest first.
pub fn render_transcript(ticket: &Ticket, messages: &[ChannelMessage]) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "Ticket Transcript - {}",
        ticket_channel_name(&ticket.ticket_type.name, ticket.id.number)
    );
    let _ = writeln!(out, "Ticket: {}", ticket.id);
    let _ = writeln!(out, "Type: {}", ticket.ticket_type.label());
    let _ = writeln!(out, "Owner: {}", ticket.owner_id);
    if let Some(claimer) = ticket.claimed_by {
        let _ = writeln!(out, "Claimed by: {}", claimer);
    }
    let _ = writeln!(out, "Created: {}", format_time(&ticket.created_at));
    if let Some(closed_at) = &ticket.closed_at {
        let _ = writeln!(out, "Closed: {}", format_time(closed_at));
    }
    let _ = writeln!(out, "Channel ID: {}", ticket.channel_id);
    let _ = writeln!(out, "Guild: {}", ticket.id.guild_id);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    out.push('\n');

    if messages.is_empty() {
        out.push_str("(no messages)\n");
        return out;
    }

    for message in messages {
        let _ = write!(
            out,
            "[{}] {}: {}",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.author_name,
            message.content
        );
        if !message.attachments.is_empty() {
            let _ = write!(out, " [Attachments: {}]", message.attachments.join(", "));
        }
        if message.embed_count > 0 {
            let _ = write!(out, " [Embeds: {}]", message.embed_count);
        }
        out.push('\n');
    }

    out
}
