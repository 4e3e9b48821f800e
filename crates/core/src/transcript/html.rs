//! HTML transcript rendering.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::channel::{ticket_channel_name, ChannelMessage};
use crate::ticket::Ticket;

const STYLE: &str = "body{font-family:sans-serif;background:#313338;color:#dbdee1;margin:0;padding:24px}\
header{border-bottom:1px solid #4e5058;margin-bottom:16px}\
dl{display:grid;grid-template-columns:max-content auto;gap:4px 12px}\
dt{color:#949ba4}\
.message{padding:6px 0}\
.author{font-weight:600;color:#f2f3f5}\
.time{color:#949ba4;font-size:.8em;margin-left:8px}\
.content{white-space:pre-wrap;margin-top:2px}\
.attachments a{color:#00a8fc;display:block}\
.embeds{color:#949ba4;font-size:.85em}\
.empty{color:#949ba4;font-style:italic}";

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Render a ticket's message history as a standalone HTML page.
///
/// `messages` must be oldest first. Every piece of user content is escaped.
pub fn render_html_transcript(ticket: &Ticket, messages: &[ChannelMessage]) -> String {
    let title = html_escape(&ticket_channel_name(
        &ticket.ticket_type.name,
        ticket.id.number,
    ));
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Ticket Transcript - {title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n"
    );

    out.push_str("<header>\n");
    let _ = writeln!(out, "<h1>Ticket Transcript - {}</h1>", title);
    out.push_str("<dl>\n");
    let mut field = |name: &str, value: String| {
        let _ = writeln!(out, "<dt>{}</dt><dd>{}</dd>", name, html_escape(&value));
    };
    field("Ticket", ticket.id.to_string());
    field("Type", ticket.ticket_type.label().to_string());
    field("Status", ticket.status.to_string());
    field("Owner", ticket.owner_id.to_string());
    if let Some(claimer) = ticket.claimed_by {
        field("Claimed by", claimer.to_string());
    }
    field("Created", format_time(&ticket.created_at));
    if let Some(closed_at) = &ticket.closed_at {
        field("Closed", format_time(closed_at));
    }
    field("Channel ID", ticket.channel_id.to_string());
    field("Messages", messages.len().to_string());
    out.push_str("</dl>\n</header>\n<main>\n");

    if messages.is_empty() {
        out.push_str("<p class=\"empty\">No messages.</p>\n");
    }

    for message in messages {
        let _ = writeln!(
            out,
            "<div class=\"message\" data-author=\"{}\">",
            message.author_id
        );
        let _ = writeln!(
            out,
            "<span class=\"author\">{}</span><span class=\"time\">{}</span>",
            html_escape(&message.author_name),
            message.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        if !message.content.is_empty() {
            let _ = writeln!(
                out,
                "<div class=\"content\">{}</div>",
                html_escape(&message.content)
            );
        }
        if !message.attachments.is_empty() {
            out.push_str("<div class=\"attachments\">");
            for url in &message.attachments {
                let url = html_escape(url);
                let _ = write!(out, "<a href=\"{}\">{}</a>", url, url);
            }
            out.push_str("</div>\n");
        }
        if message.embed_count > 0 {
            let _ = writeln!(
                out,
                "<div class=\"embeds\">[Embeds: {}]</div>",
                message.embed_count
            );
        }
        out.push_str("</div>\n");
    }

    out.push_str("</main>\n</body>\n</html>\n");
    out
}
