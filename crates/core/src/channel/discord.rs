//! Discord REST implementation of the chat platform collaborators.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::DiscordConfig;
use crate::ids::{CategoryId, ChannelId, GuildId, RoleId, UserId};
use crate::metrics;

use super::error::ChannelError;
use super::retry::RetryPolicy;
use super::traits::{ChannelProvider, MemberDirectory, NotificationSink};
use super::types::{ChannelAccess, ChannelMessage, Member};

const VIEW_CHANNEL: u64 = 1 << 10;
const SEND_MESSAGES: u64 = 1 << 11;
const MANAGE_MESSAGES: u64 = 1 << 13;
const EMBED_LINKS: u64 = 1 << 14;
const ATTACH_FILES: u64 = 1 << 15;
const READ_MESSAGE_HISTORY: u64 = 1 << 16;

const PARTICIPANT: u64 = VIEW_CHANNEL | SEND_MESSAGES | EMBED_LINKS | ATTACH_FILES | READ_MESSAGE_HISTORY;
const STAFF: u64 = PARTICIPANT | MANAGE_MESSAGES;
const READ_ONLY: u64 = VIEW_CHANNEL | READ_MESSAGE_HISTORY;

const OVERWRITE_ROLE: u8 = 0;
const OVERWRITE_MEMBER: u8 = 1;
const GUILD_TEXT: u8 = 0;

/// Discord returns at most this many messages per page.
const MESSAGE_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct DiscordOverwrite {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
}

#[derive(Debug, Deserialize)]
struct DiscordChannel {
    id: String,
    #[serde(default)]
    permission_overwrites: Vec<DiscordOverwrite>,
}

impl DiscordChannel {
    /// Users with their own overwrite: the owner and anyone added later.
    fn member_ids(&self) -> Result<Vec<UserId>, ChannelError> {
        self.permission_overwrites
            .iter()
            .filter(|overwrite| overwrite.kind == OVERWRITE_MEMBER)
            .map(|overwrite| parse_snowflake(&overwrite.id).map(UserId))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
}

impl DiscordUser {
    fn display_name(&self) -> &str {
        self.global_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Deserialize)]
struct DiscordAttachment {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    author: DiscordUser,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    attachments: Vec<DiscordAttachment>,
    #[serde(default)]
    embeds: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DiscordMember {
    user: DiscordUser,
    #[serde(default)]
    nick: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

fn parse_snowflake(value: &str) -> Result<u64, ChannelError> {
    value.parse().map_err(|_| ChannelError::Api {
        status: 200,
        message: format!("malformed snowflake in response: {}", value),
    })
}

fn overwrite(id: u64, kind: u8, allow: u64, deny: u64) -> Value {
    json!({
        "id": id.to_string(),
        "type": kind,
        "allow": allow.to_string(),
        "deny": deny.to_string(),
    })
}

/// Body for creating a private ticket channel.
fn create_channel_body(
    guild_id: GuildId,
    category_id: CategoryId,
    name: &str,
    access: &ChannelAccess,
) -> Value {
    // The @everyone role shares the guild's id.
    let mut overwrites = vec![
        overwrite(guild_id.0, OVERWRITE_ROLE, 0, VIEW_CHANNEL),
        overwrite(access.owner_id.0, OVERWRITE_MEMBER, PARTICIPANT, 0),
    ];
    overwrites.extend(
        access
            .staff_role_ids
            .iter()
            .map(|role| overwrite(role.0, OVERWRITE_ROLE, STAFF, 0)),
    );

    json!({
        "name": name,
        "type": GUILD_TEXT,
        "parent_id": category_id.to_string(),
        "permission_overwrites": overwrites,
    })
}

/// Convert a page set (newest first, as Discord returns them) into
/// transcript messages, oldest first.
fn into_channel_messages(mut raw: Vec<DiscordMessage>) -> Result<Vec<ChannelMessage>, ChannelError> {
    raw.reverse();
    raw.into_iter()
        .map(|message| {
            Ok(ChannelMessage {
                author_id: UserId(parse_snowflake(&message.author.id)?),
                author_name: message.author.display_name().to_string(),
                content: message.content,
                timestamp: message.timestamp,
                attachments: message.attachments.into_iter().map(|a| a.url).collect(),
                embed_count: message.embeds.len(),
            })
        })
        .collect()
}

fn into_member(raw: DiscordMember) -> Result<Member, ChannelError> {
    let role_ids = raw
        .roles
        .iter()
        .map(|role| parse_snowflake(role).map(RoleId))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Member {
        user_id: UserId(parse_snowflake(&raw.user.id)?),
        display_name: raw
            .nick
            .clone()
            .unwrap_or_else(|| raw.user.display_name().to_string()),
        role_ids,
    })
}

/// Seconds to wait from a 429 response: the `Retry-After` header, or the
/// `retry_after` field of the JSON body.
fn parse_retry_after(header: Option<&str>, body: &str) -> Option<Duration> {
    let from_header = header.and_then(|v| v.trim().parse::<f64>().ok());
    let from_body = || {
        serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("retry_after").and_then(Value::as_f64))
    };

    from_header
        .or_else(from_body)
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Discord REST v10 client.
pub struct DiscordClient {
    client: Client,
    api_base: String,
    token: String,
    retry: RetryPolicy,
}

impl DiscordClient {
    /// Create a new client from configuration.
    pub fn new(config: &DiscordConfig, retry: RetryPolicy) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("warden/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChannelError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            retry,
        })
    }

    /// Send one request and map error statuses.
    async fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ChannelError> {
        let url = format!("{}{}", self.api_base, path);
        debug!(method = %method, url = %url, "Discord API request");

        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let result = request.send().await;
        metrics::PLATFORM_REQUEST_DURATION
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::PLATFORM_REQUESTS
                    .with_label_values(&[operation, "error"])
                    .inc();
                return Err(ChannelError::Network(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            metrics::PLATFORM_REQUESTS
                .with_label_values(&[operation, "success"])
                .inc();
            return Ok(response);
        }

        metrics::PLATFORM_REQUESTS
            .with_label_values(&[operation, "error"])
            .inc();

        let retry_header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => ChannelError::RateLimited {
                retry_after: parse_retry_after(retry_header.as_deref(), &text),
            },
            StatusCode::NOT_FOUND => ChannelError::NotFound(format!("{} ({})", path, text)),
            StatusCode::FORBIDDEN => ChannelError::Forbidden(format!("{} ({})", path, text)),
            _ => ChannelError::Api {
                status: status.as_u16(),
                message: text,
            },
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ChannelError> {
        let response = self.execute(operation, method, path, body).await?;
        response.json::<T>().await.map_err(|e| ChannelError::Api {
            status: 200,
            message: format!("failed to parse Discord response: {}", e),
        })
    }

    async fn call_empty(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(), ChannelError> {
        self.execute(operation, method, path, body).await.map(|_| ())
    }

    async fn set_member_overwrite(
        &self,
        operation: &'static str,
        channel_id: ChannelId,
        user_id: UserId,
        allow: u64,
        deny: u64,
    ) -> Result<(), ChannelError> {
        let path = format!("/channels/{}/permissions/{}", channel_id, user_id);
        let body = json!({
            "type": OVERWRITE_MEMBER,
            "allow": allow.to_string(),
            "deny": deny.to_string(),
        });
        self.retry
            .run(operation, || {
                self.call_empty(operation, Method::PUT, &path, Some(&body))
            })
            .await
    }

    async fn get_channel(
        &self,
        operation: &'static str,
        channel_id: ChannelId,
    ) -> Result<DiscordChannel, ChannelError> {
        let path = format!("/channels/{}", channel_id);
        self.retry
            .run(operation, || self.call(operation, Method::GET, &path, None))
            .await
    }

    /// Rewrite the overwrite of every member of the channel.
    async fn set_all_member_overwrites(
        &self,
        operation: &'static str,
        channel_id: ChannelId,
        allow: u64,
        deny: u64,
    ) -> Result<(), ChannelError> {
        let channel = self.get_channel(operation, channel_id).await?;
        for user_id in channel.member_ids()? {
            self.set_member_overwrite(operation, channel_id, user_id, allow, deny)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelProvider for DiscordClient {
    fn name(&self) -> &str {
        "discord"
    }

    async fn create_channel(
        &self,
        guild_id: GuildId,
        category_id: CategoryId,
        name: &str,
        access: &ChannelAccess,
    ) -> Result<ChannelId, ChannelError> {
        let path = format!("/guilds/{}/channels", guild_id);
        let body = create_channel_body(guild_id, category_id, name, access);

        let channel: DiscordChannel = self
            .retry
            .run("create_channel", || {
                self.call("create_channel", Method::POST, &path, Some(&body))
            })
            .await?;

        Ok(ChannelId(parse_snowflake(&channel.id)?))
    }

    async fn rename_channel(&self, channel_id: ChannelId, name: &str) -> Result<(), ChannelError> {
        let path = format!("/channels/{}", channel_id);
        let body = json!({ "name": name });
        self.retry
            .run("rename_channel", || {
                self.call_empty("rename_channel", Method::PATCH, &path, Some(&body))
            })
            .await
    }

    async fn move_channel(
        &self,
        channel_id: ChannelId,
        category_id: CategoryId,
    ) -> Result<(), ChannelError> {
        let path = format!("/channels/{}", channel_id);
        let body = json!({ "parent_id": category_id.to_string() });
        self.retry
            .run("move_channel", || {
                self.call_empty("move_channel", Method::PATCH, &path, Some(&body))
            })
            .await
    }

    async fn lock_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError> {
        self.set_all_member_overwrites("lock_channel", channel_id, READ_ONLY, SEND_MESSAGES)
            .await
    }

    async fn unlock_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError> {
        self.set_all_member_overwrites("unlock_channel", channel_id, PARTICIPANT, 0)
            .await
    }

    async fn channel_exists(&self, channel_id: ChannelId) -> Result<bool, ChannelError> {
        match self.get_channel("channel_exists", channel_id).await {
            Ok(_) => Ok(true),
            Err(ChannelError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete_channel(&self, channel_id: ChannelId) -> Result<(), ChannelError> {
        let path = format!("/channels/{}", channel_id);
        self.retry
            .run("delete_channel", || {
                self.call_empty("delete_channel", Method::DELETE, &path, None)
            })
            .await
    }

    async fn grant_access(
        &self,
        channel_id: ChannelId,
        user_id: UserId,
    ) -> Result<(), ChannelError> {
        self.set_member_overwrite("grant_access", channel_id, user_id, PARTICIPANT, 0)
            .await
    }

    async fn fetch_messages(
        &self,
        channel_id: ChannelId,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ChannelError> {
        let mut collected: Vec<DiscordMessage> = Vec::new();
        let mut before: Option<String> = None;

        while collected.len() < limit {
            let page_size = (limit - collected.len()).min(MESSAGE_PAGE_SIZE);
            let path = match &before {
                Some(id) => format!(
                    "/channels/{}/messages?limit={}&before={}",
                    channel_id, page_size, id
                ),
                None => format!("/channels/{}/messages?limit={}", channel_id, page_size),
            };

            let page: Vec<DiscordMessage> = self
                .retry
                .run("fetch_messages", || {
                    self.call("fetch_messages", Method::GET, &path, None)
                })
                .await?;

            let exhausted = page.len() < page_size;
            before = page.last().map(|m| m.id.clone());
            collected.extend(page);

            if exhausted || before.is_none() {
                break;
            }
        }

        into_channel_messages(collected)
    }
}

#[async_trait]
impl NotificationSink for DiscordClient {
    async fn post_message(
        &self,
        channel_id: ChannelId,
        content: &str,
    ) -> Result<(), ChannelError> {
        let path = format!("/channels/{}/messages", channel_id);
        let body = json!({
            "content": content,
            "allowed_mentions": { "parse": ["users", "roles"] },
        });
        self.retry
            .run("post_message", || {
                self.call_empty("post_message", Method::POST, &path, Some(&body))
            })
            .await
    }
}

#[async_trait]
impl MemberDirectory for DiscordClient {
    async fn member(&self, guild_id: GuildId, user_id: UserId) -> Result<Member, ChannelError> {
        let path = format!("/guilds/{}/members/{}", guild_id, user_id);
        let raw: DiscordMember = self
            .retry
            .run("member", || self.call("member", Method::GET, &path, None))
            .await?;
        into_member(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_channel_body_hides_channel_from_everyone() {
        let access = ChannelAccess {
            owner_id: UserId(42),
            staff_role_ids: vec![RoleId(7)],
        };
        let body = create_channel_body(GuildId(1), CategoryId(99), "support-0001", &access);

        assert_eq!(body["name"], "support-0001");
        assert_eq!(body["parent_id"], "99");

        let overwrites = body["permission_overwrites"].as_array().unwrap();
        assert_eq!(overwrites.len(), 3);

        assert_eq!(overwrites[0]["id"], "1");
        assert_eq!(overwrites[0]["deny"], VIEW_CHANNEL.to_string());

        assert_eq!(overwrites[1]["id"], "42");
        assert_eq!(overwrites[1]["type"], OVERWRITE_MEMBER);
        assert_eq!(overwrites[1]["allow"], PARTICIPANT.to_string());

        assert_eq!(overwrites[2]["id"], "7");
        assert_eq!(overwrites[2]["allow"], STAFF.to_string());
    }

    #[test]
    fn test_member_ids_skip_role_overwrites() {
        let channel: DiscordChannel = serde_json::from_value(json!({
            "id": "500",
            "permission_overwrites": [
                { "id": "1", "type": 0, "allow": "0", "deny": "1024" },
                { "id": "42", "type": 1, "allow": "117760", "deny": "0" },
                { "id": "7", "type": 0, "allow": "125952", "deny": "0" },
                { "id": "77", "type": 1, "allow": "117760", "deny": "0" }
            ]
        }))
        .unwrap();

        assert_eq!(channel.member_ids().unwrap(), vec![UserId(42), UserId(77)]);
    }

    #[test]
    fn test_created_channel_response_without_overwrites() {
        let channel: DiscordChannel = serde_json::from_value(json!({ "id": "500" })).unwrap();
        assert!(channel.member_ids().unwrap().is_empty());
    }

    #[test]
    fn test_read_only_keeps_view_but_not_send() {
        assert_ne!(READ_ONLY & VIEW_CHANNEL, 0);
        assert_eq!(READ_ONLY & SEND_MESSAGES, 0);
    }

    #[test]
    fn test_messages_are_returned_oldest_first() {
        let raw: Vec<DiscordMessage> = serde_json::from_value(json!([
            {
                "id": "3",
                "author": { "id": "10", "username": "alice", "global_name": "Alice" },
                "content": "thanks!",
                "timestamp": "2024-03-01T12:05:00+00:00",
                "attachments": [],
                "embeds": []
            },
            {
                "id": "2",
                "author": { "id": "11", "username": "mod" },
                "content": "see attached",
                "timestamp": "2024-03-01T12:01:00+00:00",
                "attachments": [{ "url": "https://cdn.example/log.txt" }],
                "embeds": [{}, {}]
            }
        ]))
        .unwrap();

        let messages = into_channel_messages(raw).unwrap();
        assert_eq!(messages[0].author_name, "mod");
        assert_eq!(messages[0].attachments, vec!["https://cdn.example/log.txt"]);
        assert_eq!(messages[0].embed_count, 2);
        assert_eq!(messages[1].author_id, UserId(10));
        assert_eq!(messages[1].author_name, "Alice");
    }

    #[test]
    fn test_member_conversion_prefers_nick() {
        let raw: DiscordMember = serde_json::from_value(json!({
            "user": { "id": "5", "username": "bob" },
            "nick": "Bobby",
            "roles": ["100", "200"]
        }))
        .unwrap();

        let member = into_member(raw).unwrap();
        assert_eq!(member.user_id, UserId(5));
        assert_eq!(member.display_name, "Bobby");
        assert_eq!(member.role_ids, vec![RoleId(100), RoleId(200)]);
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(
            parse_retry_after(Some("1.5"), ""),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            parse_retry_after(None, r#"{"message":"You are being rate limited.","retry_after":0.25}"#),
            Some(Duration::from_millis(250))
        );
        assert_eq!(parse_retry_after(Some("soon"), "not json"), None);
    }

    #[test]
    fn test_client_trims_api_base() {
        let config = DiscordConfig {
            bot_token: "token".to_string(),
            api_base: "http://localhost:9999/api/v10/".to_string(),
            timeout_secs: 5,
        };
        let client = DiscordClient::new(&config, RetryPolicy::none()).unwrap();
        assert_eq!(client.api_base, "http://localhost:9999/api/v10");
        assert_eq!(client.name(), "discord");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_a_network_error() {
        let config = DiscordConfig {
            bot_token: "token".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
        };
        let client = DiscordClient::new(&config, RetryPolicy::none()).unwrap();
        let result = client.delete_channel(ChannelId(1)).await;
        assert!(matches!(result, Err(ChannelError::Network(_))));
    }
}
