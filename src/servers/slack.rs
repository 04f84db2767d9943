//! Slack mock server.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

const DEMO_USER_ID: &str = "U12345678";

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SendMessage {
    #[schemars(description = "The channel name or ID to send the message to")]
    pub channel: String,
    #[schemars(description = "The content of the message to send")]
    pub text: String,
    #[schemars(description = "Optional thread timestamp to reply to a thread")]
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ChannelHistory {
    #[schemars(description = "The channel name or ID to get messages from")]
    pub channel: String,
    #[schemars(description = "Maximum number of messages to retrieve (default: 10)")]
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ThreadQuery {
    #[schemars(description = "The channel name or ID")]
    pub channel: String,
    #[schemars(description = "The timestamp of the parent message")]
    pub thread_ts: String,
    #[schemars(description = "Maximum number of replies to retrieve (default: 10)")]
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UserQuery {
    #[schemars(description = "Optional user ID. If not provided, returns current user's profile")]
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchQuery {
    #[schemars(description = "The search query")]
    pub query: String,
    #[schemars(description = "Maximum number of results to return (default: 10)")]
    #[serde(default = "default_limit")]
    pub count: u32,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct Reaction {
    #[schemars(description = "The channel ID where the message is located")]
    pub channel: String,
    #[schemars(description = "The timestamp of the message")]
    pub timestamp: String,
    #[schemars(description = "The emoji name (without colons, e.g., 'thumbsup')")]
    pub reaction: String,
}

pub fn send_message(channel: &str, text: &str, thread_ts: Option<&str>) -> Value {
    json!({
        "success": true,
        "message": {
            "ts": "1732187400.123456",
            "channel": channel,
            "text": text,
            "user": DEMO_USER_ID,
            "username": "demo_user",
            "thread_ts": thread_ts,
            "type": "message",
            "created_at": "2025-11-22T10:30:00Z"
        },
        "message_sent": "Message sent successfully!"
    })
}

pub fn channel_messages(channel: &str, limit: u32) -> Value {
    let messages: Vec<Value> = (0..limit.min(5))
        .map(|i| {
            let reactions = if i % 2 == 0 {
                json!([
                    { "name": "thumbsup", "count": if i < 3 { 3 - i } else { 1 } },
                    { "name": "eyes", "count": if i < 2 { 2 - i } else { 1 } }
                ])
            } else {
                json!([])
            };
            json!({
                "ts": format!("173218{}.{}", 7400 - i * 100, 123456 + i),
                "user": format!("U1234567{}", i),
                "username": format!("team_member_{}", i + 1),
                "text": format!("This is a sample message {} in the {} channel", i + 1, channel),
                "type": "message",
                "reactions": reactions,
                "thread_count": if i < 3 { 5 - i } else { 0 },
                "created_at": format!("2025-11-{:02}T{}:00:00Z", 22 - i, 10 + i),
            })
        })
        .collect();

    json!({
        "success": true,
        "channel": channel,
        "total_messages": messages.len(),
        "messages": messages,
    })
}

pub fn thread_replies(channel: &str, thread_ts: &str, limit: u32) -> Value {
    let reply_count = limit.saturating_sub(1).min(4);
    let mut replies = vec![json!({
        "ts": thread_ts,
        "user": "U12345670",
        "username": "thread_starter",
        "text": "This is the parent message that started the thread",
        "type": "message",
        "is_parent": true,
        "reply_count": reply_count,
        "created_at": "2025-11-21T09:00:00Z"
    })];
    replies.extend((1..=reply_count).map(|n| {
        json!({
            "ts": format!("{}.{}", thread_ts, n),
            "user": format!("U1234567{}", n),
            "username": format!("responder_{}", n),
            "text": format!("This is reply {} to the thread", n),
            "type": "message",
            "thread_ts": thread_ts,
            "created_at": format!("2025-11-21T{}:00:00Z", 9 + n),
        })
    }));

    json!({
        "success": true,
        "channel": channel,
        "thread_ts": thread_ts,
        "total_replies": replies.len(),
        "replies": replies,
    })
}

pub fn channels() -> Value {
    let channel = |id: &str, name: &str, private: bool, members: u32, topic: &str, purpose: &str| {
        json!({
            "id": id,
            "name": name,
            "is_channel": true,
            "is_private": private,
            "is_archived": false,
            "members_count": members,
            "topic": topic,
            "purpose": purpose,
        })
    };
    let channels = vec![
        channel("C12345678", "general", false, 45, "Company-wide announcements and general discussions", "This channel is for team-wide communication"),
        channel("C23456789", "engineering", false, 23, "Engineering team discussions and updates", "For all engineering-related conversations"),
        channel("C34567890", "random", false, 38, "Non-work banter and water cooler conversation", "A place for random things"),
        channel("C45678901", "product", false, 15, "Product discussions and roadmap planning", "Product team collaboration"),
        channel("C56789012", "project-alpha", true, 8, "Project Alpha - Confidential", "Private channel for Project Alpha team"),
    ];

    json!({
        "success": true,
        "total_channels": channels.len(),
        "channels": channels,
    })
}

pub fn user_profile(user_id: Option<&str>) -> Value {
    let user_id = user_id.filter(|id| !id.is_empty()).unwrap_or(DEMO_USER_ID);
    json!({
        "success": true,
        "user": {
            "id": user_id,
            "name": "demo_user",
            "real_name": "Demo User",
            "display_name": "Demo",
            "email": "demo@company.com",
            "title": "Senior Software Engineer",
            "phone": "+1-555-0123",
            "status_text": "In a meeting",
            "status_emoji": ":calendar:",
            "team_id": "T12345678",
            "is_admin": false,
            "is_owner": false,
            "is_bot": false,
            "timezone": "America/Los_Angeles",
            "timezone_offset": -28800,
            "profile_image": "https://example.com/avatars/demo_user.jpg"
        }
    })
}

pub fn search_messages(query: &str, count: u32) -> Value {
    const CHANNEL_NAMES: [&str; 5] = ["general", "engineering", "random", "product", "support"];

    let results: Vec<Value> = (0..count.min(5))
        .map(|i| {
            let channel_id = format!("C{}", 12345678 + i);
            let ts_major = 7000 + i * 100;
            let ts_minor = 111111 + i;
            json!({
                "ts": format!("173218{}.{}", ts_major, ts_minor),
                "channel": channel_id,
                "channel_name": CHANNEL_NAMES[(i % 5) as usize],
                "user": format!("U1234567{}", i),
                "username": format!("user_{}", i + 1),
                "text": format!("Message containing '{}' - Sample result {}", query, i + 1),
                "permalink": format!(
                    "https://company.slack.com/archives/{}/p173218{}{}",
                    channel_id, ts_major, ts_minor
                ),
                "created_at": format!("2025-11-{:02}T{}:00:00Z", 15 + i, 10 + i),
            })
        })
        .collect();

    json!({
        "success": true,
        "query": query,
        "total_results": results.len(),
        "results": results,
    })
}

pub fn add_reaction(channel: &str, timestamp: &str, reaction: &str) -> Value {
    json!({
        "success": true,
        "reaction": {
            "channel": channel,
            "timestamp": timestamp,
            "reaction": reaction,
            "user": DEMO_USER_ID
        },
        "message": format!("Reaction :{}: added successfully!", reaction)
    })
}

pub fn workspace_info() -> Value {
    json!({
        "success": true,
        "workspace": {
            "id": "T12345678",
            "name": "Demo Company",
            "domain": "democompany",
            "email_domain": "democompany.com",
            "icon": "https://example.com/workspaces/demo.png",
            "total_members": 150,
            "total_channels": 45,
            "total_public_channels": 32,
            "total_private_channels": 13,
            "created_at": "2020-01-15T10:00:00Z",
            "plan": "Standard"
        }
    })
}

#[derive(Debug, Clone)]
pub struct SlackServer {
    tool_router: ToolRouter<Self>,
}

impl Default for SlackServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl SlackServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Send a message to a Slack channel.")]
    fn send_message(
        &self,
        Parameters(SendMessage {
            channel,
            text,
            thread_ts,
        }): Parameters<SendMessage>,
    ) -> String {
        info!("send_message(channel={})", channel);
        send_message(&channel, &text, thread_ts.as_deref()).to_string()
    }

    #[tool(description = "Get recent messages from a Slack channel.")]
    fn get_channel_messages(
        &self,
        Parameters(ChannelHistory { channel, limit }): Parameters<ChannelHistory>,
    ) -> String {
        info!("get_channel_messages(channel={}, limit={})", channel, limit);
        channel_messages(&channel, limit).to_string()
    }

    #[tool(description = "Get replies to a thread in a Slack channel.")]
    fn get_thread_replies(
        &self,
        Parameters(ThreadQuery {
            channel,
            thread_ts,
            limit,
        }): Parameters<ThreadQuery>,
    ) -> String {
        info!("get_thread_replies(channel={}, thread_ts={})", channel, thread_ts);
        thread_replies(&channel, &thread_ts, limit).to_string()
    }

    #[tool(description = "List all available Slack channels.")]
    fn list_channels(&self) -> String {
        info!("list_channels()");
        channels().to_string()
    }

    #[tool(description = "Get Slack user profile information.")]
    fn get_user_profile(
        &self,
        Parameters(UserQuery { user_id }): Parameters<UserQuery>,
    ) -> String {
        info!("get_user_profile(user_id={:?})", user_id);
        user_profile(user_id.as_deref()).to_string()
    }

    #[tool(description = "Search for messages across all Slack channels.")]
    fn search_messages(
        &self,
        Parameters(SearchQuery { query, count }): Parameters<SearchQuery>,
    ) -> String {
        info!("search_messages(query={}, count={})", query, count);
        search_messages(&query, count).to_string()
    }

    #[tool(description = "Add a reaction emoji to a Slack message.")]
    fn add_reaction(
        &self,
        Parameters(Reaction {
            channel,
            timestamp,
            reaction,
        }): Parameters<Reaction>,
    ) -> String {
        info!("add_reaction(channel={}, reaction={})", channel, reaction);
        add_reaction(&channel, &timestamp, &reaction).to_string()
    }

    #[tool(description = "Get information about the Slack workspace.")]
    fn get_workspace_info(&self) -> String {
        info!("get_workspace_info()");
        workspace_info().to_string()
    }
}

#[tool_handler]
impl ServerHandler for SlackServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "slack-server".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Mock Slack tools returning static data.".into()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_messages_reactions_alternate() {
        let history = channel_messages("general", 10);
        assert_eq!(history["total_messages"], 5);
        let messages = history["messages"].as_array().unwrap();
        assert_eq!(messages[0]["ts"], "1732187400.123456");
        assert_eq!(messages[0]["reactions"][0]["count"], 3);
        assert_eq!(messages[1]["reactions"], json!([]));
        assert_eq!(messages[4]["thread_count"], 0);
        assert_eq!(messages[4]["created_at"], "2025-11-18T14:00:00Z");
    }

    #[test]
    fn test_thread_replies_include_parent() {
        let thread = thread_replies("general", "1732187400.123456", 3);
        assert_eq!(thread["total_replies"], 3);
        assert_eq!(thread["replies"][0]["is_parent"], true);
        assert_eq!(thread["replies"][2]["ts"], "1732187400.123456.2");

        let only_parent = thread_replies("general", "1", 0);
        assert_eq!(only_parent["total_replies"], 1);
    }

    #[test]
    fn test_user_profile_defaults_to_current_user() {
        assert_eq!(user_profile(None)["user"]["id"], DEMO_USER_ID);
        assert_eq!(user_profile(Some(""))["user"]["id"], DEMO_USER_ID);
        assert_eq!(user_profile(Some("U999"))["user"]["id"], "U999");
    }

    #[test]
    fn test_search_permalink() {
        let found = search_messages("deploy", 2);
        assert_eq!(found["total_results"], 2);
        assert_eq!(
            found["results"][1]["permalink"],
            "https://company.slack.com/archives/C12345679/p1732187100111112"
        );
        assert_eq!(channels()["total_channels"], 5);
    }
}
