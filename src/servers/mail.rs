//! Gmail and Instagram mock server.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ServerHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

/// Number of emails the mock inbox holds.
const INBOX_SIZE: u32 = 5;

fn default_max_results() -> u32 {
    10
}

fn default_label() -> Option<String> {
    Some("INBOX".to_string())
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct EmailQuery {
    #[schemars(description = "Maximum number of emails to retrieve (default: 10)")]
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[schemars(description = "Search query to filter emails")]
    #[serde(default)]
    pub query: Option<String>,
    #[schemars(description = "Gmail label to filter by (default: INBOX)")]
    #[serde(default = "default_label")]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ProfileQuery {
    #[schemars(description = "Instagram username to fetch profile for")]
    pub username: String,
}

/// Emails from the mock inbox: `min(max_results, 5)` entries, newest first.
pub fn emails(max_results: u32, query: Option<&str>, label: Option<&str>) -> Value {
    let emails: Vec<Value> = (0..max_results.min(INBOX_SIZE))
        .map(|i| {
            let n = i + 1;
            let subject = match query {
                Some(q) => format!("Sample Email {} matching '{}'", n, q),
                None => format!("Sample Email {}", n),
            };
            json!({
                "id": format!("email_{}", n),
                "from": format!("sender{}@example.com", n),
                "subject": subject,
                "snippet": format!("This is a preview of email {}...", n),
                "date": format!("2025-11-{:02}", 21 - i),
                "label": label,
                "unread": i % 2 == 0,
            })
        })
        .collect();

    json!({
        "success": true,
        "total_results": emails.len(),
        "query": query,
        "label": label,
        "emails": emails,
    })
}

pub fn instagram_profile(username: &str) -> Value {
    let verified = matches!(
        username.to_lowercase().as_str(),
        "verified_user" | "celebrity"
    );
    json!({
        "success": true,
        "username": username,
        "profile": {
            "full_name": format!("{} User", title_case(username)),
            "bio": format!("This is the bio for @{}", username),
            "profile_picture": format!("https://example.com/profiles/{}.jpg", username),
            "followers": 15420,
            "following": 892,
            "posts": 234,
            "verified": verified,
            "is_private": false,
            "recent_posts": [
                { "id": "post_1", "caption": "Beautiful sunset! 🌅", "likes": 1205, "comments": 43, "date": "2025-11-20" },
                { "id": "post_2", "caption": "Coffee time ☕", "likes": 892, "comments": 28, "date": "2025-11-18" },
                { "id": "post_3", "caption": "Weekend vibes! 🎉", "likes": 1543, "comments": 67, "date": "2025-11-15" }
            ]
        }
    })
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct MailServer {
    tool_router: ToolRouter<Self>,
}

impl Default for MailServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_router]
impl MailServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Retrieve emails from Gmail.")]
    fn get_gmail_emails(
        &self,
        Parameters(EmailQuery {
            max_results,
            query,
            label,
        }): Parameters<EmailQuery>,
    ) -> String {
        info!("get_gmail_emails(max_results={}, query={:?})", max_results, query);
        emails(max_results, query.as_deref(), label.as_deref()).to_string()
    }

    #[tool(description = "Retrieve Instagram profile information.")]
    fn get_instagram_profile(
        &self,
        Parameters(ProfileQuery { username }): Parameters<ProfileQuery>,
    ) -> String {
        info!("get_instagram_profile(username={})", username);
        instagram_profile(&username).to_string()
    }
}

#[tool_handler]
impl ServerHandler for MailServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "gmail-instagram-server".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some("Mock Gmail and Instagram tools returning static data.".into()),
            ..Default::default()
        }
    }
}
