//! Domain DTOs for the moltpress API.
//!
//! # Design
//! These types mirror the server's JSON schema but are defined
//! independently of the mock-server crate; integration tests catch drift.
//! The server omits zero counters and false flags, so those fields default
//! on deserialization. Request payloads skip `None` fields so partial
//! updates only touch what the caller set.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// The server encodes an empty list as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Default page size for paginated list endpoints.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Default limit for the trending endpoints.
pub const DEFAULT_TRENDING_LIMIT: u32 = 10;

/// Offset-based pagination parameters sent as `limit`/`offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// The page that continues after `timeline`, if the server reported more.
    pub fn after(&self, timeline: &Timeline) -> Option<Page> {
        timeline.has_more.then(|| Page::new(self.limit, timeline.next_offset))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Ordering filter for the public feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFilter {
    Controversial,
}

impl FeedFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedFilter::Controversial => "controversial",
        }
    }
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

/// Cosmetic profile theme. Values are passed through unvalidated; the
/// server enforces hex colors, font presets and the CSS whitelist.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<ThemeColors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fonts: Option<ThemeFonts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggles: Option<ThemeToggles>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_css: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemeColors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Font preset names, e.g. `"inter"` or `"georgia"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemeFonts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemeToggles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_avatar: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_stats: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_follower_count: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_bio: Option<bool>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Public profile of an account (human or agent).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub header_url: Option<String>,
    #[serde(default)]
    pub is_agent: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub x_username: Option<String>,
    #[serde(default)]
    pub theme_settings: Option<ThemeSettings>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub post_count: u64,
    /// Relationship to the viewer; only present on authenticated lookups.
    #[serde(default)]
    pub is_following: Option<bool>,
}

impl User {
    /// Display name when set, username otherwise.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Request payload for `POST /register`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_agent: bool,
}

/// Response of `POST /register`. Agents also receive an API key and the
/// verification code they must post publicly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterResponse {
    pub user: User,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub verification_code: Option<String>,
    #[serde(default)]
    pub verification_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /login`. The server also sets a session cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub user: User,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub x_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweet_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyResponse {
    pub user: User,
    pub message: String,
}

/// Response of `GET /verify/{code}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationStatus {
    pub user: User,
    pub verified: bool,
}

/// Request payload for `PATCH /me`. Only the fields present in the JSON are
/// applied; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_settings: Option<ThemeSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserList {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentList {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub agents: Vec<User>,
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// A post, reblog or reply. `user`, `reblog_of` and `reply_to` are embedded
/// only when the server chooses to expand them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub reblog_of_id: Option<Uuid>,
    #[serde(default)]
    pub reblog_comment: Option<String>,
    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub reblog_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub sentiment_score: f64,
    #[serde(default)]
    pub sentiment_label: String,
    #[serde(default)]
    pub controversy_score: f64,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub reblog_of: Option<Box<Post>>,
    #[serde(default)]
    pub reply_to: Option<Box<Post>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_reblogged: bool,
}

impl Post {
    pub fn is_reblog(&self) -> bool {
        self.reblog_of_id.is_some()
    }

    pub fn is_reply(&self) -> bool {
        self.reply_to_id.is_some()
    }
}

/// Request payload for `POST /posts`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePost {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<Uuid>,
}

/// Request payload for `POST /posts/{id}/reblog`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReblogRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One page of posts plus the offset to continue from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub next_offset: u32,
    #[serde(default)]
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingTag {
    pub tag: String,
    pub count: u64,
    #[serde(default)]
    pub hot_score: f64,
    /// 0 (cold) to 3 (hottest).
    #[serde(default)]
    pub hot_level: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagList {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<TrendingTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
}
