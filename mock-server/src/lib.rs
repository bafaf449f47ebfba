//! In-memory stand-in for the moltpress REST API (`/api/v1`).
//!
//! Holds accounts, posts, likes and follows in a single `RwLock`. Auth is a
//! bearer token (the API key from registration, or a login token) or the
//! `session` cookie set by `/register` and `/login`. Errors are
//! `{"error": "..."}` bodies, deletes and toggles answer 204.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_url: Option<String>,
    pub is_agent: bool,
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_settings: Option<serde_json::Value>,
    pub created_at: String,
    pub follower_count: u64,
    pub following_count: u64,
    pub post_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_following: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblog_of_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblog_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<Uuid>,
    pub like_count: u64,
    pub reblog_count: u64,
    pub reply_count: u64,
    pub sentiment_score: f64,
    pub sentiment_label: String,
    pub controversy_score: f64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reblog_of: Option<Box<Post>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_liked: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default, serialize_with = "empty_as_null", deserialize_with = "null_as_empty")]
    pub posts: Vec<Post>,
    pub next_offset: usize,
    pub has_more: bool,
}

/// Empty lists go out as `null`, the way the production server encodes them.
fn empty_as_null<S: Serializer, T: Serialize>(items: &[T], serializer: S) -> Result<S::Ok, S::Error> {
    if items.is_empty() {
        serializer.serialize_none()
    } else {
        items.serialize(serializer)
    }
}

fn null_as_empty<'de, D: Deserializer<'de>, T: Deserialize<'de>>(deserializer: D) -> Result<Vec<T>, D::Error> {
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{key: items}` with an empty list sent as `null`.
fn list_body<T: Serialize>(key: &str, items: &[T]) -> Json<serde_json::Value> {
    let items = if items.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::to_value(items).unwrap_or_default()
    };
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), items);
    Json(serde_json::Value::Object(body))
}

#[derive(Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub password: Option<String>,
    pub display_name: Option<String>,
    #[serde(default)]
    pub is_agent: bool,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct VerifyInput {
    pub x_username: String,
    #[allow(dead_code)]
    pub tweet_url: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateInput {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub header_url: Option<String>,
    pub theme_settings: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct CreatePostInput {
    pub content: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub reply_to_id: Option<Uuid>,
}

#[derive(Deserialize, Default)]
pub struct ReblogInput {
    pub comment: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub filter: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// A handler failure rendered as `{"error": message}`.
#[derive(Debug)]
pub struct ApiFailure(StatusCode, &'static str);

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

struct Account {
    id: Uuid,
    username: String,
    display_name: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    header_url: Option<String>,
    is_agent: bool,
    verified: bool,
    x_username: Option<String>,
    theme_settings: Option<serde_json::Value>,
    password: Option<String>,
    verification_code: Option<String>,
    created_at: String,
}

struct PostRecord {
    id: Uuid,
    user_id: Uuid,
    content: Option<String>,
    image_url: Option<String>,
    reblog_of_id: Option<Uuid>,
    reblog_comment: Option<String>,
    reply_to_id: Option<Uuid>,
    tags: Vec<String>,
    created_at: String,
}

#[derive(Default)]
pub struct Db {
    accounts: Vec<Account>,
    /// Bearer tokens and session cookies, both mapping to an account.
    tokens: HashMap<String, Uuid>,
    /// Oldest first.
    posts: Vec<PostRecord>,
    /// (user, post)
    likes: HashSet<(Uuid, Uuid)>,
    /// (follower, following)
    follows: HashSet<(Uuid, Uuid)>,
}

pub type SharedDb = Arc<RwLock<Db>>;

impl Db {
    fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    fn account_mut(&mut self, id: Uuid) -> Option<&mut Account> {
        self.accounts.iter_mut().find(|a| a.id == id)
    }

    fn account_by_name(&self, username: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.username.eq_ignore_ascii_case(username))
    }

    fn post(&self, id: Uuid) -> Option<&PostRecord> {
        self.posts.iter().find(|p| p.id == id)
    }

    fn issue_token(&mut self, user_id: Uuid) -> String {
        let token = format!("mp_{}", Uuid::new_v4().simple());
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn viewer(&self, headers: &HeaderMap) -> Option<Uuid> {
        let token = bearer_token(headers).or_else(|| session_cookie(headers))?;
        self.tokens.get(&token).copied()
    }

    fn require_viewer(&self, headers: &HeaderMap) -> Result<Uuid, ApiFailure> {
        self.viewer(headers)
            .ok_or(ApiFailure(StatusCode::UNAUTHORIZED, "unauthorized"))
    }

    /// Unverified agents may read but not write.
    fn require_verified(&self, headers: &HeaderMap) -> Result<Uuid, ApiFailure> {
        let id = self.require_viewer(headers)?;
        match self.account(id) {
            Some(account) if account.verified => Ok(id),
            Some(_) => Err(ApiFailure(StatusCode::FORBIDDEN, "account not verified")),
            None => Err(ApiFailure(StatusCode::UNAUTHORIZED, "unauthorized")),
        }
    }

    fn render_user(&self, account: &Account, viewer: Option<Uuid>) -> User {
        let follower_count = self.follows.iter().filter(|(_, to)| *to == account.id).count() as u64;
        let following_count = self.follows.iter().filter(|(from, _)| *from == account.id).count() as u64;
        let post_count = self.posts.iter().filter(|p| p.user_id == account.id).count() as u64;
        User {
            id: account.id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            bio: account.bio.clone(),
            avatar_url: account.avatar_url.clone(),
            header_url: account.header_url.clone(),
            is_agent: account.is_agent,
            is_verified: account.verified,
            x_username: account.x_username.clone(),
            theme_settings: account.theme_settings.clone(),
            created_at: account.created_at.clone(),
            follower_count,
            following_count,
            post_count,
            is_following: viewer
                .filter(|v| *v != account.id)
                .map(|v| self.follows.contains(&(v, account.id))),
        }
    }

    fn render_post(&self, record: &PostRecord, viewer: Option<Uuid>) -> Post {
        let like_count = self.likes.iter().filter(|(_, post)| *post == record.id).count() as u64;
        let reblog_count = self.posts.iter().filter(|p| p.reblog_of_id == Some(record.id)).count() as u64;
        let reply_count = self.posts.iter().filter(|p| p.reply_to_id == Some(record.id)).count() as u64;
        let reblog_of = record
            .reblog_of_id
            .and_then(|id| self.post(id))
            .map(|original| Box::new(self.render_post(original, viewer)));
        Post {
            id: record.id,
            user_id: record.user_id,
            content: record.content.clone(),
            image_url: record.image_url.clone(),
            reblog_of_id: record.reblog_of_id,
            reblog_comment: record.reblog_comment.clone(),
            reply_to_id: record.reply_to_id,
            like_count,
            reblog_count,
            reply_count,
            sentiment_score: 0.0,
            sentiment_label: "neutral".to_string(),
            controversy_score: 0.0,
            created_at: record.created_at.clone(),
            updated_at: record.created_at.clone(),
            user: self.account(record.user_id).map(|a| self.render_user(a, viewer)),
            reblog_of,
            tags: record.tags.clone(),
            is_liked: viewer.is_some_and(|v| self.likes.contains(&(v, record.id))),
        }
    }

    /// Newest-first page over the posts accepted by `keep`.
    fn timeline(&self, page: &PageQuery, viewer: Option<Uuid>, keep: impl Fn(&PostRecord) -> bool) -> Timeline {
        let limit = page.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = page.offset.unwrap_or(0);
        let matching: Vec<&PostRecord> = self.posts.iter().rev().filter(|p| keep(p)).collect();
        let posts: Vec<Post> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|p| self.render_post(p, viewer))
            .collect();
        let next_offset = offset + posts.len();
        Timeline {
            has_more: next_offset < matching.len(),
            next_offset,
            posts,
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::to_string)
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| pair.trim().strip_prefix("session=").map(str::to_string))
}

fn set_session_cookie(response: &mut Response, token: &str) {
    if let Ok(value) = HeaderValue::from_str(&format!("session={token}; Path=/; HttpOnly; SameSite=Lax")) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
}

fn parse_post_id(raw: &str) -> Result<Uuid, ApiFailure> {
    raw.parse()
        .map_err(|_| ApiFailure(StatusCode::BAD_REQUEST, "invalid post id"))
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn user_not_found() -> ApiFailure {
    ApiFailure(StatusCode::NOT_FOUND, "user not found")
}

fn post_not_found() -> ApiFailure {
    ApiFailure(StatusCode::NOT_FOUND, "post not found")
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn app() -> Router {
    let db: SharedDb = Arc::new(RwLock::new(Db::default()));
    Router::new().nest("/api/v1", routes()).with_state(db)
}

fn routes() -> Router<SharedDb> {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify", post(verify))
        .route("/verify/{code}", get(check_verification))
        .route("/me", get(get_me).patch(update_me).delete(delete_me))
        .route("/me/avatar", post(upload_avatar))
        .route("/me/header", post(upload_header))
        .route("/posts", post(create_post))
        .route("/posts/{id}", get(get_post).delete(delete_post))
        .route("/posts/{id}/like", post(like_post).delete(unlike_post))
        .route("/posts/{id}/reblog", post(reblog_post))
        .route("/posts/{id}/replies", get(get_replies))
        .route("/feed", get(public_feed))
        .route("/feed/home", get(home_feed))
        .route("/feed/tag/{tag}", get(tag_feed))
        .route("/users/{username}", get(get_user))
        .route("/users/{username}/posts", get(user_posts))
        .route("/users/{username}/followers", get(followers))
        .route("/users/{username}/following", get(following))
        .route("/users/{username}/follow", post(follow).delete(unfollow))
        .route("/trending/tags", get(trending_tags))
        .route("/trending/agents", get(trending_agents))
        .route("/agents", get(agents))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Account handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn register(State(state): State<SharedDb>, Json(input): Json<RegisterInput>) -> Result<Response, ApiFailure> {
    let username = input.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiFailure(StatusCode::BAD_REQUEST, "username is required"));
    }

    let mut db = state.write().await;
    if db.account_by_name(&username).is_some() {
        return Err(ApiFailure(StatusCode::CONFLICT, "username already exists"));
    }

    let id = Uuid::new_v4();
    let verification_code = input
        .is_agent
        .then(|| format!("molt-{}", &Uuid::new_v4().simple().to_string()[..8]));
    db.accounts.push(Account {
        id,
        username,
        display_name: input.display_name,
        bio: None,
        avatar_url: None,
        header_url: None,
        is_agent: input.is_agent,
        verified: !input.is_agent,
        x_username: None,
        theme_settings: None,
        password: input.password,
        verification_code: verification_code.clone(),
        created_at: now(),
    });
    let api_key = db.issue_token(id);
    tracing::debug!(%id, is_agent = input.is_agent, "account registered");
    let session = (!input.is_agent).then(|| db.issue_token(id));

    let user = db.account(id).map(|a| db.render_user(a, None)).ok_or_else(user_not_found)?;
    let mut body = serde_json::json!({ "user": user, "api_key": api_key });
    if let Some(code) = &verification_code {
        body["verification_code"] = code.clone().into();
        body["verification_url"] = format!("https://x.com/intent/tweet?text={code}").into();
    }

    let mut response = (StatusCode::CREATED, Json(body)).into_response();
    if let Some(token) = session {
        set_session_cookie(&mut response, &token);
    }
    Ok(response)
}

async fn login(State(state): State<SharedDb>, Json(input): Json<LoginInput>) -> Result<Response, ApiFailure> {
    let mut db = state.write().await;
    let id = db
        .account_by_name(&input.username)
        .filter(|a| a.password.as_deref() == Some(input.password.as_str()))
        .map(|a| a.id)
        .ok_or(ApiFailure(StatusCode::UNAUTHORIZED, "invalid credentials"))?;
    let token = db.issue_token(id);
    let user = db.account(id).map(|a| db.render_user(a, None)).ok_or_else(user_not_found)?;

    let mut response = Json(serde_json::json!({ "user": user, "token": token })).into_response();
    set_session_cookie(&mut response, &token);
    Ok(response)
}

async fn verify(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Json(input): Json<VerifyInput>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let mut db = state.write().await;
    let id = db.require_viewer(&headers)?;
    if input.x_username.trim().is_empty() {
        return Err(ApiFailure(StatusCode::BAD_REQUEST, "x_username is required"));
    }
    let account = db.account_mut(id).ok_or_else(user_not_found)?;
    if account.verified {
        return Err(ApiFailure(StatusCode::BAD_REQUEST, "already verified"));
    }
    account.verified = true;
    account.x_username = Some(input.x_username);

    let user = db.account(id).map(|a| db.render_user(a, None)).ok_or_else(user_not_found)?;
    Ok(Json(serde_json::json!({ "user": user, "message": "verification successful" })))
}

async fn check_verification(
    State(state): State<SharedDb>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let db = state.read().await;
    let account = db
        .accounts
        .iter()
        .find(|a| a.verification_code.as_deref() == Some(code.as_str()))
        .ok_or(ApiFailure(StatusCode::NOT_FOUND, "verification code not found"))?;
    Ok(Json(serde_json::json!({
        "user": db.render_user(account, None),
        "verified": account.verified,
    })))
}

async fn get_me(State(state): State<SharedDb>, headers: HeaderMap) -> Result<Json<User>, ApiFailure> {
    let db = state.read().await;
    let id = db.require_viewer(&headers)?;
    let account = db.account(id).ok_or_else(user_not_found)?;
    Ok(Json(db.render_user(account, None)))
}

async fn update_me(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Json(input): Json<UpdateInput>,
) -> Result<Json<User>, ApiFailure> {
    let mut db = state.write().await;
    let id = db.require_verified(&headers)?;
    let account = db.account_mut(id).ok_or_else(user_not_found)?;
    if input.display_name.is_some() {
        account.display_name = input.display_name;
    }
    if input.bio.is_some() {
        account.bio = input.bio;
    }
    if input.avatar_url.is_some() {
        account.avatar_url = input.avatar_url;
    }
    if input.header_url.is_some() {
        account.header_url = input.header_url;
    }
    if input.theme_settings.is_some() {
        account.theme_settings = input.theme_settings;
    }
    let account = db.account(id).ok_or_else(user_not_found)?;
    Ok(Json(db.render_user(account, None)))
}

async fn delete_me(State(state): State<SharedDb>, headers: HeaderMap) -> Result<StatusCode, ApiFailure> {
    let mut db = state.write().await;
    let id = db.require_viewer(&headers)?;
    db.accounts.retain(|a| a.id != id);
    db.tokens.retain(|_, owner| *owner != id);
    db.posts.retain(|p| p.user_id != id);
    db.likes.retain(|(user, _)| *user != id);
    db.follows.retain(|(from, to)| *from != id && *to != id);
    Ok(StatusCode::NO_CONTENT)
}

/// Pull the named image field out of a multipart body.
async fn read_image(mut multipart: Multipart, field: &str) -> Result<(String, usize), ApiFailure> {
    let invalid_form = || ApiFailure(StatusCode::BAD_REQUEST, "invalid multipart form or file too large");
    while let Some(part) = multipart.next_field().await.map_err(|_| invalid_form())? {
        if part.name() != Some(field) {
            continue;
        }
        let extension = match part.content_type() {
            Some("image/jpeg") => "jpg",
            Some("image/png") => "png",
            Some("image/gif") => "gif",
            Some("image/webp") => "webp",
            _ => {
                return Err(ApiFailure(
                    StatusCode::BAD_REQUEST,
                    "invalid image type (allowed: jpeg, png, gif, webp)",
                ))
            }
        };
        let bytes = part.bytes().await.map_err(|_| invalid_form())?;
        return Ok((extension.to_string(), bytes.len()));
    }
    Err(ApiFailure(
        StatusCode::BAD_REQUEST,
        if field == "avatar" { "missing avatar file" } else { "missing header file" },
    ))
}

async fn upload_avatar(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<User>, ApiFailure> {
    let id = state.read().await.require_verified(&headers)?;
    let (extension, _) = read_image(multipart, "avatar").await?;

    let mut db = state.write().await;
    let account = db.account_mut(id).ok_or_else(user_not_found)?;
    account.avatar_url = Some(format!("/uploads/avatars/{id}.{extension}"));
    let account = db.account(id).ok_or_else(user_not_found)?;
    Ok(Json(db.render_user(account, None)))
}

async fn upload_header(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<User>, ApiFailure> {
    let id = state.read().await.require_verified(&headers)?;
    let (extension, _) = read_image(multipart, "header").await?;

    let mut db = state.write().await;
    let account = db.account_mut(id).ok_or_else(user_not_found)?;
    account.header_url = Some(format!("/uploads/headers/{id}.{extension}"));
    let account = db.account(id).ok_or_else(user_not_found)?;
    Ok(Json(db.render_user(account, None)))
}

// ---------------------------------------------------------------------------
// Post handlers
// ---------------------------------------------------------------------------

async fn create_post(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Json(input): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<Post>), ApiFailure> {
    let mut db = state.write().await;
    let user_id = db.require_verified(&headers)?;
    let has_content = input.content.as_deref().is_some_and(|c| !c.trim().is_empty());
    if !has_content && input.image_url.is_none() {
        return Err(ApiFailure(
            StatusCode::BAD_REQUEST,
            "post must have content, image, or be a reblog",
        ));
    }
    if let Some(parent) = input.reply_to_id {
        db.post(parent).ok_or_else(post_not_found)?;
    }

    let id = Uuid::new_v4();
    db.posts.push(PostRecord {
        id,
        user_id,
        content: input.content,
        image_url: input.image_url,
        reblog_of_id: None,
        reblog_comment: None,
        reply_to_id: input.reply_to_id,
        tags: normalize_tags(input.tags),
        created_at: now(),
    });
    let record = db.post(id).ok_or_else(post_not_found)?;
    Ok((StatusCode::CREATED, Json(db.render_post(record, Some(user_id)))))
}

async fn get_post(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Post>, ApiFailure> {
    let id = parse_post_id(&id)?;
    let db = state.read().await;
    let record = db.post(id).ok_or_else(post_not_found)?;
    Ok(Json(db.render_post(record, db.viewer(&headers))))
}

async fn delete_post(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let id = parse_post_id(&id)?;
    let mut db = state.write().await;
    let user_id = db.require_verified(&headers)?;
    let index = db
        .posts
        .iter()
        .position(|p| p.id == id && p.user_id == user_id)
        .ok_or_else(post_not_found)?;
    db.posts.remove(index);
    db.likes.retain(|(_, post)| *post != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn like_post(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let id = parse_post_id(&id)?;
    let mut db = state.write().await;
    let user_id = db.require_verified(&headers)?;
    db.post(id).ok_or_else(post_not_found)?;
    db.likes.insert((user_id, id));
    Ok(StatusCode::NO_CONTENT)
}

async fn unlike_post(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let id = parse_post_id(&id)?;
    let mut db = state.write().await;
    let user_id = db.require_verified(&headers)?;
    db.likes.remove(&(user_id, id));
    Ok(StatusCode::NO_CONTENT)
}

async fn reblog_post(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<ReblogInput>,
) -> Result<(StatusCode, Json<Post>), ApiFailure> {
    let original = parse_post_id(&id)?;
    let mut db = state.write().await;
    let user_id = db.require_verified(&headers)?;
    db.post(original).ok_or_else(post_not_found)?;

    let id = Uuid::new_v4();
    db.posts.push(PostRecord {
        id,
        user_id,
        content: None,
        image_url: None,
        reblog_of_id: Some(original),
        reblog_comment: input.comment,
        reply_to_id: None,
        tags: normalize_tags(input.tags),
        created_at: now(),
    });
    let record = db.post(id).ok_or_else(post_not_found)?;
    Ok((StatusCode::CREATED, Json(db.render_post(record, Some(user_id)))))
}

async fn get_replies(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Timeline>, ApiFailure> {
    let id = parse_post_id(&id)?;
    let db = state.read().await;
    Ok(Json(db.timeline(&page, db.viewer(&headers), |p| p.reply_to_id == Some(id))))
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches('#').to_lowercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Feed handlers
// ---------------------------------------------------------------------------

async fn public_feed(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Json<Timeline> {
    // Every mock post scores 0 for controversy, so the filter keeps the
    // newest-first order.
    let db = state.read().await;
    Json(db.timeline(&page, db.viewer(&headers), |_| true))
}

async fn home_feed(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<Json<Timeline>, ApiFailure> {
    let db = state.read().await;
    let viewer = db.require_viewer(&headers)?;
    Ok(Json(db.timeline(&page, Some(viewer), |p| {
        p.user_id == viewer || db.follows.contains(&(viewer, p.user_id))
    })))
}

async fn tag_feed(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(tag): Path<String>,
    Query(page): Query<PageQuery>,
) -> Json<Timeline> {
    let tag = tag.to_lowercase();
    let db = state.read().await;
    Json(db.timeline(&page, db.viewer(&headers), |p| p.tags.contains(&tag)))
}

// ---------------------------------------------------------------------------
// User handlers
// ---------------------------------------------------------------------------

async fn get_user(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<User>, ApiFailure> {
    let db = state.read().await;
    let account = db.account_by_name(&username).ok_or_else(user_not_found)?;
    Ok(Json(db.render_user(account, db.viewer(&headers))))
}

async fn user_posts(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Timeline>, ApiFailure> {
    let db = state.read().await;
    let id = db.account_by_name(&username).ok_or_else(user_not_found)?.id;
    Ok(Json(db.timeline(&page, db.viewer(&headers), |p| p.user_id == id)))
}

async fn followers(
    State(state): State<SharedDb>,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let db = state.read().await;
    let id = db.account_by_name(&username).ok_or_else(user_not_found)?.id;
    let users = page_users(&db, &page, |a| db.follows.contains(&(a.id, id)));
    Ok(list_body("users", &users))
}

async fn following(
    State(state): State<SharedDb>,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<serde_json::Value>, ApiFailure> {
    let db = state.read().await;
    let id = db.account_by_name(&username).ok_or_else(user_not_found)?.id;
    let users = page_users(&db, &page, |a| db.follows.contains(&(id, a.id)));
    Ok(list_body("users", &users))
}

fn page_users(db: &Db, page: &PageQuery, keep: impl Fn(&Account) -> bool) -> Vec<User> {
    db.accounts
        .iter()
        .filter(|a| keep(a))
        .skip(page.offset.unwrap_or(0))
        .take(page.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT))
        .map(|a| db.render_user(a, None))
        .collect()
}

async fn follow(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let mut db = state.write().await;
    let viewer = db.require_verified(&headers)?;
    let target = db.account_by_name(&username).ok_or_else(user_not_found)?.id;
    if target == viewer {
        return Err(ApiFailure(StatusCode::BAD_REQUEST, "cannot follow yourself"));
    }
    db.follows.insert((viewer, target));
    Ok(StatusCode::NO_CONTENT)
}

async fn unfollow(
    State(state): State<SharedDb>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    let mut db = state.write().await;
    let viewer = db.require_verified(&headers)?;
    let target = db.account_by_name(&username).ok_or_else(user_not_found)?.id;
    db.follows.remove(&(viewer, target));
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Discovery handlers
// ---------------------------------------------------------------------------

fn hot_level(score: f64) -> u8 {
    match score {
        s if s >= 12.0 => 3,
        s if s >= 6.0 => 2,
        s if s >= 3.0 => 1,
        _ => 0,
    }
}

async fn trending_tags(State(state): State<SharedDb>, Query(page): Query<PageQuery>) -> Json<serde_json::Value> {
    let limit = page.limit.unwrap_or(10).min(MAX_LIMIT);
    let db = state.read().await;

    let mut counts: HashMap<&str, u64> = HashMap::new();
    for tag in db.posts.iter().flat_map(|p| p.tags.iter()) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let tags: Vec<serde_json::Value> = ranked
        .into_iter()
        .take(limit)
        .map(|(tag, count)| {
            let hot_score = count as f64;
            serde_json::json!({
                "tag": tag,
                "count": count,
                "hot_score": hot_score,
                "hot_level": hot_level(hot_score),
            })
        })
        .collect();
    Json(serde_json::json!({ "tags": tags }))
}

async fn trending_agents(State(state): State<SharedDb>, Query(page): Query<PageQuery>) -> Json<serde_json::Value> {
    let limit = page.limit.unwrap_or(10).min(MAX_LIMIT);
    let db = state.read().await;
    let mut agents: Vec<User> = db
        .accounts
        .iter()
        .filter(|a| a.is_agent)
        .map(|a| db.render_user(a, None))
        .filter(|u| u.post_count > 0)
        .collect();
    agents.sort_by(|a, b| b.follower_count.cmp(&a.follower_count));
    agents.truncate(limit);
    list_body("agents", &agents)
}

async fn agents(State(state): State<SharedDb>, Query(page): Query<PageQuery>) -> Json<serde_json::Value> {
    let db = state.read().await;
    let agents = page_users(&db, &page, |a| a.is_agent);
    list_body("agents", &agents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer mp_123");
        assert_eq!(bearer_token(&headers).as_deref(), Some("mp_123"));
        assert!(bearer_token(&HeaderMap::new()).is_none());
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let headers = headers_with(header::COOKIE, "theme=dark; session=abc; lang=en");
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn tags_are_normalized_and_deduplicated() {
        let tags = normalize_tags(vec!["#Rust".into(), "rust".into(), " ".into(), "AI".into()]);
        assert_eq!(tags, vec!["rust".to_string(), "ai".to_string()]);
    }

    #[test]
    fn hot_level_thresholds() {
        assert_eq!(hot_level(0.0), 0);
        assert_eq!(hot_level(3.0), 1);
        assert_eq!(hot_level(6.5), 2);
        assert_eq!(hot_level(12.0), 3);
    }

    #[test]
    fn timeline_pages_newest_first() {
        let mut db = Db::default();
        let user_id = Uuid::new_v4();
        for n in 0..3 {
            db.posts.push(PostRecord {
                id: Uuid::new_v4(),
                user_id,
                content: Some(format!("post {n}")),
                image_url: None,
                reblog_of_id: None,
                reblog_comment: None,
                reply_to_id: None,
                tags: Vec::new(),
                created_at: now(),
            });
        }
        let page = PageQuery {
            limit: Some(2),
            offset: Some(0),
            filter: None,
        };
        let first = db.timeline(&page, None, |_| true);
        assert_eq!(first.posts[0].content.as_deref(), Some("post 2"));
        assert_eq!(first.next_offset, 2);
        assert!(first.has_more);

        let rest = db.timeline(
            &PageQuery {
                offset: Some(2),
                ..page
            },
            None,
            |_| true,
        );
        assert_eq!(rest.posts.len(), 1);
        assert!(!rest.has_more);
    }
}
