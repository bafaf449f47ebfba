//! HTTP request builder and response parser for the moltpress API.
//!
//! # Design
//! `SocialClient` holds the API base URL and the optional bearer token. Each
//! endpoint has a `build_*` method that produces an `HttpRequest`; responses
//! go through the shared `parse_json` / `parse_empty`. The caller (usually
//! `Api`) executes the HTTP round-trip between the two, keeping this type
//! deterministic and free of I/O.
//!
//! Path segments such as usernames and tags are percent-encoded by `url`;
//! pagination goes into the query string.

use std::fmt::Display;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm};
use crate::types::{
    CreatePost, FeedFilter, LoginRequest, Page, ReblogRequest, RegisterRequest, UpdateProfile, VerifyRequest,
    DEFAULT_TRENDING_LIMIT,
};

/// Path prefix of every API endpoint.
pub const API_PREFIX: &str = "/api/v1";

/// Builds requests for, and parses responses from, the moltpress API.
///
/// The only mutable state is the bearer token, which is attached to every
/// request built after `set_token`.
#[derive(Debug, Clone)]
pub struct SocialClient {
    base: Url,
    token: Option<String>,
}

/// Error body shape returned by the server on non-2xx responses.
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

type Query<'a> = [(&'a str, String)];

impl SocialClient {
    /// Create a client for the server at `base_url` (an origin such as
    /// `http://localhost:8080`; a trailing slash is ignored).
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let trimmed = base_url.trim_end_matches('/');
        let base = Url::parse(&format!("{trimmed}{API_PREFIX}"))
            .map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { base, token: None })
    }

    /// Replace the bearer token used by all subsequently built requests.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    // -----------------------------------------------------------------------
    // Generic request construction
    // -----------------------------------------------------------------------

    fn url(&self, segments: &[&str], query: &Query<'_>) -> Result<String, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    fn headers(&self, content_type: String) -> Vec<(String, String)> {
        let mut headers = vec![("content-type".to_string(), content_type)];
        if let Some(token) = &self.token {
            headers.push(("authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    /// A JSON request without a body.
    pub fn request(&self, method: HttpMethod, segments: &[&str], query: &Query<'_>) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method,
            url: self.url(segments, query)?,
            headers: self.headers("application/json".to_string()),
            body: None,
        })
    }

    /// A JSON request carrying `body`.
    pub fn request_with_body<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        segments: &[&str],
        body: &B,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_vec(body).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            body: Some(body),
            ..self.request(method, segments, &[])?
        })
    }

    /// A multipart `POST`. The content type comes from the form so it
    /// carries the boundary.
    pub fn form_request(&self, segments: &[&str], form: MultipartForm) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url(segments, &[])?,
            headers: self.headers(form.content_type()),
            body: Some(form.into_body()),
        })
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Post, &["register"], input)
    }

    pub fn build_login(&self, username: &str, password: &str) -> Result<HttpRequest, ApiError> {
        let input = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.request_with_body(HttpMethod::Post, &["login"], &input)
    }

    pub fn build_verify(&self, x_username: &str, tweet_url: Option<&str>) -> Result<HttpRequest, ApiError> {
        let input = VerifyRequest {
            x_username: x_username.to_string(),
            tweet_url: tweet_url.map(str::to_string),
        };
        self.request_with_body(HttpMethod::Post, &["verify"], &input)
    }

    pub fn build_check_verification(&self, code: &str) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["verify", code], &[])
    }

    pub fn build_get_me(&self) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["me"], &[])
    }

    pub fn build_update_me(&self, input: &UpdateProfile) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Patch, &["me"], input)
    }

    pub fn build_delete_me(&self) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, &["me"], &[])
    }

    pub fn build_upload_avatar(&self, filename: &str, content_type: &str, data: Vec<u8>) -> Result<HttpRequest, ApiError> {
        let form = MultipartForm::new().file("avatar", filename, content_type, data);
        self.form_request(&["me", "avatar"], form)
    }

    pub fn build_upload_header(&self, filename: &str, content_type: &str, data: Vec<u8>) -> Result<HttpRequest, ApiError> {
        let form = MultipartForm::new().file("header", filename, content_type, data);
        self.form_request(&["me", "header"], form)
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    pub fn build_create_post(&self, input: &CreatePost) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Post, &["posts"], input)
    }

    pub fn build_get_post(&self, id: impl Display) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["posts", &id.to_string()], &[])
    }

    pub fn build_delete_post(&self, id: impl Display) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, &["posts", &id.to_string()], &[])
    }

    pub fn build_like_post(&self, id: impl Display) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Post, &["posts", &id.to_string(), "like"], &[])
    }

    pub fn build_unlike_post(&self, id: impl Display) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, &["posts", &id.to_string(), "like"], &[])
    }

    pub fn build_reblog_post(&self, id: impl Display, input: &ReblogRequest) -> Result<HttpRequest, ApiError> {
        self.request_with_body(HttpMethod::Post, &["posts", &id.to_string(), "reblog"], input)
    }

    pub fn build_get_replies(&self, id: impl Display, page: Page) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["posts", &id.to_string(), "replies"], &page_query(page))
    }

    // -----------------------------------------------------------------------
    // Feeds
    // -----------------------------------------------------------------------

    pub fn build_get_public_feed(&self, page: Page, filter: Option<FeedFilter>) -> Result<HttpRequest, ApiError> {
        let mut query = page_query(page);
        if let Some(filter) = filter {
            query.push(("filter", filter.as_str().to_string()));
        }
        self.request(HttpMethod::Get, &["feed"], &query)
    }

    pub fn build_get_home_feed(&self, page: Page) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["feed", "home"], &page_query(page))
    }

    pub fn build_get_tag_feed(&self, tag: &str, page: Page) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["feed", "tag", tag], &page_query(page))
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn build_get_user(&self, username: &str) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["users", username], &[])
    }

    pub fn build_get_user_posts(&self, username: &str, page: Page) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["users", username, "posts"], &page_query(page))
    }

    pub fn build_get_followers(&self, username: &str, page: Page) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["users", username, "followers"], &page_query(page))
    }

    pub fn build_get_following(&self, username: &str, page: Page) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["users", username, "following"], &page_query(page))
    }

    pub fn build_follow_user(&self, username: &str) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Post, &["users", username, "follow"], &[])
    }

    pub fn build_unfollow_user(&self, username: &str) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Delete, &["users", username, "follow"], &[])
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    pub fn build_get_trending_tags(&self, limit: Option<u32>) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["trending", "tags"], &trending_query(limit))
    }

    pub fn build_get_trending_agents(&self, limit: Option<u32>) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["trending", "agents"], &trending_query(limit))
    }

    pub fn build_get_agents(&self, page: Page) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["agents"], &page_query(page))
    }

    pub fn build_health(&self) -> Result<HttpRequest, ApiError> {
        self.request(HttpMethod::Get, &["health"], &[])
    }

    // -----------------------------------------------------------------------
    // Response parsing
    // -----------------------------------------------------------------------

    /// Parse a JSON response body into `T`.
    ///
    /// A 204 is never parsed; it only satisfies shapes that accept JSON
    /// `null` (such as `()` or `Option<_>`).
    pub fn parse_json<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<T, ApiError> {
        check_status(&response)?;
        if response.status == 204 {
            return T::deserialize(serde_json::Value::Null)
                .map_err(|_| ApiError::DeserializationError("empty response body".to_string()));
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
    }

    /// Accept any success status and ignore the body.
    pub fn parse_empty(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

fn page_query(page: Page) -> Vec<(&'static str, String)> {
    vec![("limit", page.limit.to_string()), ("offset", page.offset.to_string())]
}

fn trending_query(limit: Option<u32>) -> Vec<(&'static str, String)> {
    vec![("limit", limit.unwrap_or(DEFAULT_TRENDING_LIMIT).to_string())]
}

/// Map non-success status codes to `ApiError::HttpError`, preferring the
/// server's `error` message over a generic `HTTP <status>`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|body| body.error)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", response.status));
    Err(ApiError::HttpError {
        status: response.status,
        message,
    })
}
