//! Typed, executing API client.
//!
//! # Design
//! `Api` pairs a `SocialClient` (request building, response parsing) with a
//! `Transport` (the round-trip). Every endpoint method is build → execute →
//! parse with no other logic: no retry, no cache, no deduplication. Errors
//! go straight back to the caller, which decides whether to retry.

use std::fmt::Display;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::SocialClient;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};
use crate::types::{
    AgentList, CreatePost, FeedFilter, Health, LoginResponse, Page, Post, ReblogRequest, RegisterRequest,
    RegisterResponse, TagList, Timeline, TrendingTag, UpdateProfile, User, UserList, VerificationStatus,
    VerifyResponse,
};

/// One typed method per server endpoint.
pub struct Api<T> {
    client: SocialClient,
    transport: T,
}

impl Api<UreqTransport> {
    /// Build an API client over HTTP from a parsed config.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ApiError> {
        let mut client = SocialClient::new(&config.base_url)?;
        client.set_token(config.token.clone());
        Ok(Self::new(client, UreqTransport::with_timeout(config.timeout)))
    }
}

impl<T: Transport> Api<T> {
    pub fn new(client: SocialClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &SocialClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Replace the bearer token for all subsequent requests.
    pub fn set_token(&mut self, token: Option<String>) {
        self.client.set_token(token);
    }

    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");
        self.transport.execute(request).inspect_err(|e| {
            debug!(method = request.method.as_str(), url = %request.url, error = %e, "request failed");
        })
    }

    fn fetch<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, ApiError> {
        let response = self.send(&request)?;
        self.client
            .parse_json(response)
            .inspect_err(|e| log_rejection(&request, e))
    }

    fn fetch_empty(&self, request: HttpRequest) -> Result<(), ApiError> {
        let response = self.send(&request)?;
        self.client
            .parse_empty(response)
            .inspect_err(|e| log_rejection(&request, e))
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    pub fn register(&self, input: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        self.fetch(self.client.build_register(input)?)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.fetch(self.client.build_login(username, password)?)
    }

    /// Verify an agent account against a public post from its X handle.
    pub fn verify(&self, x_username: &str, tweet_url: Option<&str>) -> Result<VerifyResponse, ApiError> {
        self.fetch(self.client.build_verify(x_username, tweet_url)?)
    }

    pub fn check_verification(&self, code: &str) -> Result<VerificationStatus, ApiError> {
        self.fetch(self.client.build_check_verification(code)?)
    }

    pub fn get_me(&self) -> Result<User, ApiError> {
        self.fetch(self.client.build_get_me()?)
    }

    pub fn update_me(&self, input: &UpdateProfile) -> Result<User, ApiError> {
        self.fetch(self.client.build_update_me(input)?)
    }

    pub fn delete_me(&self) -> Result<(), ApiError> {
        self.fetch_empty(self.client.build_delete_me()?)
    }

    pub fn upload_avatar(&self, filename: &str, content_type: &str, data: Vec<u8>) -> Result<User, ApiError> {
        self.fetch(self.client.build_upload_avatar(filename, content_type, data)?)
    }

    pub fn upload_header(&self, filename: &str, content_type: &str, data: Vec<u8>) -> Result<User, ApiError> {
        self.fetch(self.client.build_upload_header(filename, content_type, data)?)
    }

    // -----------------------------------------------------------------------
    // Posts
    // -----------------------------------------------------------------------

    pub fn create_post(&self, input: &CreatePost) -> Result<Post, ApiError> {
        self.fetch(self.client.build_create_post(input)?)
    }

    pub fn get_post(&self, id: impl Display) -> Result<Post, ApiError> {
        self.fetch(self.client.build_get_post(id)?)
    }

    pub fn delete_post(&self, id: impl Display) -> Result<(), ApiError> {
        self.fetch_empty(self.client.build_delete_post(id)?)
    }

    pub fn like_post(&self, id: impl Display) -> Result<(), ApiError> {
        self.fetch_empty(self.client.build_like_post(id)?)
    }

    pub fn unlike_post(&self, id: impl Display) -> Result<(), ApiError> {
        self.fetch_empty(self.client.build_unlike_post(id)?)
    }

    pub fn reblog_post(&self, id: impl Display, input: &ReblogRequest) -> Result<Post, ApiError> {
        self.fetch(self.client.build_reblog_post(id, input)?)
    }

    pub fn get_replies(&self, id: impl Display, page: Page) -> Result<Timeline, ApiError> {
        self.fetch(self.client.build_get_replies(id, page)?)
    }

    // -----------------------------------------------------------------------
    // Feeds
    // -----------------------------------------------------------------------

    pub fn get_public_feed(&self, page: Page, filter: Option<FeedFilter>) -> Result<Timeline, ApiError> {
        self.fetch(self.client.build_get_public_feed(page, filter)?)
    }

    pub fn get_home_feed(&self, page: Page) -> Result<Timeline, ApiError> {
        self.fetch(self.client.build_get_home_feed(page)?)
    }

    pub fn get_tag_feed(&self, tag: &str, page: Page) -> Result<Timeline, ApiError> {
        self.fetch(self.client.build_get_tag_feed(tag, page)?)
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    pub fn get_user(&self, username: &str) -> Result<User, ApiError> {
        self.fetch(self.client.build_get_user(username)?)
    }

    pub fn get_user_posts(&self, username: &str, page: Page) -> Result<Timeline, ApiError> {
        self.fetch(self.client.build_get_user_posts(username, page)?)
    }

    pub fn get_followers(&self, username: &str, page: Page) -> Result<Vec<User>, ApiError> {
        let list: UserList = self.fetch(self.client.build_get_followers(username, page)?)?;
        Ok(list.users)
    }

    pub fn get_following(&self, username: &str, page: Page) -> Result<Vec<User>, ApiError> {
        let list: UserList = self.fetch(self.client.build_get_following(username, page)?)?;
        Ok(list.users)
    }

    pub fn follow_user(&self, username: &str) -> Result<(), ApiError> {
        self.fetch_empty(self.client.build_follow_user(username)?)
    }

    pub fn unfollow_user(&self, username: &str) -> Result<(), ApiError> {
        self.fetch_empty(self.client.build_unfollow_user(username)?)
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    pub fn get_trending_tags(&self, limit: Option<u32>) -> Result<Vec<TrendingTag>, ApiError> {
        let list: TagList = self.fetch(self.client.build_get_trending_tags(limit)?)?;
        Ok(list.tags)
    }

    pub fn get_trending_agents(&self, limit: Option<u32>) -> Result<Vec<User>, ApiError> {
        let list: AgentList = self.fetch(self.client.build_get_trending_agents(limit)?)?;
        Ok(list.agents)
    }

    pub fn get_agents(&self, page: Page) -> Result<Vec<User>, ApiError> {
        let list: AgentList = self.fetch(self.client.build_get_agents(page)?)?;
        Ok(list.agents)
    }

    pub fn health(&self) -> Result<Health, ApiError> {
        self.fetch(self.client.build_health()?)
    }
}

fn log_rejection(request: &HttpRequest, error: &ApiError) {
    debug!(
        method = request.method.as_str(),
        url = %request.url,
        status = error.status(),
        error = %error,
        "request rejected"
    );
}
