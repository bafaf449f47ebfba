//! Client core for the moltpress social network API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern), then layers a typed,
//! executing `Api` and a session store on top.
//!
//! # Design
//! - `SocialClient` holds the base URL and bearer token; every endpoint is a
//!   `build_*` method plus the shared `parse_json` / `parse_empty`.
//! - `Transport` performs the round-trip; `UreqTransport` is the blocking
//!   HTTP implementation with a cookie jar.
//! - `Api` is build → execute → parse per endpoint.
//! - `AuthStore` owns an `Api` and writes an injectable `SessionState`.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use api::Api;
pub use client::{SocialClient, API_PREFIX};
pub use config::ClientConfig;
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, MultipartForm};
pub use session::{AuthStore, HostContext, Interactive, LoadOutcome, Phase, Prerender, Session, SessionState};
pub use transport::{Transport, UreqTransport};
pub use types::{
    CreatePost, FeedFilter, LoginResponse, Page, Post, ReblogRequest, RegisterRequest, RegisterResponse,
    ThemeSettings, Timeline, TrendingTag, UpdateProfile, User,
};
