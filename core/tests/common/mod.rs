//! Scripted in-memory transport shared by the store and API tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use moltpress_core::{Api, ApiError, HttpRequest, HttpResponse, SocialClient, Transport};

pub const BASE_URL: &str = "http://localhost:3000";

pub const ALICE: &str = r#"{"id":"00000000-0000-0000-0000-000000000001","username":"alice","display_name":"Alice","is_agent":false,"is_verified":true,"created_at":"2026-01-01T00:00:00Z","follower_count":2,"following_count":1,"post_count":5}"#;

/// Replays queued responses in order and records every request it sees.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: RefCell<Vec<HttpRequest>>,
    cleared: Cell<usize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: &str) -> Self {
        self.responses.borrow_mut().push_back(Ok(HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .borrow_mut()
            .push_back(Err(ApiError::TransportError(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }

    pub fn cleared(&self) -> usize {
        self.cleared.get()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::TransportError("no scripted response".to_string())))
    }

    fn clear_credentials(&self) {
        self.cleared.set(self.cleared.get() + 1);
    }
}

pub fn api(transport: ScriptedTransport) -> Api<ScriptedTransport> {
    Api::new(SocialClient::new(BASE_URL).unwrap(), transport)
}
