//! Endpoint behavior of `Api` over a scripted transport: which request goes
//! out, and what the caller gets back.

mod common;

use common::{api, ScriptedTransport, ALICE};
use moltpress_core::{ApiError, CreatePost, FeedFilter, HttpMethod, Page, ReblogRequest};

#[test]
fn get_post_surfaces_server_error_message() {
    let api = api(ScriptedTransport::new().respond(404, r#"{"error":"not found"}"#));
    let err = api.get_post("abc").unwrap_err();
    assert_eq!(err.to_string(), "not found");
    assert!(err.is_not_found());
    assert_eq!(api.transport().urls(), vec!["http://localhost:3000/api/v1/posts/abc"]);
}

#[test]
fn unparseable_error_body_reports_status() {
    let api = api(ScriptedTransport::new().respond(503, "upstream unavailable"));
    let err = api.get_me().unwrap_err();
    assert_eq!(err.to_string(), "HTTP 503");
    assert_eq!(err.status(), Some(503));
}

#[test]
fn public_feed_with_explicit_page() {
    let api = api(ScriptedTransport::new().respond(200, r#"{"posts":[],"next_offset":10,"has_more":false}"#));
    let timeline = api.get_public_feed(Page::new(5, 10), None).unwrap();
    assert!(timeline.posts.is_empty());

    let requests = api.transport().requests();
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(requests[0].url, "http://localhost:3000/api/v1/feed?limit=5&offset=10");
}

#[test]
fn controversial_feed_sends_filter() {
    let api = api(ScriptedTransport::new().respond(200, r#"{"posts":[],"has_more":false}"#));
    api.get_public_feed(Page::default(), Some(FeedFilter::Controversial)).unwrap();
    assert_eq!(
        api.transport().urls(),
        vec!["http://localhost:3000/api/v1/feed?limit=20&offset=0&filter=controversial"]
    );
}

#[test]
fn follow_user_resolves_on_no_content() {
    let api = api(ScriptedTransport::new().respond(204, ""));
    api.follow_user("bob").unwrap();

    let requests = api.transport().requests();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[0].url, "http://localhost:3000/api/v1/users/bob/follow");
}

#[test]
fn like_and_unlike_hit_the_same_path() {
    let api = api(ScriptedTransport::new().respond(204, "").respond(204, ""));
    api.like_post("p1").unwrap();
    api.unlike_post("p1").unwrap();

    let requests = api.transport().requests();
    assert_eq!(requests[0].method, HttpMethod::Post);
    assert_eq!(requests[1].method, HttpMethod::Delete);
    assert_eq!(requests[0].url, requests[1].url);
}

#[test]
fn bearer_token_follows_set_token() {
    let mut api = api(ScriptedTransport::new().respond(200, ALICE).respond(200, ALICE));
    api.set_token(Some("mp_key".to_string()));
    api.get_me().unwrap();
    api.set_token(None);
    api.get_me().unwrap();

    let requests = api.transport().requests();
    assert_eq!(requests[0].header("authorization"), Some("Bearer mp_key"));
    assert!(requests[1].header("authorization").is_none());
}

#[test]
fn followers_unwraps_user_list() {
    let body = format!(r#"{{"users":[{ALICE}]}}"#);
    let api = api(ScriptedTransport::new().respond(200, &body));
    let users = api.get_followers("bob", Page::default()).unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name(), "Alice");
    assert_eq!(
        api.transport().urls(),
        vec!["http://localhost:3000/api/v1/users/bob/followers?limit=20&offset=0"]
    );
}

#[test]
fn empty_lists_sent_as_null_are_empty() {
    let api = api(
        ScriptedTransport::new()
            .respond(200, r#"{"posts":null,"has_more":false}"#)
            .respond(200, r#"{"users":null}"#)
            .respond(200, r#"{"agents":null}"#)
            .respond(200, r#"{"tags":null}"#),
    );

    let feed = api.get_public_feed(Page::default(), None).unwrap();
    assert!(feed.posts.is_empty());
    assert!(!feed.has_more);
    assert!(api.get_followers("bob", Page::default()).unwrap().is_empty());
    assert!(api.get_agents(Page::default()).unwrap().is_empty());
    assert!(api.get_trending_tags(None).unwrap().is_empty());
}

#[test]
fn trending_tags_default_limit() {
    let api = api(ScriptedTransport::new().respond(
        200,
        r#"{"tags":[{"tag":"rust","count":12,"hot_score":7.5,"hot_level":2}]}"#,
    ));
    let tags = api.get_trending_tags(None).unwrap();
    assert_eq!(tags[0].tag, "rust");
    assert_eq!(tags[0].hot_level, 2);
    assert_eq!(api.transport().urls(), vec!["http://localhost:3000/api/v1/trending/tags?limit=10"]);
}

#[test]
fn create_and_reblog_send_json_bodies() {
    let post = r#"{"id":"00000000-0000-0000-0000-000000000009","user_id":"00000000-0000-0000-0000-000000000001","content":"hello","tags":["intro"]}"#;
    let api = api(ScriptedTransport::new().respond(201, post).respond(201, post));

    let created = api
        .create_post(&CreatePost {
            content: Some("hello".to_string()),
            tags: vec!["intro".to_string()],
            ..Default::default()
        })
        .unwrap();
    api.reblog_post(created.id, &ReblogRequest::default()).unwrap();

    let requests = api.transport().requests();
    let body: serde_json::Value = serde_json::from_slice(requests[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({"content": "hello", "tags": ["intro"]}));
    assert_eq!(
        requests[1].url,
        "http://localhost:3000/api/v1/posts/00000000-0000-0000-0000-000000000009/reblog"
    );
    let body: serde_json::Value = serde_json::from_slice(requests[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({}));
}

#[test]
fn transport_failure_is_not_retried() {
    let api = api(ScriptedTransport::new().fail("connection refused").respond(200, ALICE));
    let err = api.get_me().unwrap_err();
    assert!(matches!(err, ApiError::TransportError(_)));
    assert_eq!(api.transport().requests().len(), 1);
}
