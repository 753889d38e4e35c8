//! HTTP directory client tests against a mock directory server.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use stratus_directory::{
    DirectoryClient, DirectoryConfig, DirectoryError, HttpDirectoryClient, MemberType,
};
use wiremock::matchers::{bearer_token, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

fn client_for(server: &MockServer) -> HttpDirectoryClient {
    HttpDirectoryClient::new(DirectoryConfig::new("test-token").with_base_url(server.uri()))
        .unwrap()
        .with_initial_retry_delay(Duration::from_millis(1))
}

fn user(id: &str, email: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "primaryEmail": email,
        "name": {"fullName": name},
        "suspended": false
    })
}

/// Serves the given pages in order.
struct PagedResponder {
    pages: Vec<serde_json::Value>,
    calls: Arc<AtomicU32>,
}

impl Respond for PagedResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        match self.pages.get(idx) {
            Some(page) => ResponseTemplate::new(200).set_body_json(page.clone()),
            None => ResponseTemplate::new(200).set_body_json(json!({})),
        }
    }
}

#[tokio::test]
async fn test_list_users_follows_page_tokens() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicU32::new(0));

    Mock::given(method("GET"))
        .and(path("/admin/directory/v1/users"))
        .and(query_param("domain", "example.com"))
        .and(query_param("showDeleted", "false"))
        .and(query_param("query", "isSuspended=false"))
        .and(bearer_token("test-token"))
        .respond_with(PagedResponder {
            pages: vec![
                json!({
                    "users": [user("1", "Alice@Example.com", "Alice"), user("2", "bob@example.com", "Bob")],
                    "nextPageToken": "page-2"
                }),
                json!({
                    "users": [user("3", "carol@example.com", "Carol")]
                }),
            ],
            calls: Arc::clone(&calls),
        })
        .expect(2)
        .mount(&server)
        .await;

    let users = client_for(&server).list_users("example.com").await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let emails: Vec<&str> = users.iter().map(|u| u.primary_email.as_str()).collect();
    assert_eq!(emails, vec!["alice@example.com", "bob@example.com", "carol@example.com"]);
    assert_eq!(users[0].external_id, "1");
    assert_eq!(users[0].full_name, "Alice");
}

#[tokio::test]
async fn test_list_users_drops_suspended_users() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/directory/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [
                user("1", "active@example.com", "Active"),
                {"id": "2", "primaryEmail": "gone@example.com", "name": {"fullName": "Gone"}, "suspended": true}
            ]
        })))
        .mount(&server)
        .await;

    let users = client_for(&server).list_users("example.com").await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].primary_email, "active@example.com");
}

#[tokio::test]
async fn test_list_group_members_includes_derived_membership() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/admin/directory/v1/groups/console-admins%40example.com/members",
        ))
        .and(query_param("includeDerivedMembership", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                {"id": "1", "email": "alice@example.com", "type": "USER", "status": "ACTIVE"},
                {"id": "9", "email": "nested@example.com", "type": "GROUP", "status": "ACTIVE"}
            ]
        })))
        .mount(&server)
        .await;

    let members = client_for(&server)
        .list_group_members("console-admins@example.com")
        .await
        .unwrap();

    assert_eq!(members.len(), 2);
    assert!(members[0].is_active_user());
    assert_eq!(members[1].member_type, MemberType::Group);
}

#[tokio::test]
async fn test_missing_group_is_group_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(
            "/admin/directory/v1/groups/console-admins%40example.com/members",
        ))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Resource Not Found: groupKey"}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_group_members("console-admins@example.com")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(matches!(
        err,
        DirectoryError::GroupNotFound { ref group_key } if group_key == "console-admins@example.com"
    ));
}

#[tokio::test]
async fn test_not_found_on_later_member_page_is_not_group_not_found() {
    let server = MockServer::start().await;
    let members_path = "/admin/directory/v1/groups/console-admins%40example.com/members";

    Mock::given(method("GET"))
        .and(path(members_path))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": [
                {"id": "1", "email": "alice@example.com", "type": "USER", "status": "ACTIVE"}
            ],
            "nextPageToken": "page-2"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(members_path))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Page token expired"}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .list_group_members("console-admins@example.com")
        .await
        .unwrap_err();

    assert!(!err.is_not_found());
    assert!(matches!(
        err,
        DirectoryError::Api { status: 404, ref message } if message == "Page token expired"
    ));
}

#[tokio::test]
async fn test_missing_users_endpoint_is_a_plain_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/directory/v1/users"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;

    let err = client_for(&server).list_users("example.com").await.unwrap_err();

    assert!(!err.is_not_found());
    assert!(matches!(err, DirectoryError::Api { status: 404, .. }));
}

#[tokio::test]
async fn test_unauthorized_maps_to_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/directory/v1/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).list_users("example.com").await.unwrap_err();

    assert!(matches!(err, DirectoryError::Auth(ref m) if m == "Invalid Credentials"));
}

/// Fails with 503 a fixed number of times, then succeeds.
struct FlakyResponder {
    failures: u32,
    calls: Arc<AtomicU32>,
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            ResponseTemplate::new(503)
        } else {
            ResponseTemplate::new(200).set_body_json(json!({
                "users": [user("1", "alice@example.com", "Alice")]
            }))
        }
    }
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicU32::new(0));

    Mock::given(method("GET"))
        .and(path("/admin/directory/v1/users"))
        .respond_with(FlakyResponder {
            failures: 2,
            calls: Arc::clone(&calls),
        })
        .mount(&server)
        .await;

    let users = client_for(&server).list_users("example.com").await.unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/directory/v1/users"))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let err = client_for(&server).list_users("example.com").await.unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(err, DirectoryError::Api { status: 503, .. }));
}
