//! Integration tests for Connection over the real HTTP transport, against a
//! mock CouchDB server

use std::sync::Arc;
use std::time::Duration;

use couchctl_core::{
    AuthMode, Connection, CouchError, Ensured, HttpCommunication, Removal, User,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `admin:secret`, base64
const ADMIN_BASIC: &str = "Basic YWRtaW46c2VjcmV0";

fn transport(server: &MockServer, mode: AuthMode) -> Arc<HttpCommunication> {
    Arc::new(
        HttpCommunication::builder()
            .base_url(server.uri())
            .user(User::new("admin", "secret"))
            .auth_mode(mode)
            .build()
            .unwrap(),
    )
}

fn connect(server: &MockServer, mode: AuthMode) -> Connection {
    Connection::with_communication(transport(server, mode))
}

// ============================================================================
// Version negotiation
// ============================================================================

#[tokio::test]
async fn test_version_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "couchdb": "Welcome",
            "version": "3.3.3",
            "vendor": {"name": "The Apache Software Foundation"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::None);
    assert_eq!(conn.get_couchdb_version().await.unwrap(), "3.3.3");
    assert_eq!(conn.get_major_version().await.unwrap(), 3);
    assert!(conn.get_supports_clusters().await.unwrap());
}

#[tokio::test]
async fn test_node_upgrade_on_cluster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "2.3.1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_membership"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "all_nodes": ["couchdb@127.0.0.1"],
            "cluster_nodes": ["couchdb@127.0.0.1"]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_node/couchdb%40127.0.0.1/_config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"chttpd": {"port": "5984"}})),
        )
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::None);
    let node = conn.upgrade_to_node_connection(5986).await.unwrap().unwrap();

    assert_eq!(node.name(), "couchdb@127.0.0.1");
    assert_eq!(node.config().await.unwrap()["chttpd"]["port"], "5984");
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_basic_mode_sends_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_all_dbs"))
        .and(header("authorization", ADMIN_BASIC))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["_users", "reports"])))
        .expect(1)
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);
    assert_eq!(conn.list_db_names().await.unwrap(), vec!["reports"]);
}

#[tokio::test]
async fn test_none_mode_sends_no_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_all_dbs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::None);
    assert!(conn.list_all_db_names().await.unwrap().is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    assert!(requests[0].headers.get("cookie").is_none());
}

#[tokio::test]
async fn test_basic_login_opens_and_closes_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_session"))
        .and(header("authorization", ADMIN_BASIC))
        .and(body_json(json!({"name": "admin", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AuthSession=abc123; Version=1; Path=/; HttpOnly")
                .set_body_json(json!({"ok": true, "name": "admin", "roles": ["_admin"]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_session"))
        .and(header("cookie", "AuthSession=abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AuthSession=; Version=1; Path=/; HttpOnly")
                .set_body_json(json!({"ok": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let http = transport(&server, AuthMode::Basic);
    let conn = Connection::with_communication(http.clone());

    conn.login().await.unwrap();

    assert_eq!(conn.auth_mode(), AuthMode::Basic);
    assert!(!http.has_session_cookie());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cookie_session_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_session"))
        .and(header("authorization", ADMIN_BASIC))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AuthSession=abc123; Version=1; Path=/; HttpOnly")
                .set_body_json(json!({"ok": true, "name": "admin", "roles": ["_admin"]})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_session"))
        .and(header("cookie", "AuthSession=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "userCtx": {"name": "admin", "roles": ["_admin"]},
            "info": {"authenticated": "cookie"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/_session"))
        .and(header("cookie", "AuthSession=abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AuthSession=; Version=1; Path=/; HttpOnly")
                .set_body_json(json!({"ok": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let http = transport(&server, AuthMode::Cookie);
    let conn = Connection::with_communication(http.clone());

    conn.login().await.unwrap();
    assert!(http.has_session_cookie());

    let info = conn.get_login_info().await.unwrap().unwrap();
    assert_eq!(info["info"]["authenticated"], "cookie");

    conn.logout().await.unwrap();
    assert!(!http.has_session_cookie());
    assert_eq!(conn.auth_mode(), AuthMode::Cookie);
}

#[tokio::test]
async fn test_rejected_login_keeps_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_session"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "unauthorized",
            "reason": "Name or password is incorrect."
        })))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Cookie);
    let err = conn.login().await.unwrap_err();

    assert!(err.is_unauthorized());
    assert!(err.to_string().contains("Name or password is incorrect."));
    assert_eq!(conn.auth_mode(), AuthMode::Cookie);
}

// ============================================================================
// Status mapping
// ============================================================================

#[tokio::test]
async fn test_missing_database_is_content_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::None);

    let err = conn.get_db("missing").await.unwrap_err();
    assert!(matches!(err, CouchError::ContentNotFound { ref path } if path == "/missing"));
    assert!(!conn.db_exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_forbidden_and_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_users/_all_docs"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "forbidden",
            "reason": "Only admins can access _all_docs of system databases."
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_active_tasks"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);

    let err = conn.list_user_names().await.unwrap_err();
    assert!(matches!(err, CouchError::Forbidden { .. }));
    assert!(err.is_unauthorized());

    let err = conn.get_active_tasks().await.unwrap_err();
    assert!(matches!(err, CouchError::Server { status: 503, .. }));
}

#[tokio::test]
async fn test_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"version": "3.3.3"}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::None);
    conn.set_timeout(Some(Duration::from_millis(100)));

    let err = conn.get_couchdb_info().await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

// ============================================================================
// Database lifecycle
// ============================================================================

#[tokio::test]
async fn test_create_existing_database_is_not_creatable() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(412).set_body_json(json!({
            "error": "file_exists",
            "reason": "The database could not be created, the file already exists."
        })))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);

    match conn.create_db("reports").await.unwrap_err() {
        CouchError::DatabaseNotCreatable { reason } => assert_eq!(
            reason.as_deref(),
            Some("The database could not be created, the file already exists.")
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_database_names_are_percent_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/a%2Fb"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);
    let db = conn.create_db("a/b").await.unwrap();

    assert_eq!(db.name(), "a/b");
    assert_eq!(db.path(), "/a%2Fb");
}

#[tokio::test]
async fn test_ensure_db_exists_creates_missing_database() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);
    let ensured = conn.ensure_db_exists("reports").await.unwrap();

    assert!(matches!(ensured, Ensured::Created(ref db) if db.name() == "reports"));
}

#[tokio::test]
async fn test_ensure_db_is_deleted_tolerates_missing_database() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "not_found",
            "reason": "Database does not exist."
        })))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);

    assert_eq!(conn.ensure_db_is_deleted("old").await.unwrap(), Removal::Deleted);
    assert_eq!(
        conn.ensure_db_is_deleted("gone").await.unwrap(),
        Removal::AlreadyAbsent
    );
}

// ============================================================================
// Users and utilities
// ============================================================================

#[tokio::test]
async fn test_create_and_list_users() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/_users/org.couchdb.user:alice"))
        .and(body_json(json!({
            "name": "alice",
            "password": "wonderland",
            "roles": ["reader"],
            "type": "user"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ok": true,
            "id": "org.couchdb.user:alice",
            "rev": "1-abc"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_users/_all_docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_rows": 2,
            "offset": 0,
            "rows": [
                {"id": "_design/_auth", "key": "_design/_auth", "value": {"rev": "1-x"}},
                {"id": "org.couchdb.user:alice", "key": "org.couchdb.user:alice", "value": {"rev": "1-abc"}}
            ]
        })))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);
    let roles = vec!["reader".to_string()];

    let reply = conn
        .create_user("alice", "wonderland", &roles)
        .await
        .unwrap();
    assert_eq!(reply["id"], "org.couchdb.user:alice");
    assert_eq!(conn.list_user_names().await.unwrap(), vec!["alice"]);
}

#[tokio::test]
async fn test_duplicate_user_returns_conflict_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/_users/org.couchdb.user:alice"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "conflict",
            "reason": "Document update conflict."
        })))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::Basic);
    let reply = conn.create_user("alice", "pw", &[]).await.unwrap();

    assert_eq!(reply["error"], "conflict");
}

#[tokio::test]
async fn test_get_uuids() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/_uuids"))
        .and(query_param("count", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuids": ["u1", "u2", "u3"]
        })))
        .mount(&server)
        .await;

    let conn = connect(&server, AuthMode::None);
    assert_eq!(conn.get_uuids(3).await.unwrap(), vec!["u1", "u2", "u3"]);
}
