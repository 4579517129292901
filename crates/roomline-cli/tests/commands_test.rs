//! One-shot commands against a mock REST server.

use std::sync::Arc;

use roomline_cli::{CliError, Command, FriendsCommand, commands::execute};
use roomline_client::{CredentialStore, MemoryCredentialStore, api::HttpApi};
use roomline_proto::payloads::TokenPair;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

fn ok(data: serde_json::Value) -> ResponseTemplate {
    let body = json!({ "success": true, "message": null, "data": data });
    ResponseTemplate::new(200).set_body_json(body)
}

fn ana() -> serde_json::Value {
    json!({
        "id": 1,
        "email": "ana@example.com",
        "nickname": "ana",
        "profileImageUrl": null,
        "friendCode": "ANA123"
    })
}

async fn setup(logged_in: bool) -> (MockServer, HttpApi, MemoryCredentialStore) {
    let server = MockServer::start().await;
    let store = if logged_in {
        MemoryCredentialStore::with_tokens(TokenPair {
            access_token: "access".into(),
            refresh_token: "refresh".into(),
        })
    } else {
        MemoryCredentialStore::new()
    };
    let api = HttpApi::new(server.uri(), Arc::new(store.clone()));
    (server, api, store)
}

async fn output(command: Command, api: &HttpApi, store: &MemoryCredentialStore) -> String {
    let mut out = Vec::new();
    execute(command, api, store, &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn login_stores_tokens_and_greets() {
    let (server, api, store) = setup(false).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "email": "ana@example.com", "password": "pw" })))
        .respond_with(ok(json!({ "accessToken": "a1", "refreshToken": "r1" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/me"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ok(ana()))
        .mount(&server)
        .await;

    let command = Command::Login { email: "ana@example.com".into(), password: "pw".into() };
    let printed = output(command, &api, &store).await;

    assert_eq!(printed, "Logged in as ana <ana@example.com> id 1, friend code ANA123\n");
    assert_eq!(store.access_token().unwrap().as_deref(), Some("a1"));
}

#[tokio::test]
async fn logout_forgets_tokens() {
    let (_server, api, store) = setup(true).await;

    assert_eq!(output(Command::Logout, &api, &store).await, "Logged out\n");
    assert!(store.tokens().unwrap().is_none());
}

#[tokio::test]
async fn commands_need_a_login() {
    let (_server, api, store) = setup(false).await;

    let mut out = Vec::new();
    let result = execute(Command::Whoami, &api, &store, &mut out).await;

    assert!(matches!(result, Err(CliError::NotLoggedIn)));
    assert!(out.is_empty());
}

#[tokio::test]
async fn rooms_prints_a_snapshot_of_the_list() {
    let (server, api, store) = setup(true).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/chat/rooms"))
        .respond_with(ok(json!([{
            "id": 7,
            "name": "general",
            "type": "GROUP",
            "userCount": 3,
            "lastMessage": "hey",
            "lastMessageSender": "bo",
            "lastMessageTime": "2024-05-01T12:30:00",
            "unreadCount": 2
        }])))
        .mount(&server)
        .await;

    let printed = output(Command::Rooms, &api, &store).await;
    assert_eq!(printed, "#7 general (3 members) - bo: hey [2 unread]\n");
}

#[tokio::test]
async fn friend_request_by_code() {
    let (server, api, store) = setup(true).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/search"))
        .and(query_param("code", "BO456"))
        .respond_with(ok(json!({
            "id": 2,
            "email": "bo@example.com",
            "nickname": "bo",
            "friendCode": "BO456"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/friend-requests"))
        .respond_with(ok(json!({
            "id": 31,
            "requester": ana(),
            "status": "PENDING",
            "createdAt": "2024-05-01T12:00:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let command = Command::Friends(FriendsCommand::Add { code: "BO456".into() });
    assert_eq!(output(command, &api, &store).await, "Friend request #31 sent to bo\n");
}

#[tokio::test]
async fn friend_list_and_empty_requests() {
    let (server, api, store) = setup(true).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/friends"))
        .respond_with(ok(json!([{
            "id": 2,
            "email": "bo@example.com",
            "nickname": "bo",
            "friendSince": "2024-04-02T09:15:00"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/friend-requests"))
        .respond_with(ok(json!([])))
        .mount(&server)
        .await;

    let friends = output(Command::Friends(FriendsCommand::List), &api, &store).await;
    assert_eq!(friends, "2 bo <bo@example.com> since 2024-04-02\n");

    let requests = output(Command::Friends(FriendsCommand::Requests), &api, &store).await;
    assert_eq!(requests, "No requests\n");
}

#[tokio::test]
async fn create_room_reports_members() {
    let (server, api, store) = setup(true).await;

    Mock::given(method("POST"))
        .and(path("/api/v1/chat/rooms"))
        .and(body_json(json!({ "name": "team", "userIds": [2, 3] })))
        .respond_with(ok(json!({
            "id": 12,
            "name": "team",
            "type": "GROUP",
            "createdAt": "2024-05-01T12:00:00",
            "users": [ana()]
        })))
        .mount(&server)
        .await;

    let command = Command::CreateRoom { name: "team".into(), user_ids: vec![2, 3] };
    assert_eq!(output(command, &api, &store).await, "Created room #12 team with 1 members\n");
}

#[tokio::test]
async fn server_errors_surface() {
    let (server, api, store) = setup(true).await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/chat/rooms/9/leave"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "message": "not a member",
            "data": null
        })))
        .mount(&server)
        .await;

    let mut out = Vec::new();
    let result = execute(Command::LeaveRoom { room_id: 9 }, &api, &store, &mut out).await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "server returned 404: not a member");
}
