//! `reqwest` implementation of the REST collaborators.
//!
//! Every authenticated request reads the access token from the credential
//! store right before sending. A `401` triggers exactly one refresh: on
//! success the request is rebuilt and retried with the new token, on failure
//! the stored tokens are cleared and [`ApiError::Unauthorized`] is returned.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, multipart};
use roomline_proto::{
    MessageId, RoomId, UserId,
    payloads::{
        ApiResponse, ChatMessage, ChatRoom, CreateRoomRequest, Friend, FriendRequest,
        LoginRequest, ReadReceipt, RefreshRequest, RoomSummary, SignUpRequest, SignUpResponse,
        TokenPair, UploadedFile, User,
    },
};
use serde::{
    Serialize,
    de::{DeserializeOwned, IgnoredAny},
};

use super::{AuthApi, ChatApi, FileApi, FriendApi};
use crate::{credentials::CredentialStore, error::ApiError};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FriendCodeBody<'a> {
    friend_code: &'a str,
}

/// HTTP client for the Roomline REST API.
#[derive(Clone)]
pub struct HttpApi {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for HttpApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApi").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl HttpApi {
    /// Client for the API served at `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, credentials)
    }

    /// Same as [`HttpApi::new`] with a preconfigured `reqwest` client.
    pub fn with_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url, credentials }
    }

    /// Credential store shared with the WebSocket handshake.
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send an authenticated request, refreshing once on `401`.
    ///
    /// `build` is called again for the retry, since request bodies cannot be
    /// replayed.
    async fn call<T, F>(&self, build: F) -> Result<Option<T>, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> Result<RequestBuilder, ApiError> + Sync,
    {
        let response = self.send_authorized(&build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return unwrap_envelope(response).await;
        }

        tracing::debug!(url = %response.url(), "access token rejected, refreshing");
        self.refresh_or_clear().await?;

        let retried = self.send_authorized(&build).await?;
        unwrap_envelope(retried).await
    }

    async fn send_authorized<F>(&self, build: &F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> Result<RequestBuilder, ApiError> + Sync,
    {
        let mut request = build(&self.http)?;
        if let Some(token) = self.credentials.access_token()? {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(|e| ApiError::Transport(e.to_string()))
    }

    /// Unauthenticated `POST` used by the auth endpoints.
    async fn post_anonymous<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        required(unwrap_envelope(response).await?)
    }

    async fn refresh_or_clear(&self) -> Result<TokenPair, ApiError> {
        let Some(refresh_token) = self.credentials.refresh_token()? else {
            return Err(ApiError::Unauthorized);
        };

        let refreshed: Result<TokenPair, ApiError> = self
            .post_anonymous("/api/v1/auth/refresh-token", &RefreshRequest { refresh_token })
            .await;

        match refreshed {
            Ok(tokens) => {
                self.credentials.set_tokens(&tokens)?;
                Ok(tokens)
            },
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed, logging out");
                self.credentials.clear()?;
                Err(ApiError::Unauthorized)
            },
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        required(self.call(|http| Ok(http.get(&url))).await?)
    }

    async fn send_json<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<Option<T>, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.call(|http| Ok(http.request(method.clone(), &url).json(body))).await
    }

    async fn send_empty(&self, method: reqwest::Method, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        self.call::<IgnoredAny, _>(|http| Ok(http.request(method.clone(), &url))).await?;
        Ok(())
    }
}

/// Map a response to its envelope's `data`.
async fn unwrap_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ApiError> {
    let status = response.status();
    let body = response.bytes().await.map_err(|e| ApiError::Transport(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ApiResponse<IgnoredAny>>(&body)
            .ok()
            .and_then(|envelope| envelope.message);
        return Err(ApiError::Status { status: status.as_u16(), message });
    }

    if body.is_empty() {
        return Ok(None);
    }

    let envelope: ApiResponse<T> =
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Status { status: status.as_u16(), message: envelope.message });
    }

    Ok(envelope.data)
}

fn required<T>(data: Option<T>) -> Result<T, ApiError> {
    data.ok_or(ApiError::MissingData)
}

#[async_trait]
impl ChatApi for HttpApi {
    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, ApiError> {
        self.get("/api/v1/chat/rooms").await
    }

    async fn room(&self, room_id: RoomId) -> Result<ChatRoom, ApiError> {
        self.get(&format!("/api/v1/chat/rooms/{room_id}")).await
    }

    async fn room_users(&self, room_id: RoomId) -> Result<Vec<User>, ApiError> {
        self.get(&format!("/api/v1/chat/rooms/{room_id}/users")).await
    }

    async fn messages(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
        size: usize,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let url = self.url(&format!("/api/v1/chat/rooms/{room_id}/messages"));
        let size = size.to_string();

        // A zero cursor means "newest page" to the server, same as no cursor.
        let before = before.filter(|id| *id != 0).map(|id| id.to_string());

        let page = self
            .call(|http| {
                let mut query = vec![("size", size.as_str())];
                if let Some(before) = &before {
                    query.push(("beforeId", before.as_str()));
                }
                Ok(http.get(&url).query(&query))
            })
            .await?;
        required(page)
    }

    async fn update_last_read(
        &self,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<(), ApiError> {
        self.send_json::<_, IgnoredAny>(
            reqwest::Method::PUT,
            &format!("/api/v1/chat/rooms/{room_id}/read"),
            &ReadReceipt { message_id },
        )
        .await?;
        Ok(())
    }

    async fn create_room(&self, request: &CreateRoomRequest) -> Result<ChatRoom, ApiError> {
        required(self.send_json(reqwest::Method::POST, "/api/v1/chat/rooms", request).await?)
    }

    async fn leave_room(&self, room_id: RoomId) -> Result<(), ApiError> {
        self.send_empty(reqwest::Method::DELETE, &format!("/api/v1/chat/rooms/{room_id}/leave"))
            .await
    }
}

#[async_trait]
impl FriendApi for HttpApi {
    async fn search_by_code(&self, code: &str) -> Result<User, ApiError> {
        let url = self.url("/api/v1/users/search");
        required(self.call(|http| Ok(http.get(&url).query(&[("code", code)]))).await?)
    }

    async fn send_request(&self, friend_code: &str) -> Result<FriendRequest, ApiError> {
        let body = FriendCodeBody { friend_code };
        required(self.send_json(reqwest::Method::POST, "/api/v1/friend-requests", &body).await?)
    }

    async fn received_requests(&self) -> Result<Vec<FriendRequest>, ApiError> {
        self.get("/api/v1/friend-requests").await
    }

    async fn sent_requests(&self) -> Result<Vec<FriendRequest>, ApiError> {
        self.get("/api/v1/friend-requests/sent").await
    }

    async fn accept_request(&self, request_id: u64) -> Result<(), ApiError> {
        let path = format!("/api/v1/friend-requests/{request_id}/accept");
        self.send_empty(reqwest::Method::PUT, &path)
            .await
    }

    async fn reject_request(&self, request_id: u64) -> Result<(), ApiError> {
        let path = format!("/api/v1/friend-requests/{request_id}/reject");
        self.send_empty(reqwest::Method::PUT, &path)
            .await
    }

    async fn friends(&self) -> Result<Vec<Friend>, ApiError> {
        self.get("/api/v1/friends").await
    }

    async fn remove_friend(&self, friend_id: UserId) -> Result<(), ApiError> {
        self.send_empty(reqwest::Method::DELETE, &format!("/api/v1/friends/{friend_id}")).await
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, request: &LoginRequest) -> Result<TokenPair, ApiError> {
        let tokens: TokenPair = self.post_anonymous("/api/v1/auth/login", request).await?;
        self.credentials.set_tokens(&tokens)?;
        tracing::debug!(email = %request.email, "logged in");
        Ok(tokens)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse, ApiError> {
        let response: SignUpResponse = self.post_anonymous("/api/v1/auth/signup", request).await?;
        self.credentials.set_tokens(&response.tokens())?;
        tracing::debug!(user_id = response.user.id, "signed up");
        Ok(response)
    }

    async fn refresh(&self) -> Result<TokenPair, ApiError> {
        self.refresh_or_clear().await
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.get("/api/v1/users/me").await
    }
}

#[async_trait]
impl FileApi for HttpApi {
    async fn upload(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, ApiError> {
        let url = self.url("/api/v1/files/upload");

        let uploaded = self
            .call(|http| {
                let part = multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.to_string())
                    .mime_str(mime)
                    .map_err(|e| ApiError::File(e.to_string()))?;
                let form = multipart::Form::new().part("file", part);
                Ok(http.post(&url).multipart(form))
            })
            .await?;

        required(uploaded)
    }
}
