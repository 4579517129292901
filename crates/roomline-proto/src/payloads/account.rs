use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User id.
    pub id: UserId,
    /// Login email.
    pub email: String,
    /// Display name.
    pub nickname: String,
    /// Avatar URL.
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// Code others use to send a friend request.
    #[serde(default)]
    pub friend_code: Option<String>,
}

/// Access and refresh token pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Bearer token for REST calls and the broker handshake.
    pub access_token: String,
    /// Token exchanged for a new pair when the access token expires.
    pub refresh_token: String,
}

// Tokens never end up in logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Body of `POST /api/v1/auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
}

/// Body of `POST /api/v1/auth/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpRequest {
    /// Login email.
    pub email: String,
    /// Password.
    pub password: String,
    /// Display name.
    pub nickname: String,
}

/// Response of `POST /api/v1/auth/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    /// The new account.
    pub user: User,
    /// Bearer token.
    pub access_token: String,
    /// Refresh token.
    pub refresh_token: String,
}

impl SignUpResponse {
    /// Token pair issued with the account.
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Body of `POST /api/v1/auth/refresh-token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// Stored refresh token.
    pub refresh_token: String,
}

/// Friend request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FriendRequestStatus {
    /// Waiting for an answer.
    Pending,
    /// Accepted.
    Accepted,
    /// Rejected.
    Rejected,
}

/// A friend request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Request id.
    pub id: u64,
    /// Who sent it.
    pub requester: User,
    /// Current status.
    pub status: FriendRequestStatus,
    /// When it was sent.
    pub created_at: NaiveDateTime,
}

/// A confirmed friend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    /// The friend's user id.
    pub id: UserId,
    /// Login email.
    pub email: String,
    /// Display name.
    pub nickname: String,
    /// Avatar URL.
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// When the friendship started.
    pub friend_since: NaiveDateTime,
}

/// Response of `POST /api/v1/files/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Where the file is served from.
    pub url: String,
    /// Stored file name.
    pub file_name: String,
}
