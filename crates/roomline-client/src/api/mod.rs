//! REST collaborators.
//!
//! The client state machine never performs HTTP itself. It asks for history
//! pages through [`ClientAction::FetchHistory`](crate::ClientAction::FetchHistory)
//! and the driver answers with one of these traits. Everything else here
//! (friends, auth, uploads) is used by the application layer directly.
//!
//! Errors propagate unchanged; the only retry is the single token refresh
//! performed by the HTTP implementation on `401`.

#[cfg(feature = "http")]
mod http;

use async_trait::async_trait;
#[cfg(feature = "http")]
pub use http::HttpApi;
use roomline_proto::{
    MessageId, RoomId, UserId,
    payloads::{
        ChatMessage, ChatRoom, CreateRoomRequest, Friend, FriendRequest, LoginRequest,
        RoomSummary, SignUpRequest, SignUpResponse, TokenPair, UploadedFile, User,
    },
};

use crate::error::ApiError;

/// Rooms and message history.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Rooms the user belongs to, with their last-message summary.
    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, ApiError>;

    /// Room detail with members.
    async fn room(&self, room_id: RoomId) -> Result<ChatRoom, ApiError>;

    /// Members of a room.
    async fn room_users(&self, room_id: RoomId) -> Result<Vec<User>, ApiError>;

    /// One history page of at most `size` messages, in server order.
    ///
    /// `before` selects messages older than that id; `None` returns the
    /// newest page.
    async fn messages(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
        size: usize,
    ) -> Result<Vec<ChatMessage>, ApiError>;

    /// Persist the last-read marker.
    async fn update_last_read(&self, room_id: RoomId, message_id: MessageId)
    -> Result<(), ApiError>;

    /// Create a room with the given members.
    async fn create_room(&self, request: &CreateRoomRequest) -> Result<ChatRoom, ApiError>;

    /// Leave a room.
    async fn leave_room(&self, room_id: RoomId) -> Result<(), ApiError>;
}

/// Friends and friend requests.
#[async_trait]
pub trait FriendApi: Send + Sync {
    /// Look a user up by friend code.
    async fn search_by_code(&self, code: &str) -> Result<User, ApiError>;

    /// Send a friend request to the owner of `friend_code`.
    async fn send_request(&self, friend_code: &str) -> Result<FriendRequest, ApiError>;

    /// Requests addressed to the user.
    async fn received_requests(&self) -> Result<Vec<FriendRequest>, ApiError>;

    /// Requests the user sent.
    async fn sent_requests(&self) -> Result<Vec<FriendRequest>, ApiError>;

    /// Accept a received request.
    async fn accept_request(&self, request_id: u64) -> Result<(), ApiError>;

    /// Reject a received request.
    async fn reject_request(&self, request_id: u64) -> Result<(), ApiError>;

    /// Confirmed friends.
    async fn friends(&self) -> Result<Vec<Friend>, ApiError>;

    /// End a friendship.
    async fn remove_friend(&self, friend_id: UserId) -> Result<(), ApiError>;
}

/// Login and account.
///
/// Implementations store the issued tokens in their credential store.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Log in and store the issued tokens.
    async fn login(&self, request: &LoginRequest) -> Result<TokenPair, ApiError>;

    /// Create an account and store the issued tokens.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse, ApiError>;

    /// Exchange the stored refresh token for a new pair.
    async fn refresh(&self) -> Result<TokenPair, ApiError>;

    /// The logged-in user.
    async fn me(&self) -> Result<User, ApiError>;
}

/// File uploads for attachments.
#[async_trait]
pub trait FileApi: Send + Sync {
    /// Upload `bytes` and return where the file is served from.
    async fn upload(
        &self,
        file_name: &str,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, ApiError>;
}
