//! REST collaborators served from the simulated broker.
//!
//! [`SimApi`] answers the chat and upload endpoints for one user out of the
//! same [`SimBroker`](crate::SimBroker) state the STOMP side uses, so a
//! history page and a live push never disagree.

use async_trait::async_trait;
use roomline_client::{
    ApiError,
    api::{ChatApi, FileApi},
};
use roomline_proto::{
    MessageId, RoomId, UserId,
    payloads::{ChatMessage, ChatRoom, CreateRoomRequest, RoomSummary, UploadedFile, User},
};

use crate::sim_broker::{SharedSimBroker, lock_broker};

/// REST view of the broker for one user.
#[derive(Debug, Clone)]
pub struct SimApi {
    broker: SharedSimBroker,
    user_id: UserId,
}

impl SimApi {
    /// Serve requests made by `user_id`.
    pub fn new(broker: SharedSimBroker, user_id: UserId) -> Self {
        Self { broker, user_id }
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status { status: 404, message: Some(format!("{what} not found")) }
}

#[async_trait]
impl ChatApi for SimApi {
    async fn list_rooms(&self) -> Result<Vec<RoomSummary>, ApiError> {
        Ok(lock_broker(&self.broker).room_summaries(self.user_id))
    }

    async fn room(&self, room_id: RoomId) -> Result<ChatRoom, ApiError> {
        lock_broker(&self.broker).room_detail(room_id).ok_or_else(|| not_found("room"))
    }

    async fn room_users(&self, room_id: RoomId) -> Result<Vec<User>, ApiError> {
        Ok(self.room(room_id).await?.users)
    }

    async fn messages(
        &self,
        room_id: RoomId,
        before: Option<MessageId>,
        size: usize,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let broker = lock_broker(&self.broker);
        if broker.room_detail(room_id).is_none() {
            return Err(not_found("room"));
        }
        Ok(broker.history(room_id, before, size))
    }

    async fn update_last_read(
        &self,
        room_id: RoomId,
        message_id: MessageId,
    ) -> Result<(), ApiError> {
        if lock_broker(&self.broker).persist_last_read(room_id, self.user_id, message_id) {
            Ok(())
        } else {
            Err(not_found("room"))
        }
    }

    async fn create_room(&self, request: &CreateRoomRequest) -> Result<ChatRoom, ApiError> {
        Ok(lock_broker(&self.broker).create_room_for(self.user_id, request))
    }

    async fn leave_room(&self, room_id: RoomId) -> Result<(), ApiError> {
        if lock_broker(&self.broker).leave_room(room_id, self.user_id) {
            Ok(())
        } else {
            Err(not_found("membership"))
        }
    }
}

#[async_trait]
impl FileApi for SimApi {
    async fn upload(
        &self,
        file_name: &str,
        _mime: &str,
        _bytes: Vec<u8>,
    ) -> Result<UploadedFile, ApiError> {
        Ok(UploadedFile {
            url: format!("https://files.roomline.test/{}/{file_name}", self.user_id),
            file_name: file_name.to_string(),
        })
    }
}
