//! Message timeline of the open room.
//!
//! # Invariants
//!
//! - Messages are strictly ascending by id. Older pages prepend, pushes
//!   append, and an out-of-order push is inserted at its sorted position
//!   without moving anything else.
//! - A read receipt decrements each message at most once per reader. The
//!   timeline remembers the highest id each remote reader acknowledged and
//!   only touches messages above it.

use std::collections::HashMap;

use roomline_proto::{
    MessageId, RoomId, UserId,
    payloads::{ChatMessage, ReadStatusEvent},
};

/// Messages requested per history page.
pub const PAGE_SIZE: usize = 50;

/// Follow-up work for the view after a pushed message was appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEffect {
    /// Scroll the view to the newest message.
    ScrollToLatest,
    /// Tell the server the viewer has read up to this message.
    MarkRead(MessageId),
}

/// Timeline and read-state of one open room.
#[derive(Debug, Clone)]
pub struct RoomTimeline {
    room_id: RoomId,
    viewer: UserId,
    messages: Vec<ChatMessage>,
    has_more: bool,
    loaded: bool,
    read_watermarks: HashMap<UserId, MessageId>,
}

impl RoomTimeline {
    /// Empty timeline for `room_id`, seen by `viewer`.
    pub fn new(room_id: RoomId, viewer: UserId) -> Self {
        Self {
            room_id,
            viewer,
            messages: Vec::new(),
            has_more: false,
            loaded: false,
            read_watermarks: HashMap::new(),
        }
    }

    /// Replace the timeline with the newest history page.
    ///
    /// Pushes that arrived before the page and are newer than its last message
    /// are kept after it.
    pub fn load_initial(&mut self, page: Vec<ChatMessage>) {
        self.has_more = page.len() >= PAGE_SIZE;
        self.loaded = true;

        let mut page = normalize(page);
        let page_last = page.last().map(|m| m.message_id);

        let pushed = std::mem::take(&mut self.messages);
        let newer = |m: &ChatMessage| page_last.is_none_or(|last| m.message_id > last);
        page.extend(pushed.into_iter().filter(newer));

        self.messages = page;
    }

    /// Insert an older history page before the current earliest message.
    ///
    /// Entries not below the current earliest id are dropped. Returns how many
    /// messages were inserted.
    pub fn prepend_older(&mut self, page: Vec<ChatMessage>) -> usize {
        self.has_more = page.len() >= PAGE_SIZE;

        let oldest = self.oldest_id();
        let mut older: Vec<ChatMessage> = normalize(page)
            .into_iter()
            .filter(|m| oldest.is_none_or(|oldest| m.message_id < oldest))
            .collect();

        let inserted = older.len();
        older.append(&mut self.messages);
        self.messages = older;
        inserted
    }

    /// Add a message pushed by the broker.
    ///
    /// Duplicates are ignored. A message newer than everything held is
    /// appended and yields the scroll and mark-read effects; an older one is
    /// slotted into place silently.
    pub fn append_pushed(&mut self, message: ChatMessage) -> Vec<TimelineEffect> {
        if message.room_id != self.room_id {
            tracing::debug!(
                room_id = self.room_id,
                other = message.room_id,
                "ignoring message for another room"
            );
            return Vec::new();
        }

        let id = message.message_id;
        match self.messages.binary_search_by_key(&id, |m| m.message_id) {
            Ok(_) => Vec::new(),
            Err(pos) if pos == self.messages.len() => {
                self.messages.push(message);
                vec![TimelineEffect::ScrollToLatest, TimelineEffect::MarkRead(id)]
            },
            Err(pos) => {
                self.messages.insert(pos, message);
                Vec::new()
            },
        }
    }

    /// Apply a read receipt from another member.
    ///
    /// Returns the number of messages whose unread count went down. Receipts
    /// from the viewer are ignored.
    pub fn apply_read_status(&mut self, event: ReadStatusEvent) -> usize {
        if event.user_id == self.viewer {
            return 0;
        }

        let floor = self.read_watermarks.get(&event.user_id).copied();
        if floor.is_some_and(|floor| event.message_id <= floor) {
            return 0;
        }
        self.read_watermarks.insert(event.user_id, event.message_id);

        let mut changed = 0;
        for message in &mut self.messages {
            if message.message_id > event.message_id {
                break;
            }
            if floor.is_some_and(|floor| message.message_id <= floor) {
                continue;
            }
            if message.unread_count > 0 {
                message.unread_count -= 1;
                changed += 1;
            }
        }

        changed
    }

    /// Room this timeline belongs to.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Messages in ascending id order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Earliest held id, the cursor for the next older page.
    pub fn oldest_id(&self) -> Option<MessageId> {
        self.messages.first().map(|m| m.message_id)
    }

    /// Newest held id.
    pub fn latest_id(&self) -> Option<MessageId> {
        self.messages.last().map(|m| m.message_id)
    }

    /// Whether the server may hold older messages.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Whether the first history page has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

/// Sort a page ascending by id and drop duplicate ids.
fn normalize(mut page: Vec<ChatMessage>) -> Vec<ChatMessage> {
    page.sort_by_key(|m| m.message_id);
    page.dedup_by_key(|m| m.message_id);
    page
}
