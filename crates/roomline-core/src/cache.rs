//! Latest live update per room.
//!
//! The cache is a versioned copy-on-write map. [`RoomUpdateCache::snapshot`]
//! is a reference-count bump; a mutation clones the map only while a snapshot
//! is still held, so readers never observe a half-applied change.

use std::{collections::HashMap, sync::Arc};

use roomline_proto::{RoomId, payloads::RoomUpdate};

/// Room id → latest [`RoomUpdate`].
#[derive(Debug, Clone, Default)]
pub struct RoomUpdateCache {
    entries: Arc<HashMap<RoomId, RoomUpdate>>,
    version: u64,
}

/// Immutable view of the cache at one version.
#[derive(Debug, Clone, Default)]
pub struct CacheSnapshot {
    entries: Arc<HashMap<RoomId, RoomUpdate>>,
    version: u64,
}

impl RoomUpdateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `update` for its room, replacing whatever was there.
    ///
    /// Returns `false` when the stored value was already identical; the
    /// version does not move in that case.
    pub fn upsert(&mut self, update: RoomUpdate) -> bool {
        if self.entries.get(&update.room_id) == Some(&update) {
            return false;
        }

        Arc::make_mut(&mut self.entries).insert(update.room_id, update);
        self.version += 1;
        true
    }

    /// Drop the entry for `room_id`. Returns whether one existed.
    pub fn clear(&mut self, room_id: RoomId) -> bool {
        if !self.entries.contains_key(&room_id) {
            return false;
        }

        Arc::make_mut(&mut self.entries).remove(&room_id);
        self.version += 1;
        true
    }

    /// Drop every entry. Returns whether anything was removed.
    pub fn clear_all(&mut self) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        self.entries = Arc::new(HashMap::new());
        self.version += 1;
        true
    }

    /// Current contents.
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot { entries: Arc::clone(&self.entries), version: self.version }
    }

    /// Entry for `room_id`.
    pub fn get(&self, room_id: RoomId) -> Option<&RoomUpdate> {
        self.entries.get(&room_id)
    }

    /// Number of cached rooms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Version counter, advanced on every visible change.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl CacheSnapshot {
    /// Entry for `room_id`.
    pub fn get(&self, room_id: RoomId) -> Option<&RoomUpdate> {
        self.entries.get(&room_id)
    }

    /// All entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&RoomId, &RoomUpdate)> {
        self.entries.iter()
    }

    /// Number of cached rooms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cache version this snapshot was taken at.
    pub fn version(&self) -> u64 {
        self.version
    }
}
