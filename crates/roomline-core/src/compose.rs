//! View composition.
//!
//! Pure functions that merge what the REST layer returned with what the broker
//! pushed since. Inputs are never mutated; callers recompute on every change.

use roomline_proto::payloads::{ChatMessage, RoomSummary};

use crate::{cache::CacheSnapshot, timeline::RoomTimeline};

/// Room list for display.
///
/// Each baseline room with a cached update takes the update's preview,
/// sender, time and unread count. The result is sorted by effective
/// last-message time, newest first; ties keep baseline order. Cached updates
/// for rooms missing from the baseline are not shown.
pub fn compose_room_list(baseline: &[RoomSummary], cache: &CacheSnapshot) -> Vec<RoomSummary> {
    let mut rooms: Vec<RoomSummary> = baseline
        .iter()
        .map(|room| match cache.get(room.id) {
            Some(update) => room.with_update(update),
            None => room.clone(),
        })
        .collect();

    rooms.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
    rooms
}

/// Messages of the open room for display, oldest first.
pub fn compose_timeline(timeline: &RoomTimeline) -> &[ChatMessage] {
    timeline.messages()
}

/// Sum of unread counts across a composed list.
pub fn total_unread(rooms: &[RoomSummary]) -> u64 {
    rooms.iter().map(|room| u64::from(room.unread_count)).sum()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use roomline_proto::payloads::{RoomKind, RoomUpdate};

    use super::*;
    use crate::cache::RoomUpdateCache;

    fn at(hour: u32) -> NaiveDateTime {
        format!("2024-05-01T{hour:02}:00:00").parse().unwrap()
    }

    fn room(id: u64, hour: u32, unread: u32) -> RoomSummary {
        RoomSummary {
            id,
            name: format!("room {id}"),
            kind: RoomKind::Group,
            member_count: 2,
            last_message_preview: None,
            last_sender: None,
            last_message_time: at(hour),
            unread_count: unread,
        }
    }

    fn update(room_id: u64, hour: u32, unread: u32) -> RoomUpdate {
        RoomUpdate {
            room_id,
            last_message: Some("hey".into()),
            last_message_time: at(hour),
            last_message_sender_id: 5,
            last_message_sender_nickname: "eve".into(),
            unread_count: unread,
        }
    }

    fn ids(rooms: &[RoomSummary]) -> Vec<u64> {
        rooms.iter().map(|r| r.id).collect()
    }

    #[test]
    fn update_overrides_and_reorders() {
        let baseline = vec![room(2, 9, 0), room(1, 8, 0), room(3, 7, 0)];
        let mut cache = RoomUpdateCache::new();
        cache.upsert(update(1, 10, 2));

        let composed = compose_room_list(&baseline, &cache.snapshot());

        assert_eq!(ids(&composed), vec![1, 2, 3]);
        assert_eq!(composed[0].last_message_time, at(10));
        assert_eq!(composed[0].unread_count, 2);
        assert_eq!(composed[0].last_sender.as_deref(), Some("eve"));
        assert_eq!(total_unread(&composed), 2);
    }

    #[test]
    fn baseline_is_not_mutated() {
        let baseline = vec![room(1, 8, 0)];
        let mut cache = RoomUpdateCache::new();
        cache.upsert(update(1, 10, 2));

        compose_room_list(&baseline, &cache.snapshot());

        assert_eq!(baseline[0].unread_count, 0);
        assert_eq!(baseline[0].last_message_time, at(8));
    }

    #[test]
    fn equal_times_keep_baseline_order() {
        let baseline = vec![room(3, 8, 0), room(1, 8, 0), room(2, 8, 0)];
        let composed = compose_room_list(&baseline, &CacheSnapshot::default());

        assert_eq!(ids(&composed), vec![3, 1, 2]);
    }

    #[test]
    fn unknown_room_updates_are_hidden() {
        let baseline = vec![room(1, 8, 0)];
        let mut cache = RoomUpdateCache::new();
        cache.upsert(update(42, 23, 9));

        let composed = compose_room_list(&baseline, &cache.snapshot());
        assert_eq!(ids(&composed), vec![1]);
    }

    #[test]
    fn composed_list_for_display() {
        let baseline = vec![room(1, 8, 0), room(2, 9, 1), room(3, 7, 0)];
        let mut cache = RoomUpdateCache::new();
        cache.upsert(update(3, 11, 4));
        cache.upsert(update(1, 10, 2));

        let composed = compose_room_list(&baseline, &cache.snapshot());
        let lines: Vec<String> = composed
            .iter()
            .map(|r| {
                let preview = r.last_message_preview.as_deref().unwrap_or("-");
                format!("{} {} unread={} {preview}", r.id, r.last_message_time, r.unread_count)
            })
            .collect();

        insta::assert_snapshot!(lines.join("\n"), @r"
        3 2024-05-01 11:00:00 unread=4 hey
        1 2024-05-01 10:00:00 unread=2 hey
        2 2024-05-01 09:00:00 unread=1 -
        ");
    }
}
