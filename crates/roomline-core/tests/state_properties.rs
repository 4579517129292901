//! Property-based tests for the registry, timeline and update cache.
//!
//! Each test drives one component with an arbitrary operation sequence and
//! checks its invariants after every step.

use chrono::NaiveDateTime;
use proptest::prelude::*;
use roomline_core::{RoomTimeline, RoomUpdateCache, SubscriptionRegistry, compose};
use roomline_proto::{
    MessageId, Topic,
    payloads::{ChatMessage, MessageKind, ReadStatusEvent, RoomKind, RoomSummary, RoomUpdate},
};

const ROOM: u64 = 1;
const VIEWER: u64 = 100;

#[derive(Debug, Clone)]
enum RegistryOp {
    Subscribe(Topic),
    Unsubscribe(Topic),
    Teardown,
}

fn topic() -> impl Strategy<Value = Topic> {
    prop_oneof![
        (1u64..4).prop_map(Topic::UserRooms),
        (1u64..4).prop_map(Topic::RoomMessages),
        (1u64..4).prop_map(Topic::RoomReadStatus),
    ]
}

fn registry_op() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        4 => topic().prop_map(RegistryOp::Subscribe),
        3 => topic().prop_map(RegistryOp::Unsubscribe),
        1 => Just(RegistryOp::Teardown),
    ]
}

#[derive(Debug, Clone)]
enum TimelineOp {
    Push(MessageId, u32),
    Older(Vec<MessageId>),
    Initial(Vec<MessageId>),
    Read(u64, MessageId),
}

fn timeline_op() -> impl Strategy<Value = TimelineOp> {
    prop_oneof![
        4 => (-50i64..50, 0u32..4).prop_map(|(id, unread)| TimelineOp::Push(id, unread)),
        1 => prop::collection::vec(-80i64..50, 0..10).prop_map(TimelineOp::Older),
        1 => prop::collection::vec(-50i64..50, 0..10).prop_map(TimelineOp::Initial),
        3 => (98u64..103, -50i64..50).prop_map(|(user, id)| TimelineOp::Read(user, id)),
    ]
}

fn message(id: MessageId, unread: u32) -> ChatMessage {
    ChatMessage {
        message_id: id,
        room_id: ROOM,
        sender_id: 2,
        sender_nickname: "b".into(),
        sender_profile_image_url: None,
        kind: MessageKind::Text,
        content: Some(id.to_string()),
        file_url: None,
        file_name: None,
        created_at: NaiveDateTime::default(),
        unread_count: unread,
    }
}

fn update(room_id: u64, minute: u32, unread: u32) -> RoomUpdate {
    RoomUpdate {
        room_id,
        last_message: Some(format!("{minute}")),
        last_message_time: NaiveDateTime::default() + chrono::Duration::minutes(i64::from(minute)),
        last_message_sender_id: 3,
        last_message_sender_nickname: "c".into(),
        unread_count: unread,
    }
}

proptest! {
    #[test]
    fn prop_registry_one_subscription_per_topic(
        ops in prop::collection::vec(registry_op(), 0..60),
    ) {
        let mut registry = SubscriptionRegistry::new();
        let mut handles = Vec::new();

        for op in ops {
            match op {
                RegistryOp::Subscribe(topic) => {
                    let registration = registry.ensure_subscribed(topic, topic);
                    handles.push(registration.handle().clone());
                },
                RegistryOp::Unsubscribe(topic) => {
                    registry.ensure_unsubscribed(topic);
                    prop_assert!(!registry.contains(topic));
                },
                RegistryOp::Teardown => {
                    registry.teardown_all();
                    prop_assert!(registry.is_empty());
                    prop_assert!(handles.iter().all(|h| !registry.is_live(h)));
                },
            }

            let topics: Vec<Topic> = registry.topics().collect();
            let mut deduped = topics.clone();
            deduped.dedup();
            prop_assert_eq!(&topics, &deduped);

            for topic in topics {
                let handle = registry.handle(topic).unwrap();
                prop_assert!(registry.is_live(handle));
                let (routed, handler) = registry.route(handle.id()).unwrap();
                prop_assert_eq!(routed, topic);
                prop_assert_eq!(handler, topic);
            }
        }
    }

    #[test]
    fn prop_timeline_strictly_ascending(ops in prop::collection::vec(timeline_op(), 0..60)) {
        let mut timeline = RoomTimeline::new(ROOM, VIEWER);

        for op in ops {
            let before: Vec<(MessageId, u32)> =
                timeline.messages().iter().map(|m| (m.message_id, m.unread_count)).collect();

            match op {
                TimelineOp::Push(id, unread) => {
                    timeline.append_pushed(message(id, unread));
                },
                TimelineOp::Older(ids) => {
                    timeline.prepend_older(ids.into_iter().map(|id| message(id, 1)).collect());
                },
                TimelineOp::Initial(ids) => {
                    timeline.load_initial(ids.into_iter().map(|id| message(id, 1)).collect());
                },
                TimelineOp::Read(user, id) => {
                    timeline.apply_read_status(ReadStatusEvent { user_id: user, message_id: id });
                    let after: Vec<(MessageId, u32)> = timeline
                        .messages()
                        .iter()
                        .map(|m| (m.message_id, m.unread_count))
                        .collect();

                    prop_assert_eq!(before.len(), after.len());
                    for ((id_a, unread_a), (id_b, unread_b)) in before.iter().zip(&after) {
                        prop_assert_eq!(id_a, id_b);
                        prop_assert!(unread_b <= unread_a && unread_a - unread_b <= 1);
                        if user == VIEWER {
                            prop_assert_eq!(unread_a, unread_b);
                        }
                    }
                },
            }

            let ids: Vec<MessageId> = timeline.messages().iter().map(|m| m.message_id).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]), "not ascending: {:?}", ids);
        }
    }

    #[test]
    fn prop_cache_reapply_is_idempotent(
        updates in prop::collection::vec((1u64..6, 0u32..60, 0u32..5), 1..30),
    ) {
        let baseline: Vec<RoomSummary> = (1u64..6)
            .map(|id| RoomSummary {
                id,
                name: format!("r{id}"),
                kind: RoomKind::Group,
                member_count: 2,
                last_message_preview: None,
                last_sender: None,
                last_message_time: NaiveDateTime::default(),
                unread_count: 0,
            })
            .collect();

        let mut once = RoomUpdateCache::new();
        let mut twice = RoomUpdateCache::new();
        for (room, minute, unread) in &updates {
            once.upsert(update(*room, *minute, *unread));
            twice.upsert(update(*room, *minute, *unread));
            twice.upsert(update(*room, *minute, *unread));
        }

        let a = compose::compose_room_list(&baseline, &once.snapshot());
        let b = compose::compose_room_list(&baseline, &twice.snapshot());
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(once.version(), twice.version());

        prop_assert!(a.windows(2).all(|w| w[0].last_message_time >= w[1].last_message_time));
    }
}
