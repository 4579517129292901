//! Standard invariant checks.
//!
//! Each check captures one behavioral property of the client. They hold for
//! every reachable state, not just for specific scenarios.

use std::collections::HashSet;

use roomline_proto::{MessageId, Topic};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// At most one live subscription per topic.
pub struct UniqueSubscriptions;

impl Invariant for UniqueSubscriptions {
    fn name(&self) -> &'static str {
        "UniqueSubscriptions"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            if let Some(dup) = client.subscriptions.iter().find(|t| !seen.insert(*t)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("user {}: {dup} subscribed twice", client.user_id),
                });
            }
        }
        Ok(())
    }
}

/// No subscriptions while disconnected; the user's room feed while connected.
pub struct SubscriptionsFollowConnection;

impl Invariant for SubscriptionsFollowConnection {
    fn name(&self) -> &'static str {
        "SubscriptionsFollowConnection"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let feed = Topic::UserRooms(client.user_id).to_string();
            let violation = if client.connected {
                (!client.subscriptions.contains(&feed)).then(|| format!("connected without {feed}"))
            } else {
                (!client.subscriptions.is_empty())
                    .then(|| format!("disconnected with {:?}", client.subscriptions))
            };

            if let Some(message) = violation {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("user {}: {message}", client.user_id),
                });
            }
        }
        Ok(())
    }
}

/// Every room topic belongs to the open room.
///
/// Navigating away must release the previous room's topics.
pub struct OnlyOpenRoomTopics;

impl Invariant for OnlyOpenRoomTopics {
    fn name(&self) -> &'static str {
        "OnlyOpenRoomTopics"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for name in &client.subscriptions {
                let Ok(topic) = name.parse::<Topic>() else {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("user {}: unknown topic {name}", client.user_id),
                    });
                };

                if let Some(room) = topic.room_id()
                    && client.open_room != Some(room)
                {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "user {}: {topic} live but open room is {:?}",
                            client.user_id, client.open_room
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Timelines are strictly ascending by message id.
pub struct TimelineAscending;

impl TimelineAscending {
    fn first_disorder(ids: &[MessageId]) -> Option<(MessageId, MessageId)> {
        ids.windows(2).find(|w| w[0] >= w[1]).map(|w| (w[0], w[1]))
    }
}

impl Invariant for TimelineAscending {
    fn name(&self) -> &'static str {
        "TimelineAscending"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for (which, ids) in [("timeline", &client.timeline), ("view", &client.view)] {
                if let Some((a, b)) = Self::first_disorder(ids) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("user {}: {which} has {a} before {b}", client.user_id),
                    });
                }
            }
        }
        Ok(())
    }
}

/// While connected, the App shows the room the Client has open.
pub struct OpenRoomAgreement;

impl Invariant for OpenRoomAgreement {
    fn name(&self) -> &'static str {
        "OpenRoomAgreement"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in state.clients.iter().filter(|c| c.connected) {
            if client.shown_room != client.open_room {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "user {}: app shows {:?}, client has {:?} open",
                        client.user_id, client.shown_room, client.open_room
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Each room appears once in the displayed list.
pub struct RoomListUnique;

impl Invariant for RoomListUnique {
    fn name(&self) -> &'static str {
        "RoomListUnique"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            if let Some(dup) = client.room_list.iter().find(|id| !seen.insert(**id)) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("user {}: room {dup} listed twice", client.user_id),
                });
            }
        }
        Ok(())
    }
}
