//! Topic to subscription mapping.
//!
//! The registry is the only owner of live subscriptions. Each entry carries a
//! STOMP subscription id (`sub-<n>`) that is never reused, and the connection
//! generation it was created in. Inbound `MESSAGE` frames are routed by their
//! `subscription` header, so a frame for an id that was unsubscribed or torn
//! down finds no handler and is dropped.
//!
//! # Invariants
//!
//! - At most one entry per topic.
//! - Every entry belongs to the current generation. [`teardown_all`] empties
//!   the map and advances the generation in one step.
//!
//! [`teardown_all`]: SubscriptionRegistry::teardown_all

use std::collections::{BTreeMap, HashMap};

use roomline_proto::Topic;

/// Handle of one live subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: String,
    generation: u64,
}

impl SubscriptionHandle {
    /// STOMP subscription id (`id` header of `SUBSCRIBE`).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Connection generation the subscription belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Receipt id requested when subscribing.
    pub fn receipt(&self) -> &str {
        &self.id
    }
}

/// Result of [`SubscriptionRegistry::ensure_subscribed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new subscription was registered and must be sent to the broker.
    Created(SubscriptionHandle),
    /// The topic was already subscribed; nothing to send.
    Existing(SubscriptionHandle),
}

impl Registration {
    /// The handle, new or existing.
    pub fn handle(&self) -> &SubscriptionHandle {
        match self {
            Self::Created(handle) | Self::Existing(handle) => handle,
        }
    }

    /// Whether a new subscription was created.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

#[derive(Debug, Clone)]
struct Entry<H> {
    handle: SubscriptionHandle,
    handler: H,
    confirmed: bool,
}

/// Topic → live subscription map, generic over the handler value routed with
/// each inbound frame.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry<H> {
    entries: BTreeMap<Topic, Entry<H>>,
    by_id: HashMap<String, Topic>,
    next_id: u64,
    generation: u64,
}

impl<H> Default for SubscriptionRegistry<H> {
    fn default() -> Self {
        Self { entries: BTreeMap::new(), by_id: HashMap::new(), next_id: 0, generation: 0 }
    }
}

impl<H: Clone> SubscriptionRegistry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `topic` unless it already is.
    ///
    /// The handler of an existing entry is kept; handlers are fixed at first
    /// subscribe.
    pub fn ensure_subscribed(&mut self, topic: Topic, handler: H) -> Registration {
        if let Some(entry) = self.entries.get(&topic) {
            return Registration::Existing(entry.handle.clone());
        }

        self.next_id += 1;
        let handle =
            SubscriptionHandle { id: format!("sub-{}", self.next_id), generation: self.generation };

        self.by_id.insert(handle.id.clone(), topic);
        self.entries.insert(topic, Entry { handle: handle.clone(), handler, confirmed: false });

        Registration::Created(handle)
    }

    /// Remove `topic`. Returns the removed handle, `None` if it was not
    /// subscribed.
    pub fn ensure_unsubscribed(&mut self, topic: Topic) -> Option<SubscriptionHandle> {
        let entry = self.entries.remove(&topic)?;
        self.by_id.remove(&entry.handle.id);
        Some(entry.handle)
    }

    /// Remove every entry and advance the generation.
    ///
    /// Returns the topics that were subscribed, in topic order.
    pub fn teardown_all(&mut self) -> Vec<Topic> {
        let topics = self.entries.keys().copied().collect();
        self.entries.clear();
        self.by_id.clear();
        self.generation += 1;
        topics
    }

    /// Topic and handler for an inbound `subscription` header.
    pub fn route(&self, subscription_id: &str) -> Option<(Topic, H)> {
        let topic = self.by_id.get(subscription_id)?;
        let entry = self.entries.get(topic)?;
        Some((*topic, entry.handler.clone()))
    }

    /// Mark the subscription whose receipt arrived as confirmed.
    ///
    /// Returns its topic, `None` for receipts that belong to no live
    /// subscription.
    pub fn confirm(&mut self, receipt_id: &str) -> Option<Topic> {
        let topic = *self.by_id.get(receipt_id)?;
        let entry = self.entries.get_mut(&topic)?;
        entry.confirmed = true;
        Some(topic)
    }

    /// Whether `handle` still refers to a registered subscription of the
    /// current generation.
    pub fn is_live(&self, handle: &SubscriptionHandle) -> bool {
        handle.generation == self.generation
            && self.by_id.get(&handle.id).is_some_and(|topic| {
                self.entries.get(topic).is_some_and(|entry| entry.handle == *handle)
            })
    }

    /// Whether the broker confirmed the subscription to `topic`.
    pub fn is_confirmed(&self, topic: Topic) -> bool {
        self.entries.get(&topic).is_some_and(|entry| entry.confirmed)
    }

    /// Whether `topic` is subscribed.
    pub fn contains(&self, topic: Topic) -> bool {
        self.entries.contains_key(&topic)
    }

    /// Handle of `topic`, if subscribed.
    pub fn handle(&self, topic: Topic) -> Option<&SubscriptionHandle> {
        self.entries.get(&topic).map(|entry| &entry.handle)
    }

    /// Subscribed topics in topic order.
    pub fn topics(&self) -> impl Iterator<Item = Topic> + '_ {
        self.entries.keys().copied()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current connection generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
