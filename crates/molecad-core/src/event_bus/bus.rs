//! Event Bus implementation.
//!
//! One `EventBus` lives in each project session and is shared through an
//! `Arc`; there is no process-wide instance.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{EventCategory, GraphEvent};
use crate::types::UniqueId;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.0.simple().to_string();
        write!(f, "sub-{}", &text[..8])
    }
}

/// Which events a handler wants
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    #[default]
    All,
    /// Events in any of these categories
    Categories(Vec<EventCategory>),
    /// Events about one atom: its alerts, renders and layout progress
    Atom(UniqueId),
}

impl EventFilter {
    pub fn matches(&self, event: &GraphEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
            EventFilter::Atom(id) => event.atom() == Some(id),
        }
    }
}

type Handler = Box<dyn Fn(GraphEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    handler: Handler,
}

/// Configuration for the event bus
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Capacity of the broadcast channel behind [`EventBus::receiver`]
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Session-scoped event bus for graph notifications
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
    subscriptions: RwLock<Vec<Subscription>>,
    config: EventBusConfig,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    pub fn with_config(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            subscriptions: RwLock::new(Vec::new()),
            config,
        }
    }

    /// Publish an event and return how many handlers it reached
    ///
    /// Handlers run in subscription order on the publishing task. Nobody
    /// listening is fine: the engine publishes whether or not a UI is
    /// attached.
    pub fn publish(&self, event: GraphEvent) -> usize {
        tracing::trace!("event: {}", event.description());

        let mut handled = 0;
        for subscription in self.subscriptions.read().iter() {
            if subscription.filter.matches(&event) {
                (subscription.handler)(event.clone());
                handled += 1;
            }
        }

        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
        handled
    }

    /// Register a handler; it must return quickly
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(GraphEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscriptions.write().push(Subscription {
            id,
            filter,
            handler: Box::new(handler),
        });
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Receiver for consuming events from an async task
    pub fn receiver(&self) -> broadcast::Receiver<GraphEvent> {
        self.sender.subscribe()
    }

    /// Returns true if the subscription existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        let removed = subscriptions.len() != before;
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("config", &self.config)
            .finish()
    }
}
