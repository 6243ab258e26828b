//! Cross-plugin notification bus.
//!
//! # Responsibility
//! - Deliver named events with an opaque JSON payload to every handler
//!   subscribed to that name at publish time.
//! - Track subscription ownership so a plugin's handlers can be removed in
//!   one call at teardown.
//!
//! # Invariants
//! - Delivery is synchronous, on the publishing thread, in subscription order.
//! - A failing or panicking handler never stops delivery to the others.
//! - No replay: late subscribers only see later publications.
//! - Handlers run without the subscriber lock held, so they may publish or
//!   (un)subscribe themselves.

use crate::logging::sanitize_message;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Published after a user account is created.
pub const EVENT_USER_ADDED: &str = "user.added";
/// Published after a successful login.
pub const EVENT_USER_CONNECTED: &str = "user.connected";
/// Published after logout.
pub const EVENT_USER_DISCONNECTED: &str = "user.disconnected";
/// Published after a macro is created.
pub const EVENT_MACRO_CREATED: &str = "macro.created";
/// Published after macros are saved.
pub const EVENT_MACRO_UPDATED: &str = "macro.updated";
/// Published after a tag is created or renamed.
pub const EVENT_TAG_UPDATED: &str = "tag.updated";
/// Published after picture metadata is stored.
pub const EVENT_PICTURE_ADDED: &str = "picture.added";

const MAX_LOGGED_ERROR_CHARS: usize = 200;

pub type HandlerError = Box<dyn Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&NotificationEvent) -> HandlerResult + Send + Sync>;

/// One published event.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationEvent {
    pub name: String,
    pub payload: Value,
}

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(Uuid);

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one publication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned `Err` or panicked.
    pub failed: usize,
}

struct Subscription {
    id: SubscriptionId,
    owner: String,
    handler: Handler,
}

/// Process-wide publish/subscribe channel, owned by the host.
#[derive(Default)]
pub struct NotificationBus {
    subscribers: Mutex<BTreeMap<String, Vec<Subscription>>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `event` on behalf of `owner`.
    pub fn subscribe(
        &self,
        event: &str,
        owner: &str,
        handler: impl Fn(&NotificationEvent) -> HandlerResult + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.lock()
            .entry(event.to_string())
            .or_default()
            .push(Subscription {
                id,
                owner: owner.to_string(),
                handler: Arc::new(handler),
            });
        debug!("event=bus_subscribe module=bus status=ok name={event} owner={owner} id={id}");
        id
    }

    /// Removes one subscription. Returns whether it existed.
    pub fn unsubscribe(&self, event: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let Some(handlers) = subscribers.get_mut(event) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|subscription| subscription.id != id);
        let removed = handlers.len() != before;
        if handlers.is_empty() {
            subscribers.remove(event);
        }
        removed
    }

    /// Removes every subscription held by `owner`. Returns how many.
    pub fn unsubscribe_owner(&self, owner: &str) -> usize {
        let mut subscribers = self.lock();
        let mut removed = 0;
        for handlers in subscribers.values_mut() {
            let before = handlers.len();
            handlers.retain(|subscription| subscription.owner != owner);
            removed += before - handlers.len();
        }
        subscribers.retain(|_, handlers| !handlers.is_empty());
        if removed > 0 {
            debug!("event=bus_unsubscribe_owner module=bus status=ok owner={owner} removed={removed}");
        }
        removed
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, Vec::len)
    }

    /// Delivers `payload` to every current subscriber of `event`.
    pub fn publish(&self, event: &str, payload: Value) -> PublishReport {
        let handlers: Vec<(SubscriptionId, String, Handler)> = self
            .lock()
            .get(event)
            .map(|subscriptions| {
                subscriptions
                    .iter()
                    .map(|s| (s.id, s.owner.clone(), Arc::clone(&s.handler)))
                    .collect()
            })
            .unwrap_or_default();

        let notification = NotificationEvent {
            name: event.to_string(),
            payload,
        };
        let mut report = PublishReport::default();
        for (id, owner, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(&notification))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    warn!(
                        "event=bus_deliver module=bus status=error name={event} owner={owner} id={id} error={}",
                        sanitize_message(&err.to_string(), MAX_LOGGED_ERROR_CHARS)
                    );
                }
                Err(_) => {
                    report.failed += 1;
                    warn!(
                        "event=bus_deliver module=bus status=error name={event} owner={owner} id={id} error=handler_panicked"
                    );
                }
            }
        }

        debug!(
            "event=bus_publish module=bus status=ok name={event} delivered={} failed={}",
            report.delivered, report.failed
        );
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<Subscription>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
