// ── Event dispatcher ──
//
// Typed publish/subscribe hub between the connection manager and every
// consumer (counts, paged view, notifications, the CLI). Handler lists are
// copy-on-write (`ArcSwap`), so a handler may subscribe or unsubscribe
// from inside a dispatch without deadlocking.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use strum::{Display, EnumIter};
use tracing::{trace, warn};

use crate::model::{Acknowledgment, AlarmEvent, ConnectionStatus, ErrorEvent, ErrorKind};

/// Error a handler may return. Reported, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Arc<dyn Fn(&MonitorEvent) -> HandlerResult + Send + Sync>;

/// Handler sets are independent per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum EventCategory {
    AlarmTriggered,
    Acknowledgment,
    ConnectionChanged,
    Error,
}

/// Everything the dispatcher delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    AlarmTriggered(AlarmEvent),
    Acknowledgment(Acknowledgment),
    ConnectionChanged(ConnectionStatus),
    Error(ErrorEvent),
}

impl MonitorEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::AlarmTriggered(_) => EventCategory::AlarmTriggered,
            Self::Acknowledgment(_) => EventCategory::Acknowledgment,
            Self::ConnectionChanged(_) => EventCategory::ConnectionChanged,
            Self::Error(_) => EventCategory::Error,
        }
    }
}

/// Outcome of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct Entry {
    id: u64,
    handler: Handler,
}

struct Registry {
    next_id: AtomicU64,
    alarm: ArcSwap<Vec<Entry>>,
    acknowledgment: ArcSwap<Vec<Entry>>,
    connection: ArcSwap<Vec<Entry>>,
    error: ArcSwap<Vec<Entry>>,
}

impl Registry {
    fn slot(&self, category: EventCategory) -> &ArcSwap<Vec<Entry>> {
        match category {
            EventCategory::AlarmTriggered => &self.alarm,
            EventCategory::Acknowledgment => &self.acknowledgment,
            EventCategory::ConnectionChanged => &self.connection,
            EventCategory::Error => &self.error,
        }
    }

    fn remove(&self, category: EventCategory, id: u64) {
        self.slot(category).rcu(|entries| {
            entries
                .iter()
                .filter(|e| e.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

// ── EventDispatcher ──────────────────────────────────────────────────

/// Cheaply cloneable handle to one handler registry.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("alarm", &self.handler_count(EventCategory::AlarmTriggered))
            .field("acknowledgment", &self.handler_count(EventCategory::Acknowledgment))
            .field("connection", &self.handler_count(EventCategory::ConnectionChanged))
            .field("error", &self.handler_count(EventCategory::Error))
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                alarm: ArcSwap::from_pointee(Vec::new()),
                acknowledgment: ArcSwap::from_pointee(Vec::new()),
                connection: ArcSwap::from_pointee(Vec::new()),
                error: ArcSwap::from_pointee(Vec::new()),
            }),
        }
    }

    /// Register a handler for one category. Handlers run in registration
    /// order. The handler stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, category: EventCategory, handler: F) -> Subscription
    where
        F: Fn(&MonitorEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: Handler = Arc::new(handler);
        self.registry.slot(category).rcu(|entries| {
            let mut next = Vec::clone(entries);
            next.push(Entry {
                id,
                handler: Arc::clone(&handler),
            });
            next
        });
        trace!(%category, id, "handler subscribed");
        Subscription {
            registry: Some(Arc::downgrade(&self.registry)),
            category,
            id,
        }
    }

    pub fn on_alarm<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&AlarmEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(EventCategory::AlarmTriggered, move |event| match event {
            MonitorEvent::AlarmTriggered(alarm) => handler(alarm),
            _ => Ok(()),
        })
    }

    pub fn on_acknowledgment<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Acknowledgment) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(EventCategory::Acknowledgment, move |event| match event {
            MonitorEvent::Acknowledgment(ack) => handler(ack),
            _ => Ok(()),
        })
    }

    pub fn on_connection_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(EventCategory::ConnectionChanged, move |event| match event {
            MonitorEvent::ConnectionChanged(status) => handler(status),
            _ => Ok(()),
        })
    }

    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ErrorEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscribe(EventCategory::Error, move |event| match event {
            MonitorEvent::Error(err) => handler(err),
            _ => Ok(()),
        })
    }

    pub fn handler_count(&self, category: EventCategory) -> usize {
        self.registry.slot(category).load().len()
    }

    /// Deliver `event` to every handler of its category, synchronously and
    /// in registration order.
    ///
    /// A handler that errors or panics does not stop delivery to the rest.
    /// Its failure is logged and, unless the event was itself an error
    /// report, re-published on [`EventCategory::Error`] as a
    /// handler-exception.
    pub fn publish(&self, event: &MonitorEvent) -> DispatchReport {
        let category = event.category();
        let handlers = self.registry.slot(category).load_full();
        let mut report = DispatchReport::default();
        let mut failures = Vec::new();

        for entry in handlers.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(event)));
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(%category, handler = entry.id, error = %e, "event handler failed");
                    failures.push(e.to_string());
                }
                Err(payload) => {
                    report.failed += 1;
                    let message = panic_message(payload.as_ref());
                    warn!(%category, handler = entry.id, panic = %message, "event handler panicked");
                    failures.push(format!("handler panicked: {message}"));
                }
            }
        }

        if category != EventCategory::Error {
            for message in failures {
                let report = ErrorEvent::new(
                    ErrorKind::HandlerException,
                    format!("{category} handler: {message}"),
                );
                self.publish(&MonitorEvent::Error(report));
            }
        }

        report
    }

    pub fn publish_alarm(&self, alarm: AlarmEvent) -> DispatchReport {
        self.publish(&MonitorEvent::AlarmTriggered(alarm))
    }

    pub fn publish_acknowledgment(&self, ack: Acknowledgment) -> DispatchReport {
        self.publish(&MonitorEvent::Acknowledgment(ack))
    }

    pub fn publish_connection(&self, status: ConnectionStatus) -> DispatchReport {
        self.publish(&MonitorEvent::ConnectionChanged(status))
    }

    pub fn publish_error(&self, error: ErrorEvent) -> DispatchReport {
        self.publish(&MonitorEvent::Error(error))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Disposable registration handle. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the handler immediately"]
pub struct Subscription {
    registry: Option<Weak<Registry>>,
    category: EventCategory,
    id: u64,
}

impl Subscription {
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Remove the handler now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Keep the handler registered for the dispatcher's whole lifetime.
    pub fn detach(mut self) {
        self.registry = None;
    }

    fn release(&mut self) {
        if let Some(registry) = self.registry.take().and_then(|w| w.upgrade()) {
            registry.remove(self.category, self.id);
            trace!(category = %self.category, id = self.id, "handler unsubscribed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("category", &self.category)
            .field("id", &self.id)
            .field("attached", &self.registry.is_some())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
