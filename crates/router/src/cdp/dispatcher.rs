//! Event Dispatcher - delivers protocol events to registered listeners
//!
//! Listeners are keyed by (scope, "Domain.event"). Delivery works on a
//! snapshot of the listener list, so handlers may subscribe or unsubscribe
//! while running without affecting the pass in progress.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::protocol::{CDPEvent, SessionId};

/// Event subscriber callback
pub type EventCallback = Arc<dyn Fn(&CDPEvent) + Send + Sync>;

/// Which envelopes a listener wants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ListenerScope {
    /// Events without a `sessionId` (browser connection)
    Root,
    /// Events for one attached session
    Session(SessionId),
    /// Events from every scope
    Any,
}

impl ListenerScope {
    pub fn of(session_id: Option<&str>) -> Self {
        match session_id {
            Some(id) => ListenerScope::Session(id.to_string()),
            None => ListenerScope::Root,
        }
    }

    fn is_session(&self, session_id: &str) -> bool {
        matches!(self, ListenerScope::Session(id) if id == session_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ListenerKey {
    scope: ListenerScope,
    event: String,
}

/// Handle returned by `on`; pass it to `off` to unsubscribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: u64,
    scope: ListenerScope,
    event: String,
}

impl Subscription {
    pub fn scope(&self) -> &ListenerScope {
        &self.scope
    }

    pub fn event(&self) -> &str {
        &self.event
    }
}

pub struct EventDispatcher {
    next_id: AtomicU64,
    /// Key: (scope, method name), Value: callbacks in registration order
    listeners: DashMap<ListenerKey, Vec<(u64, EventCallback)>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: DashMap::new(),
        }
    }

    /// Register `callback` for `event` within `scope`.
    pub fn on(
        &self,
        scope: ListenerScope,
        event: impl Into<String>,
        callback: EventCallback,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let event = event.into();
        self.listeners
            .entry(ListenerKey {
                scope: scope.clone(),
                event: event.clone(),
            })
            .or_default()
            .push((id, callback));
        Subscription { id, scope, event }
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn off(&self, subscription: &Subscription) -> bool {
        let key = ListenerKey {
            scope: subscription.scope.clone(),
            event: subscription.event.clone(),
        };
        let removed = match self.listeners.get_mut(&key) {
            Some(mut callbacks) => {
                let before = callbacks.len();
                callbacks.retain(|(id, _)| *id != subscription.id);
                before != callbacks.len()
            }
            None => false,
        };
        self.listeners.remove_if(&key, |_, callbacks| callbacks.is_empty());
        removed
    }

    /// Deliver `event` to its scope's listeners, then to `Any` listeners,
    /// each in registration order. Returns how many handlers ran.
    pub fn emit(&self, event: &CDPEvent) -> usize {
        let scoped = self.snapshot(ListenerScope::of(event.session_id.as_deref()), &event.method);
        let any = self.snapshot(ListenerScope::Any, &event.method);

        let mut delivered = 0;
        for callback in scoped.iter().chain(any.iter()) {
            callback(event);
            delivered += 1;
        }
        delivered
    }

    /// Drop every listener bound to `session_id`.
    pub fn clear_session(&self, session_id: &str) -> usize {
        let mut removed = 0;
        self.listeners.retain(|key, callbacks| {
            if key.scope.is_session(session_id) {
                removed += callbacks.len();
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn listener_count(&self, scope: &ListenerScope, event: &str) -> usize {
        let key = ListenerKey {
            scope: scope.clone(),
            event: event.to_string(),
        };
        self.listeners.get(&key).map(|l| l.len()).unwrap_or(0)
    }

    fn snapshot(&self, scope: ListenerScope, event: &str) -> Vec<EventCallback> {
        let key = ListenerKey {
            scope,
            event: event.to_string(),
        };
        // Guard released before any callback runs
        self.listeners
            .get(&key)
            .map(|callbacks| callbacks.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    fn event(session: Option<&str>, method: &str, params: Value) -> CDPEvent {
        CDPEvent {
            method: method.to_string(),
            params,
            session_id: session.map(str::to_string),
        }
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> EventCallback {
        let log = log.clone();
        Arc::new(move |event: &CDPEvent| {
            log.lock().push(format!("{}:{}", tag, event.params));
        })
    }

    #[test]
    fn test_single_listener_receives_params() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.on(
            ListenerScope::Session("S1".into()),
            "Page.loadEventFired",
            recorder(&log, "a"),
        );

        let delivered = dispatcher.emit(&event(
            Some("S1"),
            "Page.loadEventFired",
            json!({ "timestamp": 123 }),
        ));

        assert_eq!(delivered, 1);
        assert_eq!(*log.lock(), vec![r#"a:{"timestamp":123}"#.to_string()]);
    }

    #[test]
    fn test_registration_and_arrival_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = ListenerScope::Session("S1".into());
        dispatcher.on(scope.clone(), "Network.dataReceived", recorder(&log, "first"));
        dispatcher.on(scope, "Network.dataReceived", recorder(&log, "second"));

        dispatcher.emit(&event(Some("S1"), "Network.dataReceived", json!(1)));
        dispatcher.emit(&event(Some("S1"), "Network.dataReceived", json!(2)));

        assert_eq!(
            *log.lock(),
            vec!["first:1", "second:1", "first:2", "second:2"]
        );
    }

    #[test]
    fn test_no_listeners_is_noop() {
        let dispatcher = EventDispatcher::new();
        assert_eq!(
            dispatcher.emit(&event(Some("S9"), "Page.frameNavigated", Value::Null)),
            0
        );
    }

    #[test]
    fn test_scopes_are_isolated() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.on(ListenerScope::Root, "Target.targetCreated", recorder(&log, "root"));
        dispatcher.on(
            ListenerScope::Session("S1".into()),
            "Target.targetCreated",
            recorder(&log, "s1"),
        );
        dispatcher.on(ListenerScope::Any, "Target.targetCreated", recorder(&log, "any"));

        dispatcher.emit(&event(None, "Target.targetCreated", json!("r")));
        dispatcher.emit(&event(Some("S2"), "Target.targetCreated", json!("x")));

        assert_eq!(*log.lock(), vec![r#"root:"r""#, r#"any:"r""#, r#"any:"x""#]);
    }

    #[test]
    fn test_unsubscribe_during_delivery_keeps_current_pass() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = ListenerScope::Session("S1".into());

        let second_sub: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let remover = {
            let dispatcher = dispatcher.clone();
            let second_sub = second_sub.clone();
            let log = log.clone();
            Arc::new(move |_: &CDPEvent| {
                log.lock().push("remover".to_string());
                if let Some(sub) = second_sub.lock().take() {
                    dispatcher.off(&sub);
                }
            })
        };
        dispatcher.on(scope.clone(), "Runtime.consoleAPICalled", remover);
        let sub = dispatcher.on(
            scope.clone(),
            "Runtime.consoleAPICalled",
            recorder(&log, "victim"),
        );
        *second_sub.lock() = Some(sub);

        dispatcher.emit(&event(Some("S1"), "Runtime.consoleAPICalled", json!(1)));
        dispatcher.emit(&event(Some("S1"), "Runtime.consoleAPICalled", json!(2)));

        assert_eq!(*log.lock(), vec!["remover", "victim:1", "remover"]);
        assert_eq!(dispatcher.listener_count(&scope, "Runtime.consoleAPICalled"), 1);
    }

    #[test]
    fn test_subscribe_from_handler_does_not_deadlock() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let inner = dispatcher.clone();
        dispatcher.on(
            ListenerScope::Root,
            "Target.targetCreated",
            Arc::new(move |_: &CDPEvent| {
                inner.on(ListenerScope::Root, "Target.targetCreated", Arc::new(|_: &CDPEvent| {}));
            }),
        );

        assert_eq!(dispatcher.emit(&event(None, "Target.targetCreated", Value::Null)), 1);
        assert_eq!(dispatcher.emit(&event(None, "Target.targetCreated", Value::Null)), 2);
    }

    #[test]
    fn test_clear_session_and_off() {
        let dispatcher = EventDispatcher::new();
        let noop: EventCallback = Arc::new(|_: &CDPEvent| {});
        dispatcher.on(ListenerScope::Session("S1".into()), "A.x", noop.clone());
        dispatcher.on(ListenerScope::Session("S1".into()), "A.y", noop.clone());
        let keep = dispatcher.on(ListenerScope::Session("S2".into()), "A.x", noop);

        assert_eq!(dispatcher.clear_session("S1"), 2);
        assert_eq!(
            dispatcher.listener_count(&ListenerScope::Session("S1".into()), "A.x"),
            0
        );
        assert!(dispatcher.off(&keep));
        assert!(!dispatcher.off(&keep));
    }
}
