//! Call Correlator - pairs responses with the commands that caused them
//!
//! Ids come from one counter per connection, shared by every session.
//! The pending table and its `closed` flag sit under a single lock so a
//! call can never be registered after the connection has been drained.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use super::error::{CDPError, Result};
use super::protocol::{ErrorPayload, RequestId, SessionId, TargetId};

type Outcome = Result<Value>;

/// An outstanding command awaiting its response
#[derive(Debug)]
pub struct PendingCall {
    id: RequestId,
    session_id: Option<SessionId>,
    method: String,
    created_at: Instant,
    /// Set for `Target.attachToTarget` so the response can register the session
    attach_target: Option<TargetId>,
    tx: oneshot::Sender<Outcome>,
}

impl PendingCall {
    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn attach_target(&self) -> Option<&TargetId> {
        self.attach_target.as_ref()
    }

    pub fn resolve(self, result: Value) {
        let _ = self.tx.send(Ok(result)); // Receiver may have given up
    }

    pub fn reject(self, error: ErrorPayload) {
        let err = CDPError::protocol(&self.method, error);
        self.fail(err);
    }

    pub fn fail(self, err: CDPError) {
        let _ = self.tx.send(Err(err));
    }
}

/// Snapshot of a pending call, for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCallInfo {
    pub id: RequestId,
    pub method: String,
    pub session_id: Option<SessionId>,
    pub age: Duration,
}

/// Caller's side of a registered call. Dropping it before the outcome
/// arrives removes the pending entry.
pub struct PendingHandle<'a> {
    correlator: &'a CallCorrelator,
    id: RequestId,
    method: String,
    rx: oneshot::Receiver<Outcome>,
    done: bool,
}

impl PendingHandle<'_> {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the outcome. On timeout only this call fails.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<Value> {
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut self.rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.done = true;
                    if !self.correlator.forget(self.id) {
                        // Response raced the timer
                        if let Ok(outcome) = self.rx.try_recv() {
                            return outcome;
                        }
                    }
                    tracing::warn!("{} (id {}) timed out after {:?}", self.method, self.id, limit);
                    return Err(CDPError::Timeout {
                        method: std::mem::take(&mut self.method),
                        timeout: limit,
                    });
                }
            },
            None => (&mut self.rx).await,
        };
        self.done = true;

        // Sender dropped without an outcome only happens on teardown
        received.unwrap_or(Err(CDPError::ConnectionClosed))
    }
}

impl Drop for PendingHandle<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.correlator.forget(self.id);
        }
    }
}

#[derive(Default)]
struct PendingTable {
    calls: HashMap<RequestId, PendingCall>,
    closed: bool,
}

pub struct CallCorrelator {
    /// Monotonic request ID counter
    next_id: AtomicU64,
    table: Mutex<PendingTable>,
    max_pending: Option<usize>,
}

impl CallCorrelator {
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            table: Mutex::new(PendingTable::default()),
            max_pending,
        }
    }

    /// Allocate an id and record the call. Must happen before the frame is
    /// written so a fast response always finds its entry.
    pub fn register(
        &self,
        session_id: Option<SessionId>,
        method: &str,
        attach_target: Option<TargetId>,
    ) -> Result<PendingHandle<'_>> {
        let mut table = self.table.lock();
        if table.closed {
            return Err(CDPError::ConnectionClosed);
        }
        if let Some(max) = self.max_pending {
            if table.calls.len() >= max {
                tracing::warn!(
                    pending = table.calls.len(),
                    max_pending = max,
                    "too many pending calls; refusing {}",
                    method
                );
                return Err(CDPError::Transport("too many pending calls".to_string()));
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        table.calls.insert(
            id,
            PendingCall {
                id,
                session_id,
                method: method.to_string(),
                created_at: Instant::now(),
                attach_target,
                tx,
            },
        );
        Ok(PendingHandle {
            correlator: self,
            id,
            method: method.to_string(),
            rx,
            done: false,
        })
    }

    /// Remove the pending call for `id`, if any.
    pub fn take(&self, id: RequestId) -> Option<PendingCall> {
        self.table.lock().calls.remove(&id)
    }

    /// Fulfil call `id`. Returns false if nothing was waiting on it.
    pub fn resolve(&self, id: RequestId, result: Value) -> bool {
        match self.take(id) {
            Some(call) => {
                call.resolve(result);
                true
            }
            None => false,
        }
    }

    /// Fail call `id` with a protocol error. Returns false if nothing was waiting on it.
    pub fn reject(&self, id: RequestId, error: ErrorPayload) -> bool {
        match self.take(id) {
            Some(call) => {
                call.reject(error);
                true
            }
            None => false,
        }
    }

    /// Fail every call scoped to `session_id` with `SessionClosed`.
    pub fn cancel_session(&self, session_id: &str) -> usize {
        let cancelled: Vec<PendingCall> = {
            let mut table = self.table.lock();
            let ids: Vec<RequestId> = table
                .calls
                .values()
                .filter(|call| call.session_id.as_deref() == Some(session_id))
                .map(|call| call.id)
                .collect();
            ids.into_iter()
                .filter_map(|id| table.calls.remove(&id))
                .collect()
        };

        let count = cancelled.len();
        for call in cancelled {
            call.fail(CDPError::SessionClosed {
                session_id: session_id.to_string(),
            });
        }
        if count > 0 {
            tracing::debug!("Cancelled {} pending calls for session {}", count, session_id);
        }
        count
    }

    /// Fail every call with `ConnectionClosed` and refuse new ones. Terminal.
    pub fn close(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut table = self.table.lock();
            table.closed = true;
            table.calls.drain().map(|(_, call)| call).collect()
        };

        let count = drained.len();
        for call in drained {
            call.fail(CDPError::ConnectionClosed);
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }

    pub fn pending_count(&self) -> usize {
        self.table.lock().calls.len()
    }

    /// Outstanding calls ordered by id
    pub fn pending_calls(&self) -> Vec<PendingCallInfo> {
        let now = Instant::now();
        let mut calls: Vec<PendingCallInfo> = self
            .table
            .lock()
            .calls
            .values()
            .map(|call| PendingCallInfo {
                id: call.id,
                method: call.method.clone(),
                session_id: call.session_id.clone(),
                age: now.duration_since(call.created_at),
            })
            .collect();
        calls.sort_by_key(|call| call.id);
        calls
    }

    /// Whether a `Target.attachToTarget` for `target_id` is awaiting its response.
    pub fn has_pending_attach(&self, target_id: &str) -> bool {
        self.table
            .lock()
            .calls
            .values()
            .any(|call| call.attach_target.as_deref() == Some(target_id))
    }

    /// Drop the entry for `id` without completing it.
    pub fn forget(&self, id: RequestId) -> bool {
        self.take(id).is_some()
    }
}

impl Default for CallCorrelator {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_ids_are_monotonic_across_sessions() {
        let correlator = CallCorrelator::default();
        let a = correlator.register(None, "Browser.getVersion", None).unwrap();
        let b = correlator
            .register(Some("S1".into()), "Page.enable", None)
            .unwrap();
        let c = correlator
            .register(Some("S2".into()), "Page.enable", None)
            .unwrap();
        assert_eq!((a.id(), b.id(), c.id()), (1, 2, 3));
        assert_eq!(correlator.pending_count(), 3);
    }

    #[tokio::test]
    async fn test_out_of_order_responses_pair_correctly() {
        let correlator = CallCorrelator::default();
        let first = correlator.register(None, "A.first", None).unwrap();
        let second = correlator.register(None, "A.second", None).unwrap();
        let (first_id, second_id) = (first.id(), second.id());

        assert!(correlator.resolve(second_id, json!({ "who": "second" })));
        assert!(correlator.resolve(first_id, json!({ "who": "first" })));

        let first = first.wait(None).await.unwrap();
        let second = second.wait(None).await.unwrap();
        assert_eq!(first["who"], "first");
        assert_eq!(second["who"], "second");
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reject_carries_method_and_code() {
        let correlator = CallCorrelator::default();
        for _ in 0..6 {
            let pending = correlator.register(None, "Noop.call", None).unwrap();
            correlator.resolve(pending.id(), Value::Null);
        }
        let pending = correlator.register(None, "Foo.bar", None).unwrap();
        assert_eq!(pending.id(), 7);

        correlator.reject(
            7,
            ErrorPayload {
                code: -32601,
                message: "'Foo.bar' wasn't found".into(),
                data: None,
            },
        );

        match pending.wait(None).await {
            Err(CDPError::Protocol { method, code, .. }) => {
                assert_eq!(method, "Foo.bar");
                assert_eq!(code, -32601);
            }
            other => panic!("Expected protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_wait_stays_pending_until_response() {
        let correlator = CallCorrelator::default();
        let pending = correlator.register(None, "Page.navigate", None).unwrap();
        let id = pending.id();

        let mut wait = tokio_test::task::spawn(pending.wait(None));
        tokio_test::assert_pending!(wait.poll());

        assert!(correlator.resolve(id, json!({ "frameId": "F1" })));
        assert!(wait.is_woken());
        let result = tokio_test::assert_ready_ok!(wait.poll());
        assert_eq!(result["frameId"], "F1");
    }

    #[test]
    fn test_unknown_id_is_reported() {
        let correlator = CallCorrelator::default();
        assert!(!correlator.resolve(99, Value::Null));
        assert!(correlator.take(99).is_none());
    }

    #[tokio::test]
    async fn test_cancel_session_only_touches_that_session() {
        let correlator = CallCorrelator::default();
        let s1 = correlator
            .register(Some("S1".into()), "Page.reload", None)
            .unwrap();
        let s2 = correlator
            .register(Some("S2".into()), "Page.reload", None)
            .unwrap();
        let root = correlator.register(None, "Target.getTargets", None).unwrap();

        assert_eq!(correlator.cancel_session("S1"), 1);
        assert!(matches!(
            s1.wait(None).await,
            Err(CDPError::SessionClosed { session_id }) if session_id == "S1"
        ));

        let remaining: Vec<_> = correlator.pending_calls().into_iter().map(|c| c.id).collect();
        assert_eq!(remaining, vec![s2.id(), root.id()]);
    }

    #[tokio::test]
    async fn test_close_fails_everything_and_is_terminal() {
        let correlator = CallCorrelator::default();
        let pending: Vec<_> = (0..5)
            .map(|_| correlator.register(None, "Runtime.evaluate", None).unwrap())
            .collect();

        assert_eq!(correlator.close(), 5);
        for p in pending {
            assert!(matches!(p.wait(None).await, Err(CDPError::ConnectionClosed)));
        }
        assert!(matches!(
            correlator.register(None, "Runtime.evaluate", None),
            Err(CDPError::ConnectionClosed)
        ));
        assert!(correlator.is_closed());
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_call() {
        let correlator = CallCorrelator::default();
        let slow = correlator.register(None, "Page.printToPDF", None).unwrap();
        let other = correlator.register(None, "Page.enable", None).unwrap();
        let other_id = other.id();

        let err = slow
            .wait(Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, CDPError::Timeout { ref method, .. } if method == "Page.printToPDF"));
        assert_eq!(correlator.pending_count(), 1);

        correlator.resolve(other_id, json!({}));
        assert!(other.wait(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_handle_forgets_entry() {
        let correlator = CallCorrelator::default();
        let pending = correlator.register(None, "Page.enable", None).unwrap();
        drop(pending);
        assert_eq!(correlator.pending_count(), 0);

        let pending = correlator.register(None, "Page.enable", None).unwrap();
        let _ = tokio::time::timeout(Duration::from_millis(5), pending.wait(None)).await;
        assert_eq!(correlator.pending_count(), 0);

        // A handle that already completed leaves nothing behind either
        let pending = correlator.register(None, "Page.enable", None).unwrap();
        correlator.resolve(pending.id(), Value::Null);
        assert!(pending.wait(None).await.is_ok());
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_max_pending_guard() {
        let correlator = CallCorrelator::new(Some(1));
        let _first = correlator.register(None, "A.a", None).unwrap();
        assert!(matches!(
            correlator.register(None, "A.b", None),
            Err(CDPError::Transport(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_and_resolve() {
        let correlator = Arc::new(CallCorrelator::default());
        let mut tasks = Vec::new();

        for n in 0..64u64 {
            let correlator = correlator.clone();
            tasks.push(tokio::spawn(async move {
                let pending = correlator
                    .register(Some(format!("S{}", n % 4)), "Runtime.evaluate", None)
                    .unwrap();
                let id = pending.id();
                let resolver = correlator.clone();
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    resolver.resolve(id, json!({ "id": id }));
                });
                let value = pending.wait(None).await.unwrap();
                assert_eq!(value["id"], id);
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(correlator.pending_count(), 0);
    }
}
