//! CDP Session - a handle scoped to one attached target
//!
//! Design: Lightweight wrapper around CDPClient with target-specific context.
//! All sessions share the same transport - no per-session connection overhead.

use serde_json::Value;
use std::sync::Arc;

use super::client::{CDPClient, CommandOptions};
use super::dispatcher::{EventCallback, ListenerScope, Subscription};
use super::domains::{Command, Event};
use super::error::Result;
use super::protocol::{SessionId, TargetId};
use super::registry::{SessionInfo, SessionState};

/// CDP Session bound to a specific target
#[derive(Clone)]
pub struct CDPSession {
    /// Shared CDP client
    client: Arc<CDPClient>,

    /// Target this session is attached to
    target_id: TargetId,

    /// Session ID assigned by the browser
    session_id: SessionId,
}

impl CDPSession {
    /// Attach to a target from the root connection and enable `domains`
    /// on the new session. Failed enables are logged, not fatal.
    pub async fn attach(
        client: Arc<CDPClient>,
        target_id: impl Into<TargetId>,
        domains: &[&str],
    ) -> Result<Self> {
        let target_id = target_id.into();
        let session_id = client.attach(&target_id).await?;
        let session = Self {
            client,
            target_id,
            session_id,
        };
        session.enable(domains).await;
        Ok(session)
    }

    /// Wrap a session the router already knows about (e.g. auto-attached).
    pub fn from_registry(client: Arc<CDPClient>, session_id: &str) -> Option<Self> {
        let info = client.session_info(session_id)?;
        Some(Self {
            client,
            target_id: info.target_id,
            session_id: info.session_id,
        })
    }

    /// Attach to another target using this session as the parent.
    pub async fn attach_child(&self, target_id: impl Into<TargetId>) -> Result<Self> {
        let target_id = target_id.into();
        let session_id = self
            .client
            .attach_from(&target_id, Some(self.session_id.clone()))
            .await?;
        Ok(Self {
            client: self.client.clone(),
            target_id,
            session_id,
        })
    }

    async fn enable(&self, domains: &[&str]) {
        if domains.is_empty() {
            return;
        }

        // Enable all domains in parallel
        let enables = domains
            .iter()
            .map(|domain| self.send_raw(format!("{}.enable", domain), None));
        let results = futures_util::future::join_all(enables).await;

        let failures = results.iter().filter(|r| r.is_err()).count();
        if failures > 0 {
            tracing::warn!(
                "Some domain enables failed for {}: {}/{}",
                self.session_id,
                failures,
                results.len()
            );
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn client(&self) -> &Arc<CDPClient> {
        &self.client
    }

    /// Send command within this session's context
    pub async fn send_raw(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.client
            .send_request(method, params, Some(self.session_id.clone()))
            .await
    }

    pub async fn send_with_options(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        options: CommandOptions,
    ) -> Result<Value> {
        self.client
            .send_with_options(method, params, Some(self.session_id.clone()), options)
            .await
    }

    pub async fn execute<C: Command>(&self, command: &C) -> Result<C::Response> {
        self.client
            .execute(command, Some(self.session_id.clone()))
            .await
    }

    /// Listen for `method` on this session only. The listener is dropped
    /// when the session is torn down.
    pub fn on(&self, method: impl Into<String>, callback: EventCallback) -> Subscription {
        self.client.on(self.scope(), method, callback)
    }

    pub fn on_event<E, F>(&self, handler: F) -> Subscription
    where
        E: Event + 'static,
        F: Fn(E) + Send + Sync + 'static,
    {
        self.client.on_event::<E, F>(self.scope(), handler)
    }

    pub fn off(&self, subscription: &Subscription) -> bool {
        self.client.off(subscription)
    }

    /// Fires once on teardown, whatever the cause. Fails if the session is
    /// already gone.
    pub fn on_closed(&self, callback: impl FnOnce(&SessionInfo) + Send + 'static) -> Result<()> {
        self.client.on_session_closed(&self.session_id, callback)
    }

    pub async fn detach(&self) -> Result<()> {
        self.client.detach(&self.session_id).await
    }

    pub fn state(&self) -> SessionState {
        self.client
            .session_state(&self.session_id)
            .unwrap_or(SessionState::Detached)
    }

    pub fn parent_session_id(&self) -> Option<SessionId> {
        self.client
            .session_info(&self.session_id)
            .and_then(|info| info.parent_session_id)
    }

    fn scope(&self) -> ListenerScope {
        ListenerScope::Session(self.session_id.clone())
    }
}

impl std::fmt::Debug for CDPSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CDPSession")
            .field("target_id", &self.target_id)
            .field("session_id", &self.session_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdp::domains::runtime;
    use crate::cdp::error::CDPError;
    use crate::cdp::transport::{MemoryTransport, PeerHandle};
    use crate::config::RouterConfig;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn attached(domains: &'static [&'static str]) -> (CDPSession, PeerHandle) {
        let (transport, mut peer) = MemoryTransport::pair();
        let client = CDPClient::from_transport(transport, RouterConfig::default());

        let attaching = tokio::spawn(CDPSession::attach(client, "T1", domains));
        let request = peer.next_command().await.unwrap();
        peer.respond(&request, json!({ "sessionId": "S1" }));
        for _ in domains {
            let request = peer.next_command().await.unwrap();
            assert_eq!(request.session_id.as_deref(), Some("S1"));
            if request.method == "Inspector.enable" {
                peer.respond_error(&request, -32000, "not available");
            } else {
                peer.respond(&request, json!({}));
            }
        }
        (attaching.await.unwrap().unwrap(), peer)
    }

    #[tokio::test]
    async fn test_attach_enables_domains() {
        let (session, _peer) = attached(&["Page", "Inspector"]).await;
        assert_eq!(session.session_id(), "S1");
        assert_eq!(session.target_id(), "T1");
        assert_eq!(session.state(), SessionState::Attached);
        assert_eq!(session.parent_session_id(), None);
    }

    #[tokio::test]
    async fn test_execute_on_session() {
        let (session, mut peer) = attached(&[]).await;

        let evaluating = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .execute(&runtime::Evaluate {
                        expression: "1 + 1".into(),
                        return_by_value: Some(true),
                        await_promise: None,
                    })
                    .await
            })
        };
        let request = peer.next_command().await.unwrap();
        assert_eq!(request.method, "Runtime.evaluate");
        assert_eq!(request.session_id.as_deref(), Some("S1"));
        peer.respond(&request, json!({ "result": { "type": "number", "value": 2 } }));

        let result = evaluating.await.unwrap().unwrap();
        assert_eq!(result.result["value"], 2);
        assert!(result.exception_details.is_none());
    }

    #[tokio::test]
    async fn test_child_session_and_detach() {
        let (session, mut peer) = attached(&[]).await;

        let attaching = {
            let session = session.clone();
            tokio::spawn(async move { session.attach_child("W1").await })
        };
        let request = peer.next_command().await.unwrap();
        assert_eq!(request.session_id.as_deref(), Some("S1"));
        peer.respond(&request, json!({ "sessionId": "S2" }));
        let child = attaching.await.unwrap().unwrap();
        assert_eq!(child.parent_session_id().as_deref(), Some("S1"));

        let child_closed = Arc::new(AtomicBool::new(false));
        let flag = child_closed.clone();
        child
            .on_closed(move |info| {
                assert_eq!(info.session_id, "S2");
                flag.store(true, Ordering::SeqCst);
            })
            .unwrap();

        let detaching = {
            let session = session.clone();
            tokio::spawn(async move { session.detach().await })
        };
        let request = peer.next_command().await.unwrap();
        assert_eq!(request.method, "Target.detachFromTarget");
        peer.respond(&request, json!({}));
        detaching.await.unwrap().unwrap();

        assert!(child_closed.load(Ordering::SeqCst));
        assert_eq!(child.state(), SessionState::Detached);
        assert!(matches!(
            child.send_raw("Runtime.enable", None).await,
            Err(CDPError::SessionClosed { .. })
        ));
        assert!(child.on_closed(|_| {}).is_err());
    }
}
