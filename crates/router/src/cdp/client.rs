//! CDP Client - The Core Communication Layer
//!
//! Design decisions:
//! 1. Single transport per browser connection, sessions multiplexed over it
//! 2. One reader task processes inbound frames strictly in order
//! 3. Request/response matching via ID, events routed per session
//! 4. Fail fast - no retries. Teardown rejects every affected call at once.

use parking_lot::Mutex as SyncMutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::correlator::{CallCorrelator, PendingCallInfo};
use super::dispatcher::{EventCallback, EventDispatcher, ListenerScope, Subscription};
use super::domains::{browser, inspector, target, Command, Event};
use super::error::{CDPError, Result};
use super::protocol::*;
use super::registry::{ClosedSession, Route, SessionInfo, SessionRegistry, SessionState};
use super::targets::TargetTree;
use super::transport::{Transport, TransportSink, TransportStream, WebSocketTransport};
use crate::config::RouterConfig;
use crate::events::{DetachReason, Diagnostic, EventBus, RouterEvent};

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Replaces the configured protocol timeout for this call
    pub timeout: Option<Duration>,
}

/// Work handed to the reader task from outside it
enum Control {
    /// An attach call for this target is over, whatever its outcome
    AttachSettled(TargetId),
}

/// Reports the end of an attach call when dropped
struct AttachGuard<'a> {
    control: &'a mpsc::UnboundedSender<Control>,
    target_id: TargetId,
}

impl Drop for AttachGuard<'_> {
    fn drop(&mut self) {
        let target_id = std::mem::take(&mut self.target_id);
        let _ = self.control.send(Control::AttachSettled(target_id));
    }
}

/// CDP Client - routes commands and events over one browser connection
pub struct CDPClient {
    config: RouterConfig,
    correlator: CallCorrelator,
    dispatcher: EventDispatcher,
    registry: SessionRegistry,
    targets: TargetTree,
    event_bus: EventBus,

    /// Transport write half
    sink: Mutex<Box<dyn TransportSink>>,
    control: mpsc::UnboundedSender<Control>,

    disconnected: AtomicBool,
    reader: SyncMutex<Option<JoinHandle<()>>>,
}

impl CDPClient {
    /// Connect to Chrome DevTools Protocol endpoint
    pub async fn connect(ws_url: &str) -> Result<Arc<Self>> {
        Self::connect_with_config(RouterConfig::default().with_ws_url(ws_url)).await
    }

    pub async fn connect_with_config(config: RouterConfig) -> Result<Arc<Self>> {
        let transport = WebSocketTransport::connect(&config.ws_url).await?;
        Ok(Self::from_transport(transport, config))
    }

    /// Start routing over an already connected transport.
    /// Must be called inside a tokio runtime.
    pub fn from_transport(transport: Transport, config: RouterConfig) -> Arc<Self> {
        let Transport { sink, stream } = transport;
        let (control, control_rx) = mpsc::unbounded_channel();

        let client = Arc::new(Self {
            correlator: CallCorrelator::new(config.max_pending_calls),
            dispatcher: EventDispatcher::new(),
            registry: SessionRegistry::new(config.early_event_limit)
                .with_detached_limit(config.detached_session_limit),
            targets: TargetTree::new(),
            event_bus: EventBus::with_capacity(config.bus_capacity),
            sink: Mutex::new(sink),
            control,
            disconnected: AtomicBool::new(false),
            reader: SyncMutex::new(None),
            config,
        });

        let reader = Self::spawn_reader(&client, stream, control_rx);
        *client.reader.lock() = Some(reader);
        client
    }

    fn spawn_reader(
        client: &Arc<Self>,
        mut stream: Box<dyn TransportStream>,
        mut control_rx: mpsc::UnboundedReceiver<Control>,
    ) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(client);
        let slow_mo = client.config.slow_mo();
        let span = tracing::info_span!("cdp", connection = %client.config.id);

        tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        // Control messages queued before a frame arrived go first
                        biased;

                        Some(control) = control_rx.recv() => {
                            let Some(client) = weak.upgrade() else {
                                break;
                            };
                            client.handle_control(control);
                        }
                        next = stream.recv() => {
                            let Some(client) = weak.upgrade() else {
                                break;
                            };
                            match next {
                                Some(Ok(text)) => {
                                    if let Some(delay) = slow_mo {
                                        tokio::time::sleep(delay).await;
                                    }
                                    client.handle_message(&text);
                                }
                                Some(Err(e)) => {
                                    tracing::error!("Transport error: {}", e);
                                    client.handle_transport_closed();
                                    break;
                                }
                                None => {
                                    tracing::info!("Transport closed");
                                    client.handle_transport_closed();
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            .instrument(span),
        )
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Send CDP request and wait for response
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
    ) -> Result<Value> {
        self.send_with_options(method, params, session_id, CommandOptions::default())
            .await
    }

    /// Untyped command on the root connection
    pub async fn send_raw(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.send_request(method, params, None).await
    }

    pub async fn send_with_options(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
        options: CommandOptions,
    ) -> Result<Value> {
        let method = method.into();
        let attach_target = if method == <target::AttachToTarget as Command>::METHOD {
            params
                .as_ref()
                .and_then(|p| p.get("targetId"))
                .and_then(Value::as_str)
                .map(str::to_string)
        } else {
            None
        };

        // Declared before `pending` so the entry is gone when the reader hears of it
        let _attach_guard = attach_target.clone().map(|target_id| AttachGuard {
            control: &self.control,
            target_id,
        });
        let pending = self
            .correlator
            .register(session_id.clone(), &method, attach_target)?;

        // Checked after registering: a concurrent teardown either cancels
        // the entry or is visible here.
        if let Some(session_id) = &session_id {
            match self.registry.state(session_id) {
                Some(SessionState::Attached) | Some(SessionState::Attaching) => {}
                Some(SessionState::Detached) => {
                    return Err(CDPError::SessionClosed {
                        session_id: session_id.clone(),
                    })
                }
                None => return Err(CDPError::UnknownSession(session_id.clone())),
            }
        }

        let request = CDPRequest {
            id: pending.id(),
            method,
            params,
            session_id,
        };
        let json = encode_command(&request)?;
        tracing::trace!(target: "cdp::send", "{}", json);
        self.sink.lock().await.send(json).await?;

        let timeout = options.timeout.or_else(|| self.config.protocol_timeout());
        pending.wait(timeout).await
    }

    /// Send a typed command on the root connection or a session
    pub async fn execute<C: Command>(
        &self,
        command: &C,
        session_id: Option<SessionId>,
    ) -> Result<C::Response> {
        let params = serde_json::to_value(command)?;
        let result = self.send_request(C::METHOD, Some(params), session_id).await?;
        decode_result::<C::Response>(C::METHOD, result)
    }

    /// Subscribe to CDP events from every session
    pub fn subscribe(&self, method: impl Into<String>, callback: EventCallback) -> Subscription {
        self.dispatcher.on(ListenerScope::Any, method, callback)
    }

    /// Subscribe within one scope. A session scope whose session is not
    /// live yields an inert subscription: nothing is registered.
    pub fn on(
        &self,
        scope: ListenerScope,
        method: impl Into<String>,
        callback: EventCallback,
    ) -> Subscription {
        let subscription = self.dispatcher.on(scope, method, callback);
        // Checked after inserting: a teardown racing this either sees the
        // listener in `clear_session` or is visible here.
        if let ListenerScope::Session(session_id) = subscription.scope() {
            if !self.is_live(session_id) {
                tracing::debug!(
                    "Ignoring {} listener for dead session {}",
                    subscription.event(),
                    session_id
                );
                self.dispatcher.off(&subscription);
            }
        }
        subscription
    }

    /// Subscribe to a typed event. Payloads that fail to parse are logged
    /// and skipped.
    pub fn on_event<E, F>(&self, scope: ListenerScope, handler: F) -> Subscription
    where
        E: Event + 'static,
        F: Fn(E) + Send + Sync + 'static,
    {
        self.on(
            scope,
            E::NAME,
            Arc::new(move |event: &CDPEvent| {
                if let Some(payload) = parse_params::<E>(event) {
                    handler(payload);
                }
            }),
        )
    }

    pub fn off(&self, subscription: &Subscription) -> bool {
        self.dispatcher.off(subscription)
    }

    /// Registered listeners for `method` in `scope`
    pub fn listener_count(&self, scope: &ListenerScope, method: &str) -> usize {
        self.dispatcher.listener_count(scope, method)
    }

    /// Lifecycle and diagnostic notifications
    pub fn lifecycle(&self) -> broadcast::Receiver<RouterEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Attach to a target from the root connection
    pub async fn attach(&self, target_id: &str) -> Result<SessionId> {
        self.attach_from(target_id, None).await
    }

    /// Attach to a target; `parent` is the session the command is sent on.
    /// The session is routable once this returns.
    pub async fn attach_from(
        &self,
        target_id: &str,
        parent: Option<SessionId>,
    ) -> Result<SessionId> {
        let result = self
            .execute(
                &target::AttachToTarget {
                    target_id: target_id.to_string(),
                    flatten: Some(true),
                },
                parent,
            )
            .await?;
        Ok(result.session_id)
    }

    /// `Target.setAutoAttach` on the root connection or a session. Targets
    /// attached this way show up as `RouterEvent::SessionAttached` with the
    /// scope's session as parent.
    pub async fn set_auto_attach(
        &self,
        session_id: Option<SessionId>,
        wait_for_debugger_on_start: bool,
    ) -> Result<()> {
        self.execute(
            &target::SetAutoAttach {
                auto_attach: true,
                wait_for_debugger_on_start,
                flatten: Some(true),
            },
            session_id,
        )
        .await?;
        Ok(())
    }

    /// Detach a session. Detaching a session that is already gone is a no-op.
    pub async fn detach(&self, session_id: &str) -> Result<()> {
        let Some(info) = self.registry.get(session_id) else {
            return Ok(());
        };

        if let Err(e) = self
            .execute(
                &target::DetachFromTarget {
                    session_id: Some(session_id.to_string()),
                },
                info.parent_session_id.clone(),
            )
            .await
        {
            tracing::debug!("Target.detachFromTarget for {} failed: {}", session_id, e);
        }

        self.teardown_session(session_id, DetachReason::Client);
        Ok(())
    }

    /// Run `callback` once when `session_id` is torn down
    pub fn on_session_closed(
        &self,
        session_id: &str,
        callback: impl FnOnce(&SessionInfo) + Send + 'static,
    ) -> Result<()> {
        self.registry
            .on_closed(session_id, Box::new(callback))
            .map_err(|_| match self.registry.state(session_id) {
                Some(_) => CDPError::SessionClosed {
                    session_id: session_id.to_string(),
                },
                None => CDPError::UnknownSession(session_id.to_string()),
            })
    }

    pub fn session_state(&self, session_id: &str) -> Option<SessionState> {
        self.registry.state(session_id)
    }

    pub fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        self.registry.get(session_id)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.sessions()
    }

    /// Direct children of a live session
    pub fn child_sessions(&self, session_id: &str) -> Vec<SessionId> {
        self.registry.children(session_id)
    }

    fn is_live(&self, session_id: &str) -> bool {
        matches!(
            self.registry.state(session_id),
            Some(SessionState::Attaching) | Some(SessionState::Attached)
        )
    }

    /// Outstanding calls, oldest id first
    pub fn pending_calls(&self) -> Vec<PendingCallInfo> {
        self.correlator.pending_calls()
    }

    pub fn is_closed(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    // ---- Target tree ----

    /// Turn on `Target.targetCreated`/`Destroyed` events and load the
    /// current target list.
    pub async fn discover_targets(&self) -> Result<Vec<target::TargetInfo>> {
        self.execute(&target::SetDiscoverTargets { discover: true }, None)
            .await?;
        self.refresh_targets().await
    }

    pub async fn refresh_targets(&self) -> Result<Vec<target::TargetInfo>> {
        let result = self.execute(&target::GetTargets {}, None).await?;
        for info in &result.target_infos {
            self.targets.upsert(info.clone());
        }
        Ok(result.target_infos)
    }

    pub async fn create_browser_context(&self) -> Result<BrowserContextId> {
        let result = self
            .execute(&target::CreateBrowserContext::default(), None)
            .await?;
        self.targets.add_context(result.browser_context_id.clone());
        tracing::debug!("Created browser context {}", result.browser_context_id);
        Ok(result.browser_context_id)
    }

    /// Dispose a context; sessions of every target inside it are torn down.
    pub async fn dispose_browser_context(&self, context_id: &str) -> Result<()> {
        self.execute(
            &target::DisposeBrowserContext {
                browser_context_id: context_id.to_string(),
            },
            None,
        )
        .await?;

        for target_id in self.targets.remove_context(context_id) {
            self.teardown_target(&target_id);
        }
        Ok(())
    }

    pub async fn create_target(
        &self,
        url: impl Into<String>,
        context_id: Option<BrowserContextId>,
    ) -> Result<TargetId> {
        let url = url.into();
        let result = self
            .execute(
                &target::CreateTarget {
                    url: url.clone(),
                    browser_context_id: context_id.clone(),
                    new_window: None,
                    background: None,
                },
                None,
            )
            .await?;

        // Discovery events carry the full info; record what we know now
        if self.targets.get(&result.target_id).is_none() {
            self.targets.upsert(target::TargetInfo {
                target_id: result.target_id.clone(),
                target_type: "page".to_string(),
                title: String::new(),
                url,
                attached: false,
                opener_id: None,
                browser_context_id: context_id,
            });
        }
        Ok(result.target_id)
    }

    /// Ask the browser to close a target. Local state follows the
    /// `Target.targetDestroyed` event.
    pub async fn close_target(&self, target_id: &str) -> Result<()> {
        self.execute(
            &target::CloseTarget {
                target_id: target_id.to_string(),
            },
            None,
        )
        .await?;
        Ok(())
    }

    pub fn targets(&self) -> Vec<target::TargetInfo> {
        self.targets.targets()
    }

    pub fn targets_in(&self, context_id: Option<&str>) -> Vec<target::TargetInfo> {
        self.targets.targets_in(context_id)
    }

    pub fn target(&self, target_id: &str) -> Option<target::TargetInfo> {
        self.targets.get(target_id)
    }

    pub fn browser_contexts(&self) -> Vec<BrowserContextId> {
        self.targets.browser_contexts()
    }

    // ---- Shutdown ----

    /// Close connection gracefully. Everything pending fails with
    /// `ConnectionClosed` before this returns.
    pub async fn close(&self) -> Result<()> {
        let result = self.sink.lock().await.close().await;
        self.handle_transport_closed();
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        result
    }

    /// `Browser.close`, then close the connection
    pub async fn close_browser(&self) -> Result<()> {
        match self.execute(&browser::Close {}, None).await {
            Ok(_) | Err(CDPError::ConnectionClosed) => {}
            Err(e) => return Err(e),
        }
        self.close().await
    }

    // ---- Inbound path (reader task only) ----

    /// Handle one incoming frame
    pub(crate) fn handle_message(&self, text: &str) {
        tracing::trace!(target: "cdp::recv", "{}", text);

        match decode(text) {
            CDPMessage::Response(response) => {
                self.handle_response(response.id, response.session_id, Ok(response.result))
            }
            CDPMessage::ResponseError {
                id,
                session_id,
                error,
            } => self.handle_response(id, session_id, Err(error)),
            CDPMessage::Event(event) => self.handle_event(event),
            CDPMessage::Malformed { raw, reason } => {
                tracing::warn!("Dropping malformed message ({}): {}", reason, raw);
                self.diagnostic(Diagnostic::Malformed { raw, reason });
            }
        }
    }

    fn handle_response(
        &self,
        id: RequestId,
        session_id: Option<SessionId>,
        outcome: std::result::Result<Value, ErrorPayload>,
    ) {
        let Some(call) = self.correlator.take(id) else {
            tracing::warn!("Received response for unknown request: {}", id);
            self.diagnostic(Diagnostic::UnknownResponse { id, session_id });
            return;
        };

        let attach_target = call.attach_target().cloned();
        match outcome {
            Ok(result) => {
                if let Some(target_id) = &attach_target {
                    match result.get("sessionId").and_then(Value::as_str) {
                        Some(new_session) => {
                            self.confirm_attach(new_session, target_id, call.session_id().cloned())
                        }
                        None => tracing::warn!("Attach to {} returned no sessionId", target_id),
                    }
                    self.settle_attach(target_id);
                }
                call.resolve(result);
            }
            Err(error) => {
                if let Some(target_id) = &attach_target {
                    self.settle_attach(target_id);
                }
                call.reject(error);
            }
        }
    }

    fn handle_control(&self, control: Control) {
        match control {
            Control::AttachSettled(target_id) => self.settle_attach(&target_id),
        }
    }

    /// No attach for `target_id` is waiting any more: sessions the browser
    /// announced for it stop queueing and get their early events.
    fn settle_attach(&self, target_id: &str) {
        for (info, early) in self.registry.promote_attaching(target_id) {
            tracing::debug!(
                "Attach to {} ended without confirming {}; flushing {} queued events",
                target_id,
                info.session_id,
                early.len()
            );
            self.publish_attached(&info);
            for event in early {
                self.dispatcher.emit(&event);
            }
        }
    }

    fn confirm_attach(&self, session_id: &str, target_id: &str, parent: Option<SessionId>) {
        let (attached, early) = self.registry.confirm_attach(session_id, target_id, parent);
        if let Some(info) = attached {
            self.publish_attached(&info);
        }
        if !early.is_empty() {
            tracing::debug!("Flushing {} queued events for {}", early.len(), session_id);
        }
        for event in early {
            self.dispatcher.emit(&event);
        }
    }

    fn handle_event(&self, event: CDPEvent) {
        self.track_lifecycle(&event);

        let Some(session_id) = event.session_id.clone() else {
            self.dispatcher.emit(&event);
            return;
        };

        match self.registry.route(&session_id, event) {
            Route::Deliver(event) => {
                self.dispatcher.emit(&event);
            }
            Route::Queued => {
                tracing::trace!("Queued event for attaching session {}", session_id);
            }
            Route::QueuedDropping(dropped) => {
                tracing::warn!(
                    "Early event queue full for {}; dropped {}",
                    session_id,
                    dropped.method
                );
                self.diagnostic(Diagnostic::EarlyEventDropped {
                    session_id,
                    method: dropped.method,
                });
            }
            Route::Unknown(event) => {
                tracing::warn!("Event {} for unknown session {}", event.method, session_id);
                self.diagnostic(Diagnostic::UnknownSession {
                    session_id,
                    method: event.method,
                });
            }
        }
    }

    /// Target-domain events drive the registry and the target tree before
    /// they reach listeners.
    fn track_lifecycle(&self, event: &CDPEvent) {
        let method = event.method.as_str();

        if method == target::AttachedToTarget::NAME {
            let Some(attached) = parse_params::<target::AttachedToTarget>(event) else {
                return;
            };
            let target_id = attached.target_info.target_id.clone();
            let in_flight = self.correlator.has_pending_attach(&target_id);
            self.targets.upsert(attached.target_info.clone());
            if let Some(info) = self.registry.announce(
                &attached.session_id,
                &target_id,
                event.session_id.clone(),
                Some(attached.target_info.target_type),
                in_flight,
            ) {
                self.publish_attached(&info);
            }
        } else if method == target::DetachedFromTarget::NAME {
            if let Some(detached) = parse_params::<target::DetachedFromTarget>(event) {
                self.teardown_session(&detached.session_id, DetachReason::Remote);
            }
        } else if method == target::TargetCreated::NAME {
            if let Some(created) = parse_params::<target::TargetCreated>(event) {
                let target_id = created.target_info.target_id.clone();
                // Already known when created locally or seen attached first
                self.targets.upsert(created.target_info);
                self.event_bus
                    .publish(RouterEvent::TargetCreated { target_id });
            }
        } else if method == target::TargetInfoChanged::NAME {
            if let Some(changed) = parse_params::<target::TargetInfoChanged>(event) {
                let target_id = changed.target_info.target_id.clone();
                self.targets.upsert(changed.target_info);
                self.event_bus
                    .publish(RouterEvent::TargetInfoChanged { target_id });
            }
        } else if method == target::TargetDestroyed::NAME {
            if let Some(destroyed) = parse_params::<target::TargetDestroyed>(event) {
                self.targets.remove_target(&destroyed.target_id);
                self.teardown_target(&destroyed.target_id);
                self.event_bus.publish(RouterEvent::TargetDestroyed {
                    target_id: destroyed.target_id,
                });
            }
        } else if method == inspector::TargetCrashed::NAME {
            if let Some(session_id) = &event.session_id {
                tracing::warn!("Target crashed in session {}", session_id);
                self.event_bus.publish(RouterEvent::TargetCrashed {
                    session_id: session_id.clone(),
                });
            }
        }
    }

    // ---- Teardown (one path for every trigger) ----

    fn teardown_session(&self, session_id: &str, reason: DetachReason) {
        for closed in self.registry.remove_tree(session_id) {
            let reason = if closed.info.session_id == session_id {
                reason.clone()
            } else {
                DetachReason::ParentDetached
            };
            self.finish_teardown(closed, reason);
        }
    }

    fn teardown_target(&self, target_id: &str) {
        for session_id in self.registry.sessions_for_target(target_id) {
            self.teardown_session(&session_id, DetachReason::TargetDestroyed);
        }
    }

    fn finish_teardown(&self, closed: ClosedSession, reason: DetachReason) {
        let ClosedSession {
            info,
            closed_listeners,
        } = closed;

        self.correlator.cancel_session(&info.session_id);
        self.dispatcher.clear_session(&info.session_id);
        for callback in closed_listeners {
            callback(&info);
        }

        tracing::debug!(
            "Session {} ({}) detached: {:?}",
            info.session_id,
            info.target_id,
            reason
        );
        self.event_bus.publish(RouterEvent::SessionDetached {
            session_id: info.session_id,
            target_id: info.target_id,
            reason,
        });
    }

    /// Fail everything and detach every session. Runs once.
    fn handle_transport_closed(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        let failed = self.correlator.close();
        for closed in self.registry.remove_all() {
            self.finish_teardown(closed, DetachReason::ConnectionClosed);
        }
        tracing::info!("Disconnected; failed {} pending calls", failed);
        self.event_bus.publish(RouterEvent::Disconnected);
    }

    fn publish_attached(&self, info: &SessionInfo) {
        tracing::debug!("Session {} attached to {}", info.session_id, info.target_id);
        self.event_bus.publish(RouterEvent::SessionAttached {
            session_id: info.session_id.clone(),
            target_id: info.target_id.clone(),
            parent_session_id: info.parent_session_id.clone(),
        });
    }

    fn diagnostic(&self, diagnostic: Diagnostic) {
        self.event_bus.publish(RouterEvent::Diagnostic(diagnostic));
    }
}

impl Drop for CDPClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

/// Commands that return nothing send `{}`; tolerate a missing result too.
fn decode_result<T: DeserializeOwned>(method: &str, result: Value) -> Result<T> {
    let result = if result.is_null() { json!({}) } else { result };
    serde_json::from_value(result).map_err(|e| CDPError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn parse_params<E: Event>(event: &CDPEvent) -> Option<E> {
    let params = if event.params.is_null() {
        json!({})
    } else {
        event.params.clone()
    };
    match serde_json::from_value(params) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!("Failed to parse {} payload: {}", event.method, e);
            None
        }
    }
}
