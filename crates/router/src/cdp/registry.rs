//! Session Registry - which sessions exist and where their events go
//!
//! Sessions move `Attaching -> Attached -> Detached` and never back.
//! Child sessions keep only their parent's id; the parent keeps a list of
//! child ids, so cascading teardown only ever walks down.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Detached ids remembered by default
pub const DEFAULT_DETACHED_LIMIT: usize = 1024;

use super::protocol::{CDPEvent, SessionId, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Announced by `Target.attachedToTarget`, attach response not seen yet
    Attaching,
    Attached,
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub target_id: TargetId,
    pub parent_session_id: Option<SessionId>,
    pub target_type: Option<String>,
    pub state: SessionState,
}

/// Invoked once when a session is torn down
pub type SessionClosedCallback = Box<dyn FnOnce(&SessionInfo) + Send>;

/// A session removed by teardown, with the listeners waiting on it
pub struct ClosedSession {
    pub info: SessionInfo,
    pub closed_listeners: Vec<SessionClosedCallback>,
}

/// What to do with an event addressed to a session
#[derive(Debug)]
pub enum Route {
    Deliver(CDPEvent),
    /// Held until the attach completes
    Queued,
    /// Held, but the queue was full and this older event fell out
    QueuedDropping(CDPEvent),
    Unknown(CDPEvent),
}

struct SessionEntry {
    info: SessionInfo,
    children: Vec<SessionId>,
    early_events: VecDeque<CDPEvent>,
    closed_listeners: Vec<SessionClosedCallback>,
}

impl SessionEntry {
    fn new(info: SessionInfo) -> Self {
        Self {
            info,
            children: Vec::new(),
            early_events: VecDeque::new(),
            closed_listeners: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionEntry>,
    /// Ids that were torn down, so late use reports `SessionClosed`.
    /// Oldest first; pruned past the registry's limit.
    detached: HashSet<SessionId>,
    detached_order: VecDeque<SessionId>,
}

impl Inner {
    fn tombstone(&mut self, session_id: SessionId, limit: usize) {
        if !self.detached.insert(session_id.clone()) {
            return;
        }
        self.detached_order.push_back(session_id);
        while self.detached_order.len() > limit {
            if let Some(oldest) = self.detached_order.pop_front() {
                self.detached.remove(&oldest);
            }
        }
    }

    fn insert(&mut self, info: SessionInfo) {
        if let Some(parent_id) = &info.parent_session_id {
            if let Some(parent) = self.sessions.get_mut(parent_id) {
                parent.children.push(info.session_id.clone());
            }
        }
        self.sessions
            .insert(info.session_id.clone(), SessionEntry::new(info));
    }
}

pub struct SessionRegistry {
    inner: Mutex<Inner>,
    early_event_limit: usize,
    detached_limit: usize,
}

impl SessionRegistry {
    pub fn new(early_event_limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            early_event_limit,
            detached_limit: DEFAULT_DETACHED_LIMIT,
        }
    }

    /// How many detached ids to remember. Older ones are forgotten and
    /// look unknown afterwards.
    pub fn with_detached_limit(mut self, limit: usize) -> Self {
        self.detached_limit = limit;
        self
    }

    /// Record a session announced by `Target.attachedToTarget`.
    ///
    /// `attach_in_flight` says whether a client-initiated attach for the
    /// target is still waiting for its response. If so the session stays
    /// `Attaching`; otherwise (auto-attach) it is usable immediately.
    /// Returns the info when the session became `Attached` by this call.
    pub fn announce(
        &self,
        session_id: &str,
        target_id: &str,
        parent_session_id: Option<SessionId>,
        target_type: Option<String>,
        attach_in_flight: bool,
    ) -> Option<SessionInfo> {
        let mut inner = self.inner.lock();
        if inner.sessions.contains_key(session_id) || inner.detached.contains(session_id) {
            return None;
        }

        let state = if attach_in_flight {
            SessionState::Attaching
        } else {
            SessionState::Attached
        };
        let info = SessionInfo {
            session_id: session_id.to_string(),
            target_id: target_id.to_string(),
            parent_session_id,
            target_type,
            state,
        };
        inner.insert(info.clone());
        (state == SessionState::Attached).then_some(info)
    }

    /// The attach response arrived: mark the session `Attached` (creating
    /// it if no announcement was seen) and hand back any queued events.
    /// The info is returned only when this call performed the transition.
    pub fn confirm_attach(
        &self,
        session_id: &str,
        target_id: &str,
        parent_session_id: Option<SessionId>,
    ) -> (Option<SessionInfo>, Vec<CDPEvent>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.detached.contains(session_id) {
            return (None, Vec::new());
        }

        match inner.sessions.get_mut(session_id) {
            Some(entry) if entry.info.state == SessionState::Attaching => {
                entry.info.state = SessionState::Attached;
                let early = entry.early_events.drain(..).collect();
                (Some(entry.info.clone()), early)
            }
            Some(_) => (None, Vec::new()),
            None => {
                let info = SessionInfo {
                    session_id: session_id.to_string(),
                    target_id: target_id.to_string(),
                    parent_session_id,
                    target_type: None,
                    state: SessionState::Attached,
                };
                inner.insert(info.clone());
                (Some(info), Vec::new())
            }
        }
    }

    /// The attach for `target_id` finished without confirming a session
    /// (error, timeout, or a result with no `sessionId`). Sessions the
    /// browser announced for it are real, so they become `Attached` and
    /// hand back their queued events.
    pub fn promote_attaching(&self, target_id: &str) -> Vec<(SessionInfo, Vec<CDPEvent>)> {
        let mut inner = self.inner.lock();
        let mut promoted: Vec<(SessionInfo, Vec<CDPEvent>)> = inner
            .sessions
            .values_mut()
            .filter(|entry| {
                entry.info.target_id == target_id && entry.info.state == SessionState::Attaching
            })
            .map(|entry| {
                entry.info.state = SessionState::Attached;
                (entry.info.clone(), entry.early_events.drain(..).collect())
            })
            .collect();
        promoted.sort_by(|a, b| a.0.session_id.cmp(&b.0.session_id));
        promoted
    }

    /// Decide what happens to an event carrying `sessionId`.
    pub fn route(&self, session_id: &str, event: CDPEvent) -> Route {
        let mut inner = self.inner.lock();
        match inner.sessions.get_mut(session_id) {
            Some(entry) => match entry.info.state {
                SessionState::Attached => Route::Deliver(event),
                SessionState::Attaching => {
                    entry.early_events.push_back(event);
                    if entry.early_events.len() > self.early_event_limit {
                        match entry.early_events.pop_front() {
                            Some(dropped) => Route::QueuedDropping(dropped),
                            None => Route::Queued,
                        }
                    } else {
                        Route::Queued
                    }
                }
                SessionState::Detached => Route::Unknown(event),
            },
            None => Route::Unknown(event),
        }
    }

    /// Remove `session_id` and all its descendants, deepest first.
    /// Returns nothing if the session is already gone.
    pub fn remove_tree(&self, session_id: &str) -> Vec<ClosedSession> {
        let mut inner = self.inner.lock();
        let Some(parent_id) = inner
            .sessions
            .get(session_id)
            .map(|entry| entry.info.parent_session_id.clone())
        else {
            return Vec::new();
        };

        if let Some(parent_id) = parent_id {
            if let Some(parent) = inner.sessions.get_mut(&parent_id) {
                parent.children.retain(|child| child != session_id);
            }
        }

        let mut order = Vec::new();
        let mut stack = vec![session_id.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(entry) = inner.sessions.get(&id) {
                stack.extend(entry.children.iter().cloned());
                order.push(id);
            }
        }

        order
            .into_iter()
            .rev()
            .filter_map(|id| {
                let mut entry = inner.sessions.remove(&id)?;
                inner.tombstone(id, self.detached_limit);
                entry.info.state = SessionState::Detached;
                Some(ClosedSession {
                    info: entry.info,
                    closed_listeners: entry.closed_listeners,
                })
            })
            .collect()
    }

    /// Remove every session. Used when the connection goes away.
    pub fn remove_all(&self) -> Vec<ClosedSession> {
        let mut inner = self.inner.lock();
        let entries: Vec<SessionEntry> = inner.sessions.drain().map(|(_, entry)| entry).collect();
        entries
            .into_iter()
            .map(|mut entry| {
                inner.tombstone(entry.info.session_id.clone(), self.detached_limit);
                entry.info.state = SessionState::Detached;
                ClosedSession {
                    info: entry.info,
                    closed_listeners: entry.closed_listeners,
                }
            })
            .collect()
    }

    /// Register a callback for when `session_id` is torn down.
    /// Hands the callback back if the session is not live.
    pub fn on_closed(
        &self,
        session_id: &str,
        callback: SessionClosedCallback,
    ) -> std::result::Result<(), SessionClosedCallback> {
        let mut inner = self.inner.lock();
        match inner.sessions.get_mut(session_id) {
            Some(entry) => {
                entry.closed_listeners.push(callback);
                Ok(())
            }
            None => Err(callback),
        }
    }

    /// `None` for ids this registry has never seen.
    pub fn state(&self, session_id: &str) -> Option<SessionState> {
        let inner = self.inner.lock();
        match inner.sessions.get(session_id) {
            Some(entry) => Some(entry.info.state),
            None if inner.detached.contains(session_id) => Some(SessionState::Detached),
            None => None,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SessionInfo> {
        self.inner
            .lock()
            .sessions
            .get(session_id)
            .map(|entry| entry.info.clone())
    }

    pub fn sessions_for_target(&self, target_id: &str) -> Vec<SessionId> {
        self.inner
            .lock()
            .sessions
            .values()
            .filter(|entry| entry.info.target_id == target_id)
            .map(|entry| entry.info.session_id.clone())
            .collect()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .lock()
            .sessions
            .values()
            .map(|entry| entry.info.clone())
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }

    pub fn children(&self, session_id: &str) -> Vec<SessionId> {
        self.inner
            .lock()
            .sessions
            .get(session_id)
            .map(|entry| entry.children.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
