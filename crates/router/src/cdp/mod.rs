//! CDP (Chrome DevTools Protocol) routing
//!
//! Core principle: one transport per browser, sessions multiplexed over it.
//! The reader task owns all inbound processing; callers only register and wait.

pub mod client;
pub mod correlator;
pub mod dispatcher;
pub mod domains;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod targets;
pub mod transport;

pub use client::{CDPClient, CommandOptions};
pub use correlator::PendingCallInfo;
pub use dispatcher::{EventCallback, ListenerScope, Subscription};
pub use domains::{Command, Event};
pub use error::{CDPError, Result};
pub use protocol::{CDPEvent, CDPMessage, CDPRequest, CDPResponse, ErrorPayload};
pub use registry::{SessionInfo, SessionState};
pub use session::CDPSession;
