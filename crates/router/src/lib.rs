//! Chrome DevTools Protocol router
//!
//! Multiplexes many target sessions over one browser connection: pairs
//! command responses with their callers, routes events to per-session
//! listeners, and tracks session and target lifecycles.
//!
//! # Layout
//!
//! - [`cdp::protocol`]: wire envelopes and the message codec
//! - [`cdp::correlator`], [`cdp::dispatcher`], [`cdp::registry`],
//!   [`cdp::targets`]: the router's tables
//! - [`cdp::client`]: the reader loop that ties them together
//! - [`cdp::transport`]: WebSocket, pipe and in-memory transports
//! - [`events`]: lifecycle notifications and diagnostics

pub mod cdp;
pub mod config;
pub mod events;

pub use cdp::{CDPClient, CDPError, CDPSession, CommandOptions, Result};
pub use config::RouterConfig;
pub use events::{EventBus, RouterEvent};
