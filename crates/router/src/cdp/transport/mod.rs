//! Transport Adapter - a duplex stream of JSON text frames
//!
//! The router only needs "send one frame" and "receive the next frame".
//! Each side is boxed so the reader task and the writers can own their half.

use async_trait::async_trait;

use super::error::Result;

pub mod memory;
pub mod pipe;
pub mod websocket;

pub use memory::{MemoryTransport, PeerHandle};
pub use pipe::PipeTransport;
pub use websocket::WebSocketTransport;

/// Write half
#[async_trait]
pub trait TransportSink: Send {
    async fn send(&mut self, message: String) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Read half
#[async_trait]
pub trait TransportStream: Send {
    /// Next complete frame. `None` once the peer has closed.
    ///
    /// Must be cancel-safe: the router polls it inside `select!`, and a
    /// dropped call must not lose bytes of the next frame.
    async fn recv(&mut self) -> Option<Result<String>>;
}

/// A connected transport, split into halves
pub struct Transport {
    pub sink: Box<dyn TransportSink>,
    pub stream: Box<dyn TransportStream>,
}

impl Transport {
    pub fn new(
        sink: impl TransportSink + 'static,
        stream: impl TransportStream + 'static,
    ) -> Self {
        Self {
            sink: Box::new(sink),
            stream: Box::new(stream),
        }
    }
}
