//! In-memory transport with a scriptable peer
//!
//! `PeerHandle` plays the browser: it reads the commands the router wrote
//! and pushes responses and events back.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{Transport, TransportSink, TransportStream};
use crate::cdp::error::{CDPError, Result};
use crate::cdp::protocol::{
    encode_message, CDPEvent, CDPMessage, CDPRequest, CDPResponse, ErrorPayload, RequestId,
};

pub struct MemoryTransport;

impl MemoryTransport {
    pub fn pair() -> (Transport, PeerHandle) {
        let (to_router, from_peer) = mpsc::unbounded_channel();
        let (to_peer, from_router) = mpsc::unbounded_channel();
        (
            Transport::new(
                MemorySink { tx: Some(to_peer) },
                MemorySource { rx: from_peer },
            ),
            PeerHandle {
                tx: Some(to_router),
                rx: from_router,
            },
        )
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl TransportSink for MemorySink {
    async fn send(&mut self, message: String) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(CDPError::ConnectionClosed)?;
        tx.send(message).map_err(|_| CDPError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

struct MemorySource {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl TransportStream for MemorySource {
    async fn recv(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }
}

/// The browser end of a `MemoryTransport`
pub struct PeerHandle {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl PeerHandle {
    /// Next command the router wrote, or `None` once its sink is closed.
    pub async fn next_command(&mut self) -> Option<CDPRequest> {
        let raw = self.rx.recv().await?;
        match serde_json::from_str(&raw) {
            Ok(request) => Some(request),
            Err(e) => {
                tracing::error!("Peer received unparseable command {}: {}", raw, e);
                None
            }
        }
    }

    /// Push raw text to the router, bypassing the codec.
    pub fn send_raw(&self, text: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(text.into());
        }
    }

    pub fn respond(&self, request: &CDPRequest, result: Value) {
        self.respond_to(request.id, request.session_id.clone(), result);
    }

    pub fn respond_to(&self, id: RequestId, session_id: Option<String>, result: Value) {
        self.send_raw(encode_message(&CDPMessage::Response(CDPResponse {
            id,
            session_id,
            result,
        })));
    }

    pub fn respond_error(&self, request: &CDPRequest, code: i64, message: &str) {
        self.send_raw(encode_message(&CDPMessage::ResponseError {
            id: request.id,
            session_id: request.session_id.clone(),
            error: ErrorPayload {
                code,
                message: message.to_string(),
                data: None,
            },
        }));
    }

    pub fn emit(&self, session_id: Option<&str>, method: &str, params: Value) {
        self.send_raw(encode_message(&CDPMessage::Event(CDPEvent {
            method: method.to_string(),
            params,
            session_id: session_id.map(str::to_string),
        })));
    }

    /// Close the browser side; the router sees end-of-stream.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pair_carries_frames_both_ways() {
        let (mut transport, mut peer) = MemoryTransport::pair();

        transport
            .sink
            .send(r#"{"id":1,"method":"Target.getTargets"}"#.to_string())
            .await
            .unwrap();
        let request = peer.next_command().await.unwrap();
        assert_eq!(request.method, "Target.getTargets");

        peer.respond(&request, json!({ "targetInfos": [] }));
        let frame = transport.stream.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"id":1,"result":{"targetInfos":[]}}"#);

        peer.close();
        assert!(transport.stream.recv().await.is_none());

        transport.sink.close().await.unwrap();
        assert!(peer.next_command().await.is_none());
        assert!(matches!(
            transport.sink.send("{}".to_string()).await,
            Err(CDPError::ConnectionClosed)
        ));
    }
}
