//! WebSocket transport (`ws://host:port/devtools/browser/<id>`)

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{Transport, TransportSink, TransportStream};
use crate::cdp::error::{CDPError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Connect to a DevTools WebSocket endpoint
    pub async fn connect(ws_url: &str) -> Result<Transport> {
        let url = Url::parse(ws_url).map_err(|e| CDPError::InvalidUrl(format!("{ws_url}: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(CDPError::InvalidUrl(format!(
                "{ws_url}: expected ws:// or wss://"
            )));
        }

        let (ws_stream, _) = connect_async(ws_url).await?;
        let (sink, stream) = ws_stream.split();
        tracing::info!("Connected to {}", url);

        Ok(Transport::new(WsSink { sink }, WsSource { stream }))
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportSink for WsSink {
    async fn send(&mut self, message: String) -> Result<()> {
        self.sink.send(Message::Text(message)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await?;
        Ok(())
    }
}

struct WsSource {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl TransportStream for WsSource {
    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map_err(|e| CDPError::Transport(format!("non-UTF-8 frame: {e}"))),
                    )
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!("WebSocket closed: {:?}", frame);
                    return None;
                }
                Ok(_) => continue, // ping/pong
                Err(e) => return Some(Err(CDPError::WebSocket(e))),
            }
        }
    }
}
