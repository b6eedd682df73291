//! Pipe transport: frames separated by a delimiter byte
//!
//! Chrome's `--remote-debugging-pipe` uses NUL; some proxies use newlines.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::{Transport, TransportSink, TransportStream};
use crate::cdp::error::{CDPError, Result};

pub const NUL_DELIMITER: u8 = b'\0';
pub const NEWLINE_DELIMITER: u8 = b'\n';

pub struct PipeTransport;

impl PipeTransport {
    /// NUL-delimited, as Chrome speaks it
    pub fn new<R, W>(reader: R, writer: W) -> Transport
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::with_delimiter(reader, writer, NUL_DELIMITER)
    }

    pub fn with_delimiter<R, W>(reader: R, writer: W, delimiter: u8) -> Transport
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Transport::new(
            PipeSink { writer, delimiter },
            PipeSource {
                reader: BufReader::new(reader),
                delimiter,
                buf: Vec::new(),
            },
        )
    }
}

struct PipeSink<W> {
    writer: W,
    delimiter: u8,
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> TransportSink for PipeSink<W> {
    async fn send(&mut self, message: String) -> Result<()> {
        let mut frame = message.into_bytes();
        frame.push(self.delimiter);
        self.writer.write_all(&frame).await.map_err(io_error)?;
        self.writer.flush().await.map_err(io_error)
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(io_error)
    }
}

struct PipeSource<R> {
    reader: BufReader<R>,
    delimiter: u8,
    buf: Vec<u8>,
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> TransportStream for PipeSource<R> {
    async fn recv(&mut self) -> Option<Result<String>> {
        // Partial reads stay in `buf` if this future is dropped
        loop {
            match self.reader.read_until(self.delimiter, &mut self.buf).await {
                Ok(0) if self.buf.is_empty() => return None,
                Ok(_) => {
                    let mut frame = std::mem::take(&mut self.buf);
                    if frame.last() == Some(&self.delimiter) {
                        frame.pop();
                    }
                    if frame.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Some(
                        String::from_utf8(frame)
                            .map_err(|e| CDPError::Transport(format!("non-UTF-8 frame: {e}"))),
                    );
                }
                Err(e) => return Some(Err(io_error(e))),
            }
        }
    }
}

fn io_error(e: std::io::Error) -> CDPError {
    CDPError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, AsyncReadExt};

    #[tokio::test]
    async fn test_nul_framing() {
        let (ours, theirs) = duplex(1024);
        let (our_read, our_write) = split(ours);
        let (mut their_read, mut their_write) = split(theirs);
        let mut transport = PipeTransport::new(our_read, our_write);

        transport.sink.send("{\"id\":1}".to_string()).await.unwrap();
        let mut buf = [0u8; 9];
        their_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"{\"id\":1}\0");

        their_write
            .write_all(b"{\"id\":1,\"result\":{}}\0{\"method\":\"A.b\"}\0")
            .await
            .unwrap();
        assert_eq!(
            transport.stream.recv().await.unwrap().unwrap(),
            "{\"id\":1,\"result\":{}}"
        );
        assert_eq!(
            transport.stream.recv().await.unwrap().unwrap(),
            "{\"method\":\"A.b\"}"
        );

        drop(their_write);
        drop(their_read);
        assert!(transport.stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_newline_framing_skips_blank_lines() {
        let (ours, theirs) = duplex(1024);
        let (our_read, our_write) = split(ours);
        let (_their_read, mut their_write) = split(theirs);
        let mut transport = PipeTransport::with_delimiter(our_read, our_write, NEWLINE_DELIMITER);

        their_write.write_all(b"\n{\"method\":\"A.b\"}\n").await.unwrap();
        assert_eq!(
            transport.stream.recv().await.unwrap().unwrap(),
            "{\"method\":\"A.b\"}"
        );
    }

    #[tokio::test]
    async fn test_trailing_frame_without_delimiter() {
        let (ours, theirs) = duplex(1024);
        let (our_read, our_write) = split(ours);
        let (their_read, mut their_write) = split(theirs);
        let mut transport = PipeTransport::new(our_read, our_write);

        their_write.write_all(b"{\"id\":2}").await.unwrap();
        drop(their_write);
        drop(their_read);
        assert_eq!(transport.stream.recv().await.unwrap().unwrap(), "{\"id\":2}");
        assert!(transport.stream.recv().await.is_none());
    }
}
