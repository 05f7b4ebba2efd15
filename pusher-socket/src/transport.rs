//! Framed transport boundary over the WebSocket connection.
//!
//! The session and its loops talk to the connection through the `FrameSink`
//! and `FrameSource` traits so the protocol logic stays independent of the
//! socket implementation. The production implementation wraps the split
//! halves of a tokio-tungstenite stream; WebSocket control frames are
//! handled inside the adapter and never surface to the session.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use pusher_core::constants::MAX_FRAME_BYTES;
use pusher_core::error::{PusherError, PusherResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the framed transport.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame.
    async fn send_frame(&mut self, frame: String) -> PusherResult<()>;

    /// Close the transport. Subsequent reads on the paired source end.
    async fn close(&mut self) -> PusherResult<()>;
}

/// Read half of the framed transport.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame. `None` means the connection is closed.
    async fn next_frame(&mut self) -> Option<PusherResult<String>>;
}

/// Dial the service endpoint and split the connection into framed halves.
pub async fn dial(url: &str) -> PusherResult<(WsFrameSink, WsFrameSource)> {
    let (stream, response) = connect_async(url)
        .await
        .map_err(|e| PusherError::Transport(format!("connection failed: {e}")))?;
    debug!("websocket open, handshake status {}", response.status());

    let (sink, source) = stream.split();
    Ok((WsFrameSink { inner: sink }, WsFrameSource { inner: source }))
}

/// Production `FrameSink` over a tungstenite write half.
pub struct WsFrameSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_frame(&mut self, frame: String) -> PusherResult<()> {
        if frame.len() > MAX_FRAME_BYTES {
            return Err(PusherError::Transport(format!(
                "frame of {} bytes exceeds the {MAX_FRAME_BYTES}-byte envelope limit",
                frame.len()
            )));
        }
        self.inner
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| PusherError::Transport(format!("send failed: {e}")))
    }

    async fn close(&mut self) -> PusherResult<()> {
        self.inner
            .close()
            .await
            .map_err(|e| PusherError::Transport(format!("close failed: {e}")))
    }
}

/// Production `FrameSource` over a tungstenite read half.
pub struct WsFrameSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Option<PusherResult<String>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => {
                    if text.len() > MAX_FRAME_BYTES {
                        warn!("dropping oversized frame ({} bytes)", text.len());
                        continue;
                    }
                    return Some(Ok(text.to_string()));
                }
                Ok(Message::Binary(data)) => {
                    debug!("ignoring binary frame ({} bytes)", data.len());
                }
                // Control frames; tungstenite queues pong replies itself.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!("close frame received: {:?}", frame);
                    return None;
                }
                Err(e) => {
                    return Some(Err(PusherError::Transport(format!("receive failed: {e}"))));
                }
            }
        }
    }
}
