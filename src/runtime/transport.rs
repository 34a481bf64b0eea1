//! WebSocket adapters for both peers
//!
//! The telephony side arrives as an axum upgrade; the conversational-AI side
//! is dialled with tokio-tungstenite. Both are reduced to a [`Link`].

use super::traits::{FrameSink, InboundFrame, Link, TransportError};
use async_trait::async_trait;
use axum::extract::ws::{self, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::WebSocketStream;

/// Wrap an accepted telephony media-stream socket
pub fn telephony_link(socket: WebSocket) -> Link {
    let (sink, stream) = socket.split();
    let stream = stream
        .filter_map(|message| async move {
            match message {
                Ok(ws::Message::Text(text)) => Some(Ok(InboundFrame::Text(text))),
                Ok(ws::Message::Close(frame)) => Some(Ok(InboundFrame::Close(
                    frame.map(|f| f.reason.into_owned()).filter(|r| !r.is_empty()),
                ))),
                // Binary and keepalive frames carry nothing for the bridge
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::WebSocket(e.to_string()))),
            }
        })
        .boxed();

    Link {
        sink: Box::new(AxumSink(sink)),
        stream,
    }
}

struct AxumSink(SplitSink<WebSocket, ws::Message>);

#[async_trait]
impl FrameSink for AxumSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.0
            .send(ws::Message::Text(text))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0
            .close()
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }
}

/// Wrap a dialled conversational-AI socket
pub fn agent_link<S>(socket: WebSocketStream<S>) -> Link
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sink, stream) = socket.split();
    let stream = stream
        .filter_map(|message| async move {
            match message {
                Ok(tungstenite::Message::Text(text)) => {
                    Some(Ok(InboundFrame::Text(text.as_str().to_owned())))
                }
                Ok(tungstenite::Message::Close(frame)) => Some(Ok(InboundFrame::Close(
                    frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty()),
                ))),
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::WebSocket(e.to_string()))),
            }
        })
        .boxed();

    Link {
        sink: Box::new(TungsteniteSink(sink)),
        stream,
    }
}

struct TungsteniteSink<S>(SplitSink<WebSocketStream<S>, tungstenite::Message>);

#[async_trait]
impl<S> FrameSink for TungsteniteSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.0
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.0
            .close()
            .await
            .map_err(|e| TransportError::WebSocket(e.to_string()))
    }
}
