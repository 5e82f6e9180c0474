//! In-memory device peer for unit tests.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::DuplexStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

use crate::protocol::{Event, EventType, decode_message, encode_events};

use super::connection::{Session, SessionOptions};
use super::registry::{DeviceQueue, SessionRegistry};

const RECV_LIMIT: Duration = Duration::from_secs(5);

/// Opens a session over an in-memory pipe with default options.
pub async fn connect(
    registry: &Arc<SessionRegistry>,
    queue: &Arc<DeviceQueue>,
) -> (Session, FakeDevice) {
    connect_with(registry, queue, SessionOptions::default()).await
}

/// Opens a session over an in-memory pipe.
pub async fn connect_with(
    registry: &Arc<SessionRegistry>,
    queue: &Arc<DeviceQueue>,
    options: SessionOptions,
) -> (Session, FakeDevice) {
    let (server_io, device_io) = tokio::io::duplex(64 * 1024);
    let server_ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
    let device_ws = WebSocketStream::from_raw_socket(device_io, Role::Client, None).await;

    let session = Session::spawn(server_ws, None, options, registry, queue.clone())
        .expect("spawn session");

    (session, FakeDevice { ws: device_ws })
}

/// Device end of an in-memory session.
pub struct FakeDevice {
    ws: WebSocketStream<DuplexStream>,
}

impl FakeDevice {
    pub async fn send_events(&mut self, events: &[Event]) {
        let text = encode_events(events).expect("encode");
        self.send_text(&text).await;
    }

    pub async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("device send");
    }

    /// Completes the handshake.
    pub async fn identify(&mut self, device_id: &str) {
        let content = json!({ "device_id": device_id }).to_string();
        self.send_events(&[Event::command(EventType::DeviceInfo, content)])
            .await;
    }

    /// Waits for the next message from the session.
    pub async fn recv_events(&mut self) -> Vec<Event> {
        loop {
            let message = tokio::time::timeout(RECV_LIMIT, self.ws.next())
                .await
                .expect("message in time")
                .expect("stream open")
                .expect("websocket ok");

            if let Message::Text(text) = message {
                return decode_message(text.as_str()).expect("decode");
            }
        }
    }

    /// Returns `true` once the session closed its end.
    pub async fn is_disconnected(&mut self) -> bool {
        loop {
            match tokio::time::timeout(RECV_LIMIT, self.ws.next()).await {
                Ok(None | Some(Err(_)) | Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
                Err(_) => return false,
            }
        }
    }

    /// Closes the device end.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

/// Polls `condition` until it holds, failing the test after a bound.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(RECV_LIMIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition in time");
}
