//! WebView test fixtures over an in-memory device.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::protocol::{Event, EventType};
use crate::transport::testing::{self, FakeDevice};
use crate::transport::{DeviceQueue, SessionRegistry};

use super::WebView;

/// Opens a WebView over an identified in-memory device.
///
/// The handshake has completed, so the session holds no waiters.
pub async fn connect() -> (WebView, FakeDevice) {
    let registry = Arc::new(SessionRegistry::new());
    let queue = Arc::new(DeviceQueue::new());
    let (_, mut device) = testing::connect(&registry, &queue).await;

    device.identify("test-device").await;
    let session = tokio::time::timeout(Duration::from_secs(5), queue.next())
        .await
        .expect("identified in time")
        .expect("queue open");

    (WebView::new(session), device)
}

/// Answers the next command the device receives.
///
/// Resolves to the device and the command it answered.
pub fn answer_next(
    mut device: FakeDevice,
    answer_type: EventType,
    content: &str,
) -> JoinHandle<(FakeDevice, Event)> {
    let content = content.to_string();
    tokio::spawn(async move {
        let command = device.recv_events().await.remove(0);
        device
            .send_events(&[Event::reply_to(&command, answer_type, content)])
            .await;
        (device, command)
    })
}
