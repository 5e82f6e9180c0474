//! End-to-end device session over a real WebSocket connection.
//!
//! A scripted device connects to a running [`Driver`], identifies, and
//! answers commands the way a WebView host does.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use fakeweb::protocol::{decode_message, encode_events};
use fakeweb::{Driver, Error, Event, EventType, LoadState, WebView, WebViewSettings};

const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Scripted Device
// ============================================================================

/// Everything the scripted device received.
type Received = Arc<Mutex<Vec<Event>>>;

/// Connects a device that answers commands and forwards pushes from the test.
async fn spawn_device(
    ws_url: &str,
    device_id: &str,
) -> anyhow::Result<(mpsc::UnboundedSender<Event>, Received, JoinHandle<()>)> {
    let (mut ws, _) = connect_async(ws_url).await.context("connect")?;

    let hello = Event::command(EventType::DeviceInfo, json!({ "device_id": device_id }).to_string());
    ws.send(Message::Text(encode_events(&[hello])?.into())).await?;

    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Event>();
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                message = ws.next() => {
                    let Some(Ok(Message::Text(text))) = message else { break };
                    let Ok(commands) = decode_message(text.as_str()) else { continue };

                    let mut answers = Vec::new();
                    for command in commands {
                        if let Some(answer) = answer(&command) {
                            answers.push(answer);
                        }
                        log.lock().push(command);
                    }
                    if !answers.is_empty() {
                        let text = encode_events(&answers).expect("encode");
                        if ws.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                }
                push = push_rx.recv() => {
                    let Some(event) = push else {
                        let _ = ws.close(None).await;
                        break;
                    };
                    let text = encode_events(&[event]).expect("encode");
                    if ws.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    Ok((push_tx, received, task))
}

/// The device's answer to a command, if it answers.
fn answer(command: &Event) -> Option<Event> {
    let (event_type, content) = match command.event_type {
        EventType::EvalJs if command.content == "1+1" => (EventType::EvalJsCallback, "2"),
        EventType::EvalJs if command.content == "hang()" => return None,
        EventType::EvalJs => (EventType::EvalJsFailure, "ReferenceError"),
        EventType::CookieGet => (EventType::CookieGetCallback, "sid=42"),
        EventType::CookieRemoveAll => (EventType::CookieRemoveAllCallback, "true"),
        _ => return None,
    };
    Some(Event::reply_to(command, event_type, content))
}

async fn wait_for_waiter(webview: &WebView) -> anyhow::Result<()> {
    tokio::time::timeout(WAIT, async {
        while webview.session().correlator().pending_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("waiter registered in time")
}

async fn wait_for_page_listener(webview: &WebView) -> anyhow::Result<()> {
    let correlator = webview.session().correlator();
    tokio::time::timeout(WAIT, async {
        while correlator.hook_count(EventType::PageFinished) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("page load wait started in time")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_session() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("fakeweb=debug")
        .with_test_writer()
        .try_init();

    let driver = Driver::builder().port(0).build().await?;
    let (push, received, _device) = spawn_device(&driver.ws_url(), "pixel-7").await?;

    let webview = tokio::time::timeout(WAIT, driver.accept()).await??;
    assert_eq!(webview.device_id().as_deref(), Some("pixel-7"));

    // Hooks observe pushes.
    let network = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&network);
    webview.hook_network(move |log| sink.lock().push(log.to_string()));

    // Settings and navigation.
    webview
        .settings(&WebViewSettings::new().with_user_agent("ua/1.0"))
        .await?;
    webview.start("http://x").await?;

    let load = tokio::spawn({
        let webview = webview.clone();
        async move { webview.loaded(Some(WAIT)).await }
    });
    wait_for_page_listener(&webview).await?;
    let unrelated_timeout = json!({
        "code": -8,
        "msg": "net::ERR_TIMED_OUT",
        "request": {"uri": "http://cdn.other/app.js", "method": "GET", "requestHeaders": {}}
    });
    push.send(Event::command(EventType::ReceivedError, unrelated_timeout.to_string()))?;
    push.send(Event::command(EventType::NetworkLog, "GET http://x"))?;
    push.send(Event::command(EventType::PageFinished, "http://x"))?;
    assert_eq!(load.await??, LoadState::Finished);

    // Request/response commands.
    assert_eq!(webview.execute_js("1+1", Some(WAIT)).await?.as_deref(), Some("2"));
    match webview.execute_js("nope()", Some(WAIT)).await {
        Err(Error::Execution { event_type, payload }) => {
            assert_eq!(event_type, EventType::EvalJsFailure);
            assert_eq!(payload, "ReferenceError");
        }
        other => bail!("expected an execution error, got {other:?}"),
    }
    assert_eq!(
        webview.get_cookies("http://x", Some(WAIT)).await?.as_deref(),
        Some("sid=42")
    );
    assert_eq!(
        webview.remove_all_cookies(Some(WAIT)).await?.as_deref(),
        Some("true")
    );
    assert!(
        webview
            .execute_js("hang()", Some(Duration::from_millis(50)))
            .await?
            .is_none()
    );

    assert_eq!(*network.lock(), vec!["GET http://x".to_string()]);

    let types: Vec<EventType> = received.lock().iter().map(|e| e.event_type).collect();
    assert_eq!(
        &types[..3],
        &[EventType::Settings, EventType::Settings, EventType::Start]
    );

    webview.close().await?;
    driver.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_disconnect_fails_pending_commands() -> anyhow::Result<()> {
    let driver = Driver::builder().port(0).build().await?;
    let (push, _received, device) = spawn_device(&driver.ws_url(), "pixel-8").await?;
    let webview = tokio::time::timeout(WAIT, driver.accept()).await??;

    let pending = tokio::spawn({
        let webview = webview.clone();
        async move { webview.execute_js("hang()", None).await }
    });
    wait_for_waiter(&webview).await?;

    drop(push);
    device.await?;

    assert!(matches!(pending.await?, Err(Error::ConnectionClosed)));
    tokio::time::timeout(WAIT, webview.closed()).await?;
    assert!(webview.is_closed());
    assert!(driver.webviews().is_empty());

    driver.shutdown();
    Ok(())
}

#[tokio::test]
async fn test_devices_are_accepted_in_identification_order() -> anyhow::Result<()> {
    let driver = Driver::builder().port(0).build().await?;

    let (_a, _, _da) = spawn_device(&driver.ws_url(), "first").await?;
    let first = tokio::time::timeout(WAIT, driver.accept()).await??;
    let (_b, _, _db) = spawn_device(&driver.ws_url(), "second").await?;
    let second = tokio::time::timeout(WAIT, driver.accept()).await??;

    assert_eq!(first.device_id().as_deref(), Some("first"));
    assert_eq!(second.device_id().as_deref(), Some("second"));
    assert_eq!(driver.webviews().len(), 2);
    assert_eq!(driver.connection_count(), 2);

    driver.shutdown();
    Ok(())
}
