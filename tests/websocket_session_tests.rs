use fapi_connector::core::errors::ExchangeError;
use fapi_connector::core::kernel::{StreamHosts, StreamPath, WsConfig, WsSession};
use fapi_connector::core::websocket::{combined_payload, WebSocketManager};
use futures_util::{SinkExt, StreamExt};
use rstest::rstest;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

type ServerStream = WebSocketStream<TcpStream>;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts connections forever, numbering them from 1.
async fn spawn_server<F, Fut>(on_connection: F) -> (String, Arc<AtomicUsize>)
where
    F: Fn(usize, ServerStream) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));

    let counter = connections.clone();
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let Ok(ws) = accept_async(tcp).await else {
                continue;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(on_connection(n, ws));
        }
    });

    (format!("ws://{}", addr), connections)
}

/// Keep the connection open, draining (and auto-answering) client frames.
async fn drain(mut ws: ServerStream) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn fast_config() -> WsConfig {
    WsConfig::default()
        .with_reply_timeout(Duration::from_secs(5))
        .with_ping_timeout(Duration::from_secs(5))
        .with_reconnect_delay(Duration::from_millis(50))
}

fn text(value: &str) -> Message {
    Message::Text(value.to_string())
}

#[tokio::test]
async fn test_json_frames_reach_handler_in_order() {
    let (host, connections) = spawn_server(|_, mut ws| async move {
        ws.send(text(r#"{"e":"aggTrade","p":"1"}"#)).await.unwrap();
        ws.send(text("not json")).await.unwrap();
        ws.send(text(r#"{"e":"aggTrade","p":"2"}"#)).await.unwrap();
        drain(ws).await;
    })
    .await;

    let session = WsSession::new(format!("{}/ws/btcusdt@aggTrade", host), fast_config());
    let quit = session.quit_handle();
    let mut received = Vec::new();
    let mut handler = |payload: Value| -> Result<(), ExchangeError> {
        received.push(payload);
        if received.len() == 2 {
            quit.quit();
        }
        Ok(())
    };

    timeout(TEST_TIMEOUT, session.listen_forever(&mut handler))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["p"], "1");
    assert_eq!(received[1]["p"], "2");
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_ping_is_answered_with_single_pong() {
    let (pongs_tx, mut pongs_rx) = mpsc::unbounded_channel();
    let (host, _) = spawn_server(move |_, mut ws| {
        let pongs_tx = pongs_tx.clone();
        async move {
            ws.send(Message::Ping(b"hb".to_vec())).await.unwrap();
            let mut pongs = Vec::new();
            // Collect every pong until the client closes.
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Pong(data) => {
                        if pongs.is_empty() {
                            ws.send(text(r#"{"done":true}"#)).await.unwrap();
                        }
                        pongs.push(data);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            let _ = pongs_tx.send(pongs);
        }
    })
    .await;

    let session = WsSession::new(format!("{}/ws/test", host), fast_config());
    let quit = session.quit_handle();
    let mut handler = |_: Value| -> Result<(), ExchangeError> {
        quit.quit();
        Ok(())
    };

    timeout(TEST_TIMEOUT, session.listen_forever(&mut handler))
        .await
        .unwrap()
        .unwrap();

    let pongs = timeout(TEST_TIMEOUT, pongs_rx.recv()).await.unwrap().unwrap();
    assert_eq!(pongs, vec![b"hb".to_vec()]);
}

#[tokio::test]
async fn test_silence_triggers_single_ping_then_resumes() {
    let pings = Arc::new(AtomicUsize::new(0));
    let server_pings = pings.clone();
    let (host, connections) = spawn_server(move |_, mut ws| {
        let pings = server_pings.clone();
        async move {
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Ping(data) = message {
                    pings.fetch_add(1, Ordering::SeqCst);
                    ws.send(Message::Pong(data)).await.unwrap();
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    ws.send(text(r#"{"after_ping":true}"#)).await.unwrap();
                }
            }
        }
    })
    .await;

    let config = fast_config()
        .with_reply_timeout(Duration::from_millis(300))
        .with_ping_timeout(Duration::from_secs(2));
    let session = WsSession::new(format!("{}/ws/test", host), config);
    let quit = session.quit_handle();
    let mut received = Vec::new();
    let mut handler = |payload: Value| -> Result<(), ExchangeError> {
        received.push(payload);
        quit.quit();
        Ok(())
    };

    timeout(TEST_TIMEOUT, session.listen_forever(&mut handler))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["after_ping"], true);
    assert_eq!(pings.load(Ordering::SeqCst), 1);
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnects_after_close_frame() {
    let (host, connections) = spawn_server(|n, mut ws| async move {
        if n == 1 {
            let _ = ws.close(None).await;
            return;
        }
        ws.send(text(r#"{"connection":2}"#)).await.unwrap();
        drain(ws).await;
    })
    .await;

    let session = WsSession::new(format!("{}/ws/test", host), fast_config());
    let quit = session.quit_handle();
    let mut received = Vec::new();
    let mut handler = |payload: Value| -> Result<(), ExchangeError> {
        received.push(payload);
        quit.quit();
        Ok(())
    };

    timeout(TEST_TIMEOUT, session.listen_forever(&mut handler))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(received[0]["connection"], 2);
    assert_eq!(connections.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_liveness_failure_ends_listen_key_session() {
    // Never reads, so the client's ping is never answered.
    let (host, connections) = spawn_server(|_, ws| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(ws);
    })
    .await;

    let config = fast_config()
        .with_reply_timeout(Duration::from_millis(100))
        .with_ping_timeout(Duration::from_millis(200));
    let session =
        WsSession::new(format!("{}/ws/KEY", host), config).with_listen_key("KEY".to_string());
    let mut handler = |_: Value| -> Result<(), ExchangeError> { Ok(()) };

    timeout(TEST_TIMEOUT, session.listen_forever(&mut handler))
        .await
        .unwrap()
        .unwrap();

    assert!(session.quit_handle().is_quit());
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_liveness_failure_reconnects_public_session() {
    let (host, connections) = spawn_server(|_, ws| async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(ws);
    })
    .await;

    let config = fast_config()
        .with_reply_timeout(Duration::from_millis(100))
        .with_ping_timeout(Duration::from_millis(100));
    let session = WsSession::new(format!("{}/ws/test", host), config);
    let quit = session.quit_handle();

    let task = tokio::spawn(async move {
        let mut handler = |_: Value| -> Result<(), ExchangeError> { Ok(()) };
        session.listen_forever(&mut handler).await
    });

    timeout(TEST_TIMEOUT, async {
        while connections.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    assert!(!quit.is_quit());

    quit.quit();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_handler_error_stops_session() {
    let (host, connections) = spawn_server(|_, mut ws| async move {
        ws.send(text(r#"{"e":"ORDER_TRADE_UPDATE"}"#)).await.unwrap();
        drain(ws).await;
    })
    .await;

    let session = WsSession::new(format!("{}/ws/test", host), fast_config());
    let mut handler = |_: Value| -> Result<(), ExchangeError> {
        Err(ExchangeError::Other("handler gave up".to_string()))
    };

    let err = timeout(TEST_TIMEOUT, session.listen_forever(&mut handler))
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Other(ref msg) if msg == "handler gave up"));
    assert_eq!(connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_host_retries_until_quit() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = fast_config().with_reconnect_delay(Duration::from_millis(20));
    let session = WsSession::new(format!("ws://{}/ws/test", addr), config);
    let quit = session.quit_handle();

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        quit.quit();
    });

    let mut handler = |_: Value| -> Result<(), ExchangeError> { Ok(()) };
    timeout(TEST_TIMEOUT, session.listen_forever(&mut handler))
        .await
        .unwrap()
        .unwrap();
    stopper.await.unwrap();
}

/// Accepts TCP connections and holds them without ever answering the
/// WebSocket handshake.
async fn spawn_silent_listener() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            held.push(tcp);
        }
    });

    (format!("ws://{}", addr), accepted)
}

#[rstest]
#[case::public(None)]
#[case::listen_key(Some("KEY"))]
#[tokio::test]
async fn test_stalled_handshake_times_out_and_retries(#[case] listen_key: Option<&str>) {
    let (host, accepted) = spawn_silent_listener().await;

    let config = fast_config()
        .with_reply_timeout(Duration::from_millis(100))
        .with_ping_timeout(Duration::from_millis(100))
        .with_connect_timeout(Duration::from_millis(100));
    let mut session = WsSession::new(format!("{}/ws/test", host), config);
    if let Some(key) = listen_key {
        session = session.with_listen_key(key.to_string());
    }
    let quit = session.quit_handle();

    let task = tokio::spawn(async move {
        let mut handler = |_: Value| -> Result<(), ExchangeError> { Ok(()) };
        session.listen_forever(&mut handler).await
    });

    timeout(TEST_TIMEOUT, async {
        while accepted.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    quit.quit();
    timeout(TEST_TIMEOUT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_manager_forwards_combined_payloads() {
    let (host, _) = spawn_server(|_, mut ws| async move {
        for price in ["100.1", "100.2"] {
            let frame = format!(
                r#"{{"stream":"btcusdt@markPrice","data":{{"e":"markPriceUpdate","p":"{}"}}}}"#,
                price
            );
            ws.send(Message::Text(frame)).await.unwrap();
        }
        drain(ws).await;
    })
    .await;

    let manager = WebSocketManager::new(StreamHosts::new(host.clone(), host), fast_config());
    let path = StreamPath::from(["btcusdt@markPrice", "ethusdt@markPrice"]);
    let mut subscription = manager
        .start_stream(&path, None, |value| {
            combined_payload(value)
                .and_then(|data| data["p"].as_str().map(str::to_string))
        })
        .unwrap();

    let first = timeout(TEST_TIMEOUT, subscription.recv()).await.unwrap();
    let second = timeout(TEST_TIMEOUT, subscription.recv()).await.unwrap();
    assert_eq!(first.as_deref(), Some("100.1"));
    assert_eq!(second.as_deref(), Some("100.2"));

    subscription.abort();
}
