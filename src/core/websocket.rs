use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{
    QuitHandle, StreamHandler, StreamHosts, StreamPath, WsConfig, WsSession,
};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

const CHANNEL_CAPACITY: usize = 1000;

/// Runs WebSocket Sessions on background tasks and hands their payloads
/// out through channels.
pub struct WebSocketManager {
    hosts: StreamHosts,
    config: WsConfig,
}

/// Receiving end of a spawned stream.
///
/// Dropping the receiver stops the session at its next message.
pub struct StreamSubscription<T> {
    pub receiver: mpsc::Receiver<T>,
    quit: QuitHandle,
    task: JoinHandle<()>,
}

impl<T> StreamSubscription<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Ask the session to stop; a pending receive finishes or times out first.
    pub fn stop(&self) {
        self.quit.quit();
    }

    /// Abort the background task without waiting for a loop boundary.
    pub fn abort(&self) {
        self.quit.quit();
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

struct ChannelForwarder<F, T> {
    tx: mpsc::Sender<T>,
    parser: F,
    quit: QuitHandle,
}

#[async_trait]
impl<F, T> StreamHandler for ChannelForwarder<F, T>
where
    F: Fn(Value) -> Option<T> + Send + Sync,
    T: Send,
{
    async fn on_message(&mut self, payload: Value) -> Result<(), ExchangeError> {
        if let Some(item) = (self.parser)(payload) {
            if self.tx.send(item).await.is_err() {
                debug!("Receiver dropped, stopping stream");
                self.quit.quit();
            }
        }
        Ok(())
    }
}

impl WebSocketManager {
    pub fn new(hosts: StreamHosts, config: WsConfig) -> Self {
        Self { hosts, config }
    }

    pub fn hosts(&self) -> &StreamHosts {
        &self.hosts
    }

    /// Start a WebSocket stream with automatic reconnection
    ///
    /// Payloads for which `message_parser` returns `None` are skipped.
    pub fn start_stream<F, T>(
        &self,
        path: &StreamPath,
        listen_key: Option<String>,
        message_parser: F,
    ) -> Result<StreamSubscription<T>, ExchangeError>
    where
        F: Fn(Value) -> Option<T> + Send + Sync + 'static,
        T: Send + 'static,
    {
        let session = WsSession::for_stream(&self.hosts, path, listen_key, self.config.clone())?;
        let quit = session.quit_handle();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        let mut forwarder = ChannelForwarder {
            tx,
            parser: message_parser,
            quit: quit.clone(),
        };

        let task = tokio::spawn(async move {
            if let Err(e) = session.listen_forever(&mut forwarder).await {
                error!(error = %e, url = %session.url(), "Stream terminated");
            }
        });

        Ok(StreamSubscription {
            receiver: rx,
            quit,
            task,
        })
    }

    /// Stream raw JSON payloads
    pub fn start_raw_stream(
        &self,
        path: &StreamPath,
        listen_key: Option<String>,
    ) -> Result<StreamSubscription<Value>, ExchangeError> {
        self.start_stream(path, listen_key, Some)
    }
}

/// Unwrap the `{"stream": .., "data": ..}` envelope of combined streams.
pub fn combined_payload(value: Value) -> Option<Value> {
    match value {
        Value::Object(mut map) if map.contains_key("stream") => map.remove("data"),
        other => Some(other),
    }
}
