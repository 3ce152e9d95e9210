//! Scripted in-memory transport used by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use qyun_transport::{
    ConnectionId, Connector, FrameSink, FrameSource, StreamConnection, StreamTarget,
    TransportError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Observable transport activity, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScriptEvent {
    Connect(String),
    Sent(ConnectionId, String),
    Closed(ConnectionId),
}

struct ScriptState {
    log: Mutex<Vec<ScriptEvent>>,
    remotes: Mutex<Vec<mpsc::UnboundedSender<Option<Bytes>>>>,
    writable: watch::Sender<bool>,
    fail_setup: AtomicBool,
    fail_connect: AtomicBool,
    fail_writes: AtomicBool,
    connect_delay: Mutex<Duration>,
}

impl ScriptState {
    fn record(&self, event: ScriptEvent) {
        self.log.lock().unwrap().push(event);
    }
}

/// Connector whose connections are driven by the test.
#[derive(Clone)]
pub(crate) struct ScriptedConnector {
    state: Arc<ScriptState>,
}

impl ScriptedConnector {
    pub(crate) fn new() -> Self {
        let (writable, _) = watch::channel(true);
        Self {
            state: Arc::new(ScriptState {
                log: Mutex::new(Vec::new()),
                remotes: Mutex::new(Vec::new()),
                writable,
                fail_setup: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                connect_delay: Mutex::new(Duration::ZERO),
            }),
        }
    }

    pub(crate) fn set_writable(&self, writable: bool) {
        self.state.writable.send_replace(writable);
    }

    pub(crate) fn fail_setup(&self, fail: bool) {
        self.state.fail_setup.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every connect take `delay` before it completes.
    pub(crate) fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock().unwrap() = delay;
    }

    /// Deliver an inbound message on the `index`-th connection.
    pub(crate) fn push_inbound(&self, index: usize, payload: &'static [u8]) {
        let remotes = self.state.remotes.lock().unwrap();
        let _ = remotes[index].send(Some(Bytes::from_static(payload)));
    }

    /// Close the `index`-th connection from the server side.
    pub(crate) fn close_remote(&self, index: usize) {
        let remotes = self.state.remotes.lock().unwrap();
        let _ = remotes[index].send(None);
    }

    /// Wait until at least `count` connections have been opened.
    pub(crate) async fn wait_for_connects(&self, count: usize) {
        while self.connect_paths().len() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    /// Run `script` once the first connection has been opened.
    pub(crate) fn spawn_after_connect(
        self,
        script: impl FnOnce(&ScriptedConnector) + Send + 'static,
    ) {
        tokio::spawn(async move {
            self.wait_for_connects(1).await;
            script(&self);
        });
    }

    pub(crate) fn log(&self) -> Vec<ScriptEvent> {
        self.state.log.lock().unwrap().clone()
    }

    pub(crate) fn connect_paths(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|event| match event {
                ScriptEvent::Connect(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|event| match event {
                ScriptEvent::Sent(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn closed(&self) -> Vec<ConnectionId> {
        self.log()
            .into_iter()
            .filter_map(|event| match event {
                ScriptEvent::Closed(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, target: &StreamTarget) -> Result<StreamConnection, TransportError> {
        let delay = *self.state.connect_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.fail_setup.load(Ordering::SeqCst) {
            return Err(TransportError::Setup("scripted setup failure".into()));
        }
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Connect("scripted refusal".into()));
        }

        self.state.record(ScriptEvent::Connect(target.path.clone()));

        let id = ConnectionId::generate();
        let (remote, inbound) = mpsc::unbounded_channel();
        self.state.remotes.lock().unwrap().push(remote);

        Ok(StreamConnection {
            sink: Box::new(ScriptedSink {
                id: id.clone(),
                state: Arc::clone(&self.state),
            }),
            source: Box::new(ScriptedSource { inbound }),
            id,
        })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedSink {
    id: ConnectionId,
    state: Arc<ScriptState>,
}

#[async_trait]
impl FrameSink for ScriptedSink {
    async fn ready(&mut self) -> Result<(), TransportError> {
        let mut writable = self.state.writable.subscribe();
        writable
            .wait_for(|writable| *writable)
            .await
            .map(|_| ())
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("scripted write failure".into()));
        }
        self.state.record(ScriptEvent::Sent(self.id.clone(), text));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.state.record(ScriptEvent::Closed(self.id.clone()));
        Ok(())
    }
}

struct ScriptedSource {
    inbound: mpsc::UnboundedReceiver<Option<Bytes>>,
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.inbound.recv().await.flatten())
    }
}
