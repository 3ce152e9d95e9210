//! Stream connection manager for the send role.
//!
//! The manager owns at most one persistent stream connection, identified by
//! its `(endpoint, channel)` pair. A send to the same pair reuses the
//! connection; a send to a different pair closes the old connection before
//! the new one is opened. A connection that closed on its own keeps its
//! identity, and the next send to that pair reconnects.
//!
//! Each session has a single-slot mailbox. Putting a message into the slot
//! replaces any message that has not been flushed yet (last write wins) and
//! raises a writable request. The session's writer task waits for the
//! transport to become writable, takes whatever is in the slot and writes
//! it as one text frame, then acknowledges the waiting caller.
//!
//! A send is bounded by one deadline that covers closing a replaced
//! connection, connecting and the flush. A message whose caller gave up at
//! the deadline is withdrawn from the slot and never flushed.

use crate::error::SendError;
use crate::metrics;
use qyun_core::{channel, validate_channel_name, ChannelId, Endpoint};
use qyun_transport::{
    ConnectionId, Connector, FrameSink, FrameSource, StreamConnection, StreamRole, StreamTarget,
    TransportError,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Identity of a send session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionTarget {
    /// Server the session is connected to.
    pub endpoint: Endpoint,
    /// Channel the session sends to.
    pub channel: ChannelId,
}

impl fmt::Display for SessionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.endpoint, self.channel)
    }
}

/// Timeouts applied by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    /// How long a send waits for its message to be flushed.
    pub send_timeout: Duration,
    /// How long opening a connection may take.
    pub connect_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

type Ack = oneshot::Sender<Result<(), TransportError>>;

/// A message waiting for the next writable event.
struct Pending {
    seq: u64,
    payload: String,
    ack: Ack,
}

/// Handle to a message stored in a mailbox.
struct Ticket {
    seq: u64,
    done: oneshot::Receiver<Result<(), TransportError>>,
}

/// Single-slot mailbox shared between the manager and a writer task.
struct Mailbox {
    slot: Mutex<Option<Pending>>,
    writable: Notify,
    closed: AtomicBool,
    next_seq: AtomicU64,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            writable: Notify::new(),
            closed: AtomicBool::new(false),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Store a message, replacing any unflushed one, and request a writable event.
    ///
    /// A closed mailbox refuses the message and hands it back.
    async fn put(&self, payload: String) -> Result<Ticket, String> {
        let mut slot = self.slot.lock().await;
        // The writer marks the mailbox closed before its final drain of the
        // slot, so a message stored here is always either flushed or failed.
        if self.is_closed() {
            return Err(payload);
        }

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (ack, done) = oneshot::channel();
        if slot.replace(Pending { seq, payload, ack }).is_some() {
            // Dropping the old ack tells its caller it was superseded.
            debug!("Replaced unsent pending message");
        }
        drop(slot);

        self.writable.notify_one();
        Ok(Ticket { seq, done })
    }

    async fn take(&self) -> Option<Pending> {
        self.slot.lock().await.take()
    }

    /// Remove the message stored under `seq` if it has not been taken yet.
    async fn withdraw(&self, seq: u64) -> bool {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|pending| pending.seq == seq) {
            slot.take();
            true
        } else {
            false
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            // Wake the writer so it can observe the close.
            self.writable.notify_one();
        }
    }
}

/// A live (or recently closed) connection of a session.
struct Link {
    id: ConnectionId,
    mailbox: Arc<Mailbox>,
    stop: CancellationToken,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Link {
    fn spawn(connection: StreamConnection) -> Self {
        let StreamConnection { id, sink, source } = connection;
        let mailbox = Arc::new(Mailbox::new());
        let stop = CancellationToken::new();

        let writer = tokio::spawn(run_writer(
            id.clone(),
            sink,
            Arc::clone(&mailbox),
            stop.clone(),
        ));
        let reader = tokio::spawn(run_reader(id.clone(), source, Arc::clone(&mailbox)));

        Self {
            id,
            mailbox,
            stop,
            writer,
            reader,
        }
    }

    fn is_live(&self) -> bool {
        !self.mailbox.is_closed()
    }

    /// Close the connection and wait until `deadline` for the writer to finish closing it.
    async fn shutdown(&mut self, deadline: Instant) {
        self.stop.cancel();
        self.mailbox.mark_closed();
        if timeout_at(deadline, &mut self.writer).await.is_err() {
            warn!(connection = %self.id, "Writer did not close in time; aborting");
            self.writer.abort();
        }
        self.reader.abort();
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.stop.cancel();
        self.reader.abort();
    }
}

struct Session {
    target: SessionTarget,
    link: Link,
}

/// Flushes pending messages on writable events.
async fn run_writer(
    id: ConnectionId,
    mut sink: Box<dyn FrameSink>,
    mailbox: Arc<Mailbox>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            () = mailbox.writable.notified() => {}
        }

        if mailbox.is_closed() {
            break;
        }

        let ready = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            ready = sink.ready() => ready,
        };

        if let Err(e) = ready {
            warn!(connection = %id, error = %e, "Connection not writable");
            mailbox.mark_closed();
            if let Some(pending) = mailbox.take().await {
                let _ = pending.ack.send(Err(e));
            }
            break;
        }

        let Some(pending) = mailbox.take().await else {
            continue;
        };
        if pending.ack.is_closed() {
            trace!(connection = %id, "Dropping message nobody is waiting for");
            continue;
        }

        let len = pending.payload.len();
        match sink.send_text(pending.payload).await {
            Ok(()) => {
                trace!(connection = %id, len, "Flushed pending message");
                metrics::record_sent(len);
                let _ = pending.ack.send(Ok(()));
            }
            Err(e) => {
                warn!(connection = %id, error = %e, "Stream write failed");
                mailbox.mark_closed();
                let _ = pending.ack.send(Err(e));
                break;
            }
        }
    }

    mailbox.mark_closed();
    if let Some(pending) = mailbox.take().await {
        let _ = pending.ack.send(Err(TransportError::ConnectionClosed));
    }
    if let Err(e) = sink.close().await {
        debug!(connection = %id, error = %e, "Error while closing stream");
    }
    debug!(connection = %id, "Send connection closed");
}

/// Drains inbound traffic so a remote close is noticed.
async fn run_reader(id: ConnectionId, mut source: Box<dyn FrameSource>, mailbox: Arc<Mailbox>) {
    loop {
        match source.recv().await {
            Ok(Some(payload)) => {
                trace!(
                    connection = %id,
                    len = payload.len(),
                    "Ignoring inbound frame on send connection"
                );
            }
            Ok(None) => {
                debug!(connection = %id, "Send connection closed by server");
                break;
            }
            Err(e) => {
                warn!(connection = %id, error = %e, "Send connection failed");
                break;
            }
        }
    }
    mailbox.mark_closed();
}

/// Owns the send-role stream session.
///
/// All methods take `&self`; the reconcile step and the hand-off of the
/// message to the session are serialized internally, so a manager can be
/// shared between tasks behind an `Arc`.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    options: ManagerOptions,
    session: Mutex<Option<Session>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, options: ManagerOptions) -> Self {
        Self {
            connector,
            options,
            session: Mutex::new(None),
        }
    }

    /// Get the manager options.
    #[must_use]
    pub fn options(&self) -> ManagerOptions {
        self.options
    }

    /// Send a message over the persistent stream connection.
    ///
    /// Opens or replaces the session as needed and waits for the message to
    /// be flushed. The whole call, connecting included, returns within the
    /// send timeout. A message that times out is withdrawn and never sent.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the message was not confirmed sent.
    pub async fn send(
        &self,
        endpoint: &Endpoint,
        channel: &str,
        message: impl Into<String>,
    ) -> Result<(), SendError> {
        validate_channel_name(channel).map_err(SendError::InvalidChannel)?;

        let deadline = Instant::now() + self.options.send_timeout;
        let target = SessionTarget {
            endpoint: endpoint.clone(),
            channel: channel.to_string(),
        };

        let (mailbox, ticket) = {
            let Ok(mut session) = timeout_at(deadline, self.session.lock()).await else {
                return Err(self.timed_out(channel));
            };

            let mut payload = message.into();
            loop {
                let mailbox = self.reconcile(&mut session, &target, deadline).await?;
                match mailbox.put(payload).await {
                    Ok(ticket) => break (mailbox, ticket),
                    Err(refused) => {
                        debug!(session = %target, "Send connection closed before hand-off");
                        payload = refused;
                    }
                }
            }
        };

        let Ticket { seq, mut done } = ticket;
        match timeout_at(deadline, &mut done).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => {
                metrics::record_send_failure("write");
                Err(SendError::WriteFailed(e))
            }
            Ok(Err(_)) => {
                metrics::record_send_failure("superseded");
                Err(SendError::Superseded)
            }
            Err(_) => {
                if !mailbox.withdraw(seq).await {
                    // The writer took the message just as the deadline passed.
                    if let Ok(Ok(())) = done.try_recv() {
                        return Ok(());
                    }
                }
                Err(self.timed_out(channel))
            }
        }
    }

    fn timed_out(&self, channel: &str) -> SendError {
        warn!(channel = %channel, timeout = ?self.options.send_timeout, "Stream send timed out");
        metrics::record_send_failure("timeout");
        SendError::Timeout(self.options.send_timeout)
    }

    /// Make the session match `target`, returning its mailbox.
    async fn reconcile(
        &self,
        session: &mut Option<Session>,
        target: &SessionTarget,
        deadline: Instant,
    ) -> Result<Arc<Mailbox>, SendError> {
        if let Some(active) = session.as_ref() {
            if active.target == *target && active.link.is_live() {
                return Ok(Arc::clone(&active.link.mailbox));
            }
        }

        if let Some(mut previous) = session.take() {
            if previous.target == *target {
                info!(session = %target, "Send connection lost; reconnecting");
            } else {
                info!(from = %previous.target, to = %target, "Switching send session");
            }
            previous.link.shutdown(self.connect_deadline(deadline)).await;
            metrics::record_reconnect();
        }

        let link = self.open(target, deadline).await?;
        let mailbox = Arc::clone(&link.mailbox);
        *session = Some(Session {
            target: target.clone(),
            link,
        });
        Ok(mailbox)
    }

    /// The earlier of `deadline` and one connect timeout from now.
    fn connect_deadline(&self, deadline: Instant) -> Instant {
        deadline.min(Instant::now() + self.options.connect_timeout)
    }

    async fn open(&self, target: &SessionTarget, deadline: Instant) -> Result<Link, SendError> {
        let stream_target = StreamTarget::new(
            target.endpoint.clone(),
            channel::stream_send_path(&target.channel),
            StreamRole::Send,
        );

        let connect_deadline = self.connect_deadline(deadline);
        let connection =
            match timeout_at(connect_deadline, self.connector.connect(&stream_target)).await {
                Ok(Ok(connection)) => connection,
                Ok(Err(TransportError::Setup(reason))) => {
                    warn!(session = %target, reason = %reason, "Stream setup failed");
                    metrics::record_send_failure("setup");
                    return Err(SendError::SetupFailed(reason));
                }
                Ok(Err(e)) => {
                    warn!(session = %target, error = %e, "Stream connect failed");
                    metrics::record_send_failure("connect");
                    return Err(SendError::ConnectFailed(e));
                }
                Err(_) if connect_deadline == deadline => {
                    return Err(self.timed_out(&target.channel));
                }
                Err(_) => {
                    warn!(session = %target, "Stream connect timed out");
                    metrics::record_send_failure("connect");
                    return Err(SendError::ConnectFailed(TransportError::Timeout));
                }
            };

        info!(
            session = %target,
            connection = %connection.id,
            transport = self.connector.name(),
            "Opened send connection"
        );
        metrics::record_connect("send");
        Ok(Link::spawn(connection))
    }

    /// Identity of the current session, if any.
    pub async fn active_target(&self) -> Option<SessionTarget> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.target.clone())
    }

    /// Connection of the current session, if it is still live.
    pub async fn active_connection(&self) -> Option<ConnectionId> {
        self.session
            .lock()
            .await
            .as_ref()
            .filter(|session| session.link.is_live())
            .map(|session| session.link.id.clone())
    }

    /// Close the current session, if any.
    pub async fn close(&self) {
        if let Some(mut session) = self.session.lock().await.take() {
            debug!(session = %session.target, "Closing send session");
            let deadline = Instant::now() + self.options.connect_timeout;
            session.link.shutdown(deadline).await;
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("transport", &self.connector.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
