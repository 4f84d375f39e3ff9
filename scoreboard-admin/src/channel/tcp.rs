use super::{Channel, ChannelError, ChannelEvent};
use log::*;
use scoreboard_common::protocol::{ClientFrame, Request, ServerFrame};
use serde_json::Value;
use std::{collections::HashMap, future::Future};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    select,
    sync::{mpsc, oneshot},
    task::{self, JoinHandle},
    time::{Duration, Instant, sleep_until, timeout},
};

const WRITE_TIMEOUT: Duration = Duration::from_millis(500);
const REQUEST_CHANNEL_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpChannelSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    pub reconnect_delay: Duration,
}

/// A [`Channel`] carrying newline separated JSON frames over TCP.
///
/// A background task owns the socket. It reconnects after `reconnect_delay` whenever the
/// connection drops, and reports each connection and disconnection as a [`ChannelEvent`].
#[derive(Debug)]
pub struct TcpChannel {
    tx: mpsc::Sender<Outgoing>,
    request_timeout: Duration,
    join: JoinHandle<()>,
}

impl TcpChannel {
    pub fn connect(
        settings: TcpChannelSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_LEN);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            addr: format!("{}:{}", settings.host, settings.port),
            reconnect_delay: settings.reconnect_delay,
            rx,
            events: event_tx,
            next_id: 0,
            pending: HashMap::new(),
        };
        let join = task::spawn(worker.run_loop());

        (
            Self {
                tx,
                request_timeout: settings.request_timeout,
                join,
            },
            event_rx,
        )
    }
}

impl Channel for TcpChannel {
    fn request(&self, request: Request) -> impl Future<Output = Result<Value, ChannelError>> {
        let tx = self.tx.clone();
        let limit = self.request_timeout;

        async move {
            let (reply_tx, reply_rx) = oneshot::channel();
            tx.send(Outgoing {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ChannelError::Closed)?;

            match timeout(limit, reply_rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(ChannelError::Closed),
                Err(_) => Err(ChannelError::Timeout(limit)),
            }
        }
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.join.abort();
    }
}

#[derive(Debug)]
struct Outgoing {
    request: Request,
    reply: oneshot::Sender<Result<Value, ChannelError>>,
}

#[derive(Debug)]
struct Worker {
    addr: String,
    reconnect_delay: Duration,
    rx: mpsc::Receiver<Outgoing>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    next_id: u64,
    pending: HashMap<u64, oneshot::Sender<Result<Value, ChannelError>>>,
}

impl Worker {
    async fn run_loop(mut self) {
        loop {
            let Some(stream) = self.wait_for_connection().await else {
                info!("Channel dropped, stopping connection task");
                return;
            };
            info!("Connected to {}", self.addr);
            self.emit(ChannelEvent::Connected);

            let result = self.serve(stream).await;
            self.fail_pending();
            match result {
                Ok(()) => {
                    info!("Channel dropped, closing connection to {}", self.addr);
                    return;
                }
                Err(e) => {
                    error!("Connection to {} lost: {e}", self.addr);
                    self.emit(ChannelEvent::Disconnected);
                }
            }
        }
    }

    /// Returns `None` once the owning [`TcpChannel`] is gone
    async fn wait_for_connection(&mut self) -> Option<TcpStream> {
        loop {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => return Some(stream),
                Err(e) => debug!(
                    "Failed to connect to {}, retrying in {:?}: {e}",
                    self.addr, self.reconnect_delay
                ),
            }

            // Requests made while disconnected fail right away instead of waiting for the
            // next connection
            let retry_at = Instant::now() + self.reconnect_delay;
            loop {
                select! {
                    _ = sleep_until(retry_at) => break,
                    msg = self.rx.recv() => match msg {
                        Some(outgoing) => {
                            let _ = outgoing.reply.send(Err(ChannelError::Disconnected));
                        }
                        None => return None,
                    }
                }
            }
        }
    }

    /// Returns `Ok(())` once the owning [`TcpChannel`] is gone, or an error when the
    /// connection fails
    async fn serve(&mut self, stream: TcpStream) -> Result<(), ChannelError> {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();

        loop {
            select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line),
                    None => return Err(ChannelError::Disconnected),
                },
                msg = self.rx.recv() => match msg {
                    Some(Outgoing { request, reply }) => {
                        let id = self.next_id;
                        self.next_id += 1;

                        let mut bytes = match serde_json::to_vec(&ClientFrame::new(id, request)) {
                            Ok(bytes) => bytes,
                            Err(e) => {
                                error!("Failed to encode request: {e}");
                                let _ = reply.send(Err(e.into()));
                                continue;
                            }
                        };
                        bytes.push(b'\n');
                        trace!(
                            "Sending frame {id}: {}",
                            String::from_utf8_lossy(&bytes).trim_end()
                        );

                        match timeout(WRITE_TIMEOUT, write.write_all(&bytes)).await {
                            Ok(Ok(())) => {
                                self.pending.retain(|_, reply| !reply.is_closed());
                                self.pending.insert(id, reply);
                            }
                            Ok(Err(e)) => {
                                let _ = reply.send(Err(ChannelError::Disconnected));
                                return Err(e.into());
                            }
                            Err(_) => {
                                warn!("Send to {} timed out", self.addr);
                                let _ = reply.send(Err(ChannelError::Timeout(WRITE_TIMEOUT)));
                            }
                        }
                    }
                    None => return Ok(()),
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        let frame = match serde_json::from_str::<ServerFrame>(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Ignoring malformed frame {line:?}: {e}");
                return;
            }
        };

        match frame {
            ServerFrame::Ack { id, data } => match self.pending.remove(&id) {
                Some(reply) => {
                    if reply.send(Ok(data)).is_err() {
                        debug!("Reply to request {id} arrived after it was abandoned");
                    }
                }
                None => debug!("Reply to unknown request {id}"),
            },
            ServerFrame::Update { data } => self.emit(ChannelEvent::Update(data)),
            ServerFrame::Ping { .. } => self.emit(ChannelEvent::Ping),
        }
    }

    /// Never waits, so a slow reader of events cannot hold up request replies
    fn emit(&self, event: ChannelEvent) {
        if self.events.send(event).is_err() {
            debug!("No one is listening for channel events");
        }
    }

    fn fail_pending(&mut self) {
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(ChannelError::Disconnected));
        }
    }
}
