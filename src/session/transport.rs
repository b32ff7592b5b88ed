//! Connection task
//!
//! One background task owns the socket. Callers hand it [`Outbound`] messages
//! over a channel; while no connection is open they wait in the outbox and are
//! flushed in arrival order as soon as one is. Inbound traffic goes straight to
//! the [`Demultiplexer`], so responses and events keep wire order.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use super::demux::{Demultiplexer, Inbound};
use super::ids::IdGenerator;
use super::liveness::{LivenessMonitor, Probe};
use super::pending::PendingCalls;
use super::replay::ReplayState;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::protocol::Request;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Idle deadline when no probe is outstanding.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Fire-and-forget sends kept while reconnecting; later ones are dropped.
pub const MAX_QUEUED_TELLS: usize = 1024;

const MOUSE_MOVE: &str = "mouseMove";

/// Connection state as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// First connection attempt in progress.
    Connecting,
    Open,
    /// Waiting for or performing reconnection attempt `attempt` (1-based).
    Reconnecting { attempt: u32 },
    /// Terminal.
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `close()` was called or every handle was dropped.
    Requested,
    /// The connection failed and reconnection is disabled.
    Lost(String),
    /// Reconnection gave up after `attempts` consecutive failures.
    ReconnectFailed { attempts: u32, reason: String },
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Requested => write!(f, "closed by client"),
            Self::Lost(reason) => write!(f, "connection lost: {reason}"),
            Self::ReconnectFailed { attempts, reason } => {
                write!(f, "gave up after {attempts} reconnection attempts: {reason}")
            }
        }
    }
}

/// A serialized request on its way to the socket.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub request: Request,
    pub text: String,
    /// Whether a pending call waits on this message.
    pub expects_reply: bool,
}

enum Ended {
    Shutdown,
    Lost(String),
}

pub(crate) struct Transport {
    config: ClientConfig,
    ids: Arc<dyn IdGenerator>,
    pending: PendingCalls,
    demux: Demultiplexer,
    state: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Outbound>,
    shutdown: CancellationToken,
    outbox: VecDeque<Outbound>,
    /// Set once a connection has dropped. From then on the outbox coalesces
    /// pointer moves and caps fire-and-forget sends.
    bounded_outbox: bool,
    replay: ReplayState,
    liveness: LivenessMonitor,
}

impl Transport {
    pub(crate) fn new(
        config: ClientConfig,
        ids: Arc<dyn IdGenerator>,
        demux: Demultiplexer,
        pending: PendingCalls,
        state: watch::Sender<ConnectionState>,
        commands: mpsc::UnboundedReceiver<Outbound>,
        shutdown: CancellationToken,
    ) -> Self {
        let liveness = LivenessMonitor::new(config.ping_interval(), config.ping_grace());
        Self {
            config,
            ids,
            pending,
            demux,
            state,
            commands,
            shutdown,
            outbox: VecDeque::new(),
            bounded_outbox: false,
            replay: ReplayState::new(),
            liveness,
        }
    }

    pub(crate) async fn run(mut self) {
        let mut failures: u32 = 0;
        let mut opened_before = false;

        let reason = loop {
            if failures > 0 || opened_before {
                let attempt = failures + 1;
                self.set_state(ConnectionState::Reconnecting { attempt });
                tracing::info!(
                    attempt,
                    delay = ?self.config.reconnect_delay(),
                    "reconnecting"
                );
                if self
                    .serve_until(tokio::time::sleep(self.config.reconnect_delay()))
                    .await
                    .is_none()
                {
                    break CloseReason::Requested;
                }
            }

            let connect = connect(self.config.url.clone(), self.config.connect_timeout());
            let ws = match self.serve_until(connect).await {
                None => break CloseReason::Requested,
                Some(Ok(ws)) => ws,
                Some(Err(reason)) => {
                    failures += 1;
                    tracing::warn!(url = %self.config.url, attempt = failures, %reason, "connection attempt failed");
                    if !self.config.auto_reconnect {
                        break CloseReason::Lost(reason);
                    }
                    let max = self.config.max_reconnect_attempts;
                    if max > 0 && failures >= max {
                        break CloseReason::ReconnectFailed {
                            attempts: failures,
                            reason,
                        };
                    }
                    continue;
                }
            };

            failures = 0;
            match self.serve_open(ws, opened_before).await {
                Ended::Shutdown => break CloseReason::Requested,
                Ended::Lost(reason) => {
                    opened_before = true;
                    self.bounded_outbox = true;
                    // Submitted but unread calls are failed below too, so they must not go out later.
                    while let Ok(outbound) = self.commands.try_recv() {
                        self.enqueue(outbound);
                    }
                    let failed = self.pending.fail_all(|command| ClientError::ConnectionLost {
                        command: command.to_string(),
                    });
                    // Their waiters were just failed; only fire-and-forget sends stay queued.
                    self.outbox.retain(|outbound| !outbound.expects_reply);
                    tracing::warn!(%reason, failed_calls = failed, "connection lost");
                    if !self.config.auto_reconnect {
                        break CloseReason::Lost(reason);
                    }
                }
            }
        };

        self.finish(reason);
    }

    /// Drive `fut` to completion while queueing outbound messages.
    /// `None` means the session is shutting down.
    async fn serve_until<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return None,
                out = &mut fut => {
                    // Everything submitted so far is queued ahead of what the next connection sees.
                    while let Ok(outbound) = self.commands.try_recv() {
                        self.enqueue(outbound);
                    }
                    return Some(out);
                }
                cmd = self.commands.recv() => match cmd {
                    Some(outbound) => self.enqueue(outbound),
                    None => return None,
                },
            }
        }
    }

    async fn serve_open(&mut self, mut ws: WsStream, resumed: bool) -> Ended {
        self.liveness.reset();
        self.set_state(ConnectionState::Open);
        tracing::info!(url = %self.config.url, resumed, "connection open");

        if resumed {
            if let Err(reason) = self.send_replay(&mut ws).await {
                return Ended::Lost(reason);
            }
        }
        if let Err(reason) = self.flush_outbox(&mut ws).await {
            return Ended::Lost(reason);
        }

        let mut ticker = self.ticker();

        loop {
            let deadline = self.liveness.deadline();
            let probe_timeout =
                tokio::time::sleep_until(deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE));
            tokio::pin!(probe_timeout);

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    // Fire-and-forget sends submitted before close still go out.
                    while let Ok(outbound) = self.commands.try_recv() {
                        if !outbound.expects_reply && self.transmit(&mut ws, outbound).await.is_err() {
                            break;
                        }
                    }
                    let _ = ws.close(None).await;
                    return Ended::Shutdown;
                }

                _ = &mut probe_timeout, if deadline.is_some() => {
                    return Ended::Lost(format!(
                        "no liveness acknowledgment within {:?}",
                        self.config.ping_grace()
                    ));
                }

                _ = next_tick(&mut ticker) => {
                    match self.liveness.on_tick(Instant::now(), true) {
                        Probe::SendPing => {
                            tracing::trace!("sending liveness probe");
                            if let Err(e) = ws.send(Message::Ping(Bytes::new())).await {
                                return Ended::Lost(e.to_string());
                            }
                        }
                        Probe::Dead => return Ended::Lost("liveness probe unanswered".to_string()),
                        Probe::Skip => {}
                    }
                }

                msg = ws.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        self.demux.on_message(Inbound::Text(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Binary(data))) => {
                        self.demux.on_message(Inbound::Binary(data));
                    }
                    // tungstenite queues the Pong and flushes it on the next read.
                    Some(Ok(Message::Ping(_))) => {}
                    Some(Ok(Message::Pong(_))) => {
                        tracing::trace!("liveness acknowledged");
                        self.liveness.on_ack();
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("closed by server ({}): {}", f.code, f.reason.as_str()))
                            .unwrap_or_else(|| "closed by server".to_string());
                        return Ended::Lost(reason);
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => return Ended::Lost(e.to_string()),
                    None => return Ended::Lost("stream ended".to_string()),
                },

                cmd = self.commands.recv() => match cmd {
                    Some(outbound) => {
                        if let Err(reason) = self.transmit(&mut ws, outbound).await {
                            return Ended::Lost(reason);
                        }
                    }
                    None => {
                        let _ = ws.close(None).await;
                        return Ended::Shutdown;
                    }
                },
            }
        }
    }

    async fn send_replay(&mut self, ws: &mut WsStream) -> Result<(), String> {
        let commands = self.replay.commands(&self.config.replay);
        if commands.is_empty() {
            return Ok(());
        }
        tracing::info!(
            commands = commands.len(),
            version = self.replay.version(),
            "replaying session state"
        );
        for command in commands {
            let request = Request::new(self.ids.next_id(), command.scope, command.method, command.params);
            let text = serde_json::to_string(&request).map_err(|e| e.to_string())?;
            tracing::debug!(id = %request.id, method = command.method, "replay");
            ws.send(Message::Text(text.into()))
                .await
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    async fn flush_outbox(&mut self, ws: &mut WsStream) -> Result<(), String> {
        if !self.outbox.is_empty() {
            tracing::debug!(queued = self.outbox.len(), "flushing queued messages");
        }
        while let Some(outbound) = self.outbox.pop_front() {
            self.transmit(ws, outbound).await?;
        }
        Ok(())
    }

    /// Hold `outbound` until a connection is open.
    fn enqueue(&mut self, outbound: Outbound) {
        if self.bounded_outbox && !outbound.expects_reply {
            if outbound.request.method == MOUSE_MOVE {
                if let Some(last) = self.outbox.back_mut() {
                    if !last.expects_reply
                        && last.request.method == MOUSE_MOVE
                        && last.request.scope == outbound.request.scope
                    {
                        *last = outbound;
                        return;
                    }
                }
            }
            let tells = self.outbox.iter().filter(|o| !o.expects_reply).count();
            if tells >= MAX_QUEUED_TELLS {
                tracing::debug!(method = %outbound.request.method, "outbox full, dropping send");
                return;
            }
        }
        tracing::trace!(id = %outbound.request.id, queued = self.outbox.len() + 1, "queued until open");
        self.outbox.push_back(outbound);
    }

    async fn transmit(&mut self, ws: &mut WsStream, outbound: Outbound) -> Result<(), String> {
        let Outbound {
            request,
            text,
            expects_reply,
        } = outbound;
        // Already settled (timed out or failed by a drop): the caller saw the outcome.
        if expects_reply && !self.pending.contains(&request.id) {
            tracing::debug!(id = %request.id, method = %request.method, "skipping settled call");
            return Ok(());
        }
        ws.send(Message::Text(text.into()))
            .await
            .map_err(|e| e.to_string())?;
        tracing::debug!(id = %request.id, method = %request.method, scope = ?request.scope, "sent");
        // Only what actually reached the wire is replayed later.
        self.replay.observe(&request);
        Ok(())
    }

    fn ticker(&self) -> Option<Interval> {
        if !self.liveness.enabled() {
            return None;
        }
        let period = self.liveness.interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(ticker)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn finish(mut self, reason: CloseReason) {
        tracing::info!(%reason, "session closed");
        self.set_state(ConnectionState::Closed(reason));

        self.commands.close();
        while let Ok(outbound) = self.commands.try_recv() {
            self.outbox.push_back(outbound);
        }
        for outbound in self.outbox.drain(..) {
            if outbound.expects_reply {
                self.pending.fail(&outbound.request.id, ClientError::Closed);
            }
        }
        self.pending.fail_all(|_| ClientError::Closed);
    }
}

async fn connect(url: String, timeout: Duration) -> Result<WsStream, String> {
    tracing::debug!(url = %url, "connecting");
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str())).await {
        Ok(Ok((ws, _response))) => Ok(ws),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("connect timed out after {timeout:?}")),
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
