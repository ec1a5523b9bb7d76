//! Per-connection display session
//!
//! Each live display client runs two cooperating tasks:
//! - **Writer**: drains the hub's outbound frames onto the socket and sends a
//!   keepalive ping on a fixed interval.
//! - **Reader**: never interprets inbound payloads; any frame (pong included)
//!   re-arms the liveness window, and a timeout, read error or close ends the
//!   session.
//!
//! Whichever side stops first flips the shared stop signal so the other side
//! winds down, and the connection is removed from the hub.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{Connection, Frame, Hub};

/// Keepalive and liveness timing for display sessions
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Interval between keepalive pings
    pub ping_interval: Duration,
    /// Upper bound on any single socket write
    pub write_timeout: Duration,
    /// Session ends if nothing is received for this long
    pub liveness_window: Duration,
    /// Largest inbound message accepted
    pub max_message_size: usize,
    /// Frames a connection may have in flight before it counts as failed
    pub outbound_capacity: usize,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            write_timeout: Duration::from_secs(10),
            liveness_window: Duration::from_secs(60),
            max_message_size: 1024,
            outbound_capacity: 64,
        }
    }
}

/// Run one display session to completion
///
/// Registers a new connection with the hub, runs the writer and reader until
/// either stops, then unregisters. Generic over the socket halves so it can
/// be driven by an axum `WebSocket` or by in-memory channels.
pub async fn run_session<S, R, E>(
    sink: S,
    stream: R,
    hub: Arc<Hub>,
    config: KeepaliveConfig,
) where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (conn, outbound) = Connection::channel(config.outbound_capacity);
    let id = conn.id();
    let total = hub.register(conn).await;
    info!("Display client {} connected ({} total)", id, total);

    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);

    let writer = tokio::spawn(write_loop(
        sink,
        outbound,
        config.clone(),
        Arc::clone(&stop_tx),
        stop_rx.clone(),
    ));

    read_loop(stream, &config, stop_rx).await;

    let _ = stop_tx.send(true);
    let total = hub.unregister(id).await;
    info!("Display client {} disconnected ({} total)", id, total);

    if let Err(e) = writer.await {
        warn!("Display client {} writer task failed: {}", id, e);
    }
}

/// Forward hub frames and keepalive pings to the socket
async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Frame>,
    config: KeepaliveConfig,
    stop_tx: Arc<watch::Sender<bool>>,
    mut stop_rx: watch::Receiver<bool>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = interval(config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    // Evicted by the hub: close the socket
                    let _ = timeout(config.write_timeout, sink.send(Message::Close(None))).await;
                    break;
                };
                let message = Message::Text(frame.to_string());
                if !send_bounded(&mut sink, message, config.write_timeout).await {
                    break;
                }
            }
            _ = ticker.tick() => {
                let ping = Message::Ping(b"ping".to_vec());
                if !send_bounded(&mut sink, ping, config.write_timeout).await {
                    debug!("Keepalive ping failed");
                    break;
                }
            }
            _ = stop_rx.changed() => break,
        }
    }

    let _ = stop_tx.send(true);
    let _ = sink.close().await;
}

/// Send one message within the write bound; false on error or timeout
async fn send_bounded<S>(sink: &mut S, message: Message, bound: Duration) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match timeout(bound, sink.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!("Socket write failed: {}", e);
            false
        }
        Err(_) => {
            debug!("Socket write timed out after {:?}", bound);
            false
        }
    }
}

/// Watch for disconnects; inbound payloads are discarded
async fn read_loop<R, E>(
    mut stream: R,
    config: &KeepaliveConfig,
    mut stop_rx: watch::Receiver<bool>,
) where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        tokio::select! {
            next = timeout(config.liveness_window, stream.next()) => match next {
                Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                Ok(Some(Ok(_))) => continue,
                Ok(Some(Err(e))) => {
                    debug!("Socket read failed: {}", e);
                    break;
                }
                Err(_) => {
                    debug!("No liveness signal within {:?}", config.liveness_window);
                    break;
                }
            },
            _ = stop_rx.changed() => break,
        }
    }
}
