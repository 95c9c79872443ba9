//! Stdio adapter – NDJSON out on stdout, resync requests in on stdin.
//!
//! Each outbound topic gets a forwarding task that encodes events with
//! [`json_codec::encode_event`] and hands the lines to a single writer task,
//! so lines never interleave.  Inbound lines are decoded with
//! [`json_codec::decode_resync`] and sent on the resync topic.

use std::sync::Arc;

use navbridge_middleware::{TopicReceiver, Transport, json_codec};
use navbridge_types::{NavMessage, NavTopic};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast::error::RecvError, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Lines buffered between the forwarders and the writer.
const LINE_BUFFER: usize = 256;

/// Subscribe to every outbound topic and stream the events to `writer`.
///
/// Subscriptions are made before this returns.  The returned task finishes
/// once `shutdown` changes (or the writer fails) and yields the number of
/// lines written.
pub fn spawn_outbound<W>(
    transport: &dyn Transport,
    writer: W,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<u64>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    for topic in NavTopic::OUTBOUND {
        let receiver = transport.subscribe(topic);
        tokio::spawn(forward_topic(receiver, tx.clone(), shutdown.clone()));
    }
    drop(tx);
    tokio::spawn(write_lines(rx, writer))
}

async fn forward_topic(
    mut receiver: TopicReceiver,
    lines: mpsc::Sender<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let topic = receiver.topic();
    if *shutdown.borrow() {
        return;
    }
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            received = receiver.recv() => match received {
                Ok(event) => match json_codec::encode_event(&event) {
                    Ok(line) => {
                        if lines.send(line).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(%topic, error = %e, "dropping event that could not be encoded"),
                },
                Err(RecvError::Lagged(n)) => {
                    warn!(%topic, skipped = n, "stdout forwarder lagged; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn write_lines<W>(mut lines: mpsc::Receiver<String>, mut writer: W) -> u64
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(line) = lines.recv().await {
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = result {
            warn!(error = %e, "output closed; no further messages will be written");
            break;
        }
        written += 1;
    }
    written
}

/// Read resync requests from `reader`, one JSON object per line, and send
/// them on [`NavTopic::Resync`].
///
/// Blank lines are skipped; undecodable lines are logged and skipped.
/// Returns the number of requests sent when the input ends or `shutdown`
/// changes.
pub async fn pump_resync_lines<R>(
    reader: R,
    transport: Arc<dyn Transport>,
    mut shutdown: watch::Receiver<bool>,
) -> u64
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0;
    if *shutdown.borrow() {
        return accepted;
    }
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match json_codec::decode_resync(&line) {
                        Ok(payload) => match transport.send_message(NavMessage::Resync(payload)) {
                            Ok(_) => accepted += 1,
                            Err(e) => warn!(error = %e, "could not forward resync request"),
                        },
                        Err(e) => warn!(error = %e, "ignoring input line"),
                    }
                }
                Ok(None) => {
                    debug!("input closed; no more resync requests");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "failed to read input; resync input disabled");
                    break;
                }
            },
        }
    }
    accepted
}
