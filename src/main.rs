/*!
 * opflow demo
 *
 * Loopback walkthrough of the composed operations:
 * - Request/reply exchange through the multiplexer
 * - Deadline race against a peer that never answers
 * - Concurrent frame writers drained through a phaser
 * - Heartbeats bounded by process signals
 */

use std::error::Error;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use opflow::{
    init_tracing, signalled, timed, CancelToken, CorrelationId, Executor, Multiplexer, OpError,
    OpResult, Operation, RuntimeConfig, SerialWriter, SignalSet, Tagged,
};

#[derive(Debug, Clone, PartialEq)]
enum Frame {
    Ping { seq: u32 },
    Pong { seq: u32 },
    Query,
    Status(u8),
    Mute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Ping,
    Pong,
    Query,
    Status,
    Mute,
}

impl Tagged for Frame {
    type Tag = FrameKind;

    fn tag(&self) -> FrameKind {
        match self {
            Frame::Ping { .. } => FrameKind::Ping,
            Frame::Pong { .. } => FrameKind::Pong,
            Frame::Query => FrameKind::Query,
            Frame::Status(_) => FrameKind::Status,
            Frame::Mute => FrameKind::Mute,
        }
    }
}

impl Frame {
    fn encode(&self, id: CorrelationId) -> Vec<u8> {
        format!("{}:{:?}\n", id, self).into_bytes()
    }
}

/// In-process peer answering requests after a settle delay
struct LoopbackPort {
    requests: mpsc::UnboundedSender<(CorrelationId, Frame)>,
    cancel: CancelToken,
}

impl LoopbackPort {
    fn spawn(mux: Multiplexer<Frame>, settle_delay: Duration) -> Self {
        let (requests, mut inbox) = mpsc::unbounded_channel::<(CorrelationId, Frame)>();

        tokio::spawn(async move {
            while let Some((id, frame)) = inbox.recv().await {
                let reply = match frame {
                    Frame::Ping { seq } => Frame::Pong { seq },
                    Frame::Query => Frame::Status(0),
                    _ => continue,
                };
                tokio::time::sleep(settle_delay).await;
                mux.fulfill(id, reply);
            }
        });

        Self {
            requests,
            cancel: CancelToken::new(),
        }
    }

    async fn send(&self, id: CorrelationId, frame: Frame) -> OpResult<()> {
        self.requests
            .send((id, frame))
            .map_err(|_| OpError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "loopback peer gone")))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    info!("opflow demo starting...");
    let config = RuntimeConfig::from_env()?;
    info!(
        reply_timeout_ms = config.reply_timeout.as_millis() as u64,
        retries = config.retries,
        max_pending = config.max_pending,
        "Configuration loaded"
    );

    let executor = Executor::current();
    let mux = Multiplexer::<Frame>::builder()
        .max_pending(config.max_pending)
        .executor(executor.clone())
        .build();
    let port = Arc::new(LoopbackPort::spawn(mux.clone(), config.settle_delay));

    // Request/reply exchange
    let pong = Operation::run(&executor, "ping", {
        let mux = mux.clone();
        let port = port.clone();
        let config = config.clone();
        move |_ctx| async move {
            let mut tx = mux.transaction()?;
            tx.exchange(FrameKind::Pong, config.reply_timeout, config.retries, |id| {
                port.send(id, Frame::Ping { seq: 1 })
            })
            .await
        }
    })
    .await?;
    info!(reply = ?pong, "Exchange completed");

    // Deadline race against a silent peer
    let mut tx = mux.transaction()?;
    let silent = timed(
        &port.cancel,
        config.reply_timeout,
        port.cancel.run(async {
            port.send(tx.id(), Frame::Mute).await?;
            tx.async_wait_for(FrameKind::Status, config.reply_timeout * 10).await
        }),
    )
    .await;
    match silent {
        Err(err) if err.is_timeout() => info!(error = %err, "Silent peer timed out as expected"),
        other => warn!(result = ?other, "Silent peer race ended unexpectedly"),
    }
    drop(tx);

    // Concurrent writers on one stream
    let writer = Arc::new(SerialWriter::new(tokio::io::sink()).with_write_timeout(config.write_timeout));
    let mut writers = Vec::new();
    for seq in 0..4u32 {
        let writer = writer.clone();
        writers.push(tokio::spawn(async move {
            writer.write_frame(&Frame::Ping { seq }.encode(CorrelationId(seq))).await
        }));
    }
    writer.drain().await?;
    for handle in writers {
        handle.await??;
    }
    info!("Serialized writes drained");

    // Heartbeats until done or interrupted
    let mut signals = SignalSet::new(&config.signals)?;
    let heartbeats = signalled(&port.cancel, &mut signals, port.cancel.run(async {
        for _ in 0..3 {
            let mut tx = mux.transaction()?;
            port.send(tx.id(), Frame::Query).await?;
            let status = tx.async_wait_for(FrameKind::Status, config.reply_timeout).await?;
            info!(status = ?status, "Heartbeat");
            tokio::time::sleep(config.settle_delay).await;
        }
        OpResult::Ok(())
    }))
    .await;
    if let Err(err) = heartbeats {
        warn!(error = %err, "Heartbeats stopped");
    }

    executor.wait_idle().await;
    info!(
        stats = %serde_json::to_string(&executor.stats())?,
        delivered = mux.delivered_replies(),
        dropped = mux.dropped_replies(),
        "opflow demo finished"
    );

    Ok(())
}
