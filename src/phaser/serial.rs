/*!
 * Serialized Writer
 *
 * Many tasks write whole frames to one stream. Each write registers a phaser
 * branch before it queues for the stream, so `drain()` knows when every
 * writer that started has finished.
 */

use super::Phaser;
use crate::core::errors::{OpError, OpResult};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Stream shared by concurrent frame writers
pub struct SerialWriter<W> {
    stream: Mutex<W>,
    phaser: Phaser,
    write_timeout: Option<Duration>,
}

impl<W> SerialWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(stream: W) -> Self {
        Self::with_phaser(stream, Phaser::new())
    }

    /// Use an existing phaser, e.g. one bound to an executor
    pub fn with_phaser(stream: W, phaser: Phaser) -> Self {
        Self {
            stream: Mutex::new(stream),
            phaser,
            write_timeout: None,
        }
    }

    /// Bound every frame write by `timeout`
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Write one frame without interleaving with other writers
    pub async fn write_frame(&self, frame: &[u8]) -> OpResult<()> {
        let branch = self.phaser.discard();
        let start = Instant::now();

        let mut stream = self.stream.lock().await;
        let result = match self.write_timeout {
            Some(limit) => {
                let remaining = limit.saturating_sub(start.elapsed());
                match tokio::time::timeout(remaining, stream.write_all(frame)).await {
                    Ok(written) => written.map_err(OpError::from),
                    Err(_) => {
                        warn!(len = frame.len(), "frame write timed out");
                        Err(OpError::timeout(start.elapsed(), limit))
                    }
                }
            }
            None => stream.write_all(frame).await.map_err(OpError::from),
        };
        drop(stream);

        branch.complete(());
        result
    }

    /// Wait for every started write, then flush the stream
    pub async fn drain(&self) -> OpResult<()> {
        self.phaser.async_wait().await;
        let mut stream = self.stream.lock().await;
        stream.flush().await?;
        debug!("serial writer drained");
        Ok(())
    }

    /// Writes currently queued or in progress
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.phaser.in_flight()
    }

    #[inline]
    pub fn phaser(&self) -> &Phaser {
        &self.phaser
    }

    pub fn into_inner(self) -> W {
        self.stream.into_inner()
    }
}
