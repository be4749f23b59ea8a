//! Framed, ordered, backpressured transports between hub and spoke.
//!
//! A transport is a pair of halves: a [`FrameSink`] whose `send` completes
//! only once the frame has been accepted by the other side's buffer, and a
//! [`FrameSource`] that yields frames in order and `None` at end of stream.
//!
//! Two implementations:
//!
//! - bounded tokio channels, for in-process spokes
//! - newline-delimited JSON over any async byte stream, for child processes

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer went away.
    #[error("channel closed by peer")]
    Closed,

    /// Byte stream failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame could not be encoded or decoded.
    #[error("frame codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The spoke could not be started.
    #[error("failed to spawn spoke: {0}")]
    Spawn(String),

    /// The spoke did not finish in time.
    #[error("spoke timed out")]
    TimedOut,
}

/// Sending half of a transport.
#[async_trait]
pub trait FrameSink<T: Send + 'static>: Send {
    /// Send one frame, waiting until the transport accepts it.
    async fn send(&mut self, frame: T) -> Result<(), TransportError>;
}

/// Receiving half of a transport.
#[async_trait]
pub trait FrameSource<T: Send + 'static>: Send {
    /// Next frame, or `None` once the peer has closed the stream.
    async fn recv(&mut self) -> Result<Option<T>, TransportError>;
}

#[async_trait]
impl<T: Send + 'static> FrameSink<T> for Box<dyn FrameSink<T>> {
    async fn send(&mut self, frame: T) -> Result<(), TransportError> {
        (**self).send(frame).await
    }
}

#[async_trait]
impl<T: Send + 'static> FrameSource<T> for Box<dyn FrameSource<T>> {
    async fn recv(&mut self) -> Result<Option<T>, TransportError> {
        (**self).recv().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Channels
// ─────────────────────────────────────────────────────────────────────────────

/// Sending half of a bounded channel transport.
#[derive(Debug)]
pub struct ChannelSink<T> {
    tx: mpsc::Sender<T>,
}

/// Receiving half of a bounded channel transport.
#[derive(Debug)]
pub struct ChannelSource<T> {
    rx: mpsc::Receiver<T>,
}

/// Create a bounded channel transport holding at most `capacity` frames.
pub fn channel<T>(capacity: usize) -> (ChannelSink<T>, ChannelSource<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelSink { tx }, ChannelSource { rx })
}

#[async_trait]
impl<T: Send + 'static> FrameSink<T> for ChannelSink<T> {
    async fn send(&mut self, frame: T) -> Result<(), TransportError> {
        self.tx.send(frame).await.map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl<T: Send + 'static> FrameSource<T> for ChannelSource<T> {
    async fn recv(&mut self) -> Result<Option<T>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Newline-delimited JSON
// ─────────────────────────────────────────────────────────────────────────────

/// Writes one JSON document per line and flushes after each frame.
#[derive(Debug)]
pub struct LineSink<W, T> {
    writer: W,
    _frame: PhantomData<fn(T)>,
}

impl<W, T> LineSink<W, T> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _frame: PhantomData,
        }
    }
}

#[async_trait]
impl<W, T> FrameSink<T> for LineSink<W, T>
where
    W: AsyncWrite + Unpin + Send,
    T: Serialize + Send + 'static,
{
    async fn send(&mut self, frame: T) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(&frame)?;
        line.push(b'\n');
        self.writer.write_all(&line).await.map_err(closed_or_io)?;
        self.writer.flush().await.map_err(closed_or_io)?;
        Ok(())
    }
}

/// Reads one JSON document per line; blank lines are skipped.
#[derive(Debug)]
pub struct LineSource<R, T> {
    reader: R,
    line: String,
    _frame: PhantomData<fn() -> T>,
}

impl<R, T> LineSource<R, T> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            _frame: PhantomData,
        }
    }
}

#[async_trait]
impl<R, T> FrameSource<T> for LineSource<R, T>
where
    R: AsyncBufRead + Unpin + Send,
    T: DeserializeOwned + Send + 'static,
{
    async fn recv(&mut self) -> Result<Option<T>, TransportError> {
        loop {
            self.line.clear();
            if self.reader.read_line(&mut self.line).await? == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(trimmed)?));
        }
    }
}

fn closed_or_io(err: std::io::Error) -> TransportError {
    if err.kind() == std::io::ErrorKind::BrokenPipe {
        TransportError::Closed
    } else {
        TransportError::Io(err)
    }
}
