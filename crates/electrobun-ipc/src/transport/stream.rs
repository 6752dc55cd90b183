//! The pipe path: a byte-stream writer plus an inbound byte source, framed
//! with [`crate::codec`].

use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use electrobun_common::TransportError;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ReceiveHandler, Transport, TransportKind};
use crate::codec::{decode_stream, write_message, EncodedMessage};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Messages waiting for the writer task.
const WRITE_QUEUE: usize = 64;

/// Where inbound bytes come from.
pub enum InboundSource {
    /// A FIFO opened lazily by the read loop. Opening blocks until the peer
    /// opens the other end for writing.
    #[cfg(unix)]
    Fifo(std::path::PathBuf),
    /// Any already-open reader.
    Reader(BoxedReader),
}

impl InboundSource {
    pub fn reader<R: AsyncRead + Send + Unpin + 'static>(reader: R) -> Self {
        Self::Reader(Box::new(reader))
    }
}

struct WriteJob {
    message: EncodedMessage,
    done: oneshot::Sender<std::io::Result<()>>,
}

/// The outbound half. All writes go through one task, so a message is
/// either written whole or, on close, abandoned along with the channel.
/// Dropping a caller's `send` future never leaves half a frame behind.
enum Writer {
    Idle(BoxedWriter),
    Running {
        jobs: mpsc::Sender<WriteJob>,
        task: JoinHandle<()>,
    },
    Closed,
}

pub struct StreamTransport {
    label: String,
    writer: StdMutex<Writer>,
    inbound: StdMutex<Option<InboundSource>>,
    read_task: StdMutex<Option<JoinHandle<()>>>,
    /// Stops the read loop, including a FIFO open still waiting for a writer.
    stop: CancellationToken,
}

impl StreamTransport {
    pub fn new<W>(label: impl Into<String>, writer: W, inbound: InboundSource) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            label: label.into(),
            writer: StdMutex::new(Writer::Idle(Box::new(writer))),
            inbound: StdMutex::new(Some(inbound)),
            read_task: StdMutex::new(None),
            stop: CancellationToken::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Queue into the writer task, starting it on first use.
    fn jobs(&self) -> Result<mpsc::Sender<WriteJob>, TransportError> {
        let mut state = self.writer.lock().map_err(|_| TransportError::Closed)?;
        if let Writer::Running { jobs, .. } = &*state {
            return Ok(jobs.clone());
        }
        match std::mem::replace(&mut *state, Writer::Closed) {
            Writer::Idle(writer) => {
                let (jobs, queue) = mpsc::channel(WRITE_QUEUE);
                let task = tokio::spawn(write_loop(
                    writer,
                    queue,
                    self.stop.clone(),
                    self.label.clone(),
                ));
                *state = Writer::Running {
                    jobs: jobs.clone(),
                    task,
                };
                Ok(jobs)
            }
            _ => Err(TransportError::Closed),
        }
    }
}

#[async_trait]
impl Transport for StreamTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Pipe
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn send(&self, message: &EncodedMessage) -> Result<(), TransportError> {
        if self.stop.is_cancelled() {
            return Err(TransportError::Closed);
        }
        let jobs = self.jobs()?;
        let (done, written) = oneshot::channel();
        let job = WriteJob {
            message: message.clone(),
            done,
        };
        jobs.send(job).await.map_err(|_| TransportError::Closed)?;
        // A dropped `done` means the writer stopped before finishing.
        written.await.map_err(|_| TransportError::Closed)??;
        debug!(channel = %self.label, bytes = message.len(), "message written");
        Ok(())
    }

    fn register_receive_handler(&self, handler: ReceiveHandler, closed: CancellationToken) {
        let Some(source) = self.inbound.lock().ok().and_then(|mut s| s.take()) else {
            warn!(channel = %self.label, "receive handler already registered");
            return;
        };
        let label = self.label.clone();
        let task = tokio::spawn(read_loop(source, handler, closed, self.stop.clone(), label));
        if let Ok(mut slot) = self.read_task.lock() {
            *slot = Some(task);
        }
    }

    /// Stop both loops and wait for them. The writer is dropped, so the
    /// peer sees end-of-data; a write stuck on a peer that stopped reading
    /// is abandoned rather than waited for.
    async fn close(&self) {
        self.stop.cancel();
        let writer = self
            .writer
            .lock()
            .ok()
            .map(|mut state| std::mem::replace(&mut *state, Writer::Closed));
        if let Some(Writer::Running { task, .. }) = writer {
            let _ = task.await;
        }
        let task = self.read_task.lock().ok().and_then(|mut t| t.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for StreamTransport {
    // The read loop finishes on its own once stopped.
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn write_loop(
    mut writer: BoxedWriter,
    mut queue: mpsc::Receiver<WriteJob>,
    stop: CancellationToken,
    label: String,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            job = queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        tokio::select! {
            biased;
            _ = stop.cancelled() => {
                debug!(channel = %label, bytes = job.message.len(), "write abandoned on close");
                break;
            }
            result = write_message(&mut writer, &job.message) => {
                if let Err(e) = &result {
                    warn!(channel = %label, error = %e, "write failed");
                }
                let _ = job.done.send(result);
            }
        }
    }
    debug!(channel = %label, "writer stopped");
}

async fn read_loop(
    source: InboundSource,
    handler: ReceiveHandler,
    closed: CancellationToken,
    stop: CancellationToken,
    label: String,
) {
    let reader: BoxedReader = match source {
        #[cfg(unix)]
        InboundSource::Fifo(path) => match super::pipe::open_reader(&path, &stop).await {
            Ok(Some(receiver)) => Box::new(receiver),
            Ok(None) => {
                debug!(channel = %label, "stopped before the peer opened its end");
                closed.cancel();
                return;
            }
            Err(e) => {
                tracing::error!(channel = %label, error = %e, "failed to open inbound pipe");
                closed.cancel();
                return;
            }
        },
        InboundSource::Reader(reader) => reader,
    };

    let mut frames = decode_stream(reader);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = closed.cancelled() => break,
            frame = frames.next() => match frame {
                Some(Ok(value)) => handler(value),
                Some(Err(e)) => {
                    warn!(channel = %label, error = %e, "inbound read failed");
                    break;
                }
                None => break,
            },
        }
    }

    debug!(channel = %label, "inbound stream closed");
    closed.cancel();
}
