use std::io::{self, ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, warn};

use crate::error::{Result, TransportError};
use crate::traits::{ChunkReceiver, Transport};

/// Default size of a single read from the underlying stream: 8 KiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for [`StreamTransport`].
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Maximum number of bytes handed to the receiver per chunk. Default: 8 KiB.
    pub read_chunk_size: usize,
    /// Name of the reader thread. Default: `sliplink-rx`.
    pub thread_name: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            thread_name: "sliplink-rx".to_string(),
        }
    }
}

type SharedReceiver = Arc<Mutex<Option<ChunkReceiver>>>;

type ShutdownHook = Box<dyn FnOnce() -> io::Result<()> + Send + Sync>;

/// Drives a caller-opened `Read`/`Write` pair as a [`Transport`].
///
/// Frames are written under a lock, so concurrent senders never interleave.
/// The first receiver registration spawns one reader thread that delivers
/// chunks until EOF or a hard I/O error.
///
/// Dropping the transport stops delivery: the reader thread hands no further
/// chunks to the receiver, and the shutdown hook (if any) runs so a reader
/// blocked on the stream wakes up and the peer sees EOF.
pub struct StreamTransport {
    writer: Mutex<Box<dyn Write + Send>>,
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    receiver: SharedReceiver,
    closed: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    shutdown: Mutex<Option<ShutdownHook>>,
    config: StreamConfig,
}

impl StreamTransport {
    /// Create a stream transport with default configuration.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::with_config(reader, writer, StreamConfig::default())
    }

    /// Create a stream transport with explicit configuration.
    pub fn with_config<R, W>(reader: R, writer: W, config: StreamConfig) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            writer: Mutex::new(Box::new(writer)),
            reader: Mutex::new(Some(Box::new(reader))),
            receiver: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
            stopping: Arc::new(AtomicBool::new(false)),
            shutdown: Mutex::new(None),
            config,
        }
    }

    /// Set the action run by [`shutdown`](Self::shutdown) and on drop, typically
    /// shutting down the socket both ways.
    pub fn with_shutdown<F>(self, hook: F) -> Self
    where
        F: FnOnce() -> io::Result<()> + Send + Sync + 'static,
    {
        *lock(&self.shutdown) = Some(Box::new(hook));
        self
    }

    /// Wrap a connected Unix stream, cloning it for the reader half.
    ///
    /// Shutting the transport down shuts the socket down both ways.
    #[cfg(unix)]
    pub fn from_unix_stream(stream: std::os::unix::net::UnixStream) -> Result<Self> {
        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        Ok(Self::new(reader, stream)
            .with_shutdown(move || control.shutdown(std::net::Shutdown::Both)))
    }

    /// Stop delivering chunks and run the shutdown hook.
    ///
    /// Idempotent. Sends after shutdown fail with whatever the stream reports.
    pub fn shutdown(&self) -> Result<()> {
        self.stopping.store(true, Ordering::Release);
        match lock(&self.shutdown).take() {
            Some(hook) => {
                debug!(thread = %self.config.thread_name, "stream transport shutting down");
                hook().map_err(TransportError::Io)
            }
            None => Ok(()),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Whether the reader thread has been started.
    pub fn is_reading(&self) -> bool {
        lock(&self.reader).is_none()
    }

    /// Whether the reader thread has stopped on EOF or a read error.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn spawn_reader(&self) -> Result<()> {
        let Some(reader) = lock(&self.reader).take() else {
            return Ok(());
        };

        let receiver = Arc::clone(&self.receiver);
        let closed = Arc::clone(&self.closed);
        let stopping = Arc::clone(&self.stopping);
        let chunk_size = self.config.read_chunk_size.max(1);
        std::thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                pump(reader, receiver, &stopping, chunk_size);
                closed.store(true, Ordering::Release);
            })
            .map_err(TransportError::Spawn)?;

        debug!(thread = %self.config.thread_name, "reader thread started");
        Ok(())
    }
}

impl Transport for StreamTransport {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let mut writer = lock(&self.writer);

        let mut offset = 0usize;
        while offset < frame.len() {
            match writer.write(&frame[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match writer.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn register_receiver(&self, receiver: ChunkReceiver) {
        *lock(&self.receiver) = Some(receiver);
        if let Err(err) = self.spawn_reader() {
            error!(error = %err, "stream transport cannot deliver chunks");
        }
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            // ENOTCONN when the peer is already gone.
            debug!(error = %err, "stream shutdown on drop failed");
        }
    }
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("config", &self.config)
            .field("reading", &self.is_reading())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn pump(
    mut reader: Box<dyn Read + Send>,
    receiver: SharedReceiver,
    stopping: &AtomicBool,
    chunk_size: usize,
) {
    let mut chunk = vec![0u8; chunk_size];
    loop {
        if stopping.load(Ordering::Acquire) {
            debug!("stream transport dropped, reader thread exiting");
            return;
        }

        let read = match reader.read(&mut chunk) {
            Ok(0) => {
                debug!("stream reached EOF, reader thread exiting");
                return;
            }
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "stream read failed, reader thread exiting");
                return;
            }
        };

        if stopping.load(Ordering::Acquire) {
            debug!(len = read, "stream transport dropped, chunk discarded");
            return;
        }
        if let Some(deliver) = lock(&receiver).as_mut() {
            deliver(&chunk[..read]);
        }
    }
}

// A receiver that panicked must not take the transport down with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
