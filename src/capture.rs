//! Capture strategies backed by a PTY reader: a live rolling buffer (primary)
//! and the tail of the transcript file (fallback).

use crate::source::{CaptureError, CaptureStrategy};
use async_trait::async_trait;
use std::io::{Read, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Bytes of recent output a snapshot covers.
pub const SNAPSHOT_BYTES: usize = 5000;
const BUFFER_LIMIT: usize = 2 * SNAPSHOT_BYTES;

pub type OutputHandler = Box<dyn Fn(&[u8]) + Send>;

/// Output handler that copies program output to `writer`.
///
/// The first write error disables the echo for the rest of the run.
pub fn echo_to<W: Write + Send + 'static>(writer: W) -> OutputHandler {
    let writer = Mutex::new(Some(writer));
    Box::new(move |data| {
        let mut slot = writer.lock().unwrap_or_else(PoisonError::into_inner);
        let failed = match slot.as_mut() {
            Some(w) => w.write_all(data).and_then(|_| w.flush()).err(),
            None => None,
        };
        if let Some(e) = failed {
            tracing::debug!(error = %e, "echo failed, no longer echoing output");
            *slot = None;
        }
    })
}

/// Rolling window of the most recent program output.
#[derive(Default)]
pub struct CaptureBuffer {
    bytes: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, data: &[u8]) {
        let mut bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        bytes.extend_from_slice(data);
        // Prevent buffer from growing too large
        if bytes.len() > BUFFER_LIMIT {
            let excess = bytes.len() - SNAPSHOT_BYTES;
            bytes.drain(..excess);
        }
    }

    /// Mark the stream as finished; no more output will arrive.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Spawns a background thread that copies everything from `reader` into a
/// [`CaptureBuffer`], the optional transcript, and `on_output`.
///
/// The buffer is closed once the reader reports EOF or an error.
pub fn spawn_reader<R, W>(
    mut reader: R,
    mut transcript: Option<W>,
    on_output: OutputHandler,
) -> Arc<CaptureBuffer>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let buffer = Arc::new(CaptureBuffer::new());
    let shared = buffer.clone();

    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break, // EOF
                Ok(n) => {
                    let data = &chunk[..n];
                    let failed = match transcript.as_mut() {
                        Some(file) => file.write_all(data).and_then(|_| file.flush()).err(),
                        None => None,
                    };
                    if let Some(e) = failed {
                        tracing::warn!(error = %e, "transcript write failed, disabling transcript");
                        transcript = None;
                    }
                    shared.push(data);
                    on_output(data);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "pty reader stopped");
                    break;
                }
            }
        }
        shared.close();
    });

    buffer
}

/// Primary strategy: the live rolling buffer. Unusable once the program's
/// output stream has closed.
pub struct LiveBuffer(pub Arc<CaptureBuffer>);

#[async_trait]
impl CaptureStrategy for LiveBuffer {
    async fn recent_text(&self) -> Result<String, CaptureError> {
        if self.0.is_closed() {
            return Err(CaptureError::Closed);
        }
        Ok(self.0.snapshot())
    }
}

/// Fallback strategy: the last [`SNAPSHOT_BYTES`] of a transcript file.
pub struct TranscriptTail {
    path: PathBuf,
    max_bytes: u64,
}

impl TranscriptTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: SNAPSHOT_BYTES as u64,
        }
    }
}

#[async_trait]
impl CaptureStrategy for TranscriptTail {
    async fn recent_text(&self) -> Result<String, CaptureError> {
        let mut file = tokio::fs::File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        file.seek(SeekFrom::Start(len.saturating_sub(self.max_bytes)))
            .await?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
