//! filter::pipe
//!
//! Pull-based byte stream fed by a worker thread.
//!
//! # Architecture
//!
//! The worker writes into a [`ChunkSink`]; each write hands exactly one
//! chunk to a capacity-one channel. The reader pulls one chunk at a time
//! and keeps any part the caller's buffer could not hold, so a partial read
//! never drops or duplicates bytes. A worker blocked on a full channel stops
//! filtering until the reader drains it, which bounds memory to one chunk in
//! flight plus one retained remainder.
//!
//! # States
//!
//! ```text
//! Starting -> Streaming -> Draining -> Closed
//! ```
//!
//! `Draining` is entered when the worker reports that it finished; the
//! stream becomes `Closed` once every retained byte is delivered, or when
//! [`FilterStream::close`] is called.

use std::fmt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::core::error::Error;

/// What travels from the worker to the reader.
enum Message {
    Chunk(Vec<u8>),
    End(Result<(), Error>),
}

/// Lifecycle of a [`FilterStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Worker launched, nothing received yet.
    Starting,
    /// Chunks are flowing.
    Streaming,
    /// Worker finished; retained bytes are still being delivered.
    Draining,
    /// End of stream reached or `close()` called; worker joined.
    Closed,
}

/// Worker-side writer. Each `write` hands over at most one chunk.
pub struct ChunkSink {
    sender: SyncSender<Message>,
    cancel: Arc<AtomicBool>,
    chunk_size: usize,
}

impl ChunkSink {
    /// Largest chunk a single write hands over.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether the reader has closed the stream.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "filter stream reader closed")
}

impl Write for ChunkSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.is_cancelled() {
            return Err(broken_pipe());
        }
        let n = buf.len().min(self.chunk_size);
        self.sender
            .send(Message::Chunk(buf[..n].to_vec()))
            .map_err(|_| broken_pipe())?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader side of the filter pipe.
///
/// Dropping the stream closes it.
pub struct FilterStream {
    receiver: Option<Receiver<Message>>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    remainder: Vec<u8>,
    offset: usize,
    writer_done: bool,
    closed_by_caller: bool,
    state: StreamState,
}

impl FilterStream {
    /// Launch `producer` on a worker thread and return the reading end.
    ///
    /// The producer's error, if any, is returned by the read that reaches
    /// it, after every byte written before the failure.
    pub fn spawn<F>(chunk_size: usize, producer: F) -> Result<Self, Error>
    where
        F: FnOnce(&mut ChunkSink) -> Result<(), Error> + Send + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let mut sink = ChunkSink {
            sender,
            cancel: Arc::clone(&cancel),
            chunk_size: chunk_size.max(1),
        };

        let handle = thread::Builder::new()
            .name("gitbridge-filter".into())
            .spawn(move || {
                let result = producer(&mut sink);
                if let Err(err) = &result {
                    tracing::debug!(error = %err, "filter worker failed");
                }
                // The reader may already be gone; nothing is waiting then.
                let _ = sink.sender.send(Message::End(result));
            })
            .map_err(|e| {
                tracing::error!(error = %e, "failed to spawn filter worker");
                Error::Io(e)
            })?;

        Ok(FilterStream {
            receiver: Some(receiver),
            cancel,
            handle: Some(handle),
            remainder: Vec::new(),
            offset: 0,
            writer_done: false,
            closed_by_caller: false,
            state: StreamState::Starting,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Read at most `max` bytes. An empty vector means end of stream.
    ///
    /// # Errors
    ///
    /// - [`Error::StreamClosed`] after [`close`](Self::close)
    /// - the worker's own error, once every byte before it was delivered
    pub fn read_chunk(&mut self, max: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0; max];
        let n = self.read_into(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.closed_by_caller {
            return Err(Error::StreamClosed);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.offset < self.remainder.len() {
                let available = &self.remainder[self.offset..];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.offset += n;
                if self.offset == self.remainder.len() {
                    self.remainder.clear();
                    self.offset = 0;
                }
                return Ok(n);
            }

            if self.writer_done || self.state == StreamState::Closed {
                self.finish();
                return Ok(0);
            }

            let Some(receiver) = &self.receiver else {
                return Ok(0);
            };

            match receiver.recv() {
                Ok(Message::Chunk(chunk)) => {
                    if self.state == StreamState::Starting {
                        self.transition(StreamState::Streaming);
                    }
                    self.remainder = chunk;
                    self.offset = 0;
                }
                Ok(Message::End(Ok(()))) => {
                    self.writer_done = true;
                    self.transition(StreamState::Draining);
                }
                Ok(Message::End(Err(err))) => {
                    self.finish();
                    return Err(err);
                }
                Err(_) => {
                    self.finish();
                    return Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "filter worker exited without finishing",
                    )));
                }
            }
        }
    }

    /// Stop the worker and release everything.
    ///
    /// Idempotent. Pending chunks are discarded so a worker blocked on the
    /// channel wakes up, then the worker is joined. A panicking worker is
    /// logged, not propagated. Reads after `close` fail with
    /// [`Error::StreamClosed`].
    pub fn close(&mut self) {
        self.closed_by_caller = true;
        if self.state == StreamState::Closed {
            return;
        }
        self.cancel.store(true, Ordering::Release);
        if let Some(receiver) = self.receiver.take() {
            while receiver.try_recv().is_ok() {}
        }
        self.remainder = Vec::new();
        self.offset = 0;
        self.finish();
    }

    fn finish(&mut self) {
        // Dropping the receiver unblocks a worker stuck in `send`.
        self.receiver = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("filter worker panicked during teardown");
            }
        }
        self.transition(StreamState::Closed);
    }

    fn transition(&mut self, next: StreamState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "filter stream state");
            self.state = next;
        }
    }
}

impl Read for FilterStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_into(buf).map_err(|err| match err {
            Error::Io(e) => e,
            other => io::Error::other(other),
        })
    }
}

impl Drop for FilterStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for FilterStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStream")
            .field("state", &self.state)
            .field("retained", &(self.remainder.len() - self.offset))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(data: Vec<u8>, chunk_size: usize) -> FilterStream {
        FilterStream::spawn(chunk_size, move |sink| {
            sink.write_all(&data)?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn reads_everything_in_order() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut stream = stream_of(data.clone(), 333);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[test]
    fn partial_reads_keep_the_remainder() {
        let mut stream = stream_of(b"abcdefgh".to_vec(), 8);
        assert_eq!(stream.read_chunk(3).unwrap(), b"abc");
        assert_eq!(stream.state(), StreamState::Streaming);
        assert_eq!(stream.read_chunk(3).unwrap(), b"def");
        assert_eq!(stream.read_chunk(100).unwrap(), b"gh");
        assert!(stream.read_chunk(100).unwrap().is_empty());
        // End of stream is sticky.
        assert!(stream.read_chunk(100).unwrap().is_empty());
    }

    #[test]
    fn empty_producer_is_plain_eof() {
        let mut stream = FilterStream::spawn(16, |_| Ok(())).unwrap();
        assert!(stream.read_chunk(16).unwrap().is_empty());
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[test]
    fn writes_are_split_by_chunk_size() {
        let mut stream = stream_of(vec![7; 10], 4);
        // One read never crosses a chunk boundary.
        assert_eq!(stream.read_chunk(100).unwrap().len(), 4);
        assert_eq!(stream.read_chunk(100).unwrap().len(), 4);
        assert_eq!(stream.read_chunk(100).unwrap().len(), 2);
    }

    #[test]
    fn producer_error_follows_its_bytes() {
        let mut stream = FilterStream::spawn(4, |sink| {
            sink.write_all(b"ok")?;
            Err(Error::Io(io::Error::other("filter failed")))
        })
        .unwrap();
        assert_eq!(stream.read_chunk(10).unwrap(), b"ok");
        let err = stream.read_chunk(10).unwrap_err();
        assert!(err.to_string().contains("filter failed"));
    }

    #[test]
    fn close_before_read_terminates() {
        let mut stream = FilterStream::spawn(1, |sink| {
            loop {
                sink.write_all(b"x")?;
            }
        })
        .unwrap();
        stream.close();
        stream.close();
        assert_eq!(stream.state(), StreamState::Closed);
        assert!(matches!(stream.read_chunk(1), Err(Error::StreamClosed)));
    }

    #[test]
    fn close_after_eof_still_rejects_reads() {
        let mut stream = stream_of(b"a".to_vec(), 1);
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        stream.close();
        assert!(matches!(stream.read_chunk(1), Err(Error::StreamClosed)));
    }

    #[test]
    fn panicking_worker_is_reported_not_hung() {
        let mut stream = FilterStream::spawn(4, |_| -> Result<(), Error> {
            panic!("worker blew up");
        })
        .unwrap();
        assert!(stream.read_chunk(4).is_err());
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[test]
    fn sink_reports_broken_pipe_after_close() {
        let (tx, rx) = mpsc::sync_channel(1);
        let mut stream = FilterStream::spawn(1, move |sink| {
            let result = loop {
                if let Err(e) = sink.write_all(b"y") {
                    break e.kind();
                }
            };
            let _ = tx.send(result);
            Ok(())
        })
        .unwrap();
        assert_eq!(stream.read_chunk(1).unwrap(), b"y");
        stream.close();
        assert_eq!(rx.recv().unwrap(), io::ErrorKind::BrokenPipe);
    }
}
