//! In-memory transport doubles for driving the orchestrator without a socket.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;

use crate::client::ProcessAudioRequest;
use crate::errors::StreamError;
use crate::transport::{ChunkSource, JobTransport};

/// What a `MemorySource` does once its scripted chunks run out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Tail {
    /// Report end of data.
    #[default]
    End,
    /// Never resolve, like a server that keeps the connection open.
    Hang,
}

/// Scripted chunk reader.
pub struct MemorySource {
    items: VecDeque<Result<Bytes, StreamError>>,
    tail: Tail,
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait::async_trait]
impl ChunkSource for MemorySource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StreamError> {
        if self.closed {
            return Ok(None);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.items.pop_front() {
            Some(item) => item.map(Some),
            None if self.tail == Tail::Hang => std::future::pending().await,
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// `JobTransport` that replays the same script on every `open`.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    open_error: Option<StreamError>,
    items: Vec<Result<Bytes, StreamError>>,
    tail: Tail,
    hang_on_open: bool,
    opens: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MemoryTransport {
    /// Streams `chunks` and then ends.
    pub fn chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Bytes>,
    {
        Self {
            items: chunks.into_iter().map(|c| Ok(c.into())).collect(),
            ..Self::default()
        }
    }

    /// Fails the triggering request.
    pub fn failing(error: StreamError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::default()
        }
    }

    /// Never completes the triggering request.
    pub fn hanging_request() -> Self {
        Self {
            hang_on_open: true,
            ..Self::default()
        }
    }

    /// Appends a read error after the scripted chunks.
    pub fn then_error(mut self, error: StreamError) -> Self {
        self.items.push(Err(error));
        self
    }

    /// Keeps the connection open after the scripted chunks.
    pub fn then_hang(mut self) -> Self {
        self.tail = Tail::Hang;
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl JobTransport for MemoryTransport {
    async fn open(
        &self,
        _request: &ProcessAudioRequest,
    ) -> Result<Box<dyn ChunkSource>, StreamError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.hang_on_open {
            std::future::pending::<()>().await;
        }
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        Ok(Box::new(MemorySource {
            items: self.items.iter().cloned().collect(),
            tail: self.tail.clone(),
            reads: self.reads.clone(),
            closes: self.closes.clone(),
            closed: false,
        }))
    }
}
