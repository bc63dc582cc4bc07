use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use futures_util::{stream::BoxStream, Stream, StreamExt};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Upstream bytes of a single variant, in the order the source sends them.
pub type MediaStream = BoxStream<'static, Result<Bytes, TransferError>>;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub enum TransferError {
    Upstream(std::io::Error),
    UpstreamExited { code: Option<i32>, stderr: String },
    EmptyUpstream,
    ProbeTimeout,
    IdleTimeout,
    Cancelled,
    LengthMismatch { expected: u64, received: u64 },
}

impl Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upstream(err) => write!(f, "failed to read from media source: {err}"),
            Self::UpstreamExited { code, stderr } => write!(
                f,
                "media source stopped with exit code {code}: {stderr}",
                code = code.map_or("none".to_owned(), |code| code.to_string())
            ),
            Self::EmptyUpstream => write!(f, "media source closed without sending any data"),
            Self::ProbeTimeout => write!(f, "media source did not start sending data in time"),
            Self::IdleTimeout => write!(f, "media source stopped sending data"),
            Self::Cancelled => write!(f, "transfer cancelled"),
            Self::LengthMismatch { expected, received } => write!(
                f,
                "media source sent {received} bytes where {expected} were announced"
            ),
        }
    }
}

impl std::error::Error for TransferError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    /// Longest wait for the first chunk, before any header is committed.
    pub probe_timeout: Duration,
    /// Longest gap between two chunks once the transfer is running.
    pub idle_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Streaming,
    Completed,
    Failed,
}

/// Pairs one upstream media stream with one client-facing response body.
///
/// The session holds at most one chunk at a time and is only polled when the
/// client connection can take more data, so a slow client pauses the
/// upstream instead of growing a buffer. Dropping the session drops the
/// upstream with it.
pub struct RelaySession {
    id: u64,
    label: Arc<str>,
    upstream: MediaStream,
    pending: Option<Bytes>,
    idle_timeout: Duration,
    idle: Pin<Box<Sleep>>,
    idle_armed: bool,
    expected_len: Option<u64>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    relayed: u64,
    state: SessionState,
}

impl RelaySession {
    /// Waits for the first upstream chunk so that failures to start are
    /// still reportable as a regular error response.
    pub async fn open(
        mut upstream: MediaStream,
        label: impl Into<Arc<str>>,
        config: &RelayConfig,
        cancel: CancellationToken,
    ) -> Result<Self, TransferError> {
        let label = label.into();

        let probe = tokio::select! {
            _ = cancel.cancelled() => return Err(TransferError::Cancelled),
            probe = tokio::time::timeout(config.probe_timeout, upstream.next()) => probe,
        };

        let first = match probe {
            Err(_) => return Err(TransferError::ProbeTimeout),
            Ok(None) => return Err(TransferError::EmptyUpstream),
            Ok(Some(Err(err))) => return Err(err),
            Ok(Some(Ok(chunk))) => chunk,
        };

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        log::info!("relay session {id} opened for '{label}'");

        Ok(Self {
            id,
            label,
            upstream,
            pending: Some(first),
            idle_timeout: config.idle_timeout,
            idle: Box::pin(tokio::time::sleep(config.idle_timeout)),
            idle_armed: false,
            expected_len: None,
            cancelled: Box::pin(cancel.cancelled_owned()),
            relayed: 0,
            state: SessionState::Streaming,
        })
    }

    /// Makes the session fail unless exactly `len` bytes are relayed, for
    /// bodies sent with a `Content-Length`.
    pub fn expect_length(mut self, len: Option<u64>) -> Self {
        self.expected_len = len;
        self
    }

    pub fn relayed(&self) -> u64 {
        self.relayed
    }

    fn deliver(&mut self, chunk: Bytes) -> Poll<Option<Result<Bytes, TransferError>>> {
        let relayed = self.relayed + chunk.len() as u64;
        if let Some(expected) = self.expected_len.filter(|expected| relayed > *expected) {
            return self.fail(TransferError::LengthMismatch {
                expected,
                received: relayed,
            });
        }

        self.relayed = relayed;
        self.idle_armed = false;

        Poll::Ready(Some(Ok(chunk)))
    }

    fn complete(&mut self) -> Poll<Option<Result<Bytes, TransferError>>> {
        if let Some(expected) = self.expected_len.filter(|expected| self.relayed != *expected) {
            return self.fail(TransferError::LengthMismatch {
                expected,
                received: self.relayed,
            });
        }

        self.state = SessionState::Completed;
        log::info!(
            "relay session {id} for '{label}' completed, {relayed} bytes relayed",
            id = self.id,
            label = self.label,
            relayed = self.relayed
        );

        Poll::Ready(None)
    }

    fn fail(&mut self, err: TransferError) -> Poll<Option<Result<Bytes, TransferError>>> {
        self.state = SessionState::Failed;
        log::error!(
            "relay session {id} for '{label}' aborted after {relayed} bytes, ERROR: {err}",
            id = self.id,
            label = self.label,
            relayed = self.relayed
        );

        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for RelaySession {
    type Item = Result<Bytes, TransferError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.state != SessionState::Streaming {
            return Poll::Ready(None);
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            return this.fail(TransferError::Cancelled);
        }

        if let Some(chunk) = this.pending.take() {
            return this.deliver(chunk);
        }

        match this.upstream.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => this.deliver(chunk),
            Poll::Ready(Some(Err(err))) => this.fail(err),
            Poll::Ready(None) => this.complete(),
            Poll::Pending => {
                // the idle clock only runs while waiting on the upstream
                if !this.idle_armed {
                    let deadline = Instant::now() + this.idle_timeout;
                    this.idle.as_mut().reset(deadline);
                    this.idle_armed = true;
                }

                match this.idle.as_mut().poll(cx) {
                    Poll::Ready(()) => this.fail(TransferError::IdleTimeout),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if self.state == SessionState::Streaming {
            log::warn!(
                "relay session {id} for '{label}' dropped by the client after {relayed} bytes, closing upstream",
                id = self.id,
                label = self.label,
                relayed = self.relayed
            );
        }
    }
}
