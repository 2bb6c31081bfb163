//! Raw connection takeover.
//!
//! # Responsibilities
//! - Wrap each accepted stream so HTTP serving and raw writes share one socket
//! - Track who owns the write side of the connection
//! - Enforce idle and write stall limits on the wrapped stream
//!
//! # State Machine
//! ```text
//! Unstarted ──(first HTTP write)──▶ NormalWrite
//!     │                                 │
//!     └────────(take_raw)───────────────┴──▶ RawTakeover ──(shutdown/drop)──▶ Closed
//! ```
//! Once `RawTakeover` is entered the HTTP side can never write again: its
//! writes fail with `BrokenPipe`, which makes the server drop the connection.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Sleep;

/// Any byte stream a connection can run over (plain TCP or TLS).
pub trait RawIo: AsyncRead + AsyncWrite + Send + 'static {}

impl<T> RawIo for T where T: AsyncRead + AsyncWrite + Send + 'static {}

type BoxedIo = Pin<Box<dyn RawIo>>;

/// Who currently owns the write side of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WriteState {
    /// Nothing written yet.
    Unstarted = 0,
    /// The HTTP server has written at least one response.
    NormalWrite = 1,
    /// A handler holds the raw connection.
    RawTakeover = 2,
    /// The raw owner has finished; the connection is done.
    Closed = 3,
}

impl WriteState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WriteState::Unstarted,
            1 => WriteState::NormalWrite,
            2 => WriteState::RawTakeover,
            _ => WriteState::Closed,
        }
    }
}

/// Errors from taking raw control of a connection.
#[derive(Debug, Error)]
pub enum TakeoverError {
    /// The request did not arrive over a connection that supports takeover.
    #[error("raw connection takeover is not available for this request")]
    Unavailable,

    /// Someone else already owns the raw connection.
    #[error("connection already in state {0:?}")]
    AlreadyTaken(WriteState),

    /// Writing to the raw connection failed.
    #[error("raw connection I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Stall limits applied by [`ControlledStream`]. `Duration::ZERO` disables one.
#[derive(Debug, Clone, Copy, Default)]
pub struct IoTimeouts {
    /// Maximum wait for bytes while no request is in flight.
    pub idle: Duration,
    /// Maximum time a single write may stay pending.
    pub write: Duration,
}

struct Shared {
    state: AtomicU8,
    in_flight: AtomicUsize,
    io: Mutex<BoxedIo>,
    parked_reader: Mutex<Option<Waker>>,
}

impl Shared {
    fn state(&self) -> WriteState {
        WriteState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn transition(&self, from: WriteState, to: WriteState) -> Result<(), WriteState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(WriteState::from_u8)
    }

    fn io(&self) -> io::Result<MutexGuard<'_, BoxedIo>> {
        self.io
            .lock()
            .map_err(|_| io::Error::other("connection lock poisoned"))
    }

    fn close(&self) {
        self.state.store(WriteState::Closed as u8, Ordering::SeqCst);
        let parked = match self.parked_reader.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(waker) = parked {
            waker.wake();
        }
    }

    fn park_reader(&self, waker: &Waker) {
        if let Ok(mut slot) = self.parked_reader.lock() {
            *slot = Some(waker.clone());
        }
    }
}

/// Wrap `io` for serving. Returns the stream handed to the HTTP server and
/// the handle that requests use to take the connection over.
pub fn controlled<S: RawIo>(io: S, timeouts: IoTimeouts) -> (ControlledStream, ConnectionHandle) {
    let io: BoxedIo = Box::pin(io);
    let shared = Arc::new(Shared {
        state: AtomicU8::new(WriteState::Unstarted as u8),
        in_flight: AtomicUsize::new(0),
        io: Mutex::new(io),
        parked_reader: Mutex::new(None),
    });

    let stream = ControlledStream {
        shared: Arc::clone(&shared),
        timeouts,
        idle_timer: None,
        write_timer: None,
    };
    (stream, ConnectionHandle { shared })
}

/// Per-connection capability handed to requests as an extension.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionHandle {
    pub fn state(&self) -> WriteState {
        self.shared.state()
    }

    /// Take exclusive control of the connection's write side.
    ///
    /// Only possible while the HTTP server is not mid-response; fails if the
    /// connection was already taken over.
    pub fn take_raw(&self) -> Result<RawConnection, TakeoverError> {
        self.shared
            .transition(WriteState::Unstarted, WriteState::RawTakeover)
            .or_else(|_| {
                self.shared
                    .transition(WriteState::NormalWrite, WriteState::RawTakeover)
            })
            .map_err(TakeoverError::AlreadyTaken)?;

        tracing::debug!("Connection taken over for raw writes");
        Ok(RawConnection {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Mark a request as in flight until the guard drops. The idle limit
    /// does not apply while any request is in flight.
    pub fn busy(&self) -> BusyGuard {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        BusyGuard {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Keeps the connection marked busy. Decrements on drop.
pub struct BusyGuard {
    shared: Arc<Shared>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Exclusive write access to a taken-over connection.
///
/// Shutting it down (or dropping it) moves the connection to `Closed`.
pub struct RawConnection {
    shared: Arc<Shared>,
}

impl AsyncWrite for RawConnection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.shared.state() == WriteState::Closed {
            return Poll::Ready(Err(io::ErrorKind::NotConnected.into()));
        }
        let mut io = self.shared.io()?;
        io.as_mut().poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let mut io = self.shared.io()?;
        io.as_mut().poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.shared.state() == WriteState::Closed {
            return Poll::Ready(Ok(()));
        }
        let polled = {
            let mut io = self.shared.io()?;
            io.as_mut().poll_shutdown(cx)
        };
        if polled.is_ready() {
            self.shared.close();
        }
        polled
    }
}

impl Drop for RawConnection {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// The stream the HTTP server reads from and writes to.
pub struct ControlledStream {
    shared: Arc<Shared>,
    timeouts: IoTimeouts,
    idle_timer: Option<Pin<Box<Sleep>>>,
    write_timer: Option<Pin<Box<Sleep>>>,
}

/// Poll a stall timer, arming it on first use.
fn stall_expired(
    timer: &mut Option<Pin<Box<Sleep>>>,
    limit: Duration,
    cx: &mut Context<'_>,
) -> bool {
    if limit.is_zero() {
        return false;
    }
    timer
        .get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)))
        .as_mut()
        .poll(cx)
        .is_ready()
}

impl AsyncRead for ControlledStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        match this.shared.state() {
            WriteState::Closed => return Poll::Ready(Ok(())),
            WriteState::RawTakeover => {
                this.shared.park_reader(cx.waker());
                // Re-check so a close racing the park is not missed.
                if this.shared.state() == WriteState::Closed {
                    return Poll::Ready(Ok(()));
                }
                return Poll::Pending;
            }
            WriteState::Unstarted | WriteState::NormalWrite => {}
        }

        let polled = {
            let mut io = this.shared.io()?;
            io.as_mut().poll_read(cx, buf)
        };

        match polled {
            Poll::Pending => {
                if this.shared.in_flight.load(Ordering::SeqCst) > 0 {
                    this.idle_timer = None;
                    return Poll::Pending;
                }
                if stall_expired(&mut this.idle_timer, this.timeouts.idle, cx) {
                    tracing::debug!("Idle timeout reached");
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "idle timeout",
                    )));
                }
                Poll::Pending
            }
            ready => {
                this.idle_timer = None;
                ready
            }
        }
    }
}

impl AsyncWrite for ControlledStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        match this.shared.state() {
            WriteState::RawTakeover | WriteState::Closed => {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "connection taken over for raw writes",
                )));
            }
            WriteState::Unstarted => {
                // Losing this race to take_raw is fine: the next check fails the write.
                let _ = this
                    .shared
                    .transition(WriteState::Unstarted, WriteState::NormalWrite);
            }
            WriteState::NormalWrite => {}
        }

        let polled = {
            let mut io = this.shared.io()?;
            io.as_mut().poll_write(cx, buf)
        };

        match polled {
            Poll::Pending => {
                if stall_expired(&mut this.write_timer, this.timeouts.write, cx) {
                    tracing::debug!("Write timeout reached");
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "write timeout",
                    )));
                }
                Poll::Pending
            }
            ready => {
                this.write_timer = None;
                ready
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.shared.state() {
            WriteState::RawTakeover | WriteState::Closed => Poll::Ready(Ok(())),
            _ => {
                let mut io = self.shared.io()?;
                io.as_mut().poll_flush(cx)
            }
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.shared.state() {
            WriteState::RawTakeover | WriteState::Closed => Poll::Ready(Ok(())),
            _ => {
                let mut io = self.shared.io()?;
                io.as_mut().poll_shutdown(cx)
            }
        }
    }
}
