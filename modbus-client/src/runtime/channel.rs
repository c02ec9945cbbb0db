//! Executor-agnostic adapter built on `futures` channels
//!
//! Outbound frames are pushed into an unbounded queue which the host drains
//! and writes to its transport however it likes. Deferred results are
//! `futures` oneshot receivers, so they can be awaited from any executor or
//! polled by hand. The host owns the [`ClientProtocol`](crate::ClientProtocol)
//! and forwards its transport callbacks to it.

use crate::adapter::{ConnectionAdapter, Promise};
use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use modbus_core::{ModbusError, ModbusResult};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

impl<R: Send> Promise<R> for oneshot::Sender<ModbusResult<R>> {
    fn resolve(self, reply: R) {
        // The caller may have stopped waiting
        let _ = self.send(Ok(reply));
    }

    fn fail(self, error: ModbusError) {
        let _ = self.send(Err(error));
    }

    fn is_abandoned(&self) -> bool {
        self.is_canceled()
    }
}

/// Deferred reply of a request sent through a [`ChannelAdapter`]
#[derive(Debug)]
pub struct PendingReply<R> {
    receiver: oneshot::Receiver<ModbusResult<R>>,
}

impl<R> Future for PendingReply<R> {
    type Output = ModbusResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(ModbusError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Adapter writing into a `futures` unbounded channel
#[derive(Debug)]
pub struct ChannelAdapter<R> {
    outbound: mpsc::UnboundedSender<Bytes>,
    _reply: PhantomData<fn() -> R>,
}

impl<R> ChannelAdapter<R> {
    /// Create an adapter and the receiver of its outbound frames
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (sender, receiver) = mpsc::unbounded();
        (Self::with_sender(sender), receiver)
    }

    /// Create an adapter writing into an existing channel
    pub fn with_sender(outbound: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            outbound,
            _reply: PhantomData,
        }
    }
}

impl<R: Send> ConnectionAdapter<R> for ChannelAdapter<R> {
    type Promise = oneshot::Sender<ModbusResult<R>>;
    type Deferred = PendingReply<R>;

    fn create(&self) -> (Self::Promise, Self::Deferred) {
        let (sender, receiver) = oneshot::channel();
        (sender, PendingReply { receiver })
    }

    fn write(&mut self, frame: Bytes) -> ModbusResult<()> {
        self.outbound.unbounded_send(frame).map_err(|_| {
            ModbusError::Connection(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Outbound channel closed",
            ))
        })
    }
}
