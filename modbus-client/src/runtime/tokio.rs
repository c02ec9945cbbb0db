//! Tokio adapter and connection driver
//!
//! [`TokioAdapter`] is the tokio flavour of the adapter seam: deferred results
//! are `tokio::sync::oneshot` receivers and outbound frames go through an
//! unbounded `mpsc` queue.
//!
//! [`TokioClient`] hosts a [`ClientProtocol`] on an open transport. The core
//! sits behind a single `tokio::sync::Mutex`, which serialises the three event
//! sources that touch it:
//!
//! - callers of [`TokioClient::execute`],
//! - a reader task feeding received bytes,
//! - a writer task draining the outbound queue and reporting write failures.
//!
//! No lock is held across an `.await` on the transport. When either task
//! stops, the other is told to stop as well, so the whole transport is closed
//! once the core has gone `Disconnected`.

use crate::adapter::{ConnectionAdapter, Promise};
use crate::protocol::{ClientProtocol, ClientStatistics};
use bytes::Bytes;
use modbus_core::{Encoder, Framer, ModbusError, ModbusResult};
use modbus_framer::MAX_ASCII_FRAME_LENGTH;
use modbus_transport::{TransportLayer, TransportReader, TransportWriter};
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Size of the buffer each transport read lands in, room for several of the
/// largest frames any framer accepts
pub const READ_BUFFER_SIZE: usize = 8 * MAX_ASCII_FRAME_LENGTH;

impl<R: Send> Promise<R> for oneshot::Sender<ModbusResult<R>> {
    fn resolve(self, reply: R) {
        // The caller may have stopped waiting
        let _ = self.send(Ok(reply));
    }

    fn fail(self, error: ModbusError) {
        let _ = self.send(Err(error));
    }

    fn is_abandoned(&self) -> bool {
        self.is_closed()
    }
}

/// Deferred reply of a request sent through a [`TokioAdapter`]
#[derive(Debug)]
pub struct ResponseFuture<R> {
    receiver: oneshot::Receiver<ModbusResult<R>>,
}

impl<R> Future for ResponseFuture<R> {
    type Output = ModbusResult<R>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ModbusError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Adapter writing into a tokio unbounded channel
#[derive(Debug)]
pub struct TokioAdapter<R> {
    outbound: mpsc::UnboundedSender<Bytes>,
    _reply: PhantomData<fn() -> R>,
}

impl<R> TokioAdapter<R> {
    pub fn new(outbound: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            outbound,
            _reply: PhantomData,
        }
    }
}

impl<R: Send> ConnectionAdapter<R> for TokioAdapter<R> {
    type Promise = oneshot::Sender<ModbusResult<R>>;
    type Deferred = ResponseFuture<R>;

    fn create(&self) -> (Self::Promise, Self::Deferred) {
        let (sender, receiver) = oneshot::channel();
        (sender, ResponseFuture { receiver })
    }

    fn write(&mut self, frame: Bytes) -> ModbusResult<()> {
        self.outbound.send(frame).map_err(|_| {
            ModbusError::Connection(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "Writer task has stopped",
            ))
        })
    }
}

type SharedProtocol<C> = Arc<Mutex<ClientProtocol<TokioAdapter<<C as Framer>::Reply>, C>>>;

/// A [`ClientProtocol`] running on tokio over one transport
pub struct TokioClient<C>
where
    C: Framer,
    C::Reply: Send,
{
    protocol: SharedProtocol<C>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl<C> TokioClient<C>
where
    C: Encoder + Framer + Send + 'static,
    C::Reply: Send + 'static,
{
    /// Open `transport` and start serving requests over it
    ///
    /// # Errors
    /// Returns error if the transport cannot be opened
    pub async fn connect<T: TransportLayer>(transport: T, codec: C) -> ModbusResult<Self> {
        let (reader, writer) = transport.open().await?;
        Ok(Self::start(reader, writer, codec))
    }

    /// Start serving requests over an already-open reader/writer pair
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime, since the I/O tasks are
    /// spawned here.
    pub fn start<Rd, W>(reader: Rd, writer: W, codec: C) -> Self
    where
        Rd: TransportReader + 'static,
        W: TransportWriter + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let mut protocol = ClientProtocol::new(TokioAdapter::new(outbound_tx), codec);
        protocol.connection_made();
        let protocol = Arc::new(Mutex::new(protocol));

        let shutdown = Arc::new(Notify::new());
        let writer = tokio::spawn(write_loop(
            writer,
            outbound_rx,
            protocol.clone(),
            shutdown.clone(),
        ));
        let reader = tokio::spawn(read_loop(reader, protocol.clone(), shutdown));
        Self {
            protocol,
            reader,
            writer,
        }
    }

    /// Send a request and wait for its reply
    pub async fn execute(&self, request: &C::Request) -> ModbusResult<C::Reply> {
        let deferred = self.protocol.lock().await.execute(request);
        deferred.await
    }

    /// Send a request and wait at most `timeout` for its reply
    ///
    /// On expiry the pending entry is removed, so a late reply is treated as
    /// unsolicited.
    pub async fn execute_timeout(
        &self,
        request: &C::Request,
        timeout: Duration,
    ) -> ModbusResult<C::Reply> {
        let (id, deferred) = self.protocol.lock().await.submit(request);
        match tokio::time::timeout(timeout, deferred).await {
            Ok(result) => result,
            Err(_) => {
                if let Some(id) = id {
                    if self.protocol.lock().await.cancel_abandoned(id) {
                        log::debug!("Transaction {} timed out after {:?}", id, timeout);
                    }
                }
                Err(ModbusError::Timeout)
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.protocol.lock().await.is_connected()
    }

    pub async fn pending_count(&self) -> usize {
        self.protocol.lock().await.pending_count()
    }

    pub async fn statistics(&self) -> ClientStatistics {
        self.protocol.lock().await.statistics().clone()
    }

    /// Run `f` with the framer, e.g. to read its statistics
    pub async fn with_codec<T>(&self, f: impl FnOnce(&C) -> T) -> T {
        f(self.protocol.lock().await.codec())
    }

    /// Stop both I/O tasks and fail every pending request
    pub async fn close(&self) {
        self.reader.abort();
        self.writer.abort();
        let mut protocol = self.protocol.lock().await;
        if protocol.is_connected() {
            protocol.connection_lost("closed by client");
        }
    }
}

impl<C> Drop for TokioClient<C>
where
    C: Framer,
    C::Reply: Send,
{
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Feed received bytes to the core until the transport or the writer stops
///
/// The reader half is dropped on return.
async fn read_loop<C, Rd>(mut reader: Rd, protocol: SharedProtocol<C>, shutdown: Arc<Notify>)
where
    C: Encoder + Framer,
    C::Reply: Send,
    Rd: TransportReader,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let result = tokio::select! {
            result = reader.read(&mut buf) => result,
            _ = shutdown.notified() => {
                log::debug!("Reader stopped after writer shutdown");
                return;
            }
        };
        match result {
            Ok(0) => {
                protocol.lock().await.connection_lost("peer closed");
                break;
            }
            Ok(n) => {
                // The core has already failed everything pending
                if protocol.lock().await.data_received(&buf[..n]).is_err() {
                    break;
                }
            }
            Err(e) => {
                log::error!("Error receiving data: {}", e);
                protocol.lock().await.connection_lost(e.to_string());
                break;
            }
        }
    }
    shutdown.notify_one();
}

/// Drain the outbound queue into the transport until a write fails or the
/// reader stops, then close the writer half
async fn write_loop<C, W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    protocol: SharedProtocol<C>,
    shutdown: Arc<Notify>,
) where
    C: Encoder + Framer,
    C::Reply: Send,
    W: TransportWriter,
{
    loop {
        let frame = tokio::select! {
            frame = outbound.recv() => frame,
            _ = shutdown.notified() => break,
        };
        let Some(frame) = frame else {
            break;
        };
        if let Err(e) = writer.write_all(&frame).await {
            log::error!("Error sending data: {}", e);
            protocol.lock().await.connection_lost(e.to_string());
            shutdown.notify_one();
            break;
        }
    }
    if let Err(e) = writer.close().await {
        log::debug!("Error closing transport writer: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok};

    #[test]
    fn test_deferred_wakes_on_resolve() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let adapter = TokioAdapter::<u8>::new(tx);
        let (promise, deferred) = adapter.create();

        let mut deferred = task::spawn(deferred);
        assert_pending!(deferred.poll());
        promise.resolve(9);
        assert!(deferred.is_woken());
        assert_eq!(assert_ready_ok!(deferred.poll()), 9);
    }

    #[test]
    fn test_deferred_fails_once() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let adapter = TokioAdapter::<u8>::new(tx);
        let (promise, deferred) = adapter.create();

        let mut deferred = task::spawn(deferred);
        promise.fail(ModbusError::ConnectionLost("reset".to_string()));
        let error = assert_ready_err!(deferred.poll());
        assert!(error.is_connection_lost());
    }

    #[test]
    fn test_write_after_writer_stopped_fails() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut adapter = TokioAdapter::<u8>::new(tx);
        adapter.write(Bytes::from_static(b"ok")).unwrap();
        drop(rx);
        assert!(matches!(
            adapter.write(Bytes::from_static(b"late")),
            Err(ModbusError::Connection(_))
        ));
    }
}
