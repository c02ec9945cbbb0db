//! Client protocol core
//!
//! [`ClientProtocol`] correlates requests with replies for one connection. It
//! owns the transaction registry and the connection state and reacts to three
//! inputs from its host: `connection_made`, `connection_lost` and
//! `data_received`. Callers submit work with `execute`, which never blocks.
//!
//! # State machine
//! ```text
//! Disconnected --connection_made--> Connected
//! Connected    --connection_lost--> Disconnected   (fails every pending request)
//! ```
//!
//! # Serialisation
//! The core has no internal locking. Its host must serialise every call, for
//! example by owning it from a single task or keeping it behind one mutex.
//! Because `execute` registers its pending entry before returning, a reply
//! can never be processed ahead of the entry it answers.

use crate::adapter::{ConnectionAdapter, ConnectionState, Promise};
use crate::transaction::TransactionRegistry;
use modbus_core::{Encoder, Framer, ModbusError, ModbusResult, Reply, TransactionId};

/// Counters kept by a [`ClientProtocol`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStatistics {
    /// Requests written and registered
    pub requests_sent: u64,
    /// Requests failed before or after being sent
    pub requests_failed: u64,
    /// Replies matched to a pending request
    pub replies_matched: u64,
    /// Replies with no pending request
    pub unsolicited_replies: u64,
}

/// Transaction-correlating client core for one connection
pub struct ClientProtocol<A, C>
where
    C: Framer,
    A: ConnectionAdapter<C::Reply>,
{
    adapter: A,
    codec: C,
    registry: TransactionRegistry<A::Promise>,
    state: ConnectionState,
    statistics: ClientStatistics,
}

impl<A, C> ClientProtocol<A, C>
where
    C: Encoder + Framer,
    A: ConnectionAdapter<C::Reply>,
{
    /// Create a disconnected core speaking through `adapter` with `codec`
    pub fn new(adapter: A, codec: C) -> Self {
        let registry = TransactionRegistry::new(codec.id_mode());
        Self {
            adapter,
            codec,
            registry,
            state: ConnectionState::Disconnected,
            statistics: ClientStatistics::default(),
        }
    }

    /// The transport is up
    pub fn connection_made(&mut self) {
        log::debug!("Client connected to modbus server");
        self.codec.reset();
        self.state = ConnectionState::Connected;
    }

    /// The transport went away; fail every pending request with `reason`
    pub fn connection_lost(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::debug!("Client disconnected from modbus server: {}", reason);
        self.state = ConnectionState::Disconnected;
        self.codec.reset();

        for id in self.registry.pending_ids() {
            if let Some(promise) = self.registry.get(id) {
                promise.fail(ModbusError::ConnectionLost(reason.clone()));
                self.statistics.requests_failed += 1;
            }
        }
    }

    /// Feed one delivery of received bytes
    ///
    /// # Errors
    /// If the framer reports the stream as unrecoverable, the connection is
    /// treated as lost (all pending requests fail) and the error is returned
    /// so the host can close the transport.
    pub fn data_received(&mut self, data: &[u8]) -> ModbusResult<()> {
        let Self {
            codec,
            registry,
            statistics,
            ..
        } = self;
        let result = codec.process_incoming(data, |reply| {
            Self::dispatch(registry, statistics, reply)
        });

        if let Err(e) = &result {
            log::error!("Unrecoverable framing error: {}", e);
            self.connection_lost(e.to_string());
        }
        result
    }

    fn dispatch(
        registry: &mut TransactionRegistry<A::Promise>,
        statistics: &mut ClientStatistics,
        reply: C::Reply,
    ) {
        let id = reply.transaction_id();
        match registry.get(id) {
            Some(promise) => {
                statistics.replies_matched += 1;
                promise.resolve(reply);
            }
            None => {
                log::debug!("Unrequested message for transaction {}", id);
                statistics.unsolicited_replies += 1;
            }
        }
    }

    /// Send a request and return its deferred reply
    ///
    /// While disconnected the result has already failed with `NotConnected`
    /// and nothing is allocated or written.
    pub fn execute(&mut self, request: &C::Request) -> A::Deferred {
        self.submit(request).1
    }

    /// Like [`execute`](Self::execute), also reporting the transaction id
    ///
    /// The id is `None` when the request failed immediately and nothing was
    /// registered.
    pub fn submit(&mut self, request: &C::Request) -> (Option<TransactionId>, A::Deferred) {
        if !self.state.is_connected() {
            self.statistics.requests_failed += 1;
            return (None, self.adapter.failed(ModbusError::NotConnected));
        }

        let id = self.registry.allocate();
        let frame = match self.codec.encode(request, id) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Failed to encode request {}: {}", id, e);
                self.statistics.requests_failed += 1;
                return (None, self.adapter.failed(e));
            }
        };
        if let Err(e) = self.adapter.write(frame) {
            log::warn!("Failed to write request {}: {}", id, e);
            self.statistics.requests_failed += 1;
            return (None, self.adapter.failed(e));
        }

        let (promise, deferred) = self.adapter.create();
        self.registry.add(id, promise);
        self.statistics.requests_sent += 1;
        (Some(id), deferred)
    }

    /// Forget a pending request without resolving it
    ///
    /// The caller's deferred completes with `Cancelled`. Returns false if no
    /// request was pending under `id`.
    pub fn cancel(&mut self, id: TransactionId) -> bool {
        self.registry.remove(id)
    }

    /// Forget a pending request only if its caller has stopped waiting
    ///
    /// Used after a caller-side timeout: in the implicit slot a newer request
    /// may already be registered under the same id and must survive.
    pub fn cancel_abandoned(&mut self, id: TransactionId) -> bool {
        match self.registry.get(id) {
            Some(promise) if promise.is_abandoned() => true,
            Some(promise) => {
                self.registry.add(id, promise);
                false
            }
            None => false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    pub fn pending_ids(&self) -> Vec<TransactionId> {
        self.registry.pending_ids()
    }

    /// The id the next sent request will carry
    pub fn next_transaction_id(&self) -> TransactionId {
        self.registry.peek_next()
    }

    pub fn statistics(&self) -> &ClientStatistics {
        &self.statistics
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::channel::ChannelAdapter;
    use bytes::Bytes;
    use futures::FutureExt;
    use futures::channel::mpsc::UnboundedReceiver;
    use modbus_core::{ModbusRequest, ModbusResponse, Pdu};
    use modbus_framer::{AsciiFramer, SocketFramer};
    use std::sync::{Arc, Mutex};

    type SocketProtocol = ClientProtocol<ChannelAdapter<ModbusResponse>, SocketFramer>;

    fn connected() -> (SocketProtocol, UnboundedReceiver<Bytes>) {
        let (adapter, outbound) = ChannelAdapter::new();
        let mut protocol = ClientProtocol::new(adapter, SocketFramer::new());
        protocol.connection_made();
        (protocol, outbound)
    }

    fn read_request(unit_id: u8) -> ModbusRequest {
        ModbusRequest::new(unit_id, Pdu::new(0x03, vec![0x00, 0x00, 0x00, 0x01]))
    }

    fn reply_bytes(id: u16, value: u8) -> Bytes {
        let reply = ModbusRequest::new(1, Pdu::new(0x03, vec![0x02, 0x00, value]));
        SocketFramer::new()
            .encode(&reply, TransactionId::new(id))
            .unwrap()
    }

    #[test]
    fn test_reply_resolves_matching_request() {
        let (mut protocol, mut outbound) = connected();
        let request = read_request(1);

        let deferred = protocol.execute(&request);
        let sent = outbound.try_next().unwrap().unwrap();
        assert_eq!(
            sent,
            SocketFramer::new().encode(&request, TransactionId::new(1)).unwrap()
        );
        assert_eq!(protocol.pending_ids(), vec![TransactionId::new(1)]);

        protocol.data_received(&reply_bytes(1, 42)).unwrap();
        let reply = deferred.now_or_never().unwrap().unwrap();
        assert_eq!(reply.transaction_id(), TransactionId::new(1));
        assert_eq!(reply.pdu().data(), &[0x02, 0x00, 42]);
        assert_eq!(protocol.pending_count(), 0);
    }

    #[test]
    fn test_execute_while_disconnected_fails_without_side_effects() {
        let (adapter, mut outbound) = ChannelAdapter::new();
        let mut protocol: SocketProtocol = ClientProtocol::new(adapter, SocketFramer::new());
        assert_eq!(protocol.state(), ConnectionState::Disconnected);

        for _ in 0..3 {
            let deferred = protocol.execute(&read_request(1));
            let result = deferred.now_or_never().unwrap();
            assert!(matches!(result, Err(ModbusError::NotConnected)));
        }
        assert_eq!(protocol.next_transaction_id(), TransactionId::new(1));
        assert_eq!(protocol.pending_count(), 0);
        assert!(outbound.try_next().is_err());
    }

    #[test]
    fn test_disconnect_fails_pending_with_reason() {
        let (mut protocol, _outbound) = connected();
        let first = protocol.execute(&read_request(1));
        let second = protocol.execute(&read_request(2));
        assert_eq!(protocol.pending_count(), 2);

        protocol.connection_lost("peer closed");
        assert!(!protocol.is_connected());
        assert_eq!(protocol.pending_count(), 0);
        for deferred in [first, second] {
            match deferred.now_or_never().unwrap() {
                Err(ModbusError::ConnectionLost(reason)) => assert_eq!(reason, "peer closed"),
                other => panic!("unexpected result: {:?}", other),
            }
        }
        assert_eq!(protocol.statistics().requests_failed, 2);
    }

    #[test]
    fn test_unsolicited_reply_is_ignored() {
        let (mut protocol, _outbound) = connected();
        let mut deferred = protocol.execute(&read_request(1));

        protocol.data_received(&reply_bytes(99, 0)).unwrap();
        assert_eq!(protocol.pending_ids(), vec![TransactionId::new(1)]);
        assert_eq!(protocol.statistics().unsolicited_replies, 1);
        assert!((&mut deferred).now_or_never().is_none());
    }

    #[test]
    fn test_second_reply_for_same_id_is_unsolicited() {
        let (mut protocol, _outbound) = connected();
        let deferred = protocol.execute(&read_request(1));

        let mut data = reply_bytes(1, 7).to_vec();
        data.extend_from_slice(&reply_bytes(1, 8));
        protocol.data_received(&data).unwrap();

        let reply = deferred.now_or_never().unwrap().unwrap();
        assert_eq!(reply.pdu().data(), &[0x02, 0x00, 7]);
        assert_eq!(protocol.statistics().replies_matched, 1);
        assert_eq!(protocol.statistics().unsolicited_replies, 1);
    }

    #[test]
    fn test_ids_are_distinct_while_pipelining() {
        let (mut protocol, mut outbound) = connected();
        let deferreds: Vec<_> = (0..100).map(|_| protocol.execute(&read_request(1))).collect();

        let ids = protocol.pending_ids();
        assert_eq!(ids.len(), 100);
        assert_eq!(ids.first(), Some(&TransactionId::new(1)));
        assert_eq!(ids.last(), Some(&TransactionId::new(100)));

        let mut written = 0;
        while let Ok(Some(_)) = outbound.try_next() {
            written += 1;
        }
        assert_eq!(written, 100);
        drop(deferreds);
    }

    #[test]
    fn test_write_failure_fails_only_that_request() {
        let (mut protocol, outbound) = connected();
        let mut pending = protocol.execute(&read_request(1));
        drop(outbound);

        let failed = protocol.execute(&read_request(2));
        assert!(matches!(
            failed.now_or_never().unwrap(),
            Err(ModbusError::Connection(_))
        ));
        assert_eq!(protocol.pending_ids(), vec![TransactionId::new(1)]);
        assert!((&mut pending).now_or_never().is_none());
    }

    #[test]
    fn test_encode_failure_is_reported_to_caller() {
        let (mut protocol, mut outbound) = connected();
        let oversized = ModbusRequest::new(1, Pdu::new(0x10, vec![0u8; 300]));
        let deferred = protocol.execute(&oversized);
        assert!(matches!(
            deferred.now_or_never().unwrap(),
            Err(ModbusError::InvalidData(_))
        ));
        assert_eq!(protocol.pending_count(), 0);
        assert!(outbound.try_next().is_err());
    }

    #[test]
    fn test_cancel_completes_with_cancelled() {
        let (mut protocol, _outbound) = connected();
        let (id, deferred) = protocol.submit(&read_request(1));
        let id = id.unwrap();

        assert!(protocol.cancel(id));
        assert!(!protocol.cancel(id));
        assert!(matches!(
            deferred.now_or_never().unwrap(),
            Err(ModbusError::Cancelled)
        ));

        // A late reply is then unsolicited
        protocol.data_received(&reply_bytes(id.value(), 1)).unwrap();
        assert_eq!(protocol.statistics().unsolicited_replies, 1);
    }

    #[test]
    fn test_cancel_abandoned_keeps_live_request() {
        let (mut protocol, _outbound) = connected();
        let (live, _live_deferred) = protocol.submit(&read_request(1));
        let (gone, gone_deferred) = protocol.submit(&read_request(1));
        drop(gone_deferred);

        assert!(!protocol.cancel_abandoned(live.unwrap()));
        assert!(protocol.cancel_abandoned(gone.unwrap()));
        assert_eq!(protocol.pending_ids(), vec![live.unwrap()]);
    }

    #[test]
    fn test_implicit_slot_overwrite_abandons_earlier_request() {
        let (adapter, _outbound) = ChannelAdapter::new();
        let mut protocol = ClientProtocol::new(adapter, AsciiFramer::new());
        protocol.connection_made();

        let request = read_request(1);
        let first = protocol.execute(&request);
        let second = protocol.execute(&request);
        assert_eq!(protocol.pending_ids(), vec![TransactionId::IMPLICIT]);
        assert!(matches!(
            first.now_or_never().unwrap(),
            Err(ModbusError::Cancelled)
        ));

        protocol.data_received(b":010302002AD0\r\n").unwrap();
        let reply = second.now_or_never().unwrap().unwrap();
        assert_eq!(reply.transaction_id(), TransactionId::IMPLICIT);
    }

    #[test]
    fn test_unrecoverable_stream_disconnects() {
        let (adapter, _outbound) = ChannelAdapter::new();
        let mut protocol = ClientProtocol::new(adapter, AsciiFramer::new());
        protocol.connection_made();
        let deferred = protocol.execute(&read_request(1));

        let mut garbage = vec![b':'];
        garbage.extend(std::iter::repeat_n(b'0', 600));
        assert!(matches!(
            protocol.data_received(&garbage),
            Err(ModbusError::MalformedFrame(_))
        ));
        assert!(!protocol.is_connected());
        assert!(matches!(
            deferred.now_or_never().unwrap(),
            Err(ModbusError::ConnectionLost(_))
        ));
    }

    /// Promise that records completions in the order they happen
    struct RecordingPromise {
        log: Arc<Mutex<Vec<ModbusResult<TransactionId>>>>,
    }

    impl Promise<ModbusResponse> for RecordingPromise {
        fn resolve(self, reply: ModbusResponse) {
            self.log.lock().unwrap().push(Ok(reply.transaction_id()));
        }

        fn fail(self, error: ModbusError) {
            self.log.lock().unwrap().push(Err(error));
        }
    }

    struct RecordingAdapter {
        log: Arc<Mutex<Vec<ModbusResult<TransactionId>>>>,
        writes: usize,
    }

    impl ConnectionAdapter<ModbusResponse> for RecordingAdapter {
        type Promise = RecordingPromise;
        type Deferred = ();

        fn create(&self) -> (RecordingPromise, ()) {
            (RecordingPromise { log: self.log.clone() }, ())
        }

        fn write(&mut self, _frame: Bytes) -> ModbusResult<()> {
            self.writes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_replies_resolve_in_wire_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let adapter = RecordingAdapter {
            log: log.clone(),
            writes: 0,
        };
        let mut protocol = ClientProtocol::new(adapter, SocketFramer::new());
        protocol.connection_made();
        for _ in 0..3 {
            protocol.execute(&read_request(1));
        }
        assert_eq!(protocol.adapter().writes, 3);

        let mut data = reply_bytes(3, 0).to_vec();
        data.extend_from_slice(&reply_bytes(1, 0));
        // Second half of the delivery arrives later
        let split = data.len() - 4;
        protocol.data_received(&data[..split]).unwrap();
        protocol.data_received(&data[split..]).unwrap();
        protocol.connection_lost("gone");

        let log = log.lock().unwrap();
        let order: Vec<String> = log
            .iter()
            .map(|entry| match entry {
                Ok(id) => format!("ok {}", id),
                Err(e) => format!("err {}", e),
            })
            .collect();
        assert_eq!(
            order,
            vec![
                "ok 3".to_string(),
                "ok 1".to_string(),
                "err Connection lost during request: gone".to_string(),
            ]
        );
    }
}
