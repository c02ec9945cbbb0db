//! MBAP (Modbus Application Protocol) framing for TCP and UDP
//!
//! ```text
//! +----------------+-------------+--------+---------+------------------+
//! | transaction id | protocol id | length | unit id | PDU              |
//! | u16 BE         | u16 BE (=0) | u16 BE | u8      | length - 1 bytes |
//! +----------------+-------------+--------+---------+------------------+
//! ```
//!
//! `length` counts the unit id and the PDU.

use crate::statistics::FramerStatistics;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use modbus_core::{
    Encoder, Framer, IdMode, MAX_PDU_LENGTH, ModbusRequest, ModbusResponse, ModbusResult, Pdu,
    TransactionId,
};

/// MBAP header length, unit id included
pub const MBAP_HEADER_LENGTH: usize = 7;

const PROTOCOL_ID: u16 = 0;
/// Unit id plus at least a function code
const MIN_LENGTH_FIELD: usize = 2;
const MAX_LENGTH_FIELD: usize = MAX_PDU_LENGTH + 1;

/// Framer for MBAP-framed traffic
#[derive(Debug, Default)]
pub struct SocketFramer {
    buffer: BytesMut,
    statistics: FramerStatistics,
}

impl SocketFramer {
    /// Create a new socket framer
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statistics(&self) -> &FramerStatistics {
        &self.statistics
    }

    /// Number of bytes held back waiting for the rest of a frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Length field of the header at the buffer start, if it looks valid
    fn frame_length(&self) -> Option<usize> {
        let protocol_id = u16::from_be_bytes([self.buffer[2], self.buffer[3]]);
        let length = u16::from_be_bytes([self.buffer[4], self.buffer[5]]) as usize;
        if protocol_id != PROTOCOL_ID || !(MIN_LENGTH_FIELD..=MAX_LENGTH_FIELD).contains(&length) {
            return None;
        }
        Some(MBAP_HEADER_LENGTH - 1 + length)
    }
}

impl Encoder for SocketFramer {
    type Request = ModbusRequest;

    fn encode(
        &self,
        request: &ModbusRequest,
        transaction_id: TransactionId,
    ) -> ModbusResult<Bytes> {
        let pdu = request.pdu();
        let mut buf = BytesMut::with_capacity(MBAP_HEADER_LENGTH + pdu.encoded_len());
        buf.put_u16(transaction_id.value());
        buf.put_u16(PROTOCOL_ID);
        buf.put_u16((pdu.encoded_len() + 1) as u16);
        buf.put_u8(request.unit_id());
        pdu.encode_into(&mut buf)?;
        Ok(buf.freeze())
    }
}

impl Framer for SocketFramer {
    type Reply = ModbusResponse;

    fn id_mode(&self) -> IdMode {
        IdMode::Sequential
    }

    fn process_incoming<F>(&mut self, data: &[u8], mut on_reply: F) -> ModbusResult<()>
    where
        F: FnMut(ModbusResponse),
    {
        self.buffer.extend_from_slice(data);

        let mut discarded = 0usize;
        while self.buffer.len() >= MBAP_HEADER_LENGTH {
            let Some(frame_length) = self.frame_length() else {
                // Not a header; slide forward one byte and look again
                self.buffer.advance(1);
                discarded += 1;
                continue;
            };
            if self.buffer.len() < frame_length {
                break;
            }

            let mut frame = self.buffer.split_to(frame_length);
            let transaction_id = TransactionId::new(frame.get_u16());
            frame.advance(4);
            let unit_id = frame.get_u8();
            match Pdu::decode(&frame) {
                Ok(pdu) => {
                    self.statistics.increment_frames_decoded();
                    on_reply(ModbusResponse::new(transaction_id, unit_id, pdu));
                }
                Err(e) => {
                    log::warn!("Dropping MBAP frame {}: {}", transaction_id, e);
                    self.statistics.increment_frames_rejected();
                }
            }
        }

        if discarded > 0 {
            log::warn!("Skipped {} bytes of noise before MBAP header", discarded);
            self.statistics.add_bytes_discarded(discarded);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbus_core::Reply;

    fn response_frame(transaction_id: u16, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&transaction_id.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
        frame.push(unit_id);
        frame.extend_from_slice(pdu);
        frame
    }

    fn collect(framer: &mut SocketFramer, data: &[u8]) -> Vec<ModbusResponse> {
        let mut replies = Vec::new();
        framer
            .process_incoming(data, |reply| replies.push(reply))
            .unwrap();
        replies
    }

    #[test]
    fn test_encode_layout() {
        let framer = SocketFramer::new();
        let request = ModbusRequest::new(0x11, Pdu::new(0x03, vec![0x00, 0x6B, 0x00, 0x03]));
        let encoded = framer.encode(&request, TransactionId::new(0x0102)).unwrap();
        assert_eq!(
            encoded.as_ref(),
            &[0x01, 0x02, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x03]
        );
    }

    #[test]
    fn test_encoded_request_decodes_with_same_id() {
        let mut framer = SocketFramer::new();
        let request = ModbusRequest::new(1, Pdu::new(0x06, vec![0x00, 0x01, 0x00, 0x03]));
        let encoded = framer.encode(&request, TransactionId::new(77)).unwrap();

        let replies = collect(&mut framer, &encoded);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].transaction_id(), TransactionId::new(77));
        assert_eq!(replies[0].pdu(), request.pdu());
    }

    #[test]
    fn test_frame_split_across_deliveries() {
        let mut framer = SocketFramer::new();
        let frame = response_frame(5, 1, &[0x03, 0x02, 0x00, 0x2A]);

        assert!(collect(&mut framer, &frame[..3]).is_empty());
        assert!(collect(&mut framer, &frame[3..9]).is_empty());
        assert_eq!(framer.buffered_len(), 9);

        let replies = collect(&mut framer, &frame[9..]);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].transaction_id(), TransactionId::new(5));
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_several_frames_in_one_delivery_keep_order() {
        let mut framer = SocketFramer::new();
        let mut data = response_frame(9, 1, &[0x06, 0x00, 0x01, 0x00, 0x03]);
        data.extend(response_frame(4, 1, &[0x03, 0x02, 0x00, 0x01]));
        data.extend(response_frame(7, 2, &[0x83, 0x02]));
        // Start of a fourth frame
        data.extend(&response_frame(8, 1, &[0x03, 0x02, 0x00, 0x01])[..5]);

        let ids: Vec<u16> = collect(&mut framer, &data)
            .iter()
            .map(|reply| reply.transaction_id().value())
            .collect();
        assert_eq!(ids, vec![9, 4, 7]);
        assert_eq!(framer.buffered_len(), 5);
        assert_eq!(framer.statistics().frames_decoded, 3);
    }

    #[test]
    fn test_leading_noise_is_skipped() {
        let mut framer = SocketFramer::new();
        let mut data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        data.extend(response_frame(3, 1, &[0x05, 0x00, 0x01, 0xFF, 0x00]));

        let replies = collect(&mut framer, &data);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].transaction_id(), TransactionId::new(3));
        assert_eq!(framer.statistics().bytes_discarded, 8);
    }

    #[test]
    fn test_reset_drops_partial_frame() {
        let mut framer = SocketFramer::new();
        let frame = response_frame(1, 1, &[0x03, 0x02, 0x00, 0x01]);
        collect(&mut framer, &frame[..8]);
        framer.reset();
        assert_eq!(framer.buffered_len(), 0);
        assert_eq!(collect(&mut framer, &frame).len(), 1);
    }
}
