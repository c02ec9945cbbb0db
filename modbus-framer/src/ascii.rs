//! ASCII framing
//!
//! A frame is `':'`, the hex encoding of `unit id, PDU, LRC`, then `"\r\n"`.
//! There is no transaction id on the wire, so every reply is reported under
//! [`TransactionId::IMPLICIT`] and at most one request can be outstanding.

use crate::lrc::LrcCalc;
use crate::statistics::FramerStatistics;
use bytes::{BufMut, Bytes, BytesMut};
use modbus_core::{
    Encoder, Framer, IdMode, MAX_PDU_LENGTH, ModbusError, ModbusRequest, ModbusResponse,
    ModbusResult, Pdu, TransactionId,
};

const START: u8 = b':';
const END: &[u8] = b"\r\n";

/// Longest well-formed frame: start, hex of unit + PDU + LRC, end
pub const MAX_ASCII_FRAME_LENGTH: usize = 1 + 2 * (1 + MAX_PDU_LENGTH + 1) + 2;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Framer for ASCII-framed traffic
#[derive(Debug, Default)]
pub struct AsciiFramer {
    buffer: BytesMut,
    statistics: FramerStatistics,
}

impl AsciiFramer {
    /// Create a new ASCII framer
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

    /// Drop bytes in front of the next start character
    ///
    /// Returns false if the buffer holds no start character at all.
    fn seek_start(&mut self) -> bool {
        let start = self.buffer.iter().position(|&b| b == START);
        let skipped = start.unwrap_or(self.buffer.len());
        if skipped > 0 {
            let _ = self.buffer.split_to(skipped);
            self.statistics.add_bytes_discarded(skipped);
            log::warn!("Skipped {} bytes looking for ASCII frame start", skipped);
        }
        start.is_some()
    }

    fn decode_frame(body: &[u8]) -> ModbusResult<ModbusResponse> {
        if body.len() % 2 != 0 || body.len() < 6 {
            return Err(ModbusError::MalformedFrame(format!(
                "ASCII frame body has invalid length {}",
                body.len()
            )));
        }
        let bytes = body
            .chunks(2)
            .map(|pair| -> ModbusResult<u8> {
                Ok((hex_value(pair[0])? << 4) | hex_value(pair[1])?)
            })
            .collect::<ModbusResult<Vec<u8>>>()?;

        let mut lrc = LrcCalc::new();
        lrc.update_bytes(&bytes);
        lrc.validate()?;

        let unit_id = bytes[0];
        let pdu = Pdu::decode(&bytes[1..bytes.len() - 1])?;
        Ok(ModbusResponse::new(TransactionId::IMPLICIT, unit_id, pdu))
    }
}

fn hex_value(digit: u8) -> ModbusResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        _ => Err(ModbusError::MalformedFrame(format!(
            "Invalid hex digit 0x{:02X} in ASCII frame",
            digit
        ))),
    }
}

fn put_hex(buf: &mut BytesMut, byte: u8) {
    buf.put_u8(HEX_DIGITS[(byte >> 4) as usize]);
    buf.put_u8(HEX_DIGITS[(byte & 0x0F) as usize]);
}

impl Encoder for AsciiFramer {
    type Request = ModbusRequest;

    fn encode(
        &self,
        request: &ModbusRequest,
        _transaction_id: TransactionId,
    ) -> ModbusResult<Bytes> {
        let mut raw = BytesMut::with_capacity(1 + request.pdu().encoded_len());
        raw.put_u8(request.unit_id());
        request.pdu().encode_into(&mut raw)?;
        let lrc = LrcCalc::compute(&raw);

        let mut buf = BytesMut::with_capacity(1 + 2 * (raw.len() + 1) + END.len());
        buf.put_u8(START);
        for &byte in raw.iter() {
            put_hex(&mut buf, byte);
        }
        put_hex(&mut buf, lrc);
        buf.put_slice(END);
        Ok(buf.freeze())
    }
}

impl Framer for AsciiFramer {
    type Reply = ModbusResponse;

    fn id_mode(&self) -> IdMode {
        IdMode::Implicit
    }

    fn process_incoming<F>(&mut self, data: &[u8], mut on_reply: F) -> ModbusResult<()>
    where
        F: FnMut(ModbusResponse),
    {
        self.buffer.extend_from_slice(data);

        while self.seek_start() {
            let body = &self.buffer[1..];
            let end = body.windows(END.len()).position(|w| w == END);
            let restart = body.iter().position(|&b| b == START);

            // A new start before the terminator means the current frame was cut short
            if let Some(restart) = restart.filter(|&r| end.is_none_or(|end| r < end)) {
                log::warn!("Dropping truncated ASCII frame");
                self.statistics.increment_frames_rejected();
                let _ = self.buffer.split_to(1 + restart);
                continue;
            }

            let Some(end) = end else {
                if self.buffer.len() > MAX_ASCII_FRAME_LENGTH {
                    let buffered = self.buffer.len();
                    self.buffer.clear();
                    return Err(ModbusError::MalformedFrame(format!(
                        "Unterminated ASCII frame exceeds {} bytes ({} buffered)",
                        MAX_ASCII_FRAME_LENGTH, buffered
                    )));
                }
                break;
            };

            let frame = self.buffer.split_to(1 + end + END.len());
            match Self::decode_frame(&frame[1..1 + end]) {
                Ok(reply) => {
                    self.statistics.increment_frames_decoded();
                    on_reply(reply);
                }
                Err(e) => {
                    log::warn!("Dropping ASCII frame: {}", e);
                    self.statistics.increment_frames_rejected();
                }
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}
