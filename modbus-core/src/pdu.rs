//! Raw protocol data units
//!
//! The engine does not interpret payloads. A PDU is a function code plus the
//! bytes that follow it; building register reads or writes out of these is
//! left to higher layers.

use crate::codec::Reply;
use crate::error::{ModbusError, ModbusResult};
use crate::transaction_id::TransactionId;
use bytes::{BufMut, Bytes, BytesMut};

/// Maximum PDU size (function code included)
pub const MAX_PDU_LENGTH: usize = 253;

const EXCEPTION_FLAG: u8 = 0x80;

/// Function code and payload of one Modbus message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    function_code: u8,
    data: Bytes,
}

impl Pdu {
    /// Create a new PDU
    pub fn new(function_code: u8, data: impl Into<Bytes>) -> Self {
        Self {
            function_code,
            data: data.into(),
        }
    }

    pub fn function_code(&self) -> u8 {
        self.function_code
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Encoded length, function code included
    pub fn encoded_len(&self) -> usize {
        1 + self.data.len()
    }

    /// Whether the server answered with an exception response
    pub fn is_exception(&self) -> bool {
        self.function_code & EXCEPTION_FLAG != 0
    }

    /// Exception code of an exception response
    pub fn exception_code(&self) -> Option<u8> {
        if self.is_exception() {
            self.data.first().copied()
        } else {
            None
        }
    }

    /// Append the encoded PDU to `buf`
    ///
    /// # Errors
    /// Returns `InvalidData` if the PDU exceeds [`MAX_PDU_LENGTH`]
    pub fn encode_into(&self, buf: &mut BytesMut) -> ModbusResult<()> {
        if self.encoded_len() > MAX_PDU_LENGTH {
            return Err(ModbusError::InvalidData(format!(
                "PDU too long: {} bytes, maximum is {}",
                self.encoded_len(),
                MAX_PDU_LENGTH
            )));
        }
        buf.reserve(self.encoded_len());
        buf.put_u8(self.function_code);
        buf.put_slice(&self.data);
        Ok(())
    }

    /// Decode a PDU from its wire bytes
    pub fn decode(data: &[u8]) -> ModbusResult<Self> {
        match data.split_first() {
            Some((&function_code, rest)) => Ok(Self {
                function_code,
                data: Bytes::copy_from_slice(rest),
            }),
            None => Err(ModbusError::InvalidData("Empty PDU".to_string())),
        }
    }
}

/// Request addressed to one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusRequest {
    unit_id: u8,
    pdu: Pdu,
}

impl ModbusRequest {
    pub fn new(unit_id: u8, pdu: Pdu) -> Self {
        Self { unit_id, pdu }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn pdu(&self) -> &Pdu {
        &self.pdu
    }
}

/// Decoded response, tagged with the transaction it answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusResponse {
    transaction_id: TransactionId,
    unit_id: u8,
    pdu: Pdu,
}

impl ModbusResponse {
    pub fn new(transaction_id: TransactionId, unit_id: u8, pdu: Pdu) -> Self {
        Self {
            transaction_id,
            unit_id,
            pdu,
        }
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn pdu(&self) -> &Pdu {
        &self.pdu
    }

    pub fn into_pdu(self) -> Pdu {
        self.pdu
    }
}

impl Reply for ModbusResponse {
    fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_response() {
        let pdu = Pdu::new(0x83, vec![0x02]);
        assert!(pdu.is_exception());
        assert_eq!(pdu.exception_code(), Some(0x02));

        let pdu = Pdu::new(0x03, vec![0x02, 0x00, 0x2A]);
        assert!(!pdu.is_exception());
        assert_eq!(pdu.exception_code(), None);
    }

    #[test]
    fn test_encode_rejects_oversized_pdu() {
        let pdu = Pdu::new(0x10, vec![0u8; MAX_PDU_LENGTH]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            pdu.encode_into(&mut buf),
            Err(ModbusError::InvalidData(_))
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_empty() {
        assert!(Pdu::decode(&[]).is_err());
        let pdu = Pdu::decode(&[0x06, 0x00, 0x01]).unwrap();
        assert_eq!(pdu.function_code(), 0x06);
        assert_eq!(pdu.data(), &[0x00, 0x01]);
    }
}
