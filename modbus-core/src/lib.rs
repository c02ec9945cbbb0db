//! Core types and utilities for the Modbus client engine
//!
//! This crate provides the pieces every other layer agrees on: the error
//! type, transaction identifiers, raw PDU/ADU values and the collaborator
//! traits (`Encoder`, `Framer`, `Reply`) the client core is written against.

pub mod codec;
pub mod error;
pub mod pdu;
pub mod transaction_id;

pub use codec::{Encoder, Framer, Reply};
pub use error::{ModbusError, ModbusResult};
pub use pdu::{MAX_PDU_LENGTH, ModbusRequest, ModbusResponse, Pdu};
pub use transaction_id::{IdMode, TransactionId};
