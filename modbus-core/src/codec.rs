//! Collaborator traits at the wire boundary
//!
//! The client core never looks inside a frame. It asks an [`Encoder`] to turn a
//! request and its transaction id into bytes, and feeds every received chunk
//! to a [`Framer`], which calls back once per complete [`Reply`].
//!
//! # Framer contract
//! - Chunks carry no boundary guarantee: a frame may be split over several
//!   deliveries and one delivery may hold several frames.
//! - Partial trailing bytes are retained until the rest arrives; nothing is
//!   emitted for them.
//! - Leading noise is skipped until a valid frame start is found.
//! - Replies are emitted strictly in arrival order. The core never reorders,
//!   so this order is the order in which pending requests resolve.
//! - An ordinary decode failure is "no event". `Err` is reserved for a stream
//!   the framer cannot recover from; the core treats it as a disconnect.

use crate::error::ModbusResult;
use crate::transaction_id::{IdMode, TransactionId};
use bytes::Bytes;

/// Decoded response that can be matched to its request
pub trait Reply {
    /// The transaction this reply answers
    fn transaction_id(&self) -> TransactionId;
}

/// Turns a request into wire bytes carrying a transaction id
pub trait Encoder {
    type Request;

    /// Encode `request`, embedding `transaction_id` so the peer echoes it
    fn encode(&self, request: &Self::Request, transaction_id: TransactionId) -> ModbusResult<Bytes>;
}

/// Reassembles raw byte deliveries into decoded replies
pub trait Framer {
    type Reply: Reply;

    /// Whether frames carry transaction ids
    fn id_mode(&self) -> IdMode;

    /// Consume one delivery, calling `on_reply` once per complete reply
    ///
    /// # Errors
    /// Returns `MalformedFrame` only when the stream is unrecoverable
    fn process_incoming<F>(&mut self, data: &[u8], on_reply: F) -> ModbusResult<()>
    where
        F: FnMut(Self::Reply);

    /// Drop any buffered partial frame
    fn reset(&mut self);
}
