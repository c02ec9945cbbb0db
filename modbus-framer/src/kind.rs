//! Runtime framer selection

use crate::ascii::AsciiFramer;
use crate::socket::SocketFramer;
use crate::statistics::FramerStatistics;
use bytes::Bytes;
use modbus_core::{
    Encoder, Framer, IdMode, ModbusRequest, ModbusResponse, ModbusResult, TransactionId,
};
use serde::{Deserialize, Serialize};

/// Which wire framing to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramerKind {
    /// MBAP header framing (TCP/UDP)
    #[default]
    Socket,
    /// `:`-delimited hex framing with LRC
    Ascii,
}

impl FramerKind {
    /// Create a fresh framer of this kind
    pub fn build(self) -> ModbusFramer {
        match self {
            FramerKind::Socket => ModbusFramer::Socket(SocketFramer::new()),
            FramerKind::Ascii => ModbusFramer::Ascii(AsciiFramer::new()),
        }
    }
}

/// A framer chosen at runtime
#[derive(Debug)]
pub enum ModbusFramer {
    Socket(SocketFramer),
    Ascii(AsciiFramer),
}

impl ModbusFramer {
    pub fn kind(&self) -> FramerKind {
        match self {
            ModbusFramer::Socket(_) => FramerKind::Socket,
            ModbusFramer::Ascii(_) => FramerKind::Ascii,
        }
    }

    pub fn statistics(&self) -> &FramerStatistics {
        match self {
            ModbusFramer::Socket(framer) => framer.statistics(),
            ModbusFramer::Ascii(framer) => framer.statistics(),
        }
    }
}

impl From<FramerKind> for ModbusFramer {
    fn from(kind: FramerKind) -> Self {
        kind.build()
    }
}

impl Encoder for ModbusFramer {
    type Request = ModbusRequest;

    fn encode(
        &self,
        request: &ModbusRequest,
        transaction_id: TransactionId,
    ) -> ModbusResult<Bytes> {
        match self {
            ModbusFramer::Socket(framer) => framer.encode(request, transaction_id),
            ModbusFramer::Ascii(framer) => framer.encode(request, transaction_id),
        }
    }
}

impl Framer for ModbusFramer {
    type Reply = ModbusResponse;

    fn id_mode(&self) -> IdMode {
        match self {
            ModbusFramer::Socket(framer) => framer.id_mode(),
            ModbusFramer::Ascii(framer) => framer.id_mode(),
        }
    }

    fn process_incoming<F>(&mut self, data: &[u8], on_reply: F) -> ModbusResult<()>
    where
        F: FnMut(ModbusResponse),
    {
        match self {
            ModbusFramer::Socket(framer) => framer.process_incoming(data, on_reply),
            ModbusFramer::Ascii(framer) => framer.process_incoming(data, on_reply),
        }
    }

    fn reset(&mut self) {
        match self {
            ModbusFramer::Socket(framer) => framer.reset(),
            ModbusFramer::Ascii(framer) => framer.reset(),
        }
    }
}
