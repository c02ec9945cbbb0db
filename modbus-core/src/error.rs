use thiserror::Error;

/// Main error type for Modbus client operations
#[derive(Error, Debug)]
pub enum ModbusError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Client is not connected")]
    NotConnected,

    #[error("Connection lost during request: {0}")]
    ConnectionLost(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Timeout")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,
}

impl ModbusError {
    /// Whether the error was caused by the connection going away
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, ModbusError::ConnectionLost(_))
    }
}

/// Result type alias for Modbus client operations
pub type ModbusResult<T> = Result<T, ModbusError>;
