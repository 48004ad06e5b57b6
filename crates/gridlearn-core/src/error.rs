//! Error types for gridlearn

use thiserror::Error;

/// Result type for gridlearn operations
pub type Result<T> = std::result::Result<T, GridLearnError>;

/// gridlearn error types
#[derive(Debug, Error)]
pub enum GridLearnError {
    /// Grid with fewer than two cells or more than `MAX_CELLS`
    #[error("Invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Hyperparameter or request field outside its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Coordinate outside the grid
    #[error("Position ({x}, {y}) is outside the grid")]
    OutOfBounds { x: usize, y: usize },

    /// Action name not recognised
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Cell name not recognised (only surfaced by strict parsing)
    #[error("Unknown cell type: {0}")]
    UnknownCell(String),

    /// Simulation invariant violated during a tick
    #[error("Simulation error: {0}")]
    Simulation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Protocol error (unknown method or tool)
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Transport I/O error
    #[error("IPC error: {0}")]
    IpcError(String),
}

impl From<serde_json::Error> for GridLearnError {
    fn from(err: serde_json::Error) -> Self {
        GridLearnError::SerializationError(err.to_string())
    }
}

/// JSON-RPC error codes for gridlearn
pub mod error_codes {
    pub const INVALID_DIMENSIONS: i32 = -32000;
    pub const INVALID_PARAMETER: i32 = -32001;
    pub const OUT_OF_BOUNDS: i32 = -32002;
    pub const UNKNOWN_ACTION: i32 = -32003;
    pub const SIMULATION_FAILED: i32 = -32004;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL: i32 = -32603;
}
