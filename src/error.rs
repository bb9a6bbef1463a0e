use thiserror::Error;

/// Structured failures surfaced by engine operations.
///
/// None of these are fatal: the request layer renders them as a message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("No data to simulate: the grid is empty")]
    EmptyGrid,

    #[error("Relocation share must be in (0, 1], got {0}")]
    InvalidShare(f64),

    #[error("Invalid hex grid resolution: {0}")]
    InvalidResolution(u8),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
