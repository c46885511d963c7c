use premise_stream::ServerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    /// The server could not be reached or rejected a request
    #[error("Communication error: {0}")]
    Communication(#[from] ServerError),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Command is not bound to an object and property")]
    UnboundCommand,
}

impl SdkError {
    /// True when the subscription connection has to be started again
    pub fn requires_reconnect(&self) -> bool {
        matches!(self, SdkError::Communication(e) if e.requires_reconnect())
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
