use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Request failed: {0}")]
    RequestError(String),
    #[error("Invalid response: {0}")]
    ResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}

impl GatewayError {
    /// The HTTP status of a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::QueryError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("The audit relay is disabled")]
    Disabled,
    #[error("The audit relay did not accept the record. {0}")]
    Rejected(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl RelayError {
    /// The relay already holds a record with this id.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RelayError::Gateway(e) if e.is_conflict())
    }
}
