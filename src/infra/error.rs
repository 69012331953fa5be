use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("invalid api endpoint: {0}")]
    Endpoint(String),
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn endpoint(message: impl Into<String>) -> Self {
        Self::Endpoint(message.into())
    }
}
