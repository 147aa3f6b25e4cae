#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("http request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("token storage failed: {0}")]
    Storage(#[from] std::io::Error),
    #[error("invalid token file: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl ClientError {
    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Network(_) => "Network error. Please try again.".into(),
            Self::Storage(_) | Self::InvalidJson(_) => "Could not save your session.".into(),
        }
    }
}
