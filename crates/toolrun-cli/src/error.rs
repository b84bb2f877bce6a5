use thiserror::Error;
use toolrun_server::gateway::ErrorBody;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Non-OK response from the gateway; `message` is the raw body text
    #[error("Gateway returned HTTP {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

impl ClientError {
    /// The message to show a person: the gateway's `userMessage` when the
    /// body is its JSON error shape, otherwise the error itself.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Gateway { message, .. } => {
                match serde_json::from_str::<ErrorBody>(message) {
                    Ok(body) if !body.user_message.is_empty() => body.user_message,
                    _ if !message.trim().is_empty() => message.trim().to_string(),
                    _ => self.to_string(),
                }
            }
            other => other.to_string(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
