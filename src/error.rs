use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlbotError {
    #[error("connection: {message}")]
    Connection { message: String },

    #[error("completion: {message}")]
    Completion { message: String },

    #[error("auth: {message}")]
    Auth { message: String },

    #[error("timeout: completion request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("shape: expected a row set, got {found}")]
    Shape { found: &'static str },

    #[error("config: {message}")]
    Config { message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("format: {message}")]
    Format { message: String },
}
