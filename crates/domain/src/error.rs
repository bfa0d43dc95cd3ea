/// Shared error type used across all Concierge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// A successful (2xx) reply whose body does not have the expected shape.
    #[error("provider {provider}: malformed reply: {message}")]
    Protocol { provider: String, message: String },

    #[error("tool {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("usage ledger: {0}")]
    Ledger(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
