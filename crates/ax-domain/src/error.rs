/// Shared error type used across all `ax` crates.
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

    #[error("invalid session id: {0}")]
    SessionId(String),

    #[error("taint budget exceeded: {0}")]
    TaintExceeded(String),

    #[error("scan blocked: {0}")]
    ScanBlocked(String),

    #[error("queue: {0}")]
    Queue(String),

    #[error("ipc: {0}")]
    Ipc(String),

    #[error("skill: {0}")]
    Skill(String),

    #[error("sandbox: {0}")]
    Sandbox(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
