use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Date/time parsing failed: {0}")]
    DateTime(#[from] chrono::ParseError),

    #[error("Failed to read configuration: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid date window: {0}")]
    Window(String),

    #[error("Remote authentication failed: {0}")]
    RemoteAuth(String),

    #[error("Remote service unavailable: {0}")]
    RemoteTransient(String),

    #[error("Remote rejected request (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Network timeout")]
    Timeout,
}

impl Error {
    /// Whether the error must stop the whole run rather than a single event.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Settings(_) | Self::Window(_) | Self::RemoteAuth(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
