use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    // Relayée telle quelle au player par la glue plateforme, code "UPDATE_ERROR"
    #[error("UPDATE_ERROR: {0}")]
    Update(String),
    #[error("Render failed: {0}")]
    Render(String),
    #[error("Session task is no longer running")]
    NotRunning,
}

impl SessionError {
    pub fn update(message: &str) -> Self {
        SessionError::Update(message.to_string())
    }

    pub fn render(message: &str) -> Self {
        SessionError::Render(message.to_string())
    }
}

#[derive(Error, Debug)]
#[error("{0}")]
pub struct SinkError(pub String);

impl SinkError {
    pub fn new(message: &str) -> Self {
        SinkError(message.to_string())
    }
}
