use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("All render slots are busy")]
    Capacity,

    #[error("Failed to fetch input {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Workspace setup failed: {0}")]
    Materialization(#[from] std::io::Error),

    #[error("Failed to launch {program}: {reason}")]
    Launch { program: String, reason: String },

    #[error("Render tool exited with code {code}")]
    ToolFailed { code: i32, stderr: String },

    #[error("Render deadline of {0}s exceeded")]
    Timeout(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, RenderError>;
