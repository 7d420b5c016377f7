use thiserror::Error;

/// Failures of an external generation call. Every variant is recoverable by
/// the caller; none of them should escape a frame slot.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Task {task_id} failed: {reason}")]
    TaskFailed { task_id: String, reason: String },

    #[error("Task {task_id} did not finish after {attempts} attempts")]
    TaskTimeout { task_id: String, attempts: u32 },

    #[error("Polling task {task_id} failed on the last of {attempts} attempts: {last_error}")]
    TaskPollingExhausted {
        task_id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Polling task {0} was cancelled")]
    Cancelled(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    /// Short machine-readable kind for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::Validation(_) => "validation",
            GenerationError::Provider(_) | GenerationError::Network(_) => "provider",
            GenerationError::TaskFailed { .. } => "task_failed",
            GenerationError::TaskTimeout { .. } => "task_timeout",
            GenerationError::TaskPollingExhausted { .. } => "task_polling_exhausted",
            GenerationError::Cancelled(_) => "cancelled",
            GenerationError::Download(_) => "download",
            GenerationError::Image(_) => "image",
            GenerationError::Io(_) => "io",
        }
    }
}

impl From<image::ImageError> for GenerationError {
    fn from(err: image::ImageError) -> Self {
        GenerationError::Image(err.to_string())
    }
}

impl From<usvg::Error> for GenerationError {
    fn from(err: usvg::Error) -> Self {
        GenerationError::Image(format!("svg: {err}"))
    }
}

pub type GenerationResult<T> = Result<T, GenerationError>;
