use jarvis_blocks::BlocksError;
use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

/// Failures inside the rendering engine. None of them escape a block (or, for
/// charts, a bubble): callers turn them into a placeholder and a log line.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Component script did not compile.
    #[error("Transpile error in {chunk}: {message}")]
    Transpile { chunk: String, message: String },

    /// Script raised, ran out of memory or time, or exported something unusable.
    #[error("Execution error in {chunk}: {message}")]
    Execution { chunk: String, message: String },

    /// Component ran but produced markup that does not parse or validate.
    #[error("Mount error in {chunk}: {source}")]
    Mount {
        chunk: String,
        #[source]
        source: BlocksError,
    },

    /// A chart script ran before the bubble's drawing surface was mounted.
    #[error("Drawing surface for bubble {bubble} is not mounted")]
    SurfaceUnavailable { bubble: String },

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Blocks(#[from] BlocksError),
}

impl RenderError {
    pub fn execution(chunk: &str, err: impl std::fmt::Display) -> Self {
        RenderError::Execution {
            chunk: chunk.to_string(),
            message: err.to_string(),
        }
    }

    /// True for the errors that are rendered as the block placeholder.
    pub fn is_block_failure(&self) -> bool {
        matches!(
            self,
            RenderError::Transpile { .. } | RenderError::Execution { .. } | RenderError::Mount { .. }
        )
    }
}
