use thiserror::Error;

pub type BlocksResult<T> = Result<T, BlocksError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlocksError {
    // --- wire decoding ---

    #[error("Invalid message content: {0}")]
    InvalidContent(String),

    // --- markup errors ---

    #[error("XML parse error: {0}")]
    XmlError(String),

    #[error("Empty markup: no components found")]
    EmptyMarkup,

    #[error("Multiple root components found. Markup must have exactly one root component")]
    MultipleRootComponents,

    #[error("Invalid component: {component}. {reason}")]
    InvalidComponent { component: String, reason: String },

    #[error("Invalid property '{property}' for component '{component}': {reason}")]
    InvalidProperty {
        component: String,
        property: String,
        reason: String,
    },

    #[error("Missing required property '{property}' for component '{component}'")]
    MissingProperty {
        component: String,
        property: String,
    },

    #[error("Invalid enum value '{value}' for property '{property}'. Expected one of: {expected}")]
    InvalidEnum {
        property: String,
        value: String,
        expected: String,
    },

    #[error("Value out of range for '{property}': {value}. Expected range: {range}")]
    ValueOutOfRange {
        property: String,
        value: String,
        range: String,
    },

    #[error("Maximum nesting depth ({max_depth}) exceeded")]
    MaxNestingDepthExceeded { max_depth: usize },

    #[error("Unsafe URL '{url}': only http(s) and data:image URLs are allowed")]
    UnsafeUrl { url: String },

    // --- extraction ---

    #[error("Invalid script fence marker '{marker}': {reason}")]
    InvalidFenceMarker { marker: String, reason: String },
}

impl From<roxmltree::Error> for BlocksError {
    fn from(err: roxmltree::Error) -> Self {
        BlocksError::XmlError(err.to_string())
    }
}

impl From<serde_json::Error> for BlocksError {
    fn from(err: serde_json::Error) -> Self {
        BlocksError::InvalidContent(err.to_string())
    }
}
